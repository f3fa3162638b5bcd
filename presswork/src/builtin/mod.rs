//! Built-in adapters.
//!
//! Small, dependency-light implementations of the four capability traits,
//! enough to run an engine end-to-end without writing any host code: a CSV
//! loader, a markdown renderer, a file-writing output generator and a
//! console delivery. Production embedders will usually replace most of
//! these with their own adapters.

mod console;
mod csv;
mod file;
mod markdown;

pub use console::ConsoleDelivery;
pub use csv::CsvLoader;
pub use file::FileOutput;
pub use markdown::MarkdownRenderer;
