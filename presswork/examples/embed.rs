//! Minimal embedding: register the built-in adapters, run a job once, then
//! let the scheduler fire it every ten seconds for a minute.
//!
//! ```sh
//! cargo run --example embed
//! ```

use std::time::Duration;

use presswork::{builtin, Engine, EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = presswork::logging::init_logging(
        presswork::logging::default_log_dir(),
        presswork::logging::default_log_file(),
    )?;

    let mut engine = Engine::new(EngineConfig {
        enable_metrics: true,
        ..Default::default()
    });

    engine.register_loader("csv", builtin::CsvLoader);
    engine.register_renderer("markdown", builtin::MarkdownRenderer);
    engine.register_output("html", builtin::FileOutput::new("./out"));
    engine.register_delivery("console", builtin::ConsoleDelivery);

    let job = engine
        .job("daily-sample")
        .with_template("sample.md")
        .with_csv_data("data.csv")
        .output_html()
        .deliver_to_console()
        .with_cron_schedule("@every 10s")
        .with_timeout(Duration::from_secs(30))
        .build()?;

    println!("=== Testing job execution ===");
    engine.test_execute(&job).await?;

    engine.add_cron_job(job)?;

    println!("Starting presswork engine...");
    engine.start();

    tokio::time::sleep(Duration::from_secs(60)).await;

    println!("Stopping engine...");
    engine.stop().await;

    let metrics = engine.metrics();
    println!(
        "executions: {} total, {} succeeded, {} failed, {} timed out, {} missed",
        metrics.total, metrics.succeeded, metrics.failed, metrics.timed_out, metrics.missed
    );
    Ok(())
}
