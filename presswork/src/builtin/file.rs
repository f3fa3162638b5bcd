//! File-writing output generator.

use std::path::PathBuf;

use chrono::Utc;

use crate::adapter::{AdapterError, AdapterFuture, OutputFile, OutputGenerator, RenderedDoc};
use crate::scope::Scope;

/// Writes rendered documents to timestamped files in a directory.
///
/// The filename is `report_<YYYYmmdd_HHMMSS>.<format>`. For the `html`
/// format the doc's HTML is written; other formats get the raw content,
/// falling back to the HTML when no raw content was produced. The directory
/// is created on first use.
pub struct FileOutput {
    out_dir: PathBuf,
}

impl FileOutput {
    /// Creates a generator writing into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl OutputGenerator for FileOutput {
    fn generate<'a>(
        &'a self,
        _scope: &'a Scope,
        doc: &'a RenderedDoc,
        format: &'a str,
    ) -> AdapterFuture<'a, OutputFile> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.out_dir).await.map_err(|e| {
                AdapterError::new(format!(
                    "failed to create output directory {}: {e}",
                    self.out_dir.display()
                ))
            })?;

            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            let filename = format!("report_{timestamp}.{format}");
            let out_path = self.out_dir.join(&filename);

            let data: Vec<u8> = match format {
                "html" => doc.html.clone().into_bytes(),
                _ if !doc.content.is_empty() => doc.content.clone().into_bytes(),
                _ => doc.html.clone().into_bytes(),
            };

            tokio::fs::write(&out_path, &data).await.map_err(|e| {
                AdapterError::new(format!("failed to write {}: {e}", out_path.display()))
            })?;

            Ok(OutputFile {
                name: filename,
                path: out_path.display().to_string(),
                data: Some(data),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doc() -> RenderedDoc {
        RenderedDoc {
            html: "<h1>Report</h1>".to_string(),
            content: "# Report".to_string(),
            meta: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_writes_html_format() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileOutput::new(dir.path());
        let scope = Scope::with_timeout(Duration::from_secs(1));

        let file = generator.generate(&scope, &doc(), "html").await.unwrap();
        assert!(file.name.starts_with("report_"));
        assert!(file.name.ends_with(".html"));
        assert_eq!(file.data.as_deref(), Some("<h1>Report</h1>".as_bytes()));
        assert_eq!(
            std::fs::read_to_string(&file.path).unwrap(),
            "<h1>Report</h1>"
        );
    }

    #[tokio::test]
    async fn test_non_html_format_gets_content() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileOutput::new(dir.path());
        let scope = Scope::with_timeout(Duration::from_secs(1));

        let file = generator.generate(&scope, &doc(), "md").await.unwrap();
        assert!(file.name.ends_with(".md"));
        assert_eq!(file.data.as_deref(), Some("# Report".as_bytes()));
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let generator = FileOutput::new(&nested);
        let scope = Scope::with_timeout(Duration::from_secs(1));

        let file = generator.generate(&scope, &doc(), "html").await.unwrap();
        assert!(std::path::Path::new(&file.path).exists());
    }
}
