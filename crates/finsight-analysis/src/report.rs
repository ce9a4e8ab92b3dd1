//! Markdown report artifacts

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writes `<dir>/<SYMBOL>_analysis.md`
///
/// Runs for the same symbol overwrite each other's artifact.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact path for a symbol
    pub fn path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}_analysis.md"))
    }

    /// Write all sections at once, newline-joined
    pub async fn write(&self, symbol: &str, sections: &[String]) -> std::io::Result<PathBuf> {
        let path = self.path(symbol);
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, sections.join("\n")).await?;
        debug!(path = %path.display(), sections = sections.len(), "Wrote report");
        Ok(path)
    }

    /// Truncate the artifact and open it for per-section appends
    pub async fn create(&self, symbol: &str) -> std::io::Result<ReportFile> {
        let path = self.path(symbol);
        fs::create_dir_all(&self.dir).await?;
        let file = File::create(&path).await?;
        Ok(ReportFile { path, file })
    }
}

/// An artifact being written section by section
#[derive(Debug)]
pub struct ReportFile {
    path: PathBuf,
    file: File,
}

impl ReportFile {
    /// Append one cleaned section followed by a newline and flush it
    pub async fn append(&mut self, section: &str) -> std::io::Result<()> {
        self.file.write_all(section.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.file.flush().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_joins_sections() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("data"));

        let path = writer
            .write("AAPL", &["Overview.".to_string(), "Buy.".to_string()])
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("data").join("AAPL_analysis.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Overview.\nBuy.");
    }

    #[tokio::test]
    async fn test_append_is_incremental() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());

        let mut report = writer.create("MSFT").await.unwrap();
        report.append("Overview.").await.unwrap();
        assert_eq!(std::fs::read_to_string(report.path()).unwrap(), "Overview.\n");

        report.append("Hold.").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(report.path()).unwrap(),
            "Overview.\nHold.\n"
        );
    }

    #[tokio::test]
    async fn test_create_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        writer.write("NVDA", &["old".to_string()]).await.unwrap();

        let report = writer.create("NVDA").await.unwrap();
        assert_eq!(std::fs::read_to_string(report.path()).unwrap(), "");
    }
}
