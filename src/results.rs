use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of fetching one distinct remote URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadRecord {
    /// URL that was fetched
    pub remote_url: String,

    /// Path relative to the output root
    pub local_relative_path: String,

    /// Bytes written to disk (0 on failure)
    pub bytes_written: u64,

    /// Whether the file exists on disk
    pub success: bool,
}

impl DownloadRecord {
    pub fn succeeded(remote_url: String, local_relative_path: String, bytes_written: u64) -> Self {
        Self {
            remote_url,
            local_relative_path,
            bytes_written,
            success: true,
        }
    }

    pub fn failed(remote_url: String, local_relative_path: String) -> Self {
        Self {
            remote_url,
            local_relative_path,
            bytes_written: 0,
            success: false,
        }
    }
}

/// What happened to one page of the crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageOutcome {
    /// The page was written under the given file name
    Written {
        url: String,
        file_name: String,
        assets: usize,
    },
    /// The page could not be fetched or written and was skipped
    Failed { url: String, reason: String },
}

impl PageOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, PageOutcome::Written { .. })
    }
}

/// A downloaded bundler chunk waiting to be scanned for further chunks
#[derive(Debug, Clone)]
pub struct ChunkReference {
    pub url: String,
    pub local_path: String,
    pub content: String,
    pub scanned: bool,
}

/// Summary of a finished run.
///
/// Its `Display` form is the status message handed back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneReport {
    pub seed_url: String,
    pub output_dir: PathBuf,
    pub pages: Vec<PageOutcome>,
    pub downloads: Vec<DownloadRecord>,
    /// Chunks found by scanning scripts, beyond those referenced from pages
    pub chunks_discovered: usize,
}

impl CloneReport {
    pub fn pages_written(&self) -> usize {
        self.pages.iter().filter(|p| p.is_written()).count()
    }

    pub fn pages_failed(&self) -> usize {
        self.pages.len() - self.pages_written()
    }

    pub fn assets_downloaded(&self) -> usize {
        self.downloads.iter().filter(|d| d.success).count()
    }

    pub fn bytes_written(&self) -> u64 {
        self.downloads.iter().map(|d| d.bytes_written).sum()
    }

    /// Local paths that were written into pages or stylesheets but never landed on disk
    pub fn dangling(&self) -> Vec<&DownloadRecord> {
        self.downloads.iter().filter(|d| !d.success).collect()
    }
}

impl fmt::Display for CloneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Website cloning completed! {} page(s) written to '{}' ({} assets, {} bytes",
            self.pages_written(),
            self.output_dir.display(),
            self.assets_downloaded(),
            self.bytes_written()
        )?;
        if self.chunks_discovered > 0 {
            write!(f, ", {} chunks discovered", self.chunks_discovered)?;
        }
        write!(f, ")")?;

        let dangling = self.dangling().len();
        if dangling > 0 {
            write!(f, ". {} asset(s) failed to download", dangling)?;
        }
        if self.pages_failed() > 0 {
            write!(f, ". {} page(s) failed", self.pages_failed())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_message() {
        let report = CloneReport {
            seed_url: "https://example.com/".to_string(),
            output_dir: PathBuf::from("./cloned_example_com"),
            pages: vec![
                PageOutcome::Written {
                    url: "https://example.com/".to_string(),
                    file_name: "index.html".to_string(),
                    assets: 2,
                },
                PageOutcome::Failed {
                    url: "https://example.com/gone".to_string(),
                    reason: "status 404".to_string(),
                },
            ],
            downloads: vec![
                DownloadRecord::succeeded("https://example.com/a.css".into(), "css/a.css".into(), 10),
                DownloadRecord::failed("https://example.com/b.png".into(), "images/b.png".into()),
            ],
            chunks_discovered: 0,
        };

        assert_eq!(report.pages_written(), 1);
        assert_eq!(report.pages_failed(), 1);
        assert_eq!(report.dangling().len(), 1);
        assert_eq!(
            report.to_string(),
            "Website cloning completed! 1 page(s) written to './cloned_example_com' (1 assets, 10 bytes). 1 asset(s) failed to download. 1 page(s) failed"
        );
    }
}
