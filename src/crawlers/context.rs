use crate::config::CloneConfig;
use crate::error::Result;
use crate::fetcher::{FetchOutcome, Fetcher, HttpGet};
use crate::parsers::AssetKind;
use crate::parsers::chunks::{ChunkScanner, PatternChunkScanner};
use crate::registry::{AssetRegistry, PendingDownload};
use crate::results::{ChunkReference, DownloadRecord};
use crate::utils::path_extension;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// Flat asset directories created before anything is downloaded
const ASSET_DIRECTORIES: [&str; 4] = ["images", "css", "js", "fonts"];

/// An asset after its download attempt
#[derive(Debug)]
pub struct DownloadedAsset {
    pub url: Url,
    pub kind: AssetKind,
    /// Final local path (after any extension change)
    pub local_path: String,
    /// Set when content sniffing moved the file: `(old, new)`
    pub renamed: Option<(String, String)>,
    /// The body, present only when the file was written
    pub body: Option<Vec<u8>>,
}

impl DownloadedAsset {
    pub fn succeeded(&self) -> bool {
        self.body.is_some()
    }
}

/// Run-wide state shared by the page materializer and the site crawler
pub struct CloneContext<H> {
    pub config: CloneConfig,
    pub seed: Url,
    pub output_root: PathBuf,
    pub fetcher: Fetcher<H>,
    pub registry: AssetRegistry,
    /// Normalized page URL -> local HTML file name, for every page in the run
    pub page_files: HashMap<String, String>,
    pub scanner: Box<dyn ChunkScanner + Send + Sync>,
    /// Chunks downloaded by pages, waiting for the closure pass
    pub chunk_seeds: Vec<ChunkReference>,
}

impl<H: HttpGet> CloneContext<H> {
    pub fn new(config: CloneConfig, seed: Url, http: H) -> Self {
        let output_root = config.output_root(&seed);
        let fetcher = Fetcher::new(http, config.page_timeout(), config.asset_timeout());
        Self {
            config,
            seed,
            output_root,
            fetcher,
            registry: AssetRegistry::new(),
            page_files: HashMap::new(),
            scanner: Box::new(PatternChunkScanner::new()),
            chunk_seeds: Vec::new(),
        }
    }

    /// Create the output root and the flat asset directories
    pub async fn prepare_output(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_root).await?;
        for dir in ASSET_DIRECTORIES {
            tokio::fs::create_dir_all(self.output_root.join(dir)).await?;
        }
        ::log::info!("Writing clone to {}", self.output_root.display());
        Ok(())
    }

    pub fn local_file(&self, local_path: &str) -> PathBuf {
        self.output_root.join(local_path)
    }

    /// Whether a local path already exists under the output root
    pub async fn local_exists(&self, local_path: &str) -> bool {
        tokio::fs::try_exists(self.local_file(local_path))
            .await
            .unwrap_or(false)
    }

    /// Write a file below the output root, creating parent directories as needed
    pub async fn write_file(&self, local_path: &str, contents: &[u8]) -> Result<u64> {
        let path = self.local_file(local_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        ::log::trace!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(contents.len() as u64)
    }

    /// Download a batch concurrently and write whatever arrived.
    ///
    /// Each URL gets one `DownloadRecord`. A failed download keeps its local path so the
    /// reference that points at it dangles instead of breaking the page.
    pub async fn download_all(&mut self, pending: Vec<PendingDownload>) -> Vec<DownloadedAsset> {
        if pending.is_empty() {
            return Vec::new();
        }
        ::log::debug!("Downloading {} assets", pending.len());

        let results = join_all(
            pending
                .iter()
                .map(|p| self.fetcher.fetch(&p.url, p.kind)),
        )
        .await;

        let mut downloaded = Vec::with_capacity(pending.len());
        for (download, result) in pending.into_iter().zip(results) {
            let asset = match result {
                Ok(outcome) => self.store(download, outcome).await,
                Err(e) => {
                    ::log::warn!("Failed to download {}: {}", download.url, e);
                    self.registry.record(DownloadRecord::failed(
                        download.url.to_string(),
                        download.local_path.clone(),
                    ));
                    DownloadedAsset {
                        url: download.url,
                        kind: download.kind,
                        local_path: download.local_path,
                        renamed: None,
                        body: None,
                    }
                }
            };
            downloaded.push(asset);
        }
        downloaded
    }

    async fn store(&mut self, download: PendingDownload, outcome: FetchOutcome) -> DownloadedAsset {
        let mut local_path = download.local_path;
        let mut renamed = None;

        if download.kind.is_binary()
            && path_extension(&local_path).as_deref() != Some(outcome.final_extension.as_str())
        {
            if let Some((old, new)) = self
                .registry
                .rename_extension(download.url.as_str(), &outcome.final_extension)
            {
                local_path = new.clone();
                renamed = Some((old, new));
            }
        }

        let body = match self.write_file(&local_path, &outcome.body).await {
            Ok(bytes) => {
                self.registry.record(DownloadRecord::succeeded(
                    download.url.to_string(),
                    local_path.clone(),
                    bytes,
                ));
                Some(outcome.body)
            }
            Err(e) => {
                ::log::warn!("Failed to write {}: {}", local_path, e);
                self.registry
                    .record(DownloadRecord::failed(download.url.to_string(), local_path.clone()));
                None
            }
        };

        DownloadedAsset {
            url: download.url,
            kind: download.kind,
            local_path,
            renamed,
            body,
        }
    }
}
