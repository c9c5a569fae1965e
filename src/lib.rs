// Re-export modules
pub mod allocator;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod parsers;
pub mod registry;
pub mod resolver;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::CloneConfig;
pub use error::{CloneError, Result};
pub use results::CloneReport;

use crawlers::CloneContext;
use fetcher::{HttpGet, ReqwestClient};
use std::path::{Path, PathBuf};

/// Main builder for cloning a website into a local directory
pub struct SiteCloner {
    config: CloneConfig,
}

impl SiteCloner {
    /// Create a new SiteCloner for the given seed URL with default settings
    pub fn new(seed_url: &str) -> Self {
        Self {
            config: CloneConfig::new(seed_url),
        }
    }

    /// Set the maximum number of pages, seed included
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the output directory (defaults to ./cloned_<domain>)
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    /// Replace the configuration. A config without a seed keeps the current one.
    pub fn with_config(mut self, mut config: CloneConfig) -> Self {
        if config.seed_url.is_empty() {
            config.seed_url = std::mem::take(&mut self.config.seed_url);
        }
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = CloneConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self> {
        let config = CloneConfig::from_json(config_str)?;
        Ok(self.with_config(config))
    }

    pub fn config_mut(&mut self) -> &mut CloneConfig {
        &mut self.config
    }

    /// Run the clone over HTTP
    pub async fn run(self) -> Result<CloneReport> {
        let mut config = self.config;
        config.apply_env();
        // Validate before building the client so a bad seed fails fast
        config.seed()?;
        let http = ReqwestClient::new(&config.user_agent)?;
        Self { config }.run_with(http).await
    }

    /// Run the clone through a caller-supplied HTTP implementation
    pub async fn run_with<H: HttpGet>(self, http: H) -> Result<CloneReport> {
        let seed = self.config.seed()?;
        let mut ctx = CloneContext::new(self.config, seed, http);
        crawlers::site::crawl(&mut ctx).await
    }
}

/// Clone `seed_url` and return the status message.
///
/// `output_dir` defaults to `./cloned_<domain>`. At most `max_pages` pages are written,
/// the seed included.
pub async fn clone_site(
    seed_url: &str,
    output_dir: Option<&Path>,
    max_pages: usize,
) -> Result<String> {
    let mut cloner = SiteCloner::new(seed_url).with_max_pages(max_pages);
    if let Some(dir) = output_dir {
        cloner = cloner.with_output_dir(dir);
    }
    let report = cloner.run().await?;
    Ok(report.to_string())
}
