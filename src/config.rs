use crate::error::{CloneError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable that replaces the configured user agent
pub const USER_AGENT_ENV: &str = "SITE_CLONER_USER_AGENT";

/// Configuration for one cloning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneConfig {
    /// URL of the page the clone starts from
    #[serde(default)]
    pub seed_url: String,

    /// Maximum number of pages to materialize, seed included
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Where the cloned tree is written (defaults to ./cloned_<domain>)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Timeout for page HTML requests
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Timeout for individual asset requests
    #[serde(default = "default_asset_timeout_secs")]
    pub asset_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Follow bundler chunk references found inside downloaded scripts
    #[serde(default = "default_true")]
    pub follow_chunks: bool,

    /// Point anchors at the local copies of other cloned pages
    #[serde(default = "default_true")]
    pub rewrite_links: bool,

    /// Regex patterns a link must match to become a page (empty means any)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns that keep a link from becoming a page
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_max_pages() -> usize {
    5
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_asset_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

fn default_true() -> bool {
    true
}

impl CloneConfig {
    /// Create a new configuration with default values
    pub fn new(seed_url: &str) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            max_pages: default_max_pages(),
            output_dir: None,
            page_timeout_secs: default_page_timeout_secs(),
            asset_timeout_secs: default_asset_timeout_secs(),
            user_agent: default_user_agent(),
            follow_chunks: true,
            rewrite_links: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Apply overrides taken from the environment
    pub fn apply_env(&mut self) {
        if let Ok(user_agent) = std::env::var(USER_AGENT_ENV) {
            if !user_agent.is_empty() {
                self.user_agent = user_agent;
            }
        }
    }

    /// Parse and validate the seed URL. Only http(s) seeds can be cloned.
    pub fn seed(&self) -> Result<Url> {
        let url = Url::parse(&self.seed_url)
            .map_err(|e| CloneError::InvalidSeedUrl(self.seed_url.clone(), e.to_string()))?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            scheme => Err(CloneError::InvalidSeedUrl(
                self.seed_url.clone(),
                format!("unsupported scheme '{}'", scheme),
            )),
        }
    }

    /// Directory the clone is written to
    pub fn output_root(&self, seed: &Url) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from(format!("./{}", default_output_name(seed))),
        }
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.asset_timeout_secs)
    }

    /// The seed always counts toward the page limit, so anything below one is raised to one
    pub fn page_limit(&self) -> usize {
        self.max_pages.max(1)
    }
}

/// `cloned_<host>` with a leading `www.` dropped and dots replaced by underscores
pub fn default_output_name(seed: &Url) -> String {
    let host = seed.host_str().unwrap_or("site");
    let host = host.strip_prefix("www.").unwrap_or(host);
    let sanitized: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("cloned_{}", sanitized)
}
