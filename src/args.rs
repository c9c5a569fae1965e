use clap::Parser;
use site_cloner::{Result, SiteCloner};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "site-cloner")]
#[command(about = "Clone a website, its assets and its bundler chunks into a local directory")]
#[command(version)]
pub struct Args {
    /// URL of the page to start from
    pub url: String,

    /// Maximum number of pages to clone, seed included
    pub max_pages: Option<usize>,

    /// Output directory (defaults to ./cloned_<domain>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file; flags given on the command line take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for page requests
    #[arg(long)]
    pub page_timeout: Option<u64>,

    /// Timeout in seconds for asset requests
    #[arg(long)]
    pub asset_timeout: Option<u64>,

    /// Don't follow chunk references inside downloaded scripts
    #[arg(long)]
    pub no_chunks: bool,

    /// Leave links between cloned pages pointing at the live site
    #[arg(long)]
    pub no_link_rewrite: bool,
}

impl Args {
    /// Build a cloner from the config file (if any) with command-line overrides on top
    pub fn into_cloner(self) -> Result<SiteCloner> {
        let mut cloner = SiteCloner::new(&self.url);
        if let Some(path) = &self.config {
            cloner = cloner.with_config_file(path)?;
            // The URL argument always wins over a seed in the file
            cloner.config_mut().seed_url = self.url.clone();
        }

        let config = cloner.config_mut();
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(output) = self.output {
            config.output_dir = Some(output);
        }
        if let Some(secs) = self.page_timeout {
            config.page_timeout_secs = secs;
        }
        if let Some(secs) = self.asset_timeout {
            config.asset_timeout_secs = secs;
        }
        if self.no_chunks {
            config.follow_chunks = false;
        }
        if self.no_link_rewrite {
            config.rewrite_links = false;
        }

        Ok(cloner)
    }
}
