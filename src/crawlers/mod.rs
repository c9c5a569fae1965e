pub mod context;
pub mod page;
pub mod site;

pub use context::CloneContext;

use url::Url;

/// One page of the run, with its output file name fixed before anything is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    pub url: Url,
    pub is_seed: bool,
    pub file_name: String,
}
