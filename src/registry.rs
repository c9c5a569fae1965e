use crate::allocator::FilenameAllocator;
use crate::parsers::AssetKind;
use crate::resolver::ResolvedReference;
use crate::results::DownloadRecord;
use std::collections::HashMap;
use url::Url;

/// An asset that has a local path but has not been fetched yet
#[derive(Debug, Clone)]
pub struct PendingDownload {
    pub url: Url,
    pub local_path: String,
    pub kind: AssetKind,
}

/// Run-wide map from remote URL to local path.
///
/// Every distinct URL gets exactly one local path and at most one download. Later
/// references to the same URL, from the same page or any other, reuse the first path.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    allocator: FilenameAllocator,
    paths: HashMap<String, String>,
    owners: HashMap<String, String>,
    records: Vec<DownloadRecord>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local path for a resolved reference, plus the download to issue if this is the
    /// first time the URL is seen.
    pub fn claim(&mut self, resolved: &ResolvedReference) -> (String, Option<PendingDownload>) {
        let url = resolved.absolute_url.as_str();
        if let Some(existing) = self.paths.get(url) {
            return (existing.clone(), None);
        }

        let local_path = if resolved.mirrored {
            let path = resolved.suggested_local_path.clone();
            if !self.allocator.claim(&path) {
                // Another URL (usually a different query string) already mirrors here
                ::log::debug!("{} shares mirrored path {}", url, path);
                self.paths.insert(url.to_string(), path.clone());
                return (path, None);
            }
            path
        } else {
            let (stem, ext) = resolved.candidate_name();
            let dir = resolved.directory();
            let name = self.allocator.allocate(&stem, &ext, dir, url);
            if dir.is_empty() {
                name
            } else {
                format!("{}/{}", dir, name)
            }
        };

        self.paths.insert(url.to_string(), local_path.clone());
        self.owners.insert(local_path.clone(), url.to_string());

        let pending = PendingDownload {
            url: resolved.absolute_url.clone(),
            local_path: local_path.clone(),
            kind: resolved.kind,
        };
        (local_path, Some(pending))
    }

    /// Current local path of a remote URL
    pub fn local_path(&self, url: &str) -> Option<&str> {
        self.paths.get(url).map(|p| p.as_str())
    }

    /// Change the extension of an already claimed asset (after content sniffing).
    /// Returns `(old, new)` when the path actually changed.
    pub fn rename_extension(&mut self, url: &str, extension: &str) -> Option<(String, String)> {
        let old = self.paths.get(url)?.clone();
        let new = self.allocator.rename_extension(&old, extension);
        if new == old {
            return None;
        }

        for path in self.paths.values_mut() {
            if *path == old {
                *path = new.clone();
            }
        }
        if let Some(owner) = self.owners.remove(&old) {
            self.owners.insert(new.clone(), owner);
        }
        ::log::debug!("Renamed {} -> {} after content sniffing", old, new);
        Some((old, new))
    }

    pub fn record(&mut self, record: DownloadRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[DownloadRecord] {
        &self.records
    }

    /// URLs of every claimed bundler chunk
    pub fn chunk_urls(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(|(_, path)| path.starts_with("_next/static/chunks/"))
            .map(|(url, _)| url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ReferenceResolver;

    fn resolve(page: &str, raw: &str, kind: AssetKind) -> ResolvedReference {
        ReferenceResolver::new(Url::parse(page).unwrap())
            .resolve(raw, kind)
            .unwrap()
    }

    #[test]
    fn test_same_url_is_claimed_once() {
        let mut registry = AssetRegistry::new();
        let a = resolve("https://example.com/", "/img/logo.png", AssetKind::Image);
        let b = resolve("https://example.com/about/", "../img/logo.png", AssetKind::Image);

        let (first, pending) = registry.claim(&a);
        assert!(pending.is_some());
        let (second, pending) = registry.claim(&b);
        assert!(pending.is_none());
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_urls_get_distinct_paths() {
        let mut registry = AssetRegistry::new();
        let a = resolve("https://example.com/", "/alpha/image.png", AssetKind::Image);
        let b = resolve("https://example.com/", "/beta/image.png", AssetKind::Image);
        let (pa, _) = registry.claim(&a);
        let (pb, _) = registry.claim(&b);
        assert_ne!(pa, pb);
        assert!(pa.starts_with("images/alpha_"), "got {}", pa);
        assert!(pb.starts_with("images/beta_"), "got {}", pb);

        // Short parent segments are generic too, so both fall back to `asset`
        let c = resolve("https://example.com/", "/a/image.png", AssetKind::Image);
        let d = resolve("https://example.com/", "/b/image.png", AssetKind::Image);
        let (pc, _) = registry.claim(&c);
        let (pd, _) = registry.claim(&d);
        assert_ne!(pc, pd);
        assert!(pc.starts_with("images/asset_"), "got {}", pc);
        assert!(pd.starts_with("images/asset_"), "got {}", pd);
    }

    #[test]
    fn test_mirrored_paths_dedup_across_query_strings() {
        let mut registry = AssetRegistry::new();
        let a = resolve("https://example.com/", "/_next/static/css/app.css?v=1", AssetKind::Stylesheet);
        let b = resolve("https://example.com/", "/_next/static/css/app.css?v=2", AssetKind::Stylesheet);
        let (pa, first) = registry.claim(&a);
        let (pb, second) = registry.claim(&b);
        assert_eq!(pa, "_next/static/css/app.css");
        assert_eq!(pa, pb);
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_rename_updates_lookups() {
        let mut registry = AssetRegistry::new();
        let a = resolve("https://example.com/", "/photos/cat.png", AssetKind::Image);
        let (old, _) = registry.claim(&a);
        let (from, to) = registry
            .rename_extension(a.absolute_url.as_str(), "jpg")
            .unwrap();
        assert_eq!(from, old);
        assert!(to.ends_with(".jpg"));
        assert_eq!(registry.local_path(a.absolute_url.as_str()), Some(to.as_str()));
        assert!(registry.rename_extension(a.absolute_url.as_str(), "jpg").is_none());
    }
}
