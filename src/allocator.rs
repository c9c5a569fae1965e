use crate::utils::{replace_extension, sanitize_filename, url_hash};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Names that say nothing about the asset
const GENERIC_NAMES: [&str; 9] = [
    "image",
    "img",
    "index",
    "default",
    "file",
    "download",
    "bg_image",
    "placeholder",
    "asset",
];

/// Base used when nothing better can be derived
const FALLBACK_BASE: &str = "asset";

/// Whether a candidate base name is too generic to keep
pub fn is_generic(name: &str) -> bool {
    name.len() < 3 || GENERIC_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

/// Derive a readable base name from the URL when the candidate is generic.
///
/// An image-proxy `url=` parameter wins, then the second-to-last path segment (the
/// last is often something like `image` or `index`), then the last one.
pub fn meaningful_base(candidate: &str, source_url: &str) -> String {
    if !is_generic(candidate) {
        return sanitize_filename(candidate, 50);
    }

    let derived = Url::parse(source_url).ok().and_then(|url| {
        let from_query = url
            .query_pairs()
            .find(|(key, _)| key == "url")
            .and_then(|(_, value)| {
                value
                    .split(['?', '#'])
                    .next()
                    .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
                    .map(|s| s.to_string())
            });

        from_query.or_else(|| {
            let segments: Vec<&str> = url
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).collect())
                .unwrap_or_default();
            let pick = if segments.len() >= 2 {
                segments[segments.len() - 2]
            } else {
                segments.last().copied()?
            };
            Some(
                urlencoding::decode(pick)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| pick.to_string()),
            )
        })
    });

    let base = derived
        .map(|name| {
            let stem = match name.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => name,
            };
            sanitize_filename(&stem, 20)
        })
        .unwrap_or_default();

    if is_generic(&base) {
        FALLBACK_BASE.to_string()
    } else {
        base
    }
}

/// Hands out collision-free file names within the output tree.
///
/// Names are tracked in memory per directory instead of probing the filesystem, so a
/// run is deterministic for a given sequence of allocations.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    taken: HashMap<String, HashSet<String>>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique file name in `target_dir`.
    ///
    /// The result is `<base>_<urlhash>.<ext>`, or `<base>_<urlhash>_<n>.<ext>` when that
    /// name is already taken.
    pub fn allocate(
        &mut self,
        candidate_base: &str,
        extension: &str,
        target_dir: &str,
        source_url: &str,
    ) -> String {
        let base = meaningful_base(candidate_base, source_url);
        let base_with_hash = format!("{}_{}", base, url_hash(source_url));

        let names = self.taken.entry(target_dir.to_string()).or_default();
        let mut file_name = format!("{}.{}", base_with_hash, extension);
        let mut counter = 1;
        while names.contains(&file_name) {
            file_name = format!("{}_{}.{}", base_with_hash, counter, extension);
            counter += 1;
        }

        names.insert(file_name.clone());
        ::log::trace!("Allocated {}/{} for {}", target_dir, file_name, source_url);
        file_name
    }

    /// Claim an exact path (used for mirrored paths). Returns false if it was taken.
    pub fn claim(&mut self, local_path: &str) -> bool {
        let (dir, name) = split_path(local_path);
        self.taken
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string())
    }

    pub fn is_taken(&self, local_path: &str) -> bool {
        let (dir, name) = split_path(local_path);
        self.taken
            .get(dir)
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }

    /// Move a claimed path to a new extension, keeping it unique.
    /// Returns the new path (unchanged if the extension already matched).
    pub fn rename_extension(&mut self, local_path: &str, extension: &str) -> String {
        let renamed = replace_extension(local_path, extension);
        if renamed == local_path {
            return renamed;
        }

        let (dir, name) = split_path(local_path);
        if let Some(names) = self.taken.get_mut(dir) {
            names.remove(name);
        }

        let mut candidate = renamed.clone();
        let mut counter = 1;
        while self.is_taken(&candidate) {
            let stem = replace_extension(&renamed, "");
            let stem = stem.trim_end_matches('.');
            candidate = format!("{}_{}.{}", stem, counter, extension);
            counter += 1;
        }

        self.claim(&candidate);
        candidate
    }
}

fn split_path(local_path: &str) -> (&str, &str) {
    local_path.rsplit_once('/').unwrap_or(("", local_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_names() {
        assert!(is_generic(""));
        assert!(is_generic("ab"));
        assert!(is_generic("Image"));
        assert!(is_generic("index"));
        assert!(!is_generic("hero-banner"));
    }

    #[test]
    fn test_keeps_meaningful_candidate() {
        let mut allocator = FilenameAllocator::new();
        let url = "https://example.com/img/hero.png";
        let name = allocator.allocate("hero", "png", "images", url);
        assert_eq!(name, format!("hero_{}.png", url_hash(url)));
    }

    #[test]
    fn test_generic_candidate_uses_second_to_last_segment() {
        let mut allocator = FilenameAllocator::new();
        let url = "https://cdn.example.com/products/blue-shoe/image.jpg";
        let name = allocator.allocate("image", "jpg", "images", url);
        assert_eq!(name, format!("blue-shoe_{}.jpg", url_hash(url)));
    }

    #[test]
    fn test_generic_candidate_uses_url_query_parameter() {
        let mut allocator = FilenameAllocator::new();
        let url = "https://example.com/_next/image?url=%2Fuploads%2Fteam-photo.png&w=640";
        let name = allocator.allocate("image", "png", "images", url);
        assert_eq!(name, format!("team-photo_{}.png", url_hash(url)));
    }

    #[test]
    fn test_falls_back_to_hash_name() {
        let mut allocator = FilenameAllocator::new();
        let url = "https://example.com/img";
        let name = allocator.allocate("", "jpg", "images", url);
        assert_eq!(name, format!("asset_{}.jpg", url_hash(url)));
    }

    #[test]
    fn test_counter_on_collision() {
        let mut allocator = FilenameAllocator::new();
        let url = "https://example.com/a/logo.svg";
        let first = allocator.allocate("logo", "svg", "images", url);
        let second = allocator.allocate("logo", "svg", "images", url);
        let third = allocator.allocate("logo", "svg", "images", url);
        let hash = url_hash(url);
        assert_eq!(first, format!("logo_{}.svg", hash));
        assert_eq!(second, format!("logo_{}_1.svg", hash));
        assert_eq!(third, format!("logo_{}_2.svg", hash));

        // Directories are independent
        let other_dir = allocator.allocate("logo", "svg", "css", url);
        assert_eq!(other_dir, first);
    }

    #[test]
    fn test_claim_and_rename() {
        let mut allocator = FilenameAllocator::new();
        assert!(allocator.claim("_next/static/media/logo.png"));
        assert!(!allocator.claim("_next/static/media/logo.png"));

        let renamed = allocator.rename_extension("_next/static/media/logo.png", "jpg");
        assert_eq!(renamed, "_next/static/media/logo.jpg");
        assert!(allocator.is_taken("_next/static/media/logo.jpg"));
        assert!(!allocator.is_taken("_next/static/media/logo.png"));

        // Renaming onto an existing name gets a counter
        assert!(allocator.claim("images/a.png"));
        assert!(allocator.claim("images/a.jpg"));
        assert_eq!(allocator.rename_extension("images/a.png", "jpg"), "images/a_1.jpg");
    }
}
