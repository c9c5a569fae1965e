//! Reference normalization and bucketing.
//!
//! A [`ReferenceResolver`] is bound to one document (an HTML page, or a stylesheet for
//! the references inside it) and turns the raw strings found in that document into
//! absolute URLs with a target bucket and a suggested local path.

use crate::parsers::AssetKind;
use crate::utils::{path_extension, sanitize_filename, strip_query};
use url::Url;

const NEXT_STATIC_MARKER: &str = "/_next/static/";
const NEXT_CHUNKS_MARKER: &str = "/_next/static/chunks/";
const NEXT_IMAGE_MARKER: &str = "/_next/image";

/// Schemes and prefixes that never point at something fetchable
const NON_FETCHABLE_PREFIXES: [&str; 7] = [
    "data:",
    "javascript:",
    "mailto:",
    "tel:",
    "about:",
    "blob:",
    "#",
];

/// Target bucket of an asset: decides where it lands in the output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Image,
    Css,
    Js,
    Font,
    /// Anything under `/_next/static/` other than chunks, mirrored as-is
    NextStatic,
}

impl Bucket {
    fn for_kind(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Stylesheet => Bucket::Css,
            AssetKind::Script => Bucket::Js,
            AssetKind::Font => Bucket::Font,
            AssetKind::Image | AssetKind::Page => Bucket::Image,
        }
    }
}

/// A reference after normalization and classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// The reference as it appeared in the source
    pub original: String,
    /// The URL that is actually fetched
    pub absolute_url: Url,
    pub bucket: Bucket,
    pub kind: AssetKind,
    /// Path relative to the output root. Mirrored paths are final; flat paths are a
    /// candidate the allocator makes unique.
    pub suggested_local_path: String,
    /// Whether the path mirrors the source layout (`_next/static/...`)
    pub mirrored: bool,
}

impl ResolvedReference {
    /// Directory part of the suggested path
    pub fn directory(&self) -> &str {
        self.suggested_local_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// File stem and extension suggested for a flat path
    pub fn candidate_name(&self) -> (String, String) {
        let file = self
            .suggested_local_path
            .rsplit('/')
            .next()
            .unwrap_or_default();
        match file.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.to_string()),
            None => (file.to_string(), self.kind.default_extension().to_string()),
        }
    }

    /// Whether this is a bundler chunk script
    pub fn is_chunk(&self) -> bool {
        self.mirrored && self.suggested_local_path.starts_with("_next/static/chunks/")
    }
}

/// Whether a raw reference could ever be downloaded
pub fn is_fetchable(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    !NON_FETCHABLE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Resolves references found in one document
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    document_url: Url,
    base_url: Url,
}

impl ReferenceResolver {
    pub fn new(document_url: Url) -> Self {
        Self {
            base_url: document_url.clone(),
            document_url,
        }
    }

    /// URL relative references are joined with
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Use the document's `<base href>` for relative references
    pub fn with_base_href(mut self, href: Option<&str>) -> Self {
        if let Some(base) = href.and_then(|h| self.document_url.join(h).ok()) {
            ::log::debug!("Using <base href> {} for {}", base, self.document_url);
            self.base_url = base;
        }
        self
    }

    /// Absolute URL for a raw reference.
    ///
    /// Absolute references are kept, root-relative and protocol-relative ones take the
    /// base origin or scheme, and everything else is joined with the base URL.
    pub fn absolutize(&self, raw: &str) -> Option<Url> {
        if !is_fetchable(raw) {
            return None;
        }
        let url = self.base_url.join(raw.trim()).ok()?;
        match url.scheme() {
            "http" | "https" => Some(url),
            _ => None,
        }
    }

    /// Resolve and classify a raw reference. `hint` is the kind implied by where the
    /// reference was found.
    pub fn resolve(&self, raw: &str, hint: AssetKind) -> Option<ResolvedReference> {
        let url = self.absolutize(raw)?;

        if let Some(inner) = next_image_target(&url) {
            if let Some(mut resolved) = self.resolve(&inner, AssetKind::Image) {
                ::log::debug!(
                    "Unwrapped image optimizer URL {} -> {}",
                    url,
                    resolved.absolute_url
                );
                resolved.original = raw.to_string();
                return Some(resolved);
            }
        }

        Some(classify(raw, url, hint))
    }
}

/// The `url=` target of a `/_next/image` optimizer URL
fn next_image_target(url: &Url) -> Option<String> {
    if !url.path().contains(NEXT_IMAGE_MARKER) {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn classify(raw: &str, url: Url, hint: AssetKind) -> ResolvedReference {
    let path = url.path().to_string();

    if let Some(idx) = path.find(NEXT_CHUNKS_MARKER) {
        if let Some(sub) = mirrored_subpath(&path[idx + NEXT_STATIC_MARKER.len()..]) {
            let kind = match AssetKind::from_extension(&path) {
                Some(AssetKind::Stylesheet) => AssetKind::Stylesheet,
                _ => AssetKind::Script,
            };
            return ResolvedReference {
                original: raw.to_string(),
                absolute_url: url,
                bucket: Bucket::Js,
                kind,
                suggested_local_path: format!("_next/static/{}", sub),
                mirrored: true,
            };
        }
    }

    if let Some(idx) = path.find(NEXT_STATIC_MARKER) {
        if let Some(sub) = mirrored_subpath(&path[idx + NEXT_STATIC_MARKER.len()..]) {
            let kind = match AssetKind::from_extension(&path) {
                Some(AssetKind::Page) | None => hint,
                Some(kind) => kind,
            };
            return ResolvedReference {
                original: raw.to_string(),
                absolute_url: url,
                bucket: Bucket::NextStatic,
                kind,
                suggested_local_path: format!("_next/static/{}", sub),
                mirrored: true,
            };
        }
    }

    let kind = hint.refine(&path);
    let bucket = Bucket::for_kind(kind);

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(last_segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| last_segment.to_string());
    let stem = match decoded.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => decoded.clone(),
    };
    // Keep the URL's extension only when it agrees with the kind
    let extension = match path_extension(&path) {
        Some(ext) if AssetKind::from_extension(&path) == Some(kind) => ext,
        _ => kind.default_extension().to_string(),
    };

    ResolvedReference {
        original: raw.to_string(),
        absolute_url: url,
        bucket,
        kind,
        suggested_local_path: format!(
            "{}/{}.{}",
            kind.directory(),
            sanitize_filename(&stem, 50),
            extension
        ),
        mirrored: false,
    }
}

/// Percent-decoded sub-path with traversal segments and filesystem-hostile
/// characters removed. `None` when nothing usable is left.
pub fn mirrored_subpath(encoded: &str) -> Option<String> {
    let segments: Vec<String> = encoded
        .split('/')
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .filter(|segment| !segment.is_empty() && segment != "." && segment != "..")
        .map(|segment| {
            segment
                .chars()
                .map(|c| match c {
                    '<' | '>' | ':' | '"' | '\\' | '|' | '?' | '*' => '_',
                    c if c.is_control() => '_',
                    c => c,
                })
                .collect()
        })
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// One candidate of a `srcset` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetEntry {
    pub url: String,
    /// Width or density descriptor, possibly empty
    pub descriptor: String,
}

/// Split a `srcset` value into its `url descriptor` candidates.
///
/// URLs run up to the next whitespace, so commas inside a URL (as some image CDNs
/// use) are kept.
pub fn parse_srcset(value: &str) -> Vec<SrcsetEntry> {
    let mut entries = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let mut url = &rest[..url_end];
        rest = &rest[url_end..];

        let mut descriptor = "";
        if url.ends_with(',') {
            url = url.trim_end_matches(',');
        } else {
            let desc_end = rest.find(',').unwrap_or(rest.len());
            descriptor = rest[..desc_end].trim();
            rest = &rest[desc_end..];
        }

        if !url.is_empty() {
            entries.push(SrcsetEntry {
                url: url.to_string(),
                descriptor: descriptor.to_string(),
            });
        }
    }

    entries
}

/// Find the local path for a `srcset` URL among the page's replacements.
///
/// Tried in order: exact match, match with query strings removed, and finally
/// substring containment either way. The last rule is approximate and can pick an
/// unrelated image that shares a path prefix.
pub fn match_replacement<'a>(url: &str, replacements: &'a [(String, String)]) -> Option<&'a str> {
    if let Some((_, local)) = replacements.iter().find(|(orig, _)| orig == url) {
        return Some(local.as_str());
    }

    let stripped = strip_query(url);
    if let Some((_, local)) = replacements
        .iter()
        .find(|(orig, _)| strip_query(orig) == stripped)
    {
        return Some(local.as_str());
    }

    if stripped.is_empty() {
        return None;
    }
    replacements
        .iter()
        .find(|(orig, _)| {
            let orig_stripped = strip_query(orig);
            !orig_stripped.is_empty() && (orig.contains(stripped) || url.contains(orig_stripped))
        })
        .map(|(_, local)| local.as_str())
}

/// Rewrite every candidate of a `srcset` value to its local path.
///
/// `replacements` maps references as written in the page to local paths. Candidates
/// without a match and `data:` candidates are kept verbatim.
pub fn rewrite_srcset(value: &str, replacements: &[(String, String)]) -> String {
    let entries = parse_srcset(value);
    if entries.is_empty() {
        return value.to_string();
    }

    entries
        .iter()
        .map(|entry| {
            let target = if is_fetchable(&entry.url) {
                match_replacement(&entry.url, replacements).unwrap_or(&entry.url)
            } else {
                &entry.url
            };
            if entry.descriptor.is_empty() {
                target.to_string()
            } else {
                format!("{} {}", target, entry.descriptor)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
