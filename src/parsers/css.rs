use crate::parsers::AssetKind;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `url(...)` with double, single or no quotes, optionally as the target of `@import`
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(@import\s+)?url\(\s*(?:"([^"]*)"|'([^']*)'|([^'"()\s][^()]*?))\s*\)"#)
        .expect("CSS url pattern should be valid")
});

/// `@import "file.css"` without a `url(...)` wrapper
static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:"([^"]+)"|'([^']+)')"#).expect("CSS import pattern should be valid")
});

/// A reference found in a stylesheet, as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    pub url: String,
    /// `Stylesheet` for `@import` targets, `Image` for everything else
    pub kind: AssetKind,
}

/// The capture among `groups` that took part in the match, trimmed
fn captured<'t>(caps: &Captures<'t>, groups: std::ops::RangeInclusive<usize>) -> Option<&'t str> {
    groups
        .filter_map(|i| caps.get(i))
        .next()
        .map(|m| m.as_str().trim())
}

fn url_kind(caps: &Captures<'_>) -> AssetKind {
    if caps.get(1).is_some() {
        AssetKind::Stylesheet
    } else {
        AssetKind::Image
    }
}

/// Every reference in a stylesheet, in source order, as written.
///
/// Covers `url(...)` (backgrounds, `@font-face` sources, `@import url(...)`) and bare
/// `@import "..."` strings. Nothing is resolved or filtered here.
pub fn extract_urls(css: &str) -> Vec<CssReference> {
    let mut urls = Vec::new();

    for caps in IMPORT_PATTERN.captures_iter(css) {
        if let Some(raw) = captured(&caps, 1..=2) {
            urls.push(CssReference {
                url: raw.to_string(),
                kind: AssetKind::Stylesheet,
            });
        }
    }

    for caps in URL_PATTERN.captures_iter(css) {
        if let Some(raw) = captured(&caps, 2..=4) {
            if !raw.is_empty() {
                urls.push(CssReference {
                    url: raw.to_string(),
                    kind: url_kind(&caps),
                });
            }
        }
    }

    ::log::trace!("CSS scan found {} references", urls.len());
    urls
}

/// Rewrite references through `replace`, which gets each reference with its kind.
///
/// Returning `None` leaves the original text untouched, so unknown syntax survives
/// as-is.
pub fn rewrite_urls<F>(css: &str, mut replace: F) -> String
where
    F: FnMut(&str, AssetKind) -> Option<String>,
{
    let imports_done = IMPORT_PATTERN.replace_all(css, |caps: &Captures| {
        match captured(caps, 1..=2).and_then(|raw| replace(raw, AssetKind::Stylesheet)) {
            Some(local) => format!("@import '{}'", local),
            None => caps[0].to_string(),
        }
    });

    URL_PATTERN
        .replace_all(&imports_done, |caps: &Captures| {
            let kind = url_kind(caps);
            match captured(caps, 2..=4).and_then(|raw| replace(raw, kind)) {
                Some(local) => {
                    let prefix = caps.get(1).map_or("", |m| m.as_str());
                    format!("{}url('{}')", prefix, local)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
