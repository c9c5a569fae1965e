use regex::Regex;
use url::Url;

/// Configuration for filtering links discovered on the seed page
#[derive(Debug, Clone)]
pub struct UrlFilterConfig {
    /// Host pages must live on, compared with any leading `www.` removed.
    /// `None` accepts any host.
    pub required_host: Option<String>,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    pub exclude_patterns: Vec<String>,
}

/// Links to these are assets, not pages
const ASSET_EXTENSION_PATTERN: &str =
    r"(?i)\.(jpe?g|png|gif|webp|avif|svg|ico|css|js|mjs|woff2?|ttf|otf|eot|pdf|zip|mp4|webm|mp3|json|xml)$";

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            required_host: None,
            include_patterns: Vec::new(),
            exclude_patterns: vec![ASSET_EXTENSION_PATTERN.to_string()],
        }
    }
}

impl UrlFilterConfig {
    /// Restrict pages to the seed's host
    pub fn for_seed(seed: &Url) -> Self {
        Self {
            required_host: seed.host_str().map(|h| h.to_string()),
            ..Self::default()
        }
    }
}

/// Decides which links found on the seed page are cloned as pages
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Filter restricted to the seed's host with the default exclusions
    pub fn for_seed(seed: &Url) -> Result<Self, regex::Error> {
        Self::new(UrlFilterConfig::for_seed(seed))
    }

    /// Determine if a URL may become a page of the clone
    pub fn should_clone(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_host_scope(url) {
            return false;
        }

        // Exclusions take precedence; match on the path so query strings don't hide them
        let path = url.path();
        if self.exclude_regexes.iter().any(|r| r.is_match(path)) {
            return false;
        }

        if !self.include_regexes.is_empty()
            && !self.include_regexes.iter().any(|r| r.is_match(url.as_str()))
        {
            return false;
        }

        true
    }

    fn is_in_host_scope(&self, url: &Url) -> bool {
        match (&self.config.required_host, url.host_str()) {
            (None, Some(_)) => true,
            (Some(required), Some(host)) => same_site(required, host),
            (_, None) => false,
        }
    }

    /// Create a normalized version of the URL (e.g., removing fragments)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }

    /// Resolve raw anchors against `base` (the page URL, or its `<base href>`), keep
    /// acceptable ones, and drop duplicates (keeping first-seen order) and the page itself
    pub fn select_links(&self, page: &Url, base: &Url, hrefs: &[String]) -> Vec<Url> {
        let page_key = self.normalize_url(page);
        let mut seen = std::collections::HashSet::new();
        let mut selected = Vec::new();

        for href in hrefs {
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let lower = href.to_ascii_lowercase();
            if lower.starts_with("mailto:") || lower.starts_with("tel:") || lower.starts_with("javascript:") {
                continue;
            }

            let Ok(resolved) = base.join(href) else {
                ::log::trace!("Unparseable link: {}", href);
                continue;
            };
            if !self.should_clone(&resolved) {
                ::log::debug!("URL filter rejected: {}", resolved);
                continue;
            }

            let normalized = self.normalize_url(&resolved);
            if normalized == page_key {
                continue;
            }
            if seen.insert(normalized.as_str().to_string()) {
                ::log::debug!("URL filter accepted: {}", normalized);
                selected.push(normalized);
            }
        }

        selected
    }
}

/// Hosts compare equal once a leading `www.` is dropped from each
pub fn same_site(a: &str, b: &str) -> bool {
    let strip = |h: &str| h.strip_prefix("www.").unwrap_or(h).to_ascii_lowercase();
    strip(a) == strip(b)
}
