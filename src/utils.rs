use sha2::{Digest, Sha256};
use url::Url;

/// Replace anything outside `[A-Za-z0-9.-]` with an underscore and cap the length
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.len() > max_len {
        sanitized[..max_len].to_string()
    } else {
        sanitized
    }
}

/// First 8 hex characters of the SHA-256 of the URL
pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Drop the query string and fragment from a raw reference
pub fn strip_query(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

/// Lower-cased extension of the last path segment, if it has one
pub fn path_extension(path: &str) -> Option<String> {
    let last = strip_query(path).rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Local HTML file name for a non-seed page.
///
/// `/`, empty and `/index.html` map to `index.html`; everything else becomes a slug
/// of the path with slashes turned into underscores.
pub fn page_file_name(url: &Url) -> String {
    let path = url.path();
    if path == "/" || path.is_empty() || path == "/index.html" {
        return "index.html".to_string();
    }

    let trimmed = path.trim_matches('/');
    let decoded = urlencoding::decode(trimmed)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| trimmed.to_string());

    let slug: String = decoded
        .replace('/', "_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let slug = if slug.is_empty() { "page".to_string() } else { slug };
    if slug.ends_with(".html") {
        slug
    } else {
        format!("{}.html", slug)
    }
}

/// `../` repeated once per directory in `local_path`, or `./` at the root.
///
/// Used to address the output root from a file that lives somewhere inside it.
pub fn root_prefix(local_path: &str) -> String {
    let depth = local_path.matches('/').count();
    if depth == 0 {
        "./".to_string()
    } else {
        "../".repeat(depth)
    }
}

/// Change the extension of the last segment of a local path
pub fn replace_extension(local_path: &str, extension: &str) -> String {
    let (dir, file) = match local_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, local_path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(dir) => format!("{}/{}.{}", dir, stem, extension),
        None => format!("{}.{}", stem, extension),
    }
}
