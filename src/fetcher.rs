use crate::error::{CloneError, Result};
use crate::parsers::AssetKind;
use crate::utils::path_extension;
use reqwest::header::CONTENT_TYPE;
use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// `Accept-Language` sent with page requests
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// A single GET request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

/// Status, content type, and body of a response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// The HTTP seam. Everything the cloner downloads goes through one of these.
pub trait HttpGet: Send + Sync {
    fn get(&self, request: FetchRequest) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// `HttpGet` backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpGet for ReqwestClient {
    async fn get(&self, request: FetchRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?
            .to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

fn map_reqwest_error(url: &Url, error: reqwest::Error) -> CloneError {
    if error.is_timeout() {
        CloneError::Timeout(url.to_string())
    } else {
        CloneError::Http(error)
    }
}

/// A successful download
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub body: Vec<u8>,
    /// Extension the file should be saved with
    pub final_extension: String,
    pub content_type: Option<String>,
}

impl FetchOutcome {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Downloads pages and assets with browser-like headers and per-kind timeouts
#[derive(Debug, Clone)]
pub struct Fetcher<H> {
    http: H,
    page_timeout: Duration,
    asset_timeout: Duration,
}

impl<H: HttpGet> Fetcher<H> {
    pub fn new(http: H, page_timeout: Duration, asset_timeout: Duration) -> Self {
        Self {
            http,
            page_timeout,
            asset_timeout,
        }
    }

    /// GET `url` as a resource of `kind`.
    ///
    /// Network errors, timeouts and non-2xx statuses come back as errors for the caller
    /// to log and move past.
    pub async fn fetch(&self, url: &Url, kind: AssetKind) -> Result<FetchOutcome> {
        let mut headers = vec![("Accept", kind.accept_header().to_string())];
        let timeout = if kind == AssetKind::Page {
            headers.push(("Accept-Language", ACCEPT_LANGUAGE.to_string()));
            self.page_timeout
        } else {
            self.asset_timeout
        };

        ::log::debug!("GET {} ({:?})", url, kind);
        let response = self
            .http
            .get(FetchRequest {
                url: url.clone(),
                headers,
                timeout,
            })
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(CloneError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let final_extension = decide_extension(
            url,
            kind,
            &response.body,
            response.content_type.as_deref(),
        );
        ::log::trace!(
            "{} -> {} bytes, extension {}",
            url,
            response.body.len(),
            final_extension
        );

        Ok(FetchOutcome {
            body: response.body,
            final_extension,
            content_type: response.content_type,
        })
    }
}

/// Extension implied by the leading bytes of an image
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return Some("jpg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4e, 0x47]) {
        return Some("png");
    }
    if bytes.starts_with(b"GIF8") {
        return Some("gif");
    }
    None
}

/// Extension for a MIME type, ignoring parameters
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "font/woff2" | "application/font-woff2" => "woff2",
        "font/woff" | "application/font-woff" => "woff",
        "font/ttf" | "application/x-font-ttf" => "ttf",
        "font/otf" => "otf",
        "text/css" => "css",
        "text/javascript" | "application/javascript" | "application/x-javascript" => "js",
        "text/html" => "html",
        _ => return None,
    };
    Some(ext)
}

/// Magic bytes win for binary kinds, then the URL, then Content-Type, then the kind default
fn decide_extension(url: &Url, kind: AssetKind, body: &[u8], content_type: Option<&str>) -> String {
    if kind.is_binary() {
        if let Some(ext) = sniff_extension(body) {
            return ext.to_string();
        }
    }

    let path = url.path();
    if let Some(ext) = path_extension(path) {
        if AssetKind::from_extension(path).is_some_and(|k| k == kind || (kind.is_binary() && k.is_binary())) {
            return ext;
        }
    }

    if let Some(ext) = content_type.and_then(extension_for_content_type) {
        return ext.to_string();
    }

    kind.default_extension().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses and records the requests it sees
    #[derive(Default)]
    struct CannedHttp {
        responses: HashMap<String, RawResponse>,
        seen: Mutex<Vec<FetchRequest>>,
    }

    impl CannedHttp {
        fn with(mut self, url: &str, status: u16, content_type: Option<&str>, body: &[u8]) -> Self {
            self.responses.insert(
                url.to_string(),
                RawResponse {
                    status,
                    content_type: content_type.map(|c| c.to_string()),
                    body: body.to_vec(),
                },
            );
            self
        }
    }

    impl HttpGet for CannedHttp {
        async fn get(&self, request: FetchRequest) -> Result<RawResponse> {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| CloneError::Timeout(request.url.to_string()))
        }
    }

    fn fetcher(http: CannedHttp) -> Fetcher<CannedHttp> {
        Fetcher::new(http, Duration::from_secs(30), Duration::from_secs(10))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_sniff_extension() {
        assert_eq!(sniff_extension(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_extension(&[0xff, 0xd8, 0xff, 0xe0]), Some("jpg"));
        assert_eq!(sniff_extension(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a]), Some("png"));
        assert_eq!(sniff_extension(b"GIF89a"), Some("gif"));
        assert_eq!(sniff_extension(b"<svg xmlns"), None);
        assert_eq!(sniff_extension(b"RIFF"), None);
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(extension_for_content_type("image/svg+xml; charset=utf-8"), Some("svg"));
        assert_eq!(extension_for_content_type("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn test_magic_bytes_override_url_extension() {
        let http = CannedHttp::default().with(
            "https://example.com/photo.png",
            200,
            Some("image/png"),
            &[0xff, 0xd8, 0xff, 0xe0, 0x00],
        );
        let outcome = fetcher(http)
            .fetch(&url("https://example.com/photo.png"), AssetKind::Image)
            .await
            .unwrap();
        assert_eq!(outcome.final_extension, "jpg");
    }

    #[tokio::test]
    async fn test_extension_fallbacks() {
        let http = CannedHttp::default()
            .with("https://example.com/logo.svg", 200, None, b"<svg/>")
            .with("https://example.com/img?id=4", 200, Some("image/svg+xml"), b"<svg/>")
            .with("https://example.com/blob", 200, None, b"??");
        let fetcher = fetcher(http);

        let by_url = fetcher
            .fetch(&url("https://example.com/logo.svg"), AssetKind::Image)
            .await
            .unwrap();
        assert_eq!(by_url.final_extension, "svg");

        let by_type = fetcher
            .fetch(&url("https://example.com/img?id=4"), AssetKind::Image)
            .await
            .unwrap();
        assert_eq!(by_type.final_extension, "svg");

        let by_default = fetcher
            .fetch(&url("https://example.com/blob"), AssetKind::Image)
            .await
            .unwrap();
        assert_eq!(by_default.final_extension, "jpg");
    }

    #[tokio::test]
    async fn test_text_kinds_are_not_sniffed() {
        let http = CannedHttp::default().with(
            "https://example.com/app.js",
            200,
            Some("application/javascript"),
            b"GIF8 = 1;",
        );
        let outcome = fetcher(http)
            .fetch(&url("https://example.com/app.js"), AssetKind::Script)
            .await
            .unwrap();
        assert_eq!(outcome.final_extension, "js");
        assert_eq!(outcome.text(), "GIF8 = 1;");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let http = CannedHttp::default().with("https://example.com/missing.css", 404, None, b"");
        let result = fetcher(http)
            .fetch(&url("https://example.com/missing.css"), AssetKind::Stylesheet)
            .await;
        assert!(matches!(result, Err(CloneError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_headers_and_timeouts_per_kind() {
        let http = CannedHttp::default()
            .with("https://example.com/", 200, Some("text/html"), b"<html></html>")
            .with("https://example.com/a.woff2", 200, None, b"wOF2");
        let fetcher = fetcher(http);
        fetcher
            .fetch(&url("https://example.com/"), AssetKind::Page)
            .await
            .unwrap();
        fetcher
            .fetch(&url("https://example.com/a.woff2"), AssetKind::Font)
            .await
            .unwrap();

        let seen = fetcher.http.seen.lock().unwrap();
        assert_eq!(seen[0].timeout, Duration::from_secs(30));
        assert!(seen[0].headers.iter().any(|(n, _)| *n == "Accept-Language"));
        assert!(seen[0].headers.iter().any(|(n, v)| *n == "Accept" && v.starts_with("text/html")));
        assert_eq!(seen[1].timeout, Duration::from_secs(10));
        assert!(!seen[1].headers.iter().any(|(n, _)| *n == "Accept-Language"));
    }
}
