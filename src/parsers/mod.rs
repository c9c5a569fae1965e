pub mod chunks;
pub mod css;
pub mod html;

#[cfg(test)]
mod tests;

use crate::utils::path_extension;

/// What a fetched resource is expected to be.
///
/// The kind decides the request headers, whether the body is kept as text or bytes,
/// and which flat directory an asset lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// An HTML page
    Page,
    /// A CSS file
    Stylesheet,
    /// A JavaScript file
    Script,
    /// Any image format
    Image,
    /// A web font
    Font,
}

impl AssetKind {
    /// Classify a URL by the extension of its path, if it has a recognizable one
    pub fn from_extension(url: &str) -> Option<Self> {
        let ext = path_extension(url)?;
        let kind = match ext.as_str() {
            "css" => AssetKind::Stylesheet,
            "js" | "mjs" => AssetKind::Script,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "ico" | "avif" => {
                AssetKind::Image
            }
            "woff" | "woff2" | "ttf" | "otf" | "eot" => AssetKind::Font,
            "html" | "htm" => AssetKind::Page,
            _ => return None,
        };
        ::log::trace!("Classifying {} as {:?}", url, kind);
        Some(kind)
    }

    /// Refine a hint taken from the referencing markup with the URL's extension.
    ///
    /// Markup is trusted for stylesheets and scripts. Image hints come from loose
    /// contexts (`url(...)`, preloads) and give way to a font or stylesheet extension.
    pub fn refine(self, url: &str) -> Self {
        match (self, Self::from_extension(url)) {
            (AssetKind::Image, Some(AssetKind::Font)) => AssetKind::Font,
            (AssetKind::Image, Some(AssetKind::Stylesheet)) => AssetKind::Stylesheet,
            (kind, _) => kind,
        }
    }

    /// Binary kinds are stored as bytes and content-sniffed
    pub fn is_binary(&self) -> bool {
        matches!(self, AssetKind::Image | AssetKind::Font)
    }

    /// `Accept` header that a browser would send for this kind
    pub fn accept_header(&self) -> &'static str {
        match self {
            AssetKind::Page => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
            }
            AssetKind::Stylesheet => "text/css,*/*;q=0.1",
            AssetKind::Script => "application/javascript,text/javascript,*/*;q=0.1",
            AssetKind::Image => "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8",
            AssetKind::Font => "font/woff2,font/woff,font/ttf,*/*;q=0.5",
        }
    }

    /// Extension used when neither the URL nor the response says anything useful
    pub fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Page => "html",
            AssetKind::Stylesheet => "css",
            AssetKind::Script => "js",
            AssetKind::Image => "jpg",
            AssetKind::Font => "woff2",
        }
    }

    /// Flat top-level directory for non-mirrored assets of this kind
    pub fn directory(&self) -> &'static str {
        match self {
            AssetKind::Page => "",
            AssetKind::Stylesheet => "css",
            AssetKind::Script => "js",
            AssetKind::Image => "images",
            AssetKind::Font => "fonts",
        }
    }
}
