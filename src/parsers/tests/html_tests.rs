use crate::parsers::AssetKind;
use crate::parsers::html::{self, DomEdits, ReferenceSlot};
use scraper::Html;

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<base href="/static/">
<link rel="stylesheet" href="/css/site.css">
<link rel="preload" as="font" href="/fonts/inter.woff2" crossorigin>
<link rel="preload" as="fetch" href="/api/data.json">
<link rel="canonical" href="https://example.com/">
<link rel="icon" href="/favicon.ico">
<script src="/_next/static/chunks/main-abc.js"></script>
<style>.hero { background: url(/img/hero.jpg) }</style>
</head><body>
<a href="/about">About</a><a href="mailto:x@example.com">Mail</a>
<img src="/img/logo.png" srcset="/img/logo.png 1x, /img/logo@2x.png 2x">
<picture><source srcset="/img/a.webp"><source src="/img/b.jpg"></picture>
<video poster="/img/poster.jpg"></video>
<div style="background-image: url('/img/bg.png')">Text</div>
</body></html>"#;

    #[test]
    fn test_extract_links() {
        let links = html::extract_links(&Html::parse_document(PAGE));
        assert_eq!(links, vec!["/about", "mailto:x@example.com"]);
    }

    #[test]
    fn test_base_href() {
        let doc = Html::parse_document(PAGE);
        assert_eq!(html::base_href(&doc), Some("/static/".to_string()));
        assert_eq!(html::base_href(&Html::parse_document("<p>x</p>")), None);
    }

    #[test]
    fn test_collect_references() {
        let doc = Html::parse_document(PAGE);
        let refs = html::collect_references(&doc);
        let summary: Vec<(ReferenceSlot, &str, AssetKind)> = refs
            .iter()
            .map(|r| (r.slot, r.value.as_str(), r.kind))
            .collect();

        assert_eq!(
            summary,
            vec![
                (ReferenceSlot::Attribute("href"), "/css/site.css", AssetKind::Stylesheet),
                (ReferenceSlot::Attribute("href"), "/fonts/inter.woff2", AssetKind::Font),
                (ReferenceSlot::Attribute("href"), "/favicon.ico", AssetKind::Image),
                (
                    ReferenceSlot::Attribute("src"),
                    "/_next/static/chunks/main-abc.js",
                    AssetKind::Script
                ),
                (
                    ReferenceSlot::StyleElement,
                    ".hero { background: url(/img/hero.jpg) }",
                    AssetKind::Image
                ),
                (ReferenceSlot::Attribute("src"), "/img/logo.png", AssetKind::Image),
                (
                    ReferenceSlot::Srcset("srcset"),
                    "/img/logo.png 1x, /img/logo@2x.png 2x",
                    AssetKind::Image
                ),
                (ReferenceSlot::Srcset("srcset"), "/img/a.webp", AssetKind::Image),
                (ReferenceSlot::Attribute("src"), "/img/b.jpg", AssetKind::Image),
                (ReferenceSlot::Attribute("poster"), "/img/poster.jpg", AssetKind::Image),
                (
                    ReferenceSlot::InlineStyle,
                    "background-image: url('/img/bg.png')",
                    AssetKind::Image
                ),
            ]
        );
    }

    #[test]
    fn test_serialize_without_edits() {
        let source = "<!DOCTYPE html><html><head><title>A &amp; B</title></head><body><p class=\"x\">1 &lt; 2</p><br><script>if (a < b && c) {}</script><!-- note --></body></html>";
        let doc = Html::parse_document(source);
        assert_eq!(html::serialize(&doc, &DomEdits::new()), source);
    }

    #[test]
    fn test_serialize_keeps_legacy_doctype() {
        let source = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd"><html><head></head><body><p>old</p></body></html>"#;
        let output = html::serialize(&Html::parse_document(source), &DomEdits::new());
        assert!(
            output.starts_with(r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#),
            "got {}",
            output
        );

        let system_only = r#"<!DOCTYPE html SYSTEM "about:legacy-compat"><html><head></head><body></body></html>"#;
        let output = html::serialize(&Html::parse_document(system_only), &DomEdits::new());
        assert!(output.starts_with(r#"<!DOCTYPE html SYSTEM "about:legacy-compat">"#), "got {}", output);
    }

    #[test]
    fn test_serialize_keeps_attribute_prefixes() {
        let doc = Html::parse_document(
            r##"<html><body><svg><use xlink:href="#icon"></use></svg></body></html>"##,
        );
        let output = html::serialize(&doc, &DomEdits::new());
        assert!(output.contains(r##"<use xlink:href="#icon"></use>"##), "got {}", output);
    }

    #[test]
    fn test_serialize_applies_edits() {
        let doc = Html::parse_document(
            r#"<html><head><style>a{background:url(x.png)}</style></head><body><img src="/logo.png"></body></html>"#,
        );
        let refs = html::collect_references(&doc);
        let img = refs
            .iter()
            .find(|r| r.slot == ReferenceSlot::Attribute("src"))
            .unwrap();
        let style = refs
            .iter()
            .find(|r| r.slot == ReferenceSlot::StyleElement)
            .unwrap();

        let mut edits = DomEdits::new();
        edits.set_attribute(img.node, "src", "./images/logo_00aa11bb.png".to_string());
        edits.set_text(style.node, "a{background:url('./images/x_1.png')}".to_string());
        assert_eq!(edits.len(), 2);
        assert_eq!(edits.attribute(img.node, "src"), Some("./images/logo_00aa11bb.png"));

        let output = html::serialize(&doc, &edits);
        assert!(output.contains(r#"<img src="./images/logo_00aa11bb.png">"#));
        assert!(output.contains("<style>a{background:url('./images/x_1.png')}</style>"));
    }

    #[test]
    fn test_replace_in_values() {
        let doc = Html::parse_document(r#"<img src="/a.png"><div style="background:url(/a.png)"></div>"#);
        let refs = html::collect_references(&doc);
        let mut edits = DomEdits::new();
        edits.set_attribute(refs[0].node, "src", "./images/a_1.png".to_string());
        edits.set_attribute(refs[1].node, "style", "background:url('./images/a_1.png')".to_string());

        edits.replace_in_values("images/a_1.png", "images/a_1.jpg");

        let output = html::serialize(&doc, &edits);
        assert!(output.contains(r#"src="./images/a_1.jpg""#));
        assert!(output.contains(r#"style="background:url('./images/a_1.jpg')""#));
    }

    #[test]
    fn test_collect_anchors() {
        let doc = Html::parse_document(PAGE);
        let anchors = html::collect_anchors(&doc);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].1, "/about");

        let mut edits = DomEdits::new();
        edits.set_attribute(anchors[0].0, "href", "./about.html".to_string());
        assert!(html::serialize(&doc, &edits).contains(r#"<a href="./about.html">About</a>"#));
    }
}
