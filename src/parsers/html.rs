use crate::parsers::AssetKind;
use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node, Selector};
use std::collections::HashMap;

/// Elements whose text children are written verbatim
const RAW_TEXT_ELEMENTS: [&str; 8] = [
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Elements without a closing tag
const VOID_ELEMENTS: [&str; 18] = [
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Where in the document a reference sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSlot {
    /// A single-URL attribute (`href`, `src`, `poster`)
    Attribute(&'static str),
    /// A `srcset` attribute
    Srcset(&'static str),
    /// A `style="..."` attribute containing `url(...)`
    InlineStyle,
    /// The text of a `<style>` element
    StyleElement,
}

/// An asset reference found in the DOM, still in its source form
#[derive(Debug, Clone)]
pub struct DomReference {
    pub node: NodeId,
    pub slot: ReferenceSlot,
    pub value: String,
    pub kind: AssetKind,
}

/// Raw `href` values of every anchor, in document order
pub fn extract_links(doc: &Html) -> Vec<String> {
    let link_selector = Selector::parse("a[href]").unwrap();
    let links = doc
        .select(&link_selector)
        .filter_map(|e| e.value().attr("href"))
        .map(|s| s.trim().to_string())
        .collect::<Vec<String>>();

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::debug!(
            "First few links: {:?}",
            links.iter().take(5).collect::<Vec<_>>()
        );
    }

    links
}

/// Anchors with their node ids so their `href` can be rewritten
pub fn collect_anchors(doc: &Html) -> Vec<(NodeId, String)> {
    let anchor_selector = Selector::parse("a[href]").unwrap();
    doc.select(&anchor_selector)
        .filter_map(|e| e.value().attr("href").map(|href| (e.id(), href.trim().to_string())))
        .collect()
}

/// The document's `<base href>`, if any
pub fn base_href(doc: &Html) -> Option<String> {
    let base_selector = Selector::parse("base[href]").unwrap();
    doc.select(&base_selector)
        .next()
        .and_then(|e| e.value().attr("href"))
        .map(|s| s.trim().to_string())
}

fn rel_tokens(rel: &str) -> Vec<String> {
    rel.split_ascii_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Kind of asset a `<link>` pulls in, or `None` for links that load nothing
/// worth cloning (canonical, preconnect, manifest, ...)
fn link_kind(rel: &str, as_attr: Option<&str>) -> Option<AssetKind> {
    let tokens = rel_tokens(rel);
    let has = |name: &str| tokens.iter().any(|t| t == name);

    if has("stylesheet") {
        return Some(AssetKind::Stylesheet);
    }
    if has("preload") || has("modulepreload") {
        return match as_attr.map(|a| a.to_ascii_lowercase()).as_deref() {
            Some("font") => Some(AssetKind::Font),
            Some("script") => Some(AssetKind::Script),
            Some("style") => Some(AssetKind::Stylesheet),
            Some("image") => Some(AssetKind::Image),
            None if has("modulepreload") => Some(AssetKind::Script),
            _ => None,
        };
    }
    if has("icon") || has("apple-touch-icon") || has("mask-icon") {
        return Some(AssetKind::Image);
    }
    None
}

/// Every asset reference the materializer knows how to rewrite, in document order
pub fn collect_references(doc: &Html) -> Vec<DomReference> {
    let all = Selector::parse("*").unwrap();
    let mut refs = Vec::new();

    for element in doc.select(&all) {
        let el = element.value();
        let node = element.id();
        let mut push = |slot: ReferenceSlot, value: &str, kind: AssetKind| {
            let value = value.trim();
            if !value.is_empty() {
                refs.push(DomReference {
                    node,
                    slot,
                    value: value.to_string(),
                    kind,
                });
            }
        };

        match el.name() {
            "link" => {
                if let (Some(href), Some(rel)) = (el.attr("href"), el.attr("rel")) {
                    if let Some(kind) = link_kind(rel, el.attr("as")) {
                        push(ReferenceSlot::Attribute("href"), href, kind);
                    }
                }
            }
            "script" => {
                if let Some(src) = el.attr("src") {
                    push(ReferenceSlot::Attribute("src"), src, AssetKind::Script);
                }
            }
            "img" => {
                if let Some(src) = el.attr("src") {
                    push(ReferenceSlot::Attribute("src"), src, AssetKind::Image);
                }
                if let Some(srcset) = el.attr("srcset") {
                    push(ReferenceSlot::Srcset("srcset"), srcset, AssetKind::Image);
                }
            }
            "source" => {
                if let Some(src) = el.attr("src") {
                    push(ReferenceSlot::Attribute("src"), src, AssetKind::Image);
                }
                if let Some(srcset) = el.attr("srcset") {
                    push(ReferenceSlot::Srcset("srcset"), srcset, AssetKind::Image);
                }
            }
            "video" => {
                if let Some(poster) = el.attr("poster") {
                    push(ReferenceSlot::Attribute("poster"), poster, AssetKind::Image);
                }
            }
            "style" => {
                let text: String = element.text().collect();
                if text.contains("url(") || text.contains("@import") {
                    push(ReferenceSlot::StyleElement, &text, AssetKind::Image);
                }
            }
            _ => {}
        }

        if let Some(style) = el.attr("style") {
            if style.contains("url(") {
                push(ReferenceSlot::InlineStyle, style, AssetKind::Image);
            }
        }
    }

    ::log::debug!("HTML parser found {} asset references", refs.len());
    refs
}

/// Planned changes to a parsed document.
///
/// The parsed tree is never mutated. Edits are collected here and applied while the
/// document is written back out.
#[derive(Debug, Default, Clone)]
pub struct DomEdits {
    attributes: HashMap<NodeId, Vec<(String, String)>>,
    texts: HashMap<NodeId, String>,
}

impl DomEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value of an existing attribute
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: String) {
        let attrs = self.attributes.entry(node).or_default();
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Replace all text content of an element
    pub fn set_text(&mut self, node: NodeId, text: String) {
        self.texts.insert(node, text);
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes
            .get(&node)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.texts.get(&node).map(|s| s.as_str())
    }

    /// Substitute `from` with `to` in every planned value
    pub fn replace_in_values(&mut self, from: &str, to: &str) {
        for attrs in self.attributes.values_mut() {
            for (_, value) in attrs.iter_mut() {
                if value.contains(from) {
                    *value = value.replace(from, to);
                }
            }
        }
        for text in self.texts.values_mut() {
            if text.contains(from) {
                *text = text.replace(from, to);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.values().map(|a| a.len()).sum::<usize>() + self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write the document back to HTML with `edits` applied
pub fn serialize(doc: &Html, edits: &DomEdits) -> String {
    let mut out = String::new();
    for child in doc.tree.root().children() {
        write_node(&mut out, child, edits, false);
    }
    out
}

fn write_node(out: &mut String, node: NodeRef<'_, Node>, edits: &DomEdits, raw_text: bool) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                write_node(out, child, edits, raw_text);
            }
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            // Public and system ids select quirks or limited-quirks rendering
            let (public_id, system_id) = (doctype.public_id(), doctype.system_id());
            if !public_id.is_empty() {
                out.push_str(" PUBLIC \"");
                out.push_str(public_id);
                out.push('"');
                if !system_id.is_empty() {
                    out.push_str(" \"");
                    out.push_str(system_id);
                    out.push('"');
                }
            } else if !system_id.is_empty() {
                out.push_str(" SYSTEM \"");
                out.push_str(system_id);
                out.push('"');
            }
            out.push('>');
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(out, text, false);
            }
        }
        Node::ProcessingInstruction(pi) => {
            out.push_str("<?");
            out.push_str(&pi.target);
            out.push(' ');
            out.push_str(&pi.data);
            out.push('>');
        }
        Node::Element(el) => {
            let name = el.name();
            let overrides = edits.attributes.get(&node.id());

            out.push('<');
            out.push_str(name);
            // Same shape whether scraper stores attributes in a Vec or an IndexMap
            for (qual, value) in el.attrs.iter().map(|(qual, value)| (qual, value)) {
                let local: &str = &qual.local;
                let value = overrides
                    .filter(|_| qual.prefix.is_none())
                    .and_then(|o| o.iter().find(|(n, _)| n == local))
                    .map(|(_, v)| v.as_str())
                    .unwrap_or(&**value);
                out.push(' ');
                if let Some(prefix) = &qual.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(local);
                out.push_str("=\"");
                escape_into(out, value, true);
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&name) {
                return;
            }

            if let Some(text) = edits.texts.get(&node.id()) {
                out.push_str(text);
            } else {
                let raw = RAW_TEXT_ELEMENTS.contains(&name);
                for child in node.children() {
                    write_node(out, child, edits, raw);
                }
            }

            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
