use super::context::DownloadedAsset;
use super::{CloneContext, PageTask};
use crate::fetcher::HttpGet;
use crate::parsers::html::{self, DomEdits, ReferenceSlot};
use crate::parsers::{AssetKind, css};
use crate::registry::{AssetRegistry, PendingDownload};
use crate::resolver::{ReferenceResolver, is_fetchable, match_replacement, parse_srcset, rewrite_srcset};
use crate::results::{ChunkReference, PageOutcome};
use crate::utils::root_prefix;
use scraper::Html;
use std::collections::HashMap;
use url::Url;

/// Fetch one page and materialize it.
///
/// A page that can't be fetched is logged and reported as failed; the crawl goes on.
pub async fn materialize<H: HttpGet>(ctx: &mut CloneContext<H>, task: &PageTask) -> PageOutcome {
    match ctx.fetcher.fetch(&task.url, AssetKind::Page).await {
        Ok(outcome) => {
            let html = outcome.text().into_owned();
            materialize_html(ctx, task, &html).await
        }
        Err(e) => {
            ::log::error!("Failed to fetch page {}: {}", task.url, e);
            PageOutcome::Failed {
                url: task.url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Materialize a page whose HTML is already in hand: localize every asset reference,
/// download what is new, and write the rewritten document.
pub async fn materialize_html<H: HttpGet>(
    ctx: &mut CloneContext<H>,
    task: &PageTask,
    html: &str,
) -> PageOutcome {
    ::log::info!("Cloning page {} -> {}", task.url, task.file_name);
    let doc = Html::parse_document(html);

    // Every edit is planned before the first download goes out
    let PagePlan {
        mut edits,
        pending,
        references,
    } = plan_page(ctx, task, &doc);

    let downloaded = ctx.download_all(pending).await;
    ::log::debug!(
        "{}: {} of {} new assets downloaded",
        task.url,
        downloaded.iter().filter(|a| a.succeeded()).count(),
        downloaded.len()
    );
    for asset in &downloaded {
        if let Some((old, new)) = &asset.renamed {
            edits.replace_in_values(old, new);
        }
    }

    localize_stylesheets(ctx, stylesheets_of(&downloaded)).await;

    for asset in &downloaded {
        if let Some(chunk) = chunk_reference(asset) {
            ctx.chunk_seeds.push(chunk);
        }
    }

    let output = html::serialize(&doc, &edits);
    match ctx.write_file(&task.file_name, output.as_bytes()).await {
        Ok(bytes) => {
            ::log::info!(
                "Wrote {} ({} bytes, {} asset references)",
                task.file_name,
                bytes,
                references
            );
            PageOutcome::Written {
                url: task.url.to_string(),
                file_name: task.file_name.clone(),
                assets: references,
            }
        }
        Err(e) => {
            ::log::error!("Failed to write page {}: {}", task.file_name, e);
            PageOutcome::Failed {
                url: task.url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

struct PagePlan {
    edits: DomEdits,
    pending: Vec<PendingDownload>,
    references: usize,
}

/// Local paths handed out while planning one document, keyed by the reference as written
struct Claims<'a> {
    registry: &'a mut AssetRegistry,
    resolver: &'a ReferenceResolver,
    /// Prefix that reaches the output root from the document
    prefix: String,
    pending: Vec<PendingDownload>,
    replacements: Vec<(String, String)>,
    /// The image subset of `replacements`, the only candidates for `srcset` matching
    images: Vec<(String, String)>,
}

impl Claims<'_> {
    fn local(&mut self, raw: &str, hint: AssetKind) -> Option<String> {
        if let Some((_, local)) = self.replacements.iter().find(|(orig, _)| orig == raw) {
            return Some(local.clone());
        }

        let resolved = self.resolver.resolve(raw, hint)?;
        let (local_path, download) = self.registry.claim(&resolved);
        self.pending.extend(download);

        let local = format!("{}{}", self.prefix, local_path);
        self.replacements.push((raw.to_string(), local.clone()));
        if resolved.kind == AssetKind::Image {
            self.images.push((raw.to_string(), local.clone()));
        }
        Some(local)
    }
}

fn plan_page<H: HttpGet>(ctx: &mut CloneContext<H>, task: &PageTask, doc: &Html) -> PagePlan {
    let resolver =
        ReferenceResolver::new(task.url.clone()).with_base_href(html::base_href(doc).as_deref());
    let prefix = root_prefix(&task.file_name);
    let mut edits = DomEdits::new();

    if ctx.config.rewrite_links {
        rewrite_anchors(ctx, doc, &resolver, &prefix, &mut edits);
    }

    let references = html::collect_references(doc);
    let mut claims = Claims {
        registry: &mut ctx.registry,
        resolver: &resolver,
        prefix,
        pending: Vec::new(),
        replacements: Vec::new(),
        images: Vec::new(),
    };

    for reference in &references {
        match reference.slot {
            ReferenceSlot::Attribute(attr) => {
                if let Some(local) = claims.local(&reference.value, reference.kind) {
                    edits.set_attribute(reference.node, attr, local);
                }
            }
            ReferenceSlot::Srcset(attr) => {
                for entry in parse_srcset(&reference.value) {
                    if is_fetchable(&entry.url)
                        && match_replacement(&entry.url, &claims.images).is_none()
                    {
                        if let Some(local) = claims.local(&entry.url, AssetKind::Image) {
                            if !claims.images.iter().any(|(orig, _)| *orig == entry.url) {
                                claims.images.push((entry.url.clone(), local));
                            }
                        }
                    }
                }
                let rewritten = rewrite_srcset(&reference.value, &claims.images);
                edits.set_attribute(reference.node, attr, rewritten);
            }
            ReferenceSlot::InlineStyle => {
                let rewritten =
                    css::rewrite_urls(&reference.value, |raw, kind| claims.local(raw, kind));
                edits.set_attribute(reference.node, "style", rewritten);
            }
            ReferenceSlot::StyleElement => {
                let rewritten =
                    css::rewrite_urls(&reference.value, |raw, kind| claims.local(raw, kind));
                edits.set_text(reference.node, rewritten);
            }
        }
    }

    ::log::debug!(
        "{}: {} references, {} new downloads, {} edits",
        task.url,
        references.len(),
        claims.pending.len(),
        edits.len()
    );

    PagePlan {
        edits,
        pending: claims.pending,
        references: references.len(),
    }
}

/// Point anchors at the local copy of any page that is part of this run
fn rewrite_anchors<H: HttpGet>(
    ctx: &CloneContext<H>,
    doc: &Html,
    resolver: &ReferenceResolver,
    prefix: &str,
    edits: &mut DomEdits,
) {
    for (node, href) in html::collect_anchors(doc) {
        let Some(mut target) = resolver.absolutize(&href) else {
            continue;
        };
        let fragment = target
            .fragment()
            .map(|f| format!("#{}", f))
            .unwrap_or_default();
        target.set_fragment(None);

        if let Some(file_name) = ctx.page_files.get(target.as_str()) {
            ::log::trace!("Anchor {} -> {}", href, file_name);
            edits.set_attribute(node, "href", format!("{}{}{}", prefix, file_name, fragment));
        }
    }
}

/// Second pass over downloaded stylesheets: localize their `url(...)` and `@import`
/// references relative to each stylesheet's own location, then rewrite it in place.
/// Stylesheets pulled in by `@import` go through the same pass.
async fn localize_stylesheets<H: HttpGet>(
    ctx: &mut CloneContext<H>,
    mut queue: Vec<(Url, String, String)>,
) {
    while !queue.is_empty() {
        let mut planned = Vec::new();
        let mut pending = Vec::new();

        for (css_url, local_path, text) in queue.drain(..) {
            let resolver = ReferenceResolver::new(css_url);
            let mut targets = HashMap::new();
            for reference in css::extract_urls(&text) {
                if let Some(resolved) = resolver.resolve(&reference.url, reference.kind) {
                    let (_, download) = ctx.registry.claim(&resolved);
                    pending.extend(download);
                    targets.insert(reference.url, resolved.absolute_url.to_string());
                }
            }
            planned.push((local_path, text, targets));
        }

        let downloaded = ctx.download_all(pending).await;
        queue = stylesheets_of(&downloaded);

        for (local_path, text, targets) in planned {
            if targets.is_empty() {
                continue;
            }
            let prefix = root_prefix(&local_path);
            let registry = &ctx.registry;
            let output = css::rewrite_urls(&text, |raw, _| {
                targets
                    .get(raw)
                    .and_then(|url| registry.local_path(url))
                    .map(|local| format!("{}{}", prefix, local))
            });

            match ctx.write_file(&local_path, output.as_bytes()).await {
                Ok(_) => ::log::debug!("Rewrote {} references in {}", targets.len(), local_path),
                Err(e) => ::log::warn!("Failed to rewrite stylesheet {}: {}", local_path, e),
            }
        }
    }
}

fn stylesheets_of(downloaded: &[DownloadedAsset]) -> Vec<(Url, String, String)> {
    downloaded
        .iter()
        .filter(|asset| asset.kind == AssetKind::Stylesheet)
        .filter_map(|asset| {
            let body = asset.body.as_ref()?;
            Some((
                asset.url.clone(),
                asset.local_path.clone(),
                String::from_utf8_lossy(body).into_owned(),
            ))
        })
        .collect()
}

fn chunk_reference(asset: &DownloadedAsset) -> Option<ChunkReference> {
    if asset.kind != AssetKind::Script || !asset.local_path.starts_with("_next/static/chunks/") {
        return None;
    }
    let body = asset.body.as_ref()?;
    Some(ChunkReference {
        url: asset.url.to_string(),
        local_path: asset.local_path.clone(),
        content: String::from_utf8_lossy(body).into_owned(),
        scanned: false,
    })
}
