use super::page::{materialize, materialize_html};
use super::{CloneContext, PageTask};
use crate::config::CloneConfig;
use crate::error::Result;
use crate::fetcher::HttpGet;
use crate::filter::{UrlFilter, UrlFilterConfig};
use crate::parsers::AssetKind;
use crate::parsers::html::{base_href, extract_links};
use crate::resolver::ReferenceResolver;
use crate::results::{ChunkReference, CloneReport, PageOutcome};
use crate::utils::page_file_name;
use scraper::Html;
use std::collections::{HashSet, VecDeque};
use url::Url;

const NEXT_ROOT: &str = "/_next/";
const CHUNKS_ROOT: &str = "/_next/static/chunks/";

/// Clone the site: seed page, up to `max_pages - 1` same-site pages linked from it, and
/// every bundler chunk reachable from the scripts they load.
pub async fn crawl<H: HttpGet>(ctx: &mut CloneContext<H>) -> Result<CloneReport> {
    let url_filter = create_url_filter(&ctx.seed, &ctx.config)?;
    ctx.prepare_output().await?;

    let seed = ctx.seed.clone();
    ::log::info!("Starting clone of {}", seed);

    // The seed is fetched once; its HTML serves both link discovery and materialization
    let seed_html = match ctx.fetcher.fetch(&seed, AssetKind::Page).await {
        Ok(outcome) => Some(outcome.text().into_owned()),
        Err(e) => {
            ::log::error!("Failed to fetch seed page {}: {}", seed, e);
            None
        }
    };

    let links = seed_html
        .as_deref()
        .map(|html| discover_links(&url_filter, &seed, html))
        .unwrap_or_default();
    ::log::info!("Found {} same-site links on {}", links.len(), seed);

    let tasks = plan_pages(&seed, &links, ctx.config.page_limit());
    for task in &tasks {
        ctx.page_files
            .insert(url_filter.normalize_url(&task.url).to_string(), task.file_name.clone());
    }

    let mut pages = Vec::with_capacity(tasks.len());
    for task in &tasks {
        let outcome = match (&seed_html, task.is_seed) {
            (Some(html), true) => materialize_html(ctx, task, html).await,
            (None, true) => PageOutcome::Failed {
                url: task.url.to_string(),
                reason: "seed page could not be fetched".to_string(),
            },
            (_, false) => materialize(ctx, task).await,
        };
        pages.push(outcome);
    }

    let chunks_discovered = if ctx.config.follow_chunks {
        follow_chunks(ctx).await
    } else {
        ctx.chunk_seeds.clear();
        0
    };

    let report = CloneReport {
        seed_url: seed.to_string(),
        output_dir: ctx.output_root.clone(),
        pages,
        downloads: ctx.registry.records().to_vec(),
        chunks_discovered,
    };
    ::log::info!("{}", report);
    Ok(report)
}

/// Pages linked from the seed, resolved against its `<base href>` like its anchors are
fn discover_links(filter: &UrlFilter, seed: &Url, html: &str) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let resolver = ReferenceResolver::new(seed.clone()).with_base_href(base_href(&doc).as_deref());
    filter.select_links(seed, resolver.base_url(), &extract_links(&doc))
}

/// Link filter bound to the seed's host, with configured patterns added
fn create_url_filter(seed: &Url, config: &CloneConfig) -> Result<UrlFilter> {
    let mut filter_config = UrlFilterConfig::for_seed(seed);
    filter_config
        .include_patterns
        .extend(config.include_patterns.iter().cloned());
    filter_config
        .exclude_patterns
        .extend(config.exclude_patterns.iter().cloned());
    Ok(UrlFilter::new(filter_config)?)
}

/// The page set: the seed first, then links in discovery order, `limit` pages at most.
///
/// File names are fixed here. The seed is always `index.html`, and a slug that is
/// already taken gets `_2`, `_3`, ... so no page overwrites another.
pub fn plan_pages(seed: &Url, links: &[Url], limit: usize) -> Vec<PageTask> {
    let mut used = HashSet::new();
    let mut tasks = Vec::with_capacity(limit.min(links.len() + 1));

    used.insert("index.html".to_string());
    tasks.push(PageTask {
        url: seed.clone(),
        is_seed: true,
        file_name: "index.html".to_string(),
    });

    for link in links.iter().take(limit.saturating_sub(1)) {
        let base = page_file_name(link);
        let mut file_name = base.clone();
        let mut counter = 2;
        while !used.insert(file_name.clone()) {
            let stem = base.strip_suffix(".html").unwrap_or(&base);
            file_name = format!("{}_{}.html", stem, counter);
            counter += 1;
        }
        tasks.push(PageTask {
            url: link.clone(),
            is_seed: false,
            file_name,
        });
    }

    ::log::debug!(
        "Page set: {:?}",
        tasks.iter().map(|t| t.file_name.as_str()).collect::<Vec<_>>()
    );
    tasks
}

/// URL of a chunk name found inside the chunk at `from`.
///
/// Absolute and root-relative names resolve normally. `static/chunks/...` names hang off
/// the `/_next/` root and bare names off the scanned chunk's `/_next/static/chunks/` root,
/// keeping any base path in front of `/_next/`.
pub fn chunk_url(from: &Url, name: &str) -> Option<Url> {
    if name.starts_with('/') || name.starts_with("http://") || name.starts_with("https://") {
        return from.join(name).ok();
    }

    let root = if name.starts_with("static/chunks/") {
        NEXT_ROOT
    } else {
        CHUNKS_ROOT
    };
    let path = from.path();
    let prefix = path.find(NEXT_ROOT).map(|idx| &path[..idx]).unwrap_or("");

    let mut base = from.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path(&format!("{}{}", prefix, root));
    base.join(name).ok()
}

/// Breadth-first closure over chunk references.
///
/// Every chunk URL enters the seen set once, so each is downloaded at most once and the
/// loop ends even when chunks reference each other. Returns the number of chunks found
/// beyond those the pages referenced.
async fn follow_chunks<H: HttpGet>(ctx: &mut CloneContext<H>) -> usize {
    let mut seen: HashSet<String> = ctx.registry.chunk_urls().map(|u| u.to_string()).collect();
    let mut queue: VecDeque<ChunkReference> = ctx.chunk_seeds.drain(..).collect();
    let mut discovered = 0;

    ::log::info!("Following chunk references from {} chunks", queue.len());

    while let Some(mut chunk) = queue.pop_front() {
        let Ok(from) = Url::parse(&chunk.url) else {
            continue;
        };
        let names = ctx.scanner.extract_chunk_references(&chunk.content);
        chunk.scanned = true;

        let resolver = ReferenceResolver::new(from.clone());
        let mut pending = Vec::new();
        for name in names {
            let Some(url) = chunk_url(&from, &name) else {
                continue;
            };
            if !seen.insert(url.to_string()) {
                continue;
            }
            let Some(resolved) = resolver.resolve(url.as_str(), AssetKind::Script) else {
                continue;
            };
            if !resolved.is_chunk() {
                ::log::trace!("Ignoring non-chunk reference {}", url);
                continue;
            }
            if ctx.local_exists(&resolved.suggested_local_path).await {
                ::log::trace!("Chunk already on disk: {}", resolved.suggested_local_path);
                continue;
            }
            let (_, download) = ctx.registry.claim(&resolved);
            pending.extend(download);
        }

        ::log::debug!(
            "Scanned chunk {} (scanned: {}), {} new chunks",
            chunk.local_path,
            chunk.scanned,
            pending.len()
        );

        for asset in ctx.download_all(pending).await {
            if let Some(body) = asset.body {
                discovered += 1;
                queue.push_back(ChunkReference {
                    url: asset.url.to_string(),
                    local_path: asset.local_path,
                    content: String::from_utf8_lossy(&body).into_owned(),
                    scanned: false,
                });
            }
        }
    }

    discovered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_plan_pages_bounds_and_names() {
        let seed = url("https://example.com/");
        let links = vec![
            url("https://example.com/about"),
            url("https://example.com/about/"),
            url("https://example.com/index.html"),
            url("https://example.com/blog"),
        ];

        let tasks = plan_pages(&seed, &links, 4);
        let names: Vec<&str> = tasks.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(names, vec!["index.html", "about.html", "about_2.html", "index_2.html"]);
        assert!(tasks[0].is_seed);
        assert!(tasks[1..].iter().all(|t| !t.is_seed));

        assert_eq!(plan_pages(&seed, &links, 1).len(), 1);
        assert_eq!(plan_pages(&seed, &links, 0).len(), 1);
        assert_eq!(plan_pages(&seed, &links, 50).len(), 5);
    }

    #[test]
    fn test_chunk_url_resolution() {
        let from = url("https://example.com/_next/static/chunks/app/page-abc.js");

        assert_eq!(
            chunk_url(&from, "522.6349e625adea0bc2.js").unwrap().as_str(),
            "https://example.com/_next/static/chunks/522.6349e625adea0bc2.js"
        );
        assert_eq!(
            chunk_url(&from, "app/layout-1.js").unwrap().as_str(),
            "https://example.com/_next/static/chunks/app/layout-1.js"
        );
        assert_eq!(
            chunk_url(&from, "static/chunks/9.js").unwrap().as_str(),
            "https://example.com/_next/static/chunks/9.js"
        );
        assert_eq!(
            chunk_url(&from, "/_next/static/chunks/main.js").unwrap().as_str(),
            "https://example.com/_next/static/chunks/main.js"
        );
    }

    #[test]
    fn test_chunk_url_keeps_base_path() {
        let from = url("https://example.com/docs/_next/static/chunks/main.js?v=3");
        assert_eq!(
            chunk_url(&from, "7.abc.js").unwrap().as_str(),
            "https://example.com/docs/_next/static/chunks/7.abc.js"
        );
    }
}
