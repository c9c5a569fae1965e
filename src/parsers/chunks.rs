use regex::Regex;
use std::collections::HashSet;

/// Finds references to further bundler chunks inside a JavaScript bundle.
///
/// Implementations only report names as they appear in the source. Turning them into
/// URLs is left to the crawler, which knows where the scanned chunk came from.
pub trait ChunkScanner {
    fn extract_chunk_references(&self, source: &str) -> Vec<String>;
}

/// Heuristic scanner for Next.js/webpack output built from regular expressions.
///
/// There is no JavaScript parse involved, so a reference built at runtime from
/// separate id and hash tables is not found.
#[derive(Debug)]
pub struct PatternChunkScanner {
    patterns: Vec<ChunkPattern>,
}

#[derive(Debug)]
struct ChunkPattern {
    regex: Regex,
    /// Capture group holding the chunk name (0 for the whole match)
    group: usize,
}

impl Default for PatternChunkScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternChunkScanner {
    pub fn new() -> Self {
        let sources: [(&str, usize); 5] = [
            // "/_next/static/chunks/522.6349e625adea0bc2.js"
            (r#"["'](/_next/static/chunks/[^"'\s]+\.js)["']"#, 1),
            // /_next/static/chunks/app/page-3cdefee23f76ef23.js outside of quotes
            (r#"/_next/static/chunks/[^\s"'`,;)}\]]+\.js"#, 0),
            // {522:"522.6349e625adea0bc2.js", 123:"app/page-3cdefee23f76ef23.js"}
            (r#"[{,]\s*\d+\s*:\s*["']([^"'\s]*\.js)["']"#, 1),
            // import("/_next/static/chunks/...")
            (r#"import\s*\(\s*["'](/_next/static/chunks/[^"']+\.js)["']\s*\)"#, 1),
            // ["522.6349e625adea0bc2.js", "app/page-3cdefee23f76ef23.js"]
            (
                r#"["'](\d+\.[a-f0-9]+\.js|app/[^"'\s]+\.js|pages/[^"'\s]+\.js)["']"#,
                1,
            ),
        ];

        let patterns = sources
            .iter()
            .map(|(pattern, group)| ChunkPattern {
                regex: Regex::new(pattern).expect("chunk pattern should be valid"),
                group: *group,
            })
            .collect();

        Self { patterns }
    }
}

impl ChunkScanner for PatternChunkScanner {
    fn extract_chunk_references(&self, source: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(source) {
                if let Some(m) = caps.get(pattern.group) {
                    let name = m.as_str();
                    if seen.insert(name.to_string()) {
                        found.push(name.to_string());
                    }
                }
            }
        }

        ::log::debug!("Chunk scan found {} candidate references", found.len());
        found
    }
}
