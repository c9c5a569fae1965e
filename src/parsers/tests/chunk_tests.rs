use crate::parsers::chunks::{ChunkScanner, PatternChunkScanner};

#[cfg(test)]
mod tests {
    use super::*;

    const WEBPACK_OUTPUT: &str = r#"
"/_next/static/chunks/522.6349e625adea0bc2.js"
"/_next/static/chunks/app/page-3cdefee23f76ef23.js"
{522:"522.6349e625adea0bc2.js", 123:"app/page-3cdefee23f76ef23.js"}
import("/_next/static/chunks/app/page-3cdefee23f76ef23.js")
["522.6349e625adea0bc2.js", "app/page-3cdefee23f76ef23.js"]
{app:{page:"app/page-3cdefee23f76ef23.js"}}
"#;

    #[test]
    fn test_all_pattern_classes() {
        let scanner = PatternChunkScanner::new();
        let found = scanner.extract_chunk_references(WEBPACK_OUTPUT);

        assert_eq!(
            found,
            vec![
                "/_next/static/chunks/522.6349e625adea0bc2.js",
                "/_next/static/chunks/app/page-3cdefee23f76ef23.js",
                "522.6349e625adea0bc2.js",
                "app/page-3cdefee23f76ef23.js",
            ]
        );
    }

    #[test]
    fn test_bare_chunk_path() {
        let scanner = PatternChunkScanner::default();
        let found = scanner
            .extract_chunk_references("n.p+`/_next/static/chunks/pages/_app-1f2e.js`;x(/_next/static/chunks/9.js)");
        assert_eq!(
            found,
            vec![
                "/_next/static/chunks/pages/_app-1f2e.js",
                "/_next/static/chunks/9.js",
            ]
        );
    }

    #[test]
    fn test_pages_directory_names() {
        let scanner = PatternChunkScanner::new();
        let found = scanner.extract_chunk_references(r#"e.exports=["pages/index-0a1b.js"]"#);
        assert_eq!(found, vec!["pages/index-0a1b.js"]);
    }

    #[test]
    fn test_ignores_plain_code() {
        let scanner = PatternChunkScanner::new();
        assert!(scanner
            .extract_chunk_references("function a(b){return b+1}var c=\"hello.txt\";")
            .is_empty());
        assert!(scanner.extract_chunk_references("").is_empty());
    }
}
