//! File-kind classification by extension.
//!
//! The pipeline only asks two questions of a path: does it need TypeScript
//! stripping, and is it already a plain script (for source-map naming).

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainScript,
    TypedScript,
    Markup,
    Style,
    Other,
}

/// Suffix appended to non-`.js` filenames in the emitted source map.
pub const COMPILED_SUFFIX: &str = ".compiled";

pub fn classify(path: &str) -> FileKind {
    match extension(path) {
        Some("js") | Some("mjs") | Some("cjs") => FileKind::PlainScript,
        Some("ts") => FileKind::TypedScript,
        Some("html") => FileKind::Markup,
        Some("css") => FileKind::Style,
        _ => FileKind::Other,
    }
}

fn extension(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|ext| ext.to_str())
}

impl FileKind {
    pub fn needs_type_stripping(self) -> bool {
        self == FileKind::TypedScript
    }
}

/// Name under which the transformed module appears in its source map.
///
/// Only `.js` keeps its own name; markup, styles and TypeScript get the
/// `.compiled` suffix. Module resolution is unaffected.
pub fn source_map_filename(path: &str) -> String {
    if extension(path) == Some("js") {
        path.to_string()
    } else {
        format!("{}{}", path, COMPILED_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify("force-app/lwc/foo/foo.js"), FileKind::PlainScript);
        assert_eq!(classify("force-app/lwc/foo/foo.ts"), FileKind::TypedScript);
        assert_eq!(classify("force-app/lwc/foo/foo.html"), FileKind::Markup);
        assert_eq!(classify("force-app/lwc/foo/foo.css"), FileKind::Style);
        assert_eq!(classify("force-app/lwc/foo/foo.scoped.css"), FileKind::Style);
        assert_eq!(classify("README"), FileKind::Other);
        assert_eq!(classify("foo.tsx"), FileKind::Other);
    }

    #[test]
    fn test_only_typescript_needs_stripping() {
        assert!(classify("a/b.ts").needs_type_stripping());
        assert!(classify("a/types.d.ts").needs_type_stripping());
        assert!(!classify("a/b.js").needs_type_stripping());
        assert!(!classify("a/b.html").needs_type_stripping());
        assert!(!classify("a/b").needs_type_stripping());
    }

    #[test]
    fn test_source_map_filename() {
        assert_eq!(source_map_filename("c/foo/foo.js"), "c/foo/foo.js");
        assert_eq!(source_map_filename("c/foo/foo.html"), "c/foo/foo.html.compiled");
        assert_eq!(source_map_filename("c/foo/foo.css"), "c/foo/foo.css.compiled");
        assert_eq!(source_map_filename("c/foo/foo.ts"), "c/foo/foo.ts.compiled");
        assert_eq!(source_map_filename("c/foo/foo.mjs"), "c/foo/foo.mjs.compiled");
    }
}
