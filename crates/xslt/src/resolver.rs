//! Resolution and loading of include/import targets.

use crate::error::XsltError;
use std::collections::HashMap;
use std::fs;

/// Fetches stylesheet text by URI. Implementations decide what a URI means;
/// the compiler only ever hands them resolved, fragment-free URIs.
pub trait ResourceLoader {
    fn load(&self, uri: &str) -> Result<String, XsltError>;
}

/// Loads stylesheets from the filesystem, treating URIs as paths.
#[derive(Debug, Default)]
pub struct FileLoader;

impl ResourceLoader for FileLoader {
    fn load(&self, uri: &str) -> Result<String, XsltError> {
        fs::read_to_string(uri).map_err(|e| XsltError::Resource {
            uri: uri.to_string(),
            message: e.to_string(),
        })
    }
}

/// A fixed map of URI to content, used in tests and for embedded
/// stylesheet bundles.
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    resources: HashMap<String, String>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, content: impl Into<String>) {
        self.resources.insert(uri.into(), content.into());
    }

    pub fn with(mut self, uri: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(uri, content);
        self
    }
}

impl ResourceLoader for InMemoryLoader {
    fn load(&self, uri: &str) -> Result<String, XsltError> {
        self.resources
            .get(uri)
            .cloned()
            .ok_or_else(|| XsltError::Resource {
                uri: uri.to_string(),
                message: "not found".to_string(),
            })
    }
}

/// Splits a `#fragment` suffix off a URI.
pub fn split_fragment(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('#') {
        Some((base, frag)) if !frag.is_empty() => (base, Some(frag)),
        Some((base, _)) => (base, None),
        None => (uri, None),
    }
}

/// Resolves `href` against `base`: absolute references pass through,
/// relative ones are joined onto the base's directory and normalized.
pub fn resolve_uri(base: &str, href: &str) -> String {
    if href.contains("://") || href.starts_with('/') {
        return href.to_string();
    }
    let dir = match base.rfind('/') {
        Some(idx) => &base[..=idx],
        None => "",
    };
    normalize_path(&format!("{}{}", dir, href))
}

/// Collapses `.` and `..` segments.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_hrefs_join_onto_base_directory() {
        assert_eq!(resolve_uri("styles/main.xsl", "lib.xsl"), "styles/lib.xsl");
        assert_eq!(
            resolve_uri("styles/main.xsl", "../common/lib.xsl"),
            "common/lib.xsl"
        );
        assert_eq!(resolve_uri("main.xsl", "lib.xsl"), "lib.xsl");
    }

    #[test]
    fn absolute_hrefs_pass_through() {
        assert_eq!(resolve_uri("styles/main.xsl", "/etc/lib.xsl"), "/etc/lib.xsl");
        assert_eq!(
            resolve_uri("styles/main.xsl", "http://example.com/lib.xsl"),
            "http://example.com/lib.xsl"
        );
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("a/./b//c"), "a/b/c");
        assert_eq!(normalize_path("a/b/../c"), "a/c");
        assert_eq!(normalize_path("/a/../../b"), "/b");
        assert_eq!(normalize_path("../a"), "../a");
    }

    #[test]
    fn fragment_splitting() {
        assert_eq!(split_fragment("lib.xsl#part1"), ("lib.xsl", Some("part1")));
        assert_eq!(split_fragment("lib.xsl"), ("lib.xsl", None));
        assert_eq!(split_fragment("lib.xsl#"), ("lib.xsl", None));
    }

    #[test]
    fn in_memory_loader_round_trip() {
        let loader = InMemoryLoader::new().with("a.xsl", "<x/>");
        assert_eq!(loader.load("a.xsl").unwrap(), "<x/>");
        assert!(matches!(
            loader.load("b.xsl"),
            Err(XsltError::Resource { .. })
        ));
    }
}
