//! XML name validation and binding-name utilities
//!
//! This module validates NCNames, derives identifier-shaped binding names
//! from schema local names and namespace URIs, and provides the
//! edit-distance index behind "did you mean" suggestions.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\-\.0-9]*$")
        .unwrap()
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    if name.is_empty() || name.contains(':') {
        return false;
    }
    NCNAME.is_match(name)
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Convert a schema local name to an upper-camel-case identifier
///
/// Hyphens, dots and underscores are treated as word separators; a leading
/// digit is prefixed with an underscore.
pub fn upper_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' || c == '.' || c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        out.insert(0, '_');
    }
    out
}

/// Derive a package path from a namespace URI
///
/// `http://www.example.com/po/v1` becomes `com.example.po.v1`,
/// `urn:acme:billing` becomes `acme.billing`. An absent or unusable URI
/// yields `noNamespace`.
pub fn package_for_namespace(uri: Option<&str>) -> String {
    let uri = match uri {
        Some(u) if !u.is_empty() => u,
        _ => return "noNamespace".to_string(),
    };

    let mut segments: Vec<String> = Vec::new();
    if let Some(rest) = uri.strip_prefix("urn:") {
        segments.extend(rest.split(':').map(clean_package_segment));
    } else {
        let rest = uri
            .strip_prefix("http://")
            .or_else(|| uri.strip_prefix("https://"))
            .unwrap_or(uri);
        let mut parts = rest.split('/');
        if let Some(host) = parts.next() {
            let host = host.strip_prefix("www.").unwrap_or(host);
            for seg in host.split('.').rev() {
                segments.push(clean_package_segment(seg));
            }
        }
        segments.extend(parts.map(clean_package_segment));
    }

    let segments: Vec<String> = segments.into_iter().filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "noNamespace".to_string()
    } else {
        segments.join(".")
    }
}

fn clean_package_segment(seg: &str) -> String {
    let mut out: String = seg
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        out.insert(0, '_');
    }
    out
}

/// Levenshtein edit distance between two names
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Index of visible names used to compute "did you mean" suggestions
#[derive(Debug, Default)]
pub struct MisspellingIndex {
    names: Vec<String>,
}

impl MisspellingIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a visible name
    pub fn add(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// The closest known name, if it is close enough to be a plausible typo
    ///
    /// A candidate qualifies when its edit distance is at most one third of
    /// the query length (minimum 1, maximum 4).
    pub fn suggest(&self, query: &str) -> Option<&str> {
        let budget = (query.chars().count() / 3).clamp(1, 4);
        self.names
            .iter()
            .map(|n| (edit_distance(query, n), n))
            .filter(|(d, n)| *d <= budget && n.as_str() != query)
            .min_by_key(|(d, _)| *d)
            .map(|(_, n)| n.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ncname() {
        assert!(is_valid_ncname("element"));
        assert!(is_valid_ncname("my-element"));
        assert!(is_valid_ncname("_element"));

        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("prefix:element"));
        assert!(!is_valid_ncname("123element"));
    }

    #[test]
    fn test_validate_ncname() {
        assert!(validate_ncname("element").is_ok());
        assert!(validate_ncname("1st").is_err());
    }

    #[test]
    fn test_upper_camel_case() {
        assert_eq!(upper_camel_case("purchase-order"), "PurchaseOrder");
        assert_eq!(upper_camel_case("shipTo"), "ShipTo");
        assert_eq!(upper_camel_case("a.b_c"), "ABC");
        assert_eq!(upper_camel_case("3d-model"), "_3dModel");
    }

    #[test]
    fn test_package_for_namespace() {
        assert_eq!(
            package_for_namespace(Some("http://www.example.com/po/v1")),
            "com.example.po.v1"
        );
        assert_eq!(package_for_namespace(Some("urn:acme:billing")), "acme.billing");
        assert_eq!(package_for_namespace(None), "noNamespace");
        assert_eq!(package_for_namespace(Some("")), "noNamespace");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn test_misspelling_suggestion() {
        let mut index = MisspellingIndex::new();
        index.add("PurchaseOrderType");
        index.add("ItemsType");

        assert_eq!(index.suggest("PurchaseOrdreType"), Some("PurchaseOrderType"));
        assert_eq!(index.suggest("ItemsTyp"), Some("ItemsType"));
        assert_eq!(index.suggest("CompletelyDifferent"), None);
    }
}
