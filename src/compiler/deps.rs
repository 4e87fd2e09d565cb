//! Schema dependency tracking
//!
//! Records which source files touch which target namespaces and which
//! namespaces import which, then computes minimal recompilation sets for
//! incremental builds. Transitive-closure results are memoized and the
//! memo is rebuilt whenever an edge changes.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

use crate::error::Result;
use crate::parsed::ParsedDocument;

/// Fetches a source file that must be recompiled but was not among the
/// modified inputs
pub trait SourceResolver {
    /// Re-fetch and parse one source file
    fn fetch(&self, file: &str) -> Result<ParsedDocument>;
}

/// Key under which a (possibly absent) namespace is tracked
pub fn namespace_key(namespace: Option<&str>) -> String {
    namespace.unwrap_or("").to_string()
}

/// The files and namespaces an incremental run must recompile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecompileSet {
    /// Namespaces whose definitions are invalidated
    pub namespaces: IndexSet<String>,
    /// Files that must be re-read and recompiled
    pub files: IndexSet<String>,
}

/// Bipartite graph of {source file <-> target namespace} edges plus
/// namespace dependency edges
#[derive(Debug, Clone, Default)]
pub struct SchemaDependencies {
    file_namespaces: IndexMap<String, IndexSet<String>>,
    namespace_files: IndexMap<String, IndexSet<String>>,
    edges: IndexMap<String, IndexSet<String>>,
    dependents_memo: HashMap<String, IndexSet<String>>,
}

impl SchemaDependencies {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one parsed document's edges
    pub fn record_document(&mut self, doc: &ParsedDocument) {
        let ns = namespace_key(doc.target_namespace.as_deref());
        self.record_file(&doc.source_file, &ns);
        for import in &doc.imports {
            // Includes stay within the target namespace; imports cross it.
            let imported = namespace_key(import.namespace.as_deref().or(doc.target_namespace.as_deref()));
            self.record_dependency(&ns, &imported);
        }
    }

    /// Record that a file contributes to a namespace
    pub fn record_file(&mut self, file: &str, namespace: &str) {
        self.file_namespaces
            .entry(file.to_string())
            .or_default()
            .insert(namespace.to_string());
        self.namespace_files
            .entry(namespace.to_string())
            .or_default()
            .insert(file.to_string());
        self.dependents_memo.clear();
    }

    /// Record that `from` depends on `on`
    pub fn record_dependency(&mut self, from: &str, on: &str) {
        if from == on {
            return;
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(on.to_string());
        self.dependents_memo.clear();
    }

    /// The namespaces a file contributes to
    pub fn namespaces_of(&self, file: &str) -> IndexSet<String> {
        self.file_namespaces.get(file).cloned().unwrap_or_default()
    }

    /// The files composing a namespace
    pub fn files_of(&self, namespace: &str) -> IndexSet<String> {
        self.namespace_files
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Every namespace that (transitively) depends on the given one,
    /// including itself; memoized
    pub fn dependents_of(&mut self, namespace: &str) -> IndexSet<String> {
        if let Some(hit) = self.dependents_memo.get(namespace) {
            return hit.clone();
        }
        let mut result: IndexSet<String> = IndexSet::new();
        result.insert(namespace.to_string());
        let mut frontier = vec![namespace.to_string()];
        while let Some(current) = frontier.pop() {
            for (from, targets) in &self.edges {
                if targets.contains(&current) && result.insert(from.clone()) {
                    frontier.push(from.clone());
                }
            }
        }
        self.dependents_memo
            .insert(namespace.to_string(), result.clone());
        result
    }

    /// The minimal recompilation set for a batch of modified files
    pub fn recompile_set(&mut self, modified_files: &[&str]) -> RecompileSet {
        let mut touched: IndexSet<String> = IndexSet::new();
        for file in modified_files {
            for ns in self.namespaces_of(file) {
                touched.insert(ns);
            }
        }
        let mut namespaces: IndexSet<String> = IndexSet::new();
        for ns in &touched {
            for dependent in self.dependents_of(ns) {
                namespaces.insert(dependent);
            }
        }
        let mut files: IndexSet<String> = IndexSet::new();
        for file in modified_files {
            files.insert((*file).to_string());
        }
        for ns in &namespaces {
            for file in self.files_of(ns) {
                files.insert(file);
            }
        }
        RecompileSet { namespaces, files }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed::ParsedImport;

    fn graph() -> SchemaDependencies {
        // a.xsd defines A and imports B; b.xsd defines B; c.xsd defines C,
        // unrelated to either.
        let mut deps = SchemaDependencies::new();
        let mut a = ParsedDocument::new("a.xsd", Some("urn:A"));
        a.imports.push(ParsedImport {
            namespace: Some("urn:B".to_string()),
            location: Some("b.xsd".to_string()),
        });
        deps.record_document(&a);
        deps.record_document(&ParsedDocument::new("b.xsd", Some("urn:B")));
        deps.record_document(&ParsedDocument::new("c.xsd", Some("urn:C")));
        deps
    }

    #[test]
    fn test_dependents_closure() {
        let mut deps = graph();
        let of_b = deps.dependents_of("urn:B");
        assert!(of_b.contains("urn:B"));
        assert!(of_b.contains("urn:A"));
        assert!(!of_b.contains("urn:C"));
    }

    #[test]
    fn test_recompile_set_is_minimal() {
        let mut deps = graph();
        let set = deps.recompile_set(&["b.xsd"]);
        assert!(set.namespaces.contains("urn:A"));
        assert!(set.namespaces.contains("urn:B"));
        assert!(!set.namespaces.contains("urn:C"));
        assert!(set.files.contains("a.xsd"));
        assert!(set.files.contains("b.xsd"));
        assert!(!set.files.contains("c.xsd"));
    }

    #[test]
    fn test_modifying_leaf_only_touches_leaf() {
        let mut deps = graph();
        let set = deps.recompile_set(&["a.xsd"]);
        assert_eq!(set.files.len(), 1);
        assert!(set.files.contains("a.xsd"));
    }

    #[test]
    fn test_memo_invalidation() {
        let mut deps = graph();
        let before = deps.dependents_of("urn:C");
        assert_eq!(before.len(), 1);
        let mut d = ParsedDocument::new("d.xsd", Some("urn:D"));
        d.imports.push(ParsedImport {
            namespace: Some("urn:C".to_string()),
            location: None,
        });
        deps.record_document(&d);
        let after = deps.dependents_of("urn:C");
        assert!(after.contains("urn:D"));
    }

    #[test]
    fn test_transitive_chain() {
        let mut deps = SchemaDependencies::new();
        deps.record_file("a.xsd", "urn:A");
        deps.record_file("b.xsd", "urn:B");
        deps.record_file("c.xsd", "urn:C");
        deps.record_dependency("urn:A", "urn:B");
        deps.record_dependency("urn:B", "urn:C");
        let set = deps.recompile_set(&["c.xsd"]);
        assert!(set.files.contains("a.xsd"));
        assert!(set.files.contains("b.xsd"));
        assert!(set.files.contains("c.xsd"));
    }
}
