//! Handle pool
//!
//! Every component of a compiled type system gets a stable, printable
//! handle used both as its in-memory cross-reference key and as its
//! on-disk record name. Comparison is case-insensitive so handles stay
//! collision-free on case-insensitive filesystems.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::compiler::components::ComponentKind;

/// Handle prefix marking a reference into another compiled type system
pub const EXTERNAL_HANDLE_PREFIX: &str = "_XR_";

/// Format an external reference handle
pub fn format_external(system: &str, handle: &str) -> String {
    format!("{}{}:{}", EXTERNAL_HANDLE_PREFIX, system, handle)
}

/// Split an external reference handle into (system, handle)
pub fn parse_external(handle: &str) -> Option<(&str, &str)> {
    handle
        .strip_prefix(EXTERNAL_HANDLE_PREFIX)
        .and_then(|rest| rest.split_once(':'))
}

/// Bijection between components and handles within one type system
#[derive(Debug, Clone, Default)]
pub struct HandlePool {
    handles: IndexMap<String, ComponentKind>,
    lowered: HashSet<String>,
}

impl HandlePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh handle derived from a base name
    ///
    /// The base is sanitized to printable identifier characters and given
    /// the category suffix; a numeric suffix disambiguates collisions,
    /// compared case-insensitively. The first occupant keeps the bare name.
    pub fn assign(&mut self, base: &str, kind: ComponentKind) -> String {
        let stem = format!("{}{}", sanitize(base), kind.handle_suffix());
        let mut candidate = stem.clone();
        let mut counter = 1u32;
        while self.lowered.contains(&candidate.to_lowercase()) {
            counter += 1;
            candidate = format!("{}{}", stem, counter);
        }
        self.lowered.insert(candidate.to_lowercase());
        self.handles.insert(candidate.clone(), kind);
        candidate
    }

    /// Register a handle read back from a persisted index
    pub fn register(&mut self, handle: String, kind: ComponentKind) {
        self.lowered.insert(handle.to_lowercase());
        self.handles.insert(handle, kind);
    }

    /// The kind recorded for a handle
    pub fn kind_of(&self, handle: &str) -> Option<ComponentKind> {
        self.handles.get(handle).copied()
    }

    /// Whether the pool contains a handle
    pub fn contains(&self, handle: &str) -> bool {
        self.handles.contains_key(handle)
    }

    /// All handles in assignment order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ComponentKind)> {
        self.handles.iter().map(|(h, k)| (h.as_str(), *k))
    }

    /// Number of assigned handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

fn sanitize(base: &str) -> String {
    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_with_suffix() {
        let mut pool = HandlePool::new();
        assert_eq!(pool.assign("PurchaseOrder", ComponentKind::Type), "PurchaseOrderType");
        assert_eq!(pool.assign("item", ComponentKind::Element), "itemElement");
        assert_eq!(pool.kind_of("itemElement"), Some(ComponentKind::Element));
    }

    #[test]
    fn test_case_insensitive_collision_numbering() {
        let mut pool = HandlePool::new();
        assert_eq!(pool.assign("Foo", ComponentKind::Type), "FooType");
        assert_eq!(pool.assign("foo", ComponentKind::Type), "fooType2");
        assert_eq!(pool.assign("FOO", ComponentKind::Type), "FOOType3");
    }

    #[test]
    fn test_sanitize_unfriendly_names() {
        let mut pool = HandlePool::new();
        let h = pool.assign("my name.v2", ComponentKind::ModelGroup);
        assert_eq!(h, "my_name_v2ModelGroup");
    }

    #[test]
    fn test_external_handles() {
        let h = format_external("billing", "InvoiceType");
        assert_eq!(h, "_XR_billing:InvoiceType");
        assert_eq!(parse_external(&h), Some(("billing", "InvoiceType")));
        assert_eq!(parse_external("InvoiceType"), None);
    }
}
