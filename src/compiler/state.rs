//! Compiler session state
//!
//! The mutable, thread-confined context shared by every stage of one
//! compilation: component arenas, insertion-ordered symbol tables, the
//! recursion guard, the anonymous-type fingerprint table, the diagnostics
//! sink and the linker. It is passed explicitly to every resolution
//! function and is discarded when the compilation ends.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

use crate::diagnostics::DiagnosticSink;
use crate::names::MisspellingIndex;
use crate::namespaces::QName;
use crate::parsed::{ParsedAttribute, ParsedAttributeGroup, ParsedElement, ParsedParticle};
use crate::typesystem::Linker;

use super::builtins;
use super::components::{
    AttrGroupId, AttrId, AttributeDecl, AttributeGroupDef, ComponentKind, ElemId, ElementDecl,
    GroupId, IdentId, IdentityConstraintDef, ModelGroupDef, SchemaType, TypeDetail, TypeId,
    TypeRef,
};

/// The state of one compilation
#[derive(Debug)]
pub struct CompilerState {
    /// Type arena
    pub types: Vec<SchemaType>,
    /// Element arena
    pub elements: Vec<ElementDecl>,
    /// Attribute arena
    pub attributes: Vec<AttributeDecl>,
    /// Model group arena
    pub groups: Vec<ModelGroupDef>,
    /// Attribute group arena
    pub attribute_groups: Vec<AttributeGroupDef>,
    /// Identity constraint arena
    pub identities: Vec<IdentityConstraintDef>,

    /// Global types by qualified name
    pub type_table: IndexMap<QName, TypeId>,
    /// Global elements by qualified name
    pub element_table: IndexMap<QName, ElemId>,
    /// Global attributes by qualified name
    pub attribute_table: IndexMap<QName, AttrId>,
    /// Model groups by qualified name
    pub group_table: IndexMap<QName, GroupId>,
    /// Attribute groups by qualified name
    pub attribute_group_table: IndexMap<QName, AttrGroupId>,
    /// Identity constraints by qualified name
    pub identity_table: IndexMap<QName, IdentId>,

    /// Raw parse bodies of element shells
    pub pending_elements: HashMap<u32, ParsedElement>,
    /// Raw parse bodies of attribute shells
    pub pending_attributes: HashMap<u32, ParsedAttribute>,
    /// Raw parse bodies of model group shells
    pub pending_groups: HashMap<u32, ParsedParticle>,
    /// Raw parse bodies of attribute group shells
    pub pending_attribute_groups: HashMap<u32, ParsedAttributeGroup>,

    resolving: HashSet<(ComponentKind, u32)>,
    anon_fingerprints: HashMap<String, TypeId>,

    /// Diagnostics accumulated during the run
    pub sink: DiagnosticSink,
    /// Previously compiled type systems consulted for foreign references
    pub linker: Linker,
    /// Whether an erroring run may still produce an (incomplete) system
    pub partial_ok: bool,
}

impl CompilerState {
    /// Create the state for one compilation
    pub fn new(linker: Linker, partial_ok: bool) -> Self {
        Self {
            types: Vec::new(),
            elements: Vec::new(),
            attributes: Vec::new(),
            groups: Vec::new(),
            attribute_groups: Vec::new(),
            identities: Vec::new(),
            type_table: IndexMap::new(),
            element_table: IndexMap::new(),
            attribute_table: IndexMap::new(),
            group_table: IndexMap::new(),
            attribute_group_table: IndexMap::new(),
            identity_table: IndexMap::new(),
            pending_elements: HashMap::new(),
            pending_attributes: HashMap::new(),
            pending_groups: HashMap::new(),
            pending_attribute_groups: HashMap::new(),
            resolving: HashSet::new(),
            anon_fingerprints: HashMap::new(),
            sink: DiagnosticSink::new(),
            linker,
            partial_ok,
        }
    }

    /// Add a type to the arena
    pub fn add_type(&mut self, name: Option<QName>, detail: TypeDetail) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(SchemaType::shell(id, name, detail));
        id
    }

    /// Enter the recursion guard; false when the component is already
    /// being resolved (a cyclic dependency)
    pub fn guard_enter(&mut self, kind: ComponentKind, id: u32) -> bool {
        self.resolving.insert((kind, id))
    }

    /// Leave the recursion guard
    pub fn guard_exit(&mut self, kind: ComponentKind, id: u32) {
        self.resolving.remove(&(kind, id));
    }

    /// Look up a previously created anonymous type by its enclosing-group
    /// fingerprint
    pub fn anonymous_for_fingerprint(&self, fingerprint: &str) -> Option<TypeId> {
        self.anon_fingerprints.get(fingerprint).copied()
    }

    /// Record an anonymous type's enclosing-group fingerprint
    pub fn record_fingerprint(&mut self, fingerprint: String, id: TypeId) {
        self.anon_fingerprints.insert(fingerprint, id);
    }

    /// Resolve a type reference by qualified name: local tables first, then
    /// the built-in type system, then the linker. None when nowhere found.
    pub fn find_type(&self, name: &QName) -> Option<TypeRef> {
        if let Some(id) = self.type_table.get(name) {
            return Some(TypeRef::Local(*id));
        }
        if let Some(id) = builtins::builtin_by_qname(name) {
            return Some(TypeRef::Builtin(id));
        }
        self.linker
            .find_type(name)
            .map(|(system, handle)| TypeRef::External { system, handle })
    }

    /// A "did you mean" suggestion for a type name that did not resolve
    pub fn type_suggestion(&self, name: &QName) -> Option<String> {
        let mut index = MisspellingIndex::new();
        for known in self.type_table.keys() {
            index.add(known.local_name.clone());
        }
        for known in self.linker.type_names() {
            index.add(known.local_name);
        }
        if name.namespace.as_deref() == Some(builtins::XSD_NAMESPACE) {
            for id in 0..builtins::builtin_count() {
                index.add(builtins::builtin(builtins::BuiltinId(id)).name);
            }
        }
        index.suggest(&name.local_name).map(|s| s.to_string())
    }

    /// Base depth of whatever a type reference points at
    pub fn depth_of(&self, type_ref: &TypeRef) -> u32 {
        match type_ref {
            TypeRef::Local(id) => self.types[id.0 as usize].base_depth,
            TypeRef::Builtin(id) => builtins::builtin(*id).depth,
            // Foreign depths are not tracked locally; the chain below the
            // reference is what the invariant checks.
            TypeRef::External { .. } | TypeRef::Handle(_) => 0,
            TypeRef::None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::components::SimpleDetail;

    fn state() -> CompilerState {
        CompilerState::new(Linker::new(), false)
    }

    #[test]
    fn test_recursion_guard() {
        let mut s = state();
        assert!(s.guard_enter(ComponentKind::Type, 0));
        assert!(!s.guard_enter(ComponentKind::Type, 0));
        assert!(s.guard_enter(ComponentKind::Type, 1));
        s.guard_exit(ComponentKind::Type, 0);
        assert!(s.guard_enter(ComponentKind::Type, 0));
    }

    #[test]
    fn test_find_type_prefers_local() {
        let mut s = state();
        let q = QName::namespaced(builtins::XSD_NAMESPACE, "string");
        let id = s.add_type(Some(q.clone()), TypeDetail::Simple(SimpleDetail::default()));
        s.type_table.insert(q.clone(), id);
        assert_eq!(s.find_type(&q), Some(TypeRef::Local(id)));
    }

    #[test]
    fn test_find_type_falls_back_to_builtin() {
        let s = state();
        let q = QName::namespaced(builtins::XSD_NAMESPACE, "int");
        assert_eq!(s.find_type(&q), Some(TypeRef::Builtin(builtins::INT)));
        assert_eq!(s.find_type(&QName::local("nowhere")), None);
    }

    #[test]
    fn test_fingerprint_dedup() {
        let mut s = state();
        let id = s.add_type(None, TypeDetail::Simple(SimpleDetail::default()));
        s.record_fingerprint("g1|g2|item".to_string(), id);
        assert_eq!(s.anonymous_for_fingerprint("g1|g2|item"), Some(id));
        assert_eq!(s.anonymous_for_fingerprint("g1|item"), None);
    }
}
