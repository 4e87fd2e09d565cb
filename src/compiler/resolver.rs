//! Resolution engine
//!
//! Translates parsed documents into component shells, then resolves every
//! component top-down over its structural dependencies. The recursion
//! guard breaks cyclic dependencies by substituting the category's
//! universal base type; anonymous types nested through named-group
//! recursion are deduplicated by fingerprinting the chain of enclosing
//! group references, so resolution always terminates.

use indexmap::IndexMap;

use crate::diagnostics::{codes, Diagnostic};
use crate::names;
use crate::namespaces::QName;
use crate::parsed::{
    ParsedAttributeUse, ParsedComplexType, ParsedDocument, ParsedParticle, ParsedSimpleType,
    ParsedTerm, ParsedWildcard,
};

use super::builtins;
use super::components::{
    AnonymousContext, AttrGroupId, AttrId, AttributeDecl, AttributeGroupDef, AttributeUseDecl,
    ComponentKind, DerivationKind, ElemId, ElementDecl, GroupId, IdentId, IdentityCategory,
    IdentityConstraintDef, Lifecycle, ModelGroupDef, ParsedTypeBody, PropertyOccurrence,
    SchemaProperty, SimpleDetail, TypeDetail, TypeId, TypeRef,
};
use super::particles::{
    ElementParticle, NamespaceConstraint, Occurs, Particle, ParticleTerm, ProcessContents,
    WildcardParticle,
};
use super::simple_types;
use super::state::CompilerState;

/// Walk context threaded through particle translation
#[derive(Debug, Clone, Default)]
pub(crate) struct WalkCtx {
    /// Source file of the component being resolved
    pub source_file: Option<String>,
    /// Target namespace of the enclosing declaration
    pub target_namespace: Option<String>,
    /// Chain of named-group references currently being expanded
    pub chain: Vec<QName>,
}

impl WalkCtx {
    fn fingerprint(&self, container: &QName) -> String {
        let mut groups: Vec<String> = self.chain.iter().map(|q| q.to_string()).collect();
        groups.sort();
        groups.dedup();
        format!("{}#{}", groups.join("/"), container)
    }
}

// ---------------------------------------------------------------------------
// Translation: parsed documents -> component shells
// ---------------------------------------------------------------------------

/// Create shells for every global component of the given documents
pub(crate) fn translate(state: &mut CompilerState, docs: &[ParsedDocument]) {
    for doc in docs {
        let ns = doc.target_namespace.clone();
        for st in &doc.simple_types {
            add_global_type(
                state,
                &ns,
                &doc.source_file,
                st.name.as_deref(),
                ParsedTypeBody::Simple(st.clone()),
                false,
            );
        }
        for ct in &doc.complex_types {
            add_global_type(
                state,
                &ns,
                &doc.source_file,
                ct.name.as_deref(),
                ParsedTypeBody::Complex(ct.clone()),
                false,
            );
        }
        for redef in &doc.redefinitions {
            for st in &redef.simple_types {
                add_global_type(
                    state,
                    &ns,
                    &doc.source_file,
                    st.name.as_deref(),
                    ParsedTypeBody::Simple(st.clone()),
                    true,
                );
            }
            for ct in &redef.complex_types {
                add_global_type(
                    state,
                    &ns,
                    &doc.source_file,
                    ct.name.as_deref(),
                    ParsedTypeBody::Complex(ct.clone()),
                    true,
                );
            }
        }
        for el in &doc.elements {
            add_global_element(state, &ns, &doc.source_file, el);
        }
        for at in &doc.attributes {
            add_global_attribute(state, &ns, &doc.source_file, at);
        }
        for g in &doc.groups {
            add_global_group(state, &ns, &doc.source_file, g);
        }
        for ag in &doc.attribute_groups {
            add_global_attribute_group(state, &ns, &doc.source_file, ag);
        }
    }
}

fn check_global_name(
    state: &mut CompilerState,
    name: Option<&str>,
    source_file: &str,
    what: &str,
) -> Option<String> {
    match name {
        Some(n) if names::is_valid_ncname(n) => Some(n.to_string()),
        Some(n) => {
            state.sink.push(
                Diagnostic::error(
                    codes::MALFORMED_INPUT,
                    format!("'{}' is not a valid {} name", n, what),
                )
                .with_location(source_file),
            );
            None
        }
        None => {
            state.sink.push(
                Diagnostic::error(
                    codes::MALFORMED_INPUT,
                    format!("a global {} must be named", what),
                )
                .with_location(source_file),
            );
            None
        }
    }
}

fn add_global_type(
    state: &mut CompilerState,
    ns: &Option<String>,
    source_file: &str,
    name: Option<&str>,
    body: ParsedTypeBody,
    redefining: bool,
) {
    let Some(local) = check_global_name(state, name, source_file, "type") else {
        return;
    };
    let qname = QName::new(ns.as_deref(), local);
    let existing = state.type_table.get(&qname).copied();
    match existing {
        Some(old) if redefining => {
            let detail = match &body {
                ParsedTypeBody::Simple(_) => TypeDetail::Simple(SimpleDetail::default()),
                ParsedTypeBody::Complex(_) => TypeDetail::Complex(Default::default()),
            };
            let id = state.add_type(Some(qname.clone()), detail);
            {
                let t = &mut state.types[id.0 as usize];
                t.redefines = Some(old);
                t.source_file = Some(source_file.to_string());
                t.parsed = Some(Box::new(body));
            }
            state.type_table.insert(qname, id);
        }
        Some(_) => {
            state.sink.push(
                Diagnostic::error(
                    codes::DUPLICATE_GLOBAL,
                    format!("duplicate global type '{}'", qname),
                )
                .with_location(source_file),
            );
        }
        None => {
            if redefining {
                state.sink.push(
                    Diagnostic::error(
                        codes::MALFORMED_INPUT,
                        format!("redefined type '{}' has no original definition", qname),
                    )
                    .with_location(source_file),
                );
            }
            let detail = match &body {
                ParsedTypeBody::Simple(_) => TypeDetail::Simple(SimpleDetail::default()),
                ParsedTypeBody::Complex(_) => TypeDetail::Complex(Default::default()),
            };
            let id = state.add_type(Some(qname.clone()), detail);
            {
                let t = &mut state.types[id.0 as usize];
                t.source_file = Some(source_file.to_string());
                t.parsed = Some(Box::new(body));
            }
            state.type_table.insert(qname, id);
        }
    }
}

fn add_global_element(
    state: &mut CompilerState,
    ns: &Option<String>,
    source_file: &str,
    parsed: &crate::parsed::ParsedElement,
) {
    let Some(local) = check_global_name(state, Some(&parsed.name), source_file, "element") else {
        return;
    };
    let qname = QName::new(ns.as_deref(), local);
    if state.element_table.contains_key(&qname) {
        state.sink.push(
            Diagnostic::error(
                codes::DUPLICATE_GLOBAL,
                format!("duplicate global element '{}'", qname),
            )
            .with_location(source_file),
        );
        return;
    }
    let id = ElemId(state.elements.len() as u32);
    let mut decl = ElementDecl {
        id,
        name: qname.clone(),
        source_file: Some(source_file.to_string()),
        lifecycle: Lifecycle::Shell,
        type_ref: TypeRef::None,
        nillable: parsed.nillable,
        is_abstract: parsed.is_abstract,
        default_value: parsed.default_value.clone(),
        fixed_value: parsed.fixed_value.clone(),
        substitution_head: parsed.substitution_group.clone(),
        substitution_members: Vec::new(),
        identity_constraints: Vec::new(),
        binding_name: None,
        handle: None,
    };

    for ic in &parsed.identity_constraints {
        let Some(ic_local) = check_global_name(state, Some(&ic.name), source_file, "identity constraint")
        else {
            continue;
        };
        let ic_qname = QName::new(ns.as_deref(), ic_local);
        if state.identity_table.contains_key(&ic_qname) {
            state.sink.push(
                Diagnostic::error(
                    codes::DUPLICATE_GLOBAL,
                    format!("duplicate identity constraint '{}'", ic_qname),
                )
                .with_location(source_file),
            );
            continue;
        }
        let category = match ic.category.as_str() {
            "unique" => IdentityCategory::Unique,
            "key" => IdentityCategory::Key,
            "keyref" => IdentityCategory::KeyRef,
            other => {
                state.sink.push(
                    Diagnostic::error(
                        codes::MALFORMED_INPUT,
                        format!("unknown identity constraint category '{}'", other),
                    )
                    .with_location(source_file),
                );
                IdentityCategory::Unique
            }
        };
        let ic_id = IdentId(state.identities.len() as u32);
        state.identities.push(IdentityConstraintDef {
            id: ic_id,
            name: ic_qname.clone(),
            source_file: Some(source_file.to_string()),
            category,
            selector: ic.selector.clone(),
            fields: ic.fields.clone(),
            referenced_key: ic.refer.clone(),
            handle: None,
        });
        state.identity_table.insert(ic_qname.clone(), ic_id);
        decl.identity_constraints.push(ic_qname);
    }

    state.elements.push(decl);
    state.element_table.insert(qname, id);
    state.pending_elements.insert(id.0, parsed.clone());
}

fn add_global_attribute(
    state: &mut CompilerState,
    ns: &Option<String>,
    source_file: &str,
    parsed: &crate::parsed::ParsedAttribute,
) {
    let Some(local) = check_global_name(state, Some(&parsed.name), source_file, "attribute") else {
        return;
    };
    let qname = QName::new(ns.as_deref(), local);
    if state.attribute_table.contains_key(&qname) {
        state.sink.push(
            Diagnostic::error(
                codes::DUPLICATE_GLOBAL,
                format!("duplicate global attribute '{}'", qname),
            )
            .with_location(source_file),
        );
        return;
    }
    let id = AttrId(state.attributes.len() as u32);
    state.attributes.push(AttributeDecl {
        id,
        name: qname.clone(),
        source_file: Some(source_file.to_string()),
        lifecycle: Lifecycle::Shell,
        type_ref: TypeRef::None,
        default_value: parsed.default_value.clone(),
        fixed_value: parsed.fixed_value.clone(),
        binding_name: None,
        handle: None,
    });
    state.attribute_table.insert(qname, id);
    state.pending_attributes.insert(id.0, parsed.clone());
}

fn add_global_group(
    state: &mut CompilerState,
    ns: &Option<String>,
    source_file: &str,
    parsed: &crate::parsed::ParsedGroup,
) {
    let Some(local) = check_global_name(state, Some(&parsed.name), source_file, "group") else {
        return;
    };
    let qname = QName::new(ns.as_deref(), local);
    if state.group_table.contains_key(&qname) {
        state.sink.push(
            Diagnostic::error(
                codes::DUPLICATE_GLOBAL,
                format!("duplicate model group '{}'", qname),
            )
            .with_location(source_file),
        );
        return;
    }
    let id = GroupId(state.groups.len() as u32);
    state.groups.push(ModelGroupDef {
        id,
        name: qname.clone(),
        source_file: Some(source_file.to_string()),
        lifecycle: Lifecycle::Shell,
        particle: None,
        handle: None,
    });
    state.group_table.insert(qname, id);
    state.pending_groups.insert(id.0, parsed.particle.clone());
}

fn add_global_attribute_group(
    state: &mut CompilerState,
    ns: &Option<String>,
    source_file: &str,
    parsed: &crate::parsed::ParsedAttributeGroup,
) {
    let Some(local) = check_global_name(state, Some(&parsed.name), source_file, "attribute group")
    else {
        return;
    };
    let qname = QName::new(ns.as_deref(), local);
    if state.attribute_group_table.contains_key(&qname) {
        state.sink.push(
            Diagnostic::error(
                codes::DUPLICATE_GLOBAL,
                format!("duplicate attribute group '{}'", qname),
            )
            .with_location(source_file),
        );
        return;
    }
    let id = AttrGroupId(state.attribute_groups.len() as u32);
    state.attribute_groups.push(AttributeGroupDef {
        id,
        name: qname.clone(),
        source_file: Some(source_file.to_string()),
        lifecycle: Lifecycle::Shell,
        attributes: Vec::new(),
        wildcard: None,
        handle: None,
    });
    state.attribute_group_table.insert(qname, id);
    state.pending_attribute_groups.insert(id.0, parsed.clone());
}

// ---------------------------------------------------------------------------
// Resolution driver
// ---------------------------------------------------------------------------

/// Resolve every translated component
pub(crate) fn resolve_all(state: &mut CompilerState) {
    let type_ids: Vec<TypeId> = state.type_table.values().copied().collect();
    for id in type_ids {
        resolve_type(state, id);
    }
    let elem_ids: Vec<ElemId> = state.element_table.values().copied().collect();
    for id in elem_ids {
        resolve_element(state, id);
    }
    let attr_ids: Vec<AttrId> = state.attribute_table.values().copied().collect();
    for id in attr_ids {
        resolve_attribute(state, id);
    }
    let group_ids: Vec<GroupId> = state.group_table.values().copied().collect();
    for id in group_ids {
        resolve_group(state, id);
    }
    let ag_ids: Vec<AttrGroupId> = state.attribute_group_table.values().copied().collect();
    for id in ag_ids {
        resolve_attribute_group(state, id);
    }
    apply_substitution_groups(state);
    check_keyrefs(state);
}

/// Widen element properties by their substitution groups; runs once all
/// elements are resolved so every member is recorded on its head
fn apply_substitution_groups(state: &mut CompilerState) {
    let members_of: Vec<(QName, Vec<QName>)> = state
        .elements
        .iter()
        .filter(|e| !e.substitution_members.is_empty())
        .map(|e| (e.name.clone(), e.substitution_members.clone()))
        .collect();
    if members_of.is_empty() {
        return;
    }
    for t in &mut state.types {
        for prop in &mut t.properties {
            if prop.is_attribute {
                continue;
            }
            if let Some((_, members)) = members_of.iter().find(|(n, _)| *n == prop.name) {
                for m in members {
                    if !prop.accepted_names.contains(m) {
                        prop.accepted_names.push(m.clone());
                    }
                }
            }
        }
    }
}

/// Resolve one type; false when the type is currently being resolved
/// (the caller substitutes the category's universal base)
pub(crate) fn resolve_type(state: &mut CompilerState, id: TypeId) -> bool {
    if state.types[id.0 as usize].lifecycle >= Lifecycle::Resolved {
        return true;
    }
    if !state.guard_enter(ComponentKind::Type, id.0) {
        let name = state.types[id.0 as usize]
            .name
            .as_ref()
            .map(|q| q.to_string())
            .unwrap_or_else(|| "anonymous type".to_string());
        state.sink.push(Diagnostic::error(
            codes::CYCLIC_DEPENDENCY,
            format!("type '{}' depends on itself", name),
        ));
        return false;
    }

    // Inside a redefinition, the redefined name denotes the original.
    let redirect = state.types[id.0 as usize].redefines.and_then(|old| {
        state.types[id.0 as usize].name.clone().map(|name| (name, old))
    });
    if let Some((name, old)) = &redirect {
        state.type_table.insert(name.clone(), *old);
    }

    let parsed = state.types[id.0 as usize].parsed.take();
    let source_file = state.types[id.0 as usize].source_file.clone();
    match parsed.map(|b| *b) {
        Some(ParsedTypeBody::Simple(body)) => {
            simple_types::resolve_simple_body(state, id, body.derivation, source_file);
        }
        Some(ParsedTypeBody::Complex(body)) => {
            let mut ctx = WalkCtx {
                source_file,
                target_namespace: state.types[id.0 as usize]
                    .name
                    .as_ref()
                    .and_then(|q| q.namespace.clone()),
                chain: Vec::new(),
            };
            resolve_complex_body(state, id, body, &mut ctx);
        }
        None => {
            // A shell with no body resolves to plain anyType.
            let t = &mut state.types[id.0 as usize];
            t.base = TypeRef::Builtin(builtins::ANY_TYPE);
            t.base_depth = 1;
            t.lifecycle = Lifecycle::Resolved;
        }
    }

    if let Some((name, old)) = redirect {
        state.type_table.insert(name, id);
        // The restated type must derive from the definition it redefines.
        if state.types[id.0 as usize].base != TypeRef::Local(old) {
            let display = state.types[id.0 as usize]
                .name
                .as_ref()
                .map(|q| q.to_string())
                .unwrap_or_default();
            state.sink.push(Diagnostic::error(
                codes::REDEFINITION_MUST_DERIVE,
                format!("redefinition of '{}' must derive from the original definition", display),
            ));
            if let Some(name) = state.types[id.0 as usize].name.clone() {
                state.type_table.insert(name, old);
            }
            resolve_type(state, old);
        }
    }

    state.guard_exit(ComponentKind::Type, id.0);
    true
}

/// Resolve a type reference by qualified name, substituting `fallback`
/// when the name cannot be resolved or the target is cyclic
pub(crate) fn resolve_type_by_name(
    state: &mut CompilerState,
    name: &QName,
    source_file: Option<&str>,
    fallback: TypeRef,
) -> TypeRef {
    match state.find_type(name) {
        Some(TypeRef::Local(id)) => {
            if resolve_type(state, id) {
                TypeRef::Local(id)
            } else {
                fallback
            }
        }
        Some(found) => found,
        None => {
            let mut message = format!("type '{}' not found", name);
            if let Some(suggestion) = state.type_suggestion(name) {
                message.push_str(&format!("; did you mean '{}'?", suggestion));
            }
            let mut d = Diagnostic::error(codes::UNRESOLVED_REF, message);
            if let Some(f) = source_file {
                d = d.with_location(f);
            }
            state.sink.push(d);
            fallback
        }
    }
}

/// Create and resolve an anonymous simple type
pub(crate) fn create_anonymous_simple(
    state: &mut CompilerState,
    parsed: ParsedSimpleType,
    container: QName,
    source_file: Option<String>,
) -> TypeRef {
    let id = state.add_type(None, TypeDetail::Simple(SimpleDetail::default()));
    let ordinal = id.0;
    {
        let t = &mut state.types[id.0 as usize];
        t.anonymous = Some(AnonymousContext { container, ordinal });
        t.source_file = source_file.clone();
    }
    state.guard_enter(ComponentKind::Type, id.0);
    simple_types::resolve_simple_body(state, id, parsed.derivation, source_file);
    state.guard_exit(ComponentKind::Type, id.0);
    TypeRef::Local(id)
}

/// Create (or reuse, by fingerprint) an anonymous complex type shell.
/// Returns the id and whether the shell is new and needs its body resolved.
fn anon_complex_shell(
    state: &mut CompilerState,
    container: &QName,
    ctx: &WalkCtx,
) -> (TypeId, bool) {
    let fingerprint = ctx.fingerprint(container);
    if !ctx.chain.is_empty() {
        if let Some(existing) = state.anonymous_for_fingerprint(&fingerprint) {
            return (existing, false);
        }
    }
    let id = state.add_type(None, TypeDetail::Complex(Default::default()));
    let ordinal = id.0;
    {
        let t = &mut state.types[id.0 as usize];
        t.anonymous = Some(AnonymousContext { container: container.clone(), ordinal });
        t.source_file = ctx.source_file.clone();
    }
    if !ctx.chain.is_empty() {
        state.record_fingerprint(fingerprint, id);
    }
    (id, true)
}

// ---------------------------------------------------------------------------
// Complex types
// ---------------------------------------------------------------------------

fn resolve_complex_body(
    state: &mut CompilerState,
    id: TypeId,
    parsed: ParsedComplexType,
    ctx: &mut WalkCtx,
) {
    let (base_ref, derivation) = match &parsed.derivation {
        Some(d) => {
            let r = resolve_type_by_name(
                state,
                &d.base,
                ctx.source_file.as_deref(),
                TypeRef::Builtin(builtins::ANY_TYPE),
            );
            let kind = if d.is_extension {
                DerivationKind::Extension
            } else {
                DerivationKind::Restriction
            };
            (r, kind)
        }
        None => (TypeRef::Builtin(builtins::ANY_TYPE), DerivationKind::Restriction),
    };

    let depth = state.depth_of(&base_ref) + 1;
    let container = state.types[id.0 as usize]
        .name
        .clone()
        .or_else(|| {
            state.types[id.0 as usize]
                .anonymous
                .as_ref()
                .map(|a| a.container.clone())
        })
        .unwrap_or_else(|| QName::local("anonymous"));

    let content = parsed
        .content
        .and_then(|p| translate_particle(state, p, ctx, &container));

    let mut attributes = Vec::new();
    for a in parsed.attributes {
        if let Some(decl) = translate_attribute_use(state, a, ctx, &container) {
            attributes.push(decl);
        }
    }
    let mut wildcard = parsed.any_attribute.map(|w| translate_wildcard(&w, ctx));
    let mut seen_groups = Vec::new();
    for gname in parsed.attribute_groups {
        expand_attribute_group(state, &gname, &mut attributes, &mut wildcard, ctx, &mut seen_groups);
    }

    {
        let t = &mut state.types[id.0 as usize];
        t.base = base_ref;
        t.base_depth = depth;
        t.derivation = derivation;
        if let TypeDetail::Complex(detail) = &mut t.detail {
            detail.content = content;
            detail.attributes = attributes;
            detail.attr_wildcard = wildcard;
            detail.mixed = parsed.mixed;
        }
        t.lifecycle = Lifecycle::Resolved;
    }

    synthesize_properties(state, id);
}

fn translate_particle(
    state: &mut CompilerState,
    parsed: ParsedParticle,
    ctx: &mut WalkCtx,
    container: &QName,
) -> Option<Particle> {
    let occurs = Occurs::new(parsed.min_occurs, parsed.max_occurs);
    match parsed.term {
        ParsedTerm::Element(local) => {
            let name = QName::new(
                local.namespace.as_deref().or(ctx.target_namespace.as_deref()),
                local.name.clone(),
            );
            let type_ref = if let Some(type_name) = &local.type_name {
                resolve_type_by_name(
                    state,
                    type_name,
                    ctx.source_file.as_deref(),
                    TypeRef::Builtin(builtins::ANY_TYPE),
                )
            } else if let Some(inline) = local.inline_simple {
                create_anonymous_simple(state, *inline, name.clone(), ctx.source_file.clone())
            } else if let Some(inline) = local.inline_complex {
                let (anon_id, created) = anon_complex_shell(state, &name, ctx);
                if created {
                    state.guard_enter(ComponentKind::Type, anon_id.0);
                    resolve_complex_body(state, anon_id, *inline, ctx);
                    state.guard_exit(ComponentKind::Type, anon_id.0);
                }
                TypeRef::Local(anon_id)
            } else {
                TypeRef::Builtin(builtins::ANY_TYPE)
            };
            Some(Particle::element(
                occurs,
                ElementParticle {
                    name,
                    type_ref,
                    nillable: local.nillable,
                    default_value: local.default_value,
                    fixed_value: local.fixed_value,
                },
            ))
        }
        ParsedTerm::ElementRef(name) => {
            element_particle_for_ref(state, &name, ctx).map(|e| Particle::element(occurs, e))
        }
        ParsedTerm::GroupRef(name) => expand_group_ref(state, &name, occurs, ctx, container),
        ParsedTerm::Sequence(children) => {
            let children = translate_children(state, children, ctx, container);
            Some(Particle::sequence(occurs, children))
        }
        ParsedTerm::Choice(children) => {
            let children = translate_children(state, children, ctx, container);
            Some(Particle::choice(occurs, children))
        }
        ParsedTerm::All(children) => {
            let children = translate_children(state, children, ctx, container);
            Some(Particle::all(occurs, children))
        }
        ParsedTerm::Any(w) => Some(Particle {
            occurs,
            term: ParticleTerm::Wildcard(translate_wildcard(&w, ctx)),
        }),
    }
}

fn translate_children(
    state: &mut CompilerState,
    children: Vec<ParsedParticle>,
    ctx: &mut WalkCtx,
    container: &QName,
) -> Vec<Particle> {
    children
        .into_iter()
        .filter_map(|c| translate_particle(state, c, ctx, container))
        .collect()
}

fn element_particle_for_ref(
    state: &mut CompilerState,
    name: &QName,
    ctx: &WalkCtx,
) -> Option<ElementParticle> {
    if let Some(&id) = state.element_table.get(name) {
        // A shell mid-resolution already carries enough for a reference;
        // forcing it here would trip the guard on legitimate recursion.
        if state.elements[id.0 as usize].lifecycle == Lifecycle::Shell {
            resolve_element(state, id);
        }
        let decl = &state.elements[id.0 as usize];
        return Some(ElementParticle {
            name: decl.name.clone(),
            type_ref: decl.type_ref.clone(),
            nillable: decl.nillable,
            default_value: decl.default_value.clone(),
            fixed_value: decl.fixed_value.clone(),
        });
    }
    if let Some((system, handle)) = state.linker.find_element(name) {
        if let Some(sys) = state.linker.system(&system) {
            if let Ok(component) = sys.resolve_handle(&handle) {
                if let Some(decl) = component.as_element() {
                    return Some(ElementParticle {
                        name: decl.name.clone(),
                        type_ref: externalize_ref(decl.type_ref.clone(), &system),
                        nillable: decl.nillable,
                        default_value: decl.default_value.clone(),
                        fixed_value: decl.fixed_value.clone(),
                    });
                }
            }
        }
    }
    let mut d = Diagnostic::error(
        codes::UNRESOLVED_REF,
        format!("element '{}' not found", name),
    );
    if let Some(f) = &ctx.source_file {
        d = d.with_location(f.clone());
    }
    state.sink.push(d);
    None
}

fn expand_group_ref(
    state: &mut CompilerState,
    name: &QName,
    occurs: Occurs,
    ctx: &mut WalkCtx,
    container: &QName,
) -> Option<Particle> {
    let repeats = ctx.chain.iter().filter(|q| *q == name).count();
    if repeats >= 2 {
        let mut d = Diagnostic::error(
            codes::CYCLIC_DEPENDENCY,
            format!("model group '{}' recursively contains itself", name),
        );
        if let Some(f) = &ctx.source_file {
            d = d.with_location(f.clone());
        }
        state.sink.push(d);
        return None;
    }

    if let Some(&gid) = state.group_table.get(name) {
        let body = state.pending_groups.get(&gid.0).cloned();
        let body = match body {
            Some(b) => b,
            None => {
                // Fully trimmed groups keep their resolved particle.
                return state.groups[gid.0 as usize].particle.clone().map(|p| Particle {
                    occurs,
                    term: p.term,
                });
            }
        };
        ctx.chain.push(name.clone());
        let translated = translate_particle(state, body, ctx, container);
        ctx.chain.pop();
        return translated.map(|p| reoccur(p, occurs));
    }

    if let Some((system, handle)) = state.linker.find_group(name) {
        if let Some(sys) = state.linker.system(&system) {
            if let Ok(component) = sys.resolve_handle(&handle) {
                if let crate::typesystem::Component::ModelGroup(def) = component.as_ref() {
                    if let Some(p) = &def.particle {
                        return Some(reoccur(externalize_particle(p.clone(), &system), occurs));
                    }
                }
            }
        }
    }

    let mut d = Diagnostic::error(
        codes::UNRESOLVED_REF,
        format!("model group '{}' not found", name),
    );
    if let Some(f) = &ctx.source_file {
        d = d.with_location(f.clone());
    }
    state.sink.push(d);
    None
}

/// Apply a referencing particle's occurrence bounds to an expanded body
fn reoccur(body: Particle, occurs: Occurs) -> Particle {
    if body.occurs == Occurs::once() {
        Particle { occurs, term: body.term }
    } else {
        Particle { occurs, term: ParticleTerm::Sequence(vec![body]) }
    }
}

fn translate_wildcard(parsed: &ParsedWildcard, ctx: &WalkCtx) -> WildcardParticle {
    let constraint = match parsed.namespace.trim() {
        "##any" | "" => NamespaceConstraint::Any,
        "##other" => NamespaceConstraint::Other(ctx.target_namespace.clone()),
        list => NamespaceConstraint::Enumerated(
            list.split_whitespace()
                .map(|token| match token {
                    "##local" => None,
                    "##targetNamespace" => ctx.target_namespace.clone(),
                    uri => Some(uri.to_string()),
                })
                .collect(),
        ),
    };
    let process_contents = match parsed.process_contents.as_str() {
        "lax" => ProcessContents::Lax,
        "skip" => ProcessContents::Skip,
        _ => ProcessContents::Strict,
    };
    WildcardParticle { constraint, process_contents }
}

fn translate_attribute_use(
    state: &mut CompilerState,
    parsed: ParsedAttributeUse,
    ctx: &WalkCtx,
    container: &QName,
) -> Option<AttributeUseDecl> {
    if parsed.use_mode.as_deref() == Some("prohibited") {
        return None;
    }
    let required = parsed.use_mode.as_deref() == Some("required");

    if let Some(reference) = &parsed.reference {
        if let Some(&aid) = state.attribute_table.get(reference) {
            if state.attributes[aid.0 as usize].lifecycle == Lifecycle::Shell {
                resolve_attribute(state, aid);
            }
            let decl = &state.attributes[aid.0 as usize];
            return Some(AttributeUseDecl {
                name: decl.name.clone(),
                type_ref: decl.type_ref.clone(),
                required,
                default_value: parsed.default_value.or_else(|| decl.default_value.clone()),
                fixed_value: parsed.fixed_value.or_else(|| decl.fixed_value.clone()),
            });
        }
        if let Some((system, handle)) = state.linker.find_attribute(reference) {
            if let Some(sys) = state.linker.system(&system) {
                if let Ok(component) = sys.resolve_handle(&handle) {
                    if let crate::typesystem::Component::Attribute(decl) = component.as_ref() {
                        return Some(AttributeUseDecl {
                            name: decl.name.clone(),
                            type_ref: externalize_ref(decl.type_ref.clone(), &system),
                            required,
                            default_value: parsed.default_value.or_else(|| decl.default_value.clone()),
                            fixed_value: parsed.fixed_value.or_else(|| decl.fixed_value.clone()),
                        });
                    }
                }
            }
        }
        let mut d = Diagnostic::error(
            codes::UNRESOLVED_REF,
            format!("attribute '{}' not found", reference),
        );
        if let Some(f) = &ctx.source_file {
            d = d.with_location(f.clone());
        }
        state.sink.push(d);
        return None;
    }

    let Some(local) = parsed.name else {
        let mut d = Diagnostic::error(
            codes::MALFORMED_INPUT,
            format!("attribute use in '{}' has neither a name nor a reference", container),
        );
        if let Some(f) = &ctx.source_file {
            d = d.with_location(f.clone());
        }
        state.sink.push(d);
        return None;
    };
    let name = QName::local(local);
    let type_ref = if let Some(type_name) = &parsed.type_name {
        resolve_type_by_name(
            state,
            type_name,
            ctx.source_file.as_deref(),
            TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE),
        )
    } else if let Some(inline) = parsed.inline_simple {
        create_anonymous_simple(state, *inline, name.clone(), ctx.source_file.clone())
    } else {
        TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE)
    };
    Some(AttributeUseDecl {
        name,
        type_ref,
        required,
        default_value: parsed.default_value,
        fixed_value: parsed.fixed_value,
    })
}

fn expand_attribute_group(
    state: &mut CompilerState,
    name: &QName,
    out: &mut Vec<AttributeUseDecl>,
    wildcard: &mut Option<WildcardParticle>,
    ctx: &WalkCtx,
    seen: &mut Vec<QName>,
) {
    if seen.contains(name) {
        state.sink.push(Diagnostic::error(
            codes::CYCLIC_DEPENDENCY,
            format!("attribute group '{}' recursively contains itself", name),
        ));
        return;
    }
    seen.push(name.clone());

    if let Some(&gid) = state.attribute_group_table.get(name) {
        resolve_attribute_group(state, gid);
        let def = state.attribute_groups[gid.0 as usize].clone();
        for a in def.attributes {
            if !out.iter().any(|existing| existing.name == a.name) {
                out.push(a);
            }
        }
        if wildcard.is_none() {
            *wildcard = def.wildcard;
        }
        return;
    }
    if let Some((system, handle)) = state.linker.find_attribute_group(name) {
        if let Some(sys) = state.linker.system(&system) {
            if let Ok(component) = sys.resolve_handle(&handle) {
                if let crate::typesystem::Component::AttributeGroup(def) = component.as_ref() {
                    for a in &def.attributes {
                        if !out.iter().any(|existing| existing.name == a.name) {
                            let mut a = a.clone();
                            a.type_ref = externalize_ref(a.type_ref, &system);
                            out.push(a);
                        }
                    }
                    if wildcard.is_none() {
                        wildcard.clone_from(&def.wildcard);
                    }
                    return;
                }
            }
        }
    }
    let mut d = Diagnostic::error(
        codes::UNRESOLVED_REF,
        format!("attribute group '{}' not found", name),
    );
    if let Some(f) = &ctx.source_file {
        d = d.with_location(f.clone());
    }
    state.sink.push(d);
}

// ---------------------------------------------------------------------------
// Elements, attributes, groups
// ---------------------------------------------------------------------------

/// Resolve one global element declaration
pub(crate) fn resolve_element(state: &mut CompilerState, id: ElemId) -> bool {
    if state.elements[id.0 as usize].lifecycle >= Lifecycle::Resolved {
        return true;
    }
    if !state.guard_enter(ComponentKind::Element, id.0) {
        return false;
    }

    let Some(parsed) = state.pending_elements.remove(&id.0) else {
        state.elements[id.0 as usize].lifecycle = Lifecycle::Resolved;
        state.guard_exit(ComponentKind::Element, id.0);
        return true;
    };
    let name = state.elements[id.0 as usize].name.clone();
    let source_file = state.elements[id.0 as usize].source_file.clone();
    let mut ctx = WalkCtx {
        source_file,
        target_namespace: name.namespace.clone(),
        chain: Vec::new(),
    };

    let type_ref = if let Some(type_name) = &parsed.type_name {
        resolve_type_by_name(
            state,
            type_name,
            ctx.source_file.as_deref(),
            TypeRef::Builtin(builtins::ANY_TYPE),
        )
    } else if let Some(inline) = parsed.inline_simple {
        create_anonymous_simple(state, *inline, name.clone(), ctx.source_file.clone())
    } else if let Some(inline) = parsed.inline_complex {
        let (anon_id, created) = anon_complex_shell(state, &name, &ctx);
        // The reference is visible before the content resolves, so an
        // element that contains itself closes the cycle through the token.
        state.elements[id.0 as usize].type_ref = TypeRef::Local(anon_id);
        if created {
            state.guard_enter(ComponentKind::Type, anon_id.0);
            resolve_complex_body(state, anon_id, *inline, &mut ctx);
            state.guard_exit(ComponentKind::Type, anon_id.0);
        }
        TypeRef::Local(anon_id)
    } else {
        TypeRef::Builtin(builtins::ANY_TYPE)
    };
    state.elements[id.0 as usize].type_ref = type_ref;

    if let Some(head) = &parsed.substitution_group {
        if let Some(&head_id) = state.element_table.get(head) {
            if state.elements[head_id.0 as usize].lifecycle == Lifecycle::Shell {
                resolve_element(state, head_id);
            }
            let member = name.clone();
            let head_decl = &mut state.elements[head_id.0 as usize];
            if !head_decl.substitution_members.contains(&member) {
                head_decl.substitution_members.push(member);
            }
        } else if state.linker.find_element(head).is_none() {
            let mut d = Diagnostic::error(
                codes::UNRESOLVED_REF,
                format!("substitution group head '{}' not found", head),
            );
            if let Some(f) = &ctx.source_file {
                d = d.with_location(f.clone());
            }
            state.sink.push(d);
        }
    }

    state.elements[id.0 as usize].lifecycle = Lifecycle::Resolved;
    state.guard_exit(ComponentKind::Element, id.0);
    true
}

/// Resolve one global attribute declaration
pub(crate) fn resolve_attribute(state: &mut CompilerState, id: AttrId) -> bool {
    if state.attributes[id.0 as usize].lifecycle >= Lifecycle::Resolved {
        return true;
    }
    if !state.guard_enter(ComponentKind::Attribute, id.0) {
        return false;
    }

    let Some(parsed) = state.pending_attributes.remove(&id.0) else {
        state.attributes[id.0 as usize].lifecycle = Lifecycle::Resolved;
        state.guard_exit(ComponentKind::Attribute, id.0);
        return true;
    };
    let name = state.attributes[id.0 as usize].name.clone();
    let source_file = state.attributes[id.0 as usize].source_file.clone();

    let mut type_ref = if let Some(type_name) = &parsed.type_name {
        resolve_type_by_name(
            state,
            type_name,
            source_file.as_deref(),
            TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE),
        )
    } else if let Some(inline) = parsed.inline_simple {
        create_anonymous_simple(state, *inline, name.clone(), source_file.clone())
    } else {
        TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE)
    };

    // An attribute's type must be simple.
    if let Some(info) = simple_types::snapshot(state, &type_ref) {
        if !info.is_simple {
            let mut d = Diagnostic::error(
                codes::MALFORMED_INPUT,
                format!("attribute '{}' must have a simple type", name),
            );
            if let Some(f) = &source_file {
                d = d.with_location(f.clone());
            }
            state.sink.push(d);
            type_ref = TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE);
        }
    }

    state.attributes[id.0 as usize].type_ref = type_ref;
    state.attributes[id.0 as usize].lifecycle = Lifecycle::Resolved;
    state.guard_exit(ComponentKind::Attribute, id.0);
    true
}

/// Resolve one named model group
pub(crate) fn resolve_group(state: &mut CompilerState, id: GroupId) -> bool {
    if state.groups[id.0 as usize].lifecycle >= Lifecycle::Resolved {
        return true;
    }
    if !state.guard_enter(ComponentKind::ModelGroup, id.0) {
        return false;
    }

    let body = state.pending_groups.get(&id.0).cloned();
    let name = state.groups[id.0 as usize].name.clone();
    let source_file = state.groups[id.0 as usize].source_file.clone();
    if let Some(body) = body {
        let mut ctx = WalkCtx {
            source_file,
            target_namespace: name.namespace.clone(),
            chain: vec![name.clone()],
        };
        let particle = translate_particle(state, body, &mut ctx, &name);
        state.groups[id.0 as usize].particle = particle;
    }
    state.groups[id.0 as usize].lifecycle = Lifecycle::Resolved;
    state.guard_exit(ComponentKind::ModelGroup, id.0);
    true
}

/// Resolve one named attribute group
pub(crate) fn resolve_attribute_group(state: &mut CompilerState, id: AttrGroupId) -> bool {
    if state.attribute_groups[id.0 as usize].lifecycle >= Lifecycle::Resolved {
        return true;
    }
    if !state.guard_enter(ComponentKind::AttributeGroup, id.0) {
        return false;
    }

    let name = state.attribute_groups[id.0 as usize].name.clone();
    let source_file = state.attribute_groups[id.0 as usize].source_file.clone();
    if let Some(parsed) = state.pending_attribute_groups.remove(&id.0) {
        let ctx = WalkCtx {
            source_file,
            target_namespace: name.namespace.clone(),
            chain: Vec::new(),
        };
        let mut attributes = Vec::new();
        for a in parsed.attributes {
            if let Some(decl) = translate_attribute_use(state, a, &ctx, &name) {
                attributes.push(decl);
            }
        }
        let mut wildcard = parsed.any_attribute.map(|w| translate_wildcard(&w, &ctx));
        let mut seen = vec![name.clone()];
        for nested in parsed.attribute_groups {
            expand_attribute_group(state, &nested, &mut attributes, &mut wildcard, &ctx, &mut seen);
        }
        let def = &mut state.attribute_groups[id.0 as usize];
        def.attributes = attributes;
        def.wildcard = wildcard;
    }
    state.attribute_groups[id.0 as usize].lifecycle = Lifecycle::Resolved;
    state.guard_exit(ComponentKind::AttributeGroup, id.0);
    true
}

fn check_keyrefs(state: &mut CompilerState) {
    let missing: Vec<(QName, QName)> = state
        .identities
        .iter()
        .filter(|ic| ic.category == IdentityCategory::KeyRef)
        .filter_map(|ic| {
            let referenced = ic.referenced_key.clone()?;
            if state.identity_table.contains_key(&referenced) {
                None
            } else {
                Some((ic.name.clone(), referenced))
            }
        })
        .collect();
    for (name, referenced) in missing {
        state.sink.push(Diagnostic::error(
            codes::UNRESOLVED_REF,
            format!("keyref '{}' refers to unknown key '{}'", name, referenced),
        ));
    }
}

// ---------------------------------------------------------------------------
// Property synthesis
// ---------------------------------------------------------------------------

struct PropWalk {
    repeated: bool,
    optional: bool,
}

fn synthesize_properties(state: &mut CompilerState, id: TypeId) {
    let (base, detail) = {
        let t = &state.types[id.0 as usize];
        (t.base.clone(), t.detail.as_complex().cloned())
    };
    let Some(detail) = detail else { return };

    let mut props: IndexMap<(QName, bool), SchemaProperty> = IndexMap::new();
    for mut p in base_properties(state, &base) {
        p.inherited = true;
        props.insert((p.name.clone(), p.is_attribute), p);
    }

    if let Some(content) = &detail.content {
        collect_element_properties(
            content,
            &PropWalk { repeated: false, optional: false },
            &mut props,
        );
    }
    for a in &detail.attributes {
        let occurrence = if a.required {
            PropertyOccurrence::One
        } else {
            PropertyOccurrence::Optional
        };
        match props.get_mut(&(a.name.clone(), true)) {
            Some(existing) => {
                existing.type_ref = a.type_ref.clone();
                existing.occurrence = occurrence;
            }
            None => {
                props.insert(
                    (a.name.clone(), true),
                    SchemaProperty {
                        name: a.name.clone(),
                        accepted_names: Vec::new(),
                        type_ref: a.type_ref.clone(),
                        is_attribute: true,
                        occurrence,
                        nillable: false,
                        default_value: a.default_value.clone(),
                        inherited: false,
                        binding_name: None,
                        binding_code: None,
                        non_delimiting: Vec::new(),
                    },
                );
            }
        }
    }

    state.types[id.0 as usize].properties = props.into_values().collect();
}

fn base_properties(state: &CompilerState, base: &TypeRef) -> Vec<SchemaProperty> {
    match base {
        TypeRef::Local(id) => state.types[id.0 as usize].properties.clone(),
        TypeRef::External { system, handle } => {
            let Some(sys) = state.linker.system(system) else {
                return Vec::new();
            };
            let Ok(component) = sys.resolve_handle(handle) else {
                return Vec::new();
            };
            let Some(t) = component.as_type() else {
                return Vec::new();
            };
            t.properties
                .iter()
                .cloned()
                .map(|mut p| {
                    p.type_ref = externalize_ref(p.type_ref, system);
                    p
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn collect_element_properties(
    particle: &Particle,
    walk: &PropWalk,
    props: &mut IndexMap<(QName, bool), SchemaProperty>,
) {
    match &particle.term {
        ParticleTerm::Element(e) => {
            let repeated = walk.repeated || particle.occurs.is_multiple();
            let optional = walk.optional || particle.occurs.is_emptiable();
            match props.get_mut(&(e.name.clone(), false)) {
                Some(existing) => {
                    if existing.inherited {
                        // A redeclaration narrows the inherited property but
                        // keeps it inherited: the binding name must stay the
                        // base's.
                        existing.type_ref = e.type_ref.clone();
                        if repeated {
                            existing.occurrence = PropertyOccurrence::Array;
                        } else if existing.occurrence == PropertyOccurrence::One && optional {
                            existing.occurrence = PropertyOccurrence::Optional;
                        }
                    } else {
                        // A second occurrence of the same name makes it an array.
                        existing.occurrence = PropertyOccurrence::Array;
                    }
                    existing.nillable |= e.nillable;
                }
                None => {
                    let occurrence = if repeated {
                        PropertyOccurrence::Array
                    } else if optional {
                        PropertyOccurrence::Optional
                    } else {
                        PropertyOccurrence::One
                    };
                    props.insert(
                        (e.name.clone(), false),
                        SchemaProperty {
                            name: e.name.clone(),
                            accepted_names: Vec::new(),
                            type_ref: e.type_ref.clone(),
                            is_attribute: false,
                            occurrence,
                            nillable: e.nillable,
                            default_value: e.default_value.clone().or(e.fixed_value.clone()),
                            inherited: false,
                            binding_name: None,
                            binding_code: None,
                            non_delimiting: Vec::new(),
                        },
                    );
                }
            }
        }
        ParticleTerm::Wildcard(_) => {}
        ParticleTerm::Choice(children) => {
            let inner = PropWalk {
                repeated: walk.repeated || particle.occurs.is_multiple(),
                optional: true,
            };
            for c in children {
                collect_element_properties(c, &inner, props);
            }
        }
        ParticleTerm::Sequence(children) | ParticleTerm::All(children) => {
            let inner = PropWalk {
                repeated: walk.repeated || particle.occurs.is_multiple(),
                optional: walk.optional || particle.occurs.is_emptiable(),
            };
            for c in children {
                collect_element_properties(c, &inner, props);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Foreign-reference helpers
// ---------------------------------------------------------------------------

/// Rebase a handle-relative reference from a linked system into this
/// compilation's reference space
pub(crate) fn externalize_ref(r: TypeRef, system: &str) -> TypeRef {
    match r {
        TypeRef::Handle(handle) => TypeRef::External { system: system.to_string(), handle },
        other => other,
    }
}

fn externalize_particle(mut p: Particle, system: &str) -> Particle {
    fn walk(p: &mut Particle, system: &str) {
        match &mut p.term {
            ParticleTerm::Element(e) => {
                e.type_ref = externalize_ref(std::mem::take(&mut e.type_ref), system);
            }
            ParticleTerm::Wildcard(_) => {}
            ParticleTerm::All(children)
            | ParticleTerm::Choice(children)
            | ParticleTerm::Sequence(children) => {
                for c in children {
                    walk(c, system);
                }
            }
        }
    }
    walk(&mut p, system);
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::Linker;

    #[test]
    fn test_fingerprint_ignores_chain_repetition() {
        let container = QName::local("item");
        let mut ctx = WalkCtx::default();
        ctx.chain.push(QName::local("g"));
        let once = ctx.fingerprint(&container);
        ctx.chain.push(QName::local("g"));
        let twice = ctx.fingerprint(&container);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_translate_reports_duplicates() {
        let mut state = CompilerState::new(Linker::new(), false);
        let mut doc = ParsedDocument::new("a.xsd", Some("urn:test"));
        doc.simple_types.push(ParsedSimpleType {
            name: Some("T".to_string()),
            derivation: crate::parsed::ParsedSimpleDerivation::Restriction {
                base: None,
                inline_base: None,
                facets: Vec::new(),
            },
        });
        doc.simple_types.push(ParsedSimpleType {
            name: Some("T".to_string()),
            derivation: crate::parsed::ParsedSimpleDerivation::Restriction {
                base: None,
                inline_base: None,
                facets: Vec::new(),
            },
        });
        translate(&mut state, &[doc]);
        assert_eq!(state.type_table.len(), 1);
        assert_eq!(state.sink.with_code(codes::DUPLICATE_GLOBAL).count(), 1);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut state = CompilerState::new(Linker::new(), false);
        let mut doc = ParsedDocument::new("a.xsd", None);
        doc.simple_types.push(ParsedSimpleType {
            name: Some("not a name".to_string()),
            derivation: crate::parsed::ParsedSimpleDerivation::Restriction {
                base: None,
                inline_base: None,
                facets: Vec::new(),
            },
        });
        translate(&mut state, &[doc]);
        assert!(state.type_table.is_empty());
        assert_eq!(state.sink.with_code(codes::MALFORMED_INPUT).count(), 1);
    }
}
