//! The schema compiler
//!
//! Drives one compilation: translate parsed documents into shells, resolve
//! every component, assign binding names, assign handles and hand the
//! finalized graph to a [`SchemaTypeSystem`].

pub mod binding;
pub mod builtins;
pub mod components;
pub mod deps;
pub mod facets;
pub mod particles;
mod resolver;
mod simple_types;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::{codes, Diagnostic};
use crate::error::{Error, Result};
use crate::parsed::ParsedDocument;
use crate::typesystem::{Component, Linker, SchemaTypeSystem, SystemIndex};

use binding::BindingConfig;
use components::{ComponentKind, TypeRef};
use deps::{SchemaDependencies, SourceResolver};
use state::CompilerState;

pub use crate::typesystem::HandlePool;

/// Options of one compilation
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Name of the produced type system
    pub name: String,
    /// Namespace to binding-package configuration
    pub config: BindingConfig,
    /// Produce an (incomplete) type system even when errors were reported
    pub partial_ok: bool,
}

impl CompileOptions {
    /// Options with a type system name and defaults otherwise
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }
}

/// The result of one compilation
#[derive(Debug)]
pub struct CompileOutcome {
    /// The produced type system; None when errors were reported and
    /// partial mode was off
    pub system: Option<Arc<SchemaTypeSystem>>,
    /// Every diagnostic of the run, in order
    pub diagnostics: Vec<Diagnostic>,
    /// The dependency graph recorded from the inputs
    pub dependencies: SchemaDependencies,
}

impl CompileOutcome {
    /// Whether the run reported no error-severity diagnostics
    pub fn is_clean(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == crate::diagnostics::Severity::Error)
    }
}

/// Compile parsed schema documents into a type system
///
/// The linker is mandatory; the built-in type system alone is expressed by
/// an empty [`Linker`]. Passing `None` is a programmer error.
pub fn compile(
    docs: &[ParsedDocument],
    linker: Option<&Linker>,
    options: &CompileOptions,
) -> Result<CompileOutcome> {
    let linker = linker.ok_or(Error::NoLinker)?;

    let mut dependencies = SchemaDependencies::new();
    for doc in docs {
        dependencies.record_document(doc);
    }

    let mut state = CompilerState::new(linker.clone(), options.partial_ok);
    resolver::translate(&mut state, docs);
    resolver::resolve_all(&mut state);
    binding::assign_binding_names(&mut state, &options.config);

    let failed = state.sink.has_errors();
    let system = if failed && !options.partial_ok {
        None
    } else {
        Some(Arc::new(finalize_system(&mut state, &options.name, failed)))
    };

    Ok(CompileOutcome {
        system,
        diagnostics: std::mem::take(&mut state.sink).into_records(),
        dependencies,
    })
}

/// Recompile after a set of source files changed
///
/// Computes the minimal recompilation set over the dependency graph,
/// re-fetches files in the set that are not among the modified inputs, and
/// compiles the batch against the previous system. On success the previous
/// system is marked incomplete so readers cannot link a superseded graph.
pub fn incremental_compile(
    previous: &Arc<SchemaTypeSystem>,
    dependencies: &mut SchemaDependencies,
    modified: Vec<ParsedDocument>,
    resolver: &dyn SourceResolver,
    linker: Option<&Linker>,
    options: &CompileOptions,
) -> Result<CompileOutcome> {
    let linker = linker.ok_or(Error::NoLinker)?;
    let modified_names: Vec<&str> = modified.iter().map(|d| d.source_file.as_str()).collect();
    let recompile = dependencies.recompile_set(&modified_names);

    let mut fetch_diagnostics = Vec::new();
    let mut batch = modified;
    for file in &recompile.files {
        if batch.iter().any(|d| &d.source_file == file) {
            continue;
        }
        match resolver.fetch(file) {
            Ok(doc) => batch.push(doc),
            Err(e) => {
                // One unfetchable file degrades to a per-file error; the
                // rest of the batch still compiles.
                fetch_diagnostics.push(
                    Diagnostic::error(
                        codes::FETCH_FAILED,
                        format!("could not re-fetch '{}': {}", file, e),
                    )
                    .with_location(file.clone()),
                );
            }
        }
    }

    let mut outcome = compile(&batch, Some(linker), options)?;
    let mut diagnostics = fetch_diagnostics;
    diagnostics.append(&mut outcome.diagnostics);
    outcome.diagnostics = diagnostics;

    for doc in &batch {
        dependencies.record_document(doc);
    }
    if outcome.system.is_some() {
        previous.mark_incomplete();
    }
    Ok(outcome)
}

/// Assign handles, rewrite arena references to handle references and
/// assemble the finalized type system
fn finalize_system(state: &mut CompilerState, name: &str, incomplete: bool) -> SchemaTypeSystem {
    let mut pool = HandlePool::new();
    let mut type_handles: HashMap<u32, String> = HashMap::new();

    let named_types: Vec<_> = state.type_table.values().copied().collect();
    for id in named_types {
        let local = state.types[id.0 as usize]
            .name
            .as_ref()
            .expect("named type")
            .local_name
            .clone();
        let handle = pool.assign(&local, ComponentKind::Type);
        type_handles.insert(id.0, handle.clone());
        state.types[id.0 as usize].handle = Some(handle);
    }
    let unnamed: Vec<_> = state
        .types
        .iter()
        .filter(|t| t.handle.is_none())
        .map(|t| t.id)
        .collect();
    for id in unnamed {
        let t = &state.types[id.0 as usize];
        let base = match (&t.name, &t.anonymous) {
            // A named type can land here when a redefinition superseded it.
            (Some(name), _) => name.local_name.clone(),
            (None, Some(a)) => format!("{}{}", a.container.local_name, a.ordinal),
            (None, None) => format!("anon{}", id.0),
        };
        let handle = pool.assign(&base, ComponentKind::Type);
        type_handles.insert(id.0, handle.clone());
        state.types[id.0 as usize].handle = Some(handle);
    }
    for decl in &mut state.elements {
        decl.handle = Some(pool.assign(&decl.name.local_name, ComponentKind::Element));
    }
    for decl in &mut state.attributes {
        decl.handle = Some(pool.assign(&decl.name.local_name, ComponentKind::Attribute));
    }
    for def in &mut state.groups {
        def.handle = Some(pool.assign(&def.name.local_name, ComponentKind::ModelGroup));
    }
    for def in &mut state.attribute_groups {
        def.handle = Some(pool.assign(&def.name.local_name, ComponentKind::AttributeGroup));
    }
    for def in &mut state.identities {
        def.handle = Some(pool.assign(&def.name.local_name, ComponentKind::IdentityConstraint));
    }

    rewrite_refs(state, &type_handles);

    let mut index = SystemIndex::default();
    for (handle, kind) in pool.iter() {
        index.handles.insert(handle.to_string(), kind);
    }
    let mut namespaces: Vec<String> = Vec::new();
    let mut components: HashMap<String, Arc<Component>> = HashMap::new();

    // The symbol table is authoritative for what a qualified name denotes;
    // superseded definitions keep their records but not their table entry.
    for (qname, id) in &state.type_table {
        let handle = state.types[id.0 as usize].handle.clone().expect("type handle");
        index.types.insert(qname.clone(), handle);
        if let Some(ns) = &qname.namespace {
            if !namespaces.contains(ns) {
                namespaces.push(ns.clone());
            }
        }
    }
    for t in &state.types {
        let handle = t.handle.clone().expect("type handle");
        if let Some(binding) = &t.binding_name {
            index.by_binding_name.insert(binding.clone(), handle.clone());
        }
        let mut stored = t.clone();
        stored.parsed = None;
        components.insert(handle, Arc::new(Component::Type(stored)));
    }
    for decl in &state.elements {
        let handle = decl.handle.clone().expect("element handle");
        index.elements.insert(decl.name.clone(), handle.clone());
        components.insert(handle, Arc::new(Component::Element(decl.clone())));
    }
    for decl in &state.attributes {
        let handle = decl.handle.clone().expect("attribute handle");
        index.attributes.insert(decl.name.clone(), handle.clone());
        components.insert(handle, Arc::new(Component::Attribute(decl.clone())));
    }
    for def in &state.groups {
        let handle = def.handle.clone().expect("group handle");
        index.groups.insert(def.name.clone(), handle.clone());
        components.insert(handle, Arc::new(Component::ModelGroup(def.clone())));
    }
    for def in &state.attribute_groups {
        let handle = def.handle.clone().expect("attribute group handle");
        index.attribute_groups.insert(def.name.clone(), handle.clone());
        components.insert(handle, Arc::new(Component::AttributeGroup(def.clone())));
    }
    for def in &state.identities {
        let handle = def.handle.clone().expect("identity handle");
        index.identities.insert(def.name.clone(), handle.clone());
        components.insert(handle, Arc::new(Component::IdentityConstraint(def.clone())));
    }
    index.namespaces = namespaces;

    SchemaTypeSystem::from_parts(name, index, components, incomplete)
}

fn rewrite_refs(state: &mut CompilerState, type_handles: &HashMap<u32, String>) {
    let rewrite = |r: &mut TypeRef| {
        if let TypeRef::Local(id) = r {
            *r = TypeRef::Handle(type_handles[&id.0].clone());
        }
    };

    for t in &mut state.types {
        rewrite(&mut t.base);
        match &mut t.detail {
            components::TypeDetail::Simple(detail) => {
                rewrite(&mut detail.item);
                for m in &mut detail.members {
                    rewrite(m);
                }
            }
            components::TypeDetail::Complex(detail) => {
                if let Some(content) = &mut detail.content {
                    rewrite_particle(content, &rewrite);
                }
                for a in &mut detail.attributes {
                    rewrite(&mut a.type_ref);
                }
            }
        }
        for p in &mut t.properties {
            rewrite(&mut p.type_ref);
        }
    }
    for decl in &mut state.elements {
        rewrite(&mut decl.type_ref);
    }
    for decl in &mut state.attributes {
        rewrite(&mut decl.type_ref);
    }
    for def in &mut state.groups {
        if let Some(p) = &mut def.particle {
            rewrite_particle(p, &rewrite);
        }
    }
    for def in &mut state.attribute_groups {
        for a in &mut def.attributes {
            rewrite(&mut a.type_ref);
        }
    }
}

fn rewrite_particle(p: &mut particles::Particle, rewrite: &impl Fn(&mut TypeRef)) {
    match &mut p.term {
        particles::ParticleTerm::Element(e) => rewrite(&mut e.type_ref),
        particles::ParticleTerm::Wildcard(_) => {}
        particles::ParticleTerm::All(children)
        | particles::ParticleTerm::Choice(children)
        | particles::ParticleTerm::Sequence(children) => {
            for c in children {
                rewrite_particle(c, rewrite);
            }
        }
    }
}
