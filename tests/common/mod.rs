//! Shared builders for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use xsbind::compiler::components::SchemaType;
use xsbind::compiler::facets::FacetKind;
use xsbind::compiler::{compile, CompileOptions, CompileOutcome};
use xsbind::namespaces::QName;
use xsbind::parsed::{
    ParsedComplexType, ParsedDocument, ParsedElement, ParsedFacet, ParsedLocalElement,
    ParsedParticle, ParsedSimpleDerivation, ParsedSimpleType, ParsedTerm,
};
use xsbind::typesystem::{Component, Linker, SchemaTypeSystem};
use xsbind::XSD_NAMESPACE;

/// A qualified name in the XSD namespace
pub fn xsd(local: &str) -> QName {
    QName::namespaced(XSD_NAMESPACE, local)
}

/// A qualified name in the test namespace
pub fn tns(local: &str) -> QName {
    QName::namespaced("urn:test", local)
}

/// An empty document in the test namespace
pub fn doc(file: &str) -> ParsedDocument {
    ParsedDocument::new(file, Some("urn:test"))
}

/// A named restriction of a referenced base
pub fn restriction(name: &str, base: QName, facets: Vec<ParsedFacet>) -> ParsedSimpleType {
    ParsedSimpleType {
        name: Some(name.to_string()),
        derivation: ParsedSimpleDerivation::Restriction {
            base: Some(base),
            inline_base: None,
            facets,
        },
    }
}

/// A named list of a referenced item type
pub fn list_of(name: &str, item: QName) -> ParsedSimpleType {
    ParsedSimpleType {
        name: Some(name.to_string()),
        derivation: ParsedSimpleDerivation::List { item: Some(item), inline_item: None },
    }
}

/// A named union of referenced member types
pub fn union_of(name: &str, members: Vec<QName>) -> ParsedSimpleType {
    ParsedSimpleType {
        name: Some(name.to_string()),
        derivation: ParsedSimpleDerivation::Union { members, inline_members: Vec::new() },
    }
}

/// A facet declaration
pub fn facet(kind: FacetKind, value: &str) -> ParsedFacet {
    ParsedFacet::new(kind, value)
}

/// A local element of a declared type, occurring [min, max]
pub fn local_element(name: &str, type_name: QName, min: u32, max: Option<u32>) -> ParsedParticle {
    ParsedParticle::occurs(
        min,
        max,
        ParsedTerm::Element(ParsedLocalElement {
            name: name.to_string(),
            namespace: Some("urn:test".to_string()),
            type_name: Some(type_name),
            ..Default::default()
        }),
    )
}

/// A named complex type with a sequence content model
pub fn complex_sequence(name: &str, children: Vec<ParsedParticle>) -> ParsedComplexType {
    ParsedComplexType {
        name: Some(name.to_string()),
        content: Some(ParsedParticle::once(ParsedTerm::Sequence(children))),
        ..Default::default()
    }
}

/// A global element of a declared type
pub fn global_element(name: &str, type_name: QName) -> ParsedElement {
    ParsedElement {
        name: name.to_string(),
        type_name: Some(type_name),
        ..Default::default()
    }
}

/// Compile documents against an empty linker
pub fn compile_docs(docs: &[ParsedDocument]) -> CompileOutcome {
    compile(docs, Some(&Linker::new()), &CompileOptions::named("test"))
        .expect("compile should not hard-fail")
}

/// Compile documents, expecting a clean run, and return the system
pub fn compile_clean(docs: &[ParsedDocument]) -> Arc<SchemaTypeSystem> {
    let outcome = compile_docs(docs);
    assert!(
        outcome.is_clean(),
        "expected a clean compile, got: {:#?}",
        outcome.diagnostics
    );
    outcome.system.expect("clean compile produces a system")
}

/// Fetch a type component by qualified name
pub fn get_type(system: &SchemaTypeSystem, name: &QName) -> SchemaType {
    let handle = system
        .find_type_handle(name)
        .unwrap_or_else(|| panic!("no type named {}", name))
        .to_string();
    match system.resolve_handle(&handle).expect("resolvable handle").as_ref() {
        Component::Type(t) => t.clone(),
        other => panic!("handle {} is not a type: {:?}", handle, other.kind()),
    }
}
