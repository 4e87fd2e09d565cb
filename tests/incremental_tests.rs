//! Incremental recompilation and cross-system linking tests.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use xsbind::compiler::components::TypeRef;
use xsbind::compiler::deps::SourceResolver;
use xsbind::diagnostics::codes;
use xsbind::namespaces::QName;
use xsbind::parsed::{ParsedDocument, ParsedImport};
use xsbind::typesystem::Linker;
use xsbind::{compile, incremental_compile, CompileOptions, Error, Result};

/// Serves documents from a map, remembering what was asked for
struct MapResolver {
    docs: HashMap<String, ParsedDocument>,
    fetched: RefCell<Vec<String>>,
}

impl MapResolver {
    fn new(docs: Vec<ParsedDocument>) -> Self {
        Self {
            docs: docs.into_iter().map(|d| (d.source_file.clone(), d)).collect(),
            fetched: RefCell::new(Vec::new()),
        }
    }
}

impl SourceResolver for MapResolver {
    fn fetch(&self, file: &str) -> Result<ParsedDocument> {
        self.fetched.borrow_mut().push(file.to_string());
        self.docs
            .get(file)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no such file: {}", file)))
    }
}

fn ns_doc(file: &str, ns: &str) -> ParsedDocument {
    ParsedDocument::new(file, Some(ns))
}

fn three_namespace_docs() -> Vec<ParsedDocument> {
    // a.xsd (urn:A) imports urn:B; b.xsd defines urn:B; c.xsd is unrelated.
    let mut a = ns_doc("a.xsd", "urn:A");
    a.imports.push(ParsedImport {
        namespace: Some("urn:B".to_string()),
        location: Some("b.xsd".to_string()),
    });
    a.complex_types.push(complex_sequence("AType", vec![]));
    let mut b = ns_doc("b.xsd", "urn:B");
    b.simple_types.push(restriction("BType", xsd("string"), vec![]));
    let mut c = ns_doc("c.xsd", "urn:C");
    c.simple_types.push(restriction("CType", xsd("string"), vec![]));
    vec![a, b, c]
}

#[test]
fn modifying_an_imported_namespace_recompiles_its_dependents() {
    let docs = three_namespace_docs();
    let outcome = compile(&docs, Some(&Linker::new()), &CompileOptions::named("v1")).unwrap();
    let previous = outcome.system.expect("clean first compile");
    let mut deps = outcome.dependencies;

    let resolver = MapResolver::new(docs.clone());
    let modified = vec![docs[1].clone()];
    let next = incremental_compile(
        &previous,
        &mut deps,
        modified,
        &resolver,
        Some(&Linker::new()),
        &CompileOptions::named("v2"),
    )
    .unwrap();

    // Exactly {files in B} union {files in A that import B}; never c.xsd.
    assert_eq!(resolver.fetched.borrow().as_slice(), ["a.xsd"]);
    let system = next.system.expect("incremental compile succeeds");
    assert!(system.find_type_handle(&QName::namespaced("urn:A", "AType")).is_some());
    assert!(system.find_type_handle(&QName::namespaced("urn:B", "BType")).is_some());
    assert!(system.find_type_handle(&QName::namespaced("urn:C", "CType")).is_none());

    // The superseded system may no longer be linked against.
    assert!(previous.is_incomplete());
    let mut linker = Linker::new();
    assert!(linker.push(previous).is_err());
}

#[test]
fn fetch_failures_degrade_to_per_file_errors() {
    let docs = three_namespace_docs();
    let outcome = compile(&docs, Some(&Linker::new()), &CompileOptions::named("v1")).unwrap();
    let previous = outcome.system.unwrap();
    let mut deps = outcome.dependencies;

    // The resolver has lost a.xsd; modifying b.xsd still compiles b alone.
    let resolver = MapResolver::new(vec![docs[2].clone()]);
    let next = incremental_compile(
        &previous,
        &mut deps,
        vec![docs[1].clone()],
        &resolver,
        Some(&Linker::new()),
        &CompileOptions::named("v2"),
    )
    .unwrap();

    assert!(next
        .diagnostics
        .iter()
        .any(|d| d.code == codes::FETCH_FAILED && d.message.contains("a.xsd")));
    let system = next.system.expect("remaining batch still compiles");
    assert!(system.find_type_handle(&QName::namespaced("urn:B", "BType")).is_some());
}

#[test]
fn unchanged_namespaces_resolve_through_the_linker() {
    // First system owns urn:base.
    let mut base_doc = ParsedDocument::new("base.xsd", Some("urn:base"));
    base_doc
        .simple_types
        .push(restriction("Money", xsd("decimal"), vec![]));
    let first = compile(&[base_doc], Some(&Linker::new()), &CompileOptions::named("base"))
        .unwrap()
        .system
        .unwrap();

    // Second system references it without redefining it.
    let mut linker = Linker::new();
    linker.push(first).unwrap();
    let mut using = doc("using.xsd");
    using.complex_types.push(complex_sequence(
        "Invoice",
        vec![local_element("total", QName::namespaced("urn:base", "Money"), 1, Some(1))],
    ));
    let outcome = compile(&[using], Some(&linker), &CompileOptions::named("using")).unwrap();
    assert!(outcome.is_clean(), "{:#?}", outcome.diagnostics);
    let system = outcome.system.unwrap();

    let invoice = get_type(&system, &tns("Invoice"));
    let total = invoice
        .properties
        .iter()
        .find(|p| p.name.local_name == "total")
        .unwrap();
    assert_eq!(
        total.type_ref,
        TypeRef::External {
            system: "base".to_string(),
            handle: "MoneyType".to_string()
        }
    );
}

#[test]
fn compiling_without_a_linker_is_a_programmer_error() {
    let err = compile(&[], None, &CompileOptions::named("x")).unwrap_err();
    assert!(matches!(err, Error::NoLinker));
}

#[test]
fn recorded_dependencies_cover_all_inputs() {
    let docs = three_namespace_docs();
    let outcome = compile(&docs, Some(&Linker::new()), &CompileOptions::named("v1")).unwrap();
    let mut deps = outcome.dependencies;

    let set = deps.recompile_set(&["c.xsd"]);
    assert_eq!(set.files.len(), 1);
    assert!(set.files.contains("c.xsd"));

    let set = deps.recompile_set(&["b.xsd"]);
    assert!(set.files.contains("a.xsd"));
    assert!(set.files.contains("b.xsd"));
    assert!(!set.files.contains("c.xsd"));
}
