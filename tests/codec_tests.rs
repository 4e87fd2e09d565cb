//! Persistence round-trip, version gating and lazy loading tests.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use xsbind::compiler::facets::FacetKind;
use xsbind::typesystem::{Component, SchemaTypeSystem};
use xsbind::Error;

fn sample_docs() -> Vec<xsbind::parsed::ParsedDocument> {
    let mut d = doc("sample.xsd");
    d.simple_types.push(restriction(
        "Sku",
        xsd("string"),
        vec![
            facet(FacetKind::MaxLength, "12"),
            facet(FacetKind::Pattern, r"[A-Z]{3}-\d+"),
        ],
    ));
    d.simple_types.push(restriction(
        "Quantity",
        xsd("int"),
        vec![facet(FacetKind::MaxInclusive, "100")],
    ));
    d.complex_types.push(complex_sequence(
        "ItemType",
        vec![
            local_element("sku", tns("Sku"), 1, Some(1)),
            local_element("quantity", tns("Quantity"), 0, Some(1)),
            local_element("note", xsd("string"), 0, None),
        ],
    ));
    d.elements.push(global_element("item", tns("ItemType")));
    vec![d]
}

#[test]
fn round_trip_preserves_the_graph() {
    let system = compile_clean(&sample_docs());
    let dir = tempfile::tempdir().unwrap();
    system.save(dir.path()).unwrap();

    let loaded = SchemaTypeSystem::load_dir("test", dir.path()).unwrap();

    // Same handles, same qualified-name maps.
    assert_eq!(
        system.index().handles.iter().collect::<Vec<_>>(),
        loaded.index().handles.iter().collect::<Vec<_>>()
    );
    assert_eq!(
        system.index().types.iter().collect::<Vec<_>>(),
        loaded.index().types.iter().collect::<Vec<_>>()
    );
    assert_eq!(
        system.index().elements.iter().collect::<Vec<_>>(),
        loaded.index().elements.iter().collect::<Vec<_>>()
    );
    assert_eq!(
        system.index().by_binding_name.iter().collect::<Vec<_>>(),
        loaded.index().by_binding_name.iter().collect::<Vec<_>>()
    );

    // Same facet tables and properties for every type.
    for (qname, handle) in system.index().types.iter() {
        let original = get_type(&system, qname);
        let reloaded = get_type(&loaded, qname);
        assert_eq!(original.facets, reloaded.facets, "{}", handle);
        assert_eq!(original.base, reloaded.base, "{}", handle);
        assert_eq!(original.base_depth, reloaded.base_depth, "{}", handle);
        assert_eq!(original.fundamental, reloaded.fundamental, "{}", handle);
        assert_eq!(original.decimal_size, reloaded.decimal_size, "{}", handle);
        assert_eq!(original.binding_name, reloaded.binding_name, "{}", handle);
        assert_eq!(
            original.properties.len(),
            reloaded.properties.len(),
            "{}",
            handle
        );
        for (a, b) in original.properties.iter().zip(reloaded.properties.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.type_ref, b.type_ref);
            assert_eq!(a.occurrence, b.occurrence);
            assert_eq!(a.binding_name, b.binding_name);
            assert_eq!(a.binding_code, b.binding_code);
            assert_eq!(a.non_delimiting, b.non_delimiting);
        }
    }
}

#[test]
fn records_load_lazily_and_memoize() {
    let system = compile_clean(&sample_docs());
    let dir = tempfile::tempdir().unwrap();
    system.save(dir.path()).unwrap();

    let loaded = SchemaTypeSystem::load_dir("test", dir.path()).unwrap();
    let handle = loaded.find_type_handle(&tns("ItemType")).unwrap().to_string();

    assert!(!loaded.is_cached(&handle));
    let first = loaded.resolve_handle(&handle).unwrap();
    assert!(loaded.is_cached(&handle));
    let second = loaded.resolve_handle(&handle).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // Unrelated records stay undecoded.
    let other = loaded.find_type_handle(&tns("Sku")).unwrap();
    assert!(!loaded.is_cached(other));
}

#[test]
fn loaded_systems_are_queryable_from_many_threads() {
    let system = compile_clean(&sample_docs());
    let dir = tempfile::tempdir().unwrap();
    system.save(dir.path()).unwrap();
    let loaded = Arc::new(SchemaTypeSystem::load_dir("test", dir.path()).unwrap());

    let mut workers = Vec::new();
    for _ in 0..4 {
        let shared = Arc::clone(&loaded);
        workers.push(std::thread::spawn(move || {
            let handle = shared.find_type_handle(&tns("ItemType")).unwrap().to_string();
            let component = shared.resolve_handle(&handle).unwrap();
            matches!(component.as_ref(), Component::Type(_))
        }));
    }
    for worker in workers {
        assert!(worker.join().unwrap());
    }
}

#[test]
fn wrong_magic_aborts_the_load() {
    let system = compile_clean(&sample_docs());
    let dir = tempfile::tempdir().unwrap();
    system.save(dir.path()).unwrap();

    let index = dir.path().join("index.xsb");
    let mut bytes = fs::read(&index).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&index, &bytes).unwrap();

    let err = SchemaTypeSystem::load_dir("test", dir.path()).unwrap_err();
    assert!(matches!(err, Error::Codec { .. }), "{}", err);
}

#[test]
fn truncated_record_fails_only_that_record() {
    let system = compile_clean(&sample_docs());
    let dir = tempfile::tempdir().unwrap();
    system.save(dir.path()).unwrap();

    let loaded = SchemaTypeSystem::load_dir("test", dir.path()).unwrap();
    let victim = loaded.find_type_handle(&tns("ItemType")).unwrap().to_string();
    let path = dir.path().join(format!("{}.xsb", victim));
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(loaded.resolve_handle(&victim).is_err());
    // Undamaged records keep loading.
    let other = loaded.find_type_handle(&tns("Sku")).unwrap().to_string();
    assert!(loaded.resolve_handle(&other).is_ok());
}

#[test]
fn pointer_files_map_names_to_the_owning_system() {
    let system = compile_clean(&sample_docs());
    let dir = tempfile::tempdir().unwrap();
    system.save(dir.path()).unwrap();

    let type_pointer = dir
        .path()
        .join("schema/type")
        .join("_urn_test_ItemType.ptr");
    assert!(type_pointer.exists(), "{}", type_pointer.display());
    assert_eq!(fs::read_to_string(&type_pointer).unwrap(), "test");

    let ns_pointer = dir.path().join("schema/namespace").join("urn_test.ptr");
    assert!(ns_pointer.exists());

    let binding = get_type(&system, &tns("ItemType")).binding_name.unwrap();
    let javaname_pointer = dir
        .path()
        .join("schema/javaname")
        .join(format!("{}.ptr", binding.replace('.', "_")));
    assert!(javaname_pointer.exists(), "{}", javaname_pointer.display());
}

#[test]
fn incomplete_systems_refuse_to_save() {
    let mut d = doc("broken.xsd");
    d.simple_types.push(restriction("Loop", tns("Loop"), vec![]));
    let outcome = xsbind::compile(
        &[d],
        Some(&xsbind::typesystem::Linker::new()),
        &xsbind::CompileOptions {
            name: "partial".to_string(),
            partial_ok: true,
            ..Default::default()
        },
    )
    .unwrap();
    let system = outcome.system.unwrap();
    assert!(system.is_incomplete());

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        system.save(dir.path()),
        Err(Error::Incomplete(_, _))
    ));
}

#[test]
fn unknown_handles_are_reported() {
    let system = compile_clean(&sample_docs());
    assert!(matches!(
        system.resolve_handle("NoSuchHandleType"),
        Err(Error::UnresolvedHandle(_))
    ));
}
