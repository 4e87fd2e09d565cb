//! Binding-name assignment and property model tests.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xsbind::compiler::components::{
    BindingTypeCode, ComponentKind, PropertyOccurrence,
};
use xsbind::compiler::HandlePool;
use xsbind::parsed::{ParsedComplexDerivation, ParsedComplexType, ParsedParticle, ParsedTerm};

#[test]
fn colliding_type_names_are_numbered_deterministically() {
    let build = || {
        let mut d = doc("collide.xsd");
        d.simple_types.push(restriction("foo-bar", xsd("string"), vec![]));
        d.simple_types.push(restriction("FooBar", xsd("string"), vec![]));
        d.simple_types.push(restriction("fooBar", xsd("string"), vec![]));
        compile_clean(&[d])
    };
    let system = build();

    let first = get_type(&system, &tns("foo-bar")).binding_name.unwrap();
    let second = get_type(&system, &tns("FooBar")).binding_name.unwrap();
    let third = get_type(&system, &tns("fooBar")).binding_name.unwrap();
    assert_eq!(first, "test.FooBar");
    assert_eq!(second, "test.FooBar2");
    assert_eq!(third, "test.FooBar3");

    let again = build();
    assert_eq!(
        get_type(&again, &tns("fooBar")).binding_name.unwrap(),
        "test.FooBar3"
    );
}

#[test]
fn global_elements_get_document_names() {
    let mut d = doc("docnames.xsd");
    d.complex_types.push(complex_sequence("OrderType", vec![]));
    d.elements.push(global_element("purchase-order", tns("OrderType")));
    let system = compile_clean(&[d]);

    let handle = system
        .find_element_handle(&tns("purchase-order"))
        .unwrap()
        .to_string();
    let component = system.resolve_handle(&handle).unwrap();
    let element = component.as_element().unwrap();
    assert_eq!(
        element.binding_name.as_deref(),
        Some("test.PurchaseOrderDocument")
    );
}

#[test]
fn inherited_properties_reuse_the_base_names() {
    let mut d = doc("inherit.xsd");
    d.complex_types.push(complex_sequence(
        "Base",
        vec![local_element("item", xsd("string"), 1, Some(1))],
    ));
    d.complex_types.push(ParsedComplexType {
        name: Some("Derived".to_string()),
        derivation: Some(ParsedComplexDerivation {
            is_extension: true,
            base: tns("Base"),
        }),
        content: Some(ParsedParticle::once(ParsedTerm::Sequence(vec![
            local_element("extra", xsd("int"), 1, Some(1)),
        ]))),
        ..Default::default()
    });
    let system = compile_clean(&[d]);

    let base = get_type(&system, &tns("Base"));
    let derived = get_type(&system, &tns("Derived"));
    let base_item = base
        .properties
        .iter()
        .find(|p| p.name.local_name == "item")
        .unwrap();
    let derived_item = derived
        .properties
        .iter()
        .find(|p| p.name.local_name == "item")
        .unwrap();
    assert!(derived_item.inherited);
    assert_eq!(derived_item.binding_name, base_item.binding_name);
    let derived_extra = derived
        .properties
        .iter()
        .find(|p| p.name.local_name == "extra")
        .unwrap();
    assert!(!derived_extra.inherited);
    assert_eq!(derived_extra.binding_name.as_deref(), Some("Extra"));
}

#[test]
fn reserved_property_suffix_is_avoided() {
    let mut d = doc("reserved.xsd");
    d.complex_types.push(complex_sequence(
        "Holder",
        vec![
            local_element("fooArray", xsd("string"), 1, Some(1)),
            local_element("class", xsd("string"), 1, Some(1)),
        ],
    ));
    let system = compile_clean(&[d]);

    let holder = get_type(&system, &tns("Holder"));
    let names: Vec<_> = holder
        .properties
        .iter()
        .map(|p| p.binding_name.clone().unwrap())
        .collect();
    assert!(names.contains(&"FooArray1".to_string()), "{:?}", names);
    assert!(names.contains(&"Class1".to_string()), "{:?}", names);
}

#[test]
fn colliding_property_names_are_numbered() {
    let mut d = doc("propcollide.xsd");
    d.complex_types.push(complex_sequence(
        "Holder",
        vec![
            local_element("my-item", xsd("string"), 1, Some(1)),
            local_element("myItem", xsd("string"), 1, Some(1)),
        ],
    ));
    let system = compile_clean(&[d]);

    let holder = get_type(&system, &tns("Holder"));
    let mut names: Vec<_> = holder
        .properties
        .iter()
        .map(|p| p.binding_name.clone().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["MyItem", "MyItem2"]);
}

#[test]
fn binding_codes_follow_the_resolved_types() {
    let mut d = doc("codes.xsd");
    d.simple_types.push(restriction("Price", xsd("decimal"), vec![]));
    d.simple_types.push(list_of("Counts", xsd("int")));
    d.simple_types
        .push(union_of("IntLike", vec![xsd("int"), xsd("int")]));
    d.simple_types
        .push(union_of("Mixed", vec![xsd("int"), xsd("string")]));
    d.complex_types.push(complex_sequence(
        "Holder",
        vec![
            local_element("flag", xsd("boolean"), 1, Some(1)),
            local_element("count", xsd("int"), 1, Some(1)),
            local_element("price", tns("Price"), 1, Some(1)),
            local_element("counts", tns("Counts"), 1, Some(1)),
            local_element("intLike", tns("IntLike"), 1, Some(1)),
            local_element("mixed", tns("Mixed"), 1, Some(1)),
            local_element("when", xsd("dateTime"), 1, Some(1)),
            local_element("blob", xsd("base64Binary"), 1, Some(1)),
        ],
    ));
    let system = compile_clean(&[d]);

    let holder = get_type(&system, &tns("Holder"));
    let code_of = |name: &str| {
        holder
            .properties
            .iter()
            .find(|p| p.name.local_name == name)
            .unwrap()
            .binding_code
            .unwrap()
    };
    assert_eq!(code_of("flag"), BindingTypeCode::Boolean);
    assert_eq!(code_of("count"), BindingTypeCode::Int);
    assert_eq!(code_of("price"), BindingTypeCode::BigDecimal);
    // A list collapses to its item code; agreeing unions collapse too.
    assert_eq!(code_of("counts"), BindingTypeCode::Int);
    assert_eq!(code_of("intLike"), BindingTypeCode::Int);
    assert_eq!(code_of("mixed"), BindingTypeCode::Object);
    assert_eq!(code_of("when"), BindingTypeCode::Date);
    assert_eq!(code_of("blob"), BindingTypeCode::Bytes);
}

#[test]
fn interior_array_property_keeps_its_non_delimiting_set() {
    // sequence(a, b*, a): appending to the run of a must skip past b.
    let mut d = doc("nds.xsd");
    d.complex_types.push(complex_sequence(
        "Runs",
        vec![
            local_element("a", xsd("string"), 1, Some(1)),
            local_element("b", xsd("string"), 0, None),
            local_element("a", xsd("string"), 1, Some(1)),
        ],
    ));
    let system = compile_clean(&[d]);

    let runs = get_type(&system, &tns("Runs"));
    let a = runs
        .properties
        .iter()
        .find(|p| p.name.local_name == "a")
        .unwrap();
    assert_eq!(a.occurrence, PropertyOccurrence::Array);
    assert_eq!(a.non_delimiting, vec![tns("b")]);

    let b = runs
        .properties
        .iter()
        .find(|p| p.name.local_name == "b")
        .unwrap();
    assert_eq!(b.occurrence, PropertyOccurrence::Array);
    // The trailing a may be skipped past when appending to the run of b.
    assert_eq!(b.non_delimiting, vec![tns("a")]);
}

#[test]
fn repeated_group_delimits_every_sibling() {
    let mut d = doc("nds2.xsd");
    d.complex_types.push(ParsedComplexType {
        name: Some("Mix".to_string()),
        content: Some(ParsedParticle::occurs(
            0,
            None,
            ParsedTerm::Choice(vec![
                local_element("a", xsd("string"), 1, Some(1)),
                local_element("b", xsd("string"), 1, Some(1)),
            ]),
        )),
        ..Default::default()
    });
    let system = compile_clean(&[d]);

    let mix = get_type(&system, &tns("Mix"));
    let a = mix
        .properties
        .iter()
        .find(|p| p.name.local_name == "a")
        .unwrap();
    assert_eq!(a.occurrence, PropertyOccurrence::Array);
    assert!(a.non_delimiting.is_empty());
}

#[test]
fn enumeration_values_get_constant_names() {
    let mut d = doc("enum.xsd");
    d.simple_types.push(restriction(
        "Color",
        xsd("string"),
        vec![
            facet(xsbind::compiler::facets::FacetKind::Enumeration, "dark-red"),
            facet(xsbind::compiler::facets::FacetKind::Enumeration, "dark red"),
            facet(xsbind::compiler::facets::FacetKind::Enumeration, "green"),
        ],
    ));
    let system = compile_clean(&[d]);

    let color = get_type(&system, &tns("Color"));
    assert_eq!(
        color.enum_constant_names,
        vec!["DARK_RED", "DARK_RED2", "GREEN"]
    );
}

#[test]
fn optional_and_required_attributes_shape_properties() {
    use xsbind::parsed::ParsedAttributeUse;
    let mut d = doc("attrs.xsd");
    let mut holder = complex_sequence("Holder", vec![]);
    holder.attributes.push(ParsedAttributeUse {
        name: Some("id".to_string()),
        type_name: Some(xsd("ID")),
        use_mode: Some("required".to_string()),
        ..Default::default()
    });
    holder.attributes.push(ParsedAttributeUse {
        name: Some("note".to_string()),
        type_name: Some(xsd("string")),
        ..Default::default()
    });
    d.complex_types.push(holder);
    let system = compile_clean(&[d]);

    let t = get_type(&system, &tns("Holder"));
    let id = t.properties.iter().find(|p| p.name.local_name == "id").unwrap();
    assert!(id.is_attribute);
    assert_eq!(id.occurrence, PropertyOccurrence::One);
    let note = t.properties.iter().find(|p| p.name.local_name == "note").unwrap();
    assert_eq!(note.occurrence, PropertyOccurrence::Optional);
}

proptest! {
    #[test]
    fn handle_pool_never_collides_case_insensitively(
        names in proptest::collection::vec("[A-Za-z][A-Za-z0-9]{0,8}", 1..40)
    ) {
        let mut pool = HandlePool::new();
        let mut seen = std::collections::HashSet::new();
        for name in names {
            let handle = pool.assign(&name, ComponentKind::Type);
            prop_assert!(seen.insert(handle.to_lowercase()));
        }
    }

    #[test]
    fn package_names_are_always_nonempty(ns in "[a-z0-9:./-]{0,30}") {
        let package = xsbind::names::package_for_namespace(Some(&ns));
        prop_assert!(!package.is_empty());
    }
}

#[test]
fn substitution_members_widen_accepted_names() {
    let mut d = doc("subst.xsd");
    d.complex_types.push(complex_sequence("ShapeType", vec![]));
    d.elements.push(global_element("shape", tns("ShapeType")));
    let mut circle = global_element("circle", tns("ShapeType"));
    circle.substitution_group = Some(tns("shape"));
    d.elements.push(circle);
    d.complex_types.push(complex_sequence(
        "Drawing",
        vec![ParsedParticle::occurs(
            0,
            None,
            ParsedTerm::ElementRef(tns("shape")),
        )],
    ));
    let system = compile_clean(&[d]);

    let drawing = get_type(&system, &tns("Drawing"));
    let shape = drawing
        .properties
        .iter()
        .find(|p| p.name.local_name == "shape")
        .unwrap();
    assert_eq!(shape.accepted_names, vec![tns("circle")]);

    let handle = system.find_element_handle(&tns("shape")).unwrap().to_string();
    let head = system.resolve_handle(&handle).unwrap();
    assert_eq!(
        head.as_element().unwrap().substitution_members,
        vec![tns("circle")]
    );
}
