//! Binding-name assignment
//!
//! Two passes over the resolved components: pass 1 gives every top-level
//! component a globally unique binding class name; pass 2 names every
//! type's properties, inherited names first (reusing the base's names
//! verbatim), then new ones, and computes each property's binding type
//! code and append positioning metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::names::{package_for_namespace, upper_camel_case};
use crate::namespaces::QName;

use super::builtins::{self, PrimitiveKind};
use super::components::{
    BindingTypeCode, DecimalSize, Lifecycle, PropertyOccurrence, TypeId, TypeRef, Variety,
};
use super::particles::{Particle, ParticleTerm};
use super::simple_types::{self, SimpleSnapshot};
use super::state::CompilerState;

/// Property names that collide with universal accessor machinery
const RESERVED_PROPERTY_NAMES: [&str; 3] = ["Class", "New", "Cursor"];

/// Suffix appended by generated array accessors; plain properties must
/// not end with it
const RESERVED_PROPERTY_SUFFIX: &str = "Array";

/// External configuration mapping namespaces to binding packages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Namespace URI to package path overrides
    #[serde(default)]
    pub package_map: IndexMap<String, String>,
}

impl BindingConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration from JSON
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::error::Error::Other(format!("invalid binding config: {}", e)))
    }

    /// The binding package for a namespace
    pub fn package_for(&self, namespace: Option<&str>) -> String {
        namespace
            .and_then(|ns| self.package_map.get(ns).cloned())
            .unwrap_or_else(|| package_for_namespace(namespace))
    }
}

/// Case-insensitive set of used names with collision numbering
#[derive(Debug, Default)]
struct NameSet {
    used: HashSet<String>,
}

impl NameSet {
    fn new() -> Self {
        Self::default()
    }

    fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_lowercase());
    }

    /// Claim a name, numbering it on collision: Foo, Foo2, Foo3, ...
    fn claim(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut counter = 1u32;
        while !self.used.insert(candidate.to_lowercase()) {
            counter += 1;
            candidate = format!("{}{}", base, counter);
        }
        candidate
    }
}

/// Assign binding names to every newly resolved component
pub(crate) fn assign_binding_names(state: &mut CompilerState, config: &BindingConfig) {
    let mut global_names = NameSet::new();

    // Pass 1: top-level components, in symbol-table order.
    let named_types: Vec<TypeId> = state.type_table.values().copied().collect();
    for id in &named_types {
        let t = &state.types[id.0 as usize];
        if t.binding_name.is_some() {
            continue;
        }
        let name = t.name.clone().expect("named type");
        let package = config.package_for(name.namespace.as_deref());
        let base = format!("{}.{}", package, upper_camel_case(&name.local_name));
        let assigned = global_names.claim(&base);
        state.types[id.0 as usize].binding_name = Some(assigned);
    }
    let anonymous: Vec<TypeId> = state
        .types
        .iter()
        .filter(|t| t.name.is_none() && t.binding_name.is_none())
        .map(|t| t.id)
        .collect();
    for id in anonymous {
        let anon = state.types[id.0 as usize].anonymous.clone();
        let (container, ordinal) = anon
            .map(|a| (a.container, a.ordinal))
            .unwrap_or_else(|| (QName::local("anonymous"), id.0));
        let package = config.package_for(container.namespace.as_deref());
        let base = format!(
            "{}.{}${}",
            package,
            upper_camel_case(&container.local_name),
            ordinal
        );
        let assigned = global_names.claim(&base);
        state.types[id.0 as usize].binding_name = Some(assigned);
    }
    let element_ids: Vec<_> = state.element_table.values().copied().collect();
    for id in element_ids {
        if state.elements[id.0 as usize].binding_name.is_some() {
            continue;
        }
        let name = state.elements[id.0 as usize].name.clone();
        let package = config.package_for(name.namespace.as_deref());
        let base = format!("{}.{}Document", package, upper_camel_case(&name.local_name));
        let assigned = global_names.claim(&base);
        state.elements[id.0 as usize].binding_name = Some(assigned);
    }
    let attribute_ids: Vec<_> = state.attribute_table.values().copied().collect();
    for id in attribute_ids {
        if state.attributes[id.0 as usize].binding_name.is_some() {
            continue;
        }
        let name = state.attributes[id.0 as usize].name.clone();
        let package = config.package_for(name.namespace.as_deref());
        let base = format!("{}.{}Attribute", package, upper_camel_case(&name.local_name));
        let assigned = global_names.claim(&base);
        state.attributes[id.0 as usize].binding_name = Some(assigned);
    }

    // Pass 2: property names, base types before derived ones so inherited
    // names exist when they are reused.
    let mut order: Vec<TypeId> = state.types.iter().map(|t| t.id).collect();
    order.sort_by_key(|id| state.types[id.0 as usize].base_depth);
    for id in order {
        assign_property_names(state, id);
        assign_enum_constant_names(state, id);
        state.types[id.0 as usize].lifecycle = Lifecycle::Finalized;
    }
}

fn assign_property_names(state: &mut CompilerState, id: TypeId) {
    if state.types[id.0 as usize].lifecycle >= Lifecycle::Finalized {
        return;
    }
    let base = state.types[id.0 as usize].base.clone();
    let base_props: Vec<(QName, bool, Option<String>)> = match &base {
        TypeRef::Local(b) => state.types[b.0 as usize]
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.is_attribute, p.binding_name.clone()))
            .collect(),
        TypeRef::External { system, handle } => state
            .linker
            .system(system)
            .and_then(|s| s.resolve_handle(handle).ok())
            .and_then(|c| c.as_type().map(|t| {
                t.properties
                    .iter()
                    .map(|p| (p.name.clone(), p.is_attribute, p.binding_name.clone()))
                    .collect()
            }))
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut names = NameSet::new();
    let mut assignments: Vec<(usize, String)> = Vec::new();
    let props = &state.types[id.0 as usize].properties;

    // Inherited properties keep the base's exact binding name.
    for (i, prop) in props.iter().enumerate() {
        if !prop.inherited {
            continue;
        }
        let reused = base_props
            .iter()
            .find(|(n, a, _)| *n == prop.name && *a == prop.is_attribute)
            .and_then(|(_, _, b)| b.clone())
            .unwrap_or_else(|| upper_camel_case(&prop.name.local_name));
        names.reserve(&reused);
        assignments.push((i, reused));
    }
    for (i, prop) in props.iter().enumerate() {
        if prop.inherited {
            continue;
        }
        let mut base_name = upper_camel_case(&prop.name.local_name);
        if RESERVED_PROPERTY_NAMES.contains(&base_name.as_str())
            || base_name.ends_with(RESERVED_PROPERTY_SUFFIX)
        {
            base_name.push('1');
        }
        assignments.push((i, names.claim(&base_name)));
    }

    let codes: Vec<(usize, BindingTypeCode)> = state.types[id.0 as usize]
        .properties
        .iter()
        .enumerate()
        .map(|(i, p)| (i, binding_code(state, &p.type_ref, 0)))
        .collect();

    let content = state.types[id.0 as usize]
        .detail
        .as_complex()
        .and_then(|d| d.content.clone());
    let nds: Vec<(usize, Vec<QName>)> = state.types[id.0 as usize]
        .properties
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_attribute && p.occurrence == PropertyOccurrence::Array)
        .filter_map(|(i, p)| {
            content.as_ref().map(|c| {
                let mut accepted = vec![p.name.clone()];
                accepted.extend(p.accepted_names.iter().cloned());
                (i, non_delimiting_set(c, &accepted))
            })
        })
        .collect();

    let t = &mut state.types[id.0 as usize];
    for (i, name) in assignments {
        t.properties[i].binding_name = Some(name);
    }
    for (i, code) in codes {
        t.properties[i].binding_code = Some(code);
    }
    for (i, set) in nds {
        t.properties[i].non_delimiting = set;
    }
}

fn assign_enum_constant_names(state: &mut CompilerState, id: TypeId) {
    let values = state.types[id.0 as usize].facets.enumerations.clone();
    if values.is_empty() {
        return;
    }
    let mut names = NameSet::new();
    let constants: Vec<String> = values
        .iter()
        .map(|v| names.claim(&enum_constant_base(v)))
        .collect();
    state.types[id.0 as usize].enum_constant_names = constants;
}

fn enum_constant_base(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push('_');
        }
    }
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        out.insert(0, 'X');
    }
    out
}

/// Compute a property's binding type code from its resolved XML type
fn binding_code(state: &CompilerState, type_ref: &TypeRef, nesting: u32) -> BindingTypeCode {
    if nesting > 4 {
        return BindingTypeCode::Object;
    }
    let Some(info) = simple_types::snapshot(state, type_ref) else {
        return BindingTypeCode::Object;
    };
    if !info.is_simple {
        return BindingTypeCode::Object;
    }
    match info.variety {
        Some(Variety::Atomic) | None => atomic_code(&info),
        Some(Variety::List) => binding_code(state, &info.item.clone(), nesting + 1),
        Some(Variety::Union) => {
            let codes: Vec<BindingTypeCode> = info
                .members
                .iter()
                .map(|m| binding_code(state, m, nesting + 1))
                .collect();
            match codes.split_first() {
                Some((first, rest)) if rest.iter().all(|c| c == first) => *first,
                _ => BindingTypeCode::Object,
            }
        }
    }
}

fn atomic_code(info: &SimpleSnapshot) -> BindingTypeCode {
    let primitive = info
        .primitive
        .and_then(|p| builtins::builtin(p).primitive);
    match primitive {
        Some(PrimitiveKind::Boolean) => BindingTypeCode::Boolean,
        Some(PrimitiveKind::Float) => BindingTypeCode::Float,
        Some(PrimitiveKind::Double) => BindingTypeCode::Double,
        Some(PrimitiveKind::Decimal) => match info.decimal_size {
            Some(DecimalSize::Byte) => BindingTypeCode::Byte,
            Some(DecimalSize::Short) => BindingTypeCode::Short,
            Some(DecimalSize::Int) => BindingTypeCode::Int,
            Some(DecimalSize::Long) => BindingTypeCode::Long,
            Some(DecimalSize::Big) => BindingTypeCode::BigInteger,
            None => BindingTypeCode::BigDecimal,
        },
        Some(PrimitiveKind::HexBinary) | Some(PrimitiveKind::Base64Binary) => {
            BindingTypeCode::Bytes
        }
        Some(PrimitiveKind::DateTime)
        | Some(PrimitiveKind::Time)
        | Some(PrimitiveKind::Date)
        | Some(PrimitiveKind::GYearMonth)
        | Some(PrimitiveKind::GYear)
        | Some(PrimitiveKind::GMonthDay)
        | Some(PrimitiveKind::GDay)
        | Some(PrimitiveKind::GMonth) => BindingTypeCode::Date,
        Some(PrimitiveKind::QName) => BindingTypeCode::QName,
        Some(PrimitiveKind::String)
        | Some(PrimitiveKind::AnyUri)
        | Some(PrimitiveKind::Duration)
        | Some(PrimitiveKind::Notation) => BindingTypeCode::String,
        None => BindingTypeCode::Object,
    }
}

// ---------------------------------------------------------------------------
// Append positioning
// ---------------------------------------------------------------------------

/// The names that may interleave with a run of `accepted` occurrences
/// without terminating it, for the array-append positioning rule
pub(crate) fn non_delimiting_set(content: &Particle, accepted: &[QName]) -> Vec<QName> {
    let mut all = BTreeSet::new();
    content.contained_names(&mut all);
    let mut delimiting = BTreeSet::new();
    delimiting_names(content, accepted, &mut delimiting);
    all.into_iter()
        .filter(|n| !delimiting.contains(n) && !accepted.contains(n))
        .collect()
}

/// Collect the names that terminate a contiguous run of `accepted`.
/// Returns whether the particle can contain an accepted occurrence.
fn delimiting_names(p: &Particle, accepted: &[QName], out: &mut BTreeSet<QName>) -> bool {
    // Inside an unordered or repeating group, any sibling ends the run.
    if matches!(p.term, ParticleTerm::All(_)) || p.occurs.is_multiple() {
        if p.contains_name(accepted) {
            p.contained_names(out);
            return true;
        }
        return false;
    }
    match &p.term {
        ParticleTerm::Element(e) => accepted.contains(&e.name),
        ParticleTerm::Wildcard(_) => false,
        ParticleTerm::Choice(children) => {
            let mut found = false;
            for c in children {
                if c.contains_name(accepted) {
                    delimiting_names(c, accepted, out);
                    found = true;
                }
            }
            found
        }
        ParticleTerm::Sequence(children) => {
            for c in children.iter().rev() {
                if c.contains_name(accepted) {
                    delimiting_names(c, accepted, out);
                    return true;
                }
            }
            false
        }
        ParticleTerm::All(_) => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::particles::{ElementParticle, Occurs};

    fn elem(name: &str, occurs: Occurs) -> Particle {
        Particle::element(
            occurs,
            ElementParticle {
                name: QName::local(name),
                type_ref: TypeRef::None,
                nillable: false,
                default_value: None,
                fixed_value: None,
            },
        )
    }

    #[test]
    fn test_name_set_numbering() {
        let mut names = NameSet::new();
        assert_eq!(names.claim("Item"), "Item");
        assert_eq!(names.claim("Item"), "Item2");
        assert_eq!(names.claim("item"), "item3");
    }

    #[test]
    fn test_binding_config_override() {
        let config =
            BindingConfig::from_json(r#"{"package_map": {"urn:acme": "com.acme.override"}}"#)
                .unwrap();
        assert_eq!(config.package_for(Some("urn:acme")), "com.acme.override");
        assert_eq!(config.package_for(Some("urn:other")), "other");
        assert_eq!(config.package_for(None), "noNamespace");
    }

    #[test]
    fn test_enum_constant_base() {
        assert_eq!(enum_constant_base("red"), "RED");
        assert_eq!(enum_constant_base("light-blue"), "LIGHT_BLUE");
        assert_eq!(enum_constant_base("3rd"), "X3RD");
    }

    #[test]
    fn test_non_delimiting_interior_run() {
        // sequence(a, b*, a): b may interleave with the run of a.
        let content = Particle::sequence(
            Occurs::once(),
            vec![
                elem("a", Occurs::once()),
                elem("b", Occurs::zero_or_more()),
                elem("a", Occurs::once()),
            ],
        );
        let nds = non_delimiting_set(&content, &[QName::local("a")]);
        assert_eq!(nds, vec![QName::local("b")]);
    }

    #[test]
    fn test_non_delimiting_trailing_tail() {
        // sequence(a, b*, a, c*): both b and c are non-delimiting.
        let content = Particle::sequence(
            Occurs::once(),
            vec![
                elem("a", Occurs::once()),
                elem("b", Occurs::zero_or_more()),
                elem("a", Occurs::once()),
                elem("c", Occurs::zero_or_more()),
            ],
        );
        let nds = non_delimiting_set(&content, &[QName::local("a")]);
        assert_eq!(nds, vec![QName::local("b"), QName::local("c")]);
    }

    #[test]
    fn test_repeating_group_delimits_everything() {
        // (a | b)*: the whole group repeats, so every sibling delimits.
        let content = Particle::choice(
            Occurs::zero_or_more(),
            vec![elem("a", Occurs::once()), elem("b", Occurs::once())],
        );
        let nds = non_delimiting_set(&content, &[QName::local("a")]);
        assert!(nds.is_empty());
    }
}
