//! Simple-type derivation and facet resolution
//!
//! Dispatches on how a parsed simple type is declared (list, union or
//! restriction), merges and validates facets against the base's table,
//! derives the fundamental facets and infers the storage width of
//! decimal-kinded types.

use rust_decimal::Decimal;

use crate::diagnostics::{codes, Diagnostic};
use crate::namespaces::QName;
use crate::parsed::{ParsedFacet, ParsedSimpleDerivation};

use super::builtins::{self, BuiltinId, PrimitiveKind};
use super::components::{
    DecimalSize, DerivationKind, FundamentalFacets, Lifecycle, Orderedness, TypeDetail,
    TypeId, TypeRef, Variety,
};
use super::facets::{FacetKind, FacetTable, FacetValue, WhiteSpaceRule};
use super::resolver;
use super::state::CompilerState;

/// Digit-count peg: widest totalDigits still held by an 8-bit value
pub const DIGITS_BYTE: u64 = 2;
/// Digit-count peg: widest totalDigits still held by a 16-bit value
pub const DIGITS_SHORT: u64 = 4;
/// Digit-count peg: widest totalDigits still held by a 32-bit value
pub const DIGITS_INT: u64 = 9;
/// Digit-count peg: widest totalDigits still held by a 64-bit value
pub const DIGITS_LONG: u64 = 18;

/// Everything the facet resolver needs to know about a base or member type
#[derive(Debug, Clone)]
pub(crate) struct SimpleSnapshot {
    pub is_simple: bool,
    pub variety: Option<Variety>,
    pub primitive: Option<BuiltinId>,
    pub facets: FacetTable,
    pub fundamental: FundamentalFacets,
    pub depth: u32,
    pub item: TypeRef,
    pub members: Vec<TypeRef>,
    pub member_has_list: bool,
    pub decimal_size: Option<DecimalSize>,
}

/// Snapshot whatever a type reference points at; None when the reference
/// is empty or cannot be inspected
pub(crate) fn snapshot(state: &CompilerState, r: &TypeRef) -> Option<SimpleSnapshot> {
    match r {
        TypeRef::None | TypeRef::Handle(_) => None,
        TypeRef::Local(id) => {
            let t = &state.types[id.0 as usize];
            let simple = t.detail.as_simple();
            Some(SimpleSnapshot {
                is_simple: t.is_simple(),
                variety: simple.and_then(|d| d.variety),
                primitive: simple.and_then(|d| d.primitive),
                facets: t.facets.clone(),
                fundamental: t.fundamental,
                depth: t.base_depth,
                item: simple.map(|d| d.item.clone()).unwrap_or_default(),
                members: simple.map(|d| d.members.clone()).unwrap_or_default(),
                member_has_list: simple.map(|d| d.member_has_list).unwrap_or(false),
                decimal_size: t.decimal_size,
            })
        }
        TypeRef::Builtin(id) => {
            let b = builtins::builtin(*id);
            let primitive = primitive_ancestor(*id);
            Some(SimpleSnapshot {
                is_simple: *id != builtins::ANY_TYPE,
                variety: b.variety,
                primitive,
                facets: b.facets.clone(),
                fundamental: b.fundamental,
                depth: b.depth,
                item: TypeRef::None,
                members: Vec::new(),
                member_has_list: false,
                decimal_size: b.decimal_size,
            })
        }
        TypeRef::External { system, handle } => {
            let system = state.linker.system(system)?;
            let component = system.resolve_handle(handle).ok()?;
            let t = component.as_type()?;
            let simple = t.detail.as_simple();
            Some(SimpleSnapshot {
                is_simple: t.is_simple(),
                variety: simple.and_then(|d| d.variety),
                primitive: simple.and_then(|d| d.primitive),
                facets: t.facets.clone(),
                fundamental: t.fundamental,
                depth: t.base_depth,
                item: simple.map(|d| d.item.clone()).unwrap_or_default(),
                members: simple.map(|d| d.members.clone()).unwrap_or_default(),
                member_has_list: simple.map(|d| d.member_has_list).unwrap_or(false),
                decimal_size: t.decimal_size,
            })
        }
    }
}

/// The built-in primitive a built-in type descends from
fn primitive_ancestor(id: BuiltinId) -> Option<BuiltinId> {
    let b = builtins::builtin(id);
    b.primitive?;
    let mut current = id;
    loop {
        let entry = builtins::builtin(current);
        match entry.base {
            Some(base) if base != builtins::ANY_SIMPLE_TYPE => current = base,
            _ => return Some(current),
        }
    }
}

/// Resolve the body of a simple type shell
pub(crate) fn resolve_simple_body(
    state: &mut CompilerState,
    id: TypeId,
    derivation: ParsedSimpleDerivation,
    source_file: Option<String>,
) {
    match derivation {
        ParsedSimpleDerivation::List { item, inline_item } => {
            resolve_list(state, id, item, inline_item, source_file)
        }
        ParsedSimpleDerivation::Union { members, inline_members } => {
            resolve_union(state, id, members, inline_members, source_file)
        }
        ParsedSimpleDerivation::Restriction { base, inline_base, facets } => {
            resolve_restriction(state, id, base, inline_base, facets, source_file)
        }
    }
}

fn diag_location(state: &mut CompilerState, d: Diagnostic, file: &Option<String>, id: TypeId) {
    let d = match (file, &state.types[id.0 as usize].name) {
        (Some(f), Some(n)) => d.with_component(f.clone(), n.to_string()),
        (Some(f), None) => d.with_location(f.clone()),
        _ => d,
    };
    state.sink.push(d);
}

fn resolve_list(
    state: &mut CompilerState,
    id: TypeId,
    item: Option<QName>,
    inline_item: Option<Box<crate::parsed::ParsedSimpleType>>,
    source_file: Option<String>,
) {
    let mut item_ref = match (item, inline_item) {
        (Some(name), _) => resolver::resolve_type_by_name(
            state,
            &name,
            source_file.as_deref(),
            TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE),
        ),
        (None, Some(inline)) => {
            let container = anon_container(state, id);
            resolver::create_anonymous_simple(state, *inline, container, source_file.clone())
        }
        (None, None) => {
            diag_location(
                state,
                Diagnostic::error(codes::MALFORMED_INPUT, "list type declares no item type"),
                &source_file,
                id,
            );
            TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE)
        }
    };

    // A list's items must be atomic or union-of-atomic values.
    if let Some(info) = snapshot(state, &item_ref) {
        let item_is_list = info.variety == Some(Variety::List)
            || (info.variety == Some(Variety::Union) && info.member_has_list);
        if item_is_list {
            diag_location(
                state,
                Diagnostic::error(
                    codes::ITEM_TYPE_LIST_OF_LIST,
                    "the item type of a list must not itself be a list",
                ),
                &source_file,
                id,
            );
            item_ref = TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE);
        } else if !info.is_simple {
            diag_location(
                state,
                Diagnostic::error(
                    codes::MALFORMED_INPUT,
                    "the item type of a list must be a simple type",
                ),
                &source_file,
                id,
            );
            item_ref = TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE);
        }
    }

    let t = &mut state.types[id.0 as usize];
    t.base = TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE);
    t.base_depth = builtins::builtin(builtins::ANY_SIMPLE_TYPE).depth + 1;
    t.derivation = DerivationKind::Restriction;
    if let TypeDetail::Simple(detail) = &mut t.detail {
        detail.variety = Some(Variety::List);
        detail.item = item_ref;
        detail.primitive = None;
        detail.members.clear();
    }
    t.facets = FacetTable::new();
    t.facets.set(
        FacetKind::WhiteSpace,
        FacetValue::WhiteSpace(WhiteSpaceRule::Collapse),
        true,
    );
    t.fundamental = FundamentalFacets::default();
    t.decimal_size = None;
    t.source_file = source_file;
    t.lifecycle = Lifecycle::Resolved;
}

fn resolve_union(
    state: &mut CompilerState,
    id: TypeId,
    members: Vec<QName>,
    inline_members: Vec<crate::parsed::ParsedSimpleType>,
    source_file: Option<String>,
) {
    let mut resolved: Vec<TypeRef> = Vec::new();
    let mut member_has_list = false;
    let mut any_ordered = false;

    for name in members {
        let r = resolver::resolve_type_by_name(
            state,
            &name,
            source_file.as_deref(),
            TypeRef::None,
        );
        if !r.is_some() {
            // Unresolvable or cyclic members are dropped, not substituted;
            // the union keeps its remaining members.
            continue;
        }
        match snapshot(state, &r) {
            Some(info) if info.is_simple => {
                member_has_list |= info.variety == Some(Variety::List);
                any_ordered |= info.fundamental.ordered != Orderedness::None;
                resolved.push(r);
            }
            _ => {
                diag_location(
                    state,
                    Diagnostic::error(
                        codes::UNION_MEMBER_NOT_SIMPLE,
                        format!("union member '{}' is not a simple type", name),
                    ),
                    &source_file,
                    id,
                );
            }
        }
    }

    for inline in inline_members {
        let container = anon_container(state, id);
        let r = resolver::create_anonymous_simple(state, inline, container, source_file.clone());
        if let Some(info) = snapshot(state, &r) {
            member_has_list |= info.variety == Some(Variety::List);
            any_ordered |= info.fundamental.ordered != Orderedness::None;
        }
        resolved.push(r);
    }

    let t = &mut state.types[id.0 as usize];
    t.base = TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE);
    t.base_depth = builtins::builtin(builtins::ANY_SIMPLE_TYPE).depth + 1;
    t.derivation = DerivationKind::Restriction;
    if let TypeDetail::Simple(detail) = &mut t.detail {
        detail.variety = Some(Variety::Union);
        detail.members = resolved;
        detail.member_has_list = member_has_list;
        detail.primitive = None;
        detail.item = TypeRef::None;
    }
    t.facets = FacetTable::new();
    t.fundamental = FundamentalFacets {
        ordered: if any_ordered { Orderedness::Partial } else { Orderedness::None },
        bounded: false,
        finite: false,
        numeric: false,
    };
    t.decimal_size = None;
    t.source_file = source_file;
    t.lifecycle = Lifecycle::Resolved;
}

fn resolve_restriction(
    state: &mut CompilerState,
    id: TypeId,
    base: Option<QName>,
    inline_base: Option<Box<crate::parsed::ParsedSimpleType>>,
    facets: Vec<ParsedFacet>,
    source_file: Option<String>,
) {
    let base_ref = match (base, inline_base) {
        (Some(name), _) => resolver::resolve_type_by_name(
            state,
            &name,
            source_file.as_deref(),
            TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE),
        ),
        (None, Some(inline)) => {
            let container = anon_container(state, id);
            resolver::create_anonymous_simple(state, *inline, container, source_file.clone())
        }
        (None, None) => TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE),
    };

    let (base_ref, base_info) = match snapshot(state, &base_ref) {
        Some(info) if info.is_simple => (base_ref, info),
        _ => {
            diag_location(
                state,
                Diagnostic::error(
                    codes::MALFORMED_INPUT,
                    "the base of a simple type restriction must be a simple type",
                ),
                &source_file,
                id,
            );
            let fallback = TypeRef::Builtin(builtins::ANY_SIMPLE_TYPE);
            let info = snapshot(state, &fallback).expect("anySimpleType snapshot");
            (fallback, info)
        }
    };

    // Copy-on-derive: the base's facet table is the starting snapshot.
    let mut table = base_info.facets.clone();
    let primitive_kind = base_info
        .primitive
        .and_then(|p| builtins::builtin(p).primitive);
    for facet in facets {
        apply_facet(state, id, &mut table, &base_info, primitive_kind, facet, &source_file);
    }

    let fundamental = compute_fundamental(&table, &base_info, primitive_kind);
    let decimal_size = infer_decimal_size(state, &base_ref, &base_info, &table, primitive_kind);

    let t = &mut state.types[id.0 as usize];
    t.base_depth = base_info.depth + 1;
    t.base = base_ref;
    t.derivation = DerivationKind::Restriction;
    if let TypeDetail::Simple(detail) = &mut t.detail {
        detail.variety = base_info.variety.or(Some(Variety::Atomic));
        detail.primitive = base_info.primitive;
        detail.item = base_info.item.clone();
        detail.member_has_list = base_info.member_has_list;
    }
    t.facets = table;
    t.fundamental = fundamental;
    t.decimal_size = decimal_size;
    t.source_file = source_file;
    t.lifecycle = Lifecycle::Resolved;
}

fn anon_container(state: &CompilerState, id: TypeId) -> QName {
    state.types[id.0 as usize]
        .name
        .clone()
        .unwrap_or_else(|| QName::local("anonymous"))
}

/// Whether a facet kind applies to a type of the given shape
pub(crate) fn facet_applies(
    kind: FacetKind,
    variety: Variety,
    primitive: Option<PrimitiveKind>,
) -> bool {
    match variety {
        Variety::List => matches!(
            kind,
            FacetKind::Length
                | FacetKind::MinLength
                | FacetKind::MaxLength
                | FacetKind::Pattern
                | FacetKind::Enumeration
                | FacetKind::WhiteSpace
        ),
        Variety::Union => matches!(kind, FacetKind::Pattern | FacetKind::Enumeration),
        Variety::Atomic => match kind {
            FacetKind::Pattern | FacetKind::Enumeration | FacetKind::WhiteSpace => true,
            FacetKind::Length | FacetKind::MinLength | FacetKind::MaxLength => {
                primitive.map(|p| p.has_length()).unwrap_or(true)
            }
            FacetKind::TotalDigits | FacetKind::FractionDigits => {
                primitive == Some(PrimitiveKind::Decimal)
            }
            FacetKind::MinInclusive
            | FacetKind::MaxInclusive
            | FacetKind::MinExclusive
            | FacetKind::MaxExclusive => primitive
                .map(|p| p.orderedness() != Orderedness::None)
                .unwrap_or(false),
        },
    }
}

fn parse_facet_value(
    kind: FacetKind,
    raw: &str,
    primitive: Option<PrimitiveKind>,
) -> Option<FacetValue> {
    match kind {
        FacetKind::Length
        | FacetKind::MinLength
        | FacetKind::MaxLength
        | FacetKind::TotalDigits
        | FacetKind::FractionDigits => raw.trim().parse::<u64>().ok().map(FacetValue::Count),
        FacetKind::WhiteSpace => WhiteSpaceRule::parse(raw.trim()).map(FacetValue::WhiteSpace),
        FacetKind::MinInclusive
        | FacetKind::MaxInclusive
        | FacetKind::MinExclusive
        | FacetKind::MaxExclusive => match primitive {
            Some(p) if p.is_numeric() => {
                raw.trim().parse::<Decimal>().ok().map(FacetValue::Number)
            }
            _ => Some(FacetValue::Lexical(raw.trim().to_string())),
        },
        FacetKind::Pattern | FacetKind::Enumeration => Some(FacetValue::Lexical(raw.to_string())),
    }
}

/// The conflicting opposite-flavor bound on the same end, if any
fn conflicting_bound(kind: FacetKind) -> Option<FacetKind> {
    match kind {
        FacetKind::MinInclusive => Some(FacetKind::MinExclusive),
        FacetKind::MinExclusive => Some(FacetKind::MinInclusive),
        FacetKind::MaxInclusive => Some(FacetKind::MaxExclusive),
        FacetKind::MaxExclusive => Some(FacetKind::MaxInclusive),
        _ => None,
    }
}

/// Whether replacing `old` with `new` narrows the value space for `kind`
fn narrows(kind: FacetKind, old: &FacetValue, new: &FacetValue) -> Option<bool> {
    use std::cmp::Ordering;
    let ord = new.compare(old)?;
    let ok = match kind {
        FacetKind::Length => ord == Ordering::Equal,
        FacetKind::MinLength
        | FacetKind::MinInclusive
        | FacetKind::MinExclusive => ord != Ordering::Less,
        FacetKind::MaxLength
        | FacetKind::MaxInclusive
        | FacetKind::MaxExclusive
        | FacetKind::TotalDigits
        | FacetKind::FractionDigits => ord != Ordering::Greater,
        FacetKind::WhiteSpace => ord != Ordering::Less,
        _ => true,
    };
    Some(ok)
}

fn apply_facet(
    state: &mut CompilerState,
    id: TypeId,
    table: &mut FacetTable,
    base: &SimpleSnapshot,
    primitive: Option<PrimitiveKind>,
    facet: ParsedFacet,
    source_file: &Option<String>,
) {
    let variety = base.variety.unwrap_or(Variety::Atomic);
    if !facet_applies(facet.kind, variety, primitive) {
        diag_location(
            state,
            Diagnostic::error(
                codes::FACET_VIOLATION,
                format!("facet '{}' does not apply to this type", facet.kind),
            ),
            source_file,
            id,
        );
        return;
    }

    let value = match parse_facet_value(facet.kind, &facet.value, primitive) {
        Some(v) => v,
        None => {
            diag_location(
                state,
                Diagnostic::error(
                    codes::FACET_VIOLATION,
                    format!("invalid value '{}' for facet '{}'", facet.value, facet.kind),
                ),
                source_file,
                id,
            );
            return;
        }
    };

    if facet.kind.is_multi_valued() {
        match facet.kind {
            FacetKind::Pattern => table.patterns.push(facet.value),
            FacetKind::Enumeration => table.enumerations.push(facet.value),
            _ => unreachable!(),
        }
        return;
    }

    // Inclusive and exclusive limits may not both constrain the same end.
    if let Some(conflict) = conflicting_bound(facet.kind) {
        if table.get(conflict).is_some() {
            diag_location(
                state,
                Diagnostic::error(
                    codes::FACET_BOUND_CONFLICT,
                    format!(
                        "cannot define both inclusive and exclusive limit: '{}' conflicts with '{}'",
                        facet.kind, conflict
                    ),
                ),
                source_file,
                id,
            );
            return;
        }
    }

    if let Some(existing) = table.get(facet.kind).cloned() {
        if table.is_fixed(facet.kind) && existing != value {
            diag_location(
                state,
                Diagnostic::error(
                    codes::FACET_FIXED_OVERRIDE,
                    format!(
                        "facet '{}' is fixed on the base type and may not change value",
                        facet.kind
                    ),
                ),
                source_file,
                id,
            );
            return;
        }
        if let Some(false) = narrows(facet.kind, &existing, &value) {
            let code = if facet.kind == FacetKind::WhiteSpace {
                codes::WHITESPACE_LOOSENED
            } else {
                codes::FACET_VIOLATION
            };
            diag_location(
                state,
                Diagnostic::error(
                    code,
                    format!(
                        "facet '{}' value {} does not narrow the inherited value {}",
                        facet.kind, value, existing
                    ),
                ),
                source_file,
                id,
            );
            return;
        }
    }

    // Bounds on opposite ends must not cross.
    if facet.kind.is_bound() {
        let (lo, hi) = match facet.kind {
            FacetKind::MinInclusive | FacetKind::MinExclusive => {
                (Some(&value), table.get(FacetKind::MaxInclusive).or_else(|| table.get(FacetKind::MaxExclusive)))
            }
            _ => (
                table
                    .get(FacetKind::MinInclusive)
                    .or_else(|| table.get(FacetKind::MinExclusive)),
                Some(&value),
            ),
        };
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if let Some(std::cmp::Ordering::Greater) = lo.compare(hi) {
                diag_location(
                    state,
                    Diagnostic::error(
                        codes::FACET_BOUND_INVERTED,
                        format!("lower bound {} is above upper bound {}", lo, hi),
                    ),
                    source_file,
                    id,
                );
                return;
            }
        }
    }

    table.set(facet.kind, value, facet.fixed);
}

fn compute_fundamental(
    table: &FacetTable,
    base: &SimpleSnapshot,
    primitive: Option<PrimitiveKind>,
) -> FundamentalFacets {
    let ordered = base.fundamental.ordered;
    let bounded = table.has_lower_bound() && table.has_upper_bound();
    let discrete = primitive == Some(PrimitiveKind::Decimal)
        && table.get(FacetKind::FractionDigits) == Some(&FacetValue::Count(0));
    let finite = bounded && (discrete || base.fundamental.finite);
    let numeric = base.fundamental.numeric || primitive.map(|p| p.is_numeric()).unwrap_or(false);
    FundamentalFacets { ordered, bounded, finite, numeric }
}

fn infer_decimal_size(
    state: &CompilerState,
    base_ref: &TypeRef,
    base: &SimpleSnapshot,
    table: &FacetTable,
    primitive: Option<PrimitiveKind>,
) -> Option<DecimalSize> {
    if base.variety.unwrap_or(Variety::Atomic) != Variety::Atomic
        || primitive != Some(PrimitiveKind::Decimal)
    {
        return None;
    }
    // Fractional decimals take no native integral width at all.
    if table.get(FacetKind::FractionDigits) != Some(&FacetValue::Count(0)) {
        return None;
    }

    let ancestor = builtin_ancestor_size(state, base_ref).unwrap_or(DecimalSize::Big);

    let lower = table
        .get(FacetKind::MinInclusive)
        .or_else(|| table.get(FacetKind::MinExclusive))
        .and_then(|v| v.as_number());
    let upper = table
        .get(FacetKind::MaxInclusive)
        .or_else(|| table.get(FacetKind::MaxExclusive))
        .and_then(|v| v.as_number());

    let implied = match (lower, upper) {
        (Some(lo), Some(hi)) => Some(size_for_bounds(lo, hi)),
        _ => table
            .get(FacetKind::TotalDigits)
            .and_then(|v| v.as_count())
            .map(|digits| {
                // Digit counts only peg a width; a byte/short peg is not
                // proof the values actually fit, so it promotes one step
                // unless the base chain already guarantees the width.
                let pegged = size_for_digits(digits);
                match pegged {
                    DecimalSize::Byte if ancestor > DecimalSize::Byte => DecimalSize::Short,
                    DecimalSize::Short if ancestor > DecimalSize::Short => DecimalSize::Int,
                    other => other,
                }
            }),
    };

    Some(implied.map(|s| s.min(ancestor)).unwrap_or(ancestor))
}

fn size_for_bounds(lo: Decimal, hi: Decimal) -> DecimalSize {
    let fits = |min: i64, max: i64| lo >= Decimal::from(min) && hi <= Decimal::from(max);
    if fits(i8::MIN as i64, i8::MAX as i64) {
        DecimalSize::Byte
    } else if fits(i16::MIN as i64, i16::MAX as i64) {
        DecimalSize::Short
    } else if fits(i32::MIN as i64, i32::MAX as i64) {
        DecimalSize::Int
    } else if fits(i64::MIN, i64::MAX) {
        DecimalSize::Long
    } else {
        DecimalSize::Big
    }
}

fn size_for_digits(digits: u64) -> DecimalSize {
    if digits <= DIGITS_BYTE {
        DecimalSize::Byte
    } else if digits <= DIGITS_SHORT {
        DecimalSize::Short
    } else if digits <= DIGITS_INT {
        DecimalSize::Int
    } else if digits <= DIGITS_LONG {
        DecimalSize::Long
    } else {
        DecimalSize::Big
    }
}

fn builtin_ancestor_size(state: &CompilerState, base_ref: &TypeRef) -> Option<DecimalSize> {
    let mut current = base_ref.clone();
    // Base depth bounds the walk; cycles were already broken by the guard.
    for _ in 0..=64 {
        match current {
            TypeRef::Builtin(id) => return builtins::builtin(id).decimal_size,
            TypeRef::Local(id) => current = state.types[id.0 as usize].base.clone(),
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_applicability() {
        assert!(facet_applies(FacetKind::TotalDigits, Variety::Atomic, Some(PrimitiveKind::Decimal)));
        assert!(!facet_applies(FacetKind::TotalDigits, Variety::Atomic, Some(PrimitiveKind::String)));
        assert!(facet_applies(FacetKind::MaxLength, Variety::List, None));
        assert!(!facet_applies(FacetKind::MaxInclusive, Variety::Union, None));
        assert!(!facet_applies(FacetKind::Length, Variety::Atomic, Some(PrimitiveKind::Boolean)));
    }

    #[test]
    fn test_parse_facet_values() {
        assert_eq!(
            parse_facet_value(FacetKind::TotalDigits, "5", Some(PrimitiveKind::Decimal)),
            Some(FacetValue::Count(5))
        );
        assert_eq!(
            parse_facet_value(FacetKind::MaxInclusive, "10.5", Some(PrimitiveKind::Decimal)),
            Some(FacetValue::Number(Decimal::new(105, 1)))
        );
        assert_eq!(
            parse_facet_value(FacetKind::MaxInclusive, "2001-01-01", Some(PrimitiveKind::Date)),
            Some(FacetValue::Lexical("2001-01-01".to_string()))
        );
        assert_eq!(parse_facet_value(FacetKind::Length, "-3", None), None);
    }

    #[test]
    fn test_narrowing() {
        let old = FacetValue::Count(10);
        assert_eq!(narrows(FacetKind::MaxLength, &old, &FacetValue::Count(5)), Some(true));
        assert_eq!(narrows(FacetKind::MaxLength, &old, &FacetValue::Count(11)), Some(false));
        assert_eq!(narrows(FacetKind::MinLength, &old, &FacetValue::Count(11)), Some(true));
        assert_eq!(narrows(FacetKind::MinLength, &old, &FacetValue::Count(9)), Some(false));
        let ws_old = FacetValue::WhiteSpace(WhiteSpaceRule::Replace);
        let ws_new = FacetValue::WhiteSpace(WhiteSpaceRule::Preserve);
        assert_eq!(narrows(FacetKind::WhiteSpace, &ws_old, &ws_new), Some(false));
    }

    #[test]
    fn test_size_pegs() {
        assert_eq!(size_for_digits(2), DecimalSize::Byte);
        assert_eq!(size_for_digits(4), DecimalSize::Short);
        assert_eq!(size_for_digits(9), DecimalSize::Int);
        assert_eq!(size_for_digits(18), DecimalSize::Long);
        assert_eq!(size_for_digits(19), DecimalSize::Big);
    }

    #[test]
    fn test_size_for_bounds() {
        assert_eq!(size_for_bounds(Decimal::from(-10), Decimal::from(10)), DecimalSize::Byte);
        assert_eq!(size_for_bounds(Decimal::from(0), Decimal::from(40000)), DecimalSize::Int);
        assert_eq!(
            size_for_bounds(Decimal::from(i64::MIN), Decimal::from(i64::MAX)),
            DecimalSize::Long
        );
    }
}
