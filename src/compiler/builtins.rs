//! The built-in type system
//!
//! Every compilation links against this table: the universal roots
//! `anyType` and `anySimpleType`, the nineteen primitives, and the derived
//! string and integer hierarchies. Entries carry the facet tables and
//! fundamental facets the facet resolver inherits from.

use once_cell::sync::Lazy;

use crate::namespaces::QName;

use super::components::{DecimalSize, FundamentalFacets, Orderedness, Variety};
use super::facets::{FacetKind, FacetTable, FacetValue, WhiteSpaceRule};

/// XSD namespace of every built-in type
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Handle prefix marking a reference into the built-in type system
pub const BUILTIN_HANDLE_PREFIX: &str = "_BI_";

/// Index into the built-in table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u16);

/// Primitive kind of an atomic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    String,
    Boolean,
    Decimal,
    Float,
    Double,
    Duration,
    DateTime,
    Time,
    Date,
    GYearMonth,
    GYear,
    GMonthDay,
    GDay,
    GMonth,
    HexBinary,
    Base64Binary,
    AnyUri,
    QName,
    Notation,
}

impl PrimitiveKind {
    /// Whether values of this kind are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, PrimitiveKind::Decimal | PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// Order of the kind's value space
    pub fn orderedness(&self) -> Orderedness {
        match self {
            PrimitiveKind::Decimal | PrimitiveKind::Float | PrimitiveKind::Double => {
                Orderedness::Total
            }
            PrimitiveKind::Duration
            | PrimitiveKind::DateTime
            | PrimitiveKind::Time
            | PrimitiveKind::Date
            | PrimitiveKind::GYearMonth
            | PrimitiveKind::GYear
            | PrimitiveKind::GMonthDay
            | PrimitiveKind::GDay
            | PrimitiveKind::GMonth => Orderedness::Partial,
            _ => Orderedness::None,
        }
    }

    /// Whether length facets apply to this kind
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::String
                | PrimitiveKind::HexBinary
                | PrimitiveKind::Base64Binary
                | PrimitiveKind::AnyUri
                | PrimitiveKind::QName
                | PrimitiveKind::Notation
        )
    }
}

/// One entry of the built-in table
#[derive(Debug)]
pub struct BuiltinType {
    /// Local name in the XSD namespace
    pub name: &'static str,
    /// Base type; None only for anyType
    pub base: Option<BuiltinId>,
    /// Distance to anyType
    pub depth: u32,
    /// Variety; None for the two ur-types
    pub variety: Option<Variety>,
    /// Primitive ancestor kind, for atomic types
    pub primitive: Option<PrimitiveKind>,
    /// Inherited constraining facets
    pub facets: FacetTable,
    /// Fundamental facets
    pub fundamental: FundamentalFacets,
    /// Storage width for the integer-kinded types
    pub decimal_size: Option<DecimalSize>,
}

impl BuiltinType {
    /// The qualified name of this type
    pub fn qname(&self) -> QName {
        QName::namespaced(XSD_NAMESPACE, self.name)
    }

    /// Whether this is decimal-kinded with no fractional digits allowed
    pub fn is_integer_kinded(&self) -> bool {
        self.primitive == Some(PrimitiveKind::Decimal)
            && self.facets.get(FacetKind::FractionDigits) == Some(&FacetValue::Count(0))
    }

    /// The handle of this type inside the built-in type system
    pub fn handle(&self) -> String {
        format!("{}{}", BUILTIN_HANDLE_PREFIX, self.name)
    }
}

/// anyType, the universal root
pub const ANY_TYPE: BuiltinId = BuiltinId(0);
/// anySimpleType, the root of all simple types
pub const ANY_SIMPLE_TYPE: BuiltinId = BuiltinId(1);
/// xs:string
pub const STRING: BuiltinId = BuiltinId(2);
/// xs:boolean
pub const BOOLEAN: BuiltinId = BuiltinId(3);
/// xs:decimal
pub const DECIMAL: BuiltinId = BuiltinId(4);
/// xs:float
pub const FLOAT: BuiltinId = BuiltinId(5);
/// xs:double
pub const DOUBLE: BuiltinId = BuiltinId(6);
/// xs:duration
pub const DURATION: BuiltinId = BuiltinId(7);
/// xs:dateTime
pub const DATE_TIME: BuiltinId = BuiltinId(8);
/// xs:time
pub const TIME: BuiltinId = BuiltinId(9);
/// xs:date
pub const DATE: BuiltinId = BuiltinId(10);
/// xs:gYearMonth
pub const G_YEAR_MONTH: BuiltinId = BuiltinId(11);
/// xs:gYear
pub const G_YEAR: BuiltinId = BuiltinId(12);
/// xs:gMonthDay
pub const G_MONTH_DAY: BuiltinId = BuiltinId(13);
/// xs:gDay
pub const G_DAY: BuiltinId = BuiltinId(14);
/// xs:gMonth
pub const G_MONTH: BuiltinId = BuiltinId(15);
/// xs:hexBinary
pub const HEX_BINARY: BuiltinId = BuiltinId(16);
/// xs:base64Binary
pub const BASE64_BINARY: BuiltinId = BuiltinId(17);
/// xs:anyURI
pub const ANY_URI: BuiltinId = BuiltinId(18);
/// xs:QName
pub const QNAME: BuiltinId = BuiltinId(19);
/// xs:NOTATION
pub const NOTATION: BuiltinId = BuiltinId(20);
/// xs:normalizedString
pub const NORMALIZED_STRING: BuiltinId = BuiltinId(21);
/// xs:token
pub const TOKEN: BuiltinId = BuiltinId(22);
/// xs:language
pub const LANGUAGE: BuiltinId = BuiltinId(23);
/// xs:Name
pub const NAME: BuiltinId = BuiltinId(24);
/// xs:NMTOKEN
pub const NMTOKEN: BuiltinId = BuiltinId(25);
/// xs:NCName
pub const NCNAME: BuiltinId = BuiltinId(26);
/// xs:ID
pub const ID: BuiltinId = BuiltinId(27);
/// xs:IDREF
pub const IDREF: BuiltinId = BuiltinId(28);
/// xs:ENTITY
pub const ENTITY: BuiltinId = BuiltinId(29);
/// xs:integer
pub const INTEGER: BuiltinId = BuiltinId(30);
/// xs:nonPositiveInteger
pub const NON_POSITIVE_INTEGER: BuiltinId = BuiltinId(31);
/// xs:negativeInteger
pub const NEGATIVE_INTEGER: BuiltinId = BuiltinId(32);
/// xs:long
pub const LONG: BuiltinId = BuiltinId(33);
/// xs:int
pub const INT: BuiltinId = BuiltinId(34);
/// xs:short
pub const SHORT: BuiltinId = BuiltinId(35);
/// xs:byte
pub const BYTE: BuiltinId = BuiltinId(36);
/// xs:nonNegativeInteger
pub const NON_NEGATIVE_INTEGER: BuiltinId = BuiltinId(37);
/// xs:unsignedLong
pub const UNSIGNED_LONG: BuiltinId = BuiltinId(38);
/// xs:unsignedInt
pub const UNSIGNED_INT: BuiltinId = BuiltinId(39);
/// xs:unsignedShort
pub const UNSIGNED_SHORT: BuiltinId = BuiltinId(40);
/// xs:unsignedByte
pub const UNSIGNED_BYTE: BuiltinId = BuiltinId(41);
/// xs:positiveInteger
pub const POSITIVE_INTEGER: BuiltinId = BuiltinId(42);

static TABLE: Lazy<Vec<BuiltinType>> = Lazy::new(build_table);

fn build_table() -> Vec<BuiltinType> {
    let mut table = Vec::with_capacity(43);

    table.push(BuiltinType {
        name: "anyType",
        base: None,
        depth: 0,
        variety: None,
        primitive: None,
        facets: FacetTable::new(),
        fundamental: FundamentalFacets::default(),
        decimal_size: None,
    });
    table.push(BuiltinType {
        name: "anySimpleType",
        base: Some(ANY_TYPE),
        depth: 1,
        variety: None,
        primitive: None,
        facets: FacetTable::new(),
        fundamental: FundamentalFacets::default(),
        decimal_size: None,
    });

    let primitives: [(&'static str, PrimitiveKind); 19] = [
        ("string", PrimitiveKind::String),
        ("boolean", PrimitiveKind::Boolean),
        ("decimal", PrimitiveKind::Decimal),
        ("float", PrimitiveKind::Float),
        ("double", PrimitiveKind::Double),
        ("duration", PrimitiveKind::Duration),
        ("dateTime", PrimitiveKind::DateTime),
        ("time", PrimitiveKind::Time),
        ("date", PrimitiveKind::Date),
        ("gYearMonth", PrimitiveKind::GYearMonth),
        ("gYear", PrimitiveKind::GYear),
        ("gMonthDay", PrimitiveKind::GMonthDay),
        ("gDay", PrimitiveKind::GDay),
        ("gMonth", PrimitiveKind::GMonth),
        ("hexBinary", PrimitiveKind::HexBinary),
        ("base64Binary", PrimitiveKind::Base64Binary),
        ("anyURI", PrimitiveKind::AnyUri),
        ("QName", PrimitiveKind::QName),
        ("NOTATION", PrimitiveKind::Notation),
    ];
    for (name, kind) in primitives {
        let mut facets = FacetTable::new();
        let ws = if kind == PrimitiveKind::String {
            WhiteSpaceRule::Preserve
        } else {
            WhiteSpaceRule::Collapse
        };
        facets.set(
            FacetKind::WhiteSpace,
            FacetValue::WhiteSpace(ws),
            kind != PrimitiveKind::String,
        );
        table.push(BuiltinType {
            name,
            base: Some(ANY_SIMPLE_TYPE),
            depth: 2,
            variety: Some(Variety::Atomic),
            primitive: Some(kind),
            facets,
            fundamental: FundamentalFacets {
                ordered: kind.orderedness(),
                bounded: false,
                finite: false,
                numeric: kind.is_numeric(),
            },
            decimal_size: None,
        });
    }

    // String hierarchy
    push_string_derived(&mut table, "normalizedString", STRING, WhiteSpaceRule::Replace);
    push_string_derived(&mut table, "token", NORMALIZED_STRING, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "language", TOKEN, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "Name", TOKEN, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "NMTOKEN", TOKEN, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "NCName", NAME, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "ID", NCNAME, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "IDREF", NCNAME, WhiteSpaceRule::Collapse);
    push_string_derived(&mut table, "ENTITY", NCNAME, WhiteSpaceRule::Collapse);

    // Integer hierarchy. The native ranges stay out of the facet tables
    // so that user restrictions can still choose either bound flavor;
    // sizing goes through `decimal_size` instead.
    push_integer(&mut table, "integer", DECIMAL, false, DecimalSize::Big);
    push_integer(&mut table, "nonPositiveInteger", INTEGER, false, DecimalSize::Big);
    push_integer(&mut table, "negativeInteger", NON_POSITIVE_INTEGER, false, DecimalSize::Big);
    push_integer(&mut table, "long", INTEGER, true, DecimalSize::Long);
    push_integer(&mut table, "int", LONG, true, DecimalSize::Int);
    push_integer(&mut table, "short", INT, true, DecimalSize::Short);
    push_integer(&mut table, "byte", SHORT, true, DecimalSize::Byte);
    push_integer(&mut table, "nonNegativeInteger", INTEGER, false, DecimalSize::Big);
    push_integer(&mut table, "unsignedLong", NON_NEGATIVE_INTEGER, false, DecimalSize::Big);
    push_integer(&mut table, "unsignedInt", UNSIGNED_LONG, true, DecimalSize::Long);
    push_integer(&mut table, "unsignedShort", UNSIGNED_INT, true, DecimalSize::Int);
    push_integer(&mut table, "unsignedByte", UNSIGNED_SHORT, true, DecimalSize::Short);
    push_integer(&mut table, "positiveInteger", NON_NEGATIVE_INTEGER, false, DecimalSize::Big);

    table
}

fn push_string_derived(
    table: &mut Vec<BuiltinType>,
    name: &'static str,
    base: BuiltinId,
    ws: WhiteSpaceRule,
) {
    let depth = table[base.0 as usize].depth + 1;
    let mut facets = table[base.0 as usize].facets.clone();
    facets.set(FacetKind::WhiteSpace, FacetValue::WhiteSpace(ws), false);
    table.push(BuiltinType {
        name,
        base: Some(base),
        depth,
        variety: Some(Variety::Atomic),
        primitive: Some(PrimitiveKind::String),
        facets,
        fundamental: FundamentalFacets::default(),
        decimal_size: None,
    });
}

fn push_integer(
    table: &mut Vec<BuiltinType>,
    name: &'static str,
    base: BuiltinId,
    bounded: bool,
    size: DecimalSize,
) {
    let depth = table[base.0 as usize].depth + 1;
    let mut facets = table[base.0 as usize].facets.clone();
    facets.set(FacetKind::FractionDigits, FacetValue::Count(0), true);
    table.push(BuiltinType {
        name,
        base: Some(base),
        depth,
        variety: Some(Variety::Atomic),
        primitive: Some(PrimitiveKind::Decimal),
        facets,
        fundamental: FundamentalFacets {
            ordered: Orderedness::Total,
            bounded,
            finite: bounded,
            numeric: true,
        },
        decimal_size: Some(size),
    });
}

/// Number of built-in table entries
pub fn builtin_count() -> u16 {
    TABLE.len() as u16
}

/// Look up a built-in entry by id
pub fn builtin(id: BuiltinId) -> &'static BuiltinType {
    &TABLE[id.0 as usize]
}

/// Look up a built-in type by qualified name
pub fn builtin_by_qname(name: &QName) -> Option<BuiltinId> {
    if name.namespace.as_deref() != Some(XSD_NAMESPACE) {
        return None;
    }
    builtin_by_local_name(&name.local_name)
}

/// Look up a built-in type by local name
pub fn builtin_by_local_name(local: &str) -> Option<BuiltinId> {
    TABLE
        .iter()
        .position(|t| t.name == local)
        .map(|i| BuiltinId(i as u16))
}

/// Look up a built-in type by its escape handle
pub fn builtin_by_handle(handle: &str) -> Option<BuiltinId> {
    handle
        .strip_prefix(BUILTIN_HANDLE_PREFIX)
        .and_then(builtin_by_local_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_ids_match_table_order() {
        assert_eq!(builtin(ANY_TYPE).name, "anyType");
        assert_eq!(builtin(ANY_SIMPLE_TYPE).name, "anySimpleType");
        assert_eq!(builtin(STRING).name, "string");
        assert_eq!(builtin(NOTATION).name, "NOTATION");
        assert_eq!(builtin(TOKEN).name, "token");
        assert_eq!(builtin(ENTITY).name, "ENTITY");
        assert_eq!(builtin(INTEGER).name, "integer");
        assert_eq!(builtin(BYTE).name, "byte");
        assert_eq!(builtin(POSITIVE_INTEGER).name, "positiveInteger");
    }

    #[test]
    fn test_depths_follow_base_chain() {
        for t in TABLE.iter() {
            match t.base {
                Some(base) => assert_eq!(t.depth, builtin(base).depth + 1, "{}", t.name),
                None => assert_eq!(t.depth, 0),
            }
        }
    }

    #[test]
    fn test_lookup_by_qname() {
        let q = QName::namespaced(XSD_NAMESPACE, "int");
        assert_eq!(builtin_by_qname(&q), Some(INT));
        let wrong_ns = QName::namespaced("urn:other", "int");
        assert_eq!(builtin_by_qname(&wrong_ns), None);
    }

    #[test]
    fn test_integer_kinds() {
        assert!(builtin(INT).is_integer_kinded());
        assert!(builtin(INTEGER).is_integer_kinded());
        assert!(!builtin(DECIMAL).is_integer_kinded());
        assert!(!builtin(STRING).is_integer_kinded());
        assert_eq!(builtin(SHORT).decimal_size, Some(DecimalSize::Short));
    }

    #[test]
    fn test_builtin_handles() {
        assert_eq!(builtin(STRING).handle(), "_BI_string");
        assert_eq!(builtin_by_handle("_BI_string"), Some(STRING));
        assert_eq!(builtin_by_handle("plainHandle"), None);
    }

    #[test]
    fn test_bounded_integers() {
        assert!(builtin(BYTE).fundamental.bounded);
        assert!(builtin(BYTE).fundamental.finite);
        assert!(!builtin(INTEGER).fundamental.bounded);
        assert!(builtin(UNSIGNED_BYTE).fundamental.bounded);
    }
}
