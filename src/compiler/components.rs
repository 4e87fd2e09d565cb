//! Schema component model
//!
//! Components are owned by per-kind arenas and cross-reference each other
//! through [`TypeRef`] tokens, never through owning pointers. A token can
//! be copied freely without forcing resolution, which is what lets the
//! graph contain cycles (type -> base type -> property type -> ... -> same
//! type) without eager recursion.

use crate::namespaces::QName;

use super::builtins::BuiltinId;
use super::facets::FacetTable;
use super::particles::{Particle, WildcardParticle};
use crate::parsed::{ParsedComplexType, ParsedSimpleType};

/// Index of a type in its compilation's type arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// Index of a global element declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElemId(pub u32);

/// Index of a global attribute declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(pub u32);

/// Index of a model group definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

/// Index of an attribute group definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrGroupId(pub u32);

/// Index of an identity constraint definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentId(pub u32);

/// The kind of a schema component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Type definition (simple or complex)
    Type,
    /// Global element declaration
    Element,
    /// Global attribute declaration
    Attribute,
    /// Model group definition
    ModelGroup,
    /// Attribute group definition
    AttributeGroup,
    /// Identity constraint definition
    IdentityConstraint,
}

impl ComponentKind {
    /// The handle suffix for this kind
    pub fn handle_suffix(&self) -> &'static str {
        match self {
            ComponentKind::Type => "Type",
            ComponentKind::Element => "Element",
            ComponentKind::Attribute => "Attribute",
            ComponentKind::ModelGroup => "ModelGroup",
            ComponentKind::AttributeGroup => "AttributeGroup",
            ComponentKind::IdentityConstraint => "IdentityConstraint",
        }
    }
}

/// Cross-component link token
///
/// `Local` points into the current compilation's arena; `Builtin` into the
/// built-in type system; `External` into another compiled type system,
/// resolved through the linker; `Handle` is the decoded form used by
/// persisted type systems, resolved through the owning system's pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeRef {
    /// No type
    #[default]
    None,
    /// A type in the current compilation
    Local(TypeId),
    /// A built-in type
    Builtin(BuiltinId),
    /// A type in another compiled type system
    External {
        /// Name of the owning type system
        system: String,
        /// Handle within that system
        handle: String,
    },
    /// A handle in the owning persisted type system
    Handle(String),
}

impl TypeRef {
    /// Whether the token points at anything
    pub fn is_some(&self) -> bool {
        !matches!(self, TypeRef::None)
    }
}

/// Lifecycle of a component during compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    /// Translated from the parse tree, fields not yet populated
    Shell,
    /// Structurally resolved
    Resolved,
    /// Binding names assigned; immutable from here on
    Finalized,
}

/// Derivation method of a type from its base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationKind {
    /// Derivation by extension
    Extension,
    /// Derivation by restriction
    Restriction,
}

/// Shape of a simple type's value space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variety {
    /// Single value of a primitive kind
    Atomic,
    /// White-space-separated list of item values
    List,
    /// Value drawn from one of several member types
    Union,
}

/// Order of a type's value space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orderedness {
    /// Unordered
    None,
    /// Some values compare (a union with at least one ordered member)
    Partial,
    /// Totally ordered
    Total,
}

/// Fundamental facets, derived after constraining facets are fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundamentalFacets {
    /// Order of the value space
    pub ordered: Orderedness,
    /// Both a lower and an upper bound facet are present
    pub bounded: bool,
    /// The value space is finite
    pub finite: bool,
    /// The value space is numeric
    pub numeric: bool,
}

impl Default for FundamentalFacets {
    fn default() -> Self {
        Self { ordered: Orderedness::None, bounded: false, finite: false, numeric: false }
    }
}

/// Smallest native width able to hold a decimal-kinded type's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DecimalSize {
    /// 8-bit signed
    Byte,
    /// 16-bit signed
    Short,
    /// 32-bit signed
    Int,
    /// 64-bit signed
    Long,
    /// Arbitrary precision
    Big,
}

/// Cardinality of a synthesized property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOccurrence {
    /// Exactly one
    One,
    /// Zero or one
    Optional,
    /// Repeatable
    Array,
}

/// Binding type code of a property, computed from its resolved XML type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTypeCode {
    /// Boolean value
    Boolean,
    /// 8-bit integer
    Byte,
    /// 16-bit integer
    Short,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Arbitrary-precision integer
    BigInteger,
    /// Arbitrary-precision decimal
    BigDecimal,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Character data
    String,
    /// Binary data
    Bytes,
    /// Date or time value
    Date,
    /// Qualified name value
    QName,
    /// Anything else, including complex content and mixed unions
    Object,
}

/// Raw parse body kept on a shell until it is resolved
#[derive(Debug, Clone)]
pub enum ParsedTypeBody {
    /// A simple type definition
    Simple(ParsedSimpleType),
    /// A complex type definition
    Complex(ParsedComplexType),
}

/// Container context identifying an anonymous type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousContext {
    /// Qualified name of the enclosing element or attribute
    pub container: QName,
    /// Position among the container's anonymous types
    pub ordinal: u32,
}

/// Simple-type detail of a [`SchemaType`]
#[derive(Debug, Clone, Default)]
pub struct SimpleDetail {
    /// The variety; populated during resolution
    pub variety: Option<Variety>,
    /// Atomic: the primitive ancestor
    pub primitive: Option<BuiltinId>,
    /// List: the item type
    pub item: TypeRef,
    /// Union: the member types
    pub members: Vec<TypeRef>,
    /// Union: whether any member is list-shaped
    pub member_has_list: bool,
}

/// An attribute use inside a complex type or attribute group
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUseDecl {
    /// The attribute's qualified name
    pub name: QName,
    /// The attribute's resolved type
    pub type_ref: TypeRef,
    /// Whether the attribute is required
    pub required: bool,
    /// Default value, if declared
    pub default_value: Option<String>,
    /// Fixed value, if declared
    pub fixed_value: Option<String>,
}

/// Complex-type detail of a [`SchemaType`]
#[derive(Debug, Clone, Default)]
pub struct ComplexDetail {
    /// The content-model particle tree, if any
    pub content: Option<Particle>,
    /// Local attribute uses
    pub attributes: Vec<AttributeUseDecl>,
    /// The attribute wildcard, if any
    pub attr_wildcard: Option<WildcardParticle>,
    /// Whether character data may interleave with child elements
    pub mixed: bool,
}

/// Simple/complex split of a type
#[derive(Debug, Clone)]
pub enum TypeDetail {
    /// A simple type
    Simple(SimpleDetail),
    /// A complex type
    Complex(ComplexDetail),
}

impl TypeDetail {
    /// Whether this is a simple type
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeDetail::Simple(_))
    }

    /// The simple detail, if simple
    pub fn as_simple(&self) -> Option<&SimpleDetail> {
        match self {
            TypeDetail::Simple(d) => Some(d),
            TypeDetail::Complex(_) => None,
        }
    }

    /// The complex detail, if complex
    pub fn as_complex(&self) -> Option<&ComplexDetail> {
        match self {
            TypeDetail::Simple(_) => None,
            TypeDetail::Complex(d) => Some(d),
        }
    }
}

/// A synthesized property aggregating particle occurrences of one name
#[derive(Debug, Clone)]
pub struct SchemaProperty {
    /// The property's qualified name
    pub name: QName,
    /// Further accepted names contributed by substitution groups
    pub accepted_names: Vec<QName>,
    /// The property's resolved type
    pub type_ref: TypeRef,
    /// Whether this property comes from the attribute model
    pub is_attribute: bool,
    /// Cardinality of the property
    pub occurrence: PropertyOccurrence,
    /// Whether xsi:nil is accepted
    pub nillable: bool,
    /// Default value, if declared
    pub default_value: Option<String>,
    /// Whether the property is inherited from the base type
    pub inherited: bool,
    /// Assigned binding name (unique within the type)
    pub binding_name: Option<String>,
    /// Binding type code
    pub binding_code: Option<BindingTypeCode>,
    /// For array element properties: names that do not terminate a
    /// contiguous run when scanning for the append position
    pub non_delimiting: Vec<QName>,
}

/// A type definition
#[derive(Debug, Clone)]
pub struct SchemaType {
    /// Arena id
    pub id: TypeId,
    /// Qualified name; None for anonymous types
    pub name: Option<QName>,
    /// Container context for anonymous types
    pub anonymous: Option<AnonymousContext>,
    /// Source file the definition came from
    pub source_file: Option<String>,
    /// Lifecycle flag guarding against double processing
    pub lifecycle: Lifecycle,
    /// The base type
    pub base: TypeRef,
    /// Distance to the universal root (anyType has depth 0)
    pub base_depth: u32,
    /// Derivation method
    pub derivation: DerivationKind,
    /// The same-named type this one redefines, if any
    pub redefines: Option<TypeId>,
    /// Simple/complex detail
    pub detail: TypeDetail,
    /// Constraining facets
    pub facets: FacetTable,
    /// Fundamental facets
    pub fundamental: FundamentalFacets,
    /// Storage width for decimal-kinded atomic types
    pub decimal_size: Option<DecimalSize>,
    /// Synthesized properties (content model then attribute model)
    pub properties: Vec<SchemaProperty>,
    /// Assigned binding class name
    pub binding_name: Option<String>,
    /// Binding names of enumeration constants, parallel to the
    /// enumeration facet values
    pub enum_constant_names: Vec<String>,
    /// Assigned persistence handle
    pub handle: Option<String>,
    /// Raw parse body; dropped once resolved
    pub parsed: Option<Box<ParsedTypeBody>>,
}

impl SchemaType {
    /// Create an unresolved shell
    pub fn shell(id: TypeId, name: Option<QName>, detail: TypeDetail) -> Self {
        Self {
            id,
            name,
            anonymous: None,
            source_file: None,
            lifecycle: Lifecycle::Shell,
            base: TypeRef::None,
            base_depth: 0,
            derivation: DerivationKind::Restriction,
            redefines: None,
            detail,
            facets: FacetTable::new(),
            fundamental: FundamentalFacets::default(),
            decimal_size: None,
            properties: Vec::new(),
            binding_name: None,
            enum_constant_names: Vec::new(),
            handle: None,
            parsed: None,
        }
    }

    /// Whether this is a simple type
    pub fn is_simple(&self) -> bool {
        self.detail.is_simple()
    }

    /// The variety, for simple types
    pub fn variety(&self) -> Option<Variety> {
        self.detail.as_simple().and_then(|d| d.variety)
    }
}

/// A global element declaration
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Arena id
    pub id: ElemId,
    /// Qualified name
    pub name: QName,
    /// Source file the declaration came from
    pub source_file: Option<String>,
    /// Lifecycle flag
    pub lifecycle: Lifecycle,
    /// The element's type
    pub type_ref: TypeRef,
    /// Whether xsi:nil is accepted
    pub nillable: bool,
    /// Whether the element is abstract
    pub is_abstract: bool,
    /// Default value, if declared
    pub default_value: Option<String>,
    /// Fixed value, if declared
    pub fixed_value: Option<String>,
    /// Head of the substitution group this element joins, if any
    pub substitution_head: Option<QName>,
    /// Members that declared this element as their head
    pub substitution_members: Vec<QName>,
    /// Names of the identity constraints declared on the element
    pub identity_constraints: Vec<QName>,
    /// Assigned binding class name
    pub binding_name: Option<String>,
    /// Assigned persistence handle
    pub handle: Option<String>,
}

/// A global attribute declaration
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Arena id
    pub id: AttrId,
    /// Qualified name
    pub name: QName,
    /// Source file the declaration came from
    pub source_file: Option<String>,
    /// Lifecycle flag
    pub lifecycle: Lifecycle,
    /// The attribute's type
    pub type_ref: TypeRef,
    /// Default value, if declared
    pub default_value: Option<String>,
    /// Fixed value, if declared
    pub fixed_value: Option<String>,
    /// Assigned binding class name
    pub binding_name: Option<String>,
    /// Assigned persistence handle
    pub handle: Option<String>,
}

/// A named model group definition
#[derive(Debug, Clone)]
pub struct ModelGroupDef {
    /// Arena id
    pub id: GroupId,
    /// Qualified name
    pub name: QName,
    /// Source file the definition came from
    pub source_file: Option<String>,
    /// Lifecycle flag
    pub lifecycle: Lifecycle,
    /// The resolved particle
    pub particle: Option<Particle>,
    /// Assigned persistence handle
    pub handle: Option<String>,
}

/// A named attribute group definition
#[derive(Debug, Clone)]
pub struct AttributeGroupDef {
    /// Arena id
    pub id: AttrGroupId,
    /// Qualified name
    pub name: QName,
    /// Source file the definition came from
    pub source_file: Option<String>,
    /// Lifecycle flag
    pub lifecycle: Lifecycle,
    /// The resolved attribute uses
    pub attributes: Vec<AttributeUseDecl>,
    /// The attribute wildcard, if any
    pub wildcard: Option<WildcardParticle>,
    /// Assigned persistence handle
    pub handle: Option<String>,
}

/// Category of an identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCategory {
    /// xs:unique
    Unique,
    /// xs:key
    Key,
    /// xs:keyref
    KeyRef,
}

/// An identity constraint definition
#[derive(Debug, Clone)]
pub struct IdentityConstraintDef {
    /// Arena id
    pub id: IdentId,
    /// Qualified name
    pub name: QName,
    /// Source file the definition came from
    pub source_file: Option<String>,
    /// Category
    pub category: IdentityCategory,
    /// Selector XPath, kept verbatim
    pub selector: String,
    /// Field XPaths, kept verbatim
    pub fields: Vec<String>,
    /// For keyrefs: the referenced key
    pub referenced_key: Option<QName>,
    /// Assigned persistence handle
    pub handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_ordering() {
        assert!(Lifecycle::Shell < Lifecycle::Resolved);
        assert!(Lifecycle::Resolved < Lifecycle::Finalized);
    }

    #[test]
    fn test_type_ref_default() {
        let r = TypeRef::default();
        assert!(!r.is_some());
        assert!(TypeRef::Local(TypeId(0)).is_some());
    }

    #[test]
    fn test_shell_starts_unresolved() {
        let t = SchemaType::shell(
            TypeId(0),
            Some(QName::local("T")),
            TypeDetail::Simple(SimpleDetail::default()),
        );
        assert_eq!(t.lifecycle, Lifecycle::Shell);
        assert_eq!(t.base_depth, 0);
        assert!(t.is_simple());
        assert_eq!(t.variety(), None);
    }
}
