//! The pre-parsed schema object model
//!
//! Parsing XSD documents is out of scope; the compiler consumes this
//! object model, produced by an external parser. Qualified-name references
//! are already prefix-resolved; everything else is carried verbatim.

use crate::compiler::facets::FacetKind;
use crate::namespaces::QName;

/// One parsed schema document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// The source file the document came from
    pub source_file: String,
    /// The document's target namespace
    pub target_namespace: Option<String>,
    /// Imported and included documents
    pub imports: Vec<ParsedImport>,
    /// Global simple type definitions
    pub simple_types: Vec<ParsedSimpleType>,
    /// Global complex type definitions
    pub complex_types: Vec<ParsedComplexType>,
    /// Global element declarations
    pub elements: Vec<ParsedElement>,
    /// Global attribute declarations
    pub attributes: Vec<ParsedAttribute>,
    /// Named model group definitions
    pub groups: Vec<ParsedGroup>,
    /// Named attribute group definitions
    pub attribute_groups: Vec<ParsedAttributeGroup>,
    /// Redefined components
    pub redefinitions: Vec<ParsedRedefinition>,
}

impl ParsedDocument {
    /// Create an empty document for a source file
    pub fn new(source_file: impl Into<String>, target_namespace: Option<&str>) -> Self {
        Self {
            source_file: source_file.into(),
            target_namespace: target_namespace.map(|s| s.to_string()),
            ..Default::default()
        }
    }
}

/// An import or include edge
#[derive(Debug, Clone)]
pub struct ParsedImport {
    /// The imported namespace (None for includes and no-namespace imports)
    pub namespace: Option<String>,
    /// The imported document's location hint
    pub location: Option<String>,
}

/// A simple type definition (global, inline or redefined)
#[derive(Debug, Clone)]
pub struct ParsedSimpleType {
    /// Local name; None for inline anonymous types
    pub name: Option<String>,
    /// The derivation declaration
    pub derivation: ParsedSimpleDerivation,
}

/// How a parsed simple type is declared
#[derive(Debug, Clone)]
pub enum ParsedSimpleDerivation {
    /// Restriction of a base simple type
    Restriction {
        /// The base type's qualified name
        base: Option<QName>,
        /// Inline anonymous base, alternative to `base`
        inline_base: Option<Box<ParsedSimpleType>>,
        /// The declared facets, in document order
        facets: Vec<ParsedFacet>,
    },
    /// List of an item type
    List {
        /// The item type's qualified name
        item: Option<QName>,
        /// Inline anonymous item type, alternative to `item`
        inline_item: Option<Box<ParsedSimpleType>>,
    },
    /// Union of member types
    Union {
        /// Referenced member type names
        members: Vec<QName>,
        /// Inline anonymous member types
        inline_members: Vec<ParsedSimpleType>,
    },
}

/// A single declared facet
#[derive(Debug, Clone)]
pub struct ParsedFacet {
    /// The facet kind
    pub kind: FacetKind,
    /// The facet's lexical value
    pub value: String,
    /// Whether the facet is declared fixed
    pub fixed: bool,
}

impl ParsedFacet {
    /// Create a non-fixed facet
    pub fn new(kind: FacetKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into(), fixed: false }
    }

    /// Create a fixed facet
    pub fn fixed(kind: FacetKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into(), fixed: true }
    }
}

/// A complex type definition (global, inline or redefined)
#[derive(Debug, Clone, Default)]
pub struct ParsedComplexType {
    /// Local name; None for inline anonymous types
    pub name: Option<String>,
    /// Whether character data may interleave with child elements
    pub mixed: bool,
    /// Explicit derivation, if declared
    pub derivation: Option<ParsedComplexDerivation>,
    /// The content model
    pub content: Option<ParsedParticle>,
    /// Local attribute uses
    pub attributes: Vec<ParsedAttributeUse>,
    /// Referenced attribute groups
    pub attribute_groups: Vec<QName>,
    /// The attribute wildcard, if declared
    pub any_attribute: Option<ParsedWildcard>,
}

/// Explicit derivation of a complex type
#[derive(Debug, Clone)]
pub struct ParsedComplexDerivation {
    /// Extension or restriction
    pub is_extension: bool,
    /// The base type's qualified name
    pub base: QName,
}

/// A content-model particle as parsed
#[derive(Debug, Clone)]
pub struct ParsedParticle {
    /// Minimum occurrences
    pub min_occurs: u32,
    /// Maximum occurrences (None = unbounded)
    pub max_occurs: Option<u32>,
    /// The particle's term
    pub term: ParsedTerm,
}

impl ParsedParticle {
    /// A particle occurring exactly once
    pub fn once(term: ParsedTerm) -> Self {
        Self { min_occurs: 1, max_occurs: Some(1), term }
    }

    /// A particle with explicit bounds
    pub fn occurs(min: u32, max: Option<u32>, term: ParsedTerm) -> Self {
        Self { min_occurs: min, max_occurs: max, term }
    }
}

/// The term of a parsed particle
#[derive(Debug, Clone)]
pub enum ParsedTerm {
    /// A locally declared element
    Element(ParsedLocalElement),
    /// A reference to a global element
    ElementRef(QName),
    /// A reference to a named model group
    GroupRef(QName),
    /// An ordered group
    Sequence(Vec<ParsedParticle>),
    /// An alternative group
    Choice(Vec<ParsedParticle>),
    /// An unordered group
    All(Vec<ParsedParticle>),
    /// An element wildcard
    Any(ParsedWildcard),
}

/// A locally declared element
#[derive(Debug, Clone, Default)]
pub struct ParsedLocalElement {
    /// Local name
    pub name: String,
    /// Target namespace of the declaration
    pub namespace: Option<String>,
    /// Declared type reference
    pub type_name: Option<QName>,
    /// Inline anonymous simple type
    pub inline_simple: Option<Box<ParsedSimpleType>>,
    /// Inline anonymous complex type
    pub inline_complex: Option<Box<ParsedComplexType>>,
    /// Whether xsi:nil is accepted
    pub nillable: bool,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
}

/// A wildcard as parsed
#[derive(Debug, Clone)]
pub struct ParsedWildcard {
    /// The namespace constraint: "##any", "##other" or a space-separated
    /// list of URIs / "##local" / "##targetNamespace"
    pub namespace: String,
    /// processContents: "strict", "lax" or "skip"
    pub process_contents: String,
}

impl Default for ParsedWildcard {
    fn default() -> Self {
        Self { namespace: "##any".to_string(), process_contents: "strict".to_string() }
    }
}

/// A global element declaration
#[derive(Debug, Clone, Default)]
pub struct ParsedElement {
    /// Local name
    pub name: String,
    /// Declared type reference
    pub type_name: Option<QName>,
    /// Inline anonymous simple type
    pub inline_simple: Option<Box<ParsedSimpleType>>,
    /// Inline anonymous complex type
    pub inline_complex: Option<Box<ParsedComplexType>>,
    /// Whether xsi:nil is accepted
    pub nillable: bool,
    /// Whether the element is abstract
    pub is_abstract: bool,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
    /// The substitution group head this element joins
    pub substitution_group: Option<QName>,
    /// Identity constraints declared on the element
    pub identity_constraints: Vec<ParsedIdentityConstraint>,
}

/// A global attribute declaration
#[derive(Debug, Clone, Default)]
pub struct ParsedAttribute {
    /// Local name
    pub name: String,
    /// Declared type reference
    pub type_name: Option<QName>,
    /// Inline anonymous simple type
    pub inline_simple: Option<Box<ParsedSimpleType>>,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
}

/// An attribute use inside a complex type or attribute group
#[derive(Debug, Clone, Default)]
pub struct ParsedAttributeUse {
    /// Local name, or the referenced global attribute's name
    pub name: Option<String>,
    /// Reference to a global attribute
    pub reference: Option<QName>,
    /// Declared type reference
    pub type_name: Option<QName>,
    /// Inline anonymous simple type
    pub inline_simple: Option<Box<ParsedSimpleType>>,
    /// "required", "optional" or "prohibited"
    pub use_mode: Option<String>,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
}

/// A named model group definition
#[derive(Debug, Clone)]
pub struct ParsedGroup {
    /// Local name
    pub name: String,
    /// The group's particle
    pub particle: ParsedParticle,
}

/// A named attribute group definition
#[derive(Debug, Clone)]
pub struct ParsedAttributeGroup {
    /// Local name
    pub name: String,
    /// The group's attribute uses
    pub attributes: Vec<ParsedAttributeUse>,
    /// Nested attribute group references
    pub attribute_groups: Vec<QName>,
    /// The attribute wildcard, if declared
    pub any_attribute: Option<ParsedWildcard>,
}

/// An identity constraint as parsed
#[derive(Debug, Clone)]
pub struct ParsedIdentityConstraint {
    /// Local name
    pub name: String,
    /// "unique", "key" or "keyref"
    pub category: String,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths
    pub fields: Vec<String>,
    /// For keyrefs: the referenced key's qualified name
    pub refer: Option<QName>,
}

/// Components restated under xs:redefine
#[derive(Debug, Clone, Default)]
pub struct ParsedRedefinition {
    /// Redefined simple types
    pub simple_types: Vec<ParsedSimpleType>,
    /// Redefined complex types
    pub complex_types: Vec<ParsedComplexType>,
}
