//! Content-model particles
//!
//! A complex type's content model is a tree of particles: element and
//! wildcard leaves under ALL/CHOICE/SEQUENCE groups, each node carrying
//! occurrence bounds.

use crate::namespaces::QName;
use std::collections::BTreeSet;

use super::components::TypeRef;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max_occurs means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be absent (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if particle has maxOccurs == 1
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    /// Check if particle can repeat
    pub fn is_multiple(&self) -> bool {
        match self.max {
            Some(max) => max > 1,
            None => true,
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Namespace constraint of a wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// Any namespace
    Any,
    /// Any namespace other than the target namespace
    Other(Option<String>),
    /// One of an enumerated set of namespaces
    Enumerated(Vec<Option<String>>),
}

/// How a validator treats wildcard-matched content (kept as data here)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessContents {
    /// Must find a declaration and validate
    Strict,
    /// Validate when a declaration is found
    Lax,
    /// Do not validate
    Skip,
}

/// Element leaf of a content model
#[derive(Debug, Clone, PartialEq)]
pub struct ElementParticle {
    /// The element's qualified name
    pub name: QName,
    /// The element's resolved type
    pub type_ref: TypeRef,
    /// Whether xsi:nil is accepted
    pub nillable: bool,
    /// Default value, if declared
    pub default_value: Option<String>,
    /// Fixed value, if declared
    pub fixed_value: Option<String>,
}

/// Wildcard leaf of a content model
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardParticle {
    /// Which namespaces the wildcard admits
    pub constraint: NamespaceConstraint,
    /// Validation disposition for matched content
    pub process_contents: ProcessContents,
}

/// The term of a particle
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleTerm {
    /// A declared element
    Element(ElementParticle),
    /// An element wildcard
    Wildcard(WildcardParticle),
    /// Unordered group
    All(Vec<Particle>),
    /// Alternative group
    Choice(Vec<Particle>),
    /// Ordered group
    Sequence(Vec<Particle>),
}

/// One node of a content-model tree
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Occurrence bounds
    pub occurs: Occurs,
    /// The node's term
    pub term: ParticleTerm,
}

impl Particle {
    /// Create an element particle
    pub fn element(occurs: Occurs, element: ElementParticle) -> Self {
        Self { occurs, term: ParticleTerm::Element(element) }
    }

    /// Create a sequence particle
    pub fn sequence(occurs: Occurs, children: Vec<Particle>) -> Self {
        Self { occurs, term: ParticleTerm::Sequence(children) }
    }

    /// Create a choice particle
    pub fn choice(occurs: Occurs, children: Vec<Particle>) -> Self {
        Self { occurs, term: ParticleTerm::Choice(children) }
    }

    /// Create an all particle
    pub fn all(occurs: Occurs, children: Vec<Particle>) -> Self {
        Self { occurs, term: ParticleTerm::All(children) }
    }

    /// Child particles of a group term
    pub fn children(&self) -> &[Particle] {
        match &self.term {
            ParticleTerm::All(c) | ParticleTerm::Choice(c) | ParticleTerm::Sequence(c) => c,
            _ => &[],
        }
    }

    /// Whether any element leaf under this particle has one of the names
    pub fn contains_name(&self, names: &[QName]) -> bool {
        match &self.term {
            ParticleTerm::Element(e) => names.contains(&e.name),
            ParticleTerm::Wildcard(_) => false,
            _ => self.children().iter().any(|c| c.contains_name(names)),
        }
    }

    /// Collect every element name under this particle
    pub fn contained_names(&self, out: &mut BTreeSet<QName>) {
        match &self.term {
            ParticleTerm::Element(e) => {
                out.insert(e.name.clone());
            }
            ParticleTerm::Wildcard(_) => {}
            _ => {
                for c in self.children() {
                    c.contained_names(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(name: &str) -> Particle {
        Particle::element(
            Occurs::once(),
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
    fn test_occurs_queries() {
        assert!(Occurs::once().is_single());
        assert!(Occurs::optional().is_emptiable());
        assert!(Occurs::zero_or_more().is_multiple());
        assert!(!Occurs::once().is_multiple());
        assert!(Occurs::new(2, Some(5)).is_multiple());
    }

    #[test]
    fn test_contains_and_contained_names() {
        let tree = Particle::sequence(
            Occurs::once(),
            vec![elem("a"), Particle::choice(Occurs::optional(), vec![elem("b"), elem("c")])],
        );

        assert!(tree.contains_name(&[QName::local("b")]));
        assert!(!tree.contains_name(&[QName::local("z")]));

        let mut names = BTreeSet::new();
        tree.contained_names(&mut names);
        let names: Vec<String> = names.into_iter().map(|q| q.local_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
