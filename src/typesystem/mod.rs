//! Compiled type systems
//!
//! A finalized type system is read-only: it can be saved to a directory of
//! binary records, reloaded lazily record by record, linked against by
//! later compilations, and queried concurrently.

pub mod codec;
pub mod handles;

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::compiler::components::{
    AttributeDecl, AttributeGroupDef, ComponentKind, ElementDecl, IdentityConstraintDef,
    ModelGroupDef, SchemaType,
};
use crate::error::{Error, Result};
use crate::namespaces::QName;

pub use handles::{format_external, parse_external, HandlePool, EXTERNAL_HANDLE_PREFIX};

/// A finalized component, as stored in the handle cache
#[derive(Debug, Clone)]
pub enum Component {
    /// A type definition
    Type(SchemaType),
    /// A global element declaration
    Element(ElementDecl),
    /// A global attribute declaration
    Attribute(AttributeDecl),
    /// A model group definition
    ModelGroup(ModelGroupDef),
    /// An attribute group definition
    AttributeGroup(AttributeGroupDef),
    /// An identity constraint definition
    IdentityConstraint(IdentityConstraintDef),
}

impl Component {
    /// The component's kind
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Type(_) => ComponentKind::Type,
            Component::Element(_) => ComponentKind::Element,
            Component::Attribute(_) => ComponentKind::Attribute,
            Component::ModelGroup(_) => ComponentKind::ModelGroup,
            Component::AttributeGroup(_) => ComponentKind::AttributeGroup,
            Component::IdentityConstraint(_) => ComponentKind::IdentityConstraint,
        }
    }

    /// The contained type, if this is a type component
    pub fn as_type(&self) -> Option<&SchemaType> {
        match self {
            Component::Type(t) => Some(t),
            _ => None,
        }
    }

    /// The contained element, if this is an element component
    pub fn as_element(&self) -> Option<&ElementDecl> {
        match self {
            Component::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// The entry-point record of a type system: every handle plus the
/// per-category qualified-name maps
#[derive(Debug, Clone, Default)]
pub struct SystemIndex {
    /// Every handle with its component kind, in assignment order
    pub handles: IndexMap<String, ComponentKind>,
    /// Global types by qualified name
    pub types: IndexMap<QName, String>,
    /// Global elements by qualified name
    pub elements: IndexMap<QName, String>,
    /// Global attributes by qualified name
    pub attributes: IndexMap<QName, String>,
    /// Model groups by qualified name
    pub groups: IndexMap<QName, String>,
    /// Attribute groups by qualified name
    pub attribute_groups: IndexMap<QName, String>,
    /// Identity constraints by qualified name
    pub identities: IndexMap<QName, String>,
    /// Type handles by binding class name
    pub by_binding_name: IndexMap<String, String>,
    /// Namespaces the system defines components in
    pub namespaces: Vec<String>,
}

/// Backing store a persisted type system reads its records from
pub trait RecordSource: Send + Sync {
    /// Read the raw bytes of one named record
    fn read_record(&self, name: &str) -> Result<Vec<u8>>;
}

/// Record source reading `<root>/<name>.xsb` files
#[derive(Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Create a source rooted at a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RecordSource for DirSource {
    fn read_record(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(format!("{}.xsb", name));
        fs::read(&path).map_err(Error::Io)
    }
}

/// A finalized, read-only compiled type system
pub struct SchemaTypeSystem {
    name: String,
    incomplete: AtomicBool,
    index: SystemIndex,
    source: Option<Box<dyn RecordSource>>,
    cache: Mutex<HashMap<String, Arc<Component>>>,
}

impl fmt::Debug for SchemaTypeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaTypeSystem")
            .field("name", &self.name)
            .field("incomplete", &self.is_incomplete())
            .field("handles", &self.index.handles.len())
            .finish()
    }
}

impl SchemaTypeSystem {
    /// Build an in-memory system from a finished compilation
    pub fn from_parts(
        name: impl Into<String>,
        index: SystemIndex,
        components: HashMap<String, Arc<Component>>,
        incomplete: bool,
    ) -> Self {
        Self {
            name: name.into(),
            incomplete: AtomicBool::new(incomplete),
            index,
            source: None,
            cache: Mutex::new(components),
        }
    }

    /// Open a persisted system: reads only the index record; every other
    /// record is decoded on first dereference
    pub fn load(name: impl Into<String>, source: Box<dyn RecordSource>) -> Result<Self> {
        let name = name.into();
        let bytes = source.read_record(codec::INDEX_RECORD)?;
        let index = codec::decode_index(&bytes)?;
        Ok(Self {
            name,
            incomplete: AtomicBool::new(false),
            index,
            source: Some(source),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Open a persisted system from a directory
    pub fn load_dir(name: impl Into<String>, dir: impl Into<PathBuf>) -> Result<Self> {
        Self::load(name, Box::new(DirSource::new(dir)))
    }

    /// The system's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the system has been superseded or produced by a partial run
    pub fn is_incomplete(&self) -> bool {
        self.incomplete.load(Ordering::Acquire)
    }

    /// Mark the system incomplete (it refuses saving and linking from then on)
    pub fn mark_incomplete(&self) {
        self.incomplete.store(true, Ordering::Release);
    }

    /// The index record
    pub fn index(&self) -> &SystemIndex {
        &self.index
    }

    /// Handle of a global type
    pub fn find_type_handle(&self, name: &QName) -> Option<&str> {
        self.index.types.get(name).map(|s| s.as_str())
    }

    /// Handle of a global element
    pub fn find_element_handle(&self, name: &QName) -> Option<&str> {
        self.index.elements.get(name).map(|s| s.as_str())
    }

    /// Handle of a global attribute
    pub fn find_attribute_handle(&self, name: &QName) -> Option<&str> {
        self.index.attributes.get(name).map(|s| s.as_str())
    }

    /// Handle of a model group
    pub fn find_group_handle(&self, name: &QName) -> Option<&str> {
        self.index.groups.get(name).map(|s| s.as_str())
    }

    /// Handle of an attribute group
    pub fn find_attribute_group_handle(&self, name: &QName) -> Option<&str> {
        self.index.attribute_groups.get(name).map(|s| s.as_str())
    }

    /// Handle of a type by its binding class name
    pub fn find_by_binding_name(&self, binding_name: &str) -> Option<&str> {
        self.index.by_binding_name.get(binding_name).map(|s| s.as_str())
    }

    /// Dereference a handle, decoding and memoizing its record on first use
    pub fn resolve_handle(&self, handle: &str) -> Result<Arc<Component>> {
        {
            let cache = self.cache.lock().expect("handle cache poisoned");
            if let Some(hit) = cache.get(handle) {
                return Ok(Arc::clone(hit));
            }
        }

        let kind = self
            .index
            .handles
            .get(handle)
            .copied()
            .ok_or_else(|| Error::UnresolvedHandle(handle.to_string()))?;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::UnresolvedHandle(handle.to_string()))?;
        let bytes = source.read_record(handle)?;
        let component = Arc::new(codec::decode_component(handle, kind, &bytes)?);

        let mut cache = self.cache.lock().expect("handle cache poisoned");
        let entry = cache
            .entry(handle.to_string())
            .or_insert_with(|| Arc::clone(&component));
        Ok(Arc::clone(entry))
    }

    /// Whether a handle's record is already decoded
    pub fn is_cached(&self, handle: &str) -> bool {
        self.cache
            .lock()
            .expect("handle cache poisoned")
            .contains_key(handle)
    }

    /// Persist the system: one record per component plus the index and the
    /// discovery pointer files
    pub fn save(&self, dir: &Path) -> Result<()> {
        if self.is_incomplete() {
            return Err(Error::Incomplete(
                self.name.clone(),
                "an incomplete type system must not be persisted".to_string(),
            ));
        }
        codec::save_system(self, dir)
    }

}

/// The ordered set of previously compiled type systems consulted to
/// resolve references not satisfied locally
#[derive(Debug, Clone, Default)]
pub struct Linker {
    systems: Vec<Arc<SchemaTypeSystem>>,
}

impl Linker {
    /// Create a linker holding only the implicit built-in type system
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a compiled system; incomplete systems are rejected
    pub fn push(&mut self, system: Arc<SchemaTypeSystem>) -> Result<()> {
        if system.is_incomplete() {
            return Err(Error::Incomplete(
                system.name().to_string(),
                "an incomplete type system must not be linked against".to_string(),
            ));
        }
        self.systems.push(system);
        Ok(())
    }

    /// The linked systems, in consultation order
    pub fn systems(&self) -> &[Arc<SchemaTypeSystem>] {
        &self.systems
    }

    /// A linked system by name
    pub fn system(&self, name: &str) -> Option<&Arc<SchemaTypeSystem>> {
        self.systems.iter().find(|s| s.name() == name)
    }

    /// Find a global type: (system name, handle)
    pub fn find_type(&self, name: &QName) -> Option<(String, String)> {
        self.systems.iter().find_map(|s| {
            s.find_type_handle(name)
                .map(|h| (s.name().to_string(), h.to_string()))
        })
    }

    /// Find a global element: (system name, handle)
    pub fn find_element(&self, name: &QName) -> Option<(String, String)> {
        self.systems.iter().find_map(|s| {
            s.find_element_handle(name)
                .map(|h| (s.name().to_string(), h.to_string()))
        })
    }

    /// Find a global attribute: (system name, handle)
    pub fn find_attribute(&self, name: &QName) -> Option<(String, String)> {
        self.systems.iter().find_map(|s| {
            s.find_attribute_handle(name)
                .map(|h| (s.name().to_string(), h.to_string()))
        })
    }

    /// Find a model group: (system name, handle)
    pub fn find_group(&self, name: &QName) -> Option<(String, String)> {
        self.systems.iter().find_map(|s| {
            s.find_group_handle(name)
                .map(|h| (s.name().to_string(), h.to_string()))
        })
    }

    /// Find an attribute group: (system name, handle)
    pub fn find_attribute_group(&self, name: &QName) -> Option<(String, String)> {
        self.systems.iter().find_map(|s| {
            s.find_attribute_group_handle(name)
                .map(|h| (s.name().to_string(), h.to_string()))
        })
    }

    /// Every type name visible through the linker (for suggestions)
    pub fn type_names(&self) -> Vec<QName> {
        self.systems
            .iter()
            .flat_map(|s| s.index().types.keys().cloned())
            .collect()
    }
}
