//! Versioned binary records
//!
//! Each component is written to its own record: a fixed header (magic
//! number, major/minor/release version, record-kind tag), a per-record
//! deduplicated string pool referenced by 16-bit codes, then a
//! kind-specific payload of fixed-width big-endian integers,
//! length-prefixed strings and length-prefixed arrays of nested records.
//! The format is additive-only: fields introduced in a later minor version
//! are guarded by an explicit version check on the read path.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::compiler::builtins;
use crate::compiler::components::{
    AttrGroupId, AttrId, AttributeDecl, AttributeGroupDef, AttributeUseDecl, BindingTypeCode,
    ComponentKind, DecimalSize, DerivationKind, ElemId, ElementDecl, FundamentalFacets, GroupId,
    IdentId, IdentityCategory, IdentityConstraintDef, Lifecycle, ModelGroupDef, Orderedness,
    PropertyOccurrence, SchemaProperty, SchemaType, SimpleDetail, TypeDetail, TypeId, TypeRef,
    Variety, AnonymousContext,
};
use crate::compiler::facets::{FacetKind, FacetTable, FacetValue, WhiteSpaceRule};
use crate::compiler::particles::{
    ElementParticle, NamespaceConstraint, Occurs, Particle, ParticleTerm, ProcessContents,
    WildcardParticle,
};
use crate::error::{Error, Result};
use crate::namespaces::QName;

use super::handles::{format_external, parse_external};
use super::{Component, SchemaTypeSystem, SystemIndex};

/// Magic number opening every record
pub const MAGIC: u32 = 0x5853_4249;
/// Major format version; must match exactly
pub const MAJOR_VERSION: u16 = 1;
/// Highest minor version this reader understands
pub const MINOR_VERSION: u16 = 1;
/// Release number, informational only
pub const RELEASE: u16 = 0;
/// Oldest minor version still carrying every required field
pub const MIN_MINOR_VERSION: u16 = 1;

/// Minor version that introduced append-positioning metadata on properties
const MINOR_NON_DELIMITING: u16 = 1;

/// Record name of the index, the single eagerly-read entry point
pub const INDEX_RECORD: &str = "index";

const KIND_INDEX: u16 = 0;
const KIND_TYPE: u16 = 1;
const KIND_ELEMENT: u16 = 2;
const KIND_ATTRIBUTE: u16 = 3;
const KIND_MODEL_GROUP: u16 = 4;
const KIND_ATTRIBUTE_GROUP: u16 = 5;
const KIND_IDENTITY: u16 = 6;

fn kind_tag(kind: ComponentKind) -> u16 {
    match kind {
        ComponentKind::Type => KIND_TYPE,
        ComponentKind::Element => KIND_ELEMENT,
        ComponentKind::Attribute => KIND_ATTRIBUTE,
        ComponentKind::ModelGroup => KIND_MODEL_GROUP,
        ComponentKind::AttributeGroup => KIND_ATTRIBUTE_GROUP,
        ComponentKind::IdentityConstraint => KIND_IDENTITY,
    }
}

fn kind_from_tag(tag: u16) -> Option<ComponentKind> {
    match tag {
        KIND_TYPE => Some(ComponentKind::Type),
        KIND_ELEMENT => Some(ComponentKind::Element),
        KIND_ATTRIBUTE => Some(ComponentKind::Attribute),
        KIND_MODEL_GROUP => Some(ComponentKind::ModelGroup),
        KIND_ATTRIBUTE_GROUP => Some(ComponentKind::AttributeGroup),
        KIND_IDENTITY => Some(ComponentKind::IdentityConstraint),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writes one record: strings are interned into the per-record pool and
/// referenced by 16-bit code (code 0 means absent)
pub struct RecordWriter {
    kind_tag: u16,
    pool: IndexMap<String, u16>,
    body: Vec<u8>,
}

impl RecordWriter {
    fn new(kind_tag: u16) -> Self {
        Self { kind_tag, pool: IndexMap::new(), body: Vec::new() }
    }

    fn put_u8(&mut self, v: u8) {
        self.body.push(v);
    }

    fn put_bool(&mut self, v: bool) {
        self.put_u8(v as u8);
    }

    fn put_u16(&mut self, v: u16) {
        self.body.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.body.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.body.extend_from_slice(&v.to_be_bytes());
    }

    fn intern(&mut self, s: &str) -> u16 {
        if let Some(code) = self.pool.get(s) {
            return *code;
        }
        let code = (self.pool.len() + 1) as u16;
        self.pool.insert(s.to_string(), code);
        code
    }

    fn put_str(&mut self, s: &str) {
        let code = self.intern(s);
        self.put_u16(code);
    }

    fn put_opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.put_str(s),
            None => self.put_u16(0),
        }
    }

    fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.body.len());
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&MAJOR_VERSION.to_be_bytes());
        out.extend_from_slice(&MINOR_VERSION.to_be_bytes());
        out.extend_from_slice(&RELEASE.to_be_bytes());
        out.extend_from_slice(&self.kind_tag.to_be_bytes());
        out.extend_from_slice(&(self.pool.len() as u16).to_be_bytes());
        for s in self.pool.keys() {
            let bytes = s.as_bytes();
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        out.extend_from_slice(&self.body);
        out
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads one record, validating the header and the version window
#[derive(Debug)]
pub struct RecordReader<'a> {
    record: String,
    buf: &'a [u8],
    pos: usize,
    pool: Vec<String>,
    /// Minor version the record was written with
    pub minor: u16,
}

impl<'a> RecordReader<'a> {
    fn open(record: &str, bytes: &'a [u8], expected_kind: u16) -> Result<Self> {
        let mut reader = Self {
            record: record.to_string(),
            buf: bytes,
            pos: 0,
            pool: Vec::new(),
            minor: 0,
        };
        let magic = reader.get_u32()?;
        if magic != MAGIC {
            return Err(Error::codec(record, "wrong magic number"));
        }
        let major = reader.get_u16()?;
        if major != MAJOR_VERSION {
            return Err(Error::codec(
                record,
                format!("unsupported major version {}", major),
            ));
        }
        let minor = reader.get_u16()?;
        if minor < MIN_MINOR_VERSION {
            return Err(Error::codec(
                record,
                format!("minor version {} is older than the supported minimum", minor),
            ));
        }
        if minor > MINOR_VERSION {
            return Err(Error::codec(
                record,
                format!("minor version {} is newer than this reader", minor),
            ));
        }
        reader.minor = minor;
        let _release = reader.get_u16()?;
        let kind = reader.get_u16()?;
        if kind != expected_kind {
            return Err(Error::codec(
                record,
                format!("record kind {} where {} was expected", kind, expected_kind),
            ));
        }
        let pool_len = reader.get_u16()?;
        for _ in 0..pool_len {
            let len = reader.get_u16()? as usize;
            let bytes = reader.take(len)?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| Error::codec(&reader.record, "string pool entry is not UTF-8"))?
                .to_string();
            reader.pool.push(s);
        }
        Ok(reader)
    }

    fn truncated(&self) -> Error {
        Error::codec(&self.record, "truncated record")
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(self.truncated());
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    fn get_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn get_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn get_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn get_opt_str(&mut self) -> Result<Option<String>> {
        let code = self.get_u16()?;
        if code == 0 {
            return Ok(None);
        }
        self.pool
            .get((code - 1) as usize)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::codec(&self.record, format!("dangling string code {}", code)))
    }

    fn get_str(&mut self) -> Result<String> {
        self.get_opt_str()?
            .ok_or_else(|| Error::codec(&self.record, "absent string where one is required"))
    }
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

fn put_qname(w: &mut RecordWriter, q: &QName) {
    w.put_opt_str(q.namespace.as_deref());
    w.put_str(&q.local_name);
}

fn get_qname(r: &mut RecordReader) -> Result<QName> {
    let namespace = r.get_opt_str()?;
    let local = r.get_str()?;
    Ok(QName::new(namespace, local))
}

fn put_opt_qname(w: &mut RecordWriter, q: Option<&QName>) {
    match q {
        Some(q) => {
            w.put_bool(true);
            put_qname(w, q);
        }
        None => w.put_bool(false),
    }
}

fn get_opt_qname(r: &mut RecordReader) -> Result<Option<QName>> {
    if r.get_bool()? {
        Ok(Some(get_qname(r)?))
    } else {
        Ok(None)
    }
}

fn put_type_ref(w: &mut RecordWriter, r: &TypeRef) {
    let encoded = match r {
        TypeRef::None => None,
        TypeRef::Builtin(id) => Some(builtins::builtin(*id).handle()),
        TypeRef::External { system, handle } => Some(format_external(system, handle)),
        TypeRef::Handle(handle) => Some(handle.clone()),
        // Arena references are rewritten to handles before encoding.
        TypeRef::Local(id) => Some(format!("local:{}", id.0)),
    };
    w.put_opt_str(encoded.as_deref());
}

fn get_type_ref(r: &mut RecordReader) -> Result<TypeRef> {
    let Some(s) = r.get_opt_str()? else {
        return Ok(TypeRef::None);
    };
    if let Some(id) = builtins::builtin_by_handle(&s) {
        return Ok(TypeRef::Builtin(id));
    }
    if let Some((system, handle)) = parse_external(&s) {
        return Ok(TypeRef::External {
            system: system.to_string(),
            handle: handle.to_string(),
        });
    }
    Ok(TypeRef::Handle(s))
}

fn put_facet_value(w: &mut RecordWriter, v: &FacetValue) {
    match v {
        FacetValue::Count(n) => {
            w.put_u8(1);
            w.put_u64(*n);
        }
        FacetValue::Number(d) => {
            w.put_u8(2);
            w.put_str(&d.to_string());
        }
        FacetValue::Lexical(s) => {
            w.put_u8(3);
            w.put_str(s);
        }
        FacetValue::WhiteSpace(ws) => {
            w.put_u8(4);
            w.put_u8(*ws as u8);
        }
    }
}

fn get_facet_value(r: &mut RecordReader) -> Result<FacetValue> {
    match r.get_u8()? {
        1 => Ok(FacetValue::Count(r.get_u64()?)),
        2 => {
            let s = r.get_str()?;
            Decimal::from_str(&s)
                .map(FacetValue::Number)
                .map_err(|_| Error::codec(&r.record, format!("bad decimal '{}'", s)))
        }
        3 => Ok(FacetValue::Lexical(r.get_str()?)),
        4 => match r.get_u8()? {
            0 => Ok(FacetValue::WhiteSpace(WhiteSpaceRule::Preserve)),
            1 => Ok(FacetValue::WhiteSpace(WhiteSpaceRule::Replace)),
            2 => Ok(FacetValue::WhiteSpace(WhiteSpaceRule::Collapse)),
            other => Err(Error::codec(&r.record, format!("bad whitespace rule {}", other))),
        },
        other => Err(Error::codec(&r.record, format!("bad facet value tag {}", other))),
    }
}

fn put_facet_table(w: &mut RecordWriter, table: &FacetTable) {
    let mut present: u16 = 0;
    for (i, kind) in FacetKind::SINGLE_VALUED.iter().enumerate() {
        if table.get(*kind).is_some() {
            present |= 1 << i;
        }
    }
    w.put_u16(present);
    w.put_u16(table.fixed_bits());
    for kind in FacetKind::SINGLE_VALUED {
        if let Some(v) = table.get(kind) {
            put_facet_value(w, v);
        }
    }
    w.put_u16(table.patterns.len() as u16);
    for p in &table.patterns {
        w.put_str(p);
    }
    w.put_u16(table.enumerations.len() as u16);
    for e in &table.enumerations {
        w.put_str(e);
    }
}

fn get_facet_table(r: &mut RecordReader) -> Result<FacetTable> {
    let present = r.get_u16()?;
    let fixed = r.get_u16()?;
    let mut table = FacetTable::new();
    for (i, kind) in FacetKind::SINGLE_VALUED.iter().enumerate() {
        if present & (1 << i) != 0 {
            let value = get_facet_value(r)?;
            table.set(*kind, value, false);
        }
    }
    table.set_fixed_bits(fixed);
    let patterns = r.get_u16()?;
    for _ in 0..patterns {
        let p = r.get_str()?;
        table.patterns.push(p);
    }
    let enums = r.get_u16()?;
    for _ in 0..enums {
        let e = r.get_str()?;
        table.enumerations.push(e);
    }
    Ok(table)
}

fn put_fundamental(w: &mut RecordWriter, f: &FundamentalFacets) {
    let ordered = match f.ordered {
        Orderedness::None => 0u8,
        Orderedness::Partial => 1,
        Orderedness::Total => 2,
    };
    w.put_u8(ordered);
    let mut flags = 0u8;
    if f.bounded {
        flags |= 1;
    }
    if f.finite {
        flags |= 2;
    }
    if f.numeric {
        flags |= 4;
    }
    w.put_u8(flags);
}

fn get_fundamental(r: &mut RecordReader) -> Result<FundamentalFacets> {
    let ordered = match r.get_u8()? {
        0 => Orderedness::None,
        1 => Orderedness::Partial,
        2 => Orderedness::Total,
        other => return Err(Error::codec(&r.record, format!("bad orderedness {}", other))),
    };
    let flags = r.get_u8()?;
    Ok(FundamentalFacets {
        ordered,
        bounded: flags & 1 != 0,
        finite: flags & 2 != 0,
        numeric: flags & 4 != 0,
    })
}

fn put_occurs(w: &mut RecordWriter, o: &Occurs) {
    w.put_u32(o.min);
    match o.max {
        Some(max) => {
            w.put_bool(true);
            w.put_u32(max);
        }
        None => w.put_bool(false),
    }
}

fn get_occurs(r: &mut RecordReader) -> Result<Occurs> {
    let min = r.get_u32()?;
    let max = if r.get_bool()? { Some(r.get_u32()?) } else { None };
    Ok(Occurs::new(min, max))
}

fn put_wildcard(w: &mut RecordWriter, wc: &WildcardParticle) {
    match &wc.constraint {
        NamespaceConstraint::Any => w.put_u8(1),
        NamespaceConstraint::Other(ns) => {
            w.put_u8(2);
            w.put_opt_str(ns.as_deref());
        }
        NamespaceConstraint::Enumerated(list) => {
            w.put_u8(3);
            w.put_u16(list.len() as u16);
            for ns in list {
                w.put_opt_str(ns.as_deref());
            }
        }
    }
    let pc = match wc.process_contents {
        ProcessContents::Strict => 0u8,
        ProcessContents::Lax => 1,
        ProcessContents::Skip => 2,
    };
    w.put_u8(pc);
}

fn get_wildcard(r: &mut RecordReader) -> Result<WildcardParticle> {
    let constraint = match r.get_u8()? {
        1 => NamespaceConstraint::Any,
        2 => NamespaceConstraint::Other(r.get_opt_str()?),
        3 => {
            let len = r.get_u16()?;
            let mut list = Vec::with_capacity(len as usize);
            for _ in 0..len {
                list.push(r.get_opt_str()?);
            }
            NamespaceConstraint::Enumerated(list)
        }
        other => {
            return Err(Error::codec(
                &r.record,
                format!("bad namespace constraint tag {}", other),
            ))
        }
    };
    let process_contents = match r.get_u8()? {
        0 => ProcessContents::Strict,
        1 => ProcessContents::Lax,
        2 => ProcessContents::Skip,
        other => {
            return Err(Error::codec(
                &r.record,
                format!("bad processContents {}", other),
            ))
        }
    };
    Ok(WildcardParticle { constraint, process_contents })
}

fn put_particle(w: &mut RecordWriter, p: &Particle) {
    put_occurs(w, &p.occurs);
    match &p.term {
        ParticleTerm::Element(e) => {
            w.put_u8(1);
            put_qname(w, &e.name);
            put_type_ref(w, &e.type_ref);
            w.put_bool(e.nillable);
            w.put_opt_str(e.default_value.as_deref());
            w.put_opt_str(e.fixed_value.as_deref());
        }
        ParticleTerm::Wildcard(wc) => {
            w.put_u8(2);
            put_wildcard(w, wc);
        }
        ParticleTerm::All(children) => {
            w.put_u8(3);
            put_children(w, children);
        }
        ParticleTerm::Choice(children) => {
            w.put_u8(4);
            put_children(w, children);
        }
        ParticleTerm::Sequence(children) => {
            w.put_u8(5);
            put_children(w, children);
        }
    }
}

fn put_children(w: &mut RecordWriter, children: &[Particle]) {
    w.put_u16(children.len() as u16);
    for c in children {
        put_particle(w, c);
    }
}

fn get_particle(r: &mut RecordReader) -> Result<Particle> {
    let occurs = get_occurs(r)?;
    let term = match r.get_u8()? {
        1 => ParticleTerm::Element(ElementParticle {
            name: get_qname(r)?,
            type_ref: get_type_ref(r)?,
            nillable: r.get_bool()?,
            default_value: r.get_opt_str()?,
            fixed_value: r.get_opt_str()?,
        }),
        2 => ParticleTerm::Wildcard(get_wildcard(r)?),
        3 => ParticleTerm::All(get_children(r)?),
        4 => ParticleTerm::Choice(get_children(r)?),
        5 => ParticleTerm::Sequence(get_children(r)?),
        other => return Err(Error::codec(&r.record, format!("bad particle tag {}", other))),
    };
    Ok(Particle { occurs, term })
}

fn get_children(r: &mut RecordReader) -> Result<Vec<Particle>> {
    let len = r.get_u16()?;
    let mut children = Vec::with_capacity(len as usize);
    for _ in 0..len {
        children.push(get_particle(r)?);
    }
    Ok(children)
}

fn put_attribute_use(w: &mut RecordWriter, a: &AttributeUseDecl) {
    put_qname(w, &a.name);
    put_type_ref(w, &a.type_ref);
    w.put_bool(a.required);
    w.put_opt_str(a.default_value.as_deref());
    w.put_opt_str(a.fixed_value.as_deref());
}

fn get_attribute_use(r: &mut RecordReader) -> Result<AttributeUseDecl> {
    Ok(AttributeUseDecl {
        name: get_qname(r)?,
        type_ref: get_type_ref(r)?,
        required: r.get_bool()?,
        default_value: r.get_opt_str()?,
        fixed_value: r.get_opt_str()?,
    })
}

fn put_property(w: &mut RecordWriter, p: &SchemaProperty) {
    put_qname(w, &p.name);
    w.put_u16(p.accepted_names.len() as u16);
    for n in &p.accepted_names {
        put_qname(w, n);
    }
    put_type_ref(w, &p.type_ref);
    w.put_bool(p.is_attribute);
    let occurrence = match p.occurrence {
        PropertyOccurrence::One => 0u8,
        PropertyOccurrence::Optional => 1,
        PropertyOccurrence::Array => 2,
    };
    w.put_u8(occurrence);
    w.put_bool(p.nillable);
    w.put_opt_str(p.default_value.as_deref());
    w.put_bool(p.inherited);
    w.put_opt_str(p.binding_name.as_deref());
    w.put_u8(p.binding_code.map(binding_code_tag).unwrap_or(0));
    // Introduced in minor 1; the writer always emits the current minor.
    w.put_u16(p.non_delimiting.len() as u16);
    for n in &p.non_delimiting {
        put_qname(w, n);
    }
}

fn get_property(r: &mut RecordReader) -> Result<SchemaProperty> {
    let name = get_qname(r)?;
    let accepted_len = r.get_u16()?;
    let mut accepted_names = Vec::with_capacity(accepted_len as usize);
    for _ in 0..accepted_len {
        accepted_names.push(get_qname(r)?);
    }
    let type_ref = get_type_ref(r)?;
    let is_attribute = r.get_bool()?;
    let occurrence = match r.get_u8()? {
        0 => PropertyOccurrence::One,
        1 => PropertyOccurrence::Optional,
        2 => PropertyOccurrence::Array,
        other => return Err(Error::codec(&r.record, format!("bad occurrence {}", other))),
    };
    let nillable = r.get_bool()?;
    let default_value = r.get_opt_str()?;
    let inherited = r.get_bool()?;
    let binding_name = r.get_opt_str()?;
    let binding_code = binding_code_from_tag(r.get_u8()?);
    let mut non_delimiting = Vec::new();
    if r.minor >= MINOR_NON_DELIMITING {
        let len = r.get_u16()?;
        for _ in 0..len {
            non_delimiting.push(get_qname(r)?);
        }
    }
    Ok(SchemaProperty {
        name,
        accepted_names,
        type_ref,
        is_attribute,
        occurrence,
        nillable,
        default_value,
        inherited,
        binding_name,
        binding_code,
        non_delimiting,
    })
}

fn binding_code_tag(code: BindingTypeCode) -> u8 {
    match code {
        BindingTypeCode::Boolean => 1,
        BindingTypeCode::Byte => 2,
        BindingTypeCode::Short => 3,
        BindingTypeCode::Int => 4,
        BindingTypeCode::Long => 5,
        BindingTypeCode::BigInteger => 6,
        BindingTypeCode::BigDecimal => 7,
        BindingTypeCode::Float => 8,
        BindingTypeCode::Double => 9,
        BindingTypeCode::String => 10,
        BindingTypeCode::Bytes => 11,
        BindingTypeCode::Date => 12,
        BindingTypeCode::QName => 13,
        BindingTypeCode::Object => 14,
    }
}

fn binding_code_from_tag(tag: u8) -> Option<BindingTypeCode> {
    match tag {
        1 => Some(BindingTypeCode::Boolean),
        2 => Some(BindingTypeCode::Byte),
        3 => Some(BindingTypeCode::Short),
        4 => Some(BindingTypeCode::Int),
        5 => Some(BindingTypeCode::Long),
        6 => Some(BindingTypeCode::BigInteger),
        7 => Some(BindingTypeCode::BigDecimal),
        8 => Some(BindingTypeCode::Float),
        9 => Some(BindingTypeCode::Double),
        10 => Some(BindingTypeCode::String),
        11 => Some(BindingTypeCode::Bytes),
        12 => Some(BindingTypeCode::Date),
        13 => Some(BindingTypeCode::QName),
        14 => Some(BindingTypeCode::Object),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Component records
// ---------------------------------------------------------------------------

/// Encode one component into record bytes
pub fn encode_component(component: &Component) -> Vec<u8> {
    match component {
        Component::Type(t) => encode_type(t),
        Component::Element(e) => encode_element(e),
        Component::Attribute(a) => encode_attribute(a),
        Component::ModelGroup(g) => encode_model_group(g),
        Component::AttributeGroup(g) => encode_attribute_group(g),
        Component::IdentityConstraint(ic) => encode_identity(ic),
    }
}

/// Decode one component record
pub fn decode_component(handle: &str, kind: ComponentKind, bytes: &[u8]) -> Result<Component> {
    match kind {
        ComponentKind::Type => decode_type(handle, bytes).map(Component::Type),
        ComponentKind::Element => decode_element(handle, bytes).map(Component::Element),
        ComponentKind::Attribute => decode_attribute(handle, bytes).map(Component::Attribute),
        ComponentKind::ModelGroup => decode_model_group(handle, bytes).map(Component::ModelGroup),
        ComponentKind::AttributeGroup => {
            decode_attribute_group(handle, bytes).map(Component::AttributeGroup)
        }
        ComponentKind::IdentityConstraint => {
            decode_identity(handle, bytes).map(Component::IdentityConstraint)
        }
    }
}

fn encode_type(t: &SchemaType) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_TYPE);
    put_opt_qname(&mut w, t.name.as_ref());
    match &t.anonymous {
        Some(a) => {
            w.put_bool(true);
            put_qname(&mut w, &a.container);
            w.put_u32(a.ordinal);
        }
        None => w.put_bool(false),
    }
    put_type_ref(&mut w, &t.base);
    w.put_u32(t.base_depth);
    w.put_u8(match t.derivation {
        DerivationKind::Extension => 0,
        DerivationKind::Restriction => 1,
    });
    match &t.detail {
        TypeDetail::Simple(d) => {
            w.put_u8(1);
            w.put_u8(match d.variety {
                None => 0,
                Some(Variety::Atomic) => 1,
                Some(Variety::List) => 2,
                Some(Variety::Union) => 3,
            });
            w.put_u16(d.primitive.map(|p| p.0 + 1).unwrap_or(0));
            put_type_ref(&mut w, &d.item);
            w.put_u16(d.members.len() as u16);
            for m in &d.members {
                put_type_ref(&mut w, m);
            }
            w.put_bool(d.member_has_list);
        }
        TypeDetail::Complex(d) => {
            w.put_u8(2);
            w.put_bool(d.mixed);
            match &d.content {
                Some(p) => {
                    w.put_bool(true);
                    put_particle(&mut w, p);
                }
                None => w.put_bool(false),
            }
            w.put_u16(d.attributes.len() as u16);
            for a in &d.attributes {
                put_attribute_use(&mut w, a);
            }
            match &d.attr_wildcard {
                Some(wc) => {
                    w.put_bool(true);
                    put_wildcard(&mut w, wc);
                }
                None => w.put_bool(false),
            }
        }
    }
    put_facet_table(&mut w, &t.facets);
    put_fundamental(&mut w, &t.fundamental);
    w.put_u8(match t.decimal_size {
        None => 0,
        Some(DecimalSize::Byte) => 1,
        Some(DecimalSize::Short) => 2,
        Some(DecimalSize::Int) => 3,
        Some(DecimalSize::Long) => 4,
        Some(DecimalSize::Big) => 5,
    });
    w.put_u16(t.properties.len() as u16);
    for p in &t.properties {
        put_property(&mut w, p);
    }
    w.put_opt_str(t.binding_name.as_deref());
    w.put_u16(t.enum_constant_names.len() as u16);
    for n in &t.enum_constant_names {
        w.put_str(n);
    }
    w.finish()
}

fn decode_type(handle: &str, bytes: &[u8]) -> Result<SchemaType> {
    let mut r = RecordReader::open(handle, bytes, KIND_TYPE)?;
    let name = get_opt_qname(&mut r)?;
    let anonymous = if r.get_bool()? {
        Some(AnonymousContext {
            container: get_qname(&mut r)?,
            ordinal: r.get_u32()?,
        })
    } else {
        None
    };
    let base = get_type_ref(&mut r)?;
    let base_depth = r.get_u32()?;
    let derivation = match r.get_u8()? {
        0 => DerivationKind::Extension,
        1 => DerivationKind::Restriction,
        other => return Err(Error::codec(handle, format!("bad derivation {}", other))),
    };
    let detail = match r.get_u8()? {
        1 => {
            let variety = match r.get_u8()? {
                0 => None,
                1 => Some(Variety::Atomic),
                2 => Some(Variety::List),
                3 => Some(Variety::Union),
                other => return Err(Error::codec(handle, format!("bad variety {}", other))),
            };
            let primitive_raw = r.get_u16()?;
            let primitive = if primitive_raw == 0 {
                None
            } else {
                Some(builtins::BuiltinId(primitive_raw - 1))
            };
            let item = get_type_ref(&mut r)?;
            let member_len = r.get_u16()?;
            let mut members = Vec::with_capacity(member_len as usize);
            for _ in 0..member_len {
                members.push(get_type_ref(&mut r)?);
            }
            let member_has_list = r.get_bool()?;
            TypeDetail::Simple(SimpleDetail {
                variety,
                primitive,
                item,
                members,
                member_has_list,
            })
        }
        2 => {
            let mixed = r.get_bool()?;
            let content = if r.get_bool()? {
                Some(get_particle(&mut r)?)
            } else {
                None
            };
            let attr_len = r.get_u16()?;
            let mut attributes = Vec::with_capacity(attr_len as usize);
            for _ in 0..attr_len {
                attributes.push(get_attribute_use(&mut r)?);
            }
            let attr_wildcard = if r.get_bool()? {
                Some(get_wildcard(&mut r)?)
            } else {
                None
            };
            TypeDetail::Complex(crate::compiler::components::ComplexDetail {
                content,
                attributes,
                attr_wildcard,
                mixed,
            })
        }
        other => return Err(Error::codec(handle, format!("bad type detail tag {}", other))),
    };
    let facets = get_facet_table(&mut r)?;
    let fundamental = get_fundamental(&mut r)?;
    let decimal_size = match r.get_u8()? {
        0 => None,
        1 => Some(DecimalSize::Byte),
        2 => Some(DecimalSize::Short),
        3 => Some(DecimalSize::Int),
        4 => Some(DecimalSize::Long),
        5 => Some(DecimalSize::Big),
        other => return Err(Error::codec(handle, format!("bad decimal size {}", other))),
    };
    let prop_len = r.get_u16()?;
    let mut properties = Vec::with_capacity(prop_len as usize);
    for _ in 0..prop_len {
        properties.push(get_property(&mut r)?);
    }
    let binding_name = r.get_opt_str()?;
    let enum_len = r.get_u16()?;
    let mut enum_constant_names = Vec::with_capacity(enum_len as usize);
    for _ in 0..enum_len {
        enum_constant_names.push(r.get_str()?);
    }

    Ok(SchemaType {
        id: TypeId(0),
        name,
        anonymous,
        source_file: None,
        lifecycle: Lifecycle::Finalized,
        base,
        base_depth,
        derivation,
        redefines: None,
        detail,
        facets,
        fundamental,
        decimal_size,
        properties,
        binding_name,
        enum_constant_names,
        handle: Some(handle.to_string()),
        parsed: None,
    })
}

fn encode_element(e: &ElementDecl) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_ELEMENT);
    put_qname(&mut w, &e.name);
    put_type_ref(&mut w, &e.type_ref);
    let mut flags = 0u8;
    if e.nillable {
        flags |= 1;
    }
    if e.is_abstract {
        flags |= 2;
    }
    w.put_u8(flags);
    w.put_opt_str(e.default_value.as_deref());
    w.put_opt_str(e.fixed_value.as_deref());
    put_opt_qname(&mut w, e.substitution_head.as_ref());
    w.put_u16(e.substitution_members.len() as u16);
    for m in &e.substitution_members {
        put_qname(&mut w, m);
    }
    w.put_u16(e.identity_constraints.len() as u16);
    for ic in &e.identity_constraints {
        put_qname(&mut w, ic);
    }
    w.put_opt_str(e.binding_name.as_deref());
    w.finish()
}

fn decode_element(handle: &str, bytes: &[u8]) -> Result<ElementDecl> {
    let mut r = RecordReader::open(handle, bytes, KIND_ELEMENT)?;
    let name = get_qname(&mut r)?;
    let type_ref = get_type_ref(&mut r)?;
    let flags = r.get_u8()?;
    let default_value = r.get_opt_str()?;
    let fixed_value = r.get_opt_str()?;
    let substitution_head = get_opt_qname(&mut r)?;
    let member_len = r.get_u16()?;
    let mut substitution_members = Vec::with_capacity(member_len as usize);
    for _ in 0..member_len {
        substitution_members.push(get_qname(&mut r)?);
    }
    let ic_len = r.get_u16()?;
    let mut identity_constraints = Vec::with_capacity(ic_len as usize);
    for _ in 0..ic_len {
        identity_constraints.push(get_qname(&mut r)?);
    }
    let binding_name = r.get_opt_str()?;
    Ok(ElementDecl {
        id: ElemId(0),
        name,
        source_file: None,
        lifecycle: Lifecycle::Finalized,
        type_ref,
        nillable: flags & 1 != 0,
        is_abstract: flags & 2 != 0,
        default_value,
        fixed_value,
        substitution_head,
        substitution_members,
        identity_constraints,
        binding_name,
        handle: Some(handle.to_string()),
    })
}

fn encode_attribute(a: &AttributeDecl) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_ATTRIBUTE);
    put_qname(&mut w, &a.name);
    put_type_ref(&mut w, &a.type_ref);
    w.put_opt_str(a.default_value.as_deref());
    w.put_opt_str(a.fixed_value.as_deref());
    w.put_opt_str(a.binding_name.as_deref());
    w.finish()
}

fn decode_attribute(handle: &str, bytes: &[u8]) -> Result<AttributeDecl> {
    let mut r = RecordReader::open(handle, bytes, KIND_ATTRIBUTE)?;
    Ok(AttributeDecl {
        id: AttrId(0),
        name: get_qname(&mut r)?,
        source_file: None,
        lifecycle: Lifecycle::Finalized,
        type_ref: get_type_ref(&mut r)?,
        default_value: r.get_opt_str()?,
        fixed_value: r.get_opt_str()?,
        binding_name: r.get_opt_str()?,
        handle: Some(handle.to_string()),
    })
}

fn encode_model_group(g: &ModelGroupDef) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_MODEL_GROUP);
    put_qname(&mut w, &g.name);
    match &g.particle {
        Some(p) => {
            w.put_bool(true);
            put_particle(&mut w, p);
        }
        None => w.put_bool(false),
    }
    w.finish()
}

fn decode_model_group(handle: &str, bytes: &[u8]) -> Result<ModelGroupDef> {
    let mut r = RecordReader::open(handle, bytes, KIND_MODEL_GROUP)?;
    let name = get_qname(&mut r)?;
    let particle = if r.get_bool()? {
        Some(get_particle(&mut r)?)
    } else {
        None
    };
    Ok(ModelGroupDef {
        id: GroupId(0),
        name,
        source_file: None,
        lifecycle: Lifecycle::Finalized,
        particle,
        handle: Some(handle.to_string()),
    })
}

fn encode_attribute_group(g: &AttributeGroupDef) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_ATTRIBUTE_GROUP);
    put_qname(&mut w, &g.name);
    w.put_u16(g.attributes.len() as u16);
    for a in &g.attributes {
        put_attribute_use(&mut w, a);
    }
    match &g.wildcard {
        Some(wc) => {
            w.put_bool(true);
            put_wildcard(&mut w, wc);
        }
        None => w.put_bool(false),
    }
    w.finish()
}

fn decode_attribute_group(handle: &str, bytes: &[u8]) -> Result<AttributeGroupDef> {
    let mut r = RecordReader::open(handle, bytes, KIND_ATTRIBUTE_GROUP)?;
    let name = get_qname(&mut r)?;
    let attr_len = r.get_u16()?;
    let mut attributes = Vec::with_capacity(attr_len as usize);
    for _ in 0..attr_len {
        attributes.push(get_attribute_use(&mut r)?);
    }
    let wildcard = if r.get_bool()? {
        Some(get_wildcard(&mut r)?)
    } else {
        None
    };
    Ok(AttributeGroupDef {
        id: AttrGroupId(0),
        name,
        source_file: None,
        lifecycle: Lifecycle::Finalized,
        attributes,
        wildcard,
        handle: Some(handle.to_string()),
    })
}

fn encode_identity(ic: &IdentityConstraintDef) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_IDENTITY);
    put_qname(&mut w, &ic.name);
    w.put_u8(match ic.category {
        IdentityCategory::Unique => 0,
        IdentityCategory::Key => 1,
        IdentityCategory::KeyRef => 2,
    });
    w.put_str(&ic.selector);
    w.put_u16(ic.fields.len() as u16);
    for f in &ic.fields {
        w.put_str(f);
    }
    put_opt_qname(&mut w, ic.referenced_key.as_ref());
    w.finish()
}

fn decode_identity(handle: &str, bytes: &[u8]) -> Result<IdentityConstraintDef> {
    let mut r = RecordReader::open(handle, bytes, KIND_IDENTITY)?;
    let name = get_qname(&mut r)?;
    let category = match r.get_u8()? {
        0 => IdentityCategory::Unique,
        1 => IdentityCategory::Key,
        2 => IdentityCategory::KeyRef,
        other => return Err(Error::codec(handle, format!("bad identity category {}", other))),
    };
    let selector = r.get_str()?;
    let field_len = r.get_u16()?;
    let mut fields = Vec::with_capacity(field_len as usize);
    for _ in 0..field_len {
        fields.push(r.get_str()?);
    }
    let referenced_key = get_opt_qname(&mut r)?;
    Ok(IdentityConstraintDef {
        id: IdentId(0),
        name,
        source_file: None,
        category,
        selector,
        fields,
        referenced_key,
        handle: Some(handle.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Index record
// ---------------------------------------------------------------------------

/// Encode the index record
pub fn encode_index(index: &SystemIndex) -> Vec<u8> {
    let mut w = RecordWriter::new(KIND_INDEX);
    w.put_u16(index.namespaces.len() as u16);
    for ns in &index.namespaces {
        w.put_str(ns);
    }
    w.put_u32(index.handles.len() as u32);
    for (handle, kind) in &index.handles {
        w.put_str(handle);
        w.put_u8(kind_tag(*kind) as u8);
    }
    for map in [
        &index.types,
        &index.elements,
        &index.attributes,
        &index.groups,
        &index.attribute_groups,
        &index.identities,
    ] {
        w.put_u32(map.len() as u32);
        for (qname, handle) in map.iter() {
            put_qname(&mut w, qname);
            w.put_str(handle);
        }
    }
    w.put_u32(index.by_binding_name.len() as u32);
    for (binding, handle) in &index.by_binding_name {
        w.put_str(binding);
        w.put_str(handle);
    }
    w.finish()
}

/// Decode the index record
pub fn decode_index(bytes: &[u8]) -> Result<SystemIndex> {
    let mut r = RecordReader::open(INDEX_RECORD, bytes, KIND_INDEX)?;
    let mut index = SystemIndex::default();
    let ns_len = r.get_u16()?;
    for _ in 0..ns_len {
        let ns = r.get_str()?;
        index.namespaces.push(ns);
    }
    let handle_len = r.get_u32()?;
    for _ in 0..handle_len {
        let handle = r.get_str()?;
        let tag = r.get_u8()? as u16;
        let kind = kind_from_tag(tag)
            .ok_or_else(|| Error::codec(INDEX_RECORD, format!("bad component kind {}", tag)))?;
        index.handles.insert(handle, kind);
    }
    for map_index in 0..6usize {
        let len = r.get_u32()?;
        for _ in 0..len {
            let qname = get_qname(&mut r)?;
            let handle = r.get_str()?;
            let map = match map_index {
                0 => &mut index.types,
                1 => &mut index.elements,
                2 => &mut index.attributes,
                3 => &mut index.groups,
                4 => &mut index.attribute_groups,
                _ => &mut index.identities,
            };
            map.insert(qname, handle);
        }
    }
    let binding_len = r.get_u32()?;
    for _ in 0..binding_len {
        let binding = r.get_str()?;
        let handle = r.get_str()?;
        index.by_binding_name.insert(binding, handle);
    }
    Ok(index)
}

// ---------------------------------------------------------------------------
// Persistence layout
// ---------------------------------------------------------------------------

fn pointer_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Write a full type system: one `<handle>.xsb` per component, the
/// `index.xsb` entry point and the category pointer files that map names
/// to the owning type system without loading the whole index
pub fn save_system(system: &SchemaTypeSystem, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(
        dir.join(format!("{}.xsb", INDEX_RECORD)),
        encode_index(system.index()),
    )?;

    for handle in system.index().handles.keys() {
        let component = system.resolve_handle(handle)?;
        fs::write(
            dir.join(format!("{}.xsb", handle)),
            encode_component(&component),
        )?;
    }

    let pointers = dir.join("schema");
    let write_pointer = |category: &str, key: &str| -> Result<()> {
        let subdir = pointers.join(category);
        fs::create_dir_all(&subdir)?;
        fs::write(
            subdir.join(format!("{}.ptr", pointer_name(key))),
            system.name().as_bytes(),
        )?;
        Ok(())
    };
    for qname in system.index().types.keys() {
        write_pointer("type", &qname.to_string())?;
    }
    for qname in system.index().elements.keys() {
        write_pointer("element", &qname.to_string())?;
    }
    for binding in system.index().by_binding_name.keys() {
        write_pointer("javaname", binding)?;
    }
    for ns in &system.index().namespaces {
        write_pointer("namespace", ns)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_pool_dedup() {
        let mut w = RecordWriter::new(KIND_TYPE);
        w.put_str("repeated");
        w.put_str("repeated");
        w.put_str("other");
        assert_eq!(w.pool.len(), 2);
    }

    #[test]
    fn test_header_roundtrip() {
        let w = RecordWriter::new(KIND_ELEMENT);
        let bytes = w.finish();
        let r = RecordReader::open("rec", &bytes, KIND_ELEMENT).unwrap();
        assert_eq!(r.minor, MINOR_VERSION);
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut bytes = RecordWriter::new(KIND_TYPE).finish();
        bytes[0] = 0xFF;
        let err = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_wrong_major_rejected() {
        let mut bytes = RecordWriter::new(KIND_TYPE).finish();
        bytes[4] = 0x7F;
        let err = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap_err();
        assert!(err.to_string().contains("major"));
    }

    #[test]
    fn test_newer_minor_rejected() {
        let mut bytes = RecordWriter::new(KIND_TYPE).finish();
        let newer = (MINOR_VERSION + 1).to_be_bytes();
        bytes[6] = newer[0];
        bytes[7] = newer[1];
        let err = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn test_older_minor_rejected() {
        let mut bytes = RecordWriter::new(KIND_TYPE).finish();
        bytes[6] = 0;
        bytes[7] = 0;
        let err = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap_err();
        assert!(err.to_string().contains("older"));
    }

    #[test]
    fn test_truncated_record() {
        let mut w = RecordWriter::new(KIND_TYPE);
        w.put_u64(42);
        let mut bytes = w.finish();
        bytes.truncate(bytes.len() - 3);
        let mut r = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap();
        assert!(r.get_u64().is_err());
    }

    #[test]
    fn test_type_ref_escapes() {
        let mut w = RecordWriter::new(KIND_TYPE);
        put_type_ref(&mut w, &TypeRef::Builtin(builtins::STRING));
        put_type_ref(
            &mut w,
            &TypeRef::External { system: "billing".into(), handle: "InvoiceType".into() },
        );
        put_type_ref(&mut w, &TypeRef::Handle("LocalType".into()));
        put_type_ref(&mut w, &TypeRef::None);
        let bytes = w.finish();
        let mut r = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap();
        assert_eq!(get_type_ref(&mut r).unwrap(), TypeRef::Builtin(builtins::STRING));
        assert_eq!(
            get_type_ref(&mut r).unwrap(),
            TypeRef::External { system: "billing".into(), handle: "InvoiceType".into() }
        );
        assert_eq!(get_type_ref(&mut r).unwrap(), TypeRef::Handle("LocalType".into()));
        assert_eq!(get_type_ref(&mut r).unwrap(), TypeRef::None);
    }

    #[test]
    fn test_facet_table_roundtrip() {
        let mut table = FacetTable::new();
        table.set(FacetKind::TotalDigits, FacetValue::Count(4), true);
        table.set(
            FacetKind::MaxInclusive,
            FacetValue::Number(Decimal::from(9999)),
            false,
        );
        table.set(
            FacetKind::WhiteSpace,
            FacetValue::WhiteSpace(WhiteSpaceRule::Collapse),
            false,
        );
        table.patterns.push(r"\d+".to_string());
        table.enumerations.push("1".to_string());
        table.enumerations.push("2".to_string());

        let mut w = RecordWriter::new(KIND_TYPE);
        put_facet_table(&mut w, &table);
        let bytes = w.finish();
        let mut r = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap();
        let decoded = get_facet_table(&mut r).unwrap();
        assert_eq!(decoded, table);
        assert!(decoded.is_fixed(FacetKind::TotalDigits));
        assert!(!decoded.is_fixed(FacetKind::MaxInclusive));
    }

    #[test]
    fn test_particle_roundtrip() {
        let particle = Particle::sequence(
            Occurs::once(),
            vec![
                Particle::element(
                    Occurs::new(0, None),
                    ElementParticle {
                        name: QName::namespaced("urn:test", "item"),
                        type_ref: TypeRef::Handle("ItemType".into()),
                        nillable: true,
                        default_value: Some("x".into()),
                        fixed_value: None,
                    },
                ),
                Particle {
                    occurs: Occurs::optional(),
                    term: ParticleTerm::Wildcard(WildcardParticle {
                        constraint: NamespaceConstraint::Enumerated(vec![
                            None,
                            Some("urn:other".into()),
                        ]),
                        process_contents: ProcessContents::Lax,
                    }),
                },
            ],
        );
        let mut w = RecordWriter::new(KIND_TYPE);
        put_particle(&mut w, &particle);
        let bytes = w.finish();
        let mut r = RecordReader::open("rec", &bytes, KIND_TYPE).unwrap();
        assert_eq!(get_particle(&mut r).unwrap(), particle);
    }
}
