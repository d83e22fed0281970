//! Zero-copy read access to serialized containers.
//!
//! A [`ContainerRef`] is an index-typed cursor over a borrowed byte slice
//! positioned at a container header. Child access walks the packed entry
//! words, using the periodically stored offsets as checkpoints so random
//! access does not rescan the whole container.

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::bdm::entry::{
    align4, Entry, EntryType, ExtendedTag, ENTRY_OFFLEN_MASK, HEADER_COUNT_MASK, HEADER_IS_ARRAY,
    HEADER_IS_OBJECT, HEADER_IS_SCALAR,
};
use crate::bdm::value::{length_compare_keys, BdmValue, Interval, Temporal};
use crate::error::{GraphError, Result};
use crate::model::GraphId;

const CORRUPT: fn(&'static str) -> GraphError = GraphError::CorruptDocument;

/// Borrowed view of a vertex, edge, or path payload.
#[derive(Clone, Copy, Debug)]
pub struct EntityRef<'a> {
    /// Entity identifier.
    pub id: GraphId,
    /// Start vertex identifier; edges only.
    pub start_id: Option<GraphId>,
    /// End vertex identifier; edges only.
    pub end_id: Option<GraphId>,
    /// Label name.
    pub label: &'a str,
    /// Property container.
    pub properties: ContainerRef<'a>,
}

/// Borrowed scalar decoded from a container child.
#[derive(Clone, Copy, Debug)]
pub enum ScalarRef<'a> {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// binary64 float.
    Float(f64),
    /// Arbitrary-precision numeric.
    Numeric(Decimal),
    /// UTF-8 string.
    String(&'a str),
    /// Temporal scalar.
    Temporal(Temporal),
    /// Vertex entity.
    Vertex(EntityRef<'a>),
    /// Edge entity.
    Edge(EntityRef<'a>),
    /// Path payload: count-prefixed entity documents.
    Path(&'a [u8]),
}

impl<'a> ScalarRef<'a> {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarRef::Null => "null",
            ScalarRef::Bool(_) => "boolean",
            ScalarRef::Int(_) => "integer",
            ScalarRef::Float(_) => "float",
            ScalarRef::Numeric(_) => "numeric",
            ScalarRef::String(_) => "string",
            ScalarRef::Temporal(t) => t.type_name(),
            ScalarRef::Vertex(_) => "vertex",
            ScalarRef::Edge(_) => "edge",
            ScalarRef::Path(_) => "path",
        }
    }

    /// Converts the borrowed scalar into an owned value.
    pub fn to_owned_value(&self) -> Result<BdmValue> {
        Ok(match self {
            ScalarRef::Null => BdmValue::Null,
            ScalarRef::Bool(b) => BdmValue::Bool(*b),
            ScalarRef::Int(i) => BdmValue::Int(*i),
            ScalarRef::Float(f) => BdmValue::Float(*f),
            ScalarRef::Numeric(d) => BdmValue::Numeric(*d),
            ScalarRef::String(s) => BdmValue::String((*s).to_owned()),
            ScalarRef::Temporal(t) => BdmValue::Temporal(*t),
            ScalarRef::Vertex(v) => {
                BdmValue::vertex(v.id, v.label.to_owned(), v.properties.to_value()?)
            }
            ScalarRef::Edge(e) => BdmValue::edge(
                e.id,
                e.start_id.ok_or_else(|| CORRUPT("edge without start id"))?,
                e.end_id.ok_or_else(|| CORRUPT("edge without end id"))?,
                e.label.to_owned(),
                e.properties.to_value()?,
            ),
            ScalarRef::Path(bytes) => BdmValue::Path(decode_path_elements(bytes)?),
        })
    }
}

/// The logical shape of one container child.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    /// A scalar child.
    Scalar(ScalarRef<'a>),
    /// A nested array.
    Array(ContainerRef<'a>),
    /// A nested object.
    Object(ContainerRef<'a>),
}

impl<'a> Node<'a> {
    /// Wraps a nested container in its logical shape.
    pub fn from_container(c: ContainerRef<'a>) -> Self {
        if c.is_object() {
            Node::Object(c)
        } else {
            Node::Array(c)
        }
    }
}

/// Cursor over a serialized container.
#[derive(Clone, Copy, Debug)]
pub struct ContainerRef<'a> {
    bytes: &'a [u8],
}

impl<'a> ContainerRef<'a> {
    /// Wraps a byte slice positioned at a container header.
    ///
    /// The slice may extend past the container; children are located through
    /// the entry words, never by the slice end.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(CORRUPT("container header truncated"));
        }
        Ok(ContainerRef { bytes })
    }

    /// Underlying bytes, starting at the header.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn header(&self) -> u32 {
        read_u32(self.bytes, 0)
    }

    /// Number of children (pairs for an object).
    pub fn count(&self) -> usize {
        (self.header() & HEADER_COUNT_MASK) as usize
    }

    /// True for array containers (raw scalars included).
    pub fn is_array(&self) -> bool {
        self.header() & HEADER_IS_ARRAY != 0
    }

    /// True for object containers.
    pub fn is_object(&self) -> bool {
        self.header() & HEADER_IS_OBJECT != 0
    }

    /// True when the container is a raw-scalar wrapper.
    pub fn is_scalar(&self) -> bool {
        self.header() & HEADER_IS_SCALAR != 0
    }

    fn num_entries(&self) -> usize {
        if self.is_object() {
            self.count() * 2
        } else {
            self.count()
        }
    }

    fn payload_base(&self) -> usize {
        4 + 4 * self.num_entries()
    }

    /// The entry word for child `index`.
    pub fn entry(&self, index: usize) -> Result<Entry> {
        if index >= self.num_entries() {
            return Err(CORRUPT("entry index out of range"));
        }
        let at = 4 + 4 * index;
        if at + 4 > self.bytes.len() {
            return Err(CORRUPT("entry array truncated"));
        }
        Ok(Entry(read_u32(self.bytes, at)))
    }

    /// Start offset of child `index` within the payload, walking backwards
    /// to the nearest stored offset checkpoint.
    pub fn get_offset(&self, index: usize) -> Result<u32> {
        let mut offset = 0u32;
        for i in (0..index).rev() {
            let e = self.entry(i)?;
            offset = offset
                .checked_add(e.offlen())
                .ok_or_else(|| CORRUPT("entry offsets overflow"))?;
            if e.has_offset() {
                break;
            }
        }
        Ok(offset & ENTRY_OFFLEN_MASK)
    }

    /// Payload length of child `index`.
    pub fn get_length(&self, index: usize) -> Result<u32> {
        let e = self.entry(index)?;
        if e.has_offset() {
            let start = self.get_offset(index)?;
            e.offlen()
                .checked_sub(start)
                .ok_or_else(|| CORRUPT("entry end offset before start"))
        } else {
            Ok(e.offlen())
        }
    }

    fn child_slice(&self, index: usize) -> Result<(&'a [u8], usize)> {
        let offset = self.get_offset(index)? as usize;
        let len = self.get_length(index)? as usize;
        // aligned payloads count their leading pad in the entry length
        let aligned = align4(offset);
        let pad = aligned - offset;
        let start = self.payload_base() + aligned;
        let data_len = len.saturating_sub(pad);
        if start + data_len > self.bytes.len() {
            return Err(CORRUPT("child payload truncated"));
        }
        Ok((&self.bytes[start..start + data_len], data_len))
    }

    fn raw_slice(&self, index: usize) -> Result<&'a [u8]> {
        let offset = self.get_offset(index)? as usize;
        let len = self.get_length(index)? as usize;
        let start = self.payload_base() + offset;
        if start + len > self.bytes.len() {
            return Err(CORRUPT("child payload truncated"));
        }
        Ok(&self.bytes[start..start + len])
    }

    /// Nested container child.
    pub fn container_at(&self, index: usize) -> Result<ContainerRef<'a>> {
        match self.entry(index)?.entry_type() {
            Some(EntryType::Container) => {
                let (data, _) = self.child_slice(index)?;
                ContainerRef::new(data)
            }
            _ => Err(CORRUPT("child is not a container")),
        }
    }

    /// Decodes child `index` as a scalar.
    pub fn scalar_at(&self, index: usize) -> Result<ScalarRef<'a>> {
        let e = self.entry(index)?;
        let ty = e.entry_type().ok_or_else(|| CORRUPT("unknown entry type"))?;
        Ok(match ty {
            EntryType::Null => ScalarRef::Null,
            EntryType::BoolFalse => ScalarRef::Bool(false),
            EntryType::BoolTrue => ScalarRef::Bool(true),
            EntryType::String => {
                let data = self.raw_slice(index)?;
                ScalarRef::String(
                    std::str::from_utf8(data).map_err(|_| CORRUPT("string is not UTF-8"))?,
                )
            }
            EntryType::Numeric => {
                let (data, _) = self.child_slice(index)?;
                if data.len() < 16 {
                    return Err(CORRUPT("numeric payload truncated"));
                }
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&data[..16]);
                ScalarRef::Numeric(Decimal::deserialize(raw))
            }
            EntryType::Extended => decode_extended(self.child_slice(index)?.0)?,
            EntryType::Container => {
                return Err(CORRUPT("container child where scalar expected"))
            }
        })
    }

    /// Logical view of child `index`.
    pub fn node_at(&self, index: usize) -> Result<Node<'a>> {
        match self.entry(index)?.entry_type() {
            Some(EntryType::Container) => Ok(Node::from_container(self.container_at(index)?)),
            Some(_) => Ok(Node::Scalar(self.scalar_at(index)?)),
            None => Err(CORRUPT("unknown entry type")),
        }
    }

    /// Key `index` of an object container.
    pub fn object_key(&self, index: usize) -> Result<&'a str> {
        if !self.is_object() {
            return Err(CORRUPT("key access on non-object"));
        }
        match self.scalar_at(index)? {
            ScalarRef::String(s) => Ok(s),
            _ => Err(CORRUPT("object key is not a string")),
        }
    }

    /// Value of pair `index` of an object container.
    pub fn object_value(&self, index: usize) -> Result<Node<'a>> {
        if !self.is_object() {
            return Err(CORRUPT("value access on non-object"));
        }
        self.node_at(self.count() + index)
    }

    /// Element `index` of an array container.
    pub fn array_element(&self, index: usize) -> Result<Option<Node<'a>>> {
        if !self.is_array() {
            return Err(CORRUPT("element access on non-array"));
        }
        if index >= self.count() {
            return Ok(None);
        }
        self.node_at(index).map(Some)
    }

    /// Binary search for `key` among the sorted object keys; returns the
    /// paired value on a hit.
    pub fn find_in_object(&self, key: &str) -> Result<Option<Node<'a>>> {
        if !self.is_object() {
            return Ok(None);
        }
        let mut low = 0usize;
        let mut high = self.count();
        while low < high {
            let mid = low + (high - low) / 2;
            let candidate = self.object_key(mid)?;
            match length_compare_keys(candidate, key) {
                std::cmp::Ordering::Equal => return self.object_value(mid).map(Some),
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
            }
        }
        Ok(None)
    }

    /// Decodes the container into an owned value tree.
    pub fn to_value(&self) -> Result<BdmValue> {
        if self.is_object() {
            let mut pairs = Vec::with_capacity(self.count());
            for i in 0..self.count() {
                let key = self.object_key(i)?.to_owned();
                let value = node_to_value(self.object_value(i)?)?;
                pairs.push((key, value));
            }
            Ok(BdmValue::Object(pairs))
        } else {
            let mut elems = Vec::with_capacity(self.count());
            for i in 0..self.count() {
                elems.push(node_to_value(self.node_at(i)?)?);
            }
            Ok(BdmValue::Array(elems))
        }
    }

    /// Structurally validates the container and all of its descendants.
    pub fn validate(&self) -> Result<()> {
        if self.is_array() == self.is_object() {
            return Err(CORRUPT("container is neither array nor object"));
        }
        if self.is_scalar() && (!self.is_array() || self.count() != 1) {
            return Err(CORRUPT("raw scalar must be a one-element array"));
        }
        let entries = self.num_entries();
        if 4 + 4 * entries > self.bytes.len() {
            return Err(CORRUPT("entry array truncated"));
        }
        for i in 0..entries {
            match self.entry(i)?.entry_type() {
                Some(EntryType::Container) => self.container_at(i)?.validate()?,
                Some(_) => {
                    self.scalar_at(i)?;
                }
                None => return Err(CORRUPT("unknown entry type")),
            }
        }
        if self.is_object() {
            for i in 0..entries / 2 {
                self.object_key(i)?;
            }
        }
        Ok(())
    }
}

fn node_to_value(node: Node<'_>) -> Result<BdmValue> {
    match node {
        Node::Scalar(s) => s.to_owned_value(),
        Node::Array(c) | Node::Object(c) => c.to_value(),
    }
}

fn decode_extended(data: &[u8]) -> Result<ScalarRef<'_>> {
    if data.len() < 4 {
        return Err(CORRUPT("extended payload truncated"));
    }
    let tag = ExtendedTag::from_code(read_u32(data, 0))
        .ok_or_else(|| CORRUPT("unknown extended tag"))?;
    let body = &data[4..];
    Ok(match tag {
        ExtendedTag::Integer => ScalarRef::Int(read_i64(body, 0)?),
        ExtendedTag::Float => ScalarRef::Float(f64::from_bits(read_i64(body, 0)? as u64)),
        ExtendedTag::Timestamp => {
            ScalarRef::Temporal(Temporal::Timestamp(timestamp_from_micros(read_i64(body, 0)?)?))
        }
        ExtendedTag::TimestampTz => ScalarRef::Temporal(Temporal::TimestampTz(
            OffsetDateTime::from_unix_timestamp_nanos(read_i64(body, 0)? as i128 * 1_000)
                .map_err(|_| CORRUPT("timestamptz out of range"))?,
        )),
        ExtendedTag::Date => ScalarRef::Temporal(Temporal::Date(
            Date::from_julian_day(read_i32(body, 0)?)
                .map_err(|_| CORRUPT("date out of range"))?,
        )),
        ExtendedTag::Time => {
            ScalarRef::Temporal(Temporal::Time(time_from_micros(read_i64(body, 0)?)?))
        }
        ExtendedTag::TimeTz => {
            let time = time_from_micros(read_i64(body, 0)?)?;
            let offset = UtcOffset::from_whole_seconds(read_i32(body, 8)?)
                .map_err(|_| CORRUPT("timetz offset out of range"))?;
            ScalarRef::Temporal(Temporal::TimeTz { time, offset })
        }
        ExtendedTag::Interval => ScalarRef::Temporal(Temporal::Interval(Interval {
            months: read_i32(body, 0)?,
            days: read_i32(body, 4)?,
            microseconds: read_i64(body, 8)?,
        })),
        ExtendedTag::Vertex => {
            let (entity, _) = decode_entity(body, false)?;
            ScalarRef::Vertex(entity)
        }
        ExtendedTag::Edge => {
            let (entity, _) = decode_entity(body, true)?;
            ScalarRef::Edge(entity)
        }
        ExtendedTag::Path => ScalarRef::Path(body),
    })
}

fn decode_entity(body: &[u8], is_edge: bool) -> Result<(EntityRef<'_>, usize)> {
    let mut at = 0usize;
    let id = GraphId::from_raw(read_i64(body, at)? as u64);
    at += 8;
    let (start_id, end_id) = if is_edge {
        let s = GraphId::from_raw(read_i64(body, at)? as u64);
        let e = GraphId::from_raw(read_i64(body, at + 8)? as u64);
        at += 16;
        (Some(s), Some(e))
    } else {
        (None, None)
    };
    let label_len = read_u32_checked(body, at)? as usize;
    at += 4;
    if at + label_len > body.len() {
        return Err(CORRUPT("entity label truncated"));
    }
    let label = std::str::from_utf8(&body[at..at + label_len])
        .map_err(|_| CORRUPT("entity label is not UTF-8"))?;
    at = align4(at + label_len);
    if at > body.len() {
        return Err(CORRUPT("entity properties truncated"));
    }
    let properties = ContainerRef::new(&body[at..])?;
    Ok((
        EntityRef {
            id,
            start_id,
            end_id,
            label,
            properties,
        },
        at,
    ))
}

fn decode_path_elements(bytes: &[u8]) -> Result<Vec<BdmValue>> {
    let count = read_u32_checked(bytes, 0)? as usize;
    let mut at = 4usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let total = read_u32_checked(bytes, at)? as usize;
        if total < 8 || at + total > bytes.len() {
            return Err(CORRUPT("path element truncated"));
        }
        let root = ContainerRef::new(&bytes[at + 4..at + total])?;
        if !(root.is_scalar() && root.count() == 1) {
            return Err(CORRUPT("path element is not an entity scalar"));
        }
        out.push(root.scalar_at(0)?.to_owned_value()?);
        at += total;
    }
    Ok(out)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u32_checked(bytes: &[u8], at: usize) -> Result<u32> {
    if at + 4 > bytes.len() {
        return Err(CORRUPT("payload truncated"));
    }
    Ok(read_u32(bytes, at))
}

fn read_i32(bytes: &[u8], at: usize) -> Result<i32> {
    read_u32_checked(bytes, at).map(|v| v as i32)
}

fn read_i64(bytes: &[u8], at: usize) -> Result<i64> {
    if at + 8 > bytes.len() {
        return Err(CORRUPT("payload truncated"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    Ok(i64::from_le_bytes(raw))
}

fn timestamp_from_micros(micros: i64) -> Result<time::PrimitiveDateTime> {
    let odt = OffsetDateTime::from_unix_timestamp_nanos(micros as i128 * 1_000)
        .map_err(|_| CORRUPT("timestamp out of range"))?;
    Ok(time::PrimitiveDateTime::new(odt.date(), odt.time()))
}

fn time_from_micros(micros: i64) -> Result<Time> {
    if !(0..86_400_000_000).contains(&micros) {
        return Err(CORRUPT("time of day out of range"));
    }
    let nanos = micros as u64 * 1_000;
    Time::from_hms_nano(
        (nanos / 3_600_000_000_000) as u8,
        ((nanos / 60_000_000_000) % 60) as u8,
        ((nanos / 1_000_000_000) % 60) as u8,
        (nanos % 1_000_000_000) as u32,
    )
    .map_err(|_| CORRUPT("time of day out of range"))
}
