//! Entry-word and container-header encoding.
//!
//! Containers store one 32-bit word per child: a 3-bit type code, a
//! has-offset bit, and a 28-bit field holding either the child's payload
//! length or, every [`OFFSET_STRIDE`] entries, the cumulative end offset of
//! the child's payload. Storing periodic offsets keeps random access cheap
//! without paying an offset per entry.

/// Mask over the 28-bit length-or-offset field of an entry word.
pub const ENTRY_OFFLEN_MASK: u32 = 0x0FFF_FFFF;

/// Mask over the 3-bit type code of an entry word.
pub const ENTRY_TYPE_MASK: u32 = 0x7000_0000;

/// Bit marking that the entry's 28-bit field stores an end offset.
pub const ENTRY_HAS_OFFSET: u32 = 0x8000_0000;

/// Every `OFFSET_STRIDE`-th entry stores an offset instead of a length.
pub const OFFSET_STRIDE: usize = 32;

/// Container header: mask over the 28-bit child count.
pub const HEADER_COUNT_MASK: u32 = 0x0FFF_FFFF;

/// Container header: the container is an array.
pub const HEADER_IS_ARRAY: u32 = 0x1000_0000;

/// Container header: the container is an object.
pub const HEADER_IS_OBJECT: u32 = 0x2000_0000;

/// Container header: the array is a raw-scalar wrapper.
pub const HEADER_IS_SCALAR: u32 = 0x4000_0000;

/// 3-bit child type codes stored in entry words.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryType {
    /// UTF-8 string payload.
    String,
    /// Arbitrary-precision numeric payload (aligned).
    Numeric,
    /// Boolean false, no payload.
    BoolFalse,
    /// Boolean true, no payload.
    BoolTrue,
    /// Null, no payload.
    Null,
    /// Nested container payload (aligned).
    Container,
    /// Extended payload: a 4-byte tag followed by tag-specific data (aligned).
    Extended,
}

impl EntryType {
    fn code(self) -> u32 {
        match self {
            EntryType::String => 0,
            EntryType::Numeric => 1,
            EntryType::BoolFalse => 2,
            EntryType::BoolTrue => 3,
            EntryType::Null => 4,
            EntryType::Container => 5,
            EntryType::Extended => 6,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => EntryType::String,
            1 => EntryType::Numeric,
            2 => EntryType::BoolFalse,
            3 => EntryType::BoolTrue,
            4 => EntryType::Null,
            5 => EntryType::Container,
            6 => EntryType::Extended,
            _ => return None,
        })
    }
}

/// Tags opening an [`EntryType::Extended`] payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtendedTag {
    /// 64-bit signed integer.
    Integer,
    /// binary64 float.
    Float,
    /// Timestamp without timezone, microseconds since the Unix epoch.
    Timestamp,
    /// Timestamp with timezone, UTC microseconds since the Unix epoch.
    TimestampTz,
    /// Calendar date, Julian day number.
    Date,
    /// Time of day, microseconds since midnight.
    Time,
    /// Time of day with a fixed UTC offset.
    TimeTz,
    /// Interval as a months/days/microseconds triple.
    Interval,
    /// Vertex entity.
    Vertex,
    /// Edge entity.
    Edge,
    /// Path entity: a count-prefixed sequence of entity documents.
    Path,
}

impl ExtendedTag {
    /// 4-byte wire value of the tag.
    pub fn code(self) -> u32 {
        match self {
            ExtendedTag::Integer => 1,
            ExtendedTag::Float => 2,
            ExtendedTag::Timestamp => 3,
            ExtendedTag::TimestampTz => 4,
            ExtendedTag::Date => 5,
            ExtendedTag::Time => 6,
            ExtendedTag::TimeTz => 7,
            ExtendedTag::Interval => 8,
            ExtendedTag::Vertex => 9,
            ExtendedTag::Edge => 10,
            ExtendedTag::Path => 11,
        }
    }

    /// Decodes a wire tag.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => ExtendedTag::Integer,
            2 => ExtendedTag::Float,
            3 => ExtendedTag::Timestamp,
            4 => ExtendedTag::TimestampTz,
            5 => ExtendedTag::Date,
            6 => ExtendedTag::Time,
            7 => ExtendedTag::TimeTz,
            8 => ExtendedTag::Interval,
            9 => ExtendedTag::Vertex,
            10 => ExtendedTag::Edge,
            11 => ExtendedTag::Path,
            _ => return None,
        })
    }
}

/// One decoded entry word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry(pub u32);

impl Entry {
    /// Builds an entry word from a type and a length.
    pub fn new(ty: EntryType, len: u32) -> Self {
        debug_assert!(len <= ENTRY_OFFLEN_MASK);
        Entry((ty.code() << 28) | (len & ENTRY_OFFLEN_MASK))
    }

    /// Rewrites the 28-bit field with an end offset and sets the offset bit.
    pub fn with_offset(self, offset: u32) -> Self {
        Entry((self.0 & ENTRY_TYPE_MASK) | (offset & ENTRY_OFFLEN_MASK) | ENTRY_HAS_OFFSET)
    }

    /// The child's type code.
    pub fn entry_type(self) -> Option<EntryType> {
        EntryType::from_code((self.0 & ENTRY_TYPE_MASK) >> 28)
    }

    /// The raw 28-bit length-or-offset field.
    pub fn offlen(self) -> u32 {
        self.0 & ENTRY_OFFLEN_MASK
    }

    /// True when the 28-bit field stores an end offset.
    pub fn has_offset(self) -> bool {
        self.0 & ENTRY_HAS_OFFSET != 0
    }
}

/// Rounds a payload offset up to the next 4-byte boundary.
pub fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_roundtrip() {
        let e = Entry::new(EntryType::String, 17);
        assert_eq!(e.entry_type(), Some(EntryType::String));
        assert_eq!(e.offlen(), 17);
        assert!(!e.has_offset());

        let e = e.with_offset(1234);
        assert!(e.has_offset());
        assert_eq!(e.offlen(), 1234);
        assert_eq!(e.entry_type(), Some(EntryType::String));
    }

    #[test]
    fn alignment() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(7), 8);
    }
}
