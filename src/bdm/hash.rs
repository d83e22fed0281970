//! Seeded 64-bit hashing over documents.
//!
//! Values that compare equal hash equal within one representation;
//! successive children are combined by rotating the running state one bit
//! and XORing in the child's hash, so element order matters for arrays and
//! the sorted key order makes object hashing deterministic.

use xxhash_rust::xxh64::xxh64;

use crate::bdm::build::micros_of_day;
use crate::bdm::container::ScalarRef;
use crate::bdm::entry::{HEADER_IS_ARRAY, HEADER_IS_OBJECT};
use crate::bdm::iter::{BdmIterator, BdmToken, ValueToken};
use crate::bdm::value::Temporal;
use crate::bdm::ContainerRef;
use crate::error::{GraphError, Result};

/// Hashes a serialized document with a caller-provided seed.
pub fn hash_container(root: ContainerRef<'_>, seed: u64) -> Result<u64> {
    let mut state = seed;
    let mut it = BdmIterator::new(root, false);
    while let Some(token) = it.next() {
        let tmp = match token? {
            BdmToken::BeginArray { raw_scalar, .. } => {
                // a raw scalar hashes as its bare scalar
                if raw_scalar {
                    continue;
                }
                HEADER_IS_ARRAY as u64
            }
            BdmToken::BeginObject { .. } => HEADER_IS_OBJECT as u64,
            BdmToken::EndArray | BdmToken::EndObject => continue,
            BdmToken::Key(key) => xxh64(key.as_bytes(), seed),
            BdmToken::Value(v) | BdmToken::Element(v) => match v {
                ValueToken::Scalar(s) => hash_scalar(&s, seed),
                ValueToken::Binary(_) => {
                    return Err(GraphError::InternalInvariantViolated(
                        "opaque container token while hashing",
                    ))
                }
            },
        };
        state = state.rotate_left(1) ^ tmp;
    }
    Ok(state)
}

fn hash_scalar(s: &ScalarRef<'_>, seed: u64) -> u64 {
    match s {
        ScalarRef::Null => 0x01,
        ScalarRef::Bool(true) => 0x02,
        ScalarRef::Bool(false) => 0x04,
        ScalarRef::Int(i) => xxh64(&i.to_le_bytes(), seed),
        ScalarRef::Float(f) => xxh64(&f.to_bits().to_le_bytes(), seed),
        ScalarRef::Numeric(d) => xxh64(&d.normalize().serialize(), seed),
        ScalarRef::String(s) => xxh64(s.as_bytes(), seed),
        ScalarRef::Temporal(t) => hash_temporal(t, seed),
        ScalarRef::Vertex(v) => xxh64(&v.id.as_raw().to_le_bytes(), seed ^ 0x09),
        ScalarRef::Edge(e) => xxh64(&e.id.as_raw().to_le_bytes(), seed ^ 0x0a),
        ScalarRef::Path(bytes) => xxh64(bytes, seed ^ 0x0b),
    }
}

fn hash_temporal(t: &Temporal, seed: u64) -> u64 {
    let (tag, key): (u8, i128) = match t {
        Temporal::Timestamp(pdt) => (1, pdt.assume_utc().unix_timestamp_nanos() / 1_000),
        Temporal::TimestampTz(odt) => (2, odt.unix_timestamp_nanos() / 1_000),
        Temporal::Date(d) => (3, d.to_julian_day() as i128),
        Temporal::Time(t) => (4, micros_of_day(t) as i128),
        Temporal::TimeTz { time, offset } => (
            5,
            micros_of_day(time) as i128 - offset.whole_seconds() as i128 * 1_000_000,
        ),
        Temporal::Interval(iv) => (6, iv.span_microseconds()),
    };
    let mut bytes = [0u8; 17];
    bytes[0] = tag;
    bytes[1..].copy_from_slice(&key.to_le_bytes());
    xxh64(&bytes, seed)
}
