//! Serialization of owned values into the length-prefixed wire format.

use bytes::{BufMut, BytesMut};

use crate::bdm::entry::{
    align4, Entry, EntryType, ExtendedTag, ENTRY_OFFLEN_MASK, HEADER_IS_ARRAY, HEADER_IS_OBJECT,
    HEADER_IS_SCALAR, OFFSET_STRIDE,
};
use crate::bdm::value::{length_compare_keys, BdmValue, Temporal};
use crate::error::{GraphError, Result};

/// Serializes a value tree into a complete blob (4-byte total length prefix
/// included). Scalars are wrapped in a raw-scalar array.
pub fn build_blob(value: &BdmValue) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u32_le(0); // total length, patched below

    match value {
        v if v.is_scalar() => {
            write_array(&mut buf, std::slice::from_ref(v), true)?;
        }
        BdmValue::Array(elems) => {
            write_array(&mut buf, elems, false)?;
        }
        BdmValue::Object(pairs) => {
            write_object(&mut buf, pairs)?;
        }
        BdmValue::Binary(container) => {
            buf.put_slice(container);
        }
        _ => {
            return Err(GraphError::InternalInvariantViolated(
                "non-container value fell through scalar dispatch",
            ))
        }
    }

    let total = buf.len() as u32;
    buf[0..4].copy_from_slice(&total.to_le_bytes());
    Ok(buf.to_vec())
}

fn pad_to_int(buf: &mut BytesMut) {
    let padded = align4(buf.len());
    buf.resize(padded, 0);
}

fn check_len(total: usize) -> Result<u32> {
    if total > ENTRY_OFFLEN_MASK as usize {
        return Err(GraphError::ContainerTooLarge {
            max: ENTRY_OFFLEN_MASK,
        });
    }
    Ok(total as u32)
}

/// Serializes one value as a container child, returning its entry word.
fn write_value(buf: &mut BytesMut, value: &BdmValue) -> Result<Entry> {
    match value {
        v if v.is_scalar() => write_scalar(buf, v),
        BdmValue::Array(elems) => write_array(buf, elems, false),
        BdmValue::Object(pairs) => write_object(buf, pairs),
        BdmValue::Binary(container) => {
            let base = buf.len();
            pad_to_int(buf);
            buf.put_slice(container);
            Ok(Entry::new(EntryType::Container, check_len(buf.len() - base)?))
        }
        _ => Err(GraphError::InternalInvariantViolated(
            "non-container value fell through scalar dispatch",
        )),
    }
}

fn write_array(buf: &mut BytesMut, elems: &[BdmValue], raw_scalar: bool) -> Result<Entry> {
    debug_assert!(!raw_scalar || elems.len() == 1);

    let base = buf.len();
    pad_to_int(buf);

    let mut header = elems.len() as u32 | HEADER_IS_ARRAY;
    if raw_scalar {
        header |= HEADER_IS_SCALAR;
    }
    buf.put_u32_le(header);

    let entry_base = buf.len();
    buf.resize(entry_base + 4 * elems.len(), 0);

    let mut total = 0u32;
    for (i, elem) in elems.iter().enumerate() {
        let mut entry = write_value(buf, elem)?;
        total = check_len(total as usize + entry.offlen() as usize)?;
        if i % OFFSET_STRIDE == 0 {
            entry = entry.with_offset(total);
        }
        buf[entry_base + 4 * i..entry_base + 4 * i + 4].copy_from_slice(&entry.0.to_le_bytes());
    }

    Ok(Entry::new(EntryType::Container, check_len(buf.len() - base)?))
}

fn write_object(buf: &mut BytesMut, pairs: &[(String, BdmValue)]) -> Result<Entry> {
    let pairs = uniqueify(pairs);
    let count = pairs.len();

    let base = buf.len();
    pad_to_int(buf);

    buf.put_u32_le(count as u32 | HEADER_IS_OBJECT);

    let entry_base = buf.len();
    buf.resize(entry_base + 4 * count * 2, 0);

    // keys first, then values, matching the stored entry order
    let mut total = 0u32;
    for (i, (key, _)) in pairs.iter().enumerate() {
        buf.put_slice(key.as_bytes());
        let mut entry = Entry::new(EntryType::String, key.len() as u32);
        total = check_len(total as usize + key.len())?;
        if i % OFFSET_STRIDE == 0 {
            entry = entry.with_offset(total);
        }
        buf[entry_base + 4 * i..entry_base + 4 * i + 4].copy_from_slice(&entry.0.to_le_bytes());
    }
    for (i, (_, value)) in pairs.iter().enumerate() {
        let mut entry = write_value(buf, value)?;
        total = check_len(total as usize + entry.offlen() as usize)?;
        if (i + count) % OFFSET_STRIDE == 0 {
            entry = entry.with_offset(total);
        }
        let at = entry_base + 4 * (count + i);
        buf[at..at + 4].copy_from_slice(&entry.0.to_le_bytes());
    }

    Ok(Entry::new(EntryType::Container, check_len(buf.len() - base)?))
}

/// Sorts pairs by `(key length, key bytes)` and drops duplicate keys,
/// keeping the last-inserted value.
fn uniqueify(pairs: &[(String, BdmValue)]) -> Vec<&(String, BdmValue)> {
    let mut indexed: Vec<(usize, &(String, BdmValue))> = pairs.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        length_compare_keys(&a.0, &b.0).then_with(|| ib.cmp(ia))
    });
    indexed.dedup_by(|next, kept| length_compare_keys(&next.1 .0, &kept.1 .0).is_eq());
    indexed.into_iter().map(|(_, pair)| pair).collect()
}

fn write_scalar(buf: &mut BytesMut, value: &BdmValue) -> Result<Entry> {
    Ok(match value {
        BdmValue::Null => Entry::new(EntryType::Null, 0),
        BdmValue::Bool(false) => Entry::new(EntryType::BoolFalse, 0),
        BdmValue::Bool(true) => Entry::new(EntryType::BoolTrue, 0),
        BdmValue::String(s) => {
            buf.put_slice(s.as_bytes());
            Entry::new(EntryType::String, check_len(s.len())?)
        }
        BdmValue::Numeric(d) => {
            let base = buf.len();
            pad_to_int(buf);
            buf.put_slice(&d.serialize());
            Entry::new(EntryType::Numeric, check_len(buf.len() - base)?)
        }
        other => write_extended(buf, other)?,
    })
}

fn write_extended(buf: &mut BytesMut, value: &BdmValue) -> Result<Entry> {
    let base = buf.len();
    pad_to_int(buf);

    match value {
        BdmValue::Int(i) => {
            buf.put_u32_le(ExtendedTag::Integer.code());
            buf.put_i64_le(*i);
        }
        BdmValue::Float(f) => {
            buf.put_u32_le(ExtendedTag::Float.code());
            buf.put_i64_le(f.to_bits() as i64);
        }
        BdmValue::Temporal(t) => write_temporal(buf, t),
        BdmValue::Vertex(v) => {
            buf.put_u32_le(ExtendedTag::Vertex.code());
            buf.put_i64_le(v.id.as_raw() as i64);
            write_entity_tail(buf, &v.label, &v.properties)?;
        }
        BdmValue::Edge(e) => {
            buf.put_u32_le(ExtendedTag::Edge.code());
            buf.put_i64_le(e.id.as_raw() as i64);
            buf.put_i64_le(e.start_id.as_raw() as i64);
            buf.put_i64_le(e.end_id.as_raw() as i64);
            write_entity_tail(buf, &e.label, &e.properties)?;
        }
        BdmValue::Path(elements) => {
            buf.put_u32_le(ExtendedTag::Path.code());
            buf.put_u32_le(elements.len() as u32);
            for element in elements {
                if !matches!(element, BdmValue::Vertex(_) | BdmValue::Edge(_)) {
                    return Err(GraphError::InvalidTypeCast {
                        from: element.type_name(),
                        to: "path element",
                    });
                }
                let blob = build_blob(element)?;
                buf.put_slice(&blob);
            }
        }
        _ => {
            return Err(GraphError::InternalInvariantViolated(
                "non-extended value routed to extended serializer",
            ))
        }
    }

    Ok(Entry::new(EntryType::Extended, check_len(buf.len() - base)?))
}

fn write_entity_tail(buf: &mut BytesMut, label: &str, properties: &BdmValue) -> Result<()> {
    buf.put_u32_le(label.len() as u32);
    buf.put_slice(label.as_bytes());
    pad_to_int(buf);
    match properties {
        BdmValue::Object(pairs) => {
            write_object(buf, pairs)?;
        }
        BdmValue::Binary(container) => {
            buf.put_slice(container);
        }
        other => {
            return Err(GraphError::InvalidTypeCast {
                from: other.type_name(),
                to: "map",
            })
        }
    }
    Ok(())
}

fn write_temporal(buf: &mut BytesMut, t: &Temporal) {
    match t {
        Temporal::Timestamp(pdt) => {
            buf.put_u32_le(ExtendedTag::Timestamp.code());
            buf.put_i64_le((pdt.assume_utc().unix_timestamp_nanos() / 1_000) as i64);
        }
        Temporal::TimestampTz(odt) => {
            buf.put_u32_le(ExtendedTag::TimestampTz.code());
            buf.put_i64_le((odt.unix_timestamp_nanos() / 1_000) as i64);
        }
        Temporal::Date(d) => {
            buf.put_u32_le(ExtendedTag::Date.code());
            buf.put_i32_le(d.to_julian_day());
        }
        Temporal::Time(t) => {
            buf.put_u32_le(ExtendedTag::Time.code());
            buf.put_i64_le(micros_of_day(t));
        }
        Temporal::TimeTz { time, offset } => {
            buf.put_u32_le(ExtendedTag::TimeTz.code());
            buf.put_i64_le(micros_of_day(time));
            buf.put_i32_le(offset.whole_seconds());
        }
        Temporal::Interval(iv) => {
            buf.put_u32_le(ExtendedTag::Interval.code());
            buf.put_i32_le(iv.months);
            buf.put_i32_le(iv.days);
            buf.put_i64_le(iv.microseconds);
        }
    }
}

/// Microseconds since midnight; sub-microsecond precision is not stored.
pub(crate) fn micros_of_day(t: &time::Time) -> i64 {
    t.hour() as i64 * 3_600_000_000
        + t.minute() as i64 * 60_000_000
        + t.second() as i64 * 1_000_000
        + (t.nanosecond() / 1_000) as i64
}
