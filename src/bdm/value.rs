//! Owned document values used on the build side and by decoded results.

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::model::GraphId;

/// An interval as a calendar-aware months/days/microseconds triple.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Interval {
    /// Whole months.
    pub months: i32,
    /// Whole days.
    pub days: i32,
    /// Sub-day remainder in microseconds.
    pub microseconds: i64,
}

impl Interval {
    /// Collapses the interval to a microsecond magnitude for ordering,
    /// counting a month as thirty days.
    pub fn span_microseconds(&self) -> i128 {
        const DAY: i128 = 86_400_000_000;
        (self.months as i128) * 30 * DAY + (self.days as i128) * DAY + self.microseconds as i128
    }
}

/// Temporal scalar values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Temporal {
    /// Timestamp without timezone.
    Timestamp(PrimitiveDateTime),
    /// Timestamp with timezone.
    TimestampTz(OffsetDateTime),
    /// Calendar date.
    Date(Date),
    /// Time of day.
    Time(Time),
    /// Time of day with a fixed UTC offset.
    TimeTz {
        /// Local time component.
        time: Time,
        /// Fixed offset from UTC.
        offset: UtcOffset,
    },
    /// Interval.
    Interval(Interval),
}

impl Temporal {
    /// Human-readable variant name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Temporal::Timestamp(_) => "timestamp",
            Temporal::TimestampTz(_) => "timestamptz",
            Temporal::Date(_) => "date",
            Temporal::Time(_) => "time",
            Temporal::TimeTz { .. } => "timetz",
            Temporal::Interval(_) => "interval",
        }
    }
}

/// A vertex inside the document value universe.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexValue {
    /// Entity identifier.
    pub id: GraphId,
    /// Label name.
    pub label: String,
    /// Property document (always an object).
    pub properties: Box<BdmValue>,
}

/// An edge inside the document value universe.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeValue {
    /// Entity identifier.
    pub id: GraphId,
    /// Start vertex identifier.
    pub start_id: GraphId,
    /// End vertex identifier.
    pub end_id: GraphId,
    /// Label name.
    pub label: String,
    /// Property document (always an object).
    pub properties: Box<BdmValue>,
}

/// The tagged sum of every value the document model can hold.
///
/// Object pairs keep insertion order here; the builder sorts keys by
/// `(length, bytes)` and deduplicates with last-writer-wins when the value
/// is serialized.
#[derive(Clone, Debug, PartialEq)]
pub enum BdmValue {
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
    String(String),
    /// Temporal scalar.
    Temporal(Temporal),
    /// Ordered array.
    Array(Vec<BdmValue>),
    /// Keyed object.
    Object(Vec<(String, BdmValue)>),
    /// An already-serialized container carried opaquely.
    Binary(Vec<u8>),
    /// Vertex entity.
    Vertex(VertexValue),
    /// Edge entity.
    Edge(EdgeValue),
    /// Path: alternating vertex/edge values.
    Path(Vec<BdmValue>),
}

impl BdmValue {
    /// Convenience constructor for a vertex value.
    pub fn vertex(id: GraphId, label: String, properties: BdmValue) -> Self {
        BdmValue::Vertex(VertexValue {
            id,
            label,
            properties: Box::new(properties),
        })
    }

    /// Convenience constructor for an edge value.
    pub fn edge(
        id: GraphId,
        start_id: GraphId,
        end_id: GraphId,
        label: String,
        properties: BdmValue,
    ) -> Self {
        BdmValue::Edge(EdgeValue {
            id,
            start_id,
            end_id,
            label,
            properties: Box::new(properties),
        })
    }

    /// An empty object value.
    pub fn empty_object() -> Self {
        BdmValue::Object(Vec::new())
    }

    /// True for values serialized as a single child rather than a container.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            BdmValue::Array(_) | BdmValue::Object(_) | BdmValue::Binary(_)
        )
    }

    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            BdmValue::Null => "null",
            BdmValue::Bool(_) => "boolean",
            BdmValue::Int(_) => "integer",
            BdmValue::Float(_) => "float",
            BdmValue::Numeric(_) => "numeric",
            BdmValue::String(_) => "string",
            BdmValue::Temporal(t) => t.type_name(),
            BdmValue::Array(_) => "array",
            BdmValue::Object(_) => "map",
            BdmValue::Binary(_) => "binary",
            BdmValue::Vertex(_) => "vertex",
            BdmValue::Edge(_) => "edge",
            BdmValue::Path(_) => "path",
        }
    }
}

impl From<bool> for BdmValue {
    fn from(value: bool) -> Self {
        BdmValue::Bool(value)
    }
}

impl From<i64> for BdmValue {
    fn from(value: i64) -> Self {
        BdmValue::Int(value)
    }
}

impl From<f64> for BdmValue {
    fn from(value: f64) -> Self {
        BdmValue::Float(value)
    }
}

impl From<&str> for BdmValue {
    fn from(value: &str) -> Self {
        BdmValue::String(value.to_owned())
    }
}

impl From<String> for BdmValue {
    fn from(value: String) -> Self {
        BdmValue::String(value)
    }
}

/// Compares two object keys the way the serializer sorts them: by length
/// first, then bytes. Cheap to evaluate and sufficient for binary search.
pub fn length_compare_keys(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_is_length_first() {
        use std::cmp::Ordering;
        assert_eq!(length_compare_keys("zz", "aaa"), Ordering::Less);
        assert_eq!(length_compare_keys("ab", "aa"), Ordering::Greater);
        assert_eq!(length_compare_keys("ab", "ab"), Ordering::Equal);
    }

    #[test]
    fn scalar_classification() {
        assert!(BdmValue::Int(1).is_scalar());
        assert!(BdmValue::Null.is_scalar());
        assert!(!BdmValue::Array(vec![]).is_scalar());
        assert!(!BdmValue::empty_object().is_scalar());
        assert!(BdmValue::vertex(crate::model::GraphId::from_raw(1), "v".into(), BdmValue::empty_object()).is_scalar());
    }
}
