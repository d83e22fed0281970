//! Total ordering over documents.
//!
//! The order is cross-type: values of different types order by a fixed type
//! priority, values of compatible types (the numeric family, the timestamp
//! family, the time family) compare by promoted value. NaN sorts above every
//! other float and equal to itself so the order stays total.

use std::cmp::Ordering;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::bdm::build::micros_of_day;
use crate::bdm::container::{ContainerRef, Node, ScalarRef};
use crate::bdm::value::Temporal;
use crate::error::Result;

/// Cross-type sort priority; smaller sorts first.
pub fn scalar_priority(s: &ScalarRef<'_>) -> i32 {
    match s {
        ScalarRef::String(_) => 2,
        ScalarRef::Bool(_) => 3,
        ScalarRef::Int(_) | ScalarRef::Float(_) | ScalarRef::Numeric(_) => 4,
        ScalarRef::Temporal(Temporal::Timestamp(_)) | ScalarRef::Temporal(Temporal::TimestampTz(_)) => 5,
        ScalarRef::Temporal(Temporal::Date(_)) => 6,
        ScalarRef::Temporal(Temporal::Time(_)) | ScalarRef::Temporal(Temporal::TimeTz { .. }) => 7,
        ScalarRef::Temporal(Temporal::Interval(_)) => 8,
        ScalarRef::Null => 9,
        ScalarRef::Vertex(_) => 10,
        ScalarRef::Edge(_) => 11,
        ScalarRef::Path(_) => 12,
    }
}

fn node_priority(n: &Node<'_>) -> i32 {
    match n {
        Node::Object(_) => 0,
        Node::Array(_) => 1,
        Node::Scalar(s) => scalar_priority(s),
    }
}

/// Compares two serialized documents, unwrapping raw-scalar roots.
pub fn compare_containers(a: ContainerRef<'_>, b: ContainerRef<'_>) -> Result<Ordering> {
    let na = logical_root(a)?;
    let nb = logical_root(b)?;
    compare_nodes(&na, &nb)
}

fn logical_root(c: ContainerRef<'_>) -> Result<Node<'_>> {
    if c.is_array() && c.is_scalar() {
        Ok(Node::Scalar(c.scalar_at(0)?))
    } else {
        Ok(Node::from_container(c))
    }
}

fn compare_nodes(a: &Node<'_>, b: &Node<'_>) -> Result<Ordering> {
    match (a, b) {
        (Node::Scalar(sa), Node::Scalar(sb)) => compare_scalars(sa, sb),
        (Node::Array(ca), Node::Array(cb)) => {
            let shared = ca.count().min(cb.count());
            for i in 0..shared {
                let ord = compare_nodes(&ca.node_at(i)?, &cb.node_at(i)?)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(ca.count().cmp(&cb.count()))
        }
        (Node::Object(ca), Node::Object(cb)) => {
            let shared = ca.count().min(cb.count());
            for i in 0..shared {
                let ord = ca.object_key(i)?.cmp(cb.object_key(i)?);
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
                let ord = compare_nodes(&ca.object_value(i)?, &cb.object_value(i)?)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(ca.count().cmp(&cb.count()))
        }
        _ => Ok(node_priority(a).cmp(&node_priority(b))),
    }
}

/// Compares two scalars under the cross-type order.
pub fn compare_scalars(a: &ScalarRef<'_>, b: &ScalarRef<'_>) -> Result<Ordering> {
    use ScalarRef::*;

    let ord = match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Bool(x), Bool(y)) => x.cmp(y),
        (String(x), String(y)) => x.cmp(y),
        (Int(x), Int(y)) => x.cmp(y),
        (Float(x), Float(y)) => compare_floats(*x, *y),
        (Numeric(x), Numeric(y)) => x.cmp(y),
        (Int(x), Float(y)) => compare_floats(*x as f64, *y),
        (Float(x), Int(y)) => compare_floats(*x, *y as f64),
        (Int(x), Numeric(y)) => Decimal::from(*x).cmp(y),
        (Numeric(x), Int(y)) => x.cmp(&Decimal::from(*y)),
        (Float(x), Numeric(y)) => compare_float_numeric(*x, y),
        (Numeric(x), Float(y)) => compare_float_numeric(*y, x).reverse(),
        (Temporal(x), Temporal(y)) => compare_temporals(x, y),
        (Vertex(x), Vertex(y)) => x.id.as_raw().cmp(&y.id.as_raw()),
        (Edge(x), Edge(y)) => x.id.as_raw().cmp(&y.id.as_raw()),
        (Path(x), Path(y)) => x.cmp(y),
        _ => scalar_priority(a).cmp(&scalar_priority(b)),
    };
    Ok(ord)
}

/// Float ordering with the document-model NaN rule:
/// `-inf < finite < +inf < NaN`, and `NaN == NaN`.
pub fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn compare_float_numeric(f: f64, d: &Decimal) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f.is_infinite() {
        return if f > 0.0 { Ordering::Greater } else { Ordering::Less };
    }
    match Decimal::from_f64(f) {
        Some(df) => df.cmp(d),
        // beyond the decimal range, the sign of the float decides
        None => {
            if f > 0.0 {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
    }
}

fn compare_temporals(a: &Temporal, b: &Temporal) -> Ordering {
    use Temporal::*;

    match (a, b) {
        (Timestamp(x), Timestamp(y)) => x.cmp(y),
        (TimestampTz(x), TimestampTz(y)) => x.cmp(y),
        (Date(x), Date(y)) => x.cmp(y),
        (Time(x), Time(y)) => x.cmp(y),
        (TimeTz { time: tx, offset: ox }, TimeTz { time: ty, offset: oy }) => {
            let kx = micros_of_day(tx) - ox.whole_seconds() as i64 * 1_000_000;
            let ky = micros_of_day(ty) - oy.whole_seconds() as i64 * 1_000_000;
            kx.cmp(&ky).then_with(|| ox.whole_seconds().cmp(&oy.whole_seconds()))
        }
        (Interval(x), Interval(y)) => x.span_microseconds().cmp(&y.span_microseconds()),

        // plain timestamps are taken as UTC against timezone-aware values
        (Timestamp(x), TimestampTz(y)) => x.assume_utc().cmp(y),
        (TimestampTz(x), Timestamp(y)) => x.cmp(&y.assume_utc()),
        (Date(x), Timestamp(y)) => x.midnight().cmp(y),
        (Timestamp(x), Date(y)) => x.cmp(&y.midnight()),
        (Date(x), TimestampTz(y)) => x.midnight().assume_utc().cmp(y),
        (TimestampTz(x), Date(y)) => x.cmp(&y.midnight().assume_utc()),

        // a timetz compares against a plain time by its local time component
        (Time(x), TimeTz { time: y, .. }) => x.cmp(y),
        (TimeTz { time: x, .. }, Time(y)) => x.cmp(y),

        _ => temporal_priority(a).cmp(&temporal_priority(b)),
    }
}

fn temporal_priority(t: &Temporal) -> i32 {
    match t {
        Temporal::Timestamp(_) | Temporal::TimestampTz(_) => 5,
        Temporal::Date(_) => 6,
        Temporal::Time(_) | Temporal::TimeTz { .. } => 7,
        Temporal::Interval(_) => 8,
    }
}

/// Same-type scalar equality used by containment and element search.
///
/// Values of different representations are never equal here, matching the
/// lookup semantics of object/array search rather than the ordering
/// semantics above.
pub fn scalars_equal(a: &ScalarRef<'_>, b: &ScalarRef<'_>) -> bool {
    use ScalarRef::*;

    match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Numeric(x), Numeric(y)) => x == y,
        (Temporal(x), Temporal(y)) => {
            std::mem::discriminant(x) == std::mem::discriminant(y)
                && compare_temporals(x, y) == Ordering::Equal
        }
        (Vertex(x), Vertex(y)) => x.id == y.id,
        (Edge(x), Edge(y)) => x.id == y.id,
        (Path(x), Path(y)) => x == y,
        _ => false,
    }
}
