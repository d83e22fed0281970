//! Document-model laws: round-trips, containment, and ordering.

use std::cmp::Ordering;

use proptest::prelude::*;

use penumbra::bdm::{Bdm, BdmToken, BdmValue, ValueToken};

fn obj(pairs: &[(&str, BdmValue)]) -> BdmValue {
    BdmValue::Object(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect(),
    )
}

fn scalar_strategy() -> impl Strategy<Value = BdmValue> {
    prop_oneof![
        Just(BdmValue::Null),
        any::<bool>().prop_map(BdmValue::Bool),
        any::<i64>().prop_map(BdmValue::Int),
        // finite floats only: NaN is not equal to itself under value
        // equality, so it cannot round-trip through assert_eq
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(BdmValue::Float),
        "[a-z]{0,12}".prop_map(BdmValue::String),
    ]
}

fn value_strategy() -> impl Strategy<Value = BdmValue> {
    scalar_strategy().prop_recursive(3, 48, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(BdmValue::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6).prop_map(|pairs| {
                BdmValue::Object(pairs.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn build_decode_is_a_fixpoint(value in value_strategy()) {
        let built = Bdm::build(&value).unwrap();
        let decoded = built.root_value().unwrap();
        let rebuilt = Bdm::build(&decoded).unwrap();
        // key order is deterministic and preserved from here on
        prop_assert_eq!(built.as_bytes(), rebuilt.as_bytes());
        prop_assert_eq!(rebuilt.root_value().unwrap(), decoded);
    }

    #[test]
    fn scalars_roundtrip_exactly(value in scalar_strategy()) {
        let built = Bdm::build(&value).unwrap();
        prop_assert_eq!(built.root_value().unwrap(), value);
    }

    #[test]
    fn containment_is_reflexive(value in value_strategy()) {
        let built = Bdm::build(&value).unwrap();
        prop_assert!(built.deep_contains(&built).unwrap());
    }

    #[test]
    fn every_object_contains_the_empty_object(value in value_strategy()) {
        let built = Bdm::build(&value).unwrap();
        let empty = Bdm::build(&BdmValue::empty_object()).unwrap();
        if matches!(value, BdmValue::Object(_)) {
            prop_assert!(built.deep_contains(&empty).unwrap());
        }
    }

    #[test]
    fn compare_is_reflexive_and_antisymmetric(
        a in value_strategy(),
        b in value_strategy(),
    ) {
        let da = Bdm::build(&a).unwrap();
        let db = Bdm::build(&b).unwrap();
        prop_assert_eq!(da.compare(&da).unwrap(), Ordering::Equal);
        prop_assert_eq!(da.compare(&db).unwrap(), db.compare(&da).unwrap().reverse());
    }

    #[test]
    fn equal_documents_hash_alike(value in value_strategy()) {
        let a = Bdm::build(&value).unwrap();
        let b = Bdm::build(&value).unwrap();
        prop_assert_eq!(a.hash(7).unwrap(), b.hash(7).unwrap());
    }
}

#[test]
fn lookup_then_iterate_nested_array() {
    // build({a:1, b:[1,2,3]}) / find_in_object("b") / iterate -> 1, 2, 3
    let doc = Bdm::build(&obj(&[
        ("a", BdmValue::Int(1)),
        (
            "b",
            BdmValue::Array(vec![BdmValue::Int(1), BdmValue::Int(2), BdmValue::Int(3)]),
        ),
    ]))
    .unwrap();

    let found = doc.find_in_object("b").unwrap().unwrap();
    let BdmValue::Binary(container) = found else {
        panic!("expected an opaque container, got {found:?}");
    };

    let nested = Bdm::build(&BdmValue::Binary(container)).unwrap();
    let mut elements = Vec::new();
    let mut iter = nested.iterate(false).unwrap();
    while let Some(token) = iter.next() {
        if let BdmToken::Element(ValueToken::Scalar(s)) = token.unwrap() {
            elements.push(s.to_owned_value().unwrap());
        }
    }
    assert_eq!(
        elements,
        vec![BdmValue::Int(1), BdmValue::Int(2), BdmValue::Int(3)]
    );
}

#[test]
fn partial_object_containment() {
    let whole = Bdm::build(&obj(&[
        ("a", BdmValue::Int(1)),
        ("b", BdmValue::Int(2)),
    ]))
    .unwrap();
    let part = Bdm::build(&obj(&[("a", BdmValue::Int(1))])).unwrap();
    assert!(whole.deep_contains(&part).unwrap());
    assert!(!part.deep_contains(&whole).unwrap());

    let nested_whole = Bdm::build(&obj(&[(
        "a",
        obj(&[("b", BdmValue::Int(1)), ("c", BdmValue::Int(2))]),
    )]))
    .unwrap();
    let nested_part = Bdm::build(&obj(&[("a", obj(&[("b", BdmValue::Int(1))]))])).unwrap();
    assert!(nested_whole.deep_contains(&nested_part).unwrap());
}

#[test]
fn array_subset_containment_ignores_order() {
    let arr = Bdm::build(&BdmValue::Array(vec![
        BdmValue::Int(1),
        BdmValue::Int(2),
        BdmValue::Int(3),
    ]))
    .unwrap();
    let subset = Bdm::build(&BdmValue::Array(vec![BdmValue::Int(2), BdmValue::Int(3)])).unwrap();
    assert!(arr.deep_contains(&subset).unwrap());

    let not_subset =
        Bdm::build(&BdmValue::Array(vec![BdmValue::Int(2), BdmValue::Int(9)])).unwrap();
    assert!(!arr.deep_contains(&not_subset).unwrap());
}

#[test]
fn numeric_family_collapses_under_ordering() {
    let int = Bdm::build(&BdmValue::Int(1)).unwrap();
    let float = Bdm::build(&BdmValue::Float(1.0)).unwrap();
    assert_eq!(int.compare(&float).unwrap(), Ordering::Equal);

    let nan = Bdm::build(&BdmValue::Float(f64::NAN)).unwrap();
    let inf = Bdm::build(&BdmValue::Float(f64::INFINITY)).unwrap();
    assert_eq!(nan.compare(&inf).unwrap(), Ordering::Greater);
    assert_eq!(nan.compare(&nan).unwrap(), Ordering::Equal);
}
