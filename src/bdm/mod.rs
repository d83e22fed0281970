//! Binary document model.
//!
//! A tagged, length-prefixed format for heterogeneous graph values:
//! scalars, ordered arrays, keyed objects, opaque binary containers, and
//! the graph entities themselves. One serialized [`Bdm`] blob backs
//! property bags, filter constraints, and the elements of a traversal.
//!
//! The layout follows a varlena-like convention: a 4-byte total length, a
//! container header packing `{count, is_array, is_object, is_scalar}`, one
//! packed 32-bit entry word per child, and a variable-length payload with
//! 4-byte alignment for numeric and extended payloads. Scalars are stored
//! uniformly by wrapping them in a one-element "raw scalar" array.

pub mod build;
pub mod compare;
pub mod container;
pub mod contains;
pub mod entry;
pub mod hash;
pub mod iter;
pub mod value;

use std::cmp::Ordering;

use crate::error::{GraphError, Result};
use crate::model::GraphId;

pub use container::{ContainerRef, EntityRef, Node, ScalarRef};
pub use entry::{ExtendedTag, OFFSET_STRIDE};
pub use iter::{BdmIterator, BdmToken, ValueToken};
pub use value::{BdmValue, EdgeValue, Interval, Temporal, VertexValue};

/// An owned, serialized document.
#[derive(Clone, Debug, PartialEq)]
pub struct Bdm {
    bytes: Vec<u8>,
}

impl Bdm {
    /// Serializes a value tree. Fails with
    /// [`GraphError::ContainerTooLarge`] when any container's payload would
    /// exceed the 28-bit entry length field.
    pub fn build(value: &BdmValue) -> Result<Self> {
        Ok(Bdm {
            bytes: build::build_blob(value)?,
        })
    }

    /// Adopts serialized bytes after validating framing and structure.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(GraphError::CorruptDocument("blob shorter than its headers"));
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[0..4]);
        if u32::from_le_bytes(len) as usize != bytes.len() {
            return Err(GraphError::CorruptDocument("blob length prefix mismatch"));
        }
        let doc = Bdm { bytes };
        doc.root()?.validate()?;
        Ok(doc)
    }

    /// An empty object document.
    pub fn empty_object() -> Self {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&entry::HEADER_IS_OBJECT.to_le_bytes());
        Bdm { bytes }
    }

    /// Serialized bytes, length prefix included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cursor over the root container.
    pub fn root(&self) -> Result<ContainerRef<'_>> {
        ContainerRef::new(&self.bytes[4..])
    }

    /// Decodes the whole document into an owned value, unwrapping a
    /// raw-scalar root back to its scalar.
    pub fn root_value(&self) -> Result<BdmValue> {
        let root = self.root()?;
        if root.is_array() && root.is_scalar() {
            root.scalar_at(0)?.to_owned_value()
        } else {
            root.to_value()
        }
    }

    /// Streams tokens over the document.
    pub fn iterate(&self, skip_nested: bool) -> Result<BdmIterator<'_>> {
        Ok(BdmIterator::new(self.root()?, skip_nested))
    }

    /// Looks up `key` in a root object by binary search.
    pub fn find_in_object(&self, key: &str) -> Result<Option<BdmValue>> {
        match self.root()?.find_in_object(key)? {
            Some(Node::Scalar(s)) => s.to_owned_value().map(Some),
            Some(Node::Array(c)) | Some(Node::Object(c)) => {
                Ok(Some(BdmValue::Binary(c.as_bytes().to_vec())))
            }
            None => Ok(None),
        }
    }

    /// Returns the `i`-th element of a root array.
    pub fn get_element(&self, i: usize) -> Result<Option<BdmValue>> {
        match self.root()?.array_element(i)? {
            Some(Node::Scalar(s)) => s.to_owned_value().map(Some),
            Some(Node::Array(c)) | Some(Node::Object(c)) => c.to_value().map(Some),
            None => Ok(None),
        }
    }

    /// Deep containment: does `self` contain `other`?
    pub fn deep_contains(&self, other: &Bdm) -> Result<bool> {
        contains::deep_contains(self.root()?, other.root()?)
    }

    /// Total cross-type ordering.
    pub fn compare(&self, other: &Bdm) -> Result<Ordering> {
        compare::compare_containers(self.root()?, other.root()?)
    }

    /// Seeded 64-bit hash.
    pub fn hash(&self, seed: u64) -> Result<u64> {
        hash::hash_container(self.root()?, seed)
    }

    /// Reads the entity id out of a serialized vertex or edge blob without
    /// decoding the rest of the document.
    pub fn entity_id_of(raw: &[u8]) -> Result<GraphId> {
        if raw.len() < 24 {
            return Err(GraphError::CorruptDocument("entity blob truncated"));
        }
        let root = ContainerRef::new(&raw[4..])?;
        if !(root.is_array() && root.is_scalar() && root.count() == 1) {
            return Err(GraphError::CorruptDocument("entity blob is not a scalar"));
        }
        match root.scalar_at(0)? {
            ScalarRef::Vertex(v) => Ok(v.id),
            ScalarRef::Edge(e) => Ok(e.id),
            other => Err(GraphError::InvalidTypeCast {
                from: other.type_name(),
                to: "vertex or edge",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, BdmValue)]) -> BdmValue {
        BdmValue::Object(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn scalar_roundtrip() {
        for v in [
            BdmValue::Null,
            BdmValue::Bool(true),
            BdmValue::Int(-42),
            BdmValue::Float(2.5),
            BdmValue::String("hello".into()),
        ] {
            let doc = Bdm::build(&v).unwrap();
            assert_eq!(doc.root_value().unwrap(), v);
        }
    }

    #[test]
    fn object_roundtrip_and_lookup() {
        let v = obj(&[
            ("a", BdmValue::Int(1)),
            (
                "b",
                BdmValue::Array(vec![BdmValue::Int(1), BdmValue::Int(2), BdmValue::Int(3)]),
            ),
        ]);
        let doc = Bdm::build(&v).unwrap();
        assert_eq!(doc.root_value().unwrap(), v);

        let found = doc.find_in_object("b").unwrap().unwrap();
        let nested = match found {
            BdmValue::Binary(bytes) => ContainerRef::new(&bytes).unwrap().to_value().unwrap(),
            other => panic!("expected binary, got {other:?}"),
        };
        assert_eq!(
            nested,
            BdmValue::Array(vec![BdmValue::Int(1), BdmValue::Int(2), BdmValue::Int(3)])
        );
        assert!(doc.find_in_object("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_keys_keep_last_writer() {
        let v = obj(&[("k", BdmValue::Int(1)), ("k", BdmValue::Int(2))]);
        let doc = Bdm::build(&v).unwrap();
        assert_eq!(doc.root_value().unwrap(), obj(&[("k", BdmValue::Int(2))]));
    }

    #[test]
    fn keys_sorted_by_length_then_bytes() {
        let v = obj(&[
            ("ccc", BdmValue::Int(3)),
            ("b", BdmValue::Int(1)),
            ("aa", BdmValue::Int(2)),
        ]);
        let doc = Bdm::build(&v).unwrap();
        let decoded = doc.root_value().unwrap();
        match decoded {
            BdmValue::Object(pairs) => {
                let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["b", "aa", "ccc"]);
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn get_element_walks_offsets() {
        // enough elements to cross an offset stride boundary
        let elems: Vec<BdmValue> = (0..100).map(BdmValue::Int).collect();
        let doc = Bdm::build(&BdmValue::Array(elems)).unwrap();
        assert_eq!(doc.get_element(0).unwrap(), Some(BdmValue::Int(0)));
        assert_eq!(doc.get_element(33).unwrap(), Some(BdmValue::Int(33)));
        assert_eq!(doc.get_element(99).unwrap(), Some(BdmValue::Int(99)));
        assert_eq!(doc.get_element(100).unwrap(), None);
    }

    #[test]
    fn containment_laws() {
        let x = obj(&[
            ("a", BdmValue::Int(1)),
            ("b", obj(&[("c", BdmValue::Int(2))])),
        ]);
        let doc = Bdm::build(&x).unwrap();
        assert!(doc.deep_contains(&doc).unwrap());
        assert!(doc
            .deep_contains(&Bdm::build(&BdmValue::empty_object()).unwrap())
            .unwrap());
        assert!(doc
            .deep_contains(&Bdm::build(&obj(&[("a", BdmValue::Int(1))])).unwrap())
            .unwrap());
        assert!(doc
            .deep_contains(&Bdm::build(&obj(&[("b", obj(&[("c", BdmValue::Int(2))]))])).unwrap())
            .unwrap());
        assert!(!doc
            .deep_contains(&Bdm::build(&obj(&[("a", BdmValue::Int(2))])).unwrap())
            .unwrap());
    }

    #[test]
    fn array_containment_is_unordered_subset() {
        let arr = Bdm::build(&BdmValue::Array(vec![
            BdmValue::Int(1),
            BdmValue::Int(2),
            BdmValue::Int(3),
        ]))
        .unwrap();
        let sub = Bdm::build(&BdmValue::Array(vec![BdmValue::Int(3), BdmValue::Int(2)])).unwrap();
        assert!(arr.deep_contains(&sub).unwrap());

        // a raw scalar cannot contain a proper array
        let scalar = Bdm::build(&BdmValue::Int(1)).unwrap();
        let single = Bdm::build(&BdmValue::Array(vec![BdmValue::Int(1)])).unwrap();
        assert!(!scalar.deep_contains(&single).unwrap());
        assert!(scalar
            .deep_contains(&Bdm::build(&BdmValue::Int(1)).unwrap())
            .unwrap());
    }

    #[test]
    fn cross_type_ordering() {
        let one = Bdm::build(&BdmValue::Int(1)).unwrap();
        let one_f = Bdm::build(&BdmValue::Float(1.0)).unwrap();
        assert_eq!(one.compare(&one_f).unwrap(), Ordering::Equal);

        let nan = Bdm::build(&BdmValue::Float(f64::NAN)).unwrap();
        let inf = Bdm::build(&BdmValue::Float(f64::INFINITY)).unwrap();
        assert_eq!(nan.compare(&inf).unwrap(), Ordering::Greater);
        assert_eq!(nan.compare(&nan).unwrap(), Ordering::Equal);

        // object < array < string < bool < numeric < ... < null
        let o = Bdm::build(&BdmValue::empty_object()).unwrap();
        let a = Bdm::build(&BdmValue::Array(vec![])).unwrap();
        let s = Bdm::build(&BdmValue::String("x".into())).unwrap();
        let b = Bdm::build(&BdmValue::Bool(false)).unwrap();
        let n = Bdm::build(&BdmValue::Null).unwrap();
        assert_eq!(o.compare(&a).unwrap(), Ordering::Less);
        assert_eq!(a.compare(&s).unwrap(), Ordering::Less);
        assert_eq!(s.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&one).unwrap(), Ordering::Less);
        assert_eq!(one.compare(&n).unwrap(), Ordering::Less);
    }

    #[test]
    fn hash_is_seed_sensitive_and_stable() {
        let v = obj(&[("a", BdmValue::Int(1))]);
        let doc = Bdm::build(&v).unwrap();
        assert_eq!(doc.hash(0).unwrap(), doc.hash(0).unwrap());
        assert_ne!(doc.hash(0).unwrap(), doc.hash(1).unwrap());
    }

    #[test]
    fn entity_id_extraction() {
        use crate::model::{GraphId, LabelId};
        let id = GraphId::new(LabelId(3), 7);
        let v = BdmValue::vertex(id, "person".into(), BdmValue::empty_object());
        let doc = Bdm::build(&v).unwrap();
        assert_eq!(Bdm::entity_id_of(doc.as_bytes()).unwrap(), id);
        assert_eq!(doc.root_value().unwrap(), v);
    }
}
