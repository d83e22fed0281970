//! Deep containment: top-down unordered subtree isomorphism.

use crate::bdm::compare::scalars_equal;
use crate::bdm::container::{ContainerRef, Node, ScalarRef};
use crate::error::Result;

/// Does `lhs` contain `rhs`?
///
/// For objects, every rhs pair must find a matching key on the left whose
/// value is equal (scalars) or recursively contained (containers). For
/// arrays, every rhs element must be matched by some left element, order
/// not considered. A raw-scalar left cannot contain a proper array right.
pub fn deep_contains(lhs: ContainerRef<'_>, rhs: ContainerRef<'_>) -> Result<bool> {
    if lhs.is_object() != rhs.is_object() {
        return Ok(false);
    }

    if lhs.is_object() {
        contains_object(lhs, rhs)
    } else {
        // raw scalars may contain raw scalars and arrays may contain either,
        // but a raw scalar never contains a proper array
        if lhs.is_scalar() && !rhs.is_scalar() {
            return Ok(false);
        }
        contains_array(lhs, rhs)
    }
}

fn contains_object(lhs: ContainerRef<'_>, rhs: ContainerRef<'_>) -> Result<bool> {
    // keys are unique, so fewer lhs pairs than rhs pairs can never match
    if lhs.count() < rhs.count() {
        return Ok(false);
    }

    for i in 0..rhs.count() {
        let key = rhs.object_key(i)?;
        let rhs_val = rhs.object_value(i)?;
        let lhs_val = match lhs.find_in_object(key)? {
            Some(node) => node,
            None => return Ok(false),
        };

        match (&lhs_val, &rhs_val) {
            (Node::Scalar(l), Node::Scalar(r)) => {
                if !scalars_equal(l, r) {
                    return Ok(false);
                }
            }
            (Node::Array(l), Node::Array(r)) | (Node::Object(l), Node::Object(r)) => {
                if !deep_contains(*l, *r)? {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
    }

    Ok(true)
}

fn contains_array(lhs: ContainerRef<'_>, rhs: ContainerRef<'_>) -> Result<bool> {
    // lhs container elements, collected lazily on the first container rhs
    // element; the nested check is O(n*m) by design
    let mut lhs_containers: Option<Vec<ContainerRef<'_>>> = None;

    for i in 0..rhs.count() {
        match rhs.node_at(i)? {
            Node::Scalar(r) => {
                if !find_scalar_element(lhs, &r)? {
                    return Ok(false);
                }
            }
            Node::Array(r) | Node::Object(r) => {
                if lhs_containers.is_none() {
                    let mut collected = Vec::new();
                    for j in 0..lhs.count() {
                        if let Node::Array(c) | Node::Object(c) = lhs.node_at(j)? {
                            collected.push(c);
                        }
                    }
                    lhs_containers = Some(collected);
                }
                let containers = lhs_containers.get_or_insert_with(Vec::new);
                if containers.is_empty() {
                    return Ok(false);
                }
                let mut matched = false;
                for l in containers {
                    if deep_contains(*l, r)? {
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    return Ok(false);
                }
            }
        }
    }

    Ok(true)
}

fn find_scalar_element(lhs: ContainerRef<'_>, key: &ScalarRef<'_>) -> Result<bool> {
    for i in 0..lhs.count() {
        if let Node::Scalar(candidate) = lhs.node_at(i)? {
            if scalars_equal(&candidate, key) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
