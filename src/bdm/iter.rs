//! Cursor-style token iteration over serialized documents.

use crate::bdm::container::{ContainerRef, Node, ScalarRef};
use crate::error::Result;

/// A value position in the token stream: a decoded scalar, or a nested
/// container surfaced opaquely when the iterator is not recursing.
#[derive(Clone, Copy, Debug)]
pub enum ValueToken<'a> {
    /// A decoded scalar.
    Scalar(ScalarRef<'a>),
    /// An opaque nested container (`skip_nested` mode).
    Binary(ContainerRef<'a>),
}

/// Tokens produced while walking a document.
#[derive(Clone, Copy, Debug)]
pub enum BdmToken<'a> {
    /// An array is opening.
    BeginArray {
        /// Number of elements.
        count: usize,
        /// True when the array is a raw-scalar wrapper.
        raw_scalar: bool,
    },
    /// An object is opening.
    BeginObject {
        /// Number of pairs.
        count: usize,
    },
    /// An object key.
    Key(&'a str),
    /// An object pair value.
    Value(ValueToken<'a>),
    /// An array element.
    Element(ValueToken<'a>),
    /// The innermost open array closed.
    EndArray,
    /// The innermost open object closed.
    EndObject,
}

enum FrameState {
    ArrayStart,
    ArrayElem,
    ObjectStart,
    ObjectKey,
    ObjectValue,
}

struct Frame<'a> {
    container: ContainerRef<'a>,
    index: usize,
    state: FrameState,
}

impl<'a> Frame<'a> {
    fn open(container: ContainerRef<'a>) -> Self {
        let state = if container.is_object() {
            FrameState::ObjectStart
        } else {
            FrameState::ArrayStart
        };
        Frame {
            container,
            index: 0,
            state,
        }
    }
}

/// Streaming iterator over a serialized document.
///
/// With `skip_nested` unset the iterator recurses into nested containers,
/// so callers never see opaque [`ValueToken::Binary`] values; with it set,
/// nested containers are emitted in place as opaque values.
pub struct BdmIterator<'a> {
    stack: Vec<Frame<'a>>,
    skip_nested: bool,
}

impl<'a> BdmIterator<'a> {
    /// Starts iterating at a container root.
    pub fn new(root: ContainerRef<'a>, skip_nested: bool) -> Self {
        BdmIterator {
            stack: vec![Frame::open(root)],
            skip_nested,
        }
    }

    /// Produces the next token, or `None` once the document is exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Result<BdmToken<'a>>> {
        loop {
            let skip_nested = self.skip_nested;
            let frame = self.stack.last_mut()?;
            match frame.state {
                FrameState::ArrayStart => {
                    let token = BdmToken::BeginArray {
                        count: frame.container.count(),
                        raw_scalar: frame.container.is_scalar(),
                    };
                    frame.state = FrameState::ArrayElem;
                    return Some(Ok(token));
                }
                FrameState::ArrayElem => {
                    if frame.index >= frame.container.count() {
                        self.stack.pop();
                        return Some(Ok(BdmToken::EndArray));
                    }
                    let node = match frame.container.node_at(frame.index) {
                        Ok(node) => node,
                        Err(e) => return Some(Err(e)),
                    };
                    frame.index += 1;
                    match node {
                        Node::Scalar(s) => {
                            return Some(Ok(BdmToken::Element(ValueToken::Scalar(s))))
                        }
                        Node::Array(c) | Node::Object(c) if skip_nested => {
                            return Some(Ok(BdmToken::Element(ValueToken::Binary(c))))
                        }
                        Node::Array(c) | Node::Object(c) => {
                            self.stack.push(Frame::open(c));
                        }
                    }
                }
                FrameState::ObjectStart => {
                    let token = BdmToken::BeginObject {
                        count: frame.container.count(),
                    };
                    frame.state = FrameState::ObjectKey;
                    return Some(Ok(token));
                }
                FrameState::ObjectKey => {
                    if frame.index >= frame.container.count() {
                        self.stack.pop();
                        return Some(Ok(BdmToken::EndObject));
                    }
                    let key = match frame.container.object_key(frame.index) {
                        Ok(key) => key,
                        Err(e) => return Some(Err(e)),
                    };
                    frame.state = FrameState::ObjectValue;
                    return Some(Ok(BdmToken::Key(key)));
                }
                FrameState::ObjectValue => {
                    let node = match frame.container.object_value(frame.index) {
                        Ok(node) => node,
                        Err(e) => return Some(Err(e)),
                    };
                    frame.index += 1;
                    frame.state = FrameState::ObjectKey;
                    match node {
                        Node::Scalar(s) => return Some(Ok(BdmToken::Value(ValueToken::Scalar(s)))),
                        Node::Array(c) | Node::Object(c) if skip_nested => {
                            return Some(Ok(BdmToken::Value(ValueToken::Binary(c))))
                        }
                        Node::Array(c) | Node::Object(c) => {
                            self.stack.push(Frame::open(c));
                        }
                    }
                }
            }
        }
    }
}
