//! Node records and the node type bitset.
//!
//! A node's classification is a *bitset*, not an exclusive enum: a node can be
//! a map and carry a key at the same time (`KEYMAP`), have an anchor on its
//! key and a tag on its value, and so on. The low bits encode the node kind
//! (scalar, map, sequence, document, stream); the remaining bits are
//! orthogonal markers for keys, anchors, references, tags and quoting.

use bitflags::bitflags;

use crate::{arena::Span, tree::NodeId};

bitflags! {
    /// The type bitset attached to every node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeType: u32 {
        /// The node has a (possibly empty) scalar value.
        const VAL = 1 << 0;
        /// The node is a member of a map and carries a key.
        const KEY = 1 << 1;
        /// The node is a map, parent of keyed children.
        const MAP = 1 << 2;
        /// The node is a sequence, parent of unkeyed children.
        const SEQ = 1 << 3;
        /// The node is a document.
        const DOC = 1 << 4;
        /// The node is a stream: a sequence of documents.
        const STREAM = (1 << 5) | Self::SEQ.bits();
        /// The key is a reference (`*alias`) to an anchor.
        const KEYREF = 1 << 6;
        /// The value is a reference (`*alias`) to an anchor.
        const VALREF = 1 << 7;
        /// The key carries an anchor (`&name`).
        const KEYANCH = 1 << 8;
        /// The value carries an anchor (`&name`).
        const VALANCH = 1 << 9;
        /// The key carries an explicit tag.
        const KEYTAG = 1 << 10;
        /// The value carries an explicit tag.
        const VALTAG = 1 << 11;
        /// The key was quoted in the source.
        const KEYQUO = 1 << 12;
        /// The value was quoted in the source.
        const VALQUO = 1 << 13;

        /// A leaf map member: key and value on one node.
        const KEYVAL = Self::KEY.bits() | Self::VAL.bits();
        /// A map that is itself a keyed member of a map.
        const KEYMAP = Self::KEY.bits() | Self::MAP.bits();
        /// A sequence that is itself a keyed member of a map.
        const KEYSEQ = Self::KEY.bits() | Self::SEQ.bits();
        /// A document whose content is a map.
        const DOCMAP = Self::DOC.bits() | Self::MAP.bits();
        /// A document whose content is a sequence.
        const DOCSEQ = Self::DOC.bits() | Self::SEQ.bits();
    }
}

impl NodeType {
    /// The low bits that encode the node kind.
    const KIND_MASK: NodeType = NodeType::from_bits_retain(
        Self::VAL.bits() | Self::KEY.bits() | Self::MAP.bits() | Self::SEQ.bits() | Self::DOC.bits() | Self::STREAM.bits(),
    );

    /// The kind part of the bitset, with all markers masked off.
    #[inline]
    pub fn kind(self) -> NodeType {
        self & Self::KIND_MASK
    }

    /// Does this node carry a key?
    #[inline]
    pub fn has_key(self) -> bool {
        self.contains(Self::KEY)
    }

    /// Does this node carry a scalar value?
    #[inline]
    pub fn has_val(self) -> bool {
        self.contains(Self::VAL)
    }

    /// Is this node an unkeyed scalar value?
    #[inline]
    pub fn is_val(self) -> bool {
        self.kind() & Self::KEYVAL == Self::VAL
    }

    /// Is this node a scalar value with a key?
    #[inline]
    pub fn is_keyval(self) -> bool {
        self.contains(Self::KEYVAL)
    }

    /// Is this node a map?
    #[inline]
    pub fn is_map(self) -> bool {
        self.contains(Self::MAP)
    }

    /// Is this node a sequence?
    #[inline]
    pub fn is_seq(self) -> bool {
        self.contains(Self::SEQ)
    }

    /// Is this node a document?
    #[inline]
    pub fn is_doc(self) -> bool {
        self.contains(Self::DOC)
    }

    /// Is this node a stream of documents?
    #[inline]
    pub fn is_stream(self) -> bool {
        self.contains(Self::STREAM)
    }

    /// Can this node have children?
    #[inline]
    pub fn is_container(self) -> bool {
        self.intersects(Self::MAP | Self::SEQ | Self::STREAM | Self::DOC)
    }

    /// Is the key of this node a reference to an anchor?
    #[inline]
    pub fn is_key_ref(self) -> bool {
        self.contains(Self::KEYREF)
    }

    /// Is the value of this node a reference to an anchor?
    #[inline]
    pub fn is_val_ref(self) -> bool {
        self.contains(Self::VALREF)
    }

    /// Is either side of this node a reference to an anchor?
    #[inline]
    pub fn is_ref(self) -> bool {
        self.intersects(Self::KEYREF | Self::VALREF)
    }

    /// Does the key of this node carry an anchor?
    #[inline]
    pub fn has_key_anchor(self) -> bool {
        self.contains(Self::KEYANCH)
    }

    /// Does the value of this node carry an anchor?
    #[inline]
    pub fn has_val_anchor(self) -> bool {
        self.contains(Self::VALANCH)
    }

    /// The ASCII label of the kind encoded in the low bits.
    pub fn type_str(self) -> &'static str {
        let kind = self.kind();
        if kind == Self::KEYVAL {
            "KEYVAL"
        } else if kind == Self::KEYMAP {
            "KEYMAP"
        } else if kind == Self::KEYSEQ {
            "KEYSEQ"
        } else if kind == Self::DOCMAP {
            "DOCMAP"
        } else if kind == Self::DOCSEQ {
            "DOCSEQ"
        } else if kind == Self::STREAM {
            "STREAM"
        } else if kind == Self::MAP {
            "MAP"
        } else if kind == Self::SEQ {
            "SEQ"
        } else if kind == Self::VAL {
            "VAL"
        } else if kind == Self::DOC {
            "DOC"
        } else if kind.is_empty() {
            "NOTYPE"
        } else if self.is_ref() {
            "REF"
        } else {
            "(unknown?)"
        }
    }
}

/// The payload of one side of a node: the scalar itself plus its tag and
/// anchor, if any. A node has one of these for its key and one for its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeScalar<'s> {
    /// The scalar bytes.
    pub scalar: Span<'s>,
    /// The explicit tag, if any.
    pub tag:    Span<'s>,
    /// The anchor name (without the leading `&`), if any.
    pub anchor: Span<'s>,
}

impl<'s> NodeScalar<'s> {
    /// A scalar with no tag and no anchor.
    #[inline]
    pub fn new(scalar: Span<'s>) -> Self {
        NodeScalar {
            scalar,
            tag: Span::empty(),
            anchor: Span::empty(),
        }
    }

    /// Resets all three spans to empty.
    #[inline]
    pub fn clear(&mut self) {
        *self = NodeScalar::default();
    }
}

impl<'s> From<Span<'s>> for NodeScalar<'s> {
    #[inline]
    fn from(scalar: Span<'s>) -> Self {
        NodeScalar::new(scalar)
    }
}

/// One slot of the node arena.
///
/// Live nodes thread `prev_sibling`/`next_sibling` through their parent's
/// child list; free slots thread the same two fields through the tree's free
/// list and have no parent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeData<'s> {
    pub(crate) ty:           NodeType,
    pub(crate) key:          NodeScalar<'s>,
    pub(crate) val:          NodeScalar<'s>,
    pub(crate) parent:       Option<NodeId>,
    pub(crate) first_child:  Option<NodeId>,
    pub(crate) last_child:   Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
}

impl<'s> NodeData<'s> {
    /// A fully zeroed slot: no type, empty payload, no links.
    pub(crate) fn cleared() -> Self {
        NodeData {
            ty:           NodeType::empty(),
            key:          NodeScalar::default(),
            val:          NodeScalar::default(),
            parent:       None,
            first_child:  None,
            last_child:   None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}
