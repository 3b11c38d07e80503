//! A read-only navigation handle over node indices.

use std::iter::FusedIterator;

use crate::{
    node::NodeType,
    tree::{NodeId, Tree},
};

/// A thin view pairing a tree with one of its node ids.
///
/// `NodeRef` only navigates and reads; mutation stays on [`Tree`], keyed by
/// [`NodeId`]. Obtain one from [`Tree::rootref`] and follow children by key
/// or position:
///
/// ```
/// use ytree::{NodeType, Tree};
///
/// let mut tree = Tree::with_capacity(8, 0);
/// let root = tree.root_id();
/// tree.to_map(root, NodeType::empty());
/// let job = tree.append_child(root);
/// tree.to_keyseq(job, "steps", NodeType::empty());
/// let step = tree.append_child(job);
/// tree.to_val(step, "build", NodeType::empty());
///
/// let steps = tree.rootref().get(b"steps").unwrap();
/// assert!(steps.is_seq());
/// assert_eq!(steps.at(0).unwrap().val(), b"build");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'t, 's> {
    tree: &'t Tree<'s>,
    id:   NodeId,
}

impl<'t, 's> NodeRef<'t, 's> {
    #[inline]
    pub(crate) fn new(tree: &'t Tree<'s>, id: NodeId) -> Self {
        NodeRef { tree, id }
    }

    /// The id this handle wraps.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The tree this handle reads from.
    #[inline]
    pub fn tree(&self) -> &'t Tree<'s> {
        self.tree
    }

    /// The child with key `name`, for maps.
    pub fn get(&self, name: &[u8]) -> Option<NodeRef<'t, 's>> {
        self.tree
            .find_child(self.id, name)
            .map(|id| NodeRef::new(self.tree, id))
    }

    /// The child at ordinal `pos`.
    pub fn at(&self, pos: usize) -> Option<NodeRef<'t, 's>> {
        self.tree.child(self.id, pos).map(|id| NodeRef::new(self.tree, id))
    }

    /// The parent node, unless this is the root.
    pub fn parent(&self) -> Option<NodeRef<'t, 's>> {
        self.tree.parent(self.id).map(|id| NodeRef::new(self.tree, id))
    }

    /// The key bytes of this node.
    ///
    /// # Panics
    /// If the node has no key.
    #[inline]
    pub fn key(&self) -> &'t [u8] {
        self.tree.key(self.id)
    }

    /// The value bytes of this node.
    ///
    /// # Panics
    /// If the node has no value.
    #[inline]
    pub fn val(&self) -> &'t [u8] {
        self.tree.val(self.id)
    }

    /// The full type bitset of this node.
    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.tree.node_type(self.id)
    }

    /// Is this node a map?
    #[inline]
    pub fn is_map(&self) -> bool {
        self.tree.is_map(self.id)
    }

    /// Is this node a sequence?
    #[inline]
    pub fn is_seq(&self) -> bool {
        self.tree.is_seq(self.id)
    }

    /// Is this node an unkeyed scalar?
    #[inline]
    pub fn is_val(&self) -> bool {
        self.tree.is_val(self.id)
    }

    /// Is this node a keyed scalar?
    #[inline]
    pub fn is_keyval(&self) -> bool {
        self.tree.is_keyval(self.id)
    }

    /// Does this node have a key?
    #[inline]
    pub fn has_key(&self) -> bool {
        self.tree.has_key(self.id)
    }

    /// Does this node have a value?
    #[inline]
    pub fn has_val(&self) -> bool {
        self.tree.has_val(self.id)
    }

    /// Number of children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.tree.num_children(self.id)
    }

    /// Iterates over the children of this node in order.
    pub fn children(&self) -> Children<'t, 's> {
        Children {
            tree: self.tree,
            next: self.tree.first_child(self.id),
        }
    }
}

/// Iterator over the children of a node. Created by [`NodeRef::children`].
#[derive(Debug, Clone)]
pub struct Children<'t, 's> {
    tree: &'t Tree<'s>,
    next: Option<NodeId>,
}

impl<'t, 's> Iterator for Children<'t, 's> {
    type Item = NodeRef<'t, 's>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.tree.next_sibling(cur);
        Some(NodeRef::new(self.tree, cur))
    }
}

impl<'t, 's> FusedIterator for Children<'t, 's> {}
