//! The node arena and the tree built on top of it.
//!
//! Nodes live in one flat buffer and refer to each other by index: parent,
//! first/last child, and a doubly-linked sibling list. Unused slots are
//! threaded into a free list through the same sibling fields, so the buffer
//! is always partitioned into the live set (reachable from the root) and the
//! free list. All structural edits go through a small set of primitives that
//! keep that partition and the sibling links intact.

use std::{fmt, iter::FusedIterator, num::NonZeroU32};

use log::trace;

use crate::{
    arena::{Span, StringArena},
    node::{NodeData, NodeScalar, NodeType},
    noderef::NodeRef,
};

/// Minimum node capacity claimed when an empty tree grows.
const MIN_NODE_CAPACITY: usize = 16;

/// Index of a node in a [`Tree`].
///
/// Ids are stable across every operation except [`reorder`](Tree::reorder)
/// and [`swap`](Tree::swap), which relocate node records by design. An id is
/// only meaningful for the tree that issued it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index + 1).expect("node arena exceeds u32 indices");
        NodeId(NonZeroU32::new(raw).expect("index + 1 is nonzero"))
    }

    /// The slot this id names in the node buffer.
    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.index())
    }
}

/// An arena-allocated document tree for YAML-shaped data.
///
/// The tree stores every node in one growable buffer and every tree-owned
/// scalar byte in one growable string arena. The lifetime parameter `'s` is
/// the lifetime of externally-owned scalar storage — typically the source
/// buffer a parser read from — which nodes may borrow zero-copy via
/// [`Span::Source`].
///
/// A tree always has a root node at index 0 once node storage exists; the
/// root is claimed implicitly by the first reservation (or growth) and again
/// by [`clear`](Tree::clear).
///
/// # Examples
/// ```
/// use ytree::{NodeType, Tree};
///
/// let mut tree = Tree::with_capacity(8, 0);
/// let root = tree.root_id();
/// tree.to_map(root, NodeType::empty());
///
/// let child = tree.append_child(root);
/// tree.to_keyval(child, "retries", "3", NodeType::empty());
///
/// assert_eq!(tree.find_child(root, b"retries"), Some(child));
/// assert_eq!(tree.val(child), b"3");
/// ```
#[derive(Debug, Clone)]
pub struct Tree<'s> {
    nodes:     Vec<NodeData<'s>>,
    size:      usize,
    free_head: Option<NodeId>,
    free_tail: Option<NodeId>,
    arena:     StringArena,
}

impl<'s> Default for Tree<'s> {
    fn default() -> Self {
        Self::new()
    }
}

/// Substitute `a` for `b` (and vice versa) in an optional link.
#[inline]
fn swap_id(link: Option<NodeId>, a: NodeId, b: NodeId) -> Option<NodeId> {
    if link == Some(a) {
        Some(b)
    } else if link == Some(b) {
        Some(a)
    } else {
        link
    }
}

// ----- construction and capacity

impl<'s> Tree<'s> {
    /// Creates an empty tree. No allocation happens until the first
    /// reservation or claim, and the root does not exist yet.
    pub fn new() -> Self {
        Tree {
            nodes:     Vec::new(),
            size:      0,
            free_head: None,
            free_tail: None,
            arena:     StringArena::new(),
        }
    }

    /// Creates a tree with room for `node_cap` nodes and `arena_cap` arena
    /// bytes. The root is claimed immediately.
    pub fn with_capacity(node_cap: usize, arena_cap: usize) -> Self {
        let mut tree = Self::new();
        tree.reserve(node_cap, arena_cap);
        tree
    }

    /// Grows node storage and the string arena to the given capacities.
    /// Either capacity may be zero or below the current one, in which case
    /// that side is left alone; shrinking is not supported.
    pub fn reserve(&mut self, node_cap: usize, arena_cap: usize) {
        self.reserve_nodes(node_cap);
        self.arena.reserve(arena_cap);
    }

    fn reserve_nodes(&mut self, node_cap: usize) {
        if node_cap <= self.nodes.len() {
            return;
        }
        let first = self.nodes.len();
        trace!("growing node arena from {} to {} slots", first, node_cap);
        self.nodes.resize(node_cap, NodeData::cleared());
        self.clear_range(first, node_cap - first);
        // splice the new slots onto the free-list tail
        let first_new = NodeId::from_index(first);
        match self.free_tail {
            Some(tail) => {
                self.nodes[tail.index()].next_sibling = Some(first_new);
                self.nodes[first].prev_sibling = Some(tail);
            }
            None => {
                debug_assert!(self.free_head.is_none());
                self.free_head = Some(first_new);
            }
        }
        self.free_tail = Some(NodeId::from_index(node_cap - 1));
        if self.size == 0 {
            self.claim_root();
        }
    }

    /// Clears `num` slots starting at `first` and chains them sequentially
    /// through their sibling links. The chain is left detached at both ends.
    fn clear_range(&mut self, first: usize, num: usize) {
        if num == 0 {
            return;
        }
        let end = first + num;
        debug_assert!(end <= self.nodes.len());
        for i in first..end {
            let node = &mut self.nodes[i];
            *node = NodeData::cleared();
            node.prev_sibling = (i > first).then(|| NodeId::from_index(i - 1));
            node.next_sibling = (i + 1 < end).then(|| NodeId::from_index(i + 1));
        }
    }

    /// Releases every node and re-claims the root. Node and arena capacity
    /// are kept; the string arena contents are kept too (use
    /// [`clear_arena`](Tree::clear_arena) to drop them).
    pub fn clear(&mut self) {
        let cap = self.nodes.len();
        self.clear_range(0, cap);
        self.size = 0;
        if cap == 0 {
            self.free_head = None;
            self.free_tail = None;
        } else {
            // the free list is sequential after clearing, so the claim below
            // lands the root back on index 0
            self.free_head = Some(NodeId::from_index(0));
            self.free_tail = Some(NodeId::from_index(cap - 1));
            self.claim_root();
        }
    }

    /// Forgets all tree-owned scalar bytes. Only safe to call when no node
    /// holds an arena span, e.g. right after [`clear`](Tree::clear).
    pub fn clear_arena(&mut self) {
        self.arena.clear();
    }

    /// Total number of node slots, live and free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live nodes, the root included.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Does this tree have no live nodes at all (not even a root)?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of bytes appended to the string arena.
    #[inline]
    pub fn arena_size(&self) -> usize {
        self.arena.pos()
    }

    /// Capacity of the string arena in bytes.
    #[inline]
    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Copies `bytes` into the tree's string arena and returns a span that
    /// names them. The span stays valid for the life of the tree (growth
    /// preserves arena contents; offsets do not move).
    pub fn copy_to_arena(&mut self, bytes: &[u8]) -> Span<'s> {
        Span::Arena(self.arena.append(bytes))
    }

    /// Does `span` point into this tree's string arena?
    #[inline]
    pub fn in_arena(&self, span: &Span<'_>) -> bool {
        self.arena.contains(span)
    }

    /// The bytes a span refers to, resolving arena spans against this tree's
    /// arena.
    #[inline]
    pub fn span_bytes(&self, span: Span<'s>) -> &[u8] {
        match span {
            Span::Source(bytes) => bytes,
            Span::Arena(range) => self.arena.get(range),
        }
    }
}

// ----- node access and queries

impl<'s> Tree<'s> {
    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &NodeData<'s> {
        &self.nodes[id.index()]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut NodeData<'s> {
        &mut self.nodes[id.index()]
    }

    /// The id of the root node.
    ///
    /// # Panics
    /// If the tree has no storage yet (freshly [`new`](Tree::new), never
    /// reserved or claimed).
    #[inline]
    pub fn root_id(&self) -> NodeId {
        assert!(self.size > 0, "the tree has no root yet");
        NodeId::from_index(0)
    }

    /// A navigation handle on the root. See [`NodeRef`].
    #[inline]
    pub fn rootref(&self) -> NodeRef<'_, 's> {
        NodeRef::new(self, self.root_id())
    }

    /// The parent of `node`, or `None` for the root.
    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    /// The first child of `node`.
    #[inline]
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).first_child
    }

    /// The last child of `node`.
    #[inline]
    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).last_child
    }

    /// The sibling before `node` in its parent's child list.
    #[inline]
    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).prev_sibling
    }

    /// The sibling after `node` in its parent's child list.
    #[inline]
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).next_sibling
    }

    /// The first sibling of `node` (its parent's first child), or `node`
    /// itself for the root.
    pub fn first_sibling(&self, node: NodeId) -> NodeId {
        match self.parent(node) {
            Some(p) => self.first_child(p).expect("a parent of a live node has children"),
            None => node,
        }
    }

    /// The last sibling of `node` (its parent's last child), or `node`
    /// itself for the root.
    pub fn last_sibling(&self, node: NodeId) -> NodeId {
        match self.parent(node) {
            Some(p) => self.last_child(p).expect("a parent of a live node has children"),
            None => node,
        }
    }

    /// Number of children of `node`. Counts by walking the child list.
    pub fn num_children(&self, node: NodeId) -> usize {
        if self.node(node).ty.has_val() {
            return 0;
        }
        let mut count = 0;
        let mut child = self.first_child(node);
        while let Some(c) = child {
            count += 1;
            child = self.next_sibling(c);
        }
        count
    }

    /// The child of `node` at ordinal `pos`, if there is one.
    pub fn child(&self, node: NodeId, pos: usize) -> Option<NodeId> {
        if self.node(node).ty.has_val() {
            return None;
        }
        let mut count = 0;
        let mut child = self.first_child(node);
        while let Some(c) = child {
            if count == pos {
                return Some(c);
            }
            count += 1;
            child = self.next_sibling(c);
        }
        None
    }

    /// The ordinal position of `ch` among the children of `node`.
    pub fn child_pos(&self, node: NodeId, ch: NodeId) -> Option<usize> {
        let mut count = 0;
        let mut child = self.first_child(node);
        while let Some(c) = child {
            if c == ch {
                return Some(count);
            }
            count += 1;
            child = self.next_sibling(c);
        }
        None
    }

    /// The child of map `node` whose key is `name`.
    pub fn find_child(&self, node: NodeId, name: &[u8]) -> Option<NodeId> {
        if self.node(node).ty.has_val() {
            return None;
        }
        debug_assert!(self.is_map(node));
        debug_assert!(!name.is_empty());
        let mut child = self.first_child(node);
        while let Some(c) = child {
            let data = self.node(c);
            if data.ty.has_key() && self.span_bytes(data.key.scalar) == name {
                return Some(c);
            }
            child = self.next_sibling(c);
        }
        None
    }

    /// Is `ch` a direct child of `node`?
    #[inline]
    pub fn has_child(&self, node: NodeId, ch: NodeId) -> bool {
        self.child_pos(node, ch).is_some()
    }

    /// Does `node` have any children?
    #[inline]
    pub fn has_children(&self, node: NodeId) -> bool {
        self.node(node).first_child.is_some()
    }

    /// Do `node` and `sib` share a parent?
    #[inline]
    pub fn has_sibling(&self, node: NodeId, sib: NodeId) -> bool {
        let parent = self.parent(node);
        parent.is_some() && parent == self.parent(sib)
    }

    /// Does `node` have siblings other than itself?
    pub fn has_siblings(&self, node: NodeId) -> bool {
        match self.parent(node) {
            Some(p) => self.first_child(p) != self.last_child(p),
            None => false,
        }
    }

    /// Is `node` the root?
    #[inline]
    pub fn is_root(&self, node: NodeId) -> bool {
        self.node(node).parent.is_none()
    }

    /// The full type bitset of `node`.
    #[inline]
    pub fn node_type(&self, node: NodeId) -> NodeType {
        self.node(node).ty
    }

    /// The kind of `node`: its type bitset with all markers masked off.
    #[inline]
    pub fn kind(&self, node: NodeId) -> NodeType {
        self.node(node).ty.kind()
    }

    /// The ASCII label of `node`'s kind.
    #[inline]
    pub fn type_str(&self, node: NodeId) -> &'static str {
        self.node(node).ty.type_str()
    }

    /// Is `node` a map?
    #[inline]
    pub fn is_map(&self, node: NodeId) -> bool {
        self.node(node).ty.is_map()
    }

    /// Is `node` a sequence?
    #[inline]
    pub fn is_seq(&self, node: NodeId) -> bool {
        self.node(node).ty.is_seq()
    }

    /// Is `node` an unkeyed scalar?
    #[inline]
    pub fn is_val(&self, node: NodeId) -> bool {
        self.node(node).ty.is_val()
    }

    /// Is `node` a keyed scalar?
    #[inline]
    pub fn is_keyval(&self, node: NodeId) -> bool {
        self.node(node).ty.is_keyval()
    }

    /// Can `node` have children?
    #[inline]
    pub fn is_container(&self, node: NodeId) -> bool {
        self.node(node).ty.is_container()
    }

    /// Is `node` a document?
    #[inline]
    pub fn is_doc(&self, node: NodeId) -> bool {
        self.node(node).ty.is_doc()
    }

    /// Is `node` a stream of documents?
    #[inline]
    pub fn is_stream(&self, node: NodeId) -> bool {
        self.node(node).ty.is_stream()
    }

    /// Does `node` carry a key?
    #[inline]
    pub fn has_key(&self, node: NodeId) -> bool {
        self.node(node).ty.has_key()
    }

    /// Does `node` carry a scalar value?
    #[inline]
    pub fn has_val(&self, node: NodeId) -> bool {
        self.node(node).ty.has_val()
    }

    /// Is the key of `node` an alias?
    #[inline]
    pub fn is_key_ref(&self, node: NodeId) -> bool {
        self.node(node).ty.is_key_ref()
    }

    /// Is the value of `node` an alias?
    #[inline]
    pub fn is_val_ref(&self, node: NodeId) -> bool {
        self.node(node).ty.is_val_ref()
    }

    /// Is either side of `node` an alias?
    #[inline]
    pub fn is_ref(&self, node: NodeId) -> bool {
        self.node(node).ty.is_ref()
    }

    /// Does the key of `node` carry an anchor?
    #[inline]
    pub fn has_key_anchor(&self, node: NodeId) -> bool {
        self.node(node).ty.has_key_anchor()
    }

    /// Does the value of `node` carry an anchor?
    #[inline]
    pub fn has_val_anchor(&self, node: NodeId) -> bool {
        self.node(node).ty.has_val_anchor()
    }

    /// Does `node` define an anchor named `name` on either its key or its
    /// value?
    pub fn has_anchor(&self, node: NodeId, name: &[u8]) -> bool {
        let data = self.node(node);
        (data.ty.has_key_anchor() && self.span_bytes(data.key.anchor) == name)
            || (data.ty.has_val_anchor() && self.span_bytes(data.val.anchor) == name)
    }

    /// The key bytes of `node`.
    ///
    /// # Panics
    /// If `node` has no key.
    #[inline]
    pub fn key(&self, node: NodeId) -> &[u8] {
        assert!(self.has_key(node), "node has no key");
        self.span_bytes(self.node(node).key.scalar)
    }

    /// The value bytes of `node`.
    ///
    /// # Panics
    /// If `node` has no value.
    #[inline]
    pub fn val(&self, node: NodeId) -> &[u8] {
        assert!(self.has_val(node), "node has no value");
        self.span_bytes(self.node(node).val.scalar)
    }

    /// The tag on the key of `node`, or empty.
    #[inline]
    pub fn key_tag(&self, node: NodeId) -> &[u8] {
        self.span_bytes(self.node(node).key.tag)
    }

    /// The tag on the value of `node`, or empty.
    #[inline]
    pub fn val_tag(&self, node: NodeId) -> &[u8] {
        self.span_bytes(self.node(node).val.tag)
    }

    /// The anchor name on the key of `node`, or empty.
    #[inline]
    pub fn key_anchor(&self, node: NodeId) -> &[u8] {
        self.span_bytes(self.node(node).key.anchor)
    }

    /// The anchor name on the value of `node`, or empty.
    #[inline]
    pub fn val_anchor(&self, node: NodeId) -> &[u8] {
        self.span_bytes(self.node(node).val.anchor)
    }

    fn parent_is_map(&self, node: NodeId) -> bool {
        match self.parent(node) {
            Some(p) => self.is_map(p),
            None => false,
        }
    }
}

// ----- lifecycle: claim and release

impl<'s> Tree<'s> {
    /// Takes a slot off the free list, growing node storage (doubling, with
    /// a floor of 16) when none is free. The returned slot is fully zeroed:
    /// no type, empty payload, no links. It is *not* part of the hierarchy
    /// until linked with [`set_hierarchy`](Tree::set_hierarchy) or one of
    /// the insertion helpers.
    pub fn claim(&mut self) -> NodeId {
        if self.free_head.is_none() {
            let cap = self.nodes.len();
            let target = if cap == 0 { MIN_NODE_CAPACITY } else { 2 * cap };
            self.reserve_nodes(target);
        }
        let id = self.free_head.expect("the free list is non-empty after growth");
        debug_assert!(self.size < self.nodes.len());
        self.free_head = self.node(id).next_sibling;
        match self.free_head {
            Some(head) => self.node_mut(head).prev_sibling = None,
            None => self.free_tail = None,
        }
        self.size += 1;
        *self.node_mut(id) = NodeData::cleared();
        id
    }

    fn claim_root(&mut self) {
        let root = self.claim();
        assert_eq!(root.index(), 0, "the root must land on index 0");
        self.set_hierarchy(root, None, None);
    }

    /// Unlinks `node` from the hierarchy, clears it, and prepends it to the
    /// free list. The caller must have released all descendants first; use
    /// [`remove`](Tree::remove) to release a whole subtree.
    pub fn release(&mut self, node: NodeId) {
        debug_assert!(
            self.node(node).first_child.is_none(),
            "released a node that still has children"
        );
        self.rem_hierarchy(node);
        self.free_list_add(node);
        self.clear_slot(node);
        self.size -= 1;
    }

    /// Releases the subtree rooted at `node`, children first.
    pub fn remove(&mut self, node: NodeId) {
        self.remove_children(node);
        self.release(node);
    }

    /// Releases all descendants of `node`, leaving `node` itself in place.
    pub fn remove_children(&mut self, node: NodeId) {
        let mut child = self.first_child(node);
        while let Some(c) = child {
            let next = self.next_sibling(c);
            self.remove_children(c);
            self.release(c);
            child = next;
        }
    }

    /// Clears type, payload and child pointers, leaving the parent and
    /// sibling links alone (they may be threading the free list).
    fn clear_slot(&mut self, node: NodeId) {
        let data = self.node_mut(node);
        data.ty = NodeType::empty();
        data.key.clear();
        data.val.clear();
        data.first_child = None;
        data.last_child = None;
    }

    /// Prepends `node` to the free list. LIFO, so freshly released slots are
    /// reused first.
    fn free_list_add(&mut self, node: NodeId) {
        let head = self.free_head;
        {
            let data = self.node_mut(node);
            data.parent = None;
            data.prev_sibling = None;
            data.next_sibling = head;
        }
        if let Some(h) = head {
            self.node_mut(h).prev_sibling = Some(node);
        }
        self.free_head = Some(node);
        if self.free_tail.is_none() {
            self.free_tail = self.free_head;
        }
    }

    /// Unlinks a specific slot from the middle of the free list.
    fn free_list_rem(&mut self, node: NodeId) {
        let (prev, next) = {
            let data = self.node(node);
            (data.prev_sibling, data.next_sibling)
        };
        if self.free_head == Some(node) {
            self.free_head = next;
        }
        if self.free_tail == Some(node) {
            self.free_tail = prev;
        }
        if let Some(p) = prev {
            self.node_mut(p).next_sibling = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev_sibling = prev;
        }
    }
}

// ----- hierarchy primitives

impl<'s> Tree<'s> {
    /// Links `child` into `parent`'s child list directly after
    /// `prev_sibling`, or at the front when `prev_sibling` is `None`.
    /// `parent` may only be `None` for the root.
    ///
    /// # Panics
    /// If `parent` is `None` and `child` is not index 0.
    pub fn set_hierarchy(&mut self, child: NodeId, parent: Option<NodeId>, prev_sibling: Option<NodeId>) {
        {
            let data = self.node_mut(child);
            data.parent = parent;
            data.prev_sibling = None;
            data.next_sibling = None;
        }
        let Some(parent) = parent else {
            assert_eq!(child.index(), 0, "only the root may have no parent");
            assert!(prev_sibling.is_none());
            return;
        };

        let next_sibling = match prev_sibling {
            Some(p) => self.next_sibling(p),
            None => self.first_child(parent),
        };
        if let Some(psib) = prev_sibling {
            self.node_mut(psib).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(psib);
        }
        if let Some(nsib) = next_sibling {
            self.node_mut(nsib).prev_sibling = Some(child);
            self.node_mut(child).next_sibling = Some(nsib);
        }

        let (first, last) = {
            let p = self.node(parent);
            (p.first_child, p.last_child)
        };
        if first.is_none() {
            debug_assert!(last.is_none());
            let p = self.node_mut(parent);
            p.first_child = Some(child);
            p.last_child = Some(child);
        } else {
            let (child_next, child_prev) = {
                let c = self.node(child);
                (c.next_sibling, c.prev_sibling)
            };
            if child_next == first {
                self.node_mut(parent).first_child = Some(child);
            }
            if child_prev == last {
                self.node_mut(parent).last_child = Some(child);
            }
        }
    }

    /// Unlinks `node` from its parent and siblings. The node's own links are
    /// left stale; they are overwritten on the next
    /// [`set_hierarchy`](Tree::set_hierarchy) or free-list insertion.
    pub fn rem_hierarchy(&mut self, node: NodeId) {
        let (parent, prev, next) = {
            let data = self.node(node);
            (data.parent, data.prev_sibling, data.next_sibling)
        };
        if let Some(p) = parent {
            let pd = self.node_mut(p);
            if pd.first_child == Some(node) {
                pd.first_child = next;
            }
            if pd.last_child == Some(node) {
                pd.last_child = prev;
            }
        }
        if let Some(p) = prev {
            self.node_mut(p).next_sibling = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev_sibling = prev;
        }
    }

    /// Claims a new node and links it under `parent`, after `after` (or at
    /// the front when `after` is `None`).
    pub fn insert_child(&mut self, parent: NodeId, after: Option<NodeId>) -> NodeId {
        debug_assert!(after.map_or(true, |a| self.has_child(parent, a)));
        let child = self.claim();
        self.set_hierarchy(child, Some(parent), after);
        child
    }

    /// Claims a new node and links it as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId) -> NodeId {
        let after = self.last_child(parent);
        self.insert_child(parent, after)
    }
}

// ----- move and duplicate

impl<'s> Tree<'s> {
    /// Relinks `node` after `after` within the same parent.
    ///
    /// # Panics
    /// If `node` is the root, or `after` is not a sibling of `node`.
    pub fn move_after(&mut self, node: NodeId, after: Option<NodeId>) {
        assert!(!self.is_root(node));
        if let Some(a) = after {
            assert!(self.has_sibling(node, a), "`after` must be a sibling of `node`");
        }
        let parent = self.parent(node);
        self.rem_hierarchy(node);
        self.set_hierarchy(node, parent, after);
    }

    /// Relinks `node` under `new_parent`, after `after`.
    ///
    /// # Panics
    /// If `node` is the root. Moving a node into its own subtree is a
    /// contract violation and corrupts the hierarchy.
    pub fn move_to(&mut self, node: NodeId, new_parent: NodeId, after: Option<NodeId>) {
        assert!(!self.is_root(node));
        self.rem_hierarchy(node);
        self.set_hierarchy(node, Some(new_parent), after);
    }

    /// Moves a subtree from another tree into this one: duplicates it under
    /// `new_parent` after `after`, then removes it from `src`. Returns the
    /// duplicate's id in this tree.
    pub fn move_from(&mut self, src: &mut Tree<'s>, node: NodeId, new_parent: NodeId, after: Option<NodeId>) -> NodeId {
        let dup = self.duplicate_from(src, node, new_parent, after);
        src.remove(node);
        dup
    }

    /// Copies type, key and value from `src` onto `dst`. Spans are copied
    /// shallow; both slots live in this tree, so arena spans keep meaning.
    fn copy_props(&mut self, dst: NodeId, src: NodeId) {
        let s = *self.node(src);
        let d = self.node_mut(dst);
        d.ty = s.ty;
        d.key = s.key;
        d.val = s.val;
    }

    /// Copies type and value from `src` onto `dst`, preserving everything
    /// key-related on `dst` (its key scalar and key marker bits), so a keyed
    /// destination stays a valid map member.
    fn copy_props_wo_key(&mut self, dst: NodeId, src: NodeId) {
        const KEY_BITS: NodeType = NodeType::KEY
            .union(NodeType::KEYREF)
            .union(NodeType::KEYANCH)
            .union(NodeType::KEYTAG)
            .union(NodeType::KEYQUO);
        let s = *self.node(src);
        let d = self.node_mut(dst);
        d.ty = (s.ty - KEY_BITS) | (d.ty & KEY_BITS);
        d.val = s.val;
    }

    /// Imports a span from another tree, re-homing arena-resident bytes into
    /// this tree's arena. Source-borrowed spans are shared as-is.
    fn import_span(&mut self, src: &Tree<'s>, span: Span<'s>) -> Span<'s> {
        match span {
            Span::Source(_) => span,
            Span::Arena(range) => Span::Arena(self.arena.append(src.arena.get(range))),
        }
    }

    fn import_scalar(&mut self, src: &Tree<'s>, scalar: NodeScalar<'s>) -> NodeScalar<'s> {
        NodeScalar {
            scalar: self.import_span(src, scalar.scalar),
            tag:    self.import_span(src, scalar.tag),
            anchor: self.import_span(src, scalar.anchor),
        }
    }

    fn copy_props_from(&mut self, dst: NodeId, src: &Tree<'s>, src_node: NodeId) {
        let s = *src.node(src_node);
        let key = self.import_scalar(src, s.key);
        let val = self.import_scalar(src, s.val);
        let d = self.node_mut(dst);
        d.ty = s.ty;
        d.key = key;
        d.val = val;
    }

    /// Deep-copies the subtree rooted at `node` under `parent`, after
    /// `after`. Children are duplicated recursively in order. Returns the id
    /// of the copy.
    ///
    /// # Panics
    /// If `node` is the root.
    pub fn duplicate(&mut self, node: NodeId, parent: NodeId, after: Option<NodeId>) -> NodeId {
        assert!(!self.is_root(node));
        let copy = self.claim();
        self.copy_props(copy, node);
        self.set_hierarchy(copy, Some(parent), after);
        let mut last = None;
        let mut child = self.first_child(node);
        while let Some(c) = child {
            last = Some(self.duplicate(c, copy, last));
            child = self.next_sibling(c);
        }
        copy
    }

    /// Like [`duplicate`](Tree::duplicate), reading the subtree from `src`.
    /// Arena-resident scalars are copied into this tree's arena.
    pub fn duplicate_from(&mut self, src: &Tree<'s>, node: NodeId, parent: NodeId, after: Option<NodeId>) -> NodeId {
        assert!(!src.is_root(node));
        let copy = self.claim();
        self.copy_props_from(copy, src, node);
        self.set_hierarchy(copy, Some(parent), after);
        let mut last = None;
        let mut child = src.first_child(node);
        while let Some(c) = child {
            last = Some(self.duplicate_from(src, c, copy, last));
            child = src.next_sibling(c);
        }
        copy
    }

    /// Duplicates all children of `node` under `parent`, after `after`.
    /// Returns the id of the last child inserted, or `after` when `node` has
    /// no children.
    pub fn duplicate_children(&mut self, node: NodeId, parent: NodeId, after: Option<NodeId>) -> Option<NodeId> {
        debug_assert!(after.map_or(true, |a| self.has_child(parent, a)));
        let mut prev = after;
        let mut child = self.first_child(node);
        while let Some(c) = child {
            prev = Some(self.duplicate(c, parent, prev));
            child = self.next_sibling(c);
        }
        prev
    }

    /// Like [`duplicate_children`](Tree::duplicate_children), reading the
    /// children from `src`.
    pub fn duplicate_children_from(
        &mut self,
        src: &Tree<'s>,
        node: NodeId,
        parent: NodeId,
        after: Option<NodeId>,
    ) -> Option<NodeId> {
        debug_assert!(after.map_or(true, |a| self.has_child(parent, a)));
        let mut prev = after;
        let mut child = src.first_child(node);
        while let Some(c) = child {
            prev = Some(self.duplicate_from(src, c, parent, prev));
            child = src.next_sibling(c);
        }
        prev
    }

    /// Overwrites `dst` with the contents of `node`: its type and value
    /// (key left alone) and a deep copy of its children.
    pub fn duplicate_contents(&mut self, node: NodeId, dst: NodeId) {
        self.copy_props_wo_key(dst, node);
        self.duplicate_children(node, dst, None);
    }

    /// Duplicates the children of `node` into map or sequence `parent` with
    /// merge-key semantics: entries already present in `parent` either win
    /// over or are overridden by the duplicates, depending on which side of
    /// the insertion point they sit.
    ///
    /// For each child of `node`, in order:
    /// - a sequence parent duplicates unconditionally;
    /// - a map parent looks for an existing child with the same key. If none
    ///   exists, the child is duplicated. If one exists before the insertion
    ///   point, it was placed by an earlier merge and is overridden: it is
    ///   removed and the child duplicated. If one exists at or after the
    ///   insertion point (or there is no insertion point), it is an explicit
    ///   entry and wins: it is moved up to the merge position instead.
    ///
    /// Returns the last id inserted or moved, or `after` when nothing was.
    pub fn duplicate_children_no_rep(&mut self, node: NodeId, parent: NodeId, after: Option<NodeId>) -> Option<NodeId> {
        // ordinal position of the insertion point, fixed up front
        let after_pos = after.map(|a| {
            self.child_pos(parent, a)
                .expect("`after` must be a child of `parent`")
        });

        let mut prev = after;
        let mut child = self.first_child(node);
        while let Some(i) = child {
            let next = self.next_sibling(i);
            if self.is_seq(parent) {
                prev = Some(self.duplicate(i, parent, prev));
            } else {
                assert!(self.is_map(parent));
                // does the parent already have a child with this key?
                let mut rep = None;
                let mut rep_pos = 0;
                let mut j = self.first_child(parent);
                while let Some(jj) = j {
                    let data = self.node(jj);
                    if data.ty.has_key() && self.span_bytes(data.key.scalar) == self.key(i) {
                        rep = Some(jj);
                        break;
                    }
                    rep_pos += 1;
                    j = self.next_sibling(jj);
                }
                match (rep, after_pos) {
                    (None, _) => {
                        prev = Some(self.duplicate(i, parent, prev));
                    }
                    (Some(rep), Some(after_pos)) if rep_pos < after_pos => {
                        // the repetition was inserted by an earlier merge;
                        // the current child overrides it
                        self.remove(rep);
                        prev = Some(self.duplicate(i, parent, prev));
                    }
                    (Some(rep), _) => {
                        // the repetition is a later explicit entry and wins;
                        // pull it up to the merge position
                        if Some(rep) != prev {
                            self.move_after(rep, prev);
                            prev = Some(rep);
                        }
                    }
                }
            }
            child = next;
        }
        prev
    }
}

// ----- swap and reorder

impl<'s> Tree<'s> {
    /// Exchanges two slots wholesale: type, key, value and position in the
    /// hierarchy. When exactly one of the two is a free slot, the live
    /// node's record moves into it and the other slot is freed; this is how
    /// [`reorder`](Tree::reorder) relocates nodes.
    ///
    /// # Panics
    /// If both slots are untyped, or a live operand is the root.
    pub fn swap(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        let live_a = !self.node(a).ty.is_empty();
        let live_b = !self.node(b).ty.is_empty();
        match (live_a, live_b) {
            (true, true) => {
                self.swap_props(a, b);
                self.swap_hierarchy(a, b);
            }
            (false, true) => {
                self.copy_props(a, b);
                self.free_list_rem(a);
                self.copy_hierarchy(a, b);
                self.clear_slot(b);
                self.free_list_add(b);
            }
            (true, false) => {
                self.copy_props(b, a);
                self.free_list_rem(b);
                self.copy_hierarchy(b, a);
                self.clear_slot(a);
                self.free_list_add(a);
            }
            (false, false) => unreachable!("swap of two untyped slots"),
        }
    }

    fn swap_props(&mut self, a: NodeId, b: NodeId) {
        let (ta, ka, va) = {
            let n = self.node(a);
            (n.ty, n.key, n.val)
        };
        let (tb, kb, vb) = {
            let n = self.node(b);
            (n.ty, n.key, n.val)
        };
        {
            let n = self.node_mut(a);
            n.ty = tb;
            n.key = kb;
            n.val = vb;
        }
        {
            let n = self.node_mut(b);
            n.ty = ta;
            n.key = ka;
            n.val = va;
        }
    }

    /// Moves `src`'s position in the hierarchy onto `dst`, repointing
    /// children, siblings and parent endpoints. `src`'s links are left
    /// stale; the caller frees or overwrites the slot.
    fn copy_hierarchy(&mut self, dst: NodeId, src: NodeId) {
        let s = *self.node(src);
        let mut child = s.first_child;
        while let Some(c) = child {
            let next = self.node(c).next_sibling;
            self.node_mut(c).parent = Some(dst);
            child = next;
        }
        if let Some(p) = s.prev_sibling {
            self.node_mut(p).next_sibling = Some(dst);
        }
        if let Some(n) = s.next_sibling {
            self.node_mut(n).prev_sibling = Some(dst);
        }
        if let Some(parent) = s.parent {
            let pd = self.node_mut(parent);
            if pd.first_child == Some(src) {
                pd.first_child = Some(dst);
            }
            if pd.last_child == Some(src) {
                pd.last_child = Some(dst);
            }
        }
        let d = self.node_mut(dst);
        d.parent = s.parent;
        d.first_child = s.first_child;
        d.last_child = s.last_child;
        d.prev_sibling = s.prev_sibling;
        d.next_sibling = s.next_sibling;
    }

    /// Exchanges the hierarchy positions of two live nodes. Handles the
    /// nested case (one a child of the other) and all adjacency cases of
    /// the sibling list.
    fn swap_hierarchy(&mut self, ia: NodeId, ib: NodeId) {
        if ia == ib {
            return;
        }

        // grandchildren change parents (the swapped pair is skipped here;
        // the nested case is settled below with the parent fields)
        for (from, to) in [(ia, ib), (ib, ia)] {
            let mut child = self.node(from).first_child;
            while let Some(c) = child {
                let next = self.node(c).next_sibling;
                if c != ia && c != ib {
                    self.node_mut(c).parent = Some(to);
                }
                child = next;
            }
        }

        let pa = self.node(ia).parent.expect("cannot swap the root");
        let pb = self.node(ib).parent.expect("cannot swap the root");

        // parent endpoints: substitute one id for the other wherever it
        // appears; with a shared parent both endpoints may change at once
        if pa == pb {
            let p = self.node_mut(pa);
            p.first_child = swap_id(p.first_child, ia, ib);
            p.last_child = swap_id(p.last_child, ia, ib);
        } else {
            {
                let p = self.node_mut(pa);
                if p.first_child == Some(ia) {
                    p.first_child = Some(ib);
                }
                if p.last_child == Some(ia) {
                    p.last_child = Some(ib);
                }
            }
            {
                let p = self.node_mut(pb);
                if p.first_child == Some(ib) {
                    p.first_child = Some(ia);
                }
                if p.last_child == Some(ib) {
                    p.last_child = Some(ia);
                }
            }
        }

        // child pointers swap wholesale (fresh reads: the endpoint fixup
        // above may have written into one of the pair in the nested case)
        {
            let (af, al) = {
                let n = self.node(ia);
                (n.first_child, n.last_child)
            };
            let (bf, bl) = {
                let n = self.node(ib);
                (n.first_child, n.last_child)
            };
            {
                let n = self.node_mut(ia);
                n.first_child = bf;
                n.last_child = bl;
            }
            {
                let n = self.node_mut(ib);
                n.first_child = af;
                n.last_child = al;
            }
        }

        // sibling links
        let (ap, an) = {
            let n = self.node(ia);
            (n.prev_sibling, n.next_sibling)
        };
        let (bp, bn) = {
            let n = self.node(ib);
            (n.prev_sibling, n.next_sibling)
        };
        if ap != Some(ib) && an != Some(ib) && bp != Some(ia) && bn != Some(ia) {
            // not adjacent: patch the four outer neighbors, then trade links
            if let Some(p) = ap {
                self.node_mut(p).next_sibling = Some(ib);
            }
            if let Some(n) = an {
                self.node_mut(n).prev_sibling = Some(ib);
            }
            if let Some(p) = bp {
                self.node_mut(p).next_sibling = Some(ia);
            }
            if let Some(n) = bn {
                self.node_mut(n).prev_sibling = Some(ia);
            }
            {
                let n = self.node_mut(ia);
                n.prev_sibling = bp;
                n.next_sibling = bn;
            }
            {
                let n = self.node_mut(ib);
                n.prev_sibling = ap;
                n.next_sibling = an;
            }
        } else if an == Some(ib) {
            // [.., a, b, ..] becomes [.., b, a, ..]
            debug_assert_eq!(bp, Some(ia));
            if let Some(p) = ap {
                self.node_mut(p).next_sibling = Some(ib);
            }
            if let Some(n) = bn {
                self.node_mut(n).prev_sibling = Some(ia);
            }
            {
                let n = self.node_mut(ib);
                n.prev_sibling = ap;
                n.next_sibling = Some(ia);
            }
            {
                let n = self.node_mut(ia);
                n.prev_sibling = Some(ib);
                n.next_sibling = bn;
            }
        } else if ap == Some(ib) {
            // [.., b, a, ..] becomes [.., a, b, ..]
            debug_assert_eq!(bn, Some(ia));
            if let Some(p) = bp {
                self.node_mut(p).next_sibling = Some(ia);
            }
            if let Some(n) = an {
                self.node_mut(n).prev_sibling = Some(ib);
            }
            {
                let n = self.node_mut(ia);
                n.prev_sibling = bp;
                n.next_sibling = Some(ib);
            }
            {
                let n = self.node_mut(ib);
                n.prev_sibling = Some(ia);
                n.next_sibling = an;
            }
        } else {
            unreachable!("sibling links are inconsistent");
        }

        {
            let n = self.node(ia);
            debug_assert_ne!(n.prev_sibling, Some(ia));
            debug_assert_ne!(n.next_sibling, Some(ia));
            let n = self.node(ib);
            debug_assert_ne!(n.prev_sibling, Some(ib));
            debug_assert_ne!(n.next_sibling, Some(ib));
        }

        // parent fields, guarding the nested case
        let apar = self.node(ia).parent;
        let bpar = self.node(ib).parent;
        match (apar == Some(ib), bpar == Some(ia)) {
            (false, false) => {
                self.node_mut(ia).parent = bpar;
                self.node_mut(ib).parent = apar;
            }
            (true, false) => {
                self.node_mut(ia).parent = bpar;
                self.node_mut(ib).parent = Some(ia);
            }
            (false, true) => {
                self.node_mut(ib).parent = apar;
                self.node_mut(ia).parent = Some(ib);
            }
            (true, true) => unreachable!("parent links are inconsistent"),
        }
    }

    /// Compacts live nodes into document order: after this, a depth-first
    /// pre-order walk from the root visits indices `0, 1, 2, …, size-1`.
    /// Calling it again is a no-op.
    pub fn reorder(&mut self) {
        if self.size == 0 {
            return;
        }
        let mut root = self.root_id();
        self.do_reorder(&mut root, 0);
    }

    fn do_reorder(&mut self, node: &mut NodeId, mut count: usize) -> usize {
        // put this node in place
        if node.index() != count {
            let target = NodeId::from_index(count);
            self.swap(*node, target);
            *node = target;
        }
        count += 1;

        // descend; every swap may relocate the child we are iterating, so
        // the recursion hands back the child's updated id
        let mut child = self.first_child(*node);
        while let Some(mut c) = child {
            count = self.do_reorder(&mut c, count);
            child = self.next_sibling(c);
        }
        count
    }
}

// ----- turning nodes into maps, sequences, scalars

impl<'s> Tree<'s> {
    fn set_flags(&mut self, node: NodeId, flags: NodeType) {
        self.node_mut(node).ty = flags;
    }

    fn add_flags(&mut self, node: NodeId, flags: NodeType) {
        self.node_mut(node).ty |= flags;
    }

    /// Makes `node` an unkeyed scalar with value `val`.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_val(&mut self, node: NodeId, val: impl Into<Span<'s>>, more_flags: NodeType) {
        assert!(!self.has_children(node));
        debug_assert!(!self.parent_is_map(node));
        self.set_flags(node, NodeType::VAL | more_flags);
        let data = self.node_mut(node);
        data.key.clear();
        data.val = NodeScalar::new(val.into());
    }

    /// Makes `node` a keyed scalar `key: val`.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_keyval(&mut self, node: NodeId, key: impl Into<Span<'s>>, val: impl Into<Span<'s>>, more_flags: NodeType) {
        assert!(!self.has_children(node));
        debug_assert!(self.parent(node).is_none() || self.parent_is_map(node));
        self.set_flags(node, NodeType::KEYVAL | more_flags);
        let data = self.node_mut(node);
        data.key = NodeScalar::new(key.into());
        data.val = NodeScalar::new(val.into());
    }

    /// Makes `node` an unkeyed map.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_map(&mut self, node: NodeId, more_flags: NodeType) {
        assert!(!self.has_children(node));
        debug_assert!(!self.parent_is_map(node));
        self.set_flags(node, NodeType::MAP | more_flags);
        let data = self.node_mut(node);
        data.key.clear();
        data.val.clear();
    }

    /// Makes `node` a map keyed by `key`.
    ///
    /// # Panics
    /// If `node` has children, or `key` is empty.
    pub fn to_keymap(&mut self, node: NodeId, key: impl Into<Span<'s>>, more_flags: NodeType) {
        assert!(!self.has_children(node));
        let key = key.into();
        assert!(!key.is_empty());
        debug_assert!(self.parent(node).is_none() || self.parent_is_map(node));
        self.set_flags(node, NodeType::KEYMAP | more_flags);
        let data = self.node_mut(node);
        data.key = NodeScalar::new(key);
        data.val.clear();
    }

    /// Makes `node` an unkeyed sequence.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_seq(&mut self, node: NodeId, more_flags: NodeType) {
        assert!(!self.has_children(node));
        self.set_flags(node, NodeType::SEQ | more_flags);
        let data = self.node_mut(node);
        data.key.clear();
        data.val.clear();
    }

    /// Makes `node` a sequence keyed by `key`.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_keyseq(&mut self, node: NodeId, key: impl Into<Span<'s>>, more_flags: NodeType) {
        assert!(!self.has_children(node));
        debug_assert!(self.parent(node).is_none() || self.parent_is_map(node));
        self.set_flags(node, NodeType::KEYSEQ | more_flags);
        let data = self.node_mut(node);
        data.key = NodeScalar::new(key.into());
        data.val.clear();
    }

    /// Makes `node` a document.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_doc(&mut self, node: NodeId, more_flags: NodeType) {
        assert!(!self.has_children(node));
        self.set_flags(node, NodeType::DOC | more_flags);
        let data = self.node_mut(node);
        data.key.clear();
        data.val.clear();
    }

    /// Makes `node` a stream of documents.
    ///
    /// # Panics
    /// If `node` has children.
    pub fn to_stream(&mut self, node: NodeId, more_flags: NodeType) {
        assert!(!self.has_children(node));
        self.set_flags(node, NodeType::STREAM | more_flags);
        let data = self.node_mut(node);
        data.key.clear();
        data.val.clear();
    }

    /// Puts an explicit tag on the key of `node`.
    pub fn set_key_tag(&mut self, node: NodeId, tag: impl Into<Span<'s>>) {
        self.add_flags(node, NodeType::KEYTAG);
        self.node_mut(node).key.tag = tag.into();
    }

    /// Puts an explicit tag on the value of `node`.
    pub fn set_val_tag(&mut self, node: NodeId, tag: impl Into<Span<'s>>) {
        self.add_flags(node, NodeType::VALTAG);
        self.node_mut(node).val.tag = tag.into();
    }

    /// Puts an anchor named `anchor` on the key of `node`.
    pub fn set_key_anchor(&mut self, node: NodeId, anchor: impl Into<Span<'s>>) {
        self.add_flags(node, NodeType::KEYANCH);
        self.node_mut(node).key.anchor = anchor.into();
    }

    /// Puts an anchor named `anchor` on the value of `node`.
    pub fn set_val_anchor(&mut self, node: NodeId, anchor: impl Into<Span<'s>>) {
        self.add_flags(node, NodeType::VALANCH);
        self.node_mut(node).val.anchor = anchor.into();
    }

    /// Strips all anchor and reference markers from `node`.
    pub fn rem_anchor_ref(&mut self, node: NodeId) {
        let data = self.node_mut(node);
        data.ty -= NodeType::KEYREF | NodeType::VALREF | NodeType::KEYANCH | NodeType::VALANCH;
        data.key.anchor = Span::empty();
        data.val.anchor = Span::empty();
    }
}

// ----- document-order traversal

impl<'s> Tree<'s> {
    /// The node after `n` in a depth-first pre-order walk from the root.
    pub(crate) fn preorder_next(&self, n: NodeId) -> Option<NodeId> {
        if let Some(c) = self.first_child(n) {
            return Some(c);
        }
        let mut cur = n;
        loop {
            if let Some(s) = self.next_sibling(cur) {
                return Some(s);
            }
            cur = self.parent(cur)?;
        }
    }

    /// Iterates over all live nodes in document order, starting at the root.
    pub fn preorder(&self) -> Preorder<'_, 's> {
        Preorder {
            tree: self,
            next: (self.size > 0).then(|| self.root_id()),
        }
    }
}

/// Iterator over a tree's live nodes in document order.
///
/// Created by [`Tree::preorder`].
#[derive(Debug, Clone)]
pub struct Preorder<'t, 's> {
    tree: &'t Tree<'s>,
    next: Option<NodeId>,
}

impl<'t, 's> Iterator for Preorder<'t, 's> {
    type Item = NodeId;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.tree.preorder_next(cur);
        Some(cur)
    }
}

impl<'t, 's> FusedIterator for Preorder<'t, 's> {}
