//! Anchor and alias resolution.
//!
//! YAML 1.2 says an alias node refers to the most recent node in the
//! serialization carrying the referenced anchor, so resolution collects
//! anchors and aliases in document order first and then looks *backwards*
//! from each alias. See <https://yaml.org/spec/1.2/spec.html#id2765878>.
//!
//! Resolution proceeds in three passes over the tree:
//!
//! 1. **Collect**: one pre-order walk gathers every anchor and every alias
//!    (including `<<` merge keys and `<<: [*a, *b]` merge sequences, which
//!    contribute one entry per alias) into a list, pre-counted so the list
//!    allocates once. Each entry then learns the index of the nearest
//!    preceding anchor entry.
//! 2. **Lookup**: each alias walks the preceding-anchor chain until it finds
//!    a node carrying the anchor it names.
//! 3. **Rewrite**: aliases are replaced by duplicates of their targets; merge
//!    keys merge their target's children into the surrounding map with
//!    override semantics. Finally all anchor/reference markers are stripped
//!    and spent merge sequences are removed.

use log::debug;

use crate::{
    error::ResolveError,
    tree::{NodeId, Tree},
};

/// One collected anchor or alias.
struct RefData {
    is_ref:      bool,
    node:        NodeId,
    /// Index in the collected list of the nearest preceding anchor entry.
    prev_anchor: Option<usize>,
    /// For aliases: the resolved anchor node.
    target:      Option<NodeId>,
    /// For aliases inside a `<<: [*a, *b]` sequence: the sequence node.
    parent_ref:  Option<NodeId>,
}

impl RefData {
    fn anchor(node: NodeId) -> Self {
        RefData {
            is_ref: false,
            node,
            prev_anchor: None,
            target: None,
            parent_ref: None,
        }
    }

    fn alias(node: NodeId, parent_ref: Option<NodeId>) -> Self {
        RefData {
            is_ref: true,
            node,
            prev_anchor: None,
            target: None,
            parent_ref,
        }
    }
}

/// The collected anchor/alias list of one resolution pass.
struct ReferenceResolver {
    refs: Vec<RefData>,
}

impl ReferenceResolver {
    fn collect(tree: &Tree<'_>) -> Result<Self, ResolveError> {
        // count first so the list allocates exactly once; pushing during the
        // walk must not reallocate out from under the recursion
        let expected = Self::count(tree, tree.root_id());
        let mut resolver = ReferenceResolver {
            refs: Vec::with_capacity(expected),
        };
        if expected == 0 {
            return Ok(resolver);
        }
        resolver.store(tree, tree.root_id())?;

        // connect each entry to the nearest preceding anchor
        let mut prev_anchor = None;
        for (i, rd) in resolver.refs.iter_mut().enumerate() {
            rd.prev_anchor = prev_anchor;
            if !rd.is_ref {
                prev_anchor = Some(i);
            }
        }

        resolver.lookup_targets(tree)?;
        Ok(resolver)
    }

    fn count(tree: &Tree<'_>, node: NodeId) -> usize {
        let ty = tree.node_type(node);
        let mut count = usize::from(ty.is_ref() || ty.has_key_anchor() || ty.has_val_anchor());
        let mut child = tree.first_child(node);
        while let Some(c) = child {
            count += Self::count(tree, c);
            child = tree.next_sibling(c);
        }
        count
    }

    fn store(&mut self, tree: &Tree<'_>, node: NodeId) -> Result<(), ResolveError> {
        let is_merge_key = tree.has_key(node) && tree.key(node) == b"<<";
        if tree.is_key_ref(node) || tree.is_val_ref(node) || is_merge_key {
            if tree.is_seq(node) {
                // `<<: [*a, *b]`: one entry per alias; the aliases must be
                // leaves
                let mut child = tree.first_child(node);
                while let Some(c) = child {
                    if tree.has_children(c) || !tree.has_val(c) {
                        return Err(ResolveError::InvalidReference { node: c });
                    }
                    self.refs.push(RefData::alias(c, Some(node)));
                    child = tree.next_sibling(c);
                }
                return Ok(());
            } else if tree.has_val(node) {
                self.refs.push(RefData::alias(node, None));
            } else {
                return Err(ResolveError::InvalidReference { node });
            }
        }
        if tree.has_key_anchor(node) || tree.has_val_anchor(node) {
            self.refs.push(RefData::anchor(node));
        }
        let mut child = tree.first_child(node);
        while let Some(c) = child {
            self.store(tree, c)?;
            child = tree.next_sibling(c);
        }
        Ok(())
    }

    fn lookup_targets(&mut self, tree: &Tree<'_>) -> Result<(), ResolveError> {
        for i in 0..self.refs.len() {
            if !self.refs[i].is_ref {
                continue;
            }
            let target = self.lookup(tree, i)?;
            self.refs[i].target = Some(target);
        }
        Ok(())
    }

    /// Walks backwards from entry `i` through the preceding-anchor chain.
    fn lookup(&self, tree: &Tree<'_>, i: usize) -> Result<NodeId, ResolveError> {
        let alias = tree.val(self.refs[i].node);
        let name = alias
            .strip_prefix(b"*")
            .ok_or_else(|| ResolveError::MalformedAlias {
                value: String::from_utf8_lossy(alias).into_owned(),
            })?;
        let mut cursor = self.refs[i].prev_anchor;
        while let Some(at) = cursor {
            let entry = &self.refs[at];
            if tree.has_anchor(entry.node, name) {
                return Ok(entry.node);
            }
            cursor = entry.prev_anchor;
        }
        Err(ResolveError::UnresolvedAlias {
            name: String::from_utf8_lossy(name).into_owned(),
        })
    }
}

impl<'s> Tree<'s> {
    /// Resolves all anchors and aliases, rewriting the tree into a
    /// dereferenced form.
    ///
    /// Plain aliases are overwritten with a deep copy of their target. A
    /// `<<` merge key merges its target's children into the surrounding map,
    /// where explicit entries win over merged ones and later merges win over
    /// earlier ones; `<<: [*a, *b]` merges each target in sequence order.
    /// Anchor and reference markers are stripped from the whole tree
    /// afterwards, so resolving a second time is a no-op.
    ///
    /// # Errors
    /// Fails on an alias that no preceding anchor satisfies, on an alias
    /// whose value is not `*name`-shaped, and on reference nodes with
    /// nothing to resolve. Name lookup happens before any rewriting, so the
    /// tree is unchanged when these are reported.
    pub fn resolve(&mut self) -> Result<(), ResolveError> {
        if self.is_empty() {
            return Ok(());
        }
        let resolver = ReferenceResolver::collect(self)?;
        if resolver.refs.is_empty() {
            return Ok(());
        }
        debug!(
            "resolving {} aliases against {} anchors",
            resolver.refs.iter().filter(|r| r.is_ref).count(),
            resolver.refs.iter().filter(|r| !r.is_ref).count(),
        );

        // rewrite aliases in document order
        let mut prev_parent_ref: Option<NodeId> = None;
        let mut prev_parent_ref_after: Option<NodeId> = None;
        for rd in &resolver.refs {
            if !rd.is_ref {
                continue;
            }
            let target = rd.target.expect("lookup filled every alias target");
            if let Some(parent_ref) = rd.parent_ref {
                // one alias of a `<<: [*a, *b]` sequence: merge the target's
                // children into the map around the sequence. Consecutive
                // aliases of the same sequence continue where the previous
                // merge left off, so later targets override earlier ones.
                debug_assert!(self.is_seq(parent_ref));
                let map = self.parent(parent_ref).expect("a merge sequence sits inside a map");
                let after = if prev_parent_ref != Some(parent_ref) {
                    Some(parent_ref)
                } else {
                    prev_parent_ref_after
                };
                prev_parent_ref = Some(parent_ref);
                prev_parent_ref_after = self.duplicate_children_no_rep(target, map, after);
                self.remove(rd.node);
            } else if self.has_key(rd.node) && self.key(rd.node) == b"<<" {
                // scalar merge key `<<: *target`
                debug_assert!(self.is_keyval(rd.node));
                let map = self.parent(rd.node).expect("a merge key sits inside a map");
                let after = self.prev_sibling(rd.node);
                self.duplicate_children_no_rep(target, map, after);
                self.remove(rd.node);
            } else {
                // plain alias: the node becomes a copy of its target
                self.duplicate_contents(target, rd.node);
            }
        }

        // drop the spent merge sequences
        for rd in &resolver.refs {
            if let Some(parent_ref) = rd.parent_ref {
                if !self.node_type(parent_ref).is_empty() {
                    self.remove(parent_ref);
                }
            }
        }

        // strip anchor/ref markers everywhere; duplicating targets copies
        // their markers, so the collected list alone does not cover the tree
        let mut cursor = Some(self.root_id());
        while let Some(node) = cursor {
            self.rem_anchor_ref(node);
            cursor = self.preorder_next(node);
        }
        Ok(())
    }
}
