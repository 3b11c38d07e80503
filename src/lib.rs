//! `ytree` is a compact, arena-allocated document tree for YAML-shaped data.
//!
//! It is the data model a YAML parser populates and an emitter walks: a
//! hierarchy of maps, sequences and scalars supporting random-access
//! navigation, structural mutation, and the YAML 1.2 anchor/alias resolution
//! pass (including the `<<` merge key) that rewrites the tree into a
//! dereferenced form. Parsing and emission themselves are not part of this
//! crate.
//!
//! Three ideas drive the layout:
//!
//! - **One flat node buffer.** Every node lives in a single growable arena
//!   and is addressed by [`NodeId`]. Parent, children and siblings are plain
//!   indices; unused slots thread a free list through the same links, so
//!   claiming and releasing nodes is O(1) and cheap to reason about. The
//!   sibling indices are non-owning: the tree owns all nodes exclusively, so
//!   the cyclic-looking links cause no ownership cycles.
//! - **One string arena, spans everywhere.** Scalar bytes either borrow
//!   zero-copy from the caller's source buffer ([`Span::Source`]) or live in
//!   the tree's own append-only string arena ([`Span::Arena`]), addressed by
//!   offset so arena growth never invalidates them.
//! - **A bitset for node types.** A node's classification combines
//!   orthogonally — a map can be keyed, its value anchored, its key quoted —
//!   so [`NodeType`] is a bitset, with the low bits encoding the kind.
//!
//! # Getting started
//!
//! Build a tree by claiming nodes and typing them, then navigate from the
//! root:
//!
//! ```
//! use ytree::{NodeType, Tree};
//!
//! // defaults: &d {timeout: 30}
//! // job: *d
//! let mut tree = Tree::with_capacity(16, 0);
//! let root = tree.root_id();
//! tree.to_map(root, NodeType::empty());
//!
//! let defaults = tree.append_child(root);
//! tree.to_keymap(defaults, "defaults", NodeType::empty());
//! tree.set_val_anchor(defaults, "d");
//! let timeout = tree.append_child(defaults);
//! tree.to_keyval(timeout, "timeout", "30", NodeType::empty());
//!
//! let job = tree.append_child(root);
//! tree.to_keyval(job, "job", "*d", NodeType::VALREF);
//!
//! // dereference all aliases
//! tree.resolve().unwrap();
//!
//! let job = tree.rootref().get(b"job").unwrap();
//! assert!(job.is_map());
//! assert_eq!(job.get(b"timeout").unwrap().val(), b"30");
//! ```
//!
//! Trees are single-threaded by design: all operations are non-blocking and
//! none suspend, and concurrent mutation is the caller's responsibility.

#![forbid(missing_debug_implementations, unconditional_recursion)]
#![deny(unsafe_code, future_incompatible)]
#![warn(missing_docs)]

mod arena;
mod error;
mod node;
mod noderef;
mod resolve;
mod tree;

pub use arena::Span;
pub use error::ResolveError;
pub use node::{NodeScalar, NodeType};
pub use noderef::{Children, NodeRef};
pub use tree::{NodeId, Preorder, Tree};

/// A convenient collection of the most used parts of `ytree`.
pub mod prelude {
    pub use crate::{NodeId, NodeRef, NodeType, Span, Tree};
}
