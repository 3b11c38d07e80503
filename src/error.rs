//! Error kinds for the checked tree operations.

use thiserror::Error;

use crate::tree::NodeId;

/// Why a [`resolve`](crate::Tree::resolve) pass could not complete.
///
/// Structural contract violations (freed indices, map/sequence rule mixing)
/// are programming errors and assert instead; these variants cover malformed
/// *input*, which a parser can hand to the tree in good faith.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// An alias names an anchor that no prior node in document order defines.
    #[error("no anchor named '{name}' precedes the alias referencing it")]
    UnresolvedAlias {
        /// The anchor name the alias asked for, without the leading `*`.
        name: String,
    },

    /// A reference node's value does not have the `*name` shape.
    #[error("alias value does not name an anchor: '{value}'")]
    MalformedAlias {
        /// The value found where `*name` was expected.
        value: String,
    },

    /// A node is marked as a reference but has neither a value to resolve
    /// nor a sequence of aliases under a merge key.
    #[error("node {node:?} is marked as a reference but carries nothing to resolve")]
    InvalidReference {
        /// The offending node.
        node: NodeId,
    },
}
