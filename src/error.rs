use crate::node::NodeId;
use thiserror::Error;

/// Errors returned by the tree's public operations.
///
/// Every check runs before the tree is touched, so an error always leaves
/// the tree as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The handle does not resolve to a node in this tree, either because it
    /// was released or because another tree created it.
    #[error("node {0:?} does not exist")]
    InvalidNode(NodeId),

    /// The node cannot be reached from the root, or belongs to another tree.
    #[error("node {0:?} is not a member of this tree")]
    NotInTree(NodeId),

    /// The node is still linked into the tree.
    #[error("node {0:?} is already linked into the tree")]
    AlreadyLinked(NodeId),

    /// A minimum or maximum was asked of an empty subtree.
    #[error("query on an empty subtree")]
    EmptySubtree,
}

/// A broken invariant found by [`Tree::validate`](crate::Tree::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("the root is red")]
    RedRoot,

    #[error("the root has a parent link")]
    RootHasParent,

    #[error("child {node:?} does not point back at its parent")]
    BrokenParentLink { node: NodeId },

    #[error("red node {node:?} has a red child")]
    RedRedViolation { node: NodeId },

    #[error("black heights under {node:?} differ: left {left}, right {right}")]
    BlackHeightMismatch {
        node: NodeId,
        left: usize,
        right: usize,
    },

    #[error("key of node {node:?} is smaller than its in-order predecessor")]
    OutOfOrder { node: NodeId },

    #[error("tree reports {expected} nodes but {found} are reachable")]
    LengthMismatch { expected: usize, found: usize },
}
