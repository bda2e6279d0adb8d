use generational_arena::Index;

/// The color of a node.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Color {
    Red,
    Black,
}

/// Where a node hangs in relation to its parent.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum NodeType {
    LeftChild,
    RightChild,
    Orphan,
}

/// One side of a node, used to write the mirrored fixup cases once.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    pub(crate) fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// A handle to a node, tied to the tree that created it.
///
/// Arena indices alone cannot tell two trees apart, so every handle also
/// carries its tree's id and is refused by any other tree.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct NodeId {
    pub(crate) tree: u64,
    pub(crate) index: Index,
}

/// A single key held by a tree.
///
/// Child links are owning in the sense that every linked node is reachable
/// through exactly one of them (or the tree's root). The parent link is only
/// an observational index back up the tree. Links are read through
/// [`Tree::left`](crate::Tree::left) and friends, which hand out [`NodeId`]s.
#[derive(Debug)]
pub struct Node<K> {
    pub(crate) parent: Option<Index>,
    pub(crate) left: Option<Index>,
    pub(crate) right: Option<Index>,

    pub(crate) key: K,

    pub(crate) color: Color,
}

impl<K> Node<K> {
    pub(crate) fn new(key: K) -> Self {
        Node {
            parent: None,
            left: None,
            right: None,
            key,
            color: Color::Red,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// True when the node has no links at all. The root of a single-node
    /// tree also looks detached from here, so the tree double checks it.
    pub(crate) fn is_unlinked(&self) -> bool {
        self.parent.is_none() && self.left.is_none() && self.right.is_none()
    }

    pub(crate) fn unlink(&mut self) {
        self.parent = None;
        self.left = None;
        self.right = None;
        self.color = Color::Red;
    }
}
