use generational_arena::{Arena, Index};
use log::{debug, trace};
use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicU64};

use crate::error::TreeError;
use crate::node::{Color, Node, NodeId, NodeType, Side};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// The tree structure.
/// Stores the nodes in a generational arena and the index of the root of the tree.
///
/// Nodes are created detached with [`Tree::create_node`], linked in with
/// [`Tree::insert`], unlinked again with [`Tree::remove`] and finally disposed
/// of with [`Tree::release`]. Between those calls the caller holds on to the
/// node's [`NodeId`], which only this tree accepts.
pub struct Tree<K> {
    id: u64,
    nodes: Arena<Node<K>>,
    root: Option<Index>,
    len: usize,
}

impl<K> Default for Tree<K> {
    fn default() -> Self {
        Tree::new()
    }
}

impl<K> Tree<K> {
    /// Create a new empty tree
    pub fn new() -> Self {
        Tree::from_arena(Arena::new())
    }

    /// Create a new empty tree with room for `capacity` nodes before the arena grows.
    pub fn with_capacity(capacity: usize) -> Self {
        Tree::from_arena(Arena::with_capacity(capacity))
    }

    fn from_arena(nodes: Arena<Node<K>>) -> Self {
        Tree {
            id: NEXT_TREE_ID.fetch_add(1, atomic::Ordering::Relaxed),
            nodes,
            root: None,
            len: 0,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root.map(|root| self.handle(root))
    }

    /// Number of nodes linked into the tree. Detached nodes are not counted.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Allocates a detached red node holding `key` and returns its handle.
    /// The node does not take part in the tree until it is passed to [`Tree::insert`].
    pub fn create_node(&mut self, key: K) -> NodeId {
        let index = self.nodes.insert(Node::new(key));
        self.handle(index)
    }

    /// Frees a detached node and hands its key back.
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign, `AlreadyLinked` if the
    /// node is still part of the tree.
    pub fn release(&mut self, node: NodeId) -> Result<K, TreeError> {
        let index = self.check_detached(node)?;
        debug!("Releasing node {:?}", node);
        self.nodes
            .remove(index)
            .map(|node| node.key)
            .ok_or(TreeError::InvalidNode(node))
    }

    pub fn get(&self, node: NodeId) -> Option<&Node<K>> {
        self.resolve(node).ok().map(|index| &self.nodes[index])
    }

    pub fn key(&self, node: NodeId) -> Option<&K> {
        self.get(node).map(|node| &node.key)
    }

    /// The parent of `node`, or `None` for the root and for detached nodes.
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        let index = self.resolve(node)?;
        Ok(self.get_parent(index).map(|parent| self.handle(parent)))
    }

    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn left(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        let index = self.resolve(node)?;
        Ok(self.get_left(index).map(|left| self.handle(left)))
    }

    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn right(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        let index = self.resolve(node)?;
        Ok(self.get_right(index).map(|right| self.handle(right)))
    }

    /// Iterates over the linked nodes in key order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            tree: self,
            next: self.root.map(|root| self.subtree_minimum(root)),
            remaining: self.len,
        }
    }

    /// Number of nodes on the longest path from the root down to a leaf.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack: Vec<(Index, usize)> = Vec::new();
        stack.extend(self.root.map(|root| (root, 1)));
        while let Some((node, depth)) = stack.pop() {
            height = height.max(depth);
            for child in [self.get_left(node), self.get_right(node)].iter().flatten() {
                stack.push((*child, depth + 1));
            }
        }
        height
    }

    /// Rotates `node` down to the left so that its right child takes its place.
    ///
    /// Colors are left alone, so rotating a balanced tree from outside can break
    /// its color invariants. A node without a right child is left untouched.
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn rotate_left(&mut self, node: NodeId) -> Result<(), TreeError> {
        let index = self.resolve(node)?;
        self.left_rotate(index);
        Ok(())
    }

    /// Rotates `node` down to the right so that its left child takes its place.
    /// See [`Tree::rotate_left`].
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn rotate_right(&mut self, node: NodeId) -> Result<(), TreeError> {
        let index = self.resolve(node)?;
        self.right_rotate(index);
        Ok(())
    }

    /// Returns the node with the smallest key in the subtree rooted at `node`.
    ///
    /// # Errors
    ///
    /// `EmptySubtree` when `node` is `None`, `InvalidNode` if the handle is
    /// stale or foreign.
    pub fn minimum(&self, node: Option<NodeId>) -> Result<NodeId, TreeError> {
        let index = self.resolve(node.ok_or(TreeError::EmptySubtree)?)?;
        Ok(self.handle(self.subtree_minimum(index)))
    }

    /// Returns the node with the largest key in the subtree rooted at `node`.
    ///
    /// # Errors
    ///
    /// `EmptySubtree` when `node` is `None`, `InvalidNode` if the handle is
    /// stale or foreign.
    pub fn maximum(&self, node: Option<NodeId>) -> Result<NodeId, TreeError> {
        let index = self.resolve(node.ok_or(TreeError::EmptySubtree)?)?;
        Ok(self.handle(self.subtree_maximum(index)))
    }

    /// Returns the node that follows `node` in key order, or `None` if `node`
    /// holds the largest key.
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn successor(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        let index = self.resolve(node)?;
        Ok(self.next_node(index).map(|next| self.handle(next)))
    }

    /// Returns the node that precedes `node` in key order, or `None` if `node`
    /// holds the smallest key.
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign.
    pub fn predecessor(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        let index = self.resolve(node)?;
        Ok(self.prev_node(index).map(|prev| self.handle(prev)))
    }

    /// The node with the smallest key in the whole tree.
    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|root| self.handle(self.subtree_minimum(root)))
    }

    /// The node with the largest key in the whole tree.
    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|root| self.handle(self.subtree_maximum(root)))
    }

    pub(crate) fn handle(&self, index: Index) -> NodeId {
        NodeId {
            tree: self.id,
            index,
        }
    }

    // Turns a handle into an arena index, refusing stale handles and handles
    // minted by another tree
    fn resolve(&self, node: NodeId) -> Result<Index, TreeError> {
        if node.tree == self.id && self.nodes.contains(node.index) {
            Ok(node.index)
        } else {
            debug!("Rejecting unknown node {:?}", node);
            Err(TreeError::InvalidNode(node))
        }
    }

    fn check_detached(&self, node: NodeId) -> Result<Index, TreeError> {
        let index = self.resolve(node)?;
        if !self.nodes[index].is_unlinked() || self.root == Some(index) {
            debug!("Rejecting node {:?}, it is still linked", node);
            return Err(TreeError::AlreadyLinked(node));
        }
        Ok(index)
    }

    fn subtree_minimum(&self, mut node: Index) -> Index {
        while let Some(left) = self.get_left(node) {
            node = left;
        }
        node
    }

    fn subtree_maximum(&self, mut node: Index) -> Index {
        while let Some(right) = self.get_right(node) {
            node = right;
        }
        node
    }

    fn next_node(&self, node: Index) -> Option<Index> {
        if let Some(right) = self.get_right(node) {
            return Some(self.subtree_minimum(right));
        }
        // Climb until we arrive from a left child
        let mut current = node;
        while self.get_node_type(current) == NodeType::RightChild {
            current = self.get_parent(current)?;
        }
        self.get_parent(current)
    }

    fn prev_node(&self, node: Index) -> Option<Index> {
        if let Some(left) = self.get_left(node) {
            return Some(self.subtree_maximum(left));
        }
        let mut current = node;
        while self.get_node_type(current) == NodeType::LeftChild {
            current = self.get_parent(current)?;
        }
        self.get_parent(current)
    }

    // Rebalances the tree after inserting a new red node
    fn insert_fixup(&mut self, mut node: Index) {
        loop {
            let mut parent = match self.get_parent(node) {
                Some(parent) => parent,
                None => {
                    // The climb reached the root
                    self.set_color(node, Color::Black);
                    return;
                }
            };
            if self.get_color(Some(parent)) == Color::Black {
                return;
            }
            // The root is kept black, so a red parent normally has a parent of
            // its own. Should a red root slip through, blackening it is enough.
            let grandparent = match self.get_parent(parent) {
                Some(grandparent) => grandparent,
                None => {
                    self.set_color(parent, Color::Black);
                    return;
                }
            };
            let parent_side = match self.get_node_type(parent) {
                NodeType::LeftChild => Side::Left,
                _ => Side::Right,
            };
            let uncle = self.get_child(grandparent, parent_side.opposite());

            let red_uncle = uncle.filter(|uncle| self.get_color(Some(*uncle)) == Color::Red);
            if let Some(uncle) = red_uncle {
                trace!("Insert case 1 at {:?}: recoloring and moving up", node);
                self.set_color(uncle, Color::Black);
                self.set_color(parent, Color::Black);
                self.set_color(grandparent, Color::Red);
                node = grandparent;
                continue;
            }

            if self.get_child(parent, parent_side) != Some(node) {
                // Inner child, rotate it to the outside
                trace!("Insert case 2 at {:?}", node);
                self.rotate(parent, parent_side);
                // The old parent now hangs below the node
                let rotated = node;
                node = parent;
                parent = rotated;
            }

            trace!("Insert case 3 at {:?}", node);
            self.set_color(parent, Color::Black);
            self.set_color(grandparent, Color::Red);
            self.rotate(grandparent, parent_side.opposite());
            return;
        }
    }

    // Restores black heights after a black node was unlinked above `node`.
    // `node` may be an empty position, so its parent is tracked alongside it.
    fn delete_fixup(&mut self, mut node: Option<Index>, mut parent: Option<Index>) {
        while node != self.root && self.get_color(node) == Color::Black {
            let node_parent = match parent {
                Some(node_parent) => node_parent,
                None => break,
            };
            let side = if self.get_left(node_parent) == node {
                Side::Left
            } else {
                Side::Right
            };

            let mut sibling = self.get_child(node_parent, side.opposite());
            let red_sibling =
                sibling.filter(|sibling| self.get_color(Some(*sibling)) == Color::Red);
            if let Some(red_sibling) = red_sibling {
                trace!("Delete case 1 under {:?}", node_parent);
                self.set_color(red_sibling, Color::Black);
                self.set_color(node_parent, Color::Red);
                self.rotate(node_parent, side);
                sibling = self.get_child(node_parent, side.opposite());
            }

            let mut sibling = match sibling {
                Some(sibling) => sibling,
                None => {
                    // Nothing to borrow from, push the deficit up
                    node = Some(node_parent);
                    parent = self.get_parent(node_parent);
                    continue;
                }
            };

            let near = self.get_child(sibling, side);
            let far = self.get_child(sibling, side.opposite());
            if self.get_color(near) == Color::Black && self.get_color(far) == Color::Black {
                trace!("Delete case 2 under {:?}", node_parent);
                self.set_color(sibling, Color::Red);
                node = Some(node_parent);
                parent = self.get_parent(node_parent);
                continue;
            }

            if self.get_color(far) == Color::Black {
                trace!("Delete case 3 under {:?}", node_parent);
                if let Some(near) = near {
                    self.set_color(near, Color::Black);
                }
                self.set_color(sibling, Color::Red);
                self.rotate(sibling, side.opposite());
                sibling = match self.get_child(node_parent, side.opposite()) {
                    Some(sibling) => sibling,
                    None => break,
                };
            }

            trace!("Delete case 4 under {:?}", node_parent);
            self.set_color(sibling, self.get_color(Some(node_parent)));
            self.set_color(node_parent, Color::Black);
            if let Some(far) = self.get_child(sibling, side.opposite()) {
                self.set_color(far, Color::Black);
            }
            self.rotate(node_parent, side);
            node = self.root;
            parent = None;
        }
        if let Some(node) = node {
            self.set_color(node, Color::Black);
        }
    }

    // Puts the subtree at `replacement` where the subtree at `node` used to hang.
    // Neither node's own children are touched.
    fn transplant(&mut self, node: Index, replacement: Option<Index>) {
        let parent = self.get_parent(node);
        self.replace_child(parent, node, replacement);
        if let Some(replacement) = replacement {
            self.set_parent(replacement, parent);
        }
    }

    // Points whichever link of `parent` held `old` (or the root) at `new`
    fn replace_child(&mut self, parent: Option<Index>, old: Index, new: Option<Index>) {
        match parent {
            None => self.root = new,
            Some(parent) if self.get_left(parent) == Some(old) => self.set_left(parent, new),
            Some(parent) => self.set_right(parent, new),
        }
    }

    // Rotates `rotation_root` down towards `side`
    fn rotate(&mut self, rotation_root: Index, side: Side) {
        match side {
            Side::Left => self.left_rotate(rotation_root),
            Side::Right => self.right_rotate(rotation_root),
        }
    }

    // Roates the nodes to the left
    //    p              q
    //   / \            / \
    //  a   q   -->    p   c
    //     / \        / \
    //    b   c      a   b
    fn left_rotate(&mut self, rotation_root: Index) {
        // Left rotation so pivot is to the right
        let pivot = match self.get_right(rotation_root) {
            Some(pivot) => pivot,
            None => return,
        };
        trace!("Rotating {:?} left", rotation_root);
        let pivot_left = self.get_left(pivot);
        let parent = self.get_parent(rotation_root);
        // The left child of the pivot becomes the right child of the rotation root
        self.set_right(rotation_root, pivot_left);
        if let Some(pivot_left) = pivot_left {
            self.set_parent(pivot_left, Some(rotation_root));
        }

        // The pivot replaces the rotation root in the tree
        self.set_parent(pivot, parent);
        self.replace_child(parent, rotation_root, Some(pivot));

        // Set the left child of the pivot to be the rotation root
        self.set_left(pivot, Some(rotation_root));
        self.set_parent(rotation_root, Some(pivot));
    }

    // Rotates the nodes to the right
    //     q             p
    //    / \           / \
    //   p   c  -->    a   q
    //  / \               / \
    // a   b             b   c
    fn right_rotate(&mut self, rotation_root: Index) {
        // Right rotation so pivot is to the left
        let pivot = match self.get_left(rotation_root) {
            Some(pivot) => pivot,
            None => return,
        };
        trace!("Rotating {:?} right", rotation_root);
        let pivot_right = self.get_right(pivot);
        let parent = self.get_parent(rotation_root);
        // The right child of the pivot becomes the left child of the rotation root
        self.set_left(rotation_root, pivot_right);
        if let Some(pivot_right) = pivot_right {
            self.set_parent(pivot_right, Some(rotation_root));
        }

        // The pivot replaces the rotation root in the tree
        self.set_parent(pivot, parent);
        self.replace_child(parent, rotation_root, Some(pivot));

        // Set the right child of the pivot to be the rotation root
        self.set_right(pivot, Some(rotation_root));
        self.set_parent(rotation_root, Some(pivot));
    }

    // Returns a NodeType enum indicating if the given node is a left child, right child in
    // relation to it's parent or an orphan
    pub(crate) fn get_node_type(&self, node: Index) -> NodeType {
        match self.get_parent(node) {
            Some(parent) if self.get_left(parent) == Some(node) => NodeType::LeftChild,
            Some(_) => NodeType::RightChild,
            // Not a child node at all
            None => NodeType::Orphan,
        }
    }

    // Getter and setters. Handles reaching these have already been checked,
    // so indexing the arena directly is fine.
    fn get_child(&self, node: Index, side: Side) -> Option<Index> {
        match side {
            Side::Left => self.get_left(node),
            Side::Right => self.get_right(node),
        }
    }

    fn set_right(&mut self, node: Index, right: Option<Index>) {
        self.nodes[node].right = right;
    }

    pub(crate) fn get_right(&self, node: Index) -> Option<Index> {
        self.nodes[node].right
    }

    fn set_left(&mut self, node: Index, left: Option<Index>) {
        self.nodes[node].left = left;
    }

    pub(crate) fn get_left(&self, node: Index) -> Option<Index> {
        self.nodes[node].left
    }

    fn set_parent(&mut self, node: Index, parent: Option<Index>) {
        self.nodes[node].parent = parent;
    }

    pub(crate) fn get_parent(&self, node: Index) -> Option<Index> {
        self.nodes[node].parent
    }

    fn set_color(&mut self, node: Index, color: Color) {
        self.nodes[node].color = color;
    }

    // Absent nodes count as black leaves
    pub(crate) fn get_color(&self, node: Option<Index>) -> Color {
        node.and_then(|node| self.nodes.get(node))
            .map_or(Color::Black, |node| node.color)
    }
}

impl<K: Ord> Tree<K> {
    /// Links the detached `node` into the tree by its key and rebalances.
    /// Equal keys are placed to the right of the ones already present.
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the handle is stale or foreign, `AlreadyLinked` if the
    /// node is already part of the tree.
    pub fn insert(&mut self, node: NodeId) -> Result<(), TreeError> {
        let node = self.check_detached(node)?;

        let mut parent = None;
        let mut went_left = false;
        let mut current = self.root;
        while let Some(existing) = current {
            parent = Some(existing);
            went_left = self.nodes[node].key < self.nodes[existing].key;
            current = if went_left {
                self.get_left(existing)
            } else {
                self.get_right(existing)
            };
        }

        self.set_parent(node, parent);
        match parent {
            None => self.root = Some(node),
            Some(parent) if went_left => self.set_left(parent, Some(node)),
            Some(parent) => self.set_right(parent, Some(node)),
        }
        self.set_color(node, Color::Red);
        self.len += 1;
        debug!("Inserted node {:?} under {:?}", node, parent);

        self.insert_fixup(node);
        Ok(())
    }

    /// Convenience for [`Tree::create_node`] followed by [`Tree::insert`].
    ///
    /// # Errors
    ///
    /// None in practice, a freshly created node is always detached.
    pub fn insert_key(&mut self, key: K) -> Result<NodeId, TreeError> {
        let node = self.create_node(key);
        self.insert(node)?;
        Ok(node)
    }

    /// Unlinks `node` from the tree and rebalances. The node stays allocated and
    /// can be inserted again or disposed of with [`Tree::release`].
    ///
    /// # Errors
    ///
    /// `NotInTree` if the node belongs to another tree or cannot be reached from
    /// the root, `InvalidNode` if the handle is stale.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        if node.tree != self.id {
            debug!("Node {:?} belongs to another tree", node);
            return Err(TreeError::NotInTree(node));
        }
        let handle = node;
        let node = self.resolve(handle)?;
        if !self.is_reachable(node) {
            debug!("Node {:?} is not reachable from the root", handle);
            return Err(TreeError::NotInTree(handle));
        }

        let left = self.get_left(node);
        let right = self.get_right(node);
        let removed_color;
        let replacement;
        let replacement_parent;
        match (left, right) {
            (None, _) | (_, None) => {
                // At most one child, which moves up into the node's slot
                removed_color = self.get_color(Some(node));
                replacement = left.or(right);
                replacement_parent = self.get_parent(node);
                self.transplant(node, replacement);
            }
            (Some(left), Some(right)) => {
                // The successor takes the node's place and color
                let successor = self.subtree_minimum(right);
                removed_color = self.get_color(Some(successor));
                replacement = self.get_right(successor);
                if successor == right {
                    replacement_parent = Some(successor);
                } else {
                    replacement_parent = self.get_parent(successor);
                    self.transplant(successor, replacement);
                    self.set_right(successor, Some(right));
                    self.set_parent(right, Some(successor));
                }
                self.transplant(node, Some(successor));
                self.set_left(successor, Some(left));
                self.set_parent(left, Some(successor));
                self.set_color(successor, self.get_color(Some(node)));
            }
        }

        self.nodes[node].unlink();
        self.len -= 1;
        debug!("Removed node {:?}", handle);

        if removed_color == Color::Black {
            self.delete_fixup(replacement, replacement_parent);
        }
        Ok(())
    }

    /// Finds the first node, in key order, whose key equals `key`.
    pub fn search(&self, key: &K) -> Option<NodeId> {
        let mut found = None;
        let mut current = self.root;
        while let Some(node) = current {
            current = match key.cmp(&self.nodes[node].key) {
                Ordering::Less => self.get_left(node),
                Ordering::Greater => self.get_right(node),
                Ordering::Equal => {
                    found = Some(node);
                    self.get_left(node)
                }
            };
        }
        found.map(|node| self.handle(node))
    }

    /// Removes the first node holding `key` and returns the key it held.
    pub fn delete(&mut self, key: &K) -> Option<K> {
        let node = self.search(key)?;
        self.remove(node).ok()?;
        self.release(node).ok()
    }

    /// Whether `node` belongs to this tree and can be reached from the root by
    /// following its key.
    pub fn contains_node(&self, node: NodeId) -> bool {
        match self.resolve(node) {
            Ok(index) => self.is_reachable(index),
            Err(_) => false,
        }
    }

    fn is_reachable(&self, target: Index) -> bool {
        self.descend_to(self.root, target, &self.nodes[target].key)
    }

    // Rotations can leave equal keys on either side of each other, so both
    // subtrees of an equal node are searched.
    fn descend_to(&self, from: Option<Index>, target: Index, key: &K) -> bool {
        let mut current = from;
        while let Some(node) = current {
            if node == target {
                return true;
            }
            current = match key.cmp(&self.nodes[node].key) {
                Ordering::Less => self.get_left(node),
                Ordering::Greater => self.get_right(node),
                Ordering::Equal => {
                    if self.descend_to(self.get_left(node), target, key) {
                        return true;
                    }
                    self.get_right(node)
                }
            };
        }
        false
    }
}

/// In-order iterator over a tree, yielding each node's handle and key.
pub struct Iter<'a, K> {
    tree: &'a Tree<K>,
    next: Option<Index>,
    remaining: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = (NodeId, &'a K);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = self.tree.next_node(node);
        self.remaining = self.remaining.saturating_sub(1);
        Some((self.tree.handle(node), &self.tree.nodes[node].key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K> ExactSizeIterator for Iter<'a, K> {}

impl<'a, K> IntoIterator for &'a Tree<K> {
    type Item = (NodeId, &'a K);
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
