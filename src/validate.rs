use generational_arena::Index;

use crate::error::InvariantViolation;
use crate::node::Color;
use crate::tree::Tree;

impl<K: Ord> Tree<K> {
    /// Walks the whole tree and checks every red-black and ordering invariant,
    /// along with the parent links and the node count.
    ///
    /// Returns the black height of the root, counting the absent leaves, so an
    /// empty tree reports 1 and a lone black root reports 2.
    ///
    /// # Errors
    ///
    /// The first [`InvariantViolation`] found.
    pub fn validate(&self) -> Result<usize, InvariantViolation> {
        let root = self.root().map(|root| root.index);
        if let Some(root) = root {
            if self.get_color(Some(root)) == Color::Red {
                return Err(InvariantViolation::RedRoot);
            }
            if self.get_parent(root).is_some() {
                return Err(InvariantViolation::RootHasParent);
            }
        }

        let mut found = 0;
        let black_height = self.check_black_heights(root, &mut found)?;
        if found != self.len() {
            return Err(InvariantViolation::LengthMismatch {
                expected: self.len(),
                found,
            });
        }

        let mut previous: Option<&K> = None;
        for (node, key) in self.iter() {
            if previous.map_or(false, |previous| key < previous) {
                return Err(InvariantViolation::OutOfOrder { node });
            }
            previous = Some(key);
        }

        Ok(black_height)
    }

    fn check_black_heights(
        &self,
        node: Option<Index>,
        found: &mut usize,
    ) -> Result<usize, InvariantViolation> {
        let node = match node {
            Some(node) => node,
            None => return Ok(1),
        };
        *found += 1;

        let left = self.get_left(node);
        let right = self.get_right(node);
        for child in [left, right].iter().flatten() {
            if self.get_parent(*child) != Some(node) {
                return Err(InvariantViolation::BrokenParentLink {
                    node: self.handle(*child),
                });
            }
            let node_is_red = self.get_color(Some(node)) == Color::Red;
            if node_is_red && self.get_color(Some(*child)) == Color::Red {
                return Err(InvariantViolation::RedRedViolation {
                    node: self.handle(node),
                });
            }
        }

        let left_height = self.check_black_heights(left, found)?;
        let right_height = self.check_black_heights(right, found)?;
        if left_height != right_height {
            return Err(InvariantViolation::BlackHeightMismatch {
                node: self.handle(node),
                left: left_height,
                right: right_height,
            });
        }
        if self.get_color(Some(node)) == Color::Red {
            Ok(left_height)
        } else {
            Ok(left_height + 1)
        }
    }
}
