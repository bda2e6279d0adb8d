//! A red-black tree whose nodes live in a generational arena.
//!
//! The tree keeps its keys ordered and guarantees O(log n) insertion, removal
//! and navigation. Nodes live in an arena and are addressed by [`NodeId`]
//! handles that only the tree which created them accepts; parent links are plain
//! indices and never keep a node alive.
//!
//! ```
//! use red_black_tree::Tree;
//!
//! let mut tree = Tree::new();
//! for key in [10, 20, 30].iter() {
//!     tree.insert_key(*key).unwrap();
//! }
//! let root = tree.root().unwrap();
//! assert_eq!(tree.key(root), Some(&20));
//!
//! let first = tree.first().unwrap();
//! let second = tree.successor(first).unwrap().unwrap();
//! assert_eq!(tree.key(second), Some(&20));
//!
//! assert_eq!(tree.delete(&20), Some(20));
//! assert_eq!(tree.len(), 2);
//! ```

mod error;
mod node;
mod tree;
mod validate;

pub use error::{InvariantViolation, TreeError};
pub use node::{Color, Node, NodeId};
pub use tree::{Iter, Tree};
