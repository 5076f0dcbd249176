//! # avl-rs
//!
//! An ordered map backed by an AVL tree whose nodes live in a single arena.
//!
//! Every node caches the height of its subtree. Insertion descends by key,
//! links the new node in, and on the way back up recomputes heights and
//! applies at most one single or double rotation per unbalanced node, so the
//! balance factor stays within `-1..=1` everywhere.
//!
//! ## Example
//!
//! ```rust
//! use avl_rs::AvlTree;
//!
//! let mut tree: AvlTree<i32, i32> = AvlTree::new();
//! *tree.get_or_insert_default(3) = 6;
//! *tree.get_or_insert_default(2) = 3;
//! tree.insert(4, 1);
//! tree.insert(5, 1);
//! tree.insert(8, 7);
//!
//! assert!(tree.contains_key(&5));
//! assert_eq!(tree.get(&8), Some(&7));
//! assert_eq!(tree.height(), 3);
//! assert_eq!(tree.bfs_dump(), "3 # 2 5 # 4 8\n");
//! ```

#![forbid(unsafe_code)]

mod error;

pub use error::{AvlError, Result};

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace};

// =============================================================================
// Configuration
// =============================================================================

/// Largest number of nodes the arena can address (`u32::MAX` is `Ptr::NULL`).
const MAX_NODES: usize = u32::MAX as usize;

const EMPTY_TREE_MARKER: &str = "[empty tree]";
const LEVEL_SEPARATOR: &str = " # ";

/// Construction settings for an [`AvlTree`].
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Node slots reserved in the arena up front.
    pub initial_capacity: usize,
}

// =============================================================================
// Pointer type
// =============================================================================

/// Arena slot index. `NULL` stands for an absent subtree.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Ptr(u32);

impl Ptr {
    const NULL: Ptr = Ptr(u32::MAX);

    #[inline]
    fn is_null(self) -> bool {
        self == Self::NULL
    }

    #[inline]
    fn idx(self) -> usize {
        debug_assert!(!self.is_null());
        self.0 as usize
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    /// Height of the subtree rooted here; a leaf is 1.
    height: u8,
    left: Ptr,
    right: Ptr,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, value: V) -> Self {
        Self {
            key,
            value,
            height: 1,
            left: Ptr::NULL,
            right: Ptr::NULL,
        }
    }
}

/// Outcome of one recursive insertion step.
#[derive(Clone, Copy)]
struct Placed {
    /// Root of the subtree after rebalancing.
    root: Ptr,
    /// Slot holding the inserted (or already present) key.
    slot: Ptr,
    created: bool,
}

// =============================================================================
// AvlTree
// =============================================================================

/// A height-balanced binary search tree map.
///
/// Nodes are stored in a `Vec` and linked by slot index. Each slot is linked
/// from exactly one parent (or from the root), so the tree owns every node
/// exactly once and dropping it releases each node once, children before
/// their parent.
///
/// Inserting a key that is already present leaves the stored value alone;
/// use [`AvlTree::get_or_insert_default`] to update a value in place.
#[derive(Clone)]
pub struct AvlTree<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Ptr,
}

impl<K, V> AvlTree<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: Ptr::NULL,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config {
            initial_capacity: capacity,
        })
    }

    pub fn with_config(config: Config) -> Self {
        debug!(
            initial_capacity = config.initial_capacity,
            "creating avl tree"
        );
        Self {
            nodes: Vec::with_capacity(config.initial_capacity.min(MAX_NODES)),
            root: Ptr::NULL,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Height of the whole tree; `0` when empty.
    #[inline]
    pub fn height(&self) -> usize {
        usize::from(self.height_of(self.root))
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node<K, V>>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Reserve arena space for `additional` more nodes.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        if self.nodes.len().saturating_add(additional) > MAX_NODES {
            return Err(AvlError::CapacityExceeded { max: MAX_NODES });
        }
        self.nodes.try_reserve(additional)?;
        Ok(())
    }

    /// Release every node and leave an empty, reusable tree.
    ///
    /// Nodes are dropped in post-order: both children of a node are gone
    /// before the node itself.
    pub fn clear(&mut self) {
        let released = self.release_post_order();
        debug!(released, "cleared avl tree");
    }

    fn release_post_order(&mut self) -> usize {
        let count = self.nodes.len();
        if std::mem::needs_drop::<Node<K, V>>() && !self.root.is_null() {
            let order = self.post_order_slots();
            let mut slots: Vec<Option<Node<K, V>>> =
                std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
            for ptr in order {
                drop(slots[ptr.idx()].take());
            }
            debug_assert!(slots.iter().all(Option::is_none), "unreachable node slot");
        }
        self.nodes.clear();
        self.root = Ptr::NULL;
        count
    }

    fn post_order_slots(&self) -> Vec<Ptr> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(ptr) = stack.pop() {
            if ptr.is_null() {
                continue;
            }
            out.push(ptr);
            let node = &self.nodes[ptr.idx()];
            stack.push(node.left);
            stack.push(node.right);
        }
        // Node, right, left reversed is left, right, node.
        out.reverse();
        out
    }

    #[inline]
    fn height_of(&self, ptr: Ptr) -> u8 {
        if ptr.is_null() {
            0
        } else {
            self.nodes[ptr.idx()].height
        }
    }

    #[inline]
    fn balance_of(&self, ptr: Ptr) -> i32 {
        let node = &self.nodes[ptr.idx()];
        i32::from(self.height_of(node.left)) - i32::from(self.height_of(node.right))
    }

    #[inline]
    fn update_height(&mut self, ptr: Ptr) {
        let node = &self.nodes[ptr.idx()];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes[ptr.idx()].height = height;
    }

    /// Rotate `ptr` down to the right; its left child becomes the subtree root.
    fn rotate_right(&mut self, ptr: Ptr) -> Ptr {
        let l = self.nodes[ptr.idx()].left;
        let lr = self.nodes[l.idx()].right;

        self.nodes[l.idx()].right = ptr;
        self.nodes[ptr.idx()].left = lr;

        self.update_height(ptr);
        self.update_height(l);

        trace!(pivot = ptr.0, new_root = l.0, "right rotation");
        l
    }

    /// Rotate `ptr` down to the left; its right child becomes the subtree root.
    fn rotate_left(&mut self, ptr: Ptr) -> Ptr {
        let r = self.nodes[ptr.idx()].right;
        let rl = self.nodes[r.idx()].left;

        self.nodes[r.idx()].left = ptr;
        self.nodes[ptr.idx()].right = rl;

        self.update_height(ptr);
        self.update_height(r);

        trace!(pivot = ptr.0, new_root = r.0, "left rotation");
        r
    }

    fn alloc(&mut self, key: K, value: V) -> Ptr {
        assert!(self.nodes.len() < MAX_NODES, "AvlTree capacity overflow");
        let ptr = Ptr(self.nodes.len() as u32);
        self.nodes.push(Node::leaf(key, value));
        ptr
    }

    /// Iterate entries in key order. Used by `Debug` and the structural tests.
    fn in_order(&self) -> InOrder<'_, K, V> {
        InOrder {
            tree: self,
            stack: Vec::new(),
            cursor: self.root,
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut current = self.root;
        while !current.is_null() {
            let node = &self.nodes[current.idx()];
            current = match key.cmp(&node.key) {
                Ordering::Greater => node.right,
                Ordering::Less => node.left,
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert `key` with `value`.
    ///
    /// Returns `false` and drops `value` without touching the stored one when
    /// `key` is already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.place(key, move || value).created
    }

    /// Like [`AvlTree::insert`], but reports allocation failure instead of
    /// aborting.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<bool> {
        self.try_reserve(1)?;
        Ok(self.insert(key, value))
    }

    /// Return the value stored under `key`, inserting one built by `f` if the
    /// key is absent. `f` only runs when a node is created.
    pub fn get_or_insert_with<F>(&mut self, key: K, f: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let placed = self.place(key, f);
        &mut self.nodes[placed.slot.idx()].value
    }

    fn place<F>(&mut self, key: K, make: F) -> Placed
    where
        F: FnOnce() -> V,
    {
        let placed = self.insert_at(self.root, key, make);
        self.root = placed.root;
        placed
    }

    fn insert_at<F>(&mut self, ptr: Ptr, key: K, make: F) -> Placed
    where
        F: FnOnce() -> V,
    {
        if ptr.is_null() {
            let slot = self.alloc(key, make());
            return Placed {
                root: slot,
                slot,
                created: true,
            };
        }

        let placed = match key.cmp(&self.nodes[ptr.idx()].key) {
            Ordering::Greater => {
                let right = self.nodes[ptr.idx()].right;
                let placed = self.insert_at(right, key, make);
                self.nodes[ptr.idx()].right = placed.root;
                placed
            }
            Ordering::Less => {
                let left = self.nodes[ptr.idx()].left;
                let placed = self.insert_at(left, key, make);
                self.nodes[ptr.idx()].left = placed.root;
                placed
            }
            Ordering::Equal => {
                return Placed {
                    root: ptr,
                    slot: ptr,
                    created: false,
                }
            }
        };

        // Nothing below changed shape.
        if !placed.created {
            return Placed { root: ptr, ..placed };
        }

        self.update_height(ptr);
        let bf = self.balance_of(ptr);

        let root = if bf > 1 {
            let left = self.nodes[ptr.idx()].left;
            if self.key_lt(placed.slot, left) {
                self.rotate_right(ptr)
            } else {
                let new_left = self.rotate_left(left);
                self.nodes[ptr.idx()].left = new_left;
                self.rotate_right(ptr)
            }
        } else if bf < -1 {
            let right = self.nodes[ptr.idx()].right;
            if self.key_lt(right, placed.slot) {
                self.rotate_left(ptr)
            } else {
                let new_right = self.rotate_right(right);
                self.nodes[ptr.idx()].right = new_right;
                self.rotate_left(ptr)
            }
        } else {
            ptr
        };

        Placed { root, ..placed }
    }

    #[inline]
    fn key_lt(&self, a: Ptr, b: Ptr) -> bool {
        self.nodes[a.idx()].key < self.nodes[b.idx()].key
    }
}

impl<K: Ord, V: Default> AvlTree<K, V> {
    /// Return the value stored under `key`, inserting `V::default()` first if
    /// the key is absent. An existing value is never reset.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V {
        self.get_or_insert_with(key, V::default)
    }

    pub fn try_get_or_insert_default(&mut self, key: K) -> Result<&mut V> {
        self.try_reserve(1)?;
        Ok(self.get_or_insert_default(key))
    }
}

impl<K: fmt::Display, V> AvlTree<K, V> {
    /// Breadth-first rendering of the keys, one ` # `-separated group per level.
    pub fn level_order(&self) -> LevelOrder<'_, K, V> {
        LevelOrder { tree: self }
    }

    /// [`AvlTree::level_order`] with a trailing newline.
    pub fn bfs_dump(&self) -> String {
        format!("{}\n", self.level_order())
    }

    pub fn print_bfs(&self) {
        println!("{}", self.level_order());
    }
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for AvlTree<K, V> {
    fn drop(&mut self) {
        self.release_post_order();
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.in_order()).finish()
    }
}

/// Display adapter returned by [`AvlTree::level_order`].
pub struct LevelOrder<'a, K, V> {
    tree: &'a AvlTree<K, V>,
}

impl<K: fmt::Display, V> fmt::Display for LevelOrder<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree;
        if tree.root.is_null() {
            return f.write_str(EMPTY_TREE_MARKER);
        }

        let mut queue = VecDeque::from([tree.root]);
        let mut first_level = true;
        while !queue.is_empty() {
            if !first_level {
                f.write_str(LEVEL_SEPARATOR)?;
            }
            first_level = false;

            let level = queue.len();
            for i in 0..level {
                let Some(ptr) = queue.pop_front() else {
                    break;
                };
                let node = &tree.nodes[ptr.idx()];
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", node.key)?;

                if !node.left.is_null() {
                    queue.push_back(node.left);
                }
                if !node.right.is_null() {
                    queue.push_back(node.right);
                }
            }
        }
        Ok(())
    }
}

struct InOrder<'a, K, V> {
    tree: &'a AvlTree<K, V>,
    stack: Vec<Ptr>,
    cursor: Ptr,
}

impl<'a, K, V> Iterator for InOrder<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.cursor.is_null() {
            self.stack.push(self.cursor);
            self.cursor = self.tree.nodes[self.cursor.idx()].left;
        }
        let tree = self.tree;
        let ptr = self.stack.pop()?;
        let node = &tree.nodes[ptr.idx()];
        self.cursor = node.right;
        Some((&node.key, &node.value))
    }
}


#[cfg(test)]
mod proptests;
