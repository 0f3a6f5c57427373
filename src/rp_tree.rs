//! Assignment tree
//!
//! A binary tree over member identifiers whose only job is to produce a
//! canonical member order (`left_to_right`). Nodes live in an arena and link
//! to each other by index; the parent link is a plain back-reference.
//!
//! Two construction families exist:
//!
//! - **ordered**: the identifier list is read as the breadth-first layout of
//!   a complete binary tree (`parent(i) = (i - 1) / 2`).
//! - **balanced**: identifiers are inserted one by one, each descending to
//!   the child subtree with fewer leaves until a free slot is found. Already
//!   placed identifiers never move when more are inserted.

use crate::rp_interface::TreePolicy;
use rand::Rng;
use std::fmt;

pub type NodeIndex = usize;

/// Side preference used by the builders
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

impl Direction {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Direction::LeftToRight
        } else {
            Direction::RightToLeft
        }
    }
}

#[derive(Debug, Clone)]
struct TreeNode<T> {
    value: T,
    left: Option<NodeIndex>,
    right: Option<NodeIndex>,
    parent: Option<NodeIndex>,
}

#[derive(Debug, Clone)]
pub struct AssignmentTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: Option<NodeIndex>,
}

impl<T> Default for AssignmentTree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<T: Clone> AssignmentTree<T> {
    /// Build a tree over `values` according to `policy`.
    ///
    /// `rng` is only consulted by `TreePolicy::BalancedRandom`, which draws a
    /// fresh direction for every insertion.
    pub fn build<R: Rng>(policy: TreePolicy, values: &[T], rng: &mut R) -> Self {
        match policy {
            TreePolicy::OrderedLtoR => Self::ordered(values, Direction::LeftToRight),
            TreePolicy::OrderedRtoL => Self::ordered(values, Direction::RightToLeft),
            TreePolicy::BalancedLtoR => Self::balanced(values, || Direction::LeftToRight),
            TreePolicy::BalancedRtoL => Self::balanced(values, || Direction::RightToLeft),
            TreePolicy::BalancedRandom => Self::balanced(values, || Direction::random(&mut *rng)),
        }
    }

    /// Complete binary tree in breadth-first order. With `LeftToRight` odd
    /// indices become left children; `RightToLeft` swaps the sides.
    pub fn ordered(values: &[T], direction: Direction) -> Self {
        let mut tree = Self::default();
        for (index, value) in values.iter().enumerate() {
            let node = tree.push(value.clone());
            if index == 0 {
                tree.root = Some(node);
                continue;
            }
            let parent = (index - 1) / 2;
            let odd = index % 2 == 1;
            let as_left = odd == (direction == Direction::LeftToRight);
            tree.attach(parent, node, as_left);
        }
        tree
    }

    /// Insert `values` one at a time, asking `direction` for the tie-break
    /// and fill order of each insertion.
    pub fn balanced(values: &[T], mut direction: impl FnMut() -> Direction) -> Self {
        let mut tree = Self::default();
        for value in values {
            if tree.root.is_none() {
                let root = tree.push(value.clone());
                tree.root = Some(root);
            } else {
                let dir = direction();
                tree.insert_balanced(value.clone(), dir);
            }
        }
        tree
    }

    fn insert_balanced(&mut self, value: T, direction: Direction) {
        let Some(mut current) = self.root else {
            return;
        };
        let node = self.push(value);
        let prefer_left = direction == Direction::LeftToRight;

        loop {
            let (left, right) = (self.nodes[current].left, self.nodes[current].right);
            match (left, right) {
                (None, None) => {
                    self.attach(current, node, prefer_left);
                    return;
                }
                (None, Some(_)) => {
                    self.attach(current, node, true);
                    return;
                }
                (Some(_), None) => {
                    self.attach(current, node, false);
                    return;
                }
                (Some(l), Some(r)) => {
                    let (left_leaves, right_leaves) = (self.leaf_count(l), self.leaf_count(r));
                    current = if left_leaves < right_leaves {
                        l
                    } else if right_leaves < left_leaves {
                        r
                    } else if prefer_left {
                        l
                    } else {
                        r
                    };
                }
            }
        }
    }
}

impl<T> AssignmentTree<T> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn value(&self, node: NodeIndex) -> &T {
        &self.nodes[node].value
    }

    pub fn left(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes[node].left
    }

    pub fn right(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes[node].right
    }

    pub fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes[node].parent
    }

    /// Number of levels, 0 for an empty tree
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut deepest = 0;
        let mut stack = vec![(root, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(self.children(node).map(|child| (child, level + 1)));
        }
        deepest
    }

    pub fn leftmost(&self, from: NodeIndex) -> NodeIndex {
        let mut node = from;
        while let Some(left) = self.nodes[node].left {
            node = left;
        }
        node
    }

    /// Canonical member order.
    ///
    /// Starting at the leftmost node: emit it, emit its right subtree, then
    /// climb while the current node is a left child, emitting each parent
    /// followed by that parent's right subtree. The climb stops at a right
    /// child, which bounds a recursive call to the subtree it started in.
    pub fn left_to_right(&self) -> Vec<&T> {
        self.left_to_right_indices()
            .into_iter()
            .map(|index| &self.nodes[index].value)
            .collect()
    }

    pub fn left_to_right_indices(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if let Some(root) = self.root {
            self.collect_left_to_right(root, &mut order);
        }
        order
    }

    fn collect_left_to_right(&self, from: NodeIndex, order: &mut Vec<NodeIndex>) {
        let mut current = self.leftmost(from);
        order.push(current);
        if let Some(right) = self.nodes[current].right {
            self.collect_left_to_right(right, order);
        }

        while let Some(parent) = self.nodes[current].parent {
            if self.nodes[parent].left != Some(current) {
                break;
            }
            order.push(parent);
            current = parent;
            if let Some(right) = self.nodes[current].right {
                self.collect_left_to_right(right, order);
            }
        }
    }

    fn push(&mut self, value: T) -> NodeIndex {
        self.nodes.push(TreeNode {
            value,
            left: None,
            right: None,
            parent: None,
        });
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: NodeIndex, child: NodeIndex, as_left: bool) {
        if as_left {
            self.nodes[parent].left = Some(child);
        } else {
            self.nodes[parent].right = Some(child);
        }
        self.nodes[child].parent = Some(parent);
    }

    fn children(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> {
        let node = &self.nodes[node];
        node.left.into_iter().chain(node.right)
    }

    fn leaf_count(&self, from: NodeIndex) -> usize {
        let mut leaves = 0;
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            let before = stack.len();
            stack.extend(self.children(node));
            if stack.len() == before {
                leaves += 1;
            }
        }
        leaves
    }
}

impl<T: PartialEq> AssignmentTree<T> {
    pub fn find(&self, value: &T) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| &node.value == value)
    }
}

impl<T: fmt::Display> AssignmentTree<T> {
    fn fmt_subtree(&self, node: NodeIndex, level: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(right) = self.nodes[node].right {
            self.fmt_subtree(right, level + 1, f)?;
        }
        writeln!(f, "{}{}", "    ".repeat(level), self.nodes[node].value)?;
        if let Some(left) = self.nodes[node].left {
            self.fmt_subtree(left, level + 1, f)?;
        }
        Ok(())
    }
}

/// Sideways rendering: root on the left, right subtree above it.
impl<T: fmt::Display> fmt::Display for AssignmentTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Some(root) => self.fmt_subtree(root, 0, f),
            None => writeln!(f, "<empty>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn letters(n: usize) -> Vec<char> {
        ('a'..='z').take(n).collect()
    }

    fn order(tree: &AssignmentTree<char>) -> String {
        tree.left_to_right().into_iter().collect()
    }

    fn child_value(tree: &AssignmentTree<char>, node: Option<NodeIndex>) -> Option<char> {
        node.map(|n| *tree.value(n))
    }

    #[test]
    fn test_ordered_ltor_complete_layout() {
        let tree = AssignmentTree::ordered(&letters(7), Direction::LeftToRight);

        let a = tree.root().unwrap();
        assert_eq!(*tree.value(a), 'a');
        let b = tree.left(a).unwrap();
        let c = tree.right(a).unwrap();
        assert_eq!((*tree.value(b), *tree.value(c)), ('b', 'c'));
        assert_eq!(child_value(&tree, tree.left(b)), Some('d'));
        assert_eq!(child_value(&tree, tree.right(b)), Some('e'));
        assert_eq!(child_value(&tree, tree.left(c)), Some('f'));
        assert_eq!(child_value(&tree, tree.right(c)), Some('g'));
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(a), None);

        assert_eq!(order(&tree), "dbeafcg");
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_ordered_rtol_mirrors_layout() {
        let tree = AssignmentTree::ordered(&letters(7), Direction::RightToLeft);

        let a = tree.root().unwrap();
        assert_eq!(child_value(&tree, tree.right(a)), Some('b'));
        assert_eq!(child_value(&tree, tree.left(a)), Some('c'));
        assert_eq!(order(&tree), "gcfaebd");
    }

    #[test]
    fn test_empty_and_single() {
        let empty: AssignmentTree<char> = AssignmentTree::ordered(&[], Direction::LeftToRight);
        assert!(empty.is_empty());
        assert!(empty.left_to_right().is_empty());
        assert_eq!(empty.depth(), 0);

        let mut rng = StdRng::seed_from_u64(1);
        for policy in TreePolicy::ALL {
            let single = AssignmentTree::build(policy, &['a'], &mut rng);
            assert_eq!(order(&single), "a");
        }
    }

    #[test]
    fn test_leftmost_right_subtree_is_emitted() {
        // root with only a right child: leftmost is the root itself
        let tree = AssignmentTree::ordered(&letters(2), Direction::RightToLeft);
        assert_eq!(order(&tree), "ab");

        let tree = AssignmentTree::ordered(&letters(2), Direction::LeftToRight);
        assert_eq!(order(&tree), "ba");
    }

    #[test]
    fn test_balanced_ltor_growth() {
        let tree = AssignmentTree::balanced(&letters(5), || Direction::LeftToRight);

        let a = tree.root().unwrap();
        let b = tree.left(a).unwrap();
        assert_eq!(*tree.value(b), 'b');
        assert_eq!(child_value(&tree, tree.right(a)), Some('c'));
        assert_eq!(child_value(&tree, tree.left(b)), Some('d'));
        assert_eq!(child_value(&tree, tree.right(b)), Some('e'));
        assert_eq!(order(&tree), "dbeac");

        // a full level matches the complete layout
        let full = AssignmentTree::balanced(&letters(7), || Direction::LeftToRight);
        assert_eq!(order(&full), "dbeafcg");
    }

    #[test]
    fn test_balanced_rtol_growth() {
        let tree = AssignmentTree::balanced(&letters(4), || Direction::RightToLeft);

        let a = tree.root().unwrap();
        let b = tree.right(a).unwrap();
        assert_eq!(*tree.value(b), 'b');
        assert_eq!(child_value(&tree, tree.left(a)), Some('c'));
        assert_eq!(child_value(&tree, tree.right(b)), Some('d'));
        assert_eq!(order(&tree), "cabd");
    }

    #[test]
    fn test_balanced_prefers_fewer_leaves() {
        // after a, b, c, d (ltor) the left subtree holds 1 leaf (d) under b,
        // the right subtree 1 leaf (c): tie goes left, filling b.right
        let tree = AssignmentTree::balanced(&letters(6), || Direction::LeftToRight);
        let a = tree.root().unwrap();
        let c = tree.right(a).unwrap();
        // 6th insertion: left subtree has 2 leaves, right has 1
        assert_eq!(child_value(&tree, tree.left(c)), Some('f'));
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_every_policy_visits_each_value_once() {
        let mut rng = StdRng::seed_from_u64(42);
        let values: Vec<usize> = (0..37).collect();

        for policy in TreePolicy::ALL {
            let tree = AssignmentTree::build(policy, &values, &mut rng);
            let mut visited: Vec<usize> = tree.left_to_right().into_iter().copied().collect();
            assert_eq!(visited.len(), values.len(), "{policy}");
            visited.sort();
            assert_eq!(visited, values, "{policy}");
        }
    }

    #[test]
    fn test_balanced_random_stays_shallow() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<usize> = (0..31).collect();
        let tree = AssignmentTree::build(TreePolicy::BalancedRandom, &values, &mut rng);

        // 31 nodes fit in 5 full levels; leaf balancing keeps it there
        assert_eq!(tree.depth(), 5);
    }

    #[test]
    fn test_find_and_display() {
        let tree = AssignmentTree::ordered(&letters(3), Direction::LeftToRight);
        assert_eq!(tree.find(&'c'), Some(2));
        assert_eq!(tree.find(&'z'), None);

        let rendered = tree.to_string();
        assert_eq!(rendered, "    c\na\n    b\n");
    }
}
