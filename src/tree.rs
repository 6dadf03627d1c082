//! Flat node lists to parent/child trees.
//!
//! Linking uses `parent_id`/`id` only; codes are never consulted. A node whose
//! parent is not in the same list is treated as a root. Every walk here is
//! bounded by the input size, so corrupt cyclic data terminates.

use crate::model::{CatalogNode, NodeId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub node: CatalogNode,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Depth-first pre-order walk: each node before its children.
    pub fn flatten(&self) -> Vec<&CatalogNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            out.push(&current.node);
            stack.extend(current.children.iter().rev());
        }
        out
    }

    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Pre-order flattening of a whole forest.
pub fn flatten(roots: &[TreeNode]) -> Vec<&CatalogNode> {
    roots.iter().flat_map(TreeNode::flatten).collect()
}

/// Link `flat` into a forest. Siblings keep their input order.
///
/// Nodes caught in a `parent_id` cycle are reachable from no root; each such
/// cycle is broken at its first member in input order, which becomes a root.
pub fn build_tree(flat: &[CatalogNode]) -> Vec<TreeNode> {
    let index: HashMap<NodeId, usize> = flat.iter().enumerate().map(|(i, n)| (n.id, i)).collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
    let mut roots = Vec::new();
    for (i, node) in flat.iter().enumerate() {
        match node.parent_id.and_then(|p| index.get(&p)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut placed = vec![false; flat.len()];
    let mut forest: Vec<TreeNode> = roots
        .iter()
        .map(|&root| assemble(flat, &children, root, &mut placed))
        .collect();

    for i in 0..flat.len() {
        if !placed[i] {
            // Detach from the cycle so the walk below stops at `i`.
            let mut cyclic = children.clone();
            for list in cyclic.iter_mut() {
                list.retain(|&c| c != i);
            }
            forest.push(assemble(flat, &cyclic, i, &mut placed));
        }
    }
    forest
}

/// Build the subtree under `root` iteratively, skipping anything placed
/// already.
fn assemble(
    flat: &[CatalogNode],
    children: &[Vec<usize>],
    root: usize,
    placed: &mut [bool],
) -> TreeNode {
    // Post-order over an explicit stack: (index, expanded?)
    let mut stack = vec![(root, false)];
    let mut built: HashMap<usize, TreeNode> = HashMap::new();
    placed[root] = true;

    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            let kids = children[i]
                .iter()
                .filter_map(|c| built.remove(c))
                .collect();
            built.insert(
                i,
                TreeNode {
                    node: flat[i].clone(),
                    children: kids,
                },
            );
            continue;
        }
        stack.push((i, true));
        for &child in children[i].iter().rev() {
            if !placed[child] {
                placed[child] = true;
                stack.push((child, false));
            }
        }
    }

    built.remove(&root).unwrap_or_else(|| TreeNode {
        node: flat[root].clone(),
        children: Vec::new(),
    })
}

/// Ids of every node below `id` in `flat` (not `id` itself).
pub fn collect_descendants(flat: &[CatalogNode], id: NodeId) -> HashSet<NodeId> {
    let mut by_parent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for node in flat {
        if let Some(parent) = node.parent_id {
            by_parent.entry(parent).or_default().push(node.id);
        }
    }

    let mut found = HashSet::new();
    let mut frontier = vec![id];
    while let Some(current) = frontier.pop() {
        for &child in by_parent.get(&current).into_iter().flatten() {
            if child != id && found.insert(child) {
                frontier.push(child);
            }
        }
    }
    found
}

/// Order siblings by `position` (missing last), then code, recursively.
pub fn sort_siblings(roots: &mut [TreeNode]) {
    let mut stack: Vec<&mut [TreeNode]> = vec![roots];
    while let Some(level) = stack.pop() {
        level.sort_by(|a, b| {
            let pa = a.node.position.unwrap_or(i32::MAX);
            let pb = b.node.position.unwrap_or(i32::MAX);
            pa.cmp(&pb).then_with(|| a.node.code.cmp(&b.node.code))
        });
        for child in level {
            stack.push(child.children.as_mut_slice());
        }
    }
}

/// Length of the `parent_id` chain above `id` within `flat`, counting `id`
/// itself. Stops at `limit` so a cycle cannot spin.
pub fn chain_depth(flat: &[CatalogNode], id: NodeId, limit: usize) -> usize {
    let parents: HashMap<NodeId, Option<NodeId>> =
        flat.iter().map(|n| (n.id, n.parent_id)).collect();
    let mut depth = 1;
    let mut current = parents.get(&id).copied().flatten();
    while let Some(parent) = current {
        if depth > limit {
            break;
        }
        depth += 1;
        current = parents.get(&parent).copied().flatten();
    }
    depth
}
