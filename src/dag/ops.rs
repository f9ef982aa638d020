//! Generic DAG operations over declared message links.
//!
//! Used when a board is rebuilt from its membership: replaying messages with
//! parents before children keeps provisional links and orphan churn to a
//! minimum. The input is untrusted, so the ordering must also terminate on
//! cyclic declarations.

use crate::dag::ContentHash;
use std::collections::{BTreeSet, HashMap};

/// Trait for types that can participate in DAG operations.
///
/// This trait provides the minimal interface needed for generic DAG algorithms
/// like topological sorting.
pub trait DagNodeOps {
    /// Returns the content hash of this node.
    fn hash(&self) -> &ContentHash;

    /// Returns the hashes of this node's parent nodes.
    fn parent_hashes(&self) -> Vec<ContentHash>;

    /// Returns the creation timestamp in milliseconds since Unix epoch.
    fn created_at(&self) -> u64;
}

/// Sorts nodes into topological order (parents before children).
///
/// Kahn's algorithm over in-degree counts, taking the ready node with the
/// smallest `created_at` (then hash) first. Parents outside the input are
/// ignored. When every remaining node waits on another remaining node, the
/// oldest of them is emitted to break the declared cycle, so every input
/// node appears exactly once. Runs in O((n + e) log n).
pub fn topological_order<'a, N: DagNodeOps>(nodes: &[&'a N]) -> Vec<&'a N> {
    let mut unique: Vec<&'a N> = nodes.to_vec();
    unique.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.hash().cmp(b.hash()))
    });
    unique.dedup_by(|a, b| a.hash() == b.hash());

    // Positions follow (created_at, hash) order, so the smallest position is
    // always the oldest node.
    let position: HashMap<ContentHash, usize> = unique
        .iter()
        .enumerate()
        .map(|(i, n)| (*n.hash(), i))
        .collect();

    let mut waiting_on = vec![0usize; unique.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    for (i, node) in unique.iter().enumerate() {
        let mut parents: Vec<usize> = node
            .parent_hashes()
            .iter()
            .filter_map(|p| position.get(p).copied())
            .collect();
        parents.sort_unstable();
        parents.dedup();
        waiting_on[i] = parents.len();
        for parent in parents {
            children[parent].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..unique.len()).filter(|&i| waiting_on[i] == 0).collect();
    let mut remaining: BTreeSet<usize> = (0..unique.len()).collect();
    let mut result = Vec::with_capacity(unique.len());

    while let Some(&oldest) = remaining.first() {
        let next = ready.pop_first().unwrap_or(oldest);
        remaining.remove(&next);
        result.push(unique[next]);

        for &child in &children[next] {
            if !remaining.contains(&child) {
                continue;
            }
            waiting_on[child] -= 1;
            if waiting_on[child] == 0 {
                ready.insert(child);
            }
        }
    }

    result
}

/// Returns the hashes of `nodes` in topological order.
pub fn topological_sort_hashes<N: DagNodeOps>(nodes: &[&N]) -> Vec<ContentHash> {
    topological_order(nodes)
        .into_iter()
        .map(|n| *n.hash())
        .collect()
}
