//! Adaptive variance-based lossy filtering.
//!
//! The filter walks the tree depth-first with a threshold that is scaled by
//! `alpha` at every level of descent, so deeper (smaller, perceptually less
//! salient) regions merge more readily while detail near the root survives.

use log::debug;

use crate::tree::{QuadNode, QuadTree};
use crate::{QtcError, Result};

/// Merges low-variance subtrees of `tree` in place.
///
/// The initial threshold is `median_variance / max_variance` over the whole
/// tree; a subtree is collapsed into a uniform node when its refreshed
/// variance falls under the level-scaled threshold and all of its children
/// are themselves uniform. A tree whose maximum variance is zero is already
/// uniform and is left untouched.
///
/// # Errors
///
/// Returns [`QtcError::InvalidParameter`] unless `alpha` is greater than 1.
pub fn apply_lossy(tree: &mut QuadTree, alpha: f32) -> Result<()> {
    if !(alpha > 1.0) {
        return Err(QtcError::InvalidParameter(format!(
            "alpha must be greater than 1, got {alpha}"
        )));
    }

    let stats = tree.variance_stats();
    if stats.max == 0.0 {
        debug!("lossy filter skipped: tree is already uniform");
        return Ok(());
    }
    let threshold = stats.median / stats.max;
    let before = tree.node_count();

    filter_node(&mut tree.root, threshold, alpha);

    debug!(
        "lossy filter: alpha {alpha}, threshold {threshold:.4} (median {:.4}, max {:.4}), {before} -> {} nodes",
        stats.median,
        stats.max,
        tree.node_count()
    );
    Ok(())
}

/// Visits one node, children first, and reports whether the subtree ended up
/// uniform.
fn filter_node(node: &mut QuadNode, threshold: f32, alpha: f32) -> bool {
    if node.children.is_none() {
        return true;
    }

    let mut all_uniform = true;
    if let Some(children) = &mut node.children {
        for child in children.iter_mut() {
            if !filter_node(child, threshold * alpha, alpha) {
                all_uniform = false;
            }
        }
    }

    // Children hold their final variances now; refresh before deciding.
    node.refresh_variance();

    if node.variance <= threshold && all_uniform {
        // Collapse: the node becomes a pruned leaf.
        node.uniform = true;
        node.remainder = 0;
        node.variance = 0.0;
        node.children = None;
        return true;
    }

    let same_means = node
        .children
        .as_ref()
        .is_some_and(|c| c.iter().all(|child| child.mean == c[0].mean));
    node.uniform = node.remainder == 0 && all_uniform && same_means;
    node.uniform
}
