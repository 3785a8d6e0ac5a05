//! Quadtree data model: nodes, bottom-up construction, variance statistics
//! and tree-to-raster reconstruction.
//!
//! A node covering more than one pixel either owns exactly four children or
//! is uniform (its whole region holds one value). For every retained interior
//! node the mean/remainder identity holds:
//!
//! ```text
//! 4 * mean + remainder == m0 + m1 + m2 + m3
//! ```
//!
//! where `m0..m3` are the child means in traversal order. Any three children
//! plus the parent therefore determine the fourth child's mean exactly, which
//! is what lets the encoder omit it from the stream.

use log::debug;

use crate::raster::Raster;
use crate::Result;

/// The four quadrants of a square region, in the codec's fixed traversal
/// order: clockwise starting at the top left.
///
/// The order is load-bearing for stream compatibility: the fourth visited
/// child (bottom left) is the one whose mean is derived instead of
/// transmitted. It must not be swapped for the row-major
/// `[TopLeft, TopRight, BottomLeft, BottomRight]` walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// Top-left quadrant, visited first.
    TopLeft,
    /// Top-right quadrant.
    TopRight,
    /// Bottom-right quadrant.
    BottomRight,
    /// Bottom-left quadrant, visited last; its mean is derived.
    BottomLeft,
}

impl Quadrant {
    /// All quadrants in traversal order.
    pub const TRAVERSAL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomRight,
        Quadrant::BottomLeft,
    ];

    /// Offset of this quadrant's top-left corner within a region whose
    /// halves have the given size.
    #[inline]
    pub fn offset(self, half: usize) -> (usize, usize) {
        match self {
            Quadrant::TopLeft => (0, 0),
            Quadrant::TopRight => (0, half),
            Quadrant::BottomRight => (half, half),
            Quadrant::BottomLeft => (half, 0),
        }
    }
}

/// One node of the quadtree.
///
/// Children are stored in [`Quadrant::TRAVERSAL`] order; they are either all
/// present or all absent.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadNode {
    pub(crate) mean: u8,
    pub(crate) remainder: u8,
    pub(crate) uniform: bool,
    pub(crate) variance: f32,
    pub(crate) children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    pub(crate) fn leaf(mean: u8) -> Self {
        Self {
            mean,
            remainder: 0,
            uniform: true,
            variance: 0.0,
            children: None,
        }
    }

    /// Integer mean intensity of the region this node covers.
    #[inline]
    pub fn mean(&self) -> u8 {
        self.mean
    }

    /// Two-bit remainder of the child-mean sum, `0..=3`.
    #[inline]
    pub fn remainder(&self) -> u8 {
        self.remainder
    }

    /// Whether the whole region holds the single value [`Self::mean`].
    #[inline]
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    /// Whether this node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Local variance, valid after a [`QuadTree::variance_stats`] pass.
    #[inline]
    pub fn variance(&self) -> f32 {
        self.variance
    }

    /// The four children in traversal order, if any.
    #[inline]
    pub fn children(&self) -> Option<&[QuadNode; 4]> {
        self.children.as_deref()
    }

    /// Recomputes this node's variance from its children's current values:
    /// `sqrt(sum(v_k^2 + (mean - m_k)^2) / 4)`, zero for leaves.
    pub(crate) fn refresh_variance(&mut self) {
        let Some(children) = &self.children else {
            self.variance = 0.0;
            return;
        };
        let mut acc = 0.0f32;
        for child in children.iter() {
            let diff = f32::from(self.mean) - f32::from(child.mean);
            acc += child.variance * child.variance + diff * diff;
        }
        self.variance = (acc / 4.0).sqrt();
    }
}

/// Median and maximum of all non-zero node variances in a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceStats {
    /// Value at `floor(N / 2)` of the ascending non-zero variances.
    pub median: f32,
    /// Largest non-zero variance, zero for a uniform tree.
    pub max: f32,
}

/// A quadtree over a square raster of side `2^levels`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadTree {
    pub(crate) root: QuadNode,
    pub(crate) levels: u32,
    pub(crate) side: usize,
}

impl QuadTree {
    /// Builds the tree bottom-up from a raster.
    ///
    /// Leaves carry single pixel values; every interior node gets its mean,
    /// remainder and uniformity from its children, and subtrees proven
    /// uniform are pruned as they are found.
    pub fn build(raster: &Raster) -> QuadTree {
        let levels = raster.levels();
        let root = build_node(raster, levels, 0, 0);
        let tree = QuadTree {
            root,
            levels,
            side: raster.side(),
        };
        debug!(
            "built quadtree: {}x{}, {} levels, {} nodes",
            tree.side,
            tree.side,
            tree.levels,
            tree.node_count()
        );
        tree
    }

    pub(crate) fn from_root(root: QuadNode, levels: u32) -> QuadTree {
        QuadTree {
            root,
            levels,
            side: 1usize << levels,
        }
    }

    /// Tree depth `L`; the raster side is `2^L`.
    #[inline]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Side length of the covered raster.
    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> &QuadNode {
        &self.root
    }

    /// Number of retained nodes.
    pub fn node_count(&self) -> usize {
        count_nodes(&self.root)
    }

    /// Recomputes every node's local variance bottom-up and returns the
    /// median and maximum over all non-zero values. Both are zero for a tree
    /// that is already uniform.
    pub fn variance_stats(&mut self) -> VarianceStats {
        let mut observed = Vec::new();
        collect_variances(&mut self.root, &mut observed);
        if observed.is_empty() {
            return VarianceStats {
                median: 0.0,
                max: 0.0,
            };
        }
        observed.sort_by(f32::total_cmp);
        VarianceStats {
            median: observed[observed.len() / 2],
            max: observed[observed.len() - 1],
        }
    }

    /// Reconstructs the pixel raster this tree encodes.
    ///
    /// Uniform nodes radiate their mean over their whole block; everything
    /// else recurses in quadrant order.
    pub fn to_raster(&self) -> Result<Raster> {
        let mut raster = Raster::new(self.side)?;
        fill_region(&self.root, &mut raster, 0, 0, self.side);
        Ok(raster)
    }
}

fn build_node(raster: &Raster, level: u32, row: usize, col: usize) -> QuadNode {
    if level == 0 {
        return QuadNode::leaf(raster.get(row, col));
    }

    let half = 1usize << (level - 1);
    let children = Quadrant::TRAVERSAL.map(|quadrant| {
        let (dr, dc) = quadrant.offset(half);
        build_node(raster, level - 1, row + dr, col + dc)
    });

    // u16 safely holds the sum of four byte means (max 1020).
    let sum: u16 = children.iter().map(|c| u16::from(c.mean)).sum();
    let mean = (sum / 4) as u8;
    let remainder = (sum % 4) as u8;

    let all_uniform = children.iter().all(|c| c.uniform);
    let all_same = children.iter().all(|c| c.mean == children[0].mean);
    if remainder == 0 && all_uniform && all_same {
        // Uniform subtree: the children collapse into this node.
        QuadNode::leaf(mean)
    } else {
        QuadNode {
            mean,
            remainder,
            uniform: false,
            variance: 0.0,
            children: Some(Box::new(children)),
        }
    }
}

fn count_nodes(node: &QuadNode) -> usize {
    let mut count = 1;
    if let Some(children) = &node.children {
        for child in children.iter() {
            count += count_nodes(child);
        }
    }
    count
}

fn collect_variances(node: &mut QuadNode, observed: &mut Vec<f32>) {
    if let Some(children) = &mut node.children {
        for child in children.iter_mut() {
            collect_variances(child, observed);
        }
    }
    node.refresh_variance();
    if node.variance > 0.0 {
        observed.push(node.variance);
    }
}

fn fill_region(node: &QuadNode, raster: &mut Raster, row: usize, col: usize, size: usize) {
    if node.uniform || size == 1 {
        raster.fill_block(row, col, size, node.mean);
        return;
    }
    let Some(children) = &node.children else {
        raster.fill_block(row, col, size, node.mean);
        return;
    };
    let half = size / 2;
    for (quadrant, child) in Quadrant::TRAVERSAL.iter().zip(children.iter()) {
        let (dr, dc) = quadrant.offset(half);
        fill_region(child, raster, row + dr, col + dc, half);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_mean_identity(node: &QuadNode) {
        if let Some(children) = node.children() {
            let sum: u16 = children.iter().map(|c| u16::from(c.mean())).sum();
            assert_eq!(
                4 * u16::from(node.mean()) + u16::from(node.remainder()),
                sum
            );
            assert!(node.remainder() <= 3);
            for child in children {
                check_mean_identity(child);
            }
        } else {
            assert!(node.is_uniform());
            assert_eq!(node.remainder(), 0);
        }
    }

    #[test]
    fn single_pixel_tree_is_one_leaf() {
        let raster = Raster::from_pixels(1, vec![42]).unwrap();
        let tree = QuadTree::build(&raster);
        assert_eq!(tree.levels(), 0);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.root().mean(), 42);
        assert!(tree.root().is_uniform());
    }

    #[test]
    fn uniform_image_collapses_to_root() {
        let raster = Raster::from_pixels(8, vec![7; 64]).unwrap();
        let tree = QuadTree::build(&raster);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.root().is_uniform());
        assert_eq!(tree.root().mean(), 7);
        assert_eq!(tree.root().remainder(), 0);
    }

    #[test]
    fn child_means_follow_quadrant_order() {
        // Row-major 2x2: TL=10, TR=20, BL=30, BR=40.
        let raster = Raster::from_pixels(2, vec![10, 20, 30, 40]).unwrap();
        let tree = QuadTree::build(&raster);
        let children = tree.root().children().unwrap();
        assert_eq!(children[0].mean(), 10); // top left
        assert_eq!(children[1].mean(), 20); // top right
        assert_eq!(children[2].mean(), 40); // bottom right
        assert_eq!(children[3].mean(), 30); // bottom left
        assert_eq!(tree.root().mean(), 25);
        assert_eq!(tree.root().remainder(), 0);
        assert!(!tree.root().is_uniform());
    }

    #[test]
    fn mean_identity_holds_everywhere() {
        let pixels: Vec<u8> = (0..64).map(|i| (i * 37 % 251) as u8).collect();
        let raster = Raster::from_pixels(8, pixels).unwrap();
        let tree = QuadTree::build(&raster);
        check_mean_identity(tree.root());
    }

    #[test]
    fn max_value_children_do_not_overflow() {
        let raster = Raster::from_pixels(2, vec![255; 4]).unwrap();
        let tree = QuadTree::build(&raster);
        assert_eq!(tree.root().mean(), 255);
        assert_eq!(tree.root().remainder(), 0);
        assert!(tree.root().is_uniform());
    }

    #[test]
    fn reconstruction_inverts_the_build() {
        let pixels: Vec<u8> = (0..256).map(|i| (i % 256) as u8).collect();
        let raster = Raster::from_pixels(16, pixels).unwrap();
        let tree = QuadTree::build(&raster);
        assert_eq!(tree.to_raster().unwrap(), raster);
    }

    #[test]
    fn variance_stats_are_zero_for_uniform_trees() {
        let raster = Raster::from_pixels(4, vec![9; 16]).unwrap();
        let mut tree = QuadTree::build(&raster);
        let stats = tree.variance_stats();
        assert_eq!(stats.median, 0.0);
        assert_eq!(stats.max, 0.0);
    }

    #[test]
    fn variance_grows_with_contrast() {
        let flat = Raster::from_pixels(4, {
            let mut p = vec![100; 16];
            p[0] = 102;
            p
        })
        .unwrap();
        let sharp = Raster::from_pixels(4, {
            let mut p = vec![100; 16];
            p[0] = 255;
            p
        })
        .unwrap();
        let mut flat_tree = QuadTree::build(&flat);
        let mut sharp_tree = QuadTree::build(&sharp);
        assert!(sharp_tree.variance_stats().max > flat_tree.variance_stats().max);
    }
}
