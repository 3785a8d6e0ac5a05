//! Segmentation-grid rendering.
//!
//! Visualizes a tree's partition: every region that still has children gets
//! one-pixel mid-gray split lines, and the image is framed by a one-pixel
//! border. Purely a diagnostic aid; nothing here feeds back into the codec.

use crate::raster::Raster;
use crate::tree::{QuadNode, QuadTree, Quadrant};
use crate::Result;

const GRID_VALUE: u8 = 128;

/// Renders the tree's partition onto a fresh black raster.
pub fn render_grid(tree: &QuadTree) -> Result<Raster> {
    let side = tree.side();
    let mut raster = Raster::new(side)?;
    draw_node(tree.root(), &mut raster, 0, 0, side);

    draw_horizontal(&mut raster, 0, 0, side);
    draw_horizontal(&mut raster, side - 1, 0, side);
    draw_vertical(&mut raster, 0, 0, side);
    draw_vertical(&mut raster, 0, side - 1, side);
    Ok(raster)
}

fn draw_node(node: &QuadNode, raster: &mut Raster, row: usize, col: usize, size: usize) {
    if size <= 1 || node.is_leaf() {
        return;
    }
    let half = size / 2;
    draw_horizontal(raster, row + half, col, size);
    draw_vertical(raster, row, col + half, size);

    if let Some(children) = node.children() {
        for (quadrant, child) in Quadrant::TRAVERSAL.iter().zip(children.iter()) {
            let (dr, dc) = quadrant.offset(half);
            draw_node(child, raster, row + dr, col + dc, half);
        }
    }
}

fn draw_horizontal(raster: &mut Raster, row: usize, col: usize, length: usize) {
    for c in col..col + length {
        raster.set(row, c, GRID_VALUE);
    }
}

fn draw_vertical(raster: &mut Raster, row: usize, col: usize, length: usize) {
    for r in row..row + length {
        raster.set(r, col, GRID_VALUE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_tree_draws_only_the_border() {
        let raster = Raster::from_pixels(4, vec![5; 16]).unwrap();
        let tree = QuadTree::build(&raster);
        let grid = render_grid(&tree).unwrap();

        for i in 0..4 {
            assert_eq!(grid.get(0, i), 128);
            assert_eq!(grid.get(3, i), 128);
            assert_eq!(grid.get(i, 0), 128);
            assert_eq!(grid.get(i, 3), 128);
        }
        assert_eq!(grid.get(1, 1), 0);
        assert_eq!(grid.get(2, 2), 0);
    }

    #[test]
    fn split_regions_get_mid_lines() {
        let raster = Raster::from_pixels(4, (0..16).collect()).unwrap();
        let tree = QuadTree::build(&raster);
        let grid = render_grid(&tree).unwrap();

        // Root mid-lines cross the center.
        assert_eq!(grid.get(2, 1), 128);
        assert_eq!(grid.get(1, 2), 128);
    }
}
