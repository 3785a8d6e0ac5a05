//! Two-pass, level-synchronized QTC compression.
//!
//! # Stream layout
//!
//! A QTC document is a short textual header followed by a bit-packed
//! payload:
//!
//! ```text
//! "Q1" 0x0A                              magic
//! "# <timestamp>\n"                      comment line
//! "# compression rate NN.NN%\n"          comment line
//! <depth: 1 byte>                        tree depth L
//! <payload>                              MSB-first packed node stream
//! ```
//!
//! The payload carries the tree in strict level order, root first. Per node:
//!
//! | field     | bits | emitted when                                  |
//! |-----------|------|-----------------------------------------------|
//! | mean      | 8    | the node is not the fourth child of its parent |
//! | remainder | 2    | the node is above the deepest level            |
//! | uniform   | 1    | above the deepest level and remainder is zero  |
//!
//! The fourth child's mean is reconstructed from the parent's mean and
//! remainder, a non-zero remainder implies a non-uniform node, and a uniform
//! node suppresses its entire subtree, so none of the omitted bits lose
//! information.
//!
//! Compression runs in two passes: the payload is first packed into an
//! in-memory scratch buffer to learn the exact bit count, then the header
//! (which quotes the compression rate) and the scratch bytes are written to
//! the output.

use std::io::Write;

use chrono::Local;
use log::info;

use crate::bits::BitWriter;
use crate::tree::{QuadNode, QuadTree};
use crate::{Result, QTC_MAGIC};

/// Statistics from one compression run.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInfo {
    /// Bits in the packed payload, excluding final-byte padding.
    pub total_bits: u64,
    /// Payload bytes that follow the header.
    pub payload_bytes: u64,
    /// Nodes emitted into the stream.
    pub nodes_written: u64,
    /// Payload bits as a percentage of the raw image bits.
    pub ratio: f32,
}

/// Compresses a tree into a complete QTC document.
///
/// # Errors
///
/// Any scratch or output write failure aborts the operation; nothing useful
/// is left in `output` after an error.
pub fn compress<W: Write>(tree: &QuadTree, mut output: W) -> Result<EncodeInfo> {
    let mut scratch = Vec::new();
    let mut writer = BitWriter::new(&mut scratch);
    let mut nodes_written = 0u64;
    for level in 0..=tree.levels() {
        write_level(
            &mut writer,
            tree.root(),
            0,
            level,
            tree.levels(),
            false,
            &mut nodes_written,
        )?;
    }
    writer.flush()?;
    let total_bits = writer.total_bits();
    let payload_bytes = writer.bytes_written();

    let original_bits = (tree.side() as u64).pow(2) * 8;
    let ratio = total_bits as f32 / original_bits as f32 * 100.0;

    write_header(&mut output, tree.levels(), ratio)?;
    output.write_all(&scratch)?;

    info!("compressed {nodes_written} nodes into {total_bits} bits ({ratio:.2}%)");
    Ok(EncodeInfo {
        total_bits,
        payload_bytes,
        nodes_written,
        ratio,
    })
}

fn write_header<W: Write>(output: &mut W, levels: u32, ratio: f32) -> Result<()> {
    output.write_all(QTC_MAGIC)?;
    writeln!(output, "# {}", Local::now().format("%a %b %d %H:%M:%S %Y"))?;
    writeln!(output, "# compression rate {ratio:.2}%")?;
    output.write_all(&[levels as u8])?;
    Ok(())
}

/// Depth-first walk that emits only the nodes sitting at `target`, skipping
/// subtrees hidden behind uniform ancestors.
fn write_level<W: Write>(
    writer: &mut BitWriter<W>,
    node: &QuadNode,
    current: u32,
    target: u32,
    max: u32,
    is_interpolated: bool,
    nodes_written: &mut u64,
) -> Result<()> {
    if current == target {
        write_node(writer, node, current == max, is_interpolated)?;
        *nodes_written += 1;
        return Ok(());
    }
    if !node.is_uniform() {
        if let Some(children) = node.children() {
            for (index, child) in children.iter().enumerate() {
                write_level(
                    writer,
                    child,
                    current + 1,
                    target,
                    max,
                    index == 3,
                    nodes_written,
                )?;
            }
        }
    }
    Ok(())
}

fn write_node<W: Write>(
    writer: &mut BitWriter<W>,
    node: &QuadNode,
    is_leaf: bool,
    is_interpolated: bool,
) -> Result<()> {
    if !is_interpolated {
        writer.write_bits(u32::from(node.mean()), 8)?;
    }
    if is_leaf {
        return Ok(());
    }
    writer.write_bits(u32::from(node.remainder()), 2)?;
    if node.remainder() == 0 {
        writer.write_bit(node.is_uniform() as u8)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    fn header_and_payload(bytes: &[u8]) -> (Vec<&[u8]>, &[u8]) {
        let mut lines = Vec::new();
        let mut rest = bytes;
        for _ in 0..3 {
            let end = rest.iter().position(|&b| b == b'\n').unwrap();
            lines.push(&rest[..=end]);
            rest = &rest[end + 1..];
        }
        // One depth byte between the comment lines and the payload.
        (lines, &rest[1..])
    }

    #[test]
    fn header_carries_magic_two_comments_and_depth() {
        let raster = Raster::from_pixels(2, vec![9, 9, 9, 9]).unwrap();
        let tree = QuadTree::build(&raster);
        let mut out = Vec::new();
        compress(&tree, &mut out).unwrap();

        let (lines, _) = header_and_payload(&out);
        assert_eq!(lines[0], b"Q1\n");
        assert!(lines[1].starts_with(b"# "));
        assert!(lines[2].starts_with(b"# compression rate "));

        let depth_offset: usize = lines.iter().map(|l| l.len()).sum();
        assert_eq!(out[depth_offset], 1);
    }

    #[test]
    fn uniform_image_packs_into_eleven_bits() {
        let raster = Raster::from_pixels(4, vec![7; 16]).unwrap();
        let tree = QuadTree::build(&raster);
        let mut out = Vec::new();
        let info = compress(&tree, &mut out).unwrap();

        assert_eq!(info.total_bits, 11);
        assert_eq!(info.payload_bytes, 2);
        let (_, payload) = header_and_payload(&out);
        // mean 7, remainder 00, uniform 1, zero padding
        assert_eq!(payload, &[0x07, 0x20]);
    }

    #[test]
    fn single_pixel_image_packs_into_one_byte() {
        let raster = Raster::from_pixels(1, vec![42]).unwrap();
        let tree = QuadTree::build(&raster);
        let mut out = Vec::new();
        let info = compress(&tree, &mut out).unwrap();

        assert_eq!(info.total_bits, 8);
        let (_, payload) = header_and_payload(&out);
        assert_eq!(payload, &[0x2A]);
    }

    #[test]
    fn fourth_child_mean_is_not_transmitted() {
        // Quadrant order means are 10, 20, 40, 30; the last one is derived.
        let raster = Raster::from_pixels(2, vec![10, 20, 30, 40]).unwrap();
        let tree = QuadTree::build(&raster);
        let mut out = Vec::new();
        let info = compress(&tree, &mut out).unwrap();

        // root mean + remainder + uniform, then three leaf means
        assert_eq!(info.total_bits, 11 + 3 * 8);
        let (_, payload) = header_and_payload(&out);
        assert_eq!(payload, &[0x19, 0x01, 0x42, 0x85, 0x00]);
    }
}
