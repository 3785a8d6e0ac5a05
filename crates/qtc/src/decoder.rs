//! QTC header parsing and level-synchronized tree reconstruction.
//!
//! The decoder mirrors the encoder's traversal contract: it knows how many
//! nodes each level holds from the uniformity bits observed so far, so the
//! tree shape is rebuilt breadth-first, one level at a time. Nodes of a level
//! are kept as a flat row while it is being read; rows are stitched into the
//! final tree once the whole stream has been consumed, consuming children in
//! exactly the order they arrived.

use std::io::{self, BufRead, BufReader, Read};

use log::debug;

use crate::bits::BitReader;
use crate::tree::{QuadNode, QuadTree};
use crate::{QtcError, Result, MAX_TREE_DEPTH, QTC_COMMENT_LINES, QTC_MAGIC};

/// Decompresses a complete QTC document into a tree.
///
/// # Errors
///
/// Header mismatches, depth bytes above 32, payload underrun and fourth-mean
/// values outside `0..=255` all surface as [`QtcError::InvalidData`]; the
/// partially built tree is dropped.
pub fn decompress<R: Read>(input: R) -> Result<QuadTree> {
    let mut input = BufReader::new(input);
    let levels = read_header(&mut input)?;
    let mut reader = BitReader::new(input);

    // Level 0: the root mean is always transmitted; remainder and uniformity
    // exist only when the tree has any depth.
    let mean = reader.read_bits(8)?;
    let (remainder, uniform) = if levels > 0 {
        read_flags(&mut reader)?
    } else {
        (0, true)
    };
    let root = QuadNode {
        mean,
        remainder,
        uniform,
        variance: 0.0,
        children: None,
    };

    let mut rows: Vec<Vec<QuadNode>> = vec![vec![root]];
    for level in 1..=levels {
        let parents = &rows[rows.len() - 1];
        let mut row = Vec::new();
        let expected = parents.iter().filter(|p| !p.uniform).count() * 4;
        row.try_reserve_exact(expected)
            .map_err(|_| QtcError::AllocationFailed)?;

        for parent in parents.iter().filter(|p| !p.uniform) {
            let mut means = [0u8; 3];
            for index in 0..4 {
                let mean = if index < 3 {
                    let transmitted = reader.read_bits(8)?;
                    means[index] = transmitted;
                    transmitted
                } else {
                    fourth_mean(parent.mean, parent.remainder, means)?
                };
                let (remainder, uniform) = if level < levels {
                    read_flags(&mut reader)?
                } else {
                    (0, true)
                };
                row.push(QuadNode {
                    mean,
                    remainder,
                    uniform,
                    variance: 0.0,
                    children: None,
                });
            }
        }
        rows.push(row);
    }

    let root = attach_rows(rows)
        .ok_or_else(|| QtcError::InvalidData("empty node stream".to_string()))?;
    debug!(
        "decompressed {} levels from {} payload bits",
        levels,
        reader.total_bits()
    );
    Ok(QuadTree::from_root(root, levels))
}

fn read_header<R: BufRead>(input: &mut R) -> Result<u32> {
    let mut magic = [0u8; 3];
    input.read_exact(&mut magic).map_err(map_eof)?;
    if &magic != QTC_MAGIC {
        return Err(QtcError::InvalidData(
            "missing Q1 signature".to_string(),
        ));
    }

    for _ in 0..QTC_COMMENT_LINES {
        let mut line = Vec::new();
        input.read_until(b'\n', &mut line)?;
        if !line.starts_with(b"#") || !line.ends_with(b"\n") {
            return Err(QtcError::InvalidData(
                "malformed header comment line".to_string(),
            ));
        }
    }

    let mut depth = [0u8; 1];
    input.read_exact(&mut depth).map_err(map_eof)?;
    if depth[0] > MAX_TREE_DEPTH {
        return Err(QtcError::InvalidData(format!(
            "tree depth {} exceeds the maximum of {MAX_TREE_DEPTH}",
            depth[0]
        )));
    }
    Ok(u32::from(depth[0]))
}

fn read_flags<R: Read>(reader: &mut BitReader<R>) -> Result<(u8, bool)> {
    let remainder = reader.read_bits(2)?;
    // A non-zero remainder rules out uniformity, so its bit is not in the
    // stream.
    let uniform = if remainder == 0 {
        reader.read_bit()? == 1
    } else {
        false
    };
    Ok((remainder, uniform))
}

/// Evaluates the fourth-mean identity
/// `m3 = 4 * parent_mean + parent_remainder - (m0 + m1 + m2)` in wide
/// arithmetic; results outside a byte mark a corrupt stream.
fn fourth_mean(parent_mean: u8, parent_remainder: u8, siblings: [u8; 3]) -> Result<u8> {
    let sum: i32 = siblings.iter().map(|&m| i32::from(m)).sum();
    let fourth = 4 * i32::from(parent_mean) + i32::from(parent_remainder) - sum;
    u8::try_from(fourth).map_err(|_| {
        QtcError::InvalidData(format!("fourth child mean {fourth} out of range"))
    })
}

/// Attaches each row's nodes to the non-uniform parents of the row above,
/// four at a time, and returns the root.
fn attach_rows(mut rows: Vec<Vec<QuadNode>>) -> Option<QuadNode> {
    while rows.len() > 1 {
        let children = rows.pop()?;
        let parents = rows.last_mut()?;
        let mut pending = children.into_iter();
        for parent in parents.iter_mut().filter(|p| !p.uniform) {
            if let (Some(a), Some(b), Some(c), Some(d)) =
                (pending.next(), pending.next(), pending.next(), pending.next())
            {
                parent.children = Some(Box::new([a, b, c, d]));
            }
        }
    }
    rows.pop()?.pop()
}

fn map_eof(err: io::Error) -> QtcError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        QtcError::InvalidData("truncated header".to_string())
    } else {
        QtcError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourth_mean_recovers_the_missing_child() {
        // means 10, 20, 40, 30 -> sum 100, parent mean 25, remainder 0
        assert_eq!(fourth_mean(25, 0, [10, 20, 40]).unwrap(), 30);
        // sum 101 -> mean 25, remainder 1
        assert_eq!(fourth_mean(25, 1, [10, 20, 40]).unwrap(), 31);
    }

    #[test]
    fn fourth_mean_rejects_impossible_values() {
        assert!(fourth_mean(255, 3, [0, 0, 0]).is_err());
        assert!(fourth_mean(0, 0, [200, 200, 200]).is_err());
    }
}
