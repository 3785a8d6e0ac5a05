#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qtc::{compress, decompress, QuadTree, Raster};

#[derive(Arbitrary, Debug)]
struct FuzzImage {
    levels: u8,
    pixels: Vec<u8>,
}

fuzz_target!(|input: FuzzImage| {
    // Keep the tree small: sides 1..=16
    let levels = u32::from(input.levels) % 5;
    let side = 1usize << levels;
    let count = side * side;
    if input.pixels.len() < count {
        return;
    }

    let raster = match Raster::from_pixels(side, input.pixels[..count].to_vec()) {
        Ok(raster) => raster,
        Err(_) => return,
    };

    let tree = QuadTree::build(&raster);
    let mut encoded = Vec::new();
    compress(&tree, &mut encoded).expect("compressing into memory");

    // Our own output must decode back to the same pixels
    let decoded = decompress(&encoded[..]).expect("decoding own output");
    let reconstructed = decoded.to_raster().expect("reconstruction");
    assert_eq!(reconstructed.as_bytes(), raster.as_bytes());
});
