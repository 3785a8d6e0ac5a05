use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use qtc::{compress, decompress, QuadTree, Raster};
use std::hint::black_box;

// Generate test images of different characters
fn generate_gradient(side: usize) -> Raster {
    let mut pixels = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            pixels.push((((row + col) * 255) / (2 * side - 1)) as u8);
        }
    }
    Raster::from_pixels(side, pixels).unwrap()
}

fn generate_checkerboard(side: usize, cell_size: usize) -> Raster {
    let mut pixels = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let is_white = ((row / cell_size) + (col / cell_size)) % 2 == 0;
            pixels.push(if is_white { 255 } else { 0 });
        }
    }
    Raster::from_pixels(side, pixels).unwrap()
}

fn generate_flat(side: usize) -> Raster {
    Raster::from_pixels(side, vec![128; side * side]).unwrap()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_tree");
    for side in [64, 256] {
        let raster = generate_gradient(side);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("gradient_{side}x{side}")),
            &raster,
            |b, r| b.iter(|| QuadTree::build(black_box(r))),
        );
    }
    group.finish();
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");
    let cases = [
        ("gradient_256", generate_gradient(256)),
        ("checkerboard_256", generate_checkerboard(256, 8)),
        ("flat_256", generate_flat(256)),
    ];
    for (name, raster) in cases {
        let tree = QuadTree::build(&raster);
        group.bench_with_input(BenchmarkId::from_parameter(name), &tree, |b, t| {
            b.iter(|| {
                let mut out = Vec::new();
                compress(black_box(t), &mut out).unwrap();
                out
            })
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");
    let cases = [
        ("gradient_256", generate_gradient(256)),
        ("checkerboard_256", generate_checkerboard(256, 8)),
    ];
    for (name, raster) in cases {
        let tree = QuadTree::build(&raster);
        let mut encoded = Vec::new();
        compress(&tree, &mut encoded).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &encoded, |b, doc| {
            b.iter(|| decompress(black_box(&doc[..])).unwrap())
        });
    }
    group.finish();
}

fn bench_reconstruct(c: &mut Criterion) {
    let raster = generate_gradient(256);
    let tree = QuadTree::build(&raster);
    c.bench_function("reconstruct_gradient_256x256", |b| {
        b.iter(|| black_box(&tree).to_raster().unwrap())
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_compress,
    bench_decompress,
    bench_reconstruct
);
criterion_main!(benches);
