/// Benchmark suite for mesh simplification and LOD chain generation.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use softrender::geometry::{generate_sphere, generate_torus};
use softrender::lod::{generate_lod_chain, simplify_clustering, simplify_qem};
use softrender::Material;
use std::sync::Arc;

fn bench_qem(c: &mut Criterion) {
    let mut group = c.benchmark_group("simplify_qem");
    for &segments in &[16u32, 32, 64] {
        let sphere = generate_sphere(5.0, segments / 2, segments, Arc::new(Material::default()));
        let target = sphere.triangle_count() / 4;
        group.bench_with_input(BenchmarkId::from_parameter(segments), &sphere, |b, sphere| {
            b.iter(|| black_box(simplify_qem(black_box(sphere), target).triangle_count()));
        });
    }
    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let torus = generate_torus(6.0, 2.0, 64, 32, Arc::new(Material::default()));
    let mut group = c.benchmark_group("simplify_clustering");
    for &cell in &[0.25f64, 1.0, 2.0] {
        group.bench_with_input(BenchmarkId::from_parameter(cell), &cell, |b, &cell| {
            b.iter(|| black_box(simplify_clustering(black_box(&torus), cell).triangle_count()));
        });
    }
    group.finish();
}

fn bench_lod_chain(c: &mut Criterion) {
    let sphere = Arc::new(generate_sphere(5.0, 32, 64, Arc::new(Material::default())));
    let mut group = c.benchmark_group("generate_lod_chain");
    for (name, use_qem) in [("qem", true), ("clustering", false)] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(generate_lod_chain(sphere.clone(), 4, use_qem, 25.0).is_ok()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_qem, bench_clustering, bench_lod_chain);
criterion_main!(benches);
