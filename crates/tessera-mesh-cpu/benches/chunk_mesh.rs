use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tessera_blocks::TextureAtlas;
use tessera_chunk::ChunkStore;
use tessera_mesh_cpu::build_chunk_mesh;
use tessera_world::{ChunkCoord, Generator};

fn bench_generate(c: &mut Criterion) {
    let generator = Generator::new(0);
    c.bench_function("generate_chunk", |b| {
        b.iter(|| black_box(generator.generate(ChunkCoord::new(3, -2))))
    });
}

fn bench_mesh_generated(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_chunk_mesh");
    let atlas = TextureAtlas::default();
    let store = ChunkStore::new(Generator::new(0), 2);
    let center = ChunkCoord::new(0, 0);
    let chunk = store.get(center).unwrap();
    group.bench_function("isolated", |b| {
        b.iter(|| black_box(build_chunk_mesh(&chunk, &store, &atlas)))
    });
    for dx in -1..=1 {
        for dz in -1..=1 {
            store.get(center.offset(dx, dz)).unwrap();
        }
    }
    group.bench_function("with_neighbors", |b| {
        b.iter(|| black_box(build_chunk_mesh(&chunk, &store, &atlas)))
    });
    group.finish();
}

fn short_config() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3))
        .sample_size(20)
}

criterion_group! {
    name = benches;
    config = short_config();
    targets = bench_generate, bench_mesh_generated
}
criterion_main!(benches);
