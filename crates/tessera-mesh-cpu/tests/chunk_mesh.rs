use std::collections::BTreeSet;

use proptest::prelude::*;
use tessera_blocks::{BlockType, TextureAtlas};
use tessera_chunk::{Chunk, ChunkStore};
use tessera_mesh_cpu::{Face, build_chunk_mesh, visible_faces};
use tessera_world::{BlockCoord, BlockMap, ChunkCoord, Generator, Version};

fn chunk_of(blocks: &[(BlockCoord, BlockType)]) -> (Chunk, BlockMap) {
    let map: BlockMap = blocks.iter().copied().collect();
    let chunk = Chunk::new(ChunkCoord::new(0, 0), map.clone(), Version(1));
    (chunk, map)
}

#[test]
fn lone_block_shows_every_face() {
    let (chunk, map) = chunk_of(&[(BlockCoord::new(4, 9, 4), BlockType::SAND)]);
    let mesh = build_chunk_mesh(&chunk, &map, &TextureAtlas::default());
    assert_eq!(mesh.faces(), 6);
    assert_eq!(mesh.vertices(), 36);
}

#[test]
fn bottom_layer_hides_its_floor() {
    let b = BlockCoord::new(4, 0, 4);
    let (chunk, map) = chunk_of(&[(b, BlockType::SAND)]);
    assert!(!visible_faces(&map, b)[Face::Down.index()]);
    assert_eq!(build_chunk_mesh(&chunk, &map, &TextureAtlas::default()).faces(), 5);
}

#[test]
fn shared_faces_are_culled_unless_transparent() {
    let a = BlockCoord::new(2, 5, 2);
    let (chunk, map) = chunk_of(&[(a, BlockType::SAND), (a.right(), BlockType::WOOD)]);
    assert_eq!(build_chunk_mesh(&chunk, &map, &TextureAtlas::default()).faces(), 10);

    let (chunk, map) = chunk_of(&[(a, BlockType::GLASS), (a.right(), BlockType::GLASS)]);
    assert_eq!(build_chunk_mesh(&chunk, &map, &TextureAtlas::default()).faces(), 12);
}

#[test]
fn plants_are_four_crossed_quads() {
    let b = BlockCoord::new(7, 13, 7);
    let (chunk, map) = chunk_of(&[(b, BlockType::TALL_GRASS), (b.down(), BlockType::GRASS)]);
    // the grass top stays visible because plants are transparent
    assert_eq!(build_chunk_mesh(&chunk, &map, &TextureAtlas::default()).faces(), 4 + 6);
}

#[test]
#[should_panic(expected = "fatal invariant violated")]
fn stored_air_is_fatal() {
    let (chunk, map) = chunk_of(&[(BlockCoord::new(1, 1, 1), BlockType::AIR)]);
    build_chunk_mesh(&chunk, &map, &TextureAtlas::default());
}

#[test]
fn generated_chunk_meshes_against_the_store() {
    let store = ChunkStore::new(Generator::new(0), 2);
    let chunk = store.get(ChunkCoord::new(0, 0)).unwrap();
    let atlas = TextureAtlas::default();
    let alone = build_chunk_mesh(&chunk, &store, &atlas);
    assert!(alone.faces() > 0);
    // loading a neighbour hides faces along the shared border
    store.get(ChunkCoord::new(1, 0)).unwrap();
    let joined = build_chunk_mesh(&chunk, &store, &atlas);
    assert!(joined.faces() < alone.faces());
}

proptest! {
    #[test]
    fn opaque_faces_match_exposed_sides(
        cells in prop::collection::btree_set((0i32..6, 0i32..6, 0i32..6), 1..40)
    ) {
        let set: BTreeSet<BlockCoord> = cells.into_iter().map(BlockCoord::from).collect();
        let blocks: Vec<_> = set.iter().map(|&b| (b, BlockType::SAND)).collect();
        let (chunk, map) = chunk_of(&blocks);
        let mut expect = 0;
        for &b in &set {
            for (i, n) in b.neighbors().into_iter().enumerate() {
                if i == Face::Down.index() && b.y == 0 {
                    continue;
                }
                if !set.contains(&n) {
                    expect += 1;
                }
            }
        }
        prop_assert_eq!(build_chunk_mesh(&chunk, &map, &TextureAtlas::default()).faces(), expect);
    }
}
