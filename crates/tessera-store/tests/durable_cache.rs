use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use proptest::prelude::*;
use tessera_blocks::BlockType;
use tessera_store::{DurableCache, StoreError};
use tessera_world::{BlockCoord, ChunkCoord, PlayerState, Version};

static SERIAL: AtomicU64 = AtomicU64::new(0);

fn scratch(name: &str) -> PathBuf {
    let n = SERIAL.fetch_add(1, Ordering::Relaxed);
    let mut p = std::env::temp_dir();
    p.push(format!("tessera-cache-{name}-{}-{n}", std::process::id()));
    let _ = std::fs::remove_dir_all(&p);
    p.push("cache.db");
    p
}

fn cleanup(path: &PathBuf) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

fn replay(cache: &DurableCache, c: ChunkCoord) -> HashMap<BlockCoord, BlockType> {
    let mut out = HashMap::new();
    cache
        .for_each_block_in_chunk(c, |b, w| {
            out.insert(b, w);
        })
        .unwrap();
    out
}

fn arb_block() -> impl Strategy<Value = BlockCoord> {
    (-100i32..100, 0i32..80, -100i32..100).prop_map(|(x, y, z)| BlockCoord::new(x, y, z))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn overrides_survive_close_and_reopen(
        edits in prop::collection::vec((arb_block(), 0i32..40), 1..60)
    ) {
        let path = scratch("roundtrip");
        let mut expected: HashMap<ChunkCoord, HashMap<BlockCoord, BlockType>> = HashMap::new();
        {
            let cache = DurableCache::open(&path).unwrap();
            for (b, w) in &edits {
                cache.put_block(*b, BlockType(*w)).unwrap();
                expected.entry(b.chunk()).or_default().insert(*b, BlockType(*w));
            }
            cache.close().unwrap();
        }
        let cache = DurableCache::open(&path).unwrap();
        for (c, blocks) in &expected {
            prop_assert_eq!(&replay(&cache, *c), blocks);
        }
        drop(cache);
        cleanup(&path);
    }
}

#[test]
fn scan_is_confined_to_one_chunk_across_sign_boundaries() {
    let path = scratch("confined");
    let cache = DurableCache::open(&path).unwrap();
    let inside = [BlockCoord::new(-1, 3, -1), BlockCoord::new(-32, 0, -32)];
    let outside = [
        BlockCoord::new(0, 3, -1),
        BlockCoord::new(-1, 3, 0),
        BlockCoord::new(-33, 3, -1),
    ];
    for b in inside.iter().chain(outside.iter()) {
        cache.put_block(*b, BlockType::GRASS).unwrap();
    }
    let got = replay(&cache, ChunkCoord::new(-1, -1));
    assert_eq!(got.len(), 2);
    for b in inside {
        assert_eq!(got.get(&b), Some(&BlockType::GRASS));
    }
    drop(cache);
    cleanup(&path);
}

#[test]
fn air_override_is_kept_as_a_deletion_marker() {
    let path = scratch("air");
    let cache = DurableCache::open(&path).unwrap();
    let b = BlockCoord::new(4, 10, 4);
    cache.put_block(b, BlockType::WOOD).unwrap();
    cache.put_block(b, BlockType::AIR).unwrap();
    let got = replay(&cache, b.chunk());
    assert_eq!(got.get(&b), Some(&BlockType::AIR));
    drop(cache);
    cleanup(&path);
}

#[test]
fn versions_and_player_state_persist() {
    let path = scratch("meta");
    let c = ChunkCoord::new(7, -3);
    let pose = PlayerState {
        x: 12.5,
        y: 40.0,
        z: -8.0,
        rx: -90.0,
        ry: 10.0,
    };
    {
        let cache = DurableCache::open(&path).unwrap();
        assert_eq!(cache.get_chunk_version(c).unwrap(), None);
        assert_eq!(cache.get_player_state().unwrap(), PlayerState::default());
        cache.put_chunk_version(c, Version(3)).unwrap();
        cache.put_chunk_version(c, Version(9)).unwrap();
        cache.put_player_state(&pose).unwrap();
        // no explicit close: drop still flushes
    }
    let cache = DurableCache::open(&path).unwrap();
    assert_eq!(cache.get_chunk_version(c).unwrap(), Some(Version(9)));
    assert_eq!(cache.get_chunk_version(c.offset(1, 0)).unwrap(), None);
    assert_eq!(cache.get_player_state().unwrap(), pose);
    drop(cache);
    cleanup(&path);
}

#[test]
fn foreign_file_is_an_error() {
    let path = scratch("foreign");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"SQLite format 3\0").unwrap();
    assert!(matches!(DurableCache::open(&path), Err(StoreError::BadHeader)));
    cleanup(&path);
}

#[test]
fn one_handle_owns_the_file() {
    let path = scratch("exclusive");
    let a = DurableCache::open(&path).unwrap();
    let b = BlockCoord::new(1, 1, 1);
    a.put_block(b, BlockType(5)).unwrap();
    assert!(matches!(DurableCache::open(&path), Err(StoreError::Locked(_))));
    a.close().unwrap();

    let again = DurableCache::open(&path).unwrap();
    assert_eq!(replay(&again, b.chunk()).get(&b), Some(&BlockType(5)));
    drop(again);
    cleanup(&path);
}
