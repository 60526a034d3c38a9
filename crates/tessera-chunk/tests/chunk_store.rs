use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use proptest::prelude::*;
use tessera_blocks::BlockType;
use tessera_chunk::ChunkStore;
use tessera_geom::Vec3;
use tessera_store::DurableCache;
use tessera_sync::transport::memory;
use tessera_sync::{Authority, Frame, Request, Response, SyncClient, Transport};
use tessera_world::{BlockCoord, ChunkCoord, Generator, Version};

static SERIAL: AtomicU64 = AtomicU64::new(0);

fn scratch(name: &str) -> PathBuf {
    let n = SERIAL.fetch_add(1, Ordering::Relaxed);
    let mut p = std::env::temp_dir();
    p.push(format!("tessera-chunk-{name}-{}-{n}.db", std::process::id()));
    let _ = fs::remove_file(&p);
    p
}

fn recording_store(radius: i32) -> (ChunkStore, Arc<Mutex<Vec<ChunkCoord>>>) {
    let store = ChunkStore::new(Generator::new(0), radius);
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    store.set_on_evict(move |c, _| sink.lock().unwrap().push(c));
    (store, evicted)
}

#[test]
fn edits_are_visible_and_bump_the_version() {
    let store = ChunkStore::new(Generator::new(0), 2);
    let b = BlockCoord::new(-5, 90, 40);
    let before = store.get(b.chunk()).unwrap().version();
    let after = store.update_block(b, BlockType::GLASS).unwrap();
    assert!(after > before);
    assert_eq!(store.block(b), BlockType::GLASS);
    // same value again: no new version
    assert_eq!(store.update_block(b, BlockType::GLASS), Some(after));
}

#[test]
fn lru_evicts_least_recently_accessed() {
    let (store, evicted) = recording_store(1);
    assert_eq!(store.capacity(), 9);
    let c = |i| ChunkCoord::new(i, 0);
    for i in 0..9 {
        store.get(c(i)).unwrap();
    }
    store.get(c(0)).unwrap();
    // peek does not refresh recency
    store.peek(c(1)).unwrap();
    store.get(c(9)).unwrap();
    assert_eq!(*evicted.lock().unwrap(), vec![c(1)]);
    assert!(store.peek(c(1)).is_none());
    assert!(store.peek(c(0)).is_some());
    assert_eq!(store.stats().evictions, 1);
    assert_eq!(store.len(), 9);
}

#[test]
fn remote_notifications_are_idempotent() {
    let store = ChunkStore::new(Generator::new(0), 2);
    let b = BlockCoord::new(3, 95, 3);
    let chunk = store.get(b.chunk()).unwrap();
    let v1 = store.apply_remote(b, BlockType::WOOD).unwrap();
    let v2 = store.apply_remote(b, BlockType::WOOD).unwrap();
    assert_eq!(v1, v2);
    assert_eq!(chunk.version(), v1);
    assert_eq!(chunk.get(b), BlockType::WOOD);
}

#[test]
fn remote_edit_for_absent_chunk_waits_in_cache() {
    let path = scratch("absent");
    let cache = Arc::new(DurableCache::open(&path).unwrap());
    let store = ChunkStore::new(Generator::new(0), 2).with_cache(Arc::clone(&cache));
    let b = BlockCoord::new(100, 80, 100);
    assert_eq!(store.apply_remote(b, BlockType::SAND), None);
    assert!(store.is_empty());
    assert_eq!(store.block(b), BlockType::SAND);
    drop(store);
    drop(cache);
    let _ = fs::remove_file(&path);
}

#[test]
fn overrides_survive_eviction_and_reopen() {
    let path = scratch("reopen");
    let dug = {
        let cache = Arc::new(DurableCache::open(&path).unwrap());
        let (store, evicted) = recording_store(1);
        let store = store.with_cache(Arc::clone(&cache));
        let placed = BlockCoord::new(1, 70, 1);
        let dug = BlockCoord::new(1, 0, 1);
        store.update_block(placed, BlockType::CLOUD).unwrap();
        store.update_block(dug, BlockType::AIR).unwrap();
        for i in 1..=9 {
            store.get(ChunkCoord::new(i, i)).unwrap();
        }
        assert!(evicted.lock().unwrap().contains(&ChunkCoord::new(0, 0)));
        assert_eq!(store.block(placed), BlockType::CLOUD);
        assert_eq!(store.block(dug), BlockType::AIR);
        drop(store);
        match Arc::try_unwrap(cache) {
            Ok(cache) => cache.close().unwrap(),
            Err(_) => panic!("cache still shared"),
        }
        dug
    };
    let cache = Arc::new(DurableCache::open(&path).unwrap());
    let store = ChunkStore::new(Generator::new(0), 1).with_cache(cache);
    assert_eq!(store.block(BlockCoord::new(1, 70, 1)), BlockType::CLOUD);
    assert_eq!(store.block(dug), BlockType::AIR);
    drop(store);
    let _ = fs::remove_file(&path);
}

#[test]
fn remote_deltas_merge_and_persist_the_stamp() {
    let path = scratch("remote");
    let auth = Authority::new();
    let (client_end, server_end) = memory::pair();
    auth.attach(server_end).unwrap();
    let client = SyncClient::connect(client_end).unwrap();
    let b = BlockCoord::new(-40, 88, -2);
    let stamp = client.update_block(b, BlockType::GLASS).unwrap();

    let cache = Arc::new(DurableCache::open(&path).unwrap());
    let store = ChunkStore::new(Generator::new(0), 2).with_cache(Arc::clone(&cache));
    store.set_sync(Some(Arc::clone(&client)));
    assert_eq!(store.block(b), BlockType::GLASS);
    assert_eq!(cache.get_chunk_version(b.chunk()).unwrap(), Some(stamp));

    // offline: the persisted delta still applies
    client.shutdown();
    let again = ChunkStore::new(Generator::new(0), 2).with_cache(Arc::clone(&cache));
    again.set_sync(Some(client));
    assert_eq!(again.block(b), BlockType::GLASS);
    drop((store, again, cache));
    let _ = fs::remove_file(&path);
}

#[test]
fn remote_edit_during_load_lands_in_the_loaded_chunk() {
    let store = Arc::new(ChunkStore::new(Generator::new(0), 2));
    let b = BlockCoord::new(20, 110, -7);
    let (client_end, server_end) = memory::pair();
    let server = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let (mut sink, mut source) = Box::new(server_end).split();
            sink.send(&Frame::Hello { client_id: 1 }).unwrap();
            let Frame::Request { seq, body: Request::FetchChunk { .. } } = source.recv().unwrap()
            else {
                panic!("expected a chunk fetch");
            };
            // the push for a newer edit overtakes the fetch reply
            assert_eq!(store.apply_remote(b, BlockType::GLASS), None);
            sink.send(&Frame::Response {
                seq,
                body: Response::FetchChunk {
                    blocks: Vec::new(),
                    version: Version(1),
                },
            })
            .unwrap();
            (sink, source)
        })
    };
    let client = SyncClient::connect(client_end).unwrap();
    store.set_sync(Some(Arc::clone(&client)));
    assert_eq!(store.block(b), BlockType::GLASS);
    let chunk = store.peek(b.chunk()).unwrap();
    assert_eq!(chunk.get(b), BlockType::GLASS);
    let (_sink, _source) = server.join().unwrap();
    client.shutdown();
}

#[test]
fn stationary_working_set_stays_resident() {
    for r in 1..=4 {
        let store = ChunkStore::new(Generator::new(0), r);
        let center = ChunkCoord::new(3, -2);
        let square: Vec<ChunkCoord> = (-r..=r)
            .flat_map(|dx| (-r..=r).map(move |dz| center.offset(dx, dz)))
            .collect();
        for &c in &square {
            store.get(c).unwrap();
        }
        let settled = store.stats();
        for _ in 0..10 {
            for &c in &square {
                store.get(c).unwrap();
            }
        }
        let after = store.stats();
        assert_eq!(after.misses, settled.misses, "radius {r}");
        assert_eq!(after.evictions, 0, "radius {r}");
    }
}

#[test]
fn racing_loads_share_one_chunk() {
    let store = ChunkStore::new(Generator::new(0), 3);
    let coords = vec![ChunkCoord::new(2, -1); 8];
    let got = store.get_many(&coords);
    assert_eq!(got.len(), 8);
    assert!(got.iter().all(|c| Arc::ptr_eq(c, &got[0])));
    assert_eq!(store.len(), 1);
    let kept = store.peek(ChunkCoord::new(2, -1)).unwrap();
    assert!(Arc::ptr_eq(&kept, &got[0]));
}

#[test]
fn hit_test_returns_block_and_approach_cell() {
    let store = ChunkStore::new(Generator::new(0), 2);
    let target = BlockCoord::new(0, 100, 0);
    store.update_block(target, BlockType::WOOD).unwrap();
    let hit = store.hit_test(Vec3::new(0.0, 103.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
    assert_eq!(hit, Some((target, Some(BlockCoord::new(0, 101, 0)))));
    assert_eq!(
        store.hit_test(Vec3::new(0.0, 103.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
        None
    );
}

#[test]
fn collide_stops_on_the_floor() {
    let store = ChunkStore::new(Generator::new(0), 2);
    store.update_block(BlockCoord::new(0, 99, 0), BlockType::SAND).unwrap();
    let (pos, stop) = store.collide(Vec3::new(0.0, 100.6, 0.0));
    assert!(stop);
    assert!((pos.y - 100.75).abs() < 1e-5);
    assert_eq!((pos.x, pos.z), (0.0, 0.0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn evictions_follow_access_recency(seq in prop::collection::vec(0i32..14, 1..32)) {
        let (store, evicted) = recording_store(1);
        let cap = store.capacity();
        let mut order: Vec<i32> = Vec::new();
        let mut expect = Vec::new();
        for &i in &seq {
            store.get(ChunkCoord::new(i, 7)).unwrap();
            if let Some(pos) = order.iter().position(|&o| o == i) {
                order.remove(pos);
            } else if order.len() == cap {
                expect.push(ChunkCoord::new(order.remove(0), 7));
            }
            order.push(i);
        }
        prop_assert_eq!(evicted.lock().unwrap().clone(), expect);
        prop_assert_eq!(store.len(), order.len());
    }

    #[test]
    fn version_only_moves_on_change(ws in prop::collection::vec(0i32..4, 1..12)) {
        let store = ChunkStore::new(Generator::new(0), 1);
        let b = BlockCoord::new(5, 120, 5);
        let mut last = store.get(b.chunk()).unwrap().version();
        let mut cur = BlockType::AIR;
        for w in ws {
            let v = store.update_block(b, BlockType(w)).unwrap();
            if BlockType(w) == cur {
                prop_assert_eq!(v, last);
            } else {
                prop_assert!(v > last);
            }
            last = v;
            cur = BlockType(w);
        }
        prop_assert!(last > Version::ZERO);
    }
}
