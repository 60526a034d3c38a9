use std::sync::Mutex;

use hashbrown::{HashMap, HashSet};
use tessera_world::{ChunkCoord, Version};

/// A mesh living on the GPU.
#[derive(Debug)]
pub struct CachedMesh<H> {
    pub handle: H,
    pub faces: usize,
    /// Chunk version the vertex data was built from.
    pub version: Version,
    pub dirty: bool,
}

/// Result of comparing the cache against the needed set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildPlan {
    /// Absent (and not building) or dirty.
    pub add: Vec<ChunkCoord>,
    /// Cached but no longer needed.
    pub remove: Vec<ChunkCoord>,
}

struct Inner<H> {
    meshes: HashMap<ChunkCoord, CachedMesh<H>>,
    building: HashSet<ChunkCoord>,
    // marked dirty while a build was in flight
    stale: HashSet<ChunkCoord>,
}

type EvictFn<H> = Box<dyn Fn(ChunkCoord, H) + Send + Sync>;

/// Coordinate-keyed meshes plus the set currently being built. Handles that are replaced
/// or removed go to the eviction callback; the cache never releases them itself.
pub struct MeshCache<H> {
    inner: Mutex<Inner<H>>,
    on_evict: EvictFn<H>,
}

impl<H> MeshCache<H> {
    pub fn new(on_evict: impl Fn(ChunkCoord, H) + Send + Sync + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                meshes: HashMap::new(),
                building: HashSet::new(),
                stale: HashSet::new(),
            }),
            on_evict: Box::new(on_evict),
        }
    }

    /// Installs a freshly built mesh. A build that was invalidated while in flight is
    /// installed already dirty.
    pub fn insert(&self, coord: ChunkCoord, mut mesh: CachedMesh<H>) {
        let old = {
            let mut inner = self.inner.lock().unwrap();
            inner.building.remove(&coord);
            if inner.stale.remove(&coord) {
                mesh.dirty = true;
            }
            inner.meshes.insert(coord, mesh)
        };
        if let Some(old) = old {
            (self.on_evict)(coord, old.handle);
        }
    }

    pub fn remove(&self, coord: ChunkCoord) -> bool {
        let old = self.inner.lock().unwrap().meshes.remove(&coord);
        match old {
            Some(old) => {
                (self.on_evict)(coord, old.handle);
                true
            }
            None => false,
        }
    }

    /// Flags the mesh for rebuild. Returns false when nothing is cached or building.
    pub fn mark_dirty(&self, coord: ChunkCoord) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if inner.building.contains(&coord) {
            inner.stale.insert(coord);
        }
        if let Some(m) = inner.meshes.get_mut(&coord) {
            m.dirty = true;
            return true;
        }
        inner.stale.contains(&coord)
    }

    pub fn begin_build(&self, coords: &[ChunkCoord]) {
        let mut inner = self.inner.lock().unwrap();
        for c in coords {
            inner.building.insert(*c);
            inner.stale.remove(c);
        }
    }

    /// Clears the building flag without installing anything.
    pub fn abandon_build(&self, coord: ChunkCoord) {
        let mut inner = self.inner.lock().unwrap();
        inner.building.remove(&coord);
        inner.stale.remove(&coord);
    }

    pub fn is_building(&self, coord: ChunkCoord) -> bool {
        self.inner.lock().unwrap().building.contains(&coord)
    }

    /// `(version, dirty)` of the cached mesh.
    pub fn state(&self, coord: ChunkCoord) -> Option<(Version, bool)> {
        let inner = self.inner.lock().unwrap();
        inner.meshes.get(&coord).map(|m| (m.version, m.dirty))
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.inner.lock().unwrap().meshes.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.inner.lock().unwrap().meshes.keys().copied().collect()
    }

    /// Splits `needed` into builds to start and cached meshes to drop.
    pub fn plan(&self, needed: &[ChunkCoord]) -> BuildPlan {
        let inner = self.inner.lock().unwrap();
        let wanted: HashSet<ChunkCoord> = needed.iter().copied().collect();
        let add = needed
            .iter()
            .copied()
            .filter(|c| match inner.meshes.get(c) {
                Some(m) => m.dirty && !inner.building.contains(c),
                None => !inner.building.contains(c),
            })
            .collect();
        let remove = inner
            .meshes
            .keys()
            .copied()
            .filter(|c| !wanted.contains(c))
            .collect();
        BuildPlan { add, remove }
    }

    /// Visits every cached mesh with the cache locked.
    pub fn for_each(&self, mut f: impl FnMut(ChunkCoord, &CachedMesh<H>)) {
        let inner = self.inner.lock().unwrap();
        for (c, m) in inner.meshes.iter() {
            f(*c, m);
        }
    }

    /// Empties the cache, handing every handle to the eviction callback.
    pub fn clear(&self) {
        let drained: Vec<(ChunkCoord, CachedMesh<H>)> = {
            let mut inner = self.inner.lock().unwrap();
            inner.building.clear();
            inner.stale.clear();
            inner.meshes.drain().collect()
        };
        for (c, m) in drained {
            (self.on_evict)(c, m.handle);
        }
    }
}
