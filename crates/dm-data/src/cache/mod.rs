//! Geometry caching layer

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::sources::{load_geometry, GeometrySource};
use crate::DataError;

/// Loaded geometry files, shared between map instances
#[derive(Clone)]
pub struct TopologyCache {
    entries: Arc<RwLock<AHashMap<PathBuf, Arc<dyn GeometrySource>>>>,
    /// Maximum number of files kept
    max_entries: usize,
}

impl TopologyCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(AHashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<dyn GeometrySource>> {
        self.entries.read().get(path).cloned()
    }

    /// Cached source for `path`, loading it on a miss
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<dyn GeometrySource>, DataError> {
        if let Some(source) = self.get(path) {
            debug!("Geometry cache hit for {:?}", path);
            return Ok(source);
        }
        let source: Arc<dyn GeometrySource> = Arc::from(load_geometry(path)?);

        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(path) {
            if let Some(key) = entries.keys().next().cloned() {
                entries.remove(&key);
            }
        }
        entries.insert(path.to_path_buf(), source.clone());
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for TopologyCache {
    fn default() -> Self {
        Self::new(8)
    }
}
