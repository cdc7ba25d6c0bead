//! In-memory geometry source

use ahash::AHashMap;
use dm_core::Geography;

use super::GeometrySource;
use crate::DataError;

/// Geographies held in memory, keyed by scope
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    scopes: AHashMap<String, Vec<Geography>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: &str, features: Vec<Geography>) -> Self {
        self.scopes.insert(scope.to_string(), features);
        self
    }
}

impl GeometrySource for StaticSource {
    fn features(&self, scope: &str) -> Result<Vec<Geography>, DataError> {
        self.scopes
            .get(scope)
            .cloned()
            .ok_or_else(|| DataError::MissingScope(scope.to_string()))
    }

    fn scopes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.keys().cloned().collect();
        names.sort();
        names
    }
}
