//! GeoJSON feature collections as geometry sources

use std::collections::BTreeMap;

use dm_core::Geography;
use geojson::{feature::Id, Feature, GeoJson};
use serde_json::Value;

use super::GeometrySource;
use crate::DataError;

/// Named GeoJSON feature collections
#[derive(Debug, Clone, Default)]
pub struct GeoJsonSource {
    collections: BTreeMap<String, Vec<Geography>>,
}

impl GeoJsonSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a GeoJSON document and expose it under `scope`
    pub fn from_value(scope: &str, value: Value) -> Result<Self, DataError> {
        let mut source = Self::new();
        source.insert(scope, GeoJson::from_json_value(value)?)?;
        Ok(source)
    }

    /// Add (or replace) the collection named `scope`
    pub fn insert(&mut self, scope: &str, geojson: GeoJson) -> Result<(), DataError> {
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        };
        let geographies = features
            .into_iter()
            .map(to_geography)
            .collect::<Result<Vec<_>, _>>()?;
        self.collections.insert(scope.to_string(), geographies);
        Ok(())
    }
}

fn to_geography(feature: Feature) -> Result<Geography, DataError> {
    let id = match &feature.id {
        Some(Id::String(s)) => s.clone(),
        Some(Id::Number(n)) => n.to_string(),
        None => feature
            .properties
            .as_ref()
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };
    let geometry = feature
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;
    Ok(Geography {
        id,
        properties: feature.properties.unwrap_or_default(),
        geometry,
    })
}

impl GeometrySource for GeoJsonSource {
    fn features(&self, scope: &str) -> Result<Vec<Geography>, DataError> {
        self.collections
            .get(scope)
            .cloned()
            .ok_or_else(|| DataError::MissingScope(scope.to_string()))
    }

    fn scopes(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}
