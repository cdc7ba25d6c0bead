//! Geometry sources and data fetchers

pub mod file_fetcher;
pub mod geojson_source;
pub mod static_source;
pub mod topojson_source;

use std::path::Path;

use async_trait::async_trait;
use dm_core::Geography;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::DataError;

pub use file_fetcher::FileFetcher;
pub use geojson_source::GeoJsonSource;
pub use static_source::StaticSource;
pub use topojson_source::TopoJsonSource;

/// A topology exposing named feature collections
pub trait GeometrySource: Send + Sync {
    /// Features of the collection named `scope`
    fn features(&self, scope: &str) -> Result<Vec<Geography>, DataError>;

    /// Names of the available collections
    fn scopes(&self) -> Vec<String>;

    fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| s == scope)
    }
}

/// Declared format of a remote dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Json,
    Csv,
    Tsv,
}

impl DataFormat {
    pub fn from_name(name: &str) -> Result<Self, DataError> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Whether rows need keying by `id` after loading
    pub fn is_tabular(&self) -> bool {
        !matches!(self, Self::Json)
    }

    pub(crate) fn delimiter(&self) -> u8 {
        match self {
            Self::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Fetches a dataset given a URL and its declared format. Tabular results
/// come back keyed by each record's `id`.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, url: &str, format: DataFormat) -> Result<Value, DataError>;
}

/// Key rows by their `id` field. Rows without one are skipped.
pub fn normalize_records(rows: Vec<Map<String, Value>>) -> Map<String, Value> {
    let mut keyed = Map::new();
    for row in rows {
        let id = match row.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                warn!("Skipping record without an id: {:?}", row);
                continue;
            }
        };
        keyed.insert(id, Value::Object(row));
    }
    keyed
}

/// Load a geometry file, detecting TopoJSON versus GeoJSON from its content
pub fn load_geometry(path: &Path) -> Result<Box<dyn GeometrySource>, DataError> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let scope = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("world")
        .to_string();
    geometry_from_value(value, &scope)
}

/// Build a geometry source from parsed JSON; bare GeoJSON is exposed under
/// `default_scope`
pub fn geometry_from_value(value: Value, default_scope: &str) -> Result<Box<dyn GeometrySource>, DataError> {
    if value.get("type").and_then(Value::as_str) == Some("Topology") {
        Ok(Box::new(TopoJsonSource::from_value(value)?))
    } else {
        Ok(Box::new(GeoJsonSource::from_value(default_scope, value)?))
    }
}
