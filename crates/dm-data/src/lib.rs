//! Data collaborators for the map engine
//!
//! Geometry sources (TopoJSON and GeoJSON), the remote-data fetch contract
//! with a local file implementation, a topology cache and the on-disk map
//! description read by the application.

pub mod cache;
pub mod config;
pub mod sources;

use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use cache::TopologyCache;
pub use config::{LayerData, MapFile};
pub use sources::{
    geometry_from_value, load_geometry, normalize_records, DataFetcher, DataFormat, FileFetcher, GeoJsonSource,
    GeometrySource, StaticSource, TopoJsonSource,
};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("No geometry collection named '{0}'")]
    MissingScope(String),

    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => {
                DataError::Io(std::io::Error::new(io_err.kind(), error.to_string()))
            }
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<geojson::Error> for DataError {
    fn from(error: geojson::Error) -> Self {
        DataError::GeoJson(error.to_string())
    }
}
