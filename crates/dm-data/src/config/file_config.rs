//! On-disk description of a map to draw

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DataError;

/// Datasets for the plugin layers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayerData {
    /// Bubble records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubbles: Option<Value>,

    /// Arc records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arcs: Option<Value>,

    /// Options for the labels layer; labels are drawn when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Value>,

    /// Options for the legend layer; a legend is drawn when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<Value>,

    /// Draw the graticule
    #[serde(default)]
    pub graticule: bool,
}

/// A map file: geometry, options and layer data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapFile {
    /// Geometry file (TopoJSON or GeoJSON), relative to the map file
    pub geometry: PathBuf,

    /// Map options as accepted by the engine
    #[serde(default = "empty_object")]
    pub options: Value,

    /// Plugin layer data
    #[serde(default)]
    pub layers: LayerData,

    /// Choropleth update applied after the first draw
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choropleth: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl MapFile {
    pub fn new(geometry: impl Into<PathBuf>) -> Self {
        Self {
            geometry: geometry.into(),
            options: empty_object(),
            layers: LayerData::default(),
            choropleth: None,
        }
    }

    /// Read a map file; relative paths inside it resolve against its directory
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        let mut file: MapFile = serde_json::from_str(&text)?;
        if file.geometry.is_relative() {
            if let Some(dir) = path.parent() {
                file.geometry = dir.join(&file.geometry);
            }
        }
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The geometry file name
    pub fn geometry_name(&self) -> String {
        self.geometry
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_and_relative_geometry() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("dm-mapfile-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"geometry": "world.topo.json", "layers": {"bubbles": [], "graticule": true}}"#,
        )
        .unwrap();

        let file = MapFile::load(&path).unwrap();
        assert_eq!(file.geometry, dir.join("world.topo.json"));
        assert_eq!(file.geometry_name(), "world.topo.json");
        assert_eq!(file.options, json!({}));
        assert_eq!(file.layers.bubbles, Some(json!([])));
        assert!(file.layers.graticule);
        assert!(file.layers.arcs.is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_save_round_trip() {
        let path = std::env::temp_dir().join(format!("dm-mapfile-save-{}.json", std::process::id()));
        let mut file = MapFile::new("/maps/usa.json");
        file.options = json!({"scope": "usa"});
        file.save(&path).unwrap();
        assert_eq!(MapFile::load(&path).unwrap(), file);
        let _ = std::fs::remove_file(path);
    }
}
