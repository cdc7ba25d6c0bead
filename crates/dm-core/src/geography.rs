//! Region records of the base map

use geo_types::Geometry;
use serde_json::{Map, Value};

/// One feature of a scope's geometry collection (a country, a state)
#[derive(Debug, Clone, PartialEq)]
pub struct Geography {
    /// Region identifier, normally an ISO-3166 alpha-3 code or a state code
    pub id: String,

    /// Feature properties (`name` and anything else the source carries)
    pub properties: Map<String, Value>,

    /// Unprojected geometry in longitude/latitude degrees
    pub geometry: Option<Geometry<f64>>,
}

impl Geography {
    /// Create a geography without properties or geometry
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Map::new(),
            geometry: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Display name, falling back to the id
    pub fn name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.id)
    }

    /// Follow a dot-separated path such as `id` or `properties.alpha2code`
    pub fn lookup_path(&self, path: &str) -> Option<String> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = match first {
            "id" => return Some(self.id.clone()).filter(|_| segments.next().is_none()),
            "properties" => {
                let key = segments.next()?;
                self.properties.get(key)?
            }
            other => self.properties.get(other)?,
        };
        for segment in segments {
            current = current.get(segment)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
