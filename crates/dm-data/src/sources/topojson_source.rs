//! TopoJSON topology decoding

use std::collections::HashMap;

use dm_core::Geography;
use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::GeometrySource;
use crate::DataError;

#[derive(Debug, Clone, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Clone, Deserialize)]
struct TopoObject {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    arcs: Option<Value>,
    #[serde(default)]
    coordinates: Option<Value>,
    #[serde(default)]
    geometries: Option<Vec<TopoObject>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Topology {
    #[serde(default)]
    transform: Option<Transform>,
    objects: HashMap<String, TopoObject>,
    #[serde(default)]
    arcs: Vec<Vec<Vec<f64>>>,
}

/// A decoded TopoJSON topology. Arcs are dequantized once on load.
#[derive(Debug, Clone)]
pub struct TopoJsonSource {
    objects: HashMap<String, TopoObject>,
    transform: Option<Transform>,
    arcs: Vec<Vec<Coord<f64>>>,
}

impl TopoJsonSource {
    pub fn from_value(value: Value) -> Result<Self, DataError> {
        let topology: Topology = serde_json::from_value(value)?;
        let transform = topology.transform.clone();
        let arcs = topology
            .arcs
            .iter()
            .map(|arc| decode_arc(arc, transform.as_ref()))
            .collect();
        debug!(
            "Loaded topology with {} objects and {} arcs",
            topology.objects.len(),
            topology.arcs.len()
        );
        Ok(Self {
            objects: topology.objects,
            transform,
            arcs,
        })
    }

    pub fn parse(text: &str) -> Result<Self, DataError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    fn position(&self, value: &Value) -> Result<Coord<f64>, DataError> {
        let pair = value
            .as_array()
            .filter(|a| a.len() >= 2)
            .ok_or_else(|| DataError::Topology(format!("invalid position: {}", value)))?;
        let n = |v: &Value| v.as_f64().ok_or_else(|| DataError::Topology(format!("invalid coordinate: {}", v)));
        let (x, y) = (n(&pair[0])?, n(&pair[1])?);
        Ok(match &self.transform {
            Some(t) => Coord {
                x: x * t.scale[0] + t.translate[0],
                y: y * t.scale[1] + t.translate[1],
            },
            None => Coord { x, y },
        })
    }

    /// Stitch a list of arc indexes into one line. Negative indexes are
    /// reversed arcs (`!i`); shared endpoints are emitted once.
    fn stitch(&self, indexes: &Value) -> Result<Vec<Coord<f64>>, DataError> {
        let indexes = indexes
            .as_array()
            .ok_or_else(|| DataError::Topology("arc list is not an array".to_string()))?;
        let mut points: Vec<Coord<f64>> = Vec::new();
        for index in indexes {
            let i = index
                .as_i64()
                .ok_or_else(|| DataError::Topology(format!("invalid arc index: {}", index)))?;
            let (arc_index, reversed) = if i < 0 { ((!i) as usize, true) } else { (i as usize, false) };
            let arc = self
                .arcs
                .get(arc_index)
                .ok_or_else(|| DataError::Topology(format!("arc {} out of range", arc_index)))?;
            let mut segment: Vec<Coord<f64>> = arc.clone();
            if reversed {
                segment.reverse();
            }
            if !points.is_empty() && !segment.is_empty() {
                segment.remove(0);
            }
            points.extend(segment);
        }
        Ok(points)
    }

    fn nested<'v>(value: Option<&'v Value>, what: &str) -> Result<&'v Vec<Value>, DataError> {
        value
            .and_then(Value::as_array)
            .ok_or_else(|| DataError::Topology(format!("{} is missing or not an array", what)))
    }

    fn polygon(&self, rings: &Value) -> Result<Polygon<f64>, DataError> {
        let mut rings = Self::nested(Some(rings), "polygon rings")?
            .iter()
            .map(|r| self.stitch(r).map(LineString::from));
        let exterior = rings.next().transpose()?.unwrap_or_else(|| LineString::new(Vec::new()));
        let interiors = rings.collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn geometry(&self, object: &TopoObject) -> Result<Option<Geometry<f64>>, DataError> {
        let arcs = object.arcs.as_ref();
        let coordinates = object.coordinates.as_ref();
        let geometry = match object.kind.as_deref() {
            None | Some("null") => return Ok(None),
            Some("Point") => Geometry::Point(Point(self.position(coordinates.unwrap_or(&Value::Null))?)),
            Some("MultiPoint") => Geometry::MultiPoint(MultiPoint(
                Self::nested(coordinates, "coordinates")?
                    .iter()
                    .map(|p| self.position(p).map(Point))
                    .collect::<Result<_, _>>()?,
            )),
            Some("LineString") => Geometry::LineString(LineString::from(self.stitch(arcs.unwrap_or(&Value::Null))?)),
            Some("MultiLineString") => Geometry::MultiLineString(MultiLineString(
                Self::nested(arcs, "arcs")?
                    .iter()
                    .map(|l| self.stitch(l).map(LineString::from))
                    .collect::<Result<_, _>>()?,
            )),
            Some("Polygon") => Geometry::Polygon(self.polygon(arcs.unwrap_or(&Value::Null))?),
            Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon(
                Self::nested(arcs, "arcs")?
                    .iter()
                    .map(|p| self.polygon(p))
                    .collect::<Result<_, _>>()?,
            )),
            Some("GeometryCollection") => Geometry::GeometryCollection(GeometryCollection(
                object
                    .geometries
                    .iter()
                    .flatten()
                    .filter_map(|g| self.geometry(g).transpose())
                    .collect::<Result<_, _>>()?,
            )),
            Some(other) => return Err(DataError::Topology(format!("unknown geometry type {}", other))),
        };
        Ok(Some(geometry))
    }

    fn feature(&self, object: &TopoObject) -> Result<Geography, DataError> {
        let id = match &object.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Ok(Geography {
            id,
            properties: object.properties.clone().unwrap_or_default(),
            geometry: self.geometry(object)?,
        })
    }
}

fn decode_arc(arc: &[Vec<f64>], transform: Option<&Transform>) -> Vec<Coord<f64>> {
    match transform {
        Some(t) => {
            let (mut x, mut y) = (0.0, 0.0);
            arc.iter()
                .filter(|p| p.len() >= 2)
                .map(|p| {
                    x += p[0];
                    y += p[1];
                    Coord {
                        x: x * t.scale[0] + t.translate[0],
                        y: y * t.scale[1] + t.translate[1],
                    }
                })
                .collect()
        }
        None => arc
            .iter()
            .filter(|p| p.len() >= 2)
            .map(|p| Coord { x: p[0], y: p[1] })
            .collect(),
    }
}

impl GeometrySource for TopoJsonSource {
    fn features(&self, scope: &str) -> Result<Vec<Geography>, DataError> {
        let object = self
            .objects
            .get(scope)
            .ok_or_else(|| DataError::MissingScope(scope.to_string()))?;
        match object.kind.as_deref() {
            Some("GeometryCollection") => object
                .geometries
                .iter()
                .flatten()
                .map(|g| self.feature(g))
                .collect(),
            _ => Ok(vec![self.feature(object)?]),
        }
    }

    fn scopes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Two unit squares sharing the edge x = 1, quantized with scale 1
    fn topology() -> Value {
        json!({
            "type": "Topology",
            "transform": {"scale": [1.0, 1.0], "translate": [10.0, 20.0]},
            "objects": {
                "world": {
                    "type": "GeometryCollection",
                    "geometries": [
                        {"type": "Polygon", "id": "AAA", "properties": {"name": "Left"}, "arcs": [[0, 1]]},
                        {"type": "Polygon", "id": 840, "arcs": [[2, -1]]},
                        {"type": null, "id": "NUL"}
                    ]
                }
            },
            "arcs": [
                [[1, 0], [0, 1]],
                [[1, 1], [-1, 0], [0, -1], [1, 0]],
                [[1, 0], [1, 0], [0, 1], [-1, 0]]
            ]
        })
    }

    #[test]
    fn test_decodes_features_with_shared_arcs() {
        let source = TopoJsonSource::from_value(topology()).unwrap();
        assert_eq!(source.scopes(), vec!["world".to_string()]);

        let features = source.features("world").unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].id, "AAA");
        assert_eq!(features[0].name(), "Left");
        assert_eq!(features[1].id, "840");
        assert!(features[2].geometry.is_none());

        let Some(Geometry::Polygon(left)) = &features[0].geometry else {
            panic!("expected polygon");
        };
        let ring: Vec<(f64, f64)> = left.exterior().coords().map(|c| (c.x, c.y)).collect();
        assert_eq!(ring.first(), Some(&(11.0, 20.0)));
        assert_eq!(ring[1], (11.0, 21.0));
        assert!(left.exterior().is_closed());

        let Some(Geometry::Polygon(right)) = &features[1].geometry else {
            panic!("expected polygon");
        };
        // Reversed shared arc closes the right square back at its start
        assert_eq!(right.exterior().coords().last().map(|c| (c.x, c.y)), Some((11.0, 20.0)));
    }

    #[test]
    fn test_missing_scope() {
        let source = TopoJsonSource::from_value(topology()).unwrap();
        assert!(matches!(source.features("usa"), Err(DataError::MissingScope(_))));
        assert!(!source.has_scope("usa"));
    }
}
