//! Location resolution
//!
//! Turns the location descriptors found on bubbles and arcs into surface
//! coordinates: explicit latitude/longitude, a region to center on, or a
//! bare region code. Hand-picked anchors stand in for a handful of countries
//! whose centroids land somewhere unhelpful.

use std::sync::Arc;

use dm_core::{iso3166, resolve_for_point, Datum, Geography, Setting};
use indexmap::IndexMap;
use serde_json::Value;

use crate::projection::ProjectionState;
use crate::MapError;

/// `(code, latitude, longitude)` anchors for arc endpoints
pub const ARC_ANCHORS: &[(&str, f64, f64)] = &[
    ("USA", 41.140276, -100.760145),
    ("CAN", 56.624472, -114.665293),
    ("JPN", 35.689487, 139.691706),
    ("CHL", -33.448890, -70.669265),
    ("IDN", -6.208763, 106.845599),
    ("MYS", 14.599512, 120.984219),
    ("NOR", 59.913869, 10.752245),
];

/// `(code, latitude, longitude)` anchors for `centered` descriptors
pub const CENTERED_ANCHORS: &[(&str, f64, f64)] = &[
    ("USA", 39.83333, -98.58333),
    ("CAN", 56.624472, -114.665293),
    ("JPN", 35.689487, 139.691706),
    ("CHL", -33.448890, -70.669265),
    ("IDN", -6.208763, 106.845599),
    ("MYS", 14.599512, 120.984219),
    ("NOR", 60.054542, 7.542494),
];

fn anchor(table: &[(&str, f64, f64)], code: &str) -> Option<(f64, f64)> {
    table
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, lat, lon)| (*lat, *lon))
}

/// Read a coordinate, accepting numbers and numeric strings
fn coordinate(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Resolves descriptors against the active projection and the drawn regions
#[derive(Clone, Copy)]
pub struct LocationResolver<'a> {
    projection: &'a ProjectionState,
    regions: &'a IndexMap<String, Arc<Geography>>,
}

impl<'a> LocationResolver<'a> {
    pub fn new(projection: &'a ProjectionState, regions: &'a IndexMap<String, Arc<Geography>>) -> Self {
        Self { projection, regions }
    }

    pub fn lat_lng_to_xy(&self, latitude: f64, longitude: f64) -> Option<[f64; 2]> {
        self.projection.lat_lng_to_xy(latitude, longitude)
    }

    /// Centroid of the drawn region with id `code`
    pub fn region_centroid(&self, code: &str) -> Option<[f64; 2]> {
        let geometry = self.regions.get(code)?.geometry.as_ref()?;
        self.projection.path.centroid(geometry)
    }

    /// Latitude and longitude of `record`, resolving function values
    /// against `datum`
    fn lat_lng(record: &Datum, datum: &Datum) -> Option<(f64, f64)> {
        let latitude = coordinate(resolve_for_point(record.get("latitude"), None, datum))?;
        let longitude = coordinate(resolve_for_point(record.get("longitude"), None, datum))?;
        Some((latitude, longitude))
    }

    /// Position of a bubble-like datum.
    ///
    /// Explicit `latitude`/`longitude` win. Otherwise `centered` names a
    /// region in any ISO-3166 code form, placed at its anchor when it has
    /// one and at the drawn region's centroid when it does not.
    pub fn to_xy(&self, datum: &Datum) -> Result<[f64; 2], MapError> {
        if datum.is_set("latitude") && datum.is_set("longitude") {
            let (latitude, longitude) = Self::lat_lng(datum, datum)
                .ok_or_else(|| MapError::UnresolvedLocation(describe(datum)))?;
            return self
                .lat_lng_to_xy(latitude, longitude)
                .ok_or_else(|| MapError::UnresolvedLocation(describe(datum)));
        }

        if let Some(centered) = resolve_for_point(datum.get("centered"), None, datum) {
            let centered = match centered {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let code = iso3166(&centered)?;
            let xy = match anchor(CENTERED_ANCHORS, &code) {
                Some((lat, lon)) => self.lat_lng_to_xy(lat, lon),
                None => self.region_centroid(&code),
            };
            return xy.ok_or(MapError::UnresolvedLocation(code));
        }

        Err(MapError::UnresolvedLocation(describe(datum)))
    }

    /// Position of one end of an arc: a region code or a record with
    /// `latitude`/`longitude`
    pub fn endpoint_xy(&self, endpoint: &Setting, datum: &Datum) -> Result<[f64; 2], MapError> {
        match endpoint {
            Setting::Value(Value::String(code)) => {
                let code = iso3166(code).unwrap_or_else(|_| code.clone());
                let xy = match anchor(ARC_ANCHORS, &code) {
                    Some((lat, lon)) => self.lat_lng_to_xy(lat, lon),
                    None => self.region_centroid(&code),
                };
                xy.ok_or(MapError::UnresolvedLocation(code))
            }
            Setting::Group(record) => Self::lat_lng(record, datum)
                .and_then(|(lat, lon)| self.lat_lng_to_xy(lat, lon))
                .ok_or_else(|| MapError::UnresolvedLocation(describe(record))),
            other => Err(MapError::UnresolvedLocation(format!("{:?}", other))),
        }
    }

    /// `[longitude, latitude]` of an arc endpoint, for great-circle arcs
    pub fn endpoint_lon_lat(&self, endpoint: &Setting, datum: &Datum) -> Option<[f64; 2]> {
        match endpoint {
            Setting::Value(Value::String(code)) => {
                let code = iso3166(code).unwrap_or_else(|_| code.clone());
                anchor(ARC_ANCHORS, &code).map(|(lat, lon)| [lon, lat])
            }
            Setting::Group(record) => Self::lat_lng(record, datum).map(|(lat, lon)| [lon, lat]),
            _ => None,
        }
    }
}

/// Short JSON rendering of a datum for diagnostics
pub fn describe(datum: &Datum) -> String {
    datum.to_json().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionManager;
    use dm_core::Options;
    use geo_types::{polygon, Geometry};
    use serde_json::json;

    fn state() -> ProjectionState {
        ProjectionManager::default()
            .setup(800.0, 450.0, "world", "equirectangular", None)
            .unwrap()
    }

    fn regions() -> IndexMap<String, Arc<Geography>> {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let mut map = IndexMap::new();
        map.insert(
            "FRA".to_string(),
            Arc::new(Geography::new("FRA").with_geometry(Geometry::Polygon(square))),
        );
        map
    }

    fn close(a: [f64; 2], b: [f64; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6
    }

    #[test]
    fn test_lat_lng_is_not_transposed() {
        let state = state();
        let regions = regions();
        let resolver = LocationResolver::new(&state, &regions);
        let datum = Options::from_json(json!({"latitude": 35.0, "longitude": 139.0}));
        let expected = state.projection.project([139.0, 35.0]).unwrap();
        assert!(close(resolver.to_xy(&datum).unwrap(), expected));

        let strings = Options::from_json(json!({"latitude": "35", "longitude": "139"}));
        assert!(close(resolver.to_xy(&strings).unwrap(), expected));
    }

    #[test]
    fn test_centered_uses_anchor_then_centroid() {
        let state = state();
        let regions = regions();
        let resolver = LocationResolver::new(&state, &regions);

        let usa = Options::from_json(json!({"centered": "US"}));
        let expected = state.projection.project([-98.58333, 39.83333]).unwrap();
        assert!(close(resolver.to_xy(&usa).unwrap(), expected));

        let france = Options::from_json(json!({"centered": "FR"}));
        let centroid = state.projection.project([5.0, 5.0]).unwrap();
        assert!(close(resolver.to_xy(&france).unwrap(), centroid));
    }

    #[test]
    fn test_unresolvable_descriptors() {
        let state = state();
        let regions = regions();
        let resolver = LocationResolver::new(&state, &regions);

        let nothing = Options::from_json(json!({"radius": 4}));
        assert!(matches!(resolver.to_xy(&nothing), Err(MapError::UnresolvedLocation(_))));

        let undrawn = Options::from_json(json!({"centered": "DEU"}));
        assert!(matches!(resolver.to_xy(&undrawn), Err(MapError::UnresolvedLocation(_))));

        let unknown = Options::from_json(json!({"centered": "ZZ"}));
        assert!(matches!(resolver.to_xy(&unknown), Err(MapError::Lookup(_))));
    }

    #[test]
    fn test_arc_endpoints_prefer_anchors() {
        let state = state();
        let regions = IndexMap::new();
        let resolver = LocationResolver::new(&state, &regions);
        let datum = Options::new();

        let jpn = resolver.endpoint_xy(&Setting::from("JPN"), &datum).unwrap();
        assert!(close(jpn, state.projection.project([139.691706, 35.689487]).unwrap()));

        let record = Setting::Group(Options::from_json(json!({"latitude": 10, "longitude": 20})));
        let xy = resolver.endpoint_xy(&record, &datum).unwrap();
        assert!(close(xy, state.projection.project([20.0, 10.0]).unwrap()));
        assert_eq!(resolver.endpoint_lon_lat(&record, &datum), Some([20.0, 10.0]));

        assert!(resolver.endpoint_xy(&Setting::from("BRA"), &datum).is_err());
    }
}
