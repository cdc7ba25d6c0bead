//! Projection selection
//!
//! Turns the scope and projection name of a map into the projector and path
//! builder shared read-only by every layer of one draw cycle.

use std::f64::consts::PI;
use std::sync::Arc;

use dm_core::Options;
use dm_render::{PathBuilder, Projection, ProjectionFactory, ProjectionKind, Shape, StandardProjections};
use serde_json::Value;
use tracing::debug;

use crate::MapError;

/// Vertical centering divisors for world maps
const MERCATOR_CENTER: f64 = 1.45;
const WORLD_CENTER: f64 = 1.8;

/// The single-region scope drawn with the built-in conic projection
pub const USA_SCOPE: &str = "usa";

/// Active projection of a map
#[derive(Debug, Clone)]
pub struct ProjectionState {
    pub projection: Arc<dyn Projection>,
    pub path: PathBuilder,
    /// Outline of the globe, set for clipped projections
    pub sphere: Option<Shape>,
}

impl ProjectionState {
    pub fn new(projection: Box<dyn Projection>) -> Self {
        let projection: Arc<dyn Projection> = Arc::from(projection);
        let path = PathBuilder::new(projection.clone());
        let sphere = path.sphere();
        Self {
            projection,
            path,
            sphere,
        }
    }

    /// Project a latitude/longitude pair, longitude first
    pub fn lat_lng_to_xy(&self, latitude: f64, longitude: f64) -> Option<[f64; 2]> {
        self.projection.project([longitude, latitude])
    }
}

/// Caller-supplied replacement for [`ProjectionManager::setup`], given the
/// surface width and height and the map's options
pub type ProjectionSetup =
    Arc<dyn Fn(f64, f64, &Options) -> Result<ProjectionState, MapError> + Send + Sync>;

/// Configures projections from a [`ProjectionFactory`]
#[derive(Clone)]
pub struct ProjectionManager {
    factory: Arc<dyn ProjectionFactory>,
}

impl ProjectionManager {
    pub fn new(factory: Arc<dyn ProjectionFactory>) -> Self {
        Self { factory }
    }

    pub fn setup(
        &self,
        width: f64,
        height: f64,
        scope: &str,
        projection_name: &str,
        projection_config: Option<&Options>,
    ) -> Result<ProjectionState, MapError> {
        let projection = if scope == USA_SCOPE {
            let mut projection = self.factory.create(ProjectionKind::AlbersUsa.name())?;
            projection.set_scale(width);
            projection.set_translate([width / 2.0, height / 2.0]);
            projection
        } else {
            let mut projection = self.factory.create(projection_name)?;
            let divisor = if projection_name == ProjectionKind::Mercator.name() {
                MERCATOR_CENTER
            } else {
                WORLD_CENTER
            };
            projection.set_scale((width + 1.0) / 2.0 / PI);
            projection.set_translate([width / 2.0, height / divisor]);

            if projection_name == ProjectionKind::Orthographic.name() {
                projection.set_scale(250.0);
                projection.set_clip_angle(Some(90.0));
                projection.set_rotation(rotation(projection_config));
            }
            projection
        };

        debug!(
            "Projection {} for scope '{}': scale {:.2}, translate {:?}",
            projection.kind().name(),
            scope,
            projection.scale(),
            projection.translate()
        );
        Ok(ProjectionState::new(projection))
    }
}

impl Default for ProjectionManager {
    fn default() -> Self {
        Self::new(Arc::new(StandardProjections))
    }
}

fn rotation(config: Option<&Options>) -> [f64; 3] {
    let mut out = [0.0; 3];
    if let Some(values) = config.and_then(|c| c.value("rotation")).and_then(Value::as_array) {
        for (slot, v) in out.iter_mut().zip(values) {
            *slot = v.as_f64().unwrap_or(0.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn close(a: [f64; 2], b: [f64; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6
    }

    #[test]
    fn test_world_projection_centering() {
        let manager = ProjectionManager::default();
        let state = manager.setup(800.0, 450.0, "world", "equirectangular", None).unwrap();
        assert!((state.projection.scale() - 801.0 / 2.0 / PI).abs() < 1e-9);
        assert!(close(state.projection.translate(), [400.0, 250.0]));
        assert!(state.sphere.is_none());

        let mercator = manager.setup(800.0, 450.0, "world", "mercator", None).unwrap();
        assert!(close(mercator.projection.translate(), [400.0, 450.0 / 1.45]));
    }

    #[test]
    fn test_usa_scope_ignores_projection_name() {
        let state = ProjectionManager::default()
            .setup(960.0, 500.0, "usa", "mercator", None)
            .unwrap();
        assert_eq!(state.projection.kind(), ProjectionKind::AlbersUsa);
        assert_eq!(state.projection.scale(), 960.0);
        assert!(close(state.projection.translate(), [480.0, 250.0]));
    }

    #[test]
    fn test_orthographic_gets_globe_settings() {
        let config = Options::new().with("rotation", json!([97, -30]));
        let state = ProjectionManager::default()
            .setup(800.0, 450.0, "world", "orthographic", Some(&config))
            .unwrap();
        assert_eq!(state.projection.scale(), 250.0);
        assert_eq!(state.projection.clip_angle(), Some(90.0));
        assert_eq!(state.projection.rotation(), [97.0, -30.0, 0.0]);
        assert!(state.sphere.is_some());
    }

    #[test]
    fn test_unknown_projection_fails_in_factory() {
        let result = ProjectionManager::default().setup(800.0, 450.0, "world", "winkel3", None);
        assert!(matches!(result, Err(MapError::Render(_))));
    }
}
