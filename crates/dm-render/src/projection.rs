//! Cartographic projections
//!
//! Projections map `[longitude, latitude]` in degrees to surface
//! coordinates. Each projection is a raw spherical formula followed by a
//! rotation, optional small-circle clipping, scaling and translation, in the
//! same parameterization the engine configures (`scale`, `translate`,
//! `rotate`, `clip_angle`).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;

use crate::RenderError;

/// The projection families provided here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Equirectangular,
    Mercator,
    Orthographic,
    /// Conic equal-area projection tuned for the contiguous United States
    AlbersUsa,
}

impl ProjectionKind {
    /// Look up a projection by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "equirectangular" => Some(Self::Equirectangular),
            "mercator" => Some(Self::Mercator),
            "orthographic" => Some(Self::Orthographic),
            "albersUsa" | "albers_usa" | "albers" => Some(Self::AlbersUsa),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Equirectangular => "equirectangular",
            Self::Mercator => "mercator",
            Self::Orthographic => "orthographic",
            Self::AlbersUsa => "albersUsa",
        }
    }

    /// Raw projection of radians into unit coordinates (y up)
    fn raw(&self, lambda: f64, phi: f64) -> Option<[f64; 2]> {
        let xy = match self {
            Self::Equirectangular => [lambda, phi],
            Self::Mercator => {
                if phi.abs() >= FRAC_PI_2 - 1e-9 {
                    return None;
                }
                [lambda, (FRAC_PI_4 + phi / 2.0).tan().ln()]
            }
            Self::Orthographic => [phi.cos() * lambda.sin(), phi.sin()],
            Self::AlbersUsa => albers_raw(lambda, phi),
        };
        if xy[0].is_finite() && xy[1].is_finite() {
            Some(xy)
        } else {
            None
        }
    }
}

// Standard parallels of the US Albers projection
const ALBERS_PARALLELS: [f64; 2] = [29.5, 45.5];

fn albers_raw(lambda: f64, phi: f64) -> [f64; 2] {
    let sy0 = ALBERS_PARALLELS[0].to_radians().sin();
    let n = (sy0 + ALBERS_PARALLELS[1].to_radians().sin()) / 2.0;
    let c = 1.0 + sy0 * (2.0 * n - sy0);
    let rho0 = c.sqrt() / n;
    let rho = (c - 2.0 * n * phi.sin()).max(0.0).sqrt() / n;
    [rho * (lambda * n).sin(), rho0 - rho * (lambda * n).cos()]
}

/// A configurable projection
pub trait Projection: Send + Sync + fmt::Debug {
    /// The projection family
    fn kind(&self) -> ProjectionKind;

    /// Project `[longitude, latitude]` degrees to surface coordinates.
    /// Returns `None` for clipped or unrepresentable points.
    fn project(&self, lon_lat: [f64; 2]) -> Option<[f64; 2]>;

    fn scale(&self) -> f64;
    fn set_scale(&mut self, scale: f64);

    fn translate(&self) -> [f64; 2];
    fn set_translate(&mut self, translate: [f64; 2]);

    /// Rotation `[lambda, phi, gamma]` in degrees
    fn rotation(&self) -> [f64; 3];
    fn set_rotation(&mut self, rotation: [f64; 3]);

    /// Small-circle clip radius in degrees
    fn clip_angle(&self) -> Option<f64>;
    fn set_clip_angle(&mut self, angle: Option<f64>);
}

/// Produces ready-to-scale projections by name
pub trait ProjectionFactory: Send + Sync {
    fn create(&self, name: &str) -> Result<Box<dyn Projection>, RenderError>;
}

/// Factory for the projections in this module
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardProjections;

impl ProjectionFactory for StandardProjections {
    fn create(&self, name: &str) -> Result<Box<dyn Projection>, RenderError> {
        ProjectionKind::from_name(name)
            .map(|kind| Box::new(StandardProjection::new(kind)) as Box<dyn Projection>)
            .ok_or_else(|| RenderError::UnknownProjection(name.to_string()))
    }
}

/// Raw projection plus the shared scale/translate/rotate/clip pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct StandardProjection {
    kind: ProjectionKind,
    scale: f64,
    translate: [f64; 2],
    rotation: [f64; 3],
    center: [f64; 2],
    clip_angle: Option<f64>,
}

impl StandardProjection {
    pub fn new(kind: ProjectionKind) -> Self {
        match kind {
            ProjectionKind::AlbersUsa => Self {
                kind,
                scale: 1070.0,
                translate: [480.0, 250.0],
                rotation: [96.0, 0.0, 0.0],
                center: [-0.6, 38.7],
                clip_angle: None,
            },
            _ => Self {
                kind,
                scale: 150.0,
                translate: [480.0, 250.0],
                rotation: [0.0, 0.0, 0.0],
                center: [0.0, 0.0],
                clip_angle: None,
            },
        }
    }

    fn rotate(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let [dl, dp, dg] = self.rotation.map(f64::to_radians);
        let mut lambda = lambda + dl;
        if lambda > PI {
            lambda -= 2.0 * PI;
        } else if lambda < -PI {
            lambda += 2.0 * PI;
        }
        if dp == 0.0 && dg == 0.0 {
            return (lambda, phi);
        }

        let (sin_dp, cos_dp) = dp.sin_cos();
        let (sin_dg, cos_dg) = dg.sin_cos();
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let k = z * cos_dp + x * sin_dp;
        (
            (y * cos_dg - k * sin_dg).atan2(x * cos_dp - z * sin_dp),
            (k * cos_dg + y * sin_dg).clamp(-1.0, 1.0).asin(),
        )
    }

    fn visible(&self, lambda: f64, phi: f64) -> bool {
        match self.clip_angle {
            Some(angle) => lambda.cos() * phi.cos() >= angle.to_radians().cos() - 1e-12,
            None => true,
        }
    }
}

impl Projection for StandardProjection {
    fn kind(&self) -> ProjectionKind {
        self.kind
    }

    fn project(&self, lon_lat: [f64; 2]) -> Option<[f64; 2]> {
        let [lon, lat] = lon_lat;
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let phi = lat.to_radians().clamp(-FRAC_PI_2, FRAC_PI_2);
        let (lambda, phi) = self.rotate(lon.to_radians(), phi);
        if !self.visible(lambda, phi) {
            return None;
        }
        let [x, y] = self.kind.raw(lambda, phi)?;
        let [cx, cy] = self
            .kind
            .raw(self.center[0].to_radians(), self.center[1].to_radians())
            .unwrap_or([0.0, 0.0]);
        Some([
            self.translate[0] + (x - cx) * self.scale,
            self.translate[1] - (y - cy) * self.scale,
        ])
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    fn translate(&self) -> [f64; 2] {
        self.translate
    }

    fn set_translate(&mut self, translate: [f64; 2]) {
        self.translate = translate;
    }

    fn rotation(&self) -> [f64; 3] {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: [f64; 3]) {
        self.rotation = rotation;
    }

    fn clip_angle(&self) -> Option<f64> {
        self.clip_angle
    }

    fn set_clip_angle(&mut self, angle: Option<f64>) {
        self.clip_angle = angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 2], b: [f64; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6
    }

    #[test]
    fn test_equirectangular_origin_maps_to_translate() {
        let mut p = StandardProjection::new(ProjectionKind::Equirectangular);
        p.set_translate([400.0, 200.0]);
        assert_eq!(p.project([0.0, 0.0]), Some([400.0, 200.0]));

        // longitude first, latitude second; north is up
        let east = p.project([90.0, 0.0]).unwrap();
        let north = p.project([0.0, 45.0]).unwrap();
        assert!(east[0] > 400.0 && (east[1] - 200.0).abs() < 1e-9);
        assert!(north[1] < 200.0 && (north[0] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_mercator_stretches_latitude() {
        let merc = StandardProjection::new(ProjectionKind::Mercator);
        let equi = StandardProjection::new(ProjectionKind::Equirectangular);
        let m = merc.project([0.0, 60.0]).unwrap();
        let e = equi.project([0.0, 60.0]).unwrap();
        assert!(m[1] < e[1]);
        assert!(merc.project([0.0, 90.0]).is_none());
    }

    #[test]
    fn test_orthographic_clips_far_side() {
        let mut p = StandardProjection::new(ProjectionKind::Orthographic);
        p.set_clip_angle(Some(90.0));
        assert!(p.project([0.0, 0.0]).is_some());
        assert!(p.project([180.0, 0.0]).is_none());

        p.set_rotation([180.0, 0.0, 0.0]);
        assert!(p.project([0.0, 0.0]).is_none());
        assert!(close(p.project([180.0, 0.0]).unwrap(), p.translate()));
    }

    #[test]
    fn test_albers_centers_on_usa() {
        let p = StandardProjection::new(ProjectionKind::AlbersUsa);
        let center = p.project([-96.6, 38.7]).unwrap();
        assert!(close(center, p.translate()));
    }

    #[test]
    fn test_factory_rejects_unknown_names() {
        assert!(StandardProjections.create("mercator").is_ok());
        assert_eq!(
            StandardProjections.create("winkel3").unwrap_err(),
            RenderError::UnknownProjection("winkel3".to_string())
        );
    }
}
