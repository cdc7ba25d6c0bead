//! Graticule: the grid of meridians and parallels

use geo_types::{Coord, Geometry, LineString, MultiLineString};

/// Finest spacing and sampling interval, in degrees
pub const MIN_STEP: f64 = 0.1;

/// Meridian/parallel grid generator. `step` and `precision` below
/// [`MIN_STEP`] are raised to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Graticule {
    /// Spacing between grid lines in degrees
    pub step: f64,
    /// Latitude extent of minor meridians
    pub minor_extent: f64,
    /// Sampling interval along each line in degrees
    pub precision: f64,
}

impl Default for Graticule {
    fn default() -> Self {
        Self {
            step: 10.0,
            minor_extent: 80.0,
            precision: 2.5,
        }
    }
}

impl Graticule {
    fn step(&self) -> f64 {
        self.step.max(MIN_STEP)
    }

    fn precision(&self) -> f64 {
        self.precision.max(MIN_STEP)
    }

    fn minor_extent(&self) -> f64 {
        self.minor_extent.clamp(0.0, 90.0)
    }

    /// Meridians every `step` degrees; those on multiples of 90 run pole to pole
    fn meridians(&self) -> Vec<LineString<f64>> {
        let step = self.step();
        let count = (360.0 / step).round() as i64;
        (0..count)
            .map(|i| {
                let lon = -180.0 + i as f64 * step;
                let extent = if (lon % 90.0).abs() < 1e-9 { 90.0 } else { self.minor_extent() };
                self.sample(-extent, extent, |lat| Coord { x: lon, y: lat })
            })
            .collect()
    }

    /// Parallels every `step` degrees within the minor extent
    fn parallels(&self) -> Vec<LineString<f64>> {
        let (step, extent) = (self.step(), self.minor_extent());
        let count = (2.0 * extent / step).round() as i64;
        (0..=count)
            .map(|i| {
                let lat = -extent + i as f64 * step;
                self.sample(-180.0, 180.0, |lon| Coord { x: lon, y: lat })
            })
            .collect()
    }

    fn sample(&self, from: f64, to: f64, at: impl Fn(f64) -> Coord<f64>) -> LineString<f64> {
        let n = ((to - from) / self.precision()).ceil().max(1.0) as usize;
        LineString::from(
            (0..=n)
                .map(|i| at(from + (to - from) * i as f64 / n as f64))
                .collect::<Vec<_>>(),
        )
    }

    /// All grid lines as one geometry
    pub fn lines(&self) -> Geometry<f64> {
        let mut lines = self.meridians();
        lines.extend(self.parallels());
        Geometry::MultiLineString(MultiLineString(lines))
    }
}
