//! Path building: geometry in degrees to drawable shapes in surface space

use std::sync::Arc;

use geo::Centroid;
use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use kurbo::{Affine, BezPath, ParamCurveArclen, ParamCurveNearest, PathEl, Point, Shape as _};

use crate::projection::Projection;

/// Tolerance, in surface units, for arc length and nearest-point queries
const ACCURACY: f64 = 1e-3;

/// A flattened run of points
#[derive(Debug, Clone, PartialEq)]
pub struct Subpath {
    pub points: Vec<[f64; 2]>,
    pub closed: bool,
}

pub(crate) fn to_point(p: [f64; 2]) -> Point {
    Point::new(p[0], p[1])
}

pub(crate) fn to_xy(p: Point) -> [f64; 2] {
    [p.x, p.y]
}

/// A drawable path in surface coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    path: BezPath,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a run of points
    pub fn polyline(points: &[[f64; 2]], closed: bool) -> Self {
        let mut shape = Self::new();
        shape.push_run(points, closed);
        shape
    }

    fn push_run(&mut self, points: &[[f64; 2]], closed: bool) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.move_to(*first);
        for p in rest {
            self.line_to(*p);
        }
        if closed {
            self.close();
        }
    }

    pub fn elements(&self) -> &[PathEl] {
        self.path.elements()
    }

    pub fn bez_path(&self) -> &BezPath {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.path.elements().is_empty()
    }

    pub fn move_to(&mut self, p: [f64; 2]) -> &mut Self {
        self.path.move_to(to_point(p));
        self
    }

    pub fn line_to(&mut self, p: [f64; 2]) -> &mut Self {
        self.path.line_to(to_point(p));
        self
    }

    pub fn cubic_to(&mut self, c1: [f64; 2], c2: [f64; 2], to: [f64; 2]) -> &mut Self {
        self.path.curve_to(to_point(c1), to_point(c2), to_point(to));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.path.close_path();
        self
    }

    /// Append all elements of `other`
    pub fn extend(&mut self, other: Shape) {
        for el in other.path.iter() {
            self.path.push(el);
        }
    }

    /// SVG path data with coordinates rounded to thousandths
    pub fn to_svg_path(&self) -> String {
        let round = |p: Point| {
            // adding zero folds -0 into 0
            Point::new((p.x * 1000.0).round() / 1000.0 + 0.0, (p.y * 1000.0).round() / 1000.0 + 0.0)
        };
        let rounded: Vec<PathEl> = self
            .path
            .iter()
            .map(|el| match el {
                PathEl::MoveTo(p) => PathEl::MoveTo(round(p)),
                PathEl::LineTo(p) => PathEl::LineTo(round(p)),
                PathEl::QuadTo(c, p) => PathEl::QuadTo(round(c), round(p)),
                PathEl::CurveTo(c1, c2, p) => PathEl::CurveTo(round(c1), round(c2), round(p)),
                PathEl::ClosePath => PathEl::ClosePath,
            })
            .collect();
        BezPath::from_vec(rounded).to_svg()
    }

    /// Copy with `xf` applied to every point
    pub fn transformed(&self, xf: Affine) -> Shape {
        let mut path = self.path.clone();
        path.apply_affine(xf);
        Shape { path }
    }

    /// Same outline with curves replaced by line segments
    pub fn flattened(&self, tolerance: f64) -> Shape {
        let mut path = BezPath::new();
        kurbo::flatten(self.path.iter(), tolerance, |el| path.push(el));
        Shape { path }
    }

    /// Flatten curves into line runs no further than `tolerance` from the
    /// true outline
    pub fn flatten(&self, tolerance: f64) -> Vec<Subpath> {
        let mut runs = Vec::new();
        let mut current: Vec<[f64; 2]> = Vec::new();
        kurbo::flatten(self.path.iter(), tolerance, |el| match el {
            PathEl::MoveTo(p) => {
                if current.len() > 1 {
                    runs.push(Subpath { points: std::mem::take(&mut current), closed: false });
                }
                current.clear();
                current.push(to_xy(p));
            }
            PathEl::LineTo(p) | PathEl::QuadTo(_, p) | PathEl::CurveTo(_, _, p) => current.push(to_xy(p)),
            PathEl::ClosePath => {
                if !current.is_empty() {
                    runs.push(Subpath { points: std::mem::take(&mut current), closed: true });
                }
            }
        });
        if current.len() > 1 {
            runs.push(Subpath { points: current, closed: false });
        }
        runs
    }

    /// Total arc length, closing segments included
    pub fn length(&self) -> f64 {
        self.path.segments().map(|seg| seg.arclen(ACCURACY)).sum()
    }

    /// Even-odd containment
    pub fn contains(&self, point: [f64; 2]) -> bool {
        self.path.winding(to_point(point)) % 2 != 0
    }

    /// Distance from `point` to the nearest segment
    pub fn distance_to(&self, point: [f64; 2]) -> f64 {
        let target = to_point(point);
        self.path
            .segments()
            .map(|seg| seg.nearest(target, ACCURACY).distance_sq)
            .reduce(f64::min)
            .map_or(f64::INFINITY, f64::sqrt)
    }
}

/// Turns geometries into shapes through a projection
#[derive(Debug, Clone)]
pub struct PathBuilder {
    projection: Arc<dyn Projection>,
}

impl PathBuilder {
    pub fn new(projection: Arc<dyn Projection>) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &Arc<dyn Projection> {
        &self.projection
    }

    /// Project a run of coordinates, splitting it where points are clipped
    fn project_runs(&self, coords: impl Iterator<Item = Coord<f64>>) -> Vec<Vec<[f64; 2]>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for c in coords {
            match self.projection.project([c.x, c.y]) {
                Some(p) => current.push(p),
                None => {
                    if !current.is_empty() {
                        runs.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    /// Projected ring with clipped points dropped
    fn project_ring(&self, ring: &LineString<f64>) -> Vec<[f64; 2]> {
        self.project_runs(ring.coords().copied()).into_iter().flatten().collect()
    }

    /// Drawable shape of `geometry`
    pub fn path(&self, geometry: &Geometry<f64>) -> Shape {
        let mut shape = Shape::new();
        self.append(&mut shape, geometry);
        shape
    }

    fn append(&self, shape: &mut Shape, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => {}
            Geometry::Line(line) => {
                for run in self.project_runs([line.start, line.end].into_iter()) {
                    shape.push_run(&run, false);
                }
            }
            Geometry::LineString(ls) => self.append_line(shape, ls),
            Geometry::MultiLineString(mls) => {
                for ls in &mls.0 {
                    self.append_line(shape, ls);
                }
            }
            Geometry::Polygon(poly) => self.append_polygon(shape, poly),
            Geometry::MultiPolygon(mp) => {
                for poly in &mp.0 {
                    self.append_polygon(shape, poly);
                }
            }
            Geometry::Rect(rect) => self.append_polygon(shape, &rect.to_polygon()),
            Geometry::Triangle(tri) => self.append_polygon(shape, &tri.to_polygon()),
            Geometry::GeometryCollection(gc) => {
                for g in &gc.0 {
                    self.append(shape, g);
                }
            }
        }
    }

    fn append_line(&self, shape: &mut Shape, ls: &LineString<f64>) {
        for run in self.project_runs(ls.coords().copied()) {
            if run.len() > 1 {
                shape.push_run(&run, false);
            }
        }
    }

    fn append_polygon(&self, shape: &mut Shape, poly: &Polygon<f64>) {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            let points = self.project_ring(ring);
            if points.len() >= 3 {
                shape.push_run(&points, true);
            }
        }
    }

    /// Planar centroid of the projected geometry
    pub fn centroid(&self, geometry: &Geometry<f64>) -> Option<[f64; 2]> {
        let projected: Option<geo_types::Point<f64>> = match geometry {
            Geometry::Point(p) => {
                return self.projection.project([p.x(), p.y()]);
            }
            Geometry::Polygon(poly) => self.project_polygons(std::slice::from_ref(poly)).centroid(),
            Geometry::MultiPolygon(mp) => self.project_polygons(&mp.0).centroid(),
            Geometry::LineString(ls) => self.project_lines(std::slice::from_ref(ls)).centroid(),
            Geometry::MultiLineString(mls) => self.project_lines(&mls.0).centroid(),
            Geometry::GeometryCollection(gc) => {
                let polygons: Vec<Polygon<f64>> = gc
                    .0
                    .iter()
                    .flat_map(|g| match g {
                        Geometry::Polygon(p) => vec![p.clone()],
                        Geometry::MultiPolygon(mp) => mp.0.clone(),
                        _ => Vec::new(),
                    })
                    .collect();
                self.project_polygons(&polygons).centroid()
            }
            _ => None,
        };
        projected.map(|p| [p.x(), p.y()])
    }

    fn project_polygons(&self, polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
        let to_ls = |pts: Vec<[f64; 2]>| {
            LineString::from(pts.into_iter().map(|p| Coord { x: p[0], y: p[1] }).collect::<Vec<_>>())
        };
        MultiPolygon(
            polygons
                .iter()
                .filter_map(|poly| {
                    let exterior = self.project_ring(poly.exterior());
                    if exterior.len() < 3 {
                        return None;
                    }
                    let interiors = poly
                        .interiors()
                        .iter()
                        .map(|r| self.project_ring(r))
                        .filter(|r| r.len() >= 3)
                        .map(to_ls)
                        .collect();
                    Some(Polygon::new(to_ls(exterior), interiors))
                })
                .collect(),
        )
    }

    fn project_lines(&self, lines: &[LineString<f64>]) -> MultiLineString<f64> {
        MultiLineString(
            lines
                .iter()
                .flat_map(|ls| self.project_runs(ls.coords().copied()))
                .map(|run| {
                    LineString::from(run.into_iter().map(|p| Coord { x: p[0], y: p[1] }).collect::<Vec<_>>())
                })
                .collect(),
        )
    }

    /// Outline of the visible globe for clipped (azimuthal) projections
    pub fn sphere(&self) -> Option<Shape> {
        let angle = self.projection.clip_angle()?;
        let radius = self.projection.scale() * angle.to_radians().sin().min(1.0);
        let [cx, cy] = self.projection.translate();
        let points: Vec<[f64; 2]> = (0..120)
            .map(|i| {
                let t = i as f64 / 120.0 * std::f64::consts::TAU;
                [cx + radius * t.cos(), cy + radius * t.sin()]
            })
            .collect();
        Some(Shape::polyline(&points, true))
    }

    /// Great-circle arc between two `[longitude, latitude]` points
    pub fn great_arc(&self, from: [f64; 2], to: [f64; 2]) -> Shape {
        let samples = great_circle_points(from, to, 64);
        let coords = samples.into_iter().map(|p| Coord { x: p[0], y: p[1] });
        let mut shape = Shape::new();
        for run in self.project_runs(coords) {
            if run.len() > 1 {
                shape.push_run(&run, false);
            }
        }
        shape
    }
}

/// Points along the great circle from `a` to `b`, in degrees
pub fn great_circle_points(a: [f64; 2], b: [f64; 2], segments: usize) -> Vec<[f64; 2]> {
    let to_xyz = |p: [f64; 2]| {
        let (lon, lat) = (p[0].to_radians(), p[1].to_radians());
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    };
    let (va, vb) = (to_xyz(a), to_xyz(b));
    let dot = (va[0] * vb[0] + va[1] * vb[1] + va[2] * vb[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();
    if omega.abs() < 1e-12 {
        return vec![a, b];
    }
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            let ka = ((1.0 - t) * omega).sin() / omega.sin();
            let kb = (t * omega).sin() / omega.sin();
            let v = [
                ka * va[0] + kb * vb[0],
                ka * va[1] + kb * vb[1],
                ka * va[2] + kb * vb[2],
            ];
            [v[1].atan2(v[0]).to_degrees(), v[2].clamp(-1.0, 1.0).asin().to_degrees()]
        })
        .collect()
}
