//! Rendering collaborator for the map engine
//!
//! This crate provides the cartographic projections, the path builder that
//! turns geometries into drawable shapes, the retained scene the engine
//! draws into, and renderers that paint a scene (SVG here, egui in the app).

pub mod color;
pub mod graticule;
pub mod path;
pub mod projection;
pub mod scene;
pub mod svg;

use thiserror::Error;

pub use color::Rgba;
pub use graticule::Graticule;
pub use kurbo::{Affine, PathEl, Point};
pub use path::{PathBuilder, Shape, Subpath};
pub use projection::{Projection, ProjectionFactory, ProjectionKind, StandardProjection, StandardProjections};
pub use scene::{Bound, Element, ElementId, ElementKind, Paint, Scene, Transition};
pub use svg::SvgRenderer;

/// Errors raised by the rendering collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    #[error("Unknown element: {0:?}")]
    UnknownElement(ElementId),
}

/// Trait for renderers that paint a [`Scene`]
pub trait Renderer {
    /// Begin a new frame
    fn begin_frame(&mut self, width: f64, height: f64);

    /// End the current frame
    fn end_frame(&mut self);

    /// Draw a path shape
    fn draw_path(&mut self, shape: &Shape, paint: &Paint);

    /// Draw a circle
    fn draw_circle(&mut self, center: [f64; 2], radius: f64, paint: &Paint);

    /// Draw a line
    fn draw_line(&mut self, start: [f64; 2], end: [f64; 2], paint: &Paint);

    /// Draw a rectangle
    fn draw_rect(&mut self, min: [f64; 2], size: [f64; 2], paint: &Paint);

    /// Draw text anchored at its baseline start
    fn draw_text(&mut self, text: &str, position: [f64; 2], font_size: f64, paint: &Paint);

    /// Get renderer capabilities
    fn capabilities(&self) -> RendererCapabilities;
}

/// Renderer capabilities
#[derive(Debug, Clone, Copy)]
pub struct RendererCapabilities {
    /// Whether cubic curves can be drawn natively. Curves are flattened
    /// into line segments otherwise.
    pub supports_curves: bool,

    /// Whether text can be drawn
    pub supports_text: bool,
}
