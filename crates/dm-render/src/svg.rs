//! SVG renderer

use std::fmt::Write;

use crate::color::Rgba;
use crate::path::Shape;
use crate::scene::Paint;
use crate::{Renderer, RendererCapabilities};

/// Renders a scene into a standalone SVG document
#[derive(Debug, Default)]
pub struct SvgRenderer {
    out: String,
}

impl SvgRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document written so far
    pub fn finish(self) -> String {
        self.out
    }

    fn paint_attrs(paint: &Paint) -> String {
        let color = |c: Option<Rgba>| c.map(|c| c.to_css()).unwrap_or_else(|| "none".to_string());
        let mut attrs = format!(r#" fill="{}""#, color(paint.fill));
        if paint.stroke.is_some() {
            let _ = write!(
                attrs,
                r#" stroke="{}" stroke-width="{}""#,
                color(paint.stroke),
                paint.stroke_width
            );
        }
        attrs
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Renderer for SvgRenderer {
    fn begin_frame(&mut self, width: f64, height: f64) {
        self.out.clear();
        let _ = writeln!(
            self.out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        );
    }

    fn end_frame(&mut self) {
        self.out.push_str("</svg>\n");
    }

    fn draw_path(&mut self, shape: &Shape, paint: &Paint) {
        if shape.is_empty() {
            return;
        }
        let _ = writeln!(
            self.out,
            r#"<path d="{}"{}/>"#,
            shape.to_svg_path(),
            Self::paint_attrs(paint)
        );
    }

    fn draw_circle(&mut self, center: [f64; 2], radius: f64, paint: &Paint) {
        let _ = writeln!(
            self.out,
            r#"<circle cx="{}" cy="{}" r="{}"{}/>"#,
            center[0],
            center[1],
            radius,
            Self::paint_attrs(paint)
        );
    }

    fn draw_line(&mut self, start: [f64; 2], end: [f64; 2], paint: &Paint) {
        let stroke = paint.stroke.or(paint.fill).unwrap_or(Rgba::BLACK);
        let _ = writeln!(
            self.out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            start[0],
            start[1],
            end[0],
            end[1],
            stroke.to_css(),
            paint.stroke_width
        );
    }

    fn draw_rect(&mut self, min: [f64; 2], size: [f64; 2], paint: &Paint) {
        let _ = writeln!(
            self.out,
            r#"<rect x="{}" y="{}" width="{}" height="{}"{}/>"#,
            min[0],
            min[1],
            size[0],
            size[1],
            Self::paint_attrs(paint)
        );
    }

    fn draw_text(&mut self, text: &str, position: [f64; 2], font_size: f64, paint: &Paint) {
        let fill = paint.fill.unwrap_or(Rgba::BLACK).to_css();
        let _ = writeln!(
            self.out,
            r#"<text x="{}" y="{}" font-size="{}" fill="{}">{}</text>"#,
            position[0],
            position[1],
            font_size,
            fill,
            escape(text)
        );
    }

    fn capabilities(&self) -> RendererCapabilities {
        RendererCapabilities {
            supports_curves: true,
            supports_text: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ElementKind, Scene};

    #[test]
    fn test_scene_to_svg() {
        let mut scene = Scene::new(200.0, 100.0);
        let circle = scene.append(scene.root(), ElementKind::Circle).unwrap();
        scene
            .get_mut(circle)
            .unwrap()
            .set_attr("cx", 5.0)
            .set_attr("cy", 6.0)
            .set_attr("r", 4.0)
            .set_style("fill", "#abdda4")
            .set_style("stroke", "#FFFFFF")
            .set_style("stroke-width", 2.0);
        let label = scene.append(scene.root(), ElementKind::Text).unwrap();
        scene.get_mut(label).unwrap().set_text("A&B");

        let mut svg = SvgRenderer::new();
        scene.render(&mut svg);
        let doc = svg.finish();

        assert!(doc.starts_with("<svg"));
        assert!(doc.contains(r#"viewBox="0 0 200 100""#));
        assert!(doc.contains(
            r##"<circle cx="5" cy="6" r="4" fill="#abdda4" stroke="#ffffff" stroke-width="2"/>"##
        ));
        assert!(doc.contains("A&amp;B"));
        assert!(doc.trim_end().ends_with("</svg>"));
    }
}
