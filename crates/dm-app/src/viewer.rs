//! Interactive map window

use eframe::egui::{self, Align2, Color32, FontId, Painter, Pos2, Rect, Sense, Stroke};
use tracing::warn;

use dm_map::Datamap;
use dm_render::{Paint, Renderer, RendererCapabilities, Rgba, Shape};

/// Paints a scene with an egui painter, offset to the map's rect
struct EguiRenderer<'a> {
    painter: &'a Painter,
    origin: Pos2,
}

impl EguiRenderer<'_> {
    fn pos(&self, p: [f64; 2]) -> Pos2 {
        Pos2::new(self.origin.x + p[0] as f32, self.origin.y + p[1] as f32)
    }

    fn stroke(paint: &Paint) -> Stroke {
        match paint.stroke {
            Some(c) => Stroke::new(paint.stroke_width as f32, color(c)),
            None => Stroke::NONE,
        }
    }
}

fn color(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

impl Renderer for EguiRenderer<'_> {
    fn begin_frame(&mut self, width: f64, height: f64) {
        let rect = Rect::from_min_size(self.origin, egui::vec2(width as f32, height as f32));
        self.painter.rect_filled(rect, 0.0, Color32::WHITE);
    }

    fn end_frame(&mut self) {}

    fn draw_path(&mut self, shape: &Shape, paint: &Paint) {
        let stroke = Self::stroke(paint);
        for run in shape.flatten(0.25) {
            let points: Vec<Pos2> = run.points.iter().map(|p| self.pos(*p)).collect();
            if points.len() < 2 {
                continue;
            }
            if run.closed {
                // egui fills convex outlines only; concave regions are approximate
                if let Some(fill) = paint.fill.filter(|_| points.len() > 2) {
                    self.painter
                        .add(egui::Shape::convex_polygon(points.clone(), color(fill), Stroke::NONE));
                }
                if stroke != Stroke::NONE {
                    self.painter.add(egui::Shape::closed_line(points, stroke));
                }
            } else if stroke != Stroke::NONE {
                self.painter.add(egui::Shape::line(points, stroke));
            }
        }
    }

    fn draw_circle(&mut self, center: [f64; 2], radius: f64, paint: &Paint) {
        let fill = paint.fill.map(color).unwrap_or(Color32::TRANSPARENT);
        self.painter
            .circle(self.pos(center), radius as f32, fill, Self::stroke(paint));
    }

    fn draw_line(&mut self, start: [f64; 2], end: [f64; 2], paint: &Paint) {
        self.painter
            .line_segment([self.pos(start), self.pos(end)], Self::stroke(paint));
    }

    fn draw_rect(&mut self, min: [f64; 2], size: [f64; 2], paint: &Paint) {
        let rect = Rect::from_min_size(self.pos(min), egui::vec2(size[0] as f32, size[1] as f32));
        let fill = paint.fill.map(color).unwrap_or(Color32::TRANSPARENT);
        self.painter.rect(rect, 0.0, fill, Self::stroke(paint));
    }

    fn draw_text(&mut self, text: &str, position: [f64; 2], font_size: f64, paint: &Paint) {
        let fill = paint.fill.map(color).unwrap_or(Color32::BLACK);
        self.painter.text(
            self.pos(position),
            Align2::LEFT_BOTTOM,
            text,
            FontId::proportional(font_size as f32),
            fill,
        );
    }

    fn capabilities(&self) -> RendererCapabilities {
        RendererCapabilities {
            supports_curves: false,
            supports_text: true,
        }
    }
}

/// Popup markup as plain text lines
fn popup_text(html: &str) -> String {
    let html = html.replace("<br>", "\n");
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Application state
pub struct MapViewer {
    map: Datamap,
    last_time: Option<f64>,
}

impl MapViewer {
    pub fn new(_cc: &eframe::CreationContext<'_>, map: Datamap) -> Self {
        Self { map, last_time: None }
    }
}

impl eframe::App for MapViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time);
        let elapsed = self.last_time.map(|t| (now - t) * 1000.0).unwrap_or(0.0);
        self.last_time = Some(now);
        self.map.scene_mut().advance(elapsed);

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_width() as f64;
            if (available - self.map.scene().size()[0]).abs() > 1.0 {
                self.map.resize(available);
            }

            let [width, height] = self.map.scene().size();
            let (response, painter) =
                ui.allocate_painter(egui::vec2(width as f32, height as f32), Sense::hover());
            let origin = response.rect.min;
            let mut renderer = EguiRenderer {
                painter: &painter,
                origin,
            };
            self.map.scene().render(&mut renderer);

            match response.hover_pos() {
                Some(pos) => {
                    let local = [(pos.x - origin.x) as f64, (pos.y - origin.y) as f64];
                    if let Err(e) = self.map.pointer_moved(local) {
                        warn!("Hover failed: {}", e);
                    }
                }
                None if self.map.hovered().is_some() => self.map.hover_end(),
                None => {}
            }

            if let Some(popup) = self.map.popup() {
                let text = popup_text(&popup.html);
                if !text.is_empty() {
                    let at = origin + egui::vec2(popup.position[0] as f32, popup.position[1] as f32);
                    egui::Area::new("datamap-popup")
                        .fixed_pos(at)
                        .order(egui::Order::Tooltip)
                        .show(ctx, |ui| {
                            egui::Frame::popup(ui.style()).show(ui, |ui| {
                                ui.label(text);
                            });
                        });
                }
            }
        });

        if self.map.scene().is_animating() || self.map.hovered().is_some() {
            ctx.request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_text() {
        let html = "<div class=\"hoverinfo\"><strong>Arc</strong><br>USA -> JPN</div>";
        assert_eq!(popup_text(html), "Arc\nUSA -> JPN");
    }
}
