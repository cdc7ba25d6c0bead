//! Region labels
//!
//! Every drawn region gets its id (or custom text) next to its centroid.
//! States too small to hold a label are listed off the coast instead, with
//! a leader line back to the state.

use dm_core::Options;
use dm_render::{ElementId, ElementKind};
use serde_json::{json, Value};
use tracing::debug;

use super::LABELS;
use crate::registry::PluginData;
use crate::{Datamap, MapError};

pub const LABEL_CLASS: &str = "datamaps-label";

/// States listed beside the map, in stacking order
const SMALL_STATES: &[&str] = &["VT", "NH", "MA", "RI", "CT", "NJ", "DE", "MD", "DC"];

/// `[longitude, latitude]` where the small-state list starts
const SMALL_STATE_START: [f64; 2] = [-67.707617, 42.722131];

/// Offset subtracted from x and added to y of a region's centroid
fn label_offset(id: &str) -> (f64, f64) {
    let mut x = 7.5;
    let mut y = 5.0;
    if ["FL", "KY", "MI"].contains(&id) {
        x = -2.5;
    }
    if id == "NY" {
        x = -1.0;
    }
    if id == "MI" {
        y = 18.0;
    }
    if id == "LA" {
        x = 13.0;
    }
    (x, y)
}

/// Label settings come with the call's data; the layer options fill gaps
pub fn draw(map: &mut Datamap, layer: ElementId, data: &PluginData, options: &Options) -> Result<(), MapError> {
    let mut settings = data.as_record().cloned().unwrap_or_default();
    settings.merge_defaults(&[options]);

    let font_size = settings.f64("font_size");
    let font_family = settings.str("font_family").unwrap_or("Verdana").to_string();
    let label_color = settings.str("label_color").unwrap_or("#000").to_string();
    let line_width = settings.f64("line_width").unwrap_or(1.0);
    let start = map.projection.projection.project(SMALL_STATE_START);

    struct Label {
        text: String,
        at: [f64; 2],
        leader: Option<[[f64; 2]; 2]>,
    }

    let mut labels = Vec::with_capacity(map.regions.len());
    for (id, geography) in &map.regions {
        let Some(center) = geography
            .geometry
            .as_ref()
            .and_then(|g| map.projection.path.centroid(g))
        else {
            continue;
        };
        let (dx, dy) = label_offset(id);
        let mut at = [center[0] - dx, center[1] + dy];
        let mut leader = None;

        if let (Some(index), Some(start)) = (SMALL_STATES.iter().position(|s| *s == id.as_str()), start) {
            at = [start[0], start[1] + index as f64 * (2.0 + font_size.unwrap_or(12.0))];
            leader = Some([[at[0] - 3.0, at[1] - 5.0], center]);
        }

        let text = settings
            .group("custom_label_text")
            .and_then(|custom| custom.value(id))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| id.clone());
        labels.push(Label { text, at, leader });
    }

    map.scene.clear_children(layer);
    for label in &labels {
        if let Some([from, to]) = label.leader {
            let line = map.scene.append(layer, ElementKind::Line)?;
            map.scene
                .element_mut(line)?
                .add_class(LABEL_CLASS)
                .set_attr("x1", from[0])
                .set_attr("y1", from[1])
                .set_attr("x2", to[0])
                .set_attr("y2", to[1])
                .set_style("stroke", label_color.as_str())
                .set_style("stroke-width", line_width);
        }
        let text = map.scene.append(layer, ElementKind::Text)?;
        map.scene
            .element_mut(text)?
            .add_class(LABEL_CLASS)
            .set_attr("x", label.at[0])
            .set_attr("y", label.at[1])
            .set_style("font-size", json!(format!("{}px", font_size.unwrap_or(10.0))))
            .set_style("font-family", font_family.as_str())
            .set_style("fill", label_color.as_str())
            .set_style("pointer-events", "none")
            .set_text(label.text.as_str());
    }

    debug!("Drew {} {}", labels.len(), LABELS);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::usa_map;
    use crate::registry::LayerCall;

    fn texts(map: &Datamap, layer: ElementId) -> Vec<String> {
        map.scene()
            .children(layer)
            .iter()
            .filter_map(|id| map.scene().get(*id)?.text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_offsets() {
        assert_eq!(label_offset("TX"), (7.5, 5.0));
        assert_eq!(label_offset("MI"), (-2.5, 18.0));
        assert_eq!(label_offset("LA"), (13.0, 5.0));
        assert_eq!(label_offset("NY"), (-1.0, 5.0));
    }

    #[test]
    fn test_labels_and_leader_lines() {
        let mut map = usa_map();
        let settings = Options::new()
            .with("font_size", 14)
            .with("custom_label_text", Options::new().with("TX", "Texas"));
        let layer = map.labels(settings, LayerCall::new()).unwrap();

        let mut labels = texts(&map, layer);
        labels.sort();
        assert_eq!(labels, vec!["Texas", "VT"]);

        let lines: Vec<ElementId> = map
            .scene()
            .children(layer)
            .iter()
            .copied()
            .filter(|id| map.scene().get(*id).is_some_and(|e| e.kind() == ElementKind::Line))
            .collect();
        assert_eq!(lines.len(), 1);

        let text = map
            .scene()
            .children(layer)
            .iter()
            .find_map(|id| map.scene().get(*id).filter(|e| e.kind() == ElementKind::Text))
            .unwrap();
        assert_eq!(text.style_str("font-size").as_deref(), Some("14px"));
    }

    #[test]
    fn test_redraw_replaces_labels() {
        let mut map = usa_map();
        let layer = map.labels(Options::new(), LayerCall::new()).unwrap();
        let first = map.scene().children(layer).len();
        map.labels(Options::new(), LayerCall::new()).unwrap();
        assert_eq!(map.scene().children(layer).len(), first);
    }
}
