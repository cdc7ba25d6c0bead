//! Fill legend

use dm_core::resolve::value_to_string;
use dm_core::{Options, Setting};
use dm_render::{ElementId, ElementKind};

use crate::registry::PluginData;
use crate::{Datamap, MapError};

pub const LEGEND_CLASS: &str = "datamaps-legend";

const ROW_HEIGHT: f64 = 18.0;
const SWATCH: f64 = 12.0;
const MARGIN: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// Ordered legend contents for a fill palette
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegendModel {
    pub title: Option<String>,
    pub entries: Vec<LegendEntry>,
}

impl LegendModel {
    /// One entry per palette key in palette order. The default fill only
    /// appears when `default_fill_name` names it; other keys use their
    /// `labels` entry or `"<key>: "`.
    pub fn from_fills(fills: &Options, settings: &Options) -> Self {
        let labels = settings.group("labels");
        let entries = fills
            .iter()
            .filter_map(|(key, color)| {
                let color = match color {
                    Setting::Value(v) if !v.is_null() => value_to_string(v),
                    _ => return None,
                };
                let label = if key == "default_fill" {
                    settings.str("default_fill_name")?.to_string()
                } else {
                    labels
                        .and_then(|l| l.str(key))
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}: ", key))
                };
                Some(LegendEntry { label, color })
            })
            .collect();

        Self {
            title: settings.str("legend_title").map(str::to_string),
            entries,
        }
    }
}

pub fn draw(map: &mut Datamap, layer: ElementId, data: &PluginData, options: &Options) -> Result<(), MapError> {
    let mut settings = data.as_record().cloned().unwrap_or_default();
    settings.merge_defaults(&[options]);
    let model = LegendModel::from_fills(map.fills(), &settings);

    map.scene.clear_children(layer);
    let mut y = MARGIN;
    if let Some(title) = &model.title {
        let text = map.scene.append(layer, ElementKind::Text)?;
        map.scene
            .element_mut(text)?
            .add_class(LEGEND_CLASS)
            .set_attr("x", MARGIN)
            .set_attr("y", y + SWATCH)
            .set_style("font-size", "14px")
            .set_style("fill", "#000")
            .set_text(title.as_str());
        y += ROW_HEIGHT + 4.0;
    }

    for entry in &model.entries {
        let swatch = map.scene.append(layer, ElementKind::Rect)?;
        map.scene
            .element_mut(swatch)?
            .add_class(LEGEND_CLASS)
            .set_attr("x", MARGIN)
            .set_attr("y", y)
            .set_attr("width", SWATCH)
            .set_attr("height", SWATCH)
            .set_style("fill", entry.color.as_str());

        let label = map.scene.append(layer, ElementKind::Text)?;
        map.scene
            .element_mut(label)?
            .add_class(LEGEND_CLASS)
            .set_attr("x", MARGIN + SWATCH + 6.0)
            .set_attr("y", y + SWATCH - 1.0)
            .set_style("font-size", "12px")
            .set_style("fill", "#000")
            .set_text(entry.label.as_str());
        y += ROW_HEIGHT;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::world_map;
    use crate::registry::LayerCall;

    fn fills() -> Options {
        Options::new()
            .with("default_fill", "#fff")
            .with("HIGH", "#f00")
            .with("LOW", "#00f")
    }

    #[test]
    fn test_default_fill_needs_a_name() {
        let model = LegendModel::from_fills(&fills(), &Options::new());
        let labels: Vec<&str> = model.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["HIGH: ", "LOW: "]);
        assert!(model.title.is_none());

        let named = Options::new()
            .with("default_fill_name", "Other")
            .with("legend_title", "Risk")
            .with("labels", Options::new().with("HIGH", "High risk"));
        let model = LegendModel::from_fills(&fills(), &named);
        assert_eq!(model.title.as_deref(), Some("Risk"));
        assert_eq!(
            model.entries,
            vec![
                LegendEntry { label: "Other".into(), color: "#fff".into() },
                LegendEntry { label: "High risk".into(), color: "#f00".into() },
                LegendEntry { label: "LOW: ".into(), color: "#00f".into() },
            ]
        );
    }

    #[test]
    fn test_legend_draws_swatches() {
        let mut map = world_map();
        let layer = map
            .legend(Options::new().with("legend_title", "Key"), LayerCall::new())
            .unwrap();
        let rects = map
            .scene()
            .children(layer)
            .iter()
            .filter(|id| map.scene().get(**id).is_some_and(|e| e.kind() == ElementKind::Rect))
            .count();
        // world_map's palette is A plus an unnamed default fill
        assert_eq!(rects, 1);
    }
}
