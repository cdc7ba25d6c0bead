//! Hover highlighting and popups
//!
//! The host reports pointer positions or hovered elements; the map applies
//! highlight styles, remembers what they replaced, and computes popup
//! content. Pointer capture stays with the host.

use dm_core::resolve::value_to_string;
use dm_core::{resolve_for_point, resolve_for_region, Datum, Options};
use dm_render::{Bound, ElementId, RenderError};
use serde_json::Value;
use tracing::debug;

use crate::layers::arcs::ARC_CLASS;
use crate::layers::bubbles::BUBBLE_CLASS;
use crate::layers::subunits::SUBUNIT_CLASS;
use crate::{Datamap, MapError};

/// Vertical offset of a popup below the pointer
const POPUP_OFFSET: f64 = 30.0;

/// Highlight option and the style it replaces
const HIGHLIGHTS: &[(&str, &str)] = &[
    ("highlight_fill_color", "fill"),
    ("highlight_border_color", "stroke"),
    ("highlight_border_width", "stroke-width"),
    ("highlight_border_opacity", "stroke-opacity"),
    ("highlight_fill_opacity", "fill-opacity"),
];

/// What kind of element is hovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverKind {
    Region,
    Bubble,
    Arc,
}

impl HoverKind {
    fn of(classes: &[String]) -> Option<Self> {
        classes.iter().find_map(|class| match class.as_str() {
            SUBUNIT_CLASS => Some(Self::Region),
            BUBBLE_CLASS => Some(Self::Bubble),
            ARC_CLASS => Some(Self::Arc),
            _ => None,
        })
    }

    fn config(self) -> &'static str {
        match self {
            Self::Region => "geography_config",
            Self::Bubble => "bubbles_config",
            Self::Arc => "arc_config",
        }
    }
}

/// Popup content and where to show it
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub element: ElementId,
    pub html: String,
    pub position: [f64; 2],
}

#[derive(Debug, Default)]
pub(crate) struct HoverState {
    active: Option<ElementId>,
    saved: Vec<(&'static str, Value)>,
    popup: Option<Popup>,
}

impl Datamap {
    pub fn hovered(&self) -> Option<ElementId> {
        self.hover.active
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.hover.popup.as_ref()
    }

    /// Options in effect for an element: its layer's last options, else the
    /// configuration for its kind
    fn hover_options(&self, kind: HoverKind, parent: Option<ElementId>) -> Options {
        let from_layer = match kind {
            HoverKind::Region => None,
            _ => self
                .registry
                .layers()
                .find(|(_, state)| Some(state.layer) == parent)
                .map(|(_, state)| state.options.clone()),
        };
        from_layer
            .or_else(|| self.options.group(kind.config()).cloned())
            .unwrap_or_default()
    }

    /// Start hovering `id` with the pointer at `pointer`. Returns the popup
    /// to show, if any. Elements that do not react to hover are ignored.
    pub fn hover_start(&mut self, id: ElementId, pointer: [f64; 2]) -> Result<Option<Popup>, MapError> {
        if self.hover.active.is_some_and(|active| active != id) {
            self.hover_end();
        }
        let element = self
            .scene
            .get(id)
            .ok_or(MapError::Render(RenderError::UnknownElement(id)))?;
        let Some(kind) = HoverKind::of(element.classes()) else {
            return Ok(None);
        };
        let bound = element.datum().cloned();
        let options = self.hover_options(kind, element.parent());

        let empty = Datum::new();
        let geography = bound.as_ref().and_then(Bound::geography);
        let datum: &Datum = match (&bound, geography) {
            (_, Some(geography)) => self
                .options
                .group("data")
                .and_then(|d| d.group(&geography.id))
                .unwrap_or(&empty),
            (Some(Bound::Record(record)), _) => record.as_ref(),
            _ => &empty,
        };

        let mut highlight = Vec::new();
        if options.bool("highlight_on_hover").unwrap_or(false) {
            for (option, style) in HIGHLIGHTS {
                if let Some(value) = resolve_for_point(datum.get(option), options.get(option), datum) {
                    highlight.push((*style, value));
                }
            }
        }

        let popup = if options.bool("popup_on_hover").unwrap_or(false) {
            let template = options.get("popup_template");
            let html = match geography {
                Some(geography) => resolve_for_region(None, template, geography, datum),
                None => resolve_for_point(datum.get("popup_template"), template, datum),
            };
            Some(Popup {
                element: id,
                html: html.as_ref().map(value_to_string).unwrap_or_default(),
                position: [pointer[0], pointer[1] + POPUP_OFFSET],
            })
        } else {
            None
        };

        if self.hover.active != Some(id) && !highlight.is_empty() {
            let element = self.scene.element_mut(id)?;
            self.hover.saved = highlight
                .iter()
                .map(|(style, _)| (*style, element.style(style).cloned().unwrap_or(Value::Null)))
                .collect();
            for (style, value) in highlight {
                element.set_style(style, value);
            }
            if kind == HoverKind::Region {
                self.scene.bring_to_front(id)?;
            }
        }

        debug!("Hovering {:?} {:?}", kind, id);
        self.hover.active = Some(id);
        self.hover.popup = popup.clone();
        Ok(popup)
    }

    /// Stop hovering: restore the saved styles and hide the popup
    pub fn hover_end(&mut self) {
        if let Some(id) = self.hover.active.take() {
            let saved = std::mem::take(&mut self.hover.saved);
            if let Some(element) = self.scene.get_mut(id) {
                for (style, value) in saved {
                    element.set_style(style, value);
                }
            }
        }
        self.hover.saved.clear();
        self.hover.popup = None;
    }

    /// Track the pointer: hover whatever interactive element is under it
    pub fn pointer_moved(&mut self, position: [f64; 2]) -> Result<Option<Popup>, MapError> {
        let hit = self
            .scene
            .hit_test(position)
            .filter(|id| self.scene.get(*id).is_some_and(|e| HoverKind::of(e.classes()).is_some()));
        match hit {
            Some(id) if self.hover.active == Some(id) => {
                if let Some(popup) = self.hover.popup.as_mut() {
                    popup.position = [position[0], position[1] + POPUP_OFFSET];
                }
                Ok(self.hover.popup.clone())
            }
            Some(id) => self.hover_start(id, position),
            None => {
                self.hover_end();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::world_map;
    use crate::registry::{LayerCall, PluginData};
    use serde_json::json;

    fn region(map: &Datamap, id: &str) -> ElementId {
        let layer = map.subunits_layer().unwrap();
        map.scene().find_first(layer, id).unwrap()
    }

    #[test]
    fn test_region_highlight_and_restore() {
        let mut map = world_map();
        let usa = region(&map, "USA");
        let popup = map.hover_start(usa, [10.0, 20.0]).unwrap().unwrap();
        assert_eq!(popup.html, "<div class=\"hoverinfo\"><strong>USA</strong></div>");
        assert_eq!(popup.position, [10.0, 50.0]);

        let element = map.scene().get(usa).unwrap();
        assert_eq!(element.style_str("fill").as_deref(), Some("#FC8D59"));
        assert_eq!(element.style_f64("stroke-width"), Some(2.0));
        let layer = map.subunits_layer().unwrap();
        assert_eq!(map.scene().children(layer).last(), Some(&usa));

        map.hover_end();
        let element = map.scene().get(usa).unwrap();
        assert_eq!(element.style_str("fill").as_deref(), Some("#111"));
        assert_eq!(element.style_f64("stroke-width"), Some(1.0));
        assert!(map.popup().is_none());
    }

    #[test]
    fn test_failing_template_gives_empty_popup() {
        let mut map = world_map();
        map.options_mut()
            .group_or_default("geography_config")
            .insert("popup_template", dm_core::Setting::func(|_| anyhow::bail!("broken")));
        let usa = region(&map, "USA");
        let popup = map.hover_start(usa, [0.0, 0.0]).unwrap().unwrap();
        assert_eq!(popup.html, "");
    }

    #[test]
    fn test_bubble_popup_uses_datum() {
        let mut map = world_map();
        let layer = map
            .bubbles(
                PluginData::from_json(json!([{"name": "Tokyo", "latitude": 35, "longitude": 139, "radius": 10}])),
                LayerCall::new().with_options(
                    Options::new()
                        .with("animate", false)
                        .with("highlight_fill_color", "#000"),
                ),
            )
            .unwrap();
        let bubble = map.scene().find_first(layer, BUBBLE_CLASS).unwrap();
        let popup = map.hover_start(bubble, [0.0, 0.0]).unwrap().unwrap();
        assert!(popup.html.contains("Tokyo"));
        assert_eq!(map.scene().get(bubble).unwrap().style_str("fill").as_deref(), Some("#000"));
        assert_eq!(map.scene().get(bubble).unwrap().style_f64("fill-opacity"), Some(0.85));

        map.hover_end();
        assert_eq!(map.scene().get(bubble).unwrap().style_f64("fill-opacity"), Some(0.75));
    }

    #[test]
    fn test_pointer_tracking() {
        let mut map = world_map();
        let usa = region(&map, "USA");
        let geometry = map.region("USA").unwrap().geometry.clone().unwrap();
        let center = map.projection().path.centroid(&geometry).unwrap();

        let popup = map.pointer_moved(center).unwrap();
        assert_eq!(popup.map(|p| p.element), Some(usa));
        assert_eq!(map.hovered(), Some(usa));

        let moved = map.pointer_moved([center[0] + 1.0, center[1]]).unwrap().unwrap();
        assert_eq!(moved.position, [center[0] + 1.0, center[1] + POPUP_OFFSET]);

        assert!(map.pointer_moved([-50.0, -50.0]).unwrap().is_none());
        assert_eq!(map.hovered(), None);
    }
}
