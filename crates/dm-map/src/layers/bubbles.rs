//! Bubble layer

use std::sync::Arc;

use dm_core::events::LayerDrawn;
use dm_core::fill::BUBBLE_FILL;
use dm_core::resolve::value_to_string;
use dm_core::{FillSource, Invocation, Options, Setting};
use dm_render::{Bound, ElementId, ElementKind, Transition};
use serde_json::Value;

use super::{apply_styles, data_info, point_f64, point_value, BUBBLES};
use crate::reconcile::{datum_key, reconcile};
use crate::registry::PluginData;
use crate::{Datamap, MapError};

pub const BUBBLE_CLASS: &str = "datamaps-bubble";

/// Duration of the radius transition
const RADIUS_DURATION: f64 = 400.0;

pub fn draw(map: &mut Datamap, layer: ElementId, data: &PluginData, options: &Options) -> Result<(), MapError> {
    let items = data.as_list(BUBBLES)?;
    let key = options.get("key");
    let keyed = items.iter().map(|d| (datum_key(d, key), d)).collect();
    let join = reconcile(&mut map.scene, layer, BUBBLE_CLASS, ElementKind::Circle, keyed)?;
    let (entered, updated, exited) = join.counts();
    let animate = options.bool("animate").unwrap_or(true);

    for (id, datum) in &join.enter {
        let [cx, cy] = map.locate(datum);
        let radius = point_f64(datum, options, "radius").unwrap_or(0.0);

        let entry = Setting::Group((*datum).clone());
        let fill = FillSource {
            entry: Some(&entry),
            palette: map.fills(),
            layer: Some(options),
            invocation: Invocation::Point(datum),
        }
        .resolve(BUBBLE_FILL);
        let filter = point_value(datum, options, "filter_key")
            .and_then(|k| map.options.group("filters")?.value(&value_to_string(&k)).cloned());

        let element = map.scene.element_mut(*id)?;
        element
            .set_attr("cx", cx)
            .set_attr("cy", cy)
            .set_attr("r", if animate { 0.0 } else { radius });
        if let Some(filter) = filter {
            element.set_attr("filter", filter);
        }
        apply_styles(
            &mut map.scene,
            *id,
            [
                ("stroke", point_value(datum, options, "border_color")),
                ("stroke-width", point_value(datum, options, "border_width")),
                ("stroke-opacity", point_value(datum, options, "border_opacity")),
                ("fill-opacity", point_value(datum, options, "fill_opacity")),
                ("fill", fill.map(Value::String)),
            ],
        )?;
    }

    for (id, datum) in join.enter.iter().chain(&join.update) {
        let radius = point_f64(datum, options, "radius").unwrap_or(0.0);
        map.scene.element_mut(*id)?.set_attr("data-info", data_info(datum)).bind(
            Some(datum_key(datum, key)),
            Some(Bound::Record(Arc::new((*datum).clone()))),
        );
        map.scene
            .transition(*id, Transition::new().duration(RADIUS_DURATION).attr("r", radius))?;
    }

    let exit_delay = options.f64("exit_delay").unwrap_or(0.0);
    for id in &join.exit {
        map.scene
            .transition(*id, Transition::new().delay(exit_delay).attr("r", 0.0).remove())?;
    }

    map.events.publish(LayerDrawn {
        layer: BUBBLES.to_string(),
        entered,
        updated,
        exited,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::world_map;
    use crate::registry::LayerCall;
    use serde_json::json;

    fn bubbles(value: Value) -> PluginData {
        PluginData::from_json(value)
    }

    #[test]
    fn test_bubbles_must_be_a_list() {
        let mut map = world_map();
        let result = map.bubbles(bubbles(json!({"latitude": 1})), LayerCall::new());
        assert!(matches!(result, Err(MapError::InvalidDataset { .. })));
    }

    #[test]
    fn test_enter_grows_from_zero() {
        let mut map = world_map();
        let layer = map
            .bubbles(
                bubbles(json!([{"latitude": 10, "longitude": 20, "radius": 8, "fill_key": "A"}])),
                LayerCall::new(),
            )
            .unwrap();
        let circle = map.scene().find_first(layer, BUBBLE_CLASS).unwrap();
        let element = map.scene().get(circle).unwrap();
        assert_eq!(element.attr_f64("r"), Some(0.0));
        assert_eq!(element.style_str("fill").as_deref(), Some("#111"));
        assert_eq!(element.style_f64("fill-opacity"), Some(0.75));

        map.scene_mut().settle();
        assert_eq!(map.scene().get(circle).unwrap().attr_f64("r"), Some(8.0));
    }

    #[test]
    fn test_no_animation_starts_at_radius() {
        let mut map = world_map();
        let layer = map
            .bubbles(
                bubbles(json!([{"latitude": 0, "longitude": 0, "radius": 5}])),
                LayerCall::new().with_options(Options::new().with("animate", false)),
            )
            .unwrap();
        let circle = map.scene().find_first(layer, BUBBLE_CLASS).unwrap();
        let element = map.scene().get(circle).unwrap();
        assert_eq!(element.attr_f64("r"), Some(5.0));
        assert_eq!(element.style_str("fill").as_deref(), Some("#fff"));
    }

    #[test]
    fn test_exit_shrinks_then_removes_after_delay() {
        let mut map = world_map();
        let data = json!([
            {"name": "a", "latitude": 0, "longitude": 0, "radius": 5},
            {"name": "b", "latitude": 5, "longitude": 5, "radius": 5}
        ]);
        let call = || LayerCall::new().with_options(Options::new().with("key", "name"));
        let layer = map.bubbles(bubbles(data), call()).unwrap();
        map.scene_mut().settle();

        map.bubbles(bubbles(json!([{"name": "b", "latitude": 5, "longitude": 5, "radius": 5}])), call())
            .unwrap();
        assert_eq!(map.scene().find_all(layer, BUBBLE_CLASS).len(), 2);

        map.scene_mut().advance(50.0);
        assert_eq!(map.scene().find_all(layer, BUBBLE_CLASS).len(), 2);
        map.scene_mut().settle();
        assert_eq!(map.scene().find_all(layer, BUBBLE_CLASS).len(), 1);
    }

    #[test]
    fn test_filter_key_sets_filter() {
        let mut map = world_map();
        map.options_mut()
            .group_or_default("filters")
            .insert("glow", "url(#glow)");
        let layer = map
            .bubbles(
                bubbles(json!([{"latitude": 0, "longitude": 0, "radius": 5, "filter_key": "glow"}])),
                LayerCall::new(),
            )
            .unwrap();
        let circle = map.scene().find_first(layer, BUBBLE_CLASS).unwrap();
        assert_eq!(map.scene().get(circle).unwrap().attr_str("filter"), Some("url(#glow)"));
    }
}
