//! Arc layer
//!
//! Arcs join an origin and a destination, each either a region code or a
//! latitude/longitude record. They are drawn as a smooth curve bowed by
//! `arc_sharpness`, or along the great circle when `great_arc` is set, and
//! revealed with a dash animation.

use std::sync::Arc;

use dm_core::events::LayerDrawn;
use dm_core::{Datum, Options, Setting};
use dm_render::{Bound, ElementId, ElementKind, Shape, Transition};
use serde_json::{json, Value};

use super::{apply_styles, data_info, point_f64, point_value, ARC};
use crate::reconcile::{datum_key, reconcile};
use crate::registry::PluginData;
use crate::{Datamap, MapError};

pub const ARC_CLASS: &str = "datamaps-arc";

/// Wait before the dash animation starts
const ANIMATION_DELAY: f64 = 100.0;

/// Move a legacy nested `options` record onto the arc itself. Fields the
/// arc already sets win.
pub fn flatten_legacy_options(arc: &Datum) -> Datum {
    let mut arc = arc.clone();
    if let Some(Setting::Group(legacy)) = arc.remove("options") {
        arc.merge_defaults(&[&legacy]);
    }
    arc
}

fn endpoint<'a>(arc: &'a Datum, name: &str) -> Result<&'a Setting, MapError> {
    arc.get(name)
        .ok_or_else(|| MapError::invalid(ARC, format!("arc without {}", name)))
}

/// Curve from `origin` to `destination` through a control point above
/// their midpoint
pub fn smooth_arc(origin: [f64; 2], destination: [f64; 2], sharpness: f64) -> Shape {
    let mid = [
        (origin[0] + destination[0]) / 2.0,
        (origin[1] + destination[1]) / 2.0,
    ];
    let control = [mid[0] + 50.0 * sharpness, mid[1] - 75.0 * sharpness];
    let mut shape = Shape::new();
    // A leading smooth segment reflects nothing, so its first control
    // point is the start itself.
    shape.move_to(origin).cubic_to(origin, control, destination);
    shape
}

fn arc_shape(map: &Datamap, arc: &Datum, options: &Options) -> Result<Shape, MapError> {
    let origin = endpoint(arc, "origin")?;
    let destination = endpoint(arc, "destination")?;

    let great = options.bool("great_arc").unwrap_or(false) || arc.bool("great_arc").unwrap_or(false);
    if great {
        let location = map.location();
        if let (Some(from), Some(to)) = (
            location.endpoint_lon_lat(origin, arc),
            location.endpoint_lon_lat(destination, arc),
        ) {
            return Ok(map.projection.path.great_arc(from, to));
        }
    }

    let from = map.locate_endpoint(origin, arc);
    let to = map.locate_endpoint(destination, arc);
    let sharpness = point_f64(arc, options, "arc_sharpness").unwrap_or(1.0);
    Ok(smooth_arc(from, to, sharpness))
}

pub fn draw(map: &mut Datamap, layer: ElementId, data: &PluginData, options: &Options) -> Result<(), MapError> {
    let arcs: Vec<Datum> = data.as_list(ARC)?.iter().map(flatten_legacy_options).collect();
    let key = options.get("key");
    let keyed = arcs.iter().map(|a| (datum_key(a, key), a)).collect();
    let join = reconcile(&mut map.scene, layer, ARC_CLASS, ElementKind::Path, keyed)?;
    let (entered, updated, exited) = join.counts();

    for (id, arc) in &join.enter {
        let shape = arc_shape(map, arc, options)?;
        let length = shape.length();
        let speed = point_f64(arc, options, "animation_speed").unwrap_or(0.0);

        map.scene
            .element_mut(*id)?
            .set_shape(shape)
            .set_attr("data-info", data_info(arc));
        apply_styles(
            &mut map.scene,
            *id,
            [
                ("stroke-linecap", Some(json!("round"))),
                ("stroke", point_value(arc, options, "stroke_color")),
                ("fill", Some(json!("none"))),
                ("stroke-width", point_value(arc, options, "stroke_width")),
                ("stroke-dasharray", Some(json!(format!("{} {}", length, length)))),
                ("stroke-dashoffset", Some(json!(length))),
            ],
        )?;
        map.scene.transition(
            *id,
            Transition::new()
                .delay(ANIMATION_DELAY)
                .duration(speed)
                .style("stroke-dashoffset", 0.0),
        )?;
    }

    for (id, arc) in join.enter.iter().chain(&join.update) {
        map.scene
            .element_mut(*id)?
            .bind(Some(datum_key(arc, key)), Some(Bound::Record(Arc::new((*arc).clone()))));
    }

    for id in &join.exit {
        map.scene
            .transition(*id, Transition::new().style("opacity", 0.0).remove())?;
    }

    map.events.publish(LayerDrawn {
        layer: ARC.to_string(),
        entered,
        updated,
        exited,
    });
    Ok(())
}

/// Arc data from `(origin, destination)` region code pairs
pub fn between_regions<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> PluginData {
    PluginData::List(
        pairs
            .into_iter()
            .map(|(o, d)| {
                Options::new()
                    .with("origin", Value::String(o.to_string()))
                    .with("destination", Value::String(d.to_string()))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::world_map;
    use crate::registry::LayerCall;
    use dm_render::{PathEl, Point};

    #[test]
    fn test_legacy_options_are_flattened() {
        let arc = Options::from_json(json!({
            "origin": "USA",
            "destination": "JPN",
            "stroke_width": 3,
            "options": {"stroke_width": 9, "stroke_color": "#000"}
        }));
        let flat = flatten_legacy_options(&arc);
        assert!(flat.get("options").is_none());
        assert_eq!(flat.f64("stroke_width"), Some(3.0));
        assert_eq!(flat.str("stroke_color"), Some("#000"));
    }

    #[test]
    fn test_smooth_arc_control_point() {
        let shape = smooth_arc([0.0, 100.0], [100.0, 100.0], 2.0);
        match shape.elements() {
            [PathEl::MoveTo(o), PathEl::CurveTo(c1, c2, d)] => {
                assert_eq!(*o, Point::new(0.0, 100.0));
                assert_eq!(*c1, Point::new(0.0, 100.0));
                assert_eq!(*c2, Point::new(150.0, -50.0));
                assert_eq!(*d, Point::new(100.0, 100.0));
            }
            other => panic!("unexpected elements {:?}", other),
        }
    }

    #[test]
    fn test_arcs_must_be_a_list() {
        let mut map = world_map();
        let result = map.arc(PluginData::from_json(json!("USA")), LayerCall::new());
        assert!(matches!(result, Err(MapError::InvalidDataset { .. })));
    }

    #[test]
    fn test_arc_styles_and_exit_fade() {
        let mut map = world_map();
        let layer = map
            .arc(between_regions([("USA", "JPN"), ("CAN", "NOR")]), LayerCall::new())
            .unwrap();
        let arcs = map.scene().find_all(layer, ARC_CLASS);
        assert_eq!(arcs.len(), 2);
        let element = map.scene().get(arcs[0]).unwrap();
        assert_eq!(element.style_str("stroke").as_deref(), Some("#DD1C77"));
        assert_eq!(element.style_str("fill").as_deref(), Some("none"));
        assert!(element.style_f64("stroke-dashoffset").unwrap() > 0.0);

        map.scene_mut().settle();
        assert_eq!(map.scene().get(arcs[0]).unwrap().style_f64("stroke-dashoffset"), Some(0.0));

        map.arc(between_regions([("USA", "JPN")]), LayerCall::new()).unwrap();
        assert_eq!(map.scene().find_all(layer, ARC_CLASS).len(), 2);
        map.scene_mut().settle();
        assert_eq!(map.scene().find_all(layer, ARC_CLASS), vec![arcs[0]]);
    }
}
