//! Graticule layer
//!
//! A single path of meridians and parallels, kept beneath the regions.

use dm_core::Options;
use dm_render::{ElementId, ElementKind, Graticule};

use crate::registry::PluginData;
use crate::{Datamap, MapError};

pub const GRATICULE_CLASS: &str = "datamaps-graticule";

pub fn draw(map: &mut Datamap, layer: ElementId, _data: &PluginData, options: &Options) -> Result<(), MapError> {
    let defaults = Graticule::default();
    // Graticule raises spacings below its minimum
    let graticule = Graticule {
        step: options.f64("step").unwrap_or(defaults.step),
        precision: options.f64("precision").unwrap_or(defaults.precision),
        ..defaults
    };
    let shape = map.projection.path.path(&graticule.lines());

    map.scene.clear_children(layer);
    let path = map.scene.append(layer, ElementKind::Path)?;
    map.scene
        .element_mut(path)?
        .add_class(GRATICULE_CLASS)
        .set_shape(shape)
        .set_style("fill", "none")
        .set_style("stroke", options.str("stroke").unwrap_or("#777"))
        .set_style("stroke-width", options.f64("stroke_width").unwrap_or(0.5))
        .set_style("stroke-opacity", options.f64("stroke_opacity").unwrap_or(0.5))
        .set_style("pointer-events", "none");

    if let Some(subunits) = map.subunits_layer() {
        map.scene.move_before(layer, subunits)?;
    }
    Ok(())
}
