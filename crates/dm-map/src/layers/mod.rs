//! Built-in layers
//!
//! Subunits are drawn by the map itself; the rest are ordinary plugins
//! registered on every new map under the names below.

pub mod arcs;
pub mod bubbles;
pub mod graticule;
pub mod labels;
pub mod legend;
pub mod subunits;

use std::sync::Arc;

use dm_core::{resolve_for_point, Datum, Options};
use dm_render::{ElementId, Scene};
use serde_json::Value;

use crate::registry::LayerRegistry;
use crate::MapError;

pub const BUBBLES: &str = "bubbles";
pub const ARC: &str = "arc";
pub const LABELS: &str = "labels";
pub const LEGEND: &str = "legend";
pub const GRATICULE: &str = "graticule";

pub(crate) fn register_builtin(registry: &mut LayerRegistry) {
    registry.register(BUBBLES, Arc::new(bubbles::draw));
    registry.register(ARC, Arc::new(arcs::draw));
    registry.register(LABELS, Arc::new(labels::draw));
    registry.register(LEGEND, Arc::new(legend::draw));
    registry.register(GRATICULE, Arc::new(graticule::draw));
}

/// `key` resolved from the datum first and the layer options second
pub(crate) fn point_value(datum: &Datum, options: &Options, key: &str) -> Option<Value> {
    resolve_for_point(datum.get(key), options.get(key), datum)
}

pub(crate) fn point_f64(datum: &Datum, options: &Options, key: &str) -> Option<f64> {
    match point_value(datum, options, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Set resolved styles on `id`. Unresolved values are stored as null,
/// which clears the style.
pub(crate) fn apply_styles(
    scene: &mut Scene,
    id: ElementId,
    styles: impl IntoIterator<Item = (&'static str, Option<Value>)>,
) -> Result<(), MapError> {
    let element = scene.element_mut(id)?;
    for (name, value) in styles {
        element.set_style(name, value.unwrap_or(Value::Null));
    }
    Ok(())
}

/// JSON text stored in an element's `data-info` attribute
pub(crate) fn data_info(datum: &Datum) -> String {
    datum.to_json().to_string()
}
