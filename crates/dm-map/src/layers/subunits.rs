//! Region layer
//!
//! One path per feature of the scope, keyed by region id. Fills follow the
//! region's data record: its `fill_key` into the palette, then its
//! `fill_color`, then the palette's default fill.

use std::sync::Arc;

use dm_core::fill::SUBUNIT_FILL;
use dm_core::{iso3166, FillSource, Geography, Invocation, Options};
use dm_render::{Bound, ElementKind, Shape};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::{apply_styles, data_info, point_value};
use crate::reconcile::{reconcile, Join};
use crate::{Datamap, MapError};

pub const SUBUNITS_CLASS: &str = "datamaps-subunits";
pub const SUBUNIT_CLASS: &str = "datamaps-subunit";

const ANTARCTICA: &str = "ATA";
const HAWAII_AND_ALASKA: &[&str] = &["HI", "AK"];

/// Replace each feature's id with the ISO-3166 alpha-3 form of the value at
/// `path`. Features whose value is missing or unknown keep their id.
pub fn remap_ids(features: &mut [Geography], path: &str) {
    for feature in features {
        if let Some(code) = feature.lookup_path(path).and_then(|raw| iso3166(&raw).ok()) {
            feature.id = code;
        }
    }
}

/// Drop features excluded by the geography configuration
pub fn filter_features(features: Vec<Geography>, geography_config: &Options) -> Vec<Geography> {
    let hide_antarctica = geography_config.bool("hide_antarctica").unwrap_or(true);
    let hide_hawaii_and_alaska = geography_config.bool("hide_hawaii_and_alaska").unwrap_or(false);
    features
        .into_iter()
        .filter(|f| !(hide_antarctica && f.id == ANTARCTICA))
        .filter(|f| !(hide_hawaii_and_alaska && HAWAII_AND_ALASKA.contains(&f.id.as_str())))
        .collect()
}

/// Draw `features` into the subunits group, creating the group beneath
/// every other layer on first use. Returns the number of regions drawn.
pub(crate) fn draw(map: &mut Datamap, features: Vec<Geography>) -> Result<usize, MapError> {
    let layer = match map.subunits_layer() {
        Some(layer) => layer,
        None => map.add_layer(SUBUNITS_CLASS, true)?,
    };

    let items: Vec<(String, Arc<Geography>)> = features
        .into_iter()
        .map(|f| (f.id.clone(), Arc::new(f)))
        .collect();
    let join = reconcile(&mut map.scene, layer, SUBUNIT_CLASS, ElementKind::Path, items)?;
    let Join { enter, update, exit } = join;
    let (entered, updated, exited) = (enter.len(), update.len(), exit.len());

    for id in exit {
        map.scene.remove(id);
    }

    let empty = Options::new();
    let mut regions = IndexMap::with_capacity(entered + updated);
    for (id, geography) in enter.into_iter().chain(update) {
        let shape = geography
            .geometry
            .as_ref()
            .map(|g| map.projection.path.path(g))
            .unwrap_or_else(Shape::new);

        let data = map.options.group("data");
        let entry = data.and_then(|d| d.get(&geography.id));
        let record = entry.and_then(|e| e.as_group()).unwrap_or(&empty);
        let geography_config = map.options.group("geography_config").unwrap_or(&empty);

        let fill = FillSource {
            entry,
            palette: map.fills(),
            layer: None,
            invocation: Invocation::Region {
                geography: &geography,
                data: record,
            },
        }
        .resolve(SUBUNIT_FILL);
        let styles = [
            ("fill", fill.map(Value::String)),
            ("stroke-width", point_value(record, geography_config, "border_width")),
            ("stroke-opacity", point_value(record, geography_config, "border_opacity")),
            ("stroke", point_value(record, geography_config, "border_color")),
        ];
        let info = entry.map(|_| data_info(record));

        let element = map.scene.element_mut(id)?;
        element
            .add_class(&geography.id)
            .set_shape(shape)
            .bind(Some(geography.id.clone()), Some(Bound::Geography(geography.clone())));
        if let Some(info) = info {
            element.set_attr("data-info", info);
        }
        apply_styles(&mut map.scene, id, styles)?;
        regions.insert(geography.id.clone(), geography);
    }

    debug!(
        "Subunits drawn: {} enter, {} update, {} exit",
        entered, updated, exited
    );
    map.regions = regions;
    Ok(entered + updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters() {
        let features = vec![Geography::new("ATA"), Geography::new("HI"), Geography::new("CA")];
        let defaults = Options::new().with("hide_antarctica", true);
        let ids: Vec<String> = filter_features(features.clone(), &defaults)
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["HI", "CA"]);

        let hide_all = Options::new()
            .with("hide_antarctica", true)
            .with("hide_hawaii_and_alaska", true);
        assert_eq!(filter_features(features.clone(), &hide_all).len(), 1);

        let show_all = Options::new().with("hide_antarctica", false);
        assert_eq!(filter_features(features, &show_all).len(), 3);
    }

    #[test]
    fn test_remap_ids_keeps_unknown() {
        let mut features = vec![
            Geography::new("1").with_property("alpha2", json!("FR")),
            Geography::new("2").with_property("alpha2", json!("ZZ")),
            Geography::new("3"),
        ];
        remap_ids(&mut features, "properties.alpha2");
        let ids: Vec<&str> = features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["FRA", "2", "3"]);
    }
}
