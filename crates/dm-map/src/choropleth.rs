//! Incremental choropleth updates
//!
//! Restyles regions that are already drawn from a partial data update,
//! without a reconciliation pass. Records compose with what is stored for
//! a region: fields in the update win, fields it leaves out survive.

use dm_core::events::ChoroplethUpdated;
use dm_core::fill::CHOROPLETH_UPDATE;
use dm_core::{FillRule, FillSource, Invocation, Options, Setting};
use dm_render::{ElementId, Transition};
use tracing::{debug, warn};

use crate::layers::data_info;
use crate::layers::subunits::SUBUNIT_CLASS;
use crate::{Datamap, MapError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChoroplethOptions {
    /// Restore every region to the default fill and forget stored data first
    pub reset: bool,
}

impl ChoroplethOptions {
    pub fn reset() -> Self {
        Self { reset: true }
    }
}

impl Datamap {
    fn region_element(&self, layer: ElementId, id: &str) -> Option<ElementId> {
        self.scene
            .children(layer)
            .iter()
            .copied()
            .find(|e| self.scene.get(*e).and_then(|e| e.key()) == Some(id))
    }

    /// Apply `data`, keyed by region id. Each value is a colour or a record
    /// with `color`, `fill_color` or `fill_key`. Regions whose colour cannot
    /// be resolved keep their current fill.
    pub fn update_choropleth(&mut self, data: Options, opts: ChoroplethOptions) -> Result<(), MapError> {
        let Some(layer) = self.subunits_layer() else {
            warn!("Choropleth update before the regions were drawn");
            return Ok(());
        };

        if opts.reset {
            let empty = Options::new();
            let default_fill = FillSource {
                entry: None,
                palette: self.fills(),
                layer: None,
                invocation: Invocation::Point(&empty),
            }
            .resolve(&[FillRule::DefaultFill]);

            for id in self.scene.find_all(layer, SUBUNIT_CLASS) {
                self.scene.set_attr(id, "data-info", "{}")?;
                if let Some(fill) = &default_fill {
                    self.scene
                        .transition(id, Transition::new().style("fill", fill.as_str()))?;
                }
            }
            if let Some(stored) = self.options.group_mut("data") {
                stored.clear();
            }
        }

        let mut updated = Vec::new();
        for (key, entry) in data.iter() {
            let record = match entry {
                Setting::Group(update) => {
                    let stored = self.options.group_or_default("data");
                    let mut merged = update.clone();
                    if let Some(previous) = stored.group(key) {
                        merged.merge_defaults(&[previous]);
                    }
                    stored.insert(key, merged.clone());
                    Some(merged)
                }
                _ => None,
            };

            let Some(element) = self.region_element(layer, key) else {
                debug!("No drawn region '{}' to restyle", key);
                continue;
            };
            let empty = Options::new();
            let fill = self.regions.get(key).and_then(|geography| {
                FillSource {
                    entry: Some(entry),
                    palette: self.fills(),
                    layer: None,
                    invocation: Invocation::Region {
                        geography,
                        data: record.as_ref().unwrap_or(&empty),
                    },
                }
                .resolve(CHOROPLETH_UPDATE)
            });

            if let Some(record) = &record {
                self.scene.set_attr(element, "data-info", data_info(record))?;
            }
            if let Some(fill) = fill {
                self.scene
                    .transition(element, Transition::new().style("fill", fill))?;
            }
            updated.push(key.to_string());
        }

        debug!("Choropleth update touched {} regions", updated.len());
        self.events.publish(ChoroplethUpdated {
            regions: updated,
            reset: opts.reset,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::world_map;
    use serde_json::json;

    fn fill_of(map: &Datamap, id: &str) -> Option<String> {
        let layer = map.subunits_layer()?;
        let element = map.scene().find_first(layer, id)?;
        map.scene().get(element)?.style_str("fill")
    }

    fn stored(map: &Datamap, id: &str) -> serde_json::Value {
        map.options()
            .group("data")
            .and_then(|d| d.get(id))
            .and_then(Setting::to_json)
            .unwrap_or_default()
    }

    #[test]
    fn test_updates_compose() {
        let mut map = world_map();
        map.options_mut().insert("data", Options::new());
        map.update_choropleth(
            Options::from_json(json!({"FRA": {"fill_key": "A"}})),
            ChoroplethOptions::default(),
        )
        .unwrap();
        map.update_choropleth(
            Options::from_json(json!({"FRA": {"other": 1}})),
            ChoroplethOptions::default(),
        )
        .unwrap();
        assert_eq!(stored(&map, "FRA"), json!({"other": 1, "fill_key": "A"}));

        map.scene_mut().settle();
        assert_eq!(fill_of(&map, "FRA").as_deref(), Some("#111"));
    }

    #[test]
    fn test_new_fields_override_stored() {
        let mut map = world_map();
        map.update_choropleth(
            Options::from_json(json!({"USA": {"fill_key": "B"}})),
            ChoroplethOptions::default(),
        )
        .unwrap();
        assert_eq!(stored(&map, "USA"), json!({"fill_key": "B"}));
        map.scene_mut().settle();
        // B is not in the palette, so the fill is left alone
        assert_eq!(fill_of(&map, "USA").as_deref(), Some("#111"));
    }

    #[test]
    fn test_literal_and_color_field() {
        let mut map = world_map();
        map.update_choropleth(
            Options::from_json(json!({"JPN": "#123456", "FRA": {"color": "#654321"}})),
            ChoroplethOptions::default(),
        )
        .unwrap();
        map.scene_mut().settle();
        assert_eq!(fill_of(&map, "JPN").as_deref(), Some("#123456"));
        assert_eq!(fill_of(&map, "FRA").as_deref(), Some("#654321"));
        assert_eq!(stored(&map, "JPN"), serde_json::Value::Null);
    }

    #[test]
    fn test_reset_restores_default_fill() {
        let mut map = world_map();
        map.update_choropleth(Options::new(), ChoroplethOptions::reset()).unwrap();
        map.scene_mut().settle();
        for id in ["USA", "JPN", "FRA"] {
            assert_eq!(fill_of(&map, id).as_deref(), Some("#fff"));
        }
        assert!(map.options().group("data").unwrap().is_empty());
    }

    #[test]
    fn test_undrawn_regions_are_stored_not_drawn() {
        let mut map = world_map();
        map.update_choropleth(
            Options::from_json(json!({"BRA": {"fill_key": "A"}})),
            ChoroplethOptions::default(),
        )
        .unwrap();
        assert_eq!(stored(&map, "BRA"), json!({"fill_key": "A"}));
        assert_eq!(map.scene().pending_transitions(), 0);
    }
}
