//! Layer plugins
//!
//! Layer types are registered once by name. Invoking a name merges the
//! call's options over the map's `<name>_config`, picks the layer group
//! (reusing the one from the previous call unless a fresh one is asked for),
//! remembers both, and hands them to the plugin's draw function.

use std::sync::Arc;

use dm_core::{Datum, Options};
use dm_render::ElementId;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Datamap, MapError};

/// A named layer type
pub trait LayerPlugin: Send + Sync {
    fn draw(&self, map: &mut Datamap, layer: ElementId, data: &PluginData, options: &Options) -> Result<(), MapError>;
}

impl<F> LayerPlugin for F
where
    F: Fn(&mut Datamap, ElementId, &PluginData, &Options) -> Result<(), MapError> + Send + Sync,
{
    fn draw(&self, map: &mut Datamap, layer: ElementId, data: &PluginData, options: &Options) -> Result<(), MapError> {
        self(map, layer, data, options)
    }
}

/// Data handed to a layer plugin
#[derive(Debug, Clone, Default)]
pub enum PluginData {
    #[default]
    None,
    List(Vec<Datum>),
    Record(Options),
    Scalar(Value),
}

impl PluginData {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => PluginData::None,
            Value::Array(items) => PluginData::List(items.into_iter().map(Options::from_json).collect()),
            Value::Object(_) => PluginData::Record(Options::from_json(value)),
            other => PluginData::Scalar(other),
        }
    }

    /// The item list of a keyed layer; anything else is a caller error
    pub fn as_list(&self, layer: &str) -> Result<&[Datum], MapError> {
        match self {
            PluginData::List(items) => Ok(items),
            PluginData::None => Err(MapError::invalid(layer, "data is missing, expected a list")),
            PluginData::Record(_) => Err(MapError::invalid(layer, "got a record, expected a list")),
            PluginData::Scalar(v) => Err(MapError::invalid(layer, format!("got {}, expected a list", v))),
        }
    }

    pub fn as_record(&self) -> Option<&Options> {
        match self {
            PluginData::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<Vec<Datum>> for PluginData {
    fn from(items: Vec<Datum>) -> Self {
        PluginData::List(items)
    }
}

impl From<Options> for PluginData {
    fn from(record: Options) -> Self {
        PluginData::Record(record)
    }
}

/// Called with the layer group once a plugin has drawn
pub type LayerCallback = Box<dyn FnOnce(&mut Datamap, ElementId) + Send>;

/// Per-invocation arguments of a layer plugin
#[derive(Default)]
pub struct LayerCall {
    pub options: Option<Options>,
    pub callback: Option<LayerCallback>,
    pub force_new_layer: bool,
}

impl LayerCall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut Datamap, ElementId) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Draw into a new layer group instead of the previous one
    pub fn new_layer(mut self) -> Self {
        self.force_new_layer = true;
        self
    }
}

impl std::fmt::Debug for LayerCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCall")
            .field("options", &self.options)
            .field("callback", &self.callback.is_some())
            .field("force_new_layer", &self.force_new_layer)
            .finish()
    }
}

/// The group a layer draws into and the options it last drew with
#[derive(Debug, Clone)]
pub struct LayerState {
    pub layer: ElementId,
    pub options: Options,
}

/// Registered plugins and the layers they created
#[derive(Default, Clone)]
pub struct LayerRegistry {
    plugins: IndexMap<String, Arc<dyn LayerPlugin>>,
    layers: IndexMap<String, LayerState>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under `name`. The first registration of a name
    /// wins; later ones are ignored and return `false`.
    pub fn register(&mut self, name: &str, plugin: Arc<dyn LayerPlugin>) -> bool {
        if self.plugins.contains_key(name) {
            warn!("Layer plugin '{}' is already registered", name);
            return false;
        }
        self.plugins.insert(name.to_string(), plugin);
        true
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn LayerPlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn layer(&self, name: &str) -> Option<&LayerState> {
        self.layers.get(name)
    }

    /// Layers created so far, by plugin name
    pub fn layers(&self) -> impl Iterator<Item = (&str, &LayerState)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn set_layer(&mut self, name: &str, state: LayerState) {
        self.layers.insert(name.to_string(), state);
    }
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("layers", &self.layers)
            .finish()
    }
}

impl Datamap {
    /// Register a layer plugin. Returns `false` if `name` was taken.
    pub fn add_plugin<P>(&mut self, name: &str, plugin: P) -> bool
    where
        P: LayerPlugin + 'static,
    {
        self.registry.register(name, Arc::new(plugin))
    }

    /// Draw `data` with the plugin registered as `name`, returning the layer
    /// group it drew into
    pub fn invoke(&mut self, name: &str, data: PluginData, call: LayerCall) -> Result<ElementId, MapError> {
        let plugin = self
            .registry
            .plugin(name)
            .ok_or_else(|| MapError::UnknownPlugin(name.to_string()))?;

        let mut options = call.options.unwrap_or_default();
        if let Some(config) = self.options.group(&format!("{}_config", name)) {
            options.merge_defaults(&[config]);
        }

        let layer = match self.registry.layer(name) {
            Some(state) if !call.force_new_layer && self.scene.get(state.layer).is_some() => state.layer,
            _ => {
                let layer = self.add_layer(name, false)?;
                debug!("Created layer '{}'", name);
                layer
            }
        };
        self.registry.set_layer(
            name,
            LayerState {
                layer,
                options: options.clone(),
            },
        );

        plugin.draw(self, layer, &data, &options)?;
        if let Some(callback) = call.callback {
            callback(self, layer);
        }
        Ok(layer)
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plugin_data_from_json() {
        assert!(matches!(PluginData::from_json(Value::Null), PluginData::None));
        match PluginData::from_json(json!([{"a": 1}, {"b": 2}])) {
            PluginData::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].f64("b"), Some(2.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(PluginData::from_json(json!({"legend_title": "x"})).as_record().is_some());
    }

    #[test]
    fn test_non_list_is_invalid() {
        let data = PluginData::from_json(json!({"latitude": 1}));
        assert!(matches!(data.as_list("bubbles"), Err(MapError::InvalidDataset { .. })));
        assert!(PluginData::None.as_list("arc").is_err());
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = LayerRegistry::new();
        let first: Arc<dyn LayerPlugin> =
            Arc::new(|_: &mut Datamap, _: ElementId, _: &PluginData, _: &Options| Ok::<(), MapError>(()));
        let second = first.clone();
        assert!(registry.register("dots", first.clone()));
        assert!(!registry.register("dots", second));
        assert!(Arc::ptr_eq(&registry.plugin("dots").unwrap(), &first));
    }
}
