//! The map engine
//!
//! A [`Datamap`] owns a retained [`Scene`](dm_render::Scene) and draws a
//! scope's regions into it, then layers bubbles, arcs, labels, a legend and
//! a graticule on top through a registry of named layer plugins. Every layer
//! that binds keyed data goes through the same enter/update/exit
//! reconciliation, and per-datum visual values are resolved from the
//! datum first and the layer configuration second.

pub mod choropleth;
pub mod datamap;
pub mod defaults;
pub mod hover;
pub mod layers;
pub mod location;
pub mod projection;
pub mod reconcile;
pub mod registry;

use thiserror::Error;

use dm_core::LookupError;
use dm_data::DataError;
use dm_render::RenderError;

// Re-exports
pub use choropleth::ChoroplethOptions;
pub use datamap::{Datamap, DatamapBuilder};
pub use hover::{HoverKind, Popup};
pub use layers::legend::{LegendEntry, LegendModel};
pub use location::LocationResolver;
pub use projection::{ProjectionManager, ProjectionSetup, ProjectionState};
pub use reconcile::{diff_keys, reconcile, Join, KeyDiff};
pub use registry::{LayerCall, LayerPlugin, LayerState, PluginData};

/// Errors raised by the map engine
#[derive(Error, Debug)]
pub enum MapError {
    /// The caller handed a layer data it cannot reconcile
    #[error("Invalid {layer} data: {reason}")]
    InvalidDataset { layer: String, reason: String },

    /// Something the engine cannot work without is missing
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    #[error("No layer plugin named '{0}'")]
    UnknownPlugin(String),

    #[error("Unresolvable location: {0}")]
    UnresolvedLocation(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl MapError {
    pub(crate) fn invalid(layer: &str, reason: impl Into<String>) -> Self {
        MapError::InvalidDataset {
            layer: layer.to_string(),
            reason: reason.into(),
        }
    }
}
