//! Core functionality for the map rendering engine
//!
//! This crate provides the option tree shared by every layer, the value
//! resolution rules applied per datum, the ISO-3166 code table and the
//! event bus used to report drawing progress.

pub mod events;
pub mod fill;
pub mod geography;
pub mod iso3166;
pub mod options;
pub mod resolve;

// Re-export commonly used types
pub use events::{handler_from_fn, Event, EventBus, EventHandler};
pub use fill::{FillRule, FillSource};
pub use geography::Geography;
pub use iso3166::{iso3166, Country, LookupError};
pub use options::{Datum, Options, Setting, SettingFn};
pub use resolve::{resolve_for_point, resolve_for_region, Invocation};
