//! Fill colour precedence
//!
//! Each place that colours an element walks an explicit, ordered list of
//! [`FillRule`]s and takes the first rule that yields a value.

use serde_json::Value;

use crate::options::{Options, Setting};
use crate::resolve::{resolve, value_to_string, Invocation};

/// One step of a fill precedence chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// The data entry itself is a colour string
    Literal,

    /// The entry's `color` field
    ColorField,

    /// The entry's `fill_color` field (may be a function)
    FillColorField,

    /// The entry's `fill_key`, else the layer's `fill_key`, looked up in
    /// the fills palette
    FillKey,

    /// The palette's `default_fill`
    DefaultFill,
}

/// Precedence used when a region is first drawn
pub const SUBUNIT_FILL: &[FillRule] = &[
    FillRule::FillKey,
    FillRule::FillColorField,
    FillRule::DefaultFill,
];

/// Precedence used by incremental choropleth updates
pub const CHOROPLETH_UPDATE: &[FillRule] = &[
    FillRule::Literal,
    FillRule::ColorField,
    FillRule::FillColorField,
    FillRule::FillKey,
];

/// Precedence used for bubbles
pub const BUBBLE_FILL: &[FillRule] = &[FillRule::FillKey, FillRule::DefaultFill];

/// Everything a fill rule may consult
#[derive(Debug, Clone, Copy)]
pub struct FillSource<'a> {
    /// The raw data entry: a colour string or a record
    pub entry: Option<&'a Setting>,

    /// The fills palette
    pub palette: &'a Options,

    /// Layer options consulted for a fallback `fill_key`
    pub layer: Option<&'a Options>,

    /// Arguments for function-valued fields
    pub invocation: Invocation<'a>,
}

impl<'a> FillSource<'a> {
    fn record(&self) -> Option<&'a Options> {
        self.entry.and_then(Setting::as_group)
    }

    fn apply(&self, rule: FillRule) -> Option<Value> {
        match rule {
            FillRule::Literal => self
                .entry
                .and_then(Setting::as_str)
                .map(|s| Value::String(s.to_string())),
            FillRule::ColorField => self
                .record()
                .and_then(|r| r.str("color"))
                .map(|s| Value::String(s.to_string())),
            FillRule::FillColorField => {
                let record = self.record()?;
                resolve(record.get("fill_color"), None, &self.invocation)
            }
            FillRule::FillKey => {
                let own = self.record().and_then(|r| r.get("fill_key"));
                let layer = self.layer.and_then(|l| l.get("fill_key"));
                let key = resolve(own, layer, &self.invocation)?;
                let key = value_to_string(&key);
                resolve(self.palette.get(&key), None, &self.invocation)
            }
            FillRule::DefaultFill => {
                resolve(self.palette.get("default_fill"), None, &self.invocation)
            }
        }
    }

    /// Walk `rules` in order and return the first colour produced
    pub fn resolve(&self, rules: &[FillRule]) -> Option<String> {
        rules
            .iter()
            .find_map(|rule| self.apply(*rule))
            .map(|v| value_to_string(&v))
    }
}
