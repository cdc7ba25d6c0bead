//! Option trees shared by the map instance, every layer and every datum
//!
//! An [`Options`] value is an ordered mapping from option name to a
//! [`Setting`]: a plain JSON value, a nested group, or a function of the
//! datum being drawn. Configuration, per-layer options and data records all
//! use the same representation so that a datum field can override a layer
//! option with either a constant or a function.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::resolve::Invocation;

/// A value-producing function of the datum being drawn
pub type SettingFn = Arc<dyn Fn(&Invocation<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// A data record. Records share the option tree representation so that
/// fields may hold functions as well as plain values.
pub type Datum = Options;

/// One entry of an option tree
#[derive(Clone)]
pub enum Setting {
    /// A plain JSON value. `Null` counts as unset when merging.
    Value(Value),

    /// A function evaluated against the current datum
    Func(SettingFn),

    /// A nested option tree
    Group(Options),
}

impl Setting {
    /// Wrap a closure as a function-valued setting
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Setting::Func(Arc::new(f))
    }

    /// Convert a JSON value, turning every object into a nested group
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Setting::Group(Options::from_map(map)),
            other => Setting::Value(other),
        }
    }

    /// Whether this setting is the explicit `null` value
    pub fn is_unset(&self) -> bool {
        matches!(self, Setting::Value(Value::Null))
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Setting::Func(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Setting::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    pub fn as_group(&self) -> Option<&Options> {
        match self {
            Setting::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Options> {
        match self {
            Setting::Group(g) => Some(g),
            _ => None,
        }
    }

    /// JSON form of this setting. Functions have no JSON form.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Setting::Value(v) => Some(v.clone()),
            Setting::Group(g) => Some(g.to_json()),
            Setting::Func(_) => None,
        }
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Value(v) => write!(f, "{}", v),
            Setting::Func(_) => f.write_str("<fn>"),
            Setting::Group(g) => g.fmt(f),
        }
    }
}

impl From<Value> for Setting {
    fn from(value: Value) -> Self {
        Setting::Value(value)
    }
}

impl From<&str> for Setting {
    fn from(value: &str) -> Self {
        Setting::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Setting {
    fn from(value: String) -> Self {
        Setting::Value(Value::String(value))
    }
}

impl From<f64> for Setting {
    fn from(value: f64) -> Self {
        Setting::Value(Value::from(value))
    }
}

impl From<i64> for Setting {
    fn from(value: i64) -> Self {
        Setting::Value(Value::from(value))
    }
}

impl From<i32> for Setting {
    fn from(value: i32) -> Self {
        Setting::Value(Value::from(value))
    }
}

impl From<bool> for Setting {
    fn from(value: bool) -> Self {
        Setting::Value(Value::Bool(value))
    }
}

impl From<Options> for Setting {
    fn from(value: Options) -> Self {
        Setting::Group(value)
    }
}

/// Ordered option tree
#[derive(Clone, Default)]
pub struct Options {
    entries: IndexMap<String, Setting>,
}

impl Options {
    /// Create an empty option tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Setting>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Builder-style insert of a function-valued setting
    pub fn with_fn<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.with(key, Setting::func(f))
    }

    /// Build from a JSON value. Non-object values give an empty tree.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(k, v)| (k, Setting::from_json(v)))
                .collect(),
        }
    }

    /// JSON object form. Function-valued entries are skipped.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .filter_map(|(k, v)| v.to_json().map(|json| (k.clone(), json)))
            .collect();
        Value::Object(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Setting>) -> Option<Setting> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Setting> {
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Setting> {
        self.entries.get_mut(key)
    }

    /// Whether `key` holds a non-null setting
    pub fn is_set(&self, key: &str) -> bool {
        self.entries.get(key).map_or(false, |s| !s.is_unset())
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(Setting::as_value)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Setting::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Setting::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Setting::as_bool)
    }

    pub fn group(&self, key: &str) -> Option<&Options> {
        self.get(key).and_then(Setting::as_group)
    }

    pub fn group_mut(&mut self, key: &str) -> Option<&mut Options> {
        self.get_mut(key).and_then(Setting::as_group_mut)
    }

    /// Mutable access to the group at `key`, replacing any non-group value
    pub fn group_or_default(&mut self, key: &str) -> &mut Options {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Setting::Group(Options::new()));
        if !matches!(slot, Setting::Group(_)) {
            *slot = Setting::Group(Options::new());
        }
        match slot {
            Setting::Group(g) => g,
            _ => unreachable!("slot was just set to a group"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Setting)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fill in every key that is absent or null on `self` from `sources`.
    ///
    /// Sources are applied left to right and the first writer wins: a key
    /// already set, either originally or by an earlier source, is never
    /// overwritten. Function-valued settings are shared by reference, every
    /// other setting is copied, so later changes to a source never reach
    /// `self`. Applying the same sources twice changes nothing.
    pub fn merge_defaults(&mut self, sources: &[&Options]) -> &mut Self {
        for source in sources {
            for (key, value) in &source.entries {
                if !self.is_set(key) {
                    self.entries.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl FromIterator<(String, Setting)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, Setting)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
