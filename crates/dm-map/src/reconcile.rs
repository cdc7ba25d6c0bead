//! Keyed enter/update/exit reconciliation
//!
//! A layer's elements carry the key of the datum they were drawn for. A new
//! dataset is partitioned against those keys: unseen keys enter, shared keys
//! update and keys that disappeared exit. Membership is settled for the
//! whole dataset before any element is styled.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use dm_core::{resolve_for_point, Datum};
use dm_render::{ElementId, ElementKind, Scene};

use crate::MapError;

/// Key partition of a dataset against the currently bound keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub enter: Vec<String>,
    pub update: Vec<String>,
    pub exit: Vec<String>,
}

/// Partition `next` against `current`, keeping the order of each input
pub fn diff_keys<'a, C, N>(current: C, next: N) -> KeyDiff
where
    C: IntoIterator<Item = &'a str>,
    N: IntoIterator<Item = &'a str>,
{
    let current: IndexSet<&str> = current.into_iter().collect();
    let next: IndexSet<&str> = next.into_iter().collect();

    let mut diff = KeyDiff::default();
    for key in &next {
        if current.contains(key) {
            diff.update.push(key.to_string());
        } else {
            diff.enter.push(key.to_string());
        }
    }
    diff.exit = current
        .iter()
        .filter(|key| !next.contains(*key))
        .map(|key| key.to_string())
        .collect();
    diff
}

/// Elements of one reconciliation pass, paired with their new items
#[derive(Debug)]
pub struct Join<T> {
    /// Freshly created elements, still unstyled
    pub enter: Vec<(ElementId, T)>,
    pub update: Vec<(ElementId, T)>,
    /// Elements whose key disappeared. They are unkeyed already, so a later
    /// pass never matches them while they transition out.
    pub exit: Vec<ElementId>,
}

impl<T> Join<T> {
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.enter.len(), self.update.len(), self.exit.len())
    }
}

/// Reconcile keyed `items` against the children of `layer` carrying `class`.
///
/// Entering elements are appended to `layer` as `kind` with `class` and
/// their key bound. Items sharing a key collapse to the last one.
pub fn reconcile<T>(
    scene: &mut Scene,
    layer: ElementId,
    class: &str,
    kind: ElementKind,
    items: Vec<(String, T)>,
) -> Result<Join<T>, MapError> {
    let bound: IndexMap<String, ElementId> = scene
        .children(layer)
        .iter()
        .filter_map(|id| {
            let element = scene.get(*id)?;
            if !element.has_class(class) {
                return None;
            }
            Some((element.key()?.to_string(), *id))
        })
        .collect();

    let mut next: IndexMap<String, T> = IndexMap::with_capacity(items.len());
    for (key, item) in items {
        next.insert(key, item);
    }

    let diff = diff_keys(bound.keys().map(String::as_str), next.keys().map(String::as_str));
    debug!(
        "Reconciling '{}': {} enter, {} update, {} exit",
        class,
        diff.enter.len(),
        diff.update.len(),
        diff.exit.len()
    );

    let mut join = Join {
        enter: Vec::with_capacity(diff.enter.len()),
        update: Vec::with_capacity(diff.update.len()),
        exit: Vec::with_capacity(diff.exit.len()),
    };

    for key in &diff.exit {
        if let Some(id) = bound.get(key) {
            let datum = scene.get(*id).and_then(|e| e.datum().cloned());
            scene.bind(*id, None, datum)?;
            join.exit.push(*id);
        }
    }

    for (key, item) in next {
        match bound.get(&key) {
            Some(id) => join.update.push((*id, item)),
            None => {
                let id = scene.append(layer, kind)?;
                scene.element_mut(id)?.add_class(class).bind(Some(key), None);
                join.enter.push((id, item));
            }
        }
    }

    Ok(join)
}

/// Key of a datum under a layer's `key` option.
///
/// A function is resolved against the datum, a string names a field of the
/// datum, and without either the datum's JSON form is the key.
pub fn datum_key(datum: &Datum, key: Option<&dm_core::Setting>) -> String {
    let resolved = match key {
        Some(setting) if setting.is_func() => resolve_for_point(Some(setting), None, datum),
        Some(setting) => setting
            .as_str()
            .and_then(|field| resolve_for_point(datum.get(field), None, datum)),
        None => None,
    };
    match resolved {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => datum.to_json().to_string(),
    }
}
