//! Per-datum value resolution
//!
//! A visual attribute is looked up along a fallback chain: the datum's own
//! field first, then the layer option (which already carries the global
//! default after merging). Whichever setting is chosen may be a function of
//! the datum, in which case it is called with the invocation that matches
//! the call site: regions pass `(geography, data)`, points pass `(datum)`.

use serde_json::Value;

use crate::geography::Geography;
use crate::options::{Datum, Setting};

/// Arguments handed to a function-valued setting
#[derive(Debug, Clone, Copy)]
pub enum Invocation<'a> {
    /// A region of the base map together with its bound data record
    Region {
        geography: &'a Geography,
        data: &'a Datum,
    },

    /// A single point-like datum (bubble, arc, legend entry)
    Point(&'a Datum),
}

impl<'a> Invocation<'a> {
    /// The data record of this invocation
    pub fn datum(&self) -> &'a Datum {
        match self {
            Invocation::Region { data, .. } => data,
            Invocation::Point(datum) => datum,
        }
    }

    /// The region geography, when invoked for a region
    pub fn geography(&self) -> Option<&'a Geography> {
        match self {
            Invocation::Region { geography, .. } => Some(geography),
            Invocation::Point(_) => None,
        }
    }
}

/// Resolve an attribute of a region: `datum_value` if present, else
/// `fallback`; functions receive `(geography, data)`.
pub fn resolve_for_region(
    datum_value: Option<&Setting>,
    fallback: Option<&Setting>,
    geography: &Geography,
    data: &Datum,
) -> Option<Value> {
    resolve(datum_value, fallback, &Invocation::Region { geography, data })
}

/// Resolve an attribute of a point-like datum: `datum_value` if present,
/// else `fallback`; functions receive `(datum)`.
pub fn resolve_for_point(
    datum_value: Option<&Setting>,
    fallback: Option<&Setting>,
    datum: &Datum,
) -> Option<Value> {
    resolve(datum_value, fallback, &Invocation::Point(datum))
}

/// Shared resolution step. A `null` result, a failed function and an
/// absent chain all resolve to `None`.
pub fn resolve(
    datum_value: Option<&Setting>,
    fallback: Option<&Setting>,
    invocation: &Invocation<'_>,
) -> Option<Value> {
    let chosen = datum_value.or(fallback)?;
    let value = match chosen {
        Setting::Value(v) => v.clone(),
        Setting::Group(g) => g.to_json(),
        Setting::Func(f) => match f(invocation) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Setting function failed: {}", e);
                return None;
            }
        },
    };

    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Render a resolved value as a plain string, as attribute values are
/// written to the surface
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use serde_json::json;

    fn region() -> Geography {
        Geography::new("USA").with_property("name", json!("United States"))
    }

    #[test]
    fn test_datum_value_takes_precedence() {
        let datum = Options::new();
        let own = Setting::from(3);
        let fallback = Setting::from(7);

        assert_eq!(resolve_for_point(Some(&own), Some(&fallback), &datum), Some(json!(3)));
        assert_eq!(resolve_for_point(None, Some(&fallback), &datum), Some(json!(7)));
    }

    #[test]
    fn test_neither_defined_is_none() {
        let datum = Options::new();
        assert_eq!(resolve_for_point(None, None, &datum), None);
    }

    #[test]
    fn test_point_function_receives_datum() {
        let datum = Options::new().with("name", "Tokyo");
        let f = Setting::func(|inv| {
            assert!(inv.geography().is_none());
            Ok(json!(format!("city {}", inv.datum().str("name").unwrap_or(""))))
        });

        assert_eq!(resolve_for_point(None, Some(&f), &datum), Some(json!("city Tokyo")));
    }

    #[test]
    fn test_region_function_receives_geography_and_data() {
        let geography = region();
        let data = Options::new().with("fill_key", "A");
        let f = Setting::func(|inv| match inv {
            Invocation::Region { geography, data } => Ok(json!(format!(
                "{}:{}",
                geography.id,
                data.str("fill_key").unwrap_or("")
            ))),
            Invocation::Point(_) => Ok(Value::Null),
        });

        assert_eq!(
            resolve_for_region(Some(&f), None, &geography, &data),
            Some(json!("USA:A"))
        );
    }

    #[test]
    fn test_failing_function_resolves_to_none() {
        let datum = Options::new();
        let f = Setting::func(|_| anyhow::bail!("broken template"));

        assert_eq!(resolve_for_point(Some(&f), None, &datum), None);
    }
}
