//! Built-in configuration
//!
//! [`DEFAULT_OPTIONS`] is never mutated. Each map merges the caller's
//! options over it once, at construction, with [`merge_with_defaults`].

use dm_core::{Invocation, Options};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Sub-configurations merged key by key rather than taken whole
pub const SUB_CONFIGS: &[&str] = &[
    "geography_config",
    "projection_config",
    "bubbles_config",
    "arc_config",
    "fills",
];

pub const DEFAULT_FILL: &str = "#ABDDA4";

pub static DEFAULT_OPTIONS: Lazy<Options> = Lazy::new(|| {
    Options::new()
        .with("scope", "world")
        .with("responsive", false)
        .with("aspect_ratio", 0.5625)
        .with("projection", "equirectangular")
        .with("data_type", "json")
        .with("data", Options::new())
        .with("fills", Options::new().with("default_fill", DEFAULT_FILL))
        .with("filters", Options::new())
        .with("geography_config", geography_config())
        .with(
            "projection_config",
            Options::new().with("rotation", json!([97, 0])),
        )
        .with("bubbles_config", bubbles_config())
        .with("arc_config", arc_config())
});

fn geography_config() -> Options {
    Options::new()
        .with("data_url", Value::Null)
        .with("country_id", Value::Null)
        .with("hide_antarctica", true)
        .with("hide_hawaii_and_alaska", false)
        .with("border_width", 1)
        .with("border_opacity", 1)
        .with("border_color", "#FDFDFD")
        .with_fn("popup_template", |inv| {
            let name = inv.geography().map(|g| g.name()).unwrap_or_default();
            Ok(json!(format!(
                "<div class=\"hoverinfo\"><strong>{}</strong></div>",
                name
            )))
        })
        .with("popup_on_hover", true)
        .with("highlight_on_hover", true)
        .with("highlight_fill_color", "#FC8D59")
        .with("highlight_border_color", "rgba(250, 15, 160, 0.2)")
        .with("highlight_border_width", 2)
        .with("highlight_border_opacity", 1)
}

fn bubbles_config() -> Options {
    Options::new()
        .with("border_width", 2)
        .with("border_opacity", 1)
        .with("border_color", "#FFFFFF")
        .with("popup_on_hover", true)
        .with("radius", Value::Null)
        .with_fn("popup_template", |inv| {
            let name = inv.datum().str("name").unwrap_or_default();
            Ok(json!(format!(
                "<div class=\"hoverinfo\"><strong>{}</strong></div>",
                name
            )))
        })
        .with("fill_opacity", 0.75)
        .with("animate", true)
        .with("highlight_on_hover", true)
        .with("highlight_fill_color", "#FC8D59")
        .with("highlight_border_color", "rgba(250, 15, 160, 0.2)")
        .with("highlight_border_width", 2)
        .with("highlight_border_opacity", 1)
        .with("highlight_fill_opacity", 0.85)
        .with("exit_delay", 100)
}

fn arc_config() -> Options {
    Options::new()
        .with("stroke_color", "#DD1C77")
        .with("stroke_width", 1)
        .with("arc_sharpness", 1)
        .with("animation_speed", 600)
        .with("popup_on_hover", false)
        .with_fn("popup_template", arc_popup)
}

fn arc_popup(inv: &Invocation<'_>) -> anyhow::Result<Value> {
    let datum = inv.datum();
    let (Some(origin), Some(destination)) = (datum.get("origin"), datum.get("destination")) else {
        return Ok(json!(""));
    };
    let has_coordinates = |endpoint: Option<&Options>| {
        endpoint.is_some_and(|e| e.is_set("latitude") && e.is_set("longitude"))
    };
    let html = if has_coordinates(origin.as_group()) && has_coordinates(destination.as_group()) {
        format!(
            "<div class=\"hoverinfo\"><strong>Arc</strong><br>Origin: {}<br>Destination: {}</div>",
            origin.to_json().unwrap_or_default(),
            destination.to_json().unwrap_or_default()
        )
    } else {
        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        format!(
            "<div class=\"hoverinfo\"><strong>Arc</strong><br>{} -> {}</div>",
            text(origin.to_json()),
            text(destination.to_json())
        )
    };
    Ok(json!(html))
}

/// Merge caller options over the built-in defaults.
///
/// Top-level keys are filled first, then each of [`SUB_CONFIGS`] is merged
/// key by key so a partial caller group keeps the remaining defaults.
pub fn merge_with_defaults(mut options: Options) -> Options {
    options.merge_defaults(&[&DEFAULT_OPTIONS]);
    for name in SUB_CONFIGS {
        if let Some(defaults) = DEFAULT_OPTIONS.group(name) {
            options.group_or_default(name).merge_defaults(&[defaults]);
        }
    }
    options
}
