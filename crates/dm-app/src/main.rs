//! Main application entry point
//!
//! `datamap <map.json> [--svg out.svg]` draws the map described by a map
//! file. With `--svg` the settled scene is written out; otherwise it opens
//! in a window with hover highlighting and popups.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dm_core::Options;
use dm_data::{FileFetcher, MapFile, TopologyCache};
use dm_map::{ChoroplethOptions, Datamap, LayerCall, PluginData};

mod viewer;

use viewer::MapViewer;

/// Topologies kept in memory at once
const CACHE_ENTRIES: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "datamap")]
#[command(about = "Draw a choropleth map described by a map file", long_about = None)]
struct Args {
    /// Map description (JSON) naming the geometry, options and layers
    map: PathBuf,

    /// Write the settled map as SVG to this path instead of opening a window
    #[arg(long, value_name = "FILE")]
    svg: Option<PathBuf>,
}

/// Build the map and draw every layer the file asks for
fn build_map(file: &MapFile, base: &Path, runtime: &tokio::runtime::Runtime) -> Result<Datamap> {
    let cache = TopologyCache::new(CACHE_ENTRIES);
    let source = cache
        .get_or_load(&file.geometry)
        .with_context(|| format!("Failed to load geometry {}", file.geometry_name()))?;
    let fetcher = FileFetcher::with_root(base);

    let builder = Datamap::builder()
        .options(Options::from_json(file.options.clone()))
        .geometry(source)
        .on_done(|map| info!("Map ready: {} regions", map.regions().len()));
    let mut map = runtime.block_on(builder.build_with_fetcher(&fetcher))?;

    if let Some(choropleth) = &file.choropleth {
        map.update_choropleth(Options::from_json(choropleth.clone()), ChoroplethOptions::default())?;
    }
    let layers = &file.layers;
    if layers.graticule {
        map.graticule(PluginData::None, LayerCall::new())?;
    }
    if let Some(arcs) = &layers.arcs {
        map.arc(PluginData::from_json(arcs.clone()), LayerCall::new())?;
    }
    if let Some(bubbles) = &layers.bubbles {
        map.bubbles(PluginData::from_json(bubbles.clone()), LayerCall::new())?;
    }
    if let Some(labels) = &layers.labels {
        map.labels(PluginData::from_json(labels.clone()), LayerCall::new())?;
    }
    if let Some(legend) = &layers.legend {
        map.legend(PluginData::from_json(legend.clone()), LayerCall::new())?;
    }
    Ok(map)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let file = MapFile::load(&args.map).with_context(|| format!("Failed to read {:?}", args.map))?;
    let base = args
        .map
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let runtime = tokio::runtime::Runtime::new()?;
    let mut map = build_map(&file, &base, &runtime)?;

    if let Some(out) = args.svg {
        map.scene_mut().settle();
        std::fs::write(&out, map.to_svg()).with_context(|| format!("Failed to write {:?}", out))?;
        info!("Wrote {:?}", out);
        return Ok(());
    }

    let [width, height] = map.scene().size();
    if map.regions().is_empty() {
        warn!("No regions drawn for scope '{}'", map.scope());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width as f32 + 32.0, height as f32 + 32.0])
            .with_min_inner_size([320.0, 240.0]),
        default_theme: eframe::Theme::Light,
        persist_window: false,
        ..Default::default()
    };

    let title = format!("Datamap - {}", file.geometry_name());
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Box::new(MapViewer::new(cc, map))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run viewer: {}", e))?;

    Ok(())
}
