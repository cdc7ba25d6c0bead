//! Map instances
//!
//! A [`Datamap`] is built once from caller options merged over the built-in
//! defaults, draws its scope's regions immediately, and then accepts layer
//! invocations, choropleth updates, hover events and resizes for the rest
//! of its life. All mutation goes through `&mut self`; one caller drives an
//! instance at a time.

use std::sync::Arc;

use dm_core::events::{LocationUnresolved, MapDrawn, RemoteDataFailed};
use dm_core::{Datum, EventBus, Geography, Options, Setting};
use dm_data::{geometry_from_value, DataFetcher, DataFormat, GeometrySource};
use dm_render::{ElementId, ElementKind, ProjectionFactory, Scene, Shape, StandardProjections, SvgRenderer};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::choropleth::ChoroplethOptions;
use crate::defaults::merge_with_defaults;
use crate::hover::HoverState;
use crate::layers::subunits::{self, filter_features, remap_ids, SUBUNITS_CLASS};
use crate::layers::{register_builtin, ARC, BUBBLES, GRATICULE, LABELS, LEGEND};
use crate::location::{describe, LocationResolver};
use crate::projection::{ProjectionManager, ProjectionSetup, ProjectionState};
use crate::registry::{LayerCall, LayerRegistry, PluginData};
use crate::MapError;

/// Surface width used when the caller gives none
pub const DEFAULT_WIDTH: f64 = 800.0;

const SPHERE_CLASS: &str = "datamaps-sphere";
const SPHERE_ID: &str = "sphere";

static NO_OPTIONS: Lazy<Options> = Lazy::new(Options::new);

/// Hook run once the first draw has finished
pub type DoneHook = Box<dyn FnOnce(&mut Datamap) + Send>;

/// A map drawn into a retained scene
pub struct Datamap {
    pub(crate) options: Options,
    pub(crate) scene: Scene,
    pub(crate) projection: ProjectionState,
    pub(crate) registry: LayerRegistry,
    /// Regions drawn by the last draw, by id
    pub(crate) regions: IndexMap<String, Arc<Geography>>,
    pub(crate) events: EventBus,
    pub(crate) hover: HoverState,
    source: Arc<dyn GeometrySource>,
    projections: ProjectionManager,
    setup: Option<ProjectionSetup>,
    /// Size the map was built at; resizes scale relative to it
    original_size: [f64; 2],
}

impl std::fmt::Debug for Datamap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datamap")
            .field("scope", &self.scope())
            .field("size", &self.scene.size())
            .field("regions", &self.regions.len())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Datamap {
    pub fn builder() -> DatamapBuilder {
        DatamapBuilder::new()
    }

    pub fn scope(&self) -> &str {
        self.options.str("scope").unwrap_or("world")
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Options are read on every draw; changes apply from the next one
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn projection(&self) -> &ProjectionState {
        &self.projection
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn regions(&self) -> &IndexMap<String, Arc<Geography>> {
        &self.regions
    }

    pub fn region(&self, id: &str) -> Option<&Geography> {
        self.regions.get(id).map(|g| g.as_ref())
    }

    /// The fills palette
    pub fn fills(&self) -> &Options {
        self.options.group("fills").unwrap_or(&NO_OPTIONS)
    }

    pub fn location(&self) -> LocationResolver<'_> {
        LocationResolver::new(&self.projection, &self.regions)
    }

    /// Surface position of a bubble-like datum. Unresolvable locations are
    /// reported and placed at the origin.
    pub fn locate(&self, datum: &Datum) -> [f64; 2] {
        self.location()
            .to_xy(datum)
            .unwrap_or_else(|e| self.unresolved(e, describe(datum)))
    }

    /// Surface position of one end of an arc, degrading like [`Self::locate`]
    pub fn locate_endpoint(&self, endpoint: &Setting, datum: &Datum) -> [f64; 2] {
        self.location()
            .endpoint_xy(endpoint, datum)
            .unwrap_or_else(|e| {
                let descriptor = endpoint
                    .to_json()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| describe(datum));
                self.unresolved(e, descriptor)
            })
    }

    fn unresolved(&self, error: MapError, descriptor: String) -> [f64; 2] {
        warn!("{}; placing it at the origin", error);
        self.events.publish(LocationUnresolved { descriptor });
        [0.0, 0.0]
    }

    /// The group holding the region paths
    pub fn subunits_layer(&self) -> Option<ElementId> {
        let root = self.scene.root();
        self.scene
            .children(root)
            .iter()
            .copied()
            .find(|id| self.scene.get(*id).is_some_and(|e| e.has_class(SUBUNITS_CLASS)))
    }

    /// Add a top-level group with `class`, on top of the others or beneath
    /// them when `first` is set
    pub(crate) fn add_layer(&mut self, class: &str, first: bool) -> Result<ElementId, MapError> {
        let root = self.scene.root();
        let layer = if first {
            self.scene.insert_first(root, ElementKind::Group)?
        } else {
            self.scene.append(root, ElementKind::Group)?
        };
        self.scene.element_mut(layer)?.add_class(class);
        Ok(layer)
    }

    /// Re-derive the projection and redraw the regions. Returns the number
    /// of regions drawn.
    pub fn draw(&mut self) -> Result<usize, MapError> {
        let scope = self.scope().to_string();
        self.projection = make_projection(
            self.setup.as_ref(),
            &self.projections,
            &self.options,
            self.original_size,
        )?;

        let mut features = self.source.features(&scope)?;
        let geography_config = self.options.group("geography_config").unwrap_or(&NO_OPTIONS);
        if let Some(path) = geography_config.str("country_id") {
            remap_ids(&mut features, path);
        }
        let features = filter_features(features, geography_config);

        let count = subunits::draw(self, features)?;
        if let Some(sphere) = self.projection.sphere.clone() {
            self.draw_sphere(sphere)?;
        }

        info!("Drew {} regions for scope '{}'", count, scope);
        self.events.publish(MapDrawn {
            scope,
            region_count: count,
        });
        Ok(count)
    }

    /// Globe outline beneath the regions: one shape in defs, drawn once as
    /// a stroke and once as a fill
    fn draw_sphere(&mut self, sphere: Shape) -> Result<(), MapError> {
        let root = self.scene.root();
        if let Some(previous) = self.scene.find_first(root, SPHERE_CLASS) {
            self.scene.remove(previous);
        }

        let group = self.add_layer(SPHERE_CLASS, true)?;
        let defs = self.scene.append(group, ElementKind::Defs)?;
        let outline = self.scene.append(defs, ElementKind::Path)?;
        self.scene
            .element_mut(outline)?
            .set_attr("id", SPHERE_ID)
            .set_shape(sphere);

        let href = format!("#{}", SPHERE_ID);
        let stroke = self.scene.append(group, ElementKind::Use)?;
        self.scene
            .element_mut(stroke)?
            .add_class("stroke")
            .set_attr("href", href.as_str())
            .set_style("fill", "none")
            .set_style("stroke", "#000")
            .set_style("stroke-width", 2.0);
        let fill = self.scene.append(group, ElementKind::Use)?;
        self.scene
            .element_mut(fill)?
            .add_class("fill")
            .set_attr("href", href.as_str())
            .set_style("fill", "#fff");
        Ok(())
    }

    /// Scale the map to `new_width`, keeping its aspect ratio. Only
    /// responsive maps resize; others return `false`.
    pub fn resize(&mut self, new_width: f64) -> bool {
        if !self.options.bool("responsive").unwrap_or(false) || new_width <= 0.0 {
            return false;
        }
        let [width, height] = self.original_size;
        let scale = new_width / width;
        let root = self.scene.root();
        for id in self.scene.children(root).to_vec() {
            if let Some(element) = self.scene.get_mut(id) {
                element.set_attr("transform", format!("scale({})", scale));
            }
        }
        self.scene.set_size(new_width, height * scale);
        debug!("Resized to {:.0}px (scale {:.3})", new_width, scale);
        true
    }

    /// Fetch `data_url` in `data_type` format and apply it as a choropleth
    /// update. Returns `false` when no URL is configured.
    pub async fn load_remote_data(&mut self, fetcher: &dyn DataFetcher) -> Result<bool, MapError> {
        let Some(url) = self.options.str("data_url").map(str::to_string) else {
            return Ok(false);
        };
        let fetched = match DataFormat::from_name(self.options.str("data_type").unwrap_or("json")) {
            Ok(format) => fetcher.fetch(&url, format).await,
            Err(e) => Err(e),
        };

        match fetched {
            Ok(value) => {
                self.update_choropleth(Options::from_json(value), ChoroplethOptions::default())?;
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to load data from {}: {}", url, e);
                self.events.publish(RemoteDataFailed {
                    url,
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Paint the scene as an SVG document
    pub fn to_svg(&self) -> String {
        let mut renderer = SvgRenderer::new();
        self.scene.render(&mut renderer);
        renderer.finish()
    }

    pub fn bubbles(&mut self, data: impl Into<PluginData>, call: LayerCall) -> Result<ElementId, MapError> {
        self.invoke(BUBBLES, data.into(), call)
    }

    pub fn arc(&mut self, data: impl Into<PluginData>, call: LayerCall) -> Result<ElementId, MapError> {
        self.invoke(ARC, data.into(), call)
    }

    pub fn labels(&mut self, data: impl Into<PluginData>, call: LayerCall) -> Result<ElementId, MapError> {
        self.invoke(LABELS, data.into(), call)
    }

    pub fn legend(&mut self, data: impl Into<PluginData>, call: LayerCall) -> Result<ElementId, MapError> {
        self.invoke(LEGEND, data.into(), call)
    }

    pub fn graticule(&mut self, data: impl Into<PluginData>, call: LayerCall) -> Result<ElementId, MapError> {
        self.invoke(GRATICULE, data.into(), call)
    }
}

fn make_projection(
    setup: Option<&ProjectionSetup>,
    projections: &ProjectionManager,
    options: &Options,
    [width, height]: [f64; 2],
) -> Result<ProjectionState, MapError> {
    match setup {
        Some(setup) => setup(width, height, options),
        None => projections.setup(
            width,
            height,
            options.str("scope").unwrap_or("world"),
            options.str("projection").unwrap_or("equirectangular"),
            options.group("projection_config"),
        ),
    }
}

/// The source to draw `scope` from: the supplied one when it has the scope,
/// else a topology embedded as `geography_config.data_json`
fn geometry_for_scope(
    source: Option<Arc<dyn GeometrySource>>,
    options: &Options,
    scope: &str,
) -> Result<Arc<dyn GeometrySource>, MapError> {
    if let Some(source) = source.filter(|s| s.has_scope(scope)) {
        return Ok(source);
    }
    let embedded = options
        .group("geography_config")
        .and_then(|g| g.get("data_json"))
        .and_then(Setting::to_json);
    if let Some(json) = embedded {
        let source: Arc<dyn GeometrySource> = Arc::from(geometry_from_value(json, scope)?);
        if source.has_scope(scope) {
            debug!("Using embedded geometry for scope '{}'", scope);
            return Ok(source);
        }
    }
    Err(MapError::MissingCapability(format!("geometry for scope '{}'", scope)))
}

/// Builder for [`Datamap`]
#[derive(Default)]
pub struct DatamapBuilder {
    options: Options,
    width: Option<f64>,
    height: Option<f64>,
    source: Option<Arc<dyn GeometrySource>>,
    factory: Option<Arc<dyn ProjectionFactory>>,
    setup: Option<ProjectionSetup>,
    on_done: Option<DoneHook>,
    events: Option<EventBus>,
}

impl DatamapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the width; the height follows `aspect_ratio` unless set too
    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn geometry(mut self, source: Arc<dyn GeometrySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn projection_factory(mut self, factory: Arc<dyn ProjectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replace the built-in projection setup
    pub fn projection_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(f64, f64, &Options) -> Result<ProjectionState, MapError> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }

    pub fn on_done<F>(mut self, done: F) -> Self
    where
        F: FnOnce(&mut Datamap) + Send + 'static,
    {
        self.on_done = Some(Box::new(done));
        self
    }

    /// Publish to an existing bus instead of a new one
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Merge the options, draw the regions and run the done hook
    pub fn build(self) -> Result<Datamap, MapError> {
        let options = merge_with_defaults(self.options);
        let width = self.width.unwrap_or(DEFAULT_WIDTH);
        let height = self
            .height
            .unwrap_or_else(|| width * options.f64("aspect_ratio").unwrap_or(0.5625));
        let scope = options.str("scope").unwrap_or("world").to_string();

        let source = geometry_for_scope(self.source, &options, &scope)?;
        let projections = ProjectionManager::new(self.factory.unwrap_or_else(|| Arc::new(StandardProjections)));
        let projection = make_projection(self.setup.as_ref(), &projections, &options, [width, height])?;

        let mut registry = LayerRegistry::new();
        register_builtin(&mut registry);

        let mut map = Datamap {
            options,
            scene: Scene::new(width, height),
            projection,
            registry,
            regions: IndexMap::new(),
            events: self.events.unwrap_or_default(),
            hover: HoverState::default(),
            source,
            projections,
            setup: self.setup,
            original_size: [width, height],
        };
        map.draw()?;

        if let Some(done) = self.on_done {
            done(&mut map);
        }
        Ok(map)
    }

    /// Like [`Self::build`], fetching the geometry from
    /// `geography_config.data_url` first and the choropleth data from
    /// `data_url` after the first draw. Only a geometry failure fails the
    /// build; a choropleth data failure leaves the map drawn without it.
    pub async fn build_with_fetcher(mut self, fetcher: &dyn DataFetcher) -> Result<Datamap, MapError> {
        let url = self
            .options
            .group("geography_config")
            .and_then(|g| g.str("data_url"))
            .map(str::to_string);
        if let Some(url) = url {
            let scope = self.options.str("scope").unwrap_or("world").to_string();
            let value = fetcher.fetch(&url, DataFormat::Json).await?;
            self.source = Some(Arc::from(geometry_from_value(value, &scope)?));
        }

        let mut map = self.build()?;
        // A failed load is already logged and published; the drawn map is
        // kept so the caller can issue it again.
        if let Err(e) = map.load_remote_data(fetcher).await {
            debug!("Returning the map without remote data: {}", e);
        }
        Ok(map)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dm_core::handler_from_fn;
    use dm_data::StaticSource;
    use geo_types::{polygon, Geometry};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn square(id: &str, lon: f64, lat: f64, size: f64) -> Geography {
        let polygon = polygon![
            (x: lon, y: lat),
            (x: lon + size, y: lat),
            (x: lon + size, y: lat + size),
            (x: lon, y: lat + size),
            (x: lon, y: lat),
        ];
        Geography::new(id)
            .with_property("name", json!(id))
            .with_geometry(Geometry::Polygon(polygon))
    }

    pub(crate) fn world_source() -> StaticSource {
        StaticSource::new().with_scope(
            "world",
            vec![
                square("USA", -100.0, 30.0, 10.0),
                square("JPN", 135.0, 30.0, 5.0),
                square("FRA", 0.0, 44.0, 5.0),
                square("ATA", 0.0, -85.0, 10.0),
            ],
        )
    }

    pub(crate) fn world_options() -> Options {
        Options::from_json(json!({
            "scope": "world",
            "fills": {"A": "#111", "default_fill": "#fff"},
            "data": {"USA": {"fill_key": "A"}}
        }))
    }

    pub(crate) fn world_map() -> Datamap {
        Datamap::builder()
            .options(world_options())
            .geometry(Arc::new(world_source()))
            .build()
            .unwrap()
    }

    pub(crate) fn usa_map() -> Datamap {
        let source = StaticSource::new().with_scope(
            "usa",
            vec![square("TX", -100.0, 28.0, 5.0), square("VT", -73.0, 43.0, 1.5)],
        );
        Datamap::builder()
            .options(Options::new().with("scope", "usa"))
            .geometry(Arc::new(source))
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_size_follows_aspect_ratio() {
        let map = world_map();
        assert_eq!(map.scene().size(), [800.0, 450.0]);

        let map = Datamap::builder()
            .options(world_options())
            .geometry(Arc::new(world_source()))
            .width(400.0)
            .build()
            .unwrap();
        assert_eq!(map.scene().size(), [400.0, 225.0]);
    }

    #[test]
    fn test_antarctica_hidden_by_default() {
        let map = world_map();
        let ids: Vec<&str> = map.regions().keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["USA", "JPN", "FRA"]);
    }

    #[test]
    fn test_missing_scope_fails_construction() {
        let result = Datamap::builder()
            .options(Options::new().with("scope", "mars"))
            .geometry(Arc::new(world_source()))
            .build();
        assert!(matches!(result, Err(MapError::MissingCapability(_))));

        let result = Datamap::builder().build();
        assert!(matches!(result, Err(MapError::MissingCapability(_))));
    }

    #[test]
    fn test_embedded_geometry_fallback() {
        let options = Options::from_json(json!({
            "scope": "world",
            "geography_config": {
                "data_json": {
                    "type": "FeatureCollection",
                    "features": [{
                        "type": "Feature",
                        "id": "FRA",
                        "properties": {"name": "France"},
                        "geometry": {
                            "type": "Polygon",
                            "coordinates": [[[0, 44], [5, 44], [5, 49], [0, 49], [0, 44]]]
                        }
                    }]
                }
            }
        }));
        let map = Datamap::builder().options(options).build().unwrap();
        assert_eq!(map.region("FRA").map(|g| g.name()), Some("France"));
    }

    #[test]
    fn test_unknown_projection_fails_construction() {
        let result = Datamap::builder()
            .options(world_options().with("projection", "dymaxion"))
            .geometry(Arc::new(world_source()))
            .build();
        assert!(matches!(result, Err(MapError::Render(_))));
    }

    #[test]
    fn test_done_hook_runs_once_after_draw() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let map = Datamap::builder()
            .options(world_options())
            .geometry(Arc::new(world_source()))
            .on_done(move |map| {
                assert_eq!(map.regions().len(), 3);
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(map);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_country_id_remap() {
        let source = StaticSource::new().with_scope(
            "world",
            vec![square("1", 0.0, 0.0, 5.0).with_property("iso", json!("FR"))],
        );
        let map = Datamap::builder()
            .options(Options::from_json(json!({
                "geography_config": {"country_id": "properties.iso"}
            })))
            .geometry(Arc::new(source))
            .build()
            .unwrap();
        assert!(map.region("FRA").is_some());
    }

    #[test]
    fn test_custom_projection_setup() {
        let map = Datamap::builder()
            .options(world_options())
            .geometry(Arc::new(world_source()))
            .projection_setup(|width, height, _options| {
                let mut projection = StandardProjections.create("mercator")?;
                projection.set_scale(100.0);
                projection.set_translate([width / 2.0, height / 2.0]);
                Ok(ProjectionState::new(projection))
            })
            .build()
            .unwrap();
        assert_eq!(map.projection().projection.scale(), 100.0);
    }

    #[test]
    fn test_orthographic_sphere_beneath_regions() {
        let map = Datamap::builder()
            .options(world_options().with("projection", "orthographic"))
            .geometry(Arc::new(world_source()))
            .build()
            .unwrap();
        let root = map.scene().root();
        let children = map.scene().children(root);
        let sphere = map.scene().get(children[0]).unwrap();
        assert!(sphere.has_class(SPHERE_CLASS));
        assert!(map.scene().find_by_dom_id(SPHERE_ID).is_some());
        assert_eq!(map.scene().find_all(root, "stroke").len(), 1);
        assert_eq!(Some(children[1]), map.subunits_layer());
    }

    #[test]
    fn test_redraw_keeps_one_subunits_group() {
        let mut map = world_map();
        map.draw().unwrap();
        let root = map.scene().root();
        assert_eq!(map.scene().find_all(root, SUBUNITS_CLASS).len(), 1);
        assert_eq!(map.scene().find_all(root, "datamaps-subunit").len(), 3);
    }

    #[test]
    fn test_resize_only_when_responsive() {
        let mut map = world_map();
        assert!(!map.resize(400.0));
        assert_eq!(map.scene().size(), [800.0, 450.0]);

        map.options_mut().insert("responsive", true);
        assert!(map.resize(400.0));
        assert_eq!(map.scene().size(), [400.0, 225.0]);
        let layer = map.subunits_layer().unwrap();
        assert_eq!(map.scene().get(layer).unwrap().attr_str("transform"), Some("scale(0.5)"));

        // export uses the resized surface
        let svg = map.to_svg();
        assert!(svg.contains(r#"viewBox="0 0 400 225""#));
    }

    #[test]
    fn test_unresolved_location_degrades_to_origin() {
        let map = world_map();
        let misses = Arc::new(AtomicUsize::new(0));
        let sink = misses.clone();
        map.events().subscribe::<LocationUnresolved>(handler_from_fn(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        let datum = Options::from_json(json!({"centered": "ZZ"}));
        assert_eq!(map.locate(&datum), [0.0, 0.0]);
        assert_eq!(map.locate(&Options::new()), [0.0, 0.0]);
        assert_eq!(misses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_svg_export() {
        let map = world_map();
        let svg = map.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r##"fill="#111111""##));
    }

    #[tokio::test]
    async fn test_remote_data_without_url_is_noop() {
        let mut map = world_map();
        let fetcher = dm_data::FileFetcher::new();
        assert!(!map.load_remote_data(&fetcher).await.unwrap());
    }
}
