//! Retained scene graph
//!
//! The engine draws into a [`Scene`]: a tree of elements carrying classes,
//! attributes, styles and an optional bound datum. Timed [`Transition`]s are
//! scheduled against the scene's logical clock and applied by
//! [`Scene::advance`], so animation is driven by whoever owns the scene (the
//! viewer's frame loop, or [`Scene::settle`] in headless use).

use std::sync::Arc;

use ahash::AHashMap;
use dm_core::{Datum, Geography};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use crate::color::Rgba;
use kurbo::{Affine, Circle, Line, ParamCurveNearest, Shape as _};

use crate::path::{to_point, to_xy, Shape};
use crate::{RenderError, Renderer};

/// Default transition duration in milliseconds
pub const DEFAULT_DURATION: f64 = 250.0;

/// Handle of an element in a [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Root,
    Group,
    Path,
    Circle,
    Line,
    Rect,
    Text,
    /// Draws the shape of another element, referenced by its `href` attribute
    Use,
    /// Holds referenced shapes; never drawn directly
    Defs,
}

/// Data bound to an element
#[derive(Debug, Clone)]
pub enum Bound {
    Geography(Arc<Geography>),
    Record(Arc<Datum>),
}

impl Bound {
    pub fn geography(&self) -> Option<&Geography> {
        match self {
            Self::Geography(g) => Some(g),
            Self::Record(_) => None,
        }
    }

    pub fn record(&self) -> Option<&Datum> {
        match self {
            Self::Record(d) => Some(d),
            Self::Geography(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    kind: ElementKind,
    classes: Vec<String>,
    attrs: IndexMap<String, Value>,
    styles: IndexMap<String, Value>,
    shape: Option<Shape>,
    text: Option<String>,
    key: Option<String>,
    datum: Option<Bound>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    fn new(id: ElementId, kind: ElementKind, parent: Option<ElementId>) -> Self {
        Self {
            id,
            kind,
            classes: Vec::new(),
            attrs: IndexMap::new(),
            styles: IndexMap::new(),
            shape: None,
            text: None,
            key: None,
            datum: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add each whitespace-separated class not already present
    pub fn add_class(&mut self, classes: &str) -> &mut Self {
        for class in classes.split_whitespace() {
            if !self.has_class(class) {
                self.classes.push(class.to_string());
            }
        }
        self
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attrs.get(name).and_then(number)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn style(&self, name: &str) -> Option<&Value> {
        self.styles.get(name)
    }

    /// Style rendered as text, numbers included
    pub fn style_str(&self, name: &str) -> Option<String> {
        self.styles.get(name).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn style_f64(&self, name: &str) -> Option<f64> {
        self.styles.get(name).and_then(number)
    }

    pub fn styles(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.styles.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn set_style(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.styles.insert(name.to_string(), value.into());
        self
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    pub fn set_shape(&mut self, shape: Shape) -> &mut Self {
        self.shape = Some(shape);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(text.into());
        self
    }

    /// Join key of the bound datum
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn datum(&self) -> Option<&Bound> {
        self.datum.as_ref()
    }

    pub fn bind(&mut self, key: Option<String>, datum: Option<Bound>) -> &mut Self {
        self.key = key;
        self.datum = datum;
        self
    }

    fn is_hidden(&self) -> bool {
        matches!(self.style_str("display").as_deref(), Some("none"))
            || matches!(self.style_str("visibility").as_deref(), Some("hidden"))
    }

    /// The element's own `transform` attribute, identity when absent or
    /// malformed
    fn local_transform(&self) -> Affine {
        self.attr_str("transform")
            .and_then(parse_transform)
            .unwrap_or(Affine::IDENTITY)
    }
}

/// Parse an SVG transform list (`translate`, `scale`, `matrix`), composed
/// left to right
pub fn parse_transform(text: &str) -> Option<Affine> {
    let mut xf = Affine::IDENTITY;
    let mut rest = text.trim();
    while !rest.is_empty() {
        let open = rest.find('(')?;
        let close = rest.find(')')?;
        if close < open {
            return None;
        }
        let args = rest[open + 1..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|arg| !arg.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<f64>, _>>()
            .ok()?;
        let step = match (rest[..open].trim(), args.as_slice()) {
            ("translate", [x]) => Affine::translate((*x, 0.0)),
            ("translate", [x, y]) => Affine::translate((*x, *y)),
            ("scale", [k]) => Affine::scale(*k),
            ("scale", [x, y]) => Affine::scale_non_uniform(*x, *y),
            ("matrix", [a, b, c, d, e, f]) => Affine::new([*a, *b, *c, *d, *e, *f]),
            _ => return None,
        };
        xf = xf * step;
        rest = rest[close + 1..].trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }
    Some(xf)
}

/// Factor applied to lengths such as radii and stroke widths
fn length_scale(xf: Affine) -> f64 {
    xf.determinant().abs().sqrt()
}

fn apply(xf: Affine, p: [f64; 2]) -> [f64; 2] {
    to_xy(xf * to_point(p))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches("px").parse().ok(),
        _ => None,
    }
}

/// Fill and stroke resolved from an element's styles
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub fill: Option<Rgba>,
    pub stroke: Option<Rgba>,
    pub stroke_width: f64,
}

impl Paint {
    pub fn from_element(element: &Element) -> Self {
        let opacity = element.style_f64("opacity").unwrap_or(1.0);
        let fill = match element.style_str("fill") {
            Some(css) => Rgba::parse(&css),
            None if element.kind == ElementKind::Line => None,
            None => Some(Rgba::BLACK),
        }
        .map(|c| c.with_opacity(opacity * element.style_f64("fill-opacity").unwrap_or(1.0)));
        let stroke = element
            .style_str("stroke")
            .and_then(|css| Rgba::parse(&css))
            .map(|c| c.with_opacity(opacity * element.style_f64("stroke-opacity").unwrap_or(1.0)));
        Self {
            fill,
            stroke,
            stroke_width: element.style_f64("stroke-width").unwrap_or(1.0),
        }
    }

    fn scaled(mut self, k: f64) -> Self {
        self.stroke_width *= k;
        self
    }
}

/// A timed change to an element's attributes and styles
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    delay: f64,
    duration: f64,
    attrs: Vec<(String, Value)>,
    styles: Vec<(String, Value)>,
    remove: bool,
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            delay: 0.0,
            duration: DEFAULT_DURATION,
            attrs: Vec::new(),
            styles: Vec::new(),
            remove: false,
        }
    }
}

impl Transition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay = ms.max(0.0);
        self
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = ms.max(0.0);
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    pub fn style(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.styles.push((name.to_string(), value.into()));
        self
    }

    /// Remove the element once the transition completes
    pub fn remove(mut self) -> Self {
        self.remove = true;
        self
    }

    /// Total time until completion
    pub fn total(&self) -> f64 {
        self.delay + self.duration
    }
}

#[derive(Debug, Clone)]
struct Scheduled {
    element: ElementId,
    start_at: f64,
    transition: Transition,
    from_attrs: Option<Vec<Option<Value>>>,
    from_styles: Option<Vec<Option<Value>>>,
}

fn interpolate(from: Option<&Value>, to: &Value, t: f64) -> Value {
    if t >= 1.0 {
        return to.clone();
    }
    let Some(from) = from else {
        return to.clone();
    };
    if let (Some(a), Some(b)) = (number(from), number(to)) {
        if to.is_number() {
            return Value::from(a + (b - a) * t);
        }
    }
    if let (Some(a), Some(b)) = (
        from.as_str().and_then(Rgba::parse),
        to.as_str().and_then(Rgba::parse),
    ) {
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        let c = Rgba {
            r: mix(a.r, b.r),
            g: mix(a.g, b.g),
            b: mix(a.b, b.b),
            a: mix(a.a, b.a),
        };
        return Value::String(c.to_css());
    }
    // Discrete values switch halfway
    if t < 0.5 {
        from.clone()
    } else {
        to.clone()
    }
}

/// Tree of drawable elements with a transition clock
#[derive(Debug, Clone)]
pub struct Scene {
    width: f64,
    height: f64,
    elements: AHashMap<ElementId, Element>,
    root: ElementId,
    next_id: u64,
    clock: f64,
    transitions: Vec<Scheduled>,
}

impl Scene {
    pub fn new(width: f64, height: f64) -> Self {
        let root = ElementId(0);
        let mut elements = AHashMap::new();
        elements.insert(root, Element::new(root, ElementKind::Root, None));
        Self {
            width,
            height,
            elements,
            root,
            next_id: 1,
            clock: 0.0,
            transitions: Vec::new(),
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn size(&self) -> [f64; 2] {
        [self.width, self.height]
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.len() <= 1
    }

    fn create(&mut self, parent: ElementId, kind: ElementKind) -> Result<ElementId, RenderError> {
        if !self.elements.contains_key(&parent) {
            return Err(RenderError::UnknownElement(parent));
        }
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, Element::new(id, kind, Some(parent)));
        Ok(id)
    }

    /// Append a new child as the last (topmost) child of `parent`
    pub fn append(&mut self, parent: ElementId, kind: ElementKind) -> Result<ElementId, RenderError> {
        let id = self.create(parent, kind)?;
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Insert a new child beneath all existing children of `parent`
    pub fn insert_first(&mut self, parent: ElementId, kind: ElementKind) -> Result<ElementId, RenderError> {
        let id = self.create(parent, kind)?;
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.insert(0, id);
        }
        Ok(id)
    }

    /// Insert a new child of `parent` directly beneath `sibling`. Appends
    /// when `sibling` is not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: ElementId,
        sibling: ElementId,
        kind: ElementKind,
    ) -> Result<ElementId, RenderError> {
        let id = self.create(parent, kind)?;
        if let Some(p) = self.elements.get_mut(&parent) {
            match p.children.iter().position(|c| *c == sibling) {
                Some(index) => p.children.insert(index, id),
                None => p.children.push(id),
            }
        }
        Ok(id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    /// Like [`Scene::get_mut`] but reports a missing element
    pub fn element_mut(&mut self, id: ElementId) -> Result<&mut Element, RenderError> {
        self.elements.get_mut(&id).ok_or(RenderError::UnknownElement(id))
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.elements.get(&id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Descendants of `from` in document order
    pub fn descendants(&self, from: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(from).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// First descendant of `from` carrying `class`
    pub fn find_first(&self, from: ElementId, class: &str) -> Option<ElementId> {
        self.descendants(from)
            .into_iter()
            .find(|id| self.elements.get(id).is_some_and(|e| e.has_class(class)))
    }

    /// All descendants of `from` carrying `class`
    pub fn find_all(&self, from: ElementId, class: &str) -> Vec<ElementId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| self.elements.get(id).is_some_and(|e| e.has_class(class)))
            .collect()
    }

    /// Element whose `id` attribute equals `dom_id`
    pub fn find_by_dom_id(&self, dom_id: &str) -> Option<ElementId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.elements.get(id).and_then(|e| e.attr_str("id")) == Some(dom_id))
    }

    pub fn set_attr(&mut self, id: ElementId, name: &str, value: impl Into<Value>) -> Result<(), RenderError> {
        self.element_mut(id)?.set_attr(name, value);
        Ok(())
    }

    pub fn set_style(&mut self, id: ElementId, name: &str, value: impl Into<Value>) -> Result<(), RenderError> {
        self.element_mut(id)?.set_style(name, value);
        Ok(())
    }

    pub fn bind(&mut self, id: ElementId, key: Option<String>, datum: Option<Bound>) -> Result<(), RenderError> {
        self.element_mut(id)?.bind(key, datum);
        Ok(())
    }

    /// Move `id` to the end of its parent's children so it draws on top
    pub fn bring_to_front(&mut self, id: ElementId) -> Result<(), RenderError> {
        let parent = self
            .elements
            .get(&id)
            .ok_or(RenderError::UnknownElement(id))?
            .parent;
        if let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
            parent.children.push(id);
        }
        Ok(())
    }

    /// Move `id` directly beneath its sibling `sibling`. Does nothing when
    /// the two do not share a parent.
    pub fn move_before(&mut self, id: ElementId, sibling: ElementId) -> Result<(), RenderError> {
        let parent = self
            .elements
            .get(&id)
            .ok_or(RenderError::UnknownElement(id))?
            .parent;
        let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) else {
            return Ok(());
        };
        if id == sibling || !parent.children.contains(&sibling) {
            return Ok(());
        }
        parent.children.retain(|c| *c != id);
        if let Some(index) = parent.children.iter().position(|c| *c == sibling) {
            parent.children.insert(index, id);
        }
        Ok(())
    }

    /// Remove `id` and its subtree immediately, cancelling their transitions
    pub fn remove(&mut self, id: ElementId) {
        if id == self.root {
            return;
        }
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        if let Some(parent) = element.parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for gone in &doomed {
            self.elements.remove(gone);
        }
        self.transitions.retain(|t| !doomed.contains(&t.element));
    }

    /// Remove all children of `id`
    pub fn clear_children(&mut self, id: ElementId) {
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
    }

    /// Schedule `transition` on `id`, replacing any pending on the same element
    pub fn transition(&mut self, id: ElementId, transition: Transition) -> Result<(), RenderError> {
        if !self.elements.contains_key(&id) {
            return Err(RenderError::UnknownElement(id));
        }
        self.transitions.retain(|t| t.element != id);
        self.transitions.push(Scheduled {
            element: id,
            start_at: self.clock + transition.delay,
            transition,
            from_attrs: None,
            from_styles: None,
        });
        Ok(())
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn pending_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_animating(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Whether `id` has a scheduled transition
    pub fn is_transitioning(&self, id: ElementId) -> bool {
        self.transitions.iter().any(|t| t.element == id)
    }

    /// Move the clock forward by `ms` and apply transitions
    pub fn advance(&mut self, ms: f64) {
        self.clock += ms.max(0.0);
        let now = self.clock;
        let mut finished = Vec::new();
        let mut pending = std::mem::take(&mut self.transitions);
        let elements = &mut self.elements;

        pending.retain_mut(|scheduled| {
            if now < scheduled.start_at {
                return true;
            }
            let Some(element) = elements.get_mut(&scheduled.element) else {
                return false;
            };
            let transition = &scheduled.transition;
            let from_attrs = scheduled.from_attrs.get_or_insert_with(|| {
                transition.attrs.iter().map(|(k, _)| element.attrs.get(k).cloned()).collect()
            });
            let from_styles = scheduled.from_styles.get_or_insert_with(|| {
                transition.styles.iter().map(|(k, _)| element.styles.get(k).cloned()).collect()
            });

            let progress = if transition.duration <= 0.0 {
                1.0
            } else {
                ((now - scheduled.start_at) / transition.duration).clamp(0.0, 1.0)
            };
            for ((name, to), from) in transition.attrs.iter().zip(from_attrs.iter()) {
                element.attrs.insert(name.clone(), interpolate(from.as_ref(), to, progress));
            }
            for ((name, to), from) in transition.styles.iter().zip(from_styles.iter()) {
                element.styles.insert(name.clone(), interpolate(from.as_ref(), to, progress));
            }

            if progress >= 1.0 {
                if transition.remove {
                    finished.push(scheduled.element);
                }
                false
            } else {
                true
            }
        });

        self.transitions = pending;
        if !finished.is_empty() {
            trace!("Removing {} elements after their exit", finished.len());
        }
        for id in finished {
            self.remove(id);
        }
    }

    /// Run every pending transition to completion
    pub fn settle(&mut self) {
        while let Some(end) = self
            .transitions
            .iter()
            .map(|t| t.start_at + t.transition.duration)
            .reduce(f64::max)
        {
            self.advance((end - self.clock).max(0.0));
        }
    }

    fn transform_of(&self, id: ElementId) -> Affine {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(p) = cursor {
            let Some(element) = self.elements.get(&p) else {
                break;
            };
            chain.push(element.local_transform());
            cursor = element.parent;
        }
        chain
            .into_iter()
            .rev()
            .fold(Affine::IDENTITY, |acc, local| acc * local)
    }

    /// Shape drawn by a `use` element
    fn referenced_shape(&self, element: &Element) -> Option<&Shape> {
        let href = element.attr_str("href")?;
        let target = self.find_by_dom_id(href.trim_start_matches('#'))?;
        self.elements.get(&target)?.shape.as_ref()
    }

    /// Topmost interactive element under `point`
    pub fn hit_test(&self, point: [f64; 2]) -> Option<ElementId> {
        let mut order = Vec::new();
        self.collect_visible(self.root, &mut order);
        order.into_iter().rev().find(|id| self.hits(*id, point))
    }

    fn collect_visible(&self, id: ElementId, out: &mut Vec<ElementId>) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        if element.is_hidden() || element.kind == ElementKind::Defs {
            return;
        }
        out.push(id);
        for child in &element.children {
            self.collect_visible(*child, out);
        }
    }

    fn hits(&self, id: ElementId, point: [f64; 2]) -> bool {
        let Some(element) = self.elements.get(&id) else {
            return false;
        };
        if element.style_str("pointer-events").as_deref() == Some("none") {
            return false;
        }
        let xf = self.transform_of(id);
        if xf.determinant() == 0.0 {
            return false;
        }
        let local = apply(xf.inverse(), point);
        let paint = Paint::from_element(element);
        let tolerance = (paint.stroke_width / 2.0).max(2.0);
        match element.kind {
            ElementKind::Path => element.shape.as_ref().is_some_and(|shape| {
                (paint.fill.is_some() && shape.contains(local)) || shape.distance_to(local) <= tolerance
            }),
            ElementKind::Circle => {
                let cx = element.attr_f64("cx").unwrap_or(0.0);
                let cy = element.attr_f64("cy").unwrap_or(0.0);
                let r = element.attr_f64("r").unwrap_or(0.0);
                r > 0.0 && Circle::new((cx, cy), r).contains(to_point(local))
            }
            ElementKind::Line => {
                let from = [element.attr_f64("x1").unwrap_or(0.0), element.attr_f64("y1").unwrap_or(0.0)];
                let to = [element.attr_f64("x2").unwrap_or(0.0), element.attr_f64("y2").unwrap_or(0.0)];
                Line::new(to_point(from), to_point(to))
                    .nearest(to_point(local), 0.0)
                    .distance_sq
                    .sqrt()
                    <= tolerance
            }
            _ => false,
        }
    }

    /// Paint every visible element in document order
    pub fn render(&self, renderer: &mut dyn Renderer) {
        renderer.begin_frame(self.width, self.height);
        let curves = renderer.capabilities().supports_curves;
        self.render_element(self.root, Affine::IDENTITY, curves, renderer);
        renderer.end_frame();
    }

    fn render_element(&self, id: ElementId, parent: Affine, curves: bool, renderer: &mut dyn Renderer) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        if element.is_hidden() {
            return;
        }
        let xf = parent * element.local_transform();
        let k = length_scale(xf);
        let paint = || Paint::from_element(element).scaled(k);
        let draw_shape = |shape: &Shape, renderer: &mut dyn Renderer| {
            let mut shape = shape.transformed(xf);
            if !curves {
                shape = shape.flattened(0.25);
            }
            renderer.draw_path(&shape, &paint());
        };

        match element.kind {
            ElementKind::Root | ElementKind::Group => {
                for child in &element.children {
                    self.render_element(*child, xf, curves, renderer);
                }
            }
            ElementKind::Defs => {}
            ElementKind::Path => {
                if let Some(shape) = &element.shape {
                    draw_shape(shape, renderer);
                }
            }
            ElementKind::Use => {
                if let Some(shape) = self.referenced_shape(element) {
                    draw_shape(shape, renderer);
                }
            }
            ElementKind::Circle => {
                let center = [element.attr_f64("cx").unwrap_or(0.0), element.attr_f64("cy").unwrap_or(0.0)];
                let r = element.attr_f64("r").unwrap_or(0.0);
                if r > 0.0 {
                    renderer.draw_circle(apply(xf, center), r * k, &paint());
                }
            }
            ElementKind::Line => {
                let from = [element.attr_f64("x1").unwrap_or(0.0), element.attr_f64("y1").unwrap_or(0.0)];
                let to = [element.attr_f64("x2").unwrap_or(0.0), element.attr_f64("y2").unwrap_or(0.0)];
                renderer.draw_line(apply(xf, from), apply(xf, to), &paint());
            }
            ElementKind::Rect => {
                let min = [element.attr_f64("x").unwrap_or(0.0), element.attr_f64("y").unwrap_or(0.0)];
                let size = [
                    element.attr_f64("width").unwrap_or(0.0) * k,
                    element.attr_f64("height").unwrap_or(0.0) * k,
                ];
                renderer.draw_rect(apply(xf, min), size, &paint());
            }
            ElementKind::Text => {
                if let Some(text) = &element.text {
                    let at = [element.attr_f64("x").unwrap_or(0.0), element.attr_f64("y").unwrap_or(0.0)];
                    let size = element.style_f64("font-size").unwrap_or(10.0) * k;
                    renderer.draw_text(text, apply(xf, at), size, &paint());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RendererCapabilities;

    #[derive(Default)]
    struct Recorder {
        circles: Vec<([f64; 2], f64)>,
        paths: usize,
        texts: Vec<String>,
    }

    impl Renderer for Recorder {
        fn begin_frame(&mut self, _width: f64, _height: f64) {}
        fn end_frame(&mut self) {}
        fn draw_path(&mut self, _shape: &Shape, _paint: &Paint) {
            self.paths += 1;
        }
        fn draw_circle(&mut self, center: [f64; 2], radius: f64, _paint: &Paint) {
            self.circles.push((center, radius));
        }
        fn draw_line(&mut self, _start: [f64; 2], _end: [f64; 2], _paint: &Paint) {}
        fn draw_rect(&mut self, _min: [f64; 2], _size: [f64; 2], _paint: &Paint) {}
        fn draw_text(&mut self, text: &str, _position: [f64; 2], _font_size: f64, _paint: &Paint) {
            self.texts.push(text.to_string());
        }
        fn capabilities(&self) -> RendererCapabilities {
            RendererCapabilities {
                supports_curves: false,
                supports_text: true,
            }
        }
    }

    fn circle(scene: &mut Scene, parent: ElementId, cx: f64, r: f64) -> ElementId {
        let id = scene.append(parent, ElementKind::Circle).unwrap();
        scene
            .get_mut(id)
            .unwrap()
            .set_attr("cx", cx)
            .set_attr("cy", 10.0)
            .set_attr("r", r)
            .set_style("fill", "#ff0000");
        id
    }

    #[test]
    fn test_find_by_class() {
        let mut scene = Scene::new(100.0, 100.0);
        let group = scene.append(scene.root(), ElementKind::Group).unwrap();
        scene.get_mut(group).unwrap().add_class("bubbles");
        let c = circle(&mut scene, group, 10.0, 5.0);
        scene.get_mut(c).unwrap().add_class("datamaps-bubble");

        assert_eq!(scene.find_first(scene.root(), "bubbles"), Some(group));
        assert_eq!(scene.find_all(group, "datamaps-bubble"), vec![c]);
        assert!(scene.find_first(scene.root(), "arc").is_none());
    }

    #[test]
    fn test_insert_before_sibling() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let subunits = scene.append(root, ElementKind::Group).unwrap();
        let bubbles = scene.append(root, ElementKind::Group).unwrap();
        let grid = scene.insert_before(root, subunits, ElementKind::Path).unwrap();
        let first = scene.insert_first(root, ElementKind::Group).unwrap();
        assert_eq!(scene.children(root), &[first, grid, subunits, bubbles]);
    }

    #[test]
    fn test_move_before_sibling() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let subunits = scene.append(root, ElementKind::Group).unwrap();
        let bubbles = scene.append(root, ElementKind::Group).unwrap();
        let grid = scene.append(root, ElementKind::Group).unwrap();
        scene.move_before(grid, subunits).unwrap();
        assert_eq!(scene.children(root), &[grid, subunits, bubbles]);

        let nested = scene.append(bubbles, ElementKind::Circle).unwrap();
        scene.move_before(nested, subunits).unwrap();
        assert_eq!(scene.children(root), &[grid, subunits, bubbles]);
    }

    #[test]
    fn test_transition_interpolates_then_completes() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let c = circle(&mut scene, root, 10.0, 0.0);
        scene
            .transition(c, Transition::new().duration(400.0).attr("r", 20.0))
            .unwrap();

        scene.advance(200.0);
        assert_eq!(scene.get(c).unwrap().attr_f64("r"), Some(10.0));
        scene.advance(200.0);
        assert_eq!(scene.get(c).unwrap().attr_f64("r"), Some(20.0));
        assert_eq!(scene.pending_transitions(), 0);
    }

    #[test]
    fn test_color_transition() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let c = circle(&mut scene, root, 10.0, 5.0);
        scene.set_style(c, "fill", "#000000").unwrap();
        scene
            .transition(c, Transition::new().duration(100.0).style("fill", "#ffffff"))
            .unwrap();
        scene.advance(50.0);
        assert_eq!(scene.get(c).unwrap().style_str("fill").as_deref(), Some("#808080"));
        scene.settle();
        assert_eq!(scene.get(c).unwrap().style_str("fill").as_deref(), Some("#ffffff"));
    }

    #[test]
    fn test_removal_waits_for_delay() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let c = circle(&mut scene, root, 10.0, 5.0);
        scene
            .transition(c, Transition::new().delay(100.0).attr("r", 0.0).remove())
            .unwrap();

        scene.advance(99.0);
        assert!(scene.get(c).is_some());
        scene.advance(1.0 + DEFAULT_DURATION);
        assert!(scene.get(c).is_none());
        assert!(scene.children(scene.root()).is_empty());
    }

    #[test]
    fn test_new_transition_replaces_pending() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let c = circle(&mut scene, root, 10.0, 5.0);
        scene.transition(c, Transition::new().remove()).unwrap();
        scene.transition(c, Transition::new().attr("r", 8.0)).unwrap();
        assert_eq!(scene.pending_transitions(), 1);
        scene.settle();
        assert_eq!(scene.get(c).unwrap().attr_f64("r"), Some(8.0));
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut scene = Scene::new(100.0, 100.0);
        let root = scene.root();
        let below = circle(&mut scene, root, 10.0, 8.0);
        let root = scene.root();
        let above = circle(&mut scene, root, 12.0, 8.0);
        assert_eq!(scene.hit_test([11.0, 10.0]), Some(above));

        scene.bring_to_front(below).unwrap();
        assert_eq!(scene.hit_test([11.0, 10.0]), Some(below));

        scene.set_style(below, "pointer-events", "none").unwrap();
        assert_eq!(scene.hit_test([11.0, 10.0]), Some(above));
        assert_eq!(scene.hit_test([90.0, 90.0]), None);
    }

    #[test]
    fn test_render_applies_group_scale() {
        let mut scene = Scene::new(100.0, 100.0);
        let group = scene.append(scene.root(), ElementKind::Group).unwrap();
        scene.set_attr(group, "transform", "scale(2)").unwrap();
        circle(&mut scene, group, 10.0, 5.0);
        let text = scene.append(scene.root(), ElementKind::Text).unwrap();
        scene.get_mut(text).unwrap().set_text("CA");

        let mut recorder = Recorder::default();
        scene.render(&mut recorder);
        assert_eq!(recorder.circles, vec![([20.0, 20.0], 10.0)]);
        assert_eq!(recorder.texts, vec!["CA".to_string()]);
    }

    #[test]
    fn test_parse_transform() {
        let xf = parse_transform("translate(10, 20) scale(2)").unwrap();
        assert_eq!(apply(xf, [1.0, 1.0]), [12.0, 22.0]);
        assert_eq!(length_scale(xf), 2.0);
        assert_eq!(parse_transform(" ").unwrap(), Affine::IDENTITY);
        assert!(parse_transform("rotate(45)").is_none());
        assert!(parse_transform("scale(a)").is_none());
        assert!(parse_transform(")scale(").is_none());
    }

    #[test]
    fn test_hit_test_inverts_group_transform() {
        let mut scene = Scene::new(100.0, 100.0);
        let group = scene.append(scene.root(), ElementKind::Group).unwrap();
        scene.set_attr(group, "transform", "scale(0.5)").unwrap();
        let dot = circle(&mut scene, group, 40.0, 10.0);
        // drawn at (20, 5) with radius 5
        assert_eq!(scene.hit_test([22.0, 6.0]), Some(dot));
        assert_eq!(scene.hit_test([40.0, 10.0]), None);

        scene.set_attr(group, "transform", "scale(0)").unwrap();
        assert_eq!(scene.hit_test([0.0, 0.0]), None);
    }

    #[test]
    fn test_use_draws_referenced_shape() {
        let mut scene = Scene::new(100.0, 100.0);
        let defs = scene.append(scene.root(), ElementKind::Defs).unwrap();
        let sphere = scene.append(defs, ElementKind::Path).unwrap();
        scene
            .get_mut(sphere)
            .unwrap()
            .set_attr("id", "sphere")
            .set_shape(Shape::polyline(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]], true));
        let usage = scene.append(scene.root(), ElementKind::Use).unwrap();
        scene.set_attr(usage, "href", "#sphere").unwrap();

        let mut recorder = Recorder::default();
        scene.render(&mut recorder);
        assert_eq!(recorder.paths, 1);
    }
}
