//! Map event bus
//!
//! Drawing, layer updates and degraded lookups are published here so a host
//! can observe what the engine did without inspecting the surface.

use std::any::{Any, TypeId};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

type SharedHandler = Arc<Mutex<Box<dyn EventHandler>>>;

/// Typed publish/subscribe channel shared by a map and its observers.
///
/// Handlers run outside the subscription lock, so a handler may publish or
/// subscribe on the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<AHashMap<TypeId, Vec<SharedHandler>>>>,
}

/// Something a map reports
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Receives the events it subscribed to
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Events published by a map instance
pub mod events {
    use super::Event;

    /// The base map finished its first (or a repeated) draw
    #[derive(Debug, Clone)]
    pub struct MapDrawn {
        pub scope: String,
        pub region_count: usize,
    }

    /// A plugin layer was drawn
    #[derive(Debug, Clone)]
    pub struct LayerDrawn {
        pub layer: String,
        pub entered: usize,
        pub updated: usize,
        pub exited: usize,
    }

    /// Regions were restyled by a choropleth update
    #[derive(Debug, Clone)]
    pub struct ChoroplethUpdated {
        pub regions: Vec<String>,
        pub reset: bool,
    }

    /// A location descriptor could not be placed
    #[derive(Debug, Clone)]
    pub struct LocationUnresolved {
        pub descriptor: String,
    }

    /// Fetching remote data failed
    #[derive(Debug, Clone)]
    pub struct RemoteDataFailed {
        pub url: String,
        pub error: String,
    }

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        MapDrawn,
        LayerDrawn,
        ChoroplethUpdated,
        LocationUnresolved,
        RemoteDataFailed
    );
}

pub use events::*;

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every future `E` to `handler`
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        self.subscribers
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Arc::new(Mutex::new(handler)));
    }

    /// Number of handlers listening for `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers
            .lock()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Hand `event` to each subscriber of its type, in subscription order
    pub fn publish<E: Event>(&self, event: E) {
        let targets = match self.subscribers.lock().get(&TypeId::of::<E>()) {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        for handler in targets {
            handler.lock().handle(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.subscribers.lock().len())
            .finish()
    }
}

/// Adapts a closure to [`EventHandler`]
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Box `f` as an event handler
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}
