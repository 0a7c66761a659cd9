//! Depth-ordering trigger for a single draw call
//!
//! A [`DrawCallZSorter`] watches the handful of properties that influence where
//! a draw call lands in eye space and asks for a re-sort, through the draw
//! call's `zsort_needed` signal, whenever one of them appears, disappears or
//! changes. It never sorts anything itself.
//!
//! ## Watched properties
//!
//! | Template                             | Container | Cached          |
//! |--------------------------------------|-----------|-----------------|
//! | `material[${materialId}].priority`   | target    | no              |
//! | `material[${materialId}].zSort`      | target    | no              |
//! | `geometry[${geometryId}].position`   | target    | vertex buffer   |
//! | `transform.modelToWorldMatrix`       | target    | model-to-world  |
//! | `camera.worldToScreenMatrix`         | renderer  | world-to-screen |

use super::draw_call::DrawCall;
use super::vertex_buffer::VertexBuffer;
use crate::config::ZSortConfig;
use crate::data::{Container, DataError, Property, Result};
use crate::events::{Connection, Signal};
use crate::foundation::math::{Mat4, Vec3, Vec4};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Container a watched property is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSource {
    /// Per-object namespace: materials, geometry, transform
    Target,
    /// Per-renderer namespace: camera
    Renderer,
}

/// Lifecycle of a [`DrawCallZSorter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZSorterState {
    /// Created, not yet watching any container
    Uninitialized,
    /// Subscribed to its target and renderer containers
    Watching,
    /// Released; cannot be initialized again
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpatialInput {
    VertexPositions,
    ModelToWorld,
    WorldToScreen,
}

struct WatchedTemplate {
    template: &'static str,
    source: BindingSource,
    spatial: Option<SpatialInput>,
}

const WATCHED_TEMPLATES: [WatchedTemplate; 5] = [
    WatchedTemplate {
        template: "material[${materialId}].priority",
        source: BindingSource::Target,
        spatial: None,
    },
    WatchedTemplate {
        template: "material[${materialId}].zSort",
        source: BindingSource::Target,
        spatial: None,
    },
    WatchedTemplate {
        template: "geometry[${geometryId}].position",
        source: BindingSource::Target,
        spatial: Some(SpatialInput::VertexPositions),
    },
    WatchedTemplate {
        template: "transform.modelToWorldMatrix",
        source: BindingSource::Target,
        spatial: Some(SpatialInput::ModelToWorld),
    },
    WatchedTemplate {
        template: "camera.worldToScreenMatrix",
        source: BindingSource::Renderer,
        spatial: Some(SpatialInput::WorldToScreen),
    },
];

struct WatchedProperty {
    name: String,
    source: BindingSource,
    spatial: Option<SpatialInput>,
    subscriptions: Vec<Connection>,
}

#[derive(Default)]
struct SpatialCache {
    positions: Option<Rc<VertexBuffer>>,
    model_to_world: Option<Mat4>,
    world_to_screen: Option<Mat4>,
}

impl SpatialCache {
    fn clear(&mut self, input: SpatialInput) {
        match input {
            SpatialInput::VertexPositions => self.positions = None,
            SpatialInput::ModelToWorld => self.model_to_world = None,
            SpatialInput::WorldToScreen => self.world_to_screen = None,
        }
    }
}

struct SorterState {
    state: ZSorterState,
    target: Weak<Container>,
    renderer: Weak<Container>,
    watched: Vec<WatchedProperty>,
    structural: Vec<Connection>,
    cache: SpatialCache,
}

impl SorterState {
    fn watched(&self, source: BindingSource, name: &str) -> Option<&WatchedProperty> {
        self.watched
            .iter()
            .find(|w| w.source == source && w.name == name)
    }

    fn watched_mut(&mut self, source: BindingSource, name: &str) -> Option<&mut WatchedProperty> {
        self.watched
            .iter_mut()
            .find(|w| w.source == source && w.name == name)
    }

    /// Take every connection out so it can be dropped outside the borrow
    fn take_connections(&mut self) -> Vec<Connection> {
        let mut connections = std::mem::take(&mut self.structural);
        for watched in &mut self.watched {
            connections.append(&mut watched.subscriptions);
        }
        connections
    }
}

/// Reactive z-sort trigger bound to one [`DrawCall`]
pub struct DrawCallZSorter {
    draw_call: Rc<DrawCall>,
    config: ZSortConfig,
    weak_self: Weak<Self>,
    inner: RefCell<SorterState>,
}

impl DrawCallZSorter {
    /// Create an uninitialized sorter for `draw_call`
    pub fn new(draw_call: Rc<DrawCall>, config: ZSortConfig) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            draw_call,
            config,
            weak_self: weak_self.clone(),
            inner: RefCell::new(SorterState {
                state: ZSorterState::Uninitialized,
                target: Weak::new(),
                renderer: Weak::new(),
                watched: Vec::new(),
                structural: Vec::new(),
                cache: SpatialCache::default(),
            }),
        })
    }

    /// Draw call this sorter requests re-sorts for
    pub const fn draw_call(&self) -> &Rc<DrawCall> {
        &self.draw_call
    }

    /// Current lifecycle state
    pub fn state(&self) -> ZSorterState {
        self.inner.borrow().state
    }

    /// Formatted names currently watched, in template order
    pub fn watched_properties(&self) -> Vec<String> {
        self.inner
            .borrow()
            .watched
            .iter()
            .map(|w| w.name.clone())
            .collect()
    }

    /// Start (or restart) watching `target` and `renderer`
    ///
    /// Any previous subscriptions and cached inputs are dropped first. Watched
    /// properties already present are handled as if they had just been added,
    /// so each of them requests a re-sort.
    pub fn initialize(
        &self,
        target: &Rc<Container>,
        renderer: &Rc<Container>,
        root: &Rc<Container>,
    ) -> Result<()> {
        let stale = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == ZSorterState::Disposed {
                return Err(DataError::SorterDisposed);
            }

            let stale = inner.take_connections();
            inner.cache = SpatialCache::default();
            inner.watched = WATCHED_TEMPLATES
                .iter()
                .map(|t| WatchedProperty {
                    name: self.draw_call.format_property_name(t.template),
                    source: t.source,
                    spatial: t.spatial,
                    subscriptions: Vec::new(),
                })
                .collect();
            inner.target = Rc::downgrade(target);
            inner.renderer = Rc::downgrade(renderer);
            inner.structural = vec![
                self.subscribe(target.property_added(), BindingSource::Target, Self::on_property_added),
                self.subscribe(target.property_removed(), BindingSource::Target, Self::on_property_removed),
                self.subscribe(renderer.property_added(), BindingSource::Renderer, Self::on_property_added),
                self.subscribe(renderer.property_removed(), BindingSource::Renderer, Self::on_property_removed),
            ];
            inner.state = ZSorterState::Watching;
            stale
        };
        drop(stale);

        log::debug!(
            "Z-sorter for {} watching containers {} (target), {} (renderer), {} (root)",
            self.draw_call.id(),
            target.id(),
            renderer.id(),
            root.id()
        );

        let present: Vec<(BindingSource, String)> = self
            .inner
            .borrow()
            .watched
            .iter()
            .filter(|w| match w.source {
                BindingSource::Target => target.has_property(&w.name),
                BindingSource::Renderer => renderer.has_property(&w.name),
            })
            .map(|w| (w.source, w.name.clone()))
            .collect();

        for (source, name) in present {
            self.on_property_added(source, &name);
        }
        Ok(())
    }

    /// Drop every subscription and cached input; the sorter cannot be reused
    pub fn dispose(&self) {
        let stale = {
            let mut inner = self.inner.borrow_mut();
            let stale = inner.take_connections();
            inner.watched.clear();
            inner.cache = SpatialCache::default();
            inner.target = Weak::new();
            inner.renderer = Weak::new();
            inner.state = ZSorterState::Disposed;
            stale
        };
        drop(stale);
        log::trace!("Z-sorter for {} disposed", self.draw_call.id());
    }

    /// Ask for a re-sort if the draw call is z-sorted
    pub fn request_zsort(&self) {
        if !self.draw_call.z_sorted() {
            return;
        }
        log::trace!("Z-sort requested by {}", self.draw_call.id());
        self.draw_call.zsort_needed().emit(&self.draw_call.id());
    }

    /// Center of the geometry's local bounds, in eye space
    ///
    /// Missing inputs fall back to a zero center and identity matrices.
    pub fn eye_space_position(&self) -> Vec3 {
        let inner = self.inner.borrow();
        let cache = &inner.cache;

        let local = cache
            .positions
            .as_ref()
            .and_then(|buffer| buffer.bounds())
            .map_or_else(Vec3::zeros, |bounds| bounds.center());
        let model_to_world = cache.model_to_world.unwrap_or_else(Mat4::identity);
        let world_to_screen = cache.world_to_screen.unwrap_or_else(Mat4::identity);

        (world_to_screen * model_to_world * Vec4::new(local.x, local.y, local.z, 1.0)).xyz()
    }

    fn container(&self, source: BindingSource) -> Option<Rc<Container>> {
        let inner = self.inner.borrow();
        match source {
            BindingSource::Target => inner.target.upgrade(),
            BindingSource::Renderer => inner.renderer.upgrade(),
        }
    }

    fn subscribe(
        &self,
        signal: &Signal<str>,
        source: BindingSource,
        handler: fn(&Self, BindingSource, &str),
    ) -> Connection {
        let sorter = self.weak_self.clone();
        signal.connect(move |name: &str| {
            if let Some(sorter) = sorter.upgrade() {
                handler(&sorter, source, name);
            }
        })
    }

    fn on_property_added(&self, source: BindingSource, name: &str) {
        let (spatial, needs_subscription) = {
            let inner = self.inner.borrow();
            if inner.state != ZSorterState::Watching {
                return;
            }
            match inner.watched(source, name) {
                Some(watched) => (watched.spatial, watched.subscriptions.is_empty()),
                None => return,
            }
        };
        let Some(container) = self.container(source) else {
            return;
        };

        if needs_subscription {
            let mut subscriptions = vec![self.subscribe(
                &container.property_value_changed(name),
                source,
                Self::on_property_changed,
            )];
            if self.config.watch_reference_changes {
                subscriptions.push(self.subscribe(
                    &container.property_reference_changed(name),
                    source,
                    Self::on_property_changed,
                ));
            }
            if let Some(watched) = self.inner.borrow_mut().watched_mut(source, name) {
                watched.subscriptions = subscriptions;
            }
        }

        if let Some(input) = spatial {
            self.refresh(input, &container, name);
        }
        self.request_zsort();
    }

    fn on_property_removed(&self, source: BindingSource, name: &str) {
        let stale = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Some(watched) = inner.watched_mut(source, name) else {
                return;
            };
            let stale = std::mem::take(&mut watched.subscriptions);
            let spatial = watched.spatial;
            if let Some(input) = spatial {
                inner.cache.clear(input);
            }
            stale
        };
        drop(stale);
        self.request_zsort();
    }

    fn on_property_changed(&self, source: BindingSource, name: &str) {
        let spatial = match self.inner.borrow().watched(source, name) {
            Some(watched) => watched.spatial,
            None => return,
        };

        if let Some(input) = spatial {
            if let Some(container) = self.container(source) {
                self.refresh(input, &container, name);
            }
        }
        self.request_zsort();
    }

    /// Re-read a spatial input from its container
    fn refresh(&self, input: SpatialInput, container: &Container, name: &str) {
        let mut inner = self.inner.borrow_mut();
        let cache = &mut inner.cache;
        match input {
            SpatialInput::VertexPositions => cache.positions = read(container, name),
            SpatialInput::ModelToWorld => cache.model_to_world = read(container, name),
            SpatialInput::WorldToScreen => cache.world_to_screen = read(container, name),
        }
    }
}

fn read<T: Property>(container: &Container, name: &str) -> Option<T> {
    match container.get::<T>(name) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Z-sort input unavailable: {}", err);
            None
        }
    }
}

impl fmt::Debug for DrawCallZSorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCallZSorter")
            .field("draw_call", &self.draw_call.id())
            .field("state", &self.state())
            .field("watched", &self.watched_properties())
            .finish()
    }
}
