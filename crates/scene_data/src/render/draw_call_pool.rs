//! # Draw Call Pool
//!
//! Owns the draw calls of a renderer together with their z-sorters and keeps
//! them in submission order.
//!
//! ## Architecture
//!
//! - **DrawCall**: carries the name variables and the `zsort_needed` signal
//! - **DrawCallZSorter**: watches the containers and raises `zsort_needed`
//! - **DrawCallPool**: coalesces every `zsort_needed` of a frame into a single
//!   dirty flag, re-ordering at most once per [`DrawCallPool::sort_if_needed`]
//!
//! Draw calls that are not z-sorted keep their insertion order and come first;
//! z-sorted draw calls follow, back-to-front (largest eye-space `z` first).

use super::draw_call::{DrawCall, DrawCallId};
use super::zsorter::DrawCallZSorter;
use crate::config::ZSortConfig;
use crate::data::{Container, Result};
use crate::events::Connection;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct PoolEntry {
    draw_call: Rc<DrawCall>,
    sorter: Rc<DrawCallZSorter>,
    _zsort_needed: Connection,
}

/// Collection of draw calls ordered for submission
pub struct DrawCallPool {
    /// Configuration handed to every z-sorter
    config: ZSortConfig,

    /// Counter for unique draw call ids
    next_id: Cell<u32>,

    /// Draw calls in insertion order
    entries: RefCell<Vec<PoolEntry>>,

    /// Submission order computed by the last sort
    order: RefCell<Vec<DrawCallId>>,

    /// Set by any z-sort request, addition or removal
    dirty: Rc<Cell<bool>>,

    /// Requests received since the last sort
    requests: Rc<Cell<u32>>,
}

impl DrawCallPool {
    /// Create an empty pool
    pub fn new(config: ZSortConfig) -> Self {
        Self {
            config,
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
            order: RefCell::new(Vec::new()),
            dirty: Rc::new(Cell::new(false)),
            requests: Rc::new(Cell::new(0)),
        }
    }

    /// Create a draw call with a fresh id, to be configured and then added
    pub fn create_draw_call(&self) -> DrawCall {
        let id = DrawCallId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        DrawCall::new(id)
    }

    /// Add a draw call and start its z-sorter on the given containers
    pub fn add(
        &self,
        draw_call: DrawCall,
        target: &Rc<Container>,
        renderer: &Rc<Container>,
        root: &Rc<Container>,
    ) -> Result<Rc<DrawCall>> {
        let draw_call = Rc::new(draw_call);
        let sorter = DrawCallZSorter::new(Rc::clone(&draw_call), self.config.clone());

        let zsort_needed = {
            let dirty = Rc::clone(&self.dirty);
            let requests = Rc::clone(&self.requests);
            draw_call.zsort_needed().connect(move |_| {
                dirty.set(true);
                requests.set(requests.get() + 1);
            })
        };
        sorter.initialize(target, renderer, root)?;

        self.entries.borrow_mut().push(PoolEntry {
            draw_call: Rc::clone(&draw_call),
            sorter,
            _zsort_needed: zsort_needed,
        });
        self.dirty.set(true);

        log::debug!("Added {} to draw call pool ({} total)", draw_call.id(), self.len());
        Ok(draw_call)
    }

    /// Remove a draw call and dispose its z-sorter
    pub fn remove(&self, id: DrawCallId) -> Option<Rc<DrawCall>> {
        let entry = {
            let mut entries = self.entries.borrow_mut();
            let pos = entries.iter().position(|e| e.draw_call.id() == id)?;
            entries.remove(pos)
        };

        entry.sorter.dispose();
        self.order.borrow_mut().retain(|other| *other != id);
        self.dirty.set(true);

        log::debug!("Removed {} from draw call pool", id);
        Some(entry.draw_call)
    }

    /// Draw call by id
    pub fn draw_call(&self, id: DrawCallId) -> Option<Rc<DrawCall>> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.draw_call.id() == id)
            .map(|e| Rc::clone(&e.draw_call))
    }

    /// Z-sorter of a draw call
    pub fn sorter(&self, id: DrawCallId) -> Option<Rc<DrawCallZSorter>> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.draw_call.id() == id)
            .map(|e| Rc::clone(&e.sorter))
    }

    /// Whether a re-sort is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Number of z-sort requests since the last sort
    pub fn pending_requests(&self) -> u32 {
        self.requests.get()
    }

    /// Re-order the draw calls if anything changed since the last sort
    ///
    /// Returns whether a sort happened.
    pub fn sort_if_needed(&self) -> bool {
        if !self.dirty.get() {
            return false;
        }

        let keyed: Vec<(DrawCallId, bool, f32)> = self
            .entries
            .borrow()
            .iter()
            .map(|e| (e.draw_call.id(), e.draw_call.z_sorted(), e.sorter.eye_space_position().z))
            .collect();
        let (mut sorted, mut unsorted): (Vec<_>, Vec<_>) =
            keyed.into_iter().partition(|(_, z_sorted, _)| *z_sorted);

        // Back-to-front: farthest (largest z) first
        sorted.sort_by(|a, b| b.2.total_cmp(&a.2));
        unsorted.append(&mut sorted);

        log::debug!(
            "Sorted {} draw calls after {} z-sort requests",
            unsorted.len(),
            self.requests.get()
        );

        *self.order.borrow_mut() = unsorted.into_iter().map(|(id, _, _)| id).collect();
        self.dirty.set(false);
        self.requests.set(0);
        true
    }

    /// Submission order as of the last sort
    pub fn sorted(&self) -> Vec<DrawCallId> {
        self.order.borrow().clone()
    }

    /// Number of draw calls
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the pool holds no draw call
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Default for DrawCallPool {
    fn default() -> Self {
        Self::new(ZSortConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerConfig;
    use crate::data::{ContainerFactory, Provider};
    use crate::foundation::math::{Mat4, Vec3};

    fn translated(z: f32) -> Rc<Provider> {
        Provider::create().with("transform.modelToWorldMatrix", Mat4::new_translation(&Vec3::new(0.0, 0.0, z)))
    }

    #[test]
    fn test_pool_creation() {
        let pool = DrawCallPool::default();
        assert!(pool.is_empty());
        assert!(!pool.sort_if_needed());
        assert!(pool.sorted().is_empty());
    }

    #[test]
    fn test_sort_back_to_front() {
        let factory = ContainerFactory::new(ContainerConfig::default());
        let renderer = factory.create();
        let root = factory.create();
        let pool = DrawCallPool::default();

        let mut ids = Vec::new();
        let mut targets = Vec::new();
        for z in [-1.0, -10.0, -5.0] {
            let target = factory.create();
            target.add_provider(translated(z)).unwrap();
            let draw_call = pool.create_draw_call().with_z_sorted(true);
            ids.push(pool.add(draw_call, &target, &renderer, &root).unwrap().id());
            targets.push(target);
        }
        let overlay = pool.add(pool.create_draw_call(), &factory.create(), &renderer, &root).unwrap();

        assert!(pool.sort_if_needed());
        assert_eq!(pool.sorted(), vec![overlay.id(), ids[0], ids[2], ids[1]]);
        assert!(!pool.is_dirty());
        assert!(!pool.sort_if_needed());
    }

    #[test]
    fn test_requests_are_coalesced() {
        let factory = ContainerFactory::new(ContainerConfig::default());
        let target = factory.create();
        let renderer = factory.create();
        let transform = translated(-2.0);
        target.add_provider(Rc::clone(&transform)).unwrap();

        let pool = DrawCallPool::default();
        let draw_call = pool.create_draw_call().with_z_sorted(true);
        pool.add(draw_call, &target, &renderer, &factory.create()).unwrap();
        pool.sort_if_needed();

        transform.set("transform.modelToWorldMatrix", Mat4::new_translation(&Vec3::new(0.0, 0.0, -3.0)));
        transform.set("transform.modelToWorldMatrix", Mat4::new_translation(&Vec3::new(0.0, 0.0, -4.0)));

        assert!(pool.is_dirty());
        assert_eq!(pool.pending_requests(), 2);
        assert!(pool.sort_if_needed());
        assert_eq!(pool.pending_requests(), 0);
    }

    #[test]
    fn test_remove_disposes_sorter() {
        let factory = ContainerFactory::new(ContainerConfig::default());
        let target = factory.create();
        let pool = DrawCallPool::default();
        let draw_call = pool
            .add(pool.create_draw_call().with_z_sorted(true), &target, &factory.create(), &factory.create())
            .unwrap();
        let sorter = pool.sorter(draw_call.id()).unwrap();
        pool.sort_if_needed();

        assert!(pool.remove(draw_call.id()).is_some());
        assert_eq!(sorter.state(), crate::render::ZSorterState::Disposed);
        assert!(pool.is_dirty());
        assert!(pool.sorted().is_empty());
        assert!(pool.remove(draw_call.id()).is_none());

        target.add_provider(translated(1.0)).unwrap();
        assert_eq!(pool.pending_requests(), 0);
    }
}
