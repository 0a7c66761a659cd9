//! # Scene Data
//!
//! Property aggregation and change notification for a scene-graph renderer.
//!
//! ## Features
//!
//! - **Providers**: named, typed key/value stores owned by materials, geometry,
//!   transforms and cameras
//! - **Containers**: merge many providers into one addressable namespace, with
//!   per-instance name formatting for array providers
//! - **Signals**: synchronous, ordered change channels with drop-to-disconnect
//!   connections
//! - **Z-sorting**: a reactive draw-call consumer that requests re-ordering only
//!   when a spatially relevant property changes
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_data::prelude::*;
//!
//! fn main() -> Result<(), DataError> {
//!     let factory = ContainerFactory::new(ContainerConfig::default());
//!     let container = factory.create();
//!
//!     let material = Provider::create_array("material").with("priority", 2.0_f32);
//!     container.add_provider(material)?;
//!
//!     assert_eq!(container.get::<f32>("material[0].priority")?, 2.0);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod data;
pub mod events;
pub mod foundation;
pub mod render;

pub use data::{DataError, Result};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ContainerConfig, SceneDataConfig, ZSortConfig},
        data::{
            ArrayNameFilter, Container, ContainerFactory, ContainerId, DataError, Filter,
            Property, PropertyKind, PropertyValue, Provider, Resource,
        },
        events::{Connection, Signal},
        foundation::math::{Mat4, Transform, Vec3, Vec4, AABB},
        render::{BindingSource, DrawCall, DrawCallId, DrawCallPool, DrawCallZSorter, VertexBuffer, ZSorterState},
    };
}
