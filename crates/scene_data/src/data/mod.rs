//! Property data model
//!
//! ## Architecture
//!
//! ```text
//! Provider (material, geometry, transform, camera)
//!      ↓  attach / detach, reference-counted
//! Container (one namespace, formatted names)
//!      ↓  get / set, change channels
//! Consumers (shader binding, draw-call z-sorting)
//! ```
//!
//! A [`Provider`] owns typed values under native names. A [`Container`]
//! aggregates providers, exposing array providers under indexed names such as
//! `material[2].priority`, and re-emits every provider event through its own
//! channels so consumers never talk to providers directly.

mod container;
mod error;
mod filter;
pub mod format;
mod provider;
mod value;

pub use container::{Container, ContainerFactory, ContainerId};
pub use error::{DataError, Result};
pub use filter::{ArrayNameFilter, Filter, FnFilter, PropertyFilter};
pub use provider::Provider;
pub use value::{Property, PropertyKind, PropertyValue, Resource};
