//! Render-side consumers of the property system
//!
//! Draw calls resolve templated property names against their own variables;
//! each z-sorted draw call gets a [`DrawCallZSorter`] that turns container
//! events into re-sort requests, which a [`DrawCallPool`] batches per frame.

mod draw_call;
mod draw_call_pool;
mod vertex_buffer;
mod zsorter;

pub use draw_call::{DrawCall, DrawCallId};
pub use draw_call_pool::DrawCallPool;
pub use vertex_buffer::VertexBuffer;
pub use zsorter::{BindingSource, DrawCallZSorter, ZSorterState};
