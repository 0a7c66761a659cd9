//! CPU-side vertex data shared through geometry providers

use crate::foundation::math::{Vec3, AABB};

/// Interleaved vertex data with a known position attribute
///
/// Stored in geometry providers as `Rc<VertexBuffer>`; consumers only need the
/// local extents of the positions, which are computed once at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    data: Vec<f32>,
    vertex_size: usize,
    position_offset: usize,
    bounds: Option<AABB>,
}

impl VertexBuffer {
    /// Create a buffer from interleaved floats
    ///
    /// `vertex_size` is the number of floats per vertex and `position_offset`
    /// the float offset of the xyz position inside a vertex. Trailing floats
    /// that do not form a whole vertex are ignored.
    pub fn new(data: Vec<f32>, vertex_size: usize, position_offset: usize) -> Self {
        let bounds = if vertex_size == 0 || position_offset + 3 > vertex_size {
            log::warn!(
                "Vertex layout ({} floats, position at {}) has no room for a position",
                vertex_size,
                position_offset
            );
            None
        } else {
            AABB::from_points(data.chunks_exact(vertex_size).map(|vertex| {
                Vec3::new(
                    vertex[position_offset],
                    vertex[position_offset + 1],
                    vertex[position_offset + 2],
                )
            }))
        };

        Self {
            data,
            vertex_size,
            position_offset,
            bounds,
        }
    }

    /// Create a position-only buffer
    pub fn from_positions(positions: &[Vec3]) -> Self {
        let data = positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        Self::new(data, 3, 0)
    }

    /// Raw interleaved data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Floats per vertex
    pub const fn vertex_size(&self) -> usize {
        self.vertex_size
    }

    /// Float offset of the position attribute
    pub const fn position_offset(&self) -> usize {
        self.position_offset
    }

    /// Number of whole vertices
    pub fn num_vertices(&self) -> usize {
        self.data.len().checked_div(self.vertex_size).unwrap_or(0)
    }

    /// Local-space bounds of the positions, `None` when empty
    pub const fn bounds(&self) -> Option<AABB> {
        self.bounds
    }

    /// Lowest position on each axis (zero when empty)
    pub fn min_position(&self) -> Vec3 {
        self.bounds.map_or_else(Vec3::zeros, |b| b.min)
    }

    /// Highest position on each axis (zero when empty)
    pub fn max_position(&self) -> Vec3 {
        self.bounds.map_or_else(Vec3::zeros, |b| b.max)
    }
}
