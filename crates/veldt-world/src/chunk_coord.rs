use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// `None` when the shifted coordinate falls outside the `i32` grid.
    #[inline]
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            cx: self.cx.checked_add(dx)?,
            cz: self.cz.checked_add(dz)?,
        })
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx) - i64::from(other.cx);
        let dz = i64::from(self.cz) - i64::from(other.cz);
        dx * dx + dz * dz
    }

    /// Chessboard distance; 1 means "this chunk or one of its eight neighbours".
    #[inline]
    pub fn chebyshev(self, other: ChunkCoord) -> i64 {
        let dx = (i64::from(self.cx) - i64::from(other.cx)).abs();
        let dz = (i64::from(self.cz) - i64::from(other.cz)).abs();
        dx.max(dz)
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cz)
    }
}

/// Chunk containing the world-space point `(x, z)`. Floors, so negative
/// coordinates land in the chunk to their lower side. Points past the grid
/// clamp to its outermost chunk; NaN maps to 0.
#[inline]
pub fn world_to_chunk(x: f64, z: f64, world_size: f64) -> ChunkCoord {
    ChunkCoord::new(
        (x / world_size).floor() as i32,
        (z / world_size).floor() as i32,
    )
}

/// World-space `(x, z)` of the chunk's minimum corner.
#[inline]
pub fn chunk_to_world(coord: ChunkCoord, world_size: f64) -> (f64, f64) {
    (
        f64::from(coord.cx) * world_size,
        f64::from(coord.cz) * world_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_stops_at_grid_edge() {
        let edge = ChunkCoord::new(i32::MAX - 1, i32::MIN + 1);
        assert_eq!(edge.checked_offset(1, -1), Some(ChunkCoord::new(i32::MAX, i32::MIN)));
        assert_eq!(edge.checked_offset(2, 0), None);
        assert_eq!(edge.checked_offset(0, -2), None);
        assert_eq!(ChunkCoord::new(4, -4).checked_offset(-4, 4), Some(ChunkCoord::default()));
    }

    #[test]
    fn far_points_clamp_to_outer_chunk() {
        assert_eq!(world_to_chunk(1.0e12, -1.0e12, 12.0), ChunkCoord::new(i32::MAX, i32::MIN));
        assert_eq!(world_to_chunk(f64::NAN, 5.0, 12.0), ChunkCoord::new(0, 0));
    }
}
