use veldt_geom::{Aabb, Vec3};

use crate::palette::TextureId;

/// Struct-of-arrays triangle mesh, laid out the way GPU buffers want it.
///
/// `tex` carries `(texture id, blend alpha)` per vertex for the terrain splat
/// shader; vegetation meshes leave it at zero.
#[derive(Default, Clone, Debug)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub tex: Vec<f32>,
    pub col: Vec<u8>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            pos: Vec::with_capacity(vertices * 3),
            norm: Vec::with_capacity(vertices * 3),
            uv: Vec::with_capacity(vertices * 2),
            tex: Vec::with_capacity(vertices * 2),
            col: Vec::with_capacity(vertices * 4),
            idx: Vec::with_capacity(indices),
        }
    }

    /// Clears all arrays but retains capacity for reuse.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.uv.clear();
        self.tex.clear();
        self.col.clear();
        self.idx.clear();
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Appends one vertex and returns its index.
    pub fn push_vertex(
        &mut self,
        p: Vec3,
        n: Vec3,
        uv: (f32, f32),
        tex: TextureId,
        alpha: f32,
        rgba: [u8; 4],
    ) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&[p.x, p.y, p.z]);
        self.norm.extend_from_slice(&[n.x, n.y, n.z]);
        self.uv.extend_from_slice(&[uv.0, uv.1]);
        self.tex.extend_from_slice(&[f32::from(tex.0), alpha]);
        self.col.extend_from_slice(&rgba);
        i
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.idx.extend_from_slice(&[a, b, c]);
    }

    /// Two-sided quad `a b c d` (counter-clockwise seen from `n`), emitted as
    /// both windings so foliage reads from either side.
    pub fn add_double_sided_quad(
        &mut self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        d: Vec3,
        n: Vec3,
        rgba: [u8; 4],
    ) {
        let uvs = [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];
        let front: Vec<u32> = [a, b, c, d]
            .iter()
            .zip(uvs)
            .map(|(&p, uv)| self.push_vertex(p, n, uv, TextureId::default(), 1.0, rgba))
            .collect();
        let back: Vec<u32> = [a, b, c, d]
            .iter()
            .zip(uvs)
            .map(|(&p, uv)| self.push_vertex(p, -n, uv, TextureId::default(), 1.0, rgba))
            .collect();
        self.push_triangle(front[0], front[1], front[2]);
        self.push_triangle(front[0], front[2], front[3]);
        self.push_triangle(back[0], back[2], back[1]);
        self.push_triangle(back[0], back[3], back[2]);
    }

    /// Appends every vertex and index of `other`, rebasing its indices.
    pub fn append(&mut self, other: &MeshBuild) {
        let base = self.vertex_count() as u32;
        self.pos.extend_from_slice(&other.pos);
        self.norm.extend_from_slice(&other.norm);
        self.uv.extend_from_slice(&other.uv);
        self.tex.extend_from_slice(&other.tex);
        self.col.extend_from_slice(&other.col);
        self.idx.extend(other.idx.iter().map(|i| i + base));
    }

    pub fn bounds(&self) -> Aabb {
        let mut bb = Aabb::EMPTY;
        for p in self.pos.chunks_exact(3) {
            bb.include(Vec3::new(p[0], p[1], p[2]));
        }
        bb
    }

    /// Returns a slice of interleaved vertex positions (x,y,z per vertex).
    pub fn positions(&self) -> &[f32] {
        &self.pos
    }
    /// Returns a slice of interleaved vertex normals (x,y,z per vertex).
    pub fn normals(&self) -> &[f32] {
        &self.norm
    }
}
