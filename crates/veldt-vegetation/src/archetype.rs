use std::f32::consts::TAU;

use rand::Rng;
use veldt_geom::Vec3;
use veldt_mesh_cpu::{MeshBuild, TextureId};

use crate::lsystem::{AXIOM, REWRITES, SEGMENT_LENGTH, Segment, Skeleton, expand, interpret};

const BARK: [u8; 4] = [128, 128, 26, 255];
const LEAF: [u8; 4] = [0, 128, 0, 255];
const PRISM_SIDES: usize = 3;
const MIN_LEAF_SIZE: f32 = 0.3;

/// Immutable branch and leaf meshes shared by every instance of one tree shape.
#[derive(Clone, Debug)]
pub struct TreeArchetype {
    pub rule: &'static str,
    pub angle_deg: f32,
    pub branches: MeshBuild,
    pub leaves: MeshBuild,
}

impl TreeArchetype {
    /// Grow an archetype from one rewrite rule; branch angle is drawn from 15..30 degrees.
    pub fn from_rule(rule: &'static str, rng: &mut impl Rng) -> Self {
        let angle_deg = 15.0 + rng.random::<f32>() * 15.0;
        let grammar = expand(AXIOM, rule, REWRITES);
        let skeleton = interpret(&grammar, angle_deg, rng);
        Self::from_skeleton(rule, angle_deg, &skeleton, None, rng)
    }

    /// Far-away stand-in: one stretched segment with a single leaf pair.
    /// Drawn scaled up by the LQ buckets.
    pub fn low_quality(rng: &mut impl Rng) -> Self {
        let trunk = Segment {
            start: Vec3::ZERO,
            angle_y: 0.0,
            angle_z: 0.0,
            length: SEGMENT_LENGTH,
            radius: 0.02,
        };
        let crown = Segment {
            start: Vec3::new(0.0, SEGMENT_LENGTH, 0.0),
            ..trunk
        };
        let skeleton = Skeleton {
            branches: vec![trunk],
            leaves: vec![crown],
        };
        Self::from_skeleton("LQ", 0.0, &skeleton, Some(SEGMENT_LENGTH), rng)
    }

    fn from_skeleton(
        rule: &'static str,
        angle_deg: f32,
        skeleton: &Skeleton,
        leaf_size: Option<f32>,
        rng: &mut impl Rng,
    ) -> Self {
        let mut branches = MeshBuild::default();
        for seg in &skeleton.branches {
            add_prism(&mut branches, seg);
        }
        let mut leaves = MeshBuild::default();
        for seg in &skeleton.leaves {
            let size = leaf_size.unwrap_or_else(|| (seg.start.y * 0.5).max(MIN_LEAF_SIZE));
            add_leaf_cross(&mut leaves, seg, size, rng.random::<f32>() * 360.0);
        }
        Self {
            rule,
            angle_deg,
            branches,
            leaves,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.branches.triangle_count() + self.leaves.triangle_count()
    }
}

/// Open triangular prism from the segment start ring to a ring one fifth
/// narrower at its end.
fn add_prism(mesh: &mut MeshBuild, seg: &Segment) {
    let start = seg.start;
    let end = seg.end();
    let r0 = seg.radius;
    let r1 = seg.radius - seg.radius / 5.0;
    let ring = |i: usize| {
        let a = TAU * i as f32 / PRISM_SIDES as f32;
        Vec3::new(a.cos(), 0.0, a.sin())
    };
    let tex = TextureId::default();
    for i in 0..PRISM_SIDES {
        let (d0, d1) = (ring(i), ring(i + 1));
        let n = (d0 + d1).normalized();
        let p1 = mesh.push_vertex(start + d0 * r0, n, (0.0, 0.0), tex, 1.0, BARK);
        let p2 = mesh.push_vertex(start + d1 * r0, n, (1.0, 0.0), tex, 1.0, BARK);
        let p3 = mesh.push_vertex(end + d0 * r1, n, (0.0, 1.0), tex, 1.0, BARK);
        let p4 = mesh.push_vertex(end + d1 * r1, n, (1.0, 1.0), tex, 1.0, BARK);
        // Counter-clockwise seen from outside.
        mesh.push_triangle(p1, p4, p2);
        mesh.push_triangle(p1, p3, p4);
    }
}

/// Two crossed quads starting halfway up the segment and reaching `size` along it.
fn add_leaf_cross(mesh: &mut MeshBuild, seg: &Segment, size: f32, yaw_deg: f32) {
    let dir = seg.direction();
    let start = seg.start + dir * (seg.length * 0.5);
    let end = start + dir * size;
    for i in 0..2 {
        let spread = Vec3::new(size, 0.0, size).rotated_y(yaw_deg + 90.0 * i as f32);
        let n = spread.cross(end - start).normalized();
        mesh.add_double_sided_quad(start - spread, start + spread, end + spread, end - spread, n, LEAF);
    }
}

/// A single upright blade, `step / 5` wide at the base.
pub fn grass_blade(step: f32) -> MeshBuild {
    let width = step / 5.0;
    let height = step * 1.2;
    let mut mesh = MeshBuild::default();
    let p1 = Vec3::ZERO;
    let p2 = Vec3::new(width * 0.5, height, 0.0);
    let p3 = Vec3::new(width, 0.0, 0.0);
    let color = [40, 150, 40, 255];
    let tex = TextureId::default();
    for n in [Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0)] {
        let a = mesh.push_vertex(p1, n, (0.0, 0.0), tex, 1.0, color);
        let b = mesh.push_vertex(p2, n, (0.5, 1.0), tex, 1.0, color);
        let c = mesh.push_vertex(p3, n, (1.0, 0.0), tex, 1.0, color);
        if n.z > 0.0 {
            mesh.push_triangle(a, c, b);
        } else {
            mesh.push_triangle(a, b, c);
        }
    }
    mesh
}
