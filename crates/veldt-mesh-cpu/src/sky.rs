use std::f32::consts::{FRAC_PI_2, PI, TAU};

use veldt_geom::Vec3;
use veldt_world::config::Sky;

use crate::mesh_build::MeshBuild;
use crate::palette::TextureId;

/// Dome height over horizontal radius.
pub const DOME_FLATTEN: f32 = 0.25;

/// Flattened hemisphere around the origin, `segments` patches around the
/// horizon and `segments` rings up to the zenith. Normals face inward.
pub fn build_dome(radius: f32, segments: u32) -> MeshBuild {
    let n = segments.max(3);
    let ring = n + 1;
    let mut mesh = MeshBuild::with_capacity((ring * ring) as usize, (6 * n * n) as usize);
    for iu in 0..=n {
        let u = TAU * iu as f32 / n as f32;
        for iv in 0..=n {
            let elev = FRAC_PI_2 * iv as f32 / n as f32;
            let p = Vec3::new(
                u.cos() * elev.cos() * radius,
                elev.sin() * radius * DOME_FLATTEN,
                u.sin() * elev.cos() * radius,
            );
            mesh.push_vertex(
                p,
                (-p).normalized(),
                (iu as f32 / n as f32, iv as f32 / n as f32),
                TextureId::default(),
                1.0,
                [255, 255, 255, 255],
            );
        }
    }
    for iu in 0..n {
        for iv in 0..n {
            let i = iu * ring + iv;
            mesh.push_triangle(i, i + 1, i + ring);
            mesh.push_triangle(i + 1, i + ring + 1, i + ring);
        }
    }
    mesh
}

/// Where `dir` leaves the dome of `radius`.
pub fn dome_point(dir: Vec3, radius: f32) -> Vec3 {
    let flat_y = dir.y / DOME_FLATTEN;
    let k = (dir.x * dir.x + flat_y * flat_y + dir.z * dir.z).sqrt();
    if k <= f32::EPSILON {
        return Vec3::new(0.0, radius * DOME_FLATTEN, 0.0);
    }
    dir * (radius / k)
}

/// Sun and sky colours at one moment of the day cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkySample {
    /// Hours since sunrise, swinging between 0 and 12.
    pub hours: f32,
    /// Sun elevation factor: 0 on the horizon, 1 at the zenith.
    pub daylight: f32,
    pub sun_dir: Vec3,
    /// Sun on the dome surface, relative to the dome centre.
    pub sun_pos: Vec3,
    pub horizon: [f32; 3],
    pub zenith: [f32; 3],
}

impl SkySample {
    pub fn at(elapsed_secs: f64, sky: &Sky) -> Self {
        let swing = (f64::from(sky.cycle_rate) * elapsed_secs).cos() as f32;
        let hours = 6.0 * swing + 6.0;
        let arc = PI * hours / 12.0;
        let daylight = arc.sin().clamp(0.0, 1.0);
        let brightness = daylight.powf(1.5);

        // Tilt the path on Z so the sun arcs across the dome.
        let sun_dir = Vec3::new(arc.cos(), arc.sin(), 0.25).normalized();
        let sun_pos = dome_point(sun_dir, sky.radius);

        let day_horizon = [210.0 / 255.0, 221.0 / 255.0, 235.0 / 255.0];
        let night_horizon = [10.0 / 255.0, 12.0 / 255.0, 20.0 / 255.0];
        let day_zenith = [74.0 / 255.0, 125.0 / 255.0, 204.0 / 255.0];
        let night_zenith = [2.0 / 255.0, 3.0 / 255.0, 10.0 / 255.0];
        let warm = [1.0, 0.63, 0.32];
        let twilight = arc.cos().abs().powf(3.0);
        let warm_strength = (0.35 * twilight * (0.5 + 0.5 * daylight)).clamp(0.0, 0.5);
        let base = mix(night_horizon, day_horizon, brightness);
        Self {
            hours,
            daylight,
            sun_dir,
            sun_pos,
            horizon: mix(base, warm, warm_strength),
            zenith: mix(night_zenith, day_zenith, brightness),
        }
    }
}

fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_dome(p: Vec3, radius: f32) -> f32 {
        let flat_y = p.y / DOME_FLATTEN;
        (p.x * p.x + flat_y * flat_y + p.z * p.z).sqrt() / radius
    }

    #[test]
    fn dome_vertices_lie_on_the_flattened_shell() {
        let mesh = build_dome(50.0, 10);
        assert_eq!(mesh.vertex_count(), 11 * 11);
        assert_eq!(mesh.triangle_count(), 2 * 10 * 10);
        assert!(mesh.idx.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        for p in mesh.pos.chunks_exact(3) {
            let p = Vec3::new(p[0], p[1], p[2]);
            assert!(p.y >= -1e-4);
            assert!((on_dome(p, 50.0) - 1.0).abs() < 1e-4);
        }
        let bb = mesh.bounds();
        assert!((bb.max.y - 50.0 * DOME_FLATTEN).abs() < 1e-3);
        assert!((bb.max.x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn noon_is_bright_and_dusk_is_dark() {
        let sky = Sky::default();
        let dusk = SkySample::at(0.0, &sky);
        assert!((dusk.hours - 12.0).abs() < 1e-5);
        assert!(dusk.daylight < 1e-3);

        let quarter = f64::from(FRAC_PI_2) / f64::from(sky.cycle_rate);
        let noon = SkySample::at(quarter, &sky);
        assert!((noon.hours - 6.0).abs() < 1e-3);
        assert!((noon.daylight - 1.0).abs() < 1e-3);
        assert!(noon.sun_dir.y > 0.9);
        assert!(noon.horizon[2] > dusk.horizon[2]);
        assert!(noon.zenith[2] > dusk.zenith[2]);
    }

    #[test]
    fn sun_rides_on_the_dome() {
        let sky = Sky::default();
        for step in 0..64 {
            let s = SkySample::at(f64::from(step) * 0.7, &sky);
            assert!((0.0..=12.0).contains(&s.hours));
            assert!((0.0..=1.0).contains(&s.daylight));
            assert!((s.sun_dir.length() - 1.0).abs() < 1e-4);
            assert!((on_dome(s.sun_pos, sky.radius) - 1.0).abs() < 1e-4);
        }
    }
}
