use proptest::prelude::*;
use veldt_geom::{Mat4, Vec3};

fn approx_abs_rel(a: f32, b: f32, atol: f32, rtol: f32) -> bool {
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    diff <= atol + rtol * scale
}

fn vapprox(a: Vec3, b: Vec3) -> bool {
    approx_abs_rel(a.x, b.x, 5e-2, 1e-4)
        && approx_abs_rel(a.y, b.y, 5e-2, 1e-4)
        && approx_abs_rel(a.z, b.z, 5e-2, 1e-4)
}

fn coord() -> impl Strategy<Value = f32> {
    -1000.0f32..1000.0
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn angle() -> impl Strategy<Value = f32> {
    -std::f32::consts::TAU..std::f32::consts::TAU
}

proptest! {
    // Identity leaves points untouched.
    #[test]
    fn identity_is_neutral(p in arb_vec3()) {
        prop_assert_eq!(Mat4::IDENTITY.transform_point(p), p);
        let t = Mat4::translation(p);
        prop_assert_eq!(Mat4::IDENTITY * t, t);
        prop_assert_eq!(t * Mat4::IDENTITY, t);
    }

    // (A * B) p == A (B p): composition order matches application order.
    #[test]
    fn composition_matches_sequential_application(
        p in arb_vec3(),
        t in arb_vec3(),
        ry in angle(),
        rx in angle(),
        s in 0.1f32..10.0,
    ) {
        let a = Mat4::translation(t) * Mat4::rotation_y(ry);
        let b = Mat4::rotation_x(rx) * Mat4::scale(s);
        let lhs = (a * b).transform_point(p);
        let rhs = a.transform_point(b.transform_point(p));
        prop_assert!(vapprox(lhs, rhs), "lhs={:?} rhs={:?}", lhs, rhs);
    }

    // Rotations preserve vector length.
    #[test]
    fn rotations_preserve_length(v in arb_vec3(), r in angle()) {
        for m in [Mat4::rotation_x(r), Mat4::rotation_y(r), Mat4::rotation_z(r)] {
            let out = m.transform_vector(v);
            prop_assert!(approx_abs_rel(out.length(), v.length(), 1e-2, 1e-4));
        }
    }
}
