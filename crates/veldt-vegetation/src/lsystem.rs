use rand::Rng;
use veldt_geom::Vec3;

/// Rewrite rules for the HQ tree archetypes, one archetype each.
pub const TREE_RULES: [&str; 5] = [
    "F[+FF]F[-F]",
    "F[-F]F[+F][F]",
    "F[+F][-FF]F",
    "F[+F]F[-F]F",
    "F[-F+F]F[+F]",
];

pub const AXIOM: &str = "F";
pub const REWRITES: usize = 2;

pub const SEGMENT_LENGTH: f32 = 0.6;
pub const TRUNK_RADIUS: f32 = 0.12;

/// Replace every `F` of `axiom` with `rule`, `iterations` times.
pub fn expand(axiom: &str, rule: &str, iterations: usize) -> String {
    let mut grammar = axiom.to_string();
    for _ in 0..iterations {
        grammar = grammar.replace('F', rule);
    }
    grammar
}

/// Turtle state; also the record of one emitted branch or leaf anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub angle_y: f32,
    pub angle_z: f32,
    pub length: f32,
    pub radius: f32,
}

impl Segment {
    #[inline]
    pub fn direction(&self) -> Vec3 {
        Vec3::UP.rotated_z(self.angle_z).rotated_y(self.angle_y)
    }

    #[inline]
    pub fn end(&self) -> Vec3 {
        self.start + self.direction() * self.length
    }
}

#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    pub branches: Vec<Segment>,
    pub leaves: Vec<Segment>,
}

/// Walk `grammar` with a turtle:
/// `F` grows a segment (radius loses a fifth each time), `+`/`-` tilt by
/// `angle_deg`, `[` pushes (the first push spins the tree by a random yaw),
/// `]` pops and leaves a leaf cluster where the branch ended.
pub fn interpret(grammar: &str, angle_deg: f32, rng: &mut impl Rng) -> Skeleton {
    let mut out = Skeleton::default();
    let mut stack: Vec<Segment> = Vec::new();
    let mut turtle = Segment {
        start: Vec3::ZERO,
        angle_y: 0.0,
        angle_z: 0.0,
        length: SEGMENT_LENGTH,
        radius: TRUNK_RADIUS,
    };
    let mut advance = false;
    for ch in grammar.chars() {
        match ch {
            'F' => {
                if advance {
                    turtle.start = turtle.end();
                }
                turtle.radius -= turtle.radius / 5.0;
                advance = true;
                out.branches.push(turtle);
            }
            '+' => {
                turtle.angle_z += angle_deg;
                advance = false;
            }
            '-' => {
                turtle.angle_z -= angle_deg;
                advance = false;
            }
            '[' => {
                if stack.is_empty() {
                    turtle.angle_y += rng.random::<f32>() * 360.0;
                }
                stack.push(turtle);
            }
            ']' => {
                out.leaves.push(turtle);
                if let Some(prev) = stack.pop() {
                    turtle = prev;
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn two_rewrites_nest_the_rule() {
        assert_eq!(expand("F", "F[+F]", 1), "F[+F]");
        assert_eq!(expand("F", "F[+F]", 2), "F[+F][+F[+F]]");
    }

    #[test]
    fn one_branch_per_f_and_one_leaf_per_close() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for rule in TREE_RULES {
            let g = expand(AXIOM, rule, REWRITES);
            let s = interpret(&g, 20.0, &mut rng);
            assert_eq!(s.branches.len(), g.matches('F').count(), "{rule}");
            assert_eq!(s.leaves.len(), g.matches(']').count(), "{rule}");
        }
    }

    #[test]
    fn radius_shrinks_along_the_trunk() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let s = interpret("FFF", 20.0, &mut rng);
        assert!(s.branches.windows(2).all(|w| w[1].radius < w[0].radius));
        assert!((s.branches[0].radius - TRUNK_RADIUS * 0.8).abs() < 1e-6);
        assert!((s.branches[2].start.y - 2.0 * SEGMENT_LENGTH).abs() < 1e-5);
    }

    #[test]
    fn rotation_restarts_from_the_joint() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let s = interpret("F+F", 30.0, &mut rng);
        assert_eq!(s.branches[1].start, s.branches[0].start);
        assert_eq!(s.branches[1].angle_z, 30.0);
    }
}
