use std::collections::HashSet;

use proptest::prelude::*;
use veldt_runtime::spherical_chunk_coords;
use veldt_world::ChunkCoord;

proptest! {
    #[test]
    fn disc_is_exactly_the_chunks_in_radius(
        cx in -10_000i32..10_000,
        cz in -10_000i32..10_000,
        r in 0i32..12,
    ) {
        let center = ChunkCoord::new(cx, cz);
        let coords = spherical_chunk_coords(center, r);
        let set: HashSet<ChunkCoord> = coords.iter().copied().collect();
        prop_assert_eq!(set.len(), coords.len());
        let mut expected = 0;
        for dz in -r..=r {
            for dx in -r..=r {
                let inside = dx * dx + dz * dz <= r * r;
                if inside {
                    expected += 1;
                }
                prop_assert_eq!(set.contains(&center.checked_offset(dx, dz).unwrap()), inside);
            }
        }
        prop_assert_eq!(coords.len(), expected);
    }

    #[test]
    fn disc_grows_with_radius(r in 0i32..12) {
        let c = ChunkCoord::new(0, 0);
        let inner: HashSet<ChunkCoord> = spherical_chunk_coords(c, r).into_iter().collect();
        let outer: HashSet<ChunkCoord> = spherical_chunk_coords(c, r + 1).into_iter().collect();
        prop_assert!(inner.is_subset(&outer));
        prop_assert!(outer.len() > inner.len());
    }
}

#[test]
fn negative_radius_is_empty() {
    assert!(spherical_chunk_coords(ChunkCoord::new(3, 4), -1).is_empty());
    assert_eq!(spherical_chunk_coords(ChunkCoord::new(3, 4), 0), vec![ChunkCoord::new(3, 4)]);
}
