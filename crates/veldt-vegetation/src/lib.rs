//! Vegetation: L-system tree archetypes, grass, and the instance buckets that draw them.
#![forbid(unsafe_code)]

mod archetype;
mod bucket;
mod gaia;
mod lsystem;

pub use archetype::{TreeArchetype, grass_blade};
pub use bucket::InstanceBucket;
pub use gaia::{Gaia, LQ_SCALE};
pub use lsystem::{Segment, Skeleton, TREE_RULES, expand, interpret};
