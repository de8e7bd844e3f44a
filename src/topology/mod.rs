//! Spatial layout of the blocks.
//!
//! - [`bounds`]: axis-aligned boxes
//! - [`periodic`]: wrap directions and the periodic particle transform
//! - [`decomposition`]: blocks, their owners and their neighbor links

pub mod bounds;
pub mod decomposition;
pub mod periodic;

pub use bounds::Aabb;
pub use decomposition::{BlockDesc, Decomposition, NeighborLink};
pub use periodic::WrapDir;
