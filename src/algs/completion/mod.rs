//! Block-to-block completion: the sizes-then-data byte exchange between
//! ranks, the block-addressed queue built on it, and the two rounds of a
//! tessellation pass.

pub mod block_completion;
pub mod data_exchange;
pub mod neighbor_exchange;
pub mod size_exchange;

pub use block_completion::{exchange_completion, exchange_particles};
pub use neighbor_exchange::{Inbox, NeighborExchange};
