//! Re-export public algorithms.

pub mod classify;
pub mod communicator;
pub mod completion;
pub mod driver;
pub mod faces;
pub mod ownership;
pub mod stats;
pub mod wire;

pub use classify::{Classification, classify, plan_sends};
pub use driver::Tessellator;
pub use ownership::{CompletionEchoes, OwnedTets, resolve};
