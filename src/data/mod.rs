//! Data module: particle blocks and output records

/// Per-block particle store.
pub mod block;
/// Records handed to the output collaborator.
pub mod output;

pub use block::{Block, GhostTag, Particle, SentParticle};
pub use output::{BlockSink, CompleteCell, RemoteTetVertex, Times, VoronoiBlock};
