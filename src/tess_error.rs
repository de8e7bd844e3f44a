//! TessError: unified error type for tess-sieve public APIs.
//!
//! Geometric oddities (a site outside its own cell, a zero-volume cell) are
//! not errors; they are logged and the cell is dropped. Everything here
//! aborts the pass for the block or rank that hit it.

use thiserror::Error;

/// Unified error type for tessellation operations.
#[derive(Debug, Error)]
pub enum TessError {
    /// The kernel needs at least four points to build a tetrahedralization.
    #[error("tessellation needs at least 4 particles, got {count}")]
    InsufficientParticles { count: usize },

    /// All input points are coplanar (or worse); no tetrahedron exists.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A cross-block tet references a ghost for which no completion echo arrived.
    #[error("protocol violation: no completion echo for particle {nid} of block {gid}")]
    MissingCompletionEcho { gid: usize, nid: usize },

    /// A block reached a stage that needs completeness flags before it was
    /// classified (`flags.len()` differs from the number of originals).
    #[error("block {gid} is not classified: {flags} flags for {num_orig} original particles")]
    Unclassified {
        gid: usize,
        flags: usize,
        num_orig: usize,
    },

    /// A block id that the decomposition does not know about.
    #[error("unknown block gid {0}")]
    UnknownBlock(usize),

    /// Block-local id out of range for this rank.
    #[error("local block index {lid} out of range ({count} local blocks)")]
    UnknownLocalBlock { lid: usize, count: usize },

    /// Communication failure talking to a neighbor rank.
    #[error("communication error with neighbor {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Peer spoke a different wire version.
    #[error("wire version mismatch from rank {neighbor}: expected {expected}, got {found}")]
    WireVersion {
        neighbor: usize,
        expected: u16,
        found: u16,
    },

    /// Payload could not be decoded.
    #[error("malformed message from rank {neighbor}: {reason}")]
    MalformedMessage { neighbor: usize, reason: String },

    /// Configuration rejected by [`TessConfig::validate`](crate::config::TessConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// bincode (de)serialization of blocks or statistics failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// An error raised while processing one block.
    #[error("block {gid}: {source}")]
    InBlock {
        gid: usize,
        #[source]
        source: Box<TessError>,
    },

    /// Number of input blocks does not match the decomposition.
    #[error("expected {expected} local blocks, got {found}")]
    BlockCountMismatch { expected: usize, found: usize },
}

impl TessError {
    /// Attach the block gid to an error raised inside a per-block stage.
    pub fn in_block(self, gid: usize) -> Self {
        match self {
            e @ TessError::InBlock { .. } => e,
            e => TessError::InBlock {
                gid,
                source: Box::new(e),
            },
        }
    }

    /// Shorthand for a [`TessError::CommError`] with a string message.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        TessError::CommError {
            neighbor,
            source: msg.into(),
        }
    }
}
