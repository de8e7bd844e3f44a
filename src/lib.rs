#![cfg_attr(docsrs, feature(doc_cfg))]
//! # tess-sieve
//!
//! tess-sieve computes a parallel Voronoi tessellation and its dual Delaunay
//! tetrahedralization of a 3D particle set that is split into blocks owned by
//! different processes. Each block tessellates its own particles, learns which
//! of its cells might still change, swaps boundary particles with its
//! neighbors and tessellates again. A second round of messages tells every
//! block which of the replicated particles ended up with a complete cell, so
//! that tetrahedra spanning several blocks are kept by exactly one of them.
//!
//! ## Features
//! - A local Bowyer-Watson kernel behind the [`TessKernel`] trait
//! - Completeness classification and distance-based send planning
//! - Pluggable communication backends (serial, threads, MPI) for the two exchange rounds
//! - Periodic boundaries through wrap-tagged neighbor links
//! - Cell faces, areas, volumes and a configurable volume filter
//! - Summary statistics with mergeable combiners
//!
//! ## Determinism
//!
//! Received particles are appended in source-gid order, so a run with the same
//! decomposition gives the same result on any backend and any number of ranks.
//! Tests that jitter particles use `SmallRng` with fixed seeds.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! tess-sieve = "0.3"
//! # Optional features:
//! # features = ["mpi-support","rayon"]
//! ```
//!
//! ```no_run
//! use tess_sieve::prelude::*;
//!
//! let domain = Aabb::unit();
//! let decomp = Decomposition::regular(domain, [2, 1, 1], 1, 0, false)?;
//! let tess = Tessellator::new(TessConfig::new(domain), decomp)?;
//! # let particles: Vec<Vec<[f64; 3]>> = vec![vec![], vec![]];
//! let blocks = tess.blocks_from_particles(particles)?;
//! for vb in tess.run(blocks, &NoComm)? {
//!     println!("block {}: {} complete cells", vb.gid, vb.complete_cells.len());
//! }
//! # Ok::<(), tess_sieve::tess_error::TessError>(())
//! ```
//!
//! ## Limitations
//! A single exchange round is performed. A cell whose neighborhood reaches
//! beyond the particles received in that round stays incomplete and is left
//! out of the output; there is no fixpoint iteration.

pub mod algs;
pub mod config;
pub mod data;
pub mod geometry;
pub mod tess_error;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::driver::Tessellator;
    pub use crate::algs::stats::{Stats, reduce_stats};
    pub use crate::config::TessConfig;
    pub use crate::data::block::{Block, Particle};
    pub use crate::data::output::{BlockSink, CompleteCell, VoronoiBlock};
    pub use crate::geometry::delaunay::BowyerWatson;
    pub use crate::geometry::kernel::{RawTessellation, TessKernel};
    pub use crate::tess_error::TessError;
    pub use crate::topology::bounds::Aabb;
    pub use crate::topology::decomposition::{BlockDesc, Decomposition, NeighborLink};
    pub use crate::topology::periodic::WrapDir;
}

pub use geometry::kernel::TessKernel;
