//! Contract between the completion protocol and the local geometry kernel.
//!
//! A kernel turns a block's particle array into a Voronoi diagram of the
//! first `num_orig` particles plus the Delaunay tetrahedra of all of them.
//! Everything downstream only reads [`RawTessellation`].

use crate::tess_error::TessError;

/// Vertex index reserved for the point at infinity of unbounded cells.
pub const INFINITE_VERTEX: usize = 0;

/// One Voronoi face: the two cells it separates and its vertex ring.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFace {
    /// Particle indices of the two sites. Either may be a ghost.
    pub cells: [usize; 2],
    /// Vertex indices in cyclic order. Contains [`INFINITE_VERTEX`] when the
    /// face is unbounded.
    pub verts: Vec<usize>,
}

impl RawFace {
    pub fn is_bounded(&self) -> bool {
        !self.verts.contains(&INFINITE_VERTEX)
    }
}

/// Output of one kernel pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTessellation {
    /// Voronoi vertices; `verts[0]` is the infinite sentinel.
    pub verts: Vec<[f64; 3]>,
    /// Vertex indices per original particle, `cells.len() == num_orig`.
    /// Empty when the kernel dropped the particle (coincident with another).
    pub cells: Vec<Vec<usize>>,
    pub faces: Vec<RawFace>,
    /// Delaunay tetrahedra as particle indices.
    pub tets: Vec<[usize; 4]>,
}

impl RawTessellation {
    #[inline]
    pub fn is_unbounded(&self, cell: usize) -> bool {
        self.cells[cell].contains(&INFINITE_VERTEX)
    }
}

/// A local Delaunay/Voronoi engine.
///
/// Implementations must be deterministic for a fixed input order and must
/// reject fewer than four particles with
/// [`TessError::InsufficientParticles`].
pub trait TessKernel: Send + Sync {
    fn tessellate(
        &self,
        particles: &[[f64; 3]],
        num_orig: usize,
    ) -> Result<RawTessellation, TessError>;
}
