//! Records handed to the output collaborator.

use crate::geometry::kernel::RawFace;
use crate::tess_error::TessError;
use crate::topology::bounds::Aabb;
use crate::topology::periodic::WrapDir;
use serde::{Deserialize, Serialize};

/// A cell that is complete and passed the volume filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompleteCell {
    /// Original particle index.
    pub cell: usize,
    pub volume: f64,
    /// Surface area (sum of face areas).
    pub area: f64,
    /// Indices into [`VoronoiBlock::faces`].
    pub faces: Vec<usize>,
}

/// One vertex of a stored cross-block tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteTetVertex {
    pub gid: usize,
    pub nid: usize,
    pub dir: WrapDir,
}

/// Wall-clock seconds spent per stage.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Times {
    /// First kernel pass and send planning.
    pub local: f64,
    /// Round 1 particle exchange.
    pub exchange: f64,
    /// Second kernel pass and classification.
    pub cells: f64,
    /// Round 2 completion echo.
    pub echo: f64,
    pub tets: f64,
    pub volumes: f64,
    pub total: f64,
}

impl Times {
    pub(crate) fn splat(v: f64) -> Times {
        Times {
            local: v,
            exchange: v,
            cells: v,
            echo: v,
            tets: v,
            volumes: v,
            total: v,
        }
    }

    pub(crate) fn zip_with(self, other: Times, f: impl Fn(f64, f64) -> f64) -> Times {
        Times {
            local: f(self.local, other.local),
            exchange: f(self.exchange, other.exchange),
            cells: f(self.cells, other.cells),
            echo: f(self.echo, other.echo),
            tets: f(self.tets, other.tets),
            volumes: f(self.volumes, other.volumes),
            total: f(self.total, other.total),
        }
    }
}

/// Final per-block result of a tessellation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct VoronoiBlock {
    pub gid: usize,
    pub bounds: Aabb,
    pub num_orig: usize,
    /// Voronoi vertices, `verts[0]` is the infinite sentinel.
    pub verts: Vec<[f64; 3]>,
    /// Vertex indices per original particle.
    pub cells: Vec<Vec<usize>>,
    pub faces: Vec<RawFace>,
    /// CSR offsets into `cell_faces`, length `num_orig + 1`.
    pub cell_faces_start: Vec<usize>,
    pub cell_faces: Vec<usize>,
    pub face_areas: Vec<f64>,
    /// Completeness per original particle.
    pub flags: Vec<bool>,
    pub complete_cells: Vec<CompleteCell>,
    /// Tets with four original vertices, as particle indices.
    pub loc_tets: Vec<[usize; 4]>,
    /// Owned cross-block tets.
    pub rem_tets: Vec<[RemoteTetVertex; 4]>,
    pub times: Times,
}

impl VoronoiBlock {
    /// Faces of original cell `cell`.
    pub fn faces_of(&self, cell: usize) -> &[usize] {
        &self.cell_faces[self.cell_faces_start[cell]..self.cell_faces_start[cell + 1]]
    }

    pub fn total_volume(&self) -> f64 {
        self.complete_cells.iter().map(|c| c.volume).sum()
    }
}

/// Consumer of finished blocks.
pub trait BlockSink {
    fn write_block(&mut self, block: VoronoiBlock) -> Result<(), TessError>;
}

impl BlockSink for Vec<VoronoiBlock> {
    fn write_block(&mut self, block: VoronoiBlock) -> Result<(), TessError> {
        self.push(block);
        Ok(())
    }
}
