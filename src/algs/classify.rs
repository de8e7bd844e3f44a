//! Cell completeness and send planning.
//!
//! A cell is *complete* when it can no longer change as particles from
//! outside the known set arrive: it is bounded, (without wrap) it stays
//! inside the global domain, and, with a minimum volume configured, it is
//! not provably too small. The same raw tessellation also tells us, per
//! particle, which neighbor blocks its cell could still reach.

use crate::config::TessConfig;
use crate::data::block::{Block, SentParticle};
use crate::geometry::kernel::{INFINITE_VERTEX, RawTessellation};
use crate::geometry::metrics::dist2;
use crate::tess_error::TessError;
use crate::topology::bounds::Aabb;
use crate::topology::decomposition::{Decomposition, NeighborLink};
use std::collections::BTreeSet;

/// Per-cell completeness of one classification pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    /// `flags[i]` is the completeness of original particle `i`.
    pub flags: Vec<bool>,
    /// Original particles whose cell is not complete, ascending.
    pub incomplete: Vec<usize>,
}

impl Classification {
    pub fn num_complete(&self) -> usize {
        self.flags.len() - self.incomplete.len()
    }
}

/// Classify every original cell of `block` in `raw`.
pub fn classify(raw: &RawTessellation, block: &Block, config: &TessConfig) -> Classification {
    let d2_min = config.d2_min();
    let mut flags = Vec::with_capacity(raw.cells.len());
    let mut incomplete = Vec::new();
    for (i, cell) in raw.cells.iter().enumerate() {
        let complete = cell_is_complete(raw, cell, config, d2_min)
            && site_in_cell_bounds(raw, block.gid, i, block.site(i));
        if !complete {
            incomplete.push(i);
        }
        flags.push(complete);
    }
    Classification { flags, incomplete }
}

fn cell_is_complete(
    raw: &RawTessellation,
    cell: &[usize],
    config: &TessConfig,
    d2_min: Option<f64>,
) -> bool {
    if cell.is_empty() {
        return false;
    }
    let mut too_small = d2_min.is_some();
    for &v in cell {
        if v == INFINITE_VERTEX {
            return false;
        }
        let p = raw.verts[v];
        if !config.wrap && !config.domain.contains(p) {
            return false;
        }
        if let (true, Some(d2)) = (too_small, d2_min) {
            if cell
                .iter()
                .any(|&w| w != INFINITE_VERTEX && dist2(p, raw.verts[w]) > d2)
            {
                too_small = false;
            }
        }
    }
    !too_small
}

/// Does the site of cell `i` lie inside the box spanned by the cell's
/// vertices? A `false` means the kernel handed back an inconsistent cell;
/// it is logged and the cell is treated as incomplete.
pub fn site_in_cell_bounds(raw: &RawTessellation, gid: usize, i: usize, site: [f64; 3]) -> bool {
    let Some(bb) = Aabb::of_points(raw.cells[i].iter().map(|&v| raw.verts[v])) else {
        return false;
    };
    if bb.contains(site) {
        true
    } else {
        log::warn!(
            "block {gid}: site {i} at {site:?} lies outside its cell bounds [{:?}, {:?}]; dropping the cell",
            bb.min,
            bb.max
        );
        false
    }
}

/// Decide which neighbors each original particle must be replicated to.
///
/// For every finite vertex `v` of a particle's cell, every neighbor whose
/// territory lies within `|v - site|` of `v` gets the particle. An
/// unbounded cell goes to all neighbors. Particles with an empty neighbor
/// set produce no record.
pub fn plan_sends(
    raw: &RawTessellation,
    block: &Block,
    decomp: &Decomposition,
    lid: usize,
) -> Result<Vec<SentParticle>, TessError> {
    let everyone = decomp.all_neighbors(lid)?;
    let mut sent = Vec::new();
    for (i, cell) in raw.cells.iter().enumerate() {
        let site = block.site(i);
        let neighbors: BTreeSet<NeighborLink> = if cell.contains(&INFINITE_VERTEX) {
            everyone.clone()
        } else {
            let mut near = BTreeSet::new();
            for &v in cell {
                let p = raw.verts[v];
                decomp.neighbors_near(lid, p, dist2(p, site).sqrt(), &mut near)?;
            }
            near
        };
        if !neighbors.is_empty() {
            sent.push(SentParticle {
                particle: i,
                neighbors,
            });
        }
    }
    Ok(sent)
}
