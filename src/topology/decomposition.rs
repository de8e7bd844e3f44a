//! Block decomposition of the global domain.
//!
//! Every rank holds the full block table (gid → rank, bounds, neighbor
//! links) and knows which gids it owns locally. Local ids (`lid`) index the
//! rank's own blocks in ascending gid order.
//!
//! Neighbor relations must be symmetric: if `a` lists `b` then `b` lists `a`
//! (with the mirrored wrap direction). The exchange relies on this to agree
//! on which ranks talk to each other.

use crate::algs::wire::wire_u32;
use crate::tess_error::TessError;
use crate::topology::bounds::Aabb;
use crate::topology::periodic::WrapDir;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A neighbor block together with the wrap crossed to reach it.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NeighborLink {
    pub gid: usize,
    pub dir: WrapDir,
}

impl NeighborLink {
    pub const fn new(gid: usize, dir: WrapDir) -> Self {
        Self { gid, dir }
    }
}

/// One entry of the global block table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDesc {
    pub gid: usize,
    pub rank: usize,
    pub bounds: Aabb,
    pub neighbors: Vec<NeighborLink>,
}

#[derive(Clone, Debug)]
pub struct Decomposition {
    domain: Aabb,
    wrap: bool,
    rank: usize,
    blocks: BTreeMap<usize, BlockDesc>,
    local: Vec<usize>,
}

impl Decomposition {
    /// Build from an explicit block table. Fails if a neighbor link points at
    /// a gid that is not in the table, or if a gid does not fit the 32-bit
    /// gid fields of the exchange records.
    pub fn from_blocks(
        domain: Aabb,
        wrap: bool,
        blocks: Vec<BlockDesc>,
        rank: usize,
    ) -> Result<Self, TessError> {
        let blocks: BTreeMap<usize, BlockDesc> = blocks.into_iter().map(|b| (b.gid, b)).collect();
        for desc in blocks.values() {
            wire_u32(desc.gid, "block gid").map_err(TessError::InvalidConfig)?;
            if let Some(bad) = desc.neighbors.iter().find(|l| !blocks.contains_key(&l.gid)) {
                return Err(TessError::UnknownBlock(bad.gid));
            }
        }
        let local = blocks
            .values()
            .filter(|b| b.rank == rank)
            .map(|b| b.gid)
            .collect();
        Ok(Self {
            domain,
            wrap,
            rank,
            blocks,
            local,
        })
    }

    /// Regular `dims[0] x dims[1] x dims[2]` grid of blocks, assigned to ranks
    /// round-robin by gid. Each block links to its 26-neighbourhood; with
    /// `wrap` the links continue across the domain faces.
    pub fn regular(
        domain: Aabb,
        dims: [usize; 3],
        nranks: usize,
        rank: usize,
        wrap: bool,
    ) -> Result<Self, TessError> {
        if dims.iter().any(|&n| n == 0) || nranks == 0 {
            return Err(TessError::InvalidConfig(format!(
                "regular decomposition needs non-zero dims and ranks, got {dims:?} over {nranks} ranks"
            )));
        }
        let [nx, ny, nz] = dims;
        let ext = domain.extent();
        let gid_of = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
        let edge = |d: usize, i: usize| domain.min[d] + ext[d] * i as f64 / dims[d] as f64;

        let mut blocks = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let idx = [i, j, k];
                    let bounds = Aabb::new(
                        [edge(0, i), edge(1, j), edge(2, k)],
                        [edge(0, i + 1), edge(1, j + 1), edge(2, k + 1)],
                    );
                    let mut neighbors = Vec::new();
                    for off in offsets() {
                        let mut nidx = [0usize; 3];
                        let mut dir = WrapDir::NONE;
                        let mut reachable = true;
                        for d in 0..3 {
                            let n = dims[d] as isize;
                            let c = idx[d] as isize + off[d];
                            let (lo, hi) = WrapDir::AXES[d];
                            nidx[d] = if c < 0 {
                                dir |= lo;
                                (c + n) as usize
                            } else if c >= n {
                                dir |= hi;
                                (c - n) as usize
                            } else {
                                c as usize
                            };
                            if !dir.is_none() && !wrap {
                                reachable = false;
                            }
                        }
                        if reachable {
                            neighbors.push(NeighborLink::new(gid_of(nidx[0], nidx[1], nidx[2]), dir));
                        }
                    }
                    neighbors.sort();
                    neighbors.dedup();
                    let gid = gid_of(i, j, k);
                    blocks.push(BlockDesc {
                        gid,
                        rank: gid % nranks,
                        bounds,
                        neighbors,
                    });
                }
            }
        }
        Self::from_blocks(domain, wrap, blocks, rank)
    }

    pub fn domain(&self) -> &Aabb {
        &self.domain
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of blocks owned by this rank.
    pub fn num_local(&self) -> usize {
        self.local.len()
    }

    /// Number of blocks in the whole decomposition.
    pub fn num_global(&self) -> usize {
        self.blocks.len()
    }

    pub fn local_gids(&self) -> &[usize] {
        &self.local
    }

    pub fn gid_of(&self, lid: usize) -> Result<usize, TessError> {
        self.local
            .get(lid)
            .copied()
            .ok_or(TessError::UnknownLocalBlock {
                lid,
                count: self.local.len(),
            })
    }

    pub fn lid_of(&self, gid: usize) -> Option<usize> {
        self.local.binary_search(&gid).ok()
    }

    fn desc(&self, gid: usize) -> Result<&BlockDesc, TessError> {
        self.blocks.get(&gid).ok_or(TessError::UnknownBlock(gid))
    }

    pub fn block_bounds(&self, lid: usize) -> Result<Aabb, TessError> {
        Ok(self.desc(self.gid_of(lid)?)?.bounds)
    }

    pub fn bounds_of_gid(&self, gid: usize) -> Result<Aabb, TessError> {
        Ok(self.desc(gid)?.bounds)
    }

    pub fn neighbors_of(&self, lid: usize) -> Result<&[NeighborLink], TessError> {
        Ok(&self.desc(self.gid_of(lid)?)?.neighbors)
    }

    pub fn rank_of(&self, gid: usize) -> Result<usize, TessError> {
        Ok(self.desc(gid)?.rank)
    }

    /// Ranks (other than our own) hosting a neighbor of any local block.
    pub fn neighbor_ranks(&self) -> BTreeSet<usize> {
        self.local
            .iter()
            .filter_map(|g| self.blocks.get(g))
            .flat_map(|d| d.neighbors.iter())
            .filter_map(|l| self.blocks.get(&l.gid).map(|d| d.rank))
            .filter(|&r| r != self.rank)
            .collect()
    }

    /// Every neighbor of `lid` except the block itself seen without a wrap.
    pub fn all_neighbors(&self, lid: usize) -> Result<BTreeSet<NeighborLink>, TessError> {
        let gid = self.gid_of(lid)?;
        Ok(self
            .neighbors_of(lid)?
            .iter()
            .copied()
            .filter(|l| !(l.gid == gid && l.dir.is_none()))
            .collect())
    }

    /// Add to `out` every neighbor of `lid` whose (wrap-shifted) bounds come
    /// within `radius` of `pt`.
    pub fn neighbors_near(
        &self,
        lid: usize,
        pt: [f64; 3],
        radius: f64,
        out: &mut BTreeSet<NeighborLink>,
    ) -> Result<(), TessError> {
        let gid = self.gid_of(lid)?;
        let r2 = radius * radius;
        for link in self.neighbors_of(lid)? {
            if link.gid == gid && link.dir.is_none() {
                continue;
            }
            let shifted = self
                .bounds_of_gid(link.gid)?
                .translated(link.dir.neighbor_shift(&self.domain));
            if shifted.distance2_to(pt) <= r2 {
                out.insert(*link);
            }
        }
        Ok(())
    }
}

fn offsets() -> impl Iterator<Item = [isize; 3]> {
    (-1isize..=1).flat_map(|k| {
        (-1isize..=1).flat_map(move |j| {
            (-1isize..=1)
                .map(move |i| [i, j, k])
                .filter(|o| *o != [0, 0, 0])
        })
    })
}
