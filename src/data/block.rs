//! Per-block particle store.
//!
//! A [`Block`] owns its original particles followed by ghosts appended in
//! receipt order. Ghost `k` (particle index `num_orig + k`) carries a
//! [`GhostTag`] naming the block and native id it came from and the wraps
//! applied on the way. Completeness flags and sent records persist from one
//! exchange round to the next; every other derived structure is rebuilt.

use crate::tess_error::TessError;
use crate::topology::bounds::Aabb;
use crate::topology::decomposition::NeighborLink;
use crate::topology::periodic::WrapDir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A particle position.
pub type Particle = [f64; 3];

/// Origin of a ghost particle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GhostTag {
    pub gid: usize,
    pub nid: usize,
    pub dir: WrapDir,
}

/// An original particle and the neighbors it was replicated to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentParticle {
    pub particle: usize,
    pub neighbors: BTreeSet<NeighborLink>,
}

impl SentParticle {
    /// Distinct gids in the neighbor set.
    pub fn gids(&self) -> BTreeSet<usize> {
        self.neighbors.iter().map(|l| l.gid).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub gid: usize,
    pub bounds: Aabb,
    /// Originals first, then ghosts.
    pub particles: Vec<Particle>,
    pub num_orig: usize,
    /// One tag per ghost, aligned with `particles[num_orig..]`.
    pub ghosts: Vec<GhostTag>,
    pub sent: Vec<SentParticle>,
    /// Completeness per original particle, empty until classified.
    pub flags: Vec<bool>,
}

impl Block {
    pub fn new(gid: usize, bounds: Aabb, particles: Vec<Particle>) -> Self {
        let num_orig = particles.len();
        Self {
            gid,
            bounds,
            particles,
            num_orig,
            ghosts: Vec::new(),
            sent: Vec::new(),
            flags: Vec::new(),
        }
    }

    #[inline]
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn num_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    #[inline]
    pub fn is_original(&self, idx: usize) -> bool {
        idx < self.num_orig
    }

    #[inline]
    pub fn site(&self, idx: usize) -> Particle {
        self.particles[idx]
    }

    /// Tag of ghost particle `idx`, or `None` for originals.
    pub fn ghost(&self, idx: usize) -> Option<&GhostTag> {
        idx.checked_sub(self.num_orig).and_then(|k| self.ghosts.get(k))
    }

    /// `(gid, native id, wrap)` of any particle; originals report this block
    /// and no wrap.
    pub fn origin(&self, idx: usize) -> GhostTag {
        match self.ghost(idx) {
            Some(tag) => *tag,
            None => GhostTag {
                gid: self.gid,
                nid: idx,
                dir: WrapDir::NONE,
            },
        }
    }

    /// Append a received particle.
    pub fn push_ghost(&mut self, pos: Particle, tag: GhostTag) {
        self.particles.push(pos);
        self.ghosts.push(tag);
    }

    /// Drop every ghost, keeping originals, sent records and flags.
    pub fn clear_ghosts(&mut self) {
        self.particles.truncate(self.num_orig);
        self.ghosts.clear();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TessError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TessError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Block {
        let mut b = Block::new(3, Aabb::unit(), vec![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]);
        b.push_ghost(
            [1.1, 0.2, 0.3],
            GhostTag {
                gid: 4,
                nid: 9,
                dir: WrapDir::X0,
            },
        );
        b.sent.push(SentParticle {
            particle: 1,
            neighbors: [NeighborLink::new(4, WrapDir::NONE), NeighborLink::new(4, WrapDir::X1)]
                .into_iter()
                .collect(),
        });
        b
    }

    #[test]
    fn origin_distinguishes_originals_and_ghosts() {
        let b = sample();
        assert_eq!(b.origin(1).gid, 3);
        assert_eq!(b.origin(1).nid, 1);
        assert_eq!(b.origin(2).gid, 4);
        assert_eq!(b.origin(2).dir, WrapDir::X0);
        assert!(b.ghost(0).is_none());
        assert_eq!(b.sent[0].gids().len(), 1);
    }

    #[test]
    fn bincode_round_trip() {
        let b = sample();
        let back = Block::from_bytes(&b.to_bytes().unwrap()).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn clear_ghosts_keeps_originals() {
        let mut b = sample();
        b.clear_ghosts();
        assert_eq!(b.num_particles(), 2);
        assert_eq!(b.num_ghosts(), 0);
        assert_eq!(b.sent.len(), 1);
    }
}
