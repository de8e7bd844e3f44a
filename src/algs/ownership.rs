//! Tetrahedron ownership across blocks.
//!
//! Every Delaunay tet touching this block's originals is kept by exactly one
//! block: the smallest gid among its four vertices' owners. Inside the
//! owning block, a tet seen several times through periodic images is kept
//! in the one frame where its smallest `(gid, nid)` vertex is an original
//! particle. Without wrap that vertex is always original in the owner, so
//! the rule reduces to the plain minimum-gid test.

use crate::algs::wire::WireCompletion;
use crate::data::block::Block;
use crate::data::output::RemoteTetVertex;
use crate::tess_error::TessError;
use hashbrown::HashMap;

/// Round 2 echoes received by one block, keyed by `(gid, nid)`.
#[derive(Clone, Debug, Default)]
pub struct CompletionEchoes {
    map: HashMap<(usize, usize), bool>,
}

impl CompletionEchoes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a WireCompletion>,
    {
        let mut echoes = Self::new();
        for r in records {
            echoes.insert(r.gid(), r.nid(), r.is_complete());
        }
        echoes
    }

    pub fn insert(&mut self, gid: usize, nid: usize, complete: bool) {
        self.map.insert((gid, nid), complete);
    }

    pub fn get(&self, gid: usize, nid: usize) -> Option<bool> {
        self.map.get(&(gid, nid)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Tets kept by one block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OwnedTets {
    /// All four vertices are originals of this block.
    pub local: Vec<[usize; 4]>,
    pub remote: Vec<[RemoteTetVertex; 4]>,
}

/// Owner of a tet whose vertices belong to `gids`.
#[inline]
pub fn owning_gid(gids: [usize; 4]) -> usize {
    let mut sorted = gids;
    sorted.sort_unstable();
    sorted[0]
}

/// Keep the tets this block owns and whose four cells are all complete.
///
/// `flags` are this block's completeness flags for its originals; ghost
/// vertices are looked up in `echoes`. A ghost in an owned tet without an
/// echo means the exchange lost a message and aborts the pass.
pub fn resolve(
    tets: &[[usize; 4]],
    block: &Block,
    flags: &[bool],
    echoes: &CompletionEchoes,
) -> Result<OwnedTets, TessError> {
    if flags.len() != block.num_orig {
        return Err(TessError::Unclassified {
            gid: block.gid,
            flags: flags.len(),
            num_orig: block.num_orig,
        });
    }
    let mut owned = OwnedTets::default();
    for tet in tets {
        let n_local = tet.iter().filter(|&&v| block.is_original(v)).count();
        match n_local {
            0 => continue,
            4 => {
                if tet.iter().all(|&v| flags[v]) {
                    owned.local.push(*tet);
                }
            }
            _ => {
                let origin = tet.map(|v| block.origin(v));
                if owning_gid(origin.map(|o| o.gid)) != block.gid {
                    continue;
                }
                let anchor = (0..4)
                    .min_by_key(|&k| (origin[k].gid, origin[k].nid))
                    .unwrap_or(0);
                if !block.is_original(tet[anchor]) {
                    continue;
                }
                let mut complete = true;
                for (k, &v) in tet.iter().enumerate() {
                    let ok = if block.is_original(v) {
                        flags[v]
                    } else {
                        echoes.get(origin[k].gid, origin[k].nid).ok_or(
                            TessError::MissingCompletionEcho {
                                gid: origin[k].gid,
                                nid: origin[k].nid,
                            },
                        )?
                    };
                    complete &= ok;
                }
                if complete {
                    owned.remote.push(origin.map(|o| RemoteTetVertex {
                        gid: o.gid,
                        nid: o.nid,
                        dir: o.dir,
                    }));
                }
            }
        }
    }
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::block::GhostTag;
    use crate::topology::bounds::Aabb;
    use crate::topology::periodic::WrapDir;

    fn block_with_ghosts(gid: usize, ghost_gids: &[usize]) -> Block {
        let mut b = Block::new(gid, Aabb::unit(), vec![[0.0; 3]; 2]);
        for (k, &g) in ghost_gids.iter().enumerate() {
            b.push_ghost(
                [1.0; 3],
                GhostTag {
                    gid: g,
                    nid: k,
                    dir: WrapDir::NONE,
                },
            );
        }
        b
    }

    #[test]
    fn minimum_gid_owns() {
        assert_eq!(owning_gid([3, 1, 4, 1]), 1);
        assert_eq!(owning_gid([7, 7, 7, 7]), 7);
    }

    #[test]
    fn only_block_one_stores_the_3_1_4_1_tet() {
        // Block 1 sees the tet as (own, own, ghost from 3, ghost from 4).
        let b1 = block_with_ghosts(1, &[3, 4]);
        let mut echoes = CompletionEchoes::new();
        echoes.insert(3, 0, true);
        echoes.insert(4, 1, true);
        let owned = resolve(&[[0, 1, 2, 3]], &b1, &[true, true], &echoes).unwrap();
        assert_eq!(owned.remote.len(), 1);
        assert_eq!(owned.remote[0][2].gid, 3);

        // Block 3 and block 4 see it with two ghosts from block 1 and do not store it.
        for (gid, other) in [(3, 4), (4, 3)] {
            let b = block_with_ghosts(gid, &[1, 1, other]);
            let owned = resolve(&[[0, 2, 3, 4]], &b, &[true, true], &CompletionEchoes::new())
                .unwrap();
            assert!(owned.remote.is_empty());
        }
    }

    #[test]
    fn incomplete_echo_discards_owned_tet() {
        let b = block_with_ghosts(0, &[5, 5]);
        let mut echoes = CompletionEchoes::new();
        echoes.insert(5, 0, true);
        echoes.insert(5, 1, false);
        let owned = resolve(&[[0, 1, 2, 3]], &b, &[true, true], &echoes).unwrap();
        assert!(owned.remote.is_empty());
    }

    #[test]
    fn missing_echo_is_a_protocol_violation() {
        let b = block_with_ghosts(0, &[5]);
        let err = resolve(&[[0, 1, 2, 0]], &b, &[true, true], &CompletionEchoes::new())
            .unwrap_err();
        assert!(matches!(err, TessError::MissingCompletionEcho { gid: 5, nid: 0 }));
    }

    #[test]
    fn unclassified_block_is_an_error() {
        let b = Block::new(6, Aabb::unit(), vec![[0.0; 3]; 4]);
        assert!(b.flags.is_empty());
        let err = resolve(&[[0, 1, 2, 3]], &b, &b.flags, &CompletionEchoes::new()).unwrap_err();
        assert!(matches!(
            err,
            TessError::Unclassified { gid: 6, flags: 0, num_orig: 4 }
        ));
        let err = resolve(&[], &b, &[true; 3], &CompletionEchoes::new()).unwrap_err();
        assert!(matches!(err, TessError::Unclassified { flags: 3, .. }));
    }

    #[test]
    fn local_and_remote_only_tets() {
        let mut b = Block::new(2, Aabb::unit(), vec![[0.0; 3]; 4]);
        b.push_ghost([1.0; 3], GhostTag { gid: 9, nid: 0, dir: WrapDir::NONE });
        let owned = resolve(
            &[[0, 1, 2, 3], [4, 4, 4, 4]],
            &b,
            &[true, true, true, true],
            &CompletionEchoes::new(),
        )
        .unwrap();
        assert_eq!(owned.local, vec![[0, 1, 2, 3]]);
        assert!(owned.remote.is_empty());

        let owned = resolve(&[[0, 1, 2, 3]], &b, &[true, false, true, true], &CompletionEchoes::new())
            .unwrap();
        assert!(owned.local.is_empty());
    }

    #[test]
    fn periodic_image_frame_is_skipped() {
        // Single block 0: originals 0 and 1, ghost 2 is an image of original 0.
        let mut b = Block::new(0, Aabb::unit(), vec![[0.0; 3]; 2]);
        b.push_ghost([1.0, 0.0, 0.0], GhostTag { gid: 0, nid: 0, dir: WrapDir::X0 });
        b.push_ghost([1.0, 1.0, 0.0], GhostTag { gid: 0, nid: 1, dir: WrapDir::X0 });
        let mut echoes = CompletionEchoes::new();
        echoes.insert(0, 0, true);
        echoes.insert(0, 1, true);
        // (1, 2, 3, 1) shape: anchor (0, 0) appears only as ghost 2 here.
        let image_frame = resolve(&[[1, 2, 3, 1]], &b, &[true, true], &echoes).unwrap();
        assert!(image_frame.remote.is_empty());
        // anchor present as original 0.
        let canonical = resolve(&[[0, 1, 3, 1]], &b, &[true, true], &echoes).unwrap();
        assert_eq!(canonical.remote.len(), 1);
    }
}
