//! The two exchange rounds of a tessellation pass.
//!
//! Round 1 replicates particles to the neighbors planned in each block's
//! sent records, applying the periodic transform on wrapped links. Round 2
//! echoes the completeness of every replicated particle back to each block
//! that received it, so ghost vertices of cross-block tets can be judged.

use crate::algs::communicator::{Communicator, ExchangeTags};
use crate::algs::completion::neighbor_exchange::NeighborExchange;
use crate::algs::ownership::CompletionEchoes;
use crate::algs::wire::{WireCompletion, WireParticle, wire_u32};
use crate::data::block::{Block, GhostTag, SentParticle};
use crate::tess_error::TessError;
use crate::topology::decomposition::{Decomposition, NeighborLink};
use crate::topology::periodic::{WrapDir, transform_particle};

fn check_blocks(blocks: &[Block], decomp: &Decomposition) -> Result<(), TessError> {
    if blocks.len() != decomp.num_local() {
        return Err(TessError::BlockCountMismatch {
            expected: decomp.num_local(),
            found: blocks.len(),
        });
    }
    for (lid, b) in blocks.iter().enumerate() {
        if decomp.gid_of(lid)? != b.gid {
            return Err(TessError::UnknownBlock(b.gid));
        }
        wire_u32(b.num_orig, "particle count")
            .map_err(|reason| TessError::InvalidConfig(reason).in_block(b.gid))?;
    }
    Ok(())
}

fn stray_record(b: &Block, s: &SentParticle) -> TessError {
    TessError::InvalidConfig(format!(
        "sent record names particle {}, block has {} originals",
        s.particle, b.num_orig
    ))
    .in_block(b.gid)
}

/// Round 2 reads the flags of the classification that followed round 1;
/// a block without them cannot echo anything.
fn check_classified(blocks: &[Block]) -> Result<(), TessError> {
    for b in blocks {
        if b.flags.len() != b.num_orig {
            return Err(TessError::Unclassified {
                gid: b.gid,
                flags: b.flags.len(),
                num_orig: b.num_orig,
            });
        }
    }
    Ok(())
}

/// Round 1. Appends received particles to each block as ghosts, in source
/// gid order. Collective.
pub fn exchange_particles<C>(
    blocks: &mut [Block],
    decomp: &Decomposition,
    comm: &C,
    tags: ExchangeTags,
) -> Result<usize, TessError>
where
    C: Communicator,
{
    check_blocks(blocks, decomp)?;
    let domain = *decomp.domain();
    let shift = move |w: &WireParticle, wrap: WrapDir| {
        let (pos, dir) = transform_particle(w.pos(), w.dir(), wrap, &domain);
        WireParticle::new(pos, w.gid(), w.nid(), dir)
    };

    let mut ex = NeighborExchange::<WireParticle>::new();
    for b in blocks.iter() {
        for s in &b.sent {
            if !b.is_original(s.particle) {
                return Err(stray_record(b, s));
            }
            let item = WireParticle::new(b.site(s.particle), b.gid, s.particle, WrapDir::NONE);
            ex.enqueue(b.gid, item, &s.neighbors, Some(&shift));
        }
    }
    log::debug!("rank {}: sending {} particle copies", comm.rank(), ex.len());

    let mut inbox = ex.exchange_all(decomp, comm, tags)?;
    let mut received = 0;
    for b in blocks.iter_mut() {
        for (_, w) in inbox.remove(&b.gid).unwrap_or_default() {
            b.push_ghost(
                w.pos(),
                GhostTag {
                    gid: w.gid(),
                    nid: w.nid(),
                    dir: w.dir(),
                },
            );
            received += 1;
        }
    }
    Ok(received)
}

/// Round 2. Every sent particle reports its flag once to each distinct gid
/// it went to. Returns the echoes received per local block, in lid order.
/// Every block must be classified; the check runs before anything is sent.
/// Collective.
pub fn exchange_completion<C>(
    blocks: &[Block],
    decomp: &Decomposition,
    comm: &C,
    tags: ExchangeTags,
) -> Result<Vec<CompletionEchoes>, TessError>
where
    C: Communicator,
{
    check_blocks(blocks, decomp)?;
    check_classified(blocks)?;
    let mut ex = NeighborExchange::<WireCompletion>::new();
    for b in blocks {
        for s in &b.sent {
            let complete = b
                .flags
                .get(s.particle)
                .copied()
                .ok_or_else(|| stray_record(b, s))?;
            let item = WireCompletion::new(b.gid, s.particle, complete);
            let links: Vec<NeighborLink> = s
                .gids()
                .into_iter()
                .map(|g| NeighborLink::new(g, WrapDir::NONE))
                .collect();
            ex.enqueue(b.gid, item, &links, None);
        }
    }

    let inbox = ex.exchange_all(decomp, comm, tags)?;
    Ok(blocks
        .iter()
        .map(|b| {
            inbox
                .get(&b.gid)
                .map(|items| CompletionEchoes::from_records(items.iter().map(|(_, w)| w)))
                .unwrap_or_default()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::bounds::Aabb;

    fn two_blocks() -> (Decomposition, Vec<Block>) {
        let dom = Aabb::new([0.0; 3], [2.0, 1.0, 1.0]);
        let d = Decomposition::regular(dom, [2, 1, 1], 1, 0, false).unwrap();
        let blocks = (0..2)
            .map(|lid| {
                let bounds = d.block_bounds(lid).unwrap();
                let x = bounds.min[0] + 0.5;
                Block::new(lid, bounds, vec![[x, 0.5, 0.5], [x + 0.1, 0.5, 0.5]])
            })
            .collect();
        (d, blocks)
    }

    #[test]
    fn particles_arrive_as_tagged_ghosts() {
        let (d, mut blocks) = two_blocks();
        blocks[0].sent.push(SentParticle {
            particle: 1,
            neighbors: [NeighborLink::new(1, WrapDir::NONE)].into_iter().collect(),
        });
        let n = exchange_particles(&mut blocks, &d, &NoComm, ExchangeTags::PARTICLES).unwrap();
        assert_eq!(n, 1);
        assert_eq!(blocks[1].num_ghosts(), 1);
        assert_eq!(blocks[1].origin(2).gid, 0);
        assert_eq!(blocks[1].origin(2).nid, 1);
        assert_eq!(blocks[1].site(2), [0.6, 0.5, 0.5]);
        assert_eq!(blocks[0].num_ghosts(), 0);
    }

    #[test]
    fn periodic_self_send_is_shifted() {
        let d = Decomposition::regular(Aabb::unit(), [1, 1, 1], 1, 0, true).unwrap();
        let mut blocks = vec![Block::new(0, Aabb::unit(), vec![[0.1, 0.5, 0.5]])];
        blocks[0].sent.push(SentParticle {
            particle: 0,
            neighbors: [NeighborLink::new(0, WrapDir::X0)].into_iter().collect(),
        });
        exchange_particles(&mut blocks, &d, &NoComm, ExchangeTags::PARTICLES).unwrap();
        let g = blocks[0].origin(1);
        assert_eq!(g.dir, WrapDir::X0);
        assert!((blocks[0].site(1)[0] - 1.1).abs() < 1e-15);
    }

    #[test]
    fn one_echo_per_distinct_gid() {
        let d = Decomposition::regular(Aabb::unit(), [1, 1, 1], 1, 0, true).unwrap();
        let mut b = Block::new(0, Aabb::unit(), vec![[0.1, 0.1, 0.5]]);
        b.sent.push(SentParticle {
            particle: 0,
            neighbors: [
                NeighborLink::new(0, WrapDir::X0),
                NeighborLink::new(0, WrapDir::Y0),
                NeighborLink::new(0, WrapDir::X0 | WrapDir::Y0),
            ]
            .into_iter()
            .collect(),
        });
        b.flags = vec![true];
        let echoes = exchange_completion(&[b], &d, &NoComm, ExchangeTags::COMPLETION).unwrap();
        assert_eq!(echoes[0].len(), 1);
        assert_eq!(echoes[0].get(0, 0), Some(true));
    }

    #[test]
    fn unclassified_block_sends_no_echo() {
        let d = Decomposition::regular(Aabb::unit(), [1, 1, 1], 1, 0, true).unwrap();
        let mut b = Block::new(0, Aabb::unit(), vec![[0.1, 0.5, 0.5]]);
        b.sent.push(SentParticle {
            particle: 0,
            neighbors: [NeighborLink::new(0, WrapDir::X0)].into_iter().collect(),
        });
        let err = exchange_completion(&[b], &d, &NoComm, ExchangeTags::COMPLETION).unwrap_err();
        assert!(matches!(
            err,
            TessError::Unclassified { gid: 0, flags: 0, num_orig: 1 }
        ));
    }

    #[test]
    fn sent_record_past_the_originals_is_rejected() {
        let d = Decomposition::regular(Aabb::unit(), [1, 1, 1], 1, 0, true).unwrap();
        let mut b = Block::new(0, Aabb::unit(), vec![[0.1, 0.5, 0.5]]);
        b.flags = vec![true];
        b.sent.push(SentParticle {
            particle: 3,
            neighbors: [NeighborLink::new(0, WrapDir::X0)].into_iter().collect(),
        });
        let err = exchange_completion(&[b], &d, &NoComm, ExchangeTags::COMPLETION).unwrap_err();
        assert!(matches!(err, TessError::InBlock { gid: 0, .. }));
    }

    #[test]
    fn block_list_must_match_decomposition() {
        let (d, blocks) = two_blocks();
        let err = exchange_completion(&blocks[..1], &d, &NoComm, ExchangeTags::COMPLETION)
            .unwrap_err();
        assert!(matches!(err, TessError::BlockCountMismatch { expected: 2, found: 1 }));
    }
}
