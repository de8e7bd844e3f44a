//! Block-addressed exchange on top of the rank-level byte exchange.
//!
//! Items are queued per (source block, destination block). Destinations on
//! this rank are delivered in memory; the rest are framed per destination
//! rank and shipped with [`exchange_bytes`]. The peer set is every rank that
//! hosts a neighbor of a local block, so both sides of a link always post
//! matching sends and receives, with empty messages when there is nothing
//! to say.

use crate::algs::communicator::{Communicator, ExchangeTags};
use crate::algs::completion::data_exchange::exchange_bytes;
use crate::algs::wire::{WIRE_VERSION, WireHdr, WireRecord, WireRoute, expect_exact_len, wire_u32};
use crate::tess_error::TessError;
use crate::topology::decomposition::{Decomposition, NeighborLink};
use crate::topology::periodic::WrapDir;
use bytemuck::{bytes_of, pod_read_unaligned};
use std::collections::BTreeMap;
use std::mem::size_of;

/// Items received per local destination gid, as `(source gid, item)`,
/// ordered by source gid and then by the order the source queued them.
pub type Inbox<W> = BTreeMap<usize, Vec<(usize, W)>>;

#[derive(Clone, Debug)]
pub struct NeighborExchange<W: WireRecord> {
    queued: Vec<(usize, usize, W)>,
}

impl<W: WireRecord> Default for NeighborExchange<W> {
    fn default() -> Self {
        Self { queued: Vec::new() }
    }
}

impl<W: WireRecord> NeighborExchange<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Queue `item` from block `src_gid` to every link in `links`. When a
    /// link crosses a periodic boundary, `transform` is applied to the copy
    /// sent over it.
    pub fn enqueue<'a, I>(
        &mut self,
        src_gid: usize,
        item: W,
        links: I,
        transform: Option<&dyn Fn(&W, WrapDir) -> W>,
    ) where
        I: IntoIterator<Item = &'a NeighborLink>,
    {
        for link in links {
            let out = match transform {
                Some(f) if !link.dir.is_none() => f(&item, link.dir),
                _ => item,
            };
            self.queued.push((src_gid, link.gid, out));
        }
    }

    /// Deliver everything queued. Collective: every rank must call it with
    /// the same `tags`.
    pub fn exchange_all<C>(
        self,
        decomp: &Decomposition,
        comm: &C,
        tags: ExchangeTags,
    ) -> Result<Inbox<W>, TessError>
    where
        C: Communicator,
    {
        let me = comm.rank();
        let peers = decomp.neighbor_ranks();

        let mut inbox: Inbox<W> = decomp
            .local_gids()
            .iter()
            .map(|&g| (g, Vec::new()))
            .collect();
        let mut outgoing: BTreeMap<usize, Vec<(WireRoute, W)>> =
            peers.iter().map(|&r| (r, Vec::new())).collect();

        for (src, dst, item) in self.queued {
            let rank = decomp.rank_of(dst)?;
            if rank == me {
                inbox.entry(dst).or_default().push((src, item));
            } else {
                outgoing
                    .get_mut(&rank)
                    .ok_or_else(|| {
                        TessError::comm(rank, format!("block {dst} is not on a neighbor rank"))
                    })?
                    .push((WireRoute::new(src, dst), item));
            }
        }

        let payloads: BTreeMap<usize, Vec<u8>> = outgoing
            .into_iter()
            .map(|(rank, frames)| Ok((rank, encode(rank, &frames)?)))
            .collect::<Result<_, TessError>>()?;
        let received = exchange_bytes(&payloads, &peers, comm, tags)?;

        for (peer, bytes) in received {
            for (route, item) in decode::<W>(peer, &bytes)? {
                let dst = route.dst_gid();
                let slot = inbox.get_mut(&dst).ok_or_else(|| TessError::MalformedMessage {
                    neighbor: peer,
                    reason: format!("frame addressed to block {dst}, which is not local"),
                })?;
                slot.push((route.src_gid(), item));
            }
        }
        for items in inbox.values_mut() {
            items.sort_by_key(|(src, _)| *src);
        }
        Ok(inbox)
    }
}

fn frame_size<W: WireRecord>() -> usize {
    size_of::<WireRoute>() + size_of::<W>()
}

fn encode<W: WireRecord>(peer: usize, frames: &[(WireRoute, W)]) -> Result<Vec<u8>, TessError> {
    let count = wire_u32(frames.len(), "frame count")
        .map_err(|reason| TessError::MalformedMessage { neighbor: peer, reason })?;
    let mut buf = Vec::with_capacity(size_of::<WireHdr>() + frames.len() * frame_size::<W>());
    buf.extend_from_slice(bytes_of(&WireHdr::new(W::KIND, count)));
    for (route, item) in frames {
        buf.extend_from_slice(bytes_of(route));
        buf.extend_from_slice(bytes_of(item));
    }
    Ok(buf)
}

fn decode<W: WireRecord>(peer: usize, bytes: &[u8]) -> Result<Vec<(WireRoute, W)>, TessError> {
    let hdr_len = size_of::<WireHdr>();
    if bytes.len() < hdr_len {
        return Err(TessError::MalformedMessage {
            neighbor: peer,
            reason: format!("message of {} bytes has no header", bytes.len()),
        });
    }
    let hdr: WireHdr = pod_read_unaligned(&bytes[..hdr_len]);
    if hdr.version() != WIRE_VERSION {
        return Err(TessError::WireVersion {
            neighbor: peer,
            expected: WIRE_VERSION,
            found: hdr.version(),
        });
    }
    if hdr.kind() != W::KIND {
        return Err(TessError::MalformedMessage {
            neighbor: peer,
            reason: format!("expected payload kind {}, got {}", W::KIND, hdr.kind()),
        });
    }
    let body = &bytes[hdr_len..];
    expect_exact_len(body.len(), hdr.count() * frame_size::<W>()).map_err(|reason| {
        TessError::MalformedMessage {
            neighbor: peer,
            reason,
        }
    })?;
    let route_len = size_of::<WireRoute>();
    Ok(body
        .chunks_exact(frame_size::<W>())
        .map(|frame| {
            (
                pod_read_unaligned(&frame[..route_len]),
                pod_read_unaligned(&frame[route_len..]),
            )
        })
        .collect())
}
