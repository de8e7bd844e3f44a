//! Stage 1 of an exchange: tell each peer how many bytes follow.
//!
//! Every posted handle is drained before returning, even if an error occurs,
//! so a failed stage never leaves a message behind for the next one.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::WireCount;
use crate::tess_error::TessError;
use bytemuck::{bytes_of, pod_read_unaligned};
use std::collections::{BTreeMap, BTreeSet};

/// Send `payloads[peer].len()` to each peer in `payloads` and receive one
/// count from each rank in `recv_from`.
pub fn exchange_sizes<C>(
    payloads: &BTreeMap<usize, Vec<u8>>,
    recv_from: &BTreeSet<usize>,
    comm: &C,
    tag: CommTag,
) -> Result<BTreeMap<usize, usize>, TessError>
where
    C: Communicator,
{
    // 1) post all receives
    let pending_recvs: Vec<(usize, C::RecvHandle)> = recv_from
        .iter()
        .map(|&nbr| (nbr, comm.irecv(nbr, tag.as_u16())))
        .collect();

    // 2) post all sends
    let pending_sends: Vec<C::SendHandle> = payloads
        .iter()
        .map(|(&nbr, bytes)| {
            let count = WireCount::new(bytes.len());
            comm.isend(nbr, tag.as_u16(), bytes_of(&count))
        })
        .collect();

    // 3) wait for all recvs, collect counts (but do not early-return)
    let mut sizes_in = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, h) in pending_recvs {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                if maybe_err.is_none() {
                    let cnt: WireCount = pod_read_unaligned(&data);
                    sizes_in.insert(nbr, cnt.get());
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(TessError::comm(
                    nbr,
                    format!(
                        "expected {} bytes for size header, got {}",
                        std::mem::size_of::<WireCount>(),
                        data.len()
                    ),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(TessError::comm(
                    nbr,
                    format!("failed to receive size from rank {nbr}"),
                ));
            }
            _ => {} // already have an error; just drain
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}
