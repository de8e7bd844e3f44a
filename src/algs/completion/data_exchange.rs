//! Stage 2 of an exchange: ship the payload bytes announced in stage 1.

use crate::algs::communicator::{CommTag, Communicator, ExchangeTags, Wait};
use crate::algs::completion::size_exchange::exchange_sizes;
use crate::algs::wire::expect_exact_len;
use crate::tess_error::TessError;
use std::collections::{BTreeMap, BTreeSet};

/// Post one receive per entry of `sizes_in` and one send per payload, wait
/// for all of them and check each received length against its announced size.
pub fn exchange_data<C>(
    payloads: &BTreeMap<usize, Vec<u8>>,
    sizes_in: &BTreeMap<usize, usize>,
    comm: &C,
    tag: CommTag,
) -> Result<BTreeMap<usize, Vec<u8>>, TessError>
where
    C: Communicator,
{
    let pending_recvs: Vec<(usize, usize, C::RecvHandle)> = sizes_in
        .iter()
        .map(|(&nbr, &len)| (nbr, len, comm.irecv(nbr, tag.as_u16())))
        .collect();
    let pending_sends: Vec<C::SendHandle> = payloads
        .iter()
        .map(|(&nbr, bytes)| comm.isend(nbr, tag.as_u16(), bytes))
        .collect();

    let mut out = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, len, h) in pending_recvs {
        let res = h
            .wait()
            .ok_or_else(|| format!("failed to receive data from rank {nbr}"))
            .and_then(|data| expect_exact_len(data.len(), len).map(|_| data));
        match res {
            Ok(data) => {
                out.insert(nbr, data);
            }
            Err(msg) if maybe_err.is_none() => maybe_err = Some(TessError::comm(nbr, msg)),
            Err(_) => {}
        }
    }
    for send in pending_sends {
        let _ = send.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Sizes, then data: the full two-stage exchange.
pub fn exchange_bytes<C>(
    payloads: &BTreeMap<usize, Vec<u8>>,
    recv_from: &BTreeSet<usize>,
    comm: &C,
    tags: ExchangeTags,
) -> Result<BTreeMap<usize, Vec<u8>>, TessError>
where
    C: Communicator,
{
    let sizes = exchange_sizes(payloads, recv_from, comm, tags.sizes)?;
    exchange_data(payloads, &sizes, comm, tags.data)
}
