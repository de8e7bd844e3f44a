use serial_test::serial;
use std::collections::{BTreeMap, BTreeSet};
use tess_sieve::algs::communicator::{CommTag, Communicator, ExchangeTags, ThreadComm, Wait};
use tess_sieve::algs::completion::data_exchange::exchange_bytes;

#[test]
fn thread_fifo_order() {
    let tag = CommTag(0x1001);
    let world = ThreadComm::world(2);

    for i in 0..10u8 {
        world[0].isend(1, tag.as_u16(), &[i]);
    }
    let mut out = Vec::new();
    for _ in 0..10 {
        let h = world[1].irecv(0, tag.as_u16());
        out.push(h.wait().unwrap()[0]);
    }
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn tags_keep_streams_apart() {
    let world = ThreadComm::world(2);
    world[0].isend(1, 5, b"five");
    world[0].isend(1, 6, b"six");
    assert_eq!(world[1].irecv(0, 6).wait().unwrap(), b"six");
    assert_eq!(world[1].irecv(0, 5).wait().unwrap(), b"five");
}

#[test]
#[serial]
fn barrier_releases_every_rank() {
    let handles: Vec<_> = ThreadComm::world(4)
        .into_iter()
        .map(|c| {
            std::thread::spawn(move || {
                for _ in 0..3 {
                    c.barrier();
                }
                c.rank()
            })
        })
        .collect();
    let mut ranks: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![0, 1, 2, 3]);
}

#[test]
#[serial]
fn ring_exchange_with_empty_payloads() {
    let n = 3;
    let tags = ExchangeTags::from_base(CommTag::new(0x2200));
    let handles: Vec<_> = ThreadComm::world(n)
        .into_iter()
        .map(|c| {
            std::thread::spawn(move || {
                let me = c.rank();
                let next = (me + 1) % n;
                let prev = (me + n - 1) % n;
                let mut payloads = BTreeMap::new();
                // rank 0 has nothing to say but still announces it
                let body = if me == 0 { Vec::new() } else { vec![me as u8; me * 4] };
                payloads.insert(next, body);
                let from: BTreeSet<usize> = [prev].into_iter().collect();
                (me, exchange_bytes(&payloads, &from, &c, tags).unwrap())
            })
        })
        .collect();
    for h in handles {
        let (me, got) = h.join().unwrap();
        let prev = (me + n - 1) % n;
        let want = if prev == 0 { Vec::new() } else { vec![prev as u8; prev * 4] };
        assert_eq!(got[&prev], want);
    }
}
