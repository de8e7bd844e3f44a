//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices*. All handles are **waitable**;
//! the exchange code calls `.wait()` on every handle it creates before it
//! trusts a buffer or returns, including on error paths.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Message tag. Each exchange stage gets its own so rounds never mix.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(v: u16) -> Self {
        Self(v)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        Self(self.0.wrapping_add(k))
    }
}

/// The two tags used by one sizes-then-data exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExchangeTags {
    pub sizes: CommTag,
    pub data: CommTag,
}

impl ExchangeTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            data: base.offset(1),
        }
    }

    /// Round 1: particles.
    pub const PARTICLES: ExchangeTags = ExchangeTags::from_base(CommTag(0x7E10));
    /// Round 2: completion echoes.
    pub const COMPLETION: ExchangeTags = ExchangeTags::from_base(CommTag(0x7E20));
    /// Statistics gather/broadcast.
    pub const STATS: ExchangeTags = ExchangeTags::from_base(CommTag(0x7E30));
}

/// Non-blocking point-to-point communication between ranks.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive for the next message from `peer` with `tag`. The
    /// message arrives whole on `wait()`.
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;

    /// Block until every rank reaches the barrier.
    fn barrier(&self);
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator for serial runs; nothing ever leaves the process.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}
    fn barrier(&self) {}
}

// --- ThreadComm: one rank per thread inside a process ---
type Key = (usize, usize, u16); // (src, dst, tag)

struct World {
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    size: usize,
    /// (arrived, generation)
    gate: Mutex<(usize, u64)>,
    cv: Condvar,
}

/// In-process communicator: ranks are threads sharing a mailbox of FIFO
/// queues keyed by `(src, dst, tag)`.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    world: Arc<World>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.world.size)
            .finish()
    }
}

impl ThreadComm {
    /// Create a fresh world of `size` ranks; hand one to each thread.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let world = Arc::new(World {
            mailbox: DashMap::new(),
            size,
            gate: Mutex::new((0, 0)),
            cv: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                world: Arc::clone(&world),
            })
            .collect()
    }
}

/// Pending receive on a [`ThreadComm`].
pub struct ThreadRecv {
    world: Arc<World>,
    key: Key,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.world.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.world
            .mailbox
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> ThreadRecv {
        ThreadRecv {
            world: Arc::clone(&self.world),
            key: (peer, self.rank, tag),
        }
    }

    fn barrier(&self) {
        let mut gate = self.world.gate.lock();
        let generation = gate.1;
        gate.0 += 1;
        if gate.0 == self.world.size {
            gate.0 = 0;
            gate.1 += 1;
            self.world.cv.notify_all();
        } else {
            while gate.1 == generation {
                self.world.cv.wait(&mut gate);
            }
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::traits::*;
    use std::rc::Rc;

    pub struct MpiComm {
        universe: Rc<Universe>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI. Returns `None` if it was already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                universe: Rc::new(universe),
                rank,
                size,
            })
        }
    }

    /// Outstanding immediate send; owns the copied buffer until `wait`.
    pub struct MpiSend {
        finish: Option<Box<dyn FnOnce()>>,
    }

    impl Wait for MpiSend {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(finish) = self.finish.take() {
                finish();
            }
            None
        }
    }

    /// Blocking receive performed on `wait`.
    pub struct MpiRecv {
        universe: Rc<Universe>,
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let world = self.universe.world();
            let (data, _status) = world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
            let owned: &'static [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw = owned as *const [u8] as *mut [u8];
            let world = self.universe.world();
            let req = world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, owned, tag as i32);
            MpiSend {
                finish: Some(Box::new(move || {
                    req.wait();
                    // SAFETY: the request has completed, so MPI no longer
                    // reads the buffer leaked above.
                    unsafe { drop(Box::from_raw(raw)) };
                })),
            }
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecv {
            MpiRecv {
                universe: Rc::clone(&self.universe),
                peer: peer as i32,
                tag: tag as i32,
            }
        }

        fn barrier(&self) {
            self.universe.world().barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
