//! Production [`Transport`] backed by a real MPI runtime via the `mpi`
//! crate (rsmpi).
//!
//! `isend` uses MPI's *buffered* send mode (`MPI_Bsend`, rsmpi's
//! `buffered_send_with_tag`) rather than the standard mode's
//! `send_with_tag`. A standard send is permitted to rendezvous with a
//! matching receive before it returns; every call site in this crate posts
//! every neighbor's `isend` before posting any `irecv` (halo exchange) or
//! posts a full round of sends before draining receives (migration phase
//! C), so a standard send that blocks on rendezvous deadlocks symmetric
//! peers that are all still in their own send loop. A buffered send instead
//! copies into the attached buffer (see [`MpiTransport::new`]) and returns
//! immediately, with no dependency on the receiver's progress — exactly the
//! "post now, confirm later" interface [`Transport`] promises. `wait_send`
//! is still a no-op: a buffered send has already completed locally by the
//! time `isend` returns. `irecv` stays deferred to `wait_recv`, which is
//! safe precisely because the matching send is never blocked behind it.

#![cfg(feature = "mpi-transport")]

use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::{RecvResult, RecvToken, SendToken, Transport};
use crate::error::Result;

/// Wraps `MPI_COMM_WORLD`.
pub struct MpiTransport {
    world: SimpleCommunicator,
}

impl MpiTransport {
    /// Wraps `world` and attaches a `buffer_bytes`-sized buffer to `universe`
    /// for buffered sends.
    ///
    /// MPI must hold every buffered send's payload until its matching
    /// receive has drained it, and this crate posts a whole round of sends
    /// before any receive — up to `neighborhood_size() - 1` outstanding
    /// sends at once in migration phase C. `buffer_bytes` must therefore
    /// cover the *sum* of all messages that can be simultaneously
    /// outstanding (each message's payload plus MPI's per-message overhead,
    /// `mpi_sys::MPI_BSEND_OVERHEAD`), not just the largest single message.
    /// Per MPI semantics the attached buffer is process-global and lives
    /// until `universe` detaches it or exits, so only one `MpiTransport` per
    /// rank should attach one.
    #[must_use]
    pub fn new(world: SimpleCommunicator, universe: &Universe, buffer_bytes: usize) -> Self {
        universe.buffer_attach(vec![0u8; buffer_bytes]);
        Self { world }
    }
}

impl Transport for MpiTransport {
    fn self_rank(&self) -> i32 {
        self.world.rank()
    }

    fn world_size(&self) -> i32 {
        self.world.size()
    }

    fn isend(&mut self, dest: i32, tag: i32, data: &[f64]) -> SendToken {
        self.world
            .process_at_rank(dest)
            .buffered_send_with_tag(data, tag);
        SendToken { dest, tag }
    }

    fn irecv(&mut self, source: Option<i32>, tag: Option<i32>) -> RecvToken {
        RecvToken { source, tag }
    }

    fn wait_send(&mut self, _token: SendToken) -> Result<()> {
        Ok(())
    }

    fn wait_recv(&mut self, token: RecvToken) -> Result<RecvResult> {
        let (data, status) = match (token.source, token.tag) {
            (Some(source), Some(tag)) => self
                .world
                .process_at_rank(source)
                .receive_vec_with_tag::<f64>(tag),
            (Some(source), None) => self.world.process_at_rank(source).receive_vec::<f64>(),
            (None, Some(tag)) => self.world.any_process().receive_vec_with_tag::<f64>(tag),
            (None, None) => self.world.any_process().receive_vec::<f64>(),
        };

        Ok(RecvResult {
            source: status.source_rank(),
            tag: status.tag(),
            data,
        })
    }
}
