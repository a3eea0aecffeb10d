//! Message-passing abstraction over non-blocking point-to-point send/receive
//! with integer tags and source wildcards (spec §6 "Transport").
//!
//! Two implementations exist: [`mpi_backend::MpiTransport`], which talks to
//! a real MPI runtime via the `mpi` crate, and [`local::LocalTransport`], an
//! in-process mailbox that lets this crate's own test suite exercise halo
//! exchange and migration across several simulated ranks without `mpiexec`.
//! Both are wired into [`TransportKind`] via `enum_dispatch`, the same
//! tagged-variant dispatch this crate uses for subgrid-style strategy
//! selection elsewhere.

use enum_dispatch::enum_dispatch;

use crate::error::Result;

pub mod local;
#[cfg(feature = "mpi-transport")]
pub mod mpi_backend;

/// A pending, not-yet-confirmed send.
#[derive(Debug)]
pub struct SendToken {
    pub(crate) dest: i32,
    pub(crate) tag: i32,
}

/// A pending, not-yet-confirmed receive.
#[derive(Debug)]
pub struct RecvToken {
    pub(crate) source: Option<i32>,
    pub(crate) tag: Option<i32>,
}

/// The outcome of a completed receive: the peer that actually sent it (only
/// interesting when the receive used a source or tag wildcard), the tag it
/// carried, and its payload.
#[derive(Debug)]
pub struct RecvResult {
    /// Rank of the process the message actually came from.
    pub source: i32,
    /// Tag the message was sent with.
    pub tag: i32,
    /// Message payload.
    pub data: Vec<f64>,
}

/// Non-blocking point-to-point transport over a Cartesian rank topology.
#[enum_dispatch]
pub trait Transport {
    /// This process's rank.
    fn self_rank(&self) -> i32;

    /// Total number of ranks in the world.
    fn world_size(&self) -> i32;

    /// Posts a non-blocking send of `data` to `dest`, tagged `tag`.
    fn isend(&mut self, dest: i32, tag: i32, data: &[f64]) -> SendToken;

    /// Posts a non-blocking receive. `source`/`tag` of `None` mean "any
    /// source"/"any tag" (the wildcard receive used in migration phase C).
    fn irecv(&mut self, source: Option<i32>, tag: Option<i32>) -> RecvToken;

    /// Blocks until the send represented by `token` has completed.
    fn wait_send(&mut self, token: SendToken) -> Result<()>;

    /// Blocks until the receive represented by `token` has completed, and
    /// returns its payload.
    fn wait_recv(&mut self, token: RecvToken) -> Result<RecvResult>;
}

/// Tagged-variant dispatch over the concrete transport backends.
#[enum_dispatch(Transport)]
pub enum TransportKind {
    /// Production backend: a real MPI runtime via the `mpi` crate.
    #[cfg(feature = "mpi-transport")]
    Mpi(mpi_backend::MpiTransport),
    /// In-process mailbox used by tests.
    Local(local::LocalTransport),
}
