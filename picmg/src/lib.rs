#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! Domain-decomposed geometric multigrid Poisson solver and particle-in-cell
//! pusher/migrator: the numerical core of a distributed-memory PIC plasma
//! code, independent of configuration parsing, I/O and the top-level
//! time-integration driver.

pub mod error;
pub mod grid;
pub mod halo;
pub mod migrator;
pub mod mpi_info;
pub mod multigrid;
pub mod population;
pub mod pusher;
pub mod residual;
pub mod smoother;
pub mod transfer;
pub mod transport;

pub use error::{Error, Result};
