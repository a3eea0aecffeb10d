//! Jacobi and red-black Gauss-Seidel relaxations (spec §4.2).
//!
//! Both smoothers accept `(phi, rho, nCycles, mpiInfo)` and perform `nCycles`
//! relaxation sweeps, each followed by halo exchange on `phi` across every
//! spatial axis. Jacobi generalizes cleanly to any `D` (coefficient
//! `1/(2D)`, `-rho` sign); red-black Gauss-Seidel is only specified for 2D
//! and 3D, and its 3D coefficient (`0.125`) is preserved exactly as written
//! even though the mathematically consistent 6-point-stencil coefficient
//! would be `1/6` (spec §9 REDESIGN FLAGS, "do not guess intent").

use std::str::FromStr;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::halo;
use crate::mpi_info::MpiInfo;

/// Which relaxation a [`crate::multigrid::MultigridConfig`] selects for
/// pre-smoothing, post-smoothing or the coarse solve.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SmootherKind {
    /// Damped Jacobi, generalizes to any spatial rank.
    Jacobi,
    /// Red-black Gauss-Seidel, specified for 2D and 3D only.
    GaussSeidel,
}

impl FromStr for SmootherKind {
    type Err = Error;

    /// Parses the dictionary-style names used by `modules:preSmooth`,
    /// `modules:postSmooth` and `modules:coarseSolv` (spec §6).
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jacobian" => Ok(Self::Jacobi),
            "gaussSeidel" => Ok(Self::GaussSeidel),
            other => Err(Error::Config(format!("unknown smoother algorithm {other:?}"))),
        }
    }
}

/// Damped Jacobi relaxation: `phi'[g] = (1/(2D)) * (sum of 2D neighbors -
/// rho[g])`, written into a scratch buffer and copied back after the full
/// sweep, then one designated node is pinned to zero to fix the null space
/// of the discrete Laplacian (spec §4.2, §9 "periodic normalization node").
pub fn jacobi<const D: usize>(
    phi: &mut Grid<D>,
    rho: &Grid<D>,
    n_cycles: usize,
    info: &mut MpiInfo<D>,
    normalize_node: [usize; D],
) -> Result<()> {
    let coeff = 1.0 / (2.0 * D as f64);
    let interior: Vec<[usize; D]> = phi.interior_indices().collect();
    let mut scratch = vec![0.0; phi.len()];

    for _ in 0..n_cycles {
        // Every interior node's new value depends only on the previous
        // sweep's state, so the sweep is embarrassingly parallel across
        // nodes (spec §5: "implementations may add thread-parallel inner
        // loops without changing observable behavior").
        let updates: Vec<(usize, f64)> = interior
            .par_iter()
            .map(|&idx| {
                let mut sum = 0.0;
                for d in 0..D {
                    let mut plus = idx;
                    plus[d] += 1;
                    let mut minus = idx;
                    minus[d] -= 1;
                    sum += phi.get(0, plus) + phi.get(0, minus);
                }
                (phi.offset(0, idx), coeff * (sum - rho.get(0, idx)))
            })
            .collect();
        for (offset, value) in updates {
            scratch[offset] = value;
        }
        phi.val_mut().copy_from_slice(&scratch);
        phi.set(0, normalize_node, 0.0);
        halo::exchange_all(phi, info)?;
    }

    Ok(())
}

/// One color's worth of a red-black sweep: updates every interior node whose
/// summed index parity equals `parity` using `phi[g] = coeff * (sum of
/// neighbors + rho[g])`. Neighbors of the opposite parity are untouched this
/// pass, so iteration order within a color does not affect the result.
fn relax_parity<const D: usize>(phi: &mut Grid<D>, rho: &Grid<D>, coeff: f64, parity: usize) {
    // Same-color nodes never neighbor each other on a checkerboard, so no
    // two updates in this pass read a value another update in this pass
    // writes; the per-node reads/compute can run in parallel and only the
    // final write-back is sequential.
    let updates: Vec<(usize, f64)> = phi
        .interior_indices()
        .filter(|idx| idx.iter().sum::<usize>() % 2 == parity)
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|idx| {
            let mut sum = 0.0;
            for d in 0..D {
                let mut plus = idx;
                plus[d] += 1;
                let mut minus = idx;
                minus[d] -= 1;
                sum += phi.get(0, plus) + phi.get(0, minus);
            }
            (phi.offset(0, idx), coeff * (sum + rho.get(0, idx)))
        })
        .collect();
    for (offset, value) in updates {
        phi.val_mut()[offset] = value;
    }
}

/// Shared red-black driver: `nCycles` sweeps of (red, halo exchange, black,
/// halo exchange), matching the sweep order of §4.2 regardless of rank.
fn red_black<const D: usize>(
    phi: &mut Grid<D>,
    rho: &Grid<D>,
    n_cycles: usize,
    info: &mut MpiInfo<D>,
    coeff: f64,
) -> Result<()> {
    for _ in 0..n_cycles {
        relax_parity(phi, rho, coeff, 0);
        halo::exchange_all(phi, info)?;
        relax_parity(phi, rho, coeff, 1);
        halo::exchange_all(phi, info)?;
    }
    Ok(())
}

/// Red-black Gauss-Seidel in 2D: `phi[g] = 0.25 * (sum of 4 neighbors +
/// rho[g])`.
pub fn gauss_seidel_2d(
    phi: &mut Grid<2>,
    rho: &Grid<2>,
    n_cycles: usize,
    info: &mut MpiInfo<2>,
) -> Result<()> {
    red_black(phi, rho, n_cycles, info, 0.25)
}

/// Red-black Gauss-Seidel in 3D: `phi[g] = 0.125 * (sum of 6 neighbors +
/// rho[g])`. The mathematically consistent coefficient for a 6-point 3D
/// Laplacian is `1/6`; `0.125` is preserved as specified (spec §9).
pub fn gauss_seidel_3d(
    phi: &mut Grid<3>,
    rho: &Grid<3>,
    n_cycles: usize,
    info: &mut MpiInfo<3>,
) -> Result<()> {
    red_black(phi, rho, n_cycles, info, 0.125)
}
