//! Residual evaluation for the V-cycle recursion (spec §4.4).
//!
//! `res = L(phi) - rho`, where `L` is the same `2D`-point discrete Laplacian
//! the smoothers relax against: `L(phi)[g] = sum of the 2D axis-aligned
//! neighbors of g - 2D * phi[g]`. Written once, generic over `D`, since the
//! stencil itself does not vary with spatial rank (unlike the smoothers,
//! whose coefficients are only specified for 2D/3D).

use rayon::prelude::*;

use crate::error::Result;
use crate::grid::Grid;
use crate::halo;
use crate::mpi_info::MpiInfo;

/// Computes `res = L(phi) - rho` on every interior node of `res`, then
/// synchronizes `res`'s ghost layers so a subsequent restriction can read
/// across subdomain boundaries.
pub fn residual<const D: usize>(
    phi: &Grid<D>,
    rho: &Grid<D>,
    res: &mut Grid<D>,
    info: &mut MpiInfo<D>,
) -> Result<()> {
    let updates: Vec<(usize, f64)> = phi
        .interior_indices()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|idx| {
            let mut sum = -2.0 * D as f64 * phi.get(0, idx);
            for d in 0..D {
                let mut plus = idx;
                plus[d] += 1;
                let mut minus = idx;
                minus[d] -= 1;
                sum += phi.get(0, plus) + phi.get(0, minus);
            }
            (res.offset(0, idx), sum - rho.get(0, idx))
        })
        .collect();
    for (offset, value) in updates {
        res.val_mut()[offset] = value;
    }
    halo::exchange_all(res, info)
}
