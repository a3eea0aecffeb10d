//! Trilinear field interpolation and the particle move/accelerate/
//! distribute operations (spec §4.6).
//!
//! All three dimension-specific operations here (`accelerate`, `distribute`,
//! `interpolate_e`) are first-order-trilinear and three-dimensional, as
//! specified; `mov` and `periodic_boundary` are dimension-generic.

use itertools::iproduct;

use crate::grid::Grid;
use crate::population::Population;

fn node_and_frac<const D: usize>(grid: &Grid<D>, pos: [f64; D]) -> ([usize; D], [f64; D]) {
    let ghost_lo = grid.ghost_lo();
    let mut idx = [0usize; D];
    let mut frac = [0.0; D];
    for d in 0..D {
        let j = pos[d].floor();
        frac[d] = pos[d] - j;
        idx[d] = ghost_lo[d] + j as usize;
    }
    (idx, frac)
}

fn linear_weight(frac: f64, corner: usize) -> f64 {
    if corner == 0 {
        1.0 - frac
    } else {
        frac
    }
}

/// Trilinearly interpolates the 3-component field `e` at `pos` (interior-
/// local coordinates). Node offset and corner-weight conventions match
/// spec §4.6: the eight corners of the cube `{j,j+1}×{k,k+1}×{l,l+1}`
/// weighted by the tensor product `(1-f)·f` per axis.
#[must_use]
pub fn interpolate_e(e: &Grid<3>, pos: [f64; 3]) -> [f64; 3] {
    let (idx, f) = node_and_frac(e, pos);
    let mut result = [0.0; 3];
    for (dz, dy, dx) in iproduct!(0..2, 0..2, 0..2) {
        let w = linear_weight(f[0], dx) * linear_weight(f[1], dy) * linear_weight(f[2], dz);
        let node = [idx[0] + dx, idx[1] + dy, idx[2] + dz];
        for (c, acc) in result.iter_mut().enumerate() {
            *acc += w * e.get(c, node);
        }
    }
    result
}

/// Advances every live particle's position by its velocity.
pub fn mov<const D: usize>(pop: &mut Population<D>) {
    pop.mov();
}

/// Single-rank periodic wrap: each coordinate wraps by one interior extent
/// (`Grid::true_size`). Particle positions are interior-local throughout
/// this module (`node_and_frac` adds `ghost_lo` to them, and the Migrator
/// classifies/rebases against `true_size`), so the wrap extent has to match
/// rather than the original's ghost-inclusive scalar routine. Multi-rank
/// wrap-around is handled by the Migrator (spec §4.9) instead.
pub fn periodic_boundary<const D: usize>(grid: &Grid<D>, pop: &mut Population<D>) {
    let true_size = grid.true_size();
    for s in 0..pop.n_species() {
        for i in pop.range(s) {
            let mut p = pop.pos(i);
            for d in 0..D {
                let total = true_size[d] as f64;
                if p[d] >= total {
                    p[d] -= total;
                }
                if p[d] < 0.0 {
                    p[d] += total;
                }
            }
            pop.set_pos(i, p);
        }
    }
}

/// Interpolates `e` at each particle's position and adds
/// `renorm_e[s] · E(pos)` to its velocity, species by species.
///
/// The original applies `renorm_e[s]` by rescaling the whole `E` grid in
/// place after each species' sweep, relying on species being processed in
/// order. This implementation instead scales the interpolated sample
/// per-particle, which the spec explicitly allows ("the observable update
/// rule per particle must match `v ← v + renormE[s] · E(pos)`") and avoids
/// mutating a field shared across species.
pub fn accelerate(e: &Grid<3>, pop: &mut Population<3>) {
    for s in 0..pop.n_species() {
        let renorm = pop.renorm_e[s];
        for i in pop.range(s) {
            let field = interpolate_e(e, pop.pos(i));
            let mut v = pop.vel(i);
            for d in 0..3 {
                v[d] += renorm * field[d];
            }
            pop.set_vel(i, v);
        }
    }
}

/// Deposits every species' particles onto `rho` via trilinear weights
/// (which sum to 1 per particle), then rescales the accumulated buffer by
/// `renorm_rho[s]` before moving to the next species — preserved exactly
/// as specified, including the fact that a later species' rescale also
/// applies to earlier species' already-deposited charge.
pub fn distribute(rho: &mut Grid<3>, pop: &Population<3>) {
    rho.zero();
    for s in 0..pop.n_species() {
        for i in pop.range(s) {
            deposit_one(rho, pop.pos(i));
        }
        let factor = pop.renorm_rho[s];
        for v in rho.val_mut() {
            *v *= factor;
        }
    }
}

fn deposit_one(rho: &mut Grid<3>, pos: [f64; 3]) {
    let (idx, f) = node_and_frac(rho, pos);
    for (dz, dy, dx) in iproduct!(0..2, 0..2, 0..2) {
        let w = linear_weight(f[0], dx) * linear_weight(f[1], dy) * linear_weight(f[2], dz);
        let node = [idx[0] + dx, idx[1] + dy, idx[2] + dz];
        let o = rho.offset(0, node);
        rho.val_mut()[o] += w;
    }
}
