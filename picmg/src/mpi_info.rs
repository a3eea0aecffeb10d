//! Cartesian decomposition descriptor and neighbor index algebra (spec
//! §4.8 / §3 `MpiInfo`).
//!
//! A neighbor offset `(Δ₀,…,Δ_{D−1})`, `Δ_d ∈ {−1,0,+1}`, is linearized as a
//! single integer `n = Σ_d (Δ_d + 1)·3^d` ("base-3 digits", axis 0 least
//! significant). `n == center()` denotes "self". This module is the single
//! place that encodes/decodes that linearization; halo exchange and the
//! migrator both build on it rather than repeating the arithmetic.

use crate::transport::TransportKind;

/// Cartesian rank topology plus neighbor-index bookkeeping for a
/// `D`-dimensional domain decomposition.
pub struct MpiInfo<const D: usize> {
    subdomain: [usize; D],
    n_subdomains: [usize; D],
    n_subdomains_prod: [usize; D],
    /// Lower migration threshold per axis, in subdomain-local coordinates.
    pub lower_thresholds: [f64; D],
    /// Upper migration threshold per axis, in subdomain-local coordinates.
    pub upper_thresholds: [f64; D],
    transport: TransportKind,
}

impl<const D: usize> MpiInfo<D> {
    /// Builds a decomposition descriptor for the process owning
    /// `subdomain` within a `n_subdomains`-shaped Cartesian grid of
    /// processes.
    #[must_use]
    pub fn new(
        subdomain: [usize; D],
        n_subdomains: [usize; D],
        lower_thresholds: [f64; D],
        upper_thresholds: [f64; D],
        transport: TransportKind,
    ) -> Self {
        let mut n_subdomains_prod = [1usize; D];
        for d in 1..D {
            n_subdomains_prod[d] = n_subdomains_prod[d - 1] * n_subdomains[d - 1];
        }
        Self {
            subdomain,
            n_subdomains,
            n_subdomains_prod,
            lower_thresholds,
            upper_thresholds,
            transport,
        }
    }

    /// Number of spatial axes.
    #[must_use]
    pub fn n_dims(&self) -> usize {
        D
    }

    /// This process's coordinate in the Cartesian process grid.
    #[must_use]
    pub fn subdomain(&self) -> [usize; D] {
        self.subdomain
    }

    /// Shape of the Cartesian process grid.
    #[must_use]
    pub fn n_subdomains(&self) -> [usize; D] {
        self.n_subdomains
    }

    /// Size of the neighborhood, `3^D`.
    #[must_use]
    pub fn neighborhood_size(&self) -> usize {
        3usize.pow(D as u32)
    }

    /// The neighbor index denoting "self", `(3^D − 1) / 2`.
    #[must_use]
    pub fn center(&self) -> usize {
        (self.neighborhood_size() - 1) / 2
    }

    /// Access to the transport this descriptor communicates over.
    pub fn transport(&mut self) -> &mut TransportKind {
        &mut self.transport
    }

    /// Linearizes a per-axis delta (`-1`, `0` or `+1`) into a neighbor
    /// index.
    #[must_use]
    pub fn neighbor_index(&self, delta: [i32; D]) -> usize {
        let mut n = 0usize;
        for d in (0..D).rev() {
            let digit = (delta[d] + 1) as usize;
            debug_assert!(digit < 3, "delta[{d}] out of {{-1,0,1}} range");
            n = n * 3 + digit;
        }
        n
    }

    /// Inverse of [`MpiInfo::neighbor_index`]: recovers the per-axis delta
    /// encoded in neighbor index `n`.
    #[must_use]
    pub fn neighbor_delta(&self, n: usize) -> [i32; D] {
        let mut delta = [0i32; D];
        let mut pow = 1usize;
        for item in &mut delta {
            *item = ((n / pow) % 3) as i32 - 1;
            pow *= 3;
        }
        delta
    }

    /// The tag a peer uses for the symmetric direction of neighbor index
    /// `n` (mapping every `Δ_d → −Δ_d`).
    #[must_use]
    pub fn reciprocal(&self, n: usize) -> usize {
        let mut reciprocal = 0usize;
        let mut pow = 1usize;
        for _ in 0..D {
            let digit = (n / pow) % 3;
            reciprocal += (2 - digit) * pow;
            pow *= 3;
        }
        reciprocal
    }

    /// The rank of the peer addressed by neighbor index `n`.
    #[must_use]
    pub fn neighbor_to_rank(&self, n: usize) -> i32 {
        let delta = self.neighbor_delta(n);
        let mut rank = 0i64;
        for d in 0..D {
            let nd = self.n_subdomains[d] as i64;
            let peer = (self.subdomain[d] as i64 + i64::from(delta[d]) + nd) % nd;
            rank += peer * self.n_subdomains_prod[d] as i64;
        }
        rank as i32
    }

    /// The neighbor index by which this process's own neighbor-of-`rank`
    /// computation would see `rank`, assuming `rank` lies within this
    /// process's immediate 3^D neighborhood.
    #[must_use]
    pub fn rank_to_neighbor(&self, rank: i32) -> usize {
        let mut remaining = rank;
        let mut n = 0usize;
        let mut pow = 1usize;
        for d in 0..D {
            let nd = self.n_subdomains[d] as i32;
            let coord = remaining.rem_euclid(nd);
            remaining = remaining.div_euclid(nd);
            let digit = (coord - self.subdomain[d] as i32 + 1 + nd).rem_euclid(nd) as usize;
            n += digit * pow;
            pow *= 3;
        }
        n
    }

    /// The rank of the neighbor directly along `axis` in direction `sign`
    /// (`-1` or `+1`); a convenience wrapper around
    /// [`MpiInfo::neighbor_index`]/[`MpiInfo::neighbor_to_rank`] used by
    /// halo exchange, which only ever talks to axis-aligned neighbors.
    #[must_use]
    pub fn axis_neighbor_rank(&self, axis: usize, sign: i32) -> i32 {
        let mut delta = [0i32; D];
        delta[axis] = sign;
        self.neighbor_to_rank(self.neighbor_index(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::local::{LocalNetwork, LocalTransport};

    fn info<const D: usize>(subdomain: [usize; D], n_subdomains: [usize; D]) -> MpiInfo<D> {
        let net = LocalNetwork::new(1);
        let transport = LocalTransport::new(0, &net).into();
        MpiInfo::new(
            subdomain,
            n_subdomains,
            [0.0; D],
            [0.0; D],
            transport,
        )
    }

    #[test]
    fn center_is_self_in_every_dimension() {
        let m2 = info([1, 1], [3, 3]);
        assert_eq!(m2.center(), 4);
        assert_eq!(m2.neighbor_index([0, 0]), m2.center());

        let m3 = info([1, 1, 1], [3, 3, 3]);
        assert_eq!(m3.center(), 13);
        assert_eq!(m3.neighbor_index([0, 0, 0]), m3.center());
    }

    #[test]
    fn neighbor_index_matches_horner_definition() {
        let m = info([1, 1, 1], [3, 3, 3]);
        // n = 13 + dx + 3*dy + 9*dz per the spec's explicit 3D formula.
        assert_eq!(m.neighbor_index([1, 1, 0]), 13 + 1 + 3);
        assert_eq!(m.neighbor_index([-1, 0, 1]), 13 - 1 + 9);
    }

    #[test]
    fn reciprocal_is_an_involution() {
        let m = info([1, 1, 1], [3, 3, 3]);
        for n in 0..27 {
            assert_eq!(m.reciprocal(m.reciprocal(n)), n);
        }
        assert_eq!(m.reciprocal(m.center()), m.center());
    }

    #[test]
    fn rank_neighbor_round_trip_in_fully_populated_topology() {
        let n_subdomains = [4usize, 4];
        for x in 0..4 {
            for y in 0..4 {
                let m = info([x, y], n_subdomains);
                for n in 0..9 {
                    let rank = m.neighbor_to_rank(n);
                    assert_eq!(m.rank_to_neighbor(rank), n);
                }
            }
        }
    }

    #[test]
    fn periodic_wrap_at_domain_edge() {
        let m = info([0, 0], [4, 4]);
        // moving -1 along axis 0 from coordinate 0 wraps to coordinate 3.
        let rank = m.axis_neighbor_rank(0, -1);
        assert_eq!(rank, 3 * 1 + 0 * 4);
    }
}
