//! Particle migration across subdomain boundaries (spec §4.9).
//!
//! One round per time step, in three strictly ordered phases: extract every
//! particle that has crossed a threshold into a per-neighbor send list
//! (§Phase A), exchange per-species emigrant counts so each peer knows how
//! many particles to expect before any body data arrives (§Phase B), then
//! exchange the particle bodies themselves, shifting imported coordinates by
//! one domain length per axis actually crossed (§Phase C). Tags follow the
//! reciprocal convention of [`crate::mpi_info::MpiInfo::reciprocal`]
//! throughout: a neighbor is addressed with `reciprocal(n)` when sending to
//! it, so the peer's matching receive — posted against its own view of the
//! link — lines up without either side needing to know the other's
//! subdomain coordinate.

use crate::error::{Error, Result};
use crate::mpi_info::MpiInfo;
use crate::population::Population;

type Emigrant<const D: usize> = (usize, [f64; D], [f64; D]);

/// Classifies `pos` against `info`'s thresholds into a per-axis neighbor
/// delta: `-1` below the lower threshold, `+1` at or above the upper
/// threshold, `0` otherwise (spec §4.9 Phase A).
fn classify<const D: usize>(pos: [f64; D], info: &MpiInfo<D>) -> [i32; D] {
    std::array::from_fn(|d| {
        let mut delta = 0i32;
        if pos[d] < info.lower_thresholds[d] {
            delta -= 1;
        }
        if pos[d] >= info.upper_thresholds[d] {
            delta += 1;
        }
        delta
    })
}

/// Phase A: classifies every live particle, moving any that crosses a
/// threshold out of `pop` (via swap-with-last, revisiting the swapped-in
/// slot) and into the returned per-neighbor emigrant lists, grouped by
/// species in ascending order (so a flattened send buffer's per-species
/// run lengths are exactly the counts exchanged in Phase B).
fn extract_emigrants<const D: usize>(
    pop: &mut Population<D>,
    info: &MpiInfo<D>,
) -> Vec<Vec<Emigrant<D>>> {
    let center = info.center();
    let mut emigrants: Vec<Vec<Emigrant<D>>> = vec![Vec::new(); info.neighborhood_size()];

    for s in 0..pop.n_species() {
        let mut i = pop.range(s).start;
        while i < pop.range(s).end {
            let pos = pop.pos(i);
            let n = info.neighbor_index(classify(pos, info));
            if n == center {
                i += 1;
                continue;
            }
            let vel = pop.vel(i);
            emigrants[n].push((s, pos, vel));
            pop.swap_remove(s, i);
            // the slot just swapped in must be reprocessed; don't advance i.
        }
    }

    emigrants
}

fn counts_for<const D: usize>(list: &[Emigrant<D>], n_species: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n_species];
    for &(s, _, _) in list {
        counts[s] += 1.0;
    }
    counts
}

fn flatten<const D: usize>(list: &[Emigrant<D>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(list.len() * 2 * D);
    for (_, pos, vel) in list {
        out.extend_from_slice(pos);
        out.extend_from_slice(vel);
    }
    out
}

fn import_batch<const D: usize>(
    pop: &mut Population<D>,
    data: &[f64],
    counts: &[usize],
    delta: [i32; D],
    true_size: [usize; D],
) -> Result<()> {
    let mut cursor = 0usize;
    for (s, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            let mut pos: [f64; D] = std::array::from_fn(|d| data[cursor + d]);
            let vel: [f64; D] = std::array::from_fn(|d| data[cursor + D + d]);
            cursor += 2 * D;
            for d in 0..D {
                pos[d] += f64::from(delta[d]) * true_size[d] as f64;
            }
            pop.push(s, pos, vel)?;
        }
    }
    Ok(())
}

/// Runs one full migration round: extracts emigrants, exchanges counts,
/// then exchanges and imports bodies, shifting each batch's coordinates by
/// the domain length along every axis it actually crossed (spec §4.9).
pub fn migrate<const D: usize>(
    pop: &mut Population<D>,
    info: &mut MpiInfo<D>,
    true_size: [usize; D],
) -> Result<()> {
    let n_species = pop.n_species();
    let center = info.center();
    let neighborhood = info.neighborhood_size();

    let emigrants = extract_emigrants(pop, info);

    // Phase B: counts before bodies, so the importer knows each species'
    // segment length ahead of the body message (spec §4.9 "Ordering").
    let mut count_sends = Vec::new();
    for n in 0..neighborhood {
        if n == center {
            continue;
        }
        let dest = info.neighbor_to_rank(n);
        let tag = i32::try_from(info.reciprocal(n)).expect("reciprocal tag fits in i32");
        let payload = counts_for(&emigrants[n], n_species);
        count_sends.push(info.transport().isend(dest, tag, &payload));
    }

    let mut n_immigrants = vec![Vec::new(); neighborhood];
    for n in 0..neighborhood {
        if n == center {
            continue;
        }
        let source = info.neighbor_to_rank(n);
        let tag = i32::try_from(n).expect("neighbor index fits in i32");
        let token = info.transport().irecv(Some(source), Some(tag));
        let result = info
            .transport()
            .wait_recv(token)
            .map_err(|e| Error::Comm(format!("migrator count exchange from neighbor {n}: {e}")))?;
        n_immigrants[n] = result.data.iter().map(|&v| v.round() as usize).collect();
    }
    for token in count_sends {
        info.transport()
            .wait_send(token)
            .map_err(|e| Error::Comm(format!("migrator count exchange send: {e}")))?;
    }

    // Phase C: bodies, sent and received regardless of emptiness (every
    // non-center neighbor participates in exactly one send and one recv).
    let mut body_sends = Vec::new();
    for n in 0..neighborhood {
        if n == center {
            continue;
        }
        let dest = info.neighbor_to_rank(n);
        let tag = i32::try_from(info.reciprocal(n)).expect("reciprocal tag fits in i32");
        let payload = flatten(&emigrants[n]);
        body_sends.push(info.transport().isend(dest, tag, &payload));
    }

    for _ in 0..neighborhood.saturating_sub(1) {
        let token = info.transport().irecv(None, None);
        let result = info
            .transport()
            .wait_recv(token)
            .map_err(|e| Error::Comm(format!("migrator body exchange: {e}")))?;
        let n = usize::try_from(result.tag).map_err(|_| {
            Error::Comm(format!("migrator received negative neighbor tag {}", result.tag))
        })?;
        let delta = info.neighbor_delta(n);
        import_batch(pop, &result.data, &n_immigrants[n], delta, true_size)?;
    }

    for token in body_sends {
        info.transport()
            .wait_send(token)
            .map_err(|e| Error::Comm(format!("migrator body exchange send: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::local::{LocalNetwork, LocalTransport};

    #[test]
    fn single_subdomain_particle_wraps_periodically() {
        // One subdomain, periodic in both axes: a particle past the upper
        // threshold on axis 0 migrates to itself, landing shifted by minus
        // one domain length, matching scenario 5 of the testable properties
        // (restated with threshold at the true domain edge rather than the
        // spec's internally inconsistent epsilon-margin example).
        let net = LocalNetwork::new(1);
        let true_size = [4usize, 4];
        let mut info = MpiInfo::new(
            [0, 0],
            [1, 1],
            [0.0, 0.0],
            [4.0, 4.0],
            LocalTransport::new(0, &net).into(),
        );
        let mut pop = Population::<2>::new(4, vec![0], vec![1.0], vec![1.0]).unwrap();
        pop.push(0, [3.9999, 2.0], [0.1, 0.0]).unwrap();

        migrate(&mut pop, &mut info, true_size).unwrap();

        assert_eq!(pop.len(0), 1);
        let p = pop.pos(0);
        assert!((p[0] - (3.9999 - 4.0)).abs() < 1e-9);
        assert!((p[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn two_rank_split_migrates_across_the_boundary() {
        // Two ranks split along axis 0 (true_size 4 each); a particle on
        // rank 0 past the upper threshold migrates to rank 1, shifted back
        // into rank 1's local coordinates.
        let net = LocalNetwork::new(2);
        let true_size = [4usize, 4];
        let mut info0 = MpiInfo::new(
            [0, 0],
            [2, 1],
            [0.0, 0.0],
            [3.5, 4.0],
            LocalTransport::new(0, &net).into(),
        );
        let mut info1 = MpiInfo::new(
            [1, 0],
            [2, 1],
            [0.0, 0.0],
            [3.5, 4.0],
            LocalTransport::new(1, &net).into(),
        );

        let mut pop0 = Population::<2>::new(4, vec![0], vec![1.0], vec![1.0]).unwrap();
        pop0.push(0, [3.9, 1.0], [0.0, 0.0]).unwrap();
        let mut pop1 = Population::<2>::new(4, vec![0], vec![1.0], vec![1.0]).unwrap();

        migrate(&mut pop0, &mut info0, true_size).unwrap();
        assert_eq!(pop0.len(0), 0);

        migrate(&mut pop1, &mut info1, true_size).unwrap();
        assert_eq!(pop1.len(0), 1);
        let p = pop1.pos(0);
        // Rank 1's own neighbor index for rank 0 is delta -1 along axis 0,
        // so the shift applied on import is the same -trueSize[0] as the
        // single-subdomain wrap case above: the formula rebases into the
        // peer's local frame identically whether the link is a genuine
        // periodic wrap or a plain interior boundary (spec §4.9, "a no-op
        // across an interior boundary up to bookkeeping" refers to the
        // particle's physical trajectory being undisturbed, not to the
        // local-coordinate shift amount itself being zero).
        assert!((p[0] - (3.9 - 4.0)).abs() < 1e-9);
        assert!((p[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn migrate_reports_overflow_when_capacity_is_exceeded() {
        // Two ranks split along axis 0; rank 0 sends two particles across
        // the boundary but rank 1 only has room for one immigrant, so
        // import must surface Error::Overflow rather than silently
        // corrupting memory (spec §4.9 "Capacity").
        let net = LocalNetwork::new(2);
        let true_size = [4usize, 4];
        let mut info0 = MpiInfo::new(
            [0, 0],
            [2, 1],
            [0.0, 0.0],
            [3.5, 4.0],
            LocalTransport::new(0, &net).into(),
        );
        let mut info1 = MpiInfo::new(
            [1, 0],
            [2, 1],
            [0.0, 0.0],
            [3.5, 4.0],
            LocalTransport::new(1, &net).into(),
        );

        let mut pop0 = Population::<2>::new(4, vec![0], vec![1.0], vec![1.0]).unwrap();
        pop0.push(0, [3.9, 1.0], [0.0, 0.0]).unwrap();
        pop0.push(0, [3.8, 2.0], [0.0, 0.0]).unwrap();
        let mut pop1 = Population::<2>::new(1, vec![0], vec![1.0], vec![1.0]).unwrap();

        migrate(&mut pop0, &mut info0, true_size).unwrap();
        assert_eq!(pop0.len(0), 0);

        let err = migrate(&mut pop1, &mut info1, true_size).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
    }
}
