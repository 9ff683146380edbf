// SPDX-License-Identifier: AGPL-3.0-only

//! Block tree reduction of the per-body partial kinetic sums.
//!
//! Mirrors the single-workgroup shader: walk the population in chunks of
//! the block width, zero-pad the tail chunk, halve the active width until
//! one value remains, and carry a running total across chunks. Each
//! halving round completes over the whole scratch block before the next
//! starts, which is the host-side form of the workgroup barrier.
//!
//! The reduction covers every body, not only the integration group.

use super::config::LaunchConfig;
use super::state::{KineticSums, PartialKinetic};

/// Reduce `partials[0..n_bodies]` with the launch's reduction width.
///
/// Pure: inputs are not modified. `n_bodies == 0` yields zero sums. The
/// width is a power of two because [`LaunchConfig::new`] refuses any other.
///
/// # Panics
///
/// If `n_bodies` exceeds the partial arrays.
#[must_use]
pub fn reduce_kinetic_energy(
    partials: &PartialKinetic,
    n_bodies: usize,
    launch: &LaunchConfig,
) -> KineticSums {
    let block_width = launch.reduce_block_size() as usize;
    let mut sdata_t = vec![0.0f64; block_width];
    let mut sdata_r = vec![0.0f64; block_width];
    let mut sums = KineticSums::default();

    for start in (0..n_bodies).step_by(block_width) {
        for tid in 0..block_width {
            let i = start + tid;
            let (t, r) = if i < n_bodies {
                (partials.translational[i], partials.rotational[i])
            } else {
                (0.0, 0.0)
            };
            sdata_t[tid] = t;
            sdata_r[tid] = r;
        }

        let mut offs = block_width >> 1;
        while offs > 0 {
            for tid in 0..offs {
                sdata_t[tid] += sdata_t[tid + offs];
                sdata_r[tid] += sdata_r[tid + offs];
            }
            offs >>= 1;
        }

        sums.translational += sdata_t[0];
        sums.rotational += sdata_r[0];
    }
    sums
}
