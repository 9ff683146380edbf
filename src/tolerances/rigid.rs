// SPDX-License-Identifier: AGPL-3.0-only

//! Rigid-body integrator tolerances: quaternion norm, reduction parity,
//! free drift, no-squish ordering, reversibility, thermostat behaviour.

// ═══════════════════════════════════════════════════════════════════
// Rotational integrator
// ═══════════════════════════════════════════════════════════════════

/// Orientation quaternion norm after step one: | |q| - 1 | / 1.
///
/// Each no-squish sub-rotation is an exact orthogonal map on (q, p) up to
/// rounding of cos/sin; five sub-rotations per step accumulate O(10 eps).
/// 1e-6 relative is the acceptance bound for every body, every step.
pub const QUAT_NORM_REL: f64 = 1e-6;

/// Minimum componentwise orientation difference that counts as "measurably
/// different" when the 3-2-1-2-3 sequence is reordered.
///
/// Splitting error of a reordered Trotter factorisation is O(dt³ ‖ω‖³);
/// for the test body (I = 1,2,3, |L| ~ 1, dt = 0.1) it is ~1e-4, so 1e-8
/// is a conservative floor well above rounding.
pub const NO_SQUISH_ORDER_MIN_DIFF: f64 = 1e-8;

/// Forward-then-backward (dt, then -dt) no-squish sequence must return to
/// the starting (q, p) within this absolute error per component.
pub const TIME_REVERSAL_ABS: f64 = 1e-12;

// ═══════════════════════════════════════════════════════════════════
// Translational integrator
// ═══════════════════════════════════════════════════════════════════

/// Free drift: |x(t) - (x0 + v t)| after 1000 steps of dt = 1e-3.
///
/// Each drift adds v*dt with one rounding; 1000 steps of O(1) values give
/// ~1e-13 accumulated error. 1e-9 leaves room for periodic wrapping.
pub const FREE_DRIFT_POSITION_ABS: f64 = 1e-9;

// ═══════════════════════════════════════════════════════════════════
// Reduction
// ═══════════════════════════════════════════════════════════════════

/// Kinetic sums for different block widths (32..256) vs naive sum.
///
/// Tree reduction reassociates the sum; error is O(log2(n) eps) relative
/// for non-negative summands. 1e-12 relative is far above that bound.
pub const REDUCTION_BLOCK_PARITY_REL: f64 = 1e-12;

// ═══════════════════════════════════════════════════════════════════
// Thermostatted dynamics
// ═══════════════════════════════════════════════════════════════════

/// Maximum total-energy drift (percent) for an unthermostatted run in a
/// harmonic well (dt = 1e-3, 2000 steps).
///
/// Velocity Verlet is second order; relative energy fluctuation is
/// O((ω dt)²) ≈ 1e-6 for ω = 1. 0.5% mirrors hotSpring's MD acceptance.
pub const ENERGY_DRIFT_PCT: f64 = 0.5;

/// Time-averaged temperature vs target under the Nosé–Hoover feedback.
///
/// Single-link Nosé–Hoover oscillates around the target; averaged over
/// several thermostat periods the mean lands within 10% for a few hundred
/// degrees of freedom.
pub const THERMOSTAT_TARGET_REL: f64 = 0.10;
