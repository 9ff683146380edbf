// SPDX-License-Identifier: AGPL-3.0-only

//! Core numerical tolerances: machine precision and GPU/CPU parity.

// ═══════════════════════════════════════════════════════════════════
// Machine-precision tolerances (IEEE 754 f64)
// ═══════════════════════════════════════════════════════════════════

/// Tolerance for operations that should be exact in f64 arithmetic.
///
/// f64 has ~15.9 significant digits; 1e-10 allows 5 digits of accumulated
/// rounding in short compositions (a few quaternion products, one rotation).
pub const EXACT_F64: f64 = 1e-10;

/// Tolerance for f64 operations with moderate accumulation.
///
/// Used when O(steps) rounding accumulates, e.g. a thousand integrator
/// steps of a free body.
pub const ITERATIVE_F64: f64 = 1e-8;

/// Tolerance for comparing GPU f64 results against the CPU reference.
///
/// `SHADER_F64` uses the same IEEE 754 representation but different
/// instruction ordering (FMA contraction) and a shader-local sin/cos
/// polynomial instead of libm. Both are accurate to a few ulp per call; 1e-6
/// leaves room for per-step accumulation over short runs.
pub const GPU_VS_CPU_F64: f64 = 1e-6;

/// Smallest denominator accepted before a relative comparison falls back to
/// an absolute one.
pub const DIVISION_GUARD: f64 = 1e-15;
