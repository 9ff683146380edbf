// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized validation tolerances with physical justification.
//!
//! Every tolerance threshold used by unit tests, integration tests, and the
//! `validate_rigid_nvt` binary is defined here with documentation of its
//! origin and rationale. No ad-hoc magic numbers.
//!
//! # Tolerance categories
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Machine precision | IEEE 754 f64 | 1e-10 for exact arithmetic |
//! | Summation order | Reassociated f64 sums | 1e-12 relative for reductions |
//! | Integrator | Symplectic splitting error | 1e-6 relative quaternion norm |
//! | Physical model | Thermostat / drift | 0.5% energy drift |

/// Machine-precision and GPU-vs-CPU parity tolerances.
pub mod core;
/// Rigid-body integrator: quaternion norm, reduction parity, drift, reversibility.
pub mod rigid;

pub use core::{DIVISION_GUARD, EXACT_F64, GPU_VS_CPU_F64, ITERATIVE_F64};

pub use rigid::{
    ENERGY_DRIFT_PCT, FREE_DRIFT_POSITION_ABS, NO_SQUISH_ORDER_MIN_DIFF, QUAT_NORM_REL,
    REDUCTION_BLOCK_PARITY_REL, THERMOSTAT_TARGET_REL, TIME_REVERSAL_ABS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_tiers_are_ordered() {
        assert!(EXACT_F64 < ITERATIVE_F64, "exact < iterative");
        assert!(ITERATIVE_F64 < GPU_VS_CPU_F64, "iterative < GPU vs CPU");
        assert!(DIVISION_GUARD < EXACT_F64, "guard is far below any tolerance");
    }

    #[test]
    fn rigid_tolerances_positive_and_loose_enough() {
        for (name, tol) in [
            ("QUAT_NORM_REL", QUAT_NORM_REL),
            ("REDUCTION_BLOCK_PARITY_REL", REDUCTION_BLOCK_PARITY_REL),
            ("FREE_DRIFT_POSITION_ABS", FREE_DRIFT_POSITION_ABS),
            ("TIME_REVERSAL_ABS", TIME_REVERSAL_ABS),
            ("ENERGY_DRIFT_PCT", ENERGY_DRIFT_PCT),
            ("THERMOSTAT_TARGET_REL", THERMOSTAT_TARGET_REL),
        ] {
            assert!(tol > 0.0, "{name} must be positive");
            assert!(tol > f64::EPSILON, "{name} must exceed machine epsilon");
        }
        assert!(
            NO_SQUISH_ORDER_MIN_DIFF > TIME_REVERSAL_ABS,
            "order sensitivity must be distinguishable from reversal round-off"
        );
    }
}
