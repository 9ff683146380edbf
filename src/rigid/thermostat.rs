// SPDX-License-Identifier: AGPL-3.0-only

//! Nosé–Hoover feedback for the translational and rotational classes.
//!
//! Consumes the reduced kinetic sums (twice KE) and produces the damping
//! rates `η̇_t`, `η̇_r` the next step's kernels read. One thermostat
//! variable per class:
//!
//!   `Q = N k_B T τ²`,  `η̇ += Δt (K − N k_B T) / Q`
//!
//! where `K` is the summed `m v²` (or `L·ω`) and `N` the class's degrees
//! of freedom. A class with no degrees of freedom keeps `η̇ = 0`.
//!
//! The target `k_B T` follows a [`KtSchedule`] evaluated at each update,
//! so a run can heat or quench linearly.

use serde::{Deserialize, Serialize};

use super::quaternion::Vec3;
use super::state::{GroupMembers, KineticSums, RigidBodies, ThermostatRates};

/// Target `k_B T` as a function of the update count.
///
/// In JSON a bare number is `Constant`; an object
/// `{"from": .., "to": .., "steps": ..}` is `Ramp`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KtSchedule {
    Constant(f64),
    /// Linear from `from` at update 0 to `to` at update `steps`, then held.
    Ramp { from: f64, to: f64, steps: u64 },
}

impl KtSchedule {
    /// Target at update `step`.
    #[must_use]
    pub fn at(&self, step: u64) -> f64 {
        match *self {
            Self::Constant(kt) => kt,
            Self::Ramp { to, steps: 0, .. } => to,
            Self::Ramp { from, to, steps } => {
                let frac = step.min(steps) as f64 / steps as f64;
                from + (to - from) * frac
            }
        }
    }

    /// Every value the schedule can take lies between these two.
    #[must_use]
    pub const fn endpoints(&self) -> (f64, f64) {
        match *self {
            Self::Constant(kt) => (kt, kt),
            Self::Ramp { from, to, .. } => (from, to),
        }
    }
}

impl From<f64> for KtSchedule {
    fn from(kt: f64) -> Self {
        Self::Constant(kt)
    }
}

/// Single-link Nosé–Hoover thermostat for rigid bodies.
#[derive(Clone, Debug, PartialEq)]
pub struct NoseHooverRigid {
    kt: KtSchedule,
    tau: f64,
    /// Updates applied so far; indexes the schedule.
    timestep: u64,
    /// Translational degrees of freedom, `3 G`.
    pub dof_translational: usize,
    /// Rotational degrees of freedom: nonzero principal moments in the group.
    pub dof_rotational: usize,
    rates: ThermostatRates,
}

fn rotational_dof(inertia: Vec3) -> usize {
    [inertia.x, inertia.y, inertia.z]
        .iter()
        .filter(|&&i| i > 0.0)
        .count()
}

impl NoseHooverRigid {
    /// Count degrees of freedom over `group` and start at rest (`η̇ = 0`).
    #[must_use]
    pub fn new(
        kt: impl Into<KtSchedule>,
        tau: f64,
        bodies: &RigidBodies,
        group: &GroupMembers,
    ) -> Self {
        let dof_rotational = group
            .as_slice()
            .iter()
            .map(|&i| rotational_dof(bodies.inertia[i as usize]))
            .sum();
        Self {
            kt: kt.into(),
            tau,
            timestep: 0,
            dof_translational: 3 * group.len(),
            dof_rotational,
            rates: ThermostatRates::default(),
        }
    }

    /// Current damping rates.
    #[must_use]
    pub const fn rates(&self) -> ThermostatRates {
        self.rates
    }

    /// Target `k_B T` the next [`Self::update`] drives toward.
    #[must_use]
    pub fn kt(&self) -> f64 {
        self.kt.at(self.timestep)
    }

    #[must_use]
    pub const fn kt_schedule(&self) -> KtSchedule {
        self.kt
    }

    /// Replace the target schedule. The update count is kept, so a ramp
    /// set mid-run starts partway along.
    pub fn set_kt(&mut self, kt: impl Into<KtSchedule>) {
        self.kt = kt.into();
    }

    #[must_use]
    pub const fn tau(&self) -> f64 {
        self.tau
    }

    pub fn set_tau(&mut self, tau: f64) {
        self.tau = tau;
    }

    /// Updates applied since construction.
    #[must_use]
    pub const fn timestep(&self) -> u64 {
        self.timestep
    }

    /// Advance both thermostat variables by `dt` from the latest sums.
    pub fn update(&mut self, sums: KineticSums, dt: f64) {
        let kt = self.kt();
        self.rates.translational +=
            self.rate_increment(sums.translational, self.dof_translational, kt, dt);
        self.rates.rotational +=
            self.rate_increment(sums.rotational, self.dof_rotational, kt, dt);
        self.timestep += 1;
    }

    fn rate_increment(&self, k_sum: f64, dof: usize, kt: f64, dt: f64) -> f64 {
        if dof == 0 {
            return 0.0;
        }
        let target = dof as f64 * kt;
        let q = target * self.tau * self.tau;
        dt * (k_sum - target) / q
    }

    /// Instantaneous `k_B T` over both classes, `(K_t + K_r) / (N_t + N_r)`.
    #[must_use]
    pub fn temperature(&self, sums: KineticSums) -> f64 {
        let dof = self.dof_translational + self.dof_rotational;
        if dof == 0 {
            return 0.0;
        }
        (sums.translational + sums.rotational) / dof as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sums(t: f64, r: f64) -> KineticSums {
        KineticSums {
            translational: t,
            rotational: r,
        }
    }

    #[test]
    fn dof_counts_group_only() {
        let mut bodies = RigidBodies::new(4);
        bodies.inertia[1] = Vec3::new(0.0, 2.0, 2.0);
        bodies.inertia[3] = Vec3::new(0.0, 0.0, 0.0);
        let nh = NoseHooverRigid::new(1.0, 0.5, &bodies, &GroupMembers::from_indices(vec![1, 3]));
        assert_eq!(nh.dof_translational, 6);
        assert_eq!(nh.dof_rotational, 2);
    }

    #[test]
    fn hot_system_raises_damping() {
        let bodies = RigidBodies::new(10);
        let mut nh = NoseHooverRigid::new(1.0, 0.5, &bodies, &GroupMembers::all(10));
        nh.update(sums(60.0, 15.0), 0.01);
        assert!(nh.rates().translational > 0.0);
        assert!(nh.rates().rotational < 0.0);
        // dt (K - N kT) / (N kT τ²) = 0.01 * 30 / 7.5
        assert!((nh.rates().translational - 0.04).abs() < 1e-15);
    }

    #[test]
    fn equilibrium_leaves_rates_unchanged() {
        let bodies = RigidBodies::new(3);
        let mut nh = NoseHooverRigid::new(2.0, 1.0, &bodies, &GroupMembers::all(3));
        nh.update(sums(18.0, 18.0), 0.1);
        assert_eq!(nh.rates(), ThermostatRates::default());
        assert!((nh.temperature(sums(18.0, 18.0)) - 2.0).abs() < 1e-15);
    }

    #[test]
    fn empty_group_never_thermostats() {
        let bodies = RigidBodies::new(2);
        let mut nh = NoseHooverRigid::new(1.0, 1.0, &bodies, &GroupMembers::from_indices(vec![]));
        nh.update(sums(5.0, 5.0), 0.1);
        assert_eq!(nh.rates(), ThermostatRates::default());
        assert_eq!(nh.temperature(sums(5.0, 5.0)), 0.0);
    }

    #[test]
    fn ramp_interpolates_then_holds() {
        let ramp = KtSchedule::Ramp {
            from: 1.0,
            to: 2.0,
            steps: 4,
        };
        let values: Vec<f64> = (0..7).map(|s| ramp.at(s)).collect();
        assert_eq!(values, vec![1.0, 1.25, 1.5, 1.75, 2.0, 2.0, 2.0]);
        let instant = KtSchedule::Ramp {
            from: 1.0,
            to: 3.0,
            steps: 0,
        };
        assert_eq!(instant.at(0), 3.0);
        assert_eq!(KtSchedule::from(0.7).at(1_000), 0.7);
    }

    #[test]
    fn controller_follows_ramp() {
        let bodies = RigidBodies::new(2);
        let ramp = KtSchedule::Ramp {
            from: 1.0,
            to: 2.0,
            steps: 10,
        };
        let mut nh = NoseHooverRigid::new(ramp, 0.5, &bodies, &GroupMembers::all(2));
        // sums pinned to the moving target: rates never leave zero
        for step in 0..15u64 {
            assert_eq!(nh.timestep(), step);
            let k = nh.kt() * 6.0;
            nh.update(sums(k, k), 0.01);
            assert!(nh.rates().translational.abs() < 1e-15, "step {step}");
        }
        assert_eq!(nh.kt(), 2.0);

        // a system left at the starting temperature is heated once the ramp moves
        let mut lagging = NoseHooverRigid::new(ramp, 0.5, &bodies, &GroupMembers::all(2));
        for _ in 0..10 {
            lagging.update(sums(6.0, 6.0), 0.01);
        }
        assert!(lagging.rates().translational < 0.0);
        assert!(lagging.rates().rotational < 0.0);
    }

    #[test]
    fn setters_take_effect_on_next_update() {
        let bodies = RigidBodies::new(1);
        let mut nh = NoseHooverRigid::new(1.0, 1.0, &bodies, &GroupMembers::all(1));
        nh.update(sums(3.0, 3.0), 0.1);
        assert_eq!(nh.rates(), ThermostatRates::default());

        nh.set_kt(2.0);
        nh.set_tau(0.5);
        assert_eq!(nh.kt_schedule(), KtSchedule::Constant(2.0));
        assert_eq!(nh.kt(), 2.0);
        assert_eq!(nh.tau(), 0.5);
        nh.update(sums(3.0, 3.0), 0.1);
        // dt (K - N kT) / (N kT τ²) = 0.1 * (3 - 6) / 1.5
        assert!((nh.rates().translational + 0.2).abs() < 1e-15);
    }

    #[test]
    fn schedule_reads_number_or_ramp_object() {
        let constant: KtSchedule = serde_json::from_str("1.5").expect("number");
        assert_eq!(constant, KtSchedule::Constant(1.5));
        let ramp: KtSchedule =
            serde_json::from_str(r#"{"from": 0.5, "to": 1.0, "steps": 100}"#).expect("ramp");
        assert_eq!(
            ramp,
            KtSchedule::Ramp {
                from: 0.5,
                to: 1.0,
                steps: 100
            }
        );
        assert_eq!(ramp.endpoints(), (0.5, 1.0));
    }
}
