// SPDX-License-Identifier: AGPL-3.0-only

//! Structure-of-arrays rigid-body storage, integration group, simulation
//! box, and thermostat state.
//!
//! The simulation-state owner holds every array for the whole run; the step
//! kernels borrow them mutably for one call. Bodies are addressed by dense
//! index `0..n_bodies`; integration additionally indirects through
//! [`GroupMembers`] so a subset can move while the rest stay fixed.

use super::quaternion::{conjugate_from_angular, Frame, Image3, Quat, Vec3};
use crate::error::RigidError;

/// Per-body rigid state, one flat array per physical quantity.
#[derive(Clone, Debug, Default)]
pub struct RigidBodies {
    pub mass: Vec<f64>,
    /// Principal moments in the body frame.
    pub inertia: Vec<Vec3>,
    pub position: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    pub orientation: Vec<Quat>,
    /// Body-frame angular momentum (derived from `conjugate_momentum`).
    pub angular_momentum: Vec<Vec3>,
    /// Body-frame angular velocity (derived, valid for the current step only).
    pub angular_velocity: Vec<Vec3>,
    /// Quaternion momentum conjugate to `orientation`; the rotational
    /// integration variable.
    pub conjugate_momentum: Vec<Quat>,
    pub image: Vec<Image3>,
    /// Space-frame force, refreshed externally each step.
    pub force: Vec<Vec3>,
    /// Space-frame torque, refreshed externally each step.
    pub torque: Vec<Vec3>,
}

/// Snapshot of one body's integrated degrees of freedom, as a kernel
/// thread sees it between load and store.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyKinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
    pub conjugate_momentum: Quat,
    pub angular_momentum: Vec3,
    pub angular_velocity: Vec3,
    pub image: Image3,
}

/// Read-only per-body inputs to a step kernel: mass properties and the
/// externally refreshed force and torque.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyLoad {
    pub mass: f64,
    pub inertia: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
}

impl RigidBodies {
    /// `n` bodies at the origin, at rest, identity orientation, unit mass and
    /// unit principal moments.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            mass: vec![1.0; n],
            inertia: vec![Vec3::new(1.0, 1.0, 1.0); n],
            position: vec![Vec3::ZERO; n],
            velocity: vec![Vec3::ZERO; n],
            orientation: vec![Quat::IDENTITY; n],
            angular_momentum: vec![Vec3::ZERO; n],
            angular_velocity: vec![Vec3::ZERO; n],
            conjugate_momentum: vec![Quat::ZERO; n],
            image: vec![Image3::default(); n],
            force: vec![Vec3::ZERO; n],
            torque: vec![Vec3::ZERO; n],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mass.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    /// Seed body-frame angular momentum and the matching conjugate momentum
    /// (`p = 2 q ⊗ (0, L)`), with angular velocity `L / I`.
    ///
    /// Orientation must already be set.
    pub fn set_angular_momentum(&mut self, idx: usize, l_body: Vec3) {
        let q = self.orientation[idx];
        let inertia = self.inertia[idx];
        let p = conjugate_from_angular(q, l_body);
        let (angmom, angvel, _) = super::quaternion::body_angular_state(q, p, inertia);
        self.conjugate_momentum[idx] = p;
        self.angular_momentum[idx] = angmom;
        self.angular_velocity[idx] = angvel;
    }

    /// Angular momentum of body `idx` rotated into the space frame.
    #[must_use]
    pub fn space_angular_momentum(&self, idx: usize) -> Vec3 {
        Frame::from_quat(self.orientation[idx]).to_space(self.angular_momentum[idx])
    }

    /// Position with periodic images undone: `x + image · L`.
    #[must_use]
    pub fn unwrapped_position(&self, idx: usize, sim_box: &SimBox) -> Vec3 {
        let img = self.image[idx];
        let l = sim_box.lengths;
        self.position[idx]
            + Vec3::new(
                f64::from(img.x) * l.x,
                f64::from(img.y) * l.y,
                f64::from(img.z) * l.z,
            )
    }

    #[inline]
    pub(crate) fn load(&self, idx: usize) -> BodyKinematics {
        BodyKinematics {
            position: self.position[idx],
            velocity: self.velocity[idx],
            orientation: self.orientation[idx],
            conjugate_momentum: self.conjugate_momentum[idx],
            angular_momentum: self.angular_momentum[idx],
            angular_velocity: self.angular_velocity[idx],
            image: self.image[idx],
        }
    }

    #[inline]
    pub(crate) fn load_inputs(&self, idx: usize) -> BodyLoad {
        BodyLoad {
            mass: self.mass[idx],
            inertia: self.inertia[idx],
            force: self.force[idx],
            torque: self.torque[idx],
        }
    }

    #[inline]
    pub(crate) fn store(&mut self, idx: usize, k: &BodyKinematics) {
        self.position[idx] = k.position;
        self.velocity[idx] = k.velocity;
        self.orientation[idx] = k.orientation;
        self.conjugate_momentum[idx] = k.conjugate_momentum;
        self.angular_momentum[idx] = k.angular_momentum;
        self.angular_velocity[idx] = k.angular_velocity;
        self.image[idx] = k.image;
    }

    /// Pre-flight check of the kernel preconditions: consistent array
    /// lengths, positive mass, non-negative moments, unit orientations.
    ///
    /// The kernels never call this; drivers run it once at setup.
    ///
    /// # Errors
    ///
    /// Returns [`RigidError::ContractViolation`] naming the first offending body.
    pub fn validate(&self) -> Result<(), RigidError> {
        let n = self.len();
        let lengths = [
            ("inertia", self.inertia.len()),
            ("position", self.position.len()),
            ("velocity", self.velocity.len()),
            ("orientation", self.orientation.len()),
            ("angular_momentum", self.angular_momentum.len()),
            ("angular_velocity", self.angular_velocity.len()),
            ("conjugate_momentum", self.conjugate_momentum.len()),
            ("image", self.image.len()),
            ("force", self.force.len()),
            ("torque", self.torque.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(RigidError::ContractViolation(format!(
                    "array `{name}` has {len} entries, expected {n}"
                )));
            }
        }
        for i in 0..n {
            if !(self.mass[i] > 0.0) {
                return Err(RigidError::ContractViolation(format!(
                    "body {i} has non-positive mass {}",
                    self.mass[i]
                )));
            }
            let inertia = self.inertia[i];
            if inertia.x < 0.0 || inertia.y < 0.0 || inertia.z < 0.0 {
                return Err(RigidError::ContractViolation(format!(
                    "body {i} has negative principal moment {inertia:?}"
                )));
            }
            let norm = self.orientation[i].norm();
            if (norm - 1.0).abs() > crate::tolerances::QUAT_NORM_REL {
                return Err(RigidError::ContractViolation(format!(
                    "body {i} orientation is not unit (|q| = {norm})"
                )));
            }
        }
        Ok(())
    }
}

/// Dense body indices that participate in integration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupMembers {
    members: Vec<u32>,
}

impl GroupMembers {
    /// Every body `0..n` in order.
    #[must_use]
    pub fn all(n: usize) -> Self {
        Self {
            members: (0..n as u32).collect(),
        }
    }

    /// Explicit member list. Duplicates are a caller error (two threads
    /// would write the same body).
    #[must_use]
    pub const fn from_indices(members: Vec<u32>) -> Self {
        Self { members }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check every member is in range and appears once.
    ///
    /// # Errors
    ///
    /// Returns [`RigidError::ContractViolation`] for an out-of-range or
    /// duplicated index.
    pub fn validate(&self, n_bodies: usize) -> Result<(), RigidError> {
        let mut seen = vec![false; n_bodies];
        for (g, &idx) in self.members.iter().enumerate() {
            let i = idx as usize;
            if i >= n_bodies {
                return Err(RigidError::ContractViolation(format!(
                    "group index {g} maps to body {i} >= {n_bodies} bodies"
                )));
            }
            if seen[i] {
                return Err(RigidError::ContractViolation(format!(
                    "body {i} appears twice in the integration group"
                )));
            }
            seen[i] = true;
        }
        Ok(())
    }
}

/// Orthorhombic periodic box centred on the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimBox {
    pub lengths: Vec3,
    pub inv_lengths: Vec3,
}

impl SimBox {
    #[must_use]
    pub fn new(lx: f64, ly: f64, lz: f64) -> Self {
        Self {
            lengths: Vec3::new(lx, ly, lz),
            inv_lengths: Vec3::new(1.0 / lx, 1.0 / ly, 1.0 / lz),
        }
    }

    #[must_use]
    pub fn cube(l: f64) -> Self {
        Self::new(l, l, l)
    }

    /// Minimum-image wrap of `pos`, updating `image` by the number of box
    /// lengths removed on each axis.
    ///
    /// Uses round-half-to-even, the same rule as WGSL `round()`, so CPU and
    /// GPU paths agree at exact half-box positions.
    #[inline]
    pub fn wrap(&self, pos: &mut Vec3, image: &mut Image3) {
        let sx = (pos.x * self.inv_lengths.x).round_ties_even();
        let sy = (pos.y * self.inv_lengths.y).round_ties_even();
        let sz = (pos.z * self.inv_lengths.z).round_ties_even();
        pos.x -= self.lengths.x * sx;
        pos.y -= self.lengths.y * sy;
        pos.z -= self.lengths.z * sz;
        image.x += sx as i32;
        image.y += sy as i32;
        image.z += sz as i32;
    }
}

/// Per-body partial kinetic sums, covering *all* bodies.
///
/// `translational[i] = m |v|²` and `rotational[i] = Σ L_k ω_k`, both twice
/// the kinetic energy; consumers halve downstream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialKinetic {
    pub translational: Vec<f64>,
    pub rotational: Vec<f64>,
}

impl PartialKinetic {
    #[must_use]
    pub fn zeros(n_bodies: usize) -> Self {
        Self {
            translational: vec![0.0; n_bodies],
            rotational: vec![0.0; n_bodies],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.translational.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.translational.is_empty()
    }
}

/// Thermostat damping rates `η̇_t`, `η̇_r` supplied to both step kernels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ThermostatRates {
    pub translational: f64,
    pub rotational: f64,
}

/// System-wide kinetic sums written by the reduction (twice KE).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KineticSums {
    pub translational: f64,
    pub rotational: f64,
}

impl KineticSums {
    /// Total kinetic energy `(K_t + K_r) / 2`.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * (self.translational + self.rotational)
    }
}

/// Body-independent per-step coefficients, hoisted out of the kernels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepCoefficients {
    pub dt: f64,
    pub half_dt: f64,
    pub scale_t: f64,
    pub scale_r: f64,
}

impl StepCoefficients {
    /// `scale = exp(-½ Δt η̇)` per degree-of-freedom class. Zero rates give
    /// exactly 1.0.
    #[must_use]
    pub fn new(dt: f64, rates: ThermostatRates) -> Self {
        let half_dt = 0.5 * dt;
        Self {
            dt,
            half_dt,
            scale_t: (-half_dt * rates.translational).exp(),
            scale_r: (-half_dt * rates.rotational).exp(),
        }
    }
}
