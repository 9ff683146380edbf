// SPDX-License-Identifier: AGPL-3.0-only

//! Step one of the rigid-body NVT update (CPU reference).
//!
//! Per group member: thermostatted half-kick of the centre-of-mass velocity,
//! full drift with minimum-image wrap, half-kick of the conjugate momentum
//! from the body-frame torque, then the 3-2-1-2-3 no-squish free rotation.
//! Body updates are independent; the kernel loads each body, computes on a
//! rayon worker, and stores results keyed by dense body index.
//!
//! The WGSL twin is `shaders/rigid_step_one_f64.wgsl`.

use rayon::prelude::*;

use super::quaternion::{body_angular_state, no_squish_sequence, Frame, NO_SQUISH_SEQUENCE};
use super::state::{
    BodyKinematics, BodyLoad, GroupMembers, PartialKinetic, RigidBodies, SimBox,
    StepCoefficients, ThermostatRates,
};

/// Step one for a single body. Returns the new kinematics and the
/// `(m |v|², Σ L ω)` partials.
#[must_use]
pub fn step_one_body(
    body: BodyKinematics,
    load: BodyLoad,
    coeffs: &StepCoefficients,
    sim_box: &SimBox,
) -> (BodyKinematics, f64, f64) {
    let frame = Frame::from_quat(body.orientation);

    // v' = scale_t (v + dt/2m F)
    let dtfm = coeffs.half_dt / load.mass;
    let velocity = (body.velocity + load.force * dtfm) * coeffs.scale_t;
    let ke_trans = load.mass * velocity.norm_sq();

    let mut position = body.position + velocity * coeffs.dt;
    let mut image = body.image;
    sim_box.wrap(&mut position, &mut image);

    // p' = scale_r (p + dt q ⊗ (0, τ_body))
    let tbody = frame.to_body(load.torque);
    let fquat = body.orientation.mul_vec(tbody);
    let mut p = (body.conjugate_momentum + fquat * coeffs.dt) * coeffs.scale_r;
    let mut q = body.orientation;
    no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p, &mut q, load.inertia, coeffs.dt);

    let (angular_momentum, angular_velocity, ke_rot) = body_angular_state(q, p, load.inertia);

    (
        BodyKinematics {
            position,
            velocity,
            orientation: q,
            conjugate_momentum: p,
            angular_momentum,
            angular_velocity,
            image,
        },
        ke_trans,
        ke_rot,
    )
}

/// Advance every group member through step one and write its partial
/// kinetic sums. A group of size zero is a no-op.
///
/// Preconditions (unchecked): group indices in range and unique, positive
/// masses, non-negative moments, unit orientations, `partials` sized to
/// `bodies.len()`.
pub fn advance_step_one(
    bodies: &mut RigidBodies,
    partials: &mut PartialKinetic,
    rates: ThermostatRates,
    sim_box: &SimBox,
    group: &GroupMembers,
    dt: f64,
) {
    let coeffs = StepCoefficients::new(dt, rates);
    let updates: Vec<(usize, BodyKinematics, f64, f64)> = {
        let snapshot = &*bodies;
        group
            .as_slice()
            .par_iter()
            .map(|&idx| {
                let i = idx as usize;
                let (next, ke_t, ke_r) =
                    step_one_body(snapshot.load(i), snapshot.load_inputs(i), &coeffs, sim_box);
                (i, next, ke_t, ke_r)
            })
            .collect()
    };
    for (i, next, ke_t, ke_r) in updates {
        bodies.store(i, &next);
        partials.translational[i] = ke_t;
        partials.rotational[i] = ke_r;
    }
}
