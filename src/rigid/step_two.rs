// SPDX-License-Identifier: AGPL-3.0-only

//! Step two of the rigid-body NVT update (CPU reference).
//!
//! Closes the step after forces and torques have been refreshed at the new
//! configuration. The thermostat scale multiplies the *old* momentum only;
//! the kick is added unscaled (the reverse of step one). Position, image
//! and orientation are read but never written.

use rayon::prelude::*;

use super::quaternion::{body_angular_state, Frame};
use super::state::{
    BodyKinematics, BodyLoad, GroupMembers, PartialKinetic, RigidBodies, StepCoefficients,
    ThermostatRates,
};

/// Step two for a single body.
#[must_use]
pub fn step_two_body(
    body: BodyKinematics,
    load: BodyLoad,
    coeffs: &StepCoefficients,
) -> (BodyKinematics, f64, f64) {
    let dtfm = coeffs.half_dt / load.mass;
    let velocity = body.velocity * coeffs.scale_t + load.force * dtfm;
    let ke_trans = load.mass * velocity.norm_sq();

    let q = body.orientation;
    let tbody = Frame::from_quat(q).to_body(load.torque);
    let p = body.conjugate_momentum * coeffs.scale_r + q.mul_vec(tbody) * coeffs.dt;
    let (angular_momentum, angular_velocity, ke_rot) = body_angular_state(q, p, load.inertia);

    (
        BodyKinematics {
            velocity,
            conjugate_momentum: p,
            angular_momentum,
            angular_velocity,
            ..body
        },
        ke_trans,
        ke_rot,
    )
}

/// Advance every group member through step two and rewrite its partial
/// kinetic sums.
///
/// Takes no box: nothing here moves a body, so there is nothing to wrap.
pub fn advance_step_two(
    bodies: &mut RigidBodies,
    partials: &mut PartialKinetic,
    rates: ThermostatRates,
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
                    step_two_body(snapshot.load(i), snapshot.load_inputs(i), &coeffs);
                (i, next, ke_t, ke_r)
            })
            .collect()
    };
    for (i, next, ke_t, ke_r) in updates {
        bodies.velocity[i] = next.velocity;
        bodies.conjugate_momentum[i] = next.conjugate_momentum;
        bodies.angular_momentum[i] = next.angular_momentum;
        bodies.angular_velocity[i] = next.angular_velocity;
        partials.translational[i] = ke_t;
        partials.rotational[i] = ke_r;
    }
}
