// SPDX-License-Identifier: AGPL-3.0-only

//! Quaternion and rigid-frame math for the no-squish integrator.
//!
//! Quaternions are stored scalar-first, `(s, x, y, z)`, matching the
//! 4-wide f64 layout the WGSL kernels index as `q[idx * 4 + k]`. The same
//! primitives exist shader-side in `shaders/rigid_common_f64.wgsl`; the two
//! must stay in lockstep.
//!
//! # References
//!
//! Miller, Eleftheriou, Pattnaik, Ndirango, Newns, Martyna,
//! J. Chem. Phys. 116, 8649 (2002): symplectic quaternion scheme ("no-squish").
//! Kamberaj, Low, Neal, J. Chem. Phys. 122, 224114 (2005): NVT rigid bodies.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Cartesian 3-vector with f64 components.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn norm_sq(self) -> f64 {
        self.dot(self)
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.norm_sq().sqrt()
    }

    #[inline]
    pub fn scale(self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.scale(-1.0)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, s: f64) -> Self {
        self.scale(s)
    }
}

/// Quaternion `s + x i + y j + z k`, scalar first.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Quat {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self {
        s: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const ZERO: Self = Self {
        s: 0.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(s: f64, x: f64, y: f64, z: f64) -> Self {
        Self { s, x, y, z }
    }

    /// Unit quaternion for a rotation of `angle` radians about `axis`.
    ///
    /// `axis` need not be normalized; a zero axis yields the identity.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let n = axis.norm();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        let (sh, ch) = (0.5 * angle).sin_cos();
        let u = axis.scale(sh / n);
        Self::new(ch, u.x, u.y, u.z)
    }

    #[inline]
    pub fn dot(self, rhs: Self) -> f64 {
        self.s * rhs.s + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn scale(self, f: f64) -> Self {
        Self {
            s: self.s * f,
            x: self.x * f,
            y: self.y * f,
            z: self.z * f,
        }
    }

    /// `self ⊗ (0, v)`: turns a body-frame vector into a quaternion
    /// derivative (torque → conjugate-momentum rate).
    #[inline]
    #[must_use]
    pub fn mul_vec(self, v: Vec3) -> Self {
        Self {
            s: -self.x * v.x - self.y * v.y - self.z * v.z,
            x: self.s * v.x + self.y * v.z - self.z * v.y,
            y: self.s * v.y + self.z * v.x - self.x * v.z,
            z: self.s * v.z + self.x * v.y - self.y * v.x,
        }
    }

    /// Vector part of `conj(self) ⊗ p`, the inverse of [`Self::mul_vec`]
    /// for unit `self`.
    #[inline]
    #[must_use]
    pub fn inv_mul_vec(self, p: Self) -> Vec3 {
        Vec3 {
            x: -self.x * p.s + self.s * p.x + self.z * p.y - self.y * p.z,
            y: -self.y * p.s - self.z * p.x + self.s * p.y + self.x * p.z,
            z: -self.z * p.s + self.y * p.x - self.x * p.y + self.s * p.z,
        }
    }

    /// Permutation `P_k q` used by the no-squish rotation about body axis k.
    #[inline]
    fn permute(self, axis: BodyAxis) -> Self {
        match axis {
            BodyAxis::One => Self::new(-self.x, self.s, self.z, -self.y),
            BodyAxis::Two => Self::new(-self.y, -self.z, self.s, self.x),
            BodyAxis::Three => Self::new(-self.z, self.y, -self.x, self.s),
        }
    }
}

impl Add for Quat {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            s: self.s + rhs.s,
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for Quat {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            s: self.s - rhs.s,
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl Mul<f64> for Quat {
    type Output = Self;
    #[inline]
    fn mul(self, f: f64) -> Self {
        self.scale(f)
    }
}

/// Periodic image counter (one integer per axis).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Image3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Image3 {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Space-frame coordinates of the three body axes (columns of the rotation
/// matrix body → space).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Frame {
    /// Body axes from a unit orientation quaternion.
    #[must_use]
    pub fn from_quat(q: Quat) -> Self {
        let (s, x, y, z) = (q.s, q.x, q.y, q.z);
        Self {
            ex: Vec3::new(
                s * s + x * x - y * y - z * z,
                2.0 * (x * y + s * z),
                2.0 * (x * z - s * y),
            ),
            ey: Vec3::new(
                2.0 * (x * y - s * z),
                s * s - x * x + y * y - z * z,
                2.0 * (y * z + s * x),
            ),
            ez: Vec3::new(
                2.0 * (x * z + s * y),
                2.0 * (y * z - s * x),
                s * s - x * x - y * y + z * z,
            ),
        }
    }

    /// Space → body: project `v` onto each body axis.
    #[inline]
    pub fn to_body(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.ex.dot(v), self.ey.dot(v), self.ez.dot(v))
    }

    /// Body → space: transpose of [`Self::to_body`].
    #[inline]
    pub fn to_space(&self, b: Vec3) -> Vec3 {
        self.ex * b.x + self.ey * b.y + self.ez * b.z
    }
}

/// Principal body axis for a single no-squish sub-rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyAxis {
    One,
    Two,
    Three,
}

impl BodyAxis {
    /// Principal moment about this axis.
    #[inline]
    pub const fn moment(self, inertia: Vec3) -> f64 {
        match self {
            Self::One => inertia.x,
            Self::Two => inertia.y,
            Self::Three => inertia.z,
        }
    }
}

/// One stage of a no-squish factorisation: rotate about `axis` for
/// `fraction * dt`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoSquishStage {
    pub axis: BodyAxis,
    pub fraction: f64,
}

/// The symmetric 3-2-1-2-3 Trotter factorisation of the free-rotor
/// propagator. Second order and time reversible only in this order.
pub const NO_SQUISH_SEQUENCE: [NoSquishStage; 5] = [
    NoSquishStage {
        axis: BodyAxis::Three,
        fraction: 0.5,
    },
    NoSquishStage {
        axis: BodyAxis::Two,
        fraction: 0.5,
    },
    NoSquishStage {
        axis: BodyAxis::One,
        fraction: 1.0,
    },
    NoSquishStage {
        axis: BodyAxis::Two,
        fraction: 0.5,
    },
    NoSquishStage {
        axis: BodyAxis::Three,
        fraction: 0.5,
    },
];

/// Free rotation about one body axis for time `h`, applied jointly to the
/// conjugate momentum `p` and orientation `q`.
///
/// A zero principal moment freezes rotation about that axis.
#[inline]
pub fn no_squish_rotate(axis: BodyAxis, p: &mut Quat, q: &mut Quat, inertia: Vec3, h: f64) {
    let kq = q.permute(axis);
    let kp = p.permute(axis);
    let moment = axis.moment(inertia);
    let phi = if moment == 0.0 {
        0.0
    } else {
        p.dot(kq) / (4.0 * moment)
    };
    let (s_phi, c_phi) = (h * phi).sin_cos();
    *p = p.scale(c_phi) + kp.scale(s_phi);
    *q = q.scale(c_phi) + kq.scale(s_phi);
}

/// Apply a full stage sequence with base step `dt`.
pub fn no_squish_sequence(
    stages: &[NoSquishStage],
    p: &mut Quat,
    q: &mut Quat,
    inertia: Vec3,
    dt: f64,
) {
    for stage in stages {
        no_squish_rotate(stage.axis, p, q, inertia, stage.fraction * dt);
    }
}

/// Conjugate momentum for body-frame angular momentum `l_body`:
/// `p = 2 q ⊗ (0, L)`.
#[inline]
#[must_use]
pub fn conjugate_from_angular(q: Quat, l_body: Vec3) -> Quat {
    q.mul_vec(l_body).scale(2.0)
}

/// Body-frame angular momentum and angular velocity from `(q, p)`, plus the
/// rotational partial `Σ L_i ω_i` (twice the rotational kinetic energy).
///
/// Both vectors stay in the body frame; no projection through the transposed
/// axis frame is applied here. `RigidBodies::space_angular_momentum` does
/// that rotation for callers that want space-frame L.
///
/// Principal moments of zero yield zero angular velocity on that axis.
#[inline]
#[must_use]
pub fn body_angular_state(q: Quat, p: Quat, inertia: Vec3) -> (Vec3, Vec3, f64) {
    let angmom = q.inv_mul_vec(p).scale(0.5);
    let div = |l: f64, i: f64| if i == 0.0 { 0.0 } else { l / i };
    let angvel = Vec3::new(
        div(angmom.x, inertia.x),
        div(angmom.y, inertia.y),
        div(angmom.z, inertia.z),
    );
    let ke_rot = angmom.dot(angvel);
    (angmom, angvel, ke_rot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tolerances::{EXACT_F64, NO_SQUISH_ORDER_MIN_DIFF, TIME_REVERSAL_ABS};

    fn quat_max_diff(a: Quat, b: Quat) -> f64 {
        [a.s - b.s, a.x - b.x, a.y - b.y, a.z - b.z]
            .iter()
            .fold(0.0f64, |m, d| m.max(d.abs()))
    }

    fn tilted() -> Quat {
        Quat::from_axis_angle(Vec3::new(0.3, -0.5, 0.8), 0.7)
    }

    #[test]
    fn identity_frame_is_canonical_basis() {
        let f = Frame::from_quat(Quat::IDENTITY);
        assert_eq!(f.ex, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(f.ey, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(f.ez, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn frame_is_orthonormal() {
        let f = Frame::from_quat(tilted());
        assert!((f.ex.norm() - 1.0).abs() < EXACT_F64);
        assert!((f.ey.norm() - 1.0).abs() < EXACT_F64);
        assert!((f.ez.norm() - 1.0).abs() < EXACT_F64);
        assert!(f.ex.dot(f.ey).abs() < EXACT_F64);
        assert!(f.ey.dot(f.ez).abs() < EXACT_F64);
        assert!(f.ez.dot(f.ex).abs() < EXACT_F64);
    }

    #[test]
    fn quarter_turn_about_z_maps_x_to_y() {
        let q = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), std::f64::consts::FRAC_PI_2);
        let f = Frame::from_quat(q);
        let ex = f.ex;
        assert!(ex.x.abs() < EXACT_F64 && (ex.y - 1.0).abs() < EXACT_F64);
        // a space-frame y vector is the body x axis
        let b = f.to_body(Vec3::new(0.0, 1.0, 0.0));
        assert!((b.x - 1.0).abs() < EXACT_F64, "got {b:?}");
    }

    #[test]
    fn to_space_inverts_to_body() {
        let f = Frame::from_quat(tilted());
        let v = Vec3::new(1.5, -2.0, 0.25);
        let back = f.to_space(f.to_body(v));
        assert!((back - v).norm() < EXACT_F64);
    }

    #[test]
    fn inv_mul_vec_inverts_mul_vec() {
        let q = tilted();
        let v = Vec3::new(0.4, 1.1, -0.9);
        let back = q.inv_mul_vec(q.mul_vec(v));
        assert!((back - v).norm() < EXACT_F64, "got {back:?}");
    }

    #[test]
    fn conjugate_momentum_round_trips_angular_momentum() {
        let q = tilted();
        let inertia = Vec3::new(1.0, 2.0, 3.0);
        let l = Vec3::new(0.3, -0.6, 0.9);
        let p = conjugate_from_angular(q, l);
        let (angmom, angvel, ke) = body_angular_state(q, p, inertia);
        assert!((angmom - l).norm() < EXACT_F64);
        assert!((angvel - Vec3::new(0.3, -0.3, 0.3)).norm() < EXACT_F64);
        assert!((ke - (0.09 + 0.18 + 0.27)).abs() < EXACT_F64);
    }

    #[test]
    fn zero_moment_gives_zero_angular_velocity() {
        let q = Quat::IDENTITY;
        let p = conjugate_from_angular(q, Vec3::new(1.0, 1.0, 1.0));
        let (_, angvel, _) = body_angular_state(q, p, Vec3::new(0.0, 2.0, 4.0));
        assert_eq!(angvel.x, 0.0);
        assert!((angvel.y - 0.5).abs() < EXACT_F64);
    }

    #[test]
    fn no_squish_rotate_preserves_norms() {
        let mut q = tilted();
        let mut p = conjugate_from_angular(q, Vec3::new(0.5, 0.2, -0.7));
        let p_norm = p.norm();
        for axis in [BodyAxis::One, BodyAxis::Two, BodyAxis::Three] {
            no_squish_rotate(axis, &mut p, &mut q, Vec3::new(1.0, 2.0, 3.0), 0.37);
        }
        assert!((q.norm() - 1.0).abs() < EXACT_F64);
        assert!((p.norm() - p_norm).abs() < EXACT_F64);
    }

    #[test]
    fn no_squish_about_principal_axis_is_pure_spin() {
        // L along body axis 3 of an asymmetric top: steady rotation about z.
        let inertia = Vec3::new(1.0, 2.0, 3.0);
        let mut q = Quat::IDENTITY;
        let mut p = conjugate_from_angular(q, Vec3::new(0.0, 0.0, 3.0));
        let dt = 0.01;
        for _ in 0..100 {
            no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p, &mut q, inertia, dt);
        }
        // ω = 1 about z for t = 1 → rotation angle 1 rad
        let expected = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 1.0);
        assert!(quat_max_diff(q, expected) < 1e-9, "got {q:?}");
    }

    #[test]
    fn no_squish_sequence_is_time_reversible() {
        let inertia = Vec3::new(1.0, 2.0, 3.0);
        let q0 = tilted();
        let p0 = conjugate_from_angular(q0, Vec3::new(0.7, -0.4, 0.5));
        let (mut q, mut p) = (q0, p0);
        no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p, &mut q, inertia, 0.1);
        no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p, &mut q, inertia, -0.1);
        assert!(quat_max_diff(q, q0) < TIME_REVERSAL_ABS);
        assert!(quat_max_diff(p, p0) < TIME_REVERSAL_ABS);
    }

    #[test]
    fn no_squish_order_matters_for_asymmetric_top() {
        let inertia = Vec3::new(1.0, 2.0, 3.0);
        let q0 = Quat::IDENTITY;
        // non-principal angular momentum
        let p0 = conjugate_from_angular(q0, Vec3::new(0.6, 0.5, 0.4));
        let swapped: Vec<NoSquishStage> = NO_SQUISH_SEQUENCE
            .iter()
            .map(|st| NoSquishStage {
                axis: match st.axis {
                    BodyAxis::One => BodyAxis::Three,
                    BodyAxis::Two => BodyAxis::Two,
                    BodyAxis::Three => BodyAxis::One,
                },
                fraction: st.fraction,
            })
            .collect();

        let (mut q_a, mut p_a) = (q0, p0);
        let (mut q_b, mut p_b) = (q0, p0);
        no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p_a, &mut q_a, inertia, 0.1);
        no_squish_sequence(&swapped, &mut p_b, &mut q_b, inertia, 0.1);
        let diff = quat_max_diff(q_a, q_b);
        assert!(
            diff > NO_SQUISH_ORDER_MIN_DIFF,
            "3-2-1-2-3 vs 1-2-3-2-1 should differ, max diff {diff:e}"
        );
    }
}
