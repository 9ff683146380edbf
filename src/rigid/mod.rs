// SPDX-License-Identifier: AGPL-3.0-only

//! Rigid-body NVT integration with the no-squish quaternion scheme.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `quaternion` | Vec3/Quat math, body frame, no-squish free rotation |
//! | `state` | SoA body arrays, group, box, thermostat inputs |
//! | `step_one` | Thermostat-scaled half-kick, drift, wrap, rotation |
//! | `step_two` | Closing half-kick after the force refresh |
//! | `reduce` | Blocked kinetic-energy reduction |
//! | `thermostat` | Nosé–Hoover rate update from the reduced sums, kT schedule |
//! | `config` | Launch widths, backend choice, JSON run config |
//! | `shaders` | f64 WGSL sources and specialization |
//! | `gpu_kernels` | wgpu pipelines, buffers, dispatch for the three kernels |
//! | `integrator` | `RigidNvt` step loop and force seam |
//!
//! Reference: Kamberaj, Low, Neal, J. Chem. Phys. 122, 224114 (2005).

pub mod config;
pub mod gpu_kernels;
pub mod integrator;
pub mod quaternion;
pub mod reduce;
pub mod shaders;
pub mod state;
pub mod step_one;
pub mod step_two;
pub mod thermostat;

pub use config::{KernelBackend, LaunchConfig, RigidNvtConfig};
pub use gpu_kernels::GpuRigidNvt;
pub use integrator::{ForceCompute, HarmonicWell, KineticRecord, RigidNvt, ZeroLoad};
pub use quaternion::{Image3, Quat, Vec3};
pub use reduce::reduce_kinetic_energy;
pub use state::{
    GroupMembers, KineticSums, PartialKinetic, RigidBodies, SimBox, ThermostatRates,
};
pub use step_one::advance_step_one;
pub use step_two::advance_step_two;
pub use thermostat::{KtSchedule, NoseHooverRigid};
