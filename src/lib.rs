// SPDX-License-Identifier: AGPL-3.0-only

//! hotSpring rigid-body NVT core
//!
//! Per-timestep kernels for a population of rigid bodies under a
//! Nosé–Hoover thermostat: a half-kick/drift/rotate step, a closing
//! half-kick step, and the kinetic-energy reduction that feeds the
//! thermostat. Every kernel exists as a CPU reference (rayon) and an f64
//! WGSL compute shader (wgpu).
//!
//! ## Modules
//!   - `rigid`: quaternion math, body state, step kernels, reduction,
//!     thermostat, GPU pipelines, and the run driver
//!   - `gpu`: wgpu device with `SHADER_F64`, buffer and dispatch helpers
//!   - `tolerances`: named thresholds for tests and validation
//!   - `validation`: pass/fail harness for validation binaries
//!   - `error`: `RigidError`
//!
//! ## Validation binaries
//!   - `validate_rigid_nvt`: integrator properties, reduction parity, GPU vs CPU

pub mod error;
pub mod gpu;
pub mod rigid;
pub mod tolerances;
pub mod validation;
