// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for rigid-body GPU setup, launch configuration, and config loading.
//!
//! The step and reduction kernels themselves are infallible: contract
//! violations are caller preconditions, not runtime errors. Everything that
//! *can* fail happens at setup (device, pipelines, config) or at readback.

use std::fmt;

/// Errors arising from GPU initialization, launch setup, config loading, or
/// pre-flight body validation.
#[derive(Debug)]
pub enum RigidError {
    /// No compatible GPU adapter was found by wgpu.
    NoAdapter,

    /// GPU device creation or buffer mapping failed (wraps the wgpu message).
    DeviceCreation(String),

    /// GPU lacks the `SHADER_F64` feature required for the f64 kernels.
    NoShaderF64,

    /// A dispatch or readback on an existing device failed.
    GpuCompute(String),

    /// Launch configuration rejected at setup (block width, device limits).
    InvalidLaunch(String),

    /// Configuration file could not be read, parsed, or holds invalid values.
    InvalidConfig(String),

    /// Pre-flight check found body data that breaks a kernel precondition.
    ContractViolation(String),
}

impl fmt::Display for RigidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "No GPU adapter found"),
            Self::DeviceCreation(e) => write!(f, "Failed to create GPU device: {e}"),
            Self::NoShaderF64 => {
                write!(
                    f,
                    "GPU does not support SHADER_F64; cannot run f64 rigid-body kernels"
                )
            }
            Self::GpuCompute(e) => write!(f, "GPU compute failed: {e}"),
            Self::InvalidLaunch(msg) => write!(f, "Invalid launch configuration: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::ContractViolation(msg) => write!(f, "Kernel precondition violated: {msg}"),
        }
    }
}

impl std::error::Error for RigidError {}
