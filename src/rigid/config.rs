// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration and per-invocation launch configuration.
//!
//! [`LaunchConfig`] is the explicit value object the step and reduction
//! calls receive: block sizing plus the cached backend decision, computed
//! once at setup. [`RigidNvtConfig`] is the serde-loaded run description
//! the driver and validation binary consume.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::thermostat::KtSchedule;
use crate::error::RigidError;
use crate::gpu::GpuF64;

/// Default threads per workgroup for the step kernels.
pub const DEFAULT_BLOCK_SIZE: u32 = 64;
/// Default workgroup width for the kinetic-energy reduction.
pub const DEFAULT_REDUCE_BLOCK_SIZE: u32 = 256;

/// Where the kernels execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelBackend {
    /// rayon data-parallel reference kernels.
    Cpu,
    /// wgpu f64 compute shaders.
    Gpu,
}

/// Block sizing and backend selection, validated at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    block_size: u32,
    reduce_block_size: u32,
    backend: KernelBackend,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            reduce_block_size: DEFAULT_REDUCE_BLOCK_SIZE,
            backend: KernelBackend::Cpu,
        }
    }
}

impl LaunchConfig {
    /// Build a launch configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RigidError::InvalidLaunch`] if either width is zero, or the
    /// reduction width is not a power of two (the tree halves it each round).
    pub fn new(
        block_size: u32,
        reduce_block_size: u32,
        backend: KernelBackend,
    ) -> Result<Self, RigidError> {
        if block_size == 0 {
            return Err(RigidError::InvalidLaunch("block size must be non-zero".into()));
        }
        if !reduce_block_size.is_power_of_two() {
            return Err(RigidError::InvalidLaunch(format!(
                "reduction block width {reduce_block_size} is not a power of two"
            )));
        }
        Ok(Self {
            block_size,
            reduce_block_size,
            backend,
        })
    }

    /// CPU launch with the given widths.
    ///
    /// # Errors
    ///
    /// As [`Self::new`].
    pub fn cpu(block_size: u32, reduce_block_size: u32) -> Result<Self, RigidError> {
        Self::new(block_size, reduce_block_size, KernelBackend::Cpu)
    }

    /// Pick the backend from device capability and check both widths
    /// against the device workgroup limit.
    ///
    /// A device without `SHADER_F64` yields a CPU launch.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidLaunch`] for widths the device cannot run.
    pub fn for_device(
        gpu: &GpuF64,
        block_size: u32,
        reduce_block_size: u32,
    ) -> Result<Self, RigidError> {
        let backend = if gpu.has_f64 {
            KernelBackend::Gpu
        } else {
            KernelBackend::Cpu
        };
        let cfg = Self::new(block_size, reduce_block_size, backend)?;
        if backend == KernelBackend::Gpu {
            let limit = gpu.max_workgroup_size;
            if block_size > limit || reduce_block_size > limit {
                return Err(RigidError::InvalidLaunch(format!(
                    "workgroup width {} exceeds device limit {limit}",
                    block_size.max(reduce_block_size)
                )));
            }
        }
        Ok(cfg)
    }

    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    #[must_use]
    pub const fn reduce_block_size(&self) -> u32 {
        self.reduce_block_size
    }

    #[must_use]
    pub const fn backend(&self) -> KernelBackend {
        self.backend
    }

    /// Workgroups needed to cover `items` threads.
    #[must_use]
    pub const fn grid_size(&self, items: u32) -> u32 {
        items.div_ceil(self.block_size)
    }
}

fn default_label() -> String {
    "rigid_nvt".to_string()
}

const fn default_dump_step() -> usize {
    100
}

const fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

const fn default_reduce_block_size() -> u32 {
    DEFAULT_REDUCE_BLOCK_SIZE
}

/// Rigid-body NVT run parameters in reduced units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigidNvtConfig {
    /// Label for this run
    #[serde(default = "default_label")]
    pub label: String,
    /// Timestep Δt
    pub dt: f64,
    /// Target temperature `k_B T`: a number, or a linear ramp
    pub kt: KtSchedule,
    /// Thermostat time constant τ (in time units, not steps)
    pub tau: f64,
    /// Number of full steps
    pub steps: usize,
    /// Record interval
    #[serde(default = "default_dump_step")]
    pub dump_step: usize,
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    #[serde(default = "default_reduce_block_size")]
    pub reduce_block_size: u32,
    #[serde(default)]
    pub verbose: bool,
}

impl RigidNvtConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidConfig`] on malformed JSON, unknown fields, or
    /// values rejected by [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, RigidError> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| RigidError::InvalidConfig(format!("parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// Uses streaming `from_reader` rather than reading to a string first.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidConfig`] if the file cannot be opened or fails
    /// [`Self::from_json_str`]'s checks.
    pub fn load(path: &Path) -> Result<Self, RigidError> {
        let file = std::fs::File::open(path)
            .map_err(|e| RigidError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let reader = std::io::BufReader::new(file);
        let cfg: Self = serde_json::from_reader(reader)
            .map_err(|e| RigidError::InvalidConfig(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), RigidError> {
        let (kt_start, kt_end) = self.kt.endpoints();
        let positive = [
            ("dt", self.dt),
            ("kt", kt_start),
            ("kt", kt_end),
            ("tau", self.tau),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(RigidError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {v}"
                )));
            }
        }
        if self.dump_step == 0 {
            return Err(RigidError::InvalidConfig("dump_step must be >= 1".into()));
        }
        self.launch(KernelBackend::Cpu)
            .map_err(|e| RigidError::InvalidConfig(e.to_string()))?;
        Ok(())
    }

    /// Launch configuration for this run on the given backend.
    ///
    /// # Errors
    ///
    /// As [`LaunchConfig::new`].
    pub fn launch(&self, backend: KernelBackend) -> Result<LaunchConfig, RigidError> {
        LaunchConfig::new(self.block_size, self.reduce_block_size, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_rejects_bad_widths() {
        assert!(LaunchConfig::cpu(0, 256).is_err());
        assert!(LaunchConfig::cpu(64, 48).is_err());
        assert!(LaunchConfig::cpu(64, 0).is_err());
        let ok = LaunchConfig::cpu(96, 128).expect("valid widths");
        assert_eq!(ok.block_size(), 96);
        assert_eq!(ok.reduce_block_size(), 128);
        assert_eq!(ok.backend(), KernelBackend::Cpu);
    }

    #[test]
    fn grid_covers_all_items() {
        let cfg = LaunchConfig::cpu(64, 256).expect("valid");
        assert_eq!(cfg.grid_size(0), 0);
        assert_eq!(cfg.grid_size(1), 1);
        assert_eq!(cfg.grid_size(64), 1);
        assert_eq!(cfg.grid_size(65), 2);
    }

    #[test]
    fn json_defaults_fill_optional_fields() {
        let cfg = RigidNvtConfig::from_json_str(r#"{"dt": 0.005, "kt": 1.0, "tau": 0.5, "steps": 10}"#)
            .expect("minimal config");
        assert_eq!(cfg.label, "rigid_nvt");
        assert_eq!(cfg.dump_step, 100);
        assert_eq!(cfg.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(cfg.reduce_block_size, DEFAULT_REDUCE_BLOCK_SIZE);
        assert!(!cfg.verbose);
    }

    #[test]
    fn json_rejects_bad_values_and_unknown_fields() {
        let neg_dt = r#"{"dt": -0.1, "kt": 1.0, "tau": 0.5, "steps": 10}"#;
        assert!(matches!(
            RigidNvtConfig::from_json_str(neg_dt),
            Err(RigidError::InvalidConfig(_))
        ));
        let bad_width =
            r#"{"dt": 0.1, "kt": 1.0, "tau": 0.5, "steps": 10, "reduce_block_size": 100}"#;
        assert!(RigidNvtConfig::from_json_str(bad_width).is_err());
        let unknown = r#"{"dt": 0.1, "kt": 1.0, "tau": 0.5, "steps": 10, "gamma": 3}"#;
        assert!(RigidNvtConfig::from_json_str(unknown).is_err());
        assert!(RigidNvtConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = RigidNvtConfig {
            label: "dimers".into(),
            dt: 0.002,
            kt: KtSchedule::Ramp {
                from: 1.5,
                to: 0.5,
                steps: 400,
            },
            tau: 0.2,
            steps: 500,
            dump_step: 50,
            block_size: 128,
            reduce_block_size: 64,
            verbose: true,
        };
        let json = serde_json::to_string(&cfg).expect("serialize");
        assert_eq!(RigidNvtConfig::from_json_str(&json).expect("parse"), cfg);
    }

    #[test]
    fn kt_ramp_loads_and_endpoints_are_checked() {
        let ramp = r#"{"dt": 0.005, "kt": {"from": 0.5, "to": 2.0, "steps": 1000}, "tau": 0.5, "steps": 10}"#;
        let cfg = RigidNvtConfig::from_json_str(ramp).expect("ramp config");
        assert_eq!(
            cfg.kt,
            KtSchedule::Ramp {
                from: 0.5,
                to: 2.0,
                steps: 1000
            }
        );
        let cooling_to_zero =
            r#"{"dt": 0.005, "kt": {"from": 1.0, "to": 0.0, "steps": 10}, "tau": 0.5, "steps": 10}"#;
        assert!(matches!(
            RigidNvtConfig::from_json_str(cooling_to_zero),
            Err(RigidError::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RigidNvtConfig::load(Path::new("/nonexistent/rigid.json"))
            .expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/rigid.json"));
    }
}
