// SPDX-License-Identifier: AGPL-3.0-only

//! Rigid-body WGSL shader sources (f64).
//!
//! Each kernel is compiled as `common preamble + kernel body`, with the
//! `{{WG_SIZE}}` placeholder replaced by the launch block width. None of
//! the kernels call f64 `exp`/`sin`/`cos` builtins: the thermostat scale
//! factors are computed on the host and the preamble carries a polynomial
//! sin/cos, so they compile on every `SHADER_F64` driver.

/// Placeholder substituted with the workgroup width at pipeline build.
pub const WG_SIZE_PLACEHOLDER: &str = "{{WG_SIZE}}";

// ═══════════════════════════════════════════════════════════════════
// Shared preamble: Params uniform, sin/cos, quaternion helpers
// ═══════════════════════════════════════════════════════════════════

pub const SHADER_RIGID_COMMON: &str = include_str!("shaders/rigid_common_f64.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Step One: half-kick + drift + wrap + no-squish rotation (f64)
// ═══════════════════════════════════════════════════════════════════
//
// Bindings: params, pos, vel, orient, conjqm, angmom, angvel, image,
// ke_partial, props, force, torque, group. Twelve storage buffers.

pub const SHADER_RIGID_STEP_ONE: &str = include_str!("shaders/rigid_step_one_f64.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Step Two: closing kicks (f64)
// ═══════════════════════════════════════════════════════════════════
//
// Bindings: params, vel, orient, conjqm, angmom, angvel, ke_partial,
// props, force, torque, group.

pub const SHADER_RIGID_STEP_TWO: &str = include_str!("shaders/rigid_step_two_f64.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Kinetic-energy block reduction (f64), single workgroup
// ═══════════════════════════════════════════════════════════════════
//
// Bindings: params, ke_partial, ke_sum.

pub const SHADER_RIGID_REDUCE_KSUM: &str = include_str!("shaders/rigid_reduce_ksum_f64.wgsl");

/// Full WGSL source for `kernel`: preamble prepended, workgroup width
/// substituted.
#[must_use]
pub fn specialize(kernel: &str, workgroup_size: u32) -> String {
    let mut source = String::with_capacity(SHADER_RIGID_COMMON.len() + kernel.len() + 1);
    source.push_str(SHADER_RIGID_COMMON);
    source.push('\n');
    source.push_str(kernel);
    source.replace(WG_SIZE_PLACEHOLDER, &workgroup_size.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_bindings(src: &str) -> usize {
        src.matches("var<storage").count()
    }

    #[test]
    fn specialize_replaces_every_placeholder() {
        for kernel in [
            SHADER_RIGID_STEP_ONE,
            SHADER_RIGID_STEP_TWO,
            SHADER_RIGID_REDUCE_KSUM,
        ] {
            let src = specialize(kernel, 128);
            assert!(!src.contains(WG_SIZE_PLACEHOLDER));
            assert!(src.contains("@workgroup_size(128)"));
            assert!(src.contains("struct Params"));
            assert!(src.contains("fn main("));
        }
    }

    #[test]
    fn reduce_scratch_matches_block_width() {
        let src = specialize(SHADER_RIGID_REDUCE_KSUM, 64);
        assert!(src.contains("array<f64, 64>"));
        assert!(src.contains("64u >> 1u"));
    }

    #[test]
    fn storage_binding_counts_fit_device_request() {
        assert_eq!(
            storage_bindings(SHADER_RIGID_STEP_ONE),
            crate::gpu::REQUIRED_STORAGE_BUFFERS as usize
        );
        assert_eq!(storage_bindings(SHADER_RIGID_STEP_TWO), 10);
        assert_eq!(storage_bindings(SHADER_RIGID_REDUCE_KSUM), 2);
    }

    #[test]
    fn kernels_avoid_f64_transcendental_builtins() {
        for src in [
            SHADER_RIGID_COMMON,
            SHADER_RIGID_STEP_ONE,
            SHADER_RIGID_STEP_TWO,
            SHADER_RIGID_REDUCE_KSUM,
        ] {
            for builtin in ["exp(", " sin(", " cos("] {
                assert!(!src.contains(builtin), "found {builtin}");
            }
        }
    }

    #[test]
    fn step_two_never_writes_configuration() {
        assert!(!SHADER_RIGID_STEP_TWO.contains("var<storage, read_write> pos"));
        assert!(!SHADER_RIGID_STEP_TWO.contains("var<storage, read_write> image"));
        assert!(SHADER_RIGID_STEP_TWO.contains("var<storage, read> orient"));
    }
}
