// SPDX-License-Identifier: AGPL-3.0-only

//! GPU FP64 compute for the rigid-body kernels.
//!
//! Creates a wgpu device with `SHADER_F64` enabled, and provides helpers
//! for running f64 compute shaders on any Vulkan GPU (NVIDIA proprietary,
//! NVK/nouveau, RADV, etc.).
//!
//! ## Adapter selection
//!
//! Set `HOTSPRING_GPU_ADAPTER` to select a specific GPU:
//!
//! | Value | Behavior |
//! |-------|----------|
//! | `auto` | Same as unset |
//! | `0`, `1`, … | Select adapter by enumeration index |
//! | substring | Case-insensitive name match (e.g. `"titan"`, `"4070"`) |
//! | *(unset)* | Enumerate all adapters, pick first discrete GPU with `SHADER_F64` |
//!
//! `HOTSPRING_WGPU_BACKEND` (`vulkan`, `metal`, `dx12`) restricts the
//! backends wgpu enumerates.
//!
//! ## Module structure
//!
//! - `adapter`: adapter discovery and selection
//! - `buffers`: f64/u32/i32 buffer creation, upload, readback
//! - `dispatch`: command encoding and dispatch

mod adapter;
mod buffers;
mod dispatch;

pub use adapter::{AdapterInfo, AdapterSelector, ADAPTER_ENV, BACKEND_ENV};
pub use buffers::{mapped_bytes_to_f64, mapped_bytes_to_i32};
pub use dispatch::split_workgroups;

use crate::error::RigidError;

/// Storage bindings the widest rigid kernel (step one) needs.
pub const REQUIRED_STORAGE_BUFFERS: u32 = 12;

/// GPU context with FP64 support.
#[must_use]
pub struct GpuF64 {
    pub adapter_name: String,
    pub has_f64: bool,
    /// Largest 1-D workgroup the device accepts.
    pub max_workgroup_size: u32,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

// ── Core accessors ───────────────────────────────────────────────────

impl GpuF64 {
    /// Access the underlying wgpu Device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Access the underlying wgpu Queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

// ── Constructor ──────────────────────────────────────────────────────

impl GpuF64 {
    /// Create GPU device requesting `SHADER_F64`.
    ///
    /// # Errors
    ///
    /// Returns [`RigidError::NoAdapter`] if no compatible adapter is found,
    /// or [`RigidError::DeviceCreation`] if the adapter refuses the device
    /// (typically fewer than twelve storage buffers per stage).
    pub async fn new() -> Result<Self, RigidError> {
        let selected = adapter::select_adapter()?;
        let adapter_info = selected.get_info();
        let adapter_features = selected.features();
        let adapter_limits = selected.limits();

        let mut required_features = wgpu::Features::empty();
        if adapter_features.contains(wgpu::Features::SHADER_F64) {
            required_features |= wgpu::Features::SHADER_F64;
        }

        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: 512 * 1024 * 1024,
            max_buffer_size: 1024 * 1024 * 1024,
            max_storage_buffers_per_shader_stage: REQUIRED_STORAGE_BUFFERS,
            max_compute_workgroup_size_x: adapter_limits.max_compute_workgroup_size_x,
            max_compute_invocations_per_workgroup: adapter_limits
                .max_compute_invocations_per_workgroup,
            ..wgpu::Limits::default()
        };

        let (device, queue) = selected
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("hotSpring rigid device"),
                    required_features,
                    required_limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| RigidError::DeviceCreation(e.to_string()))?;

        let limits = device.limits();
        let max_workgroup_size = limits
            .max_compute_workgroup_size_x
            .min(limits.max_compute_invocations_per_workgroup);

        Ok(Self {
            adapter_name: adapter_info.name,
            has_f64: required_features.contains(wgpu::Features::SHADER_F64),
            max_workgroup_size,
            device,
            queue,
        })
    }

    /// Enumerate all available GPU adapters.
    #[must_use]
    pub fn enumerate_adapters() -> Vec<AdapterInfo> {
        adapter::enumerate_adapters()
    }

    /// Print device capabilities.
    pub fn print_info(&self) {
        println!("  GPU: {}", self.adapter_name);
        println!("  SHADER_F64: {}", if self.has_f64 { "YES" } else { "NO" });
        println!("  Max workgroup size: {}", self.max_workgroup_size);
    }

    /// Print all available adapters to stdout.
    pub fn print_available_adapters() {
        let adapters = Self::enumerate_adapters();
        println!("  Available GPU adapters:");
        for info in &adapters {
            let marker = if info.has_f64 { "✓" } else { "✗" };
            println!("    {marker} {info}");
        }
        if adapters.is_empty() {
            println!("    (none found)");
        }
    }
}

// ── Pipeline creation ────────────────────────────────────────────────

impl GpuF64 {
    /// Compile a WGSL compute shader (entry point `main`) into a pipeline
    /// with an auto-derived bind group layout.
    #[must_use]
    pub fn create_pipeline(&self, wgsl: &str, label: &str) -> wgpu::ComputePipeline {
        let shader_module = self
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });

        self.device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &shader_module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_byte_roundtrip() {
        let original = [0.0, 1.0, -1.0, std::f64::consts::PI, 1e-308, 1e308];
        let bytes: Vec<u8> = original.iter().flat_map(|v| v.to_le_bytes()).collect();
        let recovered = mapped_bytes_to_f64(&bytes);
        assert_eq!(recovered.as_slice(), &original);
    }

    #[test]
    fn i32_byte_roundtrip() {
        let original = [0i32, 1, -1, i32::MAX, i32::MIN, -7];
        let bytes: Vec<u8> = original.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(mapped_bytes_to_i32(&bytes).as_slice(), &original);
    }

    #[test]
    #[ignore = "requires GPU"]
    fn device_reports_rigid_limits() {
        let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
        let gpu = rt.block_on(GpuF64::new()).expect("GPU device");
        assert!(gpu.max_workgroup_size >= 64);
        assert!(
            gpu.device().limits().max_storage_buffers_per_shader_stage
                >= REQUIRED_STORAGE_BUFFERS
        );
    }
}
