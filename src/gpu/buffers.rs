// SPDX-License-Identifier: AGPL-3.0-only

//! GPU buffer creation, upload, and readback for f64/u32/i32 body data.
//!
//! wgpu rejects zero-sized storage bindings, so every creator rounds an
//! empty request up to one element. Callers track logical lengths.

use super::GpuF64;
use crate::error::RigidError;

const STORAGE_RW: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

fn padded_size(count: usize, elem: usize) -> u64 {
    (count.max(1) * elem) as u64
}

impl GpuF64 {
    /// Create a storage buffer initialised from f64 data.
    #[must_use]
    pub fn create_f64_buffer(&self, data: &[f64], label: &str) -> wgpu::Buffer {
        self.create_init_buffer(bytemuck::cast_slice(data), 8, STORAGE_RW, label)
    }

    /// Create a zeroed writable storage buffer for `count` f64 values.
    #[must_use]
    pub fn create_f64_output_buffer(&self, count: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: padded_size(count, 8),
            usage: STORAGE_RW,
            mapped_at_creation: false,
        })
    }

    /// Create a storage buffer initialised from u32 data (group indices).
    #[must_use]
    pub fn create_u32_buffer(&self, data: &[u32], label: &str) -> wgpu::Buffer {
        self.create_init_buffer(bytemuck::cast_slice(data), 4, STORAGE_RW, label)
    }

    /// Create a storage buffer initialised from i32 data (periodic images).
    #[must_use]
    pub fn create_i32_buffer(&self, data: &[i32], label: &str) -> wgpu::Buffer {
        self.create_init_buffer(bytemuck::cast_slice(data), 4, STORAGE_RW, label)
    }

    /// Create a uniform buffer from raw bytes. Rewritable with
    /// [`Self::upload_bytes`].
    #[must_use]
    pub fn create_uniform_buffer(&self, data: &[u8], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Create a staging buffer for reading results back to CPU
    #[must_use]
    pub fn create_staging_buffer(&self, size: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(4) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_init_buffer(
        &self,
        bytes: &[u8],
        elem: usize,
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        if bytes.is_empty() {
            return self.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: padded_size(0, elem),
                usage,
                mapped_at_creation: false,
            });
        }
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage,
            })
    }

    /// Upload f64 data to a GPU storage buffer (overwrites from offset 0).
    pub fn upload_f64(&self, buffer: &wgpu::Buffer, data: &[f64]) {
        self.upload_bytes(buffer, bytemuck::cast_slice(data));
    }

    /// Upload i32 data to a GPU storage buffer (overwrites from offset 0).
    pub fn upload_i32(&self, buffer: &wgpu::Buffer, data: &[i32]) {
        self.upload_bytes(buffer, bytemuck::cast_slice(data));
    }

    /// Write raw bytes at offset 0. Empty writes are skipped.
    pub fn upload_bytes(&self, buffer: &wgpu::Buffer, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.queue().write_buffer(buffer, 0, bytes);
        }
    }

    /// Read back `count` f64 values from a GPU buffer via staging copy.
    ///
    /// # Errors
    ///
    /// Returns [`RigidError::GpuCompute`] if the GPU map callback fails or
    /// the channel is dropped.
    pub fn read_back_f64(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<f64>, RigidError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let bytes = self.read_back_bytes(buffer, count * 8)?;
        Ok(mapped_bytes_to_f64(&bytes))
    }

    /// Read back `count` i32 values from a GPU buffer via staging copy.
    ///
    /// # Errors
    ///
    /// Returns [`RigidError::GpuCompute`] if the GPU map callback fails or
    /// the channel is dropped.
    pub fn read_back_i32(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<i32>, RigidError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let bytes = self.read_back_bytes(buffer, count * 4)?;
        Ok(mapped_bytes_to_i32(&bytes))
    }

    fn read_back_bytes(&self, buffer: &wgpu::Buffer, size: usize) -> Result<Vec<u8>, RigidError> {
        let staging = self.create_staging_buffer(size, "readback");
        let mut encoder = self.begin_encoder("readback");
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size as u64);
        self.submit_encoder(encoder);

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device().poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| RigidError::GpuCompute("GPU map callback: channel recv failed".into()))?
            .map_err(|e| RigidError::GpuCompute(format!("GPU buffer mapping: {e}")))?;

        let data = slice.get_mapped_range();
        let result = data.to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }
}

/// Convert mapped GPU buffer bytes to f64 values.
///
/// GPU mapped buffers are typically page-aligned, so `bytemuck::try_cast_slice`
/// will succeed. Falls back to manual byte conversion if alignment is wrong.
#[must_use]
pub fn mapped_bytes_to_f64(data: &[u8]) -> Vec<f64> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(8)
                .map(|chunk| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    f64::from_le_bytes(b)
                })
                .collect()
        },
        <[f64]>::to_vec,
    )
}

/// Convert mapped GPU buffer bytes to i32 values (same fallback as f64).
#[must_use]
pub fn mapped_bytes_to_i32(data: &[u8]) -> Vec<i32> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(4)
                .map(|chunk| {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(chunk);
                    i32::from_le_bytes(b)
                })
                .collect()
        },
        <[i32]>::to_vec,
    )
}
