// SPDX-License-Identifier: AGPL-3.0-only

//! GPU-resident rigid-body state and the three f64 kernel dispatches.
//!
//! Body arrays are uploaded once and stay on the device; only the force
//! and torque arrays are refreshed per step, and the reduction reads back
//! two scalars. Full state comes back at dump points via [`GpuRigidNvt::download`].

use super::config::LaunchConfig;
use super::quaternion::{Image3, Quat, Vec3};
use super::shaders;
use super::state::{
    GroupMembers, KineticSums, PartialKinetic, RigidBodies, SimBox, StepCoefficients,
    ThermostatRates,
};
use crate::error::RigidError;
use crate::gpu::GpuF64;

/// Uniform block shared by all three kernels. Layout matches `struct Params`
/// in `rigid_common_f64.wgsl` (96 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RigidParams {
    pub dt: f64,
    pub scale_t: f64,
    pub scale_r: f64,
    pub half_dt: f64,
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub inv_lx: f64,
    pub inv_ly: f64,
    pub inv_lz: f64,
    pub n_group: u32,
    pub n_bodies: u32,
    pub _pad: [u32; 2],
}

impl RigidParams {
    #[must_use]
    pub fn new(coeffs: &StepCoefficients, sim_box: &SimBox, n_group: u32, n_bodies: u32) -> Self {
        Self {
            dt: coeffs.dt,
            scale_t: coeffs.scale_t,
            scale_r: coeffs.scale_r,
            half_dt: coeffs.half_dt,
            lx: sim_box.lengths.x,
            ly: sim_box.lengths.y,
            lz: sim_box.lengths.z,
            inv_lx: sim_box.inv_lengths.x,
            inv_ly: sim_box.inv_lengths.y,
            inv_lz: sim_box.inv_lengths.z,
            n_group,
            n_bodies,
            _pad: [0; 2],
        }
    }
}

/// `[m, Ix, Iy, Iz]` per body.
#[must_use]
pub fn pack_props(bodies: &RigidBodies) -> Vec<f64> {
    bodies
        .mass
        .iter()
        .zip(&bodies.inertia)
        .flat_map(|(&m, i)| [m, i.x, i.y, i.z])
        .collect()
}

fn unpack<T: bytemuck::Pod>(flat: &[f64], dst: &mut [T], name: &str) -> Result<(), RigidError> {
    let typed: &[T] = bytemuck::try_cast_slice(flat)
        .map_err(|e| RigidError::GpuCompute(format!("readback `{name}`: {e}")))?;
    if typed.len() != dst.len() {
        return Err(RigidError::GpuCompute(format!(
            "readback `{name}`: {} entries, expected {}",
            typed.len(),
            dst.len()
        )));
    }
    dst.copy_from_slice(typed);
    Ok(())
}

/// Device buffers, pipelines and bind groups for one body population.
pub struct GpuRigidNvt {
    n_bodies: usize,
    n_group: u32,
    launch: LaunchConfig,
    sim_box: SimBox,

    pos: wgpu::Buffer,
    vel: wgpu::Buffer,
    orient: wgpu::Buffer,
    conjqm: wgpu::Buffer,
    angmom: wgpu::Buffer,
    angvel: wgpu::Buffer,
    image: wgpu::Buffer,
    ke_partial: wgpu::Buffer,
    props: wgpu::Buffer,
    force: wgpu::Buffer,
    torque: wgpu::Buffer,
    // bound in both step kernels; never rewritten
    _group: wgpu::Buffer,
    params: wgpu::Buffer,
    ke_sum: wgpu::Buffer,

    step_one_pipeline: wgpu::ComputePipeline,
    step_two_pipeline: wgpu::ComputePipeline,
    reduce_pipeline: wgpu::ComputePipeline,
    step_one_bg: wgpu::BindGroup,
    step_two_bg: wgpu::BindGroup,
    reduce_bg: wgpu::BindGroup,
}

impl GpuRigidNvt {
    /// Upload `bodies` and `group`, compile the kernels at the launch
    /// widths, and build the bind groups.
    ///
    /// # Errors
    ///
    /// [`RigidError::NoShaderF64`] on a device without f64 shaders.
    pub fn new(
        gpu: &GpuF64,
        bodies: &RigidBodies,
        group: &GroupMembers,
        sim_box: SimBox,
        launch: LaunchConfig,
    ) -> Result<Self, RigidError> {
        if !gpu.has_f64 {
            return Err(RigidError::NoShaderF64);
        }
        let n = bodies.len();

        let pos = gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.position), "rigid_pos");
        let vel = gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.velocity), "rigid_vel");
        let orient =
            gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.orientation), "rigid_orient");
        let conjqm = gpu.create_f64_buffer(
            bytemuck::cast_slice(&bodies.conjugate_momentum),
            "rigid_conjqm",
        );
        let angmom =
            gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.angular_momentum), "rigid_angmom");
        let angvel =
            gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.angular_velocity), "rigid_angvel");
        let image = gpu.create_i32_buffer(bytemuck::cast_slice(&bodies.image), "rigid_image");
        let ke_partial = gpu.create_f64_output_buffer(2 * n, "rigid_ke_partial");
        let props = gpu.create_f64_buffer(&pack_props(bodies), "rigid_props");
        let force = gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.force), "rigid_force");
        let torque = gpu.create_f64_buffer(bytemuck::cast_slice(&bodies.torque), "rigid_torque");
        let group_buf = gpu.create_u32_buffer(group.as_slice(), "rigid_group");
        let ke_sum = gpu.create_f64_output_buffer(2, "rigid_ke_sum");

        let n_group = group.len() as u32;
        let initial = RigidParams::new(
            &StepCoefficients::new(0.0, ThermostatRates::default()),
            &sim_box,
            n_group,
            n as u32,
        );
        let params = gpu.create_uniform_buffer(bytemuck::bytes_of(&initial), "rigid_params");

        let step_one_pipeline = gpu.create_pipeline(
            &shaders::specialize(shaders::SHADER_RIGID_STEP_ONE, launch.block_size()),
            "rigid_step_one_f64",
        );
        let step_two_pipeline = gpu.create_pipeline(
            &shaders::specialize(shaders::SHADER_RIGID_STEP_TWO, launch.block_size()),
            "rigid_step_two_f64",
        );
        let reduce_pipeline = gpu.create_pipeline(
            &shaders::specialize(shaders::SHADER_RIGID_REDUCE_KSUM, launch.reduce_block_size()),
            "rigid_reduce_ksum_f64",
        );

        let step_one_bg = gpu.create_bind_group(
            &step_one_pipeline,
            &[
                &params,
                &pos,
                &vel,
                &orient,
                &conjqm,
                &angmom,
                &angvel,
                &image,
                &ke_partial,
                &props,
                &force,
                &torque,
                &group_buf,
            ],
            "rigid_step_one_bg",
        );
        let step_two_bg = gpu.create_bind_group(
            &step_two_pipeline,
            &[
                &params,
                &vel,
                &orient,
                &conjqm,
                &angmom,
                &angvel,
                &ke_partial,
                &props,
                &force,
                &torque,
                &group_buf,
            ],
            "rigid_step_two_bg",
        );
        let reduce_bg = gpu.create_bind_group(
            &reduce_pipeline,
            &[&params, &ke_partial, &ke_sum],
            "rigid_reduce_bg",
        );

        Ok(Self {
            n_bodies: n,
            n_group,
            launch,
            sim_box,
            pos,
            vel,
            orient,
            conjqm,
            angmom,
            angvel,
            image,
            ke_partial,
            props,
            force,
            torque,
            _group: group_buf,
            params,
            ke_sum,
            step_one_pipeline,
            step_two_pipeline,
            reduce_pipeline,
            step_one_bg,
            step_two_bg,
            reduce_bg,
        })
    }

    fn write_params(&self, gpu: &GpuF64, rates: ThermostatRates, dt: f64) {
        let params = RigidParams::new(
            &StepCoefficients::new(dt, rates),
            &self.sim_box,
            self.n_group,
            self.n_bodies as u32,
        );
        gpu.upload_bytes(&self.params, bytemuck::bytes_of(&params));
    }

    fn run_group_kernel(
        &self,
        gpu: &GpuF64,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        label: &str,
    ) {
        if self.n_group == 0 {
            return;
        }
        let mut encoder = gpu.begin_encoder(label);
        GpuF64::encode_pass(
            &mut encoder,
            pipeline,
            bind_group,
            self.launch.grid_size(self.n_group),
            label,
        );
        gpu.submit_encoder(encoder);
    }

    /// Overwrite the device kinematics and mass properties from the host.
    ///
    /// # Errors
    ///
    /// [`RigidError::GpuCompute`] if `bodies` does not match the uploaded
    /// population size.
    pub fn upload_state(&self, gpu: &GpuF64, bodies: &RigidBodies) -> Result<(), RigidError> {
        if bodies.len() != self.n_bodies {
            return Err(RigidError::GpuCompute(format!(
                "upload of {} bodies, device holds {}",
                bodies.len(),
                self.n_bodies
            )));
        }
        gpu.upload_f64(&self.pos, bytemuck::cast_slice(&bodies.position));
        gpu.upload_f64(&self.vel, bytemuck::cast_slice(&bodies.velocity));
        gpu.upload_f64(&self.orient, bytemuck::cast_slice(&bodies.orientation));
        gpu.upload_f64(&self.conjqm, bytemuck::cast_slice(&bodies.conjugate_momentum));
        gpu.upload_f64(&self.angmom, bytemuck::cast_slice(&bodies.angular_momentum));
        gpu.upload_f64(&self.angvel, bytemuck::cast_slice(&bodies.angular_velocity));
        gpu.upload_i32(&self.image, bytemuck::cast_slice(&bodies.image));
        gpu.upload_f64(&self.props, &pack_props(bodies));
        self.upload_loads(gpu, bodies);
        Ok(())
    }

    /// Refresh force and torque from the host arrays.
    pub fn upload_loads(&self, gpu: &GpuF64, bodies: &RigidBodies) {
        gpu.upload_f64(&self.force, bytemuck::cast_slice(&bodies.force));
        gpu.upload_f64(&self.torque, bytemuck::cast_slice(&bodies.torque));
    }

    /// Step one on the device. A group of size zero submits nothing.
    pub fn step_one(&self, gpu: &GpuF64, rates: ThermostatRates, dt: f64) {
        self.write_params(gpu, rates, dt);
        self.run_group_kernel(gpu, &self.step_one_pipeline, &self.step_one_bg, "rigid_step_one");
    }

    /// Step two on the device; call after [`Self::upload_loads`].
    pub fn step_two(&self, gpu: &GpuF64, rates: ThermostatRates, dt: f64) {
        self.write_params(gpu, rates, dt);
        self.run_group_kernel(gpu, &self.step_two_pipeline, &self.step_two_bg, "rigid_step_two");
    }

    /// Single-workgroup kinetic reduction over all bodies; reads back two
    /// scalars.
    ///
    /// # Errors
    ///
    /// [`RigidError::GpuCompute`] if readback fails.
    pub fn reduce(&self, gpu: &GpuF64) -> Result<KineticSums, RigidError> {
        let mut encoder = gpu.begin_encoder("rigid_reduce");
        GpuF64::encode_pass(
            &mut encoder,
            &self.reduce_pipeline,
            &self.reduce_bg,
            1,
            "rigid_reduce",
        );
        gpu.submit_encoder(encoder);
        let sums = gpu.read_back_f64(&self.ke_sum, 2)?;
        Ok(KineticSums {
            translational: sums[0],
            rotational: sums[1],
        })
    }

    /// Per-body partial sums as last written by either step.
    ///
    /// # Errors
    ///
    /// [`RigidError::GpuCompute`] if readback fails.
    pub fn download_partials(&self, gpu: &GpuF64) -> Result<PartialKinetic, RigidError> {
        let n = self.n_bodies;
        let mut flat = gpu.read_back_f64(&self.ke_partial, 2 * n)?;
        let rotational = flat.split_off(n);
        Ok(PartialKinetic {
            translational: flat,
            rotational,
        })
    }

    /// Copy the device kinematics back into `bodies`. Mass, inertia,
    /// force and torque are host-owned and left alone.
    ///
    /// # Errors
    ///
    /// [`RigidError::GpuCompute`] on readback failure or if `bodies` does
    /// not match the uploaded population size.
    pub fn download(&self, gpu: &GpuF64, bodies: &mut RigidBodies) -> Result<(), RigidError> {
        let n = self.n_bodies;
        if bodies.len() != n {
            return Err(RigidError::GpuCompute(format!(
                "download into {} bodies, device holds {n}",
                bodies.len()
            )));
        }
        unpack::<Vec3>(&gpu.read_back_f64(&self.pos, 3 * n)?, &mut bodies.position, "pos")?;
        unpack::<Vec3>(&gpu.read_back_f64(&self.vel, 3 * n)?, &mut bodies.velocity, "vel")?;
        unpack::<Quat>(
            &gpu.read_back_f64(&self.orient, 4 * n)?,
            &mut bodies.orientation,
            "orient",
        )?;
        unpack::<Quat>(
            &gpu.read_back_f64(&self.conjqm, 4 * n)?,
            &mut bodies.conjugate_momentum,
            "conjqm",
        )?;
        unpack::<Vec3>(
            &gpu.read_back_f64(&self.angmom, 3 * n)?,
            &mut bodies.angular_momentum,
            "angmom",
        )?;
        unpack::<Vec3>(
            &gpu.read_back_f64(&self.angvel, 3 * n)?,
            &mut bodies.angular_velocity,
            "angvel",
        )?;
        let image = gpu.read_back_i32(&self.image, 3 * n)?;
        for (dst, src) in bodies.image.iter_mut().zip(image.chunks_exact(3)) {
            *dst = Image3::new(src[0], src[1], src[2]);
        }
        Ok(())
    }
}
