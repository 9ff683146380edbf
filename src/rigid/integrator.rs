// SPDX-License-Identifier: AGPL-3.0-only

//! Rigid-body NVT driver.
//!
//! One timestep is:
//!
//!   1. step one (kick, drift, wrap, rotate)
//!   2. force/torque refresh at the new configuration
//!   3. step two (closing kicks)
//!   4. kinetic reduction over all bodies
//!   5. thermostat update → rates for the next step one
//!
//! The force evaluator is a seam ([`ForceCompute`]); the kernels run on
//! the backend named by the [`LaunchConfig`] built at setup.

use std::time::Instant;

use super::config::{KernelBackend, LaunchConfig, RigidNvtConfig};
use super::gpu_kernels::GpuRigidNvt;
use super::quaternion::Vec3;
use super::reduce::reduce_kinetic_energy;
use super::state::{GroupMembers, KineticSums, PartialKinetic, RigidBodies, SimBox};
use super::step_one::advance_step_one;
use super::step_two::advance_step_two;
use super::thermostat::NoseHooverRigid;
use crate::error::RigidError;
use crate::gpu::GpuF64;

/// External force and torque evaluator.
pub trait ForceCompute {
    /// Overwrite `bodies.force` and `bodies.torque` (space frame) for the
    /// current configuration and return the total potential energy.
    fn compute(&mut self, bodies: &mut RigidBodies, sim_box: &SimBox) -> f64;

    /// Whether [`Self::compute`] reads positions or orientations. When
    /// false the GPU driver skips the per-step configuration readback.
    fn needs_configuration(&self) -> bool {
        true
    }
}

/// No external load: force, torque and potential are all zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroLoad;

impl ForceCompute for ZeroLoad {
    fn compute(&mut self, bodies: &mut RigidBodies, _sim_box: &SimBox) -> f64 {
        bodies.force.fill(Vec3::ZERO);
        bodies.torque.fill(Vec3::ZERO);
        0.0
    }

    fn needs_configuration(&self) -> bool {
        false
    }
}

/// Independent harmonic tether per body: a spring to the box origin on the
/// (wrapped) centre of mass and an angular spring to the identity
/// orientation.
///
///   `U = ½ k_t |x|² + k_r (1 − cos θ)`
///
/// with θ the rotation angle of the body. The torque `−k_r sin θ û` is
/// `−2 k_r s v` for `q = (s, v)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HarmonicWell {
    pub k_translational: f64,
    pub k_rotational: f64,
}

impl ForceCompute for HarmonicWell {
    fn compute(&mut self, bodies: &mut RigidBodies, _sim_box: &SimBox) -> f64 {
        let mut potential = 0.0;
        for i in 0..bodies.len() {
            let x = bodies.position[i];
            let q = bodies.orientation[i];
            let v = Vec3::new(q.x, q.y, q.z);
            bodies.force[i] = x * (-self.k_translational);
            bodies.torque[i] = v * (-2.0 * self.k_rotational * q.s);
            potential += 0.5 * self.k_translational * x.norm_sq()
                + 2.0 * self.k_rotational * (1.0 - q.s * q.s);
        }
        potential
    }
}

/// Observables at a dump step (kinetic terms are halved sums, i.e. true KE).
#[derive(Clone, Debug, PartialEq)]
pub struct KineticRecord {
    /// Step index (1-based: the record after `step` full steps).
    pub step: usize,
    pub ke_translational: f64,
    pub ke_rotational: f64,
    pub potential: f64,
    /// Instantaneous `k_B T` over both degree-of-freedom classes.
    pub temperature: f64,
}

impl KineticRecord {
    /// Mechanical energy `KE + PE` (excludes the thermostat reservoir).
    #[must_use]
    pub fn total(&self) -> f64 {
        self.ke_translational + self.ke_rotational + self.potential
    }
}

/// Rigid-body NVT simulation state and results.
pub struct RigidNvt<F: ForceCompute> {
    pub config: RigidNvtConfig,
    pub bodies: RigidBodies,
    pub group: GroupMembers,
    pub sim_box: SimBox,
    pub partials: PartialKinetic,
    pub thermostat: NoseHooverRigid,
    pub history: Vec<KineticRecord>,
    /// Total wall time of the last run (seconds).
    pub wall_time_s: f64,
    force: F,
    potential: f64,
}

impl<F: ForceCompute> RigidNvt<F> {
    /// Validate inputs, evaluate the initial load, and build the
    /// thermostat over `group`.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidConfig`] for a bad run config;
    /// [`RigidError::ContractViolation`] for bodies or group that break a
    /// kernel precondition.
    pub fn new(
        config: RigidNvtConfig,
        mut bodies: RigidBodies,
        group: GroupMembers,
        sim_box: SimBox,
        mut force: F,
    ) -> Result<Self, RigidError> {
        config.validate()?;
        bodies.validate()?;
        group.validate(bodies.len())?;
        let potential = force.compute(&mut bodies, &sim_box);
        let thermostat = NoseHooverRigid::new(config.kt, config.tau, &bodies, &group);
        let partials = PartialKinetic::zeros(bodies.len());
        Ok(Self {
            config,
            bodies,
            group,
            sim_box,
            partials,
            thermostat,
            history: Vec::new(),
            wall_time_s: 0.0,
            force,
            potential,
        })
    }

    /// Latest potential energy from the force evaluator.
    #[must_use]
    pub const fn potential(&self) -> f64 {
        self.potential
    }

    /// Launch configuration for an optional device: GPU when it has f64
    /// shaders, otherwise CPU.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidLaunch`] for widths the device cannot run.
    pub fn launch_for(&self, gpu: Option<&GpuF64>) -> Result<LaunchConfig, RigidError> {
        match gpu {
            Some(gpu) => {
                LaunchConfig::for_device(gpu, self.config.block_size, self.config.reduce_block_size)
            }
            None => self.config.launch(KernelBackend::Cpu),
        }
    }

    /// One full CPU step. Returns the reduced kinetic sums.
    pub fn step_cpu(&mut self, launch: &LaunchConfig) -> KineticSums {
        let dt = self.config.dt;
        let rates = self.thermostat.rates();
        advance_step_one(
            &mut self.bodies,
            &mut self.partials,
            rates,
            &self.sim_box,
            &self.group,
            dt,
        );
        self.potential = self.force.compute(&mut self.bodies, &self.sim_box);
        advance_step_two(&mut self.bodies, &mut self.partials, rates, &self.group, dt);
        let sums = reduce_kinetic_energy(&self.partials, self.bodies.len(), launch);
        self.thermostat.update(sums, dt);
        sums
    }

    /// Run `config.steps` steps on the backend `launch` selects.
    ///
    /// # Errors
    ///
    /// [`RigidError::InvalidLaunch`] if `launch` asks for the GPU but no
    /// device is given; GPU setup or readback errors otherwise.
    pub fn run(
        &mut self,
        launch: &LaunchConfig,
        gpu: Option<&GpuF64>,
    ) -> Result<&[KineticRecord], RigidError> {
        let t_start = Instant::now();
        if self.config.verbose {
            println!(
                "  ── {} : {} bodies ({} in group), {} steps, backend {:?} ──",
                self.config.label,
                self.bodies.len(),
                self.group.len(),
                self.config.steps,
                launch.backend()
            );
        }
        match (launch.backend(), gpu) {
            (KernelBackend::Cpu, _) => {
                for step in 1..=self.config.steps {
                    let sums = self.step_cpu(launch);
                    self.record(step, sums);
                }
            }
            (KernelBackend::Gpu, Some(gpu)) => self.run_gpu(launch, gpu)?,
            (KernelBackend::Gpu, None) => {
                return Err(RigidError::InvalidLaunch(
                    "GPU backend selected without a device".into(),
                ));
            }
        }
        self.wall_time_s = t_start.elapsed().as_secs_f64();
        if self.config.verbose {
            let steps_per_sec = self.config.steps as f64 / self.wall_time_s.max(f64::MIN_POSITIVE);
            println!(
                "    Complete in {:.2}s ({steps_per_sec:.1} steps/s)",
                self.wall_time_s
            );
        }
        Ok(&self.history)
    }

    fn run_gpu(&mut self, launch: &LaunchConfig, gpu: &GpuF64) -> Result<(), RigidError> {
        let dt = self.config.dt;
        let device = GpuRigidNvt::new(gpu, &self.bodies, &self.group, self.sim_box, *launch)?;
        let needs_configuration = self.force.needs_configuration();

        for step in 1..=self.config.steps {
            let rates = self.thermostat.rates();
            device.step_one(gpu, rates, dt);
            if needs_configuration {
                device.download(gpu, &mut self.bodies)?;
            }
            self.potential = self.force.compute(&mut self.bodies, &self.sim_box);
            device.upload_loads(gpu, &self.bodies);
            device.step_two(gpu, rates, dt);
            let sums = device.reduce(gpu)?;
            self.thermostat.update(sums, dt);
            self.record(step, sums);
        }

        device.download(gpu, &mut self.bodies)?;
        self.partials = device.download_partials(gpu)?;
        Ok(())
    }

    fn record(&mut self, step: usize, sums: KineticSums) {
        if step % self.config.dump_step != 0 && step != self.config.steps {
            return;
        }
        let rec = KineticRecord {
            step,
            ke_translational: 0.5 * sums.translational,
            ke_rotational: 0.5 * sums.rotational,
            potential: self.potential,
            temperature: self.thermostat.temperature(sums),
        };
        if self.config.verbose {
            println!(
                "    Step {}: kT={:.6}, KE_t={:.4}, KE_r={:.4}, PE={:.4}, E={:.4}",
                rec.step,
                rec.temperature,
                rec.ke_translational,
                rec.ke_rotational,
                rec.potential,
                rec.total()
            );
        }
        self.history.push(rec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid::quaternion::Quat;
    use crate::rigid::thermostat::KtSchedule;

    fn config(steps: usize, dt: f64, tau: f64) -> RigidNvtConfig {
        RigidNvtConfig {
            label: "test".into(),
            dt,
            kt: KtSchedule::Constant(1.0),
            tau,
            steps,
            dump_step: 10,
            block_size: 64,
            reduce_block_size: 64,
            verbose: false,
        }
    }

    fn tethered_bodies(n: usize) -> RigidBodies {
        let mut bodies = RigidBodies::new(n);
        for i in 0..n {
            let f = i as f64;
            bodies.inertia[i] = Vec3::new(1.0, 1.5 + 0.1 * f, 2.0);
            bodies.position[i] = Vec3::new(0.3 * f.sin(), 0.2, -0.1 * f);
            bodies.velocity[i] = Vec3::new(0.5 - 0.1 * f, 0.3, 0.2);
            bodies.orientation[i] = Quat::from_axis_angle(Vec3::new(1.0, 0.5, f), 0.2 + 0.05 * f);
            bodies.set_angular_momentum(i, Vec3::new(0.3, -0.2, 0.4));
        }
        bodies
    }

    #[test]
    fn harmonic_torque_is_minus_gradient() {
        let mut well = HarmonicWell {
            k_translational: 0.0,
            k_rotational: 2.0,
        };
        let axis = Vec3::new(0.0, 0.0, 1.0);
        let theta = 0.7;
        let mut bodies = RigidBodies::new(1);
        let sim_box = SimBox::cube(10.0);
        bodies.orientation[0] = Quat::from_axis_angle(axis, theta);
        let u0 = well.compute(&mut bodies, &sim_box);
        let tz = bodies.torque[0].z;
        let h = 1e-6;
        bodies.orientation[0] = Quat::from_axis_angle(axis, theta + h);
        let u1 = well.compute(&mut bodies, &sim_box);
        let du = (u1 - u0) / h;
        assert!((tz + du).abs() < 1e-5, "τ_z = {tz}, dU/dθ = {du}");
        assert!((u0 - 2.0 * (1.0 - theta.cos())).abs() < 1e-12);
    }

    #[test]
    fn weak_coupling_conserves_energy() {
        let n = 8;
        let cfg = config(2000, 0.002, 1.0e9);
        let well = HarmonicWell {
            k_translational: 1.0,
            k_rotational: 0.5,
        };
        let mut sim = RigidNvt::new(
            cfg,
            tethered_bodies(n),
            GroupMembers::all(n),
            SimBox::cube(20.0),
            well,
        )
        .expect("valid setup");
        let launch = sim.launch_for(None).expect("cpu launch");
        let history = sim.run(&launch, None).expect("cpu run").to_vec();
        let e0 = history[0].total();
        let max_drift = history
            .iter()
            .map(|r| ((r.total() - e0) / e0).abs() * 100.0)
            .fold(0.0f64, f64::max);
        assert!(
            max_drift < crate::tolerances::ENERGY_DRIFT_PCT,
            "energy drift {max_drift:.4}%"
        );
    }

    #[test]
    fn thermostat_pulls_toward_target() {
        let n = 32;
        // η̇ bounded ⇒ the window mean of K − N kT is τ² N kT Δη̇ / window
        let mut cfg = config(16_000, 0.005, 0.5);
        cfg.kt = KtSchedule::Constant(0.5);
        cfg.dump_step = 1;
        let well = HarmonicWell {
            k_translational: 1.0,
            k_rotational: 1.0,
        };
        let mut sim = RigidNvt::new(
            cfg,
            tethered_bodies(n),
            GroupMembers::all(n),
            SimBox::cube(50.0),
            well,
        )
        .expect("valid setup");
        let launch = sim.launch_for(None).expect("cpu launch");
        let history = sim.run(&launch, None).expect("cpu run").to_vec();
        let tail = &history[history.len() / 2..];
        let mean_t = tail.iter().map(|r| r.temperature).sum::<f64>() / tail.len() as f64;
        assert!(
            ((mean_t - 0.5) / 0.5).abs() < crate::tolerances::THERMOSTAT_TARGET_REL,
            "mean kT {mean_t}"
        );
    }

    #[test]
    fn records_follow_dump_interval_and_final_step() {
        let mut cfg = config(25, 0.001, 1.0);
        cfg.dump_step = 10;
        let mut sim = RigidNvt::new(
            cfg,
            tethered_bodies(2),
            GroupMembers::all(2),
            SimBox::cube(10.0),
            ZeroLoad,
        )
        .expect("valid setup");
        let launch = sim.launch_for(None).expect("cpu launch");
        let steps: Vec<usize> = sim
            .run(&launch, None)
            .expect("cpu run")
            .iter()
            .map(|r| r.step)
            .collect();
        assert_eq!(steps, vec![10, 20, 25]);
    }

    #[test]
    fn gpu_launch_without_device_is_rejected() {
        let mut sim = RigidNvt::new(
            config(1, 0.001, 1.0),
            tethered_bodies(1),
            GroupMembers::all(1),
            SimBox::cube(10.0),
            ZeroLoad,
        )
        .expect("valid setup");
        let launch = LaunchConfig::new(64, 64, KernelBackend::Gpu).expect("widths");
        assert!(matches!(
            sim.run(&launch, None),
            Err(RigidError::InvalidLaunch(_))
        ));
    }

    #[test]
    fn setup_rejects_out_of_range_group() {
        let res = RigidNvt::new(
            config(1, 0.001, 1.0),
            tethered_bodies(2),
            GroupMembers::from_indices(vec![0, 5]),
            SimBox::cube(10.0),
            ZeroLoad,
        );
        assert!(matches!(res, Err(RigidError::ContractViolation(_))));
    }
}
