// SPDX-License-Identifier: AGPL-3.0-only

//! Rigid-Body NVT Kernel Validation
//!
//! Runs the step-one / step-two / reduction kernels through their
//! correctness properties on the CPU reference, then repeats a short
//! thermostatted run on the GPU (if an f64-capable adapter exists) and
//! compares it body by body against the CPU.
//!
//! Optional first argument: path to a JSON `RigidNvtConfig` for the
//! thermostat run. Exit code 0 = all checks pass, 1 = any failure.

use std::path::Path;

use hotspring_rigid::error::RigidError;
use hotspring_rigid::gpu::GpuF64;
use hotspring_rigid::rigid::quaternion::{
    conjugate_from_angular, no_squish_sequence, BodyAxis, NoSquishStage, NO_SQUISH_SEQUENCE,
};
use hotspring_rigid::rigid::{
    advance_step_one, advance_step_two, reduce_kinetic_energy, GroupMembers, HarmonicWell, Image3,
    KtSchedule, LaunchConfig, PartialKinetic, Quat, RigidBodies, RigidNvt, RigidNvtConfig, SimBox,
    ThermostatRates, Vec3,
};
use hotspring_rigid::tolerances;
use hotspring_rigid::validation::ValidationHarness;

fn thermostat_config() -> RigidNvtConfig {
    RigidNvtConfig {
        label: "validate_rigid_nvt".into(),
        dt: 0.005,
        kt: KtSchedule::Constant(0.5),
        tau: 0.5,
        steps: 16_000,
        dump_step: 1,
        block_size: 64,
        reduce_block_size: 256,
        verbose: false,
    }
}

/// Tethered asymmetric tops with spread-out initial state.
fn tops(n: usize) -> RigidBodies {
    let mut bodies = RigidBodies::new(n);
    for i in 0..n {
        let f = i as f64;
        bodies.mass[i] = 1.0 + 0.1 * (f % 5.0);
        bodies.inertia[i] = Vec3::new(1.0, 1.5 + 0.05 * f, 2.0);
        bodies.position[i] = Vec3::new(0.3 * f.sin(), 0.2 * f.cos(), -0.05 * f);
        bodies.velocity[i] = Vec3::new(0.6 - 0.04 * f, 0.3, -0.2);
        bodies.orientation[i] = Quat::from_axis_angle(Vec3::new(1.0, 0.5, f), 0.2 + 0.05 * f);
        bodies.set_angular_momentum(i, Vec3::new(0.3, -0.2 + 0.01 * f, 0.4));
    }
    bodies
}

fn max_norm_error(bodies: &RigidBodies) -> f64 {
    bodies
        .orientation
        .iter()
        .map(|q| (q.norm() - 1.0).abs())
        .fold(0.0, f64::max)
}

fn check_quaternion_norm(harness: &mut ValidationHarness) {
    println!("═══ Quaternion norm under torque ═════════════════════════════");
    let n = 64;
    let mut cfg = thermostat_config();
    cfg.steps = 500;
    cfg.dump_step = 100;
    let well = HarmonicWell {
        k_translational: 1.0,
        k_rotational: 2.0,
    };
    let mut worst = 0.0f64;
    match RigidNvt::new(cfg, tops(n), GroupMembers::all(n), SimBox::cube(40.0), well) {
        Ok(mut sim) => match sim.launch_for(None) {
            Ok(launch) => {
                for _ in 0..sim.config.steps {
                    sim.step_cpu(&launch);
                    worst = worst.max(max_norm_error(&sim.bodies));
                }
            }
            Err(e) => eprintln!("  launch: {e}"),
        },
        Err(e) => eprintln!("  setup: {e}"),
    }
    println!("  max | |q| − 1 | over 500 steps × {n} bodies: {worst:.3e}");
    harness.check_upper("quaternion norm drift", worst, tolerances::QUAT_NORM_REL);
}

fn check_energy_convention(harness: &mut ValidationHarness) {
    println!("═══ Kinetic-energy convention ════════════════════════════════");
    let mut bodies = RigidBodies::new(1);
    bodies.mass[0] = 2.0;
    bodies.velocity[0] = Vec3::new(1.0, 2.0, 2.0);
    let mut partials = PartialKinetic::zeros(1);
    advance_step_one(
        &mut bodies,
        &mut partials,
        ThermostatRates::default(),
        &SimBox::cube(100.0),
        &GroupMembers::all(1),
        0.001,
    );
    let sums = match LaunchConfig::cpu(64, 64) {
        Ok(launch) => reduce_kinetic_energy(&partials, 1, &launch),
        Err(e) => {
            eprintln!("  launch: {e}");
            harness.check_bool("energy convention launch", false);
            return;
        }
    };
    println!("  m|v|² = {:.6}, KE = {:.6}", sums.translational, sums.kinetic_energy());
    harness.check_abs("partial K_t = m|v|²", sums.translational, 18.0, tolerances::EXACT_F64);
    harness.check_abs("KE = ½ Σ m|v|²", sums.kinetic_energy(), 9.0, tolerances::EXACT_F64);
}

fn check_reduction_widths(harness: &mut ValidationHarness) {
    println!("═══ Reduction block-width independence ═══════════════════════");
    let n = 1000;
    let partials = PartialKinetic {
        translational: (0..n).map(|i| 1.0 + (i as f64 * 0.37).sin().abs()).collect(),
        rotational: (0..n).map(|i| 0.5 + (i as f64 * 0.11).cos().abs()).collect(),
    };
    let naive_t: f64 = partials.translational.iter().sum();
    let naive_r: f64 = partials.rotational.iter().sum();
    for width in [32, 64, 128, 256] {
        let launch = match LaunchConfig::cpu(64, width) {
            Ok(launch) => launch,
            Err(e) => {
                eprintln!("  width {width}: {e}");
                harness.check_bool(&format!("launch width {width}"), false);
                continue;
            }
        };
        let sums = reduce_kinetic_energy(&partials, n, &launch);
        println!(
            "  width {width:>3}: K_t = {:.12}, K_r = {:.12}",
            sums.translational, sums.rotational
        );
        harness.check_rel(
            &format!("K_t width {width}"),
            sums.translational,
            naive_t,
            tolerances::REDUCTION_BLOCK_PARITY_REL,
        );
        harness.check_rel(
            &format!("K_r width {width}"),
            sums.rotational,
            naive_r,
            tolerances::REDUCTION_BLOCK_PARITY_REL,
        );
    }
}

fn check_zero_rate_kick(harness: &mut ValidationHarness) {
    println!("═══ Zero thermostat rate ═════════════════════════════════════");
    let dt = 0.01;
    let mut bodies = RigidBodies::new(1);
    bodies.mass[0] = 2.0;
    bodies.velocity[0] = Vec3::new(0.5, -1.0, 0.25);
    bodies.force[0] = Vec3::new(4.0, 0.0, -2.0);
    let mut partials = PartialKinetic::zeros(1);
    advance_step_one(
        &mut bodies,
        &mut partials,
        ThermostatRates::default(),
        &SimBox::cube(100.0),
        &GroupMembers::all(1),
        dt,
    );
    // v + dt/2m F, no scaling
    let expected = Vec3::new(0.51, -1.0, 0.245);
    let err = (bodies.velocity[0] - expected).norm();
    println!("  |v − (v + Δt F / 2m)| = {err:.3e}");
    harness.check_abs("zero rate is plain kick", err, 0.0, tolerances::EXACT_F64);
}

fn check_periodic_wrap(harness: &mut ValidationHarness) {
    println!("═══ Periodic wrap ════════════════════════════════════════════");
    let l = 10.0;
    let dt = 0.01;
    let sim_box = SimBox::cube(l);
    for (label, x0, x_expected) in [
        ("wrap from 0.49L", 0.49 * l, -0.49 * l),
        ("wrap from 0.99L", 0.99 * l, 0.01 * l),
    ] {
        let mut bodies = RigidBodies::new(1);
        bodies.position[0] = Vec3::new(x0, 0.0, 0.0);
        bodies.velocity[0] = Vec3::new(0.02 * l / dt, 0.0, 0.0);
        let mut partials = PartialKinetic::zeros(1);
        advance_step_one(
            &mut bodies,
            &mut partials,
            ThermostatRates::default(),
            &sim_box,
            &GroupMembers::all(1),
            dt,
        );
        let x = bodies.position[0].x;
        let img = bodies.image[0];
        println!("  {label}: x = {x:.6}, image = ({}, {}, {})", img.x, img.y, img.z);
        harness.check_abs(label, x, x_expected, tolerances::EXACT_F64);
        harness.check_bool(&format!("{label} image +1"), img == Image3::new(1, 0, 0));
    }
}

fn check_no_squish_order(harness: &mut ValidationHarness) {
    println!("═══ No-squish sequence ═══════════════════════════════════════");
    let inertia = Vec3::new(1.0, 2.0, 3.0);
    let q0 = Quat::from_axis_angle(Vec3::new(0.3, -0.5, 1.0), 0.8);
    let p0 = conjugate_from_angular(q0, Vec3::new(0.7, -0.4, 0.6));
    let dt = 0.1;

    let mut p = p0;
    let mut q = q0;
    no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p, &mut q, inertia, dt);
    let (p_fwd, q_fwd) = (p, q);
    no_squish_sequence(&NO_SQUISH_SEQUENCE, &mut p, &mut q, inertia, -dt);
    let reversal = (q - q0).norm().max((p - p0).norm());
    println!("  forward/backward return error: {reversal:.3e}");
    harness.check_upper("time reversal", reversal, tolerances::TIME_REVERSAL_ABS);

    let reordered = [
        NoSquishStage {
            axis: BodyAxis::One,
            fraction: 0.5,
        },
        NoSquishStage {
            axis: BodyAxis::Two,
            fraction: 0.5,
        },
        NoSquishStage {
            axis: BodyAxis::Three,
            fraction: 1.0,
        },
        NoSquishStage {
            axis: BodyAxis::Two,
            fraction: 0.5,
        },
        NoSquishStage {
            axis: BodyAxis::One,
            fraction: 0.5,
        },
    ];
    let mut p_alt = p0;
    let mut q_alt = q0;
    no_squish_sequence(&reordered, &mut p_alt, &mut q_alt, inertia, dt);
    let diff = (q_fwd - q_alt).norm();
    println!("  |q(3-2-1-2-3) − q(1-2-3-2-1)| = {diff:.3e}");
    harness.check_lower("sequence order matters", diff, tolerances::NO_SQUISH_ORDER_MIN_DIFF);
}

fn check_free_drift(harness: &mut ValidationHarness) {
    println!("═══ Free drift, 1000 steps ═══════════════════════════════════");
    let dt = 0.001;
    let steps = 1000;
    let mut bodies = RigidBodies::new(1);
    let x0 = Vec3::new(0.1, -0.2, 0.3);
    let v0 = Vec3::new(0.5, 0.25, -0.75);
    bodies.position[0] = x0;
    bodies.velocity[0] = v0;
    let sim_box = SimBox::cube(100.0);
    let group = GroupMembers::all(1);
    let mut partials = PartialKinetic::zeros(1);
    let rates = ThermostatRates::default();
    for _ in 0..steps {
        advance_step_one(&mut bodies, &mut partials, rates, &sim_box, &group, dt);
        advance_step_two(&mut bodies, &mut partials, rates, &group, dt);
    }
    let expected = x0 + v0 * (dt * steps as f64);
    let dx = (bodies.unwrapped_position(0, &sim_box) - expected).norm();
    let dv = (bodies.velocity[0] - v0).norm();
    let dq = (bodies.orientation[0] - Quat::IDENTITY).norm();
    let dl = bodies.angular_momentum[0].norm();
    println!("  |Δx| = {dx:.3e}, |Δv| = {dv:.3e}, |Δq| = {dq:.3e}, |L| = {dl:.3e}");
    harness.check_upper("free drift position", dx, tolerances::FREE_DRIFT_POSITION_ABS);
    harness.check_abs("free drift velocity", dv, 0.0, tolerances::EXACT_F64);
    harness.check_abs("free drift orientation", dq, 0.0, tolerances::EXACT_F64);
    harness.check_abs("free drift angular momentum", dl, 0.0, tolerances::EXACT_F64);
}

fn thermostat_run(
    cfg: &RigidNvtConfig,
    gpu: Option<&GpuF64>,
) -> Result<RigidNvt<HarmonicWell>, RigidError> {
    let n = 48;
    let well = HarmonicWell {
        k_translational: 1.0,
        k_rotational: 1.0,
    };
    let mut sim = RigidNvt::new(
        cfg.clone(),
        tops(n),
        GroupMembers::all(n),
        SimBox::cube(50.0),
        well,
    )?;
    let launch = sim.launch_for(gpu)?;
    sim.run(&launch, gpu)?;
    Ok(sim)
}

fn tail_mean_temperature(sim: &RigidNvt<HarmonicWell>) -> f64 {
    let tail = &sim.history[sim.history.len() / 2..];
    if tail.is_empty() {
        return 0.0;
    }
    tail.iter().map(|r| r.temperature).sum::<f64>() / tail.len() as f64
}

fn check_thermostat(harness: &mut ValidationHarness, cfg: &RigidNvtConfig) {
    println!("═══ Nosé–Hoover target temperature (CPU) ═════════════════════");
    match thermostat_run(cfg, None) {
        Ok(sim) => {
            let mean_t = tail_mean_temperature(&sim);
            let target = cfg.kt.at(cfg.steps as u64);
            println!(
                "  kT target {target:.4}, tail mean {mean_t:.4} ({:.2}s)",
                sim.wall_time_s
            );
            harness.check_rel(
                "thermostat tail mean kT",
                mean_t,
                target,
                tolerances::THERMOSTAT_TARGET_REL,
            );
        }
        Err(e) => {
            eprintln!("  CPU thermostat run failed: {e}");
            harness.check_bool("CPU thermostat run", false);
        }
    }
}

fn check_gpu_parity(harness: &mut ValidationHarness, gpu: &GpuF64, cfg: &RigidNvtConfig) {
    println!("═══ GPU vs CPU parity ════════════════════════════════════════");
    let mut short = cfg.clone();
    short.steps = 200;
    short.dump_step = 50;
    let cpu = thermostat_run(&short, None);
    let dev = thermostat_run(&short, Some(gpu));
    match (cpu, dev) {
        (Ok(cpu), Ok(dev)) => {
            let mut worst_x = 0.0f64;
            let mut worst_q = 0.0f64;
            for i in 0..cpu.bodies.len() {
                worst_x = worst_x.max((cpu.bodies.position[i] - dev.bodies.position[i]).norm());
                worst_q =
                    worst_q.max((cpu.bodies.orientation[i] - dev.bodies.orientation[i]).norm());
            }
            let ke_cpu = cpu.history.last().map_or(0.0, |r| r.total());
            let ke_dev = dev.history.last().map_or(0.0, |r| r.total());
            println!("  max |Δx| = {worst_x:.3e}, max |Δq| = {worst_q:.3e}");
            println!("  E(cpu) = {ke_cpu:.10}, E(gpu) = {ke_dev:.10}");
            harness.check_upper("GPU position parity", worst_x, tolerances::GPU_VS_CPU_F64);
            harness.check_upper("GPU orientation parity", worst_q, tolerances::GPU_VS_CPU_F64);
            harness.check_rel("GPU energy parity", ke_dev, ke_cpu, tolerances::GPU_VS_CPU_F64);
            harness.check_bool("GPU images match", cpu.bodies.image == dev.bodies.image);
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("  parity run failed: {e}");
            harness.check_bool("GPU parity run", false);
        }
    }
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Rigid-Body NVT Kernel Validation                           ║");
    println!("║  no-squish rotation · Nosé–Hoover scaling · KE reduction    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut harness = ValidationHarness::new("rigid_nvt");

    let cfg = match std::env::args().nth(1) {
        Some(path) => match RigidNvtConfig::load(Path::new(&path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("  {e}");
                std::process::exit(1);
            }
        },
        None => thermostat_config(),
    };

    check_quaternion_norm(&mut harness);
    check_energy_convention(&mut harness);
    check_reduction_widths(&mut harness);
    check_zero_rate_kick(&mut harness);
    check_periodic_wrap(&mut harness);
    check_no_squish_order(&mut harness);
    check_free_drift(&mut harness);
    check_thermostat(&mut harness, &cfg);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => Some(rt),
        Err(e) => {
            eprintln!("  tokio runtime: {e}");
            None
        }
    };
    let gpu = rt.and_then(|rt| match rt.block_on(GpuF64::new()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("  GPU unavailable ({e}); CPU checks only");
            None
        }
    });
    match gpu {
        Some(gpu) if gpu.has_f64 => {
            gpu.print_info();
            check_gpu_parity(&mut harness, &gpu, &cfg);
        }
        Some(gpu) => {
            eprintln!("  {} lacks SHADER_F64; skipping GPU parity", gpu.adapter_name);
            GpuF64::print_available_adapters();
        }
        None => {}
    }

    harness.finish();
}
