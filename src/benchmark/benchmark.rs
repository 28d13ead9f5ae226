use std::time::Instant;

use crate::simulation::engine::Simulation;
use crate::simulation::fields::{FieldSet, ParticleEField, UniformBField, UniformEField};
use crate::simulation::integrator::Scheme;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Species, System, Vec3};

/// Helper to build a manual System of `n` protons on a deterministic
/// scatter, every one registered so Coulomb sources can skip themselves.
fn make_system(n: usize) -> System {
    let mut sys = System::new();
    for i in 0..n {
        let i_f = i as f64;
        // deterministic positions, no rand needed
        let x = Vec3::new(
            (i_f * 0.37).sin() * 5.0,
            (i_f * 0.13).cos() * 5.0,
            (i_f * 0.07).sin() * 5.0,
        );
        let mut p = Species::PROTON.particle(x, Vec3::new(0.01, 0.0, 0.0));
        p.set_id(i);
        sys.particles.push(p);
    }
    sys
}

/// Times one force accumulation sweep over every particle, comparing the
/// uniform-field-only case against all-pairs Coulomb.
pub fn bench_forces() {
    let ns = [64, 128, 256, 512, 1024];

    for n in ns {
        let sys = make_system(n);

        let mut uniform = FieldSet::new();
        uniform.add(UniformBField::new(Vec3::new(0.0, 0.0, 1.0)));
        uniform.add(UniformEField::new(Vec3::new(0.5, 0.0, 0.0)));

        let mut coulomb = FieldSet::new();
        for i in 0..n {
            coulomb.add(ParticleEField::new(i));
        }

        let sweep = |fields: &FieldSet| {
            let mut total = Vec3::zeros();
            for p in sys.iter_all() {
                total += fields.total_force(&sys, p).unwrap();
            }
            total
        };

        // Warm up
        let _ = sweep(&uniform);
        let _ = sweep(&coulomb);

        let t0 = Instant::now();
        let _ = sweep(&uniform);
        let dt_uniform = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        let _ = sweep(&coulomb);
        let dt_coulomb = t1.elapsed().as_secs_f64();

        println!(
            "N = {n:5}, uniform = {dt_uniform:8.6} s, coulomb = {dt_coulomb:8.6} s"
        );
    }
}

fn make_simulation(n: usize, ticks: usize) -> Simulation {
    let t_step = 0.001;
    // duration chosen so tick_length comes out as `ticks`
    let params = Parameters::new(
        "bench",
        Scheme::Verlet,
        t_step,
        (ticks.saturating_sub(1)) as f64 * t_step,
    );
    let mut sim = Simulation::new(params).expect("bench parameters are valid");
    for i in 0..n {
        let i_f = i as f64;
        let x = Vec3::new(
            (i_f * 0.37).sin() * 5.0,
            (i_f * 0.13).cos() * 5.0,
            (i_f * 0.07).sin() * 5.0,
        );
        sim.add_particle(Species::PROTON.particle(x, Vec3::new(0.01, 0.0, 0.0)))
            .expect("not running yet");
    }
    sim.add_field(UniformBField::new(Vec3::new(0.0, 0.0, 1.0)))
        .expect("not running yet");
    sim.add_field(UniformEField::new(Vec3::new(0.5, 0.0, 0.0)))
        .expect("not running yet");
    sim
}

/// Times full ticks of the driver loop, per system size.
/// Paste output directly into a spreadsheet to graph.
pub fn bench_ticks() {
    println!("N,us_per_tick");

    let ticks = 200;
    for n in [64, 128, 256, 512, 1024, 2048] {
        // Warm-up run outside the timed window
        let mut warm = make_simulation(n, 8);
        warm.run().expect("bench scenario runs");

        let mut sim = make_simulation(n, ticks);
        let t0 = Instant::now();
        let report = sim.run().expect("bench scenario runs");
        let per_tick = t0.elapsed().as_secs_f64() * 1.0e6 / report.ticks as f64;

        println!("{n},{per_tick:.3}");
    }
}
