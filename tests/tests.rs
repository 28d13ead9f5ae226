use std::f64::consts::PI;

use approx::assert_relative_eq;

use cyclosim::{
    build_simulation, single_proton, Axis, Bunch, Column, CyclotronEField, Error, FieldProperty,
    FieldSet, Parameters, Particle, ParticleEField, ParticleProperty, PropertyValue, Region,
    RunState, ScenarioConfig, Scheme, Simulation, SimulationProperty, SinkError, Species, System,
    TrackSink, UniformBField, UniformEField, Vec3,
};

/// Build a free proton with the given velocity at the origin.
pub fn proton(velocity: Vec3) -> Particle {
    Species::PROTON.particle(Vec3::zeros(), velocity)
}

/// Default run parameters for short tests: 9 ticks of 0.125.
pub fn test_params(scheme: Scheme) -> Parameters {
    Parameters::new("test", scheme, 0.125, 1.0)
}

/// Unwrap a vector-valued sample.
pub fn vec_of(value: &PropertyValue) -> Vec3 {
    match value {
        PropertyValue::Vector(v) => *v,
        PropertyValue::Scalar(s) => panic!("expected vector sample, got scalar {s}"),
    }
}

/// Drive a lone particle by hand: same staging and commit calls the
/// engine makes, with a fixed external force.
pub fn hand_step(
    p: &mut Particle,
    force: Vec3,
    t_step: f64,
    scheme: Scheme,
    relativistic: bool,
) {
    p.apply_force(force);
    p.update(t_step, scheme, relativistic).expect("step stages");
    p.tick();
}

// ==================================================================================
// Determinism
// ==================================================================================

#[test]
fn identical_runs_are_bit_identical() {
    let run = || {
        let mut sim = single_proton(Scheme::Verlet, 0.5, 100.0).expect("preset builds");
        sim.run().expect("preset runs");
        sim
    };
    let a = run();
    let b = run();
    assert_eq!(a.sink().rows(), b.sink().rows());
    assert_eq!(
        a.system().particle(0).unwrap().position(),
        b.system().particle(0).unwrap().position()
    );
}

// ==================================================================================
// Scheme behavior
// ==================================================================================

#[test]
fn force_free_particles_drift_linearly() {
    let v0 = Vec3::new(0.002, 0.003, -0.001);
    let r0 = Vec3::new(1.0, -2.0, 0.5);
    for scheme in [Scheme::Euler, Scheme::EulerCromer, Scheme::Verlet] {
        let mut sim = Simulation::new(test_params(scheme)).unwrap();
        let id = sim
            .add_particle(Particle::new("Drifter", r0, v0, Vec3::zeros(), 1.0, 0.0))
            .unwrap();
        let report = sim.run().unwrap();
        assert_eq!(report.ticks, 9);

        let p = sim.system().particle(id).unwrap();
        let expected = r0 + report.final_time * v0;
        assert_relative_eq!(p.position(), expected, epsilon = 1e-12);
        assert_eq!(p.velocity(), v0, "free drift must not change velocity");
    }
}

#[test]
fn euler_and_euler_cromer_diverge_under_constant_force() {
    // Unit mass and charge in a unit electric field along x, dt = 0.1.
    let field = Vec3::new(1.0, 0.0, 0.0);
    let step = |scheme: Scheme, ticks: usize| {
        let mut p = Particle::new("Unit", Vec3::zeros(), Vec3::zeros(), Vec3::zeros(), 1.0, 1.0);
        for _ in 0..ticks {
            hand_step(&mut p, field, 0.1, scheme, false);
        }
        p
    };

    // One tick in, only the staged acceleration has landed; both schemes
    // still agree.
    assert_eq!(step(Scheme::Euler, 1).position(), step(Scheme::EulerCromer, 1).position());

    // Two ticks in they disagree by exactly one dt^2 kick: Euler holds
    // position while Euler-Cromer already moved dt * (dt * a).
    let euler = step(Scheme::Euler, 2);
    let cromer = step(Scheme::EulerCromer, 2);
    assert_eq!(euler.position().x, 0.0);
    assert_relative_eq!(cromer.position().x, 0.01, max_relative = 1e-12);
    assert!(cromer.position().x > euler.position().x);

    // And the gap keeps widening.
    let euler = step(Scheme::Euler, 4);
    let cromer = step(Scheme::EulerCromer, 4);
    assert_relative_eq!(euler.position().x, 0.03, max_relative = 1e-12);
    assert_relative_eq!(cromer.position().x, 0.06, max_relative = 1e-12);
}

// ==================================================================================
// Relativistic hysteresis
// ==================================================================================

#[test]
fn relativistic_correction_lags_one_tick() {
    let v0 = Vec3::new(0.8, 0.0, 0.0);
    let force = Vec3::new(0.0, 0.1, 0.0);
    let dt = 0.01;
    let mut p = Particle::new("Fast", Vec3::zeros(), v0, Vec3::zeros(), 1.0, 0.0);

    // Tick 1: committed gamma is still 1, so the staged acceleration is
    // classical F/m even though the particle moves at 0.8c.
    hand_step(&mut p, force, dt, Scheme::Euler, true);
    assert_eq!(p.acceleration(), Vec3::new(0.0, 0.1, 0.0));
    assert_relative_eq!(p.gamma(), 1.0 / (1.0f64 - 0.64).sqrt(), max_relative = 1e-12);

    // Tick 2: the committed gamma (1.667) is over the threshold, so the
    // projected relativistic form applies, built on v_c = v + dt a.
    hand_step(&mut p, force, dt, Scheme::Euler, true);
    let vc = v0 + dt * Vec3::new(0.0, 0.1, 0.0);
    let gamma_c = 1.0 / (1.0 - vc.norm_squared()).sqrt();
    let expected = (force - force.dot(&vc) * vc) / gamma_c;
    assert!(expected.x < 0.0, "projection must pull against the motion");
    assert_relative_eq!(p.acceleration(), expected, epsilon = 1e-15);
}

#[test]
fn gamma_is_always_recomputed_from_staged_velocity() {
    // With the relativistic switch off the dynamics stays classical, but
    // gamma still tracks the committed velocity.
    let mut p = Particle::new(
        "Classical",
        Vec3::zeros(),
        Vec3::new(0.6, 0.0, 0.0),
        Vec3::zeros(),
        1.0,
        0.0,
    );
    hand_step(&mut p, Vec3::zeros(), 0.1, Scheme::Euler, false);
    assert_relative_eq!(p.gamma(), 1.25, max_relative = 1e-12);
}

#[test]
fn superluminal_staging_is_a_hard_error() {
    let mut p = Particle::new(
        "Runaway",
        Vec3::zeros(),
        Vec3::new(0.9999, 0.0, 0.0),
        Vec3::zeros(),
        1.0,
        1.0,
    );
    let kick = Vec3::new(1.0e6, 0.0, 0.0);
    // The first tick only stages the huge acceleration; the velocity
    // advance still reads the committed (zero) acceleration.
    hand_step(&mut p, kick, 0.1, Scheme::Euler, false);
    // The second tick applies it and drives the staged speed past c.
    p.apply_force(kick);
    let err = p.update(0.1, Scheme::Euler, false).unwrap_err();
    match err {
        Error::SuperluminalVelocity { speed } => assert!(speed > 1.0),
        other => panic!("expected superluminal error, got {other}"),
    }
}

#[test]
fn massless_particles_reject_nonzero_force() {
    let mut p = Particle::new("Ghost", Vec3::zeros(), Vec3::zeros(), Vec3::zeros(), 0.0, 1.0);
    p.apply_force(Vec3::new(0.1, 0.0, 0.0));
    assert!(matches!(
        p.update(0.1, Scheme::Euler, false),
        Err(Error::MasslessParticle { .. })
    ));
    // Force-free massless particles stage zero acceleration and drift.
    p.apply_force(Vec3::zeros());
    p.update(0.1, Scheme::Euler, false).unwrap();
    p.tick();
    assert_eq!(p.acceleration(), Vec3::zeros());
}

// ==================================================================================
// Fields and regions
// ==================================================================================

#[test]
fn resonance_period_matches_the_analytic_formula() {
    let period = CyclotronEField::resonance_period(Species::PROTON, 1000.0).unwrap();
    assert_relative_eq!(period, 2.0 * PI * 938.0 / 1000.0, max_relative = 1e-15);
}

#[test]
fn axis_region_gates_forces_inclusively() {
    let region = Region::axis_interval(Axis::X, -5.0, 5.0).unwrap();
    let e = UniformEField::with_region(Vec3::new(0.0, 2.0, 0.0), region);
    let mut fields = FieldSet::new();
    fields.add(e);
    let sys = System::new();

    let force_at = |x: f64| {
        let p = Species::PROTON.particle(Vec3::new(x, 0.0, 0.0), Vec3::zeros());
        fields.total_force(&sys, &p).unwrap()
    };
    assert_relative_eq!(force_at(-5.0).y, 2.0, max_relative = 1e-14);
    assert_relative_eq!(force_at(5.0).y, 2.0, max_relative = 1e-14);
    assert_relative_eq!(force_at(0.0).y, 2.0, max_relative = 1e-14);
    assert_eq!(force_at(5.0 + 1e-9).y, 0.0);
    assert_eq!(force_at(-5.0 - 1e-9).y, 0.0);
}

#[test]
fn coulomb_pair_repels_symmetrically() {
    let params = Parameters::new("pair", Scheme::Verlet, 0.01, 0.1);
    let mut sim = Simulation::new(params).unwrap();
    let a = sim
        .add_particle(Species::PROTON.particle(Vec3::new(-0.5, 0.0, 0.0), Vec3::zeros()))
        .unwrap();
    let b = sim
        .add_particle(Species::PROTON.particle(Vec3::new(0.5, 0.0, 0.0), Vec3::zeros()))
        .unwrap();
    sim.add_field(ParticleEField::new(a)).unwrap();
    sim.add_field(ParticleEField::new(b)).unwrap();
    sim.run().unwrap();

    let pa = sim.system().particle(a).unwrap();
    let pb = sim.system().particle(b).unwrap();
    assert!(pa.velocity().x < 0.0, "left proton must be pushed left");
    assert!(pb.velocity().x > 0.0, "right proton must be pushed right");
    // Mirror-symmetric forces keep the pair's momentum balanced.
    assert!((pa.momentum() + pb.momentum()).norm() < 1e-12);
    assert_eq!(pa.position().x, -pb.position().x);
}

// ==================================================================================
// Bunches
// ==================================================================================

#[test]
fn bunch_reductions_sum_and_average() {
    // Per-particle velocity (1,0,0) at the initial committed gamma of 1.
    let proto = proton(Vec3::new(1.0, 0.0, 0.0));
    let bunch = Bunch::new("beam", proto, 5).unwrap();
    let total = bunch.momentum();
    assert_relative_eq!(total.x, 5.0 * 938.0, max_relative = 1e-12);
    assert_eq!(total.y, 0.0);
    assert_eq!(total.z, 0.0);
    assert_eq!(bunch.avg_velocity(), Vec3::new(1.0, 0.0, 0.0));
    assert_relative_eq!(bunch.mass(), 5.0 * 938.0, max_relative = 1e-12);
    assert_relative_eq!(bunch.avg_energy(), bunch.energy() / 5.0, max_relative = 1e-12);
}

#[test]
fn bunch_members_evolve_independently_after_cloning() {
    let params = Parameters::new("bunch", Scheme::Euler, 0.1, 0.5);
    let mut sim = Simulation::new(params).unwrap();
    let id = sim
        .add_bunch(Bunch::new("beam", proton(Vec3::new(0.001, 0.0, 0.0)), 3).unwrap())
        .unwrap();
    sim.add_field(UniformEField::new(Vec3::new(0.5, 0.0, 0.0)))
        .unwrap();
    sim.run().unwrap();

    let bunch = sim.system().bunch(id).unwrap();
    // All members saw the same uniform field, so they stay clones.
    let first = bunch.members()[0].position();
    for member in bunch.members() {
        assert_eq!(member.position(), first);
    }
    assert!(first.x > 0.0, "field must have accelerated the members");
}

// ==================================================================================
// Driver ordering and tracking
// ==================================================================================

#[test]
fn snapshots_are_taken_before_the_commit() {
    let r0 = Vec3::new(7.0, 0.0, 0.0);
    let v0 = Vec3::new(0.001, 0.0, 0.0);
    let mut sim = Simulation::new(test_params(Scheme::Euler)).unwrap();
    let id = sim
        .add_particle(Particle::new("Probe", r0, v0, Vec3::zeros(), 1.0, 0.0))
        .unwrap();
    sim.track_particle(id, &[ParticleProperty::Position]).unwrap();
    sim.run().unwrap();

    let rows = sim.sink().rows();
    // Row 0 must hold the untouched initial state.
    assert_eq!(vec_of(&rows[0].values[0]), r0);
    // Row k holds the state after exactly k commits.
    for (k, row) in rows.iter().enumerate() {
        let expected = r0 + (k as f64) * 0.125 * v0;
        assert_relative_eq!(vec_of(&row.values[0]).x, expected.x, epsilon = 1e-12);
    }
}

#[test]
fn probe_sees_field_flips_after_the_snapshot() {
    // Abstract clock: flip period 4, both clocks stepping 1 per tick. The
    // square wave holds each polarity for three ticks (the wrap tick does
    // not accumulate phase), and the probe samples before the field
    // transition, so the first flipped row appears one tick later.
    let params = Parameters::new("gap", Scheme::Euler, 1.0, 7.0);
    let mut sim = Simulation::new(params).unwrap();
    let gap = CyclotronEField::with_b_magnitude(
        Vec3::new(1.0, 0.0, 0.0),
        Species::PROTON,
        2.0 * PI * 938.0 / 4.0,
        1.0,
        Region::AllSpace,
    )
    .unwrap();
    assert_relative_eq!(gap.period(), 4.0, max_relative = 1e-12);
    let fid = sim.add_field(gap).unwrap();
    sim.track_probe(fid, Vec3::zeros(), "gap center", &[FieldProperty::Vector])
        .unwrap();
    sim.run().unwrap();

    let signs: Vec<f64> = sim
        .sink()
        .rows()
        .iter()
        .map(|row| vec_of(&row.values[0]).x.signum())
        .collect();
    assert_eq!(signs, vec![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0]);
}

#[test]
fn column_keys_carry_full_names_and_flatten_to_csv() {
    let yaml = r#"
simulation:
  name: "naming"
  scheme: "euler"
  t_step: 0.5
  duration: 1.0
particles:
  - species: "proton"
    position: [1.0, 2.0, 3.0]
    velocity: [0.0, 0.0, 0.0]
fields:
  - kind: "uniform_b"
    vector: [0.0, 0.0, 1.0]
track:
  - particle: 0
    properties: ["position", "gamma"]
  - probe:
      field: 0
      point: [0.0, 0.0, 0.0]
      label: "origin"
  - simulation: ["time"]
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    let mut sim = build_simulation(cfg).unwrap();
    sim.run().unwrap();

    let keys: Vec<&str> = sim.sink().columns().iter().map(|c| c.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "Proton 0: Position",
            "Proton 0: Gamma",
            "Uniform B-Field 0: origin: Vector",
            "naming: Time"
        ]
    );

    let mut out = Vec::new();
    sim.sink().write_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("tick,Proton 0: Position [x],Proton 0: Position [y]"));
    assert!(header.contains("Proton 0: Gamma"));
    assert!(header.ends_with("naming: Time"));
    // 3 ticks logged, plus the header.
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn run_summary_lands_in_the_sink() {
    let mut sim = single_proton(Scheme::EulerCromer, 0.5, 10.0).unwrap();
    sim.run().unwrap();
    let notes = sim.sink().notes();
    assert!(notes.contains(&("name".to_string(), "single-proton".to_string())));
    assert!(notes.contains(&("scheme".to_string(), "Euler-Cromer".to_string())));
    let env = sim.sink().environment();
    assert!(env.contains(&("particle: Proton".to_string(), 1)));
    assert!(env.contains(&("field: Uniform B-Field".to_string(), 1)));
}

#[test]
fn a_finished_log_serializes_as_one_snapshot() {
    let mut sim = single_proton(Scheme::Verlet, 0.5, 5.0).unwrap();
    sim.run().unwrap();
    let snapshot = serde_yaml::to_string(sim.sink()).unwrap();
    // Columns, rows and the closing notes all land in one document.
    assert!(snapshot.contains("Proton 0: Position"));
    assert!(snapshot.contains("rows"));
    assert!(snapshot.contains("Verlet"));
}

// ==================================================================================
// Sink failure isolation
// ==================================================================================

/// A sink that refuses every row.
struct FailingSink {
    refused: usize,
}

impl TrackSink for FailingSink {
    fn begin(&mut self, _columns: &[Column]) -> Result<(), SinkError> {
        Ok(())
    }

    fn append(&mut self, _tick: usize, _values: &[PropertyValue]) -> Result<(), SinkError> {
        self.refused += 1;
        Err(SinkError::Rejected("row refused".to_string()))
    }

    fn note(&mut self, _key: &str, _value: &str) {}

    fn record_environment(&mut self, _entries: &[(String, usize)]) {}
}

#[test]
fn sink_failures_never_touch_the_physics() {
    fn build<S: TrackSink>(sim: &mut Simulation<S>) {
        let id = sim
            .add_particle(proton(Vec3::new(0.01, 0.0, 0.0)))
            .expect("constructed");
        sim.add_field(UniformBField::new(Vec3::new(0.0, 0.0, 100.0)))
            .expect("constructed");
        sim.track_particle(id, &[ParticleProperty::Position])
            .expect("constructed");
    }

    let mut failing =
        Simulation::with_sink(test_params(Scheme::Verlet), FailingSink { refused: 0 }).unwrap();
    build(&mut failing);
    let report = failing.run().expect("run must complete despite the sink");
    assert_eq!(report.sink_warnings.len(), 9, "one warning per logging tick");
    assert_eq!(failing.sink().refused, 9);

    let mut control = Simulation::new(test_params(Scheme::Verlet)).unwrap();
    build(&mut control);
    control.run().unwrap();

    assert_eq!(
        failing.system().particle(0).unwrap().position(),
        control.system().particle(0).unwrap().position(),
        "sink failures must not perturb the trajectory"
    );
}

// ==================================================================================
// Run lifecycle
// ==================================================================================

#[test]
fn a_simulation_runs_exactly_once() {
    let mut sim = Simulation::new(test_params(Scheme::Euler)).unwrap();
    assert_eq!(sim.state(), RunState::Constructed);
    let report = sim.run().unwrap();
    assert_eq!(sim.state(), RunState::Finished);
    assert_eq!(report.ticks, 9);
    assert_relative_eq!(report.final_time, 1.125, max_relative = 1e-15);
    assert!(matches!(sim.run(), Err(Error::AlreadyStarted)));
}

#[test]
fn late_registration_is_refused() {
    let mut sim = Simulation::new(test_params(Scheme::Euler)).unwrap();
    sim.run().unwrap();
    assert!(matches!(
        sim.add_field(UniformBField::new(Vec3::new(0.0, 0.0, 1.0))),
        Err(Error::AlreadyStarted)
    ));
    assert!(matches!(
        sim.track_simulation(&[SimulationProperty::Time]),
        Err(Error::AlreadyStarted)
    ));
}

// ==================================================================================
// End-to-end orbit
// ==================================================================================

#[test]
fn proton_orbit_closes_after_one_cyclotron_period() {
    // Classical proton orbit: B = 1000 z, v = 0.5 x from the origin.
    // Radius m v / (q B), period 2 pi m / (q B), center at (0, -R, 0).
    let b = 1000.0;
    let mass = 938.0;
    let speed = 0.5;
    let radius = mass * speed / b;
    let period = 2.0 * PI * mass / b;
    let omega = b / mass;
    let t_step = 0.001;

    let params = Parameters::new("orbit", Scheme::Verlet, t_step, period).log_every(50);
    let mut sim = Simulation::new(params).unwrap();
    let id = sim
        .add_particle(proton(Vec3::new(speed, 0.0, 0.0)))
        .unwrap();
    sim.add_field(UniformBField::new(Vec3::new(0.0, 0.0, b)))
        .unwrap();
    sim.track_particle(id, &[ParticleProperty::Position]).unwrap();
    let report = sim.run().unwrap();
    assert!(report.final_time >= period);

    let center = Vec3::new(0.0, -radius, 0.0);
    for row in sim.sink().rows() {
        let t = row.tick as f64 * t_step;
        let r = vec_of(&row.values[0]);

        // Everything stays in the z = 0 plane exactly.
        assert_eq!(r.z, 0.0);

        // Constant radius about the orbit center.
        let rho = (r - center).norm();
        assert!(
            (rho - radius).abs() < 0.025 * radius,
            "radius drifted to {rho} at t = {t}"
        );

        // Constant angular speed: the sample tracks the analytic circle.
        let analytic = Vec3::new(
            radius * (omega * t).sin(),
            -radius + radius * (omega * t).cos(),
            0.0,
        );
        assert!(
            (r - analytic).norm() < 0.05,
            "trajectory strayed {} from the analytic orbit at t = {t}",
            (r - analytic).norm()
        );
    }

    // One full turn later the proton is back where it started.
    let closure = sim.system().particle(id).unwrap().position().norm();
    assert!(closure < 0.05, "orbit failed to close: offset {closure}");

    // The magnetic field did no work.
    let final_speed = sim.system().particle(id).unwrap().velocity().norm();
    assert!(
        (final_speed - speed).abs() < 0.02 * speed,
        "speed drifted to {final_speed}"
    );
}
