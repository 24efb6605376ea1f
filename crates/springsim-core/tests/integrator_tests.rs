use glam::DVec2;
use springsim_core::integrator::{ForwardEuler, ImplicitEuler, Integrator, IntegratorKind};
use springsim_core::pcg::Termination;
use springsim_core::system::ParticleSystem;

/// Pinned anchor at the origin with a free particle hanging one unit below.
fn hanging_pair(stiffness: f64, damping: f64) -> ParticleSystem {
    let mut system = ParticleSystem::new(DVec2::new(0.0, -9.8), 0.0);
    let anchor = system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
    let bob = system.add_particle(DVec2::new(0.0, -1.0), DVec2::ZERO, 1.0).unwrap();
    system.add_spring(anchor, bob, 1.0, stiffness, damping).unwrap();
    system.pin(anchor).unwrap();
    system
}

#[test]
fn test_hanging_spring_settles_at_equilibrium() {
    let mut system = hanging_pair(100.0, 1.0);
    let mut integrator = ImplicitEuler::new(&system.particles);
    let dt = 0.01;

    let mut peak_speed: f64 = 0.0;
    for step in 0..2000 {
        integrator.step(&mut system, step as f64 * dt, dt, 20).unwrap();
        peak_speed = peak_speed.max(system.particles.velocity[1].length());
    }

    // m g / ks below the rest length.
    let expected = DVec2::new(0.0, -1.098);
    let p = &system.particles;
    assert!(
        (p.position[1] - expected).length() < 1e-4,
        "bob at {}, expected {}",
        p.position[1],
        expected
    );
    assert!(p.velocity[1].length() < 1e-4, "velocity {}", p.velocity[1]);
    assert!(peak_speed > 0.1, "the bob should have oscillated");
    assert_eq!(p.position[0], DVec2::ZERO);
    assert_eq!(p.velocity[0], DVec2::ZERO);
}

#[test]
fn test_anchor_carries_the_load() {
    let mut system = hanging_pair(100.0, 1.0);
    let mut integrator = ImplicitEuler::new(&system.particles);
    for step in 0..2000 {
        integrator.step(&mut system, step as f64 * 0.01, 0.01, 20).unwrap();
    }

    // The pin holds both weights; the force is an impulse over one step.
    let force = integrator.constraint_force(0).unwrap();
    assert!(
        (force - DVec2::new(0.0, 2.0 * 9.8 * 0.01)).length() < 1e-3,
        "anchor force {force}"
    );
    assert!(integrator.constraint_force(1).unwrap().length() < 1e-9);
}

#[test]
fn test_implicit_euler_is_stable_where_forward_euler_explodes() {
    let dt = 0.1;

    let mut explicit = hanging_pair(1.0e4, 0.0);
    let mut euler = ForwardEuler;
    for step in 0..10 {
        euler.step(&mut explicit, step as f64 * dt, dt, 0).unwrap();
    }
    assert!(explicit.particles.position[1].length() > 100.0);

    let mut implicit = hanging_pair(1.0e4, 0.0);
    let mut integrator = ImplicitEuler::new(&implicit.particles);
    for step in 0..200 {
        integrator.step(&mut implicit, step as f64 * dt, dt, 20).unwrap();
        let stats = integrator.last_stats().unwrap();
        assert_ne!(stats.termination, Termination::Degenerate);
    }
    let y = implicit.particles.position[1].y;
    assert!((y + 1.00098).abs() < 1e-6, "y = {y}");
}

#[test]
fn test_implicit_step_loses_energy_without_external_work() {
    // Free particle swinging on a stretched, undamped spring with no gravity.
    let mut system = ParticleSystem::default();
    system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
    system.add_particle(DVec2::new(1.5, 0.0), DVec2::new(0.0, 1.0), 1.0).unwrap();
    system.add_spring(0, 1, 1.0, 50.0, 0.0).unwrap();
    system.pin(0).unwrap();

    let mut integrator = ImplicitEuler::new(&system.particles);
    let initial = system.total_energy();
    for step in 0..100 {
        integrator.step(&mut system, step as f64 * 0.01, 0.01, 20).unwrap();
    }
    let end = system.total_energy();
    assert!(end.is_finite());
    assert!(end < initial, "energy grew from {initial} to {end}");
}

#[test]
fn test_every_kind_builds_a_named_integrator() {
    let system = hanging_pair(10.0, 0.0);
    let kinds = [
        (IntegratorKind::ForwardEuler, "forward_euler"),
        (IntegratorKind::RungeKutta4, "runge_kutta4"),
        (IntegratorKind::VelocityVerlet, "velocity_verlet"),
        (IntegratorKind::ImplicitEuler, "implicit_euler"),
    ];
    for (kind, name) in kinds {
        let mut integrator = kind.build(&system.particles);
        assert_eq!(integrator.name(), name);

        let mut copy = system.clone();
        integrator.step(&mut copy, 0.0, 0.01, 10).unwrap();
        assert!(copy.particles.velocity[1].y < 0.0, "{name} ignored gravity");
    }
}
