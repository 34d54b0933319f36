use specterr::color::Color;
use specterr::settings::MAX_POPULATION;
use specterr::signal::FrequencySample;
use specterr::surface::Surface;
use specterr::visual::{ParticleDirection, ParticleField, ParticleOptions, ParticlePatch, Population, ShapeField};

fn field(amount: f32) -> ParticleField {
    let opts = ParticleOptions {
        amount,
        ..ParticleOptions::default()
    };
    ParticleField::new(640.0, 360.0, opts, fastrand::Rng::with_seed(7))
}

#[test]
fn amount_sets_population_length() {
    let mut f = field(160.0);
    for n in [0usize, 1, 5, 160, 400, 3, 0, 250] {
        f.set_options(ParticlePatch {
            amount: Some(n as f32),
            ..ParticlePatch::default()
        });
        assert_eq!(f.len(), n, "amount {n}");
    }
}

#[test]
fn invalid_amounts_coerce_to_zero() {
    let mut f = field(20.0);
    for bad in [f32::NAN, -5.0, f32::NEG_INFINITY] {
        f.set_options(ParticlePatch {
            amount: Some(bad),
            ..ParticlePatch::default()
        });
        assert!(f.is_empty(), "amount {bad} should empty the field");
    }
    f.set_options(ParticlePatch {
        amount: Some(12.9),
        ..ParticlePatch::default()
    });
    assert_eq!(f.len(), 12);
}

#[test]
fn huge_amounts_are_capped() {
    let mut f = field(1e20);
    assert_eq!(f.len(), MAX_POPULATION);
    f.set_options(ParticlePatch {
        amount: Some(f32::MAX),
        ..ParticlePatch::default()
    });
    assert_eq!(f.len(), MAX_POPULATION);
    assert_eq!(f.options().amount, MAX_POPULATION as f32);
    f.set_options(ParticlePatch {
        amount: Some(f32::INFINITY),
        ..ParticlePatch::default()
    });
    assert!(f.is_empty());
}

#[test]
fn mix_is_fixed_for_a_particles_lifetime() {
    let mut f = field(120.0);
    let before: Vec<_> = f.particles().to_vec();
    for _ in 0..10 {
        f.tick(None);
    }
    let mut survivors = 0;
    for (old, new) in before.iter().zip(f.particles()) {
        if (new.age - old.age - 10.0).abs() < 1e-3 {
            survivors += 1;
            assert_eq!(new.mix, old.mix);
            assert_eq!(new.size, old.size);
        }
    }
    assert!(survivors > 100, "only {survivors} particles survived ten ticks");
}

#[test]
fn option_changes_leave_live_velocities_alone() {
    let mut f = field(60.0);
    f.tick(None);
    let before: Vec<_> = f.particles().to_vec();
    f.set_options(ParticlePatch {
        speed: Some(9.0),
        base_size: Some(12.0),
        direction: Some(ParticleDirection::Up),
        color_a: Some(Color::WHITE),
        ..ParticlePatch::default()
    });
    assert_eq!(f.particles(), &before[..]);
    assert_eq!(f.options().speed, 9.0);
    assert_eq!(f.options().direction, ParticleDirection::Up);
}

fn directed(direction: ParticleDirection) -> ParticleField {
    let opts = ParticleOptions {
        amount: 160.0,
        direction,
        ..ParticleOptions::default()
    };
    ParticleField::new(640.0, 360.0, opts, fastrand::Rng::with_seed(7))
}

fn mean_velocity(f: &ParticleField) -> (f32, f32) {
    let n = f.len() as f32;
    let (sx, sy) = f.particles().iter().fold((0.0, 0.0), |(x, y), p| (x + p.vx, y + p.vy));
    (sx / n, sy / n)
}

#[test]
fn directions_drift_the_right_way() {
    let silence = FrequencySample::new(1024);
    for (dir, (ax, ay)) in [
        (ParticleDirection::Up, (0.0, -1.0)),
        (ParticleDirection::Down, (0.0, 1.0)),
        (ParticleDirection::Left, (-1.0, 0.0)),
        (ParticleDirection::Right, (1.0, 0.0)),
    ] {
        let mut f = directed(dir);
        for _ in 0..50 {
            f.tick(Some(&silence));
        }
        let (vx, vy) = mean_velocity(&f);
        assert!(vx * ax + vy * ay > 0.2, "{} drifted ({vx}, {vy})", dir.name());
    }

    let mut floating = directed(ParticleDirection::Float);
    for _ in 0..50 {
        floating.tick(Some(&silence));
    }
    let (vx, vy) = mean_velocity(&floating);
    assert!(vx.abs() < 0.2 && vy.abs() < 0.2, "float drifted ({vx}, {vy})");
}

#[test]
fn loud_audio_pushes_directed_particles_harder() {
    let silence = FrequencySample::new(1024);
    let loud = FrequencySample::from_bins(vec![255; 1024]);
    let mut quiet = directed(ParticleDirection::Right);
    let mut driven = directed(ParticleDirection::Right);
    for _ in 0..10 {
        quiet.tick(Some(&silence));
        driven.tick(Some(&loud));
    }
    let (q, _) = mean_velocity(&quiet);
    let (d, _) = mean_velocity(&driven);
    assert!(d > q * 3.0, "loud {d} vs silent {q}");
}

#[test]
fn shrinking_keeps_leading_particles() {
    let mut f = field(10.0);
    let before: Vec<_> = f.particles()[..4].to_vec();
    f.set_options(ParticlePatch {
        amount: Some(4.0),
        ..ParticlePatch::default()
    });
    assert_eq!(f.particles(), &before[..]);
}

#[test]
fn long_silent_run_stays_bounded() {
    let mut f = field(160.0);
    let silence = FrequencySample::new(1024);
    let (w, h) = f.bounds();
    for _ in 0..10_000 {
        f.tick(Some(&silence));
        assert_eq!(f.len(), 160);
        for p in f.particles() {
            assert!(p.age >= 0.0);
            assert!(p.age <= p.life, "age {} > life {}", p.age, p.life);
            assert!(p.x >= -40.0 && p.x <= w + 40.0);
            assert!(p.y >= -40.0 && p.y <= h + 40.0);
        }
    }
}

#[test]
fn loud_signal_keeps_particles_in_margin() {
    let mut f = field(80.0);
    let loud = FrequencySample::from_bins(vec![255; 1024]);
    let (w, h) = f.bounds();
    for _ in 0..2_000 {
        f.tick(Some(&loud));
        for p in f.particles() {
            assert!(p.x.is_finite() && p.y.is_finite());
            assert!(p.x >= -40.0 && p.x <= w + 40.0);
            assert!(p.y >= -40.0 && p.y <= h + 40.0);
        }
    }
}

#[test]
fn tick_without_sample_is_allowed() {
    let mut f = field(30.0);
    for _ in 0..100 {
        f.tick(None);
    }
    assert_eq!(f.len(), 30);
}

#[test]
fn resize_clamps_without_reseeding() {
    let mut f = field(50.0);
    let mixes: Vec<f32> = f.particles().iter().map(|p| p.mix).collect();
    f.resize(10.0, 10.0);
    assert_eq!(f.bounds(), (10.0, 10.0));
    for (p, mix) in f.particles().iter().zip(&mixes) {
        assert!(p.x >= 0.0 && p.x <= 10.0);
        assert!(p.y >= 0.0 && p.y <= 10.0);
        assert_eq!(p.mix, *mix);
    }
}

#[test]
fn zero_sized_field_draws_nothing() {
    let mut f = field(40.0);
    f.resize(0.0, 0.0);
    let mut surface = Surface::new(0, 0);
    f.tick(None);
    f.draw(&mut surface, 0.95);
    assert!(surface.pixels().is_empty());
}

#[test]
fn shapes_follow_particle_count() {
    let mut shapes = ShapeField::new(800.0, 600.0, 160.0, fastrand::Rng::with_seed(3));
    assert_eq!(shapes.len(), 40);
    shapes.set_count(9.0);
    assert_eq!(shapes.len(), 2);
    shapes.set_count(0.0);
    assert!(shapes.is_empty());
    shapes.set_count(f32::NAN);
    assert!(shapes.is_empty());
}

#[test]
fn shapes_recycle_within_margin() {
    let mut shapes = ShapeField::new(400.0, 300.0, 200.0, fastrand::Rng::with_seed(11));
    let loud = FrequencySample::from_bins(vec![255; 1024]);
    for _ in 0..3_000 {
        shapes.tick(Some(&loud));
        for s in shapes.shapes() {
            assert!(s.age >= 0.0 && s.age <= s.life);
            assert!(s.x >= -200.0 && s.x <= 600.0);
            assert!(s.y >= -200.0 && s.y <= 500.0);
        }
    }
}

#[test]
fn shapes_draw_onto_surface() {
    let mut shapes = ShapeField::new(200.0, 200.0, 80.0, fastrand::Rng::with_seed(5));
    let mut surface = Surface::new(200, 200);
    surface.clear(Color::BLACK);
    shapes.draw(&mut surface, Color::WHITE, Color::WHITE, 10.0);
    let lit = surface.pixels().chunks_exact(4).filter(|p| p[0] > 0).count();
    assert!(lit > 0);
}

#[test]
fn population_truncates_from_end_and_appends() {
    let mut pop = Population::new();
    let mut next = 0u32;
    pop.set_len_with(5, || {
        next += 1;
        next
    });
    assert_eq!(pop.as_slice(), &[1, 2, 3, 4, 5]);
    pop.set_len_with(3, || unreachable!());
    assert_eq!(pop.as_slice(), &[1, 2, 3]);
    pop.set_len_with(4, || 9);
    assert_eq!(pop.as_slice(), &[1, 2, 3, 9]);
    pop.reseed(2, || 0);
    assert_eq!(pop.as_slice(), &[0, 0]);
}
