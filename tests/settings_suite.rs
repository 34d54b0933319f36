use specterr::color::Color;
use specterr::settings::{MAX_BARS, MAX_POPULATION, Preset, SettingsError, VisualConfig, coerce_bars, coerce_count};
use specterr::visual::{ParticleDirection, VisualMode};

#[test]
fn mix_hits_both_endpoints() {
    let a = Color::parse_hex("#00eaff").expect("hex");
    let b = Color::parse_hex("#ff3fa8").expect("hex");
    let at0 = a.mix(b, 0.0);
    let at1 = a.mix(b, 1.0);
    assert_eq!((at0.r, at0.g, at0.b), (a.r, a.g, a.b));
    assert_eq!((at1.r, at1.g, at1.b), (b.r, b.g, b.b));
    assert_eq!(a.mix(b, -3.0), a);
    assert_eq!(a.mix(b, f32::NAN), a);
    assert_eq!(a.mix(b, 7.0), b);
}

#[test]
fn midpoint_mix_rounds() {
    let m = Color::rgb(0, 0, 0).mix(Color::rgb(255, 10, 3), 0.5);
    assert_eq!((m.r, m.g, m.b), (128, 5, 2));
}

#[test]
fn hex_parsing_accepts_only_six_digits() {
    assert_eq!(Color::parse_hex("ff0000"), Some(Color::rgb(255, 0, 0)));
    assert_eq!(Color::parse_hex(" #00FF7f "), Some(Color::rgb(0, 255, 127)));
    assert_eq!(Color::parse_hex("#fff"), None);
    assert_eq!(Color::parse_hex("#gg0000"), None);
    assert_eq!(Color::parse_hex("#ff00ff00"), None);
    let c = Color::hex_with_alpha("#102030", 0.25).expect("hex");
    assert_eq!(c.a, 0.25);
    assert_eq!(c.to_hex(), "#102030");
}

#[test]
fn alpha_is_clamped() {
    assert_eq!(Color::WHITE.with_alpha(4.0).a, 1.0);
    assert_eq!(Color::WHITE.with_alpha(f32::NAN).a, 0.0);
    assert_eq!(Color::WHITE.with_alpha(0.5).fade(0.5).a, 0.25);
}

#[test]
fn count_coercion() {
    assert_eq!(coerce_count(160.0), 160);
    assert_eq!(coerce_count(3.99), 3);
    assert_eq!(coerce_count(-1.0), 0);
    assert_eq!(coerce_count(f32::NAN), 0);
    assert_eq!(coerce_count(f32::INFINITY), 0);
}

#[test]
fn presets_set_their_fields_and_keep_sizes() {
    for preset in Preset::ALL {
        let mut cfg = VisualConfig {
            spectrum_size: 77.0,
            title: "KEEP".to_string(),
            ..VisualConfig::default()
        };
        preset.apply(&mut cfg);
        assert_eq!(cfg.spectrum_size, 77.0, "{}", preset.name());
        assert_eq!(cfg.title, "KEEP");
        assert!(cfg.min_freq < cfg.max_freq);
        assert!(cfg.particles > 0.0);
    }

    let mut cfg = VisualConfig::default();
    Preset::Gothic.apply(&mut cfg);
    assert_eq!(cfg.mode, VisualMode::Linear);
    assert_eq!(cfg.spectrum_bars, 120.0);
    assert_eq!(cfg.color_a.to_hex(), "#ffd27a");
}

#[test]
fn parse_overrides_defaults() {
    let text = "\
# comment
mode = halo
color_a = #112233
particles = 12.7
glow = 9000
title = Night Drive
preset_is_unknown = 1
";
    let cfg = VisualConfig::parse(text).expect("parse");
    assert_eq!(cfg.mode, VisualMode::Halo);
    assert_eq!(cfg.color_a, Color::rgb(0x11, 0x22, 0x33));
    assert_eq!(cfg.particles, 12.0);
    assert_eq!(cfg.glow, 200.0);
    assert_eq!(cfg.title, "Night Drive");
    assert_eq!(cfg.artist, VisualConfig::default().artist);
}

#[test]
fn preset_key_applies_in_file_order() {
    let cfg = VisualConfig::parse("preset = fire\nparticles = 5\n").expect("parse");
    assert_eq!(cfg.mode, VisualMode::Wave);
    assert_eq!(cfg.particles, 5.0);
}

#[test]
fn parse_errors_carry_line_numbers() {
    match VisualConfig::parse("glow = 3\nno separator here\n") {
        Err(SettingsError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(matches!(
        VisualConfig::parse("color_b = blue"),
        Err(SettingsError::Parse { line: 1, .. })
    ));
    assert!(matches!(VisualConfig::parse("mode = spiral"), Err(SettingsError::Parse { .. })));
}

#[test]
fn counts_are_capped() {
    assert_eq!(coerce_count(1e20), MAX_POPULATION);
    assert_eq!(coerce_count(f32::MAX), MAX_POPULATION);
    assert_eq!(coerce_count(4999.9), 4999);
    assert_eq!(coerce_bars(1e9), MAX_BARS);
    assert_eq!(coerce_bars(180.0), 180);
    assert_eq!(coerce_bars(f32::NAN), 0);

    let cfg = VisualConfig::parse("particles = 1e20\nspectrum_bars = 1e12\n").expect("parse");
    assert_eq!(cfg.particles, MAX_POPULATION as f32);
    assert_eq!(cfg.spectrum_bars, MAX_BARS as f32);
}

#[test]
fn particle_direction_is_read_and_written() {
    assert_eq!(VisualConfig::default().particle_direction, ParticleDirection::Float);
    let cfg = VisualConfig::parse("particle_direction = up\n").expect("parse");
    assert_eq!(cfg.particle_direction, ParticleDirection::Up);
    assert!(cfg.to_text().contains("particle_direction = up"));
    assert!(matches!(
        VisualConfig::parse("particle_direction = sideways"),
        Err(SettingsError::Parse { line: 1, .. })
    ));
    for dir in ParticleDirection::ALL {
        assert_eq!(ParticleDirection::from_name(dir.name()), Some(dir));
    }
}

#[test]
fn save_then_load_restores_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("settings.txt");
    let mut cfg = VisualConfig::default();
    Preset::Cyber.apply(&mut cfg);
    cfg.artist = "Somebody".to_string();
    cfg.particle_direction = ParticleDirection::Left;
    cfg.save(&path).expect("save");
    assert!(!path.with_extension("tmp").exists());

    let loaded = VisualConfig::load(Some(&path)).expect("load");
    assert_eq!(loaded, cfg);
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = VisualConfig::load(Some(&dir.path().join("absent.txt"))).expect("load");
    assert_eq!(cfg, VisualConfig::default());
    assert_eq!(VisualConfig::load(None).expect("load"), VisualConfig::default());
}

#[test]
fn mode_cycle_wraps() {
    assert_eq!(VisualMode::Retro.next(), VisualMode::Triangles);
    assert_eq!(VisualMode::Triangles.prev(), VisualMode::Retro);
    for mode in VisualMode::ALL {
        assert_eq!(VisualMode::from_name(mode.name()), Some(mode));
        assert_eq!(mode.next().prev(), mode);
    }
}
