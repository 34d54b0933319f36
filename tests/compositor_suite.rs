use specterr::clock::{FrameClock, OfflineClock, RealtimeClock};
use specterr::settings::{MAX_POPULATION, VisualConfig};
use specterr::signal::{FrequencySample, MediaInfo, SignalSource, SilentSignal};
use specterr::surface::RasterImage;
use specterr::visual::{Compositor, VisualMode};

/// Full-scale magnitudes on every bin.
struct LoudSignal;

impl SignalSource for LoudSignal {
    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn refresh(&mut self, out: &mut FrequencySample) {
        out.bins_mut().iter_mut().for_each(|b| *b = 230);
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn pause(&mut self) {}

    fn rewind(&mut self) {}

    fn is_playing(&self) -> bool {
        true
    }

    fn has_ended(&self) -> bool {
        false
    }

    fn media(&self) -> Option<MediaInfo> {
        None
    }
}

fn frames(n: u64) -> Vec<specterr::clock::FrameTick> {
    let mut clock = OfflineClock::new(30).with_limit(n);
    std::iter::from_fn(|| clock.next_frame()).collect()
}

#[test]
fn every_mode_renders_a_frame() {
    for mode in VisualMode::ALL {
        let cfg = VisualConfig {
            mode,
            ..VisualConfig::default()
        };
        let mut comp = Compositor::new(320, 180, &cfg, 42);
        let mut signal = LoudSignal;
        for tick in frames(3) {
            comp.render(&mut signal, &cfg, &tick);
        }
        assert_eq!(comp.sample().len(), 1024);
        assert_eq!(comp.surface().pixels().len(), 320 * 180 * 4);
        assert!(
            comp.surface().pixels().chunks_exact(4).all(|p| p[3] == 255),
            "mode {} left transparent pixels",
            mode.name()
        );
    }
}

#[test]
fn resize_to_zero_then_render_is_safe() {
    let cfg = VisualConfig::default();
    let mut comp = Compositor::new(200, 100, &cfg, 1);
    let mut signal = LoudSignal;
    comp.resize(0, 0);
    for mode in VisualMode::ALL {
        let cfg = VisualConfig {
            mode,
            ..VisualConfig::default()
        };
        for tick in frames(2) {
            comp.render(&mut signal, &cfg, &tick);
        }
    }
    assert!(comp.surface().pixels().is_empty());

    comp.resize(64, 48);
    comp.render(&mut signal, &cfg, &frames(1)[0]);
    assert_eq!(comp.surface().pixels().len(), 64 * 48 * 4);
}

#[test]
fn particle_count_follows_config_each_frame() {
    let mut cfg = VisualConfig::default();
    let mut comp = Compositor::new(160, 90, &cfg, 9);
    let mut signal = SilentSignal::new(48_000);
    let ticks = frames(4);

    comp.render(&mut signal, &cfg, &ticks[0]);
    assert_eq!(comp.particles().len(), 160);
    assert_eq!(comp.shapes().len(), 40);

    cfg.particles = 12.0;
    comp.render(&mut signal, &cfg, &ticks[1]);
    assert_eq!(comp.particles().len(), 12);
    assert_eq!(comp.shapes().len(), 3);

    cfg.particles = 0.0;
    comp.render(&mut signal, &cfg, &ticks[2]);
    assert!(comp.particles().is_empty());
    assert!(comp.shapes().is_empty());
}

#[test]
fn hostile_config_values_do_not_panic() {
    let cfg = VisualConfig {
        particles: f32::NAN,
        spectrum_bars: -40.0,
        spectrum_size: f32::INFINITY,
        spectrum_height: f32::NAN,
        spectrum_thickness: -1.0,
        min_freq: 9000.0,
        max_freq: 10.0,
        glow: f32::NEG_INFINITY,
        title_size: 0.0,
        artist_size: f32::NAN,
        ..VisualConfig::default()
    };
    let mut signal = LoudSignal;
    for mode in VisualMode::ALL {
        let cfg = VisualConfig { mode, ..cfg.clone() };
        let mut comp = Compositor::new(96, 64, &cfg, 3);
        for tick in frames(2) {
            comp.render(&mut signal, &cfg, &tick);
        }
        assert!(comp.particles().is_empty());
    }
}

#[test]
fn huge_counts_are_capped_when_rendering() {
    let cfg = VisualConfig {
        particles: 1e20,
        spectrum_bars: 1e20,
        ..VisualConfig::default()
    };
    let mut signal = LoudSignal;
    for mode in [VisualMode::Triangles, VisualMode::Rings, VisualMode::Linear] {
        let cfg = VisualConfig { mode, ..cfg.clone() };
        let mut comp = Compositor::new(64, 48, &cfg, 4);
        comp.render(&mut signal, &cfg, &frames(1)[0]);
        assert_eq!(comp.particles().len(), MAX_POPULATION);
        assert!(comp.shapes().len() <= MAX_POPULATION);
    }
}

#[test]
fn background_and_logo_are_drawn() {
    let cfg = VisualConfig {
        particles: 0.0,
        spectrum_bars: 0.0,
        title: " ".to_string(),
        artist: " ".to_string(),
        ..VisualConfig::default()
    };
    let mut comp = Compositor::new(100, 100, &cfg, 5);
    let red = RasterImage::from_rgba(2, 2, [255, 0, 0, 255].repeat(4)).expect("valid image");
    comp.set_background(Some(red));
    let mut signal = SilentSignal::new(44_100);
    comp.render(&mut signal, &cfg, &frames(1)[0]);
    let corner = comp.surface().pixel(0, 0).expect("in bounds");
    assert!(corner[0] > 200 && corner[1] < 30, "background not applied: {corner:?}");

    let green = RasterImage::from_rgba(1, 1, vec![0, 255, 0, 255]).expect("valid image");
    comp.set_logo(Some(green));
    comp.render(&mut signal, &cfg, &frames(1)[0]);
    let mid = comp.surface().pixel(50, 50).expect("in bounds");
    assert!(mid[1] > 200, "logo not applied: {mid:?}");
}

#[test]
fn image_rejects_short_buffers() {
    assert!(RasterImage::from_rgba(4, 4, vec![0; 10]).is_none());
    assert!(RasterImage::from_rgba(0, 4, Vec::new()).is_none());
}

#[test]
fn offline_clock_steps_at_fixed_rate() {
    let ticks = frames(5);
    assert_eq!(ticks.len(), 5);
    for (i, t) in ticks.iter().enumerate() {
        assert_eq!(t.index, i as u64);
        assert!((t.dt - 1.0 / 30.0).abs() < 1e-6);
        assert!((t.t - i as f32 / 30.0).abs() < 1e-5);
    }
    assert_eq!(OfflineClock::new(0).fps(), 1);
}

#[test]
fn realtime_clock_counts_frames() {
    let mut clock = RealtimeClock::new(1000);
    let a = clock.next_frame().expect("tick");
    let b = clock.next_frame().expect("tick");
    assert_eq!((a.index, b.index), (0, 1));
    assert!(b.dt > 0.0);
}
