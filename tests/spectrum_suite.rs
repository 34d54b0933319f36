use specterr::signal::{BIN_COUNT, DecodedTrack, FFT_SIZE, FrequencySample, SignalSource, SpectrumAnalyzer, TrackSignal};
use specterr::surface::Surface;
use specterr::visual::spectrum::{self, BinMap, FreqWindow, SpectrumStyle};
use std::f32::consts::TAU;
use std::path::PathBuf;

fn window(min_hz: f32, max_hz: f32) -> Option<FreqWindow> {
    Some(FreqWindow { min_hz, max_hz })
}

#[test]
fn indices_stay_in_range_for_valid_windows() {
    for (sr, bars, lo, hi) in [(44_100, 180, 20.0, 8000.0), (48_000, 7, 0.0, 24_000.0), (8_000, 500, 100.0, 3999.0)] {
        let map = BinMap::new(1024, sr, bars, window(lo, hi));
        let idx: Vec<usize> = map.indices().collect();
        assert_eq!(idx.len(), bars);
        assert!(idx.iter().all(|i| *i < 1024), "{sr} {bars} {lo}..{hi}");
        assert!(idx.windows(2).all(|w| w[0] <= w[1]), "indices must not decrease");
    }
}

#[test]
fn degenerate_windows_still_map_in_range() {
    for (lo, hi) in [(8000.0, 20.0), (30_000.0, 50_000.0), (-500.0, -10.0), (f32::NAN, 100.0), (0.0, f32::INFINITY)] {
        let map = BinMap::new(1024, 44_100, 64, window(lo, hi));
        assert!(map.indices().all(|i| i < 1024), "window {lo}..{hi}");
    }
}

#[test]
fn empty_window_with_fifty_bars_repeats_one_bin() {
    let map = BinMap::new(1024, 44_100, 50, window(0.0, 0.0));
    let idx: Vec<usize> = map.indices().collect();
    assert_eq!(idx.len(), 50);
    assert!(idx.iter().all(|i| *i == idx[0]));
    assert!(idx[0] < 1024);
}

#[test]
fn missing_window_spans_whole_sample() {
    let map = BinMap::new(1024, 44_100, 1024, None);
    let idx: Vec<usize> = map.indices().collect();
    assert_eq!(idx[0], 0);
    assert_eq!(idx[1023], 1023);
    assert_eq!(map.active_range(), (0, 1024));
}

#[test]
fn zero_bars_or_empty_sample_draws_nothing() {
    let mut surface = Surface::new(64, 64);
    let before = surface.pixels().to_vec();
    let loud = FrequencySample::from_bins(vec![255; 1024]);
    let style = SpectrumStyle {
        bars: 0,
        ..SpectrumStyle::default()
    };
    spectrum::draw_circular(&mut surface, (32.0, 32.0), 10.0, &loud, &style);
    spectrum::draw_linear(&mut surface, (0.0, 0.0, 64.0, 64.0), &loud, &style);
    assert_eq!(surface.pixels(), &before[..]);

    let empty = FrequencySample::new(0);
    spectrum::draw_circular(&mut surface, (32.0, 32.0), 10.0, &empty, &SpectrumStyle::default());
    assert_eq!(surface.pixels(), &before[..]);
    assert!(spectrum::wave_points((0.0, 0.0), 10.0, 5.0, &empty).is_empty());
}

#[test]
fn every_renderer_survives_hostile_input() {
    let mut surface = Surface::new(120, 90);
    let loud = FrequencySample::from_bins(vec![255; 1024]);
    let style = SpectrumStyle {
        thickness: f32::NAN,
        height: f32::INFINITY,
        pulse: -3.0,
        window: window(9000.0, 10.0),
        ..SpectrumStyle::default()
    };
    let mut rng = fastrand::Rng::with_seed(1);
    let c = (60.0, 45.0);
    spectrum::draw_circular(&mut surface, c, 30.0, &loud, &style);
    spectrum::draw_linear(&mut surface, (5.0, 20.0, 110.0, 50.0), &loud, &style);
    spectrum::draw_halo(&mut surface, c, 30.0, &loud, &style);
    spectrum::draw_aura(&mut surface, c, 30.0, &loud, &style);
    spectrum::draw_energy(&mut surface, c, 30.0, &loud, &style);
    spectrum::draw_retro(&mut surface, c, 30.0, &loud, &style);
    spectrum::draw_arcs(&mut surface, c, 30.0, &loud, &style, &mut rng);
    spectrum::draw_wave(&mut surface, c, f32::NAN, 20.0, &loud, &style);
}

#[test]
fn circular_bars_light_up_the_surface() {
    let mut surface = Surface::new(200, 200);
    let loud = FrequencySample::from_bins(vec![200; 1024]);
    spectrum::draw_circular(&mut surface, (100.0, 100.0), 40.0, &loud, &SpectrumStyle::default());
    let lit = surface.pixels().chunks_exact(4).filter(|p| p[0] > 0 || p[2] > 0).count();
    assert!(lit > 100, "only {lit} pixels lit");
}

#[test]
fn wave_ring_reads_empty_bins_as_mid_level() {
    let silent = FrequencySample::new(1024);
    let pts = spectrum::wave_points((0.0, 0.0), 50.0, 40.0, &silent);
    assert!(!pts.is_empty());
    for (x, y) in pts {
        let r = (x * x + y * y).sqrt();
        assert!((r - 50.0 - 40.0 * (128.0 / 255.0 - 0.5)).abs() < 1e-3);
    }
}

#[test]
fn analyzer_is_silent_on_zero_input() {
    let mut analyzer = SpectrumAnalyzer::new(FFT_SIZE);
    let mut out = vec![7u8; BIN_COUNT];
    analyzer.analyze(&vec![0.0; FFT_SIZE], &mut out);
    assert!(out.iter().all(|v| *v == 0));
}

#[test]
fn analyzer_peaks_at_tone_bin() {
    let sr = 44_100.0;
    let bin = 100usize;
    let freq = bin as f32 * sr / FFT_SIZE as f32;
    let tone: Vec<f32> = (0..FFT_SIZE).map(|i| (TAU * freq * i as f32 / sr).sin()).collect();
    let mut analyzer = SpectrumAnalyzer::new(FFT_SIZE);
    let mut out = vec![0u8; BIN_COUNT];
    for _ in 0..20 {
        analyzer.analyze(&tone, &mut out);
    }
    let peak = out
        .iter()
        .enumerate()
        .max_by_key(|(_, v)| **v)
        .map(|(i, _)| i)
        .unwrap_or_default();
    assert!(peak.abs_diff(bin) <= 1, "peak at {peak}");
    assert!(out[bin] > 200);
    assert!(out[600] < out[bin] / 2);

    analyzer.reset();
    analyzer.analyze(&vec![0.0; FFT_SIZE], &mut out);
    assert!(out.iter().all(|v| *v == 0));
}

#[test]
fn track_signal_runs_out_and_rewinds() {
    let track = DecodedTrack {
        path: PathBuf::from("tone.wav"),
        sample_rate: 8_000,
        mono: (0..8_000).map(|i| (i as f32 * 0.3).sin()).collect(),
    };
    let mut signal = TrackSignal::from_track(track);
    let mut sample = FrequencySample::new(signal.bin_count());
    assert!(!signal.is_playing());
    assert_eq!(signal.media().map(|m| m.duration_s), Some(1.0));

    signal.resume().expect("resume");
    signal.advance(0.5);
    signal.refresh(&mut sample);
    assert!(sample.bins().iter().any(|v| *v > 0));
    assert!(!signal.has_ended());

    signal.advance(0.6);
    assert!(signal.has_ended());
    assert!(!signal.is_playing());

    signal.resume().expect("resume after end");
    assert!(signal.position_s() < 1e-9);
    assert!(signal.is_playing());
}

#[test]
fn paused_track_does_not_advance() {
    let track = DecodedTrack {
        path: PathBuf::from("quiet.wav"),
        sample_rate: 1_000,
        mono: vec![0.0; 1_000],
    };
    let mut signal = TrackSignal::from_track(track);
    signal.advance(0.5);
    assert_eq!(signal.position_s(), 0.0);
}

/// Distance from `p` to the infinite line through `a` and `b`.
fn off_line(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    ((p.0 - a.0) * dy - (p.1 - a.1) * dx).abs() / (dx * dx + dy * dy).sqrt()
}

#[test]
fn arc_jitter_scales_with_level() {
    let (p0, p1) = ((100.0, 100.0), (180.0, 40.0));
    let mut rng = fastrand::Rng::with_seed(21);

    let quiet = spectrum::arc_points(p0, p1, 0.0, &mut rng);
    assert_eq!(quiet.len(), spectrum::ARC_STEPS + 1);
    assert_eq!(quiet[0], p0);
    assert!(quiet.iter().all(|&p| off_line(p, p0, p1) < 1e-3), "silence must stay straight");

    let loud = spectrum::arc_points(p0, p1, 1.0, &mut rng);
    let worst = loud.iter().map(|&p| off_line(p, p0, p1)).fold(0.0f32, f32::max);
    assert!(worst > 0.1, "loud arc is still straight");
    assert!(worst <= 5.0 * std::f32::consts::SQRT_2 + 1e-3);

    let soft = spectrum::arc_points(p0, p1, 0.1, &mut rng);
    assert!(soft.iter().all(|&p| off_line(p, p0, p1) <= 0.5 * std::f32::consts::SQRT_2 + 1e-3));
}

#[test]
fn halo_rings_average_their_own_slice() {
    let style = SpectrumStyle::default();
    let mut bins = vec![0u8; 1200];
    bins[400..600].iter_mut().for_each(|b| *b = 255);
    let levels = spectrum::halo_levels(&FrequencySample::from_bins(bins), &style);
    assert_eq!(levels.len(), spectrum::HALO_RINGS);
    for (k, level) in levels.iter().enumerate() {
        if k == 2 {
            assert!((level - 1.0).abs() < 1e-6, "ring 2 at {level}");
        } else {
            assert_eq!(*level, 0.0, "ring {k} picked up energy");
        }
    }

    let mut half = vec![0u8; 1200];
    half[1000..1100].iter_mut().for_each(|b| *b = 255);
    let levels = spectrum::halo_levels(&FrequencySample::from_bins(half), &style);
    assert!((levels[5] - 0.5).abs() < 1e-6);
    assert!(levels[..5].iter().all(|l| *l == 0.0));

    assert_eq!(spectrum::halo_levels(&FrequencySample::new(0), &style), [0.0; spectrum::HALO_RINGS]);
}

#[test]
fn halo_rings_follow_the_frequency_window() {
    // 0..11025 Hz of a 44.1 kHz sample is the lower half of the bins.
    let style = SpectrumStyle {
        window: window(0.0, 11_025.0),
        ..SpectrumStyle::default()
    };
    let mut bins = vec![0u8; 1200];
    bins[600..].iter_mut().for_each(|b| *b = 255);
    let levels = spectrum::halo_levels(&FrequencySample::from_bins(bins), &style);
    assert_eq!(levels, [0.0; spectrum::HALO_RINGS], "bins above the window leaked in");
}
