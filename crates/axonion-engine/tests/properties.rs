use axonion_engine::{EngineConfig, SimulationEngine, StimulusProtocol};
use proptest::prelude::*;

fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.acquisition.noise_std = 0.0;
    config.acquisition.sample_rate = 1;
    config
}

fn engine_with(protocol: StimulusProtocol) -> SimulationEngine {
    let mut config = quiet_config();
    config.protocol = protocol;
    SimulationEngine::new(config).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pulse_is_off_outside_width(
        amplitude in -50.0..50.0f64,
        period in 0.5..200.0f64,
        width_fraction in 0.0..1.0f64,
        t in 0.0..5000.0f64,
    ) {
        let width = period * width_fraction;
        let pulse = StimulusProtocol::Pulse { amplitude, period, width };
        if t.rem_euclid(period) >= width {
            prop_assert_eq!(pulse.current_at(t), StimulusProtocol::Off.current_at(t));
        } else {
            prop_assert_eq!(pulse.current_at(t), amplitude);
        }
    }
}

#[test]
fn test_rest_converges_without_spikes() {
    let mut engine = engine_with(StimulusProtocol::Constant { amplitude: 0.0 });
    engine.run_for(500.0);

    assert!(engine.drain_spikes().is_empty());
    let late = engine.query_history(400.0, 500.0);
    let (lo, hi) = late.iter().fold((f64::MAX, f64::MIN), |(lo, hi), s| {
        (lo.min(s.membrane_potential), hi.max(s.membrane_potential))
    });
    assert!(hi - lo < 0.1, "resting voltage still drifting: {}..{}", lo, hi);
    assert!((engine.state().membrane_potential + 65.0).abs() < 1.0);
}

#[test]
fn test_constant_drive_has_stable_interspike_interval() {
    let mut engine = engine_with(StimulusProtocol::Constant { amplitude: 10.0 });
    engine.run_for(500.0);

    let spikes = engine.drain_spikes();
    assert!(spikes.len() >= 20, "only {} spikes", spikes.len());

    let intervals: Vec<f64> = spikes.windows(2).map(|w| w[1].time - w[0].time).skip(2).collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    assert!(mean > 10.0 && mean < 20.0, "mean ISI {}", mean);
    for isi in &intervals {
        assert!((isi - mean).abs() < 0.1, "ISI {} deviates from mean {}", isi, mean);
    }
}

#[test]
fn test_spike_count_tracks_calcium_load() {
    let mut config = quiet_config();
    config.protocol = StimulusProtocol::Constant { amplitude: 10.0 };
    config.neuron.metabolism.calcium_clearance_rate = 0.0;
    let mut engine = SimulationEngine::new(config).unwrap();
    engine.run_for(200.0);

    let spikes = engine.drain_spikes().len() as f64;
    let per_spike = engine.config().neuron.metabolism.calcium_per_spike;
    assert!(spikes > 0.0);
    assert!((engine.state().intracellular_calcium - spikes * per_spike).abs() < 1e-9);
}

#[test]
fn test_history_round_trip() {
    let mut engine = engine_with(StimulusProtocol::Pulse { amplitude: 15.0, period: 20.0, width: 2.0 });
    engine.run_for(100.0);

    let all = engine.query_history(f64::NEG_INFINITY, f64::INFINITY);
    assert_eq!(all.len(), 4000);
    assert_eq!(all.as_slice(), engine.history().samples());
    for pair in all.windows(2) {
        let gap = pair[1].time - pair[0].time;
        assert!((gap - 0.025).abs() < 1e-9, "gap {}", gap);
    }

    let live = engine.live_window();
    assert_eq!(live.len(), 2000);
    assert_eq!(live.as_slice(), &all[2000..]);
}

#[test]
fn test_reset_restores_defaults() {
    let mut engine = engine_with(StimulusProtocol::Constant { amplitude: 10.0 });
    engine.run_for(80.0);
    engine.reset();

    let fresh = engine_with(StimulusProtocol::Off);
    assert_eq!(engine.state(), fresh.state());
    assert!(engine.live_window().is_empty());
    assert!(engine.history().is_empty());
}

#[test]
fn test_zero_noise_samples_match_state() {
    let mut engine = engine_with(StimulusProtocol::Constant { amplitude: 10.0 });
    for _ in 0..2000 {
        let sample = engine.step().unwrap();
        let state = engine.state();
        assert_eq!(sample.time, state.simulation_time);
        assert_eq!(sample.membrane_potential, state.membrane_potential);
        assert_eq!(sample.calcium, state.intracellular_calcium);
        assert_eq!(sample.atp, state.atp_level);
        assert_eq!(sample.stress, state.mitochondrial_stress);
        assert_eq!(sample.damage, state.structural_damage);
        assert_eq!(sample.injected_current, 10.0);
    }
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let mut config = EngineConfig::default();
    config.acquisition.noise_std = 1.0;
    config.acquisition.seed = Some(11);
    config.protocol = StimulusProtocol::Constant { amplitude: 10.0 };

    let mut a = SimulationEngine::new(config.clone()).unwrap();
    let mut b = SimulationEngine::new(config).unwrap();
    a.run_for(50.0);
    b.run_for(50.0);
    assert_eq!(a.live_window(), b.live_window());
}

#[test]
fn test_history_export_as_json() {
    let mut engine = engine_with(StimulusProtocol::Off);
    engine.run_for(1.0);
    let json = serde_json::to_string(&engine.history().samples()).unwrap();
    let back: Vec<axonion_engine::Sample> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), 40);
    assert!(back.iter().all(|s| s.viable));
}
