use super::*;
use contracts::{EventType, FlagKind, ScalingContext, SourceModule};

fn engine() -> CoherenceEngine {
    CoherenceEngine::new(EngineConfig::default()).expect("default config is valid")
}

fn mid_metrics() -> SubMetrics {
    SubMetrics {
        quality: 0.8,
        efficiency: 0.7,
        consistency: 0.75,
    }
}

#[test]
fn invalid_configs_are_rejected_at_construction() {
    let mut config = EngineConfig::default();
    config.oscillator_count = 0;
    assert_eq!(
        CoherenceEngine::new(config).err(),
        Some(ConfigError::ZeroOscillators)
    );

    let mut config = EngineConfig::default();
    config.stability_ratio = 1.0;
    assert!(matches!(
        CoherenceEngine::new(config).err(),
        Some(ConfigError::StabilityRatioOutOfRange { .. })
    ));

    let mut config = EngineConfig::default();
    config.smoothing_lambda = 1.0;
    assert!(matches!(
        CoherenceEngine::new(config).err(),
        Some(ConfigError::SmoothingLambdaOutOfRange { .. })
    ));
}

#[test]
fn tick_advances_clock_and_logs_completion() {
    let mut engine = engine();
    let state = engine.tick();
    assert_eq!(engine.status().current_tick, 1);
    assert!((0.0..=1.0).contains(&state.value));
    assert!(engine
        .events()
        .iter()
        .any(|event| event.event_type == EventType::TickCompleted));
}

#[test]
fn start_and_stop_are_idempotent_mode_toggles() {
    let mut engine = engine();
    assert!(!engine.is_running());
    engine.start();
    engine.start();
    assert!(engine.is_running());
    engine.stop();
    engine.stop();
    assert!(!engine.is_running());
}

#[test]
fn evaluation_before_first_tick_is_defined() {
    let mut engine = engine();
    let breakdown = engine.evaluate_score(mid_metrics(), &ScalingContext::default());
    assert!(breakdown.is_finite());
    assert_eq!(engine.history(10).len(), 1);
    assert_eq!(engine.status().evaluation_count, 1);
}

#[test]
fn unauthorized_flag_action_leaves_no_trace() {
    let mut engine = engine();
    let before = engine.events().len();
    let result = engine.activate_flag(FlagKind::Stop, SourceModule::Nova, "halt", 0.5, None);
    assert!(result.is_err());
    assert_eq!(engine.events().len(), before);
    assert!(!engine.flag(FlagKind::Stop).active);
    assert_eq!(engine.status().active_flag_count, 0);
}

#[test]
fn activation_biases_the_next_evaluation() {
    let mut engine = engine();
    engine.step_n(3);
    let baseline = engine.evaluate_score(mid_metrics(), &ScalingContext::default());
    engine
        .activate_flag(FlagKind::Stop, SourceModule::Oracle, "halt", 0.5, None)
        .expect("oracle may stop");
    let dampened = engine.evaluate_score(mid_metrics(), &ScalingContext::default());
    assert!(dampened.raw < baseline.raw);
    assert_eq!(engine.status().active_flag_count, 1);
}

#[test]
fn stop_cancels_pending_perturbation() {
    let mut engine = engine();
    engine.perturb(0.9, 100);
    engine.stop();
    let ended = engine
        .events()
        .iter()
        .filter(|event| event.event_type == EventType::PerturbationEnded)
        .count();
    assert_eq!(ended, 1);
    let state = engine.tick();
    assert_ne!(state.value, 0.9);
}

#[test]
fn subscription_sees_only_events_after_subscribe() {
    let mut engine = engine();
    engine.tick();
    let subscription = engine.subscribe();
    assert!(engine.poll_events(subscription).is_empty());
    engine.tick();
    let batch = engine.poll_events(subscription);
    assert!(!batch.is_empty());
    assert!(batch.iter().all(|event| event.tick == 2));
    assert!(engine.poll_events(subscription).is_empty());
    assert!(engine.unsubscribe(subscription));
    assert!(!engine.unsubscribe(subscription));
}

#[test]
fn spawned_variant_is_logged_and_counted() {
    let mut engine = engine();
    engine.evaluate_score(mid_metrics(), &ScalingContext::default());
    let mut spawned = None;
    for _ in 0..100 {
        spawned = engine.spawn_variant(0.5, 0.25, None);
        if spawned.is_some() {
            break;
        }
    }
    let variant = spawned.expect("hot entropy near critical spawns");
    assert_eq!(engine.status().population_size, engine.variants().len());
    assert!(engine.variant(&variant.variant_id).is_some());
    assert!(engine
        .events()
        .iter()
        .any(|event| event.event_type == EventType::VariantSpawned));
}

#[test]
fn equal_configs_replay_to_equal_hashes() {
    let mut left = engine();
    let mut right = engine();
    for _ in 0..32 {
        left.tick();
        right.tick();
    }
    left.evaluate_score(mid_metrics(), &ScalingContext::default());
    right.evaluate_score(mid_metrics(), &ScalingContext::default());
    assert_eq!(left.replay_hash(), right.replay_hash());
    assert_eq!(left.state_hash(), right.state_hash());
}

#[test]
fn inspect_summary_exposes_all_blocks() {
    let mut engine = engine();
    engine.step_n(2);
    engine.evaluate_score(mid_metrics(), &ScalingContext::default());
    let summary = engine.inspect_summary();
    assert!(summary.get("status").is_some());
    assert!(summary.get("coherence").is_some());
    assert!(summary.get("flags").is_some());
    assert!(summary.get("population").is_some());
    assert!(summary.get("score_tail").is_some());
}
