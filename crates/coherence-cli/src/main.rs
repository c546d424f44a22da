use std::env;
use std::time::Duration;

use coherence_core::CoherenceEngine;
use contracts::{EngineConfig, ScalingContext, SubMetrics};

fn print_usage() {
    println!("coherence-cli <command>");
    println!("commands:");
    println!("  status");
    println!("  tick [n]");
    println!("  run-to <tick>");
    println!("  simulate <run_id> <seed> [ticks]");
    println!("    deterministic batch run with periodic score evaluations");
    println!("  run [ticks] [interval_ms]");
    println!("    timer-driven loop; ctrl-c stops the engine cleanly");
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {}", label))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {}: {}", label, raw))
}

fn parse_seed(value: Option<&String>) -> Result<u64, String> {
    let raw = value.ok_or_else(|| "missing seed".to_string())?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid seed: {raw}"))
}

/// Sub-metrics derived from the field itself, so a driver run exercises
/// the full pipeline without external signal sources: synchrony as
/// quality, inverted noise as efficiency, inverted entropy as
/// consistency.
fn derived_metrics(engine: &CoherenceEngine) -> SubMetrics {
    let state = engine.coherence_state();
    SubMetrics {
        quality: state.value,
        efficiency: (1.0 - state.noise_level).clamp(0.0, 1.0),
        consistency: (1.0 - state.entropy).clamp(0.0, 1.0),
    }
}

fn drive_ticks(engine: &mut CoherenceEngine, ticks: u64) {
    for step in 0..ticks {
        let state = engine.tick();
        if step % 10 == 0 {
            engine.evaluate_score(derived_metrics(engine), &ScalingContext::default());
            engine.spawn_variant(0.5, state.entropy, None);
        }
    }
}

fn run_simulation(args: &[String]) -> Result<(), String> {
    let run_id = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing run_id".to_string())?;
    let seed = parse_seed(args.get(3))?;
    let ticks = args
        .get(4)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid ticks: {value}"))
        })
        .transpose()?
        .unwrap_or(240);

    let mut config = EngineConfig::default();
    config.run_id = run_id.clone();
    config.seed = seed;

    let mut engine = CoherenceEngine::new(config).map_err(|err| err.to_string())?;
    engine.start();
    drive_ticks(&mut engine, ticks);
    engine.stop();

    println!(
        "simulated run_id={} seed={} {}",
        run_id,
        seed,
        engine.status()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&engine.inspect_summary())
            .map_err(|err| err.to_string())?
    );
    Ok(())
}

async fn run_timer_loop(args: &[String]) -> Result<(), String> {
    let ticks = args
        .get(2)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid ticks: {value}"))
        })
        .transpose()?
        .unwrap_or(u64::MAX);
    let mut config = EngineConfig::default();
    if let Some(interval) = args.get(3) {
        config.tick_interval_ms = interval
            .parse::<u64>()
            .map_err(|_| format!("invalid interval_ms: {interval}"))?;
        config.validate().map_err(|err| err.to_string())?;
    }

    let interval_ms = config.tick_interval_ms;
    let mut engine = CoherenceEngine::new(config).map_err(|err| err.to_string())?;
    engine.start();
    let mut timer = tokio::time::interval(Duration::from_millis(interval_ms));
    let mut committed = 0_u64;
    loop {
        if committed >= ticks {
            break;
        }
        tokio::select! {
            _ = timer.tick() => {
                let state = engine.tick();
                committed += 1;
                if committed % 10 == 0 {
                    let breakdown =
                        engine.evaluate_score(derived_metrics(&engine), &ScalingContext::default());
                    println!(
                        "tick={} value={:.4} entropy={:.4} regime={} final={:.4}",
                        committed,
                        state.value,
                        state.entropy,
                        state.regime.as_str(),
                        breakdown.final_score
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("interrupted");
                break;
            }
        }
    }
    engine.stop();
    println!("stopped: {}", engine.status());
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => match CoherenceEngine::new(EngineConfig::default()) {
            Ok(engine) => println!("{}", engine.status()),
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        },
        Some("tick") => {
            let steps = args.get(2).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
            match CoherenceEngine::new(EngineConfig::default()) {
                Ok(mut engine) => {
                    engine.start();
                    drive_ticks(&mut engine, steps);
                    println!("stepped={} {}", steps, engine.status());
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    std::process::exit(2);
                }
            }
        }
        Some("run-to") => match parse_u64(args.get(2), "tick") {
            Ok(target_tick) => match CoherenceEngine::new(EngineConfig::default()) {
                Ok(mut engine) => {
                    engine.start();
                    let committed = engine.run_to_tick(target_tick);
                    println!("committed={} {}", committed, engine.status());
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    std::process::exit(2);
                }
            },
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        Some("simulate") => {
            if let Err(err) = run_simulation(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("run") => {
            if let Err(err) = run_timer_loop(&args).await {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
