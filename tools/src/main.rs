//! replay-runner: headless driver for the outflow replay engine.
//!
//! Usage:
//!   replay-runner --db replay.db --t-end 20 --dtmax 0.25
//!   replay-runner --db replay.db --synth 5000 --seed 7 --config inject.json
//!   replay-runner --print-options --config inject.json

use anyhow::Result;
use outflow_replay_core::{
    config::InjectConfig,
    engine::ReplayEngine,
    store::SqliteStore,
    synth::{generate_outflow, OutflowSpec},
    types::ParticleKind,
};
use std::env;
use std::io;

#[derive(serde::Serialize)]
struct RunReport<'a> {
    run_id:         &'a str,
    steps:          u64,
    final_time:     f64,
    events:         usize,
    total_injected: usize,
    gas:            usize,
    dust:           usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let config_path = string_arg(&args, "--config");
    let t_start = parse_arg(&args, "--t-start", 0.0f64);
    let t_end = parse_arg(&args, "--t-end", 20.0f64);
    let dtmax = parse_arg(&args, "--dtmax", 0.25f64);
    let synth = parse_arg(&args, "--synth", 0usize);
    let seed = parse_arg(&args, "--seed", 42u64);
    let json = args.iter().any(|a| a == "--json");

    let config = match config_path {
        Some(path) => InjectConfig::load(path)?,
        None => InjectConfig::default_test(),
    };

    if args.iter().any(|a| a == "--print-options") {
        config.write_options(&mut io::stdout())?;
        return Ok(());
    }

    let resolved = config.resolve()?;

    if !json {
        println!("outflow replay: replay-runner");
        println!("  db:        {db}");
        println!("  start:     {}", resolved.start_snapshot);
        println!("  radius:    {} (code units)", resolved.injection_radius);
        println!("  t:         {t_start} -> {t_end} (dtmax {dtmax})");
        println!();
    }

    let mut store = SqliteStore::open(db)?;
    store.migrate()?;

    if synth > 0 {
        let spec = OutflowSpec {
            seed,
            particles: synth,
            ..OutflowSpec::default()
        };
        let ids = generate_outflow(&spec, &mut store)?;
        log::info!("wrote {} synthetic snapshots", ids.len());
    }

    let run_id = format!("replay-{}", uuid::Uuid::new_v4());
    store.insert_run(
        &run_id,
        &format!("synth={synth} seed={seed}"),
        env!("CARGO_PKG_VERSION"),
        &chrono::Utc::now().to_rfc3339(),
    )?;

    let mut engine = ReplayEngine::new(run_id.clone(), resolved, &store, t_start, dtmax)?
        .with_event_log(&store);
    let summary = engine.run_until(t_end)?;

    let report = RunReport {
        run_id:         &run_id,
        steps:          summary.steps,
        final_time:     summary.final_time,
        events:         summary.events,
        total_injected: summary.total_injected,
        gas:            engine.particles.count(ParticleKind::Gas),
        dust:           engine.particles.count(ParticleKind::Dust),
    };

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("=== RUN SUMMARY ===");
        println!("  run_id:         {}", report.run_id);
        println!("  steps:          {}", report.steps);
        println!("  final time:     {:.4}", report.final_time);
        println!("  events logged:  {}", report.events);
        println!("  injected:       {}", report.total_injected);
        println!("  live gas:       {}", report.gas);
        println!("  live dust:      {}", report.dust);
        println!("  scheduler:      {:?}", engine.scheduler().phase());
    }
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
