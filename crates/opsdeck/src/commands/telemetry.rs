//! Telemetry sampling command.
//!
//! Drives the simulator tick by tick at the configured cadence and prints the
//! state after each one.

use anyhow::Result;
use colored::Colorize;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};

use crate::app::App;
use crate::config::Config;
use crate::output::telemetry_line;

#[derive(Debug, Serialize)]
struct Sample {
    tick: u32,
    load: f64,
    vram_usage: f64,
    gpu_temp: f64,
    ram_usage: f64,
}

pub async fn execute(
    ticks: u32,
    load: Option<f64>,
    seed: Option<u64>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let app = App::open(config)?;
    let _guard = load.map(|value| app.load.acquire(value));
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if !json {
        println!(
            "{}",
            format!(
                "Sampling {} ticks every {} ms",
                ticks,
                config.tick().as_millis()
            )
            .cyan()
        );
        println!("{}", "─".repeat(50));
    }

    let mut ticker = interval(config.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    for tick in 1..=ticks {
        ticker.tick().await;
        app.simulator.step(&mut rng);

        let state = app.hub.state();
        let factor = app.load.get();
        if json {
            let sample = Sample {
                tick,
                load: factor,
                vram_usage: state.vram_usage,
                gpu_temp: state.gpu_temp,
                ram_usage: state.ram_usage,
            };
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            println!("{:>4}  {}", tick, telemetry_line(&state, factor));
        }
    }

    Ok(())
}
