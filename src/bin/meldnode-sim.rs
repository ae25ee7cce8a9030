//! MELD node simulation harness.
//!
//! Replays a timed scenario through the simulation backend and prints the
//! effect trace the host would have rendered.
//!
//! ```text
//! meldnode-sim [scenario.txt]      # built-in demo without an argument
//! MELD_LOG=debug meldnode-sim ...  # filter directive (default: info)
//! ```

use std::io::Write;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use meldnode::adapters::host::{DEMO_SCENARIO, Scenario, run_in_memory};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "MELD_LOG";

/// Install a stderr subscriber filtered by `MELD_LOG` (`info` if unset or
/// unparsable).  The crate logs through `log`; those records are bridged
/// into the subscriber.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("logging init failed: {}", e))
}

fn main() -> Result<()> {
    init_logging()?;

    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading scenario {}", path))?,
        None => DEMO_SCENARIO.to_string(),
    };
    let scenario = Scenario::parse(&text)?;
    log::info!(
        "running {} scheduled events until t={} ms",
        scenario.len(),
        scenario.run_until()
    );

    let report = run_in_memory(scenario).map_err(|e| anyhow!("store: {}", e))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for entry in &report.trace {
        writeln!(out, "{}", entry)?;
    }
    writeln!(
        out,
        "-- finished at {} ms in {:?}: {} activation(s), {} touch(es) dropped, {} event(s) refused",
        report.finished_at,
        report.final_state,
        report.activations,
        report.dropped_touches,
        report.refused
    )?;
    Ok(())
}
