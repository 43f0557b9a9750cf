use std::{env, process};

use anyhow::Context;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <config.json> <backend>", args[0]);
        process::exit(1);
    }

    match run(&args[1], &args[2]) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// Runs the backend and prints a summary, returns whether every location was forecast.
fn run(config: &str, backend: &str) -> anyhow::Result<bool> {
    let report = orchestrator::forecast(config, backend)
        .with_context(|| format!("forecasting with backend {backend:?} failed"))?;

    for (id, path) in &report.written {
        println!("{id}\t{}", path.display());
    }
    for (id, e) in &report.failed {
        eprintln!("{id}\t{e}");
        if e.is_out_of_range() {
            eprintln!("{id}\trequested time outside available range");
        }
    }

    log::info!(
        "{} of {} location(s) forecast",
        report.written.len(),
        report.written.len() + report.failed.len()
    );
    Ok(report.is_success())
}
