//! BIFROST - Main Application Entry Point
//!
//! One invocation performs one run: fetch the node list, translate every
//! record, send the traps, log the timings, and exit.

use anyhow::{Context, Result};
use clap::{Arg, Command};

use bifrost::{Config, Orchestrator, Telemetry};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let matches = Command::new("bifrost")
        .version("0.3.0")
        .about("BIFROST forwards network monitoring node state to an SNMP trap receiver.\n\nConfiguration comes from the environment: API_URL, API_USER, API_PASS,\nTRAP_RECEIVER_IP, TRAP_RECEIVER_PORT, SNMP_COMMUNITY, ENTERPRISE_TRAP_OID,\nDEFAULT_LOCATION, TRAP_SEND_TIMEOUT_MS.")
        .arg(
            Arg::new("limit")
                .short('n')
                .long("limit")
                .value_name("COUNT")
                .help("Send traps for at most COUNT nodes this run")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let limit = matches.get_one::<usize>("limit").copied();

    match run(limit).await {
        Ok(summary) => {
            println!(
                "✅ Trap run completed: {} node(s) | fetch {:.3}s | send {:.3}s",
                summary.node_count,
                summary.fetch_duration.as_secs_f64(),
                summary.send_duration.as_secs_f64()
            );
        }
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(limit: Option<usize>) -> Result<bifrost::RunSummary> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let telemetry =
        Telemetry::init(&config.logging).context("Failed to initialise logging")?;

    let orchestrator = Orchestrator::from_config(&config, telemetry)
        .context("Failed to initialise trap pipeline")?
        .with_limit(limit);

    let summary = orchestrator.run().await?;
    Ok(summary)
}
