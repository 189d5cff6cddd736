//! robodash CLI: report events from shell scripts and cron jobs, or watch a
//! host stats file.

use clap::{Parser, Subcommand};
use robodash::poller::{JsonFileSource, Poller, PollerConfig};
use robodash::telemetry::{TelemetryConfig, init_telemetry};
use robodash::{Client, Config, Count, Measure, Ping};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "robodash", about = "Report pings, counts and measurements to Robodash")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a heartbeat
    Ping {
        name: String,
        /// Expected cadence, e.g. "daily" or "every 30 minutes"
        #[arg(long)]
        schedule: Option<String>,
        /// Seconds the next ping may be late before alerting
        #[arg(long)]
        grace_period: Option<u64>,
    },
    /// Send a count (fractions are truncated toward zero)
    Count { name: String, value: f64 },
    /// Send a measurement
    Measure {
        name: String,
        value: f64,
        #[arg(long)]
        unit: Option<String>,
    },
    /// Poll a JSON stats file and report its metrics until Ctrl-C
    Watch {
        /// Path to the stats document
        #[arg(long)]
        stats: PathBuf,
        /// Prefix for metric names, e.g. "Puma"
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "robodash".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let client = Client::new(&config)?;

    match cli.command {
        Command::Ping {
            name,
            schedule,
            grace_period,
        } => {
            let mut ping = Ping::new(name);
            if let Some(ref expression) = schedule {
                ping = ping.schedule(expression);
                if ping.schedule.is_none() {
                    eprintln!("ignoring unrecognized schedule {expression:?}");
                }
            }
            if let Some(secs) = grace_period {
                ping = ping.grace_period(Duration::from_secs(secs));
            }
            print_submitted(client.ping(ping));
        }
        Command::Count { name, value } => {
            print_submitted(client.count(Count::new(name, value)));
        }
        Command::Measure { name, value, unit } => {
            let mut measure = Measure::new(name, value);
            if let Some(unit) = unit {
                measure = measure.unit(unit);
            }
            print_submitted(client.measure(measure));
        }
        Command::Watch {
            stats,
            prefix,
            interval_ms,
        } => cmd_watch(&client, stats, prefix, interval_ms).await?,
    }

    client.drain_async().await;
    Ok(())
}

async fn cmd_watch(
    client: &Client,
    stats: PathBuf,
    prefix: Option<String>,
    interval_ms: u64,
) -> anyhow::Result<()> {
    let poller = Poller::new(
        client.clone(),
        JsonFileSource::new(stats),
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
            prefix,
        },
    )?;

    let shutdown = poller.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.shutdown();
    });

    poller.spawn().await?;
    Ok(())
}

fn print_submitted(submitted: bool) {
    if submitted {
        println!("submitted");
    } else {
        println!("skipped (reporting disabled, no token, or invalid event)");
    }
}
