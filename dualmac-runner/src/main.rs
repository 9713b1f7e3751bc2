//! dualmac - run dual-channel MAC simulation scenarios
//!
//! Usage: `dualmac [--preset NAME] [--json] [--write-default] [--list] [SETTINGS]`

mod error;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use dualmac_sim::{scenario, RunSummary, World};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use error::RunnerError;
use settings::Settings;

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    settings_path: Option<PathBuf>,
    preset: Option<String>,
    json: bool,
    write_default: bool,
    list: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, RunnerError> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => parsed.json = true,
                "--write-default" => parsed.write_default = true,
                "--list" => parsed.list = true,
                "--preset" => {
                    let name = args
                        .next()
                        .ok_or_else(|| RunnerError::Usage("--preset needs a name".into()))?;
                    parsed.preset = Some(name);
                }
                flag if flag.starts_with("--") => {
                    return Err(RunnerError::Usage(format!("unknown option {}", flag)));
                }
                path => {
                    if parsed.settings_path.is_some() {
                        return Err(RunnerError::Usage("more than one settings file".into()));
                    }
                    parsed.settings_path = Some(PathBuf::from(path));
                }
            }
        }
        Ok(parsed)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dualmac=info,dualmac_core=info,dualmac_sim=info,dualmac_frame=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(std::env::args().skip(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: impl IntoIterator<Item = String>) -> Result<(), RunnerError> {
    let args = Args::parse(args)?;

    if args.list {
        for name in scenario::PRESETS {
            println!("{}", name);
        }
        return Ok(());
    }

    if args.write_default {
        let path = match &args.settings_path {
            Some(path) => {
                Settings::default().save_to(path)?;
                path.clone()
            }
            None => Settings::default().save()?,
        };
        tracing::info!("wrote default settings to {}", path.display());
        return Ok(());
    }

    let mut settings = match &args.settings_path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(preset) = args.preset {
        settings.preset = preset;
        settings.scenario_file = None;
    }
    settings.json_output |= args.json;

    let config = settings.scenario()?;
    tracing::info!(
        "running {} stations, {} flows for {:?}",
        config.stations.len(),
        config.flows.len(),
        config.duration()
    );
    let mut world = World::new(config)?;
    let summary = world.run()?;

    if settings.json_output {
        let json = serde_json::to_string_pretty(&summary).map_err(|source| RunnerError::Json {
            path: PathBuf::from("<stdout>"),
            source,
        })?;
        println!("{}", json);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{:>4} {:>4} {:>4} {:>6} {:>6} {:>6} {:>12} {:>10}",
        "flow", "src", "dst", "tx", "rx", "lost", "delay (us)", "Mb/s"
    );
    for f in &summary.flows {
        let delay = f
            .mean_delay_us
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4} {:>4} {:>4} {:>6} {:>6} {:>6} {:>12} {:>10.3}",
            f.flow, f.src, f.dst, f.tx_packets, f.rx_packets, f.lost_packets, delay, f.throughput_mbps
        );
    }

    println!();
    println!(
        "control: {} RTS, {} CTS, {} lost | data: {} DATA, {} ACK, {} lost",
        summary.control.rts,
        summary.control.cts,
        summary.control.corrupted,
        summary.data.data,
        summary.data.ack,
        summary.data.corrupted
    );
    let preemptive: u64 = summary.stations.iter().map(|s| s.preemptive_rts).sum();
    let lost: u64 = summary.stations.iter().map(|s| s.arbitration_lost).sum();
    let rejected: u64 = summary.stations.iter().map(|s| s.cts_rejected).sum();
    println!(
        "preemptive RTS: {} sent, {} lost arbitration, {} CTS rejected",
        preemptive, lost, rejected
    );
}
