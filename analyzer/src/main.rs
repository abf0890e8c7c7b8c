use anyhow::Context;
use clap::Parser;
use generator::profile::{build_log, build_log_from_config, GeneratorConfig};
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::VisualizationModel;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator {
    pub mod profile;
}
mod gui_bridge {
    pub mod bridge;
    pub mod model;
}
mod workflow {
    pub mod config;
    pub mod runner;
}

#[derive(Parser)]
#[command(author, version, about = "Post-flight anomaly analysis for ArduPilot DataFlash logs")]
struct Args {
    /// DataFlash logs (.BIN) to analyze
    logs: Vec<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    voltage_threshold: Option<f64>,
    #[arg(long)]
    z_threshold: Option<f64>,
    /// Motor deviation from the fleet average, in percent
    #[arg(long)]
    imbalance_threshold: Option<f64>,
    /// Run the detectors of each log on separate threads
    #[arg(long, default_value_t = false)]
    parallel_detectors: bool,
    /// Include the flight summary in each report line
    #[arg(long, default_value_t = false)]
    summary: bool,
    /// Write a synthetic log to PATH and analyze it along with the others
    #[arg(long, value_name = "PATH")]
    synthesize: Option<PathBuf>,
    /// Generator config (YAML) used by --synthesize
    #[arg(long, requires = "synthesize")]
    scenario: Option<PathBuf>,
    /// Flight length in seconds for --synthesize without a scenario
    #[arg(long, default_value_t = 60.0)]
    duration: f64,
    /// Keep the HTTP bridge alive for incoming logs
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,
}

fn append_report(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    writeln!(file, "{}", line).with_context(|| format!("writing report {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let base_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::default()
    };
    let mut workflow_config = base_config.with_overrides(
        args.voltage_threshold,
        args.z_threshold,
        args.imbalance_threshold,
    );
    workflow_config.parallel_detectors |= args.parallel_detectors;
    workflow_config.include_summary |= args.summary;

    let runner = Arc::new(Runner::new(workflow_config)?);
    let workflow_config = runner.config();

    let mut logs = args.logs;
    if let Some(path) = args.synthesize {
        let bytes = match &args.scenario {
            Some(scenario) => build_log_from_config(&GeneratorConfig::load(scenario)?)?,
            None => build_log(args.duration, 10.0)?,
        };
        fs::write(&path, bytes)
            .with_context(|| format!("writing synthetic log {}", path.display()))?;
        log::info!("synthetic log written to {}", path.display());
        logs.push(path);
    }

    if logs.is_empty() && !args.serve {
        anyhow::bail!("no logs to analyze; pass log paths, --synthesize or --serve");
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating analysis runtime")?;

    let gui_bridge = if args.serve {
        Some(GuiBridge::new(runner.clone(), args.bind)?)
    } else {
        None
    };

    let total = logs.len();
    let results = runtime.block_on(runner.execute_batch(logs));
    let mut failures = 0;
    for (path, outcome) in results {
        match outcome {
            Ok(result) => {
                let line = result
                    .to_report(workflow_config.include_summary)
                    .to_string();
                println!("{}", line);
                if let Some(report_path) = &workflow_config.report_path {
                    append_report(report_path, &line)?;
                }
                if let Some(bridge) = &gui_bridge {
                    bridge.publish(&VisualizationModel::from(&result))?;
                }
            }
            Err(err) => {
                failures += 1;
                log::error!("{}: {:#}", path.display(), err);
            }
        }
    }

    let (analyzed, failed, metrics) = runner.metrics();
    log::info!(
        "analyzed {} logs ({} failed): {} records, {} skipped bytes, {} malformed",
        analyzed,
        failed,
        metrics.records_decoded,
        metrics.skipped_bytes,
        metrics.malformed_messages
    );

    if let Some(bridge) = &gui_bridge {
        bridge.publish_status(&format!(
            "HTTP bridge running on http://{} (Ctrl+C to stop)...",
            bridge.local_addr()
        ));
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} logs could not be analyzed", failures, total);
    }
    Ok(())
}
