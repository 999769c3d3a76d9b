use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cadence_common::observability::{init_logging, LogConfig};
use cadence_common::Rect;
use cadence_config::CadenceConfigLoader;
use cadence_engine::monitor::ActivityMonitor;
use cadence_engine::pacer::{ActionPacer, PaceOutcome, PacerTuning};
use cadence_engine::ports::ChannelNotifier;
use cadence_engine::sim::SimPage;
use cadence_engine::ConfigHandle;
use cadence_runtime::CadenceRuntime;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

/// Drives a scripted interaction sequence through the pacing engine against
/// an in-memory page, so the produced cadence can be observed end to end.
#[derive(Debug, Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "cadence.yaml")]
    config: String,

    /// Pacing profile for the demo run.
    #[arg(long, value_enum, default_value_t = Profile::Standard)]
    profile: Profile,

    /// Text typed into the simulated input during the demo.
    #[arg(long, default_value = "the rain in spain stays mainly on the plain")]
    text: String,

    /// Duplicate log events to stderr in addition to the log file.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    Standard,
    Brisk,
}

impl Profile {
    fn tuning(self) -> PacerTuning {
        match self {
            Profile::Standard => PacerTuning::standard(),
            Profile::Brisk => PacerTuning::brisk(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = CadenceConfigLoader::new()
        .with_file(&cli.config)
        .load_or_default();

    let log_path = init_logging(LogConfig {
        emit_stderr: cli.verbose,
        ..LogConfig::default()
    })?;
    info!(config_version = cfg.version, log = %log_path.display(), "cadence starting");

    let runtime = CadenceRuntime::build("cadence", None)?;
    let handle = runtime.handle();
    let cancel = handle.cancellation();

    let outcome = runtime.block_on(run_demo(cli, cfg.behavior, (*cancel).clone()));
    runtime.shutdown(Duration::from_secs(2));
    outcome
}

async fn run_demo(
    cli: Cli,
    behavior: cadence_common::BehaviorConfig,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<()> {
    let page = SimPage::new();
    let (notifier, mut events) = ChannelNotifier::new();

    let pacer = Arc::new(
        ActionPacer::new(ConfigHandle::new(behavior), page.clone())
            .with_tuning(cli.profile.tuning())
            .with_notifier(Arc::new(notifier))
            .with_cancellation(cancel.clone()),
    );

    let monitor = ActivityMonitor::new(pacer.probe(), pacer.delays().tuning());
    tokio::spawn(monitor.run(cancel.clone()));
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(error) => warn!(%error, "unserializable session event"),
            }
        }
    });

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, cancelling");
            shutdown.cancel();
        }
    });

    // A plausible page session: find the search box, fill it, browse the
    // results, submit.
    let search_box = Rect::new(420.0, 80.0, 360.0, 44.0);
    let submit_button = Rect::new(800.0, 80.0, 90.0, 44.0);

    report("move", pacer.pace_pointer_move(search_box).await?);
    report("click", pacer.pace_click(search_box).await?);
    report("type", pacer.pace_typing(page.clone(), &cli.text).await?);
    report("scroll", pacer.pace_scroll(900.0).await?);
    report("scroll", pacer.pace_scroll(340.0).await?);
    report("submit", pacer.pace_submit(submit_button).await?);

    let session = pacer.session_snapshot();
    info!(
        session = %session.id,
        actions = session.action_count,
        signals = page.signals().len(),
        typed = %page.value(),
        "demo finished"
    );
    Ok(())
}

fn report<T>(label: &str, outcome: PaceOutcome<T>) {
    match outcome {
        PaceOutcome::Completed(_) => info!(action = label, "completed"),
        PaceOutcome::Skipped(reason) => warn!(action = label, ?reason, "skipped"),
    }
}
