// proctrail - process metrics recorder
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::future::Future;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::info;

use proctrail::cli::Args;
use proctrail::config::{config_path, render_config, resolve_config, Settings};
use proctrail::logging::setup_logging;
use proctrail::progress::Spinner;
use proctrail::{Encoder, OutputTarget, ProcfsCollector, Scheduler, SchedulerState, SinkWriter};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also arrive here.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;

    if args.show_config {
        print!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }

    let settings = Settings::from_config(&config)?;
    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    setup_logging(settings.log_level).context("failed to set tracing subscriber")?;
    if !args.no_config {
        if let Some(path) = config_path(args.config.as_deref()) {
            info!("Loaded configuration from: {}", path.display());
        }
    }
    info!("Starting proctrail for {}", settings.target);

    // Install handlers before the first cycle so an early Ctrl+C is not lost.
    let interrupt = shutdown_signal().context("failed to install signal handlers")?;

    let collector = ProcfsCollector::with_root(&settings.proc_root);
    let encoder = Encoder::new(settings.format, settings.pretty);
    let output = settings.output_target(Local::now());
    let sink = SinkWriter::open(&output, encoder)?;
    let location = match &output {
        OutputTarget::Stdout => "stdout".to_string(),
        OutputTarget::File(path) => path.display().to_string(),
    };
    info!("Writing {} output to {}", settings.format, location);

    let spinner = (settings.progress
        && output != OutputTarget::Stdout
        && std::io::stderr().is_terminal())
    .then(|| Spinner::start("Monitoring process..."));

    let result = Scheduler::new(collector, settings.target.clone(), sink)
        .with_interval(settings.interval)
        .with_duration(settings.duration)
        .run(interrupt)
        .await;

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
    let report = result?;

    let status = match report.state {
        SchedulerState::Interrupted => "Monitoring interrupted",
        _ if settings.interval.is_zero() => "Sampling completed",
        _ => "Monitoring completed",
    };
    let summary = format!(
        "{}: {} sample(s) of {} written to {}",
        status, report.snapshots, settings.target, location
    );
    // Keep stdout clean when it carries the data.
    if output == OutputTarget::Stdout {
        eprintln!("{}", summary);
    } else {
        println!("{}", summary);
    }

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {
                info!("Received SIGINT (Ctrl+C), stopping...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, stopping...");
            }
        }
    })
}

/// Resolves on Ctrl+C.
#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping...");
        }
    })
}
