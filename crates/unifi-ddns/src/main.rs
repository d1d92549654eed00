// # unifi-ddns
//
// One-shot updater: asks a UniFi controller for the gateway's WAN address
// and points a Cloudflare A record at it.
//
// This binary is a THIN integration layer. It:
// 1. Loads and validates the JSON configuration
// 2. Initializes logging and the runtime
// 3. Wires the UniFi IP source and Cloudflare provider into the pipeline
// 4. Prints progress and maps the outcome to an exit code
//
// All update logic lives in ddns-core.
//
// ## Configuration
//
// The config file is the first argument, else `$DDNS_CONFIG`, else
// `config.json` in the working directory.
//
// Environment overrides:
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error
// - `DDNS_MODE=dry-run`: look everything up but skip the PUT
//
// ## Example
//
// ```bash
// DDNS_MODE=dry-run unifi-ddns /etc/unifi-ddns/config.json
// ```

use anyhow::{Context, Result};
use ddns_core::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use ddns_core::{DdnsConfig, PipelineEvent, RunReport, Stage, UpdatePipeline};
use ddns_ip_unifi::UnifiGatewaySource;
use ddns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the possible run outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Every matched record updated, or nothing to do
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// A stage failed (transport, decode, extraction, auth)
    RuntimeError = 2,
    /// The provider rejected at least one update
    UpdateRejected = 3,
    /// Zone or record missing under the abort policy
    NotFound = 4,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl DdnsExitCode {
    /// Map the outcome of a run to an exit code
    fn for_run(outcome: &ddns_core::Result<RunReport>) -> Self {
        match outcome {
            Ok(report) if report.has_rejections() => Self::UpdateRejected,
            Ok(_) => Self::Success,
            Err(e) if e.is_config() => Self::ConfigError,
            Err(e) if e.is_not_found() => Self::NotFound,
            Err(_) => Self::RuntimeError,
        }
    }
}

/// Resolve the config file location
fn config_path(arg: Option<String>, env_value: Option<String>) -> PathBuf {
    arg.or(env_value.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Load, override and validate the configuration
fn load_config(path: &Path) -> Result<DdnsConfig> {
    let mut config = DdnsConfig::from_file(path)?;
    config.apply_env_overrides(|key| env::var(key).ok());
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// The stdout line for a pipeline event, if it has one
fn progress_line(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::StageStarted { stage } => Some(
            match stage {
                Stage::Gateway => "Get Gateway IP",
                Stage::ZoneLookup => "Get Zone Records",
                Stage::RecordFetch => "Get DNS Records",
                Stage::RecordUpdate => "Updating Record",
            }
            .to_string(),
        ),
        PipelineEvent::RecordUpdated { name, status } => Some(format!("{} :=> {}", name, status)),
        PipelineEvent::RecordRejected {
            name,
            status,
            message,
        } => Some(format!("{} :=> {} ({})", name, status, message)),
        PipelineEvent::RecordSkipped { name, content } => {
            Some(format!("{} :=> dry-run (would set {})", name, content))
        }
        PipelineEvent::NotFound { notice } => Some(format!("Not found: {}", notice)),
        PipelineEvent::IpResolved { .. }
        | PipelineEvent::ZoneLocated { .. }
        | PipelineEvent::RecordsFetched { .. } => None,
    }
}

/// Print progress until the pipeline is dropped
async fn print_progress(mut events: mpsc::UnboundedReceiver<PipelineEvent>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = progress_line(&event) {
            println!("{}", line);
        }
    }
}

fn main() -> ExitCode {
    let path = config_path(env::args().nth(1), env::var(CONFIG_PATH_ENV).ok());

    let config = match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config.log.level))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Configuration loaded from {}", path.display());

    // Requests are strictly sequential; one thread is enough.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Build the pipeline, run it once and map the outcome
async fn run(config: DdnsConfig) -> DdnsExitCode {
    let (pipeline, events) = match build_pipeline(&config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let update = async move {
        let outcome = pipeline.run().await;
        // Closes the event channel so the printer finishes.
        drop(pipeline);
        outcome
    };
    let ((), outcome) = tokio::join!(print_progress(events), update);

    let code = DdnsExitCode::for_run(&outcome);
    match outcome {
        Ok(report) => info!(
            "Finished: WAN IP {}, {} record(s) updated, {} rejected, {} notice(s)",
            report.ip,
            report.updated_count(),
            report.rejected().count(),
            report.notices.len()
        ),
        Err(e) => error!("{}", e),
    }
    code
}

fn build_pipeline(
    config: &DdnsConfig,
) -> Result<(UpdatePipeline, mpsc::UnboundedReceiver<PipelineEvent>)> {
    let ip_source = UnifiGatewaySource::from_config(&config.unifi, &config.http)
        .context("failed to set up UniFi client")?;
    let provider = CloudflareProvider::from_config(&config.cloudflare, &config.http)
        .context("failed to set up Cloudflare client")?;

    info!(
        "Pointing {} (zone {}) at the WAN IP of {}",
        config.cloudflare.dns_name,
        config.cloudflare.zone_name,
        config.unifi.host
    );

    Ok(UpdatePipeline::new(
        Box::new(ip_source),
        Box::new(provider),
        config,
    )?)
}
