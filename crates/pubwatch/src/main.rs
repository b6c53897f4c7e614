// # pubwatch
//
// Thin entry point for one pipeline cycle. All pipeline logic lives in
// pubwatch-core; this binary only:
// 1. Reads its settings from the environment
// 2. Initializes logging and the runtime
// 3. Registers the compiled-in providers
// 4. Loads the configuration file and runs the Orchestrator once
//
// ## Environment
//
// A `.env` file in the working directory is loaded first, if present.
//
// - `PUBWATCH_CONFIG`: Configuration file path (default `config.json`)
// - `PUBWATCH_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
// - `PUBWATCH_MODE`: `dry-run` to discover without downloading, uploading
//   or notifying
// - `EMAIL_PASSWORD`: SMTP password (variable name configurable per notifier)
//
// ## Example
//
// ```bash
// export PUBWATCH_CONFIG=/etc/pubwatch/config.json
// export EMAIL_PASSWORD=app-password
//
// pubwatch
// ```

use anyhow::Result;
use pubwatch_core::{Orchestrator, ProviderRegistry, PubwatchConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the one-shot run
///
/// - 0: The cycle completed (individual items may still have failed)
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PubwatchExitCode {
    /// The cycle completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PubwatchExitCode> for ExitCode {
    fn from(code: PubwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&pubwatch_core::Error> for PubwatchExitCode {
    fn from(err: &pubwatch_core::Error) -> Self {
        if err.is_config() {
            PubwatchExitCode::ConfigError
        } else {
            PubwatchExitCode::RuntimeError
        }
    }
}

/// Process settings
#[derive(Debug)]
struct Settings {
    config_path: PathBuf,
    log_level: Level,
    force_dry_run: bool,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("PUBWATCH_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config.json")),
            log_level: parse_log_level(env::var("PUBWATCH_LOG_LEVEL").ok().as_deref())?,
            force_dry_run: parse_dry_run_mode(env::var("PUBWATCH_MODE").ok().as_deref())?,
        })
    }
}

fn parse_log_level(value: Option<&str>) -> Result<Level> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("info") => Ok(Level::INFO),
        Some("trace") => Ok(Level::TRACE),
        Some("debug") => Ok(Level::DEBUG),
        Some("warn") => Ok(Level::WARN),
        Some("error") => Ok(Level::ERROR),
        Some(other) => anyhow::bail!(
            "PUBWATCH_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            other
        ),
    }
}

fn parse_dry_run_mode(value: Option<&str>) -> Result<bool> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("live") => Ok(false),
        Some("dry-run") => Ok(true),
        Some(other) => anyhow::bail!(
            "PUBWATCH_MODE '{}' is not valid. Valid modes: live, dry-run",
            other
        ),
    }
}

fn main() -> ExitCode {
    // A missing .env is normal
    let dotenv = dotenvy::dotenv();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PubwatchExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PubwatchExitCode::ConfigError.into();
    }

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PubwatchExitCode::RuntimeError.into();
        }
    };

    rt.block_on(execute(settings)).into()
}

/// Run one cycle and map its outcome to an exit code
///
/// This is the only place a run-terminating error is logged.
async fn execute(settings: Settings) -> PubwatchExitCode {
    match run(settings).await {
        Ok(()) => PubwatchExitCode::Success,
        Err(e) => {
            let code = PubwatchExitCode::from(&e);
            if code == PubwatchExitCode::ConfigError {
                error!("{}", e);
            } else {
                error!("Run aborted: {}", e);
            }
            code
        }
    }
}

fn register_providers(registry: &ProviderRegistry) {
    #[cfg(feature = "issuu")]
    pubwatch_monitor_issuu::register(registry);

    #[cfg(feature = "gdrive")]
    pubwatch_storage_gdrive::register(registry);

    #[cfg(feature = "email")]
    pubwatch_notifier_email::register(registry);

    info!(
        "Providers available: monitors {:?}, storage {:?}, notifiers {:?}",
        registry.list_monitors(),
        registry.list_storage(),
        registry.list_notifiers()
    );
}

/// Run one cycle
async fn run(settings: Settings) -> pubwatch_core::Result<()> {
    info!("Starting pubwatch");

    let mut config = PubwatchConfig::load(&settings.config_path).await?;
    if settings.force_dry_run && !config.run.dry_run {
        warn!("PUBWATCH_MODE=dry-run: nothing will be downloaded, uploaded or sent");
        config.run.dry_run = true;
    }

    let registry = ProviderRegistry::new();
    register_providers(&registry);

    let components = registry.build(&config).await?;
    let orchestrator = Orchestrator::from_components(components, config.run.clone())?;

    let report = orchestrator.run().await?;

    if report.is_clean() {
        info!(
            "Done: {} discovered, {} uploaded, {} skipped",
            report.discovered,
            report.uploaded.len(),
            report.skipped
        );
    } else {
        let undelivered = report
            .notifications
            .iter()
            .filter(|n| !n.delivered)
            .count();
        warn!(
            "Done with failures: {} discovered, {} uploaded, {} failed, {} skipped, {} notifier(s) failed",
            report.discovered,
            report.uploaded.len(),
            report.failures.len(),
            report.skipped,
            undelivered
        );
    }

    Ok(())
}
