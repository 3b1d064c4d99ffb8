//! HidKey listener: entry point.
//!
//! Installs a system-wide keyboard hook, reassembles the keystrokes typed by a
//! keyboard-emulating instrument into readings, and prints one reading per
//! line on stdout until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! hidkey-listener [OPTIONS]
//!
//! Options:
//!   --config <PATH>              Config file [default: platform location]
//!   --poll-interval-ms <MS>      Sleep between message pumps
//!   --stop-timeout-ms <MS>       How long shutdown waits for the hook thread
//!   --max-line-len <CHARS>       Cap on an unterminated reading
//!   --layout <system|us>         Key translator
//!   --log-level <LEVEL>          error, warn, info, debug, trace
//!   --write-default-config       Write a default config file and exit
//! ```
//!
//! CLI flags (and their `HIDKEY_*` environment variables) override values
//! from the config file; `RUST_LOG` overrides the log level from both.
//!
//! # Architecture overview
//!
//! ```text
//! main()
//!  ├─ ListenerThread  ("hidkey-hook" thread: hook + message pump)
//!  │     └─ mpsc::Sender<Measurement>
//!  └─ consumer        ("hidkey-consumer" thread: MeasurementLog + stdout)
//! ```

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use hidkey_core::Measurement;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use hidkey_listener::application::listener::ListenerThread;
use hidkey_listener::application::measurement_log::MeasurementLog;
use hidkey_listener::infrastructure::input_capture::HookBackend;
use hidkey_listener::infrastructure::storage::config::{
    self, AppConfig, ConfigError, LayoutChoice,
};

/// How often the main task checks that the hook thread is still alive.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    System,
    Us,
}

impl From<LayoutArg> for LayoutChoice {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::System => LayoutChoice::System,
            LayoutArg::Us => LayoutChoice::Us,
        }
    }
}

/// Captures readings from keyboard-emulating measurement instruments.
#[derive(Debug, Parser)]
#[command(
    name = "hidkey-listener",
    about = "Turns keystrokes from HID keyboard-emulating instruments into measurements",
    version
)]
struct Cli {
    /// Config file to load instead of the platform default.
    ///
    /// Unlike the default location, an explicit file must exist.
    #[arg(long, env = "HIDKEY_CONFIG")]
    config: Option<PathBuf>,

    /// Sleep between message pumps on the hook thread, in milliseconds.
    #[arg(long, env = "HIDKEY_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// How long shutdown waits for the hook thread, in milliseconds.
    #[arg(long, env = "HIDKEY_STOP_TIMEOUT_MS")]
    stop_timeout_ms: Option<u64>,

    /// Characters held before an unterminated reading is dropped.
    #[arg(long, env = "HIDKEY_MAX_LINE_LEN")]
    max_line_len: Option<usize>,

    /// Key translator: the active system layout or a fixed US layout.
    #[arg(long, value_enum, env = "HIDKEY_LAYOUT")]
    layout: Option<LayoutArg>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "HIDKEY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write a default config file to the platform location and exit.
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    /// Loads the config file and applies CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, or when the
    /// merged values fail validation.
    fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match config::load_config() {
                Ok(cfg) => cfg,
                Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
                Err(e) => return Err(e).context("failed to load config"),
            },
        };

        if let Some(ms) = self.poll_interval_ms {
            cfg.listener.poll_interval_ms = ms;
        }
        if let Some(ms) = self.stop_timeout_ms {
            cfg.listener.stop_timeout_ms = ms;
        }
        if let Some(len) = self.max_line_len {
            cfg.listener.max_line_len = len;
        }
        if let Some(layout) = self.layout {
            cfg.listener.layout = layout.into();
        }
        if let Some(level) = &self.log_level {
            cfg.logging.log_level = level.clone();
        }

        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.write_default_config {
        let path = config::save_config(&AppConfig::default())
            .context("failed to write default config")?;
        println!("{}", path.display());
        return Ok(());
    }

    let cfg = cli.resolve_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.log_level)),
        )
        .init();

    info!(
        poll_interval_ms = cfg.listener.poll_interval_ms,
        stop_timeout_ms = cfg.listener.stop_timeout_ms,
        max_line_len = cfg.listener.max_line_len,
        layout = ?cfg.listener.layout,
        "HidKey listener starting"
    );

    // A plain thread rather than a blocking task: after a stop timeout the hook
    // thread may still hold a sender, and the runtime must not wait on it.
    let (tx, rx) = mpsc::channel::<Measurement>();
    let (log_tx, log_rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name("hidkey-consumer".to_string())
        .spawn(move || {
            let _ = log_tx.send(consume(rx));
        })
        .context("failed to spawn measurement consumer")?;

    run_platform_listener(&cfg, tx).await?;

    // The sender is gone once the listener has stopped, which ends the consumer.
    let grace = Duration::from_millis(cfg.listener.stop_timeout_ms);
    match tokio::time::timeout(grace, log_rx).await {
        Ok(Ok(log)) => info!(readings = log.len(), "HidKey listener stopped"),
        Ok(Err(_)) => warn!("measurement consumer exited without a summary"),
        Err(_) => warn!("measurement consumer still attached to a hook thread; exiting anyway"),
    }
    Ok(())
}

/// Records every measurement and prints its value on stdout.
fn consume(rx: mpsc::Receiver<Measurement>) -> MeasurementLog {
    let mut log = MeasurementLog::new();
    for measurement in rx {
        let recorded = log.record(measurement);
        debug!(
            sequence = recorded.sequence,
            session = %recorded.session_id,
            at = %recorded.time_label(),
            "measurement received"
        );
        println!("{}", recorded.text);
    }
    log
}

#[cfg(target_os = "windows")]
async fn run_platform_listener(
    cfg: &AppConfig,
    sink: mpsc::Sender<Measurement>,
) -> anyhow::Result<()> {
    use hidkey_core::{KeyTranslator, UsLayoutTranslator};
    use hidkey_listener::application::listener::ListenerSettings;
    use hidkey_listener::infrastructure::input_capture::windows::{
        WindowsHookBackend, WindowsKeyTranslator,
    };

    let translator: Box<dyn KeyTranslator> = match cfg.listener.layout {
        LayoutChoice::System => Box::new(WindowsKeyTranslator::new()),
        LayoutChoice::Us => Box::new(UsLayoutTranslator::new()),
    };
    let listener = ListenerThread::new(
        WindowsHookBackend::new(),
        translator,
        sink,
        ListenerSettings::from(&cfg.listener),
    );
    serve(listener).await
}

#[cfg(not(target_os = "windows"))]
async fn run_platform_listener(
    _cfg: &AppConfig,
    _sink: mpsc::Sender<Measurement>,
) -> anyhow::Result<()> {
    use hidkey_listener::infrastructure::input_capture::HookError;

    Err(HookError::UnsupportedPlatform(std::env::consts::OS.to_string()))
        .context("a system-wide keyboard hook is only available on Windows")
}

/// Runs `listener` until Ctrl-C, restarting it if the hook thread dies.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
async fn serve<B>(listener: ListenerThread<B>) -> anyhow::Result<()>
where
    B: HookBackend + Clone + 'static,
{
    tokio::task::block_in_place(|| listener.start()).context("failed to start listener")?;
    info!("listening for instrument input; press Ctrl-C to exit");

    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("shutdown signal received");
                break;
            }
            _ = health.tick() => {
                if !listener.is_running() {
                    warn!("hook thread exited unexpectedly; restarting");
                    if let Err(e) = tokio::task::block_in_place(|| listener.start()) {
                        warn!(error = %e, "listener restart failed");
                    }
                }
            }
        }
    }

    tokio::task::block_in_place(|| shutdown(&listener));
    Ok(())
}

/// Stops `listener`, downgrading a teardown timeout to a warning.
///
/// Returns `true` when the hook thread exited in time.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn shutdown<B>(listener: &ListenerThread<B>) -> bool
where
    B: HookBackend + Clone + 'static,
{
    match listener.stop() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "listener did not shut down cleanly");
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
