//! netusaged - network usage collector daemon.
//!
//! Samples host-wide network byte counters from the /proc filesystem once per
//! interval and appends them to `network_usage.log`. Intervals missed while the
//! daemon was down are backfilled on startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use netusage_core::alert::{AlertConfig, AlertPeriod};
use netusage_core::collector::{ProcNetReader, RealFs};
use netusage_core::fmt::{FmtStyle, format_bytes, format_duration};
use netusage_core::query::Unit;
use netusage_core::service::{CollectorConfig, CollectorService, DataUpdated};

type HostService = CollectorService<ProcNetReader<RealFs>>;

/// Network usage collector daemon.
#[derive(Parser)]
#[command(name = "netusaged", about = "Network usage collector daemon", version)]
struct Args {
    /// Directory holding network_usage.log.
    #[arg(short, long, env = "NETUSAGE_LOG_DIR", default_value = "./data")]
    log_dir: PathBuf,

    /// Collection interval in seconds.
    #[arg(
        short,
        long,
        env = "NETUSAGE_INTERVAL",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Interface to leave out of the totals (repeatable), e.g. "lo".
    #[arg(long = "ignore-interface", value_name = "NAME")]
    ignore_interfaces: Vec<String>,

    /// Maximum retention period in days. Older records are removed.
    #[arg(long, default_value = "365")]
    max_days: u32,

    /// Warn when usage in the alert period exceeds this many alert units.
    /// 0 disables the alert.
    #[arg(long, default_value = "0")]
    alert_limit: f64,

    /// Unit of --alert-limit (B, KB, MB, GB, TB, PB).
    #[arg(long, default_value = "MB")]
    alert_unit: Unit,

    /// Period the alert limit applies to (hour, day, month).
    #[arg(long, default_value = "day")]
    alert_period: AlertPeriod,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            log_dir: self.log_dir.clone(),
            interval: Duration::from_secs(self.interval),
            retention: chrono::Duration::days(i64::from(self.max_days)),
            proc_path: self.proc_path.clone(),
            ignore_interfaces: self.ignore_interfaces.clone(),
        }
    }

    fn alert_config(&self) -> AlertConfig {
        AlertConfig::new(self.alert_limit, self.alert_unit, self.alert_period)
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("netusaged={}", level).parse().unwrap())
        .add_directive(format!("netusage_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Logs a warning the first time usage crosses the limit in each period.
async fn watch_alert(
    service: Arc<HostService>,
    alert: AlertConfig,
    mut rx: broadcast::Receiver<DataUpdated>,
) {
    let mut alerted_period: Option<DateTime<Utc>> = None;

    loop {
        match rx.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("Alert watcher lagged, {} updates skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }

        let now = Local::now();
        let period = alert.period.start(&now);
        let records = service.records();
        let Some(ratio) = alert.usage_ratio(&records, &now) else {
            continue;
        };

        if ratio >= 1.0 && alerted_period != Some(period) {
            alerted_period = Some(period);
            warn!(
                "Usage this {} is {} ({:.0}% of {} {})",
                alert.period,
                format_bytes(alert.period_usage(&records, &now), FmtStyle::Detail),
                ratio * 100.0,
                alert.limit,
                alert.unit
            );
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to set SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to set Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = args.collector_config();
    let alert = args.alert_config();

    info!("netusaged {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}, log_dir={}, proc={}",
        format_duration(config.interval.as_secs() as i64, FmtStyle::Compact),
        config.log_dir.display(),
        config.proc_path.display()
    );
    info!("Retention policy: max_days={}", args.max_days);
    if !config.ignore_interfaces.is_empty() {
        info!("Ignoring interfaces: {}", config.ignore_interfaces.join(", "));
    }

    let service = Arc::new(CollectorService::for_host(config));
    info!("Usage log at {}", service.log_path().display());

    if alert.enabled() {
        info!(
            "Alert: {} {} per {}",
            alert.limit, alert.unit, alert.period
        );
        tokio::spawn(watch_alert(
            Arc::clone(&service),
            alert,
            service.subscribe(),
        ));
    } else {
        debug!("Alert: disabled");
    }

    let handle = match service.start() {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start collector: {}", e);
            std::process::exit(1);
        }
    };

    let code = tokio::select! {
        result = handle => match result {
            Ok(Ok(())) => 0,
            Ok(Err(e)) => {
                error!("Collector stopped: {}", e);
                1
            }
            Err(e) => {
                error!("Collector task failed: {}", e);
                1
            }
        },
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            0
        }
    };

    info!("Shutdown complete");
    std::process::exit(code);
}
