//! Log output for the CLI and the daemon.
//!
//! One-shot commands stay quiet unless configured otherwise. The daemon also
//! reports every scan pass and watcher event at `info`, since that is the only
//! feedback it gives while running. `RUST_LOG` overrides both.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! watcher = "debug"            # same as todowatch::watcher
//! "ignore::walk" = "trace"     # other crates keep their full path
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

const CRATE_TARGET: &str = "todowatch";

/// Which surface is logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogProfile {
    Cli,
    Daemon,
}

/// HH:MM:SS.mmm in local time.
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Expand a configured module key to a tracing target.
fn target_for(module: &str) -> String {
    if module == CRATE_TARGET || module.contains("::") {
        module.to_string()
    } else {
        format!("{CRATE_TARGET}::{module}")
    }
}

fn filter_directives(config: &LoggingConfig, profile: LogProfile) -> String {
    let mut directives = vec![config.default.clone()];

    let mut modules: Vec<(String, &String)> = config
        .modules
        .iter()
        .map(|(module, level)| (target_for(module), level))
        .collect();
    modules.sort();

    if profile == LogProfile::Daemon && !modules.iter().any(|(t, _)| t == CRATE_TARGET) {
        directives.push(format!("{CRATE_TARGET}=info"));
    }
    directives.extend(modules.into_iter().map(|(target, level)| format!("{target}={level}")));
    directives.join(",")
}

/// Install the stderr subscriber. Only the first call has any effect.
pub fn init_with_config(config: &LoggingConfig, profile: LogProfile) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config, profile))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(profile == LogProfile::Daemon)
            .with_timer(ClockTime)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        // Tests and embedding binaries may have installed their own
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// CLI logging before any config file exists.
pub fn init() {
    init_with_config(&LoggingConfig::default(), LogProfile::Cli);
}

/// `info` event tagged with the component that produced it.
///
/// ```ignore
/// log_event!("scan", "complete", "{} annotations", count);
/// log_event!("watcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// `debug` counterpart of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
