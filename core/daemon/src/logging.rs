//! Tracing setup for the daemon.
//!
//! Logs go to a daily rolling file under the storage root's `logs/`
//! directory. The long-running `run` command also logs to stderr.
//! `WORKDAY_DEBUG_LOG=1` forces debug level; otherwise `RUST_LOG` applies,
//! defaulting to `info`.

use std::env;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV_VAR: &str = "WORKDAY_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "workday-daemon.log";

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV_VAR)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn env_filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// life of the process; dropping it flushes and stops the file writer.
pub fn init(logs_dir: &Path, console: bool) -> Option<WorkerGuard> {
    let (file_layer, guard) = match fs_err::create_dir_all(logs_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(err) => {
            eprintln!("workday-daemon: file logging disabled: {}", err);
            (None, None)
        }
    };
    let console_layer = console.then(|| fmt::layer().with_writer(std::io::stderr));

    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_switch_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
