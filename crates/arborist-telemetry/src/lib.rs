//! Ambient structured logging for the `arborist` binary. No dashboard
//! consumes this output -- there is no telemetry collector wired up -- but
//! the kernel still emits per-task spans at debug level the way the rest of
//! the codebase instruments its control loops.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize human-readable logging. Uses `RUST_LOG` if set, otherwise
/// `default_level` (e.g. `"info"`, `"arborist_gardener=debug,warn"`). Safe
/// to call more than once -- later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .try_init()
        .ok();
}

/// Initialize JSON logging, for callers piping `arborist` output into a log
/// aggregator. Uses `RUST_LOG` if set, otherwise `default_level`.
pub fn init_logging_json(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();
}
