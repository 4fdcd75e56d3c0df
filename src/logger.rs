//! Logger initialization.

use env_logger::Builder;
use log::LevelFilter;

/// Initialize the global logger at the given level filter.
///
/// Idempotent: a second call is a no-op (env_logger only lets you install
/// once per process, so we just swallow the error).
pub fn init_logger(level: LevelFilter) {
    let _ = Builder::new().filter_level(level).try_init();
}
