//! Command-line configuration.

use argh::FromArgs;
use log::LevelFilter;

/// gm8run: loads and runs a GM8-authored game executable.
#[derive(FromArgs, Debug)]
pub struct Args {
    /// path to the game executable to load
    #[argh(positional)]
    pub path: String,

    /// integer scale factor applied to the game window (default 1)
    #[argh(option, default = "1")]
    pub scale: u32,

    /// log level: error, warn, info, debug, trace (default info)
    #[argh(option, default = "String::from(\"info\")")]
    pub log_level: String,
}

impl Args {
    /// Parse the configured log level, falling back to `Info` on an
    /// unrecognized value (rather than failing startup over a typo).
    pub fn level_filter(&self) -> LevelFilter {
        match self.log_level.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        }
    }
}

/// Parse CLI arguments from `std::env::args`.
pub fn parse_args() -> Args {
    argh::from_env()
}
