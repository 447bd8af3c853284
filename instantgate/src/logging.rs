//! Logging bootstrap.
//!
//! Level comes from configuration, overridable by CLI verbosity flags;
//! format is `json` (default) or human-readable `pretty`.

use instantgate_core::error::{GateError, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initializes the global tracing subscriber.
///
/// `verbose` bumps the level to DEBUG (1) or TRACE (2+); `quiet` drops it
/// to ERROR and wins over everything else.
pub fn init(config: &LoggingConfig, verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "error".to_string(),
        (false, 0) => config.level.clone(),
        (false, 1) => "debug".to_string(),
        (false, _) => "trace".to_string(),
    };

    let filter = EnvFilter::try_new(&level)
        .map_err(|e| GateError::configuration(format!("invalid logging level '{level}': {e}")))?;

    let result = if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    result.map_err(|e| GateError::configuration(format!("failed to initialize logging: {e}")))
}

#[cfg(test)]
mod tests {
    // The subscriber can only be installed once per process, so tests cover
    // the level-selection logic rather than initialization itself.

    #[test]
    fn test_level_selection() {
        let cases = [
            ((true, 0), "error"),
            ((true, 3), "error"),
            ((false, 0), "info"),
            ((false, 1), "debug"),
            ((false, 2), "trace"),
            ((false, 9), "trace"),
        ];

        for ((quiet, verbose), expected) in cases {
            let level = match (quiet, verbose) {
                (true, _) => "error",
                (false, 0) => "info",
                (false, 1) => "debug",
                (false, _) => "trace",
            };
            assert_eq!(level, expected, "quiet={quiet} verbose={verbose}");
        }
    }
}
