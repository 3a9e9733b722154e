//! Logging configuration for opsdesk.
//!
//! Logs go to stderr so that command output on stdout stays machine-readable.
//! Access denials are logged at `warn` and store fail-open reads at `warn`,
//! so both survive the default level; `--quiet` keeps only errors.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the CLI reports about logins, denials and store traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Logins, writes, denials and unreadable collections.
    #[default]
    Normal,
    /// Adds per-read and per-write record counts.
    Verbose,
    /// Adds HTTP traffic of the remote store.
    Trace,
}

impl Verbosity {
    /// Map the `-q` / `-v` flags. `--quiet` wins over any `-v`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Level applied to opsdesk's own events.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter used when `RUST_LOG` is unset.
    ///
    /// Dependencies stay at `warn` so a remote store's connection errors
    /// still show; at trace level `reqwest` is opened up to `debug`.
    #[must_use]
    pub fn default_filter(self) -> String {
        match self {
            Self::Quiet => "error".to_string(),
            Self::Trace => format!("warn,opsdesk={},reqwest=debug", Level::TRACE),
            other => format!("warn,opsdesk={}", other.to_level_filter()),
        }
    }

    fn shows_targets(self) -> bool {
        matches!(self, Self::Verbose | Self::Trace)
    }
}

/// Install the stderr subscriber. `RUST_LOG` replaces the default filter.
///
/// Only the first call has an effect.
///
/// ```no_run
/// use opsdesk::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity.shows_targets())
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}
