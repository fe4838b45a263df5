//! Tracing setup for texci binaries.
//!
//! Logs go to stderr so that pipeline reports printed on stdout stay
//! machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Default filter: `level` for texci crates, `warn` for dependencies.
pub fn default_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,texci_cli={level},texci_core={level},texci_ci={level},texci_github={level}")
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init_tracing(format: LogFormat, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr).json())
                .try_init()
                .ok();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init()
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_scopes_crates() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("texci_core=debug"));
        assert!(filter.contains("texci_github=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(LogFormat::Text, Level::INFO);
        init_tracing(LogFormat::Json, Level::DEBUG);
    }
}
