//! Logging setup. Logs go to stderr so reports on stdout stay pipeable.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// level; `log_format = "json"` switches to one JSON object per line.
pub fn init_tracing(settings: &Settings) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_second_init_fails() {
        let settings = Settings::default();
        let _ = init_tracing(&settings);
        assert!(init_tracing(&settings).is_err());
    }
}
