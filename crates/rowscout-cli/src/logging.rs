//! Log subscriber setup

use crate::config::CliConfig;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to the verbosity level
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.filter_directive()))
}

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
pub fn init(config: &CliConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false);

    // a second init (tests) keeps the first subscriber
    let _ = if config.log_json {
        builder.json().try_init()
    } else {
        builder
            .with_ansi(config.color.should_color())
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        init(&config);
        init(&config.with_log_json(true));
    }
}
