//! Process-wide tracing setup

use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const CRATE_TARGET: &str = "etfwatch";

fn app_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Logs go to stderr so that command output on stdout stays clean.
///
/// `RUST_LOG` narrows or widens the default; dependencies stay at warn.
pub fn init_logging(verbose: bool) {
    let level = app_level(verbose);
    let app_filter = Targets::new()
        .with_target(CRATE_TARGET, level)
        .with_default(LevelFilter::WARN);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(verbose)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .with(app_filter)
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_level() {
        assert_eq!(app_level(false), LevelFilter::INFO);
        assert_eq!(app_level(true), LevelFilter::DEBUG);
    }
}
