use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber. `log` records from the library crates are
/// bridged into it.
///
/// Filter: --verbose > RUST_LOG > `log.level` from settings > "info".
pub fn init(configured_level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // A second init (tests) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
