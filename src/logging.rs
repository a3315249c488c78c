use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
/// On Lambda, timestamps are left to CloudWatch.
pub fn init_logging(level: &str, json: bool, lambda: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // Err only when a subscriber is already installed
    let _ = match (json, lambda) {
        (true, true) => builder.json().without_time().try_init(),
        (true, false) => builder.json().try_init(),
        (false, true) => builder.without_time().try_init(),
        (false, false) => builder.try_init(),
    };
}
