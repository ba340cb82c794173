use tracing_subscriber::EnvFilter;

/// install the global fmt subscriber.
///
/// RUST_LOG wins when set; otherwise `default_level` (e.g. "info",
/// "device_tracker=debug") is used.
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
