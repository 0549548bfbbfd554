//! Log output for binaries and tests embedding the store.

/// Install a global subscriber filtered by `RUST_LOG`. Does nothing if one is already installed.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::from_default_env();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    if registry.try_init().is_ok() {
        tracing::info!("Tracing initialized");
    }
}
