use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber with the given filter (falling
/// back to `RUST_LOG`, then `info`). Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
