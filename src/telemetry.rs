//! Tracing bootstrap for embedders and tests.
//!
//! The engine logs through `tracing` everywhere; embedders that already
//! install their own subscriber can skip this entirely.

/// Install a formatted `tracing` subscriber honouring `RUST_LOG`
/// (default level: `info`). Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
