//! Logging setup for benches, tests and applications embedding the factor
//!
//! The library only emits `tracing` events:
//! - `warn!` for a singular landmark information matrix and, with `verbose_cheirality`, for a
//!   landmark behind a camera
//! - `debug!` when a landmark cannot be triangulated and a zero factor is returned
//! - `trace!` for per-call triangulation details
//!
//! Installing a subscriber is up to the caller; the functions below install the standard one.

use tracing::Level;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::EnvFilter;

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Install the standard subscriber at INFO (overridable via `RUST_LOG`)
///
/// # Example
/// ```no_run
/// use smart_stereo::init_logger;
///
/// init_logger();
/// tracing::info!("Linearizing smart factors");
/// ```
///
/// ```bash
/// RUST_LOG=smart_stereo=debug cargo bench
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install the standard subscriber with a custom default level
///
/// Thread ids are printed because factors are linearized on the rayon pool. Only the first
/// call in a process installs a subscriber.
pub fn init_logger_with_level(default_level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .try_init();
}

/// Subscriber for `cargo test`: output captured per test, WARN unless `RUST_LOG` says otherwise
pub fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(Level::WARN))
        .with_test_writer()
        .without_time()
        .try_init();
}
