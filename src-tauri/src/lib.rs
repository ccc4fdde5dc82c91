//! Solus - wake-word gated voice assistant with on-screen guidance
//!
//! The assistant sleeps behind a keyword spotter. Saying the wake word opens
//! a floating bubble, fetches session credentials and joins a real-time room
//! where a remote agent listens, talks back and can point at things on the
//! screen through the guidance overlay. Every platform capability sits
//! behind a trait, so the whole core runs headless; the `desktop` feature
//! adds a Tauri shell.

pub mod assistant;
pub mod bubble;
pub mod config;
pub mod geometry;
pub mod guidance;
pub mod notice;
pub mod overlay;
pub mod session;
#[cfg(feature = "desktop")]
pub mod shell;
pub mod timer;
pub mod wake;

#[cfg(feature = "desktop")]
pub use shell::run;

/// Install the global `tracing` subscriber: stdout plus an append-only
/// debug log under `~/.solus/logs`, timestamps in local time.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    /// Format timestamps using the system's local time via chrono
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let log_dir = config::get_config_dir().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("solus-debug.log"))
        .ok();

    let installed = if let Some(file) = log_file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false);
        let stdout_layer = tracing_subscriber::fmt::layer().with_timer(LocalTimer);
        tracing_subscriber::registry()
            .with(filter())
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_timer(LocalTimer)
            .with_env_filter(filter())
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!("Logging to {}", log_dir.display());
    }
}
