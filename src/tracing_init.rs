use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config;

/// Where log output goes: `DPDASH_LOG` > `~/.dpdash/dpdash.log`.
pub fn log_path() -> PathBuf {
    std::env::var("DPDASH_LOG")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            config::config_dir()
                .map(|d| d.join("dpdash.log"))
                .unwrap_or_else(|| PathBuf::from("dpdash.log"))
        })
}

/// Install the global subscriber. The terminal UI owns the screen, so
/// output goes to a file; stderr is used only if the file can't be opened.
pub fn init_tracing(level: &str) {
    let log_path = log_path();

    let log_file = log_path
        .parent()
        .and_then(|parent| std::fs::create_dir_all(parent).ok())
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .ok()
        });

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let layer: Box<dyn Layer<_> + Send + Sync> = match log_file {
        Some(file) => tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        None => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
    };

    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}
