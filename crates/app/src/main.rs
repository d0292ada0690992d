//! MirrorPane: mirror a region of a display into a resizable window.

mod settings;

#[cfg(target_os = "windows")]
mod app;
#[cfg(target_os = "windows")]
mod output;

use settings::Settings;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::load_or_create() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "could not load settings, using defaults");
            Settings::default()
        }
    };

    run(settings)
}

#[cfg(target_os = "windows")]
fn run(settings: Settings) -> anyhow::Result<()> {
    app::run(settings)
}

#[cfg(not(target_os = "windows"))]
fn run(_settings: Settings) -> anyhow::Result<()> {
    tracing::warn!("MirrorPane requires Windows; screen capture is unavailable on this platform");
    Ok(())
}
