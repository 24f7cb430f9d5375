use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Installs the global subscriber for one process (`component` is "api" or
/// "grading-worker"); `RUST_LOG` overrides the configured level.
pub(crate) fn init_tracing(settings: &Settings, component: &'static str) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.as_str()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let installed = if telemetry.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("tracing init failed: {err}"))?;

    tracing::info!(
        component,
        environment = settings.runtime().environment.as_str(),
        store_backend = settings.store().backend.as_str(),
        "telemetry initialised"
    );

    Ok(())
}
