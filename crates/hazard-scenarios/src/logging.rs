// Purpose: Tracing subscriber setup shared by every binary of the corpus.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "hazard_scenarios=info,hazard_sync=warn";

/// Install a stderr subscriber filtered by `RUST_LOG`.
///
/// stdout is reserved for the scenarios' result lines.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
