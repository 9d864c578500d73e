//! Structured logging.
//!
//! `RUST_LOG` wins when set. Otherwise the level follows the DEBUG flag.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "cms_edge_proxy=info,tower_http=info";
const DEBUG_FILTER: &str = "cms_edge_proxy=debug,tower_http=debug";

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(debug: bool) {
    let fallback = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
