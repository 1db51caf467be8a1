use crate::libs::messages::macros::is_debug_mode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when debug mode is on and `RUST_LOG` is not set.
const DEBUG_FILTER: &str = "info,doover=debug";
const QUIET_FILTER: &str = "warn";

/// Installs the global fmt subscriber.
///
/// The filter comes from `RUST_LOG` when present. Calling this more than once
/// is harmless: only the first subscriber is kept and later calls return `false`.
pub fn init() -> bool {
    let fallback = if is_debug_mode() { DEBUG_FILTER } else { QUIET_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
