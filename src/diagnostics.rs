//! Debug trace output.
//!
//! The library only emits `tracing` events. A subscriber is installed here,
//! and only when the debug flag is set; otherwise the events go nowhere.

use crate::config::AgentConfig;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a stderr subscriber at debug level when `config.debug` is set.
///
/// Returns whether a subscriber was installed by this call. A second call, or
/// a host that already installed its own subscriber, leaves things as they
/// are.
pub fn init(config: &AgentConfig) -> bool {
    if !config.debug {
        return false;
    }
    tracing_subscriber::registry()
        .with(LevelFilter::DEBUG)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .is_ok()
}
