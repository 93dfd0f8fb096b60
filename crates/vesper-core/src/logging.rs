use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Filter used when neither `RUST_LOG` nor a [`Config`] filter is given.
pub const DEFAULT_FILTER: &str = "debug,wgpu_core=info,wgpu_hal=info,naga=info";

pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

pub fn init_with_config(config: &Config) {
    init_with_filter(&config.log_filter);
}

/// Installs the global `fmt` subscriber. `RUST_LOG` takes precedence over `filter`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_filter(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::trace!("global subscriber already installed");
    }
}
