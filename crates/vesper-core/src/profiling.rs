//! Profiling utilities based on the `puffin` crate.

#[cfg(feature = "profiling")]
use std::sync::OnceLock;

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

use crate::config::{BenchmarkMode, Config};

/// Profiling backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Collect scopes in-process only.
    InProcess,
    /// Send profiling data to puffin_viewer via HTTP.
    #[cfg(feature = "profiling")]
    PuffinHttp,
}

#[cfg(feature = "profiling")]
static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

/// Initialize profiling with the specified backend.
///
/// # Example
/// ```no_run
/// use vesper_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::InProcess);
/// ```
pub fn init_profiling(backend: ProfilingBackend) {
    puffin::set_scopes_on(true);
    match backend {
        ProfilingBackend::InProcess => {
            tracing::info!("Puffin scopes enabled");
        }
        #[cfg(feature = "profiling")]
        ProfilingBackend::PuffinHttp => {
            let addr = "0.0.0.0:8585";
            match puffin_http::Server::new(addr) {
                Ok(server) => {
                    tracing::info!("Puffin profiler server started on http://{}", addr);
                    let _ = PROFILING_SERVER.set(server);
                }
                Err(e) => {
                    tracing::error!("Failed to start puffin server: {}", e);
                }
            }
        }
    }
}

/// Enables profiling according to [`Config::benchmark`].
pub fn init_from_config(config: &Config) {
    match config.benchmark {
        BenchmarkMode::Off => {}
        BenchmarkMode::On => init_profiling(ProfilingBackend::InProcess),
        #[cfg(feature = "profiling")]
        BenchmarkMode::WithWebServer => init_profiling(ProfilingBackend::PuffinHttp),
        #[cfg(not(feature = "profiling"))]
        BenchmarkMode::WithWebServer => {
            tracing::warn!("`profiling` feature disabled, falling back to in-process scopes");
            init_profiling(ProfilingBackend::InProcess);
        }
    }
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per frame, before any renderer work for that frame.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_mode_enables_scopes() {
        init_from_config(&Config::default().with_benchmark(BenchmarkMode::On));
        assert!(puffin::are_scopes_on());
        {
            profile_scope!("test_scope");
        }
        new_frame();
    }
}
