/// Engine-level configuration shared by the Vesper crates.
///
/// Renderer-specific sizing lives in `vesper_render::Renderer2DConfig`; this
/// struct only carries process-wide concerns.
#[derive(Debug, Clone)]
pub struct Config {
    pub benchmark: BenchmarkMode,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            benchmark: BenchmarkMode::Off,
            log_filter: crate::logging::DEFAULT_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn with_benchmark(mut self, benchmark: BenchmarkMode) -> Self {
        self.benchmark = benchmark;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkMode {
    /// Profiling scopes are compiled in but not collected
    Off,
    /// Profiling scopes are collected in-process
    On,
    /// Profiling scopes are collected and served to `puffin_viewer` over HTTP
    WithWebServer,
}
