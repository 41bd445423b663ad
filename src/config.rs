//! Diagnostics configuration.
//!
//! Origin-trace capture is controlled by an explicit [`TraceConfig`] value
//! rather than ambient environment state. Embedders either install a
//! process-wide default once at startup ([`init_trace_config`]) or override
//! per thunk through the builder.

use std::sync::OnceLock;

/// How much origin information a thunk captures at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginCapture {
    /// No capture. Zero cost; escalation messages carry no trace.
    #[default]
    Disabled,
    /// Capture a backtrace; rendering elides this crate's internal frames.
    Filtered,
    /// Capture and render the complete backtrace.
    Full,
}

impl OriginCapture {
    /// Returns true if construction should capture a backtrace.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Diagnostics configuration for thunk construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceConfig {
    /// Origin-capture mode for thunks without a per-instance override.
    pub origin_capture: OriginCapture,
}

impl TraceConfig {
    /// Creates the default configuration (capture disabled).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            origin_capture: OriginCapture::Disabled,
        }
    }

    /// Sets the origin-capture mode.
    #[must_use]
    pub const fn with_origin_capture(mut self, mode: OriginCapture) -> Self {
        self.origin_capture = mode;
        self
    }
}

static PROCESS_CONFIG: OnceLock<TraceConfig> = OnceLock::new();

/// Installs the process-wide default configuration.
///
/// The first call wins; returns false if a configuration was already
/// installed (the existing one stays in effect).
pub fn init_trace_config(config: TraceConfig) -> bool {
    PROCESS_CONFIG.set(config).is_ok()
}

/// Returns the process-wide configuration, or the default if none was
/// installed.
#[must_use]
pub fn trace_config() -> TraceConfig {
    PROCESS_CONFIG.get().copied().unwrap_or_default()
}
