//! Origin traces for escalation diagnostics.
//!
//! When capture is enabled, a thunk records a backtrace at construction.
//! The trace is rendered only into the unobserved-error escalation message,
//! answering "where was the thunk that nobody listened to created".

use crate::config::OriginCapture;
use std::backtrace::Backtrace;
use std::fmt;

/// Backtrace captured at thunk construction.
pub struct OriginTrace {
    backtrace: Backtrace,
    mode: OriginCapture,
}

impl fmt::Debug for OriginTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginTrace")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl OriginTrace {
    /// Captures a trace if the mode asks for one.
    #[must_use]
    pub(crate) fn capture(mode: OriginCapture) -> Option<Self> {
        if mode.is_enabled() {
            Some(Self {
                backtrace: Backtrace::force_capture(),
                mode,
            })
        } else {
            None
        }
    }

    /// Renders the trace according to its capture mode.
    #[must_use]
    pub fn render(&self) -> String {
        let raw = self.backtrace.to_string();
        match self.mode {
            OriginCapture::Filtered => {
                let filtered = filter_frames(&raw);
                if filtered.trim().is_empty() {
                    raw
                } else {
                    filtered
                }
            }
            _ => raw,
        }
    }
}

impl fmt::Display for OriginTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Drops frames from this crate's internals, keeping caller frames.
///
/// A frame is a symbol line (`N: path`) optionally followed by an indented
/// `at file:line` location line; the location line shares its frame's fate.
fn filter_frames(raw: &str) -> String {
    let mut out = String::new();
    let mut skipping = false;
    for line in raw.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("at ") {
            skipping = trimmed.contains("thunklet::");
        }
        if !skipping {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
