// src/context.rs

//! Per-run reporting context threaded through pipeline components
//!
//! Verbosity and accumulated warnings live on an explicit object handed to
//! each component call rather than in process-wide state. The engine creates
//! one `RunContext` per run and folds its warnings into the final outcome.

use tracing::{debug, info, warn};

/// Mutable reporting state for a single pipeline run
#[derive(Debug, Default)]
pub struct RunContext {
    verbose: bool,
    warnings: Vec<String>,
}

impl RunContext {
    /// Create a context with default verbosity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with explicit verbosity
    pub fn with_verbosity(verbose: bool) -> Self {
        Self {
            verbose,
            warnings: Vec::new(),
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Record a warning and emit it to the log
    ///
    /// Warnings are non-fatal by definition; anything fatal belongs in a
    /// component's error return, not here.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Emit an informational message, at debug level unless verbose
    pub fn info(&self, message: impl AsRef<str>) {
        if self.verbose {
            info!("{}", message.as_ref());
        } else {
            debug!("{}", message.as_ref());
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Drain accumulated warnings into an owned list
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_accumulate_in_order() {
        let mut ctx = RunContext::new();
        ctx.warn("first");
        ctx.warn("second");
        assert_eq!(ctx.warnings(), ["first", "second"]);
    }

    #[test]
    fn test_take_warnings_drains() {
        let mut ctx = RunContext::new();
        ctx.warn("only");
        let taken = ctx.take_warnings();
        assert_eq!(taken, ["only"]);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_verbosity_flag() {
        assert!(!RunContext::new().verbose());
        assert!(RunContext::with_verbosity(true).verbose());
    }
}
