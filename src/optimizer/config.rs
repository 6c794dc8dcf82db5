//! Configuration for the optimizer.
//!
//! This module provides [`OptimizerConfig`], which selects the fold passes that run and
//! bounds the work spent on a single method.

/// Configuration for the optimizer.
///
/// Controls which folds run and how the result of a method without folds is produced.
///
/// # Examples
///
/// ```rust
/// use classfold::optimizer::OptimizerConfig;
///
/// let config = OptimizerConfig::new()
///     .with_fold_comparisons(false)
///     .with_max_iterations(64);
///
/// assert!(config.fold_arithmetic);
/// assert!(!config.fold_comparisons);
/// assert_eq!(config.max_iterations, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// Enable the arithmetic fold pass (default: true).
    pub fold_arithmetic: bool,

    /// Enable the comparison fold pass (default: true).
    pub fold_comparisons: bool,

    /// Maximum fixpoint iterations per method (default: 10000).
    ///
    /// Every fold removes at least one instruction, so a method always reaches its fixpoint
    /// on its own; hitting this bound is logged as a warning.
    pub max_iterations: usize,

    /// Keep the original code bytes of methods without folds (default: true).
    ///
    /// When disabled, every method is re-encoded, which canonicalizes instruction forms
    /// and recomputes `max_stack` and `max_locals` even if nothing was folded.
    pub keep_unmodified_bytes: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            fold_arithmetic: true,
            fold_comparisons: true,
            max_iterations: 10_000,
            keep_unmodified_bytes: true,
        }
    }
}

impl OptimizerConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with every fold pass disabled.
    ///
    /// Useful to normalize methods through a decode/encode cycle without changing them,
    /// together with [`OptimizerConfig::with_keep_unmodified_bytes`].
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            fold_arithmetic: false,
            fold_comparisons: false,
            ..Self::default()
        }
    }

    /// Returns true if any fold pass is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.fold_arithmetic || self.fold_comparisons
    }

    /// Enables or disables arithmetic folding.
    ///
    /// # Arguments
    ///
    /// * `enabled` - Whether the arithmetic fold pass runs.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_fold_arithmetic(mut self, enabled: bool) -> Self {
        self.fold_arithmetic = enabled;
        self
    }

    /// Enables or disables comparison folding.
    ///
    /// # Arguments
    ///
    /// * `enabled` - Whether the comparison fold pass runs.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_fold_comparisons(mut self, enabled: bool) -> Self {
        self.fold_comparisons = enabled;
        self
    }

    /// Sets the maximum number of fixpoint iterations per method.
    ///
    /// # Arguments
    ///
    /// * `max` - The maximum number of iterations.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Controls whether methods without folds keep their original bytes.
    #[must_use]
    pub fn with_keep_unmodified_bytes(mut self, keep: bool) -> Self {
        self.keep_unmodified_bytes = keep;
        self
    }
}
