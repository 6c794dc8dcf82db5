//! Class optimization driver.
//!
//! The [`Optimizer`] is the main entry point of the crate. It owns the configured pass
//! schedule and an event log, and turns a [`ClassModel`] into a new, optimized one.

use std::time::Instant;

use crate::{
    metadata::{ClassModel, ConstantPool, Method},
    optimizer::{
        optimize_method, ArithmeticFold, ComparisonFold, DerivedStats, EventKind, EventLog,
        OptimizerConfig, PassScheduler,
    },
    Result,
};

/// Constant folding optimizer for JVM classes.
///
/// Methods are optimized one after another against the class constant pool, which only
/// ever grows. A method whose optimization fails with a method-local error (see
/// [`crate::Error::is_method_local`]) is kept exactly as it was and recorded as aborted;
/// any other error aborts the whole class.
///
/// # Example
///
/// ```rust
/// use classfold::{
///     metadata::{ClassModel, Code, Method, MethodAccessFlags},
///     optimizer::{Optimizer, OptimizerConfig},
/// };
///
/// let mut class = ClassModel::new("demo/Sum");
/// // iconst_2 iconst_3 iadd ireturn
/// class.methods.push(
///     Method::new("five", "()I", MethodAccessFlags::STATIC)
///         .with_code(Code::new(2, 0, vec![0x05, 0x06, 0x60, 0xAC])),
/// );
///
/// let optimizer = Optimizer::new(OptimizerConfig::default());
/// let optimized = optimizer.optimize_class(&class)?;
///
/// // ldc #1 ireturn
/// assert_eq!(optimized.methods[0].code.as_ref().unwrap().code, vec![0x12, 0x01, 0xAC]);
/// println!("{}", optimizer.stats());
/// # Ok::<(), classfold::Error>(())
/// ```
pub struct Optimizer {
    /// Configuration.
    config: OptimizerConfig,
    /// Enabled passes, built once in the constructor.
    scheduler: PassScheduler,
    /// Everything recorded since construction or the last [`Optimizer::clear_events`].
    events: EventLog,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl Optimizer {
    /// Creates an optimizer with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Which folds to apply and how many iterations to allow per method.
    ///
    /// # Returns
    ///
    /// A new `Optimizer` with an empty event log.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        let mut scheduler = PassScheduler::new(config.max_iterations);
        if config.fold_arithmetic {
            scheduler.add_pass(Box::new(ArithmeticFold::new()));
        }
        if config.fold_comparisons {
            scheduler.add_pass(Box::new(ComparisonFold::new()));
        }

        Self {
            config,
            scheduler,
            events: EventLog::new(),
        }
    }

    /// The configuration this optimizer was built with.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// The enabled passes, in execution order.
    pub fn passes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.scheduler.pass_names()
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Statistics over [`Optimizer::events`].
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events)
    }

    /// Drops all recorded events.
    pub fn clear_events(&mut self) {
        self.events = EventLog::new();
    }

    /// Optimizes every method of `class`.
    ///
    /// `class` is not modified. Methods without code are carried over as they are.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not local to a single method, e.g.
    /// [`crate::Error::Malformed`] for a code array that cannot be decoded.
    pub fn optimize_class(&self, class: &ClassModel) -> Result<ClassModel> {
        let start = Instant::now();
        let before = self.events.len();

        let mut pool = class.constant_pool.clone();
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            methods.push(self.optimize_or_keep(method, &mut pool)?);
        }

        let run: EventLog = self.events.iter().skip(before).cloned().collect();
        let stats = DerivedStats::from_log(&run).with_time(start.elapsed());
        log::debug!("{}: {}", class.name, stats);

        Ok(ClassModel {
            name: class.name.clone(),
            version: class.version,
            access_flags: class.access_flags,
            constant_pool: pool,
            methods,
        })
    }

    /// Optimizes one method against `pool`, which receives the folded constants.
    ///
    /// Unlike [`Optimizer::optimize_class`], method-local errors are returned to the
    /// caller. `pool` is left as it was when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns any error raised while decoding, folding or encoding the method.
    pub fn optimize_method(&self, method: &Method, pool: &mut ConstantPool) -> Result<Method> {
        optimize_method(
            method,
            pool,
            &self.scheduler,
            self.config.keep_unmodified_bytes,
            &self.events,
        )
    }

    /// Optimizes `method`, falling back to the original on a method-local error.
    fn optimize_or_keep(&self, method: &Method, pool: &mut ConstantPool) -> Result<Method> {
        match self.optimize_method(method, pool) {
            Ok(optimized) => Ok(optimized),
            Err(error) if error.is_method_local() => {
                let signature = method.signature();
                log::warn!("{signature}: optimization aborted, keeping original code: {error}");
                self.events
                    .record(EventKind::MethodAborted)
                    .method(signature)
                    .message(error.to_string());
                Ok(method.clone())
            }
            Err(error) => Err(error),
        }
    }
}

/// Optimizes `class` with the default configuration.
///
/// # Errors
///
/// See [`Optimizer::optimize_class`].
pub fn optimize_class(class: &ClassModel) -> Result<ClassModel> {
    Optimizer::default().optimize_class(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{self, class_with};

    fn static_method(name: &str, code: Vec<u8>) -> Method {
        test::static_method(name, "()I", 4, 0, code)
    }

    #[test]
    fn test_optimizer_default() {
        let optimizer = Optimizer::default();
        assert_eq!(optimizer.config(), &OptimizerConfig::default());
        assert_eq!(optimizer.passes().collect::<Vec<_>>(), vec!["arithmetic", "comparison"]);
        assert!(optimizer.events().is_empty());
    }

    #[test]
    fn test_pipeline_passes_selective() {
        let optimizer = Optimizer::new(OptimizerConfig::new().with_fold_arithmetic(false));
        assert_eq!(optimizer.passes().collect::<Vec<_>>(), vec!["comparison"]);

        let optimizer = Optimizer::new(OptimizerConfig::disabled());
        assert_eq!(optimizer.passes().count(), 0);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let class = class_with(vec![static_method("five", vec![0x05, 0x06, 0x60, 0xAC])]);
        let snapshot = class.clone();

        let optimized = optimize_class(&class).unwrap();
        assert_eq!(class, snapshot);
        assert_eq!(optimized.constant_pool.count(), 2);
        assert_eq!(optimized.name, class.name);
    }

    #[test]
    fn test_method_local_error_keeps_original() {
        // fconst_1 fconst_2 ior ireturn
        let broken = static_method("broken", vec![0x0C, 0x0D, 0x80, 0xAC]);
        let fine = static_method("fine", vec![0x05, 0x06, 0x60, 0xAC]);
        let class = class_with(vec![broken.clone(), fine]);

        let optimizer = Optimizer::default();
        let optimized = optimizer.optimize_class(&class).unwrap();

        assert_eq!(optimized.methods[0], broken);
        assert_eq!(
            optimized.methods[1].code.as_ref().unwrap().code,
            vec![0x12, 0x01, 0xAC]
        );
        assert_eq!(optimizer.events().count_kind(EventKind::MethodAborted), 1);

        let stats = optimizer.stats();
        assert_eq!(stats.methods_aborted, 1);
        assert_eq!(stats.methods_optimized, 1);
    }

    #[test]
    fn test_malformed_code_fails_the_class() {
        // bipush without its operand
        let class = class_with(vec![static_method("cut", vec![0x10])]);
        let err = optimize_class(&class).unwrap_err();
        assert!(!err.is_method_local());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_clear_events() {
        let mut optimizer = Optimizer::default();
        let class = class_with(vec![static_method("five", vec![0x05, 0x06, 0x60, 0xAC])]);
        optimizer.optimize_class(&class).unwrap();
        assert!(!optimizer.events().is_empty());

        optimizer.clear_events();
        assert!(optimizer.events().is_empty());
    }
}
