//! Method optimization driver.
//!
//! One method goes through `Scanning -> Folding -> ... -> Stable`: the code array is
//! decoded once, the enabled passes run round-robin on the instruction stream until an
//! iteration applies no fold, and the stream is encoded once. `max_stack` and `max_locals`
//! are recomputed for the new code array.

use crate::{
    assembly::{decode_code, encode_code, max_locals, max_stack, InstructionList},
    metadata::{Code, ConstantPool, Method},
    optimizer::{EventKind, EventLog, FoldPass, MethodContext},
    Result,
};

/// Runs fold passes on one instruction stream until nothing changes.
///
/// Passes run in the order they were added. Every iteration gives each pass one attempt;
/// the schedule is stable once a whole iteration applied no fold.
pub struct PassScheduler {
    /// Upper bound on iterations per method.
    max_iterations: usize,
    /// Enabled passes, in execution order.
    passes: Vec<Box<dyn FoldPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PassScheduler {
    /// Creates a scheduler without passes.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Iterations after which a method is considered stable regardless.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            passes: Vec::new(),
        }
    }

    /// Appends a pass to the schedule.
    pub fn add_pass(&mut self, pass: Box<dyn FoldPass>) {
        self.passes.push(pass);
    }

    /// Returns `true` if no pass is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Names of the scheduled passes, in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Gives every pass one attempt. Returns `true` if any of them folded.
    fn run_passes_once(
        &self,
        list: &mut InstructionList,
        ctx: &mut MethodContext<'_>,
    ) -> Result<bool> {
        let mut changed = false;
        for pass in &self.passes {
            if pass.should_run(list) && pass.run_on_method(list, ctx)? {
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Runs the passes until an iteration applies no fold.
    ///
    /// # Returns
    ///
    /// The number of iterations run, including the final one that changed nothing.
    ///
    /// # Errors
    ///
    /// Returns the first error a pass could not recover from.
    pub fn run_to_fixpoint(
        &self,
        list: &mut InstructionList,
        ctx: &mut MethodContext<'_>,
    ) -> Result<usize> {
        for iteration in 0..self.max_iterations {
            if !self.run_passes_once(list, ctx)? {
                return Ok(iteration + 1);
            }
        }

        log::warn!(
            "{}: still folding after {} iterations, stopping",
            ctx.method,
            self.max_iterations
        );
        ctx.events
            .record(EventKind::Warning)
            .method(ctx.method.as_str())
            .message(format!(
                "iteration bound of {} reached after {} folds",
                self.max_iterations,
                ctx.folds()
            ));
        Ok(self.max_iterations)
    }
}

/// Optimizes one method against `pool`.
///
/// Methods without code are returned unchanged. Constants are interned into a copy of
/// `pool` that replaces it only once the method was re-encoded, so `pool` is untouched when
/// this returns an error.
///
/// # Arguments
///
/// * `method` - The method to optimize.
/// * `pool` - The class constant pool; extended with the folded constants on success.
/// * `scheduler` - The passes to run.
/// * `keep_unmodified_bytes` - Return `method` itself when nothing was folded.
/// * `events` - Where folds, skips and the outcome are recorded.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the code array cannot be decoded, and any error a
/// pass, the encoder or the stack analysis could not recover from.
pub fn optimize_method(
    method: &Method,
    pool: &mut ConstantPool,
    scheduler: &PassScheduler,
    keep_unmodified_bytes: bool,
    events: &EventLog,
) -> Result<Method> {
    let Some(code) = method.code.as_ref() else {
        return Ok(method.clone());
    };

    let signature = method.signature();
    let mut list = decode_code(code, pool)?;
    list.recompute_positions()?;

    let mut ctx = MethodContext::new(&list, pool.clone(), events, signature.as_str());
    let iterations = scheduler.run_to_fixpoint(&mut list, &mut ctx)?;
    let folds = ctx.folds();

    if folds == 0 && keep_unmodified_bytes {
        log::trace!("{signature}: nothing to fold");
        events
            .record(EventKind::MethodUnchanged)
            .method(signature)
            .message("no foldable sequence");
        return Ok(method.clone());
    }

    let (bytes, exception_table) = encode_code(&mut list)?;
    let stack = max_stack(&list, &ctx.pool)?;
    let locals = max_locals(&list, method.argument_slots()?)?;

    log::debug!(
        "{}: {} folds in {} iterations, {} -> {} bytes, max_stack {} -> {}, max_locals {} -> {}",
        signature,
        folds,
        iterations,
        code.code.len(),
        bytes.len(),
        code.max_stack,
        stack,
        code.max_locals,
        locals
    );
    events
        .record(EventKind::MethodOptimized)
        .method(signature.as_str())
        .message(format!(
            "{folds} folds, {} -> {} bytes",
            code.code.len(),
            bytes.len()
        ));

    *pool = ctx.pool;

    let mut optimized = method.clone();
    optimized.code = Some(Code {
        max_stack: stack,
        max_locals: locals,
        code: bytes,
        exception_table,
    });
    Ok(optimized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::MethodAccessFlags,
        optimizer::{ArithmeticFold, ComparisonFold},
        test,
    };

    fn scheduler() -> PassScheduler {
        let mut scheduler = PassScheduler::new(100);
        scheduler.add_pass(Box::new(ArithmeticFold::new()));
        scheduler.add_pass(Box::new(ComparisonFold::new()));
        scheduler
    }

    fn static_method(descriptor: &str, max_stack: u16, max_locals: u16, code: Vec<u8>) -> Method {
        test::static_method("compute", descriptor, max_stack, max_locals, code)
    }

    #[test]
    fn test_scheduler_order() {
        let scheduler = scheduler();
        assert!(!scheduler.is_empty());
        assert_eq!(
            scheduler.pass_names().collect::<Vec<_>>(),
            vec!["arithmetic", "comparison"]
        );
        assert!(PassScheduler::default().is_empty());
    }

    #[test]
    fn test_fold_chain() {
        // iconst_2 iconst_3 iadd iconst_4 imul ireturn
        let method = static_method("()I", 2, 0, vec![0x05, 0x06, 0x60, 0x07, 0x68, 0xAC]);
        let mut pool = ConstantPool::new();
        let events = EventLog::new();

        let optimized = optimize_method(&method, &mut pool, &scheduler(), true, &events).unwrap();
        let code = optimized.code.unwrap();

        // ldc #2 ireturn, #1 holds the intermediate 5
        assert_eq!(code.code, vec![0x12, 0x02, 0xAC]);
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 0);
        assert_eq!(pool.numeric(2).unwrap(), crate::assembly::NumericValue::I32(20));
        assert_eq!(events.count_kind(EventKind::ConstantFolded), 2);
        assert_eq!(events.count_kind(EventKind::MethodOptimized), 1);
    }

    #[test]
    fn test_unchanged_method_keeps_bytes() {
        // iload_0 iconst_1 iadd ireturn
        let method = static_method("(I)I", 5, 3, vec![0x1A, 0x04, 0x60, 0xAC]);
        let mut pool = ConstantPool::new();
        let events = EventLog::new();

        let kept = optimize_method(&method, &mut pool, &scheduler(), true, &events).unwrap();
        assert_eq!(kept, method);
        assert_eq!(pool.count(), 1);
        assert!(events.has(EventKind::MethodUnchanged));

        let recomputed = optimize_method(&method, &mut pool, &scheduler(), false, &events).unwrap();
        let code = recomputed.code.unwrap();
        assert_eq!(code.code, vec![0x1A, 0x04, 0x60, 0xAC]);
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 1);
    }

    #[test]
    fn test_method_without_code() {
        let method = Method::new("run", "()V", MethodAccessFlags::ABSTRACT);
        let mut pool = ConstantPool::new();
        let events = EventLog::new();

        let same = optimize_method(&method, &mut pool, &scheduler(), true, &events).unwrap();
        assert_eq!(same, method);
        assert!(events.is_empty());
    }

    #[test]
    fn test_failure_leaves_pool_untouched() {
        // iconst_1 iconst_2 iadd pop, then ldc #1 ldc #1 if_acmpeq materialized
        let code = vec![
            0x04, 0x05, 0x60, 0x57, // iconst_1 iconst_2 iadd pop
            0x12, 0x01, 0x12, 0x01, // ldc #1 ldc #1
            0xA5, 0x00, 0x07, // if_acmpeq +7
            0x04, // iconst_1
            0xA7, 0x00, 0x04, // goto +4
            0x03, // iconst_0
            0xAC, // ireturn
        ];
        let mut pool = ConstantPool::new();
        pool.add_integer(7).unwrap();
        let method = static_method("()I", 2, 0, code);
        let events = EventLog::new();

        let err = optimize_method(&method, &mut pool, &scheduler(), true, &events).unwrap_err();
        assert!(err.is_method_local());
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn test_iteration_bound() {
        let mut bounded = PassScheduler::new(1);
        bounded.add_pass(Box::new(ArithmeticFold::new()));

        // iconst_1 iconst_2 iadd iconst_3 iadd ireturn needs two iterations plus a quiet one
        let method = static_method("()I", 2, 0, vec![0x04, 0x05, 0x60, 0x06, 0x60, 0xAC]);
        let mut pool = ConstantPool::new();
        let events = EventLog::new();

        let optimized = optimize_method(&method, &mut pool, &bounded, true, &events).unwrap();
        assert!(events.has(EventKind::Warning));
        assert_eq!(events.count_kind(EventKind::ConstantFolded), 1);
        // ldc #1 iconst_3 iadd ireturn
        assert_eq!(optimized.code.unwrap().code, vec![0x12, 0x01, 0x06, 0x60, 0xAC]);
    }
}
