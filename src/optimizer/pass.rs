//! Pass trait for the fold pipeline.
//!
//! This module defines the [`FoldPass`] trait both fold kinds implement. The method
//! driver holds the enabled passes as trait objects and runs each of them once per
//! fixpoint iteration, in order.

use crate::{assembly::InstructionList, optimizer::MethodContext, Result};

/// A rewrite pass over one method's instruction stream.
///
/// # Pipeline Integration
///
/// Passes don't keep state between calls. Every call scans the stream from its head and
/// applies at most one fold, so the driver can run the passes round-robin until none of
/// them reports a change:
///
/// 1. **Arithmetic**: operand, operand, operator sequences become one constant load
/// 2. **Comparison**: boolean materializations of constant comparisons become one push
pub trait FoldPass {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on the given stream?
    ///
    /// Called before `run_on_method`. Override to skip streams the pass cannot match.
    fn should_run(&self, _list: &InstructionList) -> bool {
        true
    }

    /// Runs one fold attempt.
    ///
    /// Returns `true` if a fold was applied, `false` when no match could be folded.
    /// Matches that cannot be folded for a recoverable reason are recorded through
    /// [`MethodContext::skip`] and scanning continues past them.
    ///
    /// # Errors
    ///
    /// Returns an error that aborts the method (see [`crate::Error::is_method_local`]) or
    /// the whole run.
    fn run_on_method(&self, list: &mut InstructionList, ctx: &mut MethodContext<'_>)
        -> Result<bool>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
