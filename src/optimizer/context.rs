//! Per-method state shared by the fold passes.
//!
//! A [`MethodContext`] lives for one run of the method driver. It owns the working copy of
//! the constant pool the passes intern into, and knows where every instruction sat in the
//! original code array so events can point at it.

use std::collections::{HashMap, HashSet};

use crate::{
    assembly::{InstructionHandle, InstructionList},
    metadata::ConstantPool,
    optimizer::{EventBuilder, EventKind, EventLog},
};

/// State of one method under optimization.
pub struct MethodContext<'a> {
    /// Working copy of the class constant pool; committed by the caller on success.
    pub pool: ConstantPool,

    /// Where events are recorded.
    pub events: &'a EventLog,

    /// Name and descriptor of the method, e.g. `compute(I)J`.
    pub method: String,

    origins: HashMap<InstructionHandle, u32>,
    reported: HashSet<InstructionHandle>,
    folds: usize,
}

impl<'a> MethodContext<'a> {
    /// Creates a context for `list`, which must have valid positions.
    ///
    /// The current position of every instruction is remembered as its original offset.
    #[must_use]
    pub fn new(
        list: &InstructionList,
        pool: ConstantPool,
        events: &'a EventLog,
        method: impl Into<String>,
    ) -> Self {
        let origins = list
            .iter()
            .filter_map(|(handle, _)| list.position(handle).map(|offset| (handle, offset)))
            .collect();

        Self {
            pool,
            events,
            method: method.into(),
            origins,
            reported: HashSet::new(),
            folds: 0,
        }
    }

    /// Offset of `handle` in the original code array, `None` for inserted instructions.
    #[must_use]
    pub fn origin(&self, handle: InstructionHandle) -> Option<u32> {
        self.origins.get(&handle).copied()
    }

    /// Starts an event for this method at the original offset of `handle`.
    pub fn record(&self, kind: EventKind, handle: InstructionHandle) -> EventBuilder<'a> {
        self.events
            .record(kind)
            .method(self.method.clone())
            .location(self.origin(handle))
    }

    /// Notes a successful fold.
    pub fn fold_applied(&mut self) {
        self.folds += 1;
    }

    /// Number of folds applied so far.
    #[must_use]
    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Records that the match starting at `handle` was skipped.
    ///
    /// Every match is rescanned on each fixpoint iteration; only the first skip of a given
    /// start instruction is recorded.
    pub fn skip(&mut self, pass: &'static str, handle: InstructionHandle, reason: &str) {
        log::debug!("{}: {} skipped match at {}: {}", self.method, pass, handle, reason);
        if self.reported.insert(handle) {
            self.record(EventKind::FoldSkipped, handle)
                .pass(pass)
                .message(reason.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Instruction;

    #[test]
    fn test_origins_and_skips() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::int_const(1));
        let second = list.append(Instruction::int_const(1000));
        list.recompute_positions().unwrap();

        let events = EventLog::new();
        let mut ctx = MethodContext::new(&list, ConstantPool::new(), &events, "run()V");
        assert_eq!(ctx.origin(first), Some(0));
        assert_eq!(ctx.origin(second), Some(1));

        let inserted = list.append(Instruction::nop());
        assert_eq!(ctx.origin(inserted), None);

        ctx.skip("arithmetic", second, "load of local 1 does not resolve");
        ctx.skip("arithmetic", second, "load of local 1 does not resolve");
        assert_eq!(events.count_kind(EventKind::FoldSkipped), 1);

        let event = events.iter().next().unwrap();
        assert_eq!(event.location, Some(1));
        assert_eq!(event.method.as_deref(), Some("run()V"));
    }
}
