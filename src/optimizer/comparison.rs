//! Comparison folding.
//!
//! Compilers materialize a comparison as a branch selecting one of two constant pushes. When
//! both operands resolve to literals, the whole sequence collapses into the push the branch
//! would select:
//!
//! ```text
//! iconst_5
//! iconst_3
//! if_icmplt L1            iconst_1
//! iconst_1        =>
//! goto L2
//! L1: iconst_0
//! L2:
//! ```
//!
//! A taken branch keeps the push at its target, otherwise the fall-through push is kept. For
//! the boolean idiom above that means `0` when taken and `1` when not. With an `lcmp`/`fcmp<op>`/`dcmp<op>`
//! in front of the branch, the three-way result is computed first and then tested against
//! zero.

use crate::{
    assembly::{Condition, Instruction, InstructionList, NumericValue},
    optimizer::{
        find_comparison,
        numeric::{as_i32, relation_holds, tri_state},
        operand_value, ComparisonMatch, EventKind, FoldPass, MethodContext,
    },
    Error, Result,
};

/// Folds comparisons between literals that select one of two `int` constants.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComparisonFold;

impl ComparisonFold {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether the branch of `found` is taken for `left` and `right`.
    fn branch_taken(
        list: &InstructionList,
        found: &ComparisonMatch,
        left: NumericValue,
        right: NumericValue,
    ) -> Result<bool> {
        let branch = list.get(found.branch).ok_or(Error::InvalidHandle(found.branch))?;
        let Instruction::If { condition, .. } = branch else {
            return Err(Error::InvalidOperand(format!(
                "{branch} at {} is not a conditional branch",
                found.branch
            )));
        };

        let compare = found.compare.and_then(|handle| list.get(handle));
        match (condition, compare) {
            (Condition::IntCompare(relation), None) => {
                Ok(relation_holds(*relation, as_i32(left).cmp(&as_i32(right))))
            }
            (Condition::Zero(relation), Some(Instruction::Compare(kind))) => {
                let result = tri_state(*kind, left, right);
                Ok(relation_holds(*relation, result.cmp(&0)))
            }
            _ => Err(Error::UnsupportedComparison(format!(
                "{} on literal operands",
                branch.mnemonic()
            ))),
        }
    }

    /// Tries to fold one match. Returns `Ok(false)` if the match was skipped.
    fn try_fold(
        &self,
        list: &mut InstructionList,
        ctx: &mut MethodContext<'_>,
        found: &ComparisonMatch,
    ) -> Result<bool> {
        let (left, _) = operand_value(list, &ctx.pool, found.left)?;
        let (right, _) = operand_value(list, &ctx.pool, found.right)?;

        let selected = if Self::branch_taken(list, found, left, right)? {
            found.target_push
        } else {
            found.fallthrough_push
        };
        let result = list
            .get(selected)
            .cloned()
            .ok_or(Error::InvalidHandle(selected))?;

        let first_deleted = list
            .next(found.left)
            .ok_or(Error::InvalidHandle(found.left))?;
        let deleted = list.range(first_deleted, found.target_push)?;
        if let Some((target, targeter)) = list.external_targeter(&deleted) {
            ctx.skip(
                self.name(),
                found.left,
                &format!("{target} is targeted by {targeter}"),
            );
            return Ok(false);
        }

        let shape = [found.compare, Some(found.branch)]
            .into_iter()
            .flatten()
            .filter_map(|handle| list.get(handle))
            .map(Instruction::mnemonic)
            .collect::<Vec<_>>()
            .join(" ");

        list.set(found.left, result.clone())?;
        list.delete_range(first_deleted, found.target_push)?;

        log::debug!("{}: {} {} {} -> {}", ctx.method, shape, left, right, result);
        ctx.record(EventKind::ComparisonFolded, found.left)
            .pass(self.name())
            .message(format!("{shape} {left} {right} -> {result}"));
        ctx.fold_applied();

        Ok(true)
    }
}

impl FoldPass for ComparisonFold {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn should_run(&self, list: &InstructionList) -> bool {
        list.len() >= 6
    }

    fn run_on_method(
        &self,
        list: &mut InstructionList,
        ctx: &mut MethodContext<'_>,
    ) -> Result<bool> {
        let mut from = list.head();
        while let Some(found) = find_comparison(list, from) {
            log::trace!("{}: comparison match {:?}", ctx.method, found);
            from = list.next(found.left);

            match self.try_fold(list, ctx, &found) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(error) if error.is_recoverable() => {
                    ctx.skip(self.name(), found.left, &error.to_string());
                }
                Err(error) => return Err(error),
            }
        }

        Ok(false)
    }

    fn description(&self) -> &'static str {
        "Replaces comparisons between constants with the constant they select"
    }
}
