//! Arithmetic folding.
//!
//! Replaces `operand operand operator` sequences whose operands resolve to literals with a
//! single constant pool load of the result:
//!
//! ```text
//! iconst_2                ldc #n   // int 5
//! iconst_3        =>
//! iadd
//! ```
//!
//! The left operand is rewritten in place, so branches to it stay valid. Everything after
//! it up to and including the operator is deleted; trailing `invokevirtual`s and the
//! `iinc`/`goto` tail of a loop are left alone.

use crate::{
    assembly::{Instruction, InstructionHandle, InstructionList, NumericValue, TypeTag},
    optimizer::{
        find_arithmetic,
        numeric::{convert, fold_arithmetic, result_type},
        operand_value, ArithmeticMatch, EventKind, FoldPass, MethodContext,
    },
    Error, Result,
};

/// Folds arithmetic on literal operands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticFold;

impl ArithmeticFold {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Value and type of one operand, after its optional conversion.
    fn operand(
        list: &InstructionList,
        ctx: &MethodContext<'_>,
        operand: InstructionHandle,
        conversion: Option<InstructionHandle>,
    ) -> Result<(NumericValue, TypeTag)> {
        let (value, ty) = operand_value(list, &ctx.pool, operand)?;
        match conversion.and_then(|handle| list.get(handle)) {
            Some(Instruction::Convert { to, .. }) => Ok((convert(value, *to), *to)),
            _ => Ok((value, ty)),
        }
    }

    /// Tries to fold one match. Returns `Ok(false)` if the match was skipped.
    fn try_fold(
        &self,
        list: &mut InstructionList,
        ctx: &mut MethodContext<'_>,
        found: &ArithmeticMatch,
    ) -> Result<bool> {
        let (left, left_ty) = Self::operand(list, ctx, found.left, found.left_convert)?;
        let (right, right_ty) = Self::operand(list, ctx, found.right, found.right_convert)?;

        if let Some((_, jump)) = found.loop_tail {
            if let Some(Instruction::Goto { target }) = list.get(jump) {
                if *target != found.left && *target != found.right {
                    ctx.skip(self.name(), found.left, "loop increment follows the operation");
                    return Ok(false);
                }
            }
        }

        let Some(Instruction::Arithmetic { op, .. }) = list.get(found.operator).cloned() else {
            return Err(Error::InvalidOperand(format!(
                "{} is not an arithmetic instruction",
                found.operator
            )));
        };

        let ty = result_type(left_ty, right_ty);
        let Some(folded) = fold_arithmetic(op, left, right, ty)? else {
            ctx.skip(self.name(), found.left, "integer division by zero");
            return Ok(false);
        };

        let first_deleted = list
            .next(found.left)
            .ok_or(Error::InvalidHandle(found.left))?;
        let deleted = list.range(first_deleted, found.operator)?;
        if let Some((target, targeter)) = list.external_targeter(&deleted) {
            ctx.skip(
                self.name(),
                found.left,
                &format!("{target} is targeted by {targeter}"),
            );
            return Ok(false);
        }

        let index = ctx.pool.add_numeric(folded)?;
        list.set(
            found.left,
            Instruction::PoolLoad {
                index,
                wide: ty.is_wide(),
            },
        )?;
        list.delete_range(first_deleted, found.operator)?;

        log::debug!(
            "{}: {}{} {} {} -> {} (#{})",
            ctx.method,
            ty.prefix(),
            op.name(),
            left,
            right,
            folded,
            index
        );
        ctx.record(EventKind::ConstantFolded, found.left)
            .pass(self.name())
            .message(format!("{}{} {} {} -> {}", ty.prefix(), op.name(), left, right, folded));
        ctx.fold_applied();

        Ok(true)
    }
}

impl FoldPass for ArithmeticFold {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn should_run(&self, list: &InstructionList) -> bool {
        list.len() >= 3
    }

    fn run_on_method(
        &self,
        list: &mut InstructionList,
        ctx: &mut MethodContext<'_>,
    ) -> Result<bool> {
        let mut from = list.head();
        while let Some(found) = find_arithmetic(list, from) {
            log::trace!("{}: arithmetic match {:?}", ctx.method, found);
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
        "Replaces arithmetic on constant operands with a constant pool load of the result"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{ArithmeticOp, Condition, Relation},
        metadata::ConstantPool,
        optimizer::EventLog,
    };

    fn run(list: &mut InstructionList, pool: ConstantPool) -> (bool, ConstantPool, EventLog) {
        list.recompute_positions().unwrap();
        let events = EventLog::new();
        let mut ctx = MethodContext::new(list, pool, &events, "test()V");
        let changed = ArithmeticFold::new().run_on_method(list, &mut ctx).unwrap();
        let pool = ctx.pool;
        (changed, pool, events)
    }

    fn arithmetic(op: ArithmeticOp, ty: TypeTag) -> Instruction {
        Instruction::Arithmetic { op, ty }
    }

    #[test]
    fn test_fold_int_add() {
        let mut list = InstructionList::new();
        let left = list.append(Instruction::int_const(2));
        list.append(Instruction::int_const(3));
        list.append(arithmetic(ArithmeticOp::Add, TypeTag::Int));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });

        let (changed, pool, events) = run(&mut list, ConstantPool::new());
        assert!(changed);
        assert_eq!(list.len(), 2);

        let Some(Instruction::PoolLoad { index, wide: false }) = list.get(left) else {
            panic!("left operand was not rewritten");
        };
        assert_eq!(pool.numeric(*index).unwrap(), NumericValue::I32(5));
        assert_eq!(events.count_kind(EventKind::ConstantFolded), 1);
        assert_eq!(events.iter().next().unwrap().location, Some(0));
    }

    #[test]
    fn test_fold_promotes_to_double() {
        let mut pool = ConstantPool::new();
        let two = pool.add_double(2.0).unwrap();

        let mut list = InstructionList::new();
        let left = list.append(Instruction::PoolLoad { index: two, wide: true });
        list.append(Instruction::int_const(3));
        list.append(Instruction::Convert { from: TypeTag::Int, to: TypeTag::Double });
        list.append(arithmetic(ArithmeticOp::Add, TypeTag::Double));

        let (changed, pool, _) = run(&mut list, pool);
        assert!(changed);
        assert_eq!(list.len(), 1);

        let Some(Instruction::PoolLoad { index, wide: true }) = list.get(left) else {
            panic!("expected ldc2_w");
        };
        assert_eq!(pool.numeric(*index).unwrap(), NumericValue::F64(5.0));
    }

    #[test]
    fn test_fold_through_local() {
        let mut list = InstructionList::new();
        list.append(Instruction::ConstPush { value: NumericValue::I32(100), ty: TypeTag::Byte });
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        let left = list.append(Instruction::ConstPush { value: NumericValue::I64(1), ty: TypeTag::Long });
        list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });
        list.append(arithmetic(ArithmeticOp::Shl, TypeTag::Long));

        let (changed, pool, _) = run(&mut list, ConstantPool::new());
        assert!(changed);
        assert_eq!(list.len(), 3);

        let Some(Instruction::PoolLoad { index, wide: true }) = list.get(left) else {
            panic!("expected ldc2_w");
        };
        // Shift distances are masked to 6 bits for long
        assert_eq!(pool.numeric(*index).unwrap(), NumericValue::I64(1 << 36));
    }

    #[test]
    fn test_unresolved_load_is_skipped() {
        let mut list = InstructionList::new();
        let param = list.append(Instruction::Load { slot: 0, ty: TypeTag::Int });
        list.append(Instruction::int_const(1));
        list.append(arithmetic(ArithmeticOp::Add, TypeTag::Int));
        list.append(Instruction::int_const(4));
        list.append(Instruction::int_const(5));
        list.append(arithmetic(ArithmeticOp::Mul, TypeTag::Int));

        let (changed, pool, events) = run(&mut list, ConstantPool::new());
        assert!(changed);
        assert_eq!(list.len(), 4);
        assert!(matches!(list.get(param), Some(Instruction::Load { slot: 0, .. })));
        assert!(pool.iter().any(|(_, entry)| entry.numeric_value() == Some(NumericValue::I32(20))));
        assert_eq!(events.count_kind(EventKind::FoldSkipped), 1);
    }

    #[test]
    fn test_loop_guard() {
        let mut list = InstructionList::new();
        let header = list.append(Instruction::Load { slot: 2, ty: TypeTag::Int });
        list.append(Instruction::int_const(2));
        list.append(Instruction::int_const(3));
        list.append(arithmetic(ArithmeticOp::Add, TypeTag::Int));
        list.append(Instruction::IncrementLocal { slot: 1, amount: 1 });
        list.append(Instruction::Goto { target: header });

        let before = list.clone();
        let (changed, _, events) = run(&mut list, ConstantPool::new());
        assert!(!changed);
        assert_eq!(list.len(), before.len());
        assert_eq!(events.count_kind(EventKind::FoldSkipped), 1);
    }

    #[test]
    fn test_division_by_zero_is_kept() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        list.append(Instruction::int_const(0));
        list.append(arithmetic(ArithmeticOp::Div, TypeTag::Int));

        let (changed, pool, _) = run(&mut list, ConstantPool::new());
        assert!(!changed);
        assert_eq!(list.len(), 3);
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn test_targeted_operand_is_skipped() {
        let mut list = InstructionList::new();
        let branch = list.append(Instruction::nop());
        list.append(Instruction::int_const(1));
        let right = list.append(Instruction::int_const(2));
        list.append(arithmetic(ArithmeticOp::Sub, TypeTag::Int));
        list.set(
            branch,
            Instruction::If { condition: Condition::Zero(Relation::Eq), target: right },
        )
        .unwrap();

        let (changed, _, events) = run(&mut list, ConstantPool::new());
        assert!(!changed);
        assert_eq!(list.len(), 4);
        assert!(events
            .filter_kind(EventKind::FoldSkipped)
            .any(|e| e.message.contains("targeted")));
    }

    #[test]
    fn test_bitwise_on_float_aborts() {
        let mut list = InstructionList::new();
        list.append(Instruction::ConstPush { value: NumericValue::F32(1.0), ty: TypeTag::Float });
        list.append(Instruction::ConstPush { value: NumericValue::F32(2.0), ty: TypeTag::Float });
        list.append(arithmetic(ArithmeticOp::Or, TypeTag::Float));
        list.recompute_positions().unwrap();

        let events = EventLog::new();
        let mut ctx = MethodContext::new(&list, ConstantPool::new(), &events, "bad()F");
        let err = ArithmeticFold::new().run_on_method(&mut list, &mut ctx).unwrap_err();
        assert!(err.is_method_local());
    }
}
