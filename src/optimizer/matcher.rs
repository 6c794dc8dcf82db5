//! Instruction shape matching.
//!
//! The folding passes look for two fixed shapes in the instruction stream. Matching is on
//! the instruction class only; whether the operands really hold constants is decided later
//! by the fold itself.
//!
//! Arithmetic:
//!
//! ```text
//! Operand Convert? Operand Convert? Arithmetic InvokeVirtual* (IncrementLocal Goto)*
//! ```
//!
//! Comparison:
//!
//! ```text
//! Operand Operand Compare? If ConstInt Goto ConstInt
//! ```
//!
//! `Operand` is a constant push, a constant pool load or a local variable load. `ConstInt`
//! is an `int` constant push. The branch must target the second `ConstInt` and the `Goto`
//! the instruction right after it. Without a `Compare` the branch must take two operands
//! (`if_icmp<rel>`, `if_acmp<rel>`), after one it must take a single operand (`if<rel>`).
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{ArithmeticOp, Instruction, InstructionList, TypeTag};
//! use classfold::optimizer::find_arithmetic;
//!
//! let mut list = InstructionList::new();
//! list.append(Instruction::Load { slot: 0, ty: TypeTag::Int });
//! let left = list.append(Instruction::int_const(2));
//! list.append(Instruction::int_const(3));
//! let operator = list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });
//!
//! let found = find_arithmetic(&list, list.head()).unwrap();
//! assert_eq!(found.left, left);
//! assert_eq!(found.operator, operator);
//! ```

use crate::assembly::{Instruction, InstructionHandle, InstructionList, TypeTag};

/// An occurrence of the arithmetic shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticMatch {
    /// Left operand
    pub left: InstructionHandle,
    /// Conversion applied to the left operand
    pub left_convert: Option<InstructionHandle>,
    /// Right operand
    pub right: InstructionHandle,
    /// Conversion applied to the right operand
    pub right_convert: Option<InstructionHandle>,
    /// The arithmetic instruction
    pub operator: InstructionHandle,
    /// The last `iinc`/`goto` pair of the match, if any
    pub loop_tail: Option<(InstructionHandle, InstructionHandle)>,
    /// Last instruction of the match
    pub end: InstructionHandle,
}

/// An occurrence of the comparison shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonMatch {
    /// Left operand
    pub left: InstructionHandle,
    /// Right operand
    pub right: InstructionHandle,
    /// `lcmp`/`fcmp<op>`/`dcmp<op>` between the operands and the branch
    pub compare: Option<InstructionHandle>,
    /// The conditional branch
    pub branch: InstructionHandle,
    /// Push executed when the branch is not taken
    pub fallthrough_push: InstructionHandle,
    /// `goto` over the other push
    pub jump: InstructionHandle,
    /// Push the branch jumps to; last instruction of the match
    pub target_push: InstructionHandle,
}

/// Returns `true` for instructions that can start or continue a match as a value.
#[must_use]
pub fn is_operand(instruction: &Instruction) -> bool {
    matches!(
        instruction,
        Instruction::ConstPush { .. } | Instruction::PoolLoad { .. } | Instruction::Load { .. }
    )
}

fn is_int_const(instruction: &Instruction) -> bool {
    matches!(
        instruction,
        Instruction::ConstPush {
            ty: TypeTag::Int,
            ..
        }
    )
}

/// Cursor over the stream that consumes instructions by class.
struct Cursor<'a> {
    list: &'a InstructionList,
    at: Option<InstructionHandle>,
}

impl<'a> Cursor<'a> {
    fn new(list: &'a InstructionList, at: InstructionHandle) -> Self {
        Self { list, at: Some(at) }
    }

    /// Consumes the current instruction if `accept` holds for it.
    fn take(&mut self, accept: impl Fn(&Instruction) -> bool) -> Option<InstructionHandle> {
        let handle = self.at?;
        if !accept(self.list.get(handle)?) {
            return None;
        }
        self.at = self.list.next(handle);
        Some(handle)
    }
}

/// Matches the arithmetic shape starting exactly at `start`.
#[must_use]
pub fn match_arithmetic_at(
    list: &InstructionList,
    start: InstructionHandle,
) -> Option<ArithmeticMatch> {
    let mut cursor = Cursor::new(list, start);

    let left = cursor.take(is_operand)?;
    let left_convert = cursor.take(|i| matches!(i, Instruction::Convert { .. }));
    let right = cursor.take(is_operand)?;
    let right_convert = cursor.take(|i| matches!(i, Instruction::Convert { .. }));
    let operator = cursor.take(|i| matches!(i, Instruction::Arithmetic { .. }))?;

    let mut end = operator;
    while let Some(invoke) = cursor.take(|i| matches!(i, Instruction::InvokeVirtual { .. })) {
        end = invoke;
    }

    let mut loop_tail = None;
    while let Some(increment) = cursor.at {
        let Some(jump) = list.next(increment) else {
            break;
        };
        let is_tail = matches!(list.get(increment), Some(Instruction::IncrementLocal { .. }))
            && matches!(list.get(jump), Some(Instruction::Goto { .. }));
        if !is_tail {
            break;
        }
        loop_tail = Some((increment, jump));
        end = jump;
        cursor.at = list.next(jump);
    }

    Some(ArithmeticMatch {
        left,
        left_convert,
        right,
        right_convert,
        operator,
        loop_tail,
        end,
    })
}

/// Matches the comparison shape starting exactly at `start`.
#[must_use]
pub fn match_comparison_at(
    list: &InstructionList,
    start: InstructionHandle,
) -> Option<ComparisonMatch> {
    let mut cursor = Cursor::new(list, start);

    let left = cursor.take(is_operand)?;
    let right = cursor.take(is_operand)?;
    let compare = cursor.take(|i| matches!(i, Instruction::Compare(_)));
    let operands = if compare.is_some() { 1 } else { 2 };
    let branch = cursor.take(|i| {
        matches!(i, Instruction::If { condition, .. } if condition.operand_count() == operands)
    })?;
    let fallthrough_push = cursor.take(is_int_const)?;
    let jump = cursor.take(|i| matches!(i, Instruction::Goto { .. }))?;
    let target_push = cursor.take(is_int_const)?;

    // The branch must select between the two pushes and the goto must skip the other one
    let joins = cursor.at?;
    match (list.get(branch)?, list.get(jump)?) {
        (Instruction::If { target, .. }, Instruction::Goto { target: after })
            if *target == target_push && *after == joins => {}
        _ => return None,
    }

    Some(ComparisonMatch {
        left,
        right,
        compare,
        branch,
        fallthrough_push,
        jump,
        target_push,
    })
}

fn find<M>(
    list: &InstructionList,
    from: Option<InstructionHandle>,
    matcher: impl Fn(&InstructionList, InstructionHandle) -> Option<M>,
) -> Option<M> {
    let mut cursor = from;
    while let Some(handle) = cursor {
        if let Some(found) = matcher(list, handle) {
            return Some(found);
        }
        cursor = list.next(handle);
    }
    None
}

/// Leftmost arithmetic match starting at or after `from`.
#[must_use]
pub fn find_arithmetic(
    list: &InstructionList,
    from: Option<InstructionHandle>,
) -> Option<ArithmeticMatch> {
    find(list, from, match_arithmetic_at)
}

/// Leftmost comparison match starting at or after `from`.
#[must_use]
pub fn find_comparison(
    list: &InstructionList,
    from: Option<InstructionHandle>,
) -> Option<ComparisonMatch> {
    find(list, from, match_comparison_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{ArithmeticOp, CompareKind, Condition, NumericValue, Relation},
        test::materialize,
    };

    fn add(ty: TypeTag) -> Instruction {
        Instruction::Arithmetic { op: ArithmeticOp::Add, ty }
    }

    #[test]
    fn test_plain_arithmetic() {
        let mut list = InstructionList::new();
        let left = list.append(Instruction::int_const(2));
        let right = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });
        let operator = list.append(add(TypeTag::Int));
        list.append(Instruction::Store { slot: 2, ty: TypeTag::Int });

        let found = match_arithmetic_at(&list, left).unwrap();
        assert_eq!(found.left, left);
        assert_eq!(found.right, right);
        assert_eq!(found.operator, operator);
        assert_eq!(found.end, operator);
        assert_eq!(found.left_convert, None);
        assert_eq!(found.loop_tail, None);
        assert_eq!(match_arithmetic_at(&list, right), None);
    }

    #[test]
    fn test_converts_and_tail() {
        let mut list = InstructionList::new();
        let header = list.append(Instruction::nop());
        let left = list.append(Instruction::int_const(2));
        let left_convert = list.append(Instruction::Convert { from: TypeTag::Int, to: TypeTag::Double });
        list.append(Instruction::PoolLoad { index: 4, wide: true });
        list.append(add(TypeTag::Double));
        let invoke = list.append(Instruction::InvokeVirtual { index: 9 });
        let increment = list.append(Instruction::IncrementLocal { slot: 1, amount: 1 });
        let jump = list.append(Instruction::Goto { target: header });

        let found = find_arithmetic(&list, list.head()).unwrap();
        assert_eq!(found.left, left);
        assert_eq!(found.left_convert, Some(left_convert));
        assert_eq!(found.right_convert, None);
        assert_eq!(found.loop_tail, Some((increment, jump)));
        assert_eq!(found.end, jump);
        assert_ne!(found.end, invoke);
    }

    #[test]
    fn test_incomplete_tail_is_not_part_of_the_match() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(2));
        list.append(Instruction::int_const(3));
        let operator = list.append(add(TypeTag::Int));
        list.append(Instruction::IncrementLocal { slot: 1, amount: 1 });
        list.append(Instruction::Store { slot: 2, ty: TypeTag::Int });

        let found = find_arithmetic(&list, list.head()).unwrap();
        assert_eq!(found.end, operator);
        assert_eq!(found.loop_tail, None);
    }

    #[test]
    fn test_leftmost_match_wins() {
        let mut list = InstructionList::new();
        list.append(Instruction::Load { slot: 0, ty: TypeTag::Long });
        let first = list.append(Instruction::ConstPush { value: NumericValue::I64(1), ty: TypeTag::Long });
        list.append(Instruction::ConstPush { value: NumericValue::I64(0), ty: TypeTag::Long });
        list.append(add(TypeTag::Long));
        list.append(add(TypeTag::Long));

        let found = find_arithmetic(&list, list.head()).unwrap();
        assert_eq!(found.left, first);
        assert_eq!(find_arithmetic(&list, list.next(first)), None);
    }

    #[test]
    fn test_direct_comparison() {
        let mut list = InstructionList::new();
        let left = list.append(Instruction::int_const(5));
        list.append(Instruction::int_const(3));
        let after = materialize(&mut list, Condition::IntCompare(Relation::Lt));

        let found = find_comparison(&list, list.head()).unwrap();
        assert_eq!(found.left, left);
        assert_eq!(found.compare, None);
        assert_eq!(list.next(found.target_push), Some(after));
    }

    #[test]
    fn test_tri_state_comparison() {
        let mut list = InstructionList::new();
        list.append(Instruction::Load { slot: 1, ty: TypeTag::Long });
        list.append(Instruction::Load { slot: 3, ty: TypeTag::Long });
        let compare = list.append(Instruction::Compare(CompareKind::Lcmp));
        materialize(&mut list, Condition::Zero(Relation::Le));

        let found = find_comparison(&list, list.head()).unwrap();
        assert_eq!(found.compare, Some(compare));
    }

    #[test]
    fn test_branch_arity_must_fit_the_stack() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(5));
        list.append(Instruction::int_const(3));
        materialize(&mut list, Condition::Zero(Relation::Eq));
        assert_eq!(find_comparison(&list, list.head()), None);

        let mut list = InstructionList::new();
        list.append(Instruction::int_const(5));
        list.append(Instruction::int_const(3));
        list.append(Instruction::Compare(CompareKind::FcmpG));
        materialize(&mut list, Condition::IntCompare(Relation::Eq));
        assert_eq!(find_comparison(&list, list.head()), None);
    }

    #[test]
    fn test_comparison_branch_must_select_the_pushes() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(5));
        list.append(Instruction::int_const(3));
        let branch = list.append(Instruction::nop());
        list.append(Instruction::int_const(1));
        let jump = list.append(Instruction::nop());
        let taken = list.append(Instruction::int_const(0));
        let after = list.append(Instruction::nop());
        let elsewhere = list.append(Instruction::int_const(-1));

        // branch leaves the sequence
        list.set(branch, Instruction::If { condition: Condition::IntCompare(Relation::Ge), target: elsewhere }).unwrap();
        list.set(jump, Instruction::Goto { target: after }).unwrap();
        assert_eq!(find_comparison(&list, list.head()), None);

        // goto does not land right after the second push
        list.set(branch, Instruction::If { condition: Condition::IntCompare(Relation::Ge), target: taken }).unwrap();
        list.set(jump, Instruction::Goto { target: elsewhere }).unwrap();
        assert_eq!(find_comparison(&list, list.head()), None);

        list.set(jump, Instruction::Goto { target: after }).unwrap();
        assert!(find_comparison(&list, list.head()).is_some());
    }

    #[test]
    fn test_comparison_needs_int_pushes() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(5));
        list.append(Instruction::int_const(3));
        let branch = list.append(Instruction::nop());
        list.append(Instruction::ConstPush { value: NumericValue::I32(1), ty: TypeTag::Byte });
        let jump = list.append(Instruction::nop());
        let target = list.append(Instruction::int_const(0));
        let after = list.append(Instruction::nop());
        list.set(branch, Instruction::If { condition: Condition::IntCompare(Relation::Ge), target }).unwrap();
        list.set(jump, Instruction::Goto { target: after }).unwrap();

        assert_eq!(find_comparison(&list, list.head()), None);
    }
}
