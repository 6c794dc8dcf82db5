//! Operand stack and local variable bookkeeping.
//!
//! After the optimizer rewrites a method, its `max_stack` and `max_locals` no longer match
//! the code. [`max_stack`] recomputes the first with a worklist over the control flow graph,
//! [`max_locals`] the second from the highest slot any instruction touches.
//!
//! Depths are counted in slots, as `max_stack` is: `long` and `double` take two.
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{max_stack, ArithmeticOp, Instruction, InstructionList, TypeTag};
//! use classfold::metadata::ConstantPool;
//!
//! let mut list = InstructionList::new();
//! list.append(Instruction::Load { slot: 0, ty: TypeTag::Double });
//! list.append(Instruction::Load { slot: 2, ty: TypeTag::Double });
//! list.append(Instruction::Arithmetic { op: ArithmeticOp::Mul, ty: TypeTag::Double });
//!
//! assert_eq!(max_stack(&list, &ConstantPool::new())?, 4);
//! # Ok::<(), classfold::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{Instruction, InstructionHandle, InstructionList, StackBehavior},
    metadata::{ConstantPool, MethodDescriptor},
    Error, Result,
};

/// Stack effect of `instruction`, resolving `invokevirtual` through the constant pool.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the method reference of an `invokevirtual` is
/// missing or its descriptor is invalid.
pub fn stack_behavior(instruction: &Instruction, pool: &ConstantPool) -> Result<StackBehavior> {
    if let Some(behavior) = instruction.fixed_stack_behavior() {
        return Ok(behavior);
    }

    match instruction {
        Instruction::InvokeVirtual { index } => {
            let descriptor = MethodDescriptor::parse(pool.member_descriptor(*index)?)?;
            Ok(StackBehavior::new(
                1 + descriptor.parameter_slots(),
                descriptor.return_slots(),
            ))
        }
        other => Err(Error::InvalidOperand(format!(
            "no stack behavior known for {other}"
        ))),
    }
}

/// Maximum operand stack depth reached on any path through `list`.
///
/// Every reachable instruction is visited once, with the depth it is first reached at.
/// Exception handlers start with the thrown reference on the stack. `jsr` enters its
/// subroutine with the return address pushed and resumes after itself with the depth it had
/// before; `ret` has no successors.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if an instruction would pop more than the stack
/// holds or the depth exceeds 65535 slots, and the errors of [`stack_behavior`].
pub fn max_stack(list: &InstructionList, pool: &ConstantPool) -> Result<u16> {
    let mut visited: HashMap<InstructionHandle, i64> = HashMap::new();
    let mut worklist: Vec<(InstructionHandle, i64)> = Vec::new();

    if let Some(head) = list.head() {
        worklist.push((head, 0));
    }
    for entry in list.exception_handlers() {
        worklist.push((entry.handler, 1));
    }

    let mut max = 0_i64;
    while let Some((handle, depth)) = worklist.pop() {
        if visited.contains_key(&handle) {
            continue;
        }
        visited.insert(handle, depth);
        max = max.max(depth);

        let instruction = list.get(handle).ok_or(Error::InvalidHandle(handle))?;
        let behavior = stack_behavior(instruction, pool)?;
        if depth < i64::from(behavior.pops) {
            return Err(malformed_error!(
                "Stack underflow at {} ({}): depth {} but pops {}",
                handle,
                instruction,
                depth,
                behavior.pops
            ));
        }

        let after = depth + i64::from(behavior.net_effect);
        max = max.max(after);

        match instruction {
            Instruction::Jsr { target } => {
                worklist.push((*target, after));
                if let Some(next) = list.next(handle) {
                    worklist.push((next, depth));
                }
            }
            _ => {
                for target in instruction.targets() {
                    worklist.push((target, after));
                }
                if instruction.falls_through() {
                    if let Some(next) = list.next(handle) {
                        worklist.push((next, after));
                    }
                }
            }
        }
    }

    u16::try_from(max).map_err(|_| malformed_error!("Operand stack depth {} exceeds 65535", max))
}

/// Number of local variable slots `list` needs.
///
/// `argument_slots` covers the parameters and `this`; see
/// [`crate::metadata::Method::argument_slots`].
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a two-slot access at slot 65535 would need more
/// slots than a method can have.
pub fn max_locals(list: &InstructionList, argument_slots: u16) -> Result<u16> {
    let touched = list
        .iter()
        .filter_map(|(_, instruction)| instruction.local_slot())
        .map(|(slot, size)| u32::from(slot) + u32::from(size))
        .max()
        .unwrap_or(0);

    let locals = touched.max(u32::from(argument_slots));
    u16::try_from(locals).map_err(|_| malformed_error!("Method needs {} local slots", locals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{
        opcodes, ArithmeticOp, CompareKind, Condition, ExceptionHandler, FlowType,
        OpaqueInstruction, Relation, TypeTag,
    };

    fn opaque(opcode: u8) -> Instruction {
        Instruction::Other(OpaqueInstruction::simple(opcode).unwrap())
    }

    #[test]
    fn test_straight_line() {
        let mut list = InstructionList::new();
        list.append(Instruction::Load { slot: 0, ty: TypeTag::Long });
        list.append(Instruction::Load { slot: 2, ty: TypeTag::Long });
        list.append(Instruction::Compare(CompareKind::Lcmp));
        list.append(opaque(opcodes::IRETURN));

        assert_eq!(max_stack(&list, &ConstantPool::new()).unwrap(), 4);
        assert_eq!(max_locals(&list, 0).unwrap(), 4);
        assert_eq!(max_locals(&list, 6).unwrap(), 6);
    }

    #[test]
    fn test_branches_take_the_deepest_path() {
        let mut list = InstructionList::new();
        list.append(Instruction::Load { slot: 0, ty: TypeTag::Int });
        let branch = list.append(Instruction::nop());
        list.append(Instruction::int_const(0));
        list.append(opaque(opcodes::IRETURN));
        let deep = list.append(Instruction::int_const(1));
        list.append(Instruction::int_const(2));
        list.append(Instruction::int_const(3));
        list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });
        list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });
        list.append(opaque(opcodes::IRETURN));
        list.set(
            branch,
            Instruction::If {
                condition: Condition::Zero(Relation::Ne),
                target: deep,
            },
        )
        .unwrap();

        assert_eq!(max_stack(&list, &ConstantPool::new()).unwrap(), 3);
        assert_eq!(max_locals(&list, 0).unwrap(), 1);
    }

    #[test]
    fn test_exception_handler_starts_at_one() {
        let mut list = InstructionList::new();
        let start = list.append(Instruction::nop());
        list.append(opaque(opcodes::RETURN));
        let handler = list.append(Instruction::Store { slot: 1, ty: TypeTag::Reference });
        list.append(opaque(opcodes::RETURN));
        list.add_exception_handler(ExceptionHandler {
            start,
            end: Some(handler),
            handler,
            catch_type: 0,
        })
        .unwrap();

        assert_eq!(max_stack(&list, &ConstantPool::new()).unwrap(), 1);
        assert_eq!(max_locals(&list, 1).unwrap(), 2);
    }

    #[test]
    fn test_subroutines() {
        let mut list = InstructionList::new();
        let jsr = list.append(Instruction::nop());
        list.append(opaque(opcodes::RETURN));
        let sub = list.append(Instruction::Store { slot: 3, ty: TypeTag::Reference });
        list.append(Instruction::Other(OpaqueInstruction {
            opcode: opcodes::RET,
            wide: false,
            operands: vec![3],
            stack: StackBehavior::default(),
            flow: FlowType::SubroutineReturn,
        }));
        list.set(jsr, Instruction::Jsr { target: sub }).unwrap();

        assert_eq!(max_stack(&list, &ConstantPool::new()).unwrap(), 1);
        assert_eq!(max_locals(&list, 0).unwrap(), 4);
    }

    #[test]
    fn test_invokevirtual_uses_descriptor() {
        let mut pool = ConstantPool::new();
        let index = pool.add_method_ref("demo/Box", "scale", "(DI)J").unwrap();

        let mut list = InstructionList::new();
        list.append(Instruction::Load { slot: 0, ty: TypeTag::Reference });
        list.append(Instruction::Load { slot: 1, ty: TypeTag::Double });
        list.append(Instruction::int_const(2));
        list.append(Instruction::InvokeVirtual { index });
        list.append(opaque(opcodes::LRETURN));

        assert_eq!(
            stack_behavior(&Instruction::InvokeVirtual { index }, &pool).unwrap(),
            StackBehavior::new(4, 2)
        );
        assert_eq!(max_stack(&list, &pool).unwrap(), 4);
        assert_eq!(max_locals(&list, 0).unwrap(), 3);
    }

    #[test]
    fn test_underflow_is_malformed() {
        let mut list = InstructionList::new();
        list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });

        assert!(matches!(
            max_stack(&list, &ConstantPool::new()),
            Err(Error::Malformed { .. })
        ));
    }
}
