//! Backward value resolution for local variable loads.
//!
//! A load can only be folded when the value it reads is a literal that reached the
//! variable on the straight-line path in front of it. [`resolve_load_value`] walks back
//! from the load to the store that defines the variable and reads the literal pushed right
//! before that store.
//!
//! The walk gives up, with [`crate::Error::UnresolvedLoad`], as soon as the value could have
//! come from anywhere else:
//! - the walk reaches the start of the method (the variable is a parameter)
//! - an `iinc` or an overlapping wide store modifies the variable after the store
//! - an instruction from the store through the load is a branch or handler target
//! - the store is not fed by a constant push or a numeric `ldc`
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{Instruction, InstructionList, NumericValue, TypeTag};
//! use classfold::metadata::ConstantPool;
//! use classfold::optimizer::resolve_load_value;
//!
//! let mut list = InstructionList::new();
//! list.append(Instruction::int_const(4));
//! list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
//! let load = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });
//!
//! let (value, ty) = resolve_load_value(&list, &ConstantPool::new(), load)?;
//! assert_eq!(value, NumericValue::I32(4));
//! assert_eq!(ty, TypeTag::Int);
//! # Ok::<(), classfold::Error>(())
//! ```

use std::collections::HashSet;

use crate::{
    assembly::{Instruction, InstructionHandle, InstructionList, NumericValue, TypeTag},
    metadata::ConstantPool,
    Error, Result,
};

/// Literal value and type of the constant feeding the load at `handle`.
///
/// The type is the declared type of the push (`Byte` for `bipush`, `Short` for `sipush`) or
/// the natural type of the constant pool entry.
///
/// # Errors
///
/// - [`crate::Error::InvalidHandle`] if `handle` is not live
/// - [`crate::Error::InvalidOperand`] if `handle` is not a load
/// - [`crate::Error::UnresolvedLoad`] if the value is not a literal on every path
/// - [`crate::Error::NonNumericConstant`] if the store is fed by `ldc` of a non-number
pub fn resolve_load_value(
    list: &InstructionList,
    pool: &ConstantPool,
    handle: InstructionHandle,
) -> Result<(NumericValue, TypeTag)> {
    let store = find_defining_store(list, handle)?;
    let slot = load_slot(list, handle)?;

    let source = list
        .prev(store)
        .ok_or(Error::UnresolvedLoad { slot })?;

    match list.get(source) {
        Some(Instruction::ConstPush { value, ty }) => Ok((*value, *ty)),
        Some(Instruction::PoolLoad { index, .. }) => {
            let value = pool.numeric(*index)?;
            Ok((value, value.natural_type()))
        }
        _ => Err(Error::UnresolvedLoad { slot }),
    }
}

/// Type of the constant feeding the load at `handle`.
///
/// Used for type promotion when only the operand type matters.
///
/// # Errors
///
/// See [`resolve_load_value`].
pub fn resolve_load_signature(
    list: &InstructionList,
    pool: &ConstantPool,
    handle: InstructionHandle,
) -> Result<TypeTag> {
    resolve_load_value(list, pool, handle).map(|(_, ty)| ty)
}

/// Literal value and type an operand instruction puts on the stack.
///
/// Loads go through [`resolve_load_value`]; constant pushes and constant pool loads carry
/// their value directly.
///
/// # Errors
///
/// See [`resolve_load_value`]. Any other instruction gives [`crate::Error::InvalidOperand`].
pub fn operand_value(
    list: &InstructionList,
    pool: &ConstantPool,
    handle: InstructionHandle,
) -> Result<(NumericValue, TypeTag)> {
    match list.get(handle) {
        Some(Instruction::Load { .. }) => resolve_load_value(list, pool, handle),
        Some(Instruction::ConstPush { value, ty }) => Ok((*value, *ty)),
        Some(Instruction::PoolLoad { index, .. }) => {
            let value = pool.numeric(*index)?;
            Ok((value, value.natural_type()))
        }
        Some(other) => Err(Error::InvalidOperand(format!("{other} at {handle} is not an operand"))),
        None => Err(Error::InvalidHandle(handle)),
    }
}

fn load_slot(list: &InstructionList, handle: InstructionHandle) -> Result<u16> {
    match list.get(handle) {
        Some(Instruction::Load { slot, .. }) => Ok(*slot),
        Some(other) => Err(Error::InvalidOperand(format!(
            "{other} at {handle} is not a local variable load"
        ))),
        None => Err(Error::InvalidHandle(handle)),
    }
}

/// Walks back from the load at `handle` to the store of the same slot.
fn find_defining_store(
    list: &InstructionList,
    handle: InstructionHandle,
) -> Result<InstructionHandle> {
    let slot = load_slot(list, handle)?;
    let merge_points = merge_points(list);

    let mut cursor = handle;
    loop {
        if merge_points.contains(&cursor) {
            log::trace!("load of local {} at {}: {} is a merge point", slot, handle, cursor);
            return Err(Error::UnresolvedLoad { slot });
        }

        cursor = list.prev(cursor).ok_or(Error::UnresolvedLoad { slot })?;
        match list.get(cursor) {
            Some(Instruction::Store { slot: stored, ty }) => {
                if *stored == slot {
                    if merge_points.contains(&cursor) {
                        return Err(Error::UnresolvedLoad { slot });
                    }
                    return Ok(cursor);
                }
                // A long or double store at slot - 1 also overwrites slot
                if u32::from(*stored) + u32::from(ty.slots()) > u32::from(slot)
                    && *stored < slot
                {
                    return Err(Error::UnresolvedLoad { slot });
                }
            }
            Some(Instruction::IncrementLocal { slot: incremented, .. }) if *incremented == slot => {
                return Err(Error::UnresolvedLoad { slot });
            }
            _ => {}
        }
    }
}

/// Every instruction control can reach other than by falling through.
///
/// The instruction after a `jsr` counts too: `ret` comes back to it once the subroutine
/// has run, possibly storing to any local.
fn merge_points(list: &InstructionList) -> HashSet<InstructionHandle> {
    let returns = list
        .iter()
        .filter(|(_, instruction)| matches!(instruction, Instruction::Jsr { .. }))
        .filter_map(|(handle, _)| list.next(handle));

    list.iter()
        .flat_map(|(_, instruction)| instruction.targets())
        .chain(list.exception_handlers().iter().map(|entry| entry.handler))
        .chain(returns)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{ArithmeticOp, Condition, Relation};

    fn store_and_load(push: Instruction, ty: TypeTag) -> (InstructionList, InstructionHandle) {
        let mut list = InstructionList::new();
        list.append(push);
        list.append(Instruction::Store { slot: 2, ty });
        let load = list.append(Instruction::Load { slot: 2, ty });
        (list, load)
    }

    #[test]
    fn test_const_push() {
        let (list, load) = store_and_load(
            Instruction::ConstPush {
                value: NumericValue::I32(-7),
                ty: TypeTag::Byte,
            },
            TypeTag::Int,
        );

        let pool = ConstantPool::new();
        assert_eq!(
            resolve_load_value(&list, &pool, load).unwrap(),
            (NumericValue::I32(-7), TypeTag::Byte)
        );
        assert_eq!(resolve_load_signature(&list, &pool, load).unwrap(), TypeTag::Byte);
    }

    #[test]
    fn test_pool_load() {
        let mut pool = ConstantPool::new();
        let index = pool.add_double(2.5).unwrap();
        let (list, load) = store_and_load(Instruction::PoolLoad { index, wide: true }, TypeTag::Double);

        assert_eq!(
            resolve_load_value(&list, &pool, load).unwrap(),
            (NumericValue::F64(2.5), TypeTag::Double)
        );
    }

    #[test]
    fn test_non_numeric_pool_entry() {
        let mut pool = ConstantPool::new();
        let index = pool.add_string("text").unwrap();
        let (list, load) =
            store_and_load(Instruction::PoolLoad { index, wide: false }, TypeTag::Reference);

        let err = resolve_load_value(&list, &pool, load).unwrap_err();
        assert_eq!(err, Error::NonNumericConstant { index });
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parameter_is_unresolved() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        let load = list.append(Instruction::Load { slot: 0, ty: TypeTag::Int });

        assert_eq!(
            resolve_load_value(&list, &ConstantPool::new(), load),
            Err(Error::UnresolvedLoad { slot: 0 })
        );
    }

    #[test]
    fn test_computed_value_is_unresolved() {
        let mut list = InstructionList::new();
        list.append(Instruction::Load { slot: 0, ty: TypeTag::Int });
        list.append(Instruction::int_const(1));
        list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        let load = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });

        assert_eq!(
            resolve_load_value(&list, &ConstantPool::new(), load),
            Err(Error::UnresolvedLoad { slot: 1 })
        );
    }

    #[test]
    fn test_latest_store_wins() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        list.append(Instruction::int_const(5));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        list.append(Instruction::int_const(3));
        list.append(Instruction::Store { slot: 2, ty: TypeTag::Int });
        let load = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });

        let (value, _) = resolve_load_value(&list, &ConstantPool::new(), load).unwrap();
        assert_eq!(value, NumericValue::I32(5));
    }

    #[test]
    fn test_increment_blocks_resolution() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        list.append(Instruction::IncrementLocal { slot: 1, amount: 1 });
        let load = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });

        assert_eq!(
            resolve_load_value(&list, &ConstantPool::new(), load),
            Err(Error::UnresolvedLoad { slot: 1 })
        );
    }

    #[test]
    fn test_overlapping_wide_store_blocks_resolution() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        list.append(Instruction::Store { slot: 2, ty: TypeTag::Int });
        list.append(Instruction::Load { slot: 4, ty: TypeTag::Long });
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Long });
        let load = list.append(Instruction::Load { slot: 2, ty: TypeTag::Int });

        assert_eq!(
            resolve_load_value(&list, &ConstantPool::new(), load),
            Err(Error::UnresolvedLoad { slot: 2 })
        );
    }

    #[test]
    fn test_branch_target_blocks_resolution() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        let header = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });
        list.append(Instruction::If {
            condition: Condition::Zero(Relation::Eq),
            target: header,
        });

        assert_eq!(
            resolve_load_value(&list, &ConstantPool::new(), header),
            Err(Error::UnresolvedLoad { slot: 1 })
        );
    }

    #[test]
    fn test_subroutine_return_blocks_resolution() {
        let mut list = InstructionList::new();
        list.append(Instruction::int_const(1));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        let call = list.append(Instruction::nop());
        let load = list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });
        list.append(Instruction::int_const(2));
        list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });
        list.append(Instruction::nop());
        // subroutine: stores 5 into local 1 before returning
        let subroutine = list.append(Instruction::Store { slot: 2, ty: TypeTag::Reference });
        list.append(Instruction::int_const(5));
        list.append(Instruction::Store { slot: 1, ty: TypeTag::Int });
        list.set(call, Instruction::Jsr { target: subroutine }).unwrap();

        assert_eq!(
            resolve_load_value(&list, &ConstantPool::new(), load),
            Err(Error::UnresolvedLoad { slot: 1 })
        );
    }

    #[test]
    fn test_operand_values() {
        let mut pool = ConstantPool::new();
        let index = pool.add_float(0.5).unwrap();

        let mut list = InstructionList::new();
        let push = list.append(Instruction::ConstPush {
            value: NumericValue::I32(300),
            ty: TypeTag::Short,
        });
        let ldc = list.append(Instruction::PoolLoad { index, wide: false });
        let add = list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Float });

        assert_eq!(
            operand_value(&list, &pool, push).unwrap(),
            (NumericValue::I32(300), TypeTag::Short)
        );
        assert_eq!(
            operand_value(&list, &pool, ldc).unwrap(),
            (NumericValue::F32(0.5), TypeTag::Float)
        );
        assert!(matches!(
            operand_value(&list, &pool, add),
            Err(Error::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_not_a_load() {
        let mut list = InstructionList::new();
        let push = list.append(Instruction::int_const(1));

        assert!(matches!(
            resolve_load_value(&list, &ConstantPool::new(), push),
            Err(Error::InvalidOperand(_))
        ));
    }
}
