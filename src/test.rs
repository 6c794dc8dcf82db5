//! Builders shared by the unit tests.

use crate::{
    assembly::{Condition, Instruction, InstructionHandle, InstructionList, TypeTag},
    metadata::{ClassModel, Code, Method, MethodAccessFlags},
};

/// A static method with the given body and no exception handlers.
pub fn static_method(
    name: &str,
    descriptor: &str,
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
) -> Method {
    Method::new(name, descriptor, MethodAccessFlags::STATIC)
        .with_code(Code::new(max_stack, max_locals, code))
}

/// A class named `test/Folds` holding `methods`.
pub fn class_with(methods: Vec<Method>) -> ClassModel {
    let mut class = ClassModel::new("test/Folds");
    class.methods = methods;
    class
}

/// Appends the boolean materialization `branch; iconst_1; goto after; iconst_0; after:`
/// followed by `istore 3`, and returns the handle of the `istore`.
pub fn materialize(list: &mut InstructionList, condition: Condition) -> InstructionHandle {
    let branch = list.append(Instruction::nop());
    list.append(Instruction::int_const(1));
    let jump = list.append(Instruction::nop());
    let taken = list.append(Instruction::int_const(0));
    let after = list.append(Instruction::Store {
        slot: 3,
        ty: TypeTag::Int,
    });
    list.set(branch, Instruction::If { condition, target: taken })
        .unwrap();
    list.set(jump, Instruction::Goto { target: after }).unwrap();
    after
}
