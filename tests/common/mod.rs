//! Shared helpers for the integration tests.
#![allow(dead_code)]

use classfold::prelude::*;

/// A static method with room for 4 stack and 4 local slots.
pub fn static_method(name: &str, descriptor: &str, code: Vec<u8>) -> Method {
    Method::new(name, descriptor, MethodAccessFlags::STATIC).with_code(Code::new(4, 4, code))
}

/// A class named `test/Sample` with `pool` and `methods`.
pub fn class_of(pool: ConstantPool, methods: Vec<Method>) -> ClassModel {
    let mut class = ClassModel::new("test/Sample");
    class.constant_pool = pool;
    class.methods = methods;
    class
}

/// The code array of the method named `name`.
pub fn code_of<'a>(class: &'a ClassModel, name: &str) -> &'a [u8] {
    class
        .find_method(name)
        .and_then(|method| method.code.as_ref())
        .map(|code| code.code.as_slice())
        .unwrap_or_else(|| panic!("method {name} has no code"))
}

/// The `Code` attribute of the method named `name`.
pub fn attribute_of<'a>(class: &'a ClassModel, name: &str) -> &'a Code {
    class
        .find_method(name)
        .and_then(|method| method.code.as_ref())
        .unwrap_or_else(|| panic!("method {name} has no code"))
}

/// Optimizes `class` with the default configuration and returns the optimizer for
/// inspection of its events.
pub fn optimize(class: &ClassModel) -> (ClassModel, Optimizer) {
    let optimizer = Optimizer::default();
    let optimized = optimizer
        .optimize_class(class)
        .expect("optimization failed");
    (optimized, optimizer)
}

/// `<push left> <push right> <branch> +7; iconst_1; goto +4; iconst_0; ireturn`
///
/// `pushes` must encode both operands; `branch` is a two-operand or zero-testing branch
/// opcode. The branch is taken to the `iconst_0`.
pub fn materialized(pushes: &[u8], branch: u8) -> Vec<u8> {
    let mut code = pushes.to_vec();
    code.extend_from_slice(&[branch, 0x00, 0x07, 0x04, 0xA7, 0x00, 0x04, 0x03, 0xAC]);
    code
}
