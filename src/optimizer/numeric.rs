//! Numeric promotion and evaluation of folded operations.
//!
//! Values are evaluated the way the virtual machine would evaluate them, with one
//! exception: `add`, `sub`, `mul`, `div` and `rem` are computed on a `double` intermediate
//! and cast back to the result type. For `long` operands beyond 2^53 this can differ from
//! native 64-bit arithmetic, and `int`/`long` results that overflow saturate instead of
//! wrapping. Both are accepted limitations of the folding engine.
//!
//! Casts from floating point to integers saturate and map NaN to zero, which is what Rust's
//! `as` does.

use std::cmp::Ordering;

use crate::{
    assembly::{ArithmeticOp, CompareKind, NumericValue, Relation, TypeTag},
    Error, Result,
};

/// Result type of a binary operation on `left` and `right`.
///
/// `double` wins over `float`, `float` over `long`, `long` over `int`. `byte`, `short` and
/// `char` count as `int`.
#[must_use]
pub fn result_type(left: TypeTag, right: TypeTag) -> TypeTag {
    let (left, right) = (left.promote(), right.promote());
    [TypeTag::Double, TypeTag::Float, TypeTag::Long]
        .into_iter()
        .find(|candidate| left == *candidate || right == *candidate)
        .unwrap_or(TypeTag::Int)
}

/// `value` as a `double`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn as_f64(value: NumericValue) -> f64 {
    match value {
        NumericValue::I32(v) => f64::from(v),
        NumericValue::I64(v) => v as f64,
        NumericValue::F32(v) => f64::from(v),
        NumericValue::F64(v) => v,
    }
}

/// `value` as a `float`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn as_f32(value: NumericValue) -> f32 {
    match value {
        NumericValue::I32(v) => v as f32,
        NumericValue::I64(v) => v as f32,
        NumericValue::F32(v) => v,
        NumericValue::F64(v) => v as f32,
    }
}

/// `value` as a `long`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn as_i64(value: NumericValue) -> i64 {
    match value {
        NumericValue::I32(v) => i64::from(v),
        NumericValue::I64(v) => v,
        NumericValue::F32(v) => v as i64,
        NumericValue::F64(v) => v as i64,
    }
}

/// `value` as an `int`; `long` values keep their low 32 bits.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn as_i32(value: NumericValue) -> i32 {
    match value {
        NumericValue::I32(v) => v,
        NumericValue::I64(v) => v as i32,
        NumericValue::F32(v) => v as i32,
        NumericValue::F64(v) => v as i32,
    }
}

/// Applies a conversion instruction (`i2l`, `d2f`, `i2b`, ...) to `value`.
///
/// `Byte`, `Char` and `Short` narrow the `int` value and sign or zero extend it back.
/// Conversions to `Reference` leave the value alone.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn convert(value: NumericValue, to: TypeTag) -> NumericValue {
    match to {
        TypeTag::Int => NumericValue::I32(as_i32(value)),
        TypeTag::Long => NumericValue::I64(as_i64(value)),
        TypeTag::Float => NumericValue::F32(as_f32(value)),
        TypeTag::Double => NumericValue::F64(as_f64(value)),
        TypeTag::Byte => NumericValue::I32(i32::from(as_i32(value) as i8)),
        TypeTag::Char => NumericValue::I32(i32::from(as_i32(value) as u16)),
        TypeTag::Short => NumericValue::I32(i32::from(as_i32(value) as i16)),
        TypeTag::Reference => value,
    }
}

/// Casts a `double` intermediate to `ty`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn from_f64(value: f64, ty: TypeTag) -> NumericValue {
    match ty.promote() {
        TypeTag::Long => NumericValue::I64(value as i64),
        TypeTag::Float => NumericValue::F32(value as f32),
        TypeTag::Double => NumericValue::F64(value),
        _ => NumericValue::I32(value as i32),
    }
}

/// Evaluates `left op right` with result type `ty`.
///
/// Returns `Ok(None)` for an integral division or remainder by zero, which has to stay in
/// the code to throw at run time.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedOperation`] for a bitwise or shift operator on a
/// floating point type.
pub fn fold_arithmetic(
    op: ArithmeticOp,
    left: NumericValue,
    right: NumericValue,
    ty: TypeTag,
) -> Result<Option<NumericValue>> {
    let (l, r) = (as_f64(left), as_f64(right));
    if ty.is_integral() && matches!(op, ArithmeticOp::Div | ArithmeticOp::Rem) && r == 0.0 {
        return Ok(None);
    }

    let folded = match op {
        ArithmeticOp::Add => l + r,
        ArithmeticOp::Sub => l - r,
        ArithmeticOp::Mul => l * r,
        ArithmeticOp::Div => l / r,
        ArithmeticOp::Rem => l % r,
        _ => return fold_bitwise(op, left, right, ty).map(Some),
    };

    Ok(Some(from_f64(folded, ty)))
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn fold_bitwise(
    op: ArithmeticOp,
    left: NumericValue,
    right: NumericValue,
    ty: TypeTag,
) -> Result<NumericValue> {
    match ty.promote() {
        TypeTag::Int => {
            let (l, r) = (as_i32(left), as_i32(right));
            let distance = (r & 0x1f) as u32;
            Ok(NumericValue::I32(match op {
                ArithmeticOp::And => l & r,
                ArithmeticOp::Or => l | r,
                ArithmeticOp::Xor => l ^ r,
                ArithmeticOp::Shl => l.wrapping_shl(distance),
                ArithmeticOp::Shr => l.wrapping_shr(distance),
                _ => ((l as u32) >> distance) as i32,
            }))
        }
        TypeTag::Long => {
            let (l, r) = (as_i64(left), as_i64(right));
            let distance = (r & 0x3f) as u32;
            Ok(NumericValue::I64(match op {
                ArithmeticOp::And => l & r,
                ArithmeticOp::Or => l | r,
                ArithmeticOp::Xor => l ^ r,
                ArithmeticOp::Shl => l.wrapping_shl(distance),
                ArithmeticOp::Shr => l.wrapping_shr(distance),
                _ => ((l as u64) >> distance) as i64,
            }))
        }
        other => Err(Error::UnsupportedOperation(format!(
            "{} on {} operands",
            op.name(),
            other
        ))),
    }
}

/// Result of `lcmp`/`fcmp<op>`/`dcmp<op>` on `left` and `right`: `1`, `0` or `-1`.
///
/// Unordered operands give [`CompareKind::nan_result`].
#[must_use]
pub fn tri_state(kind: CompareKind, left: NumericValue, right: NumericValue) -> i32 {
    let ordering = match kind.operand_type() {
        TypeTag::Long => Some(as_i64(left).cmp(&as_i64(right))),
        TypeTag::Float => as_f32(left).partial_cmp(&as_f32(right)),
        _ => as_f64(left).partial_cmp(&as_f64(right)),
    };

    match ordering {
        Some(Ordering::Greater) => 1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Less) => -1,
        None => kind.nan_result(),
    }
}

/// Whether `relation` holds for an ordering of the left operand against the right.
#[must_use]
pub fn relation_holds(relation: Relation, ordering: Ordering) -> bool {
    match relation {
        Relation::Eq => ordering == Ordering::Equal,
        Relation::Ne => ordering != Ordering::Equal,
        Relation::Lt => ordering == Ordering::Less,
        Relation::Ge => ordering != Ordering::Less,
        Relation::Gt => ordering == Ordering::Greater,
        Relation::Le => ordering != Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_type_priority() {
        assert_eq!(result_type(TypeTag::Int, TypeTag::Int), TypeTag::Int);
        assert_eq!(result_type(TypeTag::Byte, TypeTag::Short), TypeTag::Int);
        assert_eq!(result_type(TypeTag::Int, TypeTag::Long), TypeTag::Long);
        assert_eq!(result_type(TypeTag::Long, TypeTag::Float), TypeTag::Float);
        assert_eq!(result_type(TypeTag::Double, TypeTag::Int), TypeTag::Double);
        assert_eq!(result_type(TypeTag::Float, TypeTag::Double), TypeTag::Double);
    }

    #[test]
    fn test_fold_in_double_precision() {
        let fold = |op, l, r, ty| fold_arithmetic(op, l, r, ty).unwrap().unwrap();

        assert_eq!(
            fold(ArithmeticOp::Add, NumericValue::I32(2), NumericValue::I32(3), TypeTag::Int),
            NumericValue::I32(5)
        );
        assert_eq!(
            fold(ArithmeticOp::Add, NumericValue::F64(2.0), NumericValue::I32(3), TypeTag::Double),
            NumericValue::F64(5.0)
        );
        assert_eq!(
            fold(ArithmeticOp::Div, NumericValue::I32(7), NumericValue::I32(2), TypeTag::Int),
            NumericValue::I32(3)
        );
        assert_eq!(
            fold(ArithmeticOp::Rem, NumericValue::I32(-7), NumericValue::I32(2), TypeTag::Int),
            NumericValue::I32(-1)
        );
        assert_eq!(
            fold(ArithmeticOp::Mul, NumericValue::F32(1.5), NumericValue::I64(4), TypeTag::Float),
            NumericValue::F32(6.0)
        );
        // Overflow saturates through the double intermediate
        assert_eq!(
            fold(ArithmeticOp::Add, NumericValue::I32(i32::MAX), NumericValue::I32(1), TypeTag::Int),
            NumericValue::I32(i32::MAX)
        );
    }

    #[test]
    fn test_integral_division_by_zero_is_not_folded() {
        assert_eq!(
            fold_arithmetic(ArithmeticOp::Div, NumericValue::I32(1), NumericValue::I32(0), TypeTag::Int),
            Ok(None)
        );
        assert_eq!(
            fold_arithmetic(ArithmeticOp::Rem, NumericValue::I64(1), NumericValue::I64(0), TypeTag::Long),
            Ok(None)
        );
        assert_eq!(
            fold_arithmetic(ArithmeticOp::Div, NumericValue::F64(1.0), NumericValue::F64(0.0), TypeTag::Double),
            Ok(Some(NumericValue::F64(f64::INFINITY)))
        );
    }

    #[test]
    fn test_bitwise_and_shifts() {
        let fold = |op, l, r, ty| fold_arithmetic(op, l, r, ty).unwrap().unwrap();

        assert_eq!(
            fold(ArithmeticOp::Xor, NumericValue::I32(0b1100), NumericValue::I32(0b1010), TypeTag::Int),
            NumericValue::I32(0b0110)
        );
        assert_eq!(
            fold(ArithmeticOp::Shl, NumericValue::I32(1), NumericValue::I32(33), TypeTag::Int),
            NumericValue::I32(2)
        );
        assert_eq!(
            fold(ArithmeticOp::Ushr, NumericValue::I32(-1), NumericValue::I32(28), TypeTag::Int),
            NumericValue::I32(0xf)
        );
        assert_eq!(
            fold(ArithmeticOp::Shr, NumericValue::I64(-16), NumericValue::I32(2), TypeTag::Long),
            NumericValue::I64(-4)
        );
        assert_eq!(
            fold(ArithmeticOp::Shl, NumericValue::I64(1), NumericValue::I32(40), TypeTag::Long),
            NumericValue::I64(1 << 40)
        );
        assert!(matches!(
            fold_arithmetic(ArithmeticOp::And, NumericValue::F32(1.0), NumericValue::F32(2.0), TypeTag::Float),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(convert(NumericValue::I32(300), TypeTag::Byte), NumericValue::I32(44));
        assert_eq!(convert(NumericValue::I32(-1), TypeTag::Char), NumericValue::I32(0xffff));
        assert_eq!(convert(NumericValue::I32(40000), TypeTag::Short), NumericValue::I32(-25536));
        assert_eq!(convert(NumericValue::I64(1 << 32 | 7), TypeTag::Int), NumericValue::I32(7));
        assert_eq!(convert(NumericValue::F64(1e20), TypeTag::Int), NumericValue::I32(i32::MAX));
        assert_eq!(convert(NumericValue::F32(f32::NAN), TypeTag::Long), NumericValue::I64(0));
        assert_eq!(convert(NumericValue::I32(3), TypeTag::Double), NumericValue::F64(3.0));
    }

    #[test]
    fn test_tri_state() {
        assert_eq!(tri_state(CompareKind::Lcmp, NumericValue::I64(5), NumericValue::I64(3)), 1);
        assert_eq!(tri_state(CompareKind::Lcmp, NumericValue::I32(3), NumericValue::I64(3)), 0);
        assert_eq!(tri_state(CompareKind::DcmpL, NumericValue::F64(1.0), NumericValue::F64(2.0)), -1);
        assert_eq!(tri_state(CompareKind::FcmpG, NumericValue::F32(f32::NAN), NumericValue::F32(0.0)), 1);
        assert_eq!(tri_state(CompareKind::FcmpL, NumericValue::F32(f32::NAN), NumericValue::F32(0.0)), -1);
    }

    #[test]
    fn test_relations() {
        assert!(relation_holds(Relation::Ge, 5.cmp(&3)));
        assert!(!relation_holds(Relation::Ge, 3.cmp(&5)));
        assert!(relation_holds(Relation::Le, Ordering::Equal));
        assert!(relation_holds(Relation::Ne, Ordering::Less));
        assert!(!relation_holds(Relation::Gt, Ordering::Equal));
    }
}
