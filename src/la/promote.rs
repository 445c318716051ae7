//! Promotion of foreign scalars into the vector's `f64` arithmetic.
//!
//! The rule set is a table keyed by [`ScalarKind`]: narrow kinds are always
//! rejected, wide integer kinds are accepted when the value itself survives
//! the round trip through `f64`, and `f64` passes through unchanged. Mixed
//! arithmetic always yields the vector type, never the scalar type.

use num_traits::{NumCast, ToPrimitive};
use std::fmt::Debug;

use crate::la_error::LinalgError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

/// How a scalar kind enters `f64` arithmetic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PromotionRule {
    /// Already the native type.
    Exact,
    /// Accepted when the value converts to `f64` and back unchanged.
    Checked,
    /// Never accepted.
    Rejected,
}

pub const fn promotion_rule(kind: ScalarKind) -> PromotionRule {
    use ScalarKind::*;
    match kind {
        F64 => PromotionRule::Exact,
        I64 | I128 | Isize | U64 | U128 | Usize => PromotionRule::Checked,
        I8 | I16 | I32 | U8 | U16 | U32 | F32 => PromotionRule::Rejected,
    }
}

/// A numeric type that may appear as the scalar operand of vector arithmetic.
pub trait ForeignScalar: Copy + Debug + ToPrimitive + NumCast + PartialEq {
    const KIND: ScalarKind;
}

macro_rules! foreign_scalar {
    ($($t:ty => $k:ident),* $(,)?) => {
        $(impl ForeignScalar for $t {
            const KIND: ScalarKind = ScalarKind::$k;
        })*
    };
}

foreign_scalar! {
    i8 => I8, i16 => I16, i32 => I32, i64 => I64, i128 => I128, isize => Isize,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64, u128 => U128, usize => Usize,
    f32 => F32, f64 => F64,
}

/// Promote `s` to `f64` or fail with [`LinalgError::Promotion`].
pub fn promote<S: ForeignScalar>(s: S) -> Result<f64, LinalgError> {
    let rejected = || LinalgError::Promotion {
        kind: S::KIND,
        value: format!("{s:?}"),
    };
    match promotion_rule(S::KIND) {
        PromotionRule::Rejected => Err(rejected()),
        PromotionRule::Exact => s.to_f64().ok_or_else(rejected),
        PromotionRule::Checked => {
            let f = s.to_f64().ok_or_else(rejected)?;
            match <S as NumCast>::from(f) {
                Some(back) if back == s => Ok(f),
                _ => Err(rejected()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_types_promote() {
        assert_eq!(promote(42.0f64).unwrap(), 42.0);
        assert_eq!(promote(42i64).unwrap(), 42.0);
        assert_eq!(promote(42usize).unwrap(), 42.0);
        assert_eq!(promote(1u128 << 100).unwrap(), 2f64.powi(100));
        assert_eq!(promote(f64::sin(1.0)).unwrap(), 1f64.sin());
    }

    #[test]
    fn narrow_types_are_rejected() {
        for err in [
            promote(42i8).unwrap_err(),
            promote(42i16).unwrap_err(),
            promote(42i32).unwrap_err(),
            promote(42u8).unwrap_err(),
            promote(42u16).unwrap_err(),
            promote(42u32).unwrap_err(),
            promote(42.0f32).unwrap_err(),
        ] {
            assert!(matches!(err, LinalgError::Promotion { .. }));
        }
    }

    #[test]
    fn lossy_wide_values_are_rejected() {
        let err = promote(i64::MAX).unwrap_err();
        assert!(matches!(err, LinalgError::Promotion { kind: ScalarKind::I64, .. }));
        assert!(promote((1i64 << 53) + 1).is_err());
        assert!(promote(1i64 << 53).is_ok());
    }
}
