//! Operator overloads.
//!
//! Every fallible operator yields `Result<DistributedVector<C>, LinalgError>`,
//! so whatever the scalar operand's type, success always produces the vector
//! type. Scalars pass through [`promote`] first; a rejected scalar fails
//! before any copy is made. `f32` has no operator impls, so float literals
//! always resolve to `f64`. In-place operators with a native `f64` cannot
//! fail and use the `std::ops` assignment traits directly.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use super::promote::promote;
use super::storage::{BackendStorage, DenseStorage};
use super::vector::DistributedVector;
use crate::comm::Communicator;
use crate::la_error::LinalgError;

type Kernel = fn(&mut dyn BackendStorage, &dyn BackendStorage) -> Result<(), LinalgError>;

impl<C: Communicator> DistributedVector<C> {
    /// Out-of-place `self ∘ other`, laid out like `self`. If the layouts
    /// differ, `other` is first redistributed into `self`'s layout
    /// (collective).
    fn binary(&self, other: &Self, op: &'static str, kernel: Kernel) -> Result<Self, LinalgError> {
        if self.size() != other.size() {
            return Err(LinalgError::DimensionMismatch {
                op,
                expected: self.size(),
                found: other.size(),
            });
        }
        let mut out = self.clone();
        if self.same_layout(other) {
            kernel(out.storage.as_mut(), other.storage.as_ref())?;
        } else {
            let layout = self
                .partition
                .as_ref()
                .ok_or(LinalgError::IncompatibleLayout { op })?;
            let rhs = DenseStorage::from(other.redistribute(layout)?);
            kernel(out.storage.as_mut(), &rhs)?;
        }
        Ok(out)
    }
}

// ----- vector ∘ vector -------------------------------------------------------

macro_rules! vector_binop {
    ($Trait:ident, $method:ident, $op:literal, $kernel:expr) => {
        impl<'a, C: Communicator> $Trait<&'a DistributedVector<C>> for &'a DistributedVector<C> {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn $method(self, rhs: &'a DistributedVector<C>) -> Self::Output {
                self.binary(rhs, $op, $kernel)
            }
        }
    };
}

fn add_kernel(y: &mut dyn BackendStorage, x: &dyn BackendStorage) -> Result<(), LinalgError> {
    BackendStorage::add(y, x)
}

fn sub_kernel(y: &mut dyn BackendStorage, x: &dyn BackendStorage) -> Result<(), LinalgError> {
    y.axpy(-1.0, x)
}

fn mul_kernel(y: &mut dyn BackendStorage, x: &dyn BackendStorage) -> Result<(), LinalgError> {
    y.multiply(x)
}

fn div_kernel(y: &mut dyn BackendStorage, x: &dyn BackendStorage) -> Result<(), LinalgError> {
    y.divide(x)
}

vector_binop!(Add, add, "+", add_kernel);
vector_binop!(Sub, sub, "-", sub_kernel);
vector_binop!(Mul, mul, "*", mul_kernel);
vector_binop!(Div, div, "/", div_kernel);

// ----- vector ∘ scalar and scalar ∘ vector -------------------------------

macro_rules! scalar_ops {
    ($($t:ty),* $(,)?) => {$(
        impl<C: Communicator> Add<$t> for &DistributedVector<C> {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn add(self, s: $t) -> Self::Output {
                let a = promote(s)?;
                let mut out = self.clone();
                out.storage.shift(a);
                Ok(out)
            }
        }

        impl<C: Communicator> Sub<$t> for &DistributedVector<C> {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn sub(self, s: $t) -> Self::Output {
                let a = promote(s)?;
                let mut out = self.clone();
                out.storage.shift(-a);
                Ok(out)
            }
        }

        impl<C: Communicator> Mul<$t> for &DistributedVector<C> {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn mul(self, s: $t) -> Self::Output {
                let a = promote(s)?;
                let mut out = self.clone();
                out.storage.scale(a);
                Ok(out)
            }
        }

        impl<C: Communicator> Div<$t> for &DistributedVector<C> {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn div(self, s: $t) -> Self::Output {
                let a = promote(s)?;
                let mut out = self.clone();
                out.storage.scale(1.0 / a);
                Ok(out)
            }
        }

        impl<C: Communicator> Add<&DistributedVector<C>> for $t {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn add(self, v: &DistributedVector<C>) -> Self::Output {
                v + self
            }
        }

        /// `s - v`, elementwise.
        impl<C: Communicator> Sub<&DistributedVector<C>> for $t {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn sub(self, v: &DistributedVector<C>) -> Self::Output {
                let a = promote(self)?;
                let mut out = v.clone();
                out.storage.scale(-1.0);
                out.storage.shift(a);
                Ok(out)
            }
        }

        impl<C: Communicator> Mul<&DistributedVector<C>> for $t {
            type Output = Result<DistributedVector<C>, LinalgError>;

            fn mul(self, v: &DistributedVector<C>) -> Self::Output {
                v * self
            }
        }
    )*};
}

// No `f32` impls: float literals resolve to `f64`, and `f32` operands are
// rejected at compile time (the `try_*_scalar` forms reject them at run time).
scalar_ops!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f64);

// ----- in-place with the native scalar ----------------------------------

impl<C: Communicator> AddAssign<f64> for DistributedVector<C> {
    fn add_assign(&mut self, a: f64) {
        self.storage.shift(a);
    }
}

impl<C: Communicator> SubAssign<f64> for DistributedVector<C> {
    fn sub_assign(&mut self, a: f64) {
        self.storage.shift(-a);
    }
}

impl<C: Communicator> MulAssign<f64> for DistributedVector<C> {
    fn mul_assign(&mut self, a: f64) {
        self.storage.scale(a);
    }
}

impl<C: Communicator> DivAssign<f64> for DistributedVector<C> {
    fn div_assign(&mut self, a: f64) {
        self.storage.scale(1.0 / a);
    }
}

#[cfg(test)]
mod tests {
    use crate::comm::NoComm;
    use crate::la::storage::BackendKind;
    use crate::la::vector::DistributedVector;
    use crate::la_error::LinalgError;

    fn v(values: &[f64]) -> DistributedVector<NoComm> {
        let mut v = DistributedVector::with_size(NoComm, values.len() as u64, BackendKind::Dense);
        v.set_local(values).unwrap();
        v
    }

    #[test]
    fn scalar_on_either_side_yields_vector() {
        let x = v(&[1.0, -2.0]);
        assert_eq!((&x + 3.0).unwrap().get_local(), vec![4.0, 1.0]);
        assert_eq!((3u64 - &x).unwrap().get_local(), vec![2.0, 5.0]);
        assert_eq!((2usize * &x).unwrap().get_local(), vec![2.0, -4.0]);
        assert_eq!((&x / -2.0).unwrap().get_local(), vec![-0.5, 1.0]);
    }

    #[test]
    fn narrow_scalars_fail_in_both_positions() {
        let x = v(&[1.0]);
        assert!(matches!(&x + 1i16, Err(LinalgError::Promotion { .. })));
        assert!(matches!(1u8 * &x, Err(LinalgError::Promotion { .. })));
    }

    #[test]
    fn unsuffixed_float_literals_resolve_to_f64() {
        let x = v(&[1.0, -2.0]);
        assert_eq!((2.0 * &x).unwrap().get_local(), vec![2.0, -4.0]);
        assert_eq!((1.0 - &x).unwrap().get_local(), vec![0.0, 3.0]);
        assert_eq!((0.5 + &x).unwrap().get_local(), vec![1.5, -1.5]);
        assert_eq!((&x - 1.0).unwrap().get_local(), vec![0.0, -3.0]);
        assert_eq!((&x * 42.0).unwrap().get_local(), vec![42.0, -84.0]);
    }

    #[test]
    fn single_precision_scalars_are_rejected_in_place() {
        let mut x = v(&[1.0]);
        assert!(matches!(
            x.try_add_scalar(1.0f32),
            Err(LinalgError::Promotion { .. })
        ));
        assert_eq!(x.get_local(), vec![1.0]);
    }

    #[test]
    fn vector_ops_require_equal_size() {
        let x = v(&[1.0, 2.0]);
        let y = v(&[1.0, 2.0, 3.0]);
        assert!(matches!(&x + &y, Err(LinalgError::DimensionMismatch { .. })));
        assert_eq!((&x * &x).unwrap().get_local(), vec![1.0, 4.0]);
        assert_eq!((&x / &x).unwrap().get_local(), vec![1.0, 1.0]);
    }

    #[test]
    fn native_assign_ops() {
        let mut x = v(&[-1.0, -1.0]);
        x *= 2.0;
        x /= -4.0;
        x += 1.0;
        x -= 0.25;
        assert_eq!(x.get_local(), vec![1.25, 1.25]);
    }
}
