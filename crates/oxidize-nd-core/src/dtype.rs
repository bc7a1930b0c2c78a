use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric kind of the elements held by a storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 8-bit signed integer.
    Byte,
    /// 32-bit signed integer.
    Int,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
}

impl DType {
    pub const fn byte_count(self) -> usize {
        match self {
            DType::Byte => 1,
            DType::Int | DType::Float => 4,
            DType::Double => 8,
        }
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, DType::Float | DType::Double)
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::Byte => "byte",
            DType::Int => "int",
            DType::Float => "float",
            DType::Double => "double",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trait bound for element types usable in tensors.
/// Supports `i8`, `i32`, `f32` and `f64`.
///
/// Arithmetic goes through the `elem_*` methods: integral kinds wrap on
/// overflow and report division by zero instead of panicking.
pub trait Element:
    Copy
    + Clone
    + Default
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + Serialize
    + for<'de> Deserialize<'de>
    + 'static
{
    const DTYPE: DType;
    const ZERO: Self;
    const ONE: Self;

    /// Conversion from the accumulator type; integral targets saturate and
    /// map NaN to zero.
    fn from_f64(v: f64) -> Self;
    /// Widening conversion used by every accumulator.
    fn to_f64(self) -> f64;
    fn from_usize(v: usize) -> Self;

    fn elem_add(self, rhs: Self) -> Self;
    fn elem_sub(self, rhs: Self) -> Self;
    fn elem_mul(self, rhs: Self) -> Self;
    fn elem_div(self, rhs: Self) -> Option<Self>;

    fn is_nan(self) -> bool;

    /// Explicit cross-kind conversion.
    #[inline]
    fn cast<U: Element>(self) -> U {
        U::from_f64(self.to_f64())
    }
}

/// Floating point element kinds.
pub trait Float: Element + std::ops::Neg<Output = Self> {
    const EPSILON: Self;
    const NAN: Self;
    const INFINITY: Self;
    const NEG_INFINITY: Self;

    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn powf(self, n: Self) -> Self;
}

macro_rules! impl_integral_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline] fn from_f64(v: f64) -> Self { v as $t }
            #[inline] fn to_f64(self) -> f64 { self as f64 }
            #[inline] fn from_usize(v: usize) -> Self { v.min(<$t>::MAX as usize) as $t }
            #[inline] fn elem_add(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
            #[inline] fn elem_sub(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
            #[inline] fn elem_mul(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }
            #[inline] fn elem_div(self, rhs: Self) -> Option<Self> { self.checked_div(rhs) }
            #[inline] fn is_nan(self) -> bool { false }
        }
    };
}

macro_rules! impl_float_element {
    ($t:ident, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            #[inline] fn from_f64(v: f64) -> Self { v as $t }
            #[inline] fn to_f64(self) -> f64 { self as f64 }
            #[inline] fn from_usize(v: usize) -> Self { v as $t }
            #[inline] fn elem_add(self, rhs: Self) -> Self { self + rhs }
            #[inline] fn elem_sub(self, rhs: Self) -> Self { self - rhs }
            #[inline] fn elem_mul(self, rhs: Self) -> Self { self * rhs }
            #[inline] fn elem_div(self, rhs: Self) -> Option<Self> { Some(self / rhs) }
            #[inline] fn is_nan(self) -> bool { $t::is_nan(self) }
        }

        impl Float for $t {
            const EPSILON: Self = $t::EPSILON;
            const NAN: Self = $t::NAN;
            const INFINITY: Self = $t::INFINITY;
            const NEG_INFINITY: Self = $t::NEG_INFINITY;

            #[inline] fn abs(self) -> Self { $t::abs(self) }
            #[inline] fn sqrt(self) -> Self { $t::sqrt(self) }
            #[inline] fn powf(self, n: Self) -> Self { $t::powf(self, n) }
        }
    };
}

impl_integral_element!(i8, DType::Byte);
impl_integral_element!(i32, DType::Int);
impl_float_element!(f32, DType::Float);
impl_float_element!(f64, DType::Double);
