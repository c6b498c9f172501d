//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::num::NonZeroU32;

use crate::util::LossyInto;

//--------------------------------------------------------------------------------------------------

pub const MAX_DTYPE_ALIGN: usize = 8; // 64-bit

pub trait HasDType {
	const dtype: DType;
}

#[derive(Clone, Copy)]
pub struct DTypeStruct {
	kind: DTypeKind,

	/// Shifting left by this value will convert number of elements to number of bits
	shift: u8,

	id: DTypeId,
}

#[derive(PartialEq, Eq, Clone, Copy, Hash)]
#[repr(transparent)]
pub struct DType(NonZeroU32);

/// Typed access asked for `expected`, but the memory holds `actual`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DTypeMismatchError {
	pub expected: DType,
	pub actual: DType,
}

impl DTypeMismatchError {
	pub fn check<T: HasDType>(actual: DType) -> Result<(), Self> {
		if actual == T::dtype {
			Ok(())
		} else {
			Err(Self { expected: T::dtype, actual })
		}
	}
}

impl std::fmt::Display for DTypeMismatchError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "expected dtype {}, but the tensor has dtype {}", self.expected, self.actual)
	}
}

impl DTypeStruct {
	pub const fn from_dtype(dtype: DType) -> Self {
		let bytes = dtype.0.get().to_le_bytes();
		Self {
			kind: DTypeKind::from_u8(bytes[0]),
			shift: bytes[1],
			id: DTypeId::from_u8(bytes[2]),
		}
	}
}

impl DType {
	pub const fn from_struct(data: DTypeStruct) -> Self {
		let val = u32::from_le_bytes([data.kind as u8, data.shift, data.id as u8, 0]);
		match NonZeroU32::new(val) {
			Some(v) => Self(v),
			// DTypeId starts at 1, so val is never 0
			None => unreachable!(),
		}
	}

	/// Signed and unsigned integers.
	pub fn is_integral(self) -> bool {
		matches!(self.kind(), DTypeKind::Int | DTypeKind::Uint)
	}

	pub fn kind(self) -> DTypeKind {
		DTypeStruct::from_dtype(self).kind
	}

	pub fn id(self) -> DTypeId {
		DTypeStruct::from_dtype(self).id
	}

	pub fn bits(self) -> usize {
		let data = DTypeStruct::from_dtype(self);
		1 << data.shift
	}

	pub fn bytes(self) -> usize {
		self.bits() / 8
	}

	pub fn align(self) -> usize {
		self.bytes().min(MAX_DTYPE_ALIGN)
	}

	pub fn array_bytes(self, elems: usize) -> Option<usize> {
		self.bytes().checked_mul(elems)
	}

	/// The type an accumulating reduction runs in.
	///
	/// An explicitly requested dtype wins. Otherwise integers widen to `i64`
	/// and floats keep their own type.
	pub fn reduction_dtype(self, requested: Option<DType>) -> DType {
		match requested {
			Some(dtype) => dtype,
			None if self.is_integral() => i64::dtype,
			None => self,
		}
	}
}

impl std::fmt::Debug for DType {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{self}")
	}
}

impl std::fmt::Display for DType {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let name = match self.id() {
			DTypeId::U8 => "u8",
			DTypeId::I8 => "i8",
			DTypeId::I16 => "i16",
			DTypeId::I32 => "i32",
			DTypeId::I64 => "i64",
			DTypeId::F32 => "f32",
			DTypeId::F64 => "f64",
		};
		write!(f, "{name}")
	}
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DTypeKind {
	Float = 1,
	Int = 2,
	Uint = 3,
}

impl DTypeKind {
	const fn from_u8(v: u8) -> Self {
		match v {
			1 => Self::Float,
			2 => Self::Int,
			_ => Self::Uint,
		}
	}
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DTypeId {
	U8 = 1,
	I8 = 2,
	I16 = 3,
	I32 = 4,
	I64 = 5,
	F32 = 6,
	F64 = 7,
}

impl DTypeId {
	const fn from_u8(v: u8) -> Self {
		match v {
			1 => Self::U8,
			2 => Self::I8,
			3 => Self::I16,
			4 => Self::I32,
			5 => Self::I64,
			6 => Self::F32,
			_ => Self::F64,
		}
	}
}

impl From<DTypeId> for u8 {
	fn from(id: DTypeId) -> Self {
		id as u8
	}
}

//--------------------------------------------------------------------------------------------------

/// A single element value, wide enough to carry any supported element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
	Int(i64),
	Float(f64),
}

impl Scalar {
	pub fn as_f64(self) -> f64 {
		match self {
			Self::Int(v) => v.lossy_into(),
			Self::Float(v) => v,
		}
	}

	pub fn as_i64(self) -> i64 {
		match self {
			Self::Int(v) => v,
			Self::Float(v) => v.lossy_into(),
		}
	}
}

impl From<i64> for Scalar {
	fn from(v: i64) -> Self {
		Self::Int(v)
	}
}

impl From<f64> for Scalar {
	fn from(v: f64) -> Self {
		Self::Float(v)
	}
}

/// Scalar kinds a `Buffer` can hold.
///
/// Accumulation is wrapping for integers, so a reduction never panics on overflow.
pub trait Element: HasDType + Copy + Default + PartialEq + std::fmt::Debug + 'static {
	const ZERO: Self;
	const ONE: Self;

	fn acc_add(self, rhs: Self) -> Self;
	fn acc_mul(self, rhs: Self) -> Self;

	fn to_scalar(self) -> Scalar;
	fn from_scalar(value: Scalar) -> Self;
}

macro_rules! impl_int_element {
	($t:ty, $kind:ident, $shift:literal, $id:ident) => {
		impl HasDType for $t {
			const dtype: DType = DType::from_struct(DTypeStruct {
				kind: DTypeKind::$kind,
				shift: $shift,
				id: DTypeId::$id,
			});
		}

		#[allow(clippy::cast_possible_truncation)]
		#[allow(clippy::cast_sign_loss)]
		#[allow(clippy::cast_possible_wrap)]
		#[allow(clippy::cast_lossless)]
		impl Element for $t {
			const ZERO: Self = 0;
			const ONE: Self = 1;

			#[inline]
			fn acc_add(self, rhs: Self) -> Self {
				self.wrapping_add(rhs)
			}

			#[inline]
			fn acc_mul(self, rhs: Self) -> Self {
				self.wrapping_mul(rhs)
			}

			#[inline]
			fn to_scalar(self) -> Scalar {
				Scalar::Int(self as i64)
			}

			#[inline]
			fn from_scalar(value: Scalar) -> Self {
				match value {
					Scalar::Int(v) => v as Self,
					Scalar::Float(v) => v as Self,
				}
			}
		}
	};
}

macro_rules! impl_float_element {
	($t:ty, $shift:literal, $id:ident) => {
		impl HasDType for $t {
			const dtype: DType = DType::from_struct(DTypeStruct {
				kind: DTypeKind::Float,
				shift: $shift,
				id: DTypeId::$id,
			});
		}

		#[allow(clippy::cast_possible_truncation)]
		#[allow(clippy::cast_precision_loss)]
		#[allow(clippy::cast_lossless)]
		impl Element for $t {
			const ZERO: Self = 0.0;
			const ONE: Self = 1.0;

			#[inline]
			fn acc_add(self, rhs: Self) -> Self {
				self + rhs
			}

			#[inline]
			fn acc_mul(self, rhs: Self) -> Self {
				self * rhs
			}

			#[inline]
			fn to_scalar(self) -> Scalar {
				Scalar::Float(self as f64)
			}

			#[inline]
			fn from_scalar(value: Scalar) -> Self {
				match value {
					Scalar::Int(v) => v as Self,
					Scalar::Float(v) => v as Self,
				}
			}
		}
	};
}

impl_int_element!(u8, Uint, 3, U8);
impl_int_element!(i8, Int, 3, I8);
impl_int_element!(i16, Int, 4, I16);
impl_int_element!(i32, Int, 5, I32);
impl_int_element!(i64, Int, 6, I64);
impl_float_element!(f32, 5, F32);
impl_float_element!(f64, 6, F64);

/// Runs `$body` with `$T` bound to the Rust type of `$dtype`.
#[macro_export]
macro_rules! with_element_type {
	($dtype:expr, $T:ident => $body:expr) => {
		match $crate::tensor::DType::id($dtype) {
			$crate::tensor::dtype::DTypeId::U8 => {
				type $T = u8;
				$body
			},
			$crate::tensor::dtype::DTypeId::I8 => {
				type $T = i8;
				$body
			},
			$crate::tensor::dtype::DTypeId::I16 => {
				type $T = i16;
				$body
			},
			$crate::tensor::dtype::DTypeId::I32 => {
				type $T = i32;
				$body
			},
			$crate::tensor::dtype::DTypeId::I64 => {
				type $T = i64;
				$body
			},
			$crate::tensor::dtype::DTypeId::F32 => {
				type $T = f32;
				$body
			},
			$crate::tensor::dtype::DTypeId::F64 => {
				type $T = f64;
				$body
			},
		}
	};
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
