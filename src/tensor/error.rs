//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;

use crate::ErrPack;

use super::buffer::BufferAllocFailedError;
use super::dim_index::DimIndexOutOfBoundsError;
use super::dim_merger::ReshapeError;
use super::dtype::DTypeMismatchError;
use super::map::{ElementsOverflowError, IndexOutOfBoundsError};

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TensorOpError {
	ShapeMismatch,
	InvalidArgument,
	DimIndexOutOfBounds,
	IndexOutOfBounds,
	UnsupportedState,
	DTypeMismatch,
	IncompatibleStrides,
	ElementsOverflow,
	BufferAllocFailed,
}

/// The four ways a tensor operation can fail, as seen by a caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
	ShapeMismatch,
	InvalidArgument,
	IndexError,
	UnsupportedState,
}

impl TensorOpError {
	pub fn category(self) -> ErrorCategory {
		match self {
			Self::ShapeMismatch => ErrorCategory::ShapeMismatch,
			Self::DimIndexOutOfBounds | Self::IndexOutOfBounds => ErrorCategory::IndexError,
			Self::UnsupportedState | Self::BufferAllocFailed => ErrorCategory::UnsupportedState,
			Self::InvalidArgument
			| Self::DTypeMismatch
			| Self::IncompatibleStrides
			| Self::ElementsOverflow => ErrorCategory::InvalidArgument,
		}
	}
}

impl ErrPack<TensorOpError> {
	pub fn category(&self) -> ErrorCategory {
		self.code.category()
	}
}

//--------------------------------------------------------------------------------------------------

#[cold]
#[inline(never)]
pub fn shape_mismatch(message: impl Into<Cow<'static, str>>) -> ErrPack<TensorOpError> {
	ErrPack::with_message(TensorOpError::ShapeMismatch, message)
}

#[cold]
#[inline(never)]
pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> ErrPack<TensorOpError> {
	ErrPack::with_message(TensorOpError::InvalidArgument, message)
}

#[cold]
#[inline(never)]
pub fn unsupported_state(message: impl Into<Cow<'static, str>>) -> ErrPack<TensorOpError> {
	ErrPack::with_message(TensorOpError::UnsupportedState, message)
}

#[cold]
#[inline(never)]
pub fn index_out_of_bounds(message: impl Into<Cow<'static, str>>) -> ErrPack<TensorOpError> {
	ErrPack::with_message(TensorOpError::IndexOutOfBounds, message)
}

//--------------------------------------------------------------------------------------------------

impl From<DimIndexOutOfBoundsError> for TensorOpError {
	fn from(_: DimIndexOutOfBoundsError) -> Self {
		Self::DimIndexOutOfBounds
	}
}

impl From<DimIndexOutOfBoundsError> for ErrPack<TensorOpError> {
	#[cold]
	#[inline(never)]
	fn from(err: DimIndexOutOfBoundsError) -> Self {
		Self::with_message(TensorOpError::DimIndexOutOfBounds, err.to_string())
	}
}

impl From<IndexOutOfBoundsError> for TensorOpError {
	fn from(_: IndexOutOfBoundsError) -> Self {
		Self::IndexOutOfBounds
	}
}

impl From<IndexOutOfBoundsError> for ErrPack<TensorOpError> {
	fn from(_: IndexOutOfBoundsError) -> Self {
		Self::new(TensorOpError::IndexOutOfBounds)
	}
}

impl From<ElementsOverflowError> for TensorOpError {
	fn from(_: ElementsOverflowError) -> Self {
		Self::ElementsOverflow
	}
}

impl From<ElementsOverflowError> for ErrPack<TensorOpError> {
	fn from(_: ElementsOverflowError) -> Self {
		Self::with_message(
			TensorOpError::ElementsOverflow,
			"the number of elements does not fit in usize",
		)
	}
}

impl From<DTypeMismatchError> for TensorOpError {
	fn from(_: DTypeMismatchError) -> Self {
		Self::DTypeMismatch
	}
}

impl From<DTypeMismatchError> for ErrPack<TensorOpError> {
	#[cold]
	#[inline(never)]
	fn from(err: DTypeMismatchError) -> Self {
		Self::with_message(TensorOpError::DTypeMismatch, err.to_string())
	}
}

impl From<ReshapeError> for TensorOpError {
	fn from(_: ReshapeError) -> Self {
		Self::IncompatibleStrides
	}
}

impl From<ReshapeError> for ErrPack<TensorOpError> {
	fn from(_: ReshapeError) -> Self {
		Self::new(TensorOpError::IncompatibleStrides)
	}
}

impl From<BufferAllocFailedError> for TensorOpError {
	fn from(_: BufferAllocFailedError) -> Self {
		Self::BufferAllocFailed
	}
}

impl From<BufferAllocFailedError> for ErrPack<TensorOpError> {
	fn from(_: BufferAllocFailedError) -> Self {
		Self::new(TensorOpError::BufferAllocFailed)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tensor::dim_index::DimIndex;

	#[test]
	fn test_categories() {
		assert_eq!(TensorOpError::ShapeMismatch.category(), ErrorCategory::ShapeMismatch);
		assert_eq!(TensorOpError::DimIndexOutOfBounds.category(), ErrorCategory::IndexError);
		assert_eq!(TensorOpError::DTypeMismatch.category(), ErrorCategory::InvalidArgument);
		assert_eq!(TensorOpError::UnsupportedState.category(), ErrorCategory::UnsupportedState);
	}

	#[test]
	fn test_dim_index_error_keeps_message() {
		let err: ErrPack<TensorOpError> = 5_i64.resolve_index(2).unwrap_err().into();
		assert_eq!(err.code, TensorOpError::DimIndexOutOfBounds);
		assert!(err.message().contains("[-2, 1]"));
		assert!(err.to_string().contains("DimIndexOutOfBounds"));
	}
}

//--------------------------------------------------------------------------------------------------
