//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DimIndexOutOfBoundsError {
	pub index: i64,
	pub ndim: usize,
}

impl std::error::Error for DimIndexOutOfBoundsError {}

impl std::fmt::Display for DimIndexOutOfBoundsError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let Self { index, ndim } = *self;
		if ndim == 0 {
			write!(f, "Dimension index {index} out of range: tensor has no dimensions.")
		} else {
			let lo = -i64::try_from(ndim).unwrap_or(i64::MAX);
			let hi = ndim - 1;
			write!(f, "Dimension index {index} out of range (expected to be in [{lo}, {hi}]).")
		}
	}
}

#[cold]
#[inline(never)]
fn out_of_bounds(index: i64, ndim: usize) -> DimIndexOutOfBoundsError {
	DimIndexOutOfBoundsError { index, ndim }
}

//--------------------------------------------------------------------------------------------------

pub trait DimIndex: Copy {
	/// Allowed indexes are:
	///     0 ..< ndim
	///     -ndim ..= -1
	fn resolve_index(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError>;

	/// As opposed to indexes, range bounds can go up to `ndim`:
	///     0 ..<= ndim
	///     -(ndim + 1) ..= -1
	fn resolve_range_bound(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError> {
		self.resolve_index(ndim + 1)
	}
}

impl DimIndex for i64 {
	fn resolve_index(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError> {
		let n = i64::try_from(ndim).map_err(|_| out_of_bounds(self, ndim))?;
		let dim = if self < 0 { self + n } else { self };
		if (0..n).contains(&dim) {
			#[allow(clippy::cast_sign_loss)]
			#[allow(clippy::cast_possible_truncation)]
			Ok(dim as usize)
		} else {
			Err(out_of_bounds(self, ndim))
		}
	}
}

impl DimIndex for isize {
	fn resolve_index(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError> {
		(self as i64).resolve_index(ndim)
	}
}

impl DimIndex for i32 {
	fn resolve_index(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError> {
		i64::from(self).resolve_index(ndim)
	}
}

impl DimIndex for usize {
	fn resolve_index(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError> {
		if self < ndim {
			Ok(self)
		} else {
			Err(out_of_bounds(i64::try_from(self).unwrap_or(i64::MAX), ndim))
		}
	}
}

impl DimIndex for u32 {
	fn resolve_index(self, ndim: usize) -> Result<usize, DimIndexOutOfBoundsError> {
		(self as usize).resolve_index(ndim)
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
