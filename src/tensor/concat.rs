//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::ErrPack;
use crate::util::fmt_sizes;

use super::Tensor;
use super::dim_index::DimIndex;
use super::error::{self, TensorOpError};

//--------------------------------------------------------------------------------------------------

impl Tensor {
	/// Concatenates `tensors` along `dim` into a new contiguous tensor.
	///
	/// All inputs must have the same dtype, the same number of dimensions, and the same
	/// sizes in every dimension except `dim`.
	pub fn cat<D: DimIndex>(tensors: &[Self], dim: D) -> Result<Self, ErrPack<TensorOpError>> {
		let Some(first) = tensors.first() else {
			return Err(error::invalid_argument("cat expects a non-empty TensorList"));
		};
		let ndim = first.ndim();
		let dim = dim.resolve_index(ndim)?;
		let dtype = first.dtype();

		let mut sizes = first.sizes();
		sizes[dim] = 0;
		for (i, t) in tensors.iter().enumerate() {
			if t.dtype() != dtype {
				return Err(ErrPack::with_message(
					TensorOpError::DTypeMismatch,
					format!("cat expects all tensors to be {dtype}, but entry {i} is {}", t.dtype()),
				));
			}
			let matches = t.ndim() == ndim
				&& (0..ndim).all(|d| d == dim || t.map().dims()[d].size == first.map().dims()[d].size);
			if !matches {
				return Err(error::shape_mismatch(format!(
					"cat: sizes of tensors must match except in dimension {dim}, but got {} at \
					 entry 0 and {} at entry {i}",
					fmt_sizes(first.sizes()),
					fmt_sizes(t.sizes())
				)));
			}
			sizes[dim] += t.map().dims()[dim].size;
		}

		let result = Self::empty(&sizes, dtype)?;
		let mut start = 0;
		for t in tensors {
			let len = t.map().dims()[dim].size;
			result.narrow(dim, start, len)?.copy_(t)?;
			start += len;
		}
		Ok(result)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tensor::{ErrorCategory, HasDType};

	#[test]
	fn test_cat_rows_and_columns() {
		let a = Tensor::from_slice(&[1_i64, 2, 3, 4], &[2, 2]).unwrap();
		let b = Tensor::from_slice(&[5_i64, 6], &[1, 2]).unwrap();
		let rows = Tensor::cat(&[a.clone(), b], 0).unwrap();
		assert_eq!(rows.sizes().as_slice(), &[3, 2]);
		assert_eq!(rows.to_vec::<i64>().unwrap(), vec![1, 2, 3, 4, 5, 6]);

		let c = Tensor::from_slice(&[7_i64, 8], &[2, 1]).unwrap();
		let cols = Tensor::cat(&[a.transpose(0, 1).unwrap(), c], -1).unwrap();
		assert!(cols.is_contiguous());
		assert_eq!(cols.to_vec::<i64>().unwrap(), vec![1, 3, 7, 2, 4, 8]);
	}

	#[test]
	fn test_cat_errors() {
		let a = Tensor::zeros(&[2, 2], f32::dtype).unwrap();
		let b = Tensor::zeros(&[2, 3], f32::dtype).unwrap();
		let err = Tensor::cat(&[a.clone(), b.clone()], 0).unwrap_err();
		assert_eq!(err.category(), ErrorCategory::ShapeMismatch);
		assert!(Tensor::cat(&[a.clone(), b], 1).is_ok());

		let i = Tensor::zeros(&[2, 2], i32::dtype).unwrap();
		assert_eq!(Tensor::cat(&[a, i], 0).unwrap_err().code, TensorOpError::DTypeMismatch);
		assert!(Tensor::cat(&[], 0).is_err());
	}
}

//--------------------------------------------------------------------------------------------------
