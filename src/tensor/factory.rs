//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ops::ControlFlow;

use crate::ErrPack;
use crate::util::fmt_sizes;
use crate::with_element_type;

use super::Tensor;
use super::apply::{apply1, apply2};
use super::buffer::Buffer;
use super::dtype::{DType, DTypeMismatchError, Element, Scalar};
use super::error::{self, TensorOpError};
use super::map::Map;

//--------------------------------------------------------------------------------------------------

impl Tensor {
	/// Allocates a contiguous tensor. The elements are zero.
	pub fn empty(shape: &[usize], dtype: DType) -> Result<Self, ErrPack<TensorOpError>> {
		let (map, elems) = Map::new(shape)?;
		let buf = Buffer::new(dtype, elems)?;
		Ok(Self::from_parts(map, buf))
	}

	pub fn zeros(shape: &[usize], dtype: DType) -> Result<Self, ErrPack<TensorOpError>> {
		Self::empty(shape, dtype)
	}

	pub fn ones(shape: &[usize], dtype: DType) -> Result<Self, ErrPack<TensorOpError>> {
		Self::full(shape, Scalar::Int(1), dtype)
	}

	pub fn full(
		shape: &[usize],
		value: impl Into<Scalar>,
		dtype: DType,
	) -> Result<Self, ErrPack<TensorOpError>> {
		let t = Self::empty(shape, dtype)?;
		t.fill_(value)?;
		Ok(t)
	}

	/// New contiguous tensor with the same sizes and dtype.
	pub fn empty_like(&self) -> Result<Self, ErrPack<TensorOpError>> {
		Self::empty(&self.sizes(), self.dtype())
	}

	pub fn zeros_like(&self) -> Result<Self, ErrPack<TensorOpError>> {
		self.empty_like()
	}

	pub fn ones_like(&self) -> Result<Self, ErrPack<TensorOpError>> {
		Self::ones(&self.sizes(), self.dtype())
	}

	/// Copies `data` into a new contiguous tensor of the given shape.
	pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self, ErrPack<TensorOpError>> {
		let t = Self::empty(shape, T::dtype)?;
		if data.len() != t.numel() {
			return Err(error::shape_mismatch(format!(
				"shape {} holds {} elements, but got {} values",
				fmt_sizes(shape.iter().copied()),
				t.numel(),
				data.len()
			)));
		}
		for (cell, &value) in t.contiguous_cells::<T>()?.iter().zip(data) {
			cell.set(value);
		}
		Ok(t)
	}

	/// Resizes to a contiguous tensor of `shape`. Keeps the buffer if it has room for the new
	/// shape starting at the current offset, otherwise switches to a new zeroed buffer.
	///
	/// Other tensors viewing the old buffer are not affected.
	pub fn resize_(&mut self, shape: &[usize]) -> Result<(), ErrPack<TensorOpError>> {
		let (map, elems) = Map::new(shape)?;
		let offset = self.storage_offset();
		if self.buffer().is_in_bounds(offset, elems) {
			self.set_map(map.with_offset(offset));
		} else {
			log::debug!(
				"resize_(): {} -> {}, reallocating {} elements",
				fmt_sizes(self.sizes()),
				fmt_sizes(shape.iter().copied()),
				elems
			);
			let buf = Buffer::new(self.dtype(), elems)?;
			*self = Self::from_parts(map, buf);
		}
		Ok(())
	}

	pub fn zeros_out(&mut self, shape: &[usize]) -> Result<(), ErrPack<TensorOpError>> {
		self.resize_(shape)?;
		self.zero_()
	}

	pub fn ones_out(&mut self, shape: &[usize]) -> Result<(), ErrPack<TensorOpError>> {
		self.resize_(shape)?;
		self.fill_(Scalar::Int(1))
	}

	//----------------------------------------------------------------------------------------------

	/// Sets every element to `value`, converted to the tensor's dtype.
	pub fn fill_(&self, value: impl Into<Scalar>) -> Result<(), ErrPack<TensorOpError>> {
		let value = value.into();
		with_element_type!(self.dtype(), T => {
			let v = T::from_scalar(value);
			apply1::<T>(self, |c| {
				c.set(v);
				ControlFlow::Continue(())
			})?;
		});
		Ok(())
	}

	pub fn zero_(&self) -> Result<(), ErrPack<TensorOpError>> {
		self.fill_(Scalar::Int(0))
	}

	/// Copies elements from `src`, converting them to this tensor's dtype.
	///
	/// Both tensors must have the same number of elements. The shapes may differ.
	pub fn copy_(&self, src: &Self) -> Result<(), ErrPack<TensorOpError>> {
		with_element_type!(self.dtype(), D => {
			with_element_type!(src.dtype(), S => {
				apply2::<D, S>(self, src, |d, s| {
					d.set(D::from_scalar(s.get().to_scalar()));
					ControlFlow::Continue(())
				})?;
			})
		});
		Ok(())
	}

	/// New contiguous tensor with the elements converted to `dtype`.
	pub fn to_dtype(&self, dtype: DType) -> Result<Self, ErrPack<TensorOpError>> {
		let t = Self::empty(&self.sizes(), dtype)?;
		t.copy_(self)?;
		Ok(t)
	}

	/// Returns `self` if it is already contiguous, otherwise a contiguous copy.
	pub fn contiguous(&self) -> Result<Self, ErrPack<TensorOpError>> {
		if self.is_contiguous() {
			return Ok(self.clone());
		}
		let t = self.empty_like()?;
		t.copy_(self)?;
		Ok(t)
	}

	/// Elements in logical (row-major) order.
	pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, ErrPack<TensorOpError>> {
		DTypeMismatchError::check::<T>(self.dtype())?;
		let mut result = Vec::with_capacity(self.numel());
		apply1::<T>(self, |c| {
			result.push(c.get());
			ControlFlow::Continue(())
		})?;
		Ok(result)
	}

	/// Value of the element at `index`, which must have one entry per dimension.
	pub fn get(&self, index: &[usize]) -> Result<Scalar, ErrPack<TensorOpError>> {
		let offset = self.map().index_to_offset(index)?;
		with_element_type!(self.dtype(), T => {
			let cells = self.buffer().cells::<T>()?;
			Ok(cells[offset].get().to_scalar())
		})
	}

	/// Value of the only element.
	pub fn item(&self) -> Result<Scalar, ErrPack<TensorOpError>> {
		if self.numel() != 1 {
			return Err(error::invalid_argument(format!(
				"a tensor with {} elements cannot be converted to a scalar",
				self.numel()
			)));
		}
		let index = vec![0; self.ndim()];
		self.get(&index)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tensor::HasDType;
	use assert_approx_eq::assert_approx_eq;

	#[test]
	fn test_factories() {
		let z = Tensor::zeros(&[2, 3], f32::dtype).unwrap();
		assert_eq!(z.to_vec::<f32>().unwrap(), vec![0.0; 6]);
		let o = z.ones_like().unwrap();
		assert_eq!(o.to_vec::<f32>().unwrap(), vec![1.0; 6]);
		let f = Tensor::full(&[2], 7_i64, i32::dtype).unwrap();
		assert_eq!(f.to_vec::<i32>().unwrap(), vec![7, 7]);
		assert!(Tensor::from_slice(&[1.0_f32, 2.0], &[3]).is_err());
	}

	#[test]
	fn test_copy_casts() {
		let src = Tensor::from_slice(&[1.7_f64, -2.2, 300.0], &[3]).unwrap();
		let dst = Tensor::zeros(&[3], i16::dtype).unwrap();
		dst.copy_(&src).unwrap();
		assert_eq!(dst.to_vec::<i16>().unwrap(), vec![1, -2, 300]);

		let back = dst.to_dtype(f32::dtype).unwrap();
		assert_approx_eq!(back.to_vec::<f32>().unwrap()[2], 300.0);
	}

	#[test]
	fn test_fill_view_writes_through() {
		let t = Tensor::zeros(&[3, 4], i64::dtype).unwrap();
		let col = t.select(1, 2).unwrap();
		col.fill_(5_i64).unwrap();
		assert_eq!(t.to_vec::<i64>().unwrap(), vec![0, 0, 5, 0, 0, 0, 5, 0, 0, 0, 5, 0]);
		assert_eq!(t.get(&[1, 2]).unwrap(), Scalar::Int(5));
		assert!(t.get(&[3, 0]).is_err());
	}

	#[test]
	fn test_contiguous_copies_only_when_needed() {
		let t = Tensor::from_slice(&[1_i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
		let same = t.contiguous().unwrap();
		assert!(same.shares_buffer(&t));

		let tr = t.transpose(0, 1).unwrap();
		let c = tr.contiguous().unwrap();
		assert!(!c.shares_buffer(&t));
		assert!(c.is_contiguous());
		assert_eq!(c.to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
	}

	#[test]
	fn test_resize_keeps_or_reallocates() {
		let mut t = Tensor::zeros(&[2, 3], f32::dtype).unwrap();
		let other = t.clone();
		t.resize_(&[3]).unwrap();
		assert!(t.shares_buffer(&other));
		assert_eq!(t.sizes().as_slice(), &[3]);

		t.resize_(&[4, 4]).unwrap();
		assert!(!t.shares_buffer(&other));
		assert_eq!(t.numel(), 16);
		assert_eq!(other.sizes().as_slice(), &[2, 3]);

		t.ones_out(&[]).unwrap();
		assert_eq!(t.item().unwrap(), Scalar::Float(1.0));
	}
}

//--------------------------------------------------------------------------------------------------
