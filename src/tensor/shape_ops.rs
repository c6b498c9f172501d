//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::rc::Rc;

use crate::ErrPack;
use crate::util::fmt_sizes;

use super::Tensor;
use super::buffer::Buffer;
use super::dim_index::DimIndex;
use super::dtype::DTypeMismatchError;
use super::error::{self, TensorOpError};
use super::map::{Map, SizeVec};

//--------------------------------------------------------------------------------------------------
// Views. Every operation here returns a tensor over the same buffer and never touches elements.

impl Tensor {
	/// Same elements, new shape. Fails with `IncompatibleStrides` if that needs a copy.
	pub fn view(&self, shape: &[usize]) -> Result<Self, ErrPack<TensorOpError>> {
		let elems: Option<usize> = shape.iter().try_fold(1_usize, |acc, &s| acc.checked_mul(s));
		if elems != Some(self.numel()) {
			return Err(error::shape_mismatch(format!(
				"shape {} is invalid for input of size {}",
				fmt_sizes(shape.iter().copied()),
				self.numel()
			)));
		}
		match self.map().reshape(shape) {
			Ok(map) => Ok(self.with_map(map)),
			Err(_) => Err(ErrPack::with_message(
				TensorOpError::IncompatibleStrides,
				format!(
					"view size {} is not compatible with input tensor's size {} and stride {}",
					fmt_sizes(shape.iter().copied()),
					fmt_sizes(self.sizes()),
					fmt_sizes(self.strides())
				),
			)),
		}
	}

	/// Like `view()`, but makes a contiguous copy when the strides don't allow a view.
	pub fn reshape(&self, shape: &[usize]) -> Result<Self, ErrPack<TensorOpError>> {
		match self.view(shape) {
			Err(e) if e.code == TensorOpError::IncompatibleStrides => self.contiguous()?.view(shape),
			result => result,
		}
	}

	/// View with explicit sizes, strides and offset. `None` keeps the current offset.
	///
	/// Every reachable element must be inside the buffer.
	pub fn as_strided(
		&self,
		sizes: &[usize],
		strides: &[usize],
		offset: Option<usize>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		let offset = offset.unwrap_or(self.storage_offset());
		let map = strided_map(self.buffer(), sizes, strides, offset)?;
		Ok(self.with_map(map))
	}

	pub fn as_strided_(
		&mut self,
		sizes: &[usize],
		strides: &[usize],
		offset: Option<usize>,
	) -> Result<(), ErrPack<TensorOpError>> {
		let t = self.as_strided(sizes, strides, offset)?;
		self.set_map(t.map().clone());
		Ok(())
	}

	/// Makes this tensor a view of `source` with explicit sizes, strides and offset.
	///
	/// `source` must hold this tensor's dtype. Other views of the old buffer are not affected.
	pub fn set_storage_(
		&mut self,
		source: &Rc<Buffer>,
		offset: usize,
		sizes: &[usize],
		strides: &[usize],
	) -> Result<(), ErrPack<TensorOpError>> {
		if source.dtype() != self.dtype() {
			return Err(DTypeMismatchError { expected: self.dtype(), actual: source.dtype() }.into());
		}
		let map = strided_map(source, sizes, strides, offset)?;
		*self = Self::from_parts(map, source.clone());
		Ok(())
	}

	/// Makes this tensor the same view as `source`: same buffer, offset, sizes and strides.
	pub fn set_(&mut self, source: &Self) -> Result<(), ErrPack<TensorOpError>> {
		if source.dtype() != self.dtype() {
			return Err(DTypeMismatchError { expected: self.dtype(), actual: source.dtype() }.into());
		}
		*self = source.clone();
		Ok(())
	}

	/// Detaches from the current buffer. The tensor becomes an empty `[0]` of the same dtype.
	pub fn set_empty_(&mut self) -> Result<(), ErrPack<TensorOpError>> {
		*self = Self::empty(&[0], self.dtype())?;
		Ok(())
	}

	/// Is `other` exactly the same view, i.e., same buffer, offset, sizes and strides?
	pub fn is_set_to(&self, other: &Self) -> bool {
		self.shares_buffer(other) && self.map() == other.map()
	}

	/// Drops all dimensions of size 1.
	pub fn squeeze(&self) -> Self {
		self.with_map(self.map().squeeze())
	}

	pub fn squeeze_(&mut self) {
		let map = self.map().squeeze();
		self.set_map(map);
	}

	/// Drops `dim` if it has size 1. A scalar accepts dim `0` or `-1` and stays a scalar.
	pub fn squeeze_dim<D: DimIndex>(&self, dim: D) -> Result<Self, ErrPack<TensorOpError>> {
		if self.ndim() == 0 {
			dim.resolve_index(1)?;
			return Ok(self.clone());
		}
		let dim = dim.resolve_index(self.ndim())?;
		Ok(self.with_map(self.map().squeeze_dim(dim)))
	}

	pub fn squeeze_dim_<D: DimIndex>(&mut self, dim: D) -> Result<(), ErrPack<TensorOpError>> {
		let t = self.squeeze_dim(dim)?;
		self.set_map(t.map().clone());
		Ok(())
	}

	/// Inserts a dimension of size 1 at `dim`, which can be anything in `-(ndim + 1) ..= ndim`.
	pub fn unsqueeze<D: DimIndex>(&self, dim: D) -> Result<Self, ErrPack<TensorOpError>> {
		let dim = dim.resolve_range_bound(self.ndim())?;
		if self.is_empty() {
			return Err(error::unsupported_state(format!(
				"cannot unsqueeze empty tensor of shape {}",
				fmt_sizes(self.sizes())
			)));
		}
		Ok(self.with_map(self.map().unsqueeze(dim)))
	}

	pub fn unsqueeze_<D: DimIndex>(&mut self, dim: D) -> Result<(), ErrPack<TensorOpError>> {
		let t = self.unsqueeze(dim)?;
		self.set_map(t.map().clone());
		Ok(())
	}

	/// `dims` must be a permutation of the dimension indexes.
	pub fn permute<D: DimIndex>(&self, dims: &[D]) -> Result<Self, ErrPack<TensorOpError>> {
		let ndim = self.ndim();
		let perm = dims.iter().map(|&d| d.resolve_index(ndim)).collect::<Result<SizeVec, _>>()?;
		Ok(self.with_map(self.map().permute(&perm)?))
	}

	pub fn transpose<D: DimIndex>(&self, dim0: D, dim1: D) -> Result<Self, ErrPack<TensorOpError>> {
		let ndim = self.ndim();
		let dim0 = dim0.resolve_index(ndim)?;
		let dim1 = dim1.resolve_index(ndim)?;
		Ok(self.with_map(self.map().transpose(dim0, dim1)))
	}

	pub fn transpose_<D: DimIndex>(&mut self, dim0: D, dim1: D) -> Result<(), ErrPack<TensorOpError>> {
		let t = self.transpose(dim0, dim1)?;
		self.set_map(t.map().clone());
		Ok(())
	}

	/// Broadcasts size 1 dimensions to `shape` and prepends new dimensions as needed.
	/// Broadcast dimensions get stride 0.
	pub fn expand(&self, shape: &[usize]) -> Result<Self, ErrPack<TensorOpError>> {
		let target: Vec<Option<usize>> = shape.iter().map(|&s| Some(s)).collect();
		self.expand_with(&target)
	}

	/// Like `expand()`, but a `None` keeps the size of an existing dimension.
	pub fn expand_with(&self, shape: &[Option<usize>]) -> Result<Self, ErrPack<TensorOpError>> {
		Ok(self.with_map(self.map().expand(shape)?))
	}

	/// Keeps `length` entries of `dim`, starting at `start`.
	pub fn narrow<D: DimIndex>(
		&self,
		dim: D,
		start: usize,
		length: usize,
	) -> Result<Self, ErrPack<TensorOpError>> {
		let dim = dim.resolve_index(self.ndim())?;
		match self.map().narrow(dim, start, length) {
			Ok(map) => Ok(self.with_map(map)),
			Err(_) => Err(error::index_out_of_bounds(format!(
				"narrow: start ({start}) + length ({length}) exceeds dimension {dim} of size {}",
				self.map().dims()[dim].size
			))),
		}
	}

	/// Removes `dim` by picking entry `index` from it.
	pub fn select<D: DimIndex>(&self, dim: D, index: usize) -> Result<Self, ErrPack<TensorOpError>> {
		let dim = dim.resolve_index(self.ndim())?;
		match self.map().select(dim, index) {
			Ok(map) => Ok(self.with_map(map)),
			Err(_) => Err(error::index_out_of_bounds(format!(
				"select: index {index} is out of range for dimension {dim} of size {}",
				self.map().dims()[dim].size
			))),
		}
	}

	/// Splits `dim` into slices of `split_size`. The last slice gets the remainder.
	pub fn split<D: DimIndex>(
		&self,
		split_size: usize,
		dim: D,
	) -> Result<Vec<Self>, ErrPack<TensorOpError>> {
		let dim = dim.resolve_index(self.ndim())?;
		let dim_size = self.map().dims()[dim].size;
		if split_size == 0 {
			if dim_size != 0 {
				return Err(error::invalid_argument(format!(
					"split expects split_size be positive, but got split_size=0 for dimension \
					 {dim} of size {dim_size}"
				)));
			}
			return Ok(vec![self.clone()]);
		}

		let num_splits = dim_size.div_ceil(split_size).max(1);
		let mut slices = Vec::with_capacity(num_splits);
		for i in 0..num_splits {
			let start = i * split_size;
			let length = split_size.min(dim_size - start);
			slices.push(self.narrow(dim, start, length)?);
		}
		Ok(slices)
	}

	/// Splits `dim` into `chunks` slices of equal size, except for a shorter last one.
	/// May return fewer than `chunks` slices.
	pub fn chunk<D: DimIndex>(&self, chunks: usize, dim: D) -> Result<Vec<Self>, ErrPack<TensorOpError>> {
		if chunks == 0 {
			return Err(error::invalid_argument("chunk expects `chunks` to be greater than 0"));
		}
		let dim = dim.resolve_index(self.ndim())?;
		let dim_size = self.map().dims()[dim].size;
		self.split(dim_size.div_ceil(chunks), dim)
	}

	/// Sizes equal in every dimension.
	pub fn is_same_size(&self, other: &Self) -> bool {
		self.map().ndim() == other.map().ndim()
			&& self.map().dims().iter().zip(other.map().dims()).all(|(a, b)| a.size == b.size)
	}

	/// Joins tensors of equal shape along a new dimension `dim`.
	pub fn stack<D: DimIndex>(tensors: &[Self], dim: D) -> Result<Self, ErrPack<TensorOpError>> {
		let Some(first) = tensors.first() else {
			return Err(error::invalid_argument("stack expects a non-empty TensorList"));
		};
		let dim = dim.resolve_range_bound(first.ndim())?;
		for (i, t) in tensors.iter().enumerate().skip(1) {
			if !t.is_same_size(first) {
				return Err(error::shape_mismatch(format!(
					"stack expects each tensor to be equal size, but got {} at entry 0 and {} at \
					 entry {i}",
					fmt_sizes(first.sizes()),
					fmt_sizes(t.sizes())
				)));
			}
		}
		let inputs: Vec<Self> = tensors.iter().map(|t| t.with_map(t.map().unsqueeze(dim))).collect();
		Self::cat(&inputs, dim)
	}
}

//--------------------------------------------------------------------------------------------------

/// Builds a map and checks that every element it reaches is inside `buf`.
fn strided_map(
	buf: &Buffer,
	sizes: &[usize],
	strides: &[usize],
	offset: usize,
) -> Result<Map, ErrPack<TensorOpError>> {
	let map = Map::from_parts(sizes, strides, offset)?;
	if let Some(span) = map.span()? {
		if !buf.is_in_bounds(span.start, span.len()) {
			return Err(error::index_out_of_bounds(format!(
				"as_strided: sizes {}, strides {} and offset {offset} reach element {}, but the \
				 buffer only has {} elements",
				fmt_sizes(sizes.iter().copied()),
				fmt_sizes(strides.iter().copied()),
				span.end - 1,
				buf.elems()
			)));
		}
	}
	Ok(map)
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
