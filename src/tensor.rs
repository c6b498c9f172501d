//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::Cell;
use std::rc::Rc;

use crate::ErrPack;

pub mod apply;
pub mod buffer;
pub mod concat;
pub mod conv_geometry;
pub mod dim_index;
pub mod dim_merger;
pub mod dim_vec;
pub mod dtype;
pub mod error;
pub mod factory;
pub mod map;
pub mod reduce;
pub mod shape_ops;


pub use apply::{ApplyOptions, apply1, apply2, apply2_with, apply3, traverse};
pub use buffer::Buffer;
pub use dim_index::DimIndex;
pub use dtype::{DType, Element, HasDType, Scalar};
pub use error::{ErrorCategory, TensorOpError};
pub use map::{Map, SizeAndStride, SizeVec};
pub use reduce::ReduceOp;

//--------------------------------------------------------------------------------------------------

/// A strided view into a shared `Buffer`.
///
/// Cloning a tensor creates another view of the same memory. Writes through one view
/// are visible through every other view of the buffer.
///
/// Every element reachable through `map` is inside the buffer. All constructors
/// maintain this, so element access never goes out of bounds.
#[derive(Clone, Debug)]
pub struct Tensor {
	map: Map,
	buf: Rc<Buffer>,
}

impl Tensor {
	/// The caller must make sure `map` stays inside `buf`.
	pub(crate) fn from_parts(map: Map, buf: Rc<Buffer>) -> Self {
		debug_assert!(
			map.span()
				.ok()
				.is_some_and(|span| span.is_none_or(|s| buf.is_in_bounds(s.start, s.len())))
		);
		Self { map, buf }
	}

	pub(crate) fn with_map(&self, map: Map) -> Self {
		Self::from_parts(map, self.buf.clone())
	}

	pub(crate) fn set_map(&mut self, map: Map) {
		self.map = map;
	}

	pub fn map(&self) -> &Map {
		&self.map
	}

	pub fn buffer(&self) -> &Rc<Buffer> {
		&self.buf
	}

	pub fn dtype(&self) -> DType {
		self.buf.dtype()
	}

	pub fn ndim(&self) -> usize {
		self.map.ndim()
	}

	/// Number of elements. A tensor with no dimensions holds one element.
	pub fn numel(&self) -> usize {
		self.map.elems()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn is_contiguous(&self) -> bool {
		self.map.is_contiguous()
	}

	pub fn storage_offset(&self) -> usize {
		self.map.offset()
	}

	pub fn sizes(&self) -> SizeVec {
		self.map.sizes()
	}

	pub fn strides(&self) -> SizeVec {
		self.map.strides()
	}

	pub fn size<D: DimIndex>(&self, dim: D) -> Result<usize, ErrPack<TensorOpError>> {
		let dim = dim.resolve_index(self.ndim())?;
		Ok(self.map.dims()[dim].size)
	}

	pub fn stride<D: DimIndex>(&self, dim: D) -> Result<usize, ErrPack<TensorOpError>> {
		let dim = dim.resolve_index(self.ndim())?;
		Ok(self.map.dims()[dim].stride)
	}

	/// Do both tensors view the same buffer?
	pub fn shares_buffer(&self, other: &Self) -> bool {
		Buffer::same_memory(&self.buf, &other.buf)
	}

	/// Elements of a contiguous tensor, in logical order.
	pub(crate) fn contiguous_cells<T: Element>(&self) -> Result<&[Cell<T>], ErrPack<TensorOpError>> {
		if !self.is_contiguous() {
			return Err(error::unsupported_state("expected a contiguous tensor"));
		}
		let cells = self.buf.cells::<T>()?;
		let start = self.map.offset();
		let numel = self.numel();
		if numel == 0 {
			return Ok(&cells[..0]);
		}
		Ok(&cells[start..start + numel])
	}
}

//--------------------------------------------------------------------------------------------------
