//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use bit_set::BitSet;
use smallvec::SmallVec;

use crate::ErrPack;
use crate::util::fmt_sizes;

use super::dim_merger::{self, ReshapeError};
use super::dim_vec::{DimVec, INLINE_DIMS};
use super::error::{self, TensorOpError};

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct SizeAndStride {
	pub size: usize,
	pub stride: usize,
}

pub type SizeVec = SmallVec<[usize; INLINE_DIMS]>;

//--------------------------------------------------------------------------------------------------

/// The total number of elements in a tensor is larger than the maximum allowed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ElementsOverflowError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct IndexOutOfBoundsError;

//--------------------------------------------------------------------------------------------------

pub struct StrideCounter {
	pub elems: usize,
	pub nonzero_elems: usize,
}

impl Default for StrideCounter {
	fn default() -> Self {
		Self::new()
	}
}

impl StrideCounter {
	pub fn new() -> Self {
		Self { elems: 1, nonzero_elems: 1 }
	}

	pub fn prepend_dim(&mut self, size: usize) -> Result<SizeAndStride, ElementsOverflowError> {
		// Check that if we ignore zero length dimensions, the number of elements does not
		// overflow. This is done to make sure our calculations would not overflow even if we
		// had the same dimensions but in different order.
		if size != 0 {
			let Some(e) = self.nonzero_elems.checked_mul(size) else {
				return Err(ElementsOverflowError);
			};
			self.nonzero_elems = e;
		}

		let stride = self.elems;
		self.elems *= size;

		Ok(SizeAndStride { size, stride })
	}

	pub fn elems(&self) -> usize {
		self.elems
	}
}

/// Number of elements of `dims`, checked the same way `Map::new()` checks a shape.
fn checked_elems(dims: &[SizeAndStride]) -> Result<usize, ElementsOverflowError> {
	let mut counter = StrideCounter::new();
	for dim in dims.iter().rev() {
		counter.prepend_dim(dim.size)?;
	}
	Ok(counter.elems())
}

//--------------------------------------------------------------------------------------------------

/// Maps a logical index to an element offset in a buffer.
///
/// `dims` are in the usual order, i.e., the last one is the innermost.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Map {
	dims: DimVec,
	offset: usize,
}

impl Map {
	/// Creates a contiguous map for `shape`. Returns the map and the number of elements.
	pub fn new(shape: &[usize]) -> Result<(Self, usize), ElementsOverflowError> {
		let mut dims = DimVec::new_from_iter(shape.iter().map(|&size| SizeAndStride { size, stride: 0 }));

		let mut stride_counter = StrideCounter::new();
		for dim in dims.iter_mut().rev() {
			*dim = stride_counter.prepend_dim(dim.size)?;
		}
		let elems = stride_counter.elems();
		Ok((Self { dims, offset: 0 }, elems))
	}

	/// Builds a map from explicit sizes and strides.
	///
	/// Only checks that both lists have the same length; see `Tensor::as_strided()` for the
	/// bounds check against a buffer.
	pub fn from_parts(
		sizes: &[usize],
		strides: &[usize],
		offset: usize,
	) -> Result<Self, ErrPack<TensorOpError>> {
		if sizes.len() != strides.len() {
			return Err(error::invalid_argument(format!(
				"mismatch in length of sizes ({}) and strides ({})",
				sizes.len(),
				strides.len()
			)));
		}
		let dims = DimVec::new_from_iter(
			sizes.iter().zip(strides).map(|(&size, &stride)| SizeAndStride { size, stride }),
		);
		checked_elems(&dims)?;
		Ok(Self { dims, offset })
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn with_offset(mut self, offset: usize) -> Self {
		self.offset = offset;
		self
	}

	pub fn ndim(&self) -> usize {
		self.dims.len()
	}

	pub fn dims(&self) -> &[SizeAndStride] {
		self.dims.as_slice()
	}

	pub fn sizes(&self) -> SizeVec {
		self.dims.iter().map(|dim| dim.size).collect()
	}

	pub fn strides(&self) -> SizeVec {
		self.dims.iter().map(|dim| dim.stride).collect()
	}

	/// Product of all sizes. A map with no dimensions has exactly one element.
	///
	/// Every constructor checks that the product of the non-zero sizes fits in `usize`.
	pub fn elems(&self) -> usize {
		if self.is_empty() {
			return 0;
		}
		self.dims.iter().map(|dim| dim.size).product()
	}

	pub fn is_empty(&self) -> bool {
		self.dims.iter().any(|dim| dim.size == 0)
	}

	/// Row-major iteration visits increasing offsets with no gaps.
	pub fn is_contiguous(&self) -> bool {
		if self.is_empty() {
			return true;
		}
		let mut expected = 1;
		for dim in self.dims.iter().rev() {
			if dim.size != 1 {
				if dim.stride != expected {
					return false;
				}
				expected *= dim.size;
			}
		}
		true
	}

	/// Range of element offsets that can be reached, or `None` if there are no elements.
	pub fn span(&self) -> Result<Option<std::ops::Range<usize>>, ElementsOverflowError> {
		if self.is_empty() {
			return Ok(None);
		}
		let mut last = self.offset;
		for dim in self.dims.iter() {
			let reach = (dim.size - 1).checked_mul(dim.stride).ok_or(ElementsOverflowError)?;
			last = last.checked_add(reach).ok_or(ElementsOverflowError)?;
		}
		Ok(Some(self.offset..last + 1))
	}

	/// Element offset of a full logical index.
	pub fn index_to_offset(&self, index: &[usize]) -> Result<usize, ErrPack<TensorOpError>> {
		if index.len() != self.ndim() {
			return Err(error::invalid_argument(format!(
				"index has {} entries but the tensor has {} dimensions",
				index.len(),
				self.ndim()
			)));
		}
		let mut offset = self.offset;
		for (i, (&idx, dim)) in index.iter().zip(self.dims.iter()).enumerate() {
			if idx >= dim.size {
				return Err(error::index_out_of_bounds(format!(
					"index {idx} is out of bounds for dimension {i} with size {}",
					dim.size
				)));
			}
			offset += idx * dim.stride;
		}
		Ok(offset)
	}

	//----------------------------------------------------------------------------------------------
	// Geometry. All dimension indexes are already resolved.

	/// Drops every dimension of size 1.
	pub fn squeeze(&self) -> Self {
		let mut dims = self.dims.clone();
		dims.retain(|dim| dim.size != 1);
		Self { dims, offset: self.offset }
	}

	/// Drops `dim` if its size is 1, otherwise returns an identical map.
	pub fn squeeze_dim(&self, dim: usize) -> Self {
		let mut dims = self.dims.clone();
		if dims[dim].size == 1 {
			dims.remove(dim);
		}
		Self { dims, offset: self.offset }
	}

	/// Inserts a size 1 dimension at `dim`, where `dim <= ndim`.
	pub fn unsqueeze(&self, dim: usize) -> Self {
		let stride = match self.dims.get(dim) {
			Some(next) => next.size * next.stride,
			None => 1,
		};
		let mut dims = self.dims.clone();
		dims.insert(dim, SizeAndStride { size: 1, stride });
		Self { dims, offset: self.offset }
	}

	/// `perm` holds resolved indexes, but may still have the wrong length or repeats.
	pub fn permute(&self, perm: &[usize]) -> Result<Self, ErrPack<TensorOpError>> {
		let ndim = self.ndim();
		if perm.len() != ndim {
			return Err(error::invalid_argument(format!(
				"number of dims don't match in permute: tensor has {ndim} dims, got {} dims {}",
				perm.len(),
				fmt_sizes(perm.iter().copied())
			)));
		}
		let mut seen = BitSet::with_capacity(ndim);
		let mut dims = DimVec::with_capacity(ndim);
		for &p in perm {
			if !seen.insert(p) {
				return Err(error::invalid_argument(format!(
					"repeated dim {p} in permute {}",
					fmt_sizes(perm.iter().copied())
				)));
			}
			dims.push(self.dims[p]);
		}
		Ok(Self { dims, offset: self.offset })
	}

	pub fn transpose(&self, dim0: usize, dim1: usize) -> Self {
		let mut dims = self.dims.clone();
		dims.swap(dim0, dim1);
		Self { dims, offset: self.offset }
	}

	/// Broadcasts to `target`. `None` keeps the existing size of that dimension.
	pub fn expand(&self, target: &[Option<usize>]) -> Result<Self, ErrPack<TensorOpError>> {
		let ndim = self.ndim();
		if target.len() < ndim {
			return Err(error::invalid_argument(format!(
				"the number of sizes provided ({}) must be greater or equal to the number of \
				 dimensions in the tensor ({ndim})",
				target.len()
			)));
		}
		let n_new = target.len() - ndim;
		let mut dims = DimVec::with_capacity(target.len());
		for (i, &t) in target.iter().enumerate() {
			if i < n_new {
				let Some(size) = t else {
					return Err(error::invalid_argument(format!(
						"the expanded size must be given for the new leading dimension {i}"
					)));
				};
				dims.push(SizeAndStride { size, stride: 0 });
				continue;
			}
			let old = self.dims[i - n_new];
			let new = match t {
				None => old,
				Some(size) if size == old.size => old,
				Some(size) if old.size == 1 => SizeAndStride { size, stride: 0 },
				Some(size) => {
					return Err(error::shape_mismatch(format!(
						"the expanded size of the tensor ({size}) must match the existing size \
						 ({}) at non-singleton dimension {i}; target sizes: {:?}, tensor sizes: {}",
						old.size,
						target,
						fmt_sizes(self.sizes())
					)));
				},
			};
			dims.push(new);
		}
		if checked_elems(&dims).is_err() {
			return Err(ErrPack::with_message(
				TensorOpError::ElementsOverflow,
				format!(
					"cannot expand {} to {target:?}: the number of elements does not fit in usize",
					fmt_sizes(self.sizes())
				),
			));
		}
		Ok(Self { dims, offset: self.offset })
	}

	/// Keeps `len` entries of `dim` starting at `start`.
	pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self, IndexOutOfBoundsError> {
		let d = self.dims[dim];
		let end = start.checked_add(len).ok_or(IndexOutOfBoundsError)?;
		if end > d.size {
			return Err(IndexOutOfBoundsError);
		}
		let mut dims = self.dims.clone();
		dims[dim].size = len;
		let offset = if len == 0 { self.offset } else { self.offset + start * d.stride };
		Ok(Self { dims, offset })
	}

	/// Removes `dim`, fixing its index to `index`.
	pub fn select(&self, dim: usize, index: usize) -> Result<Self, IndexOutOfBoundsError> {
		let d = self.dims[dim];
		if index >= d.size {
			return Err(IndexOutOfBoundsError);
		}
		let mut dims = self.dims.clone();
		dims.remove(dim);
		Ok(Self { dims, offset: self.offset + index * d.stride })
	}

	/// Same elements, new shape, no copy. Fails if the strides cannot express the new shape.
	pub fn reshape(&self, to_shape: &[usize]) -> Result<Self, ReshapeError> {
		let (contiguous, elems) = Self::new(to_shape).map_err(|_| ReshapeError)?;
		if elems != self.elems() {
			return Err(ReshapeError);
		}
		if elems == 0 {
			return Ok(contiguous.with_offset(self.offset));
		}
		let dims = dim_merger::reshape_dims(self.dims(), to_shape)?;
		Ok(Self { dims, offset: self.offset })
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn map(sizes: &[usize], strides: &[usize]) -> Map {
		Map::from_parts(sizes, strides, 0).unwrap()
	}

	#[test]
	fn test_new_is_row_major() {
		let (m, elems) = Map::new(&[2, 3, 4]).unwrap();
		assert_eq!(elems, 24);
		assert_eq!(m.strides().as_slice(), &[12, 4, 1]);
		assert!(m.is_contiguous());

		let (scalar, elems) = Map::new(&[]).unwrap();
		assert_eq!(elems, 1);
		assert_eq!(scalar.ndim(), 0);
		assert_eq!(scalar.elems(), 1);
	}

	#[test]
	fn test_overflow_detected() {
		assert!(Map::new(&[usize::MAX, 2]).is_err());
		// a zero sized dim does not hide an overflow in the others
		assert!(Map::new(&[0, usize::MAX, 2]).is_err());
	}

	#[test]
	fn test_contiguity_ignores_size_one() {
		assert!(map(&[3, 1, 4], &[4, 99, 1]).is_contiguous());
		assert!(!map(&[4, 3], &[1, 4]).is_contiguous());
		assert!(map(&[0, 3], &[7, 7]).is_contiguous());
	}

	#[test]
	fn test_span() {
		let m = map(&[2, 3], &[10, 2]).with_offset(5);
		assert_eq!(m.span().unwrap(), Some(5..20));
		assert_eq!(map(&[2, 0], &[1, 1]).span().unwrap(), None);
		assert_eq!(map(&[4], &[0]).span().unwrap(), Some(0..1));
	}

	#[test]
	fn test_unsqueeze_strides() {
		let (m, _) = Map::new(&[3, 4]).unwrap();
		assert_eq!(m.unsqueeze(0).strides().as_slice(), &[12, 4, 1]);
		assert_eq!(m.unsqueeze(1).strides().as_slice(), &[4, 4, 1]);
		assert_eq!(m.unsqueeze(2).strides().as_slice(), &[4, 1, 1]);
		assert_eq!(m.unsqueeze(2).sizes().as_slice(), &[3, 4, 1]);
	}

	#[test]
	fn test_squeeze_keeps_order() {
		let m = map(&[1, 3, 1, 2], &[9, 5, 7, 1]);
		let s = m.squeeze();
		assert_eq!(s.sizes().as_slice(), &[3, 2]);
		assert_eq!(s.strides().as_slice(), &[5, 1]);
		assert_eq!(m.squeeze_dim(1), m);
		assert_eq!(m.squeeze_dim(2).sizes().as_slice(), &[1, 3, 2]);
	}

	#[test]
	fn test_permute_errors() {
		let (m, _) = Map::new(&[2, 3, 4]).unwrap();
		let err = m.permute(&[0, 1]).unwrap_err();
		assert_eq!(err.code, TensorOpError::InvalidArgument);
		let err = m.permute(&[0, 1, 1]).unwrap_err();
		assert!(err.message().contains("repeated dim"));
		let p = m.permute(&[2, 0, 1]).unwrap();
		assert_eq!(p.sizes().as_slice(), &[4, 2, 3]);
		assert_eq!(p.strides().as_slice(), &[1, 12, 4]);
	}

	#[test]
	fn test_expand() {
		let (m, _) = Map::new(&[1, 5]).unwrap();
		let e = m.expand(&[Some(3), Some(5)]).unwrap();
		assert_eq!(e.sizes().as_slice(), &[3, 5]);
		assert_eq!(e.strides().as_slice(), &[0, 1]);

		let e = m.expand(&[None, Some(1), Some(5)]).unwrap_err();
		assert_eq!(e.code, TensorOpError::InvalidArgument);

		let e = m.expand(&[Some(2), Some(4), None]).unwrap();
		assert_eq!(e.sizes().as_slice(), &[2, 4, 5]);
		assert_eq!(e.strides().as_slice(), &[0, 0, 1]);

		assert_eq!(m.expand(&[Some(3)]).unwrap_err().code, TensorOpError::InvalidArgument);
		assert_eq!(m.expand(&[Some(3), Some(6)]).unwrap_err().code, TensorOpError::ShapeMismatch);
	}

	#[test]
	fn test_element_count_overflow() {
		let (m, _) = Map::new(&[1, 1]).unwrap();
		let err = m.expand(&[Some(usize::MAX / 2), Some(3)]).unwrap_err();
		assert_eq!(err.code, TensorOpError::ElementsOverflow);
		assert!(err.message().contains("[1, 1]"));
		let err = m.expand(&[Some(usize::MAX), Some(2), None]).unwrap_err();
		assert_eq!(err.code, TensorOpError::ElementsOverflow);

		let err = Map::from_parts(&[usize::MAX, 3], &[0, 0], 0).unwrap_err();
		assert_eq!(err.code, TensorOpError::ElementsOverflow);

		// a zero sized dim makes the map empty, but the other sizes must still fit
		let e = Map::from_parts(&[usize::MAX, 0], &[0, 0], 0).unwrap();
		assert_eq!(e.elems(), 0);
		assert!(Map::from_parts(&[usize::MAX, 2, 0], &[0, 0, 0], 0).is_err());

		let big = m.expand(&[Some(usize::MAX), None]).unwrap();
		assert_eq!(big.elems(), usize::MAX);
	}

	#[test]
	fn test_narrow_select() {
		let (m, _) = Map::new(&[4, 5]).unwrap();
		let n = m.narrow(1, 2, 3).unwrap();
		assert_eq!(n.offset(), 2);
		assert_eq!(n.sizes().as_slice(), &[4, 3]);
		assert!(m.narrow(1, 3, 3).is_err());
		let s = m.select(0, 2).unwrap();
		assert_eq!(s.offset(), 10);
		assert_eq!(s.sizes().as_slice(), &[5]);
		assert!(m.select(0, 4).is_err());
	}

	#[test]
	fn test_reshape() {
		let (m, _) = Map::new(&[2, 3, 4]).unwrap();
		let r = m.reshape(&[6, 4]).unwrap();
		assert_eq!(r.strides().as_slice(), &[4, 1]);
		assert!(m.reshape(&[5, 5]).is_err());

		// a transposed map cannot be flattened without a copy
		let t = m.transpose(1, 2);
		assert!(t.reshape(&[24]).is_err());
		// but its untouched leading dimension can be split
		let r = t.reshape(&[2, 1, 4, 3]).unwrap();
		assert_eq!(r.strides().as_slice(), &[12, 12, 1, 4]);
	}
}

//--------------------------------------------------------------------------------------------------
