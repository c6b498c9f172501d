//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use super::map::SizeAndStride;

//--------------------------------------------------------------------------------------------------
// I expect that 99.99% of the time, the DimVec will use inline storage.
// Functions that would spill to the heap are never inlined to avoid code bloat.

pub const INLINE_DIMS: usize = 5;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct DimVec {
	vec: SmallVec<[SizeAndStride; INLINE_DIMS]>,
}

impl DimVec {
	#[inline(never)]
	fn with_large_capacity(capacity: usize) -> Self {
		Self { vec: SmallVec::with_capacity(capacity) }
	}

	pub fn with_capacity(capacity: usize) -> Self {
		if capacity <= INLINE_DIMS {
			Self { vec: SmallVec::new() }
		} else {
			Self::with_large_capacity(capacity)
		}
	}

	pub fn new() -> Self {
		Self { vec: SmallVec::new() }
	}

	pub fn new_from_iter<I: IntoIterator<Item = SizeAndStride>>(iter: I) -> Self
	where
		I::IntoIter: ExactSizeIterator,
	{
		let iter = iter.into_iter();
		let mut t = Self::with_capacity(iter.len());
		t.vec.extend(iter);
		t
	}

	pub fn from_slice(dims: &[SizeAndStride]) -> Self {
		Self { vec: SmallVec::from_slice(dims) }
	}

	#[inline(never)]
	fn push_large(&mut self, dim: SizeAndStride) {
		self.vec.push(dim);
	}

	pub fn push(&mut self, dim: SizeAndStride) {
		if self.vec.len() < self.vec.capacity() {
			self.vec.push(dim);
		} else {
			self.push_large(dim);
		}
	}

	/// Panics if `index > len`.
	pub fn insert(&mut self, index: usize, dim: SizeAndStride) {
		self.vec.insert(index, dim);
	}

	/// Panics if `index >= len`.
	pub fn remove(&mut self, index: usize) -> SizeAndStride {
		self.vec.remove(index)
	}

	pub fn retain(&mut self, f: impl FnMut(&mut SizeAndStride) -> bool) {
		self.vec.retain(f);
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.vec.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.vec.is_empty()
	}

	pub fn as_slice(&self) -> &[SizeAndStride] {
		self.vec.as_slice()
	}
}

impl Deref for DimVec {
	type Target = [SizeAndStride];

	fn deref(&self) -> &Self::Target {
		&self.vec
	}
}

impl DerefMut for DimVec {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.vec
	}
}

impl std::fmt::Debug for DimVec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.vec.iter()).finish()
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn dim(size: usize, stride: usize) -> SizeAndStride {
		SizeAndStride { size, stride }
	}

	#[test]
	fn test_spills_past_inline_capacity() {
		let mut v = DimVec::new();
		for i in 0..(INLINE_DIMS + 2) {
			v.push(dim(i + 1, 1));
		}
		assert_eq!(v.len(), INLINE_DIMS + 2);
		assert_eq!(v[INLINE_DIMS + 1], dim(INLINE_DIMS + 2, 1));
		let c = v.clone();
		assert_eq!(c, v);
	}

	#[test]
	fn test_insert_remove() {
		let mut v = DimVec::from_slice(&[dim(2, 3), dim(3, 1)]);
		v.insert(1, dim(1, 3));
		assert_eq!(v.as_slice(), &[dim(2, 3), dim(1, 3), dim(3, 1)]);
		assert_eq!(v.remove(0), dim(2, 3));
		v.retain(|d| d.size != 1);
		assert_eq!(v.as_slice(), &[dim(3, 1)]);
	}
}

//--------------------------------------------------------------------------------------------------
