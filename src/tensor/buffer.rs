//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use super::dtype::{DType, DTypeMismatchError, Element};

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct BufferAllocFailedError;

/// Flat, zero-initialized element storage.
///
/// A buffer is shared through `Rc` by every tensor that views it. Elements are only ever
/// exposed as `Cell<T>`, so any number of views may read and write the same memory from
/// the owning thread. There is no locking and `Buffer` is neither `Send` nor `Sync`.
pub struct Buffer {
	memory: NonNull<u8>,
	dtype: DType,
	elems: usize,
}

impl Buffer {
	fn layout(dtype: DType, elems: usize) -> Option<Layout> {
		let size = dtype.array_bytes(elems)?;
		Layout::from_size_align(size, dtype.align()).ok()
	}

	#[inline(never)]
	pub fn new(dtype: DType, elems: usize) -> Result<Rc<Self>, BufferAllocFailedError> {
		let Some(layout) = Self::layout(dtype, elems) else {
			return Err(BufferAllocFailedError);
		};
		let memory = if layout.size() == 0 {
			// dangling but well aligned, never dereferenced
			NonNull::<u64>::dangling().cast::<u8>()
		} else {
			// SAFETY: layout has non-zero size
			match NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) }) {
				Some(memory) => memory,
				None => return Err(BufferAllocFailedError),
			}
		};
		log::trace!("Buffer::new(): dtype={dtype}, elems={elems}, bytes={}", layout.size());
		Ok(Rc::new(Self { memory, dtype, elems }))
	}

	#[inline]
	pub fn dtype(&self) -> DType {
		self.dtype
	}

	#[inline]
	pub fn elems(&self) -> usize {
		self.elems
	}

	#[inline]
	pub fn size_bytes(&self) -> usize {
		self.elems * self.dtype.bytes()
	}

	/// Is `[offset, offset + len)` inside the buffer?
	pub fn is_in_bounds(&self, offset: usize, len: usize) -> bool {
		offset.checked_add(len).is_some_and(|end| end <= self.elems)
	}

	/// The whole buffer as a slice of cells.
	pub fn cells<T: Element>(&self) -> Result<&[Cell<T>], DTypeMismatchError> {
		DTypeMismatchError::check::<T>(self.dtype)?;
		debug_assert!(T::dtype.bytes() == std::mem::size_of::<T>());
		// SAFETY: the memory holds `elems` initialized values of `T` and is only accessed
		// through `Cell`s, which have the same layout as `T`.
		Ok(unsafe { std::slice::from_raw_parts(self.memory.as_ptr().cast::<Cell<T>>(), self.elems) })
	}

	pub fn same_memory(a: &Rc<Self>, b: &Rc<Self>) -> bool {
		Rc::ptr_eq(a, b)
	}
}

impl Drop for Buffer {
	fn drop(&mut self) {
		if let Some(layout) = Self::layout(self.dtype, self.elems) {
			if layout.size() != 0 {
				// SAFETY: allocated in `new()` with the same layout
				unsafe { std::alloc::dealloc(self.memory.as_ptr(), layout) };
			}
		}
	}
}

impl std::fmt::Debug for Buffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Buffer {{ dtype: {}, elems: {} }}", self.dtype, self.elems)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tensor::HasDType;

	#[test]
	fn test_zeroed_and_shared_writes() {
		let buf = Buffer::new(f32::dtype, 6).unwrap();
		let a = buf.cells::<f32>().unwrap();
		let b = buf.cells::<f32>().unwrap();
		assert!(a.iter().all(|c| c.get() == 0.0));
		a[3].set(2.5);
		assert_eq!(b[3].get(), 2.5);
		assert_eq!(buf.size_bytes(), 24);
	}

	#[test]
	fn test_dtype_checked() {
		let buf = Buffer::new(i32::dtype, 2).unwrap();
		assert!(buf.cells::<f32>().is_err());
		assert!(buf.cells::<i32>().is_ok());
	}

	#[test]
	fn test_empty_buffer() {
		let buf = Buffer::new(f64::dtype, 0).unwrap();
		assert_eq!(buf.cells::<f64>().unwrap().len(), 0);
		assert!(buf.is_in_bounds(0, 0));
		assert!(!buf.is_in_bounds(0, 1));
	}
}

//--------------------------------------------------------------------------------------------------
