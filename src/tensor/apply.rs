//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::Cell;
use std::ops::ControlFlow;

use crate::ErrPack;
use crate::util::fmt_sizes;

use super::Tensor;
use super::dim_merger::ContiguityPlan;
use super::dtype::Element;
use super::error::{self, TensorOpError};
use super::map::{Map, SizeAndStride};

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyOptions {
	/// Allow collapsing a fully contiguous tensor into a single run.
	pub allow_contiguous: bool,

	/// Dimension that is never merged with its neighbours.
	/// Only applies to tensors that have this dimension.
	pub exclude_dim: Option<usize>,
}

impl Default for ApplyOptions {
	fn default() -> Self {
		Self { allow_contiguous: true, exclude_dim: None }
	}
}

impl ApplyOptions {
	pub fn excluding(dim: usize) -> Self {
		Self { allow_contiguous: true, exclude_dim: Some(dim) }
	}
}

//--------------------------------------------------------------------------------------------------

struct Cursor {
	plan: ContiguityPlan,
	offset: usize,
	inner: SizeAndStride,

	/// position in the inner run
	i: usize,
}

impl Cursor {
	fn new(map: &Map, options: ApplyOptions) -> Self {
		let exclude_dim = options.exclude_dim.filter(|&dim| dim < map.ndim());
		let plan = ContiguityPlan::new(map.dims(), exclude_dim, options.allow_contiguous);
		let inner = plan.inner();
		Self { plan, offset: map.offset(), inner, i: 0 }
	}
}

#[cold]
#[inline(never)]
fn numel_mismatch(a: &Map, b: &Map) -> ErrPack<TensorOpError> {
	error::shape_mismatch(format!(
		"inconsistent tensor size, expected {} and {} to have the same number of elements, \
		 but got {} and {} elements respectively",
		fmt_sizes(a.sizes()),
		fmt_sizes(b.sizes()),
		a.elems(),
		b.elems(),
	))
}

/// Walks `N` maps with equal element counts in lockstep.
///
/// Each map is walked in its own row-major order, so the n-th call to `visit` gets the
/// offsets of the n-th element of every map. Runs of elements that are adjacent in memory
/// are walked in a tight loop.
///
/// `visit` can stop the walk early by returning `ControlFlow::Break`. The break is passed on
/// to the caller. Fails without calling `visit` if the element counts differ.
pub fn traverse<const N: usize>(
	maps: [&Map; N],
	options: ApplyOptions,
	mut visit: impl FnMut([usize; N]) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, ErrPack<TensorOpError>> {
	let Some(first) = maps.first() else {
		return Ok(ControlFlow::Continue(()));
	};
	let elems = first.elems();
	for map in &maps[1..] {
		if map.elems() != elems {
			return Err(numel_mismatch(first, map));
		}
	}
	if elems == 0 {
		return Ok(ControlFlow::Continue(()));
	}

	let mut cursors = maps.map(|map| Cursor::new(map, options));
	log::trace!(
		"traverse(): elems={elems}, runs={:?}",
		cursors.each_ref().map(|c| c.plan.depth())
	);

	loop {
		// all cursors can advance this many elements without a carry
		let steps = cursors.iter().map(|c| c.inner.size - c.i).min().unwrap_or(0);

		for _ in 0..steps {
			if visit(cursors.each_ref().map(|c| c.offset)).is_break() {
				return Ok(ControlFlow::Break(()));
			}
			for c in &mut cursors {
				c.offset += c.inner.stride;
			}
		}

		let mut finished = false;
		for c in &mut cursors {
			c.i += steps;
			if c.i == c.inner.size {
				c.i = 0;
				if !c.plan.next_run(&mut c.offset) {
					finished = true;
				}
			}
		}
		if finished {
			return Ok(ControlFlow::Continue(()));
		}
	}
}

//--------------------------------------------------------------------------------------------------

pub fn apply1<A: Element>(
	a: &Tensor,
	mut op: impl FnMut(&Cell<A>) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, ErrPack<TensorOpError>> {
	let a_cells = a.buffer().cells::<A>()?;
	traverse([a.map()], ApplyOptions::default(), |[i]| op(&a_cells[i]))
}

/// Calls `op` on every pair of aligned elements.
///
/// The tensors must have the same number of elements, but their shapes may differ.
/// They may also view the same buffer.
pub fn apply2<A: Element, B: Element>(
	a: &Tensor,
	b: &Tensor,
	op: impl FnMut(&Cell<A>, &Cell<B>) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, ErrPack<TensorOpError>> {
	apply2_with(a, b, ApplyOptions::default(), op)
}

pub fn apply2_with<A: Element, B: Element>(
	a: &Tensor,
	b: &Tensor,
	options: ApplyOptions,
	mut op: impl FnMut(&Cell<A>, &Cell<B>) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, ErrPack<TensorOpError>> {
	let a_cells = a.buffer().cells::<A>()?;
	let b_cells = b.buffer().cells::<B>()?;
	traverse([a.map(), b.map()], options, |[i, j]| op(&a_cells[i], &b_cells[j]))
}

pub fn apply3<A: Element, B: Element, C: Element>(
	a: &Tensor,
	b: &Tensor,
	c: &Tensor,
	mut op: impl FnMut(&Cell<A>, &Cell<B>, &Cell<C>) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, ErrPack<TensorOpError>> {
	let a_cells = a.buffer().cells::<A>()?;
	let b_cells = b.buffer().cells::<B>()?;
	let c_cells = c.buffer().cells::<C>()?;
	traverse([a.map(), b.map(), c.map()], ApplyOptions::default(), |[i, j, k]| {
		op(&a_cells[i], &b_cells[j], &c_cells[k])
	})
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tensor::HasDType;

	fn iota(shape: &[usize]) -> Tensor {
		let n: usize = shape.iter().product();
		let data: Vec<f32> = (0..n).map(|i| i as f32).collect();
		Tensor::from_slice(&data, shape).unwrap()
	}

	fn offsets_of(map: &Map, options: ApplyOptions) -> Vec<usize> {
		let mut result = Vec::new();
		traverse([map], options, |[i]| {
			result.push(i);
			ControlFlow::Continue(())
		})
		.unwrap();
		result
	}

	#[test]
	fn test_contiguous_visits_in_buffer_order() {
		let t = iota(&[2, 3, 4]);
		let offsets = offsets_of(t.map(), ApplyOptions::default());
		assert_eq!(offsets, (0..24).collect::<Vec<_>>());
	}

	#[test]
	fn test_permuted_against_contiguous() {
		let a = iota(&[3, 4]);
		let p = a.permute(&[1, 0]).unwrap();
		assert_eq!(p.strides().as_slice(), &[1, 4]);
		assert!(!p.is_contiguous());

		let out = Tensor::zeros(&[4, 3], f32::dtype).unwrap();
		let mut visits = 0;
		apply2::<f32, f32>(&out, &p, |o, x| {
			o.set(x.get());
			visits += 1;
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(visits, 12);
		let expected = vec![0.0, 4.0, 8.0, 1.0, 5.0, 9.0, 2.0, 6.0, 10.0, 3.0, 7.0, 11.0];
		assert_eq!(out.to_vec::<f32>().unwrap(), expected);
	}

	#[test]
	fn test_matches_ndarray_order() {
		let a = iota(&[2, 3, 4]);
		let p = a.permute(&[2, 0, 1]).unwrap().narrow(2, 1, 2).unwrap();

		let reference = ndarray::Array::from_shape_vec((2, 3, 4), (0..24).map(|i| i as f32).collect())
			.unwrap();
		let reference = reference.permuted_axes([2, 0, 1]);
		let reference = reference.slice(ndarray::s![.., .., 1..3]);
		let expected: Vec<f32> = reference.iter().copied().collect();

		assert_eq!(p.to_vec::<f32>().unwrap(), expected);
	}

	#[test]
	fn test_different_shapes_same_numel() {
		// [2, 6] row-major against a transposed [3, 4]
		let a = iota(&[2, 6]);
		let b = iota(&[4, 3]).transpose(0, 1).unwrap();
		let mut pairs = Vec::new();
		apply2::<f32, f32>(&a, &b, |x, y| {
			pairs.push((x.get(), y.get()));
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(pairs.len(), 12);
		assert_eq!(pairs[0], (0.0, 0.0));
		assert_eq!(pairs[1], (1.0, 3.0));
		assert_eq!(pairs[4], (4.0, 1.0));
		assert_eq!(pairs[11], (11.0, 11.0));
	}

	#[test]
	fn test_mismatch_fails_before_visiting() {
		let a = iota(&[3, 4]);
		let b = iota(&[5]);
		let mut visits = 0;
		let err = apply2::<f32, f32>(&a, &b, |_, _| {
			visits += 1;
			ControlFlow::Continue(())
		})
		.unwrap_err();
		assert_eq!(visits, 0);
		assert_eq!(err.code, TensorOpError::ShapeMismatch);
		assert_eq!(
			err.message(),
			"inconsistent tensor size, expected [3, 4] and [5] to have the same number of \
			 elements, but got 12 and 5 elements respectively"
		);
	}

	#[test]
	fn test_early_termination() {
		let a = iota(&[4, 5]);
		let mut seen = Vec::new();
		let flow = apply1::<f32>(&a, |x| {
			seen.push(x.get());
			if x.get() == 6.0 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
		})
		.unwrap();
		assert_eq!(flow, ControlFlow::Break(()));
		assert_eq!(seen.len(), 7);
	}

	#[test]
	fn test_early_termination_of_pairs() {
		let dst = Tensor::zeros(&[3, 4], f32::dtype).unwrap();
		let src = iota(&[4, 3]).transpose(0, 1).unwrap();
		let mut visits = 0;
		let flow = apply2::<f32, f32>(&dst, &src, |d, s| {
			visits += 1;
			if visits > 5 {
				return ControlFlow::Break(());
			}
			d.set(s.get() + 100.0);
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(flow, ControlFlow::Break(()));
		assert_eq!(visits, 6);
		let written = dst.to_vec::<f32>().unwrap();
		assert_eq!(&written[..5], &[100.0, 103.0, 106.0, 109.0, 101.0]);
		assert!(written[5..].iter().all(|&x| x == 0.0));
	}

	#[test]
	fn test_no_contiguous_shortcut_keeps_order() {
		let t = iota(&[2, 3, 4]);
		let options = ApplyOptions { allow_contiguous: false, ..ApplyOptions::default() };
		assert_eq!(offsets_of(t.map(), options), (0..24).collect::<Vec<_>>());

		// a sliced tensor visits the same offsets with or without the shortcut
		let s = t.narrow(2, 1, 2).unwrap();
		let with = offsets_of(s.map(), ApplyOptions::default());
		let without = offsets_of(s.map(), options);
		assert_eq!(with, without);
		assert_eq!(&without[..6], &[1, 2, 5, 6, 9, 10]);

		let mut pairs = Vec::new();
		let flow = traverse([t.map(), t.map()], options, |[i, j]| {
			pairs.push((i, j));
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(flow, ControlFlow::Continue(()));
		assert_eq!(pairs.len(), 24);
		assert!(pairs.iter().enumerate().all(|(n, &(i, j))| i == n && j == n));
	}

	#[test]
	fn test_broadcast_visits_repeated_values() {
		let a = iota(&[1, 5]);
		let e = a.expand(&[3, 5]).unwrap();
		let mut values = Vec::new();
		apply1::<f32>(&e, |x| {
			values.push(x.get());
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(values.len(), 15);
		assert_eq!(&values[10..], &[0.0, 1.0, 2.0, 3.0, 4.0]);
	}

	#[test]
	fn test_scalar_and_empty() {
		let s = Tensor::full(&[], 2.5, f32::dtype).unwrap();
		let e = Tensor::zeros(&[0, 3], f32::dtype).unwrap();
		assert_eq!(offsets_of(s.map(), ApplyOptions::default()).len(), 1);
		assert!(offsets_of(e.map(), ApplyOptions::default()).is_empty());

		// a scalar pairs with any single element tensor
		let one = Tensor::zeros(&[1, 1], f32::dtype).unwrap();
		apply2::<f32, f32>(&one, &s, |o, x| {
			o.set(x.get());
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(one.to_vec::<f32>().unwrap(), vec![2.5]);
	}

	#[test]
	fn test_excluded_dim_same_order() {
		let t = iota(&[2, 3, 4]);
		let plain = offsets_of(t.map(), ApplyOptions::default());
		let excluded = offsets_of(t.map(), ApplyOptions::excluding(1));
		assert_eq!(plain, excluded);
	}

	#[test]
	fn test_dtype_checked() {
		let a = iota(&[3]);
		let err = apply1::<i32>(&a, |_| ControlFlow::Continue(())).unwrap_err();
		assert_eq!(err.code, TensorOpError::DTypeMismatch);

		let n = Tensor::zeros(&[3], i32::dtype).unwrap();
		let err = apply2::<f32, f32>(&a, &n, |_, _| ControlFlow::Continue(())).unwrap_err();
		assert_eq!(err.code, TensorOpError::DTypeMismatch);
		assert_eq!(err.message(), "expected dtype f32, but the tensor has dtype i32");
	}

	#[test]
	fn test_apply3() {
		let a = iota(&[2, 2]);
		let b = iota(&[4]);
		let c = Tensor::zeros(&[4, 1], f32::dtype).unwrap();
		apply3::<f32, f32, f32>(&a, &b, &c, |x, y, z| {
			z.set(x.get() * y.get());
			ControlFlow::Continue(())
		})
		.unwrap();
		assert_eq!(c.to_vec::<f32>().unwrap(), vec![0.0, 1.0, 4.0, 9.0]);
	}
}

//--------------------------------------------------------------------------------------------------
