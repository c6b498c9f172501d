//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::Cell;
use std::ops::ControlFlow;

use crate::ErrPack;

use crate::tensor::apply::{ApplyOptions, apply2, apply2_with, apply3};
use crate::tensor::dtype::Element;
use crate::tensor::error::TensorOpError;
use crate::tensor::{ReduceOp, Tensor};

//--------------------------------------------------------------------------------------------------
// Contiguous kernels. These see flat element slices and know nothing about strides.

pub fn reduce_all_contiguous<T: Element>(op: ReduceOp, src: &[Cell<T>]) -> T {
	src.iter().fold(op.identity::<T>(), |acc, x| op.combine(acc, x.get()))
}

/// `src` is `[outer, n, inner]` in row-major order, `out` is `[outer, inner]`.
pub fn reduce_dim_contiguous<T: Element>(
	op: ReduceOp,
	src: &[Cell<T>],
	out: &[Cell<T>],
	n: usize,
	inner: usize,
) {
	debug_assert!(src.len() == out.len() * n);
	if out.is_empty() {
		return;
	}
	if n == 0 {
		for o in out {
			o.set(op.identity::<T>());
		}
		return;
	}
	if inner == 1 {
		for (o, row) in out.iter().zip(src.chunks_exact(n)) {
			o.set(reduce_all_contiguous(op, row));
		}
		return;
	}

	for o in out {
		o.set(op.identity::<T>());
	}
	// accumulate whole rows of `inner` elements so the inner loop runs over adjacent memory
	for (out_block, src_block) in out.chunks_exact(inner).zip(src.chunks_exact(n * inner)) {
		for row in src_block.chunks_exact(inner) {
			for (o, x) in out_block.iter().zip(row) {
				o.set(op.combine(o.get(), x.get()));
			}
		}
	}
}

/// Running reduction. `src` and `out` are both `[outer, n, inner]` in row-major order.
pub fn scan_dim_contiguous<T: Element>(
	op: ReduceOp,
	src: &[Cell<T>],
	out: &[Cell<T>],
	n: usize,
	inner: usize,
) {
	debug_assert!(src.len() == out.len());
	if out.is_empty() {
		return;
	}
	let block = n * inner;
	for (out_block, src_block) in out.chunks_exact(block).zip(src.chunks_exact(block)) {
		let mut prev: Option<&[Cell<T>]> = None;
		for (out_row, src_row) in out_block.chunks_exact(inner).zip(src_block.chunks_exact(inner)) {
			match prev {
				None => {
					for (o, x) in out_row.iter().zip(src_row) {
						o.set(x.get());
					}
				},
				Some(prev) => {
					for ((o, x), p) in out_row.iter().zip(src_row).zip(prev) {
						o.set(op.combine(p.get(), x.get()));
					}
				},
			}
			prev = Some(out_row);
		}
	}
}

//--------------------------------------------------------------------------------------------------
// Strided fallbacks. Built on the apply engine, so they handle any layout.

/// `acc` is a single element tensor holding the identity. It gets broadcast over `src`.
pub fn reduce_all_strided<T: Element>(
	op: ReduceOp,
	acc: &Tensor,
	src: &Tensor,
) -> Result<(), ErrPack<TensorOpError>> {
	let acc = acc.expand(&src.sizes())?;
	apply2_with::<T, T>(&acc, src, ApplyOptions::default(), |a, x| {
		a.set(op.combine(a.get(), x.get()));
		ControlFlow::Continue(())
	})?;
	Ok(())
}

/// `out` has the sizes of `src`, except `dim` has size 1. It must be filled with the identity.
pub fn reduce_dim_strided<T: Element>(
	op: ReduceOp,
	out: &Tensor,
	src: &Tensor,
	dim: usize,
) -> Result<(), ErrPack<TensorOpError>> {
	let acc = out.expand(&src.sizes())?;
	apply2_with::<T, T>(&acc, src, ApplyOptions::excluding(dim), |a, x| {
		a.set(op.combine(a.get(), x.get()));
		ControlFlow::Continue(())
	})?;
	Ok(())
}

/// Running reduction along `dim`, one slice at a time. `out` has the sizes of `src`.
pub fn scan_dim_strided<T: Element>(
	op: ReduceOp,
	out: &Tensor,
	src: &Tensor,
	dim: usize,
) -> Result<(), ErrPack<TensorOpError>> {
	let n = src.map().dims()[dim].size;
	for k in 0..n {
		let o = out.select(dim, k)?;
		let x = src.select(dim, k)?;
		if k == 0 {
			apply2::<T, T>(&o, &x, |o, x| {
				o.set(x.get());
				ControlFlow::Continue(())
			})?;
		} else {
			let prev = out.select(dim, k - 1)?;
			apply3::<T, T, T>(&prev, &x, &o, |p, x, o| {
				o.set(op.combine(p.get(), x.get()));
				ControlFlow::Continue(())
			})?;
		}
	}
	Ok(())
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn cells<T: Element>(data: &[T]) -> Vec<Cell<T>> {
		data.iter().map(|&x| Cell::new(x)).collect()
	}

	fn values<T: Element>(cells: &[Cell<T>]) -> Vec<T> {
		cells.iter().map(Cell::get).collect()
	}

	#[test]
	fn test_reduce_dim_contiguous() {
		// [2, 3, 2]
		let src = cells(&[1_i64, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);

		let out = cells(&[0_i64; 4]);
		reduce_dim_contiguous(ReduceOp::Sum, &src, &out, 3, 2);
		assert_eq!(values(&out), vec![9, 12, 27, 30]);

		// [6, 2] along the last dim
		let out = cells(&[0_i64; 6]);
		reduce_dim_contiguous(ReduceOp::Prod, &src, &out, 2, 1);
		assert_eq!(values(&out), vec![2, 12, 30, 56, 90, 132]);

		let out = cells(&[5_i64; 3]);
		reduce_dim_contiguous(ReduceOp::Prod, &[], &out, 0, 1);
		assert_eq!(values(&out), vec![1, 1, 1]);
	}

	#[test]
	fn test_scan_dim_contiguous() {
		// [2, 3, 2]
		let src = cells(&[1_i64, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
		let out = cells(&[0_i64; 12]);
		scan_dim_contiguous(ReduceOp::Sum, &src, &out, 3, 2);
		assert_eq!(values(&out), vec![1, 2, 4, 6, 9, 12, 7, 8, 16, 18, 27, 30]);

		// [6, 2] along the last dim
		scan_dim_contiguous(ReduceOp::Prod, &src, &out, 2, 1);
		assert_eq!(values(&out), vec![1, 2, 3, 12, 5, 30, 7, 56, 9, 90, 11, 132]);

		// in place
		scan_dim_contiguous(ReduceOp::Sum, &src, &src, 12, 1);
		assert_eq!(values(&src)[11], 78);

		scan_dim_contiguous::<i64>(ReduceOp::Sum, &[], &[], 0, 3);
	}

	#[test]
	fn test_reduce_all_contiguous() {
		let src = cells(&[1.5_f64, 2.5, -1.0]);
		assert_eq!(reduce_all_contiguous(ReduceOp::Sum, &src), 3.0);
		assert_eq!(reduce_all_contiguous(ReduceOp::Prod, &src), -3.75);
		assert_eq!(reduce_all_contiguous::<f64>(ReduceOp::Prod, &[]), 1.0);
	}
}

//--------------------------------------------------------------------------------------------------
