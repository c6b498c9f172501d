//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::ErrPack;
use crate::util::fmt_sizes;
use crate::with_element_type;

use super::Tensor;
use super::dim_index::DimIndex;
use super::dtype::{DType, Element, Scalar};
use super::error::TensorOpError;

pub mod kernels;

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
	Sum,
	Prod,
}

impl ReduceOp {
	pub fn identity<T: Element>(self) -> T {
		match self {
			Self::Sum => T::ZERO,
			Self::Prod => T::ONE,
		}
	}

	pub fn identity_scalar(self) -> Scalar {
		match self {
			Self::Sum => Scalar::Int(0),
			Self::Prod => Scalar::Int(1),
		}
	}

	#[inline]
	pub fn combine<T: Element>(self, acc: T, x: T) -> T {
		match self {
			Self::Sum => acc.acc_add(x),
			Self::Prod => acc.acc_mul(x),
		}
	}
}

//--------------------------------------------------------------------------------------------------

impl Tensor {
	/// Reduces all elements to a tensor with no dimensions.
	///
	/// Runs in `dtype` if given. Otherwise integers are widened to `i64`.
	pub fn reduce(&self, op: ReduceOp, dtype: Option<DType>) -> Result<Self, ErrPack<TensorOpError>> {
		let dtype = self.dtype().reduction_dtype(dtype);
		let src = if self.dtype() == dtype { self.clone() } else { self.to_dtype(dtype)? };
		let out = Self::empty(&[], dtype)?;

		with_element_type!(dtype, T => {
			if src.is_contiguous() {
				log::debug!("{op:?}: contiguous kernel over {} elements", src.numel());
				let value = kernels::reduce_all_contiguous::<T>(op, src.contiguous_cells::<T>()?);
				out.fill_(value.to_scalar())?;
			} else {
				log::debug!("{op:?}: strided fallback over {}", fmt_sizes(src.sizes()));
				out.fill_(op.identity_scalar())?;
				kernels::reduce_all_strided::<T>(op, &out, &src)?;
			}
		});
		Ok(out)
	}

	pub fn sum(&self, dtype: Option<DType>) -> Result<Self, ErrPack<TensorOpError>> {
		self.reduce(ReduceOp::Sum, dtype)
	}

	pub fn prod(&self, dtype: Option<DType>) -> Result<Self, ErrPack<TensorOpError>> {
		self.reduce(ReduceOp::Prod, dtype)
	}

	/// Reduces along `dim` into a new tensor.
	pub fn reduce_dim<D: DimIndex>(
		&self,
		op: ReduceOp,
		dim: D,
		keepdim: bool,
		dtype: Option<DType>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		let mut out = Self::empty(&[], self.dtype().reduction_dtype(dtype))?;
		self.reduce_dim_out(op, &mut out, dim, keepdim, None)?;
		Ok(out)
	}

	pub fn sum_dim<D: DimIndex>(
		&self,
		dim: D,
		keepdim: bool,
		dtype: Option<DType>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		self.reduce_dim(ReduceOp::Sum, dim, keepdim, dtype)
	}

	pub fn prod_dim<D: DimIndex>(
		&self,
		dim: D,
		keepdim: bool,
		dtype: Option<DType>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		self.reduce_dim(ReduceOp::Prod, dim, keepdim, dtype)
	}

	/// Reduces along `dim` into `out`, which is resized as needed.
	///
	/// The reduction runs in the dtype of `out`. A different `dtype` is ignored with a warning.
	pub fn reduce_dim_out<D: DimIndex>(
		&self,
		op: ReduceOp,
		out: &mut Self,
		dim: D,
		keepdim: bool,
		dtype: Option<DType>,
	) -> Result<(), ErrPack<TensorOpError>> {
		let out_dtype = out.dtype();
		if let Some(requested) = dtype {
			if requested != out_dtype {
				log::warn!(
					"{op:?}: output tensor has dtype {out_dtype}, ignoring requested dtype {requested}"
				);
			}
		}

		let ndim = self.ndim();
		// a scalar accepts dim 0 or -1
		let dim = dim.resolve_index(ndim.max(1))?;
		let src = if self.dtype() == out_dtype { self.clone() } else { self.to_dtype(out_dtype)? };

		if ndim == 0 {
			out.resize_(&[])?;
			return out.copy_(&src);
		}
		if ndim == 1 && src.is_empty() {
			let shape: &[usize] = if keepdim { &[1] } else { &[] };
			out.resize_(shape)?;
			return out.fill_(op.identity_scalar());
		}

		let mut sizes = src.sizes();
		let n = sizes[dim];
		sizes[dim] = 1;
		out.resize_(&sizes)?;

		with_element_type!(out_dtype, T => {
			if src.is_contiguous() && out.is_contiguous() {
				let inner: usize = sizes[dim + 1..].iter().product();
				log::debug!(
					"{op:?}: contiguous kernel over {} along dim {dim}",
					fmt_sizes(src.sizes())
				);
				kernels::reduce_dim_contiguous::<T>(
					op,
					src.contiguous_cells::<T>()?,
					out.contiguous_cells::<T>()?,
					n,
					inner,
				);
			} else {
				log::debug!(
					"{op:?}: strided fallback over {} with strides {} along dim {dim}",
					fmt_sizes(src.sizes()),
					fmt_sizes(src.strides())
				);
				out.fill_(op.identity_scalar())?;
				kernels::reduce_dim_strided::<T>(op, out, &src, dim)?;
			}
		});

		if !keepdim {
			out.squeeze_dim_(dim)?;
		}
		Ok(())
	}

	pub fn sum_dim_out<D: DimIndex>(
		&self,
		out: &mut Self,
		dim: D,
		keepdim: bool,
		dtype: Option<DType>,
	) -> Result<(), ErrPack<TensorOpError>> {
		self.reduce_dim_out(ReduceOp::Sum, out, dim, keepdim, dtype)
	}

	pub fn prod_dim_out<D: DimIndex>(
		&self,
		out: &mut Self,
		dim: D,
		keepdim: bool,
		dtype: Option<DType>,
	) -> Result<(), ErrPack<TensorOpError>> {
		self.reduce_dim_out(ReduceOp::Prod, out, dim, keepdim, dtype)
	}

	//----------------------------------------------------------------------------------------------
	// Running reductions. The result has the sizes of the source and entry `i` along `dim`
	// combines entries `0..=i`.

	pub fn scan_dim<D: DimIndex>(
		&self,
		op: ReduceOp,
		dim: D,
		dtype: Option<DType>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		let mut out = Self::empty(&[], self.dtype().reduction_dtype(dtype))?;
		self.scan_dim_out(op, &mut out, dim, None)?;
		Ok(out)
	}

	pub fn cumsum<D: DimIndex>(
		&self,
		dim: D,
		dtype: Option<DType>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		self.scan_dim(ReduceOp::Sum, dim, dtype)
	}

	pub fn cumprod<D: DimIndex>(
		&self,
		dim: D,
		dtype: Option<DType>,
	) -> Result<Self, ErrPack<TensorOpError>> {
		self.scan_dim(ReduceOp::Prod, dim, dtype)
	}

	/// Running reduction along `dim` into `out`, which is resized to the sizes of `self`.
	///
	/// Like `reduce_dim_out()`, the dtype of `out` wins over `dtype`.
	pub fn scan_dim_out<D: DimIndex>(
		&self,
		op: ReduceOp,
		out: &mut Self,
		dim: D,
		dtype: Option<DType>,
	) -> Result<(), ErrPack<TensorOpError>> {
		let out_dtype = out.dtype();
		if let Some(requested) = dtype {
			if requested != out_dtype {
				log::warn!(
					"cumulative {op:?}: output tensor has dtype {out_dtype}, ignoring requested \
					 dtype {requested}"
				);
			}
		}

		let ndim = self.ndim();
		let dim = dim.resolve_index(ndim.max(1))?;
		let src = if self.dtype() == out_dtype { self.clone() } else { self.to_dtype(out_dtype)? };
		out.resize_(&src.sizes())?;
		if ndim == 0 {
			return out.copy_(&src);
		}

		with_element_type!(out_dtype, T => {
			if src.is_contiguous() && out.is_contiguous() {
				let sizes = src.sizes();
				let inner: usize = sizes[dim + 1..].iter().product();
				log::debug!(
					"cumulative {op:?}: contiguous kernel over {} along dim {dim}",
					fmt_sizes(src.sizes())
				);
				kernels::scan_dim_contiguous::<T>(
					op,
					src.contiguous_cells::<T>()?,
					out.contiguous_cells::<T>()?,
					sizes[dim],
					inner,
				);
			} else {
				log::debug!(
					"cumulative {op:?}: strided fallback over {} with strides {} along dim {dim}",
					fmt_sizes(src.sizes()),
					fmt_sizes(src.strides())
				);
				kernels::scan_dim_strided::<T>(op, out, &src, dim)?;
			}
		});
		Ok(())
	}

	pub fn cumsum_out<D: DimIndex>(
		&self,
		out: &mut Self,
		dim: D,
		dtype: Option<DType>,
	) -> Result<(), ErrPack<TensorOpError>> {
		self.scan_dim_out(ReduceOp::Sum, out, dim, dtype)
	}

	pub fn cumprod_out<D: DimIndex>(
		&self,
		out: &mut Self,
		dim: D,
		dtype: Option<DType>,
	) -> Result<(), ErrPack<TensorOpError>> {
		self.scan_dim_out(ReduceOp::Prod, out, dim, dtype)
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
