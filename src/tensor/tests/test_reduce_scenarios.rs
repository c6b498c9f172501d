//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use assert_approx_eq::assert_approx_eq;

use crate::ErrPack;
use crate::tensor::{HasDType, Scalar, Tensor, TensorOpError};

//--------------------------------------------------------------------------------------------------

#[test]
fn test_reduction_identities() -> Result<(), ErrPack<TensorOpError>> {
	let empty = Tensor::zeros(&[0], f64::dtype)?;
	let s = empty.sum_dim(0, true, None)?;
	assert_eq!(s.sizes().as_slice(), &[1]);
	assert_eq!(s.to_vec::<f64>()?, vec![0.0]);
	let p = empty.prod_dim(0, true, None)?;
	assert_eq!(p.to_vec::<f64>()?, vec![1.0]);

	let scalar = Tensor::full(&[], 4_i64, i64::dtype)?;
	assert_eq!(scalar.sum_dim(0, false, None)?.item()?, Scalar::Int(4));
	assert_eq!(scalar.prod_dim(0, false, None)?.item()?, Scalar::Int(4));
	Ok(())
}

#[test]
fn test_axis_sums_of_a_3d_volume() -> Result<(), ErrPack<TensorOpError>> {
	let data: Vec<f32> = (0..60).map(|i| (i % 7) as f32 - 2.5).collect();
	let t = Tensor::from_slice(&data, &[3, 4, 5])?;
	let reference = ndarray::Array::from_shape_vec((3, 4, 5), data).unwrap();

	for dim in 0..3 {
		let expected = reference.sum_axis(ndarray::Axis(dim));
		let got = t.sum_dim(dim, false, None)?;
		assert_eq!(got.sizes().as_slice(), expected.shape());
		for (a, b) in got.to_vec::<f32>()?.iter().zip(expected.iter()) {
			assert_approx_eq!(*a, *b, 1e-4);
		}

		// same sums through the strided path
		let permuted = t.permute(&[2, 0, 1])?;
		let pdim = (dim + 1) % 3;
		let got = permuted.sum_dim(pdim, true, None)?;
		let moved = got.squeeze_dim(pdim)?;
		let expected = expected.permuted_axes(if dim == 2 { [0, 1] } else { [1, 0] });
		for (a, b) in moved.to_vec::<f32>()?.iter().zip(expected.iter()) {
			assert_approx_eq!(*a, *b, 1e-4);
		}
	}
	Ok(())
}

#[test]
fn test_sum_with_dtype_regression() -> Result<(), ErrPack<TensorOpError>> {
	let t = Tensor::from_slice(&[1_u8, 2, 250, 10], &[2, 2])?;
	let s = t.sum_dim(-1, false, Some(f32::dtype))?;
	assert_eq!(s.dtype(), f32::dtype);
	assert_eq!(s.to_vec::<f32>()?, vec![3.0, 260.0]);

	// without a dtype the sum widens, so it does not wrap at 256
	let s = t.sum_dim(0, false, None)?;
	assert_eq!(s.to_vec::<i64>()?, vec![251, 12]);
	Ok(())
}

#[test]
fn test_out_tensor_is_reused() -> Result<(), ErrPack<TensorOpError>> {
	let t = Tensor::from_slice(&[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2])?;
	let mut out = Tensor::zeros(&[8], f64::dtype)?;
	let before = out.clone();
	t.sum_dim_out(&mut out, 0, false, None)?;
	assert!(out.shares_buffer(&before));
	assert_eq!(out.to_vec::<f64>()?, vec![9.0, 12.0]);

	t.prod_dim_out(&mut out, 1, true, None)?;
	assert_eq!(out.sizes().as_slice(), &[3, 1]);
	assert_eq!(out.to_vec::<f64>()?, vec![2.0, 12.0, 30.0]);
	Ok(())
}

//--------------------------------------------------------------------------------------------------
