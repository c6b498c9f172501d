//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::ErrPack;
use crate::util::fmt_sizes;

use super::error::{self, TensorOpError};
use super::map::ElementsOverflowError;

//--------------------------------------------------------------------------------------------------

/// Hyperparameters of a dilated 2-D convolution. Each pair is `(height, width)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvGeometry {
	pub kernel: (usize, usize),
	pub stride: (usize, usize),
	pub padding: (usize, usize),
	pub dilation: (usize, usize),
}

fn to_i64(v: usize) -> Result<i64, ElementsOverflowError> {
	i64::try_from(v).map_err(|_| ElementsOverflowError)
}

/// `(input + 2 * padding - (dilation * (kernel - 1) + 1)) / stride + 1`
///
/// Can be zero or negative when the dilated kernel does not fit.
fn output_extent(
	input: usize,
	kernel: usize,
	stride: usize,
	padding: usize,
	dilation: usize,
) -> Result<i64, ElementsOverflowError> {
	let reach = to_i64(dilation)?
		.checked_mul(to_i64(kernel)? - 1)
		.and_then(|r| r.checked_add(1))
		.ok_or(ElementsOverflowError)?;
	let padded = to_i64(padding)?
		.checked_mul(2)
		.and_then(|p| p.checked_add(to_i64(input).ok()?))
		.ok_or(ElementsOverflowError)?;
	Ok((padded - reach) / to_i64(stride)? + 1)
}

impl ConvGeometry {
	pub fn new(kernel: (usize, usize)) -> Self {
		Self { kernel, stride: (1, 1), padding: (0, 0), dilation: (1, 1) }
	}

	pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
		self.stride = stride;
		self
	}

	pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
		self.padding = padding;
		self
	}

	pub fn with_dilation(mut self, dilation: (usize, usize)) -> Self {
		self.dilation = dilation;
		self
	}

	/// Checks an input of shape `[planes, h, w]` or `[batch, planes, h, w]` and an optional
	/// weight of shape `[out_planes, in_planes, kh, kw]`.
	///
	/// Returns the output `(height, width)`.
	pub fn check_input(
		&self,
		input: &[usize],
		weight: Option<&[usize]>,
	) -> Result<(usize, usize), ErrPack<TensorOpError>> {
		let (kh, kw) = self.kernel;
		let (dh, dw) = self.stride;
		let (dil_h, dil_w) = self.dilation;
		if kh == 0 || kw == 0 {
			return Err(error::invalid_argument(format!(
				"kernel size should be greater than zero, but got kH: {kh} kW: {kw}"
			)));
		}
		if dh == 0 || dw == 0 {
			return Err(error::invalid_argument(format!(
				"stride should be greater than zero, but got dH: {dh} dW: {dw}"
			)));
		}
		if dil_h == 0 || dil_w == 0 {
			return Err(error::invalid_argument(format!(
				"dilation should be greater than zero, but got dilationH: {dil_h}, dilationW: {dil_w}"
			)));
		}

		if let Some(weight) = weight {
			if weight.len() != 4 || weight.contains(&0) {
				return Err(error::shape_mismatch(format!(
					"non-empty 4D weight tensor (nOutputPlane, nInputPlane, kH, kW) expected, \
					 but got: {}",
					fmt_sizes(weight.iter().copied())
				)));
			}
		}

		let ndim = input.len();
		if !(ndim == 3 || ndim == 4) || input.contains(&0) {
			return Err(error::invalid_argument(format!(
				"non-empty 3D or 4D input tensor expected but got: {}",
				fmt_sizes(input.iter().copied())
			)));
		}
		let dim_planes = ndim - 3;
		let in_h = input[ndim - 2];
		let in_w = input[ndim - 1];

		let out_h = output_extent(in_h, kh, dh, self.padding.0, dil_h)?;
		let out_w = output_extent(in_w, kw, dw, self.padding.1, dil_w)?;
		if out_h < 1 || out_w < 1 {
			return Err(error::invalid_argument(format!(
				"Given input size per channel: ({in_h} x {in_w}). Calculated output size per \
				 channel: ({out_h} x {out_w}). Output size is too small"
			)));
		}

		if let Some(weight) = weight {
			if input[dim_planes] != weight[1] {
				return Err(error::shape_mismatch(format!(
					"expected input {} to have {} planes in dimension {dim_planes}, but got {}",
					fmt_sizes(input.iter().copied()),
					weight[1],
					input[dim_planes]
				)));
			}
		}

		// both are >= 1 and no larger than the padded input, so they fit
		let out_h = usize::try_from(out_h).map_err(|_| ElementsOverflowError)?;
		let out_w = usize::try_from(out_w).map_err(|_| ElementsOverflowError)?;
		Ok((out_h, out_w))
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
