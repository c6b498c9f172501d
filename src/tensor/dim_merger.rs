//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use smallvec::{SmallVec, smallvec};

use super::dim_vec::{DimVec, INLINE_DIMS};
use super::map::SizeAndStride;

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ReshapeError;

//--------------------------------------------------------------------------------------------------

/// Iteration plan for one tensor.
///
/// The dimensions are merged into as few runs as possible. `runs` are ordered outermost first,
/// so `runs.last()` is the inner run walked by the tight loop of the apply engine.
#[derive(Clone, Debug)]
pub struct ContiguityPlan {
	runs: SmallVec<[SizeAndStride; INLINE_DIMS]>,
	counter: SmallVec<[usize; INLINE_DIMS]>,
	contiguous: bool,
	elems: usize,
}

impl ContiguityPlan {
	/// `exclude_dim` is never merged with its neighbours and disables the full-contiguity
	/// shortcut. So does `allow_contiguous == false`.
	pub fn new(dims: &[SizeAndStride], exclude_dim: Option<usize>, allow_contiguous: bool) -> Self {
		let elems = dims.iter().map(|dim| dim.size).product();

		if allow_contiguous && exclude_dim.is_none() && Self::is_fully_contiguous(dims) {
			return Self {
				runs: smallvec![SizeAndStride { size: elems, stride: 1 }],
				counter: smallvec![0],
				contiguous: true,
				elems,
			};
		}

		let mut runs: SmallVec<[SizeAndStride; INLINE_DIMS]> = SmallVec::new();
		// is the current innermost run the excluded dimension?
		let mut prev_excluded = false;
		for (i, &dim) in dims.iter().enumerate().rev() {
			let excluded = exclude_dim == Some(i);
			if dim.size == 1 && !excluded {
				continue;
			}
			if let Some(prev) = runs.last_mut() {
				// Can we extend previous run?
				if !excluded && !prev_excluded && dim.stride == prev.size * prev.stride {
					prev.size *= dim.size;
					continue;
				}
			}
			runs.push(dim);
			prev_excluded = excluded;
		}
		if runs.is_empty() {
			runs.push(SizeAndStride { size: 1, stride: 1 });
		}
		runs.reverse();

		let counter = smallvec![0; runs.len()];
		Self { runs, counter, contiguous: false, elems }
	}

	fn is_fully_contiguous(dims: &[SizeAndStride]) -> bool {
		let mut expected_stride = 1;
		for dim in dims.iter().rev() {
			if dim.size != 1 {
				if dim.stride != expected_stride {
					return false;
				}
				expected_stride *= dim.size;
			}
		}
		true
	}

	pub fn is_contiguous(&self) -> bool {
		self.contiguous
	}

	/// Number of merged runs.
	pub fn depth(&self) -> usize {
		self.runs.len()
	}

	pub fn runs(&self) -> &[SizeAndStride] {
		&self.runs
	}

	pub fn inner(&self) -> SizeAndStride {
		// `new()` always creates at least one run
		self.runs.last().copied().unwrap_or(SizeAndStride { size: 1, stride: 1 })
	}

	pub fn elems(&self) -> usize {
		self.elems
	}

	/// A plan over zero elements is finished before the first visit.
	pub fn is_finished_on_start(&self) -> bool {
		self.elems == 0
	}

	/// Carry step. Called with `offset` one full inner run past where the run started.
	///
	/// Moves `offset` to the start of the next inner run and returns `true`,
	/// or returns `false` if there are no more runs.
	pub fn next_run(&mut self, offset: &mut usize) -> bool {
		let depth = self.runs.len();
		if self.contiguous || depth <= 1 {
			return false;
		}

		let inner = self.runs[depth - 1];
		*offset -= inner.size * inner.stride;

		for d in (0..depth - 1).rev() {
			let run = self.runs[d];
			self.counter[d] += 1;
			*offset += run.stride;
			if self.counter[d] < run.size {
				return true;
			}
			if d == 0 {
				return false;
			}
			*offset -= self.counter[d] * run.stride;
			self.counter[d] = 0;
		}
		false
	}
}

//--------------------------------------------------------------------------------------------------

/// Merges as many trailing dimensions as possible into one.
///
/// Returns the merged dimension and the dimensions that could not be merged.
pub fn merge_dims(dims: &[SizeAndStride]) -> (SizeAndStride, &[SizeAndStride]) {
	let Some((&last, rest)) = dims.split_last() else {
		return (SizeAndStride { size: 1, stride: 0 }, dims);
	};
	let mut merged = last;
	for (i, &dim) in rest.iter().enumerate().rev() {
		if dim.stride != merged.size * merged.stride && dim.size > 1 {
			if merged.size > 1 {
				return (merged, &dims[..=i]);
			}
			merged.stride = dim.stride;
		}
		merged.size *= dim.size;
	}
	(merged, &[])
}

/// Computes dimensions of shape `to` over the same elements as `dims`, without copying.
///
/// Both shapes must have the same, nonzero, number of elements.
pub fn reshape_dims(dims: &[SizeAndStride], to: &[usize]) -> Result<DimVec, ReshapeError> {
	let mut out = DimVec::new_from_iter(to.iter().map(|&size| SizeAndStride { size, stride: 0 }));
	let (mut inp, mut rest_inp) = merge_dims(dims);

	let mut j = to.len();
	if j == 0 {
		if inp.size != 1 || !rest_inp.is_empty() {
			return Err(ReshapeError);
		}
		return Ok(out);
	}

	'next_inp: loop {
		let mut acc = SizeAndStride { size: 1, stride: inp.stride };
		'next_out: loop {
			j -= 1;
			let dim_size = to[j];
			let Some(mul) = acc.size.checked_mul(dim_size) else {
				return Err(ReshapeError);
			};

			out[j] = SizeAndStride { size: dim_size, stride: acc.stride };

			if mul == inp.size {
				break 'next_out;
			} else if mul > inp.size || j == 0 {
				return Err(ReshapeError);
			}
			acc.stride *= dim_size;
			acc.size = mul;
		}
		if j == 0 {
			break 'next_inp;
		}
		(inp, rest_inp) = merge_dims(rest_inp);
	}

	if !rest_inp.is_empty() {
		return Err(ReshapeError);
	}
	Ok(out)
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
