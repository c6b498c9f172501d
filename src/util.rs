//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//--------------------------------------------------------------------------------------------------

pub trait LossyInto<T> {
	fn lossy_into(self) -> T;
}

#[allow(clippy::cast_precision_loss)]
impl LossyInto<f64> for i64 {
	fn lossy_into(self) -> f64 {
		self as f64
	}
}

#[allow(clippy::cast_possible_truncation)]
impl LossyInto<i64> for f64 {
	fn lossy_into(self) -> i64 {
		// `as` saturates on overflow and maps NaN to 0
		self as i64
	}
}

/// Formats a list of sizes the way error messages print shapes: `[3, 4]`.
pub fn fmt_sizes(sizes: impl IntoIterator<Item = usize>) -> String {
	let mut s = String::from("[");
	for (i, size) in sizes.into_iter().enumerate() {
		if i > 0 {
			s.push_str(", ");
		}
		s.push_str(&size.to_string());
	}
	s.push(']');
	s
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
