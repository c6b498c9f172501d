//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ops::ControlFlow;

use clap::Parser;
use strided_core::tensor::{HasDType, apply2};
use strided_core::util::fmt_sizes;
use strided_core::{ErrPack, Tensor, TensorOpError};

//--------------------------------------------------------------------------------------------------

fn show(name: &str, t: &Tensor) -> Result<(), ErrPack<TensorOpError>> {
	println!(
		"{name}: sizes={} strides={} offset={} contiguous={} values={:?}",
		fmt_sizes(t.sizes()),
		fmt_sizes(t.strides()),
		t.storage_offset(),
		t.is_contiguous(),
		t.to_vec::<f32>()?
	);
	Ok(())
}

fn run() -> Result<(), ErrPack<TensorOpError>> {
	let data: Vec<f32> = (0..12_u8).map(f32::from).collect();
	let t = Tensor::from_slice(&data, &[3, 4])?;
	show("t", &t)?;

	let p = t.permute(&[1, 0])?;
	show("t.permute([1, 0])", &p)?;

	let c = Tensor::zeros(&[4, 3], f32::dtype)?;
	apply2::<f32, f32>(&c, &p, |dst, src| {
		dst.set(src.get() * 10.0);
		ControlFlow::Continue(())
	})?;
	show("apply2(zeros([4, 3]), permuted, x * 10)", &c)?;

	let row = t.narrow(0, 1, 1)?;
	show("t.narrow(0, 1, 1).expand([3, 4])", &row.expand(&[3, 4])?)?;

	for (i, part) in t.view(&[12])?.split(5, 0)?.iter().enumerate() {
		show(&format!("split[{i}]"), part)?;
	}

	show("t.sum_dim(1)", &t.sum_dim(1, false, None)?)?;
	show("permuted.sum_dim(0, keepdim)", &p.sum_dim(0, true, None)?)?;
	show("t.prod_dim(-1)", &t.narrow(1, 1, 3)?.prod_dim(-1, false, None)?)?;
	show("t.sum()", &t.sum(None)?)?;
	show("t.cumsum(1)", &t.cumsum(1, None)?)?;

	if let Err(err) = apply2::<f32, f32>(&t, &row, |_, _| ControlFlow::Continue(())) {
		println!("expected failure: {err}");
	}
	Ok(())
}

/// Walks through views, apply and reductions on a small tensor.
#[derive(Parser)]
#[command(name = "strided_core", version)]
struct Cli {
	/// Log more of what the engine does (repeat for more: -v, -vv, -vvv).
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

fn main() {
	let cli = Cli::parse();
	if let Err(err) =
		stderrlog::new().module("strided_core").verbosity(usize::from(cli.verbose)).init()
	{
		eprintln!("cannot install logger: {err}");
	}

	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::Cli;

	#[test]
	fn test_verbosity_counts_flags() {
		assert_eq!(Cli::try_parse_from(["strided_core"]).unwrap().verbose, 0);
		assert_eq!(Cli::try_parse_from(["strided_core", "-vv"]).unwrap().verbose, 2);
		assert_eq!(Cli::try_parse_from(["strided_core", "--verbose", "-v"]).unwrap().verbose, 2);
	}

	#[test]
	fn test_unknown_arguments_are_rejected() {
		assert!(Cli::try_parse_from(["strided_core", "-x"]).is_err());
		assert!(Cli::try_parse_from(["strided_core", "foo"]).is_err());
	}
}

//--------------------------------------------------------------------------------------------------
