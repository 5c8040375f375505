//! Convert an SDDS file between ASCII and binary data modes.
//!
//! Demonstrates:
//! - Copying a layout with `initialize_copy`
//! - Streaming pages with `read_page` / `copy_page`
//! - Column selection before the copy
//! - Reporting failures through the error stack
//!
//! Run with: cargo run --example sddsconvert -- <input> <output> [ascii|binary] [column patterns...]

use anyhow::{Context, Result, bail};
use sdds::error_stack::{self, PrintMode};
use sdds::{ColumnSelector, DataEncoding, Dataset, Logic};
use std::path::PathBuf;

struct Args {
    input: PathBuf,
    output: PathBuf,
    encoding: Option<DataEncoding>,
    columns: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        bail!("usage: sddsconvert <input> <output> [ascii|binary] [column patterns...]");
    };
    let mut encoding = None;
    let mut columns = Vec::new();
    for arg in args {
        match arg.as_str() {
            "ascii" if encoding.is_none() => encoding = Some(DataEncoding::Ascii),
            "binary" if encoding.is_none() => encoding = Some(DataEncoding::Binary),
            _ => columns.push(arg),
        }
    }
    Ok(Args {
        input: input.into(),
        output: output.into(),
        encoding,
        columns,
    })
}

fn convert(args: &Args) -> Result<usize> {
    let mut input = Dataset::initialize_input(Some(&args.input))
        .with_context(|| format!("opening {}", args.input.display()))?;
    if !args.columns.is_empty() {
        input.set_columns_of_interest(
            &ColumnSelector::Matching(args.columns[0].clone()),
            Logic::REPLACE,
        )?;
        for pattern in &args.columns[1..] {
            input.set_columns_of_interest(&ColumnSelector::Matching(pattern.clone()), Logic::OR)?;
        }
        println!("📋 Keeping columns: {}", input.columns_of_interest().join(", "));
    }

    let mut output = Dataset::initialize_copy(&input, Some(&args.output), args.encoding)
        .with_context(|| format!("creating {}", args.output.display()))?;
    output.write_layout()?;

    let mut pages = 0;
    while let Some(page) = input.read_page()? {
        output.copy_page(&input)?;
        output.write_page()?;
        println!("  page {page}: {} rows", output.rows_written());
        pages += 1;
    }
    output.terminate()?;
    input.terminate()?;
    Ok(pages)
}

fn main() -> Result<()> {
    error_stack::register_program_name("sddsconvert");
    let args = parse_args()?;
    println!(
        "🔄 {} -> {} ({})",
        args.input.display(),
        args.output.display(),
        args.encoding.map_or("same mode", DataEncoding::name)
    );
    match convert(&args) {
        Ok(pages) => {
            println!("✅ Converted {pages} pages");
            Ok(())
        }
        Err(e) => {
            error_stack::print_errors(PrintMode::VERBOSE);
            Err(e)
        }
    }
}
