//! Dump Rows Example
//!
//! This example streams every row of a worksheet to stdout as
//! tab-separated values.

use std::io::{self, BufWriter, Write};
use std::ops::ControlFlow;
use std::process;
use xlsxstream::{HeaderMode, Policy, ReaderBuilder, SheetSelector, XlsxStreamError};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <input.xlsx> [options]", args[0]);
        eprintln!("\nOptions:");
        eprintln!("  --sheet-index <n>      Select sheet by index (0-based)");
        eprintln!("  --sheet-name <name>    Select sheet by name");
        eprintln!("  --low-memory           Scan shared strings on demand");
        eprintln!("  --columns <a,b,...>    Reorder rows onto the given header names");
        eprintln!("  --count                Print the row count and exit");
        eprintln!("\nExamples:");
        eprintln!("  {} input.xlsx", args[0]);
        eprintln!("  {} input.xlsx --sheet-name \"Sheet1\" --low-memory", args[0]);
        eprintln!("  {} input.xlsx --columns name,age", args[0]);
        process::exit(1);
    }

    let input_path = &args[1];
    let mut builder = ReaderBuilder::new();
    let mut count_only = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--sheet-index" => {
                let value = option_value(&args, i);
                let index = value.parse::<usize>().unwrap_or_else(|_| {
                    eprintln!("Error: Invalid sheet index: {}", value);
                    process::exit(1);
                });
                builder = builder.with_sheet(SheetSelector::Index(index));
                i += 2;
            }
            "--sheet-name" => {
                builder = builder.with_sheet_name(option_value(&args, i));
                i += 2;
            }
            "--low-memory" => {
                builder = builder.with_policy(Policy::LowMemory);
                i += 1;
            }
            "--columns" => {
                let names = option_value(&args, i)
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .collect::<Vec<_>>();
                builder = builder.with_header(HeaderMode::Expected(names));
                i += 2;
            }
            "--count" => {
                count_only = true;
                i += 1;
            }
            _ => {
                eprintln!("Error: Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
    }

    if let Err(e) = dump(input_path, builder, count_only) {
        handle_error(e);
        process::exit(1);
    }
}

fn option_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            process::exit(1);
        }
    }
}

fn dump(input_path: &str, builder: ReaderBuilder, count_only: bool) -> Result<(), XlsxStreamError> {
    let mut reader = builder.open(input_path)?;

    if count_only {
        println!("{}", reader.row_count()?);
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if !reader.columns().is_empty() {
        writeln!(out, "{}", reader.columns().join("\t"))?;
    }

    // 書き込みエラー（パイプが閉じられた等）で打ち切る
    let result = reader.fetch_rows(|row| match writeln!(out, "{}", row.join("\t")) {
        Ok(()) => ControlFlow::Continue(()),
        Err(e) => ControlFlow::Break(e),
    })?;
    if let ControlFlow::Break(e) = result {
        return Err(e.into());
    }

    out.flush()?;
    reader.close();
    Ok(())
}

fn handle_error(error: XlsxStreamError) {
    match error {
        XlsxStreamError::Io(io_err) => {
            eprintln!("I/O Error: {}", io_err);
            eprintln!("Please check that the file exists and you have permission to access it.");
        }
        XlsxStreamError::InvalidFormat(msg) => {
            eprintln!("Invalid Format: {}", msg);
            eprintln!("The file may not be a valid .xlsx file or may be corrupted.");
        }
        XlsxStreamError::SheetNotFound(name) => {
            eprintln!("Sheet not found: {}", name);
        }
        XlsxStreamError::SchemaMismatch(msg) => {
            eprintln!("Schema Mismatch: {}", msg);
            eprintln!("Check the --columns list against the sheet's first row.");
        }
        XlsxStreamError::SecurityViolation(msg) => {
            eprintln!("Security Violation: {}", msg);
            eprintln!("The file violates security constraints (e.g., part size limit).");
        }
        other => eprintln!("Error: {}", other),
    }
}
