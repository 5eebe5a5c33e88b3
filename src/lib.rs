//! xlsxstream - Streaming XLSX row reader with schema mapping
//!
//! This crate reads tabular data out of `.xlsx` files without loading the
//! whole document into memory. Rows are streamed to a callback one at a time,
//! optionally reordered onto an application-defined list of column names.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::ops::ControlFlow;
//! use xlsxstream::ReaderBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Open the first sheet, treating every row as data
//!     let mut reader = ReaderBuilder::new().open("example.xlsx")?;
//!
//!     reader.fetch_rows(|row| {
//!         println!("{}", row.join("\t"));
//!         ControlFlow::<()>::Continue(())
//!     })?;
//!
//!     reader.close();
//!     Ok(())
//! }
//! ```
//!
//! # Schema Mapping
//!
//! The first row is matched against the expected column names and every
//! following row is delivered in that order, regardless of where the columns
//! sit in the sheet.
//!
//! ```rust,no_run
//! use std::ops::ControlFlow;
//! use xlsxstream::{Policy, ReaderBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut reader = ReaderBuilder::new()
//!         .with_sheet_name("Members")
//!         .with_policy(Policy::LowMemory)  // scan shared strings on demand
//!         .with_expected_columns(["age", "name"])
//!         .open("members.xlsx")?;
//!
//!     println!("{} rows (including the header)", reader.row_count()?);
//!
//!     reader.fetch_rows(|row| {
//!         let (age, name) = (&row[0], &row[1]);
//!         println!("{} is {}", name, age);
//!         ControlFlow::<()>::Continue(())
//!     })?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Serial Dates
//!
//! Cell values are delivered verbatim. Date cells hold serial numbers that
//! can be converted with [`to_calendar_time`] or
//! [`XlsxReader::to_calendar_time`], which honors the workbook's date system.
//!
//! ```rust
//! use xlsxstream::to_calendar_time;
//!
//! let dt = to_calendar_time(45658.25, false).unwrap();
//! assert_eq!(dt.to_string(), "2025-01-01 06:00:00");
//! ```

mod api;
mod builder;
mod date;
mod error;
mod parser;
mod reader;
mod schema;
mod security;
mod types;

// 公開API
pub use api::{HeaderMode, Policy, SheetSelector};
pub use builder::ReaderBuilder;
pub use date::to_calendar_time;
pub use error::XlsxStreamError;
pub use parser::{FileSource, MemorySource, PackageSource};
pub use reader::XlsxReader;
pub use schema::{match_columns, ColumnMap};
pub use types::{column_index, column_letter, CellCoord};
