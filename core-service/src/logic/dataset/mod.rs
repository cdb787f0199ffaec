//! Dataset Module - Historical Weather Table
//!
//! Reads and writes the training table
//! `{timestamp, rainfall, temperature, humidity, pressure, label}` as CSV,
//! and generates synthetic history when no observed data is available.

pub mod record;
pub mod reader;
pub mod writer;
pub mod synthetic;

#[cfg(test)]
mod tests;

pub use record::{split_columns, DatasetRecord};
pub use reader::{parse_csv, read_csv};
pub use synthetic::{generate, SyntheticConfig};
pub use writer::write_csv;
