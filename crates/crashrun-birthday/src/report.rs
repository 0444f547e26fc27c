//! Text output for collision curves.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::curve::CurvePoint;
use crate::error::{BirthdayError, Result};

/// Header line of the CSV layout.
pub const CSV_HEADER: &str = "trials,probability";

/// Layout of one record per line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat
{
    /// `{k} {p}` (default)
    #[default]
    Plain,
    /// `trials,probability` header, then `{k},{p}`
    Csv,
}

impl FromStr for OutputFormat
{
    type Err = BirthdayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(OutputFormat::Plain),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(BirthdayError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Write every point of `curve` to `writer`, one per line, and return how many were written
///
/// Probabilities use the shortest representation that parses back to the
/// same `f64`.
///
/// ## Errors
///
/// Returns `Io` if the writer fails.
pub fn write_curve<W, I>(writer: &mut W, curve: I, format: OutputFormat) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = CurvePoint>,
{
    if format == OutputFormat::Csv {
        writeln!(writer, "{CSV_HEADER}")?;
    }

    let mut records = 0;
    for CurvePoint { trials, probability } in curve {
        match format {
            OutputFormat::Plain => writeln!(writer, "{trials} {probability}")?,
            OutputFormat::Csv => writeln!(writer, "{trials},{probability}")?,
        }
        records += 1;
    }

    writer.flush()?;
    Ok(records)
}
