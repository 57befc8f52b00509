//! CSV ingestion.
//!
//! The first line holds variable names. Every column is coded nominally: its
//! distinct values, sorted, become the codes `0..k`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use mml_core::Dataset;
use tracing::debug;

/// Parse CSV text into a [`Dataset`].
///
/// Cells are trimmed, quoted cells may contain commas, and lines starting
/// with `#` are skipped.
pub fn parse_csv(text: &str) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let names: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        bail!("CSV input is empty");
    }
    if let Some(i) = names.iter().position(String::is_empty) {
        bail!("column {} has an empty name", i + 1);
    }

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record.context("Malformed CSV record")?;
        let line = record.position().map_or(0, |pos| pos.line());
        if record.len() != names.len() {
            bail!(
                "line {line}: expected {} cells, found {}",
                names.len(),
                record.len()
            );
        }
        for (column, cell) in record.iter().enumerate() {
            if cell.is_empty() {
                bail!("line {line}: missing value for '{}'", names[column]);
            }
            raw[column].push(cell.to_string());
        }
    }

    let mut arities = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for values in raw {
        let levels: BTreeMap<&str, u32> = values
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .zip(0..)
            .collect();
        let codes: Vec<u32> = values.iter().map(|v| levels[v.as_str()]).collect();
        arities.push(levels.len().max(1));
        columns.push(codes);
    }

    let dataset = Dataset::new(names, arities, columns)?;
    debug!(
        vars = dataset.num_vars(),
        rows = dataset.num_rows(),
        "csv_parsed"
    );
    Ok(dataset)
}

/// Read and parse a CSV file.
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data from {}", path.display()))?;
    parse_csv(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
