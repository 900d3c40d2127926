//! Reads tabular attribute sources (CSV).
//!
//! Each source maps a handful of its columns onto known ward attributes.
//! Cells are parsed leniently for formatting ("45%", "1,20,000") but a
//! non-empty cell that is not a number aborts the whole source: there is
//! no way to tell a garbled value from a real one downstream.

use std::collections::BTreeSet;
use std::io::Read;

use urban_sim_ward_models::WardAttribute;
use urban_sim_ward_models::source::{KeyKind, TabularSource};

use crate::WardError;
use crate::normalize::{normalize_code, normalize_name};

/// Cell spellings treated as "no value".
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "null", "none", "-"];

/// A single row of a tabular source, keyed for joining.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    /// Key as it appears in the source.
    pub raw_key: String,
    /// Normalized join key.
    pub key: String,
    /// Values for the attributes this source provides. `None` where the
    /// cell was empty.
    pub values: Vec<(WardAttribute, Option<f64>)>,
}

/// Reads all rows of `source` from `reader`.
///
/// # Errors
///
/// Returns [`WardError::Source`] if the key column or a mapped column is
/// absent, a key is empty or repeated, or a cell holds a non-numeric
/// value, and [`WardError::Csv`] if the CSV itself is malformed.
pub fn read_source<R: Read>(
    source: &TabularSource,
    reader: R,
) -> Result<Vec<TabularRow>, WardError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column_index = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| {
                WardError::broken_source(&source.id, format!("missing column '{column}'"))
            })
    };

    let key_idx = column_index(source.key_column.as_str())?;
    let mapped: Vec<(WardAttribute, usize)> = source
        .columns
        .iter()
        .map(|(attribute, column)| Ok((*attribute, column_index(column.as_str())?)))
        .collect::<Result<_, WardError>>()?;

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();

    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = line + 2;

        let raw_key = record.get(key_idx).unwrap_or_default().to_string();
        let key = match source.key_kind {
            KeyKind::Code => normalize_code(&raw_key),
            KeyKind::Name => normalize_name(&raw_key),
        };

        if key.is_empty() {
            return Err(WardError::broken_source(
                &source.id,
                format!("line {line}: empty join key '{raw_key}'"),
            ));
        }
        if !seen.insert(key.clone()) {
            return Err(WardError::broken_source(
                &source.id,
                format!("line {line}: duplicate join key '{raw_key}'"),
            ));
        }

        let values = mapped
            .iter()
            .map(|(attribute, idx)| {
                let cell = record.get(*idx).unwrap_or_default();
                parse_number(cell)
                    .map(|value| (*attribute, value))
                    .ok_or_else(|| {
                        WardError::broken_source(
                            &source.id,
                            format!("line {line}: '{cell}' is not a number ({attribute})"),
                        )
                    })
            })
            .collect::<Result<Vec<_>, WardError>>()?;

        rows.push(TabularRow {
            raw_key,
            key,
            values,
        });
    }

    log::debug!("{}: read {} rows", source.id, rows.len());

    Ok(rows)
}

/// Parses a numeric cell.
///
/// Returns `Some(None)` for a missing-value marker, `Some(Some(x))` for a
/// number and `None` if the cell is not a number at all.
#[must_use]
pub fn parse_number(cell: &str) -> Option<Option<f64>> {
    let trimmed = cell.trim();
    if MISSING_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        return Some(None);
    }

    let cleaned: String = trimmed
        .strip_suffix('%')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let value = cleaned.parse::<f64>().ok()?;
    value.is_finite().then_some(Some(value))
}
