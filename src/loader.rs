use crate::error::{ReportError, Result};
use crate::types::{NormalizedRow, RawRow};
use crate::util::{
    csv_reader, parse_bool_safe, parse_date_safe, parse_i32_safe, parse_i64_safe,
};
use chrono::Datelike;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub sources_read: usize,
    pub sources_skipped: usize,
    pub total_rows: usize,
    pub malformed_rows: usize,
    pub coerced_cells: usize,
    pub undated_rows: usize,
}

/// Load every monthly extract, skipping unreadable sources, and return one
/// normalized table per source. Zero usable sources is the only fatal case:
/// publishing a dashboard from nothing would be worse than failing the run.
pub fn load_all(
    input_dir: &Path,
    paths: &[PathBuf],
    delimiter: u8,
) -> Result<(Vec<Vec<NormalizedRow>>, LoadReport)> {
    let mut report = LoadReport::default();
    let mut tables = Vec::new();

    for path in paths {
        match load_month(path, delimiter, &mut report) {
            Ok(rows) => {
                info!("{}: {} rows", path.display(), rows.len());
                report.sources_read += 1;
                report.total_rows += rows.len();
                tables.push(rows);
            }
            Err(e) => {
                warn!("skipping unreadable source {}: {}", path.display(), e);
                report.sources_skipped += 1;
            }
        }
    }

    if report.sources_read == 0 {
        return Err(ReportError::NoInput(input_dir.to_path_buf()));
    }
    Ok((tables, report))
}

/// Concatenate the per-month tables into one, preserving every row. A
/// prescription id present in two extracts stays duplicated here; uniqueness
/// is resolved by the distinct-counts downstream, never by dropping rows.
pub fn merge_months(tables: Vec<Vec<NormalizedRow>>) -> Vec<NormalizedRow> {
    let total = tables.iter().map(Vec::len).sum();
    let mut merged: Vec<NormalizedRow> = Vec::with_capacity(total);
    for table in tables {
        merged.extend(table);
    }
    merged
}

fn load_month(path: &Path, delimiter: u8, report: &mut LoadReport) -> Result<Vec<NormalizedRow>> {
    let mut rdr = csv_reader(path, delimiter)?;
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawRow>() {
        let raw = match result {
            Ok(r) => r,
            Err(_) => {
                report.malformed_rows += 1;
                continue;
            }
        };
        rows.push(normalize(raw, report));
    }
    Ok(rows)
}

/// Coerce one cell, counting cells that carried text but failed to parse.
/// Empty or absent cells are ordinary nulls, not coercion failures.
fn coerce<T>(
    cell: Option<&str>,
    parse: fn(Option<&str>) -> Option<T>,
    report: &mut LoadReport,
) -> Option<T> {
    let present = cell.map(str::trim).is_some_and(|s| !s.is_empty());
    let parsed = parse(cell);
    if present && parsed.is_none() {
        report.coerced_cells += 1;
    }
    parsed
}

fn normalize(raw: RawRow, report: &mut LoadReport) -> NormalizedRow {
    // Ids fall back to 0 so a damaged row still aggregates (under entity 0)
    // instead of disappearing; quantities keep `None` for traceability.
    let prescription_id = coerce(raw.prescription_id.as_deref(), parse_i64_safe, report);
    let patient_id = coerce(raw.patient_id.as_deref(), parse_i64_safe, report);
    let physician_id = coerce(raw.physician_id.as_deref(), parse_i32_safe, report);
    let pharmacy_id = coerce(raw.pharmacy_id.as_deref(), parse_i32_safe, report);
    let medication_id = coerce(raw.medication_id.as_deref(), parse_i32_safe, report);
    let quantity_prescribed = coerce(raw.quantity_prescribed.as_deref(), parse_i32_safe, report);
    let quantity_dispensed = coerce(raw.quantity_dispensed.as_deref(), parse_i32_safe, report);
    let stock_at_pharmacy = coerce(raw.stock_at_pharmacy.as_deref(), parse_i32_safe, report);
    let is_chronic = coerce(raw.is_chronic.as_deref(), parse_bool_safe, report);
    let need_date = coerce(raw.need_date.as_deref(), parse_date_safe, report);

    if need_date.is_none() {
        report.undated_rows += 1;
    }

    NormalizedRow {
        prescription_id: prescription_id.unwrap_or(0),
        patient_id: patient_id.unwrap_or(0),
        physician_id: physician_id.unwrap_or(0),
        pharmacy_id: pharmacy_id.unwrap_or(0),
        medication_id: medication_id.unwrap_or(0),
        quantity_prescribed,
        quantity_dispensed,
        stock_at_pharmacy,
        is_chronic: is_chronic.unwrap_or(false),
        need_date,
        year: need_date.map(|d| d.year() as i16),
        month: need_date.map(|d| d.month() as u8),
    }
}
