use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use super::constants::{DUAL_SAMPAS_PER_GROUP, SHEET_COLUMNS};
use super::error::InputError;

const SHEET_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

/// One row of the cabling spreadsheet, exactly as exported (columns A to N).
///
/// Only crate, solar, detection element, cru and the dual sampa columns are used
/// by the map; the others are kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub cru: String,
    pub fiber: String,
    pub crate_label: String,
    pub solar: String,
    pub solar_local_id: String,
    pub j: String,
    pub slat: String,
    pub length: String,
    pub detection_element: String,
    pub dual_sampas: [String; DUAL_SAMPAS_PER_GROUP],
}

impl RawRow {
    /// Build a row from a record. Cells past the end of a short record are blank.
    pub fn from_record(record: &StringRecord, line: u64) -> Self {
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        Self {
            line,
            cru: cell(0),
            fiber: cell(1),
            crate_label: cell(2),
            solar: cell(3),
            solar_local_id: cell(4),
            j: cell(5),
            slat: cell(6),
            length: cell(7),
            detection_element: cell(8),
            dual_sampas: std::array::from_fn(|i| cell(9 + i)),
        }
    }
}

/// Find the file holding a sheet.
///
/// A file path is taken as the sheet export itself. A directory is taken as an exported workbook
/// holding one `<sheet>.csv` or `<sheet>.tsv` per sheet.
pub fn resolve_sheet(input: &Path, sheet: &str) -> Result<PathBuf, InputError> {
    if input.is_file() {
        return Ok(input.to_path_buf());
    }
    if !input.is_dir() {
        return Err(InputError::MissingInput(input.to_path_buf()));
    }
    SHEET_EXTENSIONS
        .iter()
        .map(|ext| input.join(format!("{sheet}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| InputError::MissingSheet(input.to_path_buf(), sheet.to_string()))
}

/// Read all rows of a sheet export, skipping the header records
pub fn read_sheet(path: &Path, header_rows: usize) -> Result<Vec<RawRow>, InputError> {
    if !path.exists() {
        return Err(InputError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)?;
    read_rows(file, delimiter_for(path), header_rows)
}

/// Read rows from any reader. Each row remembers the source line it started on.
pub fn read_rows<R: std::io::Read>(
    reader: R,
    delimiter: u8,
    header_rows: usize,
) -> Result<Vec<RawRow>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate().skip(header_rows) {
        let record = result?;
        if record.len() > SHEET_COLUMNS {
            spdlog::debug!(
                "Record {} has {} columns, ignoring the ones past column {}",
                idx + 1,
                record.len(),
                SHEET_COLUMNS
            );
        }
        let line = record
            .position()
            .map_or(idx as u64 + 1, |position| position.line());
        rows.push(RawRow::from_record(&record, line));
    }
    Ok(rows)
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    }
}
