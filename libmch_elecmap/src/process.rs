use std::path::PathBuf;

use super::config::Config;
use super::elec_map::{build, ElecMapTables};
use super::emitter::{render, stage, write_fec_map};
use super::error::ProcessorError;
use super::row::{normalize_rows, CanonicalRow};
use super::sheet::{read_sheet, resolve_sheet, RawRow};

/// What a successful generation produced
#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub n_rows: usize,
    pub tables: ElecMapTables,
    pub written: Vec<PathBuf>,
}

/// Read every input of the config, in order.
///
/// All inputs are resolved before any of them is read, so a missing sheet stops the run
/// before any processing.
fn read_inputs(config: &Config) -> Result<Vec<RawRow>, ProcessorError> {
    let paths = config
        .inputs
        .iter()
        .map(|input| resolve_sheet(input, &config.sheet))
        .collect::<Result<Vec<_>, _>>()?;

    let mut raw_rows = Vec::new();
    for path in paths {
        spdlog::info!(
            "Reading sheet {} from {}...",
            config.sheet,
            path.to_string_lossy()
        );
        let rows = read_sheet(&path, config.header_rows)?;
        spdlog::info!("Read {} rows.", rows.len());
        raw_rows.extend(rows);
    }
    Ok(raw_rows)
}

/// The main entry of the generator.
///
/// Reads the cabling, builds the tables and writes every requested output. Outputs are only
/// written once everything has been built and rendered, so a failed run leaves no output behind.
pub fn process(config: &Config) -> Result<ProcessSummary, ProcessorError> {
    config.validate()?;

    let raw_rows = read_inputs(config)?;
    let rows = normalize_rows(&raw_rows).collect::<Result<Vec<CanonicalRow>, _>>()?;
    spdlog::info!(
        "Normalized {} cabling rows ({} padding rows dropped).",
        rows.len(),
        raw_rows.len() - rows.len()
    );

    let selection = config.selection();
    let tables = build(&rows, &selection)?;
    if tables.is_empty() {
        spdlog::warn!("No detection element of the selection was found in the cabling!");
    }
    if !tables.warnings().is_empty() {
        spdlog::warn!(
            "{} data quality warnings were raised, check the log for details.",
            tables.warnings().len()
        );
    }

    let mut artifacts: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    if let Some(output_path) = &config.output_path {
        let emitter = config.target.emitter(config.chamber.as_deref());
        artifacts.push((output_path.clone(), render(emitter.as_ref(), &tables)?));
    }
    if let Some(fec_map_path) = &config.fec_map_path {
        let mut fec_map = Vec::new();
        write_fec_map(
            rows.iter().filter(|row| selection.contains(row.de_id)),
            &mut fec_map,
        )?;
        artifacts.push((fec_map_path.clone(), fec_map));
    }

    // Stage everything before the first rename, so that a bad destination leaves no output
    let staged = artifacts
        .iter()
        .map(|(path, bytes)| stage(path, bytes))
        .collect::<Result<Vec<_>, _>>()?;
    let mut written = Vec::new();
    for artifact in staged {
        written.push(artifact.commit()?);
    }

    Ok(ProcessSummary {
        n_rows: rows.len(),
        tables,
        written,
    })
}
