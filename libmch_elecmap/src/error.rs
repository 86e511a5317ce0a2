use std::path::PathBuf;
use thiserror::Error;

use super::elec_map::Wiring;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Value {value} for {field} does not fit in the code; maximum is {max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("Malformed {field} field {value:?} at line {line}: {reason}")]
    MalformedField {
        line: u64,
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DsIdError {
    #[error("Could not parse {0:?} as a dual sampa id: {1}")]
    BadString(String, &'static str),
    #[error("Dual sampa id failed range check: {0}")]
    Range(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input {0:?} does not exist")]
    MissingInput(PathBuf),
    #[error("Workbook directory {0:?} has no sheet named {1:?}")]
    MissingSheet(PathBuf, String),
    #[error("Input failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Input failed to read delimited text: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("ElecMap build failed due to encoding error at line {line}: {source}")]
    Codec { line: u64, source: CodecError },
    #[error("Wiring conflict: {first} and {second} claim the same electronics address or channel")]
    DuplicateAddress { first: Wiring, second: Wiring },
}

#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("Emitter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Emitter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Emitter could not publish {0:?}: {1}")]
    PersistError(PathBuf, std::io::Error),
    #[error("Binary table has bad magic bytes")]
    BadMagic,
    #[error("Binary table has unsupported format version {0}; expected {1}")]
    BadVersion(u16, u16),
    #[error("Table data is not a valid electronic map: {0}")]
    Build(#[from] BuildError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config does not name any input file")]
    NoInputs,
    #[error("Config does not name a sheet")]
    NoSheet,
    #[error("Config does not name any output")]
    NoOutputs,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Input error: {0}")]
    InputError(#[from] InputError),
    #[error("Processor failed due to Row error: {0}")]
    RowError(#[from] RowError),
    #[error("Processor failed due to ElecMap build error: {0}")]
    BuildError(#[from] BuildError),
    #[error("Processor failed due to Emitter error: {0}")]
    EmitterError(#[from] EmitterError),
}
