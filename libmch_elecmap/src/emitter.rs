use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

use super::constants::{BINARY_FORMAT_VERSION, BINARY_MAGIC};
use super::ds_id::{decode_address, decode_channel, AddressCode, ChannelCode};
use super::elec_map::ElecMapTables;
use super::error::EmitterError;
use super::row::CanonicalRow;

const GENERATED_BANNER: &str = "// GENERATED CODE ! DO NOT EDIT !\n";

/// A TableEmitter writes the tables of an electronic map in one output format.
///
/// Entries are always written in ascending key order, so that regenerating from the same cabling
/// gives the same bytes.
pub trait TableEmitter {
    fn emit(&self, tables: &ElecMapTables, out: &mut dyn Write) -> Result<(), EmitterError>;
}

/// The available output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitTarget {
    #[default]
    Rust,
    Binary,
    Yaml,
}

impl FromStr for EmitTarget {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rust" => Ok(Self::Rust),
            "binary" => Ok(Self::Binary),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!("unknown target {s:?}; expected rust, binary or yaml")),
        }
    }
}

impl EmitTarget {
    pub fn emitter(&self, chamber: Option<&str>) -> Box<dyn TableEmitter> {
        match self {
            Self::Rust => Box::new(RustSourceEmitter::new(chamber)),
            Self::Binary => Box::new(BinaryEmitter),
            Self::Yaml => Box::new(YamlEmitter),
        }
    }
}

/// Emits Rust source with one `const` slice per table
#[derive(Debug, Clone, Default)]
pub struct RustSourceEmitter {
    chamber: Option<String>,
}

impl RustSourceEmitter {
    pub fn new(chamber: Option<&str>) -> Self {
        Self {
            chamber: chamber.map(String::from),
        }
    }

    /// `CH5R` -> `_CH5R`, so that several chambers can live in one module
    fn suffix(&self) -> String {
        match &self.chamber {
            Some(chamber) if !chamber.is_empty() => {
                let name: String = chamber
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() {
                            c.to_ascii_uppercase()
                        } else {
                            '_'
                        }
                    })
                    .collect();
                format!("_{name}")
            }
            _ => String::new(),
        }
    }
}

impl TableEmitter for RustSourceEmitter {
    fn emit(&self, tables: &ElecMapTables, out: &mut dyn Write) -> Result<(), EmitterError> {
        let suffix = self.suffix();
        out.write_all(GENERATED_BANNER.as_bytes())?;
        writeln!(out)?;

        writeln!(
            out,
            "/// (solar | group << 10 | elink index << 13) -> (detection element << 16 | dual sampa)"
        )?;
        writeln!(out, "pub const ELEC_TO_DET{suffix}: &[(u16, u32)] = &[")?;
        for (address, channel) in tables.elec_to_det() {
            writeln!(
                out,
                "    ({}, {}), // {} -> {}",
                address.value(),
                channel.value(),
                decode_address(*address),
                decode_channel(*channel)
            )?;
        }
        writeln!(out, "];")?;
        writeln!(out)?;

        writeln!(out, "/// cru -> solars")?;
        writeln!(out, "pub const CRU_TO_SOLARS{suffix}: &[(u16, &[u16])] = &[")?;
        for (cru, solars) in tables.cru_to_solars() {
            let solars: Vec<String> = solars.iter().map(|s| s.to_string()).collect();
            writeln!(out, "    ({cru}, &[{}]),", solars.join(", "))?;
        }
        writeln!(out, "];")?;
        writeln!(out)?;

        writeln!(out, "/// detection element -> cru")?;
        writeln!(out, "pub const DE_ID_TO_CRU{suffix}: &[(u16, u16)] = &[")?;
        for (de_id, cru) in tables.de_id_to_cru() {
            writeln!(out, "    ({de_id}, {cru}),")?;
        }
        writeln!(out, "];")?;
        writeln!(out)?;

        writeln!(
            out,
            "pub const NOF_SOLARS{suffix}: usize = {};",
            tables.solar_count()
        )?;
        Ok(())
    }
}

/// Emits the tables as a little-endian blob, readable with [`read_binary`].
///
/// Layout: magic, version (u16), then each table as a u32 entry count followed by its entries.
/// The solar count closes the blob as a u64.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryEmitter;

impl TableEmitter for BinaryEmitter {
    fn emit(&self, tables: &ElecMapTables, out: &mut dyn Write) -> Result<(), EmitterError> {
        out.write_all(BINARY_MAGIC)?;
        out.write_u16::<LittleEndian>(BINARY_FORMAT_VERSION)?;

        out.write_u32::<LittleEndian>(tables.elec_to_det().len() as u32)?;
        for (address, channel) in tables.elec_to_det() {
            out.write_u16::<LittleEndian>(address.value())?;
            out.write_u32::<LittleEndian>(channel.value())?;
        }

        out.write_u32::<LittleEndian>(tables.cru_to_solars().len() as u32)?;
        for (cru, solars) in tables.cru_to_solars() {
            out.write_u16::<LittleEndian>(*cru)?;
            out.write_u32::<LittleEndian>(solars.len() as u32)?;
            for solar in solars {
                out.write_u16::<LittleEndian>(*solar)?;
            }
        }

        out.write_u32::<LittleEndian>(tables.de_id_to_cru().len() as u32)?;
        for (de_id, cru) in tables.de_id_to_cru() {
            out.write_u16::<LittleEndian>(*de_id)?;
            out.write_u16::<LittleEndian>(*cru)?;
        }

        out.write_u64::<LittleEndian>(tables.solar_count() as u64)?;
        Ok(())
    }
}

/// Read back a blob written by [`BinaryEmitter`]
pub fn read_binary<R: Read>(mut reader: R) -> Result<ElecMapTables, EmitterError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != BINARY_MAGIC {
        return Err(EmitterError::BadMagic);
    }
    let version = reader.read_u16::<LittleEndian>()?;
    if version != BINARY_FORMAT_VERSION {
        return Err(EmitterError::BadVersion(version, BINARY_FORMAT_VERSION));
    }

    let n_wirings = reader.read_u32::<LittleEndian>()?;
    let mut elec_to_det = Vec::new();
    for _ in 0..n_wirings {
        let address = AddressCode::from_raw(reader.read_u16::<LittleEndian>()?);
        let channel = ChannelCode::from_raw(reader.read_u32::<LittleEndian>()?);
        elec_to_det.push((address, channel));
    }

    let n_crus = reader.read_u32::<LittleEndian>()?;
    let mut cru_to_solars = BTreeMap::new();
    for _ in 0..n_crus {
        let cru = reader.read_u16::<LittleEndian>()?;
        let n_solars = reader.read_u32::<LittleEndian>()?;
        let mut solars = BTreeSet::new();
        for _ in 0..n_solars {
            solars.insert(reader.read_u16::<LittleEndian>()?);
        }
        cru_to_solars.insert(cru, solars);
    }

    let n_des = reader.read_u32::<LittleEndian>()?;
    let mut de_id_to_cru = BTreeMap::new();
    for _ in 0..n_des {
        let de_id = reader.read_u16::<LittleEndian>()?;
        let cru = reader.read_u16::<LittleEndian>()?;
        de_id_to_cru.insert(de_id, cru);
    }

    let solar_count = reader.read_u64::<LittleEndian>()? as usize;
    Ok(ElecMapTables::from_parts(
        elec_to_det,
        cru_to_solars,
        de_id_to_cru,
        solar_count,
    )?)
}

/// Plain-integer form of the tables for the YAML target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TableDump {
    elec_to_det: BTreeMap<u16, u32>,
    cru_to_solars: BTreeMap<u16, BTreeSet<u16>>,
    de_id_to_cru: BTreeMap<u16, u16>,
    solar_count: usize,
}

/// Emits the tables as a YAML document, readable with [`read_yaml`]
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlEmitter;

impl TableEmitter for YamlEmitter {
    fn emit(&self, tables: &ElecMapTables, out: &mut dyn Write) -> Result<(), EmitterError> {
        let dump = TableDump {
            elec_to_det: tables
                .elec_to_det()
                .iter()
                .map(|(address, channel)| (address.value(), channel.value()))
                .collect(),
            cru_to_solars: tables.cru_to_solars().clone(),
            de_id_to_cru: tables.de_id_to_cru().clone(),
            solar_count: tables.solar_count(),
        };
        out.write_all(serde_yaml::to_string(&dump)?.as_bytes())?;
        Ok(())
    }
}

/// Read back a document written by [`YamlEmitter`]
pub fn read_yaml(yaml_str: &str) -> Result<ElecMapTables, EmitterError> {
    let dump = serde_yaml::from_str::<TableDump>(yaml_str)?;
    Ok(ElecMapTables::from_parts(
        dump.elec_to_det
            .into_iter()
            .map(|(address, channel)| (AddressCode::from_raw(address), ChannelCode::from_raw(channel))),
        dump.cru_to_solars,
        dump.de_id_to_cru,
        dump.solar_count,
    )?)
}

/// Render the tables fully in memory
pub fn render(emitter: &dyn TableEmitter, tables: &ElecMapTables) -> Result<Vec<u8>, EmitterError> {
    let mut buffer = Vec::new();
    emitter.emit(tables, &mut buffer)?;
    Ok(buffer)
}

/// Write the flat fec map: one line per cabled group, with the solar, group and detection
/// element followed by the five dual sampa slots
pub fn write_fec_map<'a, I>(rows: I, out: &mut dyn Write) -> Result<(), EmitterError>
where
    I: IntoIterator<Item = &'a CanonicalRow>,
{
    for row in rows {
        let mut line = format!("{:<6} {:>2} {:>9}   ", row.solar_id, row.group_id, row.de_id);
        for ds_id in row.ds_ids {
            line.push_str(&format!(" {ds_id:<6}"));
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

/// An artifact written to a temporary file next to its destination, not yet visible there.
///
/// Dropping it without committing removes the temporary file.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    staged: NamedTempFile,
    size: usize,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the staged file over the destination
    pub fn commit(self) -> Result<PathBuf, EmitterError> {
        self.staged
            .persist(&self.path)
            .map_err(|e| EmitterError::PersistError(self.path.clone(), e.error))?;
        spdlog::info!(
            "Wrote {} to {}",
            human_bytes::human_bytes(self.size as f64),
            self.path.to_string_lossy()
        );
        Ok(self.path)
    }
}

/// Write bytes to a temporary file in the destination directory and sync it.
///
/// Nothing is visible at `path` until [`StagedArtifact::commit`], so readers see either the old
/// file or the complete new one.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<StagedArtifact, EmitterError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let persist_error = |e: std::io::Error| EmitterError::PersistError(path.to_path_buf(), e);
    let mut staged = NamedTempFile::new_in(dir).map_err(persist_error)?;
    staged.write_all(bytes).map_err(persist_error)?;
    staged.as_file().sync_all().map_err(persist_error)?;
    Ok(StagedArtifact {
        path: path.to_path_buf(),
        staged,
        size: bytes.len(),
    })
}
