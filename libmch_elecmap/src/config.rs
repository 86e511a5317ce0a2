use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::DEFAULT_HEADER_ROWS;
use super::elec_map::DeSelection;
use super::emitter::EmitTarget;
use super::error::ConfigError;

/// Structure representing one generation of an electronic map. Contains the inputs, the
/// selection and the outputs.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sheet exports, or workbook directories holding one export per sheet
    pub inputs: Vec<PathBuf>,
    pub sheet: String,
    pub header_rows: usize,
    /// Names the generated tables, e.g. CH5R
    pub chamber: Option<String>,
    /// None selects every detection element of the sheet
    pub detection_elements: Option<Vec<u32>>,
    pub output_path: Option<PathBuf>,
    pub target: EmitTarget,
    pub fec_map_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for Config {
    /// Generate a new Config object. Inputs and outputs are empty
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            sheet: String::from(""),
            header_rows: DEFAULT_HEADER_ROWS,
            chamber: None,
            detection_elements: None,
            output_path: None,
            target: EmitTarget::default(),
            fec_map_path: None,
            log_path: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check that the config can drive a generation: something to read, something to write
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        if self.sheet.is_empty() {
            return Err(ConfigError::NoSheet);
        }
        if !self.has_outputs() {
            return Err(ConfigError::NoOutputs);
        }
        Ok(())
    }

    pub fn has_outputs(&self) -> bool {
        self.output_path.is_some() || self.fec_map_path.is_some()
    }

    pub fn selection(&self) -> DeSelection {
        DeSelection::from(self.detection_elements.clone())
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let config = Config {
            inputs: vec![PathBuf::from("sheets/ch5.csv")],
            sheet: String::from("CH5R"),
            chamber: Some(String::from("CH5R")),
            detection_elements: Some(vec![500, 501]),
            output_path: Some(PathBuf::from("out/ch5r.rs")),
            target: EmitTarget::Yaml,
            ..Default::default()
        };
        config.write_config_file(&path).unwrap();
        assert_eq!(Config::read_config_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_yaml::from_str("sheet: CH6L\ntarget: binary\n").unwrap();
        assert_eq!(config.sheet, "CH6L");
        assert_eq!(config.target, EmitTarget::Binary);
        assert_eq!(config.header_rows, DEFAULT_HEADER_ROWS);
        assert_eq!(config.selection(), DeSelection::All);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoInputs)));
        config.inputs.push(PathBuf::from("a.csv"));
        assert!(matches!(config.validate(), Err(ConfigError::NoSheet)));
        config.sheet = String::from("CH5R");
        assert!(matches!(config.validate(), Err(ConfigError::NoOutputs)));
        config.fec_map_path = Some(PathBuf::from("fec.map"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/does/not/exist.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
