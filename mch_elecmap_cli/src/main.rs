use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use libmch_elecmap::config::Config;
use libmch_elecmap::error::ConfigError;
use libmch_elecmap::emitter::EmitTarget;
use libmch_elecmap::process::process;

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    let config = Config::default();
    config.write_config_file(path)?;
    spdlog::info!("Done.");
    Ok(())
}

fn cli() -> Command {
    Command::new("mch_elecmap_cli")
        .about("Generate the MCH electronic map tables from the cabling spreadsheet")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to a YAML configuration file"),
        )
        .arg(
            Arg::new("excel")
                .short('e')
                .long("excel")
                .action(ArgAction::Append)
                .help("Exported sheet file(s), or workbook directories"),
        )
        .arg(
            Arg::new("sheet")
                .short('s')
                .long("sheet")
                .help("Name of the sheet to consider"),
        )
        .arg(
            Arg::new("chamber")
                .short('c')
                .long("chamber")
                .help("Chamber name used in the generated tables"),
        )
        .arg(
            Arg::new("de")
                .short('d')
                .long("de")
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(u32))
                .help("Only keep these detection elements"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output file for the tables"),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_parser(["rust", "binary", "yaml"])
                .help("Format of the tables"),
        )
        .arg(
            Arg::new("fec_map")
                .short('f')
                .long("fec-map")
                .help("fec.map output filename"),
        )
        .arg(
            Arg::new("header_rows")
                .long("header-rows")
                .value_parser(clap::value_parser!(usize))
                .help("Number of header rows to skip in each sheet"),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("Also write the log to this file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print every cabling row"),
        )
}

/// Flags given on the command line take precedence over the config file
fn apply_flags(config: &mut Config, matches: &ArgMatches) {
    if let Some(inputs) = matches.get_many::<String>("excel") {
        config.inputs = inputs.map(PathBuf::from).collect();
    }
    if let Some(sheet) = matches.get_one::<String>("sheet") {
        config.sheet = sheet.clone();
    }
    if let Some(chamber) = matches.get_one::<String>("chamber") {
        config.chamber = Some(chamber.clone());
    }
    if let Some(de_ids) = matches.get_many::<u32>("de") {
        config.detection_elements = Some(de_ids.copied().collect());
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output_path = Some(PathBuf::from(output));
    }
    if let Some(target) = matches.get_one::<String>("target") {
        if let Ok(target) = target.parse::<EmitTarget>() {
            config.target = target;
        }
    }
    if let Some(fec_map) = matches.get_one::<String>("fec_map") {
        config.fec_map_path = Some(PathBuf::from(fec_map));
    }
    if let Some(header_rows) = matches.get_one::<usize>("header_rows") {
        config.header_rows = *header_rows;
    }
    if let Some(log) = matches.get_one::<String>("log") {
        config.log_path = Some(PathBuf::from(log));
    }
    if matches.get_flag("verbose") {
        config.verbose = true;
    }
}

/// Setup logging to the terminal, and to a file if asked
fn init_logging(config: &Config) -> Result<(), spdlog::Error> {
    let level = if config.verbose {
        spdlog::LevelFilter::All
    } else {
        spdlog::LevelFilter::MoreSevereEqual(spdlog::Level::Info)
    };
    let default_logger = spdlog::default_logger();
    let mut builder = spdlog::Logger::builder();
    builder
        .level_filter(level)
        .sinks(default_logger.sinks().to_owned());

    if let Some(log_path) = &config.log_path {
        let file_sink = Arc::new(
            spdlog::sink::FileSink::builder()
                .path(log_path)
                .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                    spdlog::formatter::pattern!(
                        "[{date_short} {time_short}] - [{^{level}}] - {payload}{eol}"
                    ),
                )))
                .truncate(true)
                .build()?,
        );
        builder.sink(file_sink);
    }

    spdlog::set_default_logger(Arc::new(builder.build()?));
    Ok(())
}

fn main() -> ExitCode {
    // Create a cli
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);

    if let Some(("new", _)) = matches.subcommand() {
        let Some(config_path) = config_path else {
            spdlog::error!("The new subcommand needs --config <path> for the template");
            return ExitCode::FAILURE;
        };
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        return match make_template_config(&config_path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                spdlog::error!("Could not write template config: {e}");
                ExitCode::FAILURE
            }
        };
    }

    // Load our config
    let mut config = match &config_path {
        Some(path) => {
            spdlog::info!("Loading config from {}...", path.to_string_lossy());
            match Config::read_config_file(path) {
                Ok(c) => c,
                Err(e) => {
                    spdlog::error!("{e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        None => Config::default(),
    };
    apply_flags(&mut config, &matches);

    // Initialize feedback
    if let Err(e) = init_logging(&config) {
        spdlog::error!("Could not create logging: {e}");
        return ExitCode::FAILURE;
    }

    spdlog::info!("Sheet: {}", config.sheet);
    for input in config.inputs.iter() {
        spdlog::info!("Input: {}", input.to_string_lossy());
    }
    if let Some(chamber) = &config.chamber {
        spdlog::info!("Chamber: {chamber}");
    }
    match &config.detection_elements {
        Some(de_ids) => spdlog::info!("Detection elements: {de_ids:?}"),
        None => spdlog::info!("Detection elements: all"),
    }

    match process(&config) {
        Ok(summary) => {
            spdlog::info!(
                "Successfully generated the electronic map from {} cabling rows!",
                summary.n_rows
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            spdlog::error!("Generation failed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config {
            sheet: String::from("CH5R"),
            chamber: Some(String::from("CH5R")),
            ..Default::default()
        };
        let matches = cli().get_matches_from([
            "mch_elecmap_cli",
            "-e",
            "a.csv",
            "-e",
            "b.csv",
            "-s",
            "CH6L",
            "-d",
            "600",
            "-d",
            "601",
            "-t",
            "yaml",
            "-o",
            "ch6l.yml",
            "-v",
        ]);
        apply_flags(&mut config, &matches);
        assert_eq!(
            config.inputs,
            vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]
        );
        assert_eq!(config.sheet, "CH6L");
        assert_eq!(config.chamber.as_deref(), Some("CH5R"));
        assert_eq!(config.detection_elements, Some(vec![600, 601]));
        assert_eq!(config.target, EmitTarget::Yaml);
        assert_eq!(config.output_path, Some(PathBuf::from("ch6l.yml")));
        assert!(config.verbose);
    }

    #[test]
    fn test_template_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.yml");
        make_template_config(&path).unwrap();
        assert_eq!(Config::read_config_file(&path).unwrap(), Config::default());
        assert!(make_template_config(&dir.path().join("missing").join("template.yml")).is_err());
    }

    #[test]
    fn test_log_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            log_path: Some(dir.path().join("elecmap.log")),
            ..Default::default()
        };
        init_logging(&config).unwrap();
        assert!(dir.path().join("elecmap.log").exists());
    }

    #[test]
    fn test_cli_rejects_bad_target() {
        assert!(cli()
            .try_get_matches_from(["mch_elecmap_cli", "-t", "hdf5"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["mch_elecmap_cli", "-d", "DE500"])
            .is_err());
    }
}
