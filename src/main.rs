use std::fs::File;
use std::path::Path;
use log::{error, info, warn, LevelFilter};

use clap::{arg, ArgAction, ArgMatches, command};
use clap::parser::ValueSource;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

use mapedit::config::TilesetRegistry;
use mapedit::model::{MapModel, TilesetData};

fn parse_args() -> ArgMatches {
    command!()
        .next_line_help(true)
        .arg(
            arg!(--loglevel <LEVEL>)
                .required(false)
                .default_value("info")
                .value_parser(["trace", "debug", "info", "warn", "error", "off"])
                .action(ArgAction::Set)
        )
        .arg(
            arg!(--logfile [FILE_NAME])
                .required(false)
                .default_value("mapedit.log")
                .action(ArgAction::Set)
                .help("Enables logging to a file. Disabled by default")
        )
        .arg(
            arg!(-q --quiet)
                .required(false)
                .action(ArgAction::SetTrue)
                .help("Disables output to the terminal")
        )
        .arg(
            arg!(--registry <FILE>)
                .required(false)
                .default_value("tilesets.json")
                .action(ArgAction::Set)
                .help("Tileset registry file")
        )
        .arg(
            arg!(--tileset <LABEL>)
                .required(true)
                .action(ArgAction::Set)
                .help("Label of the tileset to open")
        )
        .arg(
            arg!(--map <FILE>)
                .required(true)
                .action(ArgAction::Set)
                .help("MAP file to check")
        )
        .arg(
            arg!(--routes <FILE>)
                .required(true)
                .action(ArgAction::Set)
                .help("RMP file belonging to the map")
        )
        .get_matches()
}

fn initialize_logging(matches: &ArgMatches) {
    let loglevel = match matches.get_one::<String>("loglevel") {
        None => LevelFilter::Off,
        Some(level) => {
            match level.as_str() {
                "trace" => LevelFilter::Trace,
                "debug" => LevelFilter::Debug,
                "info" => LevelFilter::Info,
                "warn" => LevelFilter::Warn,
                "error" => LevelFilter::Error,
                "off" => LevelFilter::Off,
                _ => unreachable!(),
            }
        }
    };
    let quiet = matches.get_flag("quiet");
    let term_loglevel = if quiet { LevelFilter::Off } else { loglevel };

    let logfile = match (matches.value_source("logfile"), matches.get_one::<String>("logfile")) {
        (Some(ValueSource::CommandLine), Some(file_name)) => {
            Some(file_name)
        },
        _ => None,
    };

    if let Some(logfile) = logfile {
        CombinedLogger::init(
            vec![
                TermLogger::new(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
                WriteLogger::new(loglevel, Config::default(), File::create(logfile).unwrap())
            ]
        ).unwrap();
    } else {
        TermLogger::init(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto).unwrap();
    }
}

/// Opens everything the way a viewer would and reports what it finds:
/// catalog size and warnings, grid dimensions, clamped references, route
/// nodes left out of bounds.
fn run_check(matches: &ArgMatches) -> Result<(), String> {
    let registry_path = matches.get_one::<String>("registry").unwrap();
    let label = matches.get_one::<String>("tileset").unwrap();
    let map_path = matches.get_one::<String>("map").unwrap();
    let route_path = matches.get_one::<String>("routes").unwrap();

    let registry = TilesetRegistry::load(Path::new(registry_path))
        .map_err(|e| format!("{registry_path}: {e}"))?;
    let entry = registry
        .find(label)
        .ok_or_else(|| format!("tileset {label} is not in {registry_path}"))?;

    let tileset = TilesetData::build(entry.to_descriptor()).map_err(|e| e.to_string())?;
    for warning in tileset.warnings() {
        warn!("{label}: {warning}");
    }
    info!("catalog: {} parts", tileset.len());

    let model = MapModel::open(tileset, Path::new(map_path), Path::new(route_path))
        .map_err(|e| e.to_string())?;

    info!(
        "grid: {} rows x {} cols x {} levels",
        model.grid.rows(),
        model.grid.cols(),
        model.grid.levs()
    );
    if model.grid.is_changed() {
        warn!("map held references outside the catalog; a save would repair it");
    }

    info!("routes: {} nodes", model.routes.len());
    let dangling = model.routes.check_bounds(&model.grid);
    if !dangling.is_empty() {
        warn!("route nodes out of bounds: {dangling:?}");
    }

    Ok(())
}

fn main() {
    let matches = parse_args();
    initialize_logging(&matches);

    if let Err(e) = run_check(&matches) {
        error!("{e}");
        std::process::exit(1);
    }
}
