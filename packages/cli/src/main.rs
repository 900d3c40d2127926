#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward impact simulator CLI.
//!
//! ```text
//! urban_sim build-registry --definition join.toml --output wards.json
//! urban_sim wards --snapshot wards.json
//! urban_sim simulate W014 road --param length=2.0 [--config sim.toml]
//! urban_sim suggest school --snapshot wards.json
//! urban_sim locate 83.305 17.705 --snapshot wards.json
//! ```
//!
//! `simulate` reads its artifact paths from `--config` when given and
//! from the `URBAN_SIM_*` environment variables otherwise.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use urban_sim_simulation::{
    SimulationConfig, SimulationError, Simulator, parse_intervention, suggest,
};
use urban_sim_simulation_models::SimulationRequest;
use urban_sim_ward::WardRegistry;
use urban_sim_ward::join::JoinBuilder;

#[derive(Parser)]
#[command(name = "urban_sim", about = "Ward-level urban intervention simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join boundary and tabular sources into a ward snapshot
    BuildRegistry {
        /// Join definition (TOML)
        #[arg(long)]
        definition: PathBuf,
        /// Where to write the snapshot (JSON)
        #[arg(long)]
        output: PathBuf,
    },
    /// List the wards in a snapshot
    Wards {
        /// Ward snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Simulate an intervention in one ward and print the result as JSON
    Simulate {
        /// Ward code
        ward: String,
        /// Intervention type (road, road_flyover, road_tunnel, mall, school, hospital, park)
        intervention: String,
        /// Magnitude parameter as `name=value`, e.g. `length=2.0`
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,
        /// Simulator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Suggest the ward that most needs a facility
    Suggest {
        /// Intervention type (school, hospital, park, mall)
        intervention: String,
        /// Ward snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Find the ward containing a point
    Locate {
        /// Longitude (WGS84)
        #[arg(allow_negative_numbers = true)]
        lng: f64,
        /// Latitude (WGS84)
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Ward snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },
}

fn parse_param(value: &str) -> Result<(String, f64), String> {
    let (name, number) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{value}'"))?;
    let number = number
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("'{number}' is not a number: {e}"))?;
    Ok((name.trim().to_string(), number))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildRegistry { definition, output } => {
            let builder = JoinBuilder::from_file(&definition)?;
            let (registry, report) = builder.build(chrono::Utc::now())?;
            registry.save(&output)?;

            println!(
                "{} wards written to {} ({} matched, {} without tabular data)",
                registry.len(),
                output.display(),
                report.matched,
                report.boundary_only.len()
            );
            for dropped in &report.dropped {
                println!("  dropped {} row '{}': no matching ward", dropped.source_id, dropped.key);
            }
        }
        Commands::Wards { snapshot } => {
            let registry = WardRegistry::load(&snapshot)?;

            println!("{:<10} {:<30} {:>10} {:>8}", "CODE", "NAME", "AREA KM2", "MISSING");
            println!("{}", "-".repeat(61));
            for ward in registry.list() {
                println!(
                    "{:<10} {:<30} {:>10.2} {:>8}",
                    ward.code(),
                    ward.name(),
                    ward.area_sq_km(),
                    ward.attributes().missing().len()
                );
            }
            println!("\n{} ward(s)", registry.len());
        }
        Commands::Simulate {
            ward,
            intervention,
            params,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let simulator = Simulator::from_config(&config)?;
            let request = SimulationRequest {
                ward_code: ward,
                intervention_type: intervention,
                intervention_params: params.into_iter().collect::<BTreeMap<_, _>>(),
            };
            log::debug!("{request:?}");

            let result = simulator.simulate(&request).or_else(reject_request)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Suggest {
            intervention,
            snapshot,
        } => {
            let registry = WardRegistry::load(&snapshot)?;
            let suggestion = parse_intervention(&intervention)
                .and_then(|intervention| suggest::suggest(&registry, intervention))
                .or_else(reject_request)?;
            println!("{}", serde_json::to_string_pretty(&suggestion)?);
        }
        Commands::Locate { lng, lat, snapshot } => {
            let registry = WardRegistry::load(&snapshot)?;
            if let Some(ward) = registry.locate(lng, lat) {
                println!("{} {}", ward.code(), ward.name());
            } else {
                eprintln!("No ward contains ({lng}, {lat})");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Exits with status 2 on a rejected request and passes fatal errors on.
fn reject_request<T>(e: SimulationError) -> Result<T, SimulationError> {
    if e.is_fatal() {
        return Err(e);
    }
    eprintln!("{e}");
    std::process::exit(2);
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig, SimulationError> {
    match path {
        Some(path) => SimulationConfig::load(path),
        None => SimulationConfig::from_env(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn suggest_leaves_type_names_to_the_simulator() {
        let cli = Cli::try_parse_from(["urban_sim", "suggest", "stadium", "--snapshot", "w.json"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Suggest { ref intervention, .. } if intervention == "stadium"
        ));
        assert!(matches!(
            parse_intervention("stadium"),
            Err(SimulationError::UnsupportedIntervention { .. })
        ));
    }

    #[test]
    fn param_pairs_parse() {
        assert_eq!(parse_param("length = 2.5"), Ok(("length".to_string(), 2.5)));
        assert!(parse_param("length").is_err());
        assert!(parse_param("length=long").is_err());
    }
}
