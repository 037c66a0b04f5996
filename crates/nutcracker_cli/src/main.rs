//! Nutcracker CLI - variational ground states of matrix product operators
//!
//! Reads a Hamiltonian in the YAML operator format, runs the DMRG chain to
//! convergence, and reports the energy levels found.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nutcracker_chain::Chain;
use nutcracker_core::ChainOptions;
use nutcracker_yaml::{insert_at_location, lookup_location, read_operator_from_str};

/// Nutcracker - DMRG ground states of one-dimensional quantum systems.
#[derive(Parser)]
#[command(name = "nutcracker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Format of the input operator (yaml)
    #[arg(long, default_value = "yaml")]
    input_format: InputFormat,

    /// Format of the report (yaml, json)
    #[arg(long, default_value = "yaml")]
    output_format: OutputFormat,

    /// Read the operator from this file instead of standard input
    #[arg(long, value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Write the report to this file instead of standard output
    #[arg(long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Slash-delimited location of the operator inside the input document
    #[arg(long)]
    input_location: Option<String>,

    /// Slash-delimited location for the report inside the output file
    #[arg(long)]
    output_location: Option<String>,

    /// Replace the output file if it already exists
    #[arg(long)]
    overwrite: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Starting bandwidth dimension of the randomized state
    #[arg(long, default_value = "1")]
    initial_bandwidth: usize,

    /// Number of energy levels to compute, each orthogonal to the previous
    #[arg(long, default_value = "1")]
    number_of_levels: usize,

    /// Seed for the randomized initial states
    #[arg(long)]
    seed: Option<u64>,

    /// Residual tolerance of the local eigensolver
    #[arg(long, default_value = "1e-12")]
    site_tolerance: f64,

    /// Relative energy tolerance between sweeps
    #[arg(long, default_value = "1e-12")]
    sweep_tolerance: f64,

    /// Relative energy tolerance across bandwidth growth
    #[arg(long, default_value = "1e-12")]
    chain_tolerance: f64,

    /// Tolerance of the post-solve validation checks
    #[arg(long, default_value = "1e-12")]
    sanity_check_threshold: f64,

    /// Cap on matrix-vector products per local solve
    #[arg(long, default_value = "10000")]
    maximum_number_of_iterations: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Yaml,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(serde::Serialize)]
struct Report {
    configuration: Configuration,
    #[serde(rename = "energy levels")]
    energy_levels: Vec<f64>,
}

#[derive(serde::Serialize)]
struct Configuration {
    #[serde(rename = "site convergence tolerance")]
    site_convergence_tolerance: f64,
    #[serde(rename = "sweep convergence tolerance")]
    sweep_convergence_tolerance: f64,
    #[serde(rename = "chain convergence tolerance")]
    chain_convergence_tolerance: f64,
    #[serde(rename = "sanity check threshold")]
    sanity_check_threshold: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .try_init();

    if cli.output_location.is_some() && cli.output_format != OutputFormat::Yaml {
        bail!("--output-location is only supported with the yaml output format");
    }

    let text = match &cli.input_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read operator file: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read the operator from standard input")?;
            buffer
        }
    };
    let operator_sites = read_operator_from_str(&text, cli.input_location.as_deref())
        .context("failed to parse the operator")?;
    info!(
        sites = operator_sites.len(),
        "parsed operator, starting optimization"
    );

    let options = ChainOptions {
        maximum_number_of_iterations: cli.maximum_number_of_iterations,
        site_convergence_threshold: cli.site_tolerance,
        sweep_convergence_threshold: cli.sweep_tolerance,
        chain_convergence_threshold: cli.chain_tolerance,
        sanity_check_threshold: cli.sanity_check_threshold,
        ..ChainOptions::default()
    };

    let mut chain = match cli.seed {
        Some(seed) => Chain::with_seed(
            operator_sites,
            cli.initial_bandwidth,
            options.clone(),
            seed,
        ),
        None => Chain::new(operator_sites, cli.initial_bandwidth, options.clone()),
    }
    .context("failed to seed the chain")?;
    chain.on_sweep_performed(|energy| info!(energy, "sweep performed"));
    chain.on_optimize_site_failure(|error| tracing::warn!(%error, "site optimization failed"));

    let mut energy_levels = Vec::with_capacity(cli.number_of_levels);
    for level in 0..cli.number_of_levels {
        chain
            .optimize_chain()
            .with_context(|| format!("optimization of level {level} failed"))?;
        info!(level, energy = chain.energy(), "level converged");
        energy_levels.push(chain.energy());
        if level + 1 < cli.number_of_levels {
            let state = chain
                .make_copy_of_state()
                .context("failed to copy the converged state")?;
            chain
                .add_projector(state)
                .context("failed to add the orthogonality constraint")?;
        }
    }

    let report = Report {
        configuration: Configuration {
            site_convergence_tolerance: options.site_convergence_threshold,
            sweep_convergence_tolerance: options.sweep_convergence_threshold,
            chain_convergence_tolerance: options.chain_convergence_threshold,
            sanity_check_threshold: options.sanity_check_threshold,
        },
        energy_levels,
    };
    if let Some(location) = &cli.output_location {
        // merge the report into a container document at the location
        let report_value = serde_yaml::to_value(&report)?;
        match &cli.output_file {
            Some(path) => {
                let mut root: serde_yaml::Value = if path.exists() {
                    let existing = std::fs::read_to_string(path).with_context(|| {
                        format!("failed to read the output file: {}", path.display())
                    })?;
                    serde_yaml::from_str(&existing).with_context(|| {
                        format!("failed to parse the output file: {}", path.display())
                    })?
                } else {
                    serde_yaml::Value::Null
                };
                if !cli.overwrite && lookup_location(&root, location).is_ok() {
                    bail!(
                        "location '{location}' already exists in {}",
                        path.display()
                    );
                }
                insert_at_location(&mut root, location, report_value)?;
                std::fs::write(path, serde_yaml::to_string(&root)?)
                    .with_context(|| format!("failed to write the report: {}", path.display()))?;
            }
            None => {
                let mut root = serde_yaml::Value::Null;
                insert_at_location(&mut root, location, report_value)?;
                print!("{}", serde_yaml::to_string(&root)?);
            }
        }
        return Ok(());
    }

    let rendered = match cli.output_format {
        OutputFormat::Yaml => serde_yaml::to_string(&report)?,
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
    };
    match &cli.output_file {
        Some(path) => {
            if !cli.overwrite && path.exists() {
                bail!("output file already exists: {}", path.display());
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write the report: {}", path.display()))?;
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
