use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gr_config::RigConfig;
use gr_controls::RoutingMode;
use gr_core::GasId;
use gr_gas::GasChannelRegistry;
use gr_gas::setpoint::validate_flow;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "gr-cli")]
#[command(about = "Gas rig CLI - configuration and setpoint tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rig configuration file
    Validate {
        /// Path to the rig YAML file
        config_path: PathBuf,
    },
    /// List the gas channels of a rig
    Gases {
        /// Rig YAML file (reference rig when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the valve vector of every delivery mode
    Modes {
        #[arg(long)]
        json: bool,
    },
    /// Validate a flow and show the setpoint code it encodes to
    Encode {
        /// Gas channel name, e.g. He_A or CO_AL
        gas: String,
        /// Requested flow in sccm
        flow: f64,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write the reference rig configuration
    DefaultConfig {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] gr_config::ConfigError),

    #[error(transparent)]
    Gas(#[from] gr_gas::GasError),

    #[error(transparent)]
    Core(#[from] gr_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Gases { config, json } => cmd_gases(config.as_deref(), json),
        Commands::Modes { json } => cmd_modes(json),
        Commands::Encode {
            gas,
            flow,
            config,
            json,
        } => cmd_encode(&gas, flow, config.as_deref(), json),
        Commands::DefaultConfig { output } => cmd_default_config(output.as_deref()),
    }
}

fn load_or_reference(path: Option<&Path>) -> CliResult<RigConfig> {
    match path {
        Some(path) => Ok(gr_config::load_yaml(path)?),
        None => {
            tracing::debug!("no config given, using the reference rig");
            Ok(RigConfig::reference())
        }
    }
}

fn cmd_validate(config_path: &Path) -> CliResult<()> {
    println!("Validating rig config: {}", config_path.display());
    let config = gr_config::load_yaml(config_path)?;
    gr_gas::validate_source_valves(&config)?;
    println!("✓ Config is valid");
    println!("  Valves: {}", config.valves.letters.len());
    println!("  Gas channels: {}", config.gases.len());
    println!("  PID profiles: {}", config.pid_profiles.len());
    Ok(())
}

#[derive(Serialize)]
struct GasRow {
    gas: GasId,
    line: String,
    node: u8,
    curve: Option<u8>,
    min_sccm: f64,
    max_sccm: f64,
    calibration_factor: f64,
    divisor: f64,
    source: String,
}

fn cmd_gases(config: Option<&Path>, json: bool) -> CliResult<()> {
    let config = load_or_reference(config)?;
    let registry = GasChannelRegistry::from_config(&config);
    let rows: Vec<GasRow> = registry
        .channels()
        .map(|c| GasRow {
            gas: c.gas,
            line: c.gas.line().to_string(),
            node: c.node.0,
            curve: c.curve,
            min_sccm: c.range.min,
            max_sccm: c.range.max,
            calibration_factor: c.calibration_factor,
            divisor: c.divisor,
            source: c.routing_action().describe().to_string(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<8} {:>4} {:>5} {:>14} {:>7}  source",
        "gas", "node", "curve", "range (sccm)", "factor"
    );
    for r in rows {
        let curve = r.curve.map_or_else(|| "-".to_string(), |c| c.to_string());
        println!(
            "{:<8} {:>4} {:>5} {:>14} {:>7.3}  {}",
            r.gas.as_str(),
            r.node,
            curve,
            format!("{}-{}", r.min_sccm, r.max_sccm),
            r.calibration_factor,
            r.source
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ModeRow {
    mode: String,
    valves: Vec<(char, String)>,
}

fn cmd_modes(json: bool) -> CliResult<()> {
    let rows: Vec<ModeRow> = RoutingMode::VECTOR_MODES
        .iter()
        .filter_map(|&mode| {
            mode.vector().map(|vector| ModeRow {
                mode: mode.to_string(),
                valves: vector
                    .iter()
                    .map(|(v, t)| (v.letter(), t.position().to_string()))
                    .collect(),
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in rows {
        let valves: Vec<String> = row
            .valves
            .iter()
            .map(|(v, p)| format!("{v}={p}"))
            .collect();
        println!("  {:<14} {}", row.mode, valves.join(" "));
    }
    println!("  {:<14} alternates continuous A/B", RoutingMode::PulseValve.to_string());
    Ok(())
}

#[derive(Serialize)]
struct EncodeRow {
    gas: GasId,
    requested: f64,
    validated: f64,
    code: u16,
    full_scale: u16,
    source: Option<String>,
}

fn cmd_encode(gas: &str, flow: f64, config: Option<&Path>, json: bool) -> CliResult<()> {
    let config = load_or_reference(config)?;
    let registry = GasChannelRegistry::from_config(&config);
    let gas: GasId = gas.parse()?;
    let flow = gr_core::ensure_finite(flow, "flow")?;
    let channel = registry.channel(gas)?;
    let setpoint = validate_flow(channel, Some(flow), registry.full_scale())?;

    let row = EncodeRow {
        gas,
        requested: flow,
        validated: setpoint.validated,
        code: setpoint.code,
        full_scale: registry.full_scale(),
        source: setpoint
            .is_flowing()
            .then(|| channel.routing_action().describe().to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&row)?);
        return Ok(());
    }

    println!("{}: {} sccm", row.gas, row.requested);
    println!("  validated flow: {} sccm", row.validated);
    println!("  setpoint code: {} / {}", row.code, row.full_scale);
    if let Some(source) = row.source {
        println!("  source selection: {source}");
    }
    Ok(())
}

fn cmd_default_config(output: Option<&Path>) -> CliResult<()> {
    let config = RigConfig::reference();
    match output {
        Some(path) => {
            gr_config::save_yaml(path, &config)?;
            println!("✓ Wrote reference config to {}", path.display());
        }
        None => {
            let yaml = gr_config::to_yaml_string(&config)?;
            print!("{yaml}");
        }
    }
    Ok(())
}
