//! jlbridge CLI - inspect the host ⇄ Julia transfer format
//!
//! Commands:
//!   jlbridge encode <json>    - Julia assignment for a JSON-described host value
//!   jlbridge decode <expr>    - Parse a transfer expression and print it as JSON
//!   jlbridge guest-lib        - Print the guest decoder library

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jlbridge::{
    classify_with, expr, BridgeConfig, GuestEncoder, GuestLibrary, HostDecoder, HostValue,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jlbridge")]
#[command(about = "Inspect values as they cross between a host and a Julia session", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deepest container nesting accepted
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Directory for staged files
    #[arg(long, global = true)]
    staging_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Julia assignment for a host value given as JSON
    Encode {
        /// Host value; `{"$matrix": [[1, 2]]}` and similar tagged objects
        /// describe non-JSON host types
        json: String,

        /// Variable name in the guest
        #[arg(long, default_value = "x")]
        name: String,
    },

    /// Parse a transfer expression and print the value as JSON
    Decode {
        expression: String,

        /// The expression is a quoted Julia string, as a session returns it
        #[arg(long)]
        quoted: bool,
    },

    /// Print the guest decoder library
    GuestLib {
        /// Print only the protocol version and fingerprint
        #[arg(long)]
        fingerprint: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Encode { json, name } => encode_command(&config, &json, &name),
        Commands::Decode { expression, quoted } => decode_command(&config, &expression, quoted),
        Commands::GuestLib { fingerprint } => guest_lib_command(fingerprint),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_path(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(max_depth) = cli.max_depth {
        config.limits.max_depth = max_depth;
    }
    if let Some(dir) = &cli.staging_dir {
        config.staging.dir = Some(dir.clone());
    }
    Ok(config)
}

fn encode_command(config: &BridgeConfig, json: &str, name: &str) -> anyhow::Result<()> {
    let json: serde_json::Value =
        serde_json::from_str(json).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;
    let host = HostValue::from_json(&json)?;
    let value = classify_with(&host, &config.limits);

    let encoded = GuestEncoder::new(&config.staging).encode_assignment(name, &value)?;
    println!("{}", encoded.source);

    if !encoded.packages.is_empty() {
        let packages: Vec<&str> = encoded.packages.iter().map(|p| p.module()).collect();
        eprintln!("requires: {}", packages.join(", "));
    }
    // The guest has not read the staged files yet, so they must outlive us.
    if encoded.needs_staging() {
        for file in encoded.staged {
            eprintln!("staged: {}", file.keep().display());
        }
        eprintln!("staged files are left in place; remove them once the guest has read them");
    }
    Ok(())
}

fn decode_command(config: &BridgeConfig, expression: &str, quoted: bool) -> anyhow::Result<()> {
    let expression = if quoted {
        expr::unescape(expression)?
    } else {
        expression.to_string()
    };
    let value = HostDecoder::new(&config.limits, &config.staging).inspect_expression("<cli>", &expression)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn guest_lib_command(fingerprint: bool) -> anyhow::Result<()> {
    let library = GuestLibrary;
    if fingerprint {
        println!("version: {}", library.version());
        println!("fingerprint: {}", library.fingerprint().to_hex());
        for routine in library.routines() {
            println!("  {:<16} {}", routine.shape.name(), routine.function);
        }
    } else {
        print!("{}", library.source());
    }
    Ok(())
}
