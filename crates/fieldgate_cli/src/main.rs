//! fieldgate CLI
//!
//! Compile a policy document and apply it to JSON files from the shell.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use fieldgate_core::Action;
use fieldgate_guard::{InputOptions, OutputOptions, Sanitizer};
use fieldgate_policy::{PermissionResolver, PolicyDocument, PolicyRegistry};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldgate")]
#[command(about = "fieldgate - field-level access control for JSON payloads", long_about = None)]
struct Cli {
    /// Policy document (config, assets, catalogs)
    #[arg(short, long, global = true, default_value = "policy.json")]
    policy: PathBuf,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "fieldgate=info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the policy and report what it declares
    Check,
    /// Print the fields a principal may access on an instance
    Resolve {
        /// Asset name
        #[arg(short, long)]
        asset: String,
        /// Action verb or alias
        #[arg(long, default_value = "GET")]
        action: String,
        /// Principal JSON file
        #[arg(long)]
        principal: PathBuf,
        /// Instance JSON file; an empty object if omitted
        #[arg(long)]
        instance: Option<PathBuf>,
    },
    /// Filter a response payload
    Sanitize {
        /// Asset name
        #[arg(short, long)]
        asset: String,
        /// Action verb or alias
        #[arg(long, default_value = "GET")]
        action: String,
        /// Principal JSON file
        #[arg(long)]
        principal: PathBuf,
        /// Payload JSON file
        #[arg(long)]
        payload: PathBuf,
        /// Dotted path of the objects inside the payload
        #[arg(long)]
        path: Option<String>,
    },
    /// Filter a request body
    Guard {
        /// Asset name
        #[arg(short, long)]
        asset: String,
        /// Action verb or alias
        #[arg(long, default_value = "POST")]
        action: String,
        /// Principal JSON file
        #[arg(long)]
        principal: PathBuf,
        /// Body JSON file
        #[arg(long)]
        body: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = Arc::new(load_registry(&cli.policy)?);

    match cli.command {
        Commands::Check => {
            for asset in registry.assets() {
                let roles: usize = asset.actions.values().map(|roles| roles.len()).sum();
                println!(
                    "{}: {} fields, {} actions, {} rules",
                    asset.name,
                    asset.all_fields.len(),
                    asset.actions.len(),
                    roles
                );
            }
            println!("ok: {} rules", registry.rule_count());
            Ok(())
        }
        Commands::Resolve {
            asset,
            action,
            principal,
            instance,
        } => {
            let principal = read_json(&principal)?;
            let instance = match instance {
                Some(path) => read_json(&path)?,
                None => Value::Object(serde_json::Map::new()),
            };
            let fields = PermissionResolver::new(registry).resolve_allowed_fields(
                &asset,
                &Action::parse(&action),
                &principal,
                &instance,
            )?;
            print_json(&serde_json::to_value(&fields)?)
        }
        Commands::Sanitize {
            asset,
            action,
            principal,
            payload,
            path,
        } => {
            let principal = read_json(&principal)?;
            let payload = read_json(&payload)?;
            let mut options = OutputOptions::new(asset, Action::parse(&action));
            if let Some(path) = path {
                options = options.at_path(&path);
            }
            let out = Sanitizer::new(registry).sanitize_output(&principal, payload, &options)?;
            print_json(&out)
        }
        Commands::Guard {
            asset,
            action,
            principal,
            body,
        } => {
            let principal = read_json(&principal)?;
            let body = read_json(&body)?;
            let options = InputOptions::new(asset, Action::parse(&action));
            let out = Sanitizer::new(registry).guard_input(&principal, body, &options)?;
            print_json(&out)
        }
    }
}

fn load_registry(path: &Path) -> Result<PolicyRegistry> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading policy {}", path.display()))?;
    let document = PolicyDocument::from_json(&text)
        .wrap_err_with(|| format!("parsing policy {}", path.display()))?;
    document
        .compile()
        .wrap_err_with(|| format!("compiling policy {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("parsing {}", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
