//! Storage Pool Selector
//!
//! Command-line front end of the matching engine: loads pools from a file,
//! resolves requirements from flags, a requirements file or a profile, and
//! prints the selected pools as JSON.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storage_pool_selector::{
    Error, FilePoolRegistry, PredicateChain, Profile, RequirementMap, Result, Scalar,
    SelectionService, SelectorConfig, VolumeRequest,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Storage Pool Selector - Policy-based pool matching
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pool document (YAML or JSON)
    #[arg(long, env = "POOLS_FILE")]
    pools: PathBuf,

    /// Selector configuration file (YAML)
    #[arg(long, env = "SELECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Requirement map file (YAML or JSON)
    #[arg(long)]
    requirements: Option<PathBuf>,

    /// Single requirement as key=value, may be repeated
    #[arg(long = "require", value_name = "KEY=VALUE")]
    require: Vec<String>,

    /// Profile file; combined with --size and --zone into requirements
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Requested size in GB, used with --profile
    #[arg(long, default_value = "0")]
    size: u64,

    /// Requested availability zone, used with --profile
    #[arg(long)]
    zone: Option<String>,

    /// Maximum number of pools to return
    #[arg(long)]
    limit: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    if let Err(e) = run(args).await {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(if e.is_no_match() { 2 } else { 1 });
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => SelectorConfig::from_file(path)?,
        None => SelectorConfig::default(),
    };

    let chain = Arc::new(PredicateChain::from_config(&config));
    info!("Predicate chain: {:?}", chain.link_names());

    let registry = Arc::new(FilePoolRegistry::new(&args.pools));
    let service = SelectionService::new(registry, chain)
        .with_default_zone(config.default_availability_zone.clone());

    let mut requirements = match &args.profile {
        Some(path) => {
            let profile: Profile = serde_yaml::from_str(&read(path).await?)?;
            let request = VolumeRequest {
                size: args.size,
                availability_zone: args.zone.clone(),
                pool_id: None,
            };
            profile.resolve(&request, &config.default_availability_zone)
        }
        None => RequirementMap::new(),
    };

    if let Some(path) = &args.requirements {
        let extra: RequirementMap = serde_yaml::from_str(&read(path).await?)?;
        requirements.extend(extra);
    }

    for pair in &args.require {
        let (key, value) = parse_requirement(pair)?;
        requirements.insert(key, value);
    }

    let limit = args.limit.unwrap_or(config.default_limit);
    let pools = service.select_pools(limit, &requirements).await?;

    println!("{}", serde_json::to_string_pretty(&pools)?);
    Ok(())
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Configuration(format!("cannot read {}: {}", path.display(), e))
    })
}

/// Parse `key=value`; the value is read as bool, then number, else string
fn parse_requirement(pair: &str) -> Result<(String, Scalar)> {
    let (key, value) = pair.split_once('=').ok_or_else(|| {
        Error::InvalidRequest(format!("expected KEY=VALUE, got '{}'", pair))
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidRequest(format!("empty key in '{}'", pair)));
    }

    let value = value.trim();
    let scalar = if let Ok(b) = value.parse::<bool>() {
        Scalar::Bool(b)
    } else if let Ok(n) = value.parse::<f64>() {
        Scalar::Number(n)
    } else {
        Scalar::String(value.to_string())
    };

    Ok((key.to_string(), scalar))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so stdout stays valid JSON
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
