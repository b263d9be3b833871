// Veritext command line
//
// Assess a document for AI-generated text, manage the config file and probe oracles.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use veritext::services::detection::sensitivity::DetectionSensitivity;
use veritext::services::document_loader::load_document;
use veritext::{init_logging, initialize, AppConfig, ConfigStore};

/// Veritext: AI-generated text likelihood scoring.
#[derive(Parser, Debug)]
#[command(name = "veritext", version, about = "Score how likely a text is to be AI-generated")]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true, env = "VERITEXT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Assess a file, or stdin when no file is given.
    Assess {
        file: Option<PathBuf>,

        /// Threshold preset overriding the configured policy: low, medium or high.
        #[arg(long)]
        sensitivity: Option<String>,

        /// Pretty-print the JSON result.
        #[arg(long)]
        pretty: bool,
    },

    /// Config file management.
    #[command(subcommand)]
    Config(ConfigCmd),

    /// Call every configured oracle once and report readiness.
    Probe,
}

#[derive(Debug, Subcommand)]
enum ConfigCmd {
    /// Write the default configuration (existing file is backed up).
    Init,
    /// Print the effective configuration with API keys masked.
    Show,
}

fn config_store(path: Option<&Path>) -> Result<ConfigStore> {
    match path {
        Some(p) => Ok(ConfigStore::for_file(p)),
        None => {
            let dir = ConfigStore::default_config_dir().context("no platform config directory")?;
            Ok(ConfigStore::new(dir))
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => load_document(path).with_context(|| format!("failed to load {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Reject blank input before any oracle is built or contacted.
fn require_text(text: String) -> Result<String> {
    if text.trim().is_empty() {
        bail!("text is required");
    }
    Ok(text)
}

async fn run_assess(
    store: &ConfigStore,
    file: Option<&Path>,
    sensitivity: Option<&str>,
    pretty: bool,
) -> Result<()> {
    let mut config = store.load().context("failed to load config")?;
    if let Some(level) = sensitivity {
        config.detection.thresholds = DetectionSensitivity::from_str(level).three_way_policy();
    }

    let text = require_text(read_input(file)?)?;
    let assessor = initialize(&config).await.context("failed to initialize oracles")?;
    let assessment = assessor.assess(&text).await?;

    let out = if pretty {
        serde_json::to_string_pretty(&assessment)?
    } else {
        serde_json::to_string(&assessment)?
    };
    println!("{}", out);
    Ok(())
}

fn masked(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    for key in shown.api_keys.values_mut() {
        *key = "********".to_string();
    }
    shown
}

fn run_config(store: &ConfigStore, cmd: &ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Init => {
            store.save(&AppConfig::default())?;
            println!("Wrote default config to {}", store.config_file().display());
        }
        ConfigCmd::Show => {
            let config = store.load()?;
            if let Err(e) = config.validate() {
                eprintln!("warning: {}", e);
            }
            println!("{}", serde_json::to_string_pretty(&masked(&config))?);
        }
    }
    Ok(())
}

async fn run_probe(store: &ConfigStore) -> Result<()> {
    let mut config = store.load()?;
    config.startup.probe_oracles = true;

    match initialize(&config).await {
        Ok(assessor) => {
            for c in assessor.classifiers() {
                println!("ready  classifier {}", c.oracle.name());
            }
            println!("ready  perplexity {}", assessor.perplexity_oracle().name());
            Ok(())
        }
        Err(e) => bail!("probe failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let store = config_store(cli.config.as_deref())?;
    info!(config = %store.config_file().display(), "veritext.started");

    match &cli.command {
        Commands::Assess {
            file,
            sensitivity,
            pretty,
        } => run_assess(&store, file.as_deref(), sensitivity.as_deref(), *pretty).await,
        Commands::Config(cmd) => run_config(&store, cmd),
        Commands::Probe => run_probe(&store).await,
    }
}
