//! LuaGuard CLI
//!
//! Command-line interface for obfuscating Lua 5.1 and Luau scripts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use luaguard_client::{CoordinatorConfig, ObfuscationCoordinator};
use luaguard_core::{
    LanguageVariant, ObfuscationRequest, ObfuscationResult, Pipeline, PipelineConfig, Preset, Seed,
};
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "luaguard.toml";

#[derive(Parser)]
#[command(name = "luaguard")]
#[command(about = "Source-to-source obfuscator for Lua and Luau scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obfuscate a script
    Obfuscate {
        /// Script to obfuscate
        file: PathBuf,

        /// Protection preset: minify, weak, medium, strong
        #[arg(short, long, default_value = "medium")]
        preset: String,

        /// Language variant: lua51, luau
        #[arg(short, long, default_value = "luau")]
        variant: String,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base URL of the remote transformer
        #[arg(long)]
        remote: Option<String>,

        /// Remote timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Fail instead of falling back to the local pipeline
        #[arg(long)]
        no_fallback: bool,

        /// 64-digit hex seed; runs the local pipeline deterministically
        #[arg(long)]
        seed: Option<String>,

        /// Config file (default: ./luaguard.toml, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List presets and the passes each one runs
    Presets,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("luaguard=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Obfuscate {
            file,
            preset,
            variant,
            output,
            remote,
            timeout_ms,
            no_fallback,
            seed,
            config,
        } => {
            let options = ObfuscateOptions {
                remote,
                timeout_ms,
                no_fallback,
                seed,
                config,
            };
            cmd_obfuscate(&file, &preset, &variant, output.as_deref(), options).await?;
        }
        Commands::Presets => {
            cmd_presets();
        }
    }

    Ok(())
}

struct ObfuscateOptions {
    remote: Option<String>,
    timeout_ms: Option<u64>,
    no_fallback: bool,
    seed: Option<String>,
    config: Option<PathBuf>,
}

/// Obfuscate one file
async fn cmd_obfuscate(
    file: &Path,
    preset: &str,
    variant: &str,
    output: Option<&Path>,
    options: ObfuscateOptions,
) -> Result<()> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let request = ObfuscationRequest::parse(source, variant, preset)?;

    let config_path = options.config.or_else(find_config_file);
    let (pipeline_config, coordinator_config) = match &config_path {
        Some(path) => {
            debug!("Using config file {}", path.display());
            (PipelineConfig::from_file(path)?, CoordinatorConfig::from_file(path)?)
        }
        None => (PipelineConfig::default(), None),
    };
    let pipeline = Pipeline::new(pipeline_config)?;

    let result = if let Some(seed) = &options.seed {
        let seed = Seed::from_hex(seed)?;
        info!("Obfuscating locally with fixed seed");
        pipeline.obfuscate_with_seed(&request, &seed)?
    } else {
        let coordinator_config = match (options.remote, coordinator_config) {
            (Some(url), config) => Some(CoordinatorConfig {
                base_url: url,
                ..config.unwrap_or_default()
            }),
            (None, config) => config,
        };
        let coordinator = match coordinator_config {
            Some(mut config) => {
                if let Some(timeout_ms) = options.timeout_ms {
                    config.timeout_ms = timeout_ms;
                }
                if options.no_fallback {
                    config.enable_fallback = false;
                }
                ObfuscationCoordinator::new(config, pipeline)
            }
            None => ObfuscationCoordinator::local_only(pipeline),
        };
        coordinator.obfuscate(&request).await?
    };

    report(&result);
    match output {
        Some(path) => {
            fs::write(path, &result.output_code)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            println!("Wrote {} ({} -> {} bytes)", path.display(), result.metadata.original_size, result.metadata.output_size);
        }
        None => println!("{}", result.output_code),
    }

    Ok(())
}

fn report(result: &ObfuscationResult) {
    match &result.metadata.stats {
        Some(stats) => info!(
            "Local pipeline: {} strings, {} identifiers, {} predicates, {} dead statements, {} comments, {} debug lines ({} transforms)",
            stats.strings_extracted,
            stats.identifiers_renamed,
            stats.predicates_inserted,
            stats.dead_statements,
            stats.comments_removed,
            stats.debug_stripped,
            stats.total_transforms()
        ),
        None => info!("Remote transformer produced {} bytes", result.metadata.output_size),
    }
}

/// `./luaguard.toml`, then `<config dir>/luaguard/luaguard.toml`
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("luaguard").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// Print every preset with its pass plan
fn cmd_presets() {
    println!("Presets:");
    for preset in Preset::ALL {
        println!("  {:<8} {}", preset.as_str(), preset.plan());
    }
    println!("\nLanguage variants:");
    for variant in LanguageVariant::ALL {
        println!("  {}", variant);
    }
}
