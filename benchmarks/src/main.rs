//! LuaGuard preset profiler
//!
//! Runs every preset and language variant over generated scripts of a few
//! sizes and reports how long each takes, how much it grows the script and
//! what each pass did.

use std::fs;

use anyhow::Result;
use luaguard_benchmarks::{generate_script, time_runs, Timing};
use luaguard_core::{LanguageVariant, ObfuscationRequest, PassStats, Pipeline, Preset, Seed};
use serde::Serialize;

const SIZES: [usize; 2] = [20, 200];
const ITERATIONS: u32 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    preset: Preset,
    language_variant: LanguageVariant,
    functions: usize,
    input_bytes: usize,
    output_bytes: usize,
    /// Output size over input size
    growth: f64,
    timing: Timing,
    stats: PassStats,
}

#[derive(Debug, Serialize)]
struct Report {
    timestamp: String,
    version: String,
    profiles: Vec<Profile>,
}

fn profile(
    pipeline: &Pipeline,
    seed: &Seed,
    source: &str,
    variant: LanguageVariant,
    preset: Preset,
    functions: usize,
) -> Result<Profile> {
    let request = ObfuscationRequest::new(source, variant, preset);
    let result = pipeline.obfuscate_with_seed(&request, seed)?;
    let timing = time_runs(ITERATIONS, || pipeline.obfuscate_with_seed(&request, seed));

    Ok(Profile {
        preset,
        language_variant: variant,
        functions,
        input_bytes: result.metadata.original_size,
        output_bytes: result.metadata.output_size,
        growth: result.metadata.output_size as f64 / result.metadata.original_size as f64,
        timing,
        stats: result.metadata.stats.unwrap_or_default(),
    })
}

fn print_report(report: &Report) {
    println!("\n======== LuaGuard Preset Profile ========");
    println!("Version: {} | {}", report.version, report.timestamp);
    println!(
        "\n{:<7} {:<6} {:>5} {:>9} {:>9} {:>7} {:>9}  {:>7} {:>6} {:>5} {:>5} {:>5}",
        "preset", "lang", "fns", "in B", "out B", "growth", "mean ms", "strings", "idents", "preds", "dead", "debug"
    );
    for p in &report.profiles {
        println!(
            "{:<7} {:<6} {:>5} {:>9} {:>9} {:>6.2}x {:>9.3}  {:>7} {:>6} {:>5} {:>5} {:>5}",
            p.preset.as_str(),
            p.language_variant.as_str(),
            p.functions,
            p.input_bytes,
            p.output_bytes,
            p.growth,
            p.timing.mean_ms,
            p.stats.strings_extracted,
            p.stats.identifiers_renamed,
            p.stats.predicates_inserted,
            p.stats.dead_statements,
            p.stats.debug_stripped,
        );
    }
}

fn main() -> Result<()> {
    let json_only = std::env::args().any(|a| a == "--json-only");
    let pipeline = Pipeline::with_defaults();
    let seed = Seed::from_u64(7);

    let mut profiles = Vec::new();
    for functions in SIZES {
        let source = generate_script(functions);
        for variant in LanguageVariant::ALL {
            for preset in Preset::ALL {
                if !json_only {
                    println!("Profiling {} / {} ({} functions)...", preset, variant, functions);
                }
                profiles.push(profile(&pipeline, &seed, &source, variant, preset, functions)?);
            }
        }
    }

    let report = Report {
        timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        profiles,
    };

    if json_only {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        fs::create_dir_all("benchmarks/results")?;
        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        fs::write(format!("benchmarks/results/profile-{}.json", ts), serde_json::to_string_pretty(&report)?)?;
        println!("\nResults saved to benchmarks/results/");
    }
    Ok(())
}
