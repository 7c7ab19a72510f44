use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use speech_features::audio::{self, RatePolicy};
use speech_features::cli::{Cli, CompileArgs, Command, DfaArgs, ExtractArgs, HfdArgs, PlanArgs};
use speech_features::config::AppConfig;
use speech_features::features::{compute_dfa, compute_hfd};
use speech_features::store::DirectoryStore;
use speech_features::sweep::{collect_audio_files, FeatureSweep};
use speech_features::table::{compile_features, Lookup};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Extract(args) => handle_extract(&args),
        Command::Hfd(args) => handle_hfd(&args),
        Command::Dfa(args) => handle_dfa(&args),
        Command::Compile(args) => handle_compile(&args),
        Command::Plan(args) => handle_plan(&args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn handle_extract(args: &ExtractArgs) -> Result<()> {
    let config = AppConfig::from_override(args.plan.clone())?;
    let files = collect_audio_files(&args.input_dir);
    if files.is_empty() {
        warn!(dir = %args.input_dir.display(), "no audio files found");
        return Ok(());
    }
    info!(
        files = files.len(),
        configs = config.plan.configs().count(),
        output = %args.output.display(),
        "starting sweep"
    );

    let sweep = FeatureSweep::new(config.plan, DirectoryStore::new(&args.output))
        .with_jobs(args.jobs()?);
    let report = sweep.run(&files).context("feature sweep failed")?;

    println!(
        "computed {}, skipped {}, failed {}",
        report.computed,
        report.skipped,
        report.failed()
    );
    for failure in &report.failures {
        let config = failure
            .config
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "<file>".to_string());
        println!(
            "  {} {} [{}] {}",
            failure.file.display(),
            config,
            failure.kind,
            failure.message
        );
    }
    Ok(())
}

fn handle_hfd(args: &HfdArgs) -> Result<()> {
    let buffer = audio::load(&args.file, RatePolicy::Native)
        .with_context(|| format!("failed to load {:?}", args.file))?;
    let value = compute_hfd(&buffer.samples, args.kmax, args.normalize)?;
    println!("{value:.6}");
    Ok(())
}

fn handle_dfa(args: &DfaArgs) -> Result<()> {
    let config = args.to_config()?;
    let buffer = audio::load(&args.file, RatePolicy::Fixed(args.rate))
        .with_context(|| format!("failed to load {:?}", args.file))?;
    let outcome = compute_dfa(&buffer.samples, &config)?;
    println!("{:.6}", outcome.exponent);
    for (window, fluctuation) in &outcome.fluctuations {
        println!("  n={window:<8} F={fluctuation:.6e}");
    }
    if let Some(plot) = &outcome.debug_plot {
        println!("plot: {}", plot.display());
    }
    Ok(())
}

fn handle_compile(args: &CompileArgs) -> Result<()> {
    let lookup = Lookup::from_csv(&args.lookup, &args.id_column, &args.target_column)?;
    let written = compile_features(
        &args.root,
        &lookup,
        &args.output,
        args.pair_with.as_deref(),
    )?;
    for path in &written {
        println!("{}", path.display());
    }
    info!(tables = written.len(), "compile finished");
    Ok(())
}

fn handle_plan(args: &PlanArgs) -> Result<()> {
    let config = AppConfig::from_override(args.plan.clone())?;
    if args.list {
        for feature in config.plan.configs() {
            println!("{}", feature.path_components().join("/"));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&config.plan)?);
    }
    Ok(())
}
