use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::features::{DebugPlot, DfaConfig, ExponentFit};
use crate::sweep::{DfaPreset, DEFAULT_ANALYSIS_RATE};
use crate::table::{DEFAULT_ID_COLUMN, DEFAULT_TARGET_COLUMN};

#[derive(Parser, Debug)]
#[command(
    name = "speech-features",
    version,
    about = "Non-linear and spectral feature extraction for speech recordings"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the feature sweep over every recording in a directory.
    Extract(ExtractArgs),
    /// Higuchi fractal dimension of one recording.
    Hfd(HfdArgs),
    /// DFA scaling exponent of one recording.
    Dfa(DfaArgs),
    /// Join stored features with a lookup table into CSV files.
    Compile(CompileArgs),
    /// Print the sweep plan as JSON.
    Plan(PlanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Directory scanned recursively for audio files.
    #[arg(value_name = "DIR")]
    pub input_dir: PathBuf,
    /// JSON sweep plan; the built-in plan is used when omitted.
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,
    /// Root of the feature store.
    #[arg(long, short, value_name = "DIR", default_value = "speechFeatures")]
    pub output: PathBuf,
    /// Files processed in parallel (defaults to the available cores).
    #[arg(long, short)]
    pub jobs: Option<usize>,
}

impl ExtractArgs {
    pub fn jobs(&self) -> Result<usize> {
        match self.jobs {
            Some(jobs) => {
                ensure!(jobs > 0, "--jobs must be positive");
                Ok(jobs)
            }
            None => Ok(std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct HfdArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Largest interval k of the curve-length estimate.
    #[arg(long)]
    pub kmax: usize,
    /// Standardise the signal to zero mean and unit variance first.
    #[arg(long)]
    pub normalize: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetArg {
    ReferenceDefault,
    Dfa2,
}

impl From<PresetArg> for DfaPreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::ReferenceDefault => DfaPreset::ReferenceDefault,
            PresetArg::Dfa2 => DfaPreset::Dfa2,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DfaArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = PresetArg::ReferenceDefault)]
    pub preset: PresetArg,
    /// Detrending polynomial order (overrides the preset).
    #[arg(long)]
    pub order: Option<usize>,
    /// Comma separated window sizes in samples.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub windows: Option<Vec<usize>>,
    #[arg(long = "no-overlap")]
    pub no_overlap: bool,
    /// Plain least squares instead of the robust exponent fit.
    #[arg(long = "least-squares")]
    pub least_squares: bool,
    /// Write the log-log plot as SVG to this path.
    #[arg(long, value_name = "PATH", conflicts_with = "plot_temp")]
    pub plot: Option<PathBuf>,
    /// Write the log-log plot to a kept temporary file.
    #[arg(long = "plot-temp")]
    pub plot_temp: bool,
    /// Give up on the robust fit after this many milliseconds.
    #[arg(long = "deadline-ms")]
    pub deadline_ms: Option<u64>,
    /// Rate the recording is resampled to before analysis.
    #[arg(long, default_value_t = DEFAULT_ANALYSIS_RATE)]
    pub rate: u32,
}

impl DfaArgs {
    pub fn to_config(&self) -> Result<DfaConfig> {
        ensure!(self.rate > 0, "--rate must be positive");
        let mut config = DfaPreset::from(self.preset).config();
        if let Some(order) = self.order {
            config = config.with_order(order);
        }
        if let Some(windows) = &self.windows {
            config = config.with_window_sizes(windows.clone());
        }
        if self.no_overlap {
            config = config.with_overlap(false);
        }
        if self.least_squares {
            config = config.with_exponent_fit(ExponentFit::LeastSquares);
        }
        if let Some(path) = &self.plot {
            config = config.with_debug_plot(DebugPlot::Path(path.clone()));
        } else if self.plot_temp {
            config = config.with_debug_plot(DebugPlot::TempFile);
        }
        if let Some(ms) = self.deadline_ms {
            config = config.with_robust_deadline(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Feature store root written by `extract`.
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,
    /// CSV with one row per participant.
    #[arg(long, value_name = "CSV")]
    pub lookup: PathBuf,
    #[arg(long, short, value_name = "DIR", default_value = "compiled_features")]
    pub output: PathBuf,
    /// Second store; every directory pair is joined on the recording id.
    #[arg(long = "pair-with", value_name = "ROOT")]
    pub pair_with: Option<PathBuf>,
    #[arg(long = "id-column", default_value = DEFAULT_ID_COLUMN)]
    pub id_column: String,
    #[arg(long = "target-column", default_value = DEFAULT_TARGET_COLUMN)]
    pub target_column: String,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Resolve this plan file instead of the built-in one.
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,
    /// List the cache key of every configuration instead of the JSON plan.
    #[arg(long)]
    pub list: bool,
}
