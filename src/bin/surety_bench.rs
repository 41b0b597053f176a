//! Calibration experiment harness.
//!
//! Builds an IVF-Flat index over a named dataset, calibrates the adaptive
//! stopping rule for a target miss-rate, evaluates it on the held-out test
//! split, and writes per-query miss-rate / efficiency logs plus a timing
//! CSV. File datasets use the Texmex `.fvecs`/`.ivecs` layout; the
//! `synthetic` dataset generates clustered data and exact ground truth in
//! memory so the harness runs without any corpus on disk.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use surety::benchmark::{create_clustered_dataset, ground_truth_per_query_k, read_fvecs, read_ivecs};
use surety::conformal::{
    CalibrationConfig, CalibrationResult, Calibrator, KSpec, TestReport, TimeReport,
};
use surety::ivf::{IvfFlatIndex, IvfFlatParams};
use surety::{CalibrateError, Result};

/// Clustering seed shared by every experiment: list placement must be
/// stable across runs for the score cache to stay valid.
const CLUSTERING_SEED: u64 = 420;
/// Seed for the per-query k draw in variable-k mode; the cache key only
/// carries the bounds, so the draw itself must be reproducible.
const VARIABLE_K_SEED: u64 = 420;

#[derive(Parser)]
#[command(name = "surety-bench", about = "Conformal ANN calibration experiments")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory containing `<dataset>/` subdirectories of fvecs/ivecs files.
    #[arg(long, default_value = "./data", global = true)]
    data_root: PathBuf,

    /// Directory for cached score matrices.
    #[arg(long, default_value = "./surety-cache", global = true)]
    cache_dir: PathBuf,

    /// Recompute scores even when a cache entry exists.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Directory to write result logs into.
    #[arg(long, default_value = ".", global = true)]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Fixed-k calibration: one k for every query.
    Error {
        #[command(flatten)]
        common: CommonArgs,
        /// Neighbors per query.
        k: usize,
    },
    /// Variable-k calibration: per-query k drawn uniformly from a range.
    #[command(name = "variable_k")]
    VariableK {
        #[command(flatten)]
        common: CommonArgs,
        /// Smallest per-query k.
        k_min: usize,
        /// Largest per-query k.
        k_max: usize,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Dataset name (see the dataset table, or `synthetic`).
    dataset: String,
    /// Fraction of queries used for calibration.
    calib_frac: f32,
    /// Fraction of queries used for tuning.
    tune_frac: f32,
    /// Target mean miss-rate.
    alpha: f32,
    /// Number of inverted lists.
    nlist: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("surety-bench: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Error { common, k } => {
            let loaded = load_dataset(&cli.data_root, &common.dataset, *k)?;
            let ground_truth: Vec<Vec<i64>> = loaded
                .ground_truth
                .iter()
                .map(|row| row.iter().take(*k).copied().collect())
                .collect();
            execute(&cli, common, loaded, KSpec::Fixed(*k), ground_truth)
        }
        Command::VariableK { common, k_min, k_max } => {
            if k_min > k_max || *k_min == 0 {
                return Err(CalibrateError::InvalidParameter(format!(
                    "invalid k range [{k_min}, {k_max}]"
                )));
            }
            let loaded = load_dataset(&cli.data_root, &common.dataset, *k_max)?;
            let mut rng = StdRng::seed_from_u64(VARIABLE_K_SEED);
            let ks: Vec<usize> = (0..loaded.queries.len())
                .map(|_| rng.random_range(*k_min..=*k_max))
                .collect();
            let ground_truth: Vec<Vec<i64>> = loaded
                .ground_truth
                .iter()
                .zip(&ks)
                .map(|(row, &k)| row.iter().take(k).copied().collect())
                .collect();
            execute(&cli, common, loaded, KSpec::PerQuery(ks), ground_truth)
        }
    }
}

fn execute(
    cli: &Cli,
    common: &CommonArgs,
    loaded: LoadedDataset,
    k_spec: KSpec,
    ground_truth: Vec<Vec<i64>>,
) -> Result<()> {
    info!(
        dataset = %common.dataset,
        base = loaded.base.len(),
        queries = loaded.queries.len(),
        nlist = common.nlist,
        "building index"
    );
    let mut index = IvfFlatIndex::new(
        loaded.dimension,
        IvfFlatParams {
            nlist: common.nlist,
            seed: CLUSTERING_SEED,
            // Train the quantizer on the first half of the database only.
            train_fraction: 0.5,
        },
    )?;
    index.add_batch(&loaded.base)?;
    index.build()?;

    let config = CalibrationConfig {
        alpha: common.alpha,
        k_spec: k_spec.clone(),
        calib_frac: common.calib_frac,
        tune_frac: common.tune_frac,
        max_distance: loaded.max_distance,
        dataset: common.dataset.clone(),
        cache_dir: (!cli.no_cache).then(|| cli.cache_dir.clone()),
    };

    let mut calibrator = Calibrator::new(&index, config);
    let result = calibrator.calibrate(&loaded.queries, &ground_truth)?;
    info!(lamhat = result.lamhat, lambda_reg = result.lambda_reg, "calibrated");

    let report = calibrator.evaluate_test(&result)?;
    println!(
        "alpha={}, test fnr={:.4}, avg cls searched={:.3}, unanswered={}",
        common.alpha,
        report.mean_miss_rate(),
        report.mean_probes().unwrap_or(f32::NAN),
        report.unanswered()
    );

    write_reports(cli, common, &k_spec, &result, &report, calibrator.time_report())
}

/// Per-query logs, the calibrated rule as JSON, and the timing CSV, named
/// `<tag>-<dataset>-<L>-<k-spec>-<alpha>-<calib>-<tune>.{log,json,csv}`.
fn write_reports(
    cli: &Cli,
    common: &CommonArgs,
    k_spec: &KSpec,
    result: &CalibrationResult,
    report: &TestReport,
    timing: &TimeReport,
) -> Result<()> {
    let suffix = format!(
        "{}-{}-{}-{}-{}-{}",
        common.dataset,
        common.nlist,
        k_spec.cache_tag(),
        common.alpha,
        common.calib_frac,
        common.tune_frac
    );

    write_lines(
        &cli.out_dir.join(format!("surety-error-{suffix}.log")),
        report.miss_rates.iter(),
    )?;
    write_lines(
        &cli.out_dir.join(format!("surety-efficiency-{suffix}.log")),
        report
            .probes
            .iter()
            .map(|p| p.map_or(-1i64, |n| n as i64)),
    )?;

    let json = serde_json::to_string_pretty(result).map_err(std::io::Error::other)?;
    std::fs::write(
        cli.out_dir.join(format!("surety-result-{suffix}.json")),
        json,
    )?;

    let mut csv = BufWriter::new(File::create(
        cli.out_dir.join(format!("surety-timing-{suffix}.csv")),
    )?);
    writeln!(csv, "ComputeScores,{:.6}", timing.compute_scores)?;
    writeln!(csv, "ComputeScoresCalib,{:.6}", timing.compute_scores_calib)?;
    writeln!(csv, "ComputeScoresTune,{:.6}", timing.compute_scores_tune)?;
    writeln!(csv, "Split,{:.6}", timing.split)?;
    writeln!(csv, "PickRegLambda,{:.6}", timing.pick_reg_lambda)?;
    writeln!(csv, "RegularizeScores,{:.6}", timing.regularize_scores)?;
    writeln!(csv, "Optimize,{:.6}", timing.optimize)?;
    writeln!(csv, "ConfigureTotal,{:.6}", timing.total)?;
    csv.flush()?;
    Ok(())
}

fn write_lines<T: Display>(path: &Path, values: impl Iterator<Item = T>) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for value in values {
        writeln!(file, "{value}")?;
    }
    file.flush()?;
    Ok(())
}

struct LoadedDataset {
    base: Vec<Vec<f32>>,
    queries: Vec<Vec<f32>>,
    /// Full-width ground-truth rows; callers truncate per query.
    ground_truth: Vec<Vec<i64>>,
    dimension: usize,
    max_distance: f32,
}

/// Dataset table: fvecs/ivecs locations plus the hand-picked squared-L2
/// normalization constant for each corpus.
fn load_dataset(data_root: &Path, name: &str, k_max: usize) -> Result<LoadedDataset> {
    let (subdir, base_file, max_distance) = match name {
        "bert" => ("bert", "db.fvecs", 20.0),
        "glove" => ("glove", "db.fvecs", 100.0),
        "glove30k" => ("glove30k", "glove30k_db.fvecs", 100.0),
        "gist" => ("gist", "gist_base.fvecs", 200.0),
        "gist30k" => ("gist30k", "gist30k_base.fvecs", 200.0),
        "deep10M" => ("deep", "deep10M.fvecs", 100.0),
        "sift1M" => ("sift1M", "sift_base.fvecs", 1_000_000.0),
        "fasttext" => ("fasttext", "db.fvecs", 1_000.0),
        "synthetic" => return Ok(synthetic_dataset(k_max)),
        other => {
            return Err(CalibrateError::InvalidParameter(format!(
                "unknown dataset '{other}'"
            )));
        }
    };

    let dir = data_root.join(subdir);
    let base = read_fvecs(dir.join(base_file))?;
    let queries = read_fvecs(dir.join("queries.fvecs"))?;
    let ground_truth = read_ivecs(dir.join(format!("indices-{k_max}.ivecs")))?;

    if ground_truth.len() != queries.len() {
        return Err(CalibrateError::Dataset(format!(
            "{} ground-truth rows for {} queries",
            ground_truth.len(),
            queries.len()
        )));
    }
    if ground_truth.iter().any(|row| row.len() < k_max) {
        return Err(CalibrateError::Dataset(format!(
            "ground truth narrower than k={k_max}"
        )));
    }
    let dimension = base
        .first()
        .map(Vec::len)
        .ok_or_else(|| CalibrateError::Dataset("empty base set".to_string()))?;

    Ok(LoadedDataset {
        base,
        queries,
        ground_truth,
        dimension,
        max_distance,
    })
}

/// In-memory clustered dataset with exact ground truth.
fn synthetic_dataset(k_max: usize) -> LoadedDataset {
    let dataset = create_clustered_dataset(8_000, 600, 16, 32, 0.05, CLUSTERING_SEED);
    let ks = vec![k_max; dataset.n_queries()];
    let ground_truth = ground_truth_per_query_k(&dataset, &ks);
    LoadedDataset {
        dimension: dataset.dimension,
        max_distance: 4.0,
        base: dataset.base,
        queries: dataset.queries,
        ground_truth,
    }
}
