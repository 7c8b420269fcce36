#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand, ValueEnum};
use concord::agreement::batch::{match_subjects, normalize_masks, run_agreement, run_parcellation};
use concord::learning::{ClassifyConfig, DegeneratePolicy, ForestParams};
use concord::network::{NetworkConfig, SmallWorldConfig, DEFAULT_THRESHOLD};
use concord::output::{self, BatchSummary};
use concord::pool::{resolve_seed, BatchConfig};
use concord::registry::{DEFAULT_GLOBAL_METRICS, DEFAULT_LOCAL_METRICS};
use concord::structs::{ConcordError, FeatureMatrix, Result, SubjectMatrix, SubjectRecord};
use concord::{learning, logging, network, table_io};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Concord - reproducibility checks for parallel neuroimaging pipelines
#[derive(Parser, Debug)]
#[command(name = "concord")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker threads (default: all cores)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    /// Log at debug level unless CONCORD_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgreementMode {
    /// Whole-volume masks; label volumes are binarized first
    Mask,
    /// Per-ROI agreement of label parcellations
    Parcellation,
    /// Tables or connectomes compared entry by entry
    Table,
}

impl AgreementMode {
    const fn default_metrics(self) -> &'static [&'static str] {
        match self {
            Self::Mask => &["dice", "jaccard", "volume_difference", "centroid_distance"],
            Self::Parcellation => &["dice", "volume_difference", "centroid_distance"],
            Self::Table => &["hausdorff", "pearson"],
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare the same subjects processed under two conditions
    Agreement {
        /// Directory with the first condition's files
        #[arg(long)]
        first: PathBuf,

        /// Directory with the second condition's files
        #[arg(long)]
        second: PathBuf,

        /// File name suffix shared by every subject file
        #[arg(long, default_value = ".csv")]
        suffix: String,

        #[arg(long, value_enum, default_value = "mask")]
        mode: AgreementMode,

        /// Comma-separated metric names (default depends on mode)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,

        #[arg(short, long, default_value = "./concord_output")]
        output_dir: PathBuf,
    },

    /// Graph metrics of connectivity matrices
    Network {
        /// Directory with one adjacency matrix per subject
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = ".csv")]
        suffix: String,

        /// Drop entries with |w| below this value
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Keep every nonzero entry
        #[arg(long, conflicts_with = "threshold")]
        no_threshold: bool,

        /// Comma-separated global metrics
        #[arg(long, value_delimiter = ',')]
        global_metrics: Vec<String>,

        /// Comma-separated local metrics
        #[arg(long, value_delimiter = ',')]
        local_metrics: Vec<String>,

        /// Trials of the clustering estimator
        #[arg(long, default_value = "100")]
        trials: usize,

        /// Rewiring rounds per edge for small-world references
        #[arg(long, default_value = "100")]
        niter: usize,

        /// Number of small-world reference graphs
        #[arg(long, default_value = "10")]
        nrand: usize,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long, default_value = "./concord_output")]
        output_dir: PathBuf,
    },

    /// Cross-validated classification of two groups
    Classify {
        /// Feature table of the first group (rows = subjects)
        #[arg(long)]
        group_a: PathBuf,

        /// Feature table of the second group
        #[arg(long)]
        group_b: PathBuf,

        /// Group names (default: file stems)
        #[arg(long)]
        name_a: Option<String>,

        #[arg(long)]
        name_b: Option<String>,

        /// Tables start with a header line naming the features
        #[arg(long)]
        header: bool,

        #[arg(long, default_value = "100")]
        runs: usize,

        #[arg(long, default_value = "0.1")]
        test_fraction: f64,

        #[arg(long, default_value = "300")]
        trees: usize,

        #[arg(long)]
        seed: Option<u64>,

        /// Fail the batch when any split lacks a class instead of flagging it
        #[arg(long)]
        abort_on_degenerate: bool,

        #[arg(short, long, default_value = "./concord_output")]
        output_dir: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);
    let batch = BatchConfig {
        threads: args.threads,
    };

    match args.command {
        Commands::Agreement {
            first,
            second,
            suffix,
            mode,
            metrics,
            output_dir,
        } => run_agreement_command(&first, &second, &suffix, mode, &metrics, &output_dir, &batch),
        Commands::Network {
            input,
            suffix,
            threshold,
            no_threshold,
            global_metrics,
            local_metrics,
            trials,
            niter,
            nrand,
            seed,
            output_dir,
        } => {
            let config = NetworkConfig {
                threshold: (!no_threshold).then_some(threshold),
                clustering_trials: trials,
                seed: Some(resolve_seed(seed)),
                smallworld: SmallWorldConfig { niter, nrand },
            };
            run_network_command(
                &input,
                &suffix,
                &global_metrics,
                &local_metrics,
                &config,
                &output_dir,
                &batch,
            )
        }
        Commands::Classify {
            group_a,
            group_b,
            name_a,
            name_b,
            header,
            runs,
            test_fraction,
            trees,
            seed,
            abort_on_degenerate,
            output_dir,
        } => {
            let config = ClassifyConfig {
                test_fraction,
                runs,
                forest: ForestParams::new(trees),
                seed,
                degenerate_policy: if abort_on_degenerate {
                    DegeneratePolicy::Abort
                } else {
                    DegeneratePolicy::SkipAndFlag
                },
                threads: args.threads,
            };
            let name_a = name_a.unwrap_or_else(|| file_stem(&group_a));
            let name_b = name_b.unwrap_or_else(|| file_stem(&group_b));
            run_classify_command(
                (name_a.as_str(), group_a.as_path()),
                (name_b.as_str(), group_b.as_path()),
                header,
                &config,
                &output_dir,
            )
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("group")
        .to_string()
}

/// Map subject id -> file for every matching file in `dir`
fn subject_files(dir: &Path, suffix: &str) -> Result<HashMap<String, PathBuf>> {
    Ok(table_io::list_files(dir, suffix)?
        .into_iter()
        .map(|p| (table_io::subject_id(&p, suffix), p))
        .collect())
}

fn selected_metrics(requested: &[String], defaults: &[&str]) -> Vec<String> {
    if requested.is_empty() {
        defaults.iter().map(ToString::to_string).collect()
    } else {
        requested.to_vec()
    }
}

fn run_agreement_command(
    first: &Path,
    second: &Path,
    suffix: &str,
    mode: AgreementMode,
    metrics: &[String],
    output_dir: &Path,
    batch: &BatchConfig,
) -> Result<()> {
    let first_files = subject_files(first, suffix)?;
    let second_files = subject_files(second, suffix)?;

    let mut first_ids: Vec<&String> = first_files.keys().collect();
    first_ids.sort();
    let second_ids: Vec<&String> = second_files.keys().collect();
    let subjects = match_subjects(&first_ids, &second_ids)?;

    info!(subjects = subjects.len(), "loading paired subject files");
    let mut records = Vec::with_capacity(subjects.len());
    for id in &subjects {
        let (Some(a), Some(b)) = (first_files.get(id), second_files.get(id)) else {
            return Err(ConcordError::Precondition(format!(
                "subject {id} lost between listing and loading"
            )));
        };
        records.push(SubjectRecord::new(
            id.clone(),
            table_io::load_matrix(a)?.into_dyn(),
            table_io::load_matrix(b)?.into_dyn(),
        ));
    }

    let metrics = selected_metrics(metrics, mode.default_metrics());
    fs::create_dir_all(output_dir)?;

    let failures = match mode {
        AgreementMode::Parcellation => {
            let tables = run_parcellation(&records, &metrics, batch)?;
            output::write_roi_tables(output_dir, &tables)?;
            tables.into_iter().flat_map(|t| t.failures).collect()
        }
        AgreementMode::Mask | AgreementMode::Table => {
            let records = if mode == AgreementMode::Mask {
                normalize_masks(records)
            } else {
                records
            };
            let table = run_agreement(&records, &metrics, batch)?;
            output::write_agreement_table(&output_dir.join("agreement.csv"), &table)?;
            table.failures
        }
    };

    let summary = BatchSummary::for_subjects("agreement", subjects.len(), None, failures);
    let path = output::write_summary_json(output_dir, &summary)?;
    info!(path = %path.display(), "wrote agreement results");
    Ok(())
}

fn run_network_command(
    input: &Path,
    suffix: &str,
    global_metrics: &[String],
    local_metrics: &[String],
    config: &NetworkConfig,
    output_dir: &Path,
    batch: &BatchConfig,
) -> Result<()> {
    let subjects = table_io::list_files(input, suffix)?
        .iter()
        .map(|p| -> Result<SubjectMatrix> {
            Ok(SubjectMatrix::new(
                table_io::subject_id(p, suffix),
                table_io::load_matrix(p)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    info!(subjects = subjects.len(), "loaded adjacency matrices");

    fs::create_dir_all(output_dir)?;

    let global = selected_metrics(global_metrics, &DEFAULT_GLOBAL_METRICS);
    let table = network::batch::run_global(&subjects, &global, config, batch)?;
    output::write_global_table(&output_dir.join("global.csv"), &table)?;

    let local = selected_metrics(local_metrics, &DEFAULT_LOCAL_METRICS);
    let tables = network::batch::run_local(&subjects, &local, config, batch)?;
    output::write_local_tables(output_dir, &tables)?;

    let failures = table
        .failures
        .into_iter()
        .chain(tables.into_iter().flat_map(|t| t.failures))
        .collect();
    let summary = BatchSummary::for_subjects("network", subjects.len(), config.seed, failures);
    let path = output::write_summary_json(output_dir, &summary)?;
    info!(path = %path.display(), "wrote network results");
    Ok(())
}

fn run_classify_command(
    (name_a, path_a): (&str, &Path),
    (name_b, path_b): (&str, &Path),
    header: bool,
    config: &ClassifyConfig,
    output_dir: &Path,
) -> Result<()> {
    let a = table_io::load_table(path_a, header)?;
    let b = table_io::load_table(path_b, header)?;
    let features = FeatureMatrix::from_groups(name_a, &a.data, name_b, &b.data)?;

    let report = learning::run_classification(&features, config)?;

    fs::create_dir_all(output_dir)?;
    output::write_accuracy(&output_dir.join("accuracy.csv"), &report)?;
    output::write_importance(
        &output_dir.join("importance.csv"),
        &report,
        a.headers.as_deref(),
    )?;

    let summary = BatchSummary::for_classification(&report);
    let path = output::write_summary_json(output_dir, &summary)?;
    info!(path = %path.display(), "wrote classification results");
    Ok(())
}
