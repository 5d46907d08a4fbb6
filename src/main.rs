//! Pet Corpus CLI
//!
//! Prepares a cat/dog corpus for training: reorganizes raw breed folders into
//! train/test/val, runs the class-level holdout split for identity datasets,
//! and inspects a prepared corpus.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use pet_corpus::config::{load_toml_config, PrepConfig, SplitRatios};
use pet_corpus::dataset::{
    group_by_class, read_observations, ClassSplit, CorpusView, LabelMode, RelocationLayout,
    Relocator, Reorganizer, SpeciesSource, Subset, TableColumns, TransferMode,
};
use pet_corpus::utils::logging::{init_logging, LogConfig, LogLevel};

/// Cat/dog corpus preparation
#[derive(Parser, Debug)]
#[command(name = "pet_corpus")]
#[command(author = "Warre Snaet")]
#[command(version)]
#[command(about = "Index and split a cat/dog image corpus", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, default_value = "false", conflicts_with = "verbose")]
    quiet: bool,

    /// Explicit log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Ratio flags shared by both split commands; unset flags fall back to the config
#[derive(clap::Args, Debug)]
struct RatioArgs {
    /// Training ratio (0.0-1.0)
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Test ratio (0.0-1.0)
    #[arg(long)]
    test_ratio: Option<f64>,

    /// Validation ratio (0.0-1.0)
    #[arg(long)]
    val_ratio: Option<f64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

impl RatioArgs {
    fn apply(&self, ratios: &mut SplitRatios, seed: &mut u64) {
        if let Some(train) = self.train_ratio {
            ratios.train = train;
        }
        if let Some(test) = self.test_ratio {
            ratios.test = test;
        }
        if let Some(val) = self.val_ratio {
            ratios.val = val;
        }
        if let Some(s) = self.seed {
            *seed = s;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy raw breed folders into train/test/val with per-breed ratios
    Reorganize {
        /// Cat root, laid out as <cats>/<breed>/<file>
        #[arg(long)]
        cats: PathBuf,

        /// Dog root, laid out as <dogs>/<dogs-subdir>/<breed>/<file>
        #[arg(long)]
        dogs: PathBuf,

        /// Destination root
        #[arg(short, long)]
        dest: PathBuf,

        /// Directory between the dog root and its breed folders ("" for none)
        #[arg(long, default_value = "images")]
        dogs_subdir: String,

        #[command(flatten)]
        ratios: RatioArgs,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Class-level holdout split of an identity dataset
    Split {
        /// Identity tables (CSV with a header row)
        #[arg(short, long = "table", required = true)]
        tables: Vec<PathBuf>,

        /// Directory holding <image_id>.<ext> files
        #[arg(short, long)]
        source_dir: PathBuf,

        /// Root of the train/validation/test output directories
        #[arg(short, long)]
        dest_dir: PathBuf,

        /// Where to write <split>/<split>_labels.json (defaults to dest-dir)
        #[arg(long)]
        manifest_dir: Option<PathBuf>,

        /// Column holding the sample id
        #[arg(long, default_value = "image_id")]
        image_col: String,

        /// Column holding the identity
        #[arg(long, default_value = "original_whale_id")]
        class_col: String,

        #[command(flatten)]
        ratios: RatioArgs,

        /// Move files instead of copying them (one-way migration)
        #[arg(long, default_value = "false")]
        move_files: bool,

        /// Reuse existing split directories and skip files already placed
        #[arg(long, default_value = "false")]
        resume: bool,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show statistics of a prepared corpus
    Inspect {
        /// Root holding train/val/test
        #[arg(long, default_value = "data")]
        data_root: PathBuf,

        /// Subset to inspect (train, val, test)
        #[arg(long, default_value = "train")]
        subset: Subset,

        /// Labeling mode (all, cat, dog)
        #[arg(short, long, default_value = "all")]
        mode: LabelMode,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    if let Some(level) = &cli.log_level {
        log_config.level = LogLevel::parse(level);
    }

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Reorganize {
            cats,
            dogs,
            dest,
            dogs_subdir,
            ratios,
            config,
        } => cmd_reorganize(&cats, &dogs, &dest, dogs_subdir, &ratios, config.as_deref())?,

        Commands::Split {
            tables,
            source_dir,
            dest_dir,
            manifest_dir,
            image_col,
            class_col,
            ratios,
            move_files,
            resume,
            config,
        } => {
            let transfer = if move_files {
                TransferMode::Move
            } else {
                TransferMode::Copy
            };
            cmd_split(
                &tables,
                source_dir,
                dest_dir,
                manifest_dir,
                TableColumns {
                    image_col,
                    class_col,
                },
                &ratios,
                transfer,
                resume,
                config.as_deref(),
            )?;
        }

        Commands::Inspect {
            data_root,
            subset,
            mode,
        } => cmd_inspect(&data_root, subset, mode)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PrepConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Ok(load_toml_config(path)?)
        }
        None => Ok(PrepConfig::default()),
    }
}

fn cmd_reorganize(
    cats: &Path,
    dogs: &Path,
    dest: &Path,
    dogs_subdir: String,
    ratio_args: &RatioArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?.reorganize;
    ratio_args.apply(&mut config.ratios, &mut config.seed);
    config.ratios.validate()?;

    println!("{}", "Reorganizing corpus".green().bold());
    println!("  Cats:  {:?}", cats);
    println!("  Dogs:  {:?}", dogs);
    println!("  Dest:  {:?}", dest);
    println!(
        "  Split: train={:.2} test={:.2} val={:.2} (seed {})",
        config.ratios.train, config.ratios.test, config.ratios.val, config.seed
    );

    let dogs_subdir = (!dogs_subdir.is_empty()).then_some(dogs_subdir);
    let sources = [
        SpeciesSource::cats(cats),
        SpeciesSource::dogs(dogs).with_subdir(dogs_subdir),
    ];

    let report = Reorganizer::new(dest, config).run(&sources)?;
    report.print();

    if !report.skipped.is_empty() {
        println!(
            "\n{}",
            format!("{} files could not be copied", report.skipped.len()).yellow()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_split(
    tables: &[PathBuf],
    source_dir: PathBuf,
    dest_dir: PathBuf,
    manifest_dir: Option<PathBuf>,
    columns: TableColumns,
    ratio_args: &RatioArgs,
    mode: TransferMode,
    resume: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?.class_split;
    ratio_args.apply(&mut config.ratios, &mut config.seed);
    config.ratios.validate()?;

    println!("{}", "Class-level holdout split".green().bold());

    let observations = read_observations(tables, &columns)?;
    let occurrences = group_by_class(observations, &config.class_prefix);
    println!("  Observations grouped into {} classes", occurrences.len());

    let split = ClassSplit::compute(occurrences, &config.ratios, config.seed)?;

    let manifest_dir = manifest_dir.unwrap_or_else(|| dest_dir.clone());
    let relocator = Relocator::new(RelocationLayout {
        source_dir,
        dest_dir,
        extension: config.image_extension.clone(),
        mode,
        resume,
    });

    // Conflicts must surface before manifests or files are written
    relocator.prepare()?;
    split.write_manifests(&manifest_dir)?;
    let report = relocator.relocate(&split)?;

    println!("\n{}", split.summary());
    println!(
        "\n  Placed: {}  Already present: {}  Skipped: {}",
        report.placed.to_string().green(),
        report.already_present,
        if report.skipped.is_empty() {
            "0".normal()
        } else {
            report.skipped.len().to_string().yellow()
        }
    );
    for skip in &report.skipped {
        println!("    {:?}: {}", skip.path, skip.reason);
    }
    Ok(())
}

fn cmd_inspect(data_root: &Path, subset: Subset, mode: LabelMode) -> Result<()> {
    let view = CorpusView::new(data_root, subset, mode)?;
    view.stats().print();

    if mode != LabelMode::All {
        println!("\n  Breeds: {}", view.breeds().join(", "));
    } else {
        println!("\n  Dogs: {}  Cats: {}", view.num_dogs(), view.num_cats());
    }
    Ok(())
}
