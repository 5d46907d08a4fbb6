//! Breed-ratio reorganizer
//!
//! Copies a raw `<species>/<breed>/<file>` corpus into
//! `<dest>/{train,test,val}/<species>/<breed>/`, cutting every breed into the
//! configured ratios. Unlike the class-level split, every breed ends up in
//! every subset.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::class_split::SkippedFile;
use super::{Species, Subset};
use crate::config::{ReorganizeConfig, SplitRatios};
use crate::utils::error::{CorpusError, Result};
use crate::utils::copy_into_place;
use crate::utils::logging::ProgressLogger;

/// Where one species' breed directories live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesSource {
    pub species: Species,
    pub root: PathBuf,
    /// Optional directory between the root and the breed folders
    pub subdir: Option<String>,
}

impl SpeciesSource {
    /// `<root>/<breed>/<file>`
    pub fn cats(root: impl Into<PathBuf>) -> Self {
        Self {
            species: Species::Cat,
            root: root.into(),
            subdir: None,
        }
    }

    /// `<root>/images/<breed>/<file>`
    pub fn dogs(root: impl Into<PathBuf>) -> Self {
        Self {
            species: Species::Dog,
            root: root.into(),
            subdir: Some("images".to_string()),
        }
    }

    pub fn with_subdir(mut self, subdir: Option<String>) -> Self {
        self.subdir = subdir;
        self
    }

    /// Directory whose children are the breed folders
    pub fn breeds_root(&self) -> PathBuf {
        match &self.subdir {
            Some(subdir) => self.root.join(subdir),
            None => self.root.clone(),
        }
    }
}

/// Files copied for one breed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedReport {
    pub species: Species,
    pub breed: String,
    pub train: usize,
    pub test: usize,
    pub val: usize,
    /// Files skipped because they already existed at the destination
    pub already_present: usize,
}

impl BreedReport {
    fn new(species: Species, breed: &str) -> Self {
        Self {
            species,
            breed: breed.to_string(),
            train: 0,
            test: 0,
            val: 0,
            already_present: 0,
        }
    }

    fn count_mut(&mut self, subset: Subset) -> &mut usize {
        match subset {
            Subset::Train => &mut self.train,
            Subset::Test => &mut self.test,
            Subset::Val => &mut self.val,
        }
    }

    pub fn copied(&self) -> usize {
        self.train + self.test + self.val
    }
}

/// Outcome of a reorganization run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReorganizeReport {
    pub breeds: Vec<BreedReport>,
    pub skipped: Vec<SkippedFile>,
}

impl ReorganizeReport {
    pub fn copied(&self) -> usize {
        self.breeds.iter().map(BreedReport::copied).sum()
    }

    pub fn already_present(&self) -> usize {
        self.breeds.iter().map(|b| b.already_present).sum()
    }

    pub fn breed(&self, species: Species, breed: &str) -> Option<&BreedReport> {
        self.breeds
            .iter()
            .find(|b| b.species == species && b.breed == breed)
    }

    /// Print a per-breed table
    pub fn print(&self) {
        println!("\n{}", "Reorganization Summary".green().bold());
        println!("{}", "=".repeat(60));
        println!(
            "  {:<8} {:<24} {:>6} {:>6} {:>6} {:>8}",
            "Species", "Breed", "Train", "Test", "Val", "Present"
        );
        for b in &self.breeds {
            println!(
                "  {:<8} {:<24} {:>6} {:>6} {:>6} {:>8}",
                b.species.name(),
                b.breed, b.train, b.test, b.val, b.already_present
            );
        }
        println!("{}", "-".repeat(60));
        println!("  Copied:          {}", self.copied());
        println!("  Already present: {}", self.already_present());
        if !self.skipped.is_empty() {
            println!("  {} {}", "Skipped:".yellow(), self.skipped.len());
            for skip in &self.skipped {
                println!("    {:?}: {}", skip.path, skip.reason);
            }
        }
    }
}

/// Cut a shuffled file list into train, test and val slices
///
/// Train and test take `floor(len * ratio)` files; val takes the remainder.
pub fn split_files<'a>(
    files: &'a [PathBuf],
    ratios: &SplitRatios,
) -> [(Subset, &'a [PathBuf]); 3] {
    let len = files.len();
    let train_end = ((len as f64 * ratios.train).floor() as usize).min(len);
    let test_end = (train_end + (len as f64 * ratios.test).floor() as usize).min(len);

    [
        (Subset::Train, &files[..train_end]),
        (Subset::Test, &files[train_end..test_end]),
        (Subset::Val, &files[test_end..]),
    ]
}

struct BreedDir {
    species: Species,
    name: String,
    path: PathBuf,
}

/// Copies raw species trees into a per-breed stratified layout
#[derive(Debug, Clone)]
pub struct Reorganizer {
    config: ReorganizeConfig,
    dest: PathBuf,
}

impl Reorganizer {
    pub fn new(dest: impl Into<PathBuf>, config: ReorganizeConfig) -> Self {
        Self {
            config,
            dest: dest.into(),
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Reorganize every source into the destination tree
    ///
    /// Ratios and source roots are checked before anything is written.
    pub fn run(&self, sources: &[SpeciesSource]) -> Result<ReorganizeReport> {
        self.config.ratios.validate()?;

        let mut breeds = Vec::new();
        for source in sources {
            breeds.extend(self.list_breeds(source)?);
        }

        for subset in Subset::ALL {
            for source in sources {
                fs::create_dir_all(
                    self.dest
                        .join(subset.dir_name())
                        .join(source.species.dir_name()),
                )?;
            }
        }

        info!(
            "Reorganizing {} breeds into {:?} (train={}, test={}, val={}, seed={})",
            breeds.len(),
            self.dest,
            self.config.ratios.train,
            self.config.ratios.test,
            self.config.ratios.val,
            self.config.seed
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut progress = ProgressLogger::new("Reorganizing breeds", breeds.len()).with_interval(1);
        let mut report = ReorganizeReport::default();

        for breed in &breeds {
            let mut files = list_files(&breed.path)?;
            if files.is_empty() {
                debug!("Skipping empty breed {}/{}", breed.species, breed.name);
                progress.increment();
                continue;
            }
            files.shuffle(&mut rng);

            let mut breed_report = BreedReport::new(breed.species, &breed.name);

            for (subset, slice) in split_files(&files, &self.config.ratios) {
                let target = self
                    .dest
                    .join(subset.dir_name())
                    .join(breed.species.dir_name())
                    .join(&breed.name);
                fs::create_dir_all(&target)?;

                for file in slice {
                    let Some(file_name) = file.file_name() else {
                        continue;
                    };
                    let dest_file = target.join(file_name);

                    if dest_file.is_file() {
                        breed_report.already_present += 1;
                        continue;
                    }
                    match copy_into_place(file, &dest_file) {
                        Ok(_) => *breed_report.count_mut(subset) += 1,
                        Err(e) => {
                            warn!("Failed to copy {:?}: {}", file, e);
                            report.skipped.push(SkippedFile {
                                path: file.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }

            debug!(
                "{}/{}: train={} test={} val={}",
                breed.species, breed.name, breed_report.train, breed_report.test, breed_report.val
            );
            report.breeds.push(breed_report);
            progress.increment();
        }

        progress.finish();
        info!(
            "Copied {} files ({} already present, {} skipped)",
            report.copied(),
            report.already_present(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn list_breeds(&self, source: &SpeciesSource) -> Result<Vec<BreedDir>> {
        let root = source.breeds_root();
        if !root.is_dir() {
            return Err(CorpusError::PathNotFound(root));
        }

        let mut breeds = Vec::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                warn!("Skipping breed directory with non UTF-8 name: {:?}", path);
                continue;
            };
            if self.config.ignore_dirs.iter().any(|d| d == &name) {
                continue;
            }
            breeds.push(BreedDir {
                species: source.species,
                name,
                path,
            });
        }

        breeds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(breeds)
    }
}

/// Regular files directly inside `dir`, sorted by path
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
