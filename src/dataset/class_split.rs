//! Class-level holdout split
//!
//! Partitions the *classes* of an identity dataset (not its samples) into
//! train/validation/test groups:
//! 1. Classes with a single sample are pruned.
//! 2. The surviving class ids are shuffled with a seeded `ChaCha8Rng`.
//! 3. The first `floor(n * test)` classes go to test only. The model never
//!    sees these identities during training.
//! 4. The remainder is cut by count into train and validation.
//!
//! Each split is persisted as a [`Manifest`] and the sample files are then
//! copied (or moved) into per-split directories by a [`Relocator`].

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SplitRatios;
use crate::utils::error::{CorpusError, Result};
use crate::utils::copy_into_place;
use crate::utils::logging::ProgressLogger;

/// Class id → ordered sample ids
pub type ClassSamples = BTreeMap<String, Vec<String>>;

/// Split produced by the class-level holdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitName {
    Train,
    Validation,
    Test,
}

impl SplitName {
    /// All splits in output order
    pub const ALL: [SplitName; 3] = [SplitName::Train, SplitName::Test, SplitName::Validation];

    /// Directory name on disk
    pub fn dir_name(&self) -> &'static str {
        match self {
            SplitName::Train => "train",
            SplitName::Validation => "validation",
            SplitName::Test => "test",
        }
    }

    /// `<split>_labels.json`
    pub fn manifest_file_name(&self) -> String {
        format!("{}_labels.json", self.dir_name())
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Persisted mapping from class id to its samples for one split
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    classes: ClassSamples,
}

impl Manifest {
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_samples(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn contains_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn samples(&self, class: &str) -> Option<&[String]> {
        self.classes.get(class).map(Vec::as_slice)
    }

    pub fn classes(&self) -> impl Iterator<Item = &String> {
        self.classes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.classes.iter()
    }

    /// JSON with 4-space indentation and sorted keys
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| CorpusError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Remove every class with exactly one sample, returning how many were dropped
pub fn prune_single_instances(occurrences: &mut ClassSamples) -> usize {
    let before = occurrences.len();
    occurrences.retain(|_, samples| samples.len() != 1);
    before - occurrences.len()
}

/// Class-disjoint train/validation/test manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSplit {
    train: Manifest,
    validation: Manifest,
    test: Manifest,
    pruned_classes: usize,
}

impl ClassSplit {
    /// Prune, shuffle and partition `occurrences` by class
    ///
    /// Fails with [`CorpusError::Ratio`] before doing any work if the ratios
    /// are invalid.
    pub fn compute(mut occurrences: ClassSamples, ratios: &SplitRatios, seed: u64) -> Result<Self> {
        ratios.validate()?;

        let pruned_classes = prune_single_instances(&mut occurrences);
        debug!("Pruned {} single-instance classes", pruned_classes);

        let mut classes: Vec<String> = occurrences.keys().cloned().collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        classes.shuffle(&mut rng);

        let num_test = (classes.len() as f64 * ratios.test).floor() as usize;
        let num_remaining = classes.len() - num_test;
        let num_train =
            (num_remaining as f64 * ratios.train_share_of_remaining()).floor() as usize;

        let mut train = ClassSamples::new();
        let mut validation = ClassSamples::new();
        let mut test = ClassSamples::new();

        for (position, class) in classes.into_iter().enumerate() {
            let samples = occurrences
                .remove(&class)
                .ok_or_else(|| CorpusError::MissingClassKey(class.clone()))?;

            let target = if position < num_test {
                &mut test
            } else if position < num_test + num_train {
                &mut train
            } else {
                &mut validation
            };
            target.insert(class, samples);
        }

        let split = Self {
            train: Manifest { classes: train },
            validation: Manifest { classes: validation },
            test: Manifest { classes: test },
            pruned_classes,
        };

        info!("{}", split.summary());
        Ok(split)
    }

    pub fn manifest(&self, split: SplitName) -> &Manifest {
        match split {
            SplitName::Train => &self.train,
            SplitName::Validation => &self.validation,
            SplitName::Test => &self.test,
        }
    }

    /// Split a class was assigned to, if it survived pruning
    pub fn split_of(&self, class: &str) -> Option<SplitName> {
        SplitName::ALL
            .into_iter()
            .find(|split| self.manifest(*split).contains_class(class))
    }

    /// Number of classes dropped for having a single sample
    pub fn pruned_classes(&self) -> usize {
        self.pruned_classes
    }

    pub fn summary(&self) -> SplitSummary {
        let count = |split: SplitName| {
            let manifest = self.manifest(split);
            (manifest.num_classes(), manifest.num_samples())
        };

        SplitSummary {
            train: count(SplitName::Train),
            validation: count(SplitName::Validation),
            test: count(SplitName::Test),
            pruned_classes: self.pruned_classes,
        }
    }

    /// Write `<manifest_root>/<split>/<split>_labels.json` for every split
    pub fn write_manifests(&self, manifest_root: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for split in SplitName::ALL {
            let dir = manifest_root.join(split.dir_name());
            fs::create_dir_all(&dir)?;

            let path = dir.join(split.manifest_file_name());
            self.manifest(split).save(&path)?;
            info!("Wrote {} manifest to {:?}", split, path);
            written.push(path);
        }

        Ok(written)
    }
}

/// Class and sample counts per split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    /// (classes, samples)
    pub train: (usize, usize),
    pub validation: (usize, usize),
    pub test: (usize, usize),
    pub pruned_classes: usize,
}

impl SplitSummary {
    pub fn total_samples(&self) -> usize {
        self.train.1 + self.validation.1 + self.test.1
    }
}

impl fmt::Display for SplitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Class split summary:")?;
        writeln!(f, "  Train classes: {} → {} images", self.train.0, self.train.1)?;
        writeln!(
            f,
            "  Validation classes: {} → {} images",
            self.validation.0, self.validation.1
        )?;
        writeln!(
            f,
            "  Test classes (unseen): {} → {} images",
            self.test.0, self.test.1
        )?;
        writeln!(f, "  Pruned single-instance classes: {}", self.pruned_classes)?;
        write!(f, "  Total images: {}", self.total_samples())
    }
}

/// How sample files reach their split directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    /// Source tree stays untouched
    #[default]
    Copy,
    /// One-way migration; the source tree loses the files
    Move,
}

/// Where sample files live and where they go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocationLayout {
    /// Flat directory holding `<image_id>.<extension>`
    pub source_dir: PathBuf,
    /// Root of the `<split>/` output directories
    pub dest_dir: PathBuf,
    /// Sample file extension, without the dot
    pub extension: String,
    pub mode: TransferMode,
    /// Accept pre-existing split directories and skip files already placed
    pub resume: bool,
}

impl RelocationLayout {
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            extension: "jpg".to_string(),
            mode: TransferMode::Copy,
            resume: false,
        }
    }
}

/// A file that could not be placed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a relocation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelocationReport {
    /// Files copied or moved in this run
    pub placed: usize,
    /// Files found at their destination already
    pub already_present: usize,
    pub skipped: Vec<SkippedFile>,
}

enum Placement {
    Placed,
    AlreadyPresent,
}

/// Materializes a [`ClassSplit`] on disk
#[derive(Debug, Clone)]
pub struct Relocator {
    layout: RelocationLayout,
}

impl Relocator {
    pub fn new(layout: RelocationLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RelocationLayout {
        &self.layout
    }

    pub fn split_dir(&self, split: SplitName) -> PathBuf {
        self.layout.dest_dir.join(split.dir_name())
    }

    fn file_name(&self, image_id: &str) -> String {
        format!("{}.{}", image_id, self.layout.extension)
    }

    /// Check the source and create the split directories
    ///
    /// Existing split directories are a [`CorpusError::DestinationConflict`]
    /// unless the layout resumes a previous run. Nothing is touched on error.
    pub fn prepare(&self) -> Result<()> {
        if !self.layout.source_dir.is_dir() {
            return Err(CorpusError::PathNotFound(self.layout.source_dir.clone()));
        }

        if !self.layout.resume {
            for split in SplitName::ALL {
                let dir = self.split_dir(split);
                if dir.exists() {
                    return Err(CorpusError::DestinationConflict(dir));
                }
            }
        }

        info!("Creating subset directories in {:?}", self.layout.dest_dir);
        for split in SplitName::ALL {
            fs::create_dir_all(self.split_dir(split))?;
        }
        Ok(())
    }

    /// Place every sample of every split
    ///
    /// Per-file failures are logged and collected in the report; the run
    /// always continues with the next file.
    pub fn relocate(&self, split: &ClassSplit) -> Result<RelocationReport> {
        let total: usize = SplitName::ALL
            .iter()
            .map(|s| split.manifest(*s).num_samples())
            .sum();
        let verb = match self.layout.mode {
            TransferMode::Copy => "Copying",
            TransferMode::Move => "Moving",
        };
        let mut progress = ProgressLogger::new(verb, total);
        let mut report = RelocationReport::default();

        for name in SplitName::ALL {
            let dir = self.split_dir(name);
            fs::create_dir_all(&dir)?;

            for (_, samples) in split.manifest(name).iter() {
                for image_id in samples {
                    let file_name = self.file_name(image_id);
                    let source = self.layout.source_dir.join(&file_name);
                    let dest = dir.join(&file_name);

                    match self.place_one(&source, &dest) {
                        Ok(Placement::Placed) => report.placed += 1,
                        Ok(Placement::AlreadyPresent) => report.already_present += 1,
                        Err(e) => {
                            warn!("Skipping {:?}: {}", source, e);
                            report.skipped.push(SkippedFile {
                                path: source,
                                reason: e.to_string(),
                            });
                        }
                    }
                    progress.increment();
                }
            }
        }

        progress.finish();
        info!(
            "Relocation done: {} placed, {} already present, {} skipped",
            report.placed,
            report.already_present,
            report.skipped.len()
        );
        Ok(report)
    }

    fn place_one(&self, source: &Path, dest: &Path) -> Result<Placement> {
        if dest.is_file() {
            return Ok(Placement::AlreadyPresent);
        }
        if !source.is_file() {
            return Err(CorpusError::SourceNotFound(source.to_path_buf()));
        }

        match self.layout.mode {
            TransferMode::Copy => {
                copy_into_place(source, dest)?;
            }
            TransferMode::Move => fs::rename(source, dest)?,
        }
        Ok(Placement::Placed)
    }
}
