//! Configuration structures for corpus preparation.
//!
//! Both preparation strategies share [`SplitRatios`]; each has its own
//! section in [`PrepConfig`], which can be loaded from a TOML file.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::utils::error::{CorpusError, Result};
use crate::DEFAULT_SEED;

/// Allowed deviation of the ratio sum from 1.0
pub const RATIO_TOLERANCE: f64 = 1e-5;

/// Train/test/validation split ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    /// Training data ratio
    pub train: f64,
    /// Test data ratio
    pub test: f64,
    /// Validation data ratio
    pub val: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            test: 0.15,
            val: 0.15,
        }
    }
}

impl SplitRatios {
    /// Creates ratios and validates them
    pub fn new(train: f64, test: f64, val: f64) -> Result<Self> {
        let ratios = Self { train, test, val };
        ratios.validate()?;
        Ok(ratios)
    }

    /// Validates that every ratio lies in `[0, 1]` and that they sum to 1.0
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("train", self.train), ("test", self.test), ("val", self.val)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CorpusError::Ratio(format!(
                    "{} ratio must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        let sum = self.train + self.test + self.val;
        if (sum - 1.0).abs() >= RATIO_TOLERANCE {
            return Err(CorpusError::Ratio(format!(
                "train, test and val ratios must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }

    /// Share of the non-test remainder that goes to training
    pub fn train_share_of_remaining(&self) -> f64 {
        let denom = self.train + self.val;
        if denom <= 0.0 {
            0.0
        } else {
            self.train / denom
        }
    }
}

/// Configuration for the breed-ratio reorganizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorganizeConfig {
    /// Per-breed split ratios
    pub ratios: SplitRatios,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Directory names under a species root that are never treated as breeds
    pub ignore_dirs: Vec<String>,
}

impl Default for ReorganizeConfig {
    fn default() -> Self {
        Self {
            ratios: SplitRatios::default(),
            seed: DEFAULT_SEED,
            ignore_dirs: vec!["train".to_string(), "test".to_string(), "val".to_string()],
        }
    }
}

/// Configuration for the class-level holdout split
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassSplitConfig {
    /// Class-count split ratios
    pub ratios: SplitRatios,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Prefix prepended to every identity to form the class id
    pub class_prefix: String,
    /// Extension of the sample files on disk
    pub image_extension: String,
}

impl Default for ClassSplitConfig {
    fn default() -> Self {
        Self {
            ratios: SplitRatios {
                train: 0.8,
                test: 0.1,
                val: 0.1,
            },
            seed: DEFAULT_SEED,
            class_prefix: "whale".to_string(),
            image_extension: "jpg".to_string(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub reorganize: ReorganizeConfig,
    pub class_split: ClassSplitConfig,
}

/// Reads and parses a TOML configuration file
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|e| CorpusError::Config(format!("Failed to read config {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| CorpusError::Config(format!("Failed to parse config {}: {e}", path.display())))
}
