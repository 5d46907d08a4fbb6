//! Dataset module for cat/dog corpus handling
//!
//! This module provides:
//! - An indexed view over a pre-split `<root>/<subset>/{cats,dogs}/<breed>/` tree
//! - A class-level holdout split for identity datasets (unseen test classes)
//! - A per-breed ratio reorganizer that copies a raw corpus into train/test/val
//! - A Burn `Dataset` adapter for training loops
//!
//! ## Split disciplines
//!
//! The two preparation strategies are alternatives, not stages:
//! 1. **Class-level holdout** (`class_split`): whole classes are reserved for the
//!    test split, so evaluation measures generalization to unseen identities.
//! 2. **Sample-level stratification** (`reorganize`): every breed contributes to
//!    every split in the configured proportions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::CorpusError;

pub mod burn_dataset;
pub mod class_split;
pub mod codec;
pub mod corpus;
pub mod reorganize;
pub mod tabular;

pub use burn_dataset::{to_chw_tensor, PetBurnDataset, PetItem};
pub use class_split::{
    ClassSamples, ClassSplit, Manifest, RelocationLayout, RelocationReport, Relocator,
    SkippedFile, SplitName, SplitSummary, TransferMode,
};
pub use codec::{ImageCrateDecoder, ImageDecoder};
pub use corpus::{CorpusStats, CorpusView, LabelMode, LabeledSample};
pub use reorganize::{BreedReport, ReorganizeReport, Reorganizer, SpeciesSource};
pub use tabular::{group_by_class, read_observations, Observation, TableColumns};

/// Data subset of a pre-split corpus tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subset {
    Train,
    Val,
    Test,
}

impl Subset {
    /// All subsets in output order
    pub const ALL: [Subset; 3] = [Subset::Train, Subset::Test, Subset::Val];

    /// Directory name on disk
    pub fn dir_name(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
            Subset::Test => "test",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Subset {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Subset::Train),
            "val" => Ok(Subset::Val),
            "test" => Ok(Subset::Test),
            _ => Err(CorpusError::InvalidInput(format!(
                "Invalid subset '{}'. Use 'train', 'val', or 'test'",
                s
            ))),
        }
    }
}

/// Top-level class in combined mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Dog,
    Cat,
}

impl Species {
    /// Directory name on disk
    pub fn dir_name(&self) -> &'static str {
        match self {
            Species::Dog => "dogs",
            Species::Cat => "cats",
        }
    }

    /// Fixed species-level label: dog = 0, cat = 1
    pub fn label(&self) -> usize {
        match self {
            Species::Dog => 0,
            Species::Cat => 1,
        }
    }

    /// Singular display name
    pub fn name(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
