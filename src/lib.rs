//! # Pet Corpus
//!
//! Indexed access to a cat/dog image corpus and the tooling that prepares it
//! for supervised learning.
//!
//! ## Features
//!
//! - **Indexed corpus view** over `<root>/<subset>/{cats,dogs}/<breed>/` with
//!   species-level (`All`) or breed-level (`Cat`, `Dog`) labels
//! - **Class-level holdout split** for identity datasets, so test identities are
//!   never seen during training
//! - **Breed-ratio reorganizer** that copies a raw corpus into train/test/val while
//!   keeping every breed present in every subset
//! - **Burn integration** through the `Dataset` trait
//!
//! ## Modules
//!
//! - `dataset`: Corpus view, split engines, table ingestion and the Burn adapter
//! - `config`: Split ratios and TOML configuration
//! - `utils`: Error types and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pet_corpus::dataset::{CorpusView, LabelMode, Subset};
//!
//! let view = CorpusView::new("data/pets", Subset::Train, LabelMode::Cat)?;
//! let (image, label) = view.get(0)?;
//! println!("{} -> {:?}", label, view.class_name(label));
//! ```

pub mod config;
pub mod dataset;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ClassSplitConfig, PrepConfig, ReorganizeConfig, SplitRatios};
pub use dataset::{
    ClassSplit, CorpusView, LabelMode, Manifest, PetBurnDataset, PetItem, Relocator,
    Reorganizer, SpeciesSource, Species, Subset,
};
pub use utils::error::{CorpusError, Result};

/// Seed used by every split operation unless overridden
pub const DEFAULT_SEED: u64 = 42;

/// Default square image size produced for Burn items
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
