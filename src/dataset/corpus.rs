//! Indexed corpus view
//!
//! Maps a flat index in `[0, len)` onto the samples of one subset of a
//! pre-split tree:
//!
//! ```text
//! root/
//! └── train/
//!     ├── cats/
//!     │   ├── siamese/
//!     │   │   └── a.jpg
//!     │   └── persian/
//!     │       └── c.jpg
//!     └── dogs/
//!         └── pug/
//!             └── d.jpg
//! ```
//!
//! The sample catalog is built once at construction and never mutated, so a
//! view can be shared read-only across loader threads.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::codec::{ImageCrateDecoder, ImageDecoder};
use super::{Species, Subset};
use crate::utils::error::{CorpusError, Result};
use crate::utils::{format_number, percentage};

/// Labeling mode of a corpus view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelMode {
    /// Both species, species-level labels (dog = 0, cat = 1)
    All,
    /// Cat images only, breed labels
    Cat,
    /// Dog images only, breed labels
    Dog,
}

impl LabelMode {
    /// Species restricted to by a breed mode, `None` for `All`
    pub fn species(&self) -> Option<Species> {
        match self {
            LabelMode::All => None,
            LabelMode::Cat => Some(Species::Cat),
            LabelMode::Dog => Some(Species::Dog),
        }
    }
}

impl fmt::Display for LabelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelMode::All => write!(f, "All"),
            LabelMode::Cat => write!(f, "Cat"),
            LabelMode::Dog => write!(f, "Dog"),
        }
    }
}

impl FromStr for LabelMode {
    type Err = CorpusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(LabelMode::All),
            "cat" => Ok(LabelMode::Cat),
            "dog" => Ok(LabelMode::Dog),
            _ => Err(CorpusError::InvalidMode(s.to_string())),
        }
    }
}

/// A sample reference with its label under the active mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Label under the view's mode
    pub label: usize,
}

/// Sample catalog plus the label derivation of one mode
#[derive(Debug, Clone)]
enum LabelIndex {
    /// Dogs occupy `[0, dogs.len())`, cats follow
    Species {
        dogs: Vec<PathBuf>,
        cats: Vec<PathBuf>,
    },
    /// One species; label is the sorted position of the parent directory name,
    /// resolved once per sample at build time
    Breed {
        species: Species,
        samples: Vec<PathBuf>,
        labels: Vec<usize>,
        breeds: Vec<String>,
    },
}

impl LabelIndex {
    fn build(subset_root: &Path, mode: LabelMode) -> Result<Self> {
        match mode.species() {
            None => {
                let dogs = discover_files(&subset_root.join(Species::Dog.dir_name()))?;
                let cats = discover_files(&subset_root.join(Species::Cat.dir_name()))?;
                Ok(LabelIndex::Species { dogs, cats })
            }
            Some(species) => {
                let samples = discover_files(&subset_root.join(species.dir_name()))?;
                let sample_breeds = samples
                    .iter()
                    .map(|path| breed_of(path))
                    .collect::<Result<Vec<_>>>()?;

                let names: BTreeSet<&String> = sample_breeds.iter().collect();
                let breeds: Vec<String> = names.into_iter().cloned().collect();
                let breed_to_label: HashMap<&str, usize> = breeds
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| (name.as_str(), idx))
                    .collect();

                let labels = sample_breeds
                    .iter()
                    .map(|breed| {
                        breed_to_label
                            .get(breed.as_str())
                            .copied()
                            .ok_or_else(|| CorpusError::MissingClassKey(breed.clone()))
                    })
                    .collect::<Result<Vec<_>>>()?;

                debug!("{} breeds: {:?}", species.name(), breeds);

                Ok(LabelIndex::Breed {
                    species,
                    samples,
                    labels,
                    breeds,
                })
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            LabelIndex::Species { dogs, cats } => dogs.len() + cats.len(),
            LabelIndex::Breed { samples, .. } => samples.len(),
        }
    }

    fn sample(&self, index: usize) -> Result<LabeledSample> {
        let len = self.len();
        if index >= len {
            return Err(CorpusError::IndexOutOfRange { index, len });
        }

        match self {
            LabelIndex::Species { dogs, cats } => {
                let num_dogs = dogs.len();
                let (path, species) = if index < num_dogs {
                    (&dogs[index], Species::Dog)
                } else {
                    (&cats[index - num_dogs], Species::Cat)
                };
                Ok(LabeledSample {
                    path: path.clone(),
                    label: species.label(),
                })
            }
            LabelIndex::Breed {
                samples, labels, ..
            } => Ok(LabeledSample {
                path: samples[index].clone(),
                label: labels[index],
            }),
        }
    }
}

/// Breed name of a sample: its immediate parent directory
fn breed_of(path: &Path) -> Result<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| CorpusError::MissingClassKey(path.display().to_string()))
}

/// Recursively collects every file below `dir`, sorted lexicographically
///
/// A missing directory yields an empty list.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("Directory not found, treating as empty: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| CorpusError::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    // Traversal order is platform dependent; index semantics must not be.
    files.sort();
    Ok(files)
}

type Transform<O> = Arc<dyn Fn(RgbImage) -> O + Send + Sync>;

/// Read-only indexed view over one subset of the corpus
///
/// `get(i)` decodes sample `i`, applies the transform and returns it with its
/// label. The default transform is the identity.
pub struct CorpusView<O = RgbImage> {
    subset_root: PathBuf,
    subset: Subset,
    mode: LabelMode,
    index: LabelIndex,
    decoder: Arc<dyn ImageDecoder>,
    transform: Transform<O>,
}

impl CorpusView<RgbImage> {
    /// Scan `<data_root>/<subset>/{cats,dogs}` and build the catalog for `mode`
    pub fn new<P: AsRef<Path>>(data_root: P, subset: Subset, mode: LabelMode) -> Result<Self> {
        let subset_root = data_root.as_ref().join(subset.dir_name());
        info!("Loading {} corpus ({} mode) from: {:?}", subset, mode, subset_root);

        if !subset_root.is_dir() {
            return Err(CorpusError::PathNotFound(subset_root));
        }

        let index = LabelIndex::build(&subset_root, mode)?;
        info!("Indexed {} samples", index.len());

        Ok(Self {
            subset_root,
            subset,
            mode,
            index,
            decoder: Arc::new(ImageCrateDecoder),
            transform: Arc::new(|img: RgbImage| img),
        })
    }
}

impl<O> CorpusView<O> {
    /// Replace the image decoder
    pub fn with_decoder<D: ImageDecoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Apply `transform` to every decoded image
    pub fn with_transform<T, F>(self, transform: F) -> CorpusView<T>
    where
        F: Fn(RgbImage) -> T + Send + Sync + 'static,
    {
        CorpusView {
            subset_root: self.subset_root,
            subset: self.subset,
            mode: self.mode,
            index: self.index,
            decoder: self.decoder,
            transform: Arc::new(transform),
        }
    }

    /// Total sample count for the active mode
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> LabelMode {
        self.mode
    }

    pub fn subset(&self) -> Subset {
        self.subset
    }

    /// `<data_root>/<subset>` directory this view was built from
    pub fn subset_root(&self) -> &Path {
        &self.subset_root
    }

    /// Number of dog samples in the view
    pub fn num_dogs(&self) -> usize {
        self.species_count(Species::Dog)
    }

    /// Number of cat samples in the view
    pub fn num_cats(&self) -> usize {
        self.species_count(Species::Cat)
    }

    fn species_count(&self, wanted: Species) -> usize {
        match &self.index {
            LabelIndex::Species { dogs, cats } => match wanted {
                Species::Dog => dogs.len(),
                Species::Cat => cats.len(),
            },
            LabelIndex::Breed {
                species, samples, ..
            } => {
                if *species == wanted {
                    samples.len()
                } else {
                    0
                }
            }
        }
    }

    /// Sorted breed names; empty in `All` mode
    pub fn breeds(&self) -> &[String] {
        match &self.index {
            LabelIndex::Species { .. } => &[],
            LabelIndex::Breed { breeds, .. } => breeds,
        }
    }

    /// Number of distinct labels
    pub fn num_classes(&self) -> usize {
        match &self.index {
            LabelIndex::Species { .. } => 2,
            LabelIndex::Breed { breeds, .. } => breeds.len(),
        }
    }

    /// Human-readable name of a label
    pub fn class_name(&self, label: usize) -> Option<&str> {
        match &self.index {
            LabelIndex::Species { .. } => match label {
                0 => Some(Species::Dog.name()),
                1 => Some(Species::Cat.name()),
                _ => None,
            },
            LabelIndex::Breed { breeds, .. } => breeds.get(label).map(String::as_str),
        }
    }

    /// Path and label of sample `index` without decoding it
    pub fn sample(&self, index: usize) -> Result<LabeledSample> {
        self.index.sample(index)
    }

    /// Decode sample `index`, apply the transform, and return it with its label
    pub fn get(&self, index: usize) -> Result<(O, usize)> {
        let sample = self.sample(index)?;
        let image = self.decoder.decode_rgb(&sample.path)?;
        Ok(((self.transform)(image), sample.label))
    }

    /// Per-label sample counts
    pub fn stats(&self) -> CorpusStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for index in 0..self.len() {
            if let Ok(sample) = self.sample(index) {
                if let Some(count) = class_counts.get_mut(sample.label) {
                    *count += 1;
                }
            }
        }

        let class_names = (0..self.num_classes())
            .map(|label| self.class_name(label).unwrap_or("?").to_string())
            .collect();

        CorpusStats {
            subset: self.subset,
            mode: self.mode,
            total_samples: self.len(),
            class_names,
            class_counts,
        }
    }
}

impl<O> fmt::Debug for CorpusView<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorpusView")
            .field("subset_root", &self.subset_root)
            .field("subset", &self.subset)
            .field("mode", &self.mode)
            .field("len", &self.len())
            .finish()
    }
}

/// Statistics about a corpus view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    pub subset: Subset,
    pub mode: LabelMode,
    pub total_samples: usize,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
}

impl CorpusStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Corpus Statistics ({} / {}):", self.subset, self.mode);
        println!("  Total samples: {}", format_number(self.total_samples));
        println!("  Number of classes: {}", self.class_names.len());
        println!("\n  Samples per class:");

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = if self.total_samples > 0 {
                (*count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            println!(
                "    {:3}. {:30} {:>8} {:5.1}% {}",
                idx,
                name,
                format_number(*count),
                percentage(*count, self.total_samples),
                "█".repeat(bar_len)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::fs;
    use tempfile::TempDir;

    fn write_image(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([10u8, 20, 30])).save(path).unwrap();
    }

    /// train/{cats/{siamese: 2, persian: 1}, dogs/{pug: 2, beagle: 1}}
    fn create_corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        let train = dir.path().join("train");
        write_image(&train.join("cats/siamese/a.png"));
        write_image(&train.join("cats/siamese/b.png"));
        write_image(&train.join("cats/persian/c.png"));
        write_image(&train.join("dogs/pug/d.png"));
        write_image(&train.join("dogs/pug/e.png"));
        write_image(&train.join("dogs/beagle/f.png"));
        dir
    }

    struct FixedDecoder;

    impl ImageDecoder for FixedDecoder {
        fn decode_rgb(&self, _path: &Path) -> Result<RgbImage> {
            Ok(RgbImage::new(8, 6))
        }
    }

    #[test]
    fn test_label_mode_parse() {
        assert_eq!("All".parse::<LabelMode>().unwrap(), LabelMode::All);
        assert_eq!("cat".parse::<LabelMode>().unwrap(), LabelMode::Cat);
        assert_eq!("DOG".parse::<LabelMode>().unwrap(), LabelMode::Dog);
        assert!(matches!(
            "Bird".parse::<LabelMode>(),
            Err(CorpusError::InvalidMode(m)) if m == "Bird"
        ));
    }

    #[test]
    fn test_all_mode_size_and_species_labels() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::All).unwrap();

        assert_eq!(view.num_dogs(), 3);
        assert_eq!(view.num_cats(), 3);
        assert_eq!(view.len(), view.num_dogs() + view.num_cats());

        for i in 0..view.len() {
            let sample = view.sample(i).unwrap();
            assert_eq!(sample.label == 0, i < view.num_dogs());
            let expected_species = if i < view.num_dogs() { "dogs" } else { "cats" };
            assert!(sample.path.components().any(|c| c.as_os_str() == expected_species));
        }
    }

    #[test]
    fn test_all_mode_discovery_order_is_sorted() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::All).unwrap();

        let names: Vec<String> = (0..view.len())
            .map(|i| {
                view.sample(i)
                    .unwrap()
                    .path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        // dogs: beagle/f, pug/d, pug/e; cats: persian/c, siamese/a, siamese/b
        assert_eq!(names, vec!["f.png", "d.png", "e.png", "c.png", "a.png", "b.png"]);
    }

    #[test]
    fn test_breed_mode_labels_follow_sorted_breeds() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::Cat).unwrap();

        assert_eq!(view.len(), 3);
        assert_eq!(view.num_dogs(), 0);
        assert_eq!(view.breeds(), &["persian".to_string(), "siamese".to_string()]);

        for i in 0..view.len() {
            let sample = view.sample(i).unwrap();
            let breed = sample
                .path
                .parent()
                .unwrap()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string();
            let expected = view.breeds().iter().position(|b| *b == breed).unwrap();
            assert_eq!(sample.label, expected);
        }
    }

    #[test]
    fn test_dog_mode_class_names() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::Dog).unwrap();

        assert_eq!(view.num_classes(), 2);
        assert_eq!(view.class_name(0), Some("beagle"));
        assert_eq!(view.class_name(1), Some("pug"));
        assert_eq!(view.class_name(2), None);
    }

    #[test]
    fn test_nested_breed_uses_immediate_parent() {
        let dir = create_corpus();
        write_image(&dir.path().join("train/cats/siamese/kittens/g.png"));

        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::Cat).unwrap();
        assert_eq!(view.len(), 4);
        assert_eq!(
            view.breeds(),
            &["kittens".to_string(), "persian".to_string(), "siamese".to_string()]
        );
    }

    #[test]
    fn test_out_of_range_index() {
        let dir = create_corpus();
        for mode in [LabelMode::All, LabelMode::Cat, LabelMode::Dog] {
            let view = CorpusView::new(dir.path(), Subset::Train, mode).unwrap();
            let len = view.len();
            assert!(matches!(
                view.sample(len),
                Err(CorpusError::IndexOutOfRange { index, len: l }) if index == len && l == len
            ));
            assert!(matches!(
                view.get(usize::MAX),
                Err(CorpusError::IndexOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_get_decodes_rgb() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::All).unwrap();

        let (image, label) = view.get(0).unwrap();
        assert_eq!(label, 0);
        assert_eq!(image.dimensions(), (4, 4));
    }

    #[test]
    fn test_transform_is_applied() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::All)
            .unwrap()
            .with_decoder(FixedDecoder)
            .with_transform(|img: RgbImage| img.width() * img.height());

        let (pixels, label) = view.get(view.num_dogs()).unwrap();
        assert_eq!(pixels, 48);
        assert_eq!(label, 1);
    }

    #[test]
    fn test_missing_species_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        write_image(&dir.path().join("val/cats/siamese/a.png"));

        let view = CorpusView::new(dir.path(), Subset::Val, LabelMode::All).unwrap();
        assert_eq!(view.num_dogs(), 0);
        assert_eq!(view.len(), 1);
        assert_eq!(view.sample(0).unwrap().label, 1);
    }

    #[test]
    fn test_missing_subset_root() {
        let dir = create_corpus();
        let result = CorpusView::new(dir.path(), Subset::Test, LabelMode::All);
        assert!(matches!(result, Err(CorpusError::PathNotFound(_))));
    }

    #[test]
    fn test_rebuild_is_identical() {
        let dir = create_corpus();
        let a = CorpusView::new(dir.path(), Subset::Train, LabelMode::Dog).unwrap();
        let b = CorpusView::new(dir.path(), Subset::Train, LabelMode::Dog).unwrap();

        for i in 0..a.len() {
            assert_eq!(a.sample(i).unwrap(), b.sample(i).unwrap());
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_view_is_shareable_across_threads() {
        assert_send_sync::<CorpusView>();
        assert_send_sync::<CorpusView<u32>>();

        let dir = create_corpus();
        let view = std::sync::Arc::new(
            CorpusView::new(dir.path(), Subset::Train, LabelMode::Cat)
                .unwrap()
                .with_decoder(FixedDecoder),
        );

        let handles: Vec<_> = (0..view.len())
            .map(|i| {
                let view = std::sync::Arc::clone(&view);
                std::thread::spawn(move || view.get(i).map(|(_, label)| label).unwrap())
            })
            .collect();
        let labels: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(labels, vec![0, 1, 1]);
    }

    #[test]
    fn test_labels_resolved_at_build() {
        let dir = create_corpus();
        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::Dog).unwrap();

        // labels no longer depend on the tree once the view is built
        fs::remove_dir_all(dir.path().join("train/dogs/pug")).unwrap();
        let labels: Vec<usize> = (0..view.len()).map(|i| view.sample(i).unwrap().label).collect();
        assert_eq!(labels, vec![0, 1, 1]);
    }

    #[test]
    fn test_stats() {
        let dir = create_corpus();
        let stats = CorpusView::new(dir.path(), Subset::Train, LabelMode::Cat)
            .unwrap()
            .stats();

        assert_eq!(stats.total_samples, 3);
        assert_eq!(stats.class_names, vec!["persian", "siamese"]);
        assert_eq!(stats.class_counts, vec![1, 2]);
    }
}
