//! Burn Dataset Integration
//!
//! Adapts a [`CorpusView`] to Burn's `Dataset` trait so a training loop can
//! consume the corpus directly. Images are loaded lazily on `get`.

use burn::data::dataset::Dataset;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::corpus::CorpusView;
use crate::DEFAULT_IMAGE_SIZE;

/// A single corpus item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PetItem {
    /// Image data as flattened CHW float array [3 * H * W]
    pub image: Vec<f32>,
    /// Species or breed label, depending on the view's mode
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

/// Resize to `size`x`size` and convert to CHW floats in [0, 1]
pub fn to_chw_tensor(image: &RgbImage, size: usize) -> Vec<f32> {
    let resized = imageops::resize(image, size as u32, size as u32, FilterType::Triangle);

    let plane = size * size;
    let mut tensor = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * size + x as usize;
        tensor[offset] = pixel[0] as f32 / 255.0; // R
        tensor[plane + offset] = pixel[1] as f32 / 255.0; // G
        tensor[2 * plane + offset] = pixel[2] as f32 / 255.0; // B
    }

    tensor
}

/// Corpus view exposed through Burn's `Dataset` trait
#[derive(Debug)]
pub struct PetBurnDataset {
    view: CorpusView,
    image_size: usize,
}

impl PetBurnDataset {
    /// Wrap a view, producing items at the default image size
    pub fn new(view: CorpusView) -> Self {
        Self::with_image_size(view, DEFAULT_IMAGE_SIZE)
    }

    pub fn with_image_size(view: CorpusView, image_size: usize) -> Self {
        Self { view, image_size }
    }

    /// Number of distinct labels in the underlying view
    pub fn num_classes(&self) -> usize {
        self.view.num_classes()
    }

    pub fn view(&self) -> &CorpusView {
        &self.view
    }
}

impl Dataset<PetItem> for PetBurnDataset {
    fn get(&self, index: usize) -> Option<PetItem> {
        if index >= self.view.len() {
            return None;
        }

        let sample = self.view.sample(index).ok()?;
        match self.view.get(index) {
            Ok((image, label)) => Some(PetItem {
                image: to_chw_tensor(&image, self.image_size),
                label,
                path: sample.path.to_string_lossy().to_string(),
            }),
            Err(e) => {
                warn!("Skipping sample {}: {}", index, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.view.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LabelMode, Subset};
    use image::Rgb;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_image(path: &Path, color: [u8; 3]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(6, 6, Rgb(color)).save(path).unwrap();
    }

    #[test]
    fn test_to_chw_tensor_layout() {
        let image = RgbImage::from_pixel(4, 4, Rgb([255u8, 0, 51]));
        let tensor = to_chw_tensor(&image, 2);

        assert_eq!(tensor.len(), 3 * 2 * 2);
        assert!(tensor[..4].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(tensor[4..8].iter().all(|v| v.abs() < 1e-6));
        assert!(tensor[8..].iter().all(|v| (*v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_burn_dataset_items() {
        let dir = TempDir::new().unwrap();
        write_image(&dir.path().join("test/dogs/pug/a.png"), [0, 0, 0]);
        write_image(&dir.path().join("test/cats/siamese/b.png"), [255, 255, 255]);

        let view = CorpusView::new(dir.path(), Subset::Test, LabelMode::All).unwrap();
        let dataset = PetBurnDataset::with_image_size(view, 3);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.num_classes(), 2);

        let dog = dataset.get(0).unwrap();
        assert_eq!(dog.label, 0);
        assert_eq!(dog.image.len(), 27);
        assert!(dog.path.ends_with("a.png"));

        let cat = dataset.get(1).unwrap();
        assert_eq!(cat.label, 1);
        assert!(cat.image.iter().all(|v| (*v - 1.0).abs() < 1e-6));

        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn test_undecodable_file_yields_none() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("train/cats/siamese/notes.txt");
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, "not an image").unwrap();

        let view = CorpusView::new(dir.path(), Subset::Train, LabelMode::Cat).unwrap();
        let dataset = PetBurnDataset::new(view);

        assert_eq!(dataset.len(), 1);
        assert!(dataset.get(0).is_none());
    }
}
