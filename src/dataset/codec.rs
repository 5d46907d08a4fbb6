//! Image codec boundary.
//!
//! The corpus view never decodes pixels itself; it hands a path to an
//! [`ImageDecoder`] and receives a 3-channel RGB buffer back.

use std::path::Path;

use image::{ImageReader, RgbImage};

use crate::utils::error::{CorpusError, Result};

/// Decodes an image file into canonical 8-bit RGB
///
/// Implementations must be reentrant: a corpus view may be read from several
/// loader threads at once.
pub trait ImageDecoder: Send + Sync {
    fn decode_rgb(&self, path: &Path) -> Result<RgbImage>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode_rgb(&self, path: &Path) -> Result<RgbImage> {
        let img = ImageReader::open(path)
            .map_err(|e| CorpusError::ImageLoad(path.to_path_buf(), e.to_string()))?
            .with_guessed_format()
            .map_err(|e| CorpusError::ImageLoad(path.to_path_buf(), e.to_string()))?
            .decode()
            .map_err(|e| CorpusError::ImageLoad(path.to_path_buf(), e.to_string()))?;

        Ok(img.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    #[test]
    fn test_decode_grayscale_as_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(4, 3, Luma([200u8])).save(&path).unwrap();

        let rgb = ImageCrateDecoder.decode_rgb(&path).unwrap();
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_decode_missing_file() {
        let result = ImageCrateDecoder.decode_rgb(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(CorpusError::ImageLoad(_, _))));
    }
}
