//! Utilities module for error handling, logging, and formatting helpers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod error;
pub mod logging;

pub use error::{CorpusError, Result, ResultExt};
pub use logging::{init_logging, LogConfig, ProgressLogger};

/// Format a number with thousands separator
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Share of `part` in `total` as a percentage, 0 when `total` is 0
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Copy `source` to `dest` through a `<dest>.part` sibling
///
/// `dest` only appears once every byte has been written. A failed copy leaves
/// nothing behind, so a later "already placed" check on `dest` can be trusted.
pub fn copy_into_place(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = fs::copy(source, &partial).and_then(|bytes| {
        fs::rename(&partial, dest)?;
        Ok(bytes)
    });
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_into_place() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.jpg");
        let dest = dir.path().join("out.jpg");
        fs::write(&source, b"pixels").unwrap();

        assert_eq!(copy_into_place(&source, &dest).unwrap(), 6);
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
        assert!(!dir.path().join("out.jpg.part").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_copy_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.jpg");
        // readable to open, fails on the first read
        std::os::unix::fs::symlink("/proc/self/mem", &source).unwrap();
        let dest = dir.path().join("out.jpg");

        assert!(copy_into_place(&source, &dest).is_err());
        assert!(!dest.exists());
        assert!(!dir.path().join("out.jpg.part").exists());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1000000), "1,000,000");
        assert_eq!(format_number(42), "42");
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 0), 0.0);
    }
}
