//! LC-3 object images.
//!
//! An image is a big-endian origin word followed by big-endian program
//! words, placed contiguously from the origin:
//!
//! ```text
//! 30 00  E0 02  F0 22  F0 25  00 48  00 49  00 00
//! ^^^^^  origin 0x3000, then LEA R0,#2 / PUTS / HALT / "HI"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A program image: words to place starting at `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub origin: u16,
    pub words: Vec<u16>,
}

impl Image {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    /// Parse an image from raw bytes.
    ///
    /// Returns `None` when there are fewer than two bytes, i.e. no origin.
    /// A trailing odd byte is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut chunks = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        let origin = chunks.next()?;
        Some(Self {
            origin,
            words: chunks.collect(),
        })
    }

    /// Serialize to the on-disk format.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    /// Number of program words (excluding the origin).
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let image = Image::from_bytes(&bytes).ok_or_else(|| ImageError::MissingOrigin {
        path: path.to_path_buf(),
    })?;

    debug!(
        path = %path.display(),
        origin = format_args!("{:#06x}", image.origin),
        words = image.len(),
        "read image"
    );
    Ok(image)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<(), ImageError> {
    let path = path.as_ref();
    fs::write(path, image.to_bytes()).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to load image {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load image {}: missing origin word", path.display())]
    MissingOrigin { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Memory;

    #[test]
    fn test_from_bytes_is_big_endian() {
        let image = Image::from_bytes(&[0x30, 0x00, 0xF0, 0x25]).unwrap();

        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![0xF025]);
    }

    #[test]
    fn test_origin_only_image() {
        let image = Image::from_bytes(&[0x40, 0x00]).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn test_missing_origin() {
        assert_eq!(Image::from_bytes(&[]), None);
        assert_eq!(Image::from_bytes(&[0x30]), None);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let image = Image::from_bytes(&[0x30, 0x00, 0x12, 0x34, 0x56]).unwrap();
        assert_eq!(image.words, vec![0x1234]);
    }

    #[test]
    fn test_memory_roundtrip_through_bytes() {
        let words: Vec<u16> = (0..64u16).map(|i| i.wrapping_mul(0x9E37) ^ 0x00FF).collect();
        let mut original = Memory::new();
        original.load(0x3000, &words);

        let dumped = (0..words.len() as u16).map(|i| original.peek(0x3000 + i)).collect();
        let bytes = Image::new(0x3000, dumped).to_bytes();
        let mut restored = Memory::new();
        let image = Image::from_bytes(&bytes).unwrap();
        restored.load(image.origin, &image.words);

        assert_eq!(restored, original);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.obj");
        let image = Image::new(0x3000, vec![0xE002, 0xF022, 0xF025, 0x0048, 0x0049, 0]);

        save_image(&path, &image).unwrap();
        let loaded = load_image(&path).unwrap();

        assert_eq!(loaded, image);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.obj");
        let err = load_image(&path).unwrap_err();

        assert!(matches!(err, ImageError::Io { .. }));
        assert!(err.to_string().contains("does-not-exist.obj"));
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load_image(file.path()).unwrap_err();

        assert!(matches!(err, ImageError::MissingOrigin { .. }));
    }
}
