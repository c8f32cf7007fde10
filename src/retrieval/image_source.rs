use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

/// Supplies the raw bytes of tile images.
///
/// Fetches run on a background task pool, so implementations may block.
pub trait ImageSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Reads tile images from a local directory, treating request URLs as relative paths.
#[derive(Debug, Clone)]
pub struct DirectoryImageSource {
    pub root: PathBuf,
}

impl DirectoryImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for DirectoryImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.root.join(url.trim_start_matches('/'));
        fs::read(&path).with_context(|| format!("Failed to read {}.", path.display()))
    }
}
