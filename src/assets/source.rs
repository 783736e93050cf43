use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use super::MODELS_SUBDIR;

/// Read-only access to packaged model files.
///
/// `open` is called on the worker thread, so the returned reader does not
/// need to be `Send`; the source itself is moved onto that thread.
pub trait AssetSource: Send {
    /// Opens the packaged model `name` for streaming.
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>>;
}

/// Assets laid out on disk as `<root>/models/<name>`.
#[derive(Debug, Clone)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.root.join(MODELS_SUBDIR).join(name)
    }
}

impl AssetSource for DirAssetSource {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>> {
        let file = File::open(self.asset_path(name))?;
        Ok(Box::new(file))
    }
}
