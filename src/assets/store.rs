use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{validate_model_name, AssetSource, MODELS_SUBDIR};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid model name: {0:?}")]
    InvalidName(String),

    #[error("model asset '{name}' could not be opened: {source}")]
    AssetUnavailable {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A local model file ready to hand to the native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Absolute path of the local copy
    pub path: PathBuf,
    /// Whether this call copied the file out of the assets
    pub copied: bool,
}

/// Writable model storage backed by a read-only asset source.
pub struct ModelStore {
    models_dir: PathBuf,
    assets: Box<dyn AssetSource>,
}

impl ModelStore {
    /// Creates a store rooted at `storage_root`; models live in `storage_root/models`.
    pub fn new(storage_root: impl AsRef<Path>, assets: impl AssetSource + 'static) -> Self {
        Self {
            models_dir: storage_root.as_ref().join(MODELS_SUBDIR),
            assets: Box::new(assets),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path the local copy of `name` lives at, whether or not it exists yet.
    pub fn local_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_model_name(name)?;
        Ok(self.models_dir.join(name))
    }

    /// Returns the local copy of `name`, copying it from the assets first if
    /// no local file with that name exists.
    pub fn resolve(&self, name: &str) -> Result<ResolvedModel, StoreError> {
        let target = self.local_path(name)?;
        self.ensure_models_dir()?;

        let copied = if target.exists() {
            debug!("Reusing local model file: {}", target.display());
            false
        } else {
            let bytes = self.copy_from_assets(name, &target)?;
            info!(bytes, "Copied model asset '{}' to {}", name, target.display());
            true
        };

        Ok(ResolvedModel {
            path: fs::canonicalize(&target)?,
            copied,
        })
    }

    fn ensure_models_dir(&self) -> Result<(), StoreError> {
        if !self.models_dir.exists() {
            fs::create_dir_all(&self.models_dir)?;
            info!("Created models directory: {}", self.models_dir.display());
        }
        Ok(())
    }

    /// Streams the asset into a hidden `.part` file and renames it into place
    /// once the whole file is on disk. The uuid keeps the partial file from
    /// clobbering a model that happens to be called `<name>.part`.
    fn copy_from_assets(&self, name: &str, target: &Path) -> Result<u64, StoreError> {
        let mut reader = self.assets.open(name).map_err(|source| StoreError::AssetUnavailable {
            name: name.to_string(),
            source,
        })?;

        let partial = self.models_dir.join(format!(".{}.{}.part", name, Uuid::new_v4()));
        let written = (|| -> io::Result<u64> {
            let mut out = BufWriter::new(File::create(&partial)?);
            let bytes = io::copy(&mut reader, &mut out)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            Ok(bytes)
        })();

        match written {
            Ok(bytes) => {
                fs::rename(&partial, target)?;
                Ok(bytes)
            }
            Err(e) => {
                warn!("Copy of model asset '{}' failed: {}", name, e);
                if let Err(cleanup) = fs::remove_file(&partial) {
                    debug!("Could not remove {}: {}", partial.display(), cleanup);
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::DirAssetSource;
    use std::io::Read;

    struct Scratch {
        root: PathBuf,
    }

    impl Scratch {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("llama-bridge-store-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(root.join("assets").join(MODELS_SUBDIR)).unwrap();
            Self { root }
        }

        fn add_asset(&self, name: &str, bytes: &[u8]) {
            fs::write(self.root.join("assets").join(MODELS_SUBDIR).join(name), bytes).unwrap();
        }

        fn store(&self) -> ModelStore {
            ModelStore::new(self.root.join("storage"), DirAssetSource::new(self.root.join("assets")))
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.root).ok();
        }
    }

    /// Yields a few bytes, then fails like a truncated asset stream.
    struct BrokenAssets;

    struct BrokenReader {
        served: bool,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "asset stream cut short"));
            }
            self.served = true;
            let n = buf.len().min(4);
            buf[..n].copy_from_slice(&b"GGUF"[..n]);
            Ok(n)
        }
    }

    impl AssetSource for BrokenAssets {
        fn open(&self, _name: &str) -> io::Result<Box<dyn Read>> {
            Ok(Box::new(BrokenReader { served: false }))
        }
    }

    #[test]
    fn test_first_resolve_copies_asset_byte_for_byte() {
        let scratch = Scratch::new();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        scratch.add_asset("tiny.bin", &payload);
        let store = scratch.store();

        let resolved = store.resolve("tiny.bin").unwrap();

        assert!(resolved.copied);
        assert!(resolved.path.is_absolute());
        assert_eq!(fs::read(&resolved.path).unwrap(), payload);
        assert!(store.models_dir().exists());
    }

    #[test]
    fn test_second_resolve_reuses_local_copy() {
        let scratch = Scratch::new();
        scratch.add_asset("tiny.bin", b"original weights");
        let store = scratch.store();

        let first = store.resolve("tiny.bin").unwrap();
        // A changed asset is not noticed: the local copy is trusted by name.
        scratch.add_asset("tiny.bin", b"updated weights");
        let second = store.resolve("tiny.bin").unwrap();

        assert!(!second.copied);
        assert_eq!(first.path, second.path);
        assert_eq!(fs::read(&second.path).unwrap(), b"original weights");
    }

    #[test]
    fn test_missing_asset_is_reported() {
        let scratch = Scratch::new();
        let store = scratch.store();

        let err = store.resolve("absent.gguf").unwrap_err();

        assert!(matches!(err, StoreError::AssetUnavailable { ref name, .. } if name == "absent.gguf"));
        assert!(!store.models_dir().join("absent.gguf").exists());
    }

    #[test]
    fn test_failed_copy_leaves_no_file_behind() {
        let scratch = Scratch::new();
        let store = ModelStore::new(scratch.root.join("storage"), BrokenAssets);

        let err = store.resolve("tiny.bin").unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert!(!store.models_dir().join("tiny.bin").exists());
        assert_eq!(fs::read_dir(store.models_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_leaves_model_named_like_partial_file_alone() {
        let scratch = Scratch::new();
        scratch.add_asset("foo", b"foo weights");
        scratch.add_asset("foo.part", b"foo.part weights");
        let store = scratch.store();

        let neighbour = store.resolve("foo.part").unwrap();
        let resolved = store.resolve("foo").unwrap();

        assert!(resolved.copied);
        assert_eq!(fs::read(&resolved.path).unwrap(), b"foo weights");
        assert_eq!(fs::read(&neighbour.path).unwrap(), b"foo.part weights");
        assert_eq!(fs::read_dir(store.models_dir()).unwrap().count(), 2);
    }

    #[test]
    fn test_invalid_name_touches_nothing() {
        let scratch = Scratch::new();
        let store = scratch.store();

        let err = store.resolve("../tiny.bin").unwrap_err();

        assert!(matches!(err, StoreError::InvalidName(_)));
        assert!(!store.models_dir().exists());
    }
}
