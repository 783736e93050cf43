//! # Model Assets
//!
//! Packaged model files are read-only. Before the native engine can open one it
//! has to exist in writable local storage, so the first load of a given name
//! stream-copies the asset into `<storage>/models/<name>`. Later loads reuse the
//! local copy as-is; no checksum or staleness check is performed against the
//! packaged asset.

pub mod source;
pub mod store;

pub use source::{AssetSource, DirAssetSource};
pub use store::{ModelStore, ResolvedModel, StoreError};

/// Sub-path used for models both in the asset bundle and in local storage.
pub const MODELS_SUBDIR: &str = "models";

/// Checks that `name` is a single plain file name.
///
/// Model names are joined onto directories, so anything that could climb out
/// of them (separators, `.`/`..`) is refused.
pub fn validate_model_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');

    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
