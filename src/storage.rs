// Local asset storage.
//
// A run holds at most one downloaded image on disk. `AssetStore::download`
// hands it out wrapped in an `AssetGuard`, which deletes the file when it is
// released or dropped, so every exit path of the pipeline cleans up.

use crate::api::send;
use crate::error::{PublishError, Result};
use reqwest::blocking::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use url::Url;

/// A downloaded file owned by the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    path: PathBuf,
}

impl LocalAsset {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        LocalAsset { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|s| s.to_str())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Scoped ownership of a [`LocalAsset`]: the file is removed exactly once,
/// either by [`AssetGuard::release`] or when the guard is dropped.
#[derive(Debug)]
pub struct AssetGuard {
    asset: LocalAsset,
    released: bool,
}

impl AssetGuard {
    pub fn new(asset: LocalAsset) -> Self {
        AssetGuard {
            asset,
            released: false,
        }
    }

    pub fn asset(&self) -> &LocalAsset {
        &self.asset
    }

    /// Remove the file now and report the outcome to the caller.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        AssetStore::remove(&self.asset)
    }
}

impl Drop for AssetGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = AssetStore::remove(&self.asset) {
            warn!(error = %e, "failed to remove temporary file");
        }
    }
}

pub struct AssetStore {
    client: Client,
    directory: PathBuf,
}

impl AssetStore {
    pub fn new(client: Client, directory: impl Into<PathBuf>) -> Self {
        AssetStore {
            client,
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the storage directory if needed. Existing directories are fine.
    pub fn ensure_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.directory)
            .map_err(|e| PublishError::storage(&self.directory, e))
    }

    /// Download `url` into the storage directory, named after the last path
    /// segment of the URL, replacing any file with the same name.
    ///
    /// The body is written to a temporary file next to the target and renamed
    /// into place, so callers never observe a partial image.
    pub fn download(&self, url: &Url) -> Result<AssetGuard> {
        let file_name = file_name_from_url(url)?;
        let path = self.directory.join(file_name);

        debug!(%url, path = %path.display(), "downloading image");
        let body = send(self.client.get(url.clone()), "downloading comic image")?;

        let mut tmp = NamedTempFile::new_in(&self.directory)
            .map_err(|e| PublishError::storage(&self.directory, e))?;
        tmp.write_all(&body)
            .and_then(|_| tmp.flush())
            .map_err(|e| PublishError::storage(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| PublishError::storage(&path, e.error))?;

        Ok(AssetGuard::new(LocalAsset::new(path)))
    }

    /// Delete the asset's file. A file that is already gone is not an error.
    pub fn remove(asset: &LocalAsset) -> Result<()> {
        match std::fs::remove_file(&asset.path) {
            Ok(()) => {
                debug!(path = %asset.path.display(), "removed temporary file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PublishError::storage(&asset.path, e)),
        }
    }
}

/// Last non-empty path segment of `url`, rejecting anything that could
/// escape the storage directory.
pub fn file_name_from_url(url: &Url) -> Result<String> {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return Err(PublishError::malformed(
            "comic feed",
            format!("image URL {url} has no usable file name"),
        ));
    }
    Ok(name.to_string())
}
