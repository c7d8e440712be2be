//! Staging and delivery of fetched artifacts
//!
//! Every dispatch gets its own directory `<download_dir>/<token>/`, and the
//! artifact is named after the token. The directory is owned by a [`StagedDir`]
//! guard that removes it on drop, so no file outlives its request whether it ends
//! in success, an error, or cancellation.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{DeliveryError, Error, Result};
use crate::types::{HandleToken, MediaKind, StagedArtifact};

/// Root of all per-request staging directories
#[derive(Clone, Debug)]
pub struct StagingArea {
    root: PathBuf,
    max_artifact_size: u64,
}

impl StagingArea {
    /// Create a staging area under `root` with a size ceiling in bytes
    pub fn new(root: impl Into<PathBuf>, max_artifact_size: u64) -> Self {
        Self {
            root: root.into(),
            max_artifact_size,
        }
    }

    /// Directory holding the per-request directories
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Size ceiling in bytes
    pub fn max_artifact_size(&self) -> u64 {
        self.max_artifact_size
    }

    /// Create an empty directory for `token`
    ///
    /// Leftovers from an earlier run with the same token are discarded.
    pub async fn prepare(&self, token: &HandleToken) -> Result<StagedDir> {
        if !token.is_path_safe() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("token {token:?} cannot be used as a directory name"),
            )));
        }

        let path = self.root.join(token.as_str());
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;

        Ok(StagedDir {
            path,
            file_stem: token.as_str().to_string(),
        })
    }

    /// Find the artifact, check its size, hand it to `deliver`, and delete it
    ///
    /// `dir` is consumed: the directory and everything in it is gone when this
    /// returns, on every path. `deliver` is never called for an artifact larger
    /// than the ceiling.
    pub async fn stage_and_deliver<F, Fut>(
        &self,
        dir: StagedDir,
        reported: Option<&Path>,
        kind: MediaKind,
        deliver: F,
    ) -> std::result::Result<StagedArtifact, DeliveryError>
    where
        F: FnOnce(StagedArtifact) -> Fut,
        Fut: Future<Output = std::result::Result<(), String>>,
    {
        let artifact = locate_artifact(&dir, reported, kind).await?;

        if artifact.size_bytes > self.max_artifact_size {
            tracing::warn!(
                path = %artifact.path.display(),
                size = artifact.size_bytes,
                limit = self.max_artifact_size,
                "artifact exceeds size limit, discarding"
            );
            remove_artifact(&artifact.path).await;
            return Err(DeliveryError::ArtifactTooLarge {
                size: artifact.size_bytes,
                limit: self.max_artifact_size,
            });
        }

        let outcome = deliver(artifact.clone()).await;
        remove_artifact(&artifact.path).await;
        drop(dir);

        match outcome {
            Ok(()) => Ok(artifact),
            Err(reason) => {
                tracing::warn!(error = %reason, "transport rejected artifact");
                Err(DeliveryError::DeliveryFailed(reason))
            }
        }
    }
}

/// A per-request staging directory, removed on drop
#[derive(Debug)]
pub struct StagedDir {
    path: PathBuf,
    file_stem: String,
}

impl StagedDir {
    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name (without extension) the artifact must carry
    pub fn file_stem(&self) -> &str {
        &self.file_stem
    }

    /// Delete everything inside the directory, keeping the directory itself
    pub async fn clear(&self) -> io::Result<()> {
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

impl Drop for StagedDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staging directory");
            }
        }
    }
}

/// Locate the produced file and measure it
///
/// The path reported by the extractor is trusted only if it lies inside `dir` and
/// carries an extension expected for `kind`; otherwise `<stem>.<ext>` is probed for
/// each expected extension.
pub async fn locate_artifact(
    dir: &StagedDir,
    reported: Option<&Path>,
    kind: MediaKind,
) -> std::result::Result<StagedArtifact, DeliveryError> {
    let expected = kind.expected_extensions();

    let reported = reported.filter(|p| {
        p.starts_with(dir.path())
            && p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| expected.contains(&e.to_ascii_lowercase().as_str()))
    });

    let candidates = reported.map(Path::to_path_buf).into_iter().chain(
        expected
            .iter()
            .map(|ext| dir.path().join(format!("{}.{}", dir.file_stem(), ext))),
    );

    for candidate in candidates {
        if let Ok(meta) = tokio::fs::metadata(&candidate).await
            && meta.is_file()
        {
            return Ok(StagedArtifact {
                path: candidate,
                size_bytes: meta.len(),
                kind,
            });
        }
    }

    Err(DeliveryError::ArtifactMissing {
        dir: dir.path().to_path_buf(),
    })
}

async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
    }
}
