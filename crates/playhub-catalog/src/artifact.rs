//! Storage for published game builds.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use playhub_protocol::GameId;

/// Where build artifacts live, one blob per `(game, version)`.
///
/// Kept separate from the data store: a catalog entry and its artifact
/// are written in two steps, and the catalog compensates by hand if the
/// second step fails.
pub trait ArtifactStore: Send + Sync + 'static {
    fn write(
        &self,
        game_id: &GameId,
        version: &str,
        bytes: &[u8],
    ) -> impl Future<Output = io::Result<()>> + Send;

    fn read(
        &self,
        game_id: &GameId,
        version: &str,
    ) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    fn delete(
        &self,
        game_id: &GameId,
        version: &str,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

/// Artifacts as files: `<root>/<game_id>/<version>.bin`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, game_id: &GameId, version: &str) -> io::Result<PathBuf> {
        let safe = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
                && !s.contains("..")
        };
        if !safe(game_id.as_str()) || !safe(version) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe artifact name {game_id}/{version}"),
            ));
        }
        Ok(self
            .root
            .join(game_id.as_str())
            .join(format!("{version}.bin")))
    }
}

impl ArtifactStore for FsArtifactStore {
    async fn write(&self, game_id: &GameId, version: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path(game_id, version)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(%game_id, version, len = bytes.len(), "artifact written");
        Ok(())
    }

    async fn read(&self, game_id: &GameId, version: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path(game_id, version)?).await
    }

    async fn delete(&self, game_id: &GameId, version: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path(game_id, version)?).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
