// Post-processing export: turns the engine's artifact into a secondary format.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("model artifact {0} does not exist")]
    MissingArtifact(PathBuf),

    #[error("cannot prepare export folder {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("exporter failed: {0}")]
    Exporter(#[source] anyhow::Error),
}

/// Loads a model artifact (with its textures) and writes it to `target`.
#[async_trait]
pub trait AssetExporter: Send + Sync {
    async fn export(&self, artifact: &Path, target: &Path) -> anyhow::Result<()>;
}

/// Exporter that writes the artifact bytes unchanged. Hosts with a format
/// converter install their own [`AssetExporter`].
pub struct CopyExporter;

#[async_trait]
impl AssetExporter for CopyExporter {
    async fn export(&self, artifact: &Path, target: &Path) -> anyhow::Result<()> {
        let bytes = tokio::fs::copy(artifact, target).await?;
        debug!("copied {} bytes to {}", bytes, target.display());
        Ok(())
    }
}

/// Runs the exporter once per successful session.
#[derive(Clone)]
pub struct ExportStep {
    exporter: Arc<dyn AssetExporter>,
    export_name: String,
}

impl ExportStep {
    pub fn new(exporter: Arc<dyn AssetExporter>, export_name: impl Into<String>) -> Self {
        Self {
            exporter,
            export_name: export_name.into(),
        }
    }

    pub fn exporter(&self) -> Arc<dyn AssetExporter> {
        Arc::clone(&self.exporter)
    }

    /// Export `artifact` into `destination_dir`, creating the folder if it is
    /// absent. Overwrites a previous export. Returns the written path.
    pub async fn run(&self, artifact: &Path, destination_dir: &Path) -> Result<PathBuf, ExportError> {
        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(ExportError::MissingArtifact(artifact.to_path_buf()));
        }

        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(|source| ExportError::Io {
                path: destination_dir.to_path_buf(),
                source,
            })?;

        let target = destination_dir.join(&self.export_name);
        self.exporter
            .export(artifact, &target)
            .await
            .map_err(ExportError::Exporter)?;

        info!("exported {} to {}", artifact.display(), target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingExporter;

    #[async_trait]
    impl AssetExporter for FailingExporter {
        async fn export(&self, _artifact: &Path, _target: &Path) -> anyhow::Result<()> {
            anyhow::bail!("unsupported texture layout")
        }
    }

    #[tokio::test]
    async fn test_copy_export_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("out.usdz");
        std::fs::write(&artifact, b"model").unwrap();

        let step = ExportStep::new(Arc::new(CopyExporter), "out.obj");
        let written = step.run(&artifact, &dir.path().join("model")).await.unwrap();

        assert_eq!(written, dir.path().join("model").join("out.obj"));
        assert_eq!(std::fs::read(&written).unwrap(), b"model");
    }

    #[tokio::test]
    async fn test_rerun_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("out.usdz");
        let step = ExportStep::new(Arc::new(CopyExporter), "out.obj");

        std::fs::write(&artifact, b"first").unwrap();
        step.run(&artifact, &dir.path().join("model")).await.unwrap();
        std::fs::write(&artifact, b"second").unwrap();
        let written = step.run(&artifact, &dir.path().join("model")).await.unwrap();

        assert_eq!(std::fs::read(&written).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let step = ExportStep::new(Arc::new(CopyExporter), "out.obj");

        let err = step
            .run(&dir.path().join("out.usdz"), &dir.path().join("model"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::MissingArtifact(_)));
        assert!(!dir.path().join("model").exists());
    }

    #[tokio::test]
    async fn test_exporter_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("out.usdz");
        std::fs::write(&artifact, b"model").unwrap();

        let step = ExportStep::new(Arc::new(FailingExporter), "out.obj");
        let err = step.run(&artifact, &dir.path().join("model")).await.unwrap_err();

        assert!(matches!(err, ExportError::Exporter(_)));
        assert!(err.to_string().contains("exporter failed"));
    }
}
