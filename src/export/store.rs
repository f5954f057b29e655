//! Artifact storage backends

use super::artifact::{decode, encode, ModelArtifact};
use crate::error::{PipelineError, Result};
use crate::training::ModelKind;
use crate::utils::atomic_write;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keyed storage for fitted models, one entry per (kind, fold)
pub trait ArtifactStore {
    /// Persist `artifact`, replacing any entry with the same key
    fn save(&mut self, artifact: &ModelArtifact) -> Result<()>;

    /// All artifacts of `kind` ordered by fold index.
    ///
    /// Fails with [`PipelineError::ArtifactsNotFound`] when none exist.
    fn load(&self, kind: ModelKind) -> Result<Vec<ModelArtifact>>;

    /// Stored fold indices of `kind`, ascending
    fn folds(&self, kind: ModelKind) -> Result<Vec<usize>>;

    /// Remove artifacts of `kind` whose fold index exceeds `n_folds`,
    /// returning how many were removed
    fn retain_folds(&mut self, kind: ModelKind, n_folds: usize) -> Result<usize>;
}

/// File-system store laid out as `<root>/<kind>/<kind>_fold<k>.bin`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: ModelKind) -> PathBuf {
        self.root.join(kind.name())
    }

    pub fn path_for(&self, kind: ModelKind, fold: usize) -> PathBuf {
        self.kind_dir(kind).join(format!("{}_fold{}.bin", kind.name(), fold))
    }

    /// Fold index encoded in a file name, `None` for foreign files
    fn parse_fold(kind: ModelKind, file_name: &str) -> Option<usize> {
        file_name
            .strip_prefix(kind.name())?
            .strip_prefix("_fold")?
            .strip_suffix(".bin")?
            .parse()
            .ok()
    }
}

impl ArtifactStore for DirectoryStore {
    fn save(&mut self, artifact: &ModelArtifact) -> Result<()> {
        let path = self.path_for(artifact.kind, artifact.fold);
        atomic_write(&path, &encode(artifact)?)?;
        debug!(path = %path.display(), "saved artifact");
        Ok(())
    }

    fn load(&self, kind: ModelKind) -> Result<Vec<ModelArtifact>> {
        let folds = self.folds(kind)?;
        if folds.is_empty() {
            return Err(PipelineError::ArtifactsNotFound(kind.to_string()));
        }

        folds
            .into_iter()
            .map(|fold| {
                let path = self.path_for(kind, fold);
                let artifact = decode(&fs::read(&path)?, &path)?;
                if artifact.kind != kind || artifact.fold != fold {
                    return Err(PipelineError::CorruptArtifact {
                        path,
                        reason: format!(
                            "file holds {} fold {}",
                            artifact.kind, artifact.fold
                        ),
                    });
                }
                Ok(artifact)
            })
            .collect()
    }

    fn folds(&self, kind: ModelKind) -> Result<Vec<usize>> {
        let dir = self.kind_dir(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut folds = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(fold) = entry.file_name().to_str().and_then(|n| Self::parse_fold(kind, n)) {
                folds.push(fold);
            }
        }
        // Numeric order: fold 10 sorts after fold 9
        folds.sort_unstable();
        Ok(folds)
    }

    fn retain_folds(&mut self, kind: ModelKind, n_folds: usize) -> Result<usize> {
        let mut removed = 0;
        for fold in self.folds(kind)?.into_iter().filter(|&f| f > n_folds) {
            let path = self.path_for(kind, fold);
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed stale artifact");
            removed += 1;
        }
        Ok(removed)
    }
}

/// In-memory store with the same keying as [`DirectoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    artifacts: BTreeMap<(ModelKind, usize), ModelArtifact>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn save(&mut self, artifact: &ModelArtifact) -> Result<()> {
        self.artifacts
            .insert((artifact.kind, artifact.fold), artifact.clone());
        Ok(())
    }

    fn load(&self, kind: ModelKind) -> Result<Vec<ModelArtifact>> {
        let artifacts: Vec<ModelArtifact> = self
            .artifacts
            .range((kind, 0)..=(kind, usize::MAX))
            .map(|(_, a)| a.clone())
            .collect();
        if artifacts.is_empty() {
            return Err(PipelineError::ArtifactsNotFound(kind.to_string()));
        }
        Ok(artifacts)
    }

    fn folds(&self, kind: ModelKind) -> Result<Vec<usize>> {
        Ok(self
            .artifacts
            .range((kind, 0)..=(kind, usize::MAX))
            .map(|((_, fold), _)| *fold)
            .collect())
    }

    fn retain_folds(&mut self, kind: ModelKind, n_folds: usize) -> Result<usize> {
        let before = self.artifacts.len();
        self.artifacts
            .retain(|(k, fold), _| *k != kind || *fold <= n_folds);
        Ok(before - self.artifacts.len())
    }
}
