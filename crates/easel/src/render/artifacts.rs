// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Temporary home of a run's chart files until the deck has embedded them.

use crate::error::{RenderError, RenderResult};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Run-scoped store for chart files. The deck reads its charts from here,
/// and everything it holds is removed when the scope is dropped.
#[derive(Debug)]
pub struct ArtifactScope {
    /// Backing temporary directory.
    dir: TempDir,
    /// Files written so far, in order.
    artifacts: Vec<PathBuf>,
    /// Charts that fell back to a placeholder.
    placeholders: usize,
}

impl ArtifactScope {
    /// Fresh, empty directory under the system temp dir.
    pub fn new() -> RenderResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("easel-charts-")
            .tempdir()
            .map_err(|source| RenderError::Artifact {
                path: std::env::temp_dir().display().to_string(),
                source,
            })?;
        debug!(dir = %dir.path().display(), "Opened chart artifact scope");
        Ok(Self {
            dir,
            artifacts: Vec::new(),
            placeholders: 0,
        })
    }

    /// Directory holding the artifacts.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Written files, in order.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Placeholder count.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Counts one more placeholder.
    pub(crate) fn record_placeholder(&mut self) {
        self.placeholders += 1;
    }

    /// Writes `contents` as the next numbered artifact.
    pub fn store(&mut self, label: &str, contents: &str) -> RenderResult<PathBuf> {
        let path = self
            .dir
            .path()
            .join(format!("chart_{}_{}.svg", self.artifacts.len(), label));
        fs::write(&path, contents).map_err(|source| RenderError::Artifact {
            path: path.display().to_string(),
            source,
        })?;
        self.artifacts.push(path.clone());
        Ok(path)
    }

    /// Copies every artifact into `destination`, which is created if needed.
    pub fn export(&self, destination: &Path) -> RenderResult<Vec<PathBuf>> {
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source: std::io::Error| RenderError::Artifact { path, source }
        };
        fs::create_dir_all(destination).map_err(io_err(destination))?;
        let mut exported = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let Some(name) = artifact.file_name() else {
                continue;
            };
            let target = destination.join(name);
            fs::copy(artifact, &target).map_err(io_err(&target))?;
            exported.push(target);
        }
        Ok(exported)
    }

    /// Removes the directory now and reports failures instead of ignoring them.
    pub fn close(self) -> RenderResult<()> {
        let path = self.dir.path().display().to_string();
        self.dir
            .close()
            .map_err(|source| RenderError::Artifact { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifacts_are_removed_on_drop() {
        let mut scope = ArtifactScope::new().unwrap();
        let path = scope.store("bar", "<svg/>").unwrap();
        let dir = scope.path().to_path_buf();
        assert!(path.exists());
        drop(scope);
        assert!(!path.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn export_copies_into_destination() {
        let mut scope = ArtifactScope::new().unwrap();
        scope.store("pie", "<svg/>").unwrap();
        let out = tempfile::tempdir().unwrap();
        let exported = scope.export(&out.path().join("charts")).unwrap();
        assert_eq!(exported.len(), 1);
        assert!(exported[0].ends_with("chart_0_pie.svg"));
        scope.close().unwrap();
        assert!(exported[0].exists());
    }
}
