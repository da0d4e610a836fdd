// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::podcast::PodcastSpec;
use crate::error::SpecError;

pub const DEFAULT_SPEC_FILE: &str = "podspec.yaml";

/// Whole-document persistence of the podcast specification
pub trait SpecStore {
    fn load(&self) -> Result<PodcastSpec, SpecError>;

    /// Persist the document, stamping its last build date
    fn save(&self, spec: &mut PodcastSpec) -> Result<(), SpecError>;
}

/// Specification stored as a single YAML file
#[derive(Debug, Clone)]
pub struct YamlSpecStore {
    path: PathBuf,
}

impl YamlSpecStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SpecStore for YamlSpecStore {
    fn load(&self) -> Result<PodcastSpec, SpecError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| SpecError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;

        let mut spec: PodcastSpec =
            serde_yaml::from_str(&content).map_err(|e| SpecError::ParseFailed {
                path: self.path.clone(),
                source: e,
            })?;
        spec.encoding.apply_defaults();

        debug!(path = %self.path.display(), episodes = spec.episodes.len(), "loaded specification");
        Ok(spec)
    }

    fn save(&self, spec: &mut PodcastSpec) -> Result<(), SpecError> {
        spec.last_build_date = Some(Utc::now().fixed_offset());
        let yaml = serde_yaml::to_string(spec)?;

        // Write next to the target and rename so readers never see half a file
        let temp = self.temp_path();
        std::fs::write(&temp, yaml).map_err(|e| SpecError::WriteFailed {
            path: temp.clone(),
            source: e,
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| SpecError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), "saved specification");
        Ok(())
    }
}
