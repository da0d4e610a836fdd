// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;

use super::podcast::{Encoding, PodcastSpec};
use crate::error::ValidationError;
use crate::mutation::{Field, Mutations};

/// Check the document before a publishing run and back-fill the fields that
/// have an obvious value (author, link). Publication dates are left to the
/// episodes that actually get published.
pub fn validate(spec: &mut PodcastSpec) -> Result<Mutations, ValidationError> {
    if spec.title.trim().is_empty() {
        return Err(ValidationError::MissingPodcastField { field: "title" });
    }
    if spec.description.trim().is_empty() {
        return Err(ValidationError::MissingPodcastField {
            field: "description",
        });
    }

    let mut mutations = Mutations::new();
    let mut seen = HashSet::new();

    for (index, episode) in spec.episodes.iter_mut().enumerate() {
        let uid = episode.uid;
        if uid == 0 {
            return Err(ValidationError::InvalidUid { index });
        }
        if !seen.insert(uid) {
            return Err(ValidationError::DuplicateUid { uid });
        }

        for (field, value) in [
            ("title", &episode.title),
            ("description", &episode.description),
            ("subtitle", &episode.subtitle),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingEpisodeField { uid, field });
            }
        }

        if episode.author.trim().is_empty() {
            if spec.author.trim().is_empty() {
                return Err(ValidationError::MissingEpisodeField {
                    uid,
                    field: "author",
                });
            }
            info!(uid, author = %spec.author, "using podcast author for episode");
            mutations.assign(uid, Field::Author, &mut episode.author, spec.author.clone());
        }

        if episode.link.trim().is_empty() && !spec.link.trim().is_empty() {
            mutations.assign(uid, Field::Link, &mut episode.link, spec.link.clone());
        }
    }

    Ok(mutations)
}

/// Make sure the configured encoder programs can be executed
pub fn check_executables(encoding: &Encoding) -> Result<(), ValidationError> {
    for (name, path) in [
        ("lame", &encoding.lame_path),
        ("ffmpeg", &encoding.ffmpeg_path),
        ("ffprobe", &encoding.ffprobe_path),
    ] {
        if resolve_executable(path).is_none() {
            return Err(ValidationError::Executable {
                name,
                path: path.clone(),
            });
        }
    }
    Ok(())
}

/// Locate an executable: paths are checked directly, bare names are looked
/// up on `PATH`
pub fn resolve_executable(program: &str) -> Option<PathBuf> {
    if program.trim().is_empty() {
        return None;
    }

    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
