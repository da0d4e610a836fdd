// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod episode;
mod file;
mod podcast;
pub mod time;
mod validate;

pub use episode::{Chapter, Episode};
pub use file::{DEFAULT_SPEC_FILE, SpecStore, YamlSpecStore};
pub use podcast::{
    AudioFromVideo, CommandTemplates, Config, DEFAULT_ABR, DEFAULT_ARTIFACT_STORAGE_CLASS,
    DEFAULT_CRF, DEFAULT_STORAGE_CLASS, Encoding, PodcastSpec, Storage,
};
pub use time::EpisodeDuration;
pub use validate::{check_executables, resolve_executable, validate};
