// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::episode::Episode;
use super::time;
use crate::error::SpecError;

pub const DEFAULT_CRF: u32 = 28;
pub const DEFAULT_ABR: &str = "128k";
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";
/// Storage class of encoded episodes when `outputStorageClass` is blank
pub const DEFAULT_ARTIFACT_STORAGE_CLASS: &str = "INTELLIGENT_TIERING";

/// The whole podcast specification document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodcastSpec {
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        with = "time::pub_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_build_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl PodcastSpec {
    pub fn episode(&self, uid: u64) -> Option<&Episode> {
        self.episodes.iter().find(|episode| episode.uid == uid)
    }

    pub fn episode_mut(&mut self, uid: u64) -> Option<&mut Episode> {
        self.episodes.iter_mut().find(|episode| episode.uid == uid)
    }
}

/// Where things live: local staging and the object store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_pod_image: String,
    #[serde(default)]
    pub local_storage_dir: String,
    #[serde(default)]
    pub storage: Storage,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Config {
    /// Local staging directory with a leading `~/` expanded
    pub fn local_storage_path(&self) -> Result<PathBuf, SpecError> {
        expand_home(&self.local_storage_dir)
    }
}

/// Object store endpoint and bucket names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// `http(s)://` URL of a bucket endpoint, or a directory path
    #[serde(default)]
    pub endpoint: String,
    /// Bucket holding masters and artwork
    #[serde(default)]
    pub input: String,
    /// Bucket receiving published artifacts
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_storage_class: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Storage {
    /// Storage class for encoded episodes
    pub fn artifact_storage_class(&self) -> &str {
        match self.output_storage_class.trim() {
            "" => DEFAULT_ARTIFACT_STORAGE_CLASS,
            class => class,
        }
    }
}

/// Encoder settings shared by all episodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    #[serde(default)]
    pub preferred_format: String,
    #[serde(default)]
    pub bitrate: String,
    #[serde(rename = "lamepath", default)]
    pub lame_path: String,
    #[serde(rename = "ffmpegpath", default)]
    pub ffmpeg_path: String,
    #[serde(rename = "ffprobepath", default)]
    pub ffprobe_path: String,
    #[serde(default)]
    pub crf: u32,
    #[serde(default)]
    pub abr: String,
    /// Input-store key of the front cover image
    #[serde(rename = "coverfront", default)]
    pub cover_front: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "AudioFromVideo::is_default")]
    pub audio_from_video: AudioFromVideo,
    #[serde(default, skip_serializing_if = "CommandTemplates::is_empty")]
    pub commands: CommandTemplates,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Encoding {
    /// Fill in values the document may leave out
    pub fn apply_defaults(&mut self) {
        if self.crf == 0 {
            self.crf = DEFAULT_CRF;
        }
        if self.abr.trim().is_empty() {
            self.abr = DEFAULT_ABR.to_string();
        }
        fill_blank(&mut self.lame_path, "lame");
        fill_blank(&mut self.ffmpeg_path, "ffmpeg");
        fill_blank(&mut self.ffprobe_path, "ffprobe");
    }
}

/// How to treat an "audio" episode whose master is a video when the
/// preferred format is not a container audio format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFromVideo {
    /// Extract the soundtrack with ffmpeg and pipe it through the MP3 encoder
    #[default]
    Transcode,
    /// Hand the master straight to the MP3 encoder
    Direct,
}

impl AudioFromVideo {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Optional replacements for the built-in command templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mp3_direct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mp3_transcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_audio: Option<String>,
}

impl CommandTemplates {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn fill_blank(slot: &mut String, value: &str) {
    if slot.trim().is_empty() {
        *slot = value.to_string();
    }
}

fn expand_home(path: &str) -> Result<PathBuf, SpecError> {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| SpecError::HomeDirectoryUnavailable {
            path: path.to_string(),
        })?;
        let rest = path.trim_start_matches('~').trim_start_matches('/');
        return Ok(if rest.is_empty() { home } else { home.join(rest) });
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifacts_default_to_intelligent_tiering() {
        let mut storage = Storage::default();
        assert_eq!(storage.artifact_storage_class(), "INTELLIGENT_TIERING");

        storage.output_storage_class = "STANDARD_IA".to_string();
        assert_eq!(storage.artifact_storage_class(), "STANDARD_IA");
    }

    #[test]
    fn defaults_fill_blank_encoding_settings() {
        let mut encoding = Encoding {
            ffmpeg_path: "/opt/ffmpeg/bin/ffmpeg".to_string(),
            ..Default::default()
        };
        encoding.apply_defaults();

        assert_eq!(encoding.crf, 28);
        assert_eq!(encoding.abr, "128k");
        assert_eq!(encoding.lame_path, "lame");
        assert_eq!(encoding.ffprobe_path, "ffprobe");
        assert_eq!(encoding.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    }

    #[test]
    fn defaults_keep_explicit_values() {
        let mut encoding = Encoding {
            crf: 18,
            abr: "96k".to_string(),
            ..Default::default()
        };
        encoding.apply_defaults();

        assert_eq!(encoding.crf, 18);
        assert_eq!(encoding.abr, "96k");
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_home("~/podcast").unwrap(), home.join("podcast"));
        assert_eq!(expand_home("~").unwrap(), home);
        assert_eq!(
            expand_home("/srv/podcast").unwrap(),
            PathBuf::from("/srv/podcast")
        );
    }

    #[test]
    fn audio_from_video_parses_lowercase() {
        let encoding: Encoding = serde_yaml::from_str("audioFromVideo: direct").unwrap();
        assert_eq!(encoding.audio_from_video, AudioFromVideo::Direct);
    }

    #[test]
    fn finds_episodes_by_uid() {
        let spec = PodcastSpec {
            episodes: vec![
                Episode {
                    uid: 1,
                    ..Default::default()
                },
                Episode {
                    uid: 4,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert!(spec.episode(4).is_some());
        assert!(spec.episode(2).is_none());
    }
}
