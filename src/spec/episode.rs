// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::podcast::Encoding;
use super::time::{self, EpisodeDuration};

/// Outputs shorter than this are treated as "not yet encoded"
const MIN_OUTPUT_LEN: usize = 3;

/// A single episode as declared in the specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    #[serde(default)]
    pub uid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        with = "time::pub_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub pub_date: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(default)]
    pub duration: EpisodeDuration,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// MIME type of the published artifact
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    /// Byte size of the published artifact
    #[serde(default)]
    pub length: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    /// Free-form target format hint (`video`, `audio`, `mp3`, `m4a`, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encoding_language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<Chapter>,
    /// Keys this crate does not interpret, kept for the round trip
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A chapter mark inside an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    #[serde(with = "time::offset")]
    pub start: Duration,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start: Duration) -> Self {
        Self {
            title: title.into(),
            start,
        }
    }
}

impl Episode {
    /// Whether the episode still lacks a produced artifact
    pub fn needs_encoding(&self) -> bool {
        self.output.chars().count() < MIN_OUTPUT_LEN
    }

    pub fn needs_length(&self) -> bool {
        self.length < 1
    }

    pub fn needs_duration(&self) -> bool {
        !self.duration.is_resolved()
    }

    /// Encoding language, honouring the per-episode override
    pub fn language<'a>(&'a self, encoding: &'a Encoding) -> &'a str {
        if self.encoding_language.trim().is_empty() {
            &encoding.language
        } else {
            &self.encoding_language
        }
    }

    /// Subtitle flattened to a single line, as used in media tags
    pub fn single_line_subtitle(&self) -> String {
        self.subtitle
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Year of publication, if known
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.pub_date.map(|date| date.year())
    }
}
