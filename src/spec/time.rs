// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Textual time formats used in the specification document: publication
//! dates (RFC 2822), episode durations (`HH:MM:SS`) and chapter offsets
//! (`HH:MM:SS.mmm`).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Words that stand in for "fill this in for me"
const NOW_WORDS: &[&str] = &["", "now", "today"];
const GENERATE_WORDS: &[&str] = &["", "gen", "generate", "parse"];

/// Parse a publication date. `""`, `now` and `today` yield `None`, which the
/// validator later back-fills with the current time.
pub fn parse_pub_date(value: &str) -> Result<Option<DateTime<FixedOffset>>, String> {
    let value = value.trim();
    if NOW_WORDS.contains(&value.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }

    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(Some)
        .map_err(|e| format!("invalid date '{value}': {e}"))
}

/// Serde adapter for optional RFC 2822 timestamps
pub mod pub_date {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.to_rfc2822()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(text) => parse_pub_date(&text).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Playing time of an episode with whole-second resolution.
///
/// Anything shorter than one second counts as "not yet determined".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct EpisodeDuration(Duration);

impl EpisodeDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Truncates to whole seconds
    pub fn from_duration(duration: Duration) -> Self {
        Self(Duration::from_secs(duration.as_secs()))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_resolved(&self) -> bool {
        self.0.as_secs() >= 1
    }
}

impl fmt::Display for EpisodeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        write!(
            f,
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }
}

impl FromStr for EpisodeDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if GENERATE_WORDS.contains(&s.to_ascii_lowercase().as_str()) {
            return Ok(Self::default());
        }
        let offset = parse_offset(s)?;
        Ok(Self::from_duration(offset))
    }
}

impl Serialize for EpisodeDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EpisodeDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(text) => text.parse().map_err(serde::de::Error::custom),
            None => Ok(Self::default()),
        }
    }
}

/// Parse `[[HH:]MM:]SS[.fff]` into a duration.
pub fn parse_offset(value: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid time offset '{value}', expected HH:MM:SS[.mmm]");

    let (clock, fraction) = match value.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (value, None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }

    let mut secs: u64 = 0;
    for (index, part) in parts.iter().enumerate() {
        let number: u64 = part.trim().parse().map_err(|_| invalid())?;
        // Every component but the leading one is bounded by 60
        if index > 0 && number >= 60 {
            return Err(invalid());
        }
        secs = secs
            .checked_mul(60)
            .and_then(|secs| secs.checked_add(number))
            .ok_or_else(invalid)?;
    }

    let millis = match fraction {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            // Scale to milliseconds: ".5" is 500ms, ".1234" is 123ms
            let padded = format!("{digits:0<3}");
            padded[..3].parse::<u64>().map_err(|_| invalid())?
        }
        Some(_) => return Err(invalid()),
        None => 0,
    };

    Ok(Duration::new(secs, (millis * 1_000_000) as u32))
}

/// Format a duration as `HH:MM:SS.mmm`
pub fn format_offset(offset: Duration) -> String {
    let total = offset.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        offset.subsec_millis()
    )
}

/// Serde adapter for chapter offsets
pub mod offset {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_offset(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_offset(raw.trim()).map_err(serde::de::Error::custom)
    }
}
