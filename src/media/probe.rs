// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::time::Duration;

use lofty::config::ParseOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use serde::Deserialize;
use tracing::debug;

use super::mp4;
use crate::encode::{Invocation, SharedTool, TemplateValues, render};
use crate::error::ProbeError;

/// Command used when neither built-in reader applies
pub const FFPROBE_TEMPLATE: &str = "{{ffprobe}} -v error -show_format -print_format json {{input}}";

/// Size and playing time of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub size: u64,
    pub duration: Duration,
}

/// Which reader a file is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reader {
    Mp4Container,
    CompressedAudio,
    External,
}

/// Extracts duration and size from media files
pub struct MediaProbe {
    tool: SharedTool,
    ffprobe: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl MediaProbe {
    pub fn new(tool: SharedTool, ffprobe: impl Into<String>) -> Self {
        Self {
            tool,
            ffprobe: ffprobe.into(),
        }
    }

    /// Read duration and size of `path`, choosing a reader by extension or
    /// container signature
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let owned = path.to_path_buf();
        let read = tokio::task::spawn_blocking(move || read_builtin(&owned))
            .await
            .map_err(|e| ProbeError::Interrupted {
                path: path.to_path_buf(),
                source: e,
            })??;

        match read {
            Some(info) => {
                debug!(
                    path = %path.display(),
                    size = info.size,
                    duration_ms = info.duration.as_millis() as u64,
                    "probed"
                );
                Ok(info)
            }
            None => self.probe_external(path).await,
        }
    }

    /// Ask the external prober, whatever the file type
    pub async fn probe_external(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| ProbeError::Io {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();
        let working_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let values = TemplateValues::new()
            .with("ffprobe", self.ffprobe.clone())
            .with("input", path.to_string_lossy());
        let command_line = render(FFPROBE_TEMPLATE, &values)?;

        let stdout = self
            .tool
            .capture(&Invocation::new(command_line, working_dir))
            .await
            .map_err(|e| ProbeError::Prober {
                path: path.to_path_buf(),
                source: e,
            })?;

        let duration = parse_ffprobe_duration(path, &stdout)?;
        debug!(path = %path.display(), size, duration_ms = duration.as_millis() as u64, "probed with ffprobe");
        Ok(MediaInfo { size, duration })
    }
}

fn reader_for(path: &Path) -> Reader {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4a" | "m4b" | "m4v" | "mov" => Reader::Mp4Container,
        "mp3" => Reader::CompressedAudio,
        _ if mp4::has_ftyp_signature(path) => Reader::Mp4Container,
        _ => Reader::External,
    }
}

/// Blocking read with the built-in readers; `None` when only the external
/// prober can tell
fn read_builtin(path: &Path) -> Result<Option<MediaInfo>, ProbeError> {
    let size = file_size(path)?;
    let duration = match reader_for(path) {
        Reader::Mp4Container => mp4::movie_duration(path)?,
        Reader::CompressedAudio => compressed_audio_duration(path)?,
        Reader::External => return Ok(None),
    };
    Ok(Some(MediaInfo { size, duration }))
}

fn file_size(path: &Path) -> Result<u64, ProbeError> {
    std::fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|e| ProbeError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

fn compressed_audio_duration(path: &Path) -> Result<Duration, ProbeError> {
    let audio_error = |e| ProbeError::Audio {
        path: path.to_path_buf(),
        source: e,
    };
    let tagged_file = Probe::open(path)
        .map_err(audio_error)?
        .options(ParseOptions::new())
        .read()
        .map_err(audio_error)?;

    Ok(tagged_file.properties().duration())
}

fn parse_ffprobe_duration(path: &Path, stdout: &str) -> Result<Duration, ProbeError> {
    let output: FfprobeOutput =
        serde_json::from_str(stdout).map_err(|e| ProbeError::ProberOutput {
            path: path.to_path_buf(),
            source: e,
        })?;

    output
        .format
        .duration
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| ProbeError::MissingDuration {
            path: path.to_path_buf(),
        })
}
