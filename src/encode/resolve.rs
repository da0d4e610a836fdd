// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::error::UnsupportedFormat;
use crate::spec::AudioFromVideo;

/// The encoder chains an episode can be routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// H.264/AAC MP4 from a video master
    ToVideoContainer,
    /// Soundtrack extracted to PCM and piped into the MP3 encoder
    ToCompressedAudioViaTranscode,
    /// Master handed straight to the MP3 encoder
    ToCompressedAudioDirect,
    /// AAC in an MPEG-4 audio container with cover art and chapters
    ToContainerAudio,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineKind::ToVideoContainer => "video container",
            PipelineKind::ToCompressedAudioViaTranscode => "compressed audio via transcode",
            PipelineKind::ToCompressedAudioDirect => "compressed audio",
            PipelineKind::ToContainerAudio => "container audio",
        };
        f.write_str(name)
    }
}

/// A resolved pipeline together with the file extension it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub kind: PipelineKind,
    pub extension: String,
}

fn is_container_audio(format: &str) -> bool {
    matches!(format, "m4a" | "m4b")
}

fn normalize(format: &str) -> String {
    format.trim().to_ascii_lowercase()
}

/// Map the input content class, declared episode format and preferred
/// output format to a pipeline.
pub fn resolve(
    input_is_video: bool,
    declared_format: &str,
    preferred_format: &str,
) -> Result<PipelineKind, UnsupportedFormat> {
    resolve_with(
        input_is_video,
        declared_format,
        preferred_format,
        AudioFromVideo::default(),
    )
}

/// Like [`resolve`], with an explicit choice for audio episodes cut from a
/// video master when the preferred format is not container audio.
pub fn resolve_with(
    input_is_video: bool,
    declared_format: &str,
    preferred_format: &str,
    audio_from_video: AudioFromVideo,
) -> Result<PipelineKind, UnsupportedFormat> {
    let declared = normalize(declared_format);
    let preferred_is_container = is_container_audio(&normalize(preferred_format));

    let kind = match (input_is_video, declared.as_str()) {
        (true, "" | "video" | "mp4") => PipelineKind::ToVideoContainer,
        (true, "audio") if preferred_is_container => PipelineKind::ToContainerAudio,
        (true, "audio") => match audio_from_video {
            AudioFromVideo::Transcode => PipelineKind::ToCompressedAudioViaTranscode,
            AudioFromVideo::Direct => PipelineKind::ToCompressedAudioDirect,
        },
        (true, "mp3") => PipelineKind::ToCompressedAudioViaTranscode,
        (false, "" | "audio") if preferred_is_container => PipelineKind::ToContainerAudio,
        (false, "" | "audio") => PipelineKind::ToCompressedAudioDirect,
        (false, "mp3") => PipelineKind::ToCompressedAudioDirect,
        (_, "m4a" | "m4b") => PipelineKind::ToContainerAudio,
        _ => {
            return Err(UnsupportedFormat {
                format: declared_format.to_string(),
            });
        }
    };

    Ok(kind)
}

/// File extension produced for an episode routed through `kind`
pub fn target_extension(kind: PipelineKind, declared_format: &str, preferred_format: &str) -> String {
    match kind {
        PipelineKind::ToVideoContainer => "mp4".to_string(),
        PipelineKind::ToCompressedAudioViaTranscode | PipelineKind::ToCompressedAudioDirect => {
            "mp3".to_string()
        }
        PipelineKind::ToContainerAudio => {
            let declared = normalize(declared_format);
            if is_container_audio(&declared) {
                declared
            } else {
                normalize(preferred_format)
            }
        }
    }
}

/// Resolve the pipeline and its output extension in one step
pub fn resolve_target(
    input_is_video: bool,
    declared_format: &str,
    preferred_format: &str,
    audio_from_video: AudioFromVideo,
) -> Result<Resolution, UnsupportedFormat> {
    let kind = resolve_with(
        input_is_video,
        declared_format,
        preferred_format,
        audio_from_video,
    )?;
    Ok(Resolution {
        kind,
        extension: target_extension(kind, declared_format, preferred_format),
    })
}
