// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::naming::output_name;
use super::resolve::PipelineKind;
use super::tag::write_id3;
use super::template::{TemplateValues, render};
use super::tool::{Invocation, SharedTool};
use crate::error::EncodeError;
use crate::media::{MediaInfo, MediaProbe, ffmetadata};
use crate::mutation::{Field, Mutations};
use crate::spec::{CommandTemplates, Episode, EpisodeDuration, PodcastSpec};

pub const VIDEO_TEMPLATE: &str = "{{ffmpeg}} -y -i {{input}} -pix_fmt yuv420p -colorspace bt709 \
    -color_trc bt709 -color_primaries bt709 -color_range tv -c:v libx264 -profile:v high \
    -crf {{crf}} -maxrate 1M -bufsize 2M -preset medium -coder 1 -movflags +faststart \
    -x264-params open-gop=0 -c:a libfdk_aac -profile:a aac_low -b:a {{abr}} {{output}}";

pub const MP3_DIRECT_TEMPLATE: &str = "{{lame}} -b {{bitrate}} {{input}} {{output}}";

pub const MP3_TRANSCODE_TEMPLATE: &str = "{{ffmpeg}} -y -i {{input}} -vn -f wav -c:a pcm_s16le \
    -ac 2 pipe: | {{lame}} -b {{bitrate}} --add-id3v2 --tv TLAN={{language}} --tt {{title}} \
    --ta {{author}} --tl {{album}} --ty {{year}} --tc {{subtitle}} --tn {{track}} \
    --tg {{genre}} --ti {{cover}} --tv WOAR={{link}} - {{output}}";

pub const CONTAINER_AUDIO_TEMPLATE: &str = "{{ffmpeg}} -y -i {{input}} -i {{cover}} \
    -i {{metadata}} -map 0:a -c:a libfdk_aac -profile:a aac_low -b:a {{abr}} \
    -metadata:s:a:0 language={{language}} -map 1:v -c:v mjpeg -disposition:v:0 attached_pic \
    -metadata:s:v title=Cover -metadata:s:v comment='Cover (front)' -map_metadata 2 \
    -map_chapters 2 -movflags faststart {{output}}";

/// The built-in command line for a pipeline
pub fn default_template(kind: PipelineKind) -> &'static str {
    match kind {
        PipelineKind::ToVideoContainer => VIDEO_TEMPLATE,
        PipelineKind::ToCompressedAudioDirect => MP3_DIRECT_TEMPLATE,
        PipelineKind::ToCompressedAudioViaTranscode => MP3_TRANSCODE_TEMPLATE,
        PipelineKind::ToContainerAudio => CONTAINER_AUDIO_TEMPLATE,
    }
}

/// The configured command line for a pipeline, falling back to the default
pub fn template_for(kind: PipelineKind, overrides: &CommandTemplates) -> &str {
    let configured = match kind {
        PipelineKind::ToVideoContainer => overrides.video.as_deref(),
        PipelineKind::ToCompressedAudioDirect => overrides.mp3_direct.as_deref(),
        PipelineKind::ToCompressedAudioViaTranscode => overrides.mp3_transcode.as_deref(),
        PipelineKind::ToContainerAudio => overrides.container_audio.as_deref(),
    };
    configured
        .filter(|template| !template.trim().is_empty())
        .unwrap_or_else(|| default_template(kind))
}

/// What an encoder run produced
#[derive(Debug)]
pub struct EncodeOutcome {
    pub kind: PipelineKind,
    pub output_path: PathBuf,
    pub info: MediaInfo,
    pub mutations: Mutations,
}

/// Runs one of the encoder pipelines inside the local staging directory
pub struct Encoder {
    tool: SharedTool,
    probe: MediaProbe,
    work_dir: PathBuf,
}

impl Encoder {
    pub fn new(tool: SharedTool, ffprobe: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            probe: MediaProbe::new(tool.clone(), ffprobe),
            tool,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Encode `episode`'s master through `kind`, writing an artifact with
    /// the given extension, then probe it.
    ///
    /// On success the episode's output, length and duration are updated and
    /// the changes are returned as a journal. On failure the episode is left
    /// untouched.
    pub async fn run(
        &self,
        kind: PipelineKind,
        extension: &str,
        spec: &PodcastSpec,
        episode: &mut Episode,
    ) -> Result<EncodeOutcome, EncodeError> {
        let output = output_name(&episode.input, extension)?;
        let input_path = self.work_dir.join(&episode.input);
        let output_path = self.work_dir.join(&output);
        let cover_path = self.work_dir.join(&spec.encoding.cover_front);

        remove_stale(&output_path).await?;

        let mut values =
            self.template_values(spec, episode, &input_path, &output_path, &cover_path);
        let template = template_for(kind, &spec.encoding.commands);

        info!(uid = episode.uid, pipeline = %kind, output = %output, "encoding");

        let info = match kind {
            PipelineKind::ToContainerAudio => {
                self.encode_container_audio(
                    template,
                    &mut values,
                    spec,
                    episode,
                    &input_path,
                    &output_path,
                )
                .await?
            }
            PipelineKind::ToCompressedAudioDirect | PipelineKind::ToCompressedAudioViaTranscode => {
                self.execute(template, &values, &output_path).await?;
                let untagged = self.probe.probe(&output_path).await?;
                let cover = (!spec.encoding.cover_front.is_empty()).then_some(cover_path);
                tag_in_background(&output_path, spec, episode, cover, untagged.duration).await?;
                self.probe.probe(&output_path).await?
            }
            PipelineKind::ToVideoContainer => {
                self.execute(template, &values, &output_path).await?;
                self.probe.probe(&output_path).await?
            }
        };

        let uid = episode.uid;
        let mut mutations = Mutations::new();
        mutations.assign(uid, Field::Output, &mut episode.output, output);
        mutations.assign(uid, Field::Length, &mut episode.length, info.size);
        mutations.assign(
            uid,
            Field::Duration,
            &mut episode.duration,
            EpisodeDuration::from_duration(info.duration),
        );

        info!(
            uid,
            size = info.size,
            duration = %episode.duration,
            "encoded"
        );

        Ok(EncodeOutcome {
            kind,
            output_path,
            info,
            mutations,
        })
    }

    async fn encode_container_audio(
        &self,
        template: &str,
        values: &mut TemplateValues,
        spec: &PodcastSpec,
        episode: &Episode,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<MediaInfo, EncodeError> {
        // Chapter ends need the playing time of the master
        let master = self.probe.probe_external(input_path).await?;

        let metadata_path = sidecar_path(output_path);
        tokio::fs::write(&metadata_path, ffmetadata(spec, episode, master.duration))
            .await
            .map_err(|e| EncodeError::MetadataWriteFailed {
                path: metadata_path.clone(),
                source: e,
            })?;
        values.set("metadata", metadata_path.to_string_lossy());

        let result = self.execute(template, values, output_path).await;
        if let Err(e) = tokio::fs::remove_file(&metadata_path).await {
            warn!(path = %metadata_path.display(), error = %e, "could not remove metadata file");
        }
        result?;

        Ok(self.probe.probe(output_path).await?)
    }

    async fn execute(
        &self,
        template: &str,
        values: &TemplateValues,
        output_path: &Path,
    ) -> Result<(), EncodeError> {
        let command_line = render(template, values)?;
        let invocation = Invocation::new(command_line, &self.work_dir).producing(output_path);
        self.tool.run(&invocation).await?;

        if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
            return Err(EncodeError::MissingOutput {
                path: output_path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn template_values(
        &self,
        spec: &PodcastSpec,
        episode: &Episode,
        input_path: &Path,
        output_path: &Path,
        cover_path: &Path,
    ) -> TemplateValues {
        let encoding = &spec.encoding;
        let mut values = TemplateValues::new();
        values
            .set("ffmpeg", encoding.ffmpeg_path.as_str())
            .set("lame", encoding.lame_path.as_str())
            .set("bitrate", encoding.bitrate.as_str())
            .set("crf", encoding.crf.to_string())
            .set("abr", encoding.abr.as_str())
            .set("genre", encoding.genre.as_str())
            .set("language", episode.language(encoding))
            .set("input", input_path.to_string_lossy())
            .set("output", output_path.to_string_lossy())
            .set("cover", cover_path.to_string_lossy())
            .set("title", episode.title.as_str())
            .set("author", episode.author.as_str())
            .set("album", spec.title.as_str())
            .set("subtitle", episode.single_line_subtitle())
            .set("track", episode.uid.to_string())
            .set("link", episode.link.as_str())
            .set(
                "year",
                episode.year().map(|y| y.to_string()).unwrap_or_default(),
            );
        values
    }
}

fn sidecar_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".ffmetadata");
    output_path.with_file_name(name)
}

/// Tag on the blocking pool; id3 reads and rewrites the whole file
async fn tag_in_background(
    path: &Path,
    spec: &PodcastSpec,
    episode: &Episode,
    cover: Option<PathBuf>,
    total: Duration,
) -> Result<(), EncodeError> {
    let owned = path.to_path_buf();
    let spec = spec.clone();
    let episode = episode.clone();
    tokio::task::spawn_blocking(move || {
        write_id3(&owned, &spec, &episode, cover.as_deref(), total)
    })
    .await
    .map_err(|e| EncodeError::TagInterrupted {
        path: path.to_path_buf(),
        source: e,
    })?
}

async fn remove_stale(path: &Path) -> Result<(), EncodeError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EncodeError::StaleOutput {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
