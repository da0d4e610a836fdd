// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::confirm::SharedConfirm;
use crate::encode::{Encoder, SharedTool, resolve_target};
use crate::error::{EncodeError, EpisodeError, PublishError, ValidationError};
use crate::media::{self, MediaProbe};
use crate::mutation::{Field, Mutations};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::spec::{Episode, EpisodeDuration, PodcastSpec, check_executables, validate};
use crate::state::{Selection, create_publish_plan};
use crate::store::SharedStore;
use crate::sync::SyncEngine;

/// How far an episode got through a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EpisodeState {
    NotDownloaded,
    Downloaded,
    ContentClassified,
    Encoded,
    Probed,
    Uploaded,
}

impl fmt::Display for EpisodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EpisodeState::NotDownloaded => "not downloaded",
            EpisodeState::Downloaded => "downloaded",
            EpisodeState::ContentClassified => "content classified",
            EpisodeState::Encoded => "encoded",
            EpisodeState::Probed => "probed",
            EpisodeState::Uploaded => "uploaded",
        };
        f.write_str(name)
    }
}

/// Options for a publishing run
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Re-encode episodes that already have an output
    pub force: bool,
    /// Move on to the next episode when one fails
    pub continue_on_error: bool,
    /// Require the encoder programs to be executable before starting
    pub check_executables: bool,
    /// Offer to delete the remote master first, so the local copy replaces it
    pub remove_remote_master: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            force: false,
            continue_on_error: true,
            check_executables: false,
            remove_remote_master: false,
        }
    }
}

/// An episode that did not make it
#[derive(Debug, Clone)]
pub struct EpisodeFailure {
    pub uid: u64,
    /// Last state reached before the failure
    pub state: EpisodeState,
    pub error: String,
}

/// Result of a publishing run
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// UIDs published in this run
    pub processed: Vec<u64>,
    /// UIDs left alone (already encoded or declined)
    pub skipped: Vec<u64>,
    /// Requested UIDs with no matching episode
    pub unknown: Vec<u64>,
    pub failed: Vec<EpisodeFailure>,
    /// Every change made to the specification
    pub mutations: Mutations,
}

impl PublishReport {
    /// Whether episodes were attempted and none succeeded
    pub fn all_failed(&self) -> bool {
        self.processed.is_empty() && !self.failed.is_empty()
    }
}

/// Drives episodes from master file to published artifact
pub struct Publisher {
    sync: SyncEngine,
    tool: SharedTool,
    confirm: SharedConfirm,
    reporter: SharedProgressReporter,
}

impl Publisher {
    pub fn new(
        store: SharedStore,
        tool: SharedTool,
        local_dir: impl Into<PathBuf>,
        confirm: SharedConfirm,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            sync: SyncEngine::new(store, local_dir, confirm.clone(), reporter.clone()),
            tool,
            confirm,
            reporter,
        }
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    fn encoder(&self, spec: &PodcastSpec) -> Encoder {
        Encoder::new(
            self.tool.clone(),
            spec.encoding.ffprobe_path.clone(),
            self.sync.local_dir(),
        )
    }

    fn probe(&self, spec: &PodcastSpec) -> MediaProbe {
        MediaProbe::new(self.tool.clone(), spec.encoding.ffprobe_path.clone())
    }

    /// Encode and publish the selected episodes.
    ///
    /// Validation problems abort the run before anything is transferred.
    /// Afterwards a failing episode only aborts itself, unless
    /// `continue_on_error` is off. Successful episodes are written back to
    /// `spec`; the report's journal says whether it needs saving.
    pub async fn publish(
        &self,
        spec: &mut PodcastSpec,
        selection: &Selection,
        options: &PublishOptions,
    ) -> Result<PublishReport, PublishError> {
        if options.check_executables {
            check_executables(&spec.encoding)?;
        }

        let mut report = PublishReport {
            mutations: validate(spec)?,
            ..Default::default()
        };

        let plan = create_publish_plan(spec, selection, options.force)?;

        for &uid in &plan.unknown_uids {
            warn!(uid, "no episode with this uid");
            report.unknown.push(uid);
        }
        for &uid in &plan.already_encoded {
            self.reporter.report(ProgressEvent::EpisodeSkipped {
                uid,
                reason: "already encoded".to_string(),
            });
            report.skipped.push(uid);
        }

        self.reporter.report(ProgressEvent::RunStarted {
            podcast_title: spec.title.clone(),
            selected: plan.to_process.len(),
            already_encoded: plan.already_encoded.len(),
        });

        if !plan.is_empty() && !spec.encoding.cover_front.trim().is_empty() {
            self.sync
                .download(&spec.config.storage.input, &spec.encoding.cover_front)
                .await?;
        }

        let total = plan.to_process.len();
        for (index, &uid) in plan.to_process.iter().enumerate() {
            let Some(original) = spec.episode(uid) else {
                continue;
            };
            let mut episode = original.clone();

            self.reporter.report(ProgressEvent::EpisodeStarted {
                uid,
                title: episode.title.clone(),
                index,
                total,
            });

            if options.remove_remote_master
                && let Err(err) = self.remove_master(spec, &episode).await
            {
                self.record_failure(&mut report, uid, EpisodeState::NotDownloaded, &err);
                if !options.continue_on_error {
                    return Err(PublishError::Episode { uid, source: err });
                }
                continue;
            }

            let question = format!("Encode episode {uid} \"{}\"?", episode.title);
            if !self.confirm.ask(&question).await {
                self.reporter.report(ProgressEvent::EpisodeSkipped {
                    uid,
                    reason: "declined".to_string(),
                });
                report.skipped.push(uid);
                continue;
            }

            let mut state = EpisodeState::NotDownloaded;
            match self.publish_episode(spec, &mut episode, &mut state).await {
                Ok(mutations) => {
                    self.reporter.report(ProgressEvent::EpisodeCompleted {
                        uid,
                        output: episode.output.clone(),
                        length: episode.length,
                        duration: episode.duration.to_string(),
                    });
                    if let Some(slot) = spec.episode_mut(uid) {
                        *slot = episode;
                    }
                    report.mutations.merge(mutations);
                    report.processed.push(uid);
                }
                Err(err) => {
                    self.record_failure(&mut report, uid, state, &err);
                    if !options.continue_on_error {
                        return Err(PublishError::Episode { uid, source: err });
                    }
                }
            }
        }

        self.reporter.report(ProgressEvent::RunCompleted {
            processed: report.processed.len(),
            skipped: report.skipped.len(),
            failed: report.failed.len(),
        });

        Ok(report)
    }

    fn record_failure(
        &self,
        report: &mut PublishReport,
        uid: u64,
        state: EpisodeState,
        err: &EpisodeError,
    ) {
        warn!(uid, state = %state, error = %err, "episode failed");
        self.reporter.report(ProgressEvent::EpisodeFailed {
            uid,
            state,
            error: err.to_string(),
        });
        report.failed.push(EpisodeFailure {
            uid,
            state,
            error: err.to_string(),
        });
    }

    /// Delete the master from the input store if the user agrees. A local
    /// copy is then offered for upload when the master is downloaded.
    async fn remove_master(&self, spec: &PodcastSpec, episode: &Episode) -> Result<(), EpisodeError> {
        let bucket = &spec.config.storage.input;
        let question = format!("Remove {bucket}/{}?", episode.input);
        if self.confirm.ask(&question).await {
            self.sync.remove_remote(bucket, &episode.input).await?;
        }
        Ok(())
    }

    async fn publish_episode(
        &self,
        spec: &PodcastSpec,
        episode: &mut Episode,
        state: &mut EpisodeState,
    ) -> Result<Mutations, EpisodeError> {
        let uid = episode.uid;
        let storage = &spec.config.storage;
        let mut mutations = Mutations::new();

        if episode.image.trim().is_empty() {
            if spec.config.default_pod_image.trim().is_empty() {
                return Err(ValidationError::MissingImage { uid }.into());
            }
            info!(uid, image = %spec.config.default_pod_image, "using default podcast image");
            mutations.assign(
                uid,
                Field::Image,
                &mut episode.image,
                spec.config.default_pod_image.clone(),
            );
        }

        self.sync.download(&storage.input, &episode.image).await?;
        self.sync.download(&storage.input, &episode.input).await?;
        self.advance(uid, state, EpisodeState::Downloaded);

        let master = self.sync.local_path(&episode.input);
        let master_type = media::sniff_content_type(&master).await?;
        let resolution = resolve_target(
            media::is_video(&master_type),
            &episode.format,
            &spec.encoding.preferred_format,
            spec.encoding.audio_from_video,
        )
        .map_err(EncodeError::from)?;
        info!(uid, content_type = %master_type, pipeline = %resolution.kind, "classified master");
        self.advance(uid, state, EpisodeState::ContentClassified);

        self.reporter.report(ProgressEvent::Encoding {
            uid,
            pipeline: resolution.kind,
        });
        let outcome = self
            .encoder(spec)
            .run(resolution.kind, &resolution.extension, spec, episode)
            .await?;
        mutations.merge(outcome.mutations);
        self.advance(uid, state, EpisodeState::Encoded);

        let artifact_type = media::sniff_content_type(&outcome.output_path).await?;
        mutations.assign(uid, Field::Type, &mut episode.mime_type, artifact_type.clone());
        self.advance(uid, state, EpisodeState::Probed);

        let storage_class = Some(storage.artifact_storage_class());
        self.sync
            .upload(
                &storage.output,
                &episode.output,
                &outcome.output_path,
                Some(artifact_type.as_str()),
                storage_class,
            )
            .await?;

        if episode.pub_date.is_none() {
            mutations.assign(
                uid,
                Field::PubDate,
                &mut episode.pub_date,
                Some(Utc::now().fixed_offset()),
            );
        }

        let image = self.sync.local_path(&episode.image);
        self.sync
            .upload(&storage.output, &episode.image, &image, None, None)
            .await?;
        self.advance(uid, state, EpisodeState::Uploaded);

        Ok(mutations)
    }

    fn advance(&self, uid: u64, state: &mut EpisodeState, next: EpisodeState) {
        *state = next;
        self.reporter.report(ProgressEvent::StateChanged { uid, state: next });
    }

    /// Fill in missing length and duration of already published episodes.
    ///
    /// Length comes from the size of the stored artifact; duration needs the
    /// artifact itself, which is downloaded (if not already present) and
    /// probed. Each lookup is confirmed first.
    pub async fn resolve_metadata(
        &self,
        spec: &mut PodcastSpec,
        selection: &Selection,
    ) -> Result<Mutations, PublishError> {
        let mut mutations = Mutations::new();
        let probe = self.probe(spec);
        let bucket = spec.config.storage.output.clone();

        let uids: Vec<u64> = spec
            .episodes
            .iter()
            .filter(|episode| !episode.needs_encoding())
            .filter(|episode| match selection {
                Selection::All => true,
                Selection::Uids(uids) => uids.contains(&episode.uid),
            })
            .map(|episode| episode.uid)
            .collect();

        for uid in uids {
            let Some(episode) = spec.episode_mut(uid) else {
                continue;
            };

            if episode.needs_length() {
                let question = format!("Fetch length of {} from {bucket}?", episode.output);
                if self.confirm.ask(&question).await {
                    let size = self
                        .sync
                        .remote_size(&bucket, &episode.output)
                        .await
                        .map_err(|e| PublishError::Episode {
                            uid,
                            source: e.into(),
                        })?;
                    mutations.assign(uid, Field::Length, &mut episode.length, size);
                }
            }

            if episode.needs_duration() {
                let question = format!("Download {} to determine its duration?", episode.output);
                if !self.confirm.ask(&question).await {
                    continue;
                }

                self.sync
                    .download(&bucket, &episode.output)
                    .await
                    .map_err(|e| PublishError::Episode {
                        uid,
                        source: e.into(),
                    })?;
                let info = probe
                    .probe(&self.sync.local_path(&episode.output))
                    .await
                    .map_err(|e| PublishError::Episode {
                        uid,
                        source: e.into(),
                    })?;

                mutations.assign(uid, Field::Length, &mut episode.length, info.size);
                mutations.assign(
                    uid,
                    Field::Duration,
                    &mut episode.duration,
                    EpisodeDuration::from_duration(info.duration),
                );
                info!(uid, size = info.size, duration = %episode.duration, "resolved metadata");
            }
        }

        Ok(mutations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::scripted::ScriptedConfirm;
    use crate::confirm::{AlwaysNo, AlwaysYes};
    use crate::encode::{ExternalTool, Invocation};
    use crate::error::ToolError;
    use crate::media::{mp3_fixtures, mp4};
    use crate::progress::NoopReporter;
    use crate::progress::recording::RecordingReporter;
    use crate::sync::mock::MockStore;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];

    /// Stands in for ffmpeg: writes a fixed artifact to the expected output
    struct FakeFfmpeg {
        artifact: Vec<u8>,
        fail_for: Option<String>,
        runs: Mutex<Vec<String>>,
    }

    impl FakeFfmpeg {
        fn shared(artifact: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                artifact,
                fail_for: None,
                runs: Mutex::new(Vec::new()),
            })
        }

        fn run_count(&self) -> usize {
            self.runs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ExternalTool for FakeFfmpeg {
        async fn run(&self, invocation: &Invocation) -> Result<(), ToolError> {
            self.runs
                .lock()
                .unwrap()
                .push(invocation.command_line.clone());
            if let Some(input) = &self.fail_for
                && invocation.command_line.contains(input.as_str())
            {
                return Err(ToolError::ExitFailure {
                    command: invocation.command_line.clone(),
                    status: "status 1".to_string(),
                });
            }
            if let Some(target) = &invocation.produces {
                std::fs::write(target, &self.artifact).unwrap();
            }
            Ok(())
        }

        async fn capture(&self, _invocation: &Invocation) -> Result<String, ToolError> {
            Ok(r#"{"format": {"duration": "90.0"}}"#.to_string())
        }
    }

    fn make_spec(episodes: Vec<Episode>) -> PodcastSpec {
        let mut spec = PodcastSpec {
            title: "Example Cast".to_string(),
            description: "Talk about examples".to_string(),
            author: "Host".to_string(),
            link: "https://example.com".to_string(),
            episodes,
            ..Default::default()
        };
        spec.config.default_pod_image = "cover.jpg".to_string();
        spec.config.storage.input = "masters".to_string();
        spec.config.storage.output = "public".to_string();
        spec.encoding.cover_front = "cover.jpg".to_string();
        spec.encoding.preferred_format = "mp3".to_string();
        spec.encoding.apply_defaults();
        spec
    }

    fn make_episode(uid: u64, input: &str) -> Episode {
        Episode {
            uid,
            title: format!("Episode {uid}"),
            subtitle: "A subtitle".to_string(),
            description: "What happens".to_string(),
            input: input.to_string(),
            ..Default::default()
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        store: Arc<MockStore>,
        tool: Arc<FakeFfmpeg>,
        publisher: Publisher,
    }

    fn fixture(confirm: SharedConfirm, reporter: SharedProgressReporter) -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockStore::default());
        store.insert("masters", "cover.jpg", JPEG);
        store.insert("masters", "raw.mov", &mp4::fixtures::quicktime(600, 54_000));
        let tool = FakeFfmpeg::shared(mp4::fixtures::movie(600, 90_000));
        let publisher = Publisher::new(store.clone(), tool.clone(), dir.path(), confirm, reporter);
        Fixture {
            dir,
            store,
            tool,
            publisher,
        }
    }

    // === Publishing tests ===

    #[tokio::test]
    async fn video_master_is_published_as_mp4() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.processed, vec![1]);
        assert!(report.failed.is_empty());
        assert!(report.mutations.is_dirty());

        let episode = spec.episode(1).unwrap();
        assert_eq!(episode.output, "raw.mp4");
        assert!(episode.length > 0);
        assert_eq!(episode.duration.to_string(), "00:02:30");
        assert_eq!(episode.mime_type, "video/mp4");
        assert_eq!(episode.image, "cover.jpg");
        assert_eq!(episode.author, "Host");
        assert!(episode.pub_date.is_some());

        assert!(f.store.get("public", "raw.mp4").is_some());
        assert_eq!(f.store.get("public", "cover.jpg").unwrap(), JPEG);
        let puts = f.store.puts.lock().unwrap();
        assert_eq!(puts[0].2, "video/mp4");
        assert_eq!(puts[0].3, "INTELLIGENT_TIERING");
        assert_eq!(puts[1].3, "STANDARD");
    }

    #[tokio::test]
    async fn states_are_reported_in_order() {
        let reporter = RecordingReporter::shared();
        let f = fixture(AlwaysYes::shared(), reporter.clone());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);

        f.publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        let states: Vec<EpisodeState> = reporter
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                EpisodeState::Downloaded,
                EpisodeState::ContentClassified,
                EpisodeState::Encoded,
                EpisodeState::Probed,
                EpisodeState::Uploaded,
            ]
        );
    }

    #[tokio::test]
    async fn encoded_episodes_need_force() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut done = make_episode(1, "raw.mov");
        done.output = "raw.mp4".to_string();
        let mut spec = make_spec(vec![done]);

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(report.skipped, vec![1]);
        assert_eq!(f.tool.run_count(), 0);

        let forced = PublishOptions {
            force: true,
            ..Default::default()
        };
        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &forced)
            .await
            .unwrap();
        assert_eq!(report.processed, vec![1]);
        assert_eq!(f.tool.run_count(), 1);
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);
        let forced = PublishOptions {
            force: true,
            ..Default::default()
        };

        f.publisher.publish(&mut spec, &Selection::All, &forced).await.unwrap();
        let fetches = f.store.fetch_count();
        f.publisher.publish(&mut spec, &Selection::All, &forced).await.unwrap();

        assert_eq!(fetches, 2);
        assert_eq!(f.store.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn unknown_uids_are_skipped() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);

        let report = f
            .publisher
            .publish(&mut spec, &Selection::Uids(vec![99]), &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.unknown, vec![99]);
        assert!(report.processed.is_empty());
        assert_eq!(f.store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn declined_episode_is_untouched() {
        let f = fixture(AlwaysNo::shared(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.skipped, vec![1]);
        assert_eq!(spec.episode(1).unwrap().output, "");
        assert_eq!(f.tool.run_count(), 0);
    }

    #[tokio::test]
    async fn validation_failure_aborts_before_transfers() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut broken = make_episode(1, "raw.mov");
        broken.subtitle.clear();
        let mut spec = make_spec(vec![broken]);

        let err = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PublishError::Validation(ValidationError::MissingEpisodeField { uid: 1, .. })
        ));
        assert_eq!(f.store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn failing_episode_does_not_stop_the_run() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockStore::default());
        store.insert("masters", "cover.jpg", JPEG);
        store.insert("masters", "raw.mov", &mp4::fixtures::quicktime(600, 54_000));
        store.insert("masters", "broken.mov", &mp4::fixtures::quicktime(600, 600));
        let tool = Arc::new(FakeFfmpeg {
            artifact: mp4::fixtures::movie(600, 90_000),
            fail_for: Some("broken.mov".to_string()),
            runs: Mutex::new(Vec::new()),
        });
        let publisher = Publisher::new(
            store.clone(),
            tool,
            dir.path(),
            AlwaysYes::shared(),
            NoopReporter::shared(),
        );
        let mut spec = make_spec(vec![make_episode(1, "broken.mov"), make_episode(2, "raw.mov")]);

        let report = publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.processed, vec![2]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].uid, 1);
        assert_eq!(report.failed[0].state, EpisodeState::ContentClassified);
        assert!(!report.all_failed());
        assert_eq!(spec.episode(1).unwrap().output, "");
    }

    #[tokio::test]
    async fn unsupported_format_fails_only_that_episode() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut odd = make_episode(1, "raw.mov");
        odd.format = "ogg".to_string();
        let mut spec = make_spec(vec![odd]);

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert!(report.all_failed());
        assert_eq!(report.failed[0].state, EpisodeState::Downloaded);
        assert!(report.failed[0].error.contains("ogg"));
    }

    #[tokio::test]
    async fn stop_on_first_error_when_asked() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut odd = make_episode(1, "raw.mov");
        odd.format = "flac".to_string();
        let mut spec = make_spec(vec![odd]);
        let options = PublishOptions {
            continue_on_error: false,
            ..Default::default()
        };

        let err = f
            .publisher
            .publish(&mut spec, &Selection::All, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Episode { uid: 1, .. }));
    }

    #[tokio::test]
    async fn missing_image_without_default_fails_episode() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);
        spec.config.default_pod_image.clear();

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.failed[0].state, EpisodeState::NotDownloaded);
    }

    #[tokio::test]
    async fn only_published_episodes_get_a_publication_date() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        let mut odd = make_episode(1, "raw.mov");
        odd.format = "ogg".to_string();
        let mut spec = make_spec(vec![odd, make_episode(2, "raw.mov")]);

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.processed, vec![2]);
        assert_eq!(spec.episode(1).unwrap().pub_date, None);
        assert!(spec.episode(2).unwrap().pub_date.is_some());
        assert!(
            report
                .mutations
                .iter()
                .all(|m| !(m.uid == Some(1) && m.field == Field::PubDate))
        );
    }

    // === Remote master removal tests ===

    #[tokio::test]
    async fn removed_remote_master_is_replaced_by_local_copy() {
        let confirm = ScriptedConfirm::shared(&[true, true, true]);
        let f = fixture(confirm.clone(), NoopReporter::shared());
        let local_master = mp4::fixtures::quicktime(600, 60_000);
        std::fs::write(f.dir.path().join("raw.mov"), &local_master).unwrap();
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);
        let options = PublishOptions {
            remove_remote_master: true,
            ..Default::default()
        };

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &options)
            .await
            .unwrap();

        assert_eq!(report.processed, vec![1]);
        assert_eq!(
            *f.store.removals.lock().unwrap(),
            vec![("masters".to_string(), "raw.mov".to_string())]
        );
        assert_eq!(f.store.get("masters", "raw.mov").unwrap(), local_master);

        let asked = confirm.asked();
        assert_eq!(asked.len(), 3);
        assert_eq!(asked[0], "Remove masters/raw.mov?");
        assert!(asked[1].starts_with("Encode episode 1"));
    }

    #[tokio::test]
    async fn declined_removal_keeps_remote_master() {
        let confirm = ScriptedConfirm::shared(&[false, true]);
        let f = fixture(confirm.clone(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);
        let options = PublishOptions {
            remove_remote_master: true,
            ..Default::default()
        };

        let report = f
            .publisher
            .publish(&mut spec, &Selection::All, &options)
            .await
            .unwrap();

        assert_eq!(report.processed, vec![1]);
        assert!(f.store.removals.lock().unwrap().is_empty());
        assert!(f.store.get("masters", "raw.mov").is_some());
    }

    #[tokio::test]
    async fn removal_is_not_offered_by_default() {
        let confirm = ScriptedConfirm::shared(&[true]);
        let f = fixture(confirm.clone(), NoopReporter::shared());
        let mut spec = make_spec(vec![make_episode(1, "raw.mov")]);

        f.publisher
            .publish(&mut spec, &Selection::All, &PublishOptions::default())
            .await
            .unwrap();

        assert!(f.store.removals.lock().unwrap().is_empty());
        assert!(confirm.asked()[0].starts_with("Encode episode 1"));
    }

    // === Metadata resolution tests ===

    #[tokio::test]
    async fn resolve_metadata_fills_length_and_duration() {
        let f = fixture(AlwaysYes::shared(), NoopReporter::shared());
        f.store.insert("public", "ep1.mp3", &mp3_fixtures::mp3(200));
        let mut published = make_episode(1, "ep1.wav");
        published.output = "ep1.mp3".to_string();
        let mut spec = make_spec(vec![published, make_episode(2, "raw.mov")]);

        let mutations = f
            .publisher
            .resolve_metadata(&mut spec, &Selection::All)
            .await
            .unwrap();

        let episode = spec.episode(1).unwrap();
        assert_eq!(episode.length, 200 * 417);
        assert!(episode.duration.is_resolved());
        assert!(mutations.is_dirty());
        assert_eq!(spec.episode(2).unwrap().length, 0);
    }

    #[tokio::test]
    async fn resolve_metadata_respects_answers() {
        let confirm = ScriptedConfirm::shared(&[true, false]);
        let f = fixture(confirm.clone(), NoopReporter::shared());
        f.store.insert("public", "ep1.mp3", &mp3_fixtures::mp3(10));
        let mut published = make_episode(1, "ep1.wav");
        published.output = "ep1.mp3".to_string();
        let mut spec = make_spec(vec![published]);

        f.publisher
            .resolve_metadata(&mut spec, &Selection::All)
            .await
            .unwrap();

        assert_eq!(spec.episode(1).unwrap().length, 4170);
        assert!(!spec.episode(1).unwrap().duration.is_resolved());
        assert_eq!(confirm.asked().len(), 2);
        assert_eq!(f.store.fetch_count(), 0);
    }
}
