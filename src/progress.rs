// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::encode::PipelineKind;
use crate::publish::EpisodeState;

/// Events emitted during a publishing run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The run has been planned
    RunStarted {
        podcast_title: String,
        selected: usize,
        already_encoded: usize,
    },

    /// Work on an episode begins
    EpisodeStarted {
        uid: u64,
        title: String,
        /// Position of this episode in the run
        index: usize,
        total: usize,
    },

    /// An episode reached a new state
    StateChanged { uid: u64, state: EpisodeState },

    /// The encoder chain has been chosen
    Encoding { uid: u64, pipeline: PipelineKind },

    /// A download or upload is starting
    TransferStarting {
        key: String,
        /// Expected size in bytes, if known
        total_bytes: Option<u64>,
    },

    /// Transfer progress update
    TransferProgress {
        key: String,
        bytes_transferred: u64,
        total_bytes: Option<u64>,
    },

    /// A transfer completed successfully
    TransferCompleted { key: String, bytes: u64 },

    /// Local and remote copies already match
    TransferSkipped { key: String },

    /// An episode was not processed
    EpisodeSkipped { uid: u64, reason: String },

    /// An episode was published
    EpisodeCompleted {
        uid: u64,
        output: String,
        length: u64,
        duration: String,
    },

    /// An episode failed; `state` is the last state it reached
    EpisodeFailed {
        uid: u64,
        state: EpisodeState,
        error: String,
    },

    /// The run is over
    RunCompleted {
        processed: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
