// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod confirm;
pub mod encode;
pub mod error;
pub mod http;
pub mod media;
pub mod mutation;
pub mod preprocess;
pub mod progress;
pub mod publish;
pub mod spec;
pub mod state;
pub mod store;
pub mod sync;

// Re-export main types for convenience
pub use confirm::{AlwaysNo, AlwaysYes, Confirm, SharedConfirm};
pub use encode::{ExternalTool, PipelineKind, SharedTool, ShellTool, resolve};
pub use error::{
    EncodeError, EpisodeError, PreprocessError, ProbeError, PublishError, SpecError, StoreError,
    SyncError, ValidationError,
};
pub use http::{HttpClient, ReqwestClient};
pub use media::{MediaInfo, MediaProbe, render_chapter_list};
pub use mutation::{Field, Mutations};
pub use preprocess::{Preprocessor, Preset};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use publish::{EpisodeState, PublishOptions, PublishReport, Publisher};
pub use spec::{DEFAULT_SPEC_FILE, Episode, PodcastSpec, SpecStore, YamlSpecStore};
pub use state::Selection;
pub use store::{DirectoryStore, ObjectStore, RemoteStore, SharedStore, is_remote_endpoint};
pub use sync::{DiffOutcome, DownloadOutcome, SyncEngine};
