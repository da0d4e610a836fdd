// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod naming;
mod pipeline;
mod resolve;
mod tag;
mod template;
mod tool;

pub use naming::output_name;
pub use pipeline::{
    CONTAINER_AUDIO_TEMPLATE, EncodeOutcome, Encoder, MP3_DIRECT_TEMPLATE, MP3_TRANSCODE_TEMPLATE,
    VIDEO_TEMPLATE, default_template, template_for,
};
pub use resolve::{PipelineKind, Resolution, resolve, resolve_target, resolve_with, target_extension};
pub use tag::write_id3;
pub use template::{TemplateValues, render};
pub use tool::{ExternalTool, Invocation, SharedTool, ShellTool};
