// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod chapters;
mod content_type;
pub mod mp4;
mod probe;

pub use chapters::{chapter_bounds, ffmetadata, render_chapter_list};
pub use content_type::{
    FALLBACK_CONTENT_TYPE, content_type, content_type_for_extension, is_video, sniff_content_type,
};
pub use probe::{FFPROBE_TEMPLATE, MediaInfo, MediaProbe};

#[cfg(test)]
pub(crate) use probe::fixtures as mp3_fixtures;
