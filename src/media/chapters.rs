// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Write as _;
use std::time::Duration;

use crate::spec::{Chapter, Episode, PodcastSpec};

const ONE_HOUR: Duration = Duration::from_secs(3600);

/// Render chapters as a plain list for show notes.
///
/// Offsets are truncated to whole seconds and printed as `(MM:SS)`, or as
/// `(HH:MM:SS)` on every line once any chapter starts after the first hour.
pub fn render_chapter_list(chapters: &[Chapter]) -> String {
    let with_hours = chapters.iter().any(|chapter| chapter.start >= ONE_HOUR);

    let mut list = String::new();
    for chapter in chapters {
        let total = chapter.start.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        let title = chapter.title.trim();

        // Writing to a String cannot fail
        let _ = if with_hours {
            writeln!(list, "({hours:02}:{minutes:02}:{seconds:02}) {title}")
        } else {
            writeln!(list, "({:02}:{seconds:02}) {title}", total / 60)
        };
    }
    list
}

/// Build an FFMETADATA1 document carrying the episode tags and chapter map.
///
/// The last chapter ends at `total`; chapters never end before they start.
pub fn ffmetadata(spec: &PodcastSpec, episode: &Episode, total: Duration) -> String {
    let mut doc = String::from(";FFMETADATA1\n");

    let year = episode.year().map(|y| y.to_string()).unwrap_or_default();
    let track = episode.uid.to_string();
    let description = episode.single_line_subtitle();
    let tags = [
        ("title", episode.title.as_str()),
        ("album", spec.title.as_str()),
        ("artist", episode.author.as_str()),
        ("genre", spec.encoding.genre.as_str()),
        ("date", year.as_str()),
        ("track", track.as_str()),
        ("comment", episode.link.as_str()),
        ("description", description.as_str()),
        ("language", episode.language(&spec.encoding)),
    ];
    for (key, value) in tags {
        if !value.is_empty() {
            let _ = writeln!(doc, "{key}={}", escape(value));
        }
    }

    let bounds = chapter_bounds(&episode.chapters, total);
    for (chapter, (start, end)) in episode.chapters.iter().zip(bounds) {
        let _ = write!(
            doc,
            "\n[CHAPTER]\nTIMEBASE=1/1000\nSTART={start}\nEND={end}\ntitle={}\n",
            escape(chapter.title.trim())
        );
    }

    doc
}

/// Chapter boundaries as `(start, end)` pairs in milliseconds
pub fn chapter_bounds(chapters: &[Chapter], total: Duration) -> Vec<(u32, u32)> {
    let to_millis = |d: Duration| u32::try_from(d.as_millis()).unwrap_or(u32::MAX);

    chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| {
            let end = chapters
                .get(index + 1)
                .map(|next| next.start)
                .unwrap_or(total)
                .max(chapter.start);
            (to_millis(chapter.start), to_millis(end))
        })
        .collect()
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
