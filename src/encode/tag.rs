// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::time::Duration;

use id3::frame::{Chapter as ChapterFrame, Comment, Picture, PictureType, TableOfContents};
use id3::{Content, ErrorKind, Frame, Tag, TagLike, Version};
use tracing::{debug, warn};

use crate::error::EncodeError;
use crate::media::{self, chapter_bounds};
use crate::spec::{Episode, PodcastSpec};

const TOC_ID: &str = "toc";

/// Write an ID3v2.3 tag with episode metadata, front cover and chapter
/// frames, replacing whatever the encoder may have written.
pub fn write_id3(
    path: &Path,
    spec: &PodcastSpec,
    episode: &Episode,
    cover: Option<&Path>,
    total: Duration,
) -> Result<(), EncodeError> {
    let tag_error = |e| EncodeError::TagFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: ErrorKind::NoTag,
            ..
        }) => Tag::new(),
        Err(e) => return Err(tag_error(e)),
    };

    tag.set_title(episode.title.as_str());
    tag.set_album(spec.title.as_str());
    tag.set_artist(episode.author.as_str());
    if !spec.encoding.genre.is_empty() {
        tag.set_genre(spec.encoding.genre.as_str());
    }
    if let Some(year) = episode.year() {
        tag.set_year(year);
    }
    if let Ok(track) = u32::try_from(episode.uid) {
        tag.set_track(track);
    }

    let language = episode.language(&spec.encoding);
    if !language.is_empty() {
        tag.set_text("TLAN", language);
    }

    tag.remove("COMM");
    let subtitle = episode.single_line_subtitle();
    if !subtitle.is_empty() {
        tag.add_frame(Comment {
            lang: "eng".to_string(),
            description: String::new(),
            text: subtitle,
        });
    }

    tag.remove("WOAR");
    if !episode.link.is_empty() {
        tag.add_frame(Frame::with_content("WOAR", Content::Link(episode.link.clone())));
    }

    if let Some(cover) = cover {
        attach_cover(&mut tag, cover)?;
    }

    write_chapters(&mut tag, episode, total);

    tag.write_to_path(path, Version::Id3v23).map_err(tag_error)?;
    debug!(path = %path.display(), chapters = episode.chapters.len(), "wrote id3 tag");
    Ok(())
}

fn attach_cover(tag: &mut Tag, cover: &Path) -> Result<(), EncodeError> {
    let data = match std::fs::read(cover) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(cover = %cover.display(), "cover image missing, tagging without artwork");
            return Ok(());
        }
        Err(e) => {
            return Err(EncodeError::MetadataWriteFailed {
                path: cover.to_path_buf(),
                source: e,
            });
        }
    };

    let mime_type = media::content_type(cover)
        .ok()
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or_else(|| "image/jpeg".to_string());

    tag.remove_all_pictures();
    tag.add_frame(Picture {
        mime_type,
        picture_type: PictureType::CoverFront,
        description: "Cover (front)".to_string(),
        data,
    });
    Ok(())
}

fn write_chapters(tag: &mut Tag, episode: &Episode, total: Duration) {
    tag.remove("CHAP");
    tag.remove("CTOC");
    if episode.chapters.is_empty() {
        return;
    }

    let bounds = chapter_bounds(&episode.chapters, total);
    let mut elements = Vec::with_capacity(bounds.len());

    for (index, (chapter, (start, end))) in episode.chapters.iter().zip(bounds).enumerate() {
        let element_id = format!("chp{index}");
        elements.push(element_id.clone());

        let frame = ChapterFrame {
            element_id,
            start_time: start,
            end_time: end,
            start_offset: u32::MAX,
            end_offset: u32::MAX,
            frames: vec![Frame::text("TIT2", chapter.title.trim())],
        };
        tag.add_frame(Frame::with_content("CHAP", Content::Chapter(frame)));
    }

    let toc = TableOfContents {
        element_id: TOC_ID.to_string(),
        top_level: true,
        ordered: true,
        elements,
        frames: Vec::new(),
    };
    tag.add_frame(Frame::with_content("CTOC", Content::TableOfContents(toc)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::mp3_fixtures;
    use crate::spec::Chapter;
    use chrono::DateTime;
    use tempfile::tempdir;

    fn make_spec() -> PodcastSpec {
        let mut spec = PodcastSpec {
            title: "Example Cast".to_string(),
            ..Default::default()
        };
        spec.encoding.genre = "Podcast".to_string();
        spec.encoding.language = "deu".to_string();
        spec
    }

    fn make_episode() -> Episode {
        Episode {
            uid: 42,
            title: "The Answer".to_string(),
            author: "Deep Thought".to_string(),
            subtitle: "Seven and a half\nmillion years".to_string(),
            link: "https://example.com/42".to_string(),
            pub_date: DateTime::parse_from_rfc2822("Tue, 10 Jun 2025 08:30:00 +0000").ok(),
            chapters: vec![
                Chapter::new("Question", Duration::ZERO),
                Chapter::new("Answer", Duration::from_secs(2)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn writes_metadata_and_chapters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep.mp3");
        std::fs::write(&path, mp3_fixtures::mp3(200)).unwrap();

        write_id3(&path, &make_spec(), &make_episode(), None, Duration::from_secs(5)).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("The Answer"));
        assert_eq!(tag.album(), Some("Example Cast"));
        assert_eq!(tag.artist(), Some("Deep Thought"));
        assert_eq!(tag.year(), Some(2025));
        assert_eq!(tag.track(), Some(42));
        assert_eq!(tag.get("TLAN").and_then(|f| f.content().text()), Some("deu"));
        assert_eq!(
            tag.comments().next().map(|c| c.text.as_str()),
            Some("Seven and a half million years")
        );

        let chapters: Vec<_> = tag.chapters().collect();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].start_time, 0);
        assert_eq!(chapters[0].end_time, 2_000);
        assert_eq!(chapters[1].end_time, 5_000);
        assert_eq!(tag.tables_of_contents().count(), 1);
    }

    #[test]
    fn retagging_replaces_chapters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep.mp3");
        std::fs::write(&path, mp3_fixtures::mp3(50)).unwrap();

        let spec = make_spec();
        let mut episode = make_episode();
        write_id3(&path, &spec, &episode, None, Duration::from_secs(5)).unwrap();

        episode.chapters.truncate(1);
        write_id3(&path, &spec, &episode, None, Duration::from_secs(5)).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.chapters().count(), 1);
        assert_eq!(tag.comments().count(), 1);
    }

    #[test]
    fn attaches_cover_picture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep.mp3");
        std::fs::write(&path, mp3_fixtures::mp3(50)).unwrap();
        let cover = dir.path().join("cover.jpg");
        std::fs::write(&cover, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0]).unwrap();

        write_id3(&path, &make_spec(), &make_episode(), Some(&cover), Duration::ZERO).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        let picture = tag.pictures().next().unwrap();
        assert_eq!(picture.picture_type, PictureType::CoverFront);
        assert_eq!(picture.mime_type, "image/jpeg");
    }

    #[test]
    fn missing_cover_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep.mp3");
        std::fs::write(&path, mp3_fixtures::mp3(50)).unwrap();

        let cover = dir.path().join("nope.jpg");
        write_id3(&path, &make_spec(), &make_episode(), Some(&cover), Duration::ZERO).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.pictures().count(), 0);
    }
}
