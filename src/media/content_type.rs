// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::error::ProbeError;

pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Detect the MIME type of a file from its leading bytes, falling back to
/// the extension for formats without a reliable signature.
pub fn content_type(path: &Path) -> Result<String, ProbeError> {
    let detected = infer::get_from_path(path).map_err(|e| ProbeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(kind) = detected {
        return Ok(kind.mime_type().to_string());
    }

    Ok(content_type_for_extension(path)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string())
}

/// [`content_type`] on the blocking pool
pub async fn sniff_content_type(path: &Path) -> Result<String, ProbeError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || content_type(&owned))
        .await
        .map_err(|e| ProbeError::Interrupted {
            path: path.to_path_buf(),
            source: e,
        })?
}

/// MIME type implied by a file extension
pub fn content_type_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "m4b" => "audio/mp4",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "wav" => "audio/x-wav",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "xml" | "rss" => "application/rss+xml",
        "html" => "text/html",
        _ => return None,
    };
    Some(mime)
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}
