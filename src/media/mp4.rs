// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal ISO base media (MPEG-4 / QuickTime) reader: just enough to walk
//! the box tree down to `moov/mvhd` and read the movie duration.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use crate::error::ProbeError;

const BOX_HEADER_LEN: u64 = 8;

/// Whether the file starts with an `ftyp` box
pub fn has_ftyp_signature(path: &Path) -> bool {
    let mut header = [0u8; 8];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|_| &header[4..8] == b"ftyp")
        .unwrap_or(false)
}

/// Read the movie duration from the `mvhd` box
pub fn movie_duration(path: &Path) -> Result<Duration, ProbeError> {
    let io_error = |e: io::Error| ProbeError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let malformed = |reason: &str| ProbeError::MalformedContainer {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut file = File::open(path).map_err(io_error)?;
    let file_len = file.metadata().map_err(io_error)?.len();

    let moov = find_box(&mut file, 0, file_len, b"moov")
        .map_err(io_error)?
        .ok_or_else(|| ProbeError::MissingMovieHeader {
            path: path.to_path_buf(),
        })?;
    let mvhd = find_box(&mut file, moov.0, moov.1, b"mvhd")
        .map_err(io_error)?
        .ok_or_else(|| ProbeError::MissingMovieHeader {
            path: path.to_path_buf(),
        })?;

    file.seek(SeekFrom::Start(mvhd.0)).map_err(io_error)?;
    let mut version = [0u8; 4];
    file.read_exact(&mut version).map_err(io_error)?;

    let (timescale, duration) = match version[0] {
        0 => {
            let mut fields = [0u8; 16];
            file.read_exact(&mut fields).map_err(io_error)?;
            (
                u32::from_be_bytes([fields[8], fields[9], fields[10], fields[11]]),
                u64::from(u32::from_be_bytes([
                    fields[12], fields[13], fields[14], fields[15],
                ])),
            )
        }
        1 => {
            let mut fields = [0u8; 28];
            file.read_exact(&mut fields).map_err(io_error)?;
            let mut timescale = [0u8; 4];
            timescale.copy_from_slice(&fields[16..20]);
            let mut duration = [0u8; 8];
            duration.copy_from_slice(&fields[20..28]);
            (u32::from_be_bytes(timescale), u64::from_be_bytes(duration))
        }
        _ => return Err(malformed("unknown mvhd version")),
    };

    if timescale == 0 {
        return Err(malformed("mvhd timescale is zero"));
    }

    let millis = u128::from(duration) * 1000 / u128::from(timescale);
    let millis = u64::try_from(millis).map_err(|_| malformed("mvhd duration overflows"))?;
    Ok(Duration::from_millis(millis))
}

/// Find a child box by type between `start` and `end`; returns the payload
/// range
fn find_box<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    kind: &[u8; 4],
) -> io::Result<Option<(u64, u64)>> {
    let mut position = start;

    while position + BOX_HEADER_LEN <= end {
        reader.seek(SeekFrom::Start(position))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;

        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let (payload_start, box_end) = match size32 {
            // Box extends to the end of its parent
            0 => (position + BOX_HEADER_LEN, end),
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                let size = u64::from_be_bytes(large);
                (position + 16, position.saturating_add(size))
            }
            size => (position + BOX_HEADER_LEN, position + u64::from(size)),
        };

        if box_end < payload_start || box_end > end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("box at offset {position} overruns its parent"),
            ));
        }

        if &header[4..8] == kind {
            return Ok(Some((payload_start, box_end)));
        }
        position = box_end;
    }

    Ok(None)
}
