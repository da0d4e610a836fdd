// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::error::EncodeError;

/// Derive the artifact name from the master: its base name with the
/// extension replaced by `extension`.
pub fn output_name(input: &str, extension: &str) -> Result<String, EncodeError> {
    let stem = Path::new(input.trim())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| EncodeError::InvalidInput {
            input: input.to_string(),
        })?;

    Ok(format!("{stem}.{}", extension.trim_start_matches('.')))
}
