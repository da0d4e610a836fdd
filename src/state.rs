// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::spec::PodcastSpec;

/// Which episodes a run is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Uids(Vec<u64>),
}

impl Selection {
    /// An empty UID list means every episode
    pub fn from_uids(uids: Vec<u64>) -> Self {
        if uids.is_empty() {
            Selection::All
        } else {
            Selection::Uids(uids)
        }
    }
}

/// Plan for a publishing run, indicating which episodes need encoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishPlan {
    /// UIDs to process, in document order
    pub to_process: Vec<u64>,
    /// Selected UIDs skipped because they already have an output
    pub already_encoded: Vec<u64>,
    /// Requested UIDs that match no episode
    pub unknown_uids: Vec<u64>,
}

impl PublishPlan {
    pub fn is_empty(&self) -> bool {
        self.to_process.is_empty()
    }
}

/// Decide which episodes to encode.
///
/// Episodes are taken in document order. Without `force`, episodes that
/// already have an output are left alone. Every episode that will be
/// processed must name an input.
pub fn create_publish_plan(
    spec: &PodcastSpec,
    selection: &Selection,
    force: bool,
) -> Result<PublishPlan, ValidationError> {
    let requested: Option<HashSet<u64>> = match selection {
        Selection::All => None,
        Selection::Uids(uids) => Some(uids.iter().copied().collect()),
    };

    let mut plan = PublishPlan::default();

    if let Selection::Uids(uids) = selection {
        let mut reported = HashSet::new();
        for &uid in uids {
            if spec.episode(uid).is_none() && reported.insert(uid) {
                plan.unknown_uids.push(uid);
            }
        }
    }

    for episode in &spec.episodes {
        if let Some(requested) = &requested
            && !requested.contains(&episode.uid)
        {
            continue;
        }

        if !force && !episode.needs_encoding() {
            plan.already_encoded.push(episode.uid);
            continue;
        }

        if episode.input.trim().is_empty() {
            return Err(ValidationError::MissingInput { uid: episode.uid });
        }

        plan.to_process.push(episode.uid);
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Episode;

    fn episode(uid: u64, input: &str, output: &str) -> Episode {
        Episode {
            uid,
            title: format!("Episode {uid}"),
            input: input.to_string(),
            output: output.to_string(),
            ..Default::default()
        }
    }

    fn spec(episodes: Vec<Episode>) -> PodcastSpec {
        PodcastSpec {
            title: "Test Podcast".to_string(),
            episodes,
            ..Default::default()
        }
    }

    #[test]
    fn plan_skips_encoded_episodes() {
        let spec = spec(vec![
            episode(1, "ep1.wav", "ep1.mp3"),
            episode(2, "ep2.wav", ""),
            episode(3, "ep3.wav", "x"),
        ]);

        let plan = create_publish_plan(&spec, &Selection::All, false).unwrap();

        assert_eq!(plan.to_process, vec![2, 3]);
        assert_eq!(plan.already_encoded, vec![1]);
        assert!(plan.unknown_uids.is_empty());
    }

    #[test]
    fn force_includes_encoded_episodes() {
        let spec = spec(vec![episode(1, "ep1.wav", "ep1.mp3"), episode(2, "ep2.wav", "")]);

        let plan = create_publish_plan(&spec, &Selection::All, true).unwrap();

        assert_eq!(plan.to_process, vec![1, 2]);
        assert!(plan.already_encoded.is_empty());
    }

    #[test]
    fn selection_keeps_document_order_and_reports_unknown() {
        let spec = spec(vec![
            episode(1, "ep1.wav", ""),
            episode(2, "ep2.wav", ""),
            episode(3, "ep3.wav", ""),
        ]);

        let plan =
            create_publish_plan(&spec, &Selection::Uids(vec![3, 42, 1, 42]), false).unwrap();

        assert_eq!(plan.to_process, vec![1, 3]);
        assert_eq!(plan.unknown_uids, vec![42]);
    }

    #[test]
    fn missing_input_is_a_validation_error() {
        let spec = spec(vec![episode(1, "ep1.wav", ""), episode(2, " ", "")]);

        let err = create_publish_plan(&spec, &Selection::All, false).unwrap_err();
        assert!(matches!(err, ValidationError::MissingInput { uid: 2 }));
    }

    #[test]
    fn missing_input_on_unselected_episode_is_ignored() {
        let spec = spec(vec![episode(1, "ep1.wav", ""), episode(2, "", "")]);

        let plan = create_publish_plan(&spec, &Selection::Uids(vec![1]), false).unwrap();
        assert_eq!(plan.to_process, vec![1]);
    }

    #[test]
    fn empty_uid_list_selects_all() {
        assert_eq!(Selection::from_uids(vec![]), Selection::All);
        assert_eq!(Selection::from_uids(vec![7]), Selection::Uids(vec![7]));
    }
}
