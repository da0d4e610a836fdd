// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// Specification fields that a run may change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Output,
    Length,
    Duration,
    Type,
    Image,
    Author,
    Link,
    PubDate,
    LastBuildDate,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Output => "output",
            Field::Length => "length",
            Field::Duration => "duration",
            Field::Type => "type",
            Field::Image => "image",
            Field::Author => "author",
            Field::Link => "link",
            Field::PubDate => "pubDate",
            Field::LastBuildDate => "lastBuildDate",
        };
        f.write_str(name)
    }
}

/// A single recorded change: which field of which episode (`None` for the
/// podcast itself)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub uid: Option<u64>,
    pub field: Field,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uid {
            Some(uid) => write!(f, "episode {uid}: {}", self.field),
            None => write!(f, "podcast: {}", self.field),
        }
    }
}

/// Journal of changes made to the specification during a run.
///
/// Operations hand back their own journal; the caller merges them and
/// decides once, at the end, whether the document needs to be persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutations {
    entries: Vec<Mutation>,
}

impl Mutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change to an episode field
    pub fn record(&mut self, uid: u64, field: Field) {
        self.push(Mutation {
            uid: Some(uid),
            field,
        });
    }

    /// Record a change to a podcast-level field
    pub fn record_podcast(&mut self, field: Field) {
        self.push(Mutation { uid: None, field });
    }

    /// Assign `value` to `slot` and record the change if the value differs
    pub fn assign<T: PartialEq>(&mut self, uid: u64, field: Field, slot: &mut T, value: T) {
        if *slot != value {
            *slot = value;
            self.record(uid, field);
        }
    }

    /// Fold another journal into this one
    pub fn merge(&mut self, other: Mutations) {
        for mutation in other.entries {
            self.push(mutation);
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.entries.iter()
    }

    // Repeated changes to the same field collapse into one entry
    fn push(&mut self, mutation: Mutation) {
        if !self.entries.contains(&mutation) {
            self.entries.push(mutation);
        }
    }
}
