// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use async_trait::async_trait;

/// Yes/no gate in front of actions with visible consequences.
///
/// Asking is async so an interactive answer can be awaited without holding
/// up the runtime, and an interrupt can cancel a pending question.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn ask(&self, question: &str) -> bool;
}

/// A shared reference to a confirmation gate
pub type SharedConfirm = Arc<dyn Confirm>;

/// Declines everything; used for dry runs
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysNo;

#[async_trait]
impl Confirm for AlwaysNo {
    async fn ask(&self, _question: &str) -> bool {
        false
    }
}

impl AlwaysNo {
    pub fn shared() -> SharedConfirm {
        Arc::new(Self)
    }
}

/// Accepts everything; used with `--force`
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysYes;

#[async_trait]
impl Confirm for AlwaysYes {
    async fn ask(&self, _question: &str) -> bool {
        true
    }
}

impl AlwaysYes {
    pub fn shared() -> SharedConfirm {
        Arc::new(Self)
    }
}
