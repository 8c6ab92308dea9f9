use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Claim lifecycle of a security application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationState {
    /// Refuses to be claimed.
    NotClaimable,
    /// Waiting for a claim.
    Claimable,
    /// Owned and enforcing its installed policy.
    Claimed,
    /// Claimed, but the manifest template differs from the installed
    /// manifest.
    NeedUpdate,
}

impl ApplicationState {
    /// Whether the application has an owner.
    pub fn is_claimed(&self) -> bool {
        matches!(self, ApplicationState::Claimed | ApplicationState::NeedUpdate)
    }
}

impl Display for ApplicationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApplicationState::NotClaimable => "not claimable",
            ApplicationState::Claimable => "claimable",
            ApplicationState::Claimed => "claimed",
            ApplicationState::NeedUpdate => "needs update",
        };
        f.write_str(name)
    }
}
