use warden_credentials::{IdentityCertificate, MembershipCertificate, TrustAnchors};
use warden_policy::{Manifest, Ownership, PermissionPolicy};

use crate::ApplicationState;

/// Everything authorization reads, replaced as a whole on every change.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) state: ApplicationState,
    /// Bumped whenever local credentials change. Sessions opened under an
    /// older epoch are stale.
    pub(crate) epoch: u64,
    pub(crate) ownership: Option<Ownership>,
    pub(crate) identity: Vec<IdentityCertificate>,
    pub(crate) manifest: Manifest,
    pub(crate) manifest_template: Option<Manifest>,
    pub(crate) default_policy: PermissionPolicy,
    pub(crate) custom_policy: Option<PermissionPolicy>,
    pub(crate) memberships: Vec<Vec<MembershipCertificate>>,
    pub(crate) anchors: TrustAnchors,
}

impl Snapshot {
    pub(crate) fn unclaimed(
        state: ApplicationState,
        epoch: u64,
        default_policy: PermissionPolicy,
        manifest_template: Option<Manifest>,
    ) -> Self {
        Self {
            state,
            epoch,
            ownership: None,
            identity: Vec::new(),
            manifest: Manifest::empty(),
            manifest_template,
            default_policy,
            custom_policy: None,
            memberships: Vec::new(),
            anchors: TrustAnchors::new(),
        }
    }

    /// The policy in force.
    pub(crate) fn policy(&self) -> &PermissionPolicy {
        self.custom_policy.as_ref().unwrap_or(&self.default_policy)
    }

    /// A copy under the next credential epoch.
    pub(crate) fn next_epoch(&self) -> Self {
        let mut next = self.clone();
        next.epoch += 1;
        next
    }

    /// Recompute anchors from the ownership and the policy in force.
    pub(crate) fn refresh_anchors(&mut self) {
        let mut anchors = TrustAnchors::new();
        if let Some(ownership) = &self.ownership {
            anchors = anchors
                .with_identity_anchor(ownership.certificate_authority)
                .with_group_authority(ownership.admin_group, ownership.admin_authority);
        }
        for (group, authority) in self.policy().group_authorities() {
            anchors = anchors.with_group_authority(group, authority);
        }
        self.anchors = anchors;
    }

    /// `Claimed`, or `NeedUpdate` when the template differs from the
    /// installed manifest.
    pub(crate) fn settle_claimed_state(&mut self) {
        self.state = match &self.manifest_template {
            Some(template) if *template != self.manifest => ApplicationState::NeedUpdate,
            _ => ApplicationState::Claimed,
        };
    }
}
