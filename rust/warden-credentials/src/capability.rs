use std::collections::BTreeSet;

use crate::{Guid, PublicKey};

/// Everything the local application has established about one remote peer
/// for the lifetime of a session.
///
/// Built once by [`crate::resolve`] and never refreshed. A change to the
/// local credentials invalidates the session instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCapabilitySet {
    public_key: PublicKey,
    certificate_backed: bool,
    trusted_anchors: BTreeSet<PublicKey>,
    group_memberships: BTreeSet<(Guid, PublicKey)>,
}

impl PeerCapabilitySet {
    /// A peer authenticated by key alone.
    pub fn anonymous(public_key: PublicKey) -> Self {
        Self {
            public_key,
            certificate_backed: false,
            trusted_anchors: BTreeSet::new(),
            group_memberships: BTreeSet::new(),
        }
    }

    /// A peer whose identity chain validated against `trusted_anchors`.
    pub fn certified(public_key: PublicKey, trusted_anchors: BTreeSet<PublicKey>) -> Self {
        Self {
            public_key,
            certificate_backed: true,
            trusted_anchors,
            group_memberships: BTreeSet::new(),
        }
    }

    /// Record a proven membership.
    pub fn with_membership(mut self, group: Guid, authority: PublicKey) -> Self {
        self.group_memberships.insert((group, authority));
        self
    }

    /// The key the peer authenticated with.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Whether the session was established with a validated certificate.
    pub fn is_certificate_backed(&self) -> bool {
        self.certificate_backed
    }

    /// Issuer keys of the peer's identity chain, anchor included.
    pub fn trusted_anchors(&self) -> &BTreeSet<PublicKey> {
        &self.trusted_anchors
    }

    /// Proven `(group, authority)` memberships.
    pub fn group_memberships(&self) -> &BTreeSet<(Guid, PublicKey)> {
        &self.group_memberships
    }

    /// Whether `key` issued any certificate of the peer's identity chain.
    pub fn is_issued_by(&self, key: &PublicKey) -> bool {
        self.trusted_anchors.contains(key)
    }

    /// Whether the peer proved membership of `group` under `authority`.
    pub fn is_member(&self, group: &Guid, authority: &PublicKey) -> bool {
        self.group_memberships.contains(&(*group, *authority))
    }
}
