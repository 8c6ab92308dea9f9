use serde::{Deserialize, Serialize};
use warden_credentials::{Guid, PeerCapabilitySet, PublicKey};

/// Which peers an ACL applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerDescriptor {
    /// Every peer, authenticated or not.
    Everyone,
    /// Peers whose session is backed by a validated certificate.
    AnyAuthenticated,
    /// Peers whose identity chain was issued through `key`.
    FromCertificateAuthority {
        /// An issuer key on the peer's chain.
        key: PublicKey,
    },
    /// The peer holding `key`.
    WithPublicKey {
        /// The peer's key.
        key: PublicKey,
    },
    /// Members of `group` as vouched for by `authority`.
    WithMembership {
        /// The security group.
        group: Guid,
        /// The group's authority key.
        authority: PublicKey,
    },
}

impl PeerDescriptor {
    /// Whether a peer with `capabilities` is described.
    pub fn matches(&self, capabilities: &PeerCapabilitySet) -> bool {
        match self {
            PeerDescriptor::Everyone => true,
            PeerDescriptor::AnyAuthenticated => capabilities.is_certificate_backed(),
            PeerDescriptor::FromCertificateAuthority { key } => capabilities.is_issued_by(key),
            PeerDescriptor::WithPublicKey { key } => capabilities.public_key() == key,
            PeerDescriptor::WithMembership { group, authority } => {
                capabilities.is_member(group, authority)
            }
        }
    }
}
