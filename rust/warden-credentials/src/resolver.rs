//! Turns the credentials a peer presented during authentication into a
//! [`PeerCapabilitySet`].

use serde::Serialize;
use tracing::{debug, instrument, warn};
use warden_common::Digest;

use crate::{
    AuthMechanism, IdentityCertificate, ManifestBinding, MembershipCertificate, PeerCapabilitySet,
    PublicKey, TrustAnchors, TrustError, validate_identity_chain, validate_membership_chain,
};

/// Credentials handed over by the authenticator for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentedCredentials {
    /// Key the peer proved possession of.
    pub peer_public_key: PublicKey,
    /// Mechanism the session was authenticated with.
    pub mechanism: AuthMechanism,
    /// Leaf-first identity chain.
    pub identity_chain: Vec<IdentityCertificate>,
    /// Leaf-first membership chains, in any order.
    pub membership_chains: Vec<Vec<MembershipCertificate>>,
    /// Manifest the leaf certificate must bind.
    pub manifest_binding: ManifestBinding,
}

impl PresentedCredentials {
    /// Credentials for a session without certificates.
    pub fn anonymous(peer_public_key: PublicKey, mechanism: AuthMechanism) -> Self {
        Self {
            peer_public_key,
            mechanism,
            identity_chain: Vec::new(),
            membership_chains: Vec::new(),
            manifest_binding: ManifestBinding::Unchecked,
        }
    }

    /// Digest of everything presented. Equal digests resolve identically
    /// against the same anchors at the same time.
    ///
    /// # Errors
    ///
    /// Fails only if the credentials cannot be encoded.
    pub fn digest(&self) -> Result<Digest, TrustError> {
        serde_ipld_dagcbor::to_vec(self)
            .map(|bytes| Digest::hash(&bytes))
            .map_err(|e| TrustError::Encoding(e.to_string()))
    }
}

/// Resolve presented credentials against the local anchors at `now`.
///
/// Sessions authenticated without certificates resolve to an anonymous
/// capability set. Otherwise the identity chain must validate. Membership
/// chains that fail to validate are skipped and never fail the session.
///
/// # Errors
///
/// Returns the [`TrustError`] of the identity chain or of the manifest
/// binding.
#[instrument(skip_all, fields(peer = %presented.peer_public_key, mechanism = %presented.mechanism))]
pub fn resolve(
    presented: &PresentedCredentials,
    anchors: &TrustAnchors,
    now: u64,
) -> Result<PeerCapabilitySet, TrustError> {
    let peer = &presented.peer_public_key;
    if !presented.mechanism.is_certificate_backed() {
        debug!("session is not certificate backed");
        return Ok(PeerCapabilitySet::anonymous(*peer));
    }

    let trusted = validate_identity_chain(&presented.identity_chain, peer, anchors, now)
        .inspect_err(|error| warn!(%error, "rejected identity chain"))?;
    if let Some(leaf) = presented.identity_chain.first() {
        presented.manifest_binding.check(leaf)?;
    }

    let mut capabilities = PeerCapabilitySet::certified(*peer, trusted);
    for (position, chain) in presented.membership_chains.iter().enumerate() {
        match validate_membership_chain(chain, peer, anchors, now) {
            Ok((group, authority)) => {
                debug!(%group, %authority, "membership proven");
                capabilities = capabilities.with_membership(group, authority);
            }
            Err(error) => warn!(position, %error, "ignoring membership chain"),
        }
    }
    Ok(capabilities)
}
