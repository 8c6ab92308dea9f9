//! Certificate-chain validation against trust anchors.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use warden_common::Digest;

use crate::{
    Certificate, CertificateError, Guid, IdentityCertificate, MembershipCertificate, PublicKey,
};

/// Reasons a certificate chain is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    /// No certificates were presented.
    #[error("certificate chain is empty")]
    EmptyChain,

    /// The leaf certificate is about a different key than the authenticated peer.
    #[error("leaf certificate subject {subject} is not the authenticated peer {peer}")]
    SubjectKeyMismatch {
        /// Key named by the leaf certificate.
        subject: PublicKey,
        /// Key the peer authenticated with.
        peer: PublicKey,
    },

    /// A certificate is not valid yet.
    #[error("certificate {index} is not valid until {not_before}")]
    NotYetValid {
        /// Position in the leaf-first chain.
        index: usize,
        /// Start of the validity window.
        not_before: u64,
    },

    /// A certificate has expired.
    #[error("certificate {index} expired at {not_after}")]
    Expired {
        /// Position in the leaf-first chain.
        index: usize,
        /// End of the validity window.
        not_after: u64,
    },

    /// A signature does not verify under its issuer key.
    #[error("certificate {index} has an invalid signature")]
    InvalidSignature {
        /// Position in the leaf-first chain.
        index: usize,
    },

    /// A certificate's issuer is not the subject of the next certificate.
    #[error("certificate {index} is not issued by the next certificate in the chain")]
    BrokenChain {
        /// Position in the leaf-first chain.
        index: usize,
    },

    /// An issuing identity certificate is not marked as a CA.
    #[error("certificate {index} issues another certificate but is not a CA")]
    NotCertificateAuthority {
        /// Position in the leaf-first chain.
        index: usize,
    },

    /// The chain does not end at a configured anchor.
    #[error("chain does not terminate at a trusted anchor")]
    UntrustedIssuer,

    /// A membership chain mixes security groups.
    #[error("membership certificate {index} is for group {found}, expected {expected}")]
    GroupMismatch {
        /// Position in the leaf-first chain.
        index: usize,
        /// Group of the leaf certificate.
        expected: Guid,
        /// Group found at `index`.
        found: Guid,
    },

    /// An issuing membership certificate does not allow delegation.
    #[error("membership certificate {index} issues another membership but is not a delegate")]
    NotDelegate {
        /// Position in the leaf-first chain.
        index: usize,
    },

    /// The presented manifest is not the one bound by the leaf certificate.
    #[error("manifest does not match the digest bound by the identity certificate")]
    ManifestDigestMismatch,

    /// A certificate could not be encoded for verification.
    #[error("certificate encoding failed: {0}")]
    Encoding(String),
}

impl TrustError {
    fn from_certificate(index: usize, error: CertificateError) -> Self {
        match error {
            CertificateError::InvalidSignature => TrustError::InvalidSignature { index },
            CertificateError::Encoding(message) => TrustError::Encoding(message),
        }
    }
}

/// Keys the local application trusts to root certificate chains.
///
/// Identity anchors root identity chains. Group authorities root
/// membership chains, one authority set per security group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchors {
    identity: BTreeSet<PublicKey>,
    authorities: BTreeSet<(Guid, PublicKey)>,
}

impl TrustAnchors {
    /// An empty anchor set. Nothing validates against it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity anchor.
    pub fn with_identity_anchor(mut self, key: PublicKey) -> Self {
        self.identity.insert(key);
        self
    }

    /// Add a security-group authority.
    pub fn with_group_authority(mut self, group: Guid, authority: PublicKey) -> Self {
        self.authorities.insert((group, authority));
        self
    }

    /// Whether `key` roots identity chains.
    pub fn is_identity_anchor(&self, key: &PublicKey) -> bool {
        self.identity.contains(key)
    }

    /// Whether `key` is an authority for `group`.
    pub fn is_group_authority(&self, group: &Guid, key: &PublicKey) -> bool {
        self.authorities.contains(&(*group, *key))
    }

    /// Identity anchors in key order.
    pub fn identity_anchors(&self) -> impl Iterator<Item = &PublicKey> {
        self.identity.iter()
    }

    /// Group authorities in `(group, key)` order.
    pub fn group_authorities(&self) -> impl Iterator<Item = &(Guid, PublicKey)> {
        self.authorities.iter()
    }

    /// Whether there are no anchors of either kind.
    pub fn is_empty(&self) -> bool {
        self.identity.is_empty() && self.authorities.is_empty()
    }
}

/// What the peer's manifest must match in its leaf identity certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ManifestBinding {
    /// Manifest binding is not checked.
    #[default]
    Unchecked,
    /// The peer presented no manifest rules; the leaf must bind no digest.
    Unbound,
    /// The peer presented a manifest with this digest.
    Bound(Digest),
}

impl ManifestBinding {
    /// Check the binding against a leaf certificate.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ManifestDigestMismatch`] on any difference.
    pub fn check(&self, leaf: &IdentityCertificate) -> Result<(), TrustError> {
        let matches = match self {
            ManifestBinding::Unchecked => true,
            ManifestBinding::Unbound => leaf.manifest_digest.is_none(),
            ManifestBinding::Bound(digest) => leaf.manifest_digest.as_ref() == Some(digest),
        };
        if matches {
            Ok(())
        } else {
            Err(TrustError::ManifestDigestMismatch)
        }
    }
}

fn check_leaf<C: Certificate>(chain: &[C], peer: &PublicKey) -> Result<(), TrustError> {
    let leaf = chain.first().ok_or(TrustError::EmptyChain)?;
    if leaf.subject_public_key() != peer {
        return Err(TrustError::SubjectKeyMismatch {
            subject: *leaf.subject_public_key(),
            peer: *peer,
        });
    }
    Ok(())
}

fn check_certificates<C: Certificate>(chain: &[C], now: u64) -> Result<(), TrustError> {
    for (index, certificate) in chain.iter().enumerate() {
        let validity = certificate.validity();
        if now < validity.not_before {
            return Err(TrustError::NotYetValid {
                index,
                not_before: validity.not_before,
            });
        }
        if now > validity.not_after {
            return Err(TrustError::Expired {
                index,
                not_after: validity.not_after,
            });
        }
        certificate
            .verify_signature()
            .map_err(|error| TrustError::from_certificate(index, error))?;
    }
    Ok(())
}

fn check_links<C: Certificate>(
    chain: &[C],
    not_issuer: impl Fn(usize) -> TrustError,
) -> Result<(), TrustError> {
    for (index, pair) in chain.windows(2).enumerate() {
        let (child, parent) = (&pair[0], &pair[1]);
        if child.issuer_public_key() != parent.subject_public_key() {
            return Err(TrustError::BrokenChain { index });
        }
        if !parent.may_issue() {
            return Err(not_issuer(index + 1));
        }
    }
    Ok(())
}

/// Validate a leaf-first identity chain presented by `peer`.
///
/// Returns every issuer key on the chain together with the anchor it
/// terminates at.
///
/// # Errors
///
/// Returns the first [`TrustError`] found, checking the leaf, then every
/// certificate's validity and signature, then the links, then the anchor.
pub fn validate_identity_chain(
    chain: &[IdentityCertificate],
    peer: &PublicKey,
    anchors: &TrustAnchors,
    now: u64,
) -> Result<BTreeSet<PublicKey>, TrustError> {
    check_leaf(chain, peer)?;
    check_certificates(chain, now)?;
    check_links(chain, |index| TrustError::NotCertificateAuthority { index })?;

    let root = chain.last().ok_or(TrustError::EmptyChain)?;
    let anchor = if root.is_ca && anchors.is_identity_anchor(&root.subject_public_key) {
        root.subject_public_key
    } else if anchors.is_identity_anchor(&root.issuer_public_key) {
        root.issuer_public_key
    } else {
        return Err(TrustError::UntrustedIssuer);
    };

    let mut trusted: BTreeSet<PublicKey> = chain.iter().map(|c| c.issuer_public_key).collect();
    trusted.insert(anchor);
    Ok(trusted)
}

/// Check a leaf-first membership chain for `peer` without regard to who
/// issued its root.
///
/// Returns the chain's group and the key that issued its root certificate.
///
/// # Errors
///
/// Returns the first [`TrustError`] found in the leaf, the group, the
/// certificates or the links.
pub fn validate_membership_structure(
    chain: &[MembershipCertificate],
    peer: &PublicKey,
    now: u64,
) -> Result<(Guid, PublicKey), TrustError> {
    check_leaf(chain, peer)?;
    let group = chain[0].group;
    for (index, certificate) in chain.iter().enumerate().skip(1) {
        if certificate.group != group {
            return Err(TrustError::GroupMismatch {
                index,
                expected: group,
                found: certificate.group,
            });
        }
    }
    check_certificates(chain, now)?;
    check_links(chain, |index| TrustError::NotDelegate { index })?;

    let root = chain.last().ok_or(TrustError::EmptyChain)?;
    Ok((group, root.issuer_public_key))
}

/// Validate a leaf-first membership chain presented by `peer`.
///
/// Returns the `(group, authority)` pair the chain proves.
///
/// # Errors
///
/// Returns the first [`TrustError`] found. A root not issued by an
/// authority of the chain's group is [`TrustError::UntrustedIssuer`].
pub fn validate_membership_chain(
    chain: &[MembershipCertificate],
    peer: &PublicKey,
    anchors: &TrustAnchors,
    now: u64,
) -> Result<(Guid, PublicKey), TrustError> {
    let (group, issuer) = validate_membership_structure(chain, peer, now)?;
    if anchors.is_group_authority(&group, &issuer) {
        Ok((group, issuer))
    } else {
        Err(TrustError::UntrustedIssuer)
    }
}
