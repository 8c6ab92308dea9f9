//! Identity and membership certificates.
//!
//! Both certificate kinds are signed by their issuer over the DAG-CBOR
//! encoding of every field except the signature itself. The encoding starts
//! with a kind tag so an identity signature can never be replayed as a
//! membership signature or the other way around.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_common::Digest;

use crate::{Guid, KeyPair, PublicKey, Signature};

/// Errors raised while signing or checking a single certificate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// The to-be-signed fields could not be encoded.
    #[error("certificate encoding failed: {0}")]
    Encoding(String),

    /// The signature does not verify under the issuer key.
    #[error("signature does not verify under the issuer key")]
    InvalidSignature,
}

/// Inclusive validity window in seconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validity {
    /// First second at which the certificate is valid.
    pub not_before: u64,
    /// Last second at which the certificate is valid.
    pub not_after: u64,
}

impl Validity {
    /// A window that never closes.
    pub const UNBOUNDED: Validity = Validity {
        not_before: 0,
        not_after: u64::MAX,
    };

    /// Create a validity window.
    pub const fn new(not_before: u64, not_after: u64) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// A window of `seconds` starting at `start`.
    pub const fn starting_at(start: u64, seconds: u64) -> Self {
        Self::new(start, start.saturating_add(seconds))
    }

    /// Whether `now` lies within the window.
    pub fn contains(&self, now: u64) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

impl Default for Validity {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Fields shared by every certificate that chain validation needs.
pub trait Certificate {
    /// Issuer-assigned serial number.
    fn serial(&self) -> u64;

    /// Key the certificate is about.
    fn subject_public_key(&self) -> &PublicKey;

    /// Key that signed the certificate.
    fn issuer_public_key(&self) -> &PublicKey;

    /// When the certificate may be used.
    fn validity(&self) -> &Validity;

    /// Whether the subject may sign further certificates of this kind.
    fn may_issue(&self) -> bool;

    /// Check the signature against [`Certificate::issuer_public_key`].
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::InvalidSignature`] if it does not verify.
    fn verify_signature(&self) -> Result<(), CertificateError>;
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CertificateError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| CertificateError::Encoding(e.to_string()))
}

/// Certificate binding a peer guid and key to an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificate {
    /// Issuer-assigned serial number.
    pub serial: u64,
    /// Guid of the peer this certificate identifies.
    pub subject: Guid,
    /// Key of the peer this certificate identifies.
    pub subject_public_key: PublicKey,
    /// Key that signed this certificate.
    pub issuer_public_key: PublicKey,
    /// Whether the subject is a certificate authority.
    pub is_ca: bool,
    /// When this certificate may be used.
    pub validity: Validity,
    /// Digest of the subject's manifest, if one is bound.
    pub manifest_digest: Option<Digest>,
    /// Issuer signature over every other field.
    pub signature: Signature,
}

#[derive(Serialize)]
struct IdentityTbs<'a> {
    kind: &'static str,
    serial: u64,
    subject: &'a Guid,
    subject_public_key: &'a PublicKey,
    issuer_public_key: &'a PublicKey,
    is_ca: bool,
    validity: &'a Validity,
    manifest_digest: &'a Option<Digest>,
}

impl IdentityCertificate {
    /// Start building a certificate for `subject`.
    pub fn builder(subject: Guid, subject_public_key: PublicKey) -> IdentityCertificateBuilder {
        IdentityCertificateBuilder {
            serial: 0,
            subject,
            subject_public_key,
            is_ca: false,
            validity: Validity::UNBOUNDED,
            manifest_digest: None,
        }
    }

    fn to_be_signed(&self) -> Result<Vec<u8>, CertificateError> {
        encode(&IdentityTbs {
            kind: "identity",
            serial: self.serial,
            subject: &self.subject,
            subject_public_key: &self.subject_public_key,
            issuer_public_key: &self.issuer_public_key,
            is_ca: self.is_ca,
            validity: &self.validity,
            manifest_digest: &self.manifest_digest,
        })
    }

    /// Digest over the complete certificate, signature included.
    ///
    /// # Errors
    ///
    /// Fails only if the certificate cannot be encoded.
    pub fn digest(&self) -> Result<Digest, CertificateError> {
        Ok(Digest::hash(&encode(self)?))
    }
}

impl Certificate for IdentityCertificate {
    fn serial(&self) -> u64 {
        self.serial
    }

    fn subject_public_key(&self) -> &PublicKey {
        &self.subject_public_key
    }

    fn issuer_public_key(&self) -> &PublicKey {
        &self.issuer_public_key
    }

    fn validity(&self) -> &Validity {
        &self.validity
    }

    fn may_issue(&self) -> bool {
        self.is_ca
    }

    fn verify_signature(&self) -> Result<(), CertificateError> {
        self.issuer_public_key
            .verify(&self.to_be_signed()?, &self.signature)
            .map_err(|_| CertificateError::InvalidSignature)
    }
}

/// Builder for [`IdentityCertificate`].
#[derive(Debug, Clone)]
pub struct IdentityCertificateBuilder {
    serial: u64,
    subject: Guid,
    subject_public_key: PublicKey,
    is_ca: bool,
    validity: Validity,
    manifest_digest: Option<Digest>,
}

impl IdentityCertificateBuilder {
    /// Set the serial number.
    pub fn serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    /// Mark the subject as a certificate authority.
    pub fn ca(mut self, is_ca: bool) -> Self {
        self.is_ca = is_ca;
        self
    }

    /// Set the validity window.
    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    /// Bind a manifest digest.
    pub fn manifest_digest(mut self, digest: Digest) -> Self {
        self.manifest_digest = Some(digest);
        self
    }

    /// Sign the certificate with `issuer`.
    ///
    /// # Errors
    ///
    /// Fails only if the certificate cannot be encoded.
    pub fn sign(self, issuer: &KeyPair) -> Result<IdentityCertificate, CertificateError> {
        let mut certificate = IdentityCertificate {
            serial: self.serial,
            subject: self.subject,
            subject_public_key: self.subject_public_key,
            issuer_public_key: issuer.public_key(),
            is_ca: self.is_ca,
            validity: self.validity,
            manifest_digest: self.manifest_digest,
            signature: Signature::from([0; 64]),
        };
        certificate.signature = issuer.sign(&certificate.to_be_signed()?);
        Ok(certificate)
    }
}

/// Certificate proving that a peer belongs to a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCertificate {
    /// Issuer-assigned serial number.
    pub serial: u64,
    /// Guid of the member.
    pub subject: Guid,
    /// Key of the member.
    pub subject_public_key: PublicKey,
    /// The security group.
    pub group: Guid,
    /// Key that signed this certificate.
    pub issuer_public_key: PublicKey,
    /// Whether the member may issue memberships of the same group.
    pub delegate: bool,
    /// When this certificate may be used.
    pub validity: Validity,
    /// Issuer signature over every other field.
    pub signature: Signature,
}

#[derive(Serialize)]
struct MembershipTbs<'a> {
    kind: &'static str,
    serial: u64,
    subject: &'a Guid,
    subject_public_key: &'a PublicKey,
    group: &'a Guid,
    issuer_public_key: &'a PublicKey,
    delegate: bool,
    validity: &'a Validity,
}

impl MembershipCertificate {
    /// Start building a membership of `group` for `subject`.
    pub fn builder(
        subject: Guid,
        subject_public_key: PublicKey,
        group: Guid,
    ) -> MembershipCertificateBuilder {
        MembershipCertificateBuilder {
            serial: 0,
            subject,
            subject_public_key,
            group,
            delegate: false,
            validity: Validity::UNBOUNDED,
        }
    }

    fn to_be_signed(&self) -> Result<Vec<u8>, CertificateError> {
        encode(&MembershipTbs {
            kind: "membership",
            serial: self.serial,
            subject: &self.subject,
            subject_public_key: &self.subject_public_key,
            group: &self.group,
            issuer_public_key: &self.issuer_public_key,
            delegate: self.delegate,
            validity: &self.validity,
        })
    }

    /// Digest over the complete certificate, signature included.
    ///
    /// # Errors
    ///
    /// Fails only if the certificate cannot be encoded.
    pub fn digest(&self) -> Result<Digest, CertificateError> {
        Ok(Digest::hash(&encode(self)?))
    }
}

impl Certificate for MembershipCertificate {
    fn serial(&self) -> u64 {
        self.serial
    }

    fn subject_public_key(&self) -> &PublicKey {
        &self.subject_public_key
    }

    fn issuer_public_key(&self) -> &PublicKey {
        &self.issuer_public_key
    }

    fn validity(&self) -> &Validity {
        &self.validity
    }

    fn may_issue(&self) -> bool {
        self.delegate
    }

    fn verify_signature(&self) -> Result<(), CertificateError> {
        self.issuer_public_key
            .verify(&self.to_be_signed()?, &self.signature)
            .map_err(|_| CertificateError::InvalidSignature)
    }
}

/// Builder for [`MembershipCertificate`].
#[derive(Debug, Clone)]
pub struct MembershipCertificateBuilder {
    serial: u64,
    subject: Guid,
    subject_public_key: PublicKey,
    group: Guid,
    delegate: bool,
    validity: Validity,
}

impl MembershipCertificateBuilder {
    /// Set the serial number.
    pub fn serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    /// Allow the member to issue further memberships of the group.
    pub fn delegate(mut self, delegate: bool) -> Self {
        self.delegate = delegate;
        self
    }

    /// Set the validity window.
    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    /// Sign the certificate with `issuer`.
    ///
    /// # Errors
    ///
    /// Fails only if the certificate cannot be encoded.
    pub fn sign(self, issuer: &KeyPair) -> Result<MembershipCertificate, CertificateError> {
        let mut certificate = MembershipCertificate {
            serial: self.serial,
            subject: self.subject,
            subject_public_key: self.subject_public_key,
            group: self.group,
            issuer_public_key: issuer.public_key(),
            delegate: self.delegate,
            validity: self.validity,
            signature: Signature::from([0; 64]),
        };
        certificate.signature = issuer.sign(&certificate.to_be_signed()?);
        Ok(certificate)
    }
}
