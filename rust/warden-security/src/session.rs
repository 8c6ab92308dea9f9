use warden_credentials::{
    AuthMechanism, IdentityCertificate, MembershipCertificate, PeerCapabilitySet, PublicKey,
};
use warden_policy::Manifest;

/// What the authenticator learned about a peer while establishing a
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Key the peer proved possession of.
    pub peer_public_key: PublicKey,
    /// Negotiated mechanism.
    pub mechanism: AuthMechanism,
    /// Leaf-first identity chain. Empty unless certificate backed.
    pub identity_chain: Vec<IdentityCertificate>,
    /// Leaf-first membership chains.
    pub membership_chains: Vec<Vec<MembershipCertificate>>,
    /// The peer's manifest.
    pub manifest: Manifest,
}

impl Handshake {
    /// A certificate-backed handshake.
    pub fn certified(
        peer_public_key: PublicKey,
        identity_chain: Vec<IdentityCertificate>,
        manifest: Manifest,
    ) -> Self {
        Self {
            peer_public_key,
            mechanism: AuthMechanism::EcdheEcdsa,
            identity_chain,
            membership_chains: Vec::new(),
            manifest,
        }
    }

    /// A handshake without certificates.
    pub fn uncertified(peer_public_key: PublicKey, mechanism: AuthMechanism) -> Self {
        Self {
            peer_public_key,
            mechanism,
            identity_chain: Vec::new(),
            membership_chains: Vec::new(),
            manifest: Manifest::empty(),
        }
    }

    /// Add a membership chain.
    pub fn with_membership_chain(mut self, chain: Vec<MembershipCertificate>) -> Self {
        self.membership_chains.push(chain);
        self
    }
}

/// One authenticated peer, as seen by one local application.
///
/// A session is bound to the local credentials it was opened under. Once
/// those change every request on it is denied until the peer handshakes
/// again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub(crate) capabilities: PeerCapabilitySet,
    pub(crate) mechanism: AuthMechanism,
    pub(crate) remote_manifest: Option<Manifest>,
    pub(crate) epoch: u64,
}

impl Session {
    /// What the peer proved.
    pub fn capabilities(&self) -> &PeerCapabilitySet {
        &self.capabilities
    }

    /// The peer's key.
    pub fn peer(&self) -> &PublicKey {
        self.capabilities.public_key()
    }

    /// Negotiated mechanism.
    pub fn mechanism(&self) -> AuthMechanism {
        self.mechanism
    }

    /// The peer's manifest, for certificate-backed sessions.
    pub fn remote_manifest(&self) -> Option<&Manifest> {
        self.remote_manifest.as_ref()
    }

    /// Credential epoch the session was opened under.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Who asks for a management operation.
#[derive(Debug, Clone, Copy)]
pub enum Caller<'a> {
    /// The owning application itself.
    Local,
    /// A peer over an authenticated session.
    Remote(&'a Session),
}
