//! The claim lifecycle and local credential store of one application.

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};
use warden_common::{Digest, SnapshotCell, time};
use warden_credentials::{
    AuthMechanism, Guid, IdentityCertificate, KeyPair, ManifestBinding, MembershipCertificate,
    PeerCapabilitySet, PresentedCredentials, PublicKey, TrustAnchors, TrustError, resolve,
    validate_identity_chain, validate_membership_structure,
};
use warden_policy::{
    Glob, Manifest, Ownership, PermissionPolicy, PolicyError, default_policy, defaults::member,
};

use crate::snapshot::Snapshot;
use crate::{
    ApplicationState, Caller, ClaimError, ClaimableError, ConfigError, DenyReason, Handshake,
    IdentityError, MembershipError, Request, ResetError, SecurityConfig, Session,
    UpdatePolicyError, Verdict,
};

#[derive(Debug, Clone)]
struct CachedTrust {
    material: Digest,
    epoch: u64,
    capabilities: PeerCapabilitySet,
}

/// The security state of one local application.
///
/// Reads go through an immutable snapshot that every mutation replaces
/// whole, so [`SecurityApplication::authorize`] never sees a partial
/// update.
pub struct SecurityApplication {
    keys: KeyPair,
    config: SecurityConfig,
    management: Glob,
    clock: fn() -> u64,
    pub(crate) snapshot: SnapshotCell<Snapshot>,
    trust_cache: DashMap<PublicKey, CachedTrust>,
}

impl std::fmt::Debug for SecurityApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityApplication")
            .field("public_key", &self.keys.public_key())
            .field("state", &self.application_state())
            .finish_non_exhaustive()
    }
}

impl SecurityApplication {
    /// Create an unclaimed, not yet claimable application.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the management settings are unusable.
    pub fn new(keys: KeyPair, config: SecurityConfig) -> Result<Self, ConfigError> {
        let management = config.management_glob()?;
        let unclaimed = default_policy(keys.public_key(), &management, None);
        Ok(Self {
            keys,
            config,
            management,
            clock: time::unix_now,
            snapshot: SnapshotCell::new(Snapshot::unclaimed(
                ApplicationState::NotClaimable,
                0,
                unclaimed,
                None,
            )),
            trust_cache: DashMap::new(),
        })
    }

    /// Read certificate time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// This application's key.
    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// The configuration in use.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn application_state(&self) -> ApplicationState {
        self.snapshot.load().state
    }

    /// Allow or refuse claims while unclaimed.
    ///
    /// # Errors
    ///
    /// Returns a [`ClaimableError`] once the application is claimed.
    pub fn set_claimable(&self, claimable: bool) -> Result<(), ClaimableError> {
        self.snapshot.update(|current| {
            if current.state.is_claimed() {
                return Err(ClaimableError {
                    state: current.state,
                });
            }
            let mut next = current.clone();
            next.state = if claimable {
                ApplicationState::Claimable
            } else {
                ApplicationState::NotClaimable
            };
            Ok((next, ()))
        })
    }

    /// Declare the manifest this application wants to run with.
    ///
    /// An application that was not claimable becomes claimable. A claimed
    /// application whose installed manifest differs moves to
    /// [`ApplicationState::NeedUpdate`], and back once they agree again.
    #[instrument(skip_all, fields(app = %self.public_key()))]
    pub fn set_manifest_template(&self, template: Manifest) {
        let Ok(state) = self.snapshot.update(|current| {
            let mut next = current.clone();
            next.manifest_template = Some(template);
            if next.state == ApplicationState::NotClaimable {
                next.state = ApplicationState::Claimable;
            } else if next.state.is_claimed() {
                next.settle_claimed_state();
            }
            let state = next.state;
            Ok::<_, std::convert::Infallible>((next, state))
        });
        info!(%state, "manifest template set");
    }

    /// Take ownership of a claimable application.
    ///
    /// On success the certificate authority becomes the only identity
    /// anchor, the identity and manifest are installed together with the
    /// default policy, and open sessions go stale.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::AlreadyClaimed`] unless the application is
    /// claimable, and a trust error if the identity is not this
    /// application's, is not issued through `certificate_authority` or does
    /// not bind `manifest`.
    #[instrument(
        skip_all,
        fields(app = %self.public_key(), ca = %certificate_authority, group = %admin_group)
    )]
    pub fn claim(
        &self,
        caller: Caller<'_>,
        certificate_authority: PublicKey,
        admin_group: Guid,
        admin_authority: PublicKey,
        identity_chain: Vec<IdentityCertificate>,
        manifest: Manifest,
    ) -> Result<(), ClaimError> {
        let now = (self.clock)();
        self.snapshot
            .update(|current| -> Result<_, ClaimError> {
                if current.state != ApplicationState::Claimable {
                    return Err(ClaimError::AlreadyClaimed {
                        state: current.state,
                    });
                }
                if let Caller::Remote(session) = caller {
                    if session.epoch != current.epoch {
                        return Err(ClaimError::PermissionDenied(DenyReason::SessionExpired));
                    }
                }

                let anchors = TrustAnchors::new().with_identity_anchor(certificate_authority);
                validate_identity_chain(&identity_chain, &self.public_key(), &anchors, now)?;
                self.check_binding::<ClaimError>(&identity_chain, &manifest)?;

                let ownership = Ownership {
                    certificate_authority,
                    admin_group,
                    admin_authority,
                };
                let mut next = current.next_epoch();
                next.default_policy =
                    default_policy(self.public_key(), &self.management, Some(&ownership));
                next.custom_policy = None;
                next.ownership = Some(ownership);
                next.identity = identity_chain;
                next.manifest = manifest;
                next.memberships.clear();
                next.settle_claimed_state();
                next.refresh_anchors();
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "claim rejected"))?;
        self.trust_cache.clear();
        info!("claimed");
        Ok(())
    }

    /// Install a custom policy, replacing the default one or any previous
    /// custom policy. Open sessions go stale.
    ///
    /// # Errors
    ///
    /// Returns [`UpdatePolicyError::PermissionDenied`] before claim or when
    /// a remote caller is not authorized.
    #[instrument(skip_all, fields(app = %self.public_key(), version = policy.version()))]
    pub fn update_policy(
        &self,
        caller: Caller<'_>,
        policy: PermissionPolicy,
    ) -> Result<(), UpdatePolicyError> {
        self.snapshot
            .update(|current| -> Result<_, UpdatePolicyError> {
                self.authorize_management(current, caller, member::UPDATE_POLICY)
                    .map_err(UpdatePolicyError::PermissionDenied)?;
                let mut next = current.next_epoch();
                next.custom_policy = Some(policy);
                next.refresh_anchors();
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "policy update rejected"))?;
        self.trust_cache.clear();
        info!("policy installed");
        Ok(())
    }

    /// Drop the custom policy and go back to the default one.
    ///
    /// # Errors
    ///
    /// Returns [`UpdatePolicyError::PermissionDenied`] before claim or when
    /// a remote caller is not authorized.
    #[instrument(skip_all, fields(app = %self.public_key()))]
    pub fn reset_policy(&self, caller: Caller<'_>) -> Result<(), UpdatePolicyError> {
        self.snapshot
            .update(|current| -> Result<_, UpdatePolicyError> {
                self.authorize_management(current, caller, member::RESET_POLICY)
                    .map_err(UpdatePolicyError::PermissionDenied)?;
                let mut next = current.next_epoch();
                next.custom_policy = None;
                next.refresh_anchors();
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "policy reset rejected"))?;
        self.trust_cache.clear();
        info!("policy reset to default");
        Ok(())
    }

    /// The policy in force.
    pub fn policy(&self) -> PermissionPolicy {
        self.snapshot.load().policy().clone()
    }

    /// The default policy for the current ownership.
    pub fn default_policy(&self) -> PermissionPolicy {
        self.snapshot.load().default_policy.clone()
    }

    /// Version of the policy in force.
    pub fn policy_version(&self) -> u32 {
        self.snapshot.load().policy().version()
    }

    /// Replace the identity chain and manifest. Open sessions go stale.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::PermissionDenied`] before claim or when a
    /// remote caller is not authorized, and a trust error if the chain does
    /// not validate against the current anchors or does not bind `manifest`.
    #[instrument(skip_all, fields(app = %self.public_key()))]
    pub fn update_identity(
        &self,
        caller: Caller<'_>,
        identity_chain: Vec<IdentityCertificate>,
        manifest: Manifest,
    ) -> Result<(), IdentityError> {
        let now = (self.clock)();
        self.snapshot
            .update(|current| -> Result<_, IdentityError> {
                self.authorize_management(current, caller, member::UPDATE_IDENTITY)
                    .map_err(IdentityError::PermissionDenied)?;
                let own_key = self.public_key();
                validate_identity_chain(&identity_chain, &own_key, &current.anchors, now)?;
                self.check_binding::<IdentityError>(&identity_chain, &manifest)?;

                let mut next = current.next_epoch();
                next.identity = identity_chain;
                next.manifest = manifest;
                next.settle_claimed_state();
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "identity update rejected"))?;
        self.trust_cache.clear();
        info!("identity installed");
        Ok(())
    }

    /// The installed identity chain, leaf first.
    pub fn identity(&self) -> Vec<IdentityCertificate> {
        self.snapshot.load().identity.clone()
    }

    /// The installed manifest.
    pub fn manifest(&self) -> Manifest {
        self.snapshot.load().manifest.clone()
    }

    /// Add a membership chain this application presents to peers.
    ///
    /// # Errors
    ///
    /// Always [`MembershipError::PermissionDenied`] before claim. Otherwise
    /// fails when a remote caller is not authorized, when the chain is
    /// malformed or not about this application, or when its leaf is already
    /// installed.
    #[instrument(skip_all, fields(app = %self.public_key()))]
    pub fn install_membership(
        &self,
        caller: Caller<'_>,
        chain: Vec<MembershipCertificate>,
    ) -> Result<(), MembershipError> {
        let now = (self.clock)();
        self.snapshot
            .update(|current| -> Result<_, MembershipError> {
                self.authorize_management(current, caller, member::INSTALL_MEMBERSHIP)
                    .map_err(MembershipError::PermissionDenied)?;
                let (group, _) = validate_membership_structure(&chain, &self.public_key(), now)?;
                let leaf = chain.first().ok_or(TrustError::EmptyChain)?;
                if find_membership(&current.memberships, leaf.serial, &leaf.issuer_public_key)
                    .is_some()
                {
                    return Err(MembershipError::Duplicate {
                        serial: leaf.serial,
                        issuer: leaf.issuer_public_key,
                    });
                }
                debug!(%group, serial = leaf.serial, "membership installed");
                let mut next = current.clone();
                next.memberships.push(chain);
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "membership install rejected"))
    }

    /// Remove the membership chain whose leaf has `serial` and `issuer`.
    ///
    /// # Errors
    ///
    /// Fails before claim, when a remote caller is not authorized, or with
    /// [`MembershipError::NotFound`].
    #[instrument(skip_all, fields(app = %self.public_key(), serial))]
    pub fn remove_membership(
        &self,
        caller: Caller<'_>,
        serial: u64,
        issuer: PublicKey,
    ) -> Result<(), MembershipError> {
        self.snapshot
            .update(|current| -> Result<_, MembershipError> {
                self.authorize_management(current, caller, member::REMOVE_MEMBERSHIP)
                    .map_err(MembershipError::PermissionDenied)?;
                let position = find_membership(&current.memberships, serial, &issuer)
                    .ok_or(MembershipError::NotFound { serial, issuer })?;
                let mut next = current.clone();
                next.memberships.remove(position);
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "membership removal rejected"))
    }

    /// Installed membership chains, in installation order.
    pub fn memberships(&self) -> Vec<Vec<MembershipCertificate>> {
        self.snapshot.load().memberships.clone()
    }

    /// Forget the owner and every installed credential and become
    /// claimable again. The manifest template is kept, and an application
    /// made not claimable with [`Self::set_claimable`] stays that way.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::PermissionDenied`] when a remote caller is not
    /// granted `MODIFY` on the management `Reset` method.
    #[instrument(skip_all, fields(app = %self.public_key()))]
    pub fn reset(&self, caller: Caller<'_>) -> Result<(), ResetError> {
        self.snapshot
            .update(|current| -> Result<_, ResetError> {
                if let Caller::Remote(session) = caller {
                    self.authorize_remote(current, session, member::RESET)
                        .map_err(ResetError::PermissionDenied)?;
                }
                let unclaimed = default_policy(self.public_key(), &self.management, None);
                let state = match current.state {
                    ApplicationState::NotClaimable => ApplicationState::NotClaimable,
                    _ => ApplicationState::Claimable,
                };
                let next = Snapshot::unclaimed(
                    state,
                    current.epoch + 1,
                    unclaimed,
                    current.manifest_template.clone(),
                );
                Ok((next, ()))
            })
            .inspect_err(|error| warn!(%error, "reset rejected"))?;
        self.trust_cache.clear();
        info!("reset");
        Ok(())
    }

    /// Resolve a peer's handshake into a session.
    ///
    /// Sessions negotiated without certificates carry only the peer key and
    /// skip the peer manifest.
    ///
    /// # Errors
    ///
    /// Returns the [`TrustError`] of a certificate-backed handshake whose
    /// identity chain or manifest does not validate.
    #[instrument(skip_all, fields(app = %self.public_key(), peer = %handshake.peer_public_key))]
    pub fn open_session(&self, handshake: &Handshake) -> Result<Session, TrustError> {
        let snapshot = self.snapshot.load();
        let certified = handshake.mechanism.is_certificate_backed();
        let manifest_binding = if certified && self.config.require_manifest_digest {
            handshake
                .manifest
                .binding()
                .map_err(|e| TrustError::Encoding(e.to_string()))?
        } else {
            ManifestBinding::Unchecked
        };
        let presented = PresentedCredentials {
            peer_public_key: handshake.peer_public_key,
            mechanism: handshake.mechanism,
            identity_chain: handshake.identity_chain.clone(),
            membership_chains: handshake.membership_chains.clone(),
            manifest_binding,
        };
        let capabilities = self.resolve_cached(&snapshot, &presented)?;
        debug!(
            certified,
            memberships = capabilities.group_memberships().len(),
            "session opened"
        );
        Ok(Session {
            capabilities,
            mechanism: handshake.mechanism,
            remote_manifest: certified.then(|| handshake.manifest.clone()),
            epoch: snapshot.epoch,
        })
    }

    /// The handshake this application presents when it authenticates to a
    /// peer with certificates.
    pub fn local_handshake(&self) -> Handshake {
        let snapshot = self.snapshot.load();
        Handshake {
            peer_public_key: self.public_key(),
            mechanism: AuthMechanism::EcdheEcdsa,
            identity_chain: snapshot.identity.clone(),
            membership_chains: snapshot.memberships.clone(),
            manifest: snapshot.manifest.clone(),
        }
    }

    fn resolve_cached(
        &self,
        snapshot: &Snapshot,
        presented: &PresentedCredentials,
    ) -> Result<PeerCapabilitySet, TrustError> {
        let now = (self.clock)();
        let material = presented.digest()?;
        let cached = self
            .trust_cache
            .get(&presented.peer_public_key)
            .filter(|entry| entry.material == material && entry.epoch == snapshot.epoch)
            .map(|entry| entry.capabilities.clone());
        if let Some(capabilities) = cached.filter(|_| still_valid(presented, now)) {
            debug!("trust cache hit");
            return Ok(capabilities);
        }

        let capabilities = resolve(presented, &snapshot.anchors, now)?;
        self.trust_cache.insert(
            presented.peer_public_key,
            CachedTrust {
                material,
                epoch: snapshot.epoch,
                capabilities: capabilities.clone(),
            },
        );
        Ok(capabilities)
    }

    fn check_binding<E>(
        &self,
        identity_chain: &[IdentityCertificate],
        manifest: &Manifest,
    ) -> Result<(), E>
    where
        E: From<PolicyError> + From<TrustError>,
    {
        if !self.config.require_manifest_digest {
            return Ok(());
        }
        let leaf = identity_chain.first().ok_or(TrustError::EmptyChain)?;
        manifest.binding()?.check(leaf)?;
        Ok(())
    }

    /// Gate a management operation that needs a claimed application.
    fn authorize_management(
        &self,
        snapshot: &Snapshot,
        caller: Caller<'_>,
        member: &str,
    ) -> Result<(), DenyReason> {
        if !snapshot.state.is_claimed() {
            return Err(DenyReason::NotClaimed);
        }
        match caller {
            Caller::Local => Ok(()),
            Caller::Remote(session) => self.authorize_remote(snapshot, session, member),
        }
    }

    fn authorize_remote(
        &self,
        snapshot: &Snapshot,
        session: &Session,
        member: &str,
    ) -> Result<(), DenyReason> {
        let request = Request::method_call(
            &self.config.management_object_path,
            &self.config.management_interface,
            member,
        );
        match self.decide(snapshot, session, &request) {
            Verdict::Allow => Ok(()),
            Verdict::Deny(reason) => {
                warn!(peer = %session.peer(), member, %reason, "management call denied");
                Err(reason)
            }
        }
    }
}

fn find_membership(
    memberships: &[Vec<MembershipCertificate>],
    serial: u64,
    issuer: &PublicKey,
) -> Option<usize> {
    memberships.iter().position(|chain| {
        chain
            .first()
            .is_some_and(|leaf| leaf.serial == serial && leaf.issuer_public_key == *issuer)
    })
}

/// Whether every presented certificate is still within its validity window.
fn still_valid(presented: &PresentedCredentials, now: u64) -> bool {
    presented
        .identity_chain
        .iter()
        .map(|certificate| certificate.validity)
        .chain(
            presented
                .membership_chains
                .iter()
                .flatten()
                .map(|certificate| certificate.validity),
        )
        .all(|validity| validity.contains(now))
}
