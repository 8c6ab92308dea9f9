use tracing::{instrument, trace};
use warden_policy::{ActionSet, cap};

use crate::snapshot::Snapshot;
use crate::{ApplicationState, DenyReason, Request, SecurityApplication, Session};

/// Outcome of authorizing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The message may proceed.
    Allow,
    /// The message must be dropped, or answered with
    /// [`crate::PERMISSION_DENIED`] when it expects a reply.
    Deny(DenyReason),
}

impl Verdict {
    /// Whether the message may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// `Ok` when allowed, the reason otherwise.
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Verdict::Allow => Ok(()),
            Verdict::Deny(reason) => Err(reason),
        }
    }
}

impl SecurityApplication {
    /// Decide whether `request` may travel over `session`.
    ///
    /// The verdict depends only on the session, the request and the local
    /// credentials in force when the call starts. A concurrent policy or
    /// identity change applies to it entirely or not at all.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            peer = %session.peer(),
            path = request.object_path,
            interface = request.interface_name,
            member = request.member_name,
        )
    )]
    pub fn authorize(&self, session: &Session, request: &Request<'_>) -> Verdict {
        let snapshot = self.snapshot.load();
        let verdict = self.decide(&snapshot, session, request);
        trace!(?verdict);
        verdict
    }

    pub(crate) fn decide(
        &self,
        snapshot: &Snapshot,
        session: &Session,
        request: &Request<'_>,
    ) -> Verdict {
        if self
            .config()
            .is_non_secure(request.interface_name, request.member_name)
        {
            return Verdict::Allow;
        }
        if session.epoch != snapshot.epoch {
            return Verdict::Deny(DenyReason::SessionExpired);
        }
        // Any peer may claim a claimable application, and none may once it
        // has an owner.
        if request.interface_name == self.config().claimable_interface {
            return if snapshot.state == ApplicationState::Claimable {
                Verdict::Allow
            } else {
                Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
            };
        }

        let required = request.required_action();
        let target = request.target();
        let granted = snapshot.policy().matches(&session.capabilities, &target);
        if !granted.grants(required) {
            return Verdict::Deny(DenyReason::NotAuthorizedByPolicy);
        }

        // An unclaimed application has no manifest to hold itself to.
        if snapshot.state.is_claimed() {
            let local = snapshot.manifest.allowed(&target);
            let remote = session
                .remote_manifest
                .as_ref()
                .map_or(ActionSet::FULL, |manifest| manifest.allowed(&target));
            if cap(required, local, remote) != required {
                return Verdict::Deny(DenyReason::ExceedsManifest);
            }
        }
        Verdict::Allow
    }
}

#[cfg(test)]
mod tests {
    use warden_credentials::{IdentityCertificate, KeyPair, Validity};
    use warden_policy::{Glob, Manifest, MemberRule, Rule};

    use super::*;
    use crate::{Caller, Handshake, SecurityConfig};

    fn chat_manifest(actions: ActionSet) -> Manifest {
        Manifest::new(vec![
            Rule::new(Glob::any(), Glob::parse("org.example.Chat").unwrap())
                .with_member(MemberRule::any(actions)),
        ])
        .unwrap()
    }

    fn identity(
        subject: &KeyPair,
        issuer: &KeyPair,
        manifest: &Manifest,
    ) -> Vec<IdentityCertificate> {
        vec![
            IdentityCertificate::builder(warden_credentials::Guid::new(1), subject.public_key())
                .validity(Validity::UNBOUNDED)
                .manifest_digest(manifest.digest().unwrap())
                .sign(issuer)
                .unwrap(),
        ]
    }

    fn claimed(app: &KeyPair, ca: &KeyPair, manifest: Manifest) -> SecurityApplication {
        let application =
            SecurityApplication::new(app.clone(), SecurityConfig::default()).unwrap();
        application.set_claimable(true).unwrap();
        application
            .claim(
                Caller::Local,
                ca.public_key(),
                warden_credentials::Guid::new(0xad),
                ca.public_key(),
                identity(app, ca, &manifest),
                manifest,
            )
            .unwrap();
        application
    }

    #[test_log::test]
    fn it_denies_what_the_local_manifest_excludes() {
        let (app, ca, peer) = (
            KeyPair::from_seed(&[1; 32]),
            KeyPair::from_seed(&[2; 32]),
            KeyPair::from_seed(&[3; 32]),
        );
        let application = claimed(&app, &ca, chat_manifest(ActionSet::OBSERVE));
        let peer_manifest = chat_manifest(ActionSet::FULL);
        let session = application
            .open_session(&Handshake::certified(
                peer.public_key(),
                identity(&peer, &ca, &peer_manifest),
                peer_manifest,
            ))
            .unwrap();

        let get = Request::property_get("/chat", "org.example.Chat", "Topic");
        let call = Request::method_call("/chat", "org.example.Chat", "Send");
        assert_eq!(application.authorize(&session, &get), Verdict::Allow);
        assert_eq!(
            application.authorize(&session, &call),
            Verdict::Deny(DenyReason::ExceedsManifest)
        );
    }

    #[test_log::test]
    fn it_opens_the_claim_call_only_while_claimable() {
        let application =
            SecurityApplication::new(KeyPair::from_seed(&[1; 32]), SecurityConfig::default())
                .unwrap();
        let claim = Request::method_call(
            warden_policy::defaults::SECURITY_OBJECT_PATH,
            warden_policy::defaults::CLAIMABLE_APPLICATION_INTERFACE,
            warden_policy::defaults::member::CLAIM,
        );
        let session = application
            .open_session(&Handshake::uncertified(
                KeyPair::from_seed(&[3; 32]).public_key(),
                warden_credentials::AuthMechanism::EcdheNull,
            ))
            .unwrap();
        assert_eq!(
            application.authorize(&session, &claim),
            Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
        );
        application.set_claimable(true).unwrap();
        assert_eq!(application.authorize(&session, &claim), Verdict::Allow);
    }

    #[test_log::test]
    fn it_lets_non_secure_interfaces_through_stale_sessions() {
        let (app, ca, peer) = (
            KeyPair::from_seed(&[1; 32]),
            KeyPair::from_seed(&[2; 32]),
            KeyPair::from_seed(&[3; 32]),
        );
        let application = claimed(&app, &ca, chat_manifest(ActionSet::FULL));
        let session = application
            .open_session(&Handshake::uncertified(
                peer.public_key(),
                warden_credentials::AuthMechanism::EcdheNull,
            ))
            .unwrap();
        application.reset_policy(Caller::Local).unwrap();

        let ping = Request::method_call("/", "org.freedesktop.DBus.Peer", "Ping");
        let chat = Request::method_call("/chat", "org.example.Chat", "Send");
        assert!(application.authorize(&session, &ping).is_allowed());
        assert_eq!(
            application.authorize(&session, &chat).into_result(),
            Err(DenyReason::SessionExpired)
        );
    }
}
