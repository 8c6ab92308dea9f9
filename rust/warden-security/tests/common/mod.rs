#![allow(dead_code)]

use warden_credentials::{
    Guid, IdentityCertificate, KeyPair, MembershipCertificate, PublicKey, Validity,
};
use warden_policy::{ActionSet, Glob, Manifest, MemberKind, MemberRule, Rule};
use warden_security::{Caller, Handshake, SecurityApplication, SecurityConfig, Session};

pub const NOW: u64 = 1_700_000_000;

pub fn clock() -> u64 {
    NOW
}

pub struct Party {
    pub guid: Guid,
    pub key: KeyPair,
}

impl Party {
    pub fn new(seed: u8) -> Self {
        Self {
            guid: Guid::new(u128::from(seed)),
            key: KeyPair::from_seed(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }
}

pub fn identity(subject: &Party, issuer: &Party, manifest: &Manifest) -> IdentityCertificate {
    let builder = IdentityCertificate::builder(subject.guid, subject.public_key())
        .validity(Validity::starting_at(NOW - 60, 3600));
    let builder = if manifest.is_empty() {
        builder
    } else {
        builder.manifest_digest(manifest.digest().unwrap())
    };
    builder.sign(&issuer.key).unwrap()
}

pub fn membership(
    subject: &Party,
    issuer: &Party,
    group: Guid,
    delegate: bool,
) -> MembershipCertificate {
    MembershipCertificate::builder(subject.guid, subject.public_key(), group)
        .delegate(delegate)
        .validity(Validity::starting_at(NOW - 60, 3600))
        .sign(&issuer.key)
        .unwrap()
}

/// Every action on one interface.
pub fn interface_manifest(interface: &str, actions: ActionSet) -> Manifest {
    Manifest::new(vec![
        Rule::new(Glob::any(), Glob::parse(interface).unwrap())
            .with_member(MemberRule::any(actions)),
    ])
    .unwrap()
}

/// One method of one interface.
pub fn method_rule(interface: &str, method: &str, actions: ActionSet) -> Rule {
    Rule::new(Glob::any(), Glob::parse(interface).unwrap()).with_member(MemberRule::new(
        Glob::parse(method).unwrap(),
        MemberKind::MethodCall,
        actions,
    ))
}

pub fn everything() -> Manifest {
    Manifest::new(vec![Rule::everything(ActionSet::FULL)]).unwrap()
}

/// A claimable application with a fixed clock.
pub fn application(app: &Party) -> SecurityApplication {
    let application = SecurityApplication::new(app.key.clone(), SecurityConfig::default())
        .unwrap()
        .with_clock(clock);
    application.set_claimable(true).unwrap();
    application
}

/// An application claimed by `ca`, administered by members of
/// `admin_group` under `admin`.
pub fn claimed(
    app: &Party,
    ca: &Party,
    admin_group: Guid,
    admin: &Party,
    manifest: Manifest,
) -> SecurityApplication {
    let application = application(app);
    application
        .claim(
            Caller::Local,
            ca.public_key(),
            admin_group,
            admin.public_key(),
            vec![identity(app, ca, &manifest)],
            manifest,
        )
        .unwrap();
    application
}

/// Open a certificate-backed session for `peer`.
pub fn connect(
    application: &SecurityApplication,
    peer: &Party,
    ca: &Party,
    manifest: Manifest,
    memberships: Vec<Vec<MembershipCertificate>>,
) -> Session {
    let handshake = memberships.into_iter().fold(
        Handshake::certified(
            peer.public_key(),
            vec![identity(peer, ca, &manifest)],
            manifest,
        ),
        Handshake::with_membership_chain,
    );
    application.open_session(&handshake).unwrap()
}
