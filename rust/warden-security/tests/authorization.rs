mod common;

use common::*;
use pretty_assertions::assert_eq;
use warden_credentials::{AuthMechanism, Guid, IdentityCertificate, TrustError, Validity};
use warden_policy::{
    Acl, ActionSet, Glob, MemberKind, MemberRule, PeerDescriptor, PermissionPolicy, Rule,
    defaults::{MANAGED_APPLICATION_INTERFACE, SECURITY_OBJECT_PATH, member},
};
use warden_security::{
    ApplicationState, Caller, DenyReason, Direction, Handshake, Request, ResetError,
    SecurityApplication, SecurityConfig, Verdict,
};

const CHAT: &str = "org.example.Chat";
const ADMINS: Guid = Guid::new(0xad);

struct World {
    app: Party,
    ca: Party,
    admin: Party,
    peer: Party,
}

fn world() -> World {
    World {
        app: Party::new(1),
        ca: Party::new(2),
        admin: Party::new(3),
        peer: Party::new(5),
    }
}

fn send() -> Request<'static> {
    Request::method_call("/chat", CHAT, "Send")
}

fn topic() -> Request<'static> {
    Request::property_get("/chat", CHAT, "Topic")
}

fn chat_rule(actions: ActionSet) -> Rule {
    Rule::new(Glob::any(), Glob::parse(CHAT).unwrap()).with_member(MemberRule::any(actions))
}

#[test_log::test]
fn it_returns_the_same_verdict_for_the_same_inputs() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    let first = connect(&application, &w.peer, &w.ca, everything(), vec![]);
    let second = connect(&application, &w.peer, &w.ca, everything(), vec![]);
    assert_eq!(first, second);

    let denied = Request::method_call("/chat", "org.example.Other", "Send");
    for _ in 0..3 {
        assert_eq!(application.authorize(&first, &send()), Verdict::Allow);
        assert_eq!(application.authorize(&second, &send()), Verdict::Allow);
        assert_eq!(
            application.authorize(&first, &denied),
            application.authorize(&second, &denied)
        );
    }
}

#[test_log::test]
fn it_installs_the_same_policy_idempotently() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    let policy = PermissionPolicy::new(
        3,
        vec![Acl::new(
            vec![PeerDescriptor::AnyAuthenticated],
            vec![chat_rule(ActionSet::OBSERVE)],
        )],
    )
    .unwrap();

    let mut verdicts = Vec::new();
    for _ in 0..2 {
        application
            .update_policy(Caller::Local, policy.clone())
            .unwrap();
        assert_eq!(application.policy(), policy);
        assert_eq!(application.policy_version(), 3);
        let session = connect(&application, &w.peer, &w.ca, everything(), vec![]);
        verdicts.push((
            application.authorize(&session, &topic()),
            application.authorize(&session, &send()),
        ));
    }
    assert_eq!(verdicts[0], verdicts[1]);
    assert_eq!(
        verdicts[0],
        (
            Verdict::Allow,
            Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
        )
    );
}

#[test_log::test]
fn it_unions_grants_of_every_applicable_acl() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    let policy = PermissionPolicy::new(
        1,
        vec![
            Acl::new(
                vec![PeerDescriptor::Everyone],
                vec![chat_rule(ActionSet::OBSERVE)],
            ),
            Acl::new(
                vec![PeerDescriptor::FromCertificateAuthority {
                    key: w.ca.public_key(),
                }],
                vec![method_rule(CHAT, "Send", ActionSet::MODIFY)],
            ),
        ],
    )
    .unwrap();
    application.update_policy(Caller::Local, policy).unwrap();

    let certified = connect(&application, &w.peer, &w.ca, everything(), vec![]);
    let anonymous = application
        .open_session(&Handshake::uncertified(
            Party::new(6).public_key(),
            AuthMechanism::EcdheNull,
        ))
        .unwrap();

    assert_eq!(application.authorize(&certified, &topic()), Verdict::Allow);
    assert_eq!(application.authorize(&certified, &send()), Verdict::Allow);
    assert_eq!(
        application.authorize(&certified, &Request::method_call("/chat", CHAT, "Delete")),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
    assert_eq!(application.authorize(&anonymous, &topic()), Verdict::Allow);
    assert_eq!(
        application.authorize(&anonymous, &send()),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_never_lets_a_manifest_widen_the_policy() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    let session = connect(
        &application,
        &w.peer,
        &w.ca,
        interface_manifest(CHAT, ActionSet::OBSERVE),
        vec![],
    );

    assert_eq!(application.authorize(&session, &topic()), Verdict::Allow);
    assert_eq!(
        application.authorize(&session, &send()),
        Verdict::Deny(DenyReason::ExceedsManifest)
    );
    assert_eq!(
        application.authorize(&session, &Request::method_call("/lamp", "org.example.Lamp", "On")),
        Verdict::Deny(DenyReason::ExceedsManifest)
    );

    // The policy still bounds what both manifests allow.
    application
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![PeerDescriptor::AnyAuthenticated],
                    vec![chat_rule(ActionSet::OBSERVE)],
                )],
            )
            .unwrap(),
        )
        .unwrap();
    let session = connect(&application, &w.peer, &w.ca, everything(), vec![]);
    assert_eq!(
        application.authorize(&session, &send()),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_locks_out_the_admin_until_a_local_policy_reset() {
    let w = world();
    let member = Party::new(4);
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    let admin_chain = || vec![membership(&member, &w.admin, ADMINS, false)];

    let session = connect(&application, &member, &w.ca, everything(), vec![admin_chain()]);
    assert!(
        session
            .capabilities()
            .is_member(&ADMINS, &w.admin.public_key())
    );
    let without_admins = PermissionPolicy::new(
        2,
        vec![Acl::new(
            vec![PeerDescriptor::Everyone],
            vec![chat_rule(ActionSet::OBSERVE)],
        )],
    )
    .unwrap();
    application
        .update_policy(Caller::Remote(&session), without_admins)
        .unwrap();

    let session = connect(&application, &member, &w.ca, everything(), vec![admin_chain()]);
    assert_eq!(
        application.reset(Caller::Remote(&session)),
        Err(ResetError::PermissionDenied(DenyReason::NotAuthorizedByPolicy))
    );
    let update_policy = Request::method_call(
        SECURITY_OBJECT_PATH,
        MANAGED_APPLICATION_INTERFACE,
        "UpdatePolicy",
    );
    assert!(!application.authorize(&session, &update_policy).is_allowed());

    application.reset_policy(Caller::Local).unwrap();
    assert_eq!(application.policy(), application.default_policy());

    let session = connect(&application, &member, &w.ca, everything(), vec![admin_chain()]);
    application.reset(Caller::Remote(&session)).unwrap();
    assert_eq!(application.application_state(), ApplicationState::Claimable);
}

#[test_log::test]
fn it_skips_authorization_on_non_secure_interfaces() {
    let w = world();
    let config = SecurityConfig::default()
        .with_non_secure_interface("org.example.Open")
        .with_non_secure_member(CHAT, "Hello");
    let application = SecurityApplication::new(w.app.key.clone(), config)
        .unwrap()
        .with_clock(clock);
    application.set_claimable(true).unwrap();
    application
        .claim(
            Caller::Local,
            w.ca.public_key(),
            ADMINS,
            w.admin.public_key(),
            vec![identity(&w.app, &w.ca, &everything())],
            everything(),
        )
        .unwrap();
    application
        .update_policy(Caller::Local, PermissionPolicy::empty(1))
        .unwrap();

    let anonymous = application
        .open_session(&Handshake::uncertified(
            w.peer.public_key(),
            AuthMechanism::EcdheNull,
        ))
        .unwrap();
    let open = Request::method_call("/anything", "org.example.Open", "Do");
    let hello = Request::method_call("/chat", CHAT, "Hello");
    assert_eq!(application.authorize(&anonymous, &open), Verdict::Allow);
    assert_eq!(application.authorize(&anonymous, &hello), Verdict::Allow);
    assert_eq!(
        application.authorize(&anonymous, &send()),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_authorizes_members_through_a_three_hop_chain() {
    let w = world();
    let (alpha, intermediate) = (Party::new(7), Party::new(8));
    let group = Guid::new(0xa1fa);
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    application
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![PeerDescriptor::WithMembership {
                        group,
                        authority: alpha.public_key(),
                    }],
                    vec![method_rule("org.example.Pinger", "ping", ActionSet::MODIFY)],
                )],
            )
            .unwrap(),
        )
        .unwrap();

    let chain = vec![
        membership(&w.peer, &intermediate, group, false),
        membership(&intermediate, &alpha, group, true),
        membership(&alpha, &alpha, group, true),
    ];
    let session = connect(&application, &w.peer, &w.ca, everything(), vec![chain]);

    let ping = Request::method_call("/", "org.example.Pinger", "ping");
    let bing = Request::method_call("/", "org.example.Pinger", "bing");
    assert_eq!(application.authorize(&session, &ping), Verdict::Allow);
    assert_eq!(
        application.authorize(&session, &bing),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_authorizes_peers_of_different_topologies_under_one_acl() {
    let w = world();
    let (alpha, delegate, sub_ca) = (Party::new(7), Party::new(8), Party::new(10));
    let (direct, outsider) = (Party::new(11), Party::new(12));
    let group = Guid::new(0xa1fa);
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    application
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![
                        PeerDescriptor::WithMembership {
                            group,
                            authority: alpha.public_key(),
                        },
                        PeerDescriptor::WithPublicKey {
                            key: direct.public_key(),
                        },
                    ],
                    vec![chat_rule(ActionSet::FULL)],
                )],
            )
            .unwrap(),
        )
        .unwrap();

    // Identity through an intermediate CA, group membership through a
    // delegate.
    let sub_ca_certificate = IdentityCertificate::builder(sub_ca.guid, sub_ca.public_key())
        .ca(true)
        .validity(Validity::starting_at(NOW - 60, 3600))
        .sign(&w.ca.key)
        .unwrap();
    let member_handshake = Handshake::certified(
        w.peer.public_key(),
        vec![identity(&w.peer, &sub_ca, &everything()), sub_ca_certificate],
        everything(),
    )
    .with_membership_chain(vec![
        membership(&w.peer, &delegate, group, false),
        membership(&delegate, &alpha, group, true),
    ]);
    let member_session = application.open_session(&member_handshake).unwrap();
    let direct_session = connect(&application, &direct, &w.ca, everything(), vec![]);
    let outsider_session = connect(&application, &outsider, &w.ca, everything(), vec![]);

    assert!(member_session.capabilities().is_member(&group, &alpha.public_key()));
    assert_eq!(application.authorize(&member_session, &send()), Verdict::Allow);
    assert_eq!(application.authorize(&direct_session, &send()), Verdict::Allow);
    assert_eq!(
        application.authorize(&outsider_session, &send()),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_ignores_membership_chains_from_unknown_authorities() {
    let w = world();
    let (alpha, rogue) = (Party::new(7), Party::new(9));
    let group = Guid::new(0xa1fa);
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    application
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![PeerDescriptor::WithMembership {
                        group,
                        authority: alpha.public_key(),
                    }],
                    vec![chat_rule(ActionSet::FULL)],
                )],
            )
            .unwrap(),
        )
        .unwrap();

    let session = connect(
        &application,
        &w.peer,
        &w.ca,
        everything(),
        vec![vec![membership(&w.peer, &rogue, group, false)]],
    );
    assert!(session.capabilities().group_memberships().is_empty());
    assert_eq!(
        application.authorize(&session, &send()),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_rejects_identities_from_an_unknown_authority() {
    let w = world();
    let rogue = Party::new(9);
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());

    let handshake = Handshake::certified(
        w.peer.public_key(),
        vec![identity(&w.peer, &rogue, &everything())],
        everything(),
    );
    assert_eq!(
        application.open_session(&handshake),
        Err(TrustError::UntrustedIssuer)
    );
}

#[test_log::test]
fn it_rejects_a_manifest_the_certificate_does_not_bind() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());

    let handshake = Handshake::certified(
        w.peer.public_key(),
        vec![identity(&w.peer, &w.ca, &everything())],
        interface_manifest(CHAT, ActionSet::FULL),
    );
    assert_eq!(
        application.open_session(&handshake),
        Err(TrustError::ManifestDigestMismatch)
    );

    let relaxed = SecurityApplication::new(
        w.app.key.clone(),
        SecurityConfig::default().with_manifest_digest_required(false),
    )
    .unwrap()
    .with_clock(clock);
    relaxed.set_claimable(true).unwrap();
    relaxed
        .claim(
            Caller::Local,
            w.ca.public_key(),
            ADMINS,
            w.admin.public_key(),
            vec![identity(&w.app, &w.ca, &everything())],
            everything(),
        )
        .unwrap();
    assert!(relaxed.open_session(&handshake).is_ok());
}

#[test_log::test]
fn it_expires_sessions_when_local_credentials_change() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    let session = connect(&application, &w.peer, &w.ca, everything(), vec![]);
    assert_eq!(application.authorize(&session, &send()), Verdict::Allow);

    application.reset_policy(Caller::Local).unwrap();
    assert_eq!(
        application.authorize(&session, &send()),
        Verdict::Deny(DenyReason::SessionExpired)
    );

    let session = connect(&application, &w.peer, &w.ca, everything(), vec![]);
    assert_eq!(application.authorize(&session, &send()), Verdict::Allow);
}

#[test_log::test]
fn it_authorizes_each_direction_separately() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    application
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![PeerDescriptor::AnyAuthenticated],
                    vec![
                        Rule::new(Glob::any(), Glob::parse(CHAT).unwrap()).with_member(
                            MemberRule::new(
                                Glob::parse("Said").unwrap(),
                                MemberKind::Signal,
                                ActionSet::OBSERVE,
                            ),
                        ),
                    ],
                )],
            )
            .unwrap(),
        )
        .unwrap();
    let session = connect(&application, &w.peer, &w.ca, everything(), vec![]);

    let inbound = Request::signal("/chat", CHAT, "Said", Direction::Inbound);
    let outbound = Request::signal("/chat", CHAT, "Said", Direction::Outbound);
    assert_eq!(application.authorize(&session, &inbound), Verdict::Allow);
    assert_eq!(
        application.authorize(&session, &outbound),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );
}

#[test_log::test]
fn it_ignores_peer_manifests_on_password_sessions() {
    let w = world();
    let application = claimed(&w.app, &w.ca, ADMINS, &w.admin, everything());
    application
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![PeerDescriptor::WithPublicKey {
                        key: w.peer.public_key(),
                    }],
                    vec![chat_rule(ActionSet::FULL)],
                )],
            )
            .unwrap(),
        )
        .unwrap();

    let mut handshake = Handshake::uncertified(w.peer.public_key(), AuthMechanism::EcdhePsk);
    handshake.manifest = interface_manifest(CHAT, ActionSet::OBSERVE);
    let session = application.open_session(&handshake).unwrap();

    assert!(session.remote_manifest().is_none());
    assert!(!session.capabilities().is_certificate_backed());
    assert_eq!(application.authorize(&session, &send()), Verdict::Allow);
}

#[test_log::test]
fn it_lets_two_applications_disagree_about_managing_each_other() {
    let (ca, admin) = (Party::new(2), Party::new(3));
    let (lenient_app, strict_app) = (Party::new(20), Party::new(21));
    let lenient = claimed(&lenient_app, &ca, ADMINS, &admin, everything());
    let strict = claimed(&strict_app, &ca, ADMINS, &admin, everything());
    strict
        .update_policy(
            Caller::Local,
            PermissionPolicy::new(
                1,
                vec![Acl::new(
                    vec![PeerDescriptor::WithMembership {
                        group: ADMINS,
                        authority: admin.public_key(),
                    }],
                    vec![Rule::everything(ActionSet::FULL)],
                )],
            )
            .unwrap(),
        )
        .unwrap();

    // Each side resolves the other's handshake against its own credentials.
    let strict_at_lenient = lenient.open_session(&strict.local_handshake()).unwrap();
    let lenient_at_strict = strict.open_session(&lenient.local_handshake()).unwrap();
    let update_policy = Request::method_call(
        SECURITY_OBJECT_PATH,
        MANAGED_APPLICATION_INTERFACE,
        member::UPDATE_POLICY,
    );

    assert_eq!(
        lenient.authorize(&strict_at_lenient, &update_policy),
        Verdict::Allow
    );
    assert_eq!(
        strict.authorize(&lenient_at_strict, &update_policy),
        Verdict::Deny(DenyReason::NotAuthorizedByPolicy)
    );

    assert_eq!(
        strict.update_policy(
            Caller::Remote(&lenient_at_strict),
            PermissionPolicy::empty(2)
        ),
        Err(warden_security::UpdatePolicyError::PermissionDenied(
            DenyReason::NotAuthorizedByPolicy
        ))
    );
    lenient
        .update_policy(Caller::Remote(&strict_at_lenient), PermissionPolicy::empty(2))
        .unwrap();
    assert_eq!(lenient.policy_version(), 2);
    assert_eq!(strict.policy_version(), 1);
}
