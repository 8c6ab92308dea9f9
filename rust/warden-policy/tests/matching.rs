use proptest::prelude::*;
use warden_credentials::{KeyPair, PeerCapabilitySet, PublicKey};
use warden_policy::{
    ActionSet, Acl, Glob, MemberKind, MemberRule, PeerDescriptor, PermissionPolicy, Rule, Target,
};

fn key(seed: u8) -> PublicKey {
    KeyPair::from_seed(&[seed; 32]).public_key()
}

fn name() -> impl Strategy<Value = String> {
    "[a-zA-Z./]{1,12}"
}

fn actions() -> impl Strategy<Value = ActionSet> {
    (0u8..8).prop_map(|bits| ActionSet::from_bits_truncate(bits << 1))
}

fn kind() -> impl Strategy<Value = MemberKind> {
    prop_oneof![
        Just(MemberKind::NotSpecified),
        Just(MemberKind::MethodCall),
        Just(MemberKind::Signal),
        Just(MemberKind::Property),
    ]
}

fn glob() -> impl Strategy<Value = Glob> {
    prop_oneof![
        Just(Glob::any()),
        name().prop_map(|n| Glob::parse(&format!("{n}*")).unwrap()),
        name().prop_map(|n| Glob::parse(&format!("*{n}")).unwrap()),
        name().prop_map(|n| Glob::parse(&n).unwrap()),
    ]
}

fn rule() -> impl Strategy<Value = Rule> {
    (
        glob(),
        glob(),
        prop::collection::vec((glob(), kind(), actions()), 1..4),
    )
        .prop_map(|(path, interface, members)| Rule {
            object_path: path,
            interface_name: interface,
            members: members
                .into_iter()
                .map(|(name, kind, actions)| {
                    MemberRule::new(name, kind, actions & kind.valid_actions())
                })
                .collect(),
        })
}

fn peers() -> impl Strategy<Value = Vec<PeerDescriptor>> {
    let named = prop_oneof![
        Just(PeerDescriptor::AnyAuthenticated),
        (0u8..3).prop_map(|seed| PeerDescriptor::WithPublicKey { key: key(seed) }),
    ];
    prop_oneof![
        Just(vec![PeerDescriptor::Everyone]),
        prop::collection::btree_set(named, 1..3).prop_map(|peers| peers.into_iter().collect()),
    ]
}

fn acl() -> impl Strategy<Value = Acl> {
    (peers(), prop::collection::vec(rule(), 0..3))
        .prop_map(|(peers, rules)| Acl::new(peers, rules))
}

proptest! {
    #[test]
    fn it_matches_prefix_globs_against_any_extension(prefix in name(), rest in "[a-z]{0,8}") {
        let glob = Glob::parse(&format!("{prefix}*")).unwrap();
        let extended = format!("{prefix}{rest}");
        prop_assert!(glob.matches(&extended));
    }

    #[test]
    fn it_matches_literals_only_against_themselves(literal in name(), other in name()) {
        let glob = Glob::parse(&literal).unwrap();
        prop_assert!(glob.matches(&literal));
        prop_assert_eq!(glob.matches(&other), literal == other);
    }

    #[test]
    fn it_decides_deterministically(
        acls in prop::collection::vec(acl(), 0..4),
        seed in 0u8..3,
        member in name(),
        kind in kind(),
    ) {
        let policy = PermissionPolicy::new(1, acls).unwrap();
        let peer = PeerCapabilitySet::anonymous(key(seed));
        let target = Target::new("/obj", "org.example.Iface", &member, kind);

        let first = policy.matches(&peer, &target);
        let decoded = PermissionPolicy::from_cbor(&policy.to_cbor().unwrap()).unwrap();
        prop_assert_eq!(first, policy.matches(&peer, &target));
        prop_assert_eq!(first, decoded.matches(&peer, &target));
    }

    #[test]
    fn it_unions_acls_without_short_circuit(
        acls in prop::collection::vec(acl(), 1..5),
        seed in 0u8..3,
        member in name(),
        kind in kind(),
    ) {
        let peer = PeerCapabilitySet::anonymous(key(seed));
        let target = Target::new("/obj", "org.example.Iface", &member, kind);

        let combined = PermissionPolicy::new(1, acls.clone()).unwrap().matches(&peer, &target);
        let separately = acls
            .into_iter()
            .map(|acl| PermissionPolicy::new(1, vec![acl]).unwrap().matches(&peer, &target))
            .fold(ActionSet::empty(), |union, granted| union | granted);
        prop_assert_eq!(combined, separately);
    }
}
