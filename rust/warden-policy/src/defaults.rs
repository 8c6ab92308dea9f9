//! The built-in policy installed at claim and the names of the management
//! surface it protects.

use serde::{Deserialize, Serialize};
use warden_credentials::{Guid, PublicKey};

use crate::{
    ActionSet, Acl, Glob, MemberKind, MemberRule, PeerDescriptor, PermissionPolicy, Rule,
};

/// Object path the management interfaces are served on.
pub const SECURITY_OBJECT_PATH: &str = "/org/alljoyn/Bus/Security";

/// Interface of management calls on a claimed application.
pub const MANAGED_APPLICATION_INTERFACE: &str = "org.alljoyn.Bus.Security.ManagedApplication";

/// Interface carrying the claim call.
pub const CLAIMABLE_APPLICATION_INTERFACE: &str = "org.alljoyn.Bus.Security.ClaimableApplication";

/// Member names of the management interfaces.
pub mod member {
    /// Claim an unclaimed application.
    pub const CLAIM: &str = "Claim";
    /// Return to the claimable state.
    pub const RESET: &str = "Reset";
    /// Replace the identity chain and manifest.
    pub const UPDATE_IDENTITY: &str = "UpdateIdentity";
    /// Replace the policy.
    pub const UPDATE_POLICY: &str = "UpdatePolicy";
    /// Revert to the default policy.
    pub const RESET_POLICY: &str = "ResetPolicy";
    /// Add a membership chain.
    pub const INSTALL_MEMBERSHIP: &str = "InstallMembership";
    /// Remove a membership chain.
    pub const REMOVE_MEMBERSHIP: &str = "RemoveMembership";
}

/// Who claimed the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ownership {
    /// The identity trust anchor.
    pub certificate_authority: PublicKey,
    /// The administrators' security group.
    pub admin_group: Guid,
    /// Authority of the administrators' group.
    pub admin_authority: PublicKey,
}

/// The policy in force until a custom one is installed.
///
/// The application's own key may install and remove its memberships. Once
/// claimed, peers issued through the certificate authority
/// and members of the admin group get every action on everything.
pub fn default_policy(
    own_key: PublicKey,
    management_interface: &Glob,
    ownership: Option<&Ownership>,
) -> PermissionPolicy {
    let mut acls = Vec::with_capacity(3);
    if let Some(ownership) = ownership {
        acls.push(Acl::new(
            vec![PeerDescriptor::FromCertificateAuthority {
                key: ownership.certificate_authority,
            }],
            vec![Rule::everything(ActionSet::FULL)],
        ));
        acls.push(Acl::new(
            vec![PeerDescriptor::WithMembership {
                group: ownership.admin_group,
                authority: ownership.admin_authority,
            }],
            vec![Rule::everything(ActionSet::FULL)],
        ));
    }
    let membership_call = |name| {
        MemberRule::new(Glob::literal(name), MemberKind::MethodCall, ActionSet::MODIFY)
    };
    acls.push(Acl::new(
        vec![PeerDescriptor::WithPublicKey { key: own_key }],
        vec![
            Rule::new(Glob::any(), management_interface.clone())
                .with_member(membership_call(member::INSTALL_MEMBERSHIP))
                .with_member(membership_call(member::REMOVE_MEMBERSHIP)),
        ],
    ));
    PermissionPolicy::from_trusted_parts(0, acls)
}
