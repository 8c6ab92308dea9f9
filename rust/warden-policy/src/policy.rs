//! Permission policies and the ACL matcher.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;
use warden_credentials::{Guid, PeerCapabilitySet, PublicKey};

use crate::rule::check_rules;
use crate::{ActionSet, PeerDescriptor, PolicyError, Rule, Target, actions_for};

/// Grants its rules to every peer matching any of its descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    /// Peers the rules are granted to.
    pub peers: Vec<PeerDescriptor>,
    /// Granted rules. An ACL without rules grants nothing.
    pub rules: Vec<Rule>,
}

impl Acl {
    /// Create an ACL.
    pub fn new(peers: Vec<PeerDescriptor>, rules: Vec<Rule>) -> Self {
        Self { peers, rules }
    }

    /// Whether the ACL applies to a peer with `capabilities`.
    pub fn applies_to(&self, capabilities: &PeerCapabilitySet) -> bool {
        self.peers.iter().any(|peer| peer.matches(capabilities))
    }

    fn check(&self, index: usize) -> Result<(), PolicyError> {
        if self.peers.is_empty() {
            return Err(PolicyError::NoPeers { index });
        }
        if self.peers.len() > 1 && self.peers.contains(&PeerDescriptor::Everyone) {
            return Err(PolicyError::EveryoneWithOthers { index });
        }
        let mut seen = BTreeSet::new();
        for peer in &self.peers {
            if !seen.insert(peer) {
                return Err(PolicyError::DuplicatePeer {
                    index,
                    peer: peer.clone(),
                });
            }
        }
        check_rules(&self.rules)
    }
}

/// A versioned, validated list of ACLs.
///
/// Policies are immutable. Every constructor and decoder validates, so a
/// `PermissionPolicy` value is always well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UnvalidatedPolicy")]
pub struct PermissionPolicy {
    version: u32,
    acls: Vec<Acl>,
}

#[derive(Deserialize)]
struct UnvalidatedPolicy {
    version: u32,
    acls: Vec<Acl>,
}

impl TryFrom<UnvalidatedPolicy> for PermissionPolicy {
    type Error = PolicyError;

    fn try_from(policy: UnvalidatedPolicy) -> Result<Self, Self::Error> {
        Self::new(policy.version, policy.acls)
    }
}

impl PermissionPolicy {
    /// Build a policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for an ACL without peers, with `Everyone`
    /// next to other peers or with a repeated peer, and for any rule the
    /// manifest checks would reject.
    pub fn new(version: u32, acls: Vec<Acl>) -> Result<Self, PolicyError> {
        for (index, acl) in acls.iter().enumerate() {
            acl.check(index)?;
        }
        Ok(Self { version, acls })
    }

    pub(crate) fn from_trusted_parts(version: u32, acls: Vec<Acl>) -> Self {
        Self { version, acls }
    }

    /// A policy with no ACLs. It grants nothing.
    pub fn empty(version: u32) -> Self {
        Self {
            version,
            acls: Vec::new(),
        }
    }

    /// The policy version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The ACLs, in order.
    pub fn acls(&self) -> &[Acl] {
        &self.acls
    }

    /// Union of the actions every applicable ACL grants on `target`.
    ///
    /// Evaluation visits every ACL; a peer may be granted by several.
    pub fn matches(&self, capabilities: &PeerCapabilitySet, target: &Target<'_>) -> ActionSet {
        let granted = self
            .acls
            .iter()
            .filter(|acl| acl.applies_to(capabilities))
            .fold(ActionSet::empty(), |granted, acl| {
                granted | actions_for(&acl.rules, target)
            });
        trace!(
            peer = %capabilities.public_key(),
            object_path = target.object_path,
            interface = target.interface_name,
            member = target.member_name,
            ?granted,
            "matched policy"
        );
        granted
    }

    /// Every `(group, authority)` named by a membership descriptor.
    pub fn group_authorities(&self) -> impl Iterator<Item = (Guid, PublicKey)> + '_ {
        self.acls
            .iter()
            .flat_map(|acl| &acl.peers)
            .filter_map(|peer| match peer {
                PeerDescriptor::WithMembership { group, authority } => Some((*group, *authority)),
                _ => None,
            })
    }

    /// Canonical DAG-CBOR encoding.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Encode`] if encoding fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>, PolicyError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| PolicyError::Encode(e.to_string()))
    }

    /// Decode and validate a DAG-CBOR policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Decode`] for malformed or invalid input.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, PolicyError> {
        serde_ipld_dagcbor::from_slice(bytes).map_err(|e| PolicyError::Decode(e.to_string()))
    }

    /// JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Encode`] if encoding fails.
    pub fn to_json(&self) -> Result<String, PolicyError> {
        serde_json::to_string_pretty(self).map_err(|e| PolicyError::Encode(e.to_string()))
    }

    /// Decode and validate a JSON policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Decode`] for malformed or invalid input.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(json).map_err(|e| PolicyError::Decode(e.to_string()))
    }
}
