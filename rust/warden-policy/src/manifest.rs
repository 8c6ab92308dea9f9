//! Capability manifests and the gate that caps policy grants by them.
//!
//! A manifest is the ceiling an application declares for itself. Both sides
//! of a session hold one, and a grant must fit under both.

use serde::{Deserialize, Serialize};
use warden_common::Digest;
use warden_credentials::ManifestBinding;

use crate::rule::check_rules;
use crate::{ActionSet, PolicyError, Rule, Target, actions_for};

/// Ordered list of rules declaring what an application may ever be granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Rule>", into = "Vec<Rule>")]
pub struct Manifest(Vec<Rule>);

impl Manifest {
    /// Build a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for a rule without members or a member rule
    /// whose actions its kind cannot take.
    pub fn new(rules: Vec<Rule>) -> Result<Self, PolicyError> {
        check_rules(&rules)?;
        Ok(Self(rules))
    }

    /// A manifest without rules. It allows nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rules, in order.
    pub fn rules(&self) -> &[Rule] {
        &self.0
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Actions the manifest allows on `target`.
    pub fn allowed(&self, target: &Target<'_>) -> ActionSet {
        actions_for(&self.0, target)
    }

    /// SHA-256 over the DAG-CBOR encoding of the rule list.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Encode`] if encoding fails.
    pub fn digest(&self) -> Result<Digest, PolicyError> {
        serde_ipld_dagcbor::to_vec(&self.0)
            .map(|bytes| Digest::hash(&bytes))
            .map_err(|e| PolicyError::Encode(e.to_string()))
    }

    /// What an identity certificate must bind for this manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Encode`] if encoding fails.
    pub fn binding(&self) -> Result<ManifestBinding, PolicyError> {
        if self.is_empty() {
            Ok(ManifestBinding::Unbound)
        } else {
            self.digest().map(ManifestBinding::Bound)
        }
    }
}

impl TryFrom<Vec<Rule>> for Manifest {
    type Error = PolicyError;

    fn try_from(rules: Vec<Rule>) -> Result<Self, Self::Error> {
        Self::new(rules)
    }
}

impl From<Manifest> for Vec<Rule> {
    fn from(manifest: Manifest) -> Self {
        manifest.0
    }
}

/// Narrow `requested` to what both manifests allow.
pub fn cap(requested: ActionSet, local: ActionSet, remote: ActionSet) -> ActionSet {
    requested & local & remote
}
