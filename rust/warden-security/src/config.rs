use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_policy::defaults::{
    CLAIMABLE_APPLICATION_INTERFACE, MANAGED_APPLICATION_INTERFACE, SECURITY_OBJECT_PATH,
};
use warden_policy::{Glob, PolicyError};

/// Standard bus interfaces that bypass authorization.
const STANDARD_INTERFACES: [&str; 10] = [
    "org.alljoyn.Bus",
    "org.alljoyn.Daemon",
    "org.alljoyn.Daemon.Debug",
    "org.alljoyn.Bus.Peer.Authentication",
    "org.alljoyn.Bus.Peer.Session",
    "org.alljoyn.Bus.Peer.HeaderCompression",
    "org.allseen.Introspectable",
    "org.freedesktop.DBus",
    "org.freedesktop.DBus.Peer",
    "org.freedesktop.DBus.Introspectable",
];

/// Errors from loading a [`SecurityConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration is not valid JSON of the expected shape.
    #[error("invalid security configuration: {0}")]
    Json(String),

    /// The management object path is empty or not absolute.
    #[error("management object path {0:?} must start with '/'")]
    ObjectPath(String),

    /// A management interface name cannot be used as a policy pattern.
    #[error("invalid management interface: {0}")]
    Interface(#[from] PolicyError),
}

/// Settings of a [`crate::SecurityApplication`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Object path the management interfaces are served on.
    pub management_object_path: String,

    /// Interface of management calls on a claimed application.
    pub management_interface: String,

    /// Interface carrying the claim call.
    pub claimable_interface: String,

    /// Interfaces exempt from authorization.
    pub non_secure_interfaces: BTreeSet<String>,

    /// Individual `(interface, member)` pairs exempt from authorization.
    pub non_secure_members: BTreeSet<(String, String)>,

    /// Whether a peer's manifest must match the digest in its identity
    /// certificate (default: true)
    pub require_manifest_digest: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            management_object_path: SECURITY_OBJECT_PATH.to_string(),
            management_interface: MANAGED_APPLICATION_INTERFACE.to_string(),
            claimable_interface: CLAIMABLE_APPLICATION_INTERFACE.to_string(),
            non_secure_interfaces: STANDARD_INTERFACES.iter().map(|i| i.to_string()).collect(),
            non_secure_members: BTreeSet::new(),
            require_manifest_digest: true,
        }
    }
}

impl SecurityConfig {
    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for malformed or invalid settings.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.management_glob()?;
        Ok(config)
    }

    /// Serve management on a different object path.
    pub fn with_management_object_path(mut self, path: impl Into<String>) -> Self {
        self.management_object_path = path.into();
        self
    }

    /// Use a different management interface name.
    pub fn with_management_interface(mut self, interface: impl Into<String>) -> Self {
        self.management_interface = interface.into();
        self
    }

    /// Serve the claim call on `interface`.
    pub fn with_claimable_interface(mut self, interface: impl Into<String>) -> Self {
        self.claimable_interface = interface.into();
        self
    }

    /// Exempt an interface from authorization.
    pub fn with_non_secure_interface(mut self, interface: impl Into<String>) -> Self {
        self.non_secure_interfaces.insert(interface.into());
        self
    }

    /// Exempt a single member from authorization.
    pub fn with_non_secure_member(
        mut self,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        self.non_secure_members.insert((interface.into(), member.into()));
        self
    }

    /// Set whether manifests must match their certificate digest.
    pub fn with_manifest_digest_required(mut self, required: bool) -> Self {
        self.require_manifest_digest = required;
        self
    }

    /// Whether `interface.member` bypasses authorization.
    pub fn is_non_secure(&self, interface: &str, member: &str) -> bool {
        self.non_secure_interfaces.contains(interface)
            || self
                .non_secure_members
                .iter()
                .any(|(i, m)| i == interface && m == member)
    }

    /// The management interface as a policy pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the object path or interface is unusable.
    pub fn management_glob(&self) -> Result<Glob, ConfigError> {
        if !self.management_object_path.starts_with('/') {
            return Err(ConfigError::ObjectPath(self.management_object_path.clone()));
        }
        if self.management_interface.contains('*') {
            return Err(PolicyError::InvalidGlob {
                glob: self.management_interface.clone(),
                reason: "management interface must be a literal name",
            }
            .into());
        }
        Ok(Glob::parse(&self.management_interface)?)
    }
}
