use thiserror::Error;
use warden_credentials::{PublicKey, TrustError};
use warden_policy::PolicyError;

use crate::ApplicationState;

/// Name of the error remote callers receive for any denial.
pub const PERMISSION_DENIED: &str = "org.alljoyn.Bus.Security.Error.PermissionDenied";

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DenyReason {
    /// No applicable ACL grants the required action.
    #[error("not authorized by policy")]
    NotAuthorizedByPolicy,

    /// A manifest does not allow the required action.
    #[error("exceeds manifest")]
    ExceedsManifest,

    /// Local credentials changed since the session was opened.
    #[error("session credentials are stale")]
    SessionExpired,

    /// The operation needs a claimed application.
    #[error("application is not claimed")]
    NotClaimed,
}

impl DenyReason {
    /// Error name surfaced to remote callers.
    pub fn error_name(&self) -> &'static str {
        PERMISSION_DENIED
    }
}

/// Errors from [`crate::SecurityApplication::claim`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The application is not in the claimable state.
    #[error("application cannot be claimed while {state}")]
    AlreadyClaimed {
        /// State at the time of the call.
        state: ApplicationState,
    },

    /// A remote caller may not claim.
    #[error("org.alljoyn.Bus.Security.Error.PermissionDenied: {0}")]
    PermissionDenied(DenyReason),

    /// The identity chain does not validate.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// The manifest cannot be encoded.
    #[error(transparent)]
    Manifest(#[from] PolicyError),
}

/// Errors from policy installation and reversal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdatePolicyError {
    /// The caller may not replace the policy.
    #[error("org.alljoyn.Bus.Security.Error.PermissionDenied: {0}")]
    PermissionDenied(DenyReason),
}

/// Errors from [`crate::SecurityApplication::update_identity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The caller may not replace the identity.
    #[error("org.alljoyn.Bus.Security.Error.PermissionDenied: {0}")]
    PermissionDenied(DenyReason),

    /// The identity chain does not validate.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// The manifest cannot be encoded.
    #[error(transparent)]
    Manifest(#[from] PolicyError),
}

/// Errors from membership installation and removal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    /// The caller may not change memberships.
    #[error("org.alljoyn.Bus.Security.Error.PermissionDenied: {0}")]
    PermissionDenied(DenyReason),

    /// The chain is malformed or not about this application.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// A chain with the same leaf serial and issuer is installed.
    #[error("membership {serial} from {issuer} is already installed")]
    Duplicate {
        /// Serial of the leaf certificate.
        serial: u64,
        /// Issuer of the leaf certificate.
        issuer: PublicKey,
    },

    /// No chain has that leaf serial and issuer.
    #[error("membership {serial} from {issuer} is not installed")]
    NotFound {
        /// Requested serial.
        serial: u64,
        /// Requested issuer.
        issuer: PublicKey,
    },
}

/// Errors from [`crate::SecurityApplication::reset`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetError {
    /// The caller may not reset the application.
    #[error("org.alljoyn.Bus.Security.Error.PermissionDenied: {0}")]
    PermissionDenied(DenyReason),
}

/// Errors from [`crate::SecurityApplication::set_claimable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("claimability cannot change while {state}")]
pub struct ClaimableError {
    /// State at the time of the call.
    pub state: ApplicationState,
}

/// Errors surfaced by the [`crate::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The request was denied.
    #[error("org.alljoyn.Bus.Security.Error.PermissionDenied: {0}")]
    PermissionDenied(DenyReason),

    /// Nothing handles the member.
    #[error("no handler for {object_path} {interface_name}.{member_name}")]
    NoHandler {
        /// Requested object.
        object_path: String,
        /// Requested interface.
        interface_name: String,
        /// Requested member.
        member_name: String,
    },

    /// The handler does not support the operation.
    #[error("member does not support {0}")]
    Unsupported(&'static str),

    /// The handler failed.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl DispatchError {
    /// Error name surfaced to remote callers, if this is a denial.
    pub fn error_name(&self) -> Option<&'static str> {
        match self {
            DispatchError::PermissionDenied(reason) => Some(reason.error_name()),
            _ => None,
        }
    }
}
