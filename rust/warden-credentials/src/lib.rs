//! Keys, certificates and certificate-chain trust resolution.
//!
//! A remote peer authenticates with an Ed25519 key and, for certificate
//! backed sessions, presents a leaf-first [`IdentityCertificate`] chain and
//! any number of [`MembershipCertificate`] chains. [`resolve`] validates
//! them against the local [`TrustAnchors`] and produces the
//! [`PeerCapabilitySet`] that policy matching runs against.

#![warn(missing_docs)]

mod key;
pub use key::*;

mod guid;
pub use guid::*;

pub mod certificate;
pub use certificate::*;

mod chain;
pub use chain::*;

mod capability;
pub use capability::*;

pub mod mechanism;
pub use mechanism::{AuthMechanism, NegotiationError, UnknownMechanism, negotiate};

mod resolver;
pub use resolver::*;
