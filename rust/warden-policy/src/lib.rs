//! Permission policies, manifests and the ACL matcher.
//!
//! A [`PermissionPolicy`] is an ordered list of [`Acl`]s. Each ACL grants
//! its [`Rule`]s to the peers matching any of its [`PeerDescriptor`]s, and
//! [`PermissionPolicy::matches`] unions the grants of every applicable ACL
//! for one [`Target`]. A [`Manifest`] caps the result through [`cap`].

#![warn(missing_docs)]

mod action;
pub use action::*;

mod error;
pub use error::*;

mod glob;
pub use glob::*;

mod rule;
pub use rule::{MemberKind, MemberRule, Rule, Target, actions_for};

mod peer;
pub use peer::*;

pub mod policy;
pub use policy::{Acl, PermissionPolicy};

pub mod manifest;
pub use manifest::{Manifest, cap};

pub mod defaults;
pub use defaults::{Ownership, default_policy};
