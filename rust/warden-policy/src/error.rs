use thiserror::Error;

use crate::{ActionSet, MemberKind, PeerDescriptor};

/// Reasons a policy or manifest is rejected.
///
/// Policies are validated when they are built or decoded, so matching never
/// sees a malformed structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A glob is empty or has a `*` somewhere other than its first or last
    /// character.
    #[error("invalid glob {glob:?}: {reason}")]
    InvalidGlob {
        /// The offending pattern.
        glob: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An ACL grants its rules to nobody.
    #[error("ACL {index} names no peers")]
    NoPeers {
        /// Position of the ACL in the policy.
        index: usize,
    },

    /// `Everyone` shares an ACL with other descriptors.
    #[error("ACL {index} lists everyone alongside other peers")]
    EveryoneWithOthers {
        /// Position of the ACL in the policy.
        index: usize,
    },

    /// The same descriptor appears twice in one ACL.
    #[error("ACL {index} lists {peer:?} more than once")]
    DuplicatePeer {
        /// Position of the ACL in the policy.
        index: usize,
        /// The repeated descriptor.
        peer: PeerDescriptor,
    },

    /// A rule has no member rules.
    #[error("rule for {interface_name:?} has no members")]
    NoMembers {
        /// The rule's interface name glob.
        interface_name: String,
    },

    /// A member rule grants actions its kind does not support.
    #[error("member rule {member:?} of kind {kind:?} cannot grant {actions:?}")]
    InvalidMemberActions {
        /// The member rule's name glob.
        member: String,
        /// The member rule's kind.
        kind: MemberKind,
        /// The granted actions.
        actions: ActionSet,
    },

    /// A member rule carries bits that are not actions.
    #[error("member rule {member:?} carries unknown action bits {bits:#04x}")]
    UnknownActions {
        /// The member rule's name glob.
        member: String,
        /// The offending bits.
        bits: u8,
    },

    /// The policy could not be encoded.
    #[error("failed to encode policy: {0}")]
    Encode(String),

    /// The bytes or text are not a well-formed policy.
    #[error("failed to decode policy: {0}")]
    Decode(String),
}
