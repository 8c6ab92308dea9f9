use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key-exchange mechanisms a session can be authenticated with, in
/// preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuthMechanism {
    /// Ephemeral ECDH authenticated by an identity certificate.
    EcdheEcdsa,
    /// Ephemeral ECDH authenticated by a pre-shared key.
    EcdhePsk,
    /// Ephemeral ECDH authenticated by a password.
    EcdheSpeke,
    /// Unauthenticated ephemeral ECDH.
    EcdheNull,
}

impl AuthMechanism {
    /// Every mechanism, most preferred first.
    pub const PREFERENCE: [AuthMechanism; 4] = [
        AuthMechanism::EcdheEcdsa,
        AuthMechanism::EcdhePsk,
        AuthMechanism::EcdheSpeke,
        AuthMechanism::EcdheNull,
    ];

    /// Whether the mechanism presents certificates that must be validated.
    pub fn is_certificate_backed(&self) -> bool {
        matches!(self, AuthMechanism::EcdheEcdsa)
    }

    /// Whether the mechanism relies on a shared secret.
    pub fn is_password_backed(&self) -> bool {
        matches!(self, AuthMechanism::EcdhePsk | AuthMechanism::EcdheSpeke)
    }

    /// The name used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            AuthMechanism::EcdheEcdsa => "ALLJOYN_ECDHE_ECDSA",
            AuthMechanism::EcdhePsk => "ALLJOYN_ECDHE_PSK",
            AuthMechanism::EcdheSpeke => "ALLJOYN_ECDHE_SPEKE",
            AuthMechanism::EcdheNull => "ALLJOYN_ECDHE_NULL",
        }
    }
}

impl Display for AuthMechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Error returned for an unknown mechanism name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown authentication mechanism: {0}")]
pub struct UnknownMechanism(pub String);

impl FromStr for AuthMechanism {
    type Err = UnknownMechanism;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthMechanism::PREFERENCE
            .into_iter()
            .find(|mechanism| mechanism.wire_name() == s)
            .ok_or_else(|| UnknownMechanism(s.to_owned()))
    }
}

/// Failure to agree on any mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError<E> {
    /// No mechanism was enabled.
    #[error("no authentication mechanism is enabled")]
    NoMechanism,

    /// Every enabled mechanism was tried and failed.
    #[error("authentication failed, last attempt {mechanism}: {error}")]
    Exhausted {
        /// The least preferred mechanism tried.
        mechanism: AuthMechanism,
        /// Why it failed.
        error: E,
    },
}

/// Try each enabled mechanism in preference order until one succeeds.
///
/// The next mechanism is attempted only after the previous attempt fails.
///
/// # Errors
///
/// Returns [`NegotiationError::Exhausted`] with the last failure once every
/// enabled mechanism has been tried.
pub fn negotiate<T, E>(
    enabled: &[AuthMechanism],
    mut attempt: impl FnMut(AuthMechanism) -> Result<T, E>,
) -> Result<(AuthMechanism, T), NegotiationError<E>> {
    let mut last = None;
    for mechanism in AuthMechanism::PREFERENCE {
        if !enabled.contains(&mechanism) {
            continue;
        }
        match attempt(mechanism) {
            Ok(value) => return Ok((mechanism, value)),
            Err(error) => {
                tracing::debug!(%mechanism, "authentication attempt failed, falling back");
                last = Some((mechanism, error));
            }
        }
    }
    match last {
        Some((mechanism, error)) => Err(NegotiationError::Exhausted { mechanism, error }),
        None => Err(NegotiationError::NoMechanism),
    }
}
