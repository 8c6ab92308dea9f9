//! Claim lifecycle, session trust and per-message authorization for one
//! application on the bus.
//!
//! A [`SecurityApplication`] owns the local credentials: identity chain,
//! manifest, membership chains and permission policy. Peers that complete a
//! [`Handshake`] get a [`Session`], and [`SecurityApplication::authorize`]
//! decides every message on it:
//!
//! ```
//! use warden_credentials::{AuthMechanism, KeyPair};
//! use warden_security::{Handshake, Request, SecurityApplication, SecurityConfig, Verdict};
//!
//! let application =
//!     SecurityApplication::new(KeyPair::from_seed(&[1; 32]), SecurityConfig::default()).unwrap();
//! let peer = KeyPair::from_seed(&[2; 32]).public_key();
//! let session = application
//!     .open_session(&Handshake::uncertified(peer, AuthMechanism::EcdheNull))
//!     .unwrap();
//!
//! let ping = Request::method_call("/", "org.freedesktop.DBus.Peer", "Ping");
//! let call = Request::method_call("/lamp", "org.example.Lamp", "Toggle");
//! assert_eq!(application.authorize(&session, &ping), Verdict::Allow);
//! assert!(!application.authorize(&session, &call).is_allowed());
//! ```
//!
//! The [`Dispatcher`] wraps an application and routes authorized messages
//! to registered handlers.

#![warn(missing_docs)]

mod application;
pub use application::*;

mod authorize;
pub use authorize::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod request;
pub use request::*;

mod session;
pub use session::*;

mod snapshot;

mod state;
pub use state::*;

pub mod dispatch;
pub use dispatch::{Dispatcher, Operation, Subscription};
