#![warn(missing_docs)]

//! This crate constitutes a library of light weight helpers that are shared
//! across the warden crates: a content digest, serde helpers for fixed-size
//! byte strings, an atomically swappable snapshot cell and a wall clock.

pub mod as_bytes;

mod hash;
pub use hash::*;

mod sync;
pub use sync::*;

pub mod time;
