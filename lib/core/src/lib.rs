//! Core types shared by the flowwright crates.
//!
//! Provides the strongly-typed identifiers used for draft sessions and draft
//! nodes, plus the rootcause-based `Result` alias used at crate boundaries.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{NodeId, ParseIdError, SessionId};
