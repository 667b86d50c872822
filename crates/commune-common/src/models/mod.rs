//! Core domain models shared across all Commune services.
//!
//! These are the "truth" types — what the database stores and the federation
//! layer translates. Rooms, users and messages carry optional federation
//! metadata linking them to their external protocol counterparts.

pub mod file;
pub mod message;
pub mod room;
pub mod user;

/// Re-export all model types for convenience.
pub use file::*;
pub use message::*;
pub use room::*;
pub use user::*;
