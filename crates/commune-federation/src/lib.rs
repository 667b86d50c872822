//! # commune-federation
//!
//! Federation bridge between the Commune data model and the external
//! federated messaging network.
//!
//! ## Architecture
//!
//! The bridge keeps a bidirectional identity/room mapping across the two
//! identifier spaces and translates local actions into protocol calls:
//!
//! ```text
//!  local action ──► FederationBridge ──► identity/room resolution ──► protocol call
//!                                              │                          │
//!                                       (create-if-absent)         mapping update
//!
//!  typing/presence ──► EventRouter ──► mapping lookup ──► EDU
//!
//!  remote media ──► MediaProxy ──► ordered endpoint fallback ──► streamed response
//! ```
//!
//! ## Key concepts
//!
//! - **Identity mapping** (`identity.rs`, `store.rs`): local users and rooms
//!   are mapped to external ids lazily on first federation touch-point;
//!   mappings are upserts and never deleted.
//! - **Domain resolution** (`domain.rs`): the bridge's externally addressable
//!   domain is read from settings once and memoized for the process lifetime.
//! - **Outbound translation** (`bridge.rs`): room create, message send,
//!   redaction, reactions, invitations, leave/kick — with the degrade paths
//!   each of those requires.
//! - **Media proxying** (`media.rs`): remote media is fetched through a fixed
//!   ordered endpoint list, sequentially, and streamed without buffering.
//! - **Protocol client** (`client.rs`): the default HTTP implementation of
//!   the capability traits in `services.rs`.

pub mod bridge;
pub mod client;
pub mod domain;
pub mod error;
pub mod events;
pub mod identity;
pub mod media;
pub mod services;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutil;

pub use bridge::FederationBridge;
pub use client::{ProtocolClient, ProtocolConfig};
pub use domain::DomainResolver;
pub use error::BridgeError;
pub use events::EventRouter;
pub use media::MediaProxy;
pub use services::ProtocolServices;
pub use store::{BridgeStore, PgStore};
