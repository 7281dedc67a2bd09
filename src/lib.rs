//! A peer-to-peer gossip chat library with a companion name-resolution
//! directory service.

pub mod chat;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod group;
pub mod message;
pub mod net;
pub mod peer;
pub mod wire;

pub use chat::ChatModel;
pub use error::{MeshError, Result};
pub use group::Group;
pub use peer::Peer;
