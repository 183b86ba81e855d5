//! Federation module
//!
//! Handles ActivityPub protocol:
//! - Address parsing and URL mapping
//! - Key material and HTTP Signatures
//! - Wire messages
//! - Signed client for remote servers

mod activity;
mod address;
mod client;
mod keys;
mod signature;
mod urls;
mod webfinger;

pub use activity::*;
pub use address::*;
pub use client::FederationClient;
pub use keys::*;
pub use signature::*;
pub use urls::UrlResolver;
pub use webfinger::*;
