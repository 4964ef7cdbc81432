//! # Protocol Layer
//!
//! Packet construction and parsing for both wire protocols, free of any I/O.
//!
//! ## Components
//! - **Query**: UDP status requests and the players, info and variables replies
//! - **Master**: master server handshake packets and listing entries
//! - **Record**: result structures shared with callers
//!
//! Socket handling lives in [`crate::service`].

pub mod master;
pub mod query;
pub mod record;
