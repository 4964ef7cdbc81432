//! # utquery
//!
//! Client library for Unreal Tournament 2004 server browsing.
//!
//! Two protocols are covered:
//! - the per-server UDP status query, returning server details, the player
//!   list and server variables ([`service::query_client`])
//! - the TCP master server protocol, which authenticates with a CD key and
//!   returns the list of registered servers ([`service::master_client`])
//!
//! Both run as background tasks on a [`QueryRuntime`] so a UI loop can poll
//! for results without blocking.
//!
//! ## Layout
//! - [`core`]: compact index, archive strings and packet framing
//! - [`protocol`]: packet builders, reply parsers and result records
//! - [`service`]: sockets, the master session and the task layer
//! - [`utils`]: hashing, logging, timeouts, color codes and CD keys
//! - [`config`]: TOML and environment configuration
//! - [`error`]: error type and classification

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use config::QueryConfig;
pub use error::{ErrorKind, ProtocolError, Result};
pub use protocol::record::{
    MasterEntry, MasterQueryResult, PlayerEntry, ServerRecord, ServerStatus, Team, Variables,
};
pub use service::{query_master, query_server, MasterTask, QueryRuntime, ServerEntry, TaskState};
