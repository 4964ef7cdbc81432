//! # Network Services
//!
//! Socket-owning clients and the background task layer around them.
//!
//! ## Components
//! - **Query client**: UDP status query of one game server
//! - **Master client**: authenticated master server session and listing
//! - **Tasks**: worker runtime, per-server refresh handles and master tasks

pub mod master_client;
pub mod query_client;
pub mod tasks;

pub use master_client::{query_master, query_master_with, query_masters, MasterSession};
pub use query_client::{query_server, query_server_with};
pub use tasks::{poll_all, MasterTask, QueryRuntime, ServerEntry, TaskState};
