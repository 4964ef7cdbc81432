//! Result structures handed to callers.
//!
//! A [`ServerRecord`] is keyed by its `(address, port)` pair. Fresh query
//! results are merged with [`ServerRecord::merge_from`], which replaces the
//! content fields and keeps the identity the caller configured.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorKind;

/// Team a player is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
    Spectator,
    #[default]
    Unknown,
}

impl Team {
    pub const RED_CODE: i32 = 0x2000_0000;
    pub const BLUE_CODE: i32 = 0x4000_0000;

    /// Map the raw team field of a players reply.
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::RED_CODE => Team::Red,
            Self::BLUE_CODE => Team::Blue,
            0 => Team::Spectator,
            _ => Team::Unknown,
        }
    }
}

/// One player from a players reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerEntry {
    /// Name, color codes included
    pub name: String,
    pub score: i32,
    pub ping: i32,
    pub stats_id: i32,
    pub team: Team,
}

/// Lifecycle of a [`ServerRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServerStatus {
    #[default]
    Idle,
    Querying,
    Online,
    Timeout,
    Error,
}

impl ServerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerStatus::Idle => "idle",
            ServerStatus::Querying => "querying",
            ServerStatus::Online => "online",
            ServerStatus::Timeout => "timeout",
            ServerStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server variables in arrival order. Names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Variables {
    entries: Vec<(String, String)>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key`, in arrival order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything known about one game server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerRecord {
    pub address: String,
    /// Game port; queries go to `port + 1`
    pub port: u16,
    pub name: String,
    pub map_name: String,
    pub map_title: String,
    pub gametype: String,
    pub num_players: i32,
    pub max_players: i32,
    pub flags: i32,
    pub skill: u8,
    /// Round trip of the info exchange in milliseconds
    pub ping: u32,
    pub online: bool,
    pub status: ServerStatus,
    pub players: Vec<PlayerEntry>,
    pub variables: Variables,
}

impl ServerRecord {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Self::default()
        }
    }

    /// The `(address, port)` pair identifying this record.
    pub fn identity(&self) -> (&str, u16) {
        (&self.address, self.port)
    }

    /// Replace every content field with `fresh`, keeping this record's
    /// address and port.
    pub fn merge_from(&mut self, fresh: ServerRecord) {
        let address = std::mem::take(&mut self.address);
        let port = self.port;
        *self = fresh;
        self.address = address;
        self.port = port;
    }
}

/// One server as listed by the master server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MasterEntry {
    pub ip: String,
    pub port: u16,
    pub query_port: u16,
    pub name: String,
    pub map_name: String,
    pub game_type: String,
    pub current_players: i32,
    pub max_players: i32,
    pub flags: i32,
}

impl MasterEntry {
    /// A record seeded from the listing, ready for a status query.
    pub fn to_record(&self) -> ServerRecord {
        ServerRecord {
            address: self.ip.clone(),
            port: self.port,
            name: self.name.clone(),
            map_name: self.map_name.clone(),
            gametype: self.game_type.clone(),
            num_players: self.current_players,
            max_players: self.max_players,
            flags: self.flags,
            online: true,
            status: ServerStatus::Idle,
            ..ServerRecord::default()
        }
    }
}

/// Outcome of one master server session.
///
/// When `error` is set the server list must be treated as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MasterQueryResult {
    pub servers: Vec<MasterEntry>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl MasterQueryResult {
    pub fn success(servers: Vec<MasterEntry>) -> Self {
        Self {
            servers,
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            servers: Vec::new(),
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Listed servers, empty whenever the session failed.
    pub fn servers(&self) -> &[MasterEntry] {
        if self.is_ok() {
            &self.servers
        } else {
            &[]
        }
    }

    /// One-line status for display.
    pub fn summary(&self) -> String {
        match &self.error {
            Some(error) => format!("error: {error}"),
            None if self.servers.is_empty() => "no servers found".to_string(),
            None => format!("{} servers", self.servers.len()),
        }
    }

    /// Records for every listed server, or none if the session failed.
    pub fn to_records(&self) -> Vec<ServerRecord> {
        self.servers().iter().map(MasterEntry::to_record).collect()
    }
}
