//! # Status Query Packets
//!
//! Request construction and reply parsing for the per-server UDP status
//! protocol. Every request is five bytes:
//!
//! ```text
//! 0x78 0x00 0x00 0x00 <type>
//! ```
//!
//! and a reply for that request starts with `0x80 0x00 0x00 0x00 <type>`.
//! Replies are parsed into a [`ServerRecord`] in place; malformed input
//! leaves fields at their defaults and never panics.

use crate::core::text::{clean_text, skip_length_prefix, split_nul};
use crate::protocol::record::{PlayerEntry, ServerRecord, Team};

/// Length of the request and reply headers.
pub const HEADER_LEN: usize = 5;

const REQUEST_MAGIC: u8 = 0x78;
const RESPONSE_MAGIC: u8 = 0x80;

/// Index of the server name among the NUL separated info fields.
const INFO_NAME_FIELD: usize = 15;
/// Index of the game type field, after which the binary trailer starts.
const INFO_GAMETYPE_FIELD: usize = 17;
/// num_players, max_players, flags and the skill byte.
const INFO_TRAILER_LEN: usize = 13;

/// Index of the first variable name in a variables reply.
const FIRST_VARIABLE_FIELD: usize = 3;

/// Bytes following each player name: ping, stats id and team.
const PLAYER_TRAILER_LEN: usize = 12;

/// The three exchanges of a status query, in the order they are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Info = 0x00,
    Variables = 0x01,
    Players = 0x02,
}

impl QueryKind {
    /// Exchange order used by a full status query.
    pub const SEQUENCE: [QueryKind; 3] = [QueryKind::Players, QueryKind::Info, QueryKind::Variables];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Info => "info",
            QueryKind::Variables => "variables",
            QueryKind::Players => "players",
        }
    }
}

/// Build the request datagram for `kind`.
pub fn build_request(kind: QueryKind) -> [u8; HEADER_LEN] {
    [REQUEST_MAGIC, 0, 0, 0, kind.code()]
}

/// Whether `datagram` is a reply to a `kind` request.
pub fn is_response(datagram: &[u8], kind: QueryKind) -> bool {
    datagram.len() >= HEADER_LEN && datagram[..HEADER_LEN] == [RESPONSE_MAGIC, 0, 0, 0, kind.code()]
}

fn i32_at(data: &[u8], offset: usize) -> Option<i32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Parse a players reply into `record.players`.
///
/// The list is rebuilt from scratch. Parsing stops at the first record
/// whose trailing fields are cut off.
pub fn parse_players(record: &mut ServerRecord, data: &[u8]) {
    record.players.clear();
    if data.len() < HEADER_LEN {
        return;
    }

    let mut offset = HEADER_LEN;
    while offset + 4 < data.len() {
        let score = match i32_at(data, offset) {
            Some(score) => score,
            None => break,
        };
        offset += 4;

        let name_end = data[offset..]
            .iter()
            .position(|&b| b == 0)
            .map_or(data.len(), |pos| offset + pos);
        let name = clean_text(skip_length_prefix(&data[offset..name_end]));
        offset = (name_end + 1).min(data.len());

        if offset + PLAYER_TRAILER_LEN > data.len() {
            break;
        }
        let ping = i32_at(data, offset).unwrap_or_default();
        let stats_id = i32_at(data, offset + 4).unwrap_or_default();
        let team_raw = i32_at(data, offset + 8).unwrap_or_default();
        offset += PLAYER_TRAILER_LEN;

        // Team score and round bookkeeping rows have no name
        if name.is_empty() {
            continue;
        }

        record.players.push(PlayerEntry {
            name,
            score,
            ping,
            stats_id,
            team: Team::from_code(team_raw),
        });
    }
}

/// Parse an info reply into the descriptive fields of `record`.
///
/// The datagram is walked field by field from its first byte, header
/// included. The binary trailer is read from wherever the cursor stops after
/// the game type field, since its integers may contain NUL bytes.
pub fn parse_info(record: &mut ServerRecord, data: &[u8]) {
    let mut cursor = 0;
    let mut fields = Vec::with_capacity(INFO_GAMETYPE_FIELD + 1);

    while fields.len() <= INFO_GAMETYPE_FIELD && cursor < data.len() {
        let rest = &data[cursor..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                fields.push(&rest[..end]);
                cursor += end + 1;
            }
            None => {
                fields.push(rest);
                cursor = data.len();
            }
        }
    }

    if fields.len() <= INFO_GAMETYPE_FIELD {
        return;
    }

    let text = |index: usize| clean_text(skip_length_prefix(fields[index]));
    record.name = text(INFO_NAME_FIELD);
    record.map_name = text(INFO_NAME_FIELD + 1);
    record.gametype = text(INFO_GAMETYPE_FIELD);

    let trailer = &data[cursor..];
    if trailer.len() >= INFO_TRAILER_LEN {
        record.num_players = i32_at(trailer, 0).unwrap_or_default();
        record.max_players = i32_at(trailer, 4).unwrap_or_default();
        record.flags = i32_at(trailer, 8).unwrap_or_default();
        record.skill = trailer[12];
    }
}

/// Parse a variables reply into `record.variables`.
///
/// Pairs with an empty name are skipped and repeated names are kept.
pub fn parse_variables(record: &mut ServerRecord, data: &[u8]) {
    let fields = split_nul(data);
    let mut index = FIRST_VARIABLE_FIELD;
    while index + 1 < fields.len() {
        let key = clean_text(fields[index]);
        if !key.is_empty() {
            record.variables.insert(key, clean_text(fields[index + 1]));
        }
        index += 2;
    }
}
