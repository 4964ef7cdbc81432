//! Master server handshake packets and listing entries.
//!
//! Every function here works on one frame payload (the 4-byte length prefix
//! is handled by [`crate::core::codec::FrameCodec`]). Builders return frozen
//! payloads ready to be sent; parsers take a received payload and fail with a
//! [`ProtocolError`] describing what was wrong with it.
//!
//! The exchange, seen from the client:
//!
//! ```text
//! <- challenge
//! -> credentials      md5(cdkey), md5(cdkey + challenge), client info
//! <- review           "APPROVED" + i32
//! -> global hash      32 x '0'
//! <- approval         "VERIFIED"
//! -> query            optional gametype clause
//! <- count            i32 count + u8 compact flag
//! <- entry x count
//! ```

use bytes::Bytes;

use crate::core::archive::{ArchiveReader, ArchiveWriter};
use crate::error::{ProtocolError, Result};
use crate::protocol::record::MasterEntry;
use crate::utils::digest::{cdkey_hash, cdkey_response};

use tracing::trace;

/// Client identifier sent with the credentials.
pub const CLIENT_ID: &str = "UT2K4CLIENT";
/// Engine build the client claims to be.
pub const CLIENT_BUILD: i32 = 3369;
/// Client locale.
pub const CLIENT_LOCALE: &str = "int";
/// Review reply that lets the handshake continue.
pub const APPROVED: &str = "APPROVED";
/// Approval reply that unlocks the query phase.
pub const VERIFIED: &str = "VERIFIED";
/// Stand-in for the global content hash, which the master does not check.
pub const GLOBAL_HASH_PLACEHOLDER: &str = "00000000000000000000000000000000";

/// Game type class names accepted as a query filter. The empty string
/// lists every server.
pub const GAMETYPE_FILTERS: &[&str] = &[
    "",
    "xDeathMatch",
    "xTeamGame",
    "xCTFGame",
    "xBombingRun",
    "xDoubleDom",
    "ONSOnslaughtGame",
    "ASGameInfo",
    "xLastManStandingGame",
    "xMutantGame",
    "Invasion",
];

const PLATFORM: u8 = 0;
const CLIENT_TRAILER: [i32; 3] = [0, 0, 30];
const QUERY_OPCODE: u8 = 0;
const FILTER_KEY: &str = "gametype";
const FILTER_EQUALS: u8 = 0;

/// Legacy numeric game type codes used by compact listings, with the map
/// prefix each one implies.
const LEGACY_GAMETYPES: [(&str, &str, &str); 5] = [
    ("0", "xDeathMatch", "DM-"),
    ("1", "xCTFGame", "CTF-"),
    ("2", "xBombingRun", "BR-"),
    ("3", "xTeamGame", "DM-"),
    ("4", "xDoubleDom", "DOM-"),
];

/// Build the credentials packet answering `challenge`.
pub fn credentials_packet(cdkey: &str, challenge: &str) -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer
        .write_string(&cdkey_hash(cdkey))
        .write_string(&cdkey_response(cdkey, challenge))
        .write_string(CLIENT_ID)
        .write_i32(CLIENT_BUILD)
        .write_u8(PLATFORM)
        .write_string(CLIENT_LOCALE);
    for value in CLIENT_TRAILER {
        writer.write_i32(value);
    }
    writer.write_u8(0);
    writer.freeze()
}

/// Build the global hash packet.
pub fn global_hash_packet() -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer.write_string(GLOBAL_HASH_PLACEHOLDER);
    writer.freeze()
}

/// Build the server list query. An empty filter asks for every server.
pub fn query_packet(gametype_filter: &str) -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer.write_u8(QUERY_OPCODE);
    if gametype_filter.is_empty() {
        writer.write_compact(0);
    } else {
        writer
            .write_compact(1)
            .write_string(FILTER_KEY)
            .write_string(gametype_filter)
            .write_u8(FILTER_EQUALS);
    }
    writer.freeze()
}

/// Extract the challenge token.
pub fn parse_challenge(payload: &[u8]) -> Result<String> {
    ArchiveReader::new(payload).read_string()
}

/// Check the review reply.
///
/// # Errors
/// `Rejected` carrying the server's text when it is not [`APPROVED`].
pub fn parse_review(payload: &[u8]) -> Result<()> {
    let mut reader = ArchiveReader::new(payload);
    let verdict = reader.read_string()?;
    if verdict != APPROVED {
        return Err(ProtocolError::Rejected(verdict));
    }
    // Mod revision level, unused
    if let Ok(revision) = reader.read_i32() {
        trace!(revision, "review approved");
    }
    Ok(())
}

/// Check the approval reply.
///
/// # Errors
/// `NotVerified` carrying the server's text when it is not [`VERIFIED`].
pub fn parse_approval(payload: &[u8]) -> Result<()> {
    let verdict = ArchiveReader::new(payload).read_string()?;
    if verdict != VERIFIED {
        return Err(ProtocolError::NotVerified(verdict));
    }
    Ok(())
}

/// Read the announced result count and whether entries use the compact
/// layout.
///
/// # Errors
/// `EmptyResult` when the count is zero or negative, whether or not the
/// layout flag follows.
pub fn parse_count(payload: &[u8]) -> Result<(usize, bool)> {
    let mut reader = ArchiveReader::new(payload);
    let count = reader.read_i32()?;
    if count <= 0 {
        return Err(ProtocolError::EmptyResult);
    }
    let compact = reader.read_u8()? != 0;
    Ok((count as usize, compact))
}

/// Decode one listing entry in the layout announced by the count packet.
pub fn decode_entry(payload: &[u8], compact: bool) -> Result<MasterEntry> {
    if compact {
        decode_compact_entry(payload)
    } else {
        decode_verbose_entry(payload)
    }
}

/// Decode a compact entry and expand its legacy game type code.
pub fn decode_compact_entry(payload: &[u8]) -> Result<MasterEntry> {
    let mut reader = ArchiveReader::new(payload);
    let [a, b, c, d] = reader.read_octets()?;
    let port = reader.read_u16()?;
    let query_port = reader.read_u16()?;
    let name = reader.read_string()?;
    let map_name = reader.read_string()?;
    let game_type = reader.read_string()?;
    let current_players = i32::from(reader.read_u8()?);
    let max_players = i32::from(reader.read_u8()?);
    let flags = reader.read_i32()?;
    let _skill = reader.read_string()?;

    let mut entry = MasterEntry {
        ip: format!("{a}.{b}.{c}.{d}"),
        port,
        query_port,
        name,
        map_name,
        game_type,
        current_players,
        max_players,
        flags,
    };
    remap_gametype(&mut entry);
    Ok(entry)
}

/// Decode a verbose entry. Game types are already class names.
///
/// # Errors
/// `MalformedEntry` when the entry carries no address.
pub fn decode_verbose_entry(payload: &[u8]) -> Result<MasterEntry> {
    let mut reader = ArchiveReader::new(payload);
    let ip = reader.read_string()?;
    if ip.is_empty() {
        return Err(ProtocolError::MalformedEntry("missing address".to_string()));
    }
    // Ports travel as i32; only the low 16 bits are meaningful
    let port = reader.read_i32()? as u16;
    let query_port = reader.read_i32()? as u16;
    let name = reader.read_string()?;
    let map_name = reader.read_string()?;
    let game_type = reader.read_string()?;
    let current_players = reader.read_i32()?;
    let max_players = reader.read_i32()?;
    let _ping = reader.read_i32()?;
    let flags = reader.read_i32()?;
    let _skill = reader.read_string()?;

    Ok(MasterEntry {
        ip,
        port,
        query_port,
        name,
        map_name,
        game_type,
        current_players,
        max_players,
        flags,
    })
}

/// Replace a legacy numeric game type with its class name and give the map
/// the matching prefix if it has none.
///
/// A map counts as prefixed when its first `-` sits at byte 2 or 3, as in
/// `DM-Rankin` or `CTF-Face`. Unknown codes are left alone.
pub fn remap_gametype(entry: &mut MasterEntry) {
    let Some(&(_, class, prefix)) = LEGACY_GAMETYPES
        .iter()
        .find(|(code, _, _)| *code == entry.game_type)
    else {
        return;
    };

    entry.game_type = class.to_string();
    let has_prefix = matches!(entry.map_name.find('-'), Some(2) | Some(3));
    if !has_prefix {
        entry.map_name.insert_str(0, prefix);
    }
}
