//! Master server sessions against scripted loopback servers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use utquery::config::{MasterConfig, MasterServerAddr};
use utquery::core::archive::{ArchiveReader, ArchiveWriter};
use utquery::core::codec::FrameCodec;
use utquery::error::ErrorKind;
use utquery::protocol::master::{APPROVED, GLOBAL_HASH_PLACEHOLDER, VERIFIED};
use utquery::service::master_client::{query_master_with, query_masters};
use utquery::utils::digest::md5_hex;

type Conn = Framed<TcpStream, FrameCodec>;

const CDKEY: &str = "ABCDE-12345-FGHIJ-67890";
const CHALLENGE: &str = "K7Q2P";

fn test_config() -> MasterConfig {
    MasterConfig {
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        listing_timeout: Duration::from_secs(2),
        ..MasterConfig::default()
    }
}

async fn mock_master<F, Fut>(script: F) -> (u16, JoinHandle<Fut::Output>)
where
    F: FnOnce(Conn) -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(Framed::new(stream, FrameCodec::default())).await
    });
    (port, handle)
}

fn string_frame(text: &str) -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer.write_string(text);
    writer.freeze()
}

fn count_frame(count: i32, compact: bool) -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer.write_i32(count).write_u8(u8::from(compact));
    writer.freeze()
}

fn compact_entry(octets: [u8; 4], name: &str, map: &str, gametype: &str) -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer
        .write_octets(octets)
        .write_u16(7777)
        .write_u16(7778)
        .write_string(name)
        .write_string(map)
        .write_string(gametype)
        .write_u8(3)
        .write_u8(16)
        .write_i32(0)
        .write_string("");
    writer.freeze()
}

fn verbose_entry(ip: &str, name: &str) -> Bytes {
    let mut writer = ArchiveWriter::new();
    writer
        .write_string(ip)
        .write_i32(7777)
        .write_i32(7778)
        .write_string(name)
        .write_string("CTF-Face")
        .write_string("xCTFGame")
        .write_i32(10)
        .write_i32(12)
        .write_i32(45)
        .write_i32(0)
        .write_string("4");
    writer.freeze()
}

async fn expect_frame(conn: &mut Conn) -> BytesMut {
    conn.next().await.expect("client closed early").expect("valid frame")
}

/// Drive a successful handshake, returning the two credential hashes and
/// the query packet.
async fn approve(conn: &mut Conn) -> (String, String, BytesMut) {
    conn.send(string_frame(CHALLENGE)).await.unwrap();

    let credentials = expect_frame(conn).await;
    let mut reader = ArchiveReader::new(&credentials);
    let key_hash = reader.read_string().unwrap();
    let response = reader.read_string().unwrap();
    assert_eq!(reader.read_string().unwrap(), "UT2K4CLIENT");
    assert_eq!(reader.read_i32().unwrap(), 3369);

    let mut review = ArchiveWriter::new();
    review.write_string(APPROVED).write_i32(1);
    conn.send(review.freeze()).await.unwrap();

    let global = expect_frame(conn).await;
    assert_eq!(
        ArchiveReader::new(&global).read_string().unwrap(),
        GLOBAL_HASH_PLACEHOLDER
    );
    conn.send(string_frame(VERIFIED)).await.unwrap();

    let query = expect_frame(conn).await;
    (key_hash, response, query)
}

#[tokio::test]
async fn test_rejected_review_stops_handshake() {
    let (port, server) = mock_master(|mut conn| async move {
        conn.send(string_frame(CHALLENGE)).await.unwrap();
        let _credentials = expect_frame(&mut conn).await;
        conn.send(string_frame("MD5 mismatch")).await.unwrap();
        // Anything after this would be the global hash
        conn.next().await.is_none()
    })
    .await;

    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "").await;
    assert!(!result.is_ok());
    assert_eq!(result.error_kind, Some(ErrorKind::ProtocolRejection));
    assert!(result.error.as_deref().unwrap().contains("MD5 mismatch"));
    assert!(result.servers().is_empty());

    assert!(server.await.unwrap(), "client sent a frame after rejection");
}

#[tokio::test]
async fn test_not_verified() {
    let (port, _server) = mock_master(|mut conn| async move {
        conn.send(string_frame(CHALLENGE)).await.unwrap();
        let _credentials = expect_frame(&mut conn).await;
        let mut review = ArchiveWriter::new();
        review.write_string(APPROVED).write_i32(1);
        conn.send(review.freeze()).await.unwrap();
        let _global = expect_frame(&mut conn).await;
        conn.send(string_frame("BANNED")).await.unwrap();
        let _ = conn.next().await;
    })
    .await;

    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "").await;
    assert_eq!(result.error_kind, Some(ErrorKind::ProtocolRejection));
    assert_eq!(result.error.as_deref(), Some("not verified: BANNED"));
}

#[tokio::test]
async fn test_compact_listing() {
    let (port, server) = mock_master(|mut conn| async move {
        let handshake = approve(&mut conn).await;
        conn.send(count_frame(3, true)).await.unwrap();
        conn.send(compact_entry([10, 0, 0, 1], "Test", "DM-Deck16][", "0")).await.unwrap();
        // Truncated entry is skipped
        conn.send(Bytes::from_static(&[192, 168, 1, 1, 0x61])).await.unwrap();
        conn.send(compact_entry([172, 16, 5, 9], "Flags", "Face", "1")).await.unwrap();
        let _ = conn.next().await;
        handshake
    })
    .await;

    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "xDeathMatch").await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.summary(), "2 servers");

    let first = &result.servers()[0];
    assert_eq!(first.ip, "10.0.0.1");
    assert_eq!((first.port, first.query_port), (7777, 7778));
    assert_eq!(first.name, "Test");
    assert_eq!(first.map_name, "DM-Deck16][");
    assert_eq!(first.game_type, "xDeathMatch");
    assert_eq!((first.current_players, first.max_players), (3, 16));

    let second = &result.servers()[1];
    assert_eq!(second.ip, "172.16.5.9");
    assert_eq!(second.game_type, "xCTFGame");
    assert_eq!(second.map_name, "CTF-Face");

    let (key_hash, response, query) = server.await.unwrap();
    assert_eq!(key_hash, md5_hex(CDKEY.as_bytes()));
    assert_eq!(response, md5_hex(format!("{CDKEY}{CHALLENGE}").as_bytes()));

    let mut reader = ArchiveReader::new(&query);
    assert_eq!(reader.read_u8().unwrap(), 0);
    assert_eq!(reader.read_compact().unwrap(), 1);
    assert_eq!(reader.read_string().unwrap(), "gametype");
    assert_eq!(reader.read_string().unwrap(), "xDeathMatch");
}

#[tokio::test]
async fn test_verbose_listing_drops_entries_without_address() {
    let (port, server) = mock_master(|mut conn| async move {
        let (_, _, query) = approve(&mut conn).await;
        conn.send(count_frame(3, false)).await.unwrap();
        conn.send(verbose_entry("192.0.2.5", "One")).await.unwrap();
        conn.send(verbose_entry("", "Ghost")).await.unwrap();
        conn.send(verbose_entry("192.0.2.6", "Two")).await.unwrap();
        let _ = conn.next().await;
        query
    })
    .await;

    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "").await;
    assert!(result.is_ok());
    let names: Vec<&str> = result.servers().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two"]);
    assert_eq!(result.servers()[0].game_type, "xCTFGame");
    assert_eq!(result.servers()[0].current_players, 10);

    // No filter: query opcode and an empty clause list
    assert_eq!(&server.await.unwrap()[..], &[0x00, 0x00]);
}

#[tokio::test]
async fn test_listing_cut_short_keeps_received_entries() {
    let (port, _server) = mock_master(|mut conn| async move {
        approve(&mut conn).await;
        conn.send(count_frame(5, true)).await.unwrap();
        conn.send(compact_entry([10, 0, 0, 1], "Only", "DM-Rankin", "0")).await.unwrap();
        // Connection drops here
    })
    .await;

    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "").await;
    assert!(result.is_ok());
    assert_eq!(result.servers().len(), 1);
    assert_eq!(result.servers()[0].name, "Only");
}

#[tokio::test]
async fn test_zero_count_is_empty_result() {
    let (port, _server) = mock_master(|mut conn| async move {
        approve(&mut conn).await;
        conn.send(count_frame(0, true)).await.unwrap();
        let _ = conn.next().await;
    })
    .await;

    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "").await;
    assert_eq!(result.error_kind, Some(ErrorKind::EmptyResult));
    assert_eq!(result.error.as_deref(), Some("no servers"));
}

#[tokio::test]
async fn test_silent_master_times_out() {
    let (port, _server) = mock_master(|mut conn| async move {
        // Accept, then say nothing
        let _ = conn.next().await;
    })
    .await;

    let config = MasterConfig {
        handshake_timeout: Duration::from_millis(200),
        ..test_config()
    };
    let result = query_master_with(&config, "127.0.0.1", port, CDKEY, "").await;
    assert_eq!(result.error_kind, Some(ErrorKind::PhaseTimeout));
    assert_eq!(result.error.as_deref(), Some("timed out waiting for challenge"));
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_connect_failure() {
    let port = closed_port().await;
    let result = query_master_with(&test_config(), "127.0.0.1", port, CDKEY, "").await;
    assert_eq!(result.error_kind, Some(ErrorKind::ConnectFailure));
    assert!(result.error.as_deref().unwrap().starts_with("connect failed"));
    assert_eq!(result.summary(), format!("error: {}", result.error.as_deref().unwrap()));
}

#[tokio::test]
async fn test_falls_back_to_next_master() {
    let dead = closed_port().await;
    let (live, _server) = mock_master(|mut conn| async move {
        approve(&mut conn).await;
        conn.send(count_frame(1, true)).await.unwrap();
        conn.send(compact_entry([10, 0, 0, 2], "Backup", "DM-Rankin", "0")).await.unwrap();
        let _ = conn.next().await;
    })
    .await;

    let config = MasterConfig {
        servers: vec![
            MasterServerAddr::new("127.0.0.1", dead),
            MasterServerAddr::new("127.0.0.1", live),
        ],
        ..test_config()
    };
    let result = query_masters(&config, CDKEY, "").await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.servers()[0].name, "Backup");
}
