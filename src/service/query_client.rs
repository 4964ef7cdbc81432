//! UDP status query client.
//!
//! One query runs the players, info and variables exchanges in that order
//! on a single socket aimed at the server's query port (game port + 1).
//! Each exchange sends its request once and then waits for a matching reply
//! until the exchange deadline, dropping anything else that arrives. Replies
//! from an earlier exchange that show up late are dropped the same way.
//!
//! The query never fails outright: problems are reflected in the returned
//! record's [`ServerStatus`].

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, trace, warn};

use crate::config::UdpQueryConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::query::{
    build_request, is_response, parse_info, parse_players, parse_variables, QueryKind, HEADER_LEN,
};
use crate::protocol::record::{ServerRecord, ServerStatus};

/// Pause after a receive error so a flood of ICMP errors cannot spin the loop.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Query `address:base_port + 1` with the default configuration.
pub async fn query_server(address: &str, base_port: u16) -> ServerRecord {
    query_server_with(&UdpQueryConfig::default(), address, base_port).await
}

/// Query `address:base_port + 1`.
///
/// The record comes back `Online` when the info exchange was answered,
/// `Timeout` when it was not and `Error` when no socket could be set up
/// (unresolvable address, no valid query port).
#[instrument(skip(config))]
pub async fn query_server_with(config: &UdpQueryConfig, address: &str, base_port: u16) -> ServerRecord {
    let mut record = ServerRecord::new(address, base_port);
    record.status = ServerStatus::Querying;

    let Some(query_port) = base_port.checked_add(1) else {
        warn!("game port has no query port above it");
        record.status = ServerStatus::Error;
        return record;
    };

    let socket = match open_socket(address, query_port).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "failed to set up query socket");
            record.status = ServerStatus::Error;
            return record;
        }
    };

    let mut buf = vec![0u8; config.recv_buffer_size.max(HEADER_LEN)];
    for kind in QueryKind::SEQUENCE {
        let started = Instant::now();
        let Some(len) = exchange(&socket, kind, config.exchange_timeout, &mut buf).await else {
            debug!(exchange = kind.as_str(), "no reply");
            continue;
        };
        let reply = &buf[..len];

        match kind {
            QueryKind::Players => parse_players(&mut record, reply),
            QueryKind::Info => {
                parse_info(&mut record, reply);
                record.online = true;
                record.ping = u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);
            }
            QueryKind::Variables => parse_variables(&mut record, reply),
        }
    }

    record.status = if record.online {
        ServerStatus::Online
    } else {
        ServerStatus::Timeout
    };
    debug!(
        status = %record.status,
        ping = record.ping,
        players = record.players.len(),
        "query finished"
    );
    record
}

/// Resolve `address` and connect a fresh socket of the matching family.
async fn open_socket(address: &str, port: u16) -> Result<UdpSocket> {
    let target = lookup_host((address, port))
        .await?
        .next()
        .ok_or_else(|| ProtocolError::SocketError(format!("{address} did not resolve")))?;

    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(target).await?;
    Ok(socket)
}

/// Send one request and wait for its reply, returning the reply length.
async fn exchange(socket: &UdpSocket, kind: QueryKind, limit: Duration, buf: &mut [u8]) -> Option<usize> {
    if let Err(e) = socket.send(&build_request(kind)).await {
        debug!(exchange = kind.as_str(), error = %e, "send failed");
        return None;
    }

    let deadline = Instant::now() + limit;
    loop {
        match timeout_at(deadline, socket.recv(buf)).await {
            Err(_) => return None,
            Ok(Ok(len)) if is_response(&buf[..len], kind) => return Some(len),
            Ok(Ok(len)) => trace!(exchange = kind.as_str(), len, "dropping stray datagram"),
            Ok(Err(e)) => {
                // Port unreachable and friends; keep waiting
                trace!(exchange = kind.as_str(), error = %e, "receive error");
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}
