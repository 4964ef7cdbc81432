//! Master server client.
//!
//! A [`MasterSession`] owns one framed TCP connection and walks the
//! handshake phases strictly in order. Any failure up to and including the
//! result count aborts the session with a single error. Once the listing
//! starts, bad entries are skipped and a broken connection ends the listing
//! with whatever was already decoded.

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

use crate::config::{MasterConfig, MasterServerAddr};
use crate::core::codec::FrameCodec;
use crate::error::{constants, ErrorKind, ProtocolError, Result};
use crate::protocol::master::{
    credentials_packet, decode_entry, global_hash_packet, parse_approval, parse_challenge,
    parse_count, parse_review, query_packet,
};
use crate::protocol::record::{MasterEntry, MasterQueryResult};
use crate::utils::timeout::with_timeout;

/// One authenticated conversation with a master server.
pub struct MasterSession {
    framed: Framed<TcpStream, FrameCodec>,
    phase: &'static str,
    challenge: String,
    handshake_timeout: Duration,
    listing_timeout: Duration,
}

impl MasterSession {
    /// Open the TCP connection.
    ///
    /// # Errors
    /// `ConnectFailure` if the host does not resolve, refuses the connection
    /// or does not accept it within the connect deadline.
    #[instrument(skip(config))]
    pub async fn connect(config: &MasterConfig, host: &str, port: u16) -> Result<Self> {
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ProtocolError::ConnectFailure(format!("{host}:{port}: {e}"))),
            Err(_) => return Err(ProtocolError::ConnectFailure(format!("{host}:{port}: timed out"))),
        };
        stream.set_nodelay(true)?;
        debug!("connected");

        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new(config.max_frame_size)),
            phase: constants::PHASE_CONNECT,
            challenge: String::new(),
            handshake_timeout: config.handshake_timeout,
            listing_timeout: config.listing_timeout,
        })
    }

    /// Phase the session last entered.
    pub fn phase(&self) -> &'static str {
        self.phase
    }

    /// Challenge token received from the server, empty before the handshake.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    async fn send(&mut self, phase: &'static str, payload: Bytes) -> Result<()> {
        self.phase = phase;
        let framed = &mut self.framed;
        with_timeout(self.handshake_timeout, phase, framed.send(payload)).await
    }

    async fn receive(&mut self, phase: &'static str, limit: Duration) -> Result<BytesMut> {
        self.phase = phase;
        let framed = &mut self.framed;
        with_timeout(limit, phase, async move {
            match framed.next().await {
                Some(frame) => frame,
                None => Err(ProtocolError::ConnectionClosed),
            }
        })
        .await
    }

    /// Authenticate with `cdkey`.
    ///
    /// # Errors
    /// `Rejected` or `NotVerified` when the server refuses, `PhaseTimeout`
    /// when it stops answering.
    #[instrument(skip_all)]
    pub async fn handshake(&mut self, cdkey: &str) -> Result<()> {
        let limit = self.handshake_timeout;
        let frame = self.receive(constants::PHASE_CHALLENGE, limit).await?;
        self.challenge = parse_challenge(&frame)?;
        debug!(challenge = %self.challenge, "challenge received");

        let credentials = credentials_packet(cdkey, &self.challenge);
        self.send(constants::PHASE_CREDENTIALS, credentials).await?;

        let frame = self.receive(constants::PHASE_REVIEW, limit).await?;
        parse_review(&frame)?;

        self.send(constants::PHASE_GLOBAL_HASH, global_hash_packet()).await?;

        let frame = self.receive(constants::PHASE_APPROVAL, limit).await?;
        parse_approval(&frame)?;
        debug!("handshake verified");
        Ok(())
    }

    /// Ask for the server list and collect the entries.
    ///
    /// # Errors
    /// Fails only before the first entry: on a send failure, a missing
    /// count or `EmptyResult`.
    #[instrument(skip(self))]
    pub async fn list_servers(&mut self, gametype_filter: &str) -> Result<Vec<MasterEntry>> {
        let limit = self.listing_timeout;
        self.send(constants::PHASE_QUERY, query_packet(gametype_filter)).await?;

        let frame = self.receive(constants::PHASE_COUNT, limit).await?;
        let (count, compact) = parse_count(&frame)?;
        debug!(count, compact, "listing announced");

        let mut servers = Vec::with_capacity(count.min(4096));
        for received in 0..count {
            let frame = match self.receive(constants::PHASE_ENTRIES, limit).await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(received, expected = count, error = %e, "listing ended early");
                    break;
                }
            };
            match decode_entry(&frame, compact) {
                Ok(entry) => servers.push(entry),
                Err(e) => debug!(error = %e, "skipping malformed entry"),
            }
        }
        Ok(servers)
    }
}

async fn run_session(
    config: &MasterConfig,
    host: &str,
    port: u16,
    cdkey: &str,
    gametype_filter: &str,
) -> Result<Vec<MasterEntry>> {
    let mut session = MasterSession::connect(config, host, port).await?;
    session.handshake(cdkey).await?;
    session.list_servers(gametype_filter).await
}

/// Fetch the server list from one master server with default settings.
pub async fn query_master(host: &str, port: u16, cdkey: &str, gametype_filter: &str) -> MasterQueryResult {
    query_master_with(&MasterConfig::default(), host, port, cdkey, gametype_filter).await
}

/// Fetch the server list from one master server.
///
/// Never fails outright; errors are carried in the result.
#[instrument(skip(config, cdkey))]
pub async fn query_master_with(
    config: &MasterConfig,
    host: &str,
    port: u16,
    cdkey: &str,
    gametype_filter: &str,
) -> MasterQueryResult {
    match run_session(config, host, port, cdkey, gametype_filter).await {
        Ok(servers) => {
            info!(servers = servers.len(), "master listing complete");
            MasterQueryResult::success(servers)
        }
        Err(e) => {
            warn!(error = %e, "master query failed");
            MasterQueryResult::failure(e.kind(), e.to_string())
        }
    }
}

/// Try each configured master server in turn.
///
/// Moves on to the next server only when the connection itself failed; the
/// first server that answers decides the result.
pub async fn query_masters(config: &MasterConfig, cdkey: &str, gametype_filter: &str) -> MasterQueryResult {
    let mut last = MasterQueryResult::failure(ErrorKind::Usage, "no master servers configured");
    for MasterServerAddr { host, port } in &config.servers {
        last = query_master_with(config, host, *port, cdkey, gametype_filter).await;
        if last.error_kind != Some(ErrorKind::ConnectFailure) {
            break;
        }
        debug!(%host, port, "trying next master server");
    }
    last
}
