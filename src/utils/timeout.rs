//! Default deadlines and a timeout wrapper for protocol phases.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Wait for one UDP query reply.
pub const UDP_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolve and connect to a master server.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for one handshake frame from the master server.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for the result count and each listed server.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(15);

/// Grace period for in-flight workers when the runtime shuts down.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut` under `limit`, reporting `PhaseTimeout(phase)` if it elapses.
pub async fn with_timeout<F, T>(limit: Duration, phase: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::PhaseTimeout(phase)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_future_reports_phase() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), "challenge", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ProtocolError::PhaseTimeout("challenge"))));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok: Result<u8> = with_timeout(Duration::from_secs(1), "count", async { Ok(7) }).await;
        assert_eq!(ok.ok(), Some(7));

        let err: Result<u8> = with_timeout(Duration::from_secs(1), "count", async {
            Err(ProtocolError::EmptyResult)
        })
        .await;
        assert!(matches!(err, Err(ProtocolError::EmptyResult)));
    }
}
