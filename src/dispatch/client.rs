use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::command::EnforcementCommand;
use super::traits::Dispatch;

/// Errors from talking to the enforcement point.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timeout to {addr} after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },
}

/// TCP/JSON client for the enforcement point.
///
/// Each command gets its own connection: connect, write the JSON payload,
/// half-close the write side to signal end-of-request, then read until the
/// peer closes. The whole round trip runs under one fixed timeout.
pub struct PolicyDispatcher {
    host: String,
    port: u16,
    timeout: Duration,
    /// Advisory only; written by the liveness probe and by send failures,
    /// never used to gate outgoing commands.
    connected: AtomicBool,
}

impl PolicyDispatcher {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        PolicyDispatcher {
            host: host.into(),
            port,
            timeout,
            connected: AtomicBool::new(false),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Last observed reachability of the enforcement point.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Verify the enforcement point answers a `ping`.
    ///
    /// Retries up to 3 times with a fixed 2 second backoff. Called once at
    /// process start to log connectivity; normal traffic is never gated on
    /// the result.
    pub async fn test_connection(&self) -> Result<(), DispatchError> {
        const MAX_ATTEMPTS: u32 = 3;
        const RETRY_INTERVAL: Duration = Duration::from_secs(2);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.send_raw(&EnforcementCommand::Ping.to_wire()).await {
                Ok(_) => {
                    info!(addr = %self.addr(), "Enforcement point connection verified");
                    self.connected.store(true, Ordering::Relaxed);
                    return Ok(());
                }
                Err(e) if attempt == MAX_ATTEMPTS => {
                    warn!(addr = %self.addr(), error = %e, "Enforcement point unreachable after retries");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        addr = %self.addr(),
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "Connection test failed, retrying"
                    );
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }

        unreachable!("loop returns on last attempt")
    }

    async fn send_raw(
        &self,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        let addr = self.addr();
        let body = payload.to_string();
        debug!(addr = %addr, payload = %body, "Dispatching to enforcement point");

        let round_trip = async {
            let mut stream = TcpStream::connect(&addr).await?;
            stream.write_all(body.as_bytes()).await?;
            // Half-close: end-of-request marker for the peer.
            stream.shutdown().await?;

            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        let buf = match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(Ok(buf)) => buf,
            Ok(Err(e)) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(e.into());
            }
            Err(_) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(DispatchError::Timeout {
                    addr,
                    timeout: self.timeout,
                });
            }
        };

        Ok(parse_reply(&buf))
    }
}

/// Normalize whatever the enforcement point sends back.
///
/// The reply format is not contractually fixed: an empty body and plain
/// text both count as success, since dispatch success is inferred from the
/// connection completing, not from reply content.
pub fn parse_reply(buf: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(buf);
    let text = text.trim();

    if text.is_empty() {
        return serde_json::json!({ "status": "ok" });
    }

    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => serde_json::json!({ "status": "ok", "message": text }),
    }
}

#[async_trait]
impl Dispatch for PolicyDispatcher {
    async fn send(
        &self,
        command: &EnforcementCommand,
    ) -> Result<serde_json::Value, DispatchError> {
        self.send_raw(&command.to_wire()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// One-shot server: read the full request, reply with `response`, close.
    async fn one_shot_server(response: &'static [u8]) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            stream.write_all(response).await.unwrap();
        });

        addr
    }

    fn dispatcher_for(addr: std::net::SocketAddr, timeout: Duration) -> PolicyDispatcher {
        PolicyDispatcher::new(addr.ip().to_string(), addr.port(), timeout)
    }

    #[tokio::test]
    async fn test_empty_reply_is_ok() {
        let addr = one_shot_server(b"").await;
        let dispatcher = dispatcher_for(addr, Duration::from_secs(1));

        let reply = dispatcher.send(&EnforcementCommand::Ping).await.unwrap();
        assert_eq!(reply, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_json_reply_is_parsed() {
        let addr = one_shot_server(br#"{"status":"applied","count":3}"#).await;
        let dispatcher = dispatcher_for(addr, Duration::from_secs(1));

        let reply = dispatcher.send(&EnforcementCommand::Ping).await.unwrap();
        assert_eq!(reply["status"], "applied");
        assert_eq!(reply["count"], 3);
    }

    #[tokio::test]
    async fn test_plain_text_reply_is_wrapped() {
        let addr = one_shot_server(b"RULES APPLIED\n").await;
        let dispatcher = dispatcher_for(addr, Duration::from_secs(1));

        let reply = dispatcher.send(&EnforcementCommand::Ping).await.unwrap();
        assert_eq!(
            reply,
            serde_json::json!({ "status": "ok", "message": "RULES APPLIED" })
        );
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept but never reply and never close.
        let hold = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(stream);
        });

        let dispatcher = dispatcher_for(addr, Duration::from_millis(100));
        let err = dispatcher.send(&EnforcementCommand::Ping).await.unwrap_err();

        assert!(matches!(err, DispatchError::Timeout { .. }));
        assert!(!dispatcher.is_connected());
        hold.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_is_io_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher = dispatcher_for(addr, Duration::from_secs(1));
        let err = dispatcher.send(&EnforcementCommand::Ping).await.unwrap_err();

        assert!(matches!(err, DispatchError::Io(_)));
    }

    #[tokio::test]
    async fn test_probe_marks_connected() {
        let addr = one_shot_server(b"").await;
        let dispatcher = dispatcher_for(addr, Duration::from_secs(1));

        assert!(!dispatcher.is_connected());
        dispatcher.test_connection().await.unwrap();
        assert!(dispatcher.is_connected());
    }

    #[test]
    fn test_parse_reply_variants() {
        assert_eq!(parse_reply(b""), serde_json::json!({ "status": "ok" }));
        assert_eq!(parse_reply(b"  \n"), serde_json::json!({ "status": "ok" }));
        assert_eq!(
            parse_reply(br#"{"status":"error"}"#),
            serde_json::json!({ "status": "error" })
        );
        assert_eq!(
            parse_reply(b"done"),
            serde_json::json!({ "status": "ok", "message": "done" })
        );
    }
}
