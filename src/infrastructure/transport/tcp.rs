use crate::domain::error::TermlinkResult;
use crate::infrastructure::transport::{Connection, Transport};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// TCP client transport. One `open` call yields one connection; retry and
/// backoff live in the connector, not here.
pub struct TcpTransport {
    host: String,
    port: u16,
}

impl TcpTransport {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self) -> TermlinkResult<Connection> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;

        // Interactive keystrokes should not sit in Nagle's buffer.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {}", e);
        }

        debug!("TCP connection established to {}:{}", self.host, self.port);
        Ok(Connection::from_stream(stream))
    }
}
