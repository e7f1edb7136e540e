use crate::domain::{
    config::Target,
    error::{TermlinkError, TermlinkResult},
};
use async_trait::async_trait;
use serialport::SerialPort;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

mod serial;
mod tcp;

pub use serial::SerialTransport;
pub use tcp::TcpTransport;

/// Read granularity for inbound data.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Capacity of the inbound chunk channel between the reader task and the
/// session engine.
const INBOUND_CHANNEL_CAPACITY: usize = 32;

/// Opens a duplex byte stream to a remote endpoint. The connector is the
/// only caller; the session engine receives the opened `Connection`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> TermlinkResult<Connection>;
}

/// Build the transport matching a target.
pub fn for_target(target: &Target) -> Box<dyn Transport> {
    match target {
        Target::Serial { port, baud_rate } => {
            Box::new(SerialTransport::new(port.clone(), *baud_rate))
        }
        Target::Tcp { host, port } => Box::new(TcpTransport::new(host.clone(), *port)),
    }
}

/// Outbound half of an open connection.
pub(crate) enum ConnectionWriter {
    /// Async byte sink (TCP write half, or an in-memory stream in tests).
    Stream(Box<dyn AsyncWrite + Send + Unpin>),
    /// Cloned serial port handle. Writes are short blocking calls, the
    /// reader task holds its own clone.
    Serial(Box<dyn SerialPort + Send>),
}

/// A live duplex stream. Inbound chunks arrive on an mpsc channel fed by a
/// per-transport background reader task; the channel closing means the peer
/// closed the stream, an `Err` item carries a read error.
pub struct Connection {
    pub(crate) incoming: mpsc::Receiver<TermlinkResult<Vec<u8>>>,
    pub(crate) writer: ConnectionWriter,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Wrap any async duplex byte stream (used by the TCP transport and by
    /// tests via `tokio::io::duplex`).
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let reader_handle = tokio::spawn(stream_read_loop(read_half, tx));
        Self {
            incoming: rx,
            writer: ConnectionWriter::Stream(Box::new(write_half)),
            reader_handle,
        }
    }

    pub(crate) fn from_parts(
        incoming: mpsc::Receiver<TermlinkResult<Vec<u8>>>,
        writer: ConnectionWriter,
        reader_handle: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            incoming,
            writer,
            reader_handle,
        }
    }

    /// Next inbound chunk. `None` means the peer closed the stream.
    pub async fn recv(&mut self) -> Option<TermlinkResult<Vec<u8>>> {
        self.incoming.recv().await
    }

    /// Write bytes to the outbound half, preserving order.
    pub async fn write_all(&mut self, data: &[u8]) -> TermlinkResult<()> {
        write_bytes(&mut self.writer, data).await
    }

    /// Borrow the two directions independently, so the pacing writer can
    /// keep draining inbound chunks between outbound bytes.
    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<TermlinkResult<Vec<u8>>>,
        &mut ConnectionWriter,
    ) {
        (&mut self.incoming, &mut self.writer)
    }

    /// Release the stream and stop the reader task.
    pub async fn close(mut self) {
        if let ConnectionWriter::Stream(ref mut w) = self.writer {
            let _ = w.shutdown().await;
        }
        self.reader_handle.abort();
    }
}

pub(crate) async fn write_bytes(
    writer: &mut ConnectionWriter,
    data: &[u8],
) -> TermlinkResult<()> {
    match writer {
        ConnectionWriter::Stream(w) => {
            w.write_all(data).await?;
            w.flush().await?;
        }
        ConnectionWriter::Serial(port) => {
            std::io::Write::write_all(port, data).map_err(TermlinkError::Io)?;
            std::io::Write::flush(port).map_err(TermlinkError::Io)?;
        }
    }
    Ok(())
}

async fn stream_read_loop<R>(mut reader: R, tx: mpsc::Sender<TermlinkResult<Vec<u8>>>)
where
    R: AsyncRead + Send + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                break;
            }
        }
    }
}

pub(crate) fn inbound_channel() -> (
    mpsc::Sender<TermlinkResult<Vec<u8>>>,
    mpsc::Receiver<TermlinkResult<Vec<u8>>>,
) {
    mpsc::channel(INBOUND_CHANNEL_CAPACITY)
}
