use crate::domain::error::{TermlinkError, TermlinkResult};
use crate::infrastructure::transport::{
    inbound_channel, Connection, ConnectionWriter, Transport, READ_CHUNK_SIZE,
};
use async_trait::async_trait;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Poll interval for the blocking serial read loop. The port read itself
/// uses this as its timeout, so a quit tears the task down within one tick.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial device transport. The blocking `serialport` handle is cloned:
/// one clone feeds a `spawn_blocking` read loop, the other becomes the
/// connection's writer.
pub struct SerialTransport {
    port: String,
    baud_rate: u32,
}

impl SerialTransport {
    pub fn new(port: String, baud_rate: u32) -> Self {
        Self { port, baud_rate }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&self) -> TermlinkResult<Connection> {
        let writer = serialport::new(&self.port, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        let mut reader = writer.try_clone()?;

        debug!("serial port {} opened at {} baud", self.port, self.baud_rate);

        let (tx, rx) = inbound_channel();
        let reader_handle = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(buf.as_mut_slice()) {
                    Ok(0) => continue,
                    Ok(n) => {
                        if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        if tx.is_closed() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.blocking_send(Err(TermlinkError::Io(e)));
                        break;
                    }
                }
            }
        });

        Ok(Connection::from_parts(
            rx,
            ConnectionWriter::Serial(writer),
            reader_handle,
        ))
    }
}
