use std::time::Duration;
use thiserror::Error;

/// Termlink unified error type
#[derive(Error, Debug)]
pub enum TermlinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection to {target} timed out after {elapsed:?} ({attempts} attempts)")]
    ConnectTimeout {
        target: String,
        elapsed: Duration,
        attempts: u32,
    },

    #[error("connection closed by peer")]
    PeerClosed,

    #[error("transcript error: {0}")]
    Transcript(String),
}

impl TermlinkError {
    /// Process exit status for a fatal error. Connect timeouts get a
    /// distinct status so callers can tell "never reachable" from
    /// "failed mid-session".
    pub fn exit_code(&self) -> i32 {
        match self {
            TermlinkError::ConnectTimeout { .. } => 2,
            _ => 1,
        }
    }

    /// True for errors on an established connection that the engine may
    /// recover from by reconnecting.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            TermlinkError::Io(_) | TermlinkError::Serial(_) | TermlinkError::PeerClosed
        )
    }
}

pub type TermlinkResult<T> = Result<T, TermlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let timeout = TermlinkError::ConnectTimeout {
            target: "/dev/ttyUSB0".to_string(),
            elapsed: Duration::from_secs(30),
            attempts: 5,
        };
        assert_eq!(timeout.exit_code(), 2);
        assert_eq!(TermlinkError::PeerClosed.exit_code(), 1);
    }

    #[test]
    fn test_connection_loss_classification() {
        assert!(TermlinkError::PeerClosed.is_connection_loss());
        assert!(!TermlinkError::Transcript("disk full".to_string()).is_connection_loss());
    }
}
