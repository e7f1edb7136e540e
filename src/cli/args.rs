use crate::domain::config::{RetryPolicy, SessionConfig, Target};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments for Termlink
#[derive(Parser, Debug)]
#[command(
    name = "termlink",
    version = env!("CARGO_PKG_VERSION"),
    about = "Interactive terminal client for serial devices and TCP peers",
    long_about = "Connects a terminal session to a serial device or TCP peer, with line \
editing and history, automatic connect retry, paced output for slow receivers, and a \
timestamped transcript of everything sent and received."
)]
pub struct Args {
    /// Enable verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Profile name scoping the history file and default transcript names
    #[arg(short, long, global = true, default_value = "default")]
    pub profile: String,

    /// Transcript file path (default: a per-session file under ~/.termlink/logs)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Delay between transmitted bytes, in milliseconds, for slow receivers
    #[arg(long, global = true, default_value = "0")]
    pub send_delay: u64,

    /// Give up connecting after this many seconds (default: retry forever)
    #[arg(long, global = true)]
    pub retry_timeout: Option<u64>,

    /// Reconnect after a mid-session connection loss instead of exiting
    #[arg(long, global = true)]
    pub reconnect: bool,

    /// Treat transcript write failures as fatal instead of continuing
    #[arg(long, global = true)]
    pub strict_logging: bool,

    /// Endpoint to connect to
    #[command(subcommand)]
    pub command: Command,
}

/// Available endpoints
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a serial device
    Serial {
        /// Serial port path, e.g. /dev/ttyUSB0
        port: String,

        /// Baud rate
        #[arg(short, long, default_value = "115200")]
        baud: u32,
    },
    /// Connect to a TCP peer
    Tcp {
        /// Host name or address
        host: String,

        /// Port number
        port: u16,
    },
}

impl Args {
    /// Translate the parsed arguments into a session configuration.
    pub fn session_config(&self) -> SessionConfig {
        let target = match &self.command {
            Command::Serial { port, baud } => Target::Serial {
                port: port.clone(),
                baud_rate: *baud,
            },
            Command::Tcp { host, port } => Target::Tcp {
                host: host.clone(),
                port: *port,
            },
        };

        let retry = RetryPolicy {
            max_total_wait: self.retry_timeout.map(Duration::from_secs),
            ..RetryPolicy::default()
        };

        let mut config = SessionConfig::new(target);
        config.retry = retry;
        config.per_byte_delay = Duration::from_millis(self.send_delay);
        config.profile = self.profile.clone();
        config.log_file = self.log_file.clone();
        config.reconnect = self.reconnect;
        config.strict_logging = self.strict_logging;
        config
    }
}
