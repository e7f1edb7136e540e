use std::path::PathBuf;
use std::time::Duration;

/// Remote endpoint the session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Serial { port: String, baud_rate: u32 },
    Tcp { host: String, port: u16 },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Serial { port, baud_rate } => write!(f, "{} @ {} baud", port, baud_rate),
            Target::Tcp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Backoff schedule for connection attempts.
///
/// The delay after attempt `n` is `initial_delay * multiplier^(n-1)`,
/// capped at `max_delay`. With `max_total_wait` unset the connector
/// retries forever.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_total_wait: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            max_total_wait: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        // Multipliers below 1.0 would make the schedule decrease; clamp so
        // the delay sequence stays non-decreasing.
        let factor = self.backoff_multiplier.max(1.0).powi(exponent as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Everything one program invocation needs to run a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target: Target,
    pub retry: RetryPolicy,
    /// Delay between outbound bytes for slow receivers. Zero disables pacing.
    pub per_byte_delay: Duration,
    /// Profile name scoping the history file and default log file names.
    pub profile: String,
    /// Explicit transcript path; defaults to a per-session file under the
    /// data directory when unset.
    pub log_file: Option<PathBuf>,
    /// Reconnect after a mid-session connection loss instead of exiting.
    pub reconnect: bool,
    /// Treat transcript write failures as fatal instead of degrading.
    pub strict_logging: bool,
}

impl SessionConfig {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            retry: RetryPolicy::default(),
            per_byte_delay: Duration::ZERO,
            profile: "default".to_string(),
            log_file: None,
            reconnect: false,
            strict_logging: false,
        }
    }
}

/// Per-user data directory, `~/.termlink` (falls back to the working
/// directory when no home directory is known).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".termlink")
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

pub fn history_dir() -> PathBuf {
    data_dir().join("history")
}
