use crate::core::logger::SessionLogger;
use crate::domain::{
    config::{RetryPolicy, Target},
    error::{TermlinkError, TermlinkResult},
};
use crate::infrastructure::transport::{self, Connection, Transport};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Opens the connection for a session, retrying with backoff while the
/// endpoint is unavailable. Owns the only reference to the transport; the
/// engine never opens a stream itself.
pub struct Connector {
    target: Target,
    policy: RetryPolicy,
    transport: Box<dyn Transport>,
}

impl Connector {
    pub fn new(target: Target, policy: RetryPolicy) -> Self {
        let transport = transport::for_target(&target);
        Self {
            target,
            policy,
            transport,
        }
    }

    /// Swap in a caller-provided transport (tests use this with mocks).
    pub fn with_transport(target: Target, policy: RetryPolicy, transport: Box<dyn Transport>) -> Self {
        Self {
            target,
            policy,
            transport,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Try to open the connection, sleeping the backoff delay between failed
    /// attempts. Every failed attempt and the eventual success each produce
    /// one `Info` transcript record, so the operator can audit retry
    /// progress without the log flooding. When the policy carries a total
    /// wait budget and it runs out, the attempt is abandoned with
    /// `ConnectTimeout`.
    pub async fn connect(&self, logger: &mut SessionLogger) -> TermlinkResult<Connection> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.transport.open().await {
                Ok(conn) => {
                    info!("connected to {} (attempt {})", self.target, attempt);
                    logger.info(&format!(
                        "connected to {} (attempt {})",
                        self.target, attempt
                    ))?;
                    return Ok(conn);
                }
                Err(e) => {
                    let elapsed = started.elapsed();
                    if let Some(budget) = self.policy.max_total_wait {
                        if elapsed >= budget {
                            logger.info(&format!(
                                "giving up on {} after {:?} ({} attempts)",
                                self.target, elapsed, attempt
                            ))?;
                            return Err(TermlinkError::ConnectTimeout {
                                target: self.target.to_string(),
                                elapsed,
                                attempts: attempt,
                            });
                        }
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "connect attempt {} to {} failed: {}; retrying in {:?}",
                        attempt, self.target, e, delay
                    );
                    logger.info(&format!(
                        "connect attempt {} to {} failed: {}; retrying in {:?}",
                        attempt, self.target, e, delay
                    ))?;
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SessionConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport that fails a fixed number of times before succeeding,
    /// recording when each attempt happened.
    struct FlakyTransport {
        failures: u32,
        attempts: AtomicU32,
        attempt_times: Arc<Mutex<Vec<Instant>>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                attempts: AtomicU32::new(0),
                attempt_times: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn open(&self) -> TermlinkResult<Connection> {
            self.attempt_times.lock().unwrap().push(Instant::now());
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TermlinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )))
            } else {
                let (near, far) = tokio::io::duplex(64);
                // Keep the far end alive so the reader task does not see EOF
                // before the test finishes with the connection.
                tokio::spawn(async move {
                    let _hold = far;
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                });
                Ok(Connection::from_stream(near))
            }
        }
    }

    fn target() -> Target {
        Target::Tcp {
            host: "example.invalid".to_string(),
            port: 4000,
        }
    }

    fn test_logger(dir: &tempfile::TempDir) -> SessionLogger {
        let mut config = SessionConfig::new(target());
        config.log_file = Some(dir.path().join("session.log"));
        SessionLogger::open(&config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_before_success() {
        let transport = FlakyTransport::new(3);
        let times = Arc::clone(&transport.attempt_times);
        let connector =
            Connector::with_transport(target(), RetryPolicy::default(), Box::new(transport));

        let dir = tempfile::tempdir().unwrap();
        let mut logger = test_logger(&dir);
        let conn = connector.connect(&mut logger).await.unwrap();
        conn.close().await;

        let times = times.lock().unwrap();
        assert_eq!(times.len(), 4);
        // Delays of 1s, 2s, 4s between the four attempts.
        assert_eq!(times[1] - times[0], Duration::from_secs(1));
        assert_eq!(times[2] - times[1], Duration::from_secs(2));
        assert_eq!(times[3] - times[2], Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_has_no_retry_overhead() {
        let transport = FlakyTransport::new(0);
        let connector =
            Connector::with_transport(target(), RetryPolicy::default(), Box::new(transport));

        let dir = tempfile::tempdir().unwrap();
        let mut logger = test_logger(&dir);
        let started = Instant::now();
        let conn = connector.connect(&mut logger).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
        conn.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_reports_connect_timeout() {
        let budget = Duration::from_secs(5);
        let policy = RetryPolicy {
            max_total_wait: Some(budget),
            ..RetryPolicy::default()
        };
        let transport = FlakyTransport::new(u32::MAX);
        let connector = Connector::with_transport(target(), policy.clone(), Box::new(transport));

        let dir = tempfile::tempdir().unwrap();
        let mut logger = test_logger(&dir);
        let started = Instant::now();
        let Err(err) = connector.connect(&mut logger).await else {
            panic!("expected the connect attempt to time out");
        };
        let total = started.elapsed();

        match err {
            TermlinkError::ConnectTimeout { elapsed, .. } => {
                assert!(elapsed >= budget);
                // Overshoot is bounded by one extra attempt's delay.
                assert!(total < budget + policy.max_delay);
            }
            other => panic!("expected ConnectTimeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_progress_is_logged_once_per_attempt() {
        let transport = FlakyTransport::new(2);
        let connector =
            Connector::with_transport(target(), RetryPolicy::default(), Box::new(transport));

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("session.log");
        let mut config = SessionConfig::new(target());
        config.log_file = Some(log_path.clone());
        let mut logger = SessionLogger::open(&config).unwrap();

        let conn = connector.connect(&mut logger).await.unwrap();
        conn.close().await;
        logger.close();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let info_lines: Vec<&str> = contents.lines().filter(|l| l.contains(" INFO ")).collect();
        // Two failures plus one success record.
        assert_eq!(info_lines.len(), 3);
        assert!(info_lines[0].contains("attempt 1"));
        assert!(info_lines[1].contains("attempt 2"));
        assert!(info_lines[2].contains("connected"));
    }
}
