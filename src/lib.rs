//! Termlink Library
//!
//! Interactive terminal client for serial devices and TCP peers, with
//! connection retry, line editing with persistent history, paced output and
//! per-session transcripts.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::connector::Connector;
pub use crate::core::editor::{EditorAction, LineEditor};
pub use crate::core::history::HistoryStore;
pub use crate::core::logger::{Direction, SessionLogger};
pub use crate::core::session::{SessionEngine, SessionPhase};
pub use crate::domain::config::{RetryPolicy, SessionConfig, Target};
pub use crate::domain::error::{TermlinkError, TermlinkResult};
pub use crate::infrastructure::transport::{Connection, Transport};
