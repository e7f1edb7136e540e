use crate::domain::config::{log_dir, SessionConfig};
use crate::domain::error::{TermlinkError, TermlinkResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::warn;

/// Direction tag of a transcript record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    Info,
}

impl Direction {
    pub fn tag(self) -> &'static str {
        match self {
            Direction::Sent => "SENT",
            Direction::Received => "RECV",
            Direction::Info => "INFO",
        }
    }
}

/// Session transcript writer.
///
/// One file per session, appended record-per-line and flushed after every
/// record. Rendering escape sequences are stripped from payloads before they
/// are persisted; remaining control bytes are escaped so the line framing
/// survives arbitrary payloads. A write failure degrades the logger (warn
/// once, drop later records) unless strict mode was requested, in which case
/// it surfaces as a fatal error.
pub struct SessionLogger {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    strict: bool,
}

impl SessionLogger {
    /// Open the transcript for a session starting now.
    pub fn open(config: &SessionConfig) -> TermlinkResult<Self> {
        let path = match &config.log_file {
            Some(path) => path.clone(),
            None => {
                let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
                log_dir().join(format!("{}-{}.log", config.profile, stamp))
            }
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TermlinkError::Transcript(format!("{}: {}", parent.display(), e)))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TermlinkError::Transcript(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path,
            strict: config.strict_logging,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one record. Payload bytes are taken as they crossed the wire,
    /// before any rendering dressing.
    pub fn record(&mut self, direction: Direction, payload: &[u8]) -> TermlinkResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            // Already degraded; the session goes on without a transcript.
            return Ok(());
        };

        let stripped = strip_rendering(payload);
        let line = format!(
            "{} {} {}\n",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            direction.tag(),
            escape_payload(&stripped)
        );

        let result = writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            self.writer = None;
            if self.strict {
                return Err(TermlinkError::Transcript(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
            warn!(
                "transcript write to {} failed ({}); continuing without logging",
                self.path.display(),
                e
            );
        }
        Ok(())
    }

    /// Append an `Info` record from a message.
    pub fn info(&mut self, message: &str) -> TermlinkResult<()> {
        self.record(Direction::Info, message.as_bytes())
    }

    /// Flush and release the file handle. Also called from `Drop`, so every
    /// exit path ends with a flushed transcript.
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Remove interactive rendering sequences (CSI, OSC, and other ESC-prefixed
/// sequences) from a payload. The bytes the remote actually printed are kept.
pub fn strip_rendering(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != 0x1b {
            out.push(data[i]);
            i += 1;
            continue;
        }
        let Some(&kind) = data.get(i + 1) else {
            // Dangling ESC at the end of a chunk.
            break;
        };
        match kind {
            // CSI: ESC [ <parameter/intermediate bytes 0x20-0x3f> <final 0x40-0x7e>
            b'[' => {
                let mut j = i + 2;
                while j < data.len() && (0x20..=0x3f).contains(&data[j]) {
                    j += 1;
                }
                i = if j < data.len() { j + 1 } else { j };
            }
            // OSC: ESC ] ... terminated by BEL or ESC \
            b']' => {
                let mut j = i + 2;
                loop {
                    match data.get(j) {
                        None => break,
                        Some(0x07) => {
                            j += 1;
                            break;
                        }
                        Some(0x1b) if data.get(j + 1) == Some(&b'\\') => {
                            j += 2;
                            break;
                        }
                        Some(_) => j += 1,
                    }
                }
                i = j;
            }
            // Two-byte escape (RIS, keypad modes, charset selection, ...)
            _ => i += 2,
        }
    }
    out
}

/// Encode payload bytes for the line-per-record transcript format. Printable
/// ASCII passes through; everything else is backslash-escaped so a record
/// never spans lines and the original bytes stay recoverable.
pub fn escape_payload(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

/// Inverse of [`escape_payload`]. Unknown escapes decode to their literal
/// character so a hand-edited transcript still parses.
pub fn unescape_payload(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    let hex: String = [hi, lo].iter().collect();
                    if let Ok(b) = u8::from_str_radix(&hex, 16) {
                        out.push(b);
                    }
                }
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => {}
        }
    }
    out
}
