use crate::core::connector::Connector;
use crate::core::editor::{EditorAction, LineEditor};
use crate::core::history::HistoryStore;
use crate::core::logger::{Direction, SessionLogger};
use crate::core::session::render::{PromptState, Renderer};
use crate::domain::{
    config::SessionConfig,
    error::{TermlinkError, TermlinkResult},
};
use crate::infrastructure::transport::{self, Connection};
use crossterm::event::Event;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::io::Write;
use tracing::{debug, info};

/// Bytes appended to a submitted line before it goes on the wire.
const LINE_ENDING: &[u8] = b"\r\n";

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Running,
    Reconnecting,
    Closing,
    Terminated,
}

enum LoopExit {
    Quit,
}

/// How a paced send ended: the full payload went out, or the user quit
/// partway through.
enum SendOutcome {
    Sent,
    Quit,
}

/// The session engine: owns the connection once the connector opens it and
/// runs the duplex loop, interleaving inbound rendering, line editing,
/// paced output and transcript writes. Single writer to the terminal and
/// single caller into the logger, so neither needs a lock.
pub struct SessionEngine<W: Write> {
    config: SessionConfig,
    connector: Connector,
    logger: SessionLogger,
    editor: LineEditor,
    renderer: Renderer<W>,
    phase: SessionPhase,
}

impl<W: Write> SessionEngine<W> {
    /// Wire up a session from its config: transcript, history, editor and
    /// connector, rendering to `out`.
    pub fn new(config: SessionConfig, out: W) -> TermlinkResult<Self> {
        let logger = SessionLogger::open(&config)?;
        let history = HistoryStore::load(&config.profile);
        let connector = Connector::new(config.target.clone(), config.retry.clone());
        Ok(Self::with_collaborators(
            config,
            connector,
            logger,
            LineEditor::new(history),
            out,
        ))
    }

    /// Assemble an engine from externally built collaborators. Tests use
    /// this with mock transports and in-memory sinks.
    pub fn with_collaborators(
        config: SessionConfig,
        connector: Connector,
        logger: SessionLogger,
        editor: LineEditor,
        out: W,
    ) -> Self {
        Self {
            config,
            connector,
            logger,
            editor,
            renderer: Renderer::new(out),
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn log_path(&self) -> &std::path::Path {
        self.logger.path()
    }

    /// Run the session to completion: connect (with retry), run the duplex
    /// loop, reconnect on connection loss when configured, and tear down on
    /// every exit path. `keys` is the keyboard event source; in production
    /// that is crossterm's `EventStream`.
    pub async fn run<K>(&mut self, keys: &mut K) -> TermlinkResult<()>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        loop {
            self.phase = SessionPhase::Connecting;
            let conn = match self.connector.connect(&mut self.logger).await {
                Ok(conn) => conn,
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            };

            self.phase = SessionPhase::Running;
            self.notice(&format!("connected to {}", self.connector.target()))?;

            let outcome = self.duplex_loop(conn, keys).await;
            match outcome {
                Ok(LoopExit::Quit) => {
                    info!("session ended by user");
                    self.logger.info("session closed by user")?;
                    self.finish();
                    return Ok(());
                }
                Err(e) if e.is_connection_loss() && self.config.reconnect => {
                    self.logger
                        .info(&format!("connection lost: {}; reconnecting", e))?;
                    self.notice(&format!("connection lost: {}; reconnecting...", e))?;
                    self.phase = SessionPhase::Reconnecting;
                }
                Err(e) => {
                    self.phase = SessionPhase::Closing;
                    self.logger.info(&format!("connection lost: {}", e))?;
                    self.finish();
                    return Err(e);
                }
            }
        }
    }

    /// One connection's worth of the duplex loop. The connection is closed
    /// before this returns, success or not.
    async fn duplex_loop<K>(
        &mut self,
        mut conn: Connection,
        keys: &mut K,
    ) -> TermlinkResult<LoopExit>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        let result = self.duplex_loop_inner(&mut conn, keys).await;
        conn.close().await;
        result
    }

    async fn duplex_loop_inner<K>(
        &mut self,
        conn: &mut Connection,
        keys: &mut K,
    ) -> TermlinkResult<LoopExit>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        loop {
            tokio::select! {
                chunk = conn.recv() => match chunk {
                    Some(Ok(data)) => self.handle_inbound(&data)?,
                    Some(Err(e)) => return Err(e),
                    None => return Err(TermlinkError::PeerClosed),
                },
                event = keys.next() => match event {
                    Some(Ok(Event::Key(key))) => {
                        match self.editor.feed(key) {
                            EditorAction::Pending => {
                                let prompt = PromptState {
                                    buffer: self.editor.buffer(),
                                    cursor: self.editor.cursor(),
                                };
                                self.renderer.draw_prompt(prompt)?;
                            }
                            EditorAction::ClearScreen => {
                                let prompt = PromptState {
                                    buffer: self.editor.buffer(),
                                    cursor: self.editor.cursor(),
                                };
                                self.renderer.clear_screen(prompt)?;
                            }
                            EditorAction::Quit => return Ok(LoopExit::Quit),
                            EditorAction::Line(line) => {
                                self.renderer.echo_submitted(&line)?;
                                // Lines submitted while a slow send is still
                                // pacing queue up behind it.
                                let mut pending = VecDeque::from([line]);
                                while let Some(line) = pending.pop_front() {
                                    // The transcript gets the line as typed,
                                    // before framing is added.
                                    self.logger.record(Direction::Sent, line.as_bytes())?;
                                    let outcome = self
                                        .send_paced(conn, keys, &mut pending, line.as_bytes())
                                        .await?;
                                    if let SendOutcome::Quit = outcome {
                                        return Ok(LoopExit::Quit);
                                    }
                                }
                            }
                        }
                    }
                    // Resize, focus and other terminal events need no action.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    // Keyboard source closed: end-of-input, clean quit.
                    None => return Ok(LoopExit::Quit),
                },
                _ = tokio::signal::ctrl_c() => return Ok(LoopExit::Quit),
            }
        }
    }

    fn handle_inbound(&mut self, data: &[u8]) -> TermlinkResult<()> {
        self.logger.record(Direction::Received, data)?;
        let prompt = PromptState {
            buffer: self.editor.buffer(),
            cursor: self.editor.cursor(),
        };
        self.renderer.show_inbound(data, prompt)?;
        Ok(())
    }

    /// Write a completed line to the connection, framed with the line
    /// ending. With a per-byte delay configured, bytes go out one at a time
    /// and both inbound chunks and keystrokes are still serviced between
    /// them, so a slow multi-second send never freezes the display and a
    /// quit takes effect before the line finishes.
    async fn send_paced<K>(
        &mut self,
        conn: &mut Connection,
        keys: &mut K,
        pending: &mut VecDeque<String>,
        line: &[u8],
    ) -> TermlinkResult<SendOutcome>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        let mut payload = Vec::with_capacity(line.len() + LINE_ENDING.len());
        payload.extend_from_slice(line);
        payload.extend_from_slice(LINE_ENDING);

        let delay = self.config.per_byte_delay;
        if delay.is_zero() {
            if let Err(e) = conn.write_all(&payload).await {
                self.logger
                    .info(&format!("send of {} bytes failed: {}", payload.len(), e))?;
                return Err(e);
            }
            return Ok(SendOutcome::Sent);
        }

        debug!("pacing {} bytes at {:?} per byte", payload.len(), delay);
        for i in 0..payload.len() {
            if i > 0 {
                match self
                    .pace_gap(conn, keys, pending, delay, i, payload.len())
                    .await?
                {
                    SendOutcome::Sent => {}
                    SendOutcome::Quit => return Ok(SendOutcome::Quit),
                }
            }
            let (_, writer) = conn.split_mut();
            if let Err(e) = transport::write_bytes(writer, &payload[i..=i]).await {
                self.log_truncation(i, payload.len(), &e)?;
                return Err(e);
            }
        }
        Ok(SendOutcome::Sent)
    }

    /// Sleep one inter-byte gap while keeping the inbound direction and the
    /// keyboard live. A quit during the gap abandons the rest of the line,
    /// leaving a transcript record of the truncation point.
    async fn pace_gap<K>(
        &mut self,
        conn: &mut Connection,
        keys: &mut K,
        pending: &mut VecDeque<String>,
        delay: std::time::Duration,
        sent: usize,
        total: usize,
    ) -> TermlinkResult<SendOutcome>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        let wait = tokio::time::sleep(delay);
        tokio::pin!(wait);
        loop {
            let (incoming, _) = conn.split_mut();
            tokio::select! {
                _ = &mut wait => return Ok(SendOutcome::Sent),
                chunk = incoming.recv() => match chunk {
                    Some(Ok(data)) => self.handle_inbound(&data)?,
                    Some(Err(e)) => {
                        self.log_truncation(sent, total, &e)?;
                        return Err(e);
                    }
                    None => {
                        let e = TermlinkError::PeerClosed;
                        self.log_truncation(sent, total, &e)?;
                        return Err(e);
                    }
                },
                event = keys.next() => match event {
                    Some(Ok(Event::Key(key))) => match self.editor.feed(key) {
                        EditorAction::Quit => {
                            self.log_truncation(sent, total, "quit")?;
                            return Ok(SendOutcome::Quit);
                        }
                        EditorAction::Line(line) => {
                            // Submitted mid-send: echo now, transmit once
                            // the current line finishes.
                            self.renderer.echo_submitted(&line)?;
                            pending.push_back(line);
                        }
                        EditorAction::Pending => {
                            let prompt = PromptState {
                                buffer: self.editor.buffer(),
                                cursor: self.editor.cursor(),
                            };
                            self.renderer.draw_prompt(prompt)?;
                        }
                        EditorAction::ClearScreen => {
                            let prompt = PromptState {
                                buffer: self.editor.buffer(),
                                cursor: self.editor.cursor(),
                            };
                            self.renderer.clear_screen(prompt)?;
                        }
                    },
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let e = TermlinkError::from(e);
                        self.log_truncation(sent, total, &e)?;
                        return Err(e);
                    }
                    None => {
                        self.log_truncation(sent, total, "end of input")?;
                        return Ok(SendOutcome::Quit);
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    self.log_truncation(sent, total, "interrupt")?;
                    return Ok(SendOutcome::Quit);
                }
            }
        }
    }

    fn log_truncation(
        &mut self,
        sent: usize,
        total: usize,
        cause: impl std::fmt::Display,
    ) -> TermlinkResult<()> {
        self.logger.info(&format!(
            "send aborted after {} of {} bytes: {}",
            sent, total, cause
        ))
    }

    fn notice(&mut self, message: &str) -> TermlinkResult<()> {
        let prompt = PromptState {
            buffer: self.editor.buffer(),
            cursor: self.editor.cursor(),
        };
        self.renderer.notice(message, prompt)?;
        Ok(())
    }

    /// Common teardown for every exit path: flush the screen, flush and
    /// close the transcript, mark the session terminated.
    fn finish(&mut self) {
        let _ = self.renderer.teardown();
        self.logger.close();
        self.phase = SessionPhase::Terminated;
    }
}
