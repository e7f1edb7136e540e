use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

pub const PROMPT: &str = "> ";

/// Snapshot of the in-progress input line, taken from the editor for each
/// redraw.
#[derive(Debug, Clone, Copy)]
pub struct PromptState<'a> {
    pub buffer: &'a str,
    /// Cursor offset in characters from the start of the buffer.
    pub cursor: usize,
}

/// Sole writer to the terminal surface.
///
/// Inbound bytes are assembled into complete lines; each finished line is
/// printed above the prompt with a dimmed wall-clock timestamp, the prompt
/// hidden first and redrawn after, so asynchronous output never corrupts the
/// half-typed command. Remote escape sequences pass through untouched; the
/// screen gets the dressed bytes, the transcript gets the raw ones.
pub struct Renderer<W: Write> {
    out: W,
    /// Inbound bytes still waiting for their line terminator.
    pending: Vec<u8>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            pending: Vec::new(),
        }
    }

    /// Buffer an inbound chunk, printing any lines it completed.
    pub fn show_inbound(&mut self, chunk: &[u8], prompt: PromptState<'_>) -> io::Result<()> {
        self.pending.extend_from_slice(chunk);
        if !self.pending.contains(&b'\n') {
            return Ok(());
        }
        self.hide_prompt()?;
        while let Some(line) = self.take_line() {
            self.print_remote_line(&line)?;
        }
        self.draw_prompt(prompt)
    }

    /// Redraw the prompt and input line in place.
    pub fn draw_prompt(&mut self, prompt: PromptState<'_>) -> io::Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(PROMPT),
            Print(prompt.buffer),
            MoveToColumn(
                u16::try_from(PROMPT.chars().count() + prompt.cursor).unwrap_or(u16::MAX)
            ),
        )?;
        self.out.flush()
    }

    /// Print an operator-facing notice (connection progress, disconnects)
    /// above the prompt.
    pub fn notice(&mut self, message: &str, prompt: PromptState<'_>) -> io::Result<()> {
        self.hide_prompt()?;
        queue!(
            self.out,
            SetAttribute(Attribute::Dim),
            Print("*** "),
            Print(message),
            SetAttribute(Attribute::Reset),
            Print("\r\n"),
        )?;
        self.draw_prompt(prompt)
    }

    /// Move a just-submitted line into the scrollback, leaving a fresh
    /// prompt below it.
    pub fn echo_submitted(&mut self, line: &str) -> io::Result<()> {
        self.hide_prompt()?;
        queue!(self.out, Print(PROMPT), Print(line), Print("\r\n"))?;
        self.draw_prompt(PromptState {
            buffer: "",
            cursor: 0,
        })
    }

    /// Clear the whole screen, keeping the input line.
    pub fn clear_screen(&mut self, prompt: PromptState<'_>) -> io::Result<()> {
        queue!(
            self.out,
            Clear(ClearType::All),
            crossterm::cursor::MoveTo(0, 0)
        )?;
        self.draw_prompt(prompt)
    }

    /// Final cleanup: print any held partial line and leave the cursor on a
    /// fresh row so the shell prompt lands cleanly.
    pub fn teardown(&mut self) -> io::Result<()> {
        self.hide_prompt()?;
        if !self.pending.is_empty() {
            let partial = std::mem::take(&mut self.pending);
            self.print_remote_line(&partial)?;
        }
        self.out.flush()
    }

    fn hide_prompt(&mut self) -> io::Result<()> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))
    }

    fn print_remote_line(&mut self, line: &[u8]) -> io::Result<()> {
        // One trailing carriage return is part of the terminator, not data.
        let line = match line.last() {
            Some(b'\r') => &line[..line.len() - 1],
            _ => line,
        };
        queue!(
            self.out,
            SetAttribute(Attribute::Dim),
            Print(chrono::Local::now().format("%H:%M:%S%.3f ")),
            SetAttribute(Attribute::Reset),
        )?;
        self.out.write_all(line)?;
        queue!(self.out, Print("\r\n"))?;
        Ok(())
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(render: impl FnOnce(&mut Renderer<&mut Vec<u8>>)) -> String {
        let mut out = Vec::new();
        let mut renderer = Renderer::new(&mut out);
        render(&mut renderer);
        String::from_utf8_lossy(&out).into_owned()
    }

    const EMPTY: PromptState<'_> = PromptState {
        buffer: "",
        cursor: 0,
    };

    #[test]
    fn test_complete_line_is_shown_with_prompt_redrawn() {
        let screen = rendered(|r| {
            r.show_inbound(
                b"OK\r\n",
                PromptState {
                    buffer: "sta",
                    cursor: 3,
                },
            )
            .unwrap();
        });
        assert!(screen.contains("OK"));
        // Terminator's carriage return is not part of the displayed line.
        assert!(!screen.contains("OK\r\r"));
        // Prompt and the half-typed input survive the interleaved output.
        assert!(screen.contains("> sta"));
        let ok_at = screen.find("OK").unwrap();
        let prompt_at = screen.find("> sta").unwrap();
        assert!(ok_at < prompt_at);
    }

    #[test]
    fn test_partial_line_is_held_back() {
        let screen = rendered(|r| {
            r.show_inbound(b"no newline yet", EMPTY).unwrap();
        });
        assert!(!screen.contains("no newline yet"));
    }

    #[test]
    fn test_split_chunks_reassemble_into_one_line() {
        let screen = rendered(|r| {
            r.show_inbound(b"hel", EMPTY).unwrap();
            r.show_inbound(b"lo\n", EMPTY).unwrap();
        });
        assert!(screen.contains("hello"));
    }

    #[test]
    fn test_remote_escapes_pass_through() {
        let screen = rendered(|r| {
            r.show_inbound(b"\x1b[31mred\x1b[0m\n", EMPTY).unwrap();
        });
        assert!(screen.contains("\x1b[31mred\x1b[0m"));
    }

    #[test]
    fn test_teardown_flushes_partial_line() {
        let screen = rendered(|r| {
            r.show_inbound(b"tail without newline", EMPTY).unwrap();
            r.teardown().unwrap();
        });
        assert!(screen.contains("tail without newline"));
    }

    #[test]
    fn test_notice_keeps_prompt() {
        let screen = rendered(|r| {
            r.notice(
                "reconnecting",
                PromptState {
                    buffer: "cmd",
                    cursor: 3,
                },
            )
            .unwrap();
        });
        assert!(screen.contains("*** reconnecting"));
        assert!(screen.contains("> cmd"));
    }
}
