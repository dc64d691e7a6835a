//! Terminal console backed by crossterm.
//!
//! Raw mode delivers single keystrokes to the running program without line
//! buffering or echo. In raw mode Ctrl-C is just another key, not SIGINT, so
//! this console turns it into a cancellation request, both when a key is read
//! and when the run loop polls between instructions.

use crate::console::Console;
use crate::cpu::CancelToken;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};
use tracing::warn;

/// Holds the terminal in raw mode until dropped.
#[derive(Debug)]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            warn!(%err, "failed to restore terminal mode");
        }
    }
}

/// What a key press means to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyInput {
    Char(u16),
    Cancel,
}

fn translate(key: KeyEvent) -> Option<KeyInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(KeyInput::Cancel),
        KeyCode::Char(c) if ctrl && c.is_ascii_alphabetic() => {
            Some(KeyInput::Char(c.to_ascii_lowercase() as u16 & 0x1F))
        }
        KeyCode::Char(c) if c.is_ascii() => Some(KeyInput::Char(c as u16)),
        KeyCode::Enter => Some(KeyInput::Char(0x0A)),
        KeyCode::Backspace => Some(KeyInput::Char(0x08)),
        KeyCode::Tab => Some(KeyInput::Char(0x09)),
        KeyCode::Esc => Some(KeyInput::Char(0x1B)),
        _ => None,
    }
}

/// Console reading keys from the terminal and writing to stdout.
pub struct TerminalConsole {
    poll_timeout: Duration,
    cancel: CancelToken,
    pending: VecDeque<u16>,
    raw: bool,
    out: Stdout,
}

impl TerminalConsole {
    /// `poll_timeout` bounds how long a KBSR read waits for a key. `raw`
    /// says whether the terminal is in raw mode, in which case `\n` is
    /// written as `\r\n`.
    pub fn new(poll_timeout: Duration, cancel: CancelToken, raw: bool) -> Self {
        Self {
            poll_timeout,
            cancel,
            pending: VecDeque::new(),
            raw,
            out: io::stdout(),
        }
    }

    /// Read one terminal event. `Ok(None)` for events the machine ignores.
    fn next_key(&mut self) -> io::Result<Option<u16>> {
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        match translate(key) {
            Some(KeyInput::Char(code)) => Ok(Some(code)),
            Some(KeyInput::Cancel) => {
                self.cancel.cancel();
                Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted by Ctrl-C"))
            }
            None => Ok(None),
        }
    }
}

impl Console for TerminalConsole {
    fn key_available(&mut self) -> io::Result<bool> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                return Ok(false);
            }
            if let Some(code) = self.next_key()? {
                self.pending.push_back(code);
                return Ok(true);
            }
            if remaining.is_zero() {
                return Ok(false);
            }
        }
    }

    fn read_key(&mut self) -> io::Result<u16> {
        if let Some(code) = self.pending.pop_front() {
            return Ok(code);
        }
        loop {
            if let Some(code) = self.next_key()? {
                return Ok(code);
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        if self.raw && byte == b'\n' {
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[byte])
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Drain already-queued terminal events without waiting. Ordinary keys
    /// are kept for later KBSR or GETC reads.
    fn poll_cancel(&mut self) -> io::Result<bool> {
        if self.cancel.is_cancelled() {
            return Ok(true);
        }
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            match translate(key) {
                Some(KeyInput::Char(code)) => self.pending.push_back(code),
                Some(KeyInput::Cancel) => {
                    self.cancel.cancel();
                    return Ok(true);
                }
                None => {}
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_translate_printable() {
        assert_eq!(
            translate(press(KeyCode::Char('w'), KeyModifiers::NONE)),
            Some(KeyInput::Char(0x77))
        );
        assert_eq!(
            translate(press(KeyCode::Char('W'), KeyModifiers::SHIFT)),
            Some(KeyInput::Char(0x57))
        );
    }

    #[test]
    fn test_translate_control_keys() {
        assert_eq!(translate(press(KeyCode::Enter, KeyModifiers::NONE)), Some(KeyInput::Char(0x0A)));
        assert_eq!(translate(press(KeyCode::Backspace, KeyModifiers::NONE)), Some(KeyInput::Char(0x08)));
        assert_eq!(translate(press(KeyCode::Esc, KeyModifiers::NONE)), Some(KeyInput::Char(0x1B)));
        assert_eq!(
            translate(press(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(KeyInput::Char(0x04))
        );
    }

    #[test]
    fn test_translate_ctrl_c_cancels() {
        assert_eq!(
            translate(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyInput::Cancel)
        );
    }

    #[test]
    fn test_translate_ignores_other_keys() {
        assert_eq!(translate(press(KeyCode::F(1), KeyModifiers::NONE)), None);
        assert_eq!(translate(press(KeyCode::Char('é'), KeyModifiers::NONE)), None);
    }
}
