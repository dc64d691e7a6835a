//! Console I/O for trap routines and the memory-mapped keyboard.
//!
//! The CPU never touches stdin or stdout directly. Everything goes through
//! the [`Console`] trait, so a run can be driven by a real terminal
//! ([`crate::terminal::TerminalConsole`]) or by an in-memory buffer.

use std::collections::VecDeque;
use std::io;

/// Character device seen by the running program.
pub trait Console {
    /// Is a key waiting? May block for a bounded time, never indefinitely.
    fn key_available(&mut self) -> io::Result<bool>;

    /// Read the next key without echoing it. Blocks until one arrives.
    fn read_key(&mut self) -> io::Result<u16>;

    /// Write one byte of output.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Write a string of output.
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        for byte in s.bytes() {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()>;

    /// Has the user asked to stop? Must not block. Called by the run loop
    /// between instructions, so a program that never reads the keyboard can
    /// still be cancelled.
    fn poll_cancel(&mut self) -> io::Result<bool> {
        Ok(false)
    }
}

/// A console backed by an input queue and an output buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    input: VecDeque<u16>,
    output: Vec<u8>,
    flushes: usize,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console whose keyboard will produce the bytes of `input`.
    pub fn with_input(input: &str) -> Self {
        let mut console = Self::new();
        console.push_input(input);
        console
    }

    /// Queue more keystrokes.
    pub fn push_input(&mut self, input: &str) {
        self.input.extend(input.bytes().map(u16::from));
    }

    /// Bytes written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Number of keystrokes not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Number of times the program flushed output.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Console for BufferConsole {
    fn key_available(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn read_key(&mut self) -> io::Result<u16> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "keyboard input exhausted"))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
