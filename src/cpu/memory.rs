//! LC-3 memory subsystem.
//!
//! A flat 16-bit address space of 65536 words. Two addresses are wired to
//! the keyboard instead of plain storage.

use crate::console::Console;
use std::io;

/// The number of memory cells in the LC-3.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register. Bit 15 is set when a key is ready.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register. The low byte holds the pending character.
pub const KBDR: u16 = 0xFE02;

/// LC-3 memory: 65536 sixteen-bit cells.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Box<[u16]>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Read a cell as the running program sees it.
    ///
    /// Reading [`KBSR`] polls the console first. If a key is ready its code
    /// lands in [`KBDR`] and KBSR gets bit 15; otherwise KBSR is cleared.
    /// Both writes happen before the value is returned.
    pub fn read(&mut self, addr: u16, console: &mut dyn Console) -> io::Result<u16> {
        if addr == KBSR {
            if console.key_available()? {
                self.cells[KBSR as usize] = 1 << 15;
                self.cells[KBDR as usize] = console.read_key()?;
            } else {
                self.cells[KBSR as usize] = 0;
            }
        }
        Ok(self.cells[addr as usize])
    }

    /// Read a cell without any device side effect.
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Copy `words` into memory starting at `origin`.
    ///
    /// Words that would land past 0xFFFF are dropped. Returns the number of
    /// words written.
    pub fn load(&mut self, origin: u16, words: &[u16]) -> usize {
        let start = origin as usize;
        let count = words.len().min(MEMORY_SIZE - start);
        self.cells[start..start + count].copy_from_slice(&words[..count]);
        count
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        let mut console = BufferConsole::new();

        mem.write(0x3010, 42);
        assert_eq!(mem.read(0x3010, &mut console).unwrap(), 42);
        assert_eq!(mem.peek(0xFFFF), 0);
    }

    #[test]
    fn test_kbsr_with_pending_key() {
        let mut mem = Memory::new();
        let mut console = BufferConsole::with_input("x");

        let status = mem.read(KBSR, &mut console).unwrap();

        assert_eq!(status, 0x8000);
        assert_eq!(mem.peek(KBDR), u16::from(b'x'));
        assert_eq!(console.pending_input(), 0);
    }

    #[test]
    fn test_kbsr_without_key_clears_status() {
        let mut mem = Memory::new();
        let mut console = BufferConsole::new();
        mem.write(KBSR, 0x8000);
        mem.write(KBDR, 0x0041);

        assert_eq!(mem.read(KBSR, &mut console).unwrap(), 0);
        // Stale data stays in KBDR.
        assert_eq!(mem.peek(KBDR), 0x0041);
    }

    #[test]
    fn test_kbdr_read_has_no_side_effect() {
        let mut mem = Memory::new();
        let mut console = BufferConsole::with_input("q");

        assert_eq!(mem.read(KBDR, &mut console).unwrap(), 0);
        assert_eq!(console.pending_input(), 1);
    }

    #[test]
    fn test_write_to_kbsr_is_plain_store() {
        let mut mem = Memory::new();
        mem.write(KBSR, 0x1234);
        assert_eq!(mem.peek(KBSR), 0x1234);
    }

    #[test]
    fn test_load_truncates_at_end_of_memory() {
        let mut mem = Memory::new();

        let written = mem.load(0xFFFE, &[1, 2, 3, 4]);

        assert_eq!(written, 2);
        assert_eq!(mem.peek(0xFFFE), 1);
        assert_eq!(mem.peek(0xFFFF), 2);
        assert_eq!(mem.peek(0x0000), 0);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load(0x3000, &[0x1261, 0xF025]);

        assert_eq!(mem.peek(0x3000), 0x1261);
        assert_eq!(mem.peek(0x3001), 0xF025);
        assert_eq!(mem.peek(0x3002), 0);
    }
}
