//! Trap routines.
//!
//! TRAP's low byte selects one of six built-in I/O routines. They run
//! natively instead of as LC-3 code in a trap vector table.

use crate::console::Console;
use crate::cpu::execute::{Cpu, CpuError, CpuState};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::Reg;
use tracing::{info, warn};

const IN_PROMPT: &str = "Enter a character: ";

/// The built-in trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrapVector {
    /// Read a character, no echo
    Getc = 0x20,
    /// Write the character in R0
    Out = 0x21,
    /// Write the word string at R0
    Puts = 0x22,
    /// Prompt for and echo a character
    In = 0x23,
    /// Write the byte string at R0
    Putsp = 0x24,
    /// Stop the machine
    Halt = 0x25,
}

impl TrapVector {
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            0x20 => Some(TrapVector::Getc),
            0x21 => Some(TrapVector::Out),
            0x22 => Some(TrapVector::Puts),
            0x23 => Some(TrapVector::In),
            0x24 => Some(TrapVector::Putsp),
            0x25 => Some(TrapVector::Halt),
            _ => None,
        }
    }
}

impl Cpu {
    /// Run trap routine `vector`. R7 has already been saved.
    ///
    /// Vectors outside 0x20-0x25 do nothing.
    pub(crate) fn trap(&mut self, vector: u8, console: &mut dyn Console) -> Result<(), CpuError> {
        let Some(routine) = TrapVector::from_u8(vector) else {
            warn!(
                vector = format_args!("{vector:#04x}"),
                pc = self.regs.pc,
                "unknown trap vector ignored"
            );
            return Ok(());
        };

        match routine {
            TrapVector::Getc => {
                let key = console.read_key()?;
                self.regs.set_with_flags(Reg::R0, key);
            }

            TrapVector::Out => {
                console.write_byte(self.regs.get(Reg::R0) as u8)?;
                console.flush()?;
            }

            TrapVector::Puts => {
                for cell in self.string_at(self.regs.get(Reg::R0)) {
                    console.write_byte(cell as u8)?;
                }
                console.flush()?;
            }

            TrapVector::In => {
                console.write_str(IN_PROMPT)?;
                console.flush()?;
                let key = console.read_key()?;
                console.write_byte(key as u8)?;
                console.flush()?;
                self.regs.set_with_flags(Reg::R0, key);
            }

            TrapVector::Putsp => {
                for cell in self.string_at(self.regs.get(Reg::R0)) {
                    console.write_byte((cell & 0xFF) as u8)?;
                    let high = (cell >> 8) as u8;
                    if high != 0 {
                        console.write_byte(high)?;
                    }
                }
                console.flush()?;
            }

            TrapVector::Halt => {
                console.write_str("HALT\n")?;
                console.flush()?;
                info!(cycles = self.cycles + 1, "halted");
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }

    /// Cells from `start` up to, not including, the first zero cell.
    /// Wraps at 0xFFFF and gives up after one pass over memory.
    fn string_at(&self, start: u16) -> impl Iterator<Item = u16> + '_ {
        (0..MEMORY_SIZE)
            .map(move |i| self.mem.peek(start.wrapping_add(i as u16)))
            .take_while(|&cell| cell != 0)
    }
}
