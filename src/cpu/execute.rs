//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::console::Console;
use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction, JsrTarget, Opcode, Operand};
use crate::cpu::registers::Reg;
use crate::image::Image;
use serde::{Serialize, Deserialize};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// Instructions executed between checks of [`Console::poll_cancel`].
pub const CANCEL_POLL_INTERVAL: u64 = 1024;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed TRAP HALT).
    Halted,
    /// CPU hit a fatal fault.
    Error,
}

/// Shared flag asking a run to stop between instructions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Register file and run state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub registers: Registers,
    pub state: CpuState,
    pub cycles: u64,
}

/// The LC-3 CPU.
#[derive(Clone)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
}

impl Cpu {
    /// Create a new CPU with zeroed memory and PC at 0x3000.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
        }
    }

    /// Copy an image into memory at its origin. Later loads overlay earlier
    /// ones. Returns the number of words placed.
    pub fn load_image(&mut self, image: &Image) -> usize {
        let written = self.mem.load(image.origin, &image.words);
        if written < image.words.len() {
            warn!(
                origin = image.origin,
                dropped = image.words.len() - written,
                "image runs past the end of memory, truncated"
            );
        }
        debug!(origin = image.origin, words = written, "image loaded");
        written
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error.
    pub fn step(&mut self, console: &mut dyn Console) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.regs.pc;
        match self.fetch_execute(console) {
            Ok(instr) => {
                self.cycles += 1;
                Ok(instr)
            }
            Err(err) => {
                if err.is_fatal() {
                    error!(pc, %err, "CPU fault");
                    self.state = CpuState::Error;
                }
                Err(err)
            }
        }
    }

    fn fetch_execute(&mut self, console: &mut dyn Console) -> Result<Instruction, CpuError> {
        // Fetch
        let pc = self.regs.pc;
        let raw = self.mem.read(pc, console)?;

        // PC moves before execution; every PC-relative address uses the new value
        self.regs.advance_pc();

        // Decode
        let instr = decode::decode(raw);
        trace!(pc = format_args!("{pc:#06x}"), word = format_args!("{raw:#06x}"), ?instr);

        // Execute
        self.execute(instr, pc, console)?;

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, console: &mut dyn Console) -> Result<u64, CpuError> {
        self.run_loop(console, None, None)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, console: &mut dyn Console, max_cycles: u64) -> Result<u64, CpuError> {
        self.run_loop(console, Some(max_cycles), None)
    }

    /// Run until halt, error, or until `cancel` is set. The token is checked
    /// before every instruction; the console is asked for a pending Ctrl-C
    /// every [`CANCEL_POLL_INTERVAL`] instructions.
    pub fn run_until_cancelled(
        &mut self,
        console: &mut dyn Console,
        cancel: &CancelToken,
        max_cycles: Option<u64>,
    ) -> Result<u64, CpuError> {
        self.run_loop(console, max_cycles, Some(cancel))
    }

    fn run_loop(
        &mut self,
        console: &mut dyn Console,
        max_cycles: Option<u64>,
        cancel: Option<&CancelToken>,
    ) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = max_cycles.map(|n| self.cycles.saturating_add(n));

        while self.state == CpuState::Running {
            if limit.is_some_and(|limit| self.cycles >= limit) {
                break;
            }
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(CpuError::Interrupted);
            }
            let poll_due = (self.cycles - start_cycles) % CANCEL_POLL_INTERVAL == 0;
            if poll_due && console.poll_cancel()? {
                if let Some(cancel) = cancel {
                    cancel.cancel();
                }
                return Err(CpuError::Interrupted);
            }
            self.step(console)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction. `pc` is the address it was fetched
    /// from; `self.regs.pc` already points past it.
    fn execute(&mut self, instr: Instruction, pc: u16, console: &mut dyn Console) -> Result<(), CpuError> {
        match instr {
            // ==================== Operate ====================

            Instruction::Add { dr, sr1, operand } => {
                let value = self.regs.get(sr1).wrapping_add(self.operand(operand));
                self.regs.set_with_flags(dr, value);
            }

            Instruction::And { dr, sr1, operand } => {
                let value = self.regs.get(sr1) & self.operand(operand);
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Not { dr, sr } => {
                let value = !self.regs.get(sr);
                self.regs.set_with_flags(dr, value);
            }

            // ==================== Data Movement ====================

            Instruction::Ld { dr, offset } => {
                let addr = self.regs.pc_relative(offset);
                let value = self.mem.read(addr, console)?;
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Ldi { dr, offset } => {
                let pointer = self.regs.pc_relative(offset);
                let addr = self.mem.read(pointer, console)?;
                let value = self.mem.read(addr, console)?;
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Ldr { dr, base, offset } => {
                let addr = self.regs.get(base).wrapping_add(offset);
                let value = self.mem.read(addr, console)?;
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Lea { dr, offset } => {
                let addr = self.regs.pc_relative(offset);
                self.regs.set_with_flags(dr, addr);
            }

            Instruction::St { sr, offset } => {
                let addr = self.regs.pc_relative(offset);
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Sti { sr, offset } => {
                let pointer = self.regs.pc_relative(offset);
                let addr = self.mem.read(pointer, console)?;
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Str { sr, base, offset } => {
                let addr = self.regs.get(base).wrapping_add(offset);
                self.mem.write(addr, self.regs.get(sr));
            }

            // ==================== Control ====================

            Instruction::Br { nzp, offset } => {
                if nzp & self.regs.cond.bits() != 0 {
                    self.regs.pc = self.regs.pc_relative(offset);
                }
            }

            Instruction::Jmp { base } => {
                self.regs.pc = self.regs.get(base);
            }

            Instruction::Jsr { target } => {
                // R7 is written first, so JSRR R7 lands on the next instruction
                self.regs.set(Reg::R7, self.regs.pc);
                self.regs.pc = match target {
                    JsrTarget::Offset(offset) => self.regs.pc_relative(offset),
                    JsrTarget::Reg(base) => self.regs.get(base),
                };
            }

            Instruction::Trap { vector } => {
                self.regs.set(Reg::R7, self.regs.pc);
                self.trap(vector, console)?;
            }

            Instruction::Reserved { opcode } => {
                return Err(CpuError::ReservedOpcode { opcode, pc });
            }
        }

        Ok(())
    }

    #[inline]
    fn operand(&self, operand: Operand) -> u16 {
        match operand {
            Operand::Reg(reg) => self.regs.get(reg),
            Operand::Imm(imm) => imm,
        }
    }

    /// Capture registers and run state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs.clone(),
            state: self.state,
            cycles: self.cycles,
        }
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("reserved opcode {opcode:?} at {pc:#06x}")]
    ReservedOpcode { opcode: Opcode, pc: u16 },

    #[error("console error: {0}")]
    Console(#[source] io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl CpuError {
    /// Faults that leave the CPU in [`CpuState::Error`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, CpuError::ReservedOpcode { .. } | CpuError::Console(_))
    }
}

impl From<io::Error> for CpuError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::Interrupted {
            CpuError::Interrupted
        } else {
            CpuError::Console(err)
        }
    }
}
