//! CPU emulation for the LC-3.
//!
//! This module implements the complete LC-3 architecture:
//! - 65536 sixteen-bit memory cells with a memory-mapped keyboard
//! - 8 general registers, a program counter and a condition register
//! - 16 opcodes (2 reserved) and 6 trap routines

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trap;

pub use memory::Memory;
pub use registers::{Registers, Reg, Flag};
pub use decode::{Instruction, Opcode, Operand, JsrTarget, sign_extend};
pub use execute::{Cpu, CpuError, CpuState, CancelToken, Snapshot};
pub use trap::TrapVector;
