//! # LC-3 Virtual Machine
//!
//! An interpreter for the LC-3, the 16-bit load/store architecture used to
//! teach computer organization. The machine has 65536 words of memory, eight
//! general registers, a program counter and a condition register, and talks
//! to the outside world through six trap routines and a memory-mapped
//! keyboard.

pub mod cpu;
pub mod console;
pub mod image;

#[cfg(feature = "term")]
pub mod terminal;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, CancelToken, Memory, Registers, Instruction, Snapshot};
pub use console::{Console, BufferConsole};
pub use image::{Image, ImageError, load_image, save_image};

#[cfg(feature = "term")]
pub use terminal::{TerminalConsole, RawModeGuard};
