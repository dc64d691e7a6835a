//! LC-3 CPU registers.
//!
//! The LC-3 has 10 registers:
//! - R0-R7: general purpose, R7 doubles as the return-address register
//! - PC: program counter
//! - COND: condition register holding exactly one of N, Z, P

use serde::{Serialize, Deserialize};

/// Address the program counter starts at after loading.
pub const PC_START: u16 = 0x3000;

/// A general-purpose register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Reg {
    /// All registers in index order.
    pub const ALL: [Reg; 8] = [
        Reg::R0, Reg::R1, Reg::R2, Reg::R3,
        Reg::R4, Reg::R5, Reg::R6, Reg::R7,
    ];

    /// Select a register from the low 3 bits of `bits`.
    #[inline]
    pub fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0x7) as usize]
    }

    /// Register number (0-7).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Condition flag. Values match the N/Z/P bit positions used by BR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Flag {
    /// P: last result was positive
    Pos = 1 << 0,
    /// Z: last result was zero
    Zro = 1 << 1,
    /// N: last result was negative
    Neg = 1 << 2,
}

impl Flag {
    /// Classify a value as a 16-bit two's-complement integer.
    pub fn of(value: u16) -> Self {
        if value == 0 {
            Flag::Zro
        } else if value >> 15 == 1 {
            Flag::Neg
        } else {
            Flag::Pos
        }
    }

    /// The flag as its N/Z/P bit.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }
}

/// The LC-3 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub r: [u16; 8],

    /// Program counter, always the address of the next instruction to fetch
    pub pc: u16,

    /// Condition register
    pub cond: Flag,
}

impl Registers {
    /// Create a register file at power-on: general registers zeroed,
    /// PC at [`PC_START`], COND = Z.
    pub fn new() -> Self {
        Self {
            r: [0; 8],
            pc: PC_START,
            cond: Flag::Zro,
        }
    }

    #[inline]
    pub fn get(&self, reg: Reg) -> u16 {
        self.r[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Reg, value: u16) {
        self.r[reg.index()] = value;
    }

    /// Set COND from the current value of `reg`.
    pub fn update_flags(&mut self, reg: Reg) {
        self.cond = Flag::of(self.get(reg));
    }

    /// Write `value` into `reg` and update COND from it.
    pub fn set_with_flags(&mut self, reg: Reg, value: u16) {
        self.set(reg, value);
        self.update_flags(reg);
    }

    /// Return the current PC and advance it by one, wrapping.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// PC plus a sign-extended offset, wrapping.
    #[inline]
    pub fn pc_relative(&self, offset: u16) -> u16 {
        self.pc.wrapping_add(offset)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();
        assert_eq!(regs.pc, 0x3000);
        assert_eq!(regs.cond, Flag::Zro);
        assert!(regs.r.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_update_flags() {
        let mut regs = Registers::new();

        regs.set_with_flags(Reg::R1, 1);
        assert_eq!(regs.cond, Flag::Pos);

        regs.set_with_flags(Reg::R1, 0x8000);
        assert_eq!(regs.cond, Flag::Neg);

        regs.set_with_flags(Reg::R1, 0);
        assert_eq!(regs.cond, Flag::Zro);

        regs.set_with_flags(Reg::R2, 0x7FFF);
        assert_eq!(regs.cond, Flag::Pos);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0xFFFF;

        let old = regs.advance_pc();
        assert_eq!(old, 0xFFFF);
        assert_eq!(regs.pc, 0x0000);
    }

    #[test]
    fn test_reg_from_bits_masks() {
        assert_eq!(Reg::from_bits(0b101), Reg::R5);
        assert_eq!(Reg::from_bits(0b1111), Reg::R7);
    }

    proptest! {
        #[test]
        fn flags_classify_every_value(v in any::<u16>()) {
            let mut regs = Registers::new();
            regs.set_with_flags(Reg::R3, v);

            let bits = regs.cond.bits();
            prop_assert_eq!(bits.count_ones(), 1);
            prop_assert_eq!(regs.cond == Flag::Zro, v == 0);
            prop_assert_eq!(regs.cond == Flag::Neg, v & 0x8000 != 0);
            prop_assert_eq!(regs.cond == Flag::Pos, v != 0 && v & 0x8000 == 0);
        }
    }
}
