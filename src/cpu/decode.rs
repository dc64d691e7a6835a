//! Instruction decoder for the LC-3.
//!
//! Every instruction is one 16-bit word. The top 4 bits select the opcode;
//! the remaining 12 bits are register selectors, flags and immediate or
//! PC-relative offset fields whose layout depends on the opcode.

use crate::cpu::registers::Reg;

/// Widen a `bit_count`-bit two's-complement field to 16 bits.
///
/// Bits above `bit_count` in `x` are ignored.
pub fn sign_extend(x: u16, bit_count: u32) -> u16 {
    debug_assert!((1..=16).contains(&bit_count));
    let high = u16::MAX.checked_shl(bit_count).unwrap_or(0);
    let x = x & !high;
    if (x >> (bit_count - 1)) & 1 == 1 {
        x | high
    } else {
        x
    }
}

/// The 16 opcodes, numbered as they appear in bits 15-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Br = 0,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    /// Return from interrupt. Unused here.
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    /// Reserved.
    Res,
    Lea,
    Trap,
}

impl Opcode {
    const ALL: [Opcode; 16] = [
        Opcode::Br, Opcode::Add, Opcode::Ld, Opcode::St,
        Opcode::Jsr, Opcode::And, Opcode::Ldr, Opcode::Str,
        Opcode::Rti, Opcode::Not, Opcode::Ldi, Opcode::Sti,
        Opcode::Jmp, Opcode::Res, Opcode::Lea, Opcode::Trap,
    ];

    /// Opcode of an instruction word.
    #[inline]
    pub fn of(word: u16) -> Self {
        Self::ALL[(word >> 12) as usize]
    }
}

/// Second source operand of ADD and AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// SR2
    Reg(Reg),
    /// imm5, already sign-extended
    Imm(u16),
}

/// Where JSR transfers control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsrTarget {
    /// JSR: PC-relative, PCoffset11 already sign-extended
    Offset(u16),
    /// JSRR: base register
    Reg(Reg),
}

/// Decoded LC-3 instruction.
///
/// Offsets are stored sign-extended to 16 bits so the executor only does
/// wrapping adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // ==================== Operate ====================

    /// DR := SR1 + operand
    Add { dr: Reg, sr1: Reg, operand: Operand },

    /// DR := SR1 & operand
    And { dr: Reg, sr1: Reg, operand: Operand },

    /// DR := !SR
    Not { dr: Reg, sr: Reg },

    // ==================== Data Movement ====================

    /// DR := mem[PC + offset]
    Ld { dr: Reg, offset: u16 },

    /// DR := mem[mem[PC + offset]]
    Ldi { dr: Reg, offset: u16 },

    /// DR := mem[BaseR + offset]
    Ldr { dr: Reg, base: Reg, offset: u16 },

    /// DR := PC + offset
    Lea { dr: Reg, offset: u16 },

    /// mem[PC + offset] := SR
    St { sr: Reg, offset: u16 },

    /// mem[mem[PC + offset]] := SR
    Sti { sr: Reg, offset: u16 },

    /// mem[BaseR + offset] := SR
    Str { sr: Reg, base: Reg, offset: u16 },

    // ==================== Control ====================

    /// If any of the N/Z/P bits in `nzp` match COND: PC := PC + offset
    Br { nzp: u16, offset: u16 },

    /// PC := BaseR. `JMP R7` is RET.
    Jmp { base: Reg },

    /// R7 := PC, then jump to `target`
    Jsr { target: JsrTarget },

    /// R7 := PC, then run trap routine `vector`
    Trap { vector: u8 },

    /// RTI or the reserved opcode. Executing one is a fatal fault.
    Reserved { opcode: Opcode },
}

#[inline]
fn dr(word: u16) -> Reg {
    Reg::from_bits(word >> 9)
}

#[inline]
fn sr1(word: u16) -> Reg {
    Reg::from_bits(word >> 6)
}

#[inline]
fn offset9(word: u16) -> u16 {
    sign_extend(word & 0x1FF, 9)
}

#[inline]
fn offset6(word: u16) -> u16 {
    sign_extend(word & 0x3F, 6)
}

fn operand(word: u16) -> Operand {
    if (word >> 5) & 1 == 1 {
        Operand::Imm(sign_extend(word & 0x1F, 5))
    } else {
        Operand::Reg(Reg::from_bits(word))
    }
}

/// Decode a 16-bit instruction word.
///
/// Decoding is total: every word maps to some [`Instruction`], with the two
/// undefined opcodes decoding to [`Instruction::Reserved`].
pub fn decode(word: u16) -> Instruction {
    match Opcode::of(word) {
        Opcode::Add => Instruction::Add { dr: dr(word), sr1: sr1(word), operand: operand(word) },
        Opcode::And => Instruction::And { dr: dr(word), sr1: sr1(word), operand: operand(word) },
        Opcode::Not => Instruction::Not { dr: dr(word), sr: sr1(word) },
        Opcode::Ld => Instruction::Ld { dr: dr(word), offset: offset9(word) },
        Opcode::Ldi => Instruction::Ldi { dr: dr(word), offset: offset9(word) },
        Opcode::Ldr => Instruction::Ldr { dr: dr(word), base: sr1(word), offset: offset6(word) },
        Opcode::Lea => Instruction::Lea { dr: dr(word), offset: offset9(word) },
        Opcode::St => Instruction::St { sr: dr(word), offset: offset9(word) },
        Opcode::Sti => Instruction::Sti { sr: dr(word), offset: offset9(word) },
        Opcode::Str => Instruction::Str { sr: dr(word), base: sr1(word), offset: offset6(word) },
        Opcode::Br => Instruction::Br { nzp: (word >> 9) & 0x7, offset: offset9(word) },
        Opcode::Jmp => Instruction::Jmp { base: sr1(word) },
        Opcode::Jsr => {
            let target = if (word >> 11) & 1 == 1 {
                JsrTarget::Offset(sign_extend(word & 0x7FF, 11))
            } else {
                JsrTarget::Reg(sr1(word))
            };
            Instruction::Jsr { target }
        }
        Opcode::Trap => Instruction::Trap { vector: (word & 0xFF) as u8 },
        opcode @ (Opcode::Rti | Opcode::Res) => Instruction::Reserved { opcode },
    }
}

/// Encode an instruction back to a 16-bit word.
pub fn encode(instr: &Instruction) -> u16 {
    fn op(opcode: Opcode) -> u16 {
        (opcode as u16) << 12
    }
    fn reg(r: Reg, shift: u16) -> u16 {
        (r.index() as u16) << shift
    }
    fn operate(opcode: Opcode, dr: Reg, sr1: Reg, operand: Operand) -> u16 {
        let tail = match operand {
            Operand::Imm(imm) => (1 << 5) | (imm & 0x1F),
            Operand::Reg(sr2) => reg(sr2, 0),
        };
        op(opcode) | reg(dr, 9) | reg(sr1, 6) | tail
    }

    match *instr {
        Instruction::Add { dr, sr1, operand } => operate(Opcode::Add, dr, sr1, operand),
        Instruction::And { dr, sr1, operand } => operate(Opcode::And, dr, sr1, operand),
        Instruction::Not { dr, sr } => op(Opcode::Not) | reg(dr, 9) | reg(sr, 6) | 0x3F,
        Instruction::Ld { dr, offset } => op(Opcode::Ld) | reg(dr, 9) | (offset & 0x1FF),
        Instruction::Ldi { dr, offset } => op(Opcode::Ldi) | reg(dr, 9) | (offset & 0x1FF),
        Instruction::Ldr { dr, base, offset } => {
            op(Opcode::Ldr) | reg(dr, 9) | reg(base, 6) | (offset & 0x3F)
        }
        Instruction::Lea { dr, offset } => op(Opcode::Lea) | reg(dr, 9) | (offset & 0x1FF),
        Instruction::St { sr, offset } => op(Opcode::St) | reg(sr, 9) | (offset & 0x1FF),
        Instruction::Sti { sr, offset } => op(Opcode::Sti) | reg(sr, 9) | (offset & 0x1FF),
        Instruction::Str { sr, base, offset } => {
            op(Opcode::Str) | reg(sr, 9) | reg(base, 6) | (offset & 0x3F)
        }
        Instruction::Br { nzp, offset } => op(Opcode::Br) | ((nzp & 0x7) << 9) | (offset & 0x1FF),
        Instruction::Jmp { base } => op(Opcode::Jmp) | reg(base, 6),
        Instruction::Jsr { target: JsrTarget::Offset(offset) } => {
            op(Opcode::Jsr) | (1 << 11) | (offset & 0x7FF)
        }
        Instruction::Jsr { target: JsrTarget::Reg(base) } => op(Opcode::Jsr) | reg(base, 6),
        Instruction::Trap { vector } => op(Opcode::Trap) | u16::from(vector),
        Instruction::Reserved { opcode } => op(opcode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sign_extend_examples() {
        assert_eq!(sign_extend(0b01111, 5), 15);
        assert_eq!(sign_extend(0b11101, 5), (-3i16) as u16);
        assert_eq!(sign_extend(0b10000, 5), (-16i16) as u16);
        assert_eq!(sign_extend(0x1FF, 9), 0xFFFF);
        assert_eq!(sign_extend(0x100, 9), 0xFF00);
        assert_eq!(sign_extend(0x3FF, 11), 0x03FF);
        assert_eq!(sign_extend(0x400, 11), 0xFC00);
        assert_eq!(sign_extend(0x20, 6), 0xFFE0);
    }

    #[test]
    fn test_sign_extend_ignores_high_bits() {
        assert_eq!(sign_extend(0xFFE1, 5), 1);
    }

    #[test]
    fn test_sign_extend_full_width() {
        assert_eq!(sign_extend(0x8001, 16), 0x8001);
        assert_eq!(sign_extend(1, 1), 0xFFFF);
    }

    #[test]
    fn test_decode_add_immediate() {
        // ADD R0, R1, #-3
        let instr = decode(0b0001_000_001_1_11101);
        assert_eq!(
            instr,
            Instruction::Add { dr: Reg::R0, sr1: Reg::R1, operand: Operand::Imm(0xFFFD) }
        );
    }

    #[test]
    fn test_decode_and_register() {
        // AND R3, R4, R5
        let instr = decode(0b0101_011_100_0_00_101);
        assert_eq!(
            instr,
            Instruction::And { dr: Reg::R3, sr1: Reg::R4, operand: Operand::Reg(Reg::R5) }
        );
    }

    #[test]
    fn test_decode_branch() {
        // BRnz #-2
        let instr = decode(0b0000_110_111111110);
        assert_eq!(instr, Instruction::Br { nzp: 0b110, offset: 0xFFFE });
    }

    #[test]
    fn test_decode_jsr_forms() {
        assert_eq!(
            decode(0x4800 | 0x7FF),
            Instruction::Jsr { target: JsrTarget::Offset(0xFFFF) }
        );
        assert_eq!(
            decode(0b0100_0_00_011_000000),
            Instruction::Jsr { target: JsrTarget::Reg(Reg::R3) }
        );
    }

    #[test]
    fn test_decode_ret() {
        assert_eq!(decode(0xC1C0), Instruction::Jmp { base: Reg::R7 });
    }

    #[test]
    fn test_decode_trap() {
        assert_eq!(decode(0xF025), Instruction::Trap { vector: 0x25 });
    }

    #[test]
    fn test_decode_reserved() {
        assert_eq!(decode(0x8000), Instruction::Reserved { opcode: Opcode::Rti });
        assert_eq!(decode(0xD123), Instruction::Reserved { opcode: Opcode::Res });
    }

    #[test]
    fn test_encode_known_words() {
        let halt = Instruction::Trap { vector: 0x25 };
        assert_eq!(encode(&halt), 0xF025);

        let lea = Instruction::Lea { dr: Reg::R0, offset: 2 };
        assert_eq!(encode(&lea), 0xE002);

        let add = Instruction::Add { dr: Reg::R0, sr1: Reg::R1, operand: Operand::Imm(0xFFFD) };
        assert_eq!(encode(&add), 0x107D);
    }

    proptest! {
        #[test]
        fn sign_extend_matches_signed_value(width in prop::sample::select(vec![5u32, 6, 9, 11]), raw in any::<u16>()) {
            let field = raw & ((1u16 << width) - 1);
            let expected = if field >> (width - 1) == 1 {
                (i32::from(field) - (1i32 << width)) as i16 as u16
            } else {
                field
            };
            prop_assert_eq!(sign_extend(field, width), expected);
        }

        #[test]
        fn decode_never_panics_and_reencodes(word in any::<u16>()) {
            let instr = decode(word);
            // Re-encoding is stable even though some bits are don't-care.
            prop_assert_eq!(decode(encode(&instr)), instr);
        }
    }
}
