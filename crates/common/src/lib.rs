use num_derive::{FromPrimitive, ToPrimitive};
use strum::{Display, EnumIter};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Invalid opcode: {} at (@{:#02x}/@{})", .0, .1, .1)]
    InvalidOpcode(u8, u16),
}

/// Counters accumulated over one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub instructions: usize,
}

/// One 32-bit machine word.
///
/// The same bits carry several meanings depending on where the word is read:
/// a signed or unsigned integer, an IEEE-754 single, two 16-bit storage
/// cells, or one of the two packed instruction layouts. Callers pick the
/// interpretation explicitly through the accessors; nothing converts
/// between them.
///
/// Packed layouts (bit 0 = least significant):
/// - three-operand: bits 0..8 opcode, 8..16 slot a, 16..24 slot b,
///   24..32 slot c
/// - two-operand:   bits 0..8 opcode, 8..16 register, 16..32 address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Word(u32);

impl Word {
    /// An all-zero word, which the dispatch loop treats as halt.
    pub const HALT: Word = Word(0);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Word(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(value: i32) -> Self {
        Word(value as u32)
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Word(value)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Word(value.to_bits())
    }

    #[must_use]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }

    #[must_use]
    pub const fn from_cells(low: u16, high: u16) -> Self {
        Word((high as u32) << 16 | low as u32)
    }

    #[must_use]
    pub const fn low_cell(self) -> u16 {
        self.0 as u16
    }

    #[must_use]
    pub const fn high_cell(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Build a three-operand instruction word.
    #[must_use]
    pub const fn three_op(opcode: u8, a: u8, b: u8, c: u8) -> Self {
        Word(opcode as u32 | (a as u32) << 8 | (b as u32) << 16 | (c as u32) << 24)
    }

    /// Build a two-operand instruction word. The 16-bit address field
    /// occupies the same bits as slots b and c of the three-operand layout.
    #[must_use]
    pub const fn two_op(opcode: u8, reg: u8, addr: u16) -> Self {
        Word(opcode as u32 | (reg as u32) << 8 | (addr as u32) << 16)
    }

    #[must_use]
    pub const fn opcode(self) -> u8 {
        self.0 as u8
    }

    #[must_use]
    pub const fn op_a(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[must_use]
    pub const fn op_b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[must_use]
    pub const fn op_c(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[must_use]
    pub const fn addr(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

/// Status flag bit indices. Arithmetic and compare instructions write them,
/// conditional jumps and `GetFlag` read them; nothing clears them implicitly.
pub mod flag {
    pub const ZERO: u8 = 0;
    pub const PARITY: u8 = 1;
    pub const EQ_INT: u8 = 2;
    pub const GT_INT: u8 = 3;
    pub const EQ_UINT: u8 = 4;
    pub const GT_UINT: u8 = 5;
    pub const EQ_FLOAT: u8 = 6;
    pub const GT_FLOAT: u8 = 7;
    pub const SIGN: u8 = 8;
    pub const INT_OVERFLOW: u8 = 9;
    pub const CARRY: u8 = 10;
    pub const FLOAT_OVERFLOW: u8 = 11;
    pub const DIV_ZERO: u8 = 12;
}

#[derive(
    Debug,
    Display,
    PartialEq,
    PartialOrd,
    Copy,
    Clone,
    Hash,
    Eq,
    Ord,
    FromPrimitive,
    ToPrimitive,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Opcode {
    //
    // 0: reserved, stops the dispatch loop
    //
    Halt = 0,

    //
    // 1 - 19: jump group. These handlers own the instruction pointer,
    // including the not-taken fall-through; everything above 19 gets the
    // automatic +2 advance instead.
    //
    Jmp = 1,
    Jeq = 2,
    JeqU = 3,
    JeqF = 4,
    Jgt = 5,
    JgtU = 6,
    JgtF = 7,
    Jlt = 8,
    JltU = 9,
    JltF = 10,
    Jne = 11,
    JneU = 12,
    JneF = 13,
    Jge = 14,
    JgeU = 15,
    JgeF = 16,
    Jle = 17,
    JleU = 18,
    JleF = 19,

    //
    // 20 - 22: console output
    //
    Print = 20,
    PrintU = 21,
    PrintF = 22,

    //
    // 23: load an address constant into an address register
    //
    Load = 23,

    //
    // 24 - 41: arithmetic
    //
    Neg = 24,
    NegF = 25,
    Cmp = 26,
    CmpU = 27,
    CmpF = 28,
    Add = 29,
    AddF = 30,
    Sub = 31,
    SubF = 32,
    Mul = 33,
    MulF = 34,
    DivU = 35,
    Div = 36,
    DivF = 37,
    ModU = 38,
    Mod = 39,
    Inc = 40,
    Dec = 41,

    //
    // 42 - 44: console input
    //
    Read = 42,
    ReadU = 43,
    ReadF = 44,

    //
    // 45 - 48: bitwise
    //
    And = 45,
    Or = 46,
    Xor = 47,
    Not = 48,

    //
    // 49 - 50: register-to-register moves
    //
    CopyR = 49,
    CopyV = 50,

    //
    // 51 - 54: subroutines and flag transfer
    //
    Call = 51,
    GetFlag = 52,
    SetFlag = 53,
    Ret = 54,
}

impl Opcode {
    /// Highest opcode whose handler is responsible for the instruction
    /// pointer itself.
    pub const MAX_JUMP: u8 = Opcode::JleF as u8;

    #[must_use]
    pub fn is_jump(self) -> bool {
        let code = self as u8;
        code >= Opcode::Jmp as u8 && code <= Self::MAX_JUMP
    }
}

/// A program image produced by the loader: sparse word writes plus the
/// address execution starts from. The entry directive names the address one
/// word past the first instruction, so the stored entry is already backed
/// off by 2.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Program {
    pub words: Vec<(u16, Word)>,
    pub entry: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{FromPrimitive, ToPrimitive};
    use strum::IntoEnumIterator;

    #[test]
    fn word_reinterprets_the_same_bits() {
        let w = Word::from_i32(-1);
        assert_eq!(w.as_u32(), u32::MAX);
        assert_eq!(w.low_cell(), u16::MAX);
        assert_eq!(w.high_cell(), u16::MAX);

        let f = Word::from_f32(1.5);
        assert_eq!(f.bits(), 1.5f32.to_bits());
        assert_eq!(f.as_f32(), 1.5);
    }

    #[test]
    fn word_cells_round_trip() {
        let w = Word::from_cells(0xBEEF, 0xDEAD);
        assert_eq!(w.low_cell(), 0xBEEF);
        assert_eq!(w.high_cell(), 0xDEAD);
        assert_eq!(w.bits(), 0xDEAD_BEEF);
    }

    #[test]
    fn three_op_fields() {
        let w = Word::three_op(29, 2, 0, 1);
        assert_eq!(w.opcode(), 29);
        assert_eq!(w.op_a(), 2);
        assert_eq!(w.op_b(), 0);
        assert_eq!(w.op_c(), 1);
    }

    #[test]
    fn two_op_fields_alias_the_high_slots() {
        let w = Word::two_op(23, 7, 0x1234);
        assert_eq!(w.opcode(), 23);
        assert_eq!(w.op_a(), 7);
        assert_eq!(w.addr(), 0x1234);
        // The address field overlays slots b and c.
        assert_eq!(w.op_b(), 0x34);
        assert_eq!(w.op_c(), 0x12);
    }

    #[test]
    fn every_opcode_value_round_trips() {
        for op in Opcode::iter() {
            let code = op.to_u8().unwrap();
            assert_eq!(Opcode::from_u8(code), Some(op), "opcode {op:?}");
        }
        // The table is dense: halt plus 54 instructions, nothing above.
        assert_eq!(Opcode::iter().count(), 55);
        assert_eq!(Opcode::from_u8(55), None);
    }

    #[test]
    fn jump_group_boundaries() {
        assert!(Opcode::Jmp.is_jump());
        assert!(Opcode::JleF.is_jump());
        assert!(!Opcode::Halt.is_jump());
        assert!(!Opcode::Print.is_jump());
        assert!(!Opcode::Call.is_jump());
        assert!(!Opcode::Ret.is_jump());
    }
}
