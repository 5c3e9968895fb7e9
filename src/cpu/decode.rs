//! Instruction decoder for the PIC16F84.
//!
//! Every instruction is one 14-bit word. The top two bits select the
//! operand shape: byte-oriented file ops (`00`), bit-oriented file ops
//! (`01`), CALL/GOTO (`10`) and literal ops (`11`).

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Largest valid instruction word.
pub const WORD_MASK: u16 = 0x3FFF;

/// Destination selector of a byte-oriented instruction (the `d` bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dest {
    /// Result goes to the accumulator (d = 0).
    W,
    /// Result is written back to the file register (d = 1).
    F,
}

impl Dest {
    /// Create from the `d` bit.
    pub fn from_bit(d: bool) -> Self {
        if d { Dest::F } else { Dest::W }
    }

    /// Convert to the `d` bit.
    pub fn to_bit(self) -> bool {
        matches!(self, Dest::F)
    }
}

/// Decoded PIC16F84 instruction.
///
/// `f` is a 7-bit register-file address, `b` a bit index 0-7 and `k` an
/// 8-bit literal. CALL/GOTO targets are in program-counter scale (two
/// address units per instruction word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Byte-oriented file register ====================

    /// W + f
    Addwf { f: u8, d: Dest },
    /// W & f
    Andwf { f: u8, d: Dest },
    /// f := 0
    Clrf { f: u8 },
    /// W := 0
    Clrw,
    /// !f
    Comf { f: u8, d: Dest },
    /// f - 1
    Decf { f: u8, d: Dest },
    /// f - 1, skip if zero
    Decfsz { f: u8, d: Dest },
    /// f + 1
    Incf { f: u8, d: Dest },
    /// f + 1, skip if zero
    Incfsz { f: u8, d: Dest },
    /// W | f
    Iorwf { f: u8, d: Dest },
    /// f
    Movf { f: u8, d: Dest },
    /// f := W
    Movwf { f: u8 },
    Nop,
    /// Rotate left through carry
    Rlf { f: u8, d: Dest },
    /// Rotate right through carry
    Rrf { f: u8, d: Dest },
    /// f - W
    Subwf { f: u8, d: Dest },
    /// Swap nibbles of f
    Swapf { f: u8, d: Dest },
    /// W ^ f
    Xorwf { f: u8, d: Dest },

    // ==================== Bit-oriented file register ====================

    Bcf { f: u8, b: u8 },
    Bsf { f: u8, b: u8 },
    /// Skip if bit clear
    Btfsc { f: u8, b: u8 },
    /// Skip if bit set
    Btfss { f: u8, b: u8 },

    // ==================== Literal ====================

    Addlw { k: u8 },
    Andlw { k: u8 },
    Clrwdt,
    Iorlw { k: u8 },
    Movlw { k: u8 },
    Retlw { k: u8 },
    /// k - W
    Sublw { k: u8 },
    Xorlw { k: u8 },

    // ==================== Control ====================

    Call { target: u16 },
    Goto { target: u16 },
    Retfie,
    Return,
    Sleep,
}

impl Instruction {
    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Addwf { .. } => "ADDWF",
            Instruction::Andwf { .. } => "ANDWF",
            Instruction::Clrf { .. } => "CLRF",
            Instruction::Clrw => "CLRW",
            Instruction::Comf { .. } => "COMF",
            Instruction::Decf { .. } => "DECF",
            Instruction::Decfsz { .. } => "DECFSZ",
            Instruction::Incf { .. } => "INCF",
            Instruction::Incfsz { .. } => "INCFSZ",
            Instruction::Iorwf { .. } => "IORWF",
            Instruction::Movf { .. } => "MOVF",
            Instruction::Movwf { .. } => "MOVWF",
            Instruction::Nop => "NOP",
            Instruction::Rlf { .. } => "RLF",
            Instruction::Rrf { .. } => "RRF",
            Instruction::Subwf { .. } => "SUBWF",
            Instruction::Swapf { .. } => "SWAPF",
            Instruction::Xorwf { .. } => "XORWF",
            Instruction::Bcf { .. } => "BCF",
            Instruction::Bsf { .. } => "BSF",
            Instruction::Btfsc { .. } => "BTFSC",
            Instruction::Btfss { .. } => "BTFSS",
            Instruction::Addlw { .. } => "ADDLW",
            Instruction::Andlw { .. } => "ANDLW",
            Instruction::Clrwdt => "CLRWDT",
            Instruction::Iorlw { .. } => "IORLW",
            Instruction::Movlw { .. } => "MOVLW",
            Instruction::Retlw { .. } => "RETLW",
            Instruction::Sublw { .. } => "SUBLW",
            Instruction::Xorlw { .. } => "XORLW",
            Instruction::Call { .. } => "CALL",
            Instruction::Goto { .. } => "GOTO",
            Instruction::Retfie => "RETFIE",
            Instruction::Return => "RETURN",
            Instruction::Sleep => "SLEEP",
        }
    }
}

/// Opcode field values.
struct Opcode;

impl Opcode {
    // Byte-oriented, bits 11-8
    const SUBWF: u16 = 0x2;
    const DECF: u16 = 0x3;
    const IORWF: u16 = 0x4;
    const ANDWF: u16 = 0x5;
    const XORWF: u16 = 0x6;
    const ADDWF: u16 = 0x7;
    const MOVF: u16 = 0x8;
    const COMF: u16 = 0x9;
    const INCF: u16 = 0xA;
    const DECFSZ: u16 = 0xB;
    const RRF: u16 = 0xC;
    const RLF: u16 = 0xD;
    const SWAPF: u16 = 0xE;
    const INCFSZ: u16 = 0xF;

    // Fixed words
    const RETURN: u16 = 0x0008;
    const RETFIE: u16 = 0x0009;
    const SLEEP: u16 = 0x0063;
    const CLRWDT: u16 = 0x0064;
    const CLRW: u16 = 0x0100;
}

/// Decode a 14-bit instruction word.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    if word > WORD_MASK {
        return Err(DecodeError::WordOutOfRange(word));
    }

    let f = (word & 0x7F) as u8;
    let d = Dest::from_bit(word & 0x80 != 0);
    let k = (word & 0xFF) as u8;

    let instruction = match word >> 12 {
        0b00 => {
            let op = (word >> 8) & 0xF;
            match op {
                0x0 => decode_misc(word)?,
                0x1 => {
                    if word & 0x80 != 0 {
                        Instruction::Clrf { f }
                    } else {
                        Instruction::Clrw
                    }
                }
                Opcode::SUBWF => Instruction::Subwf { f, d },
                Opcode::DECF => Instruction::Decf { f, d },
                Opcode::IORWF => Instruction::Iorwf { f, d },
                Opcode::ANDWF => Instruction::Andwf { f, d },
                Opcode::XORWF => Instruction::Xorwf { f, d },
                Opcode::ADDWF => Instruction::Addwf { f, d },
                Opcode::MOVF => Instruction::Movf { f, d },
                Opcode::COMF => Instruction::Comf { f, d },
                Opcode::INCF => Instruction::Incf { f, d },
                Opcode::DECFSZ => Instruction::Decfsz { f, d },
                Opcode::RRF => Instruction::Rrf { f, d },
                Opcode::RLF => Instruction::Rlf { f, d },
                Opcode::SWAPF => Instruction::Swapf { f, d },
                Opcode::INCFSZ => Instruction::Incfsz { f, d },
                _ => unreachable!(),
            }
        }
        0b01 => {
            let b = ((word >> 7) & 0x7) as u8;
            match (word >> 10) & 0x3 {
                0 => Instruction::Bcf { f, b },
                1 => Instruction::Bsf { f, b },
                2 => Instruction::Btfsc { f, b },
                _ => Instruction::Btfss { f, b },
            }
        }
        0b10 => {
            let target = (word & 0x7FF) << 1;
            if word & 0x0800 != 0 {
                Instruction::Goto { target }
            } else {
                Instruction::Call { target }
            }
        }
        _ => match (word >> 8) & 0xF {
            0x0..=0x3 => Instruction::Movlw { k },
            0x4..=0x7 => Instruction::Retlw { k },
            0x8 => Instruction::Iorlw { k },
            0x9 => Instruction::Andlw { k },
            0xA => Instruction::Xorlw { k },
            0xB => return Err(DecodeError::InvalidOpcode(word)),
            0xC | 0xD => Instruction::Sublw { k },
            _ => Instruction::Addlw { k },
        },
    };

    Ok(instruction)
}

/// Decode the `00 0000 xxxx xxxx` group.
fn decode_misc(word: u16) -> Result<Instruction, DecodeError> {
    if word & 0x80 != 0 {
        return Ok(Instruction::Movwf { f: (word & 0x7F) as u8 });
    }
    match word {
        Opcode::RETURN => Ok(Instruction::Return),
        Opcode::RETFIE => Ok(Instruction::Retfie),
        Opcode::SLEEP => Ok(Instruction::Sleep),
        Opcode::CLRWDT => Ok(Instruction::Clrwdt),
        w if w & 0x1F == 0 => Ok(Instruction::Nop),
        _ => Err(DecodeError::InvalidOpcode(word)),
    }
}

/// Encode an instruction to its canonical 14-bit word.
///
/// Don't-care bits are zero. Operands wider than their field are masked.
pub fn encode(instr: &Instruction) -> u16 {
    let byte_op = |op: u16, f: u8, d: Dest| (op << 8) | ((d.to_bit() as u16) << 7) | (f as u16 & 0x7F);
    let bit_op = |op: u16, f: u8, b: u8| 0x1000 | (op << 10) | ((b as u16 & 0x7) << 7) | (f as u16 & 0x7F);
    let lit_op = |op: u16, k: u8| 0x3000 | (op << 8) | k as u16;
    let jump = |op: u16, target: u16| 0x2000 | (op << 11) | ((target >> 1) & 0x7FF);

    match *instr {
        Instruction::Addwf { f, d } => byte_op(Opcode::ADDWF, f, d),
        Instruction::Andwf { f, d } => byte_op(Opcode::ANDWF, f, d),
        Instruction::Clrf { f } => Opcode::CLRW | 0x80 | (f as u16 & 0x7F),
        Instruction::Clrw => Opcode::CLRW,
        Instruction::Comf { f, d } => byte_op(Opcode::COMF, f, d),
        Instruction::Decf { f, d } => byte_op(Opcode::DECF, f, d),
        Instruction::Decfsz { f, d } => byte_op(Opcode::DECFSZ, f, d),
        Instruction::Incf { f, d } => byte_op(Opcode::INCF, f, d),
        Instruction::Incfsz { f, d } => byte_op(Opcode::INCFSZ, f, d),
        Instruction::Iorwf { f, d } => byte_op(Opcode::IORWF, f, d),
        Instruction::Movf { f, d } => byte_op(Opcode::MOVF, f, d),
        Instruction::Movwf { f } => 0x0080 | (f as u16 & 0x7F),
        Instruction::Nop => 0x0000,
        Instruction::Rlf { f, d } => byte_op(Opcode::RLF, f, d),
        Instruction::Rrf { f, d } => byte_op(Opcode::RRF, f, d),
        Instruction::Subwf { f, d } => byte_op(Opcode::SUBWF, f, d),
        Instruction::Swapf { f, d } => byte_op(Opcode::SWAPF, f, d),
        Instruction::Xorwf { f, d } => byte_op(Opcode::XORWF, f, d),

        Instruction::Bcf { f, b } => bit_op(0, f, b),
        Instruction::Bsf { f, b } => bit_op(1, f, b),
        Instruction::Btfsc { f, b } => bit_op(2, f, b),
        Instruction::Btfss { f, b } => bit_op(3, f, b),

        Instruction::Addlw { k } => lit_op(0xE, k),
        Instruction::Andlw { k } => lit_op(0x9, k),
        Instruction::Clrwdt => Opcode::CLRWDT,
        Instruction::Iorlw { k } => lit_op(0x8, k),
        Instruction::Movlw { k } => lit_op(0x0, k),
        Instruction::Retlw { k } => lit_op(0x4, k),
        Instruction::Sublw { k } => lit_op(0xC, k),
        Instruction::Xorlw { k } => lit_op(0xA, k),

        Instruction::Call { target } => jump(0, target),
        Instruction::Goto { target } => jump(1, target),
        Instruction::Retfie => Opcode::RETFIE,
        Instruction::Return => Opcode::RETURN,
        Instruction::Sleep => Opcode::SLEEP,
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#06x}")]
    InvalidOpcode(u16),

    #[error("instruction word {0:#06x} wider than 14 bits")]
    WordOutOfRange(u16),
}
