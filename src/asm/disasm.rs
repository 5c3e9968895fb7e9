//! Disassembler for PIC16F84 programs.
//!
//! Converts 14-bit instruction words back to readable assembly.

use crate::cpu::decode::{decode, Dest, Instruction};
use crate::cpu::memory::ProgramMemory;
use crate::cpu::regfile::sfr_name;

/// Disassemble a single instruction word to text.
pub fn disassemble_word(word: u16) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => format!("??? ; {:#06x}", word),
    }
}

/// Disassemble a program image, one line per word.
pub fn disassemble(words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str("; PIC16F84 Disassembly\n");
    output.push_str("; --------------------\n\n");

    for (index, &word) in words.iter().enumerate() {
        let line = disassemble_word(word);
        output.push_str(&format!(
            "{:04x}: {:04x}  {}\n",
            ProgramMemory::index_to_pc(index),
            word,
            line
        ));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let m = instr.mnemonic();
    match *instr {
        Instruction::Addwf { f, d }
        | Instruction::Andwf { f, d }
        | Instruction::Comf { f, d }
        | Instruction::Decf { f, d }
        | Instruction::Decfsz { f, d }
        | Instruction::Incf { f, d }
        | Instruction::Incfsz { f, d }
        | Instruction::Iorwf { f, d }
        | Instruction::Movf { f, d }
        | Instruction::Rlf { f, d }
        | Instruction::Rrf { f, d }
        | Instruction::Subwf { f, d }
        | Instruction::Swapf { f, d }
        | Instruction::Xorwf { f, d } => format!("{} {}, {}", m, format_register(f), format_dest(d)),

        Instruction::Clrf { f } | Instruction::Movwf { f } => format!("{} {}", m, format_register(f)),

        Instruction::Bcf { f, b }
        | Instruction::Bsf { f, b }
        | Instruction::Btfsc { f, b }
        | Instruction::Btfss { f, b } => format!("{} {}, {}", m, format_register(f), b),

        Instruction::Addlw { k }
        | Instruction::Andlw { k }
        | Instruction::Iorlw { k }
        | Instruction::Movlw { k }
        | Instruction::Retlw { k }
        | Instruction::Sublw { k }
        | Instruction::Xorlw { k } => format!("{} 0x{:02x}", m, k),

        Instruction::Call { target } | Instruction::Goto { target } => format!("{} 0x{:03x}", m, target),

        Instruction::Clrw
        | Instruction::Nop
        | Instruction::Clrwdt
        | Instruction::Retfie
        | Instruction::Return
        | Instruction::Sleep => m.to_string(),
    }
}

/// SFRs by name, everything else as hex.
fn format_register(f: u8) -> String {
    match sfr_name(f) {
        Some(name) => name.to_string(),
        None => format!("0x{:02x}", f),
    }
}

fn format_dest(d: Dest) -> &'static str {
    match d {
        Dest::W => "W",
        Dest::F => "F",
    }
}
