//! # PIC16F84 Emulator
//!
//! An instruction-accurate emulator of the PIC16F84 8-bit microcontroller.
//!
//! The core executes the 35-instruction mid-range set against a 128-byte
//! register file, with INDF/FSR indirection, the C/DC/Z status flags and
//! the 8-level circular call stack. Around it sit a program memory driver,
//! an assembler, a disassembler and a terminal debugger.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Core, RegisterBank, RegisterFile, Instruction, Dest};
pub use asm::{assemble, disassemble, disassemble_word, AssemblerError, ImageFile, image_path_for, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
