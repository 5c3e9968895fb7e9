//! Assembler and disassembler for PIC16F84 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → program words)
//! - A disassembler (program words → readable text)
//! - The `.phex` program image file format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_word};
pub use image::{ImageFile, ImageError, image_path_for, load_image, save_image};
