//! CPU emulation for the PIC16F84.
//!
//! This module implements the mid-range PIC core:
//! - 128-byte register file with INDF/FSR indirect addressing
//! - W accumulator and C/DC/Z status flags
//! - 8-level hardware call stack
//! - 35-instruction set in 14-bit words, 1K words of program memory

pub mod alu;
pub mod regfile;
pub mod status;
pub mod stack;
pub mod isa;
pub mod memory;
pub mod decode;
pub mod execute;

pub use regfile::{RegisterBank, RegisterFile};
pub use status::StatusMirror;
pub use stack::CallStack;
pub use isa::Core;
pub use memory::{ProgramMemory, MemoryError};
pub use decode::{Instruction, Dest, DecodeError};
pub use execute::{Cpu, CpuError, CpuState};
