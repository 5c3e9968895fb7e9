//! CPU execution engine for the PIC16F84.
//!
//! Implements the fetch-decode-execute cycle around the instruction core.

use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::isa::Core;
use crate::cpu::memory::{MemoryError, ProgramMemory};
use crate::cpu::regfile::{RegisterBank, RegisterFile, STATUS};
use log::debug;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// STATUS after power-on reset: TO and PD set.
pub const STATUS_POWER_ON: u8 = 0x18;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU executed SLEEP and stopped fetching.
    Sleeping,
}

/// The PIC16F84 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Execution core: W, PC, call stack and register file.
    pub core: Core<RegisterBank>,
    /// Program memory.
    pub program: ProgramMemory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    pub fn new() -> Self {
        let mut regs = RegisterBank::new();
        regs.write(STATUS, STATUS_POWER_ON);
        Self {
            core: Core::new(regs),
            program: ProgramMemory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the processor to its power-on state. Program memory is kept.
    pub fn reset(&mut self) {
        let program = std::mem::take(&mut self.program);
        *self = Self::new();
        self.program = program;
        debug!("cpu reset");
    }

    /// Load a program into program memory at word 0.
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), MemoryError> {
        self.program.load_program(0, program)?;
        debug!("loaded {} program words", program.len());
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.core.pc();
        let raw = self.program.fetch(pc);

        // Decode
        let instr = decode::decode(raw).map_err(|e| CpuError::Decode { pc, source: e })?;

        // Execute
        self.core.pre_step();
        self.core.execute(instr);

        if instr == Instruction::Sleep {
            self.state = CpuState::Sleeping;
            debug!("SLEEP at {:#06x} after {} cycles", pc, self.cycles + 1);
        }

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until the CPU stops or errors.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Accumulator.
    pub fn w(&self) -> u8 {
        self.core.w()
    }

    /// Program counter.
    pub fn pc(&self) -> u16 {
        self.core.pc()
    }

    /// Read a register-file cell without indirection.
    pub fn register(&self, addr: u8) -> u8 {
        self.core.regs.read_raw(addr)
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is sleeping.
    pub fn is_sleeping(&self) -> bool {
        self.state == CpuState::Sleeping
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("core", &self.core)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error at PC={pc:#06x}: {source}")]
    Decode { pc: u16, source: DecodeError },
}
