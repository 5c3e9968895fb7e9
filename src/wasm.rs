//! WebAssembly bindings for the PIC16F84 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use js_sys::Uint8Array;
use crate::Cpu;
use crate::asm::assembler::assemble;
use crate::asm::disasm::{disassemble_word, format_instruction};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self { cpu: Cpu::new() }
    }

    /// Load a program from assembly source code. Returns its length in words.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        self.cpu = Cpu::new();
        self.cpu.load_program(&words)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(words.len())
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.cpu.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(format_instruction(&instr))
    }

    /// Run until sleep or max cycles. Returns the total cycle count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.cpu.run_limited(max_cycles as u64)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(self.cpu.cycles)
    }

    /// Reset CPU to its power-on state, keeping the loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    #[wasm_bindgen]
    pub fn is_sleeping(&self) -> bool {
        self.cpu.is_sleeping()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    #[wasm_bindgen]
    pub fn w(&self) -> u8 {
        self.cpu.w()
    }

    /// STATUS as seen by the instruction core.
    #[wasm_bindgen]
    pub fn status(&self) -> u8 {
        self.cpu.core.status().bits()
    }

    /// Register-file cell, without indirection.
    #[wasm_bindgen]
    pub fn register_at(&self, addr: u8) -> u8 {
        self.cpu.register(addr)
    }

    /// The whole register file.
    #[wasm_bindgen]
    pub fn registers_all(&self) -> Uint8Array {
        Uint8Array::from(self.cpu.core.regs.cells())
    }

    /// Program memory word at a word index, 0 when out of range.
    #[wasm_bindgen]
    pub fn program_at(&self, index: usize) -> u16 {
        self.cpu.program.read(index).unwrap_or(0)
    }

    /// Full machine state as JSON.
    #[wasm_bindgen]
    pub fn state_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu)
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the word count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let words = assemble(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(words.len())
}

/// Disassemble a single instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u16) -> String {
    disassemble_word(word)
}
