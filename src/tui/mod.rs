//! TUI debugger for the PIC16F84 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - W, PC, STATUS and FSR display
//! - Register file hex view and call stack
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
