//! Debugger application state and logic.

use crate::asm::disasm::format_instruction;
use crate::asm::disassemble_word;
use crate::cpu::memory::{ProgramMemory, PROGRAM_SIZE};
use crate::cpu::regfile::REGISTER_FILE_SIZE;
use crate::Cpu;
use std::collections::HashSet;

/// Registers shown per row of the register file view.
pub const REGS_PER_ROW: usize = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Breakpoints (by PC).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Step over a breakpoint at the PC a run was started from.
    resume_past_breakpoint: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Register view scroll offset, in rows.
    pub reg_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u16>) -> Self {
        let mut cpu = Cpu::new();
        let status = match cpu.load_program(&program) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".to_string(),
            Err(e) => format!("Load failed: {}", e),
        };

        Self {
            cpu,
            breakpoints: HashSet::new(),
            running: false,
            resume_past_breakpoint: false,
            should_quit: false,
            status,
            reg_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.pc();
        match self.cpu.step() {
            Ok(instr) => {
                self.status = format!("PC={:04x}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until sleep, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.resume_past_breakpoint = true;
        self.status = "Running...".into();
    }

    /// Pause continuous execution.
    pub fn pause(&mut self) {
        self.running = false;
        self.status = "Paused.".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Sleeping after {} cycles", self.cpu.cycles);
            return;
        }

        let pc = self.cpu.pc();
        let resuming = std::mem::take(&mut self.resume_past_breakpoint);
        if !resuming && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:04x}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:04x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:04x}", pc);
        }
    }

    /// Reset CPU to its power-on state. Breakpoints are kept.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    pub fn scroll_up(&mut self) {
        self.reg_scroll = self.reg_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let rows = REGISTER_FILE_SIZE / REGS_PER_ROW;
        if self.reg_scroll + 1 < rows {
            self.reg_scroll += 1;
        }
    }

    /// Get disassembly around current PC as `(pc, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = self.cpu.pc();
        let current = ProgramMemory::pc_to_index(pc);
        let start = current.saturating_sub(lines / 2);

        (start..(start + lines).min(PROGRAM_SIZE))
            .filter_map(|idx| {
                let word = self.cpu.program.read(idx).ok()?;
                let addr = ProgramMemory::index_to_pc(idx);
                Some((addr, disassemble_word(word), idx == current))
            })
            .collect()
    }

    /// Register file rows starting at the scroll offset, as `(base, cells)`.
    pub fn register_rows(&self, rows: usize) -> Vec<(usize, Vec<u8>)> {
        self.cpu
            .core
            .regs
            .cells()
            .chunks(REGS_PER_ROW)
            .enumerate()
            .skip(self.reg_scroll)
            .take(rows)
            .map(|(row, cells)| (row * REGS_PER_ROW, cells.to_vec()))
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u16>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => app.pause(),
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_up(),
                        KeyCode::Down => app.scroll_down(),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
