//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph},
    style::{Color, Modifier, Style},
};
use crate::cpu::regfile::FSR;
use crate::cpu::stack::STACK_DEPTH;
use crate::cpu::status::STATUS_BIT_NAMES;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(7),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: register file, stack and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(STACK_DEPTH as u16 + 2),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_register_file(frame, right_chunks[0], app);
    draw_stack(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04x}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw W, PC, STATUS flags and FSR.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = app.cpu.core.status();

    // High bit first, like a datasheet register diagram.
    let mut flags = vec![Span::raw("STATUS: ")];
    for &(name, bit) in STATUS_BIT_NAMES.iter().rev() {
        let style = if status.get(bit) {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        flags.push(Span::styled(format!("{} ", name), style));
    }

    let content = vec![
        Line::from(vec![
            Span::raw("W:  "),
            Span::styled(format!("{:#04x}", app.cpu.w()), Style::default().fg(Color::White)),
            Span::raw(format!(" = {:3}", app.cpu.w())),
            Span::raw("   PC: "),
            Span::styled(format!("{:#06x}", app.cpu.pc()), Style::default().fg(Color::Yellow)),
            Span::raw("   FSR: "),
            Span::styled(format!("{:#04x}", app.cpu.register(FSR)), Style::default().fg(Color::White)),
        ]),
        Line::from(flags),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", app.cpu.state),
                if app.cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Hex grid of the register file.
fn draw_register_file(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = app.register_rows((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = rows
        .iter()
        .map(|(base, cells)| {
            let mut spans = vec![Span::styled(format!("{:02x}: ", base), Style::default().fg(Color::Gray))];
            for value in cells {
                let style = if *value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:02x} ", value), style));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Register File ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Call stack slots, with the next push slot marked.
fn draw_stack(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let stack = &app.cpu.core.stack;

    let items: Vec<ListItem> = stack
        .slots()
        .iter()
        .enumerate()
        .map(|(i, addr)| {
            let marker = if i == stack.index() { "→" } else { " " };
            ListItem::new(format!("{} {}: {:#06x}", marker, i, addr))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Stack ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(list, area);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓: Scroll registers  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
