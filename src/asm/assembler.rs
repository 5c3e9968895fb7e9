//! Two-pass assembler for PIC16F84 programs.
//!
//! Syntax (MPASM flavoured):
//! ```text
//! ; Comment
//! COUNT   EQU 0x20        ; Define a symbol
//!         ORG 0           ; Set origin (word address)
//! START:  MOVLW 3         ; Labels end with ':' or start in column 0
//!         MOVWF COUNT
//! LOOP    DECFSZ COUNT, F ; Destination is W/F or 0/1, defaults to F
//!         GOTO LOOP
//!         BSF STATUS, C
//!         SLEEP
//!         DW 0x3FFF       ; Raw 14-bit word
//!         END
//! ```
//!
//! Numbers may be decimal, `0x1F`, `h'1F'`, `b'0101'` or `d'10'`, combined
//! with `+` and `-`. Labels evaluate to program-counter addresses (two per
//! instruction word), which is what CALL and GOTO expect.

use crate::cpu::decode::{encode, Dest, Instruction, WORD_MASK};
use crate::cpu::memory::PROGRAM_SIZE;
use crate::cpu::regfile::SFR_NAMES;
use crate::cpu::status::STATUS_BIT_NAMES;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program memory image starting at word 0.
///
/// Words skipped over by `ORG` are filled with NOP.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One line that produces a word, kept from pass 1 for pass 2.
struct PendingWord {
    addr: usize,
    mnemonic: String,
    operands: Vec<String>,
    line: usize,
}

/// The assembler state.
struct Assembler {
    /// Current word address.
    current_addr: usize,
    /// Symbol table (name -> value).
    symbols: HashMap<String, i32>,
    /// Words to encode in pass 2.
    pending: Vec<PendingWord>,
}

impl Assembler {
    fn new() -> Self {
        let mut symbols = HashMap::new();
        for (name, addr) in SFR_NAMES {
            symbols.insert(name.to_string(), addr as i32);
        }
        for (name, bit) in STATUS_BIT_NAMES {
            symbols.insert(name.to_string(), bit as i32);
        }
        symbols.insert("W".into(), 0);
        symbols.insert("F".into(), 1);

        Self {
            current_addr: 0,
            symbols,
            pending: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u16>, AssemblerError> {
        // Pass 1: collect symbols and word addresses
        for (line_num, line) in source.lines().enumerate() {
            if !self.process_line(line, line_num + 1)? {
                break;
            }
        }

        // Pass 2: evaluate operands and encode
        let size = self.pending.iter().map(|p| p.addr + 1).max().unwrap_or(0);
        let mut output = vec![0u16; size];
        for word in &self.pending {
            output[word.addr] = self.encode_word(word)?;
        }

        Ok(output)
    }

    /// Returns false once `END` is reached.
    fn process_line(&mut self, line: &str, line_num: usize) -> Result<bool, AssemblerError> {
        // Remove comments
        let code = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        if code.trim().is_empty() {
            return Ok(true);
        }

        let starts_in_column0 = !code.starts_with(char::is_whitespace);
        let mut rest = code.trim();

        // Explicit label
        if let Some(colon_idx) = rest.find(':') {
            let label = rest[..colon_idx].trim();
            if !label.is_empty() && is_identifier(label) {
                self.define_label(label, line_num)?;
                rest = rest[colon_idx + 1..].trim();
            }
        }

        let mut parts = rest.splitn(2, char::is_whitespace);
        let Some(first) = parts.next().filter(|s| !s.is_empty()) else {
            return Ok(true);
        };
        let mut tail = parts.next().unwrap_or("").trim();

        // `NAME EQU value`
        if let Some(value) = strip_keyword(tail, "EQU") {
            let value = self.parse_value(value, line_num)?;
            return self.define_symbol(first, value, line_num).map(|_| true);
        }

        let mut mnemonic = first.to_uppercase();

        // Column-0 label without a colon
        if starts_in_column0 && !is_mnemonic(&mnemonic) && is_identifier(first) {
            self.define_label(first, line_num)?;
            let mut parts = tail.splitn(2, char::is_whitespace);
            match parts.next().filter(|s| !s.is_empty()) {
                Some(m) => {
                    mnemonic = m.to_uppercase();
                    tail = parts.next().unwrap_or("").trim();
                }
                None => return Ok(true),
            }
        }

        let operands: Vec<String> = if tail.is_empty() {
            Vec::new()
        } else {
            tail.split(',').map(|s| s.trim().to_string()).collect()
        };

        match mnemonic.as_str() {
            "END" => return Ok(false),

            "ORG" => {
                let addr = self.parse_value(expect_operand(&operands, 0, "ORG", line_num)?, line_num)?;
                if addr < 0 || addr as usize >= PROGRAM_SIZE {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr });
                }
                self.current_addr = addr as usize;
            }

            _ if is_mnemonic(&mnemonic) => {
                if self.current_addr >= PROGRAM_SIZE {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: self.current_addr as i32,
                    });
                }
                self.pending.push(PendingWord {
                    addr: self.current_addr,
                    mnemonic,
                    operands,
                    line: line_num,
                });
                self.current_addr += 1;
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic,
                })
            }
        }

        Ok(true)
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        let pc = (self.current_addr * 2) as i32;
        self.define_symbol(label, pc, line_num)
    }

    fn define_symbol(&mut self, name: &str, value: i32, line_num: usize) -> Result<(), AssemblerError> {
        if !is_identifier(name) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid symbol name '{}'", name),
            });
        }
        let key = name.to_uppercase();
        if self.symbols.contains_key(&key) {
            return Err(AssemblerError::DuplicateSymbol { line: line_num, symbol: key });
        }
        self.symbols.insert(key, value);
        Ok(())
    }

    fn encode_word(&self, word: &PendingWord) -> Result<u16, AssemblerError> {
        let line = word.line;
        let ops = &word.operands;
        let mnemonic = word.mnemonic.as_str();

        if mnemonic == "DW" {
            let value = self.parse_value(expect_operand(ops, 0, mnemonic, line)?, line)?;
            return check_range(value, 0, WORD_MASK as i32, line).map(|v| v as u16);
        }

        let reg = |idx: usize| -> Result<u8, AssemblerError> {
            let value = self.parse_value(expect_operand(ops, idx, mnemonic, line)?, line)?;
            check_range(value, 0, 0x7F, line).map(|v| v as u8)
        };
        let dest = || -> Result<Dest, AssemblerError> {
            match ops.get(1) {
                None => Ok(Dest::F),
                Some(op) => {
                    let value = self.parse_value(op, line)?;
                    check_range(value, 0, 1, line).map(|v| Dest::from_bit(v == 1))
                }
            }
        };
        let bit = || -> Result<u8, AssemblerError> {
            let value = self.parse_value(expect_operand(ops, 1, mnemonic, line)?, line)?;
            check_range(value, 0, 7, line).map(|v| v as u8)
        };
        let literal = || -> Result<u8, AssemblerError> {
            let value = self.parse_value(expect_operand(ops, 0, mnemonic, line)?, line)?;
            // negative literals are two's complement
            check_range(value, -128, 255, line).map(|v| v as u8)
        };
        let target = || -> Result<u16, AssemblerError> {
            let value = self.parse_value(expect_operand(ops, 0, mnemonic, line)?, line)?;
            if value % 2 != 0 {
                return Err(AssemblerError::ValueOutOfRange { line, value });
            }
            check_range(value, 0, 0xFFE, line).map(|v| v as u16)
        };

        let instr = match mnemonic {
            // Byte-oriented
            "ADDWF" => Instruction::Addwf { f: reg(0)?, d: dest()? },
            "ANDWF" => Instruction::Andwf { f: reg(0)?, d: dest()? },
            "CLRF" => Instruction::Clrf { f: reg(0)? },
            "CLRW" => Instruction::Clrw,
            "COMF" => Instruction::Comf { f: reg(0)?, d: dest()? },
            "DECF" => Instruction::Decf { f: reg(0)?, d: dest()? },
            "DECFSZ" => Instruction::Decfsz { f: reg(0)?, d: dest()? },
            "INCF" => Instruction::Incf { f: reg(0)?, d: dest()? },
            "INCFSZ" => Instruction::Incfsz { f: reg(0)?, d: dest()? },
            "IORWF" => Instruction::Iorwf { f: reg(0)?, d: dest()? },
            "MOVF" => Instruction::Movf { f: reg(0)?, d: dest()? },
            "MOVWF" => Instruction::Movwf { f: reg(0)? },
            "NOP" => Instruction::Nop,
            "RLF" => Instruction::Rlf { f: reg(0)?, d: dest()? },
            "RRF" => Instruction::Rrf { f: reg(0)?, d: dest()? },
            "SUBWF" => Instruction::Subwf { f: reg(0)?, d: dest()? },
            "SWAPF" => Instruction::Swapf { f: reg(0)?, d: dest()? },
            "XORWF" => Instruction::Xorwf { f: reg(0)?, d: dest()? },

            // Bit-oriented
            "BCF" => Instruction::Bcf { f: reg(0)?, b: bit()? },
            "BSF" => Instruction::Bsf { f: reg(0)?, b: bit()? },
            "BTFSC" => Instruction::Btfsc { f: reg(0)?, b: bit()? },
            "BTFSS" => Instruction::Btfss { f: reg(0)?, b: bit()? },

            // Literal
            "ADDLW" => Instruction::Addlw { k: literal()? },
            "ANDLW" => Instruction::Andlw { k: literal()? },
            "CLRWDT" => Instruction::Clrwdt,
            "IORLW" => Instruction::Iorlw { k: literal()? },
            "MOVLW" => Instruction::Movlw { k: literal()? },
            "RETLW" => Instruction::Retlw { k: literal()? },
            "SUBLW" => Instruction::Sublw { k: literal()? },
            "XORLW" => Instruction::Xorlw { k: literal()? },

            // Control
            "CALL" => Instruction::Call { target: target()? },
            "GOTO" => Instruction::Goto { target: target()? },
            "RETFIE" => Instruction::Retfie,
            "RETURN" => Instruction::Return,
            "SLEEP" => Instruction::Sleep,

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        Ok(encode(&instr))
    }

    /// Evaluate `term (('+' | '-') term)*`.
    fn parse_value(&self, expr: &str, line_num: usize) -> Result<i32, AssemblerError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: "missing operand".into(),
            });
        }

        let mut total: i32 = 0;
        let mut sign = 1;
        let mut start = 0;
        let bytes = expr.as_bytes();
        for i in 0..=bytes.len() {
            let at_op = i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') && !in_quotes(expr, i);
            if i == bytes.len() || at_op {
                let term = expr[start..i].trim();
                if term.is_empty() {
                    // leading unary sign
                    if i == 0 || expr[..i].trim().is_empty() {
                        if i < bytes.len() && bytes[i] == b'-' {
                            sign = -sign;
                        }
                        start = i + 1;
                        continue;
                    }
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("malformed expression '{}'", expr),
                    });
                }
                total = total.wrapping_add(sign * self.parse_term(term, line_num)?);
                if i < bytes.len() {
                    sign = if bytes[i] == b'-' { -1 } else { 1 };
                }
                start = i + 1;
            }
        }

        Ok(total)
    }

    fn parse_term(&self, term: &str, line_num: usize) -> Result<i32, AssemblerError> {
        let bad = |what: &str| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid {} literal '{}'", what, term),
        };
        let upper = term.to_uppercase();

        if let Some(hex) = upper.strip_prefix("0X") {
            return i32::from_str_radix(hex, 16).map_err(|_| bad("hex"));
        }
        if let Some(body) = quoted(&upper, 'H') {
            return i32::from_str_radix(body, 16).map_err(|_| bad("hex"));
        }
        if let Some(body) = quoted(&upper, 'B') {
            return i32::from_str_radix(body, 2).map_err(|_| bad("binary"));
        }
        if let Some(body) = quoted(&upper, 'D') {
            return body.parse::<i32>().map_err(|_| bad("decimal"));
        }
        if upper.starts_with(|c: char| c.is_ascii_digit()) {
            return upper.parse::<i32>().map_err(|_| bad("decimal"));
        }

        self.symbols
            .get(&upper)
            .copied()
            .ok_or_else(|| AssemblerError::UndefinedLabel {
                line: line_num,
                label: upper,
            })
    }
}

/// Every mnemonic and word-emitting directive.
fn is_mnemonic(s: &str) -> bool {
    matches!(
        s,
        "ADDWF" | "ANDWF" | "CLRF" | "CLRW" | "COMF" | "DECF" | "DECFSZ" | "INCF" | "INCFSZ"
            | "IORWF" | "MOVF" | "MOVWF" | "NOP" | "RLF" | "RRF" | "SUBWF" | "SWAPF" | "XORWF"
            | "BCF" | "BSF" | "BTFSC" | "BTFSS" | "ADDLW" | "ANDLW" | "CLRWDT" | "IORLW"
            | "MOVLW" | "RETLW" | "SUBLW" | "XORLW" | "CALL" | "GOTO" | "RETFIE" | "RETURN"
            | "SLEEP" | "DW" | "ORG" | "END"
    )
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// If `s` starts with `keyword` as a whole word, return what follows.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &s[keyword.len()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Body of a radix literal such as `H'1F'`.
fn quoted(upper: &str, radix: char) -> Option<&str> {
    upper
        .strip_prefix(radix)?
        .strip_prefix('\'')?
        .strip_suffix('\'')
}

fn in_quotes(expr: &str, idx: usize) -> bool {
    expr[..idx].matches('\'').count() % 2 == 1
}

fn expect_operand<'a>(
    operands: &'a [String],
    idx: usize,
    mnemonic: &str,
    line_num: usize,
) -> Result<&'a str, AssemblerError> {
    operands
        .get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("{} requires operand {}", mnemonic, idx + 1),
        })
}

fn check_range(value: i32, min: i32, max: i32, line: usize) -> Result<i32, AssemblerError> {
    if value < min || value > max {
        Err(AssemblerError::ValueOutOfRange { line, value })
    } else {
        Ok(value)
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("symbol defined twice on line {line}: {symbol}")]
    DuplicateSymbol { line: usize, symbol: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::decode;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            MOVLW 0x05
            ADDWF 0x20, W
            MOVWF 0x21
            SLEEP
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x3005, 0x0720, 0x00A1, 0x0063]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        START:
            MOVLW 3
            GOTO END_
            NOP
        END_:
            SLEEP
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(decode(result[1]).unwrap(), Instruction::Goto { target: 6 });
    }

    #[test]
    fn test_column0_label_and_equ() {
        let source = "\
COUNT   EQU 0x20
        MOVLW 2
        MOVWF COUNT
LOOP    DECFSZ COUNT, F
        GOTO LOOP
        SLEEP
";
        let result = assemble(source).unwrap();
        assert_eq!(decode(result[1]).unwrap(), Instruction::Movwf { f: 0x20 });
        assert_eq!(decode(result[2]).unwrap(), Instruction::Decfsz { f: 0x20, d: Dest::F });
        assert_eq!(decode(result[3]).unwrap(), Instruction::Goto { target: 4 });
    }

    #[test]
    fn test_predefined_symbols() {
        let source = r#"
            BSF STATUS, C
            BTFSS STATUS, Z
            MOVF FSR, W
            INCF INDF
        "#;
        let result = assemble(source).unwrap();
        assert_eq!(decode(result[0]).unwrap(), Instruction::Bsf { f: 0x03, b: 0 });
        assert_eq!(decode(result[1]).unwrap(), Instruction::Btfss { f: 0x03, b: 2 });
        assert_eq!(decode(result[2]).unwrap(), Instruction::Movf { f: 0x04, d: Dest::W });
        assert_eq!(decode(result[3]).unwrap(), Instruction::Incf { f: 0x00, d: Dest::F });
    }

    #[test]
    fn test_number_formats() {
        let source = r#"
            MOVLW h'1F'
            MOVLW b'1010'
            MOVLW d'10'
            MOVLW -1
            MOVLW 0x10 + 2
        "#;
        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x301F, 0x300A, 0x300A, 0x30FF, 0x3012]);
    }

    #[test]
    fn test_org_fills_gaps_with_nop() {
        let source = r#"
            GOTO MAIN
            ORG 4
        MAIN:
            SLEEP
            DW 0x3FFF
        "#;
        let result = assemble(source).unwrap();
        assert_eq!(result.len(), 6);
        assert_eq!(decode(result[0]).unwrap(), Instruction::Goto { target: 8 });
        assert_eq!(&result[1..4], &[0, 0, 0]);
        assert_eq!(result[5], 0x3FFF);
    }

    #[test]
    fn test_end_stops_assembly() {
        let result = assemble("NOP\n END\n BOGUS 1").unwrap();
        assert_eq!(result, vec![0x0000]);
    }

    #[test]
    fn test_errors_carry_line() {
        assert_eq!(
            assemble("NOP\n  FROB 1"),
            Err(AssemblerError::UnknownMnemonic { line: 2, mnemonic: "FROB".into() })
        );
        assert_eq!(
            assemble("  GOTO NOWHERE"),
            Err(AssemblerError::UndefinedLabel { line: 1, label: "NOWHERE".into() })
        );
        assert_eq!(
            assemble("  BSF 0x20, 8"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 8 })
        );
        assert_eq!(
            assemble("  MOVLW 256"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 256 })
        );
        assert!(matches!(
            assemble("  ADDWF"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("X EQU 1\nX EQU 2"),
            Err(AssemblerError::DuplicateSymbol { line: 2, .. })
        ));
    }
}
