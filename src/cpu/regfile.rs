//! PIC16F84 register file and the register access layer.
//!
//! The data memory seen by instructions is a flat array of 128 byte-wide
//! cells (bank 0 only). A handful of low addresses are special-function
//! registers; the core only gives INDF, STATUS and FSR special meaning.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of addressable register-file cells.
pub const REGISTER_FILE_SIZE: usize = 128;

// Special-function registers in bank 0.
pub const INDF: u8 = 0x00;
pub const TMR0: u8 = 0x01;
pub const PCL: u8 = 0x02;
pub const STATUS: u8 = 0x03;
pub const FSR: u8 = 0x04;
pub const PORTA: u8 = 0x05;
pub const PORTB: u8 = 0x06;
pub const EEDATA: u8 = 0x08;
pub const EEADR: u8 = 0x09;
pub const PCLATH: u8 = 0x0A;
pub const INTCON: u8 = 0x0B;

/// Named SFRs, in address order. Used by the assembler and debugger.
pub const SFR_NAMES: [(&str, u8); 11] = [
    ("INDF", INDF),
    ("TMR0", TMR0),
    ("PCL", PCL),
    ("STATUS", STATUS),
    ("FSR", FSR),
    ("PORTA", PORTA),
    ("PORTB", PORTB),
    ("EEDATA", EEDATA),
    ("EEADR", EEADR),
    ("PCLATH", PCLATH),
    ("INTCON", INTCON),
];

/// Byte-addressable storage behind the register access layer.
///
/// Implementors only provide raw cell access. The provided `read` and
/// `write` methods apply INDF indirection and are what instruction
/// behaviors use.
pub trait RegisterFile {
    /// Read a cell without indirection.
    fn read_raw(&self, addr: u8) -> u8;

    /// Write a cell without indirection.
    fn write_raw(&mut self, addr: u8, value: u8);

    /// Resolve INDF through FSR. Resolution happens once: an FSR holding 0
    /// selects cell 0 itself.
    #[inline]
    fn resolve(&self, addr: u8) -> u8 {
        if addr == INDF {
            self.read_raw(FSR)
        } else {
            addr
        }
    }

    /// Read a register, following indirection.
    #[inline]
    fn read(&self, addr: u8) -> u8 {
        self.read_raw(self.resolve(addr))
    }

    /// Write a register, following indirection.
    #[inline]
    fn write(&mut self, addr: u8, value: u8) {
        let target = self.resolve(addr);
        self.write_raw(target, value);
    }
}

/// In-memory register file of 128 cells.
///
/// Addresses are masked to 7 bits, so an FSR value with bit 7 set still
/// lands inside bank 0.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BankSnapshot")]
pub struct RegisterBank {
    cells: Vec<u8>,
}

#[derive(Deserialize)]
struct BankSnapshot {
    cells: Vec<u8>,
}

/// A serialized register file of the wrong size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("register file holds {0} cells, expected 128")]
pub struct BankSizeError(pub usize);

impl TryFrom<BankSnapshot> for RegisterBank {
    type Error = BankSizeError;

    fn try_from(snapshot: BankSnapshot) -> Result<Self, Self::Error> {
        if snapshot.cells.len() != REGISTER_FILE_SIZE {
            return Err(BankSizeError(snapshot.cells.len()));
        }
        Ok(Self { cells: snapshot.cells })
    }
}

impl RegisterBank {
    /// Create a register file with every cell zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; REGISTER_FILE_SIZE],
        }
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// All cells, in address order.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Dump a range of cells (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = start.saturating_add(count).min(REGISTER_FILE_SIZE);
        (start..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }

    #[inline]
    fn index(addr: u8) -> usize {
        (addr as usize) & (REGISTER_FILE_SIZE - 1)
    }
}

impl RegisterFile for RegisterBank {
    #[inline]
    fn read_raw(&self, addr: u8) -> u8 {
        self.cells[Self::index(addr)]
    }

    #[inline]
    fn write_raw(&mut self, addr: u8, value: u8) {
        self.cells[Self::index(addr)] = value;
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&c| c != 0).count();
        f.debug_struct("RegisterBank")
            .field("status", &format_args!("{:#04x}", self.cells[STATUS as usize]))
            .field("fsr", &format_args!("{:#04x}", self.cells[FSR as usize]))
            .field("non_zero_cells", &non_zero)
            .finish()
    }
}

/// Look up the SFR name for an address, if it has one.
pub fn sfr_name(addr: u8) -> Option<&'static str> {
    SFR_NAMES
        .iter()
        .find(|(_, a)| *a == addr)
        .map(|(name, _)| *name)
}
