//! Bit-addressable shadow of the STATUS register.
//!
//! STATUS lives in the register file, which is only byte-addressable. A
//! behavior that touches flags loads the mirror, flips bits on it, and
//! stores it back once, so STATUS never holds a half-updated value.

use crate::cpu::regfile::{RegisterFile, STATUS};
use serde::{Serialize, Deserialize};

/// Carry / not-borrow.
pub const C: u8 = 0;
/// Digit carry / not-digit-borrow.
pub const DC: u8 = 1;
/// Zero.
pub const Z: u8 = 2;
/// Power-down.
pub const PD: u8 = 3;
/// Time-out.
pub const TO: u8 = 4;
pub const RP0: u8 = 5;
pub const RP1: u8 = 6;
pub const IRP: u8 = 7;

/// STATUS bit names, in bit order.
pub const STATUS_BIT_NAMES: [(&str, u8); 8] = [
    ("C", C),
    ("DC", DC),
    ("Z", Z),
    ("PD", PD),
    ("TO", TO),
    ("RP0", RP0),
    ("RP1", RP1),
    ("IRP", IRP),
];

/// Local copy of STATUS.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusMirror(u8);

impl StatusMirror {
    /// Build a mirror from a raw STATUS byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw STATUS byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Load the mirror from the STATUS cell.
    #[inline]
    pub fn load_from<R: RegisterFile + ?Sized>(&mut self, regs: &R) {
        self.0 = regs.read(STATUS);
    }

    /// Store the mirror into the STATUS cell.
    #[inline]
    pub fn store_to<R: RegisterFile + ?Sized>(self, regs: &mut R) {
        regs.write(STATUS, self.0);
    }

    #[inline]
    pub fn get(self, bit: u8) -> bool {
        self.0 & (1 << bit) != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    pub fn carry(self) -> bool {
        self.get(C)
    }

    pub fn set_carry(&mut self, value: bool) {
        self.set(C, value);
    }

    pub fn digit_carry(self) -> bool {
        self.get(DC)
    }

    pub fn set_digit_carry(&mut self, value: bool) {
        self.set(DC, value);
    }

    pub fn zero(self) -> bool {
        self.get(Z)
    }

    pub fn set_zero(&mut self, value: bool) {
        self.set(Z, value);
    }
}

impl std::fmt::Debug for StatusMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "STATUS={:#04x} [Z={} DC={} C={}]",
            self.0,
            self.zero() as u8,
            self.digit_carry() as u8,
            self.carry() as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::regfile::RegisterBank;

    #[test]
    fn test_bits_independent() {
        let mut status = StatusMirror::default();
        status.set_carry(true);
        status.set_zero(true);
        assert!(status.carry());
        assert!(!status.digit_carry());
        assert!(status.zero());
        assert_eq!(status.bits(), 0b101);

        status.set_carry(false);
        assert_eq!(status.bits(), 0b100);
    }

    #[test]
    fn test_load_and_store() {
        let mut regs = RegisterBank::new();
        regs.write(STATUS, 0x18);

        let mut status = StatusMirror::default();
        status.load_from(&regs);
        assert_eq!(status.bits(), 0x18);

        status.set_digit_carry(true);
        // not visible until stored
        assert_eq!(regs.read(STATUS), 0x18);
        status.store_to(&mut regs);
        assert_eq!(regs.read(STATUS), 0x1A);
    }

    #[test]
    fn test_upper_bits_preserved() {
        let mut status = StatusMirror::from_bits(0xF8);
        status.set_zero(true);
        status.set_carry(true);
        assert_eq!(status.bits(), 0xFD);
    }
}
