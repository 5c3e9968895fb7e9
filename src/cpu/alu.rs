//! ALU flag arithmetic.
//!
//! Pure helpers computing the carry and digit-carry outputs of the 8-bit
//! ALU. Subtraction follows the PIC convention: C and DC are *not borrow*
//! flags, so C = 1 means the subtraction did not need to borrow.

/// Carry out of bit 7 for `a + b`.
#[inline]
pub fn carry_out(a: u8, b: u8) -> bool {
    a as u16 + b as u16 > 0xFF
}

/// Carry out of bit 3 for `a + b`.
#[inline]
pub fn digit_carry_out(a: u8, b: u8) -> bool {
    (a & 0x0F) + (b & 0x0F) >= 0x10
}

/// True when `a - b` needs no borrow.
#[inline]
pub fn not_borrow(a: u8, b: u8) -> bool {
    a >= b
}

/// True when the low-nibble subtraction of `a - b` needs no borrow.
#[inline]
pub fn not_digit_borrow(a: u8, b: u8) -> bool {
    not_borrow(a << 4, b << 4)
}

/// Swap the high and low nibbles of a byte.
#[inline]
pub fn swap_nibbles(value: u8) -> u8 {
    value.rotate_left(4)
}

/// Rotate left through carry. Returns `(result, carry_out)`.
#[inline]
pub fn rotate_left_through_carry(value: u8, carry_in: bool) -> (u8, bool) {
    ((value << 1) | carry_in as u8, value & 0x80 != 0)
}

/// Rotate right through carry. Returns `(result, carry_out)`.
#[inline]
pub fn rotate_right_through_carry(value: u8, carry_in: bool) -> (u8, bool) {
    ((value >> 1) | ((carry_in as u8) << 7), value & 0x01 != 0)
}
