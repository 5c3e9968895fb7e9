//! Instruction behaviors of the PIC16F84 core.
//!
//! `Core` owns the accumulator, program counter, call stack and status
//! mirror, and reaches the register file only through [`RegisterFile`].
//! A driver calls [`Core::pre_step`] once per instruction and then one
//! behavior (directly, or through [`Core::execute`]).
//!
//! Every behavior is total: none of them can fail.

use crate::cpu::alu::{
    carry_out, digit_carry_out, not_borrow, not_digit_borrow, rotate_left_through_carry,
    rotate_right_through_carry, swap_nibbles,
};
use crate::cpu::decode::{Dest, Instruction};
use crate::cpu::regfile::{RegisterBank, RegisterFile};
use crate::cpu::stack::CallStack;
use crate::cpu::status::StatusMirror;
use log::trace;
use serde::{Serialize, Deserialize};

/// Program counter step for one instruction word.
pub const PC_STEP: u16 = 2;

/// Execution core: visible processor state plus instruction behaviors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Core<R = RegisterBank> {
    /// Register file storage.
    pub regs: R,
    /// Return-address stack.
    pub stack: CallStack,
    w: u8,
    pc: u16,
    status: StatusMirror,
}

impl<R: RegisterFile> Core<R> {
    /// Create a core on top of a register file. W and PC start at zero.
    pub fn new(regs: R) -> Self {
        let mut core = Self {
            regs,
            stack: CallStack::new(),
            w: 0,
            pc: 0,
            status: StatusMirror::default(),
        };
        core.refresh_status();
        core
    }

    /// Accumulator.
    pub fn w(&self) -> u8 {
        self.w
    }

    pub fn set_w(&mut self, value: u8) {
        self.w = value;
    }

    /// Program counter (address of the next instruction to fetch).
    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    /// Current status mirror. Matches STATUS between instructions.
    pub fn status(&self) -> StatusMirror {
        self.status
    }

    /// Read a register through the access layer (INDF indirection applies).
    #[inline]
    pub fn read(&self, f: u8) -> u8 {
        self.regs.read(f)
    }

    /// Write a register through the access layer (INDF indirection applies).
    #[inline]
    pub fn write(&mut self, f: u8, value: u8) {
        self.regs.write(f, value);
    }

    /// Load the status mirror from STATUS.
    #[inline]
    pub fn refresh_status(&mut self) {
        self.status.load_from(&self.regs);
    }

    /// Store the status mirror into STATUS.
    #[inline]
    pub fn commit_status(&mut self) {
        self.status.store_to(&mut self.regs);
    }

    /// Generic per-instruction step: advance PC past the current word and
    /// refresh the status mirror.
    pub fn pre_step(&mut self) {
        self.pc = self.pc.wrapping_add(PC_STEP);
        self.refresh_status();
    }

    /// Run the behavior for a decoded instruction.
    pub fn execute(&mut self, instr: Instruction) {
        match instr {
            Instruction::Addwf { f, d } => self.addwf(f, d),
            Instruction::Andwf { f, d } => self.andwf(f, d),
            Instruction::Clrf { f } => self.clrf(f),
            Instruction::Clrw => self.clrw(),
            Instruction::Comf { f, d } => self.comf(f, d),
            Instruction::Decf { f, d } => self.decf(f, d),
            Instruction::Decfsz { f, d } => self.decfsz(f, d),
            Instruction::Incf { f, d } => self.incf(f, d),
            Instruction::Incfsz { f, d } => self.incfsz(f, d),
            Instruction::Iorwf { f, d } => self.iorwf(f, d),
            Instruction::Movf { f, d } => self.movf(f, d),
            Instruction::Movwf { f } => self.movwf(f),
            Instruction::Nop => self.nop(),
            Instruction::Rlf { f, d } => self.rlf(f, d),
            Instruction::Rrf { f, d } => self.rrf(f, d),
            Instruction::Subwf { f, d } => self.subwf(f, d),
            Instruction::Swapf { f, d } => self.swapf(f, d),
            Instruction::Xorwf { f, d } => self.xorwf(f, d),

            Instruction::Bcf { f, b } => self.bcf(f, b),
            Instruction::Bsf { f, b } => self.bsf(f, b),
            Instruction::Btfsc { f, b } => self.btfsc(f, b),
            Instruction::Btfss { f, b } => self.btfss(f, b),

            Instruction::Addlw { k } => self.addlw(k),
            Instruction::Andlw { k } => self.andlw(k),
            Instruction::Clrwdt => self.clrwdt(),
            Instruction::Iorlw { k } => self.iorlw(k),
            Instruction::Movlw { k } => self.movlw(k),
            Instruction::Retlw { k } => self.retlw(k),
            Instruction::Sublw { k } => self.sublw(k),
            Instruction::Xorlw { k } => self.xorlw(k),

            Instruction::Call { target } => self.call(target),
            Instruction::Goto { target } => self.goto(target),
            Instruction::Retfie => self.retfie(),
            Instruction::Return => self.ret(),
            Instruction::Sleep => self.sleep(),
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Route a result to W or back to `f`.
    #[inline]
    fn store(&mut self, f: u8, d: Dest, value: u8) {
        match d {
            Dest::W => self.w = value,
            Dest::F => self.write(f, value),
        }
    }

    /// Skip the next instruction word.
    #[inline]
    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(PC_STEP);
    }

    /// Set Z from a result and commit the mirror.
    #[inline]
    fn commit_zero(&mut self, result: u8) {
        self.status.set_zero(result == 0);
        self.commit_status();
    }

    // ---------------------------------------------------------------------
    // Byte-oriented file register operations
    // ---------------------------------------------------------------------

    /// `W + f`. Sets C, DC and Z.
    pub fn addwf(&mut self, f: u8, d: Dest) {
        let value = self.read(f);
        let result = value.wrapping_add(self.w);
        self.status.set_carry(carry_out(value, self.w));
        self.status.set_digit_carry(digit_carry_out(value, self.w));
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("ADDWF {:#04x},{:?} -> {:#04x} {:?}", f, d, result, self.status);
    }

    /// `W & f`. Sets Z.
    pub fn andwf(&mut self, f: u8, d: Dest) {
        let result = self.w & self.read(f);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("ANDWF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// Clear `f` and set Z.
    pub fn clrf(&mut self, f: u8) {
        self.write(f, 0);
        self.status.set_zero(true);
        self.commit_status();
        trace!("CLRF {:#04x}", f);
    }

    /// Clear W and set Z.
    pub fn clrw(&mut self) {
        self.w = 0;
        self.status.set_zero(true);
        self.commit_status();
        trace!("CLRW");
    }

    /// Complement `f`. Sets Z.
    pub fn comf(&mut self, f: u8, d: Dest) {
        let result = !self.read(f);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("COMF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// `f - 1`. Sets Z.
    pub fn decf(&mut self, f: u8, d: Dest) {
        let result = self.read(f).wrapping_sub(1);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("DECF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// Decrement; skip the next instruction when the result is zero.
    /// Flags are untouched.
    pub fn decfsz(&mut self, f: u8, d: Dest) {
        let result = self.read(f).wrapping_sub(1);
        self.store(f, d, result);
        if result == 0 {
            self.skip();
        }
        trace!("DECFSZ {:#04x},{:?} -> {:#04x} skip={}", f, d, result, result == 0);
    }

    /// `f + 1`. Sets Z.
    pub fn incf(&mut self, f: u8, d: Dest) {
        let result = self.read(f).wrapping_add(1);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("INCF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// Increment; skip the next instruction when the result is zero.
    /// Flags are untouched.
    pub fn incfsz(&mut self, f: u8, d: Dest) {
        let result = self.read(f).wrapping_add(1);
        self.store(f, d, result);
        if result == 0 {
            self.skip();
        }
        trace!("INCFSZ {:#04x},{:?} -> {:#04x} skip={}", f, d, result, result == 0);
    }

    /// `W | f`. Sets Z.
    pub fn iorwf(&mut self, f: u8, d: Dest) {
        let result = self.w | self.read(f);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("IORWF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// Move `f`. Sets Z, so `MOVF f,F` tests `f` for zero.
    pub fn movf(&mut self, f: u8, d: Dest) {
        let result = self.read(f);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("MOVF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// Copy W into `f`.
    pub fn movwf(&mut self, f: u8) {
        self.write(f, self.w);
        trace!("MOVWF {:#04x} <- {:#04x}", f, self.w);
    }

    /// No operation.
    pub fn nop(&mut self) {
        trace!("NOP");
    }

    /// Rotate left through carry. Only C changes.
    pub fn rlf(&mut self, f: u8, d: Dest) {
        self.refresh_status();
        let (result, carry) = rotate_left_through_carry(self.read(f), self.status.carry());
        self.store(f, d, result);
        self.status.set_carry(carry);
        self.commit_status();
        trace!("RLF {:#04x},{:?} -> {:#04x} C={}", f, d, result, carry as u8);
    }

    /// Rotate right through carry. Only C changes.
    pub fn rrf(&mut self, f: u8, d: Dest) {
        self.refresh_status();
        let (result, carry) = rotate_right_through_carry(self.read(f), self.status.carry());
        self.store(f, d, result);
        self.status.set_carry(carry);
        self.commit_status();
        trace!("RRF {:#04x},{:?} -> {:#04x} C={}", f, d, result, carry as u8);
    }

    /// `f - W`. C and DC are not-borrow flags.
    pub fn subwf(&mut self, f: u8, d: Dest) {
        let value = self.read(f);
        let result = value.wrapping_sub(self.w);
        self.status.set_carry(not_borrow(value, self.w));
        self.status.set_digit_carry(not_digit_borrow(value, self.w));
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("SUBWF {:#04x},{:?} -> {:#04x} {:?}", f, d, result, self.status);
    }

    /// Exchange the nibbles of `f`. Flags are untouched.
    pub fn swapf(&mut self, f: u8, d: Dest) {
        let result = swap_nibbles(self.read(f));
        self.store(f, d, result);
        trace!("SWAPF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    /// `W ^ f`. Sets Z.
    pub fn xorwf(&mut self, f: u8, d: Dest) {
        let result = self.w ^ self.read(f);
        self.store(f, d, result);
        self.commit_zero(result);
        trace!("XORWF {:#04x},{:?} -> {:#04x}", f, d, result);
    }

    // ---------------------------------------------------------------------
    // Bit-oriented file register operations
    // ---------------------------------------------------------------------

    #[inline]
    fn bit_mask(b: u8) -> u8 {
        1 << (b & 0x7)
    }

    /// Clear bit `b` of `f`.
    pub fn bcf(&mut self, f: u8, b: u8) {
        let result = self.read(f) & !Self::bit_mask(b);
        self.write(f, result);
        trace!("BCF {:#04x},{} -> {:#04x}", f, b, result);
    }

    /// Set bit `b` of `f`.
    pub fn bsf(&mut self, f: u8, b: u8) {
        let result = self.read(f) | Self::bit_mask(b);
        self.write(f, result);
        trace!("BSF {:#04x},{} -> {:#04x}", f, b, result);
    }

    /// Skip the next instruction if bit `b` of `f` is clear.
    pub fn btfsc(&mut self, f: u8, b: u8) {
        let clear = self.read(f) & Self::bit_mask(b) == 0;
        if clear {
            self.skip();
        }
        trace!("BTFSC {:#04x},{} skip={}", f, b, clear);
    }

    /// Skip the next instruction if bit `b` of `f` is set.
    pub fn btfss(&mut self, f: u8, b: u8) {
        let set = self.read(f) & Self::bit_mask(b) != 0;
        if set {
            self.skip();
        }
        trace!("BTFSS {:#04x},{} skip={}", f, b, set);
    }

    // ---------------------------------------------------------------------
    // Literal operations
    // ---------------------------------------------------------------------

    /// `W + k`. Sets C, DC and Z.
    pub fn addlw(&mut self, k: u8) {
        let result = self.w.wrapping_add(k);
        self.status.set_carry(carry_out(self.w, k));
        self.status.set_digit_carry(digit_carry_out(self.w, k));
        self.w = result;
        self.commit_zero(result);
        trace!("ADDLW {:#04x} -> {:#04x} {:?}", k, result, self.status);
    }

    /// `W & k`. Sets Z.
    pub fn andlw(&mut self, k: u8) {
        let result = self.w & k;
        self.w = result;
        self.commit_zero(result);
        trace!("ANDLW {:#04x} -> {:#04x}", k, result);
    }

    /// Watchdog is not modeled.
    pub fn clrwdt(&mut self) {
        trace!("CLRWDT");
    }

    /// `W | k`. Sets Z.
    pub fn iorlw(&mut self, k: u8) {
        let result = self.w | k;
        self.w = result;
        self.commit_zero(result);
        trace!("IORLW {:#04x} -> {:#04x}", k, result);
    }

    /// Load W with `k`.
    pub fn movlw(&mut self, k: u8) {
        self.w = k;
        trace!("MOVLW {:#04x}", k);
    }

    /// Load W with `k` and return from subroutine.
    pub fn retlw(&mut self, k: u8) {
        self.w = k;
        self.pc = self.stack.pop();
        trace!("RETLW {:#04x} -> PC={:#06x}", k, self.pc);
    }

    /// `k - W`. C and DC are not-borrow flags.
    pub fn sublw(&mut self, k: u8) {
        let result = k.wrapping_sub(self.w);
        self.status.set_carry(not_borrow(k, self.w));
        self.status.set_digit_carry(not_digit_borrow(k, self.w));
        self.w = result;
        self.commit_zero(result);
        trace!("SUBLW {:#04x} -> {:#04x} {:?}", k, result, self.status);
    }

    /// `W ^ k`. Sets Z.
    pub fn xorlw(&mut self, k: u8) {
        let result = self.w ^ k;
        self.w = result;
        self.commit_zero(result);
        trace!("XORLW {:#04x} -> {:#04x}", k, result);
    }

    // ---------------------------------------------------------------------
    // Control operations
    // ---------------------------------------------------------------------

    /// Push the return address (the already-advanced PC) and jump.
    pub fn call(&mut self, target: u16) {
        self.stack.push(self.pc);
        self.pc = target;
        trace!("CALL {:#06x} return={:#06x}", target, self.stack.top());
    }

    /// Jump to a PC-scale target.
    pub fn goto(&mut self, target: u16) {
        self.pc = target;
        trace!("GOTO {:#06x}", target);
    }

    /// Interrupt return. Interrupt context is not modeled here.
    pub fn retfie(&mut self) {
        trace!("RETFIE PC={:#06x}", self.pc);
    }

    /// Return from subroutine.
    pub fn ret(&mut self) {
        self.pc = self.stack.pop();
        trace!("RETURN -> PC={:#06x}", self.pc);
    }

    /// Power-down is not modeled here.
    pub fn sleep(&mut self) {
        trace!("SLEEP");
    }
}

impl Default for Core<RegisterBank> {
    fn default() -> Self {
        Self::new(RegisterBank::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::regfile::{FSR, INDF, STATUS};
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Sparse register file, to exercise the core without `RegisterBank`.
    #[derive(Default)]
    struct SparseRegs(HashMap<u8, u8>);

    impl RegisterFile for SparseRegs {
        fn read_raw(&self, addr: u8) -> u8 {
            self.0.get(&addr).copied().unwrap_or(0)
        }

        fn write_raw(&mut self, addr: u8, value: u8) {
            self.0.insert(addr, value);
        }
    }

    fn step<R: RegisterFile>(core: &mut Core<R>, instr: Instruction) {
        core.pre_step();
        core.execute(instr);
    }

    fn flags<R: RegisterFile>(core: &Core<R>) -> (bool, bool, bool) {
        let status = StatusMirror::from_bits(core.regs.read(STATUS));
        (status.carry(), status.digit_carry(), status.zero())
    }

    #[test]
    fn test_pre_step_advances_pc_and_refreshes() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x04);
        core.pre_step();
        assert_eq!(core.pc(), 2);
        assert!(core.status().zero());
    }

    #[test]
    fn test_addwf_overflow_scenario() {
        let mut core = Core::default();
        core.set_w(0x05);
        core.regs.write(0x20, 0xFF);

        step(&mut core, Instruction::Addwf { f: 0x20, d: Dest::W });

        assert_eq!(core.w(), 0x04);
        assert_eq!(core.regs.read(0x20), 0xFF);
        assert_eq!(flags(&core), (true, true, false));
    }

    #[test]
    fn test_addwf_to_file_sets_zero() {
        let mut core = Core::default();
        core.set_w(0x80);
        core.regs.write(0x21, 0x80);

        step(&mut core, Instruction::Addwf { f: 0x21, d: Dest::F });

        assert_eq!(core.regs.read(0x21), 0x00);
        assert_eq!(core.w(), 0x80);
        assert_eq!(flags(&core), (true, false, true));
    }

    #[test]
    fn test_subwf_not_borrow_polarity() {
        let mut core = Core::default();
        core.set_w(0x03);
        core.regs.write(0x20, 0x05);
        step(&mut core, Instruction::Subwf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0x02);
        assert_eq!(flags(&core), (true, true, false));

        core.set_w(0x05);
        core.regs.write(0x20, 0x03);
        step(&mut core, Instruction::Subwf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0xFE);
        assert_eq!(flags(&core), (false, false, false));

        core.set_w(0x42);
        core.regs.write(0x20, 0x42);
        step(&mut core, Instruction::Subwf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x00);
        assert_eq!(flags(&core), (true, true, true));
    }

    #[test]
    fn test_sublw_is_k_minus_w() {
        let mut core = Core::default();
        core.set_w(0x01);
        step(&mut core, Instruction::Sublw { k: 0x10 });
        assert_eq!(core.w(), 0x0F);
        // 0x0 - 0x1 borrows in the low nibble, no borrow overall
        assert_eq!(flags(&core), (true, false, false));
    }

    #[test]
    fn test_addlw_flags() {
        let mut core = Core::default();
        core.set_w(0x0F);
        step(&mut core, Instruction::Addlw { k: 0x01 });
        assert_eq!(core.w(), 0x10);
        assert_eq!(flags(&core), (false, true, false));

        core.set_w(0xF0);
        step(&mut core, Instruction::Addlw { k: 0x10 });
        assert_eq!(core.w(), 0x00);
        assert_eq!(flags(&core), (true, false, true));
    }

    #[test]
    fn test_logic_ops_set_zero_only() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x03); // C and DC set
        core.set_w(0xF0);
        core.regs.write(0x20, 0x0F);

        step(&mut core, Instruction::Andwf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x00);
        assert_eq!(flags(&core), (true, true, true));

        core.set_w(0xF0);
        step(&mut core, Instruction::Iorwf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0xFF);
        assert_eq!(flags(&core), (true, true, false));

        step(&mut core, Instruction::Xorlw { k: 0xF0 });
        assert_eq!(core.w(), 0x00);
        assert!(flags(&core).2);

        step(&mut core, Instruction::Iorlw { k: 0x01 });
        step(&mut core, Instruction::Andlw { k: 0x01 });
        assert_eq!(core.w(), 0x01);
        assert!(!flags(&core).2);
    }

    #[test]
    fn test_clrf_idempotent() {
        let mut core = Core::default();
        core.regs.write(0x30, 0x99);

        step(&mut core, Instruction::Clrf { f: 0x30 });
        assert_eq!(core.regs.read(0x30), 0);
        assert!(flags(&core).2);

        step(&mut core, Instruction::Clrf { f: 0x30 });
        assert_eq!(core.regs.read(0x30), 0);
        assert!(flags(&core).2);
    }

    #[test]
    fn test_clrw_forces_zero() {
        let mut core = Core::default();
        core.set_w(0x55);
        step(&mut core, Instruction::Clrw);
        assert_eq!(core.w(), 0);
        assert!(flags(&core).2);
    }

    #[test]
    fn test_comf_incf_decf() {
        let mut core = Core::default();
        core.regs.write(0x20, 0xFF);

        step(&mut core, Instruction::Comf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x00);
        assert!(flags(&core).2);

        step(&mut core, Instruction::Incf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0x00);
        assert!(flags(&core).2);

        step(&mut core, Instruction::Decf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0xFF);
        assert!(!flags(&core).2);
    }

    #[test]
    fn test_decfsz_wraps_without_skip() {
        let mut core = Core::default();
        core.set_pc(0x40);
        core.regs.write(0x10, 0x00);
        step(&mut core, Instruction::Decfsz { f: 0x10, d: Dest::F });
        assert_eq!(core.regs.read(0x10), 0xFF);
        assert_eq!(core.pc(), 0x42);
    }

    #[test]
    fn test_decfsz_skips_on_zero() {
        let mut core = Core::default();
        core.set_pc(0x40);
        core.regs.write(0x10, 0x01);
        step(&mut core, Instruction::Decfsz { f: 0x10, d: Dest::F });
        assert_eq!(core.regs.read(0x10), 0x00);
        assert_eq!(core.pc(), 0x44);
        // skip instructions leave Z alone
        assert!(!flags(&core).2);
    }

    #[test]
    fn test_incfsz_to_w() {
        let mut core = Core::default();
        core.regs.write(0x10, 0xFF);
        step(&mut core, Instruction::Incfsz { f: 0x10, d: Dest::W });
        assert_eq!(core.w(), 0x00);
        assert_eq!(core.regs.read(0x10), 0xFF);
        assert_eq!(core.pc(), 4);
    }

    #[test]
    fn test_incfsz_to_file_wraps_and_skips() {
        let mut core = Core::default();
        core.set_pc(0x10);
        core.regs.write(0x21, 0xFF);
        step(&mut core, Instruction::Incfsz { f: 0x21, d: Dest::F });
        assert_eq!(core.regs.read(0x21), 0x00);
        assert_eq!(core.pc(), 0x14);

        step(&mut core, Instruction::Incfsz { f: 0x21, d: Dest::F });
        assert_eq!(core.regs.read(0x21), 0x01);
        assert_eq!(core.pc(), 0x16);
    }

    #[test]
    fn test_movwf_movf_roundtrip() {
        let mut core = Core::default();
        core.set_w(0x00);
        step(&mut core, Instruction::Movwf { f: 0x22 });
        core.set_w(0xAA);
        step(&mut core, Instruction::Movf { f: 0x22, d: Dest::W });
        assert_eq!(core.w(), 0x00);
        assert!(flags(&core).2);
    }

    #[test]
    fn test_movwf_leaves_flags() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x07);
        core.set_w(0x00);
        step(&mut core, Instruction::Movwf { f: 0x20 });
        assert_eq!(flags(&core), (true, true, true));
    }

    #[test]
    fn test_rlf_rrf_through_carry() {
        let mut core = Core::default();
        core.regs.write(0x20, 0x81);

        step(&mut core, Instruction::Rlf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0x02);
        assert!(flags(&core).0);

        step(&mut core, Instruction::Rlf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0x05);
        assert!(!flags(&core).0);

        step(&mut core, Instruction::Rrf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x02);
        assert!(flags(&core).0);
    }

    #[test]
    fn test_rotates_leave_zero_flag() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x04);
        core.regs.write(0x20, 0x40);
        step(&mut core, Instruction::Rlf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0x80);
        assert!(flags(&core).2);
    }

    #[test]
    fn test_swapf() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x00);
        core.regs.write(0x20, 0xA5);
        step(&mut core, Instruction::Swapf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x5A);
        assert_eq!(flags(&core), (false, false, false));
    }

    #[test]
    fn test_swapf_to_file() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x04);
        core.regs.write(0x20, 0x3C);
        core.set_w(0x11);
        step(&mut core, Instruction::Swapf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0xC3);
        assert_eq!(core.w(), 0x11);
        assert_eq!(flags(&core), (false, false, true));
    }

    #[test]
    fn test_xorwf_to_w() {
        let mut core = Core::default();
        core.regs.write(0x20, 0x5A);
        core.set_w(0x5A);
        step(&mut core, Instruction::Xorwf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x00);
        assert_eq!(core.regs.read(0x20), 0x5A);
        assert!(flags(&core).2);
    }

    #[test]
    fn test_xorwf_to_file() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x04);
        core.regs.write(0x20, 0xF0);
        core.set_w(0x3C);
        step(&mut core, Instruction::Xorwf { f: 0x20, d: Dest::F });
        assert_eq!(core.regs.read(0x20), 0xCC);
        assert_eq!(core.w(), 0x3C);
        assert!(!flags(&core).2);
    }

    #[test]
    fn test_bit_ops() {
        let mut core = Core::default();
        core.regs.write(0x20, 0x00);

        step(&mut core, Instruction::Bsf { f: 0x20, b: 7 });
        assert_eq!(core.regs.read(0x20), 0x80);

        step(&mut core, Instruction::Bsf { f: 0x20, b: 0 });
        step(&mut core, Instruction::Bcf { f: 0x20, b: 7 });
        assert_eq!(core.regs.read(0x20), 0x01);
    }

    #[test]
    fn test_bit_tests_skip() {
        let mut core = Core::default();
        core.regs.write(0x20, 0x01);

        step(&mut core, Instruction::Btfss { f: 0x20, b: 0 });
        assert_eq!(core.pc(), 4);
        step(&mut core, Instruction::Btfsc { f: 0x20, b: 0 });
        assert_eq!(core.pc(), 6);
        step(&mut core, Instruction::Btfsc { f: 0x20, b: 1 });
        assert_eq!(core.pc(), 10);
        step(&mut core, Instruction::Btfss { f: 0x20, b: 1 });
        assert_eq!(core.pc(), 12);
    }

    #[test]
    fn test_bsf_on_status_survives_next_instruction() {
        let mut core = Core::default();
        step(&mut core, Instruction::Bsf { f: STATUS, b: 0 });
        step(&mut core, Instruction::Movlw { k: 0x80 });
        step(&mut core, Instruction::Rlf { f: 0x20, d: Dest::W });
        // carry set by BSF rotated in
        assert_eq!(core.w(), 0x01);
    }

    #[test]
    fn test_indirect_through_fsr() {
        let mut core = Core::default();
        core.regs.write(FSR, 0x2A);
        core.set_w(0x33);
        step(&mut core, Instruction::Movwf { f: INDF });
        assert_eq!(core.regs.read(0x2A), 0x33);

        step(&mut core, Instruction::Incf { f: INDF, d: Dest::F });
        assert_eq!(core.regs.read(0x2A), 0x34);
    }

    #[test]
    fn test_flag_commit_wins_over_status_destination() {
        let mut core = Core::default();
        core.set_w(0x00);
        core.regs.write(STATUS, 0x00);
        // MOVF STATUS,F writes the old byte back, then commits Z
        step(&mut core, Instruction::Movf { f: STATUS, d: Dest::F });
        assert_eq!(core.regs.read(STATUS), 0x04);
    }

    #[test]
    fn test_literal_moves() {
        let mut core = Core::default();
        core.regs.write(STATUS, 0x00);
        step(&mut core, Instruction::Movlw { k: 0x00 });
        assert_eq!(core.w(), 0x00);
        // MOVLW does not touch Z
        assert!(!flags(&core).2);
    }

    #[test]
    fn test_call_and_return_scenario() {
        let mut core = Core::default();
        core.set_pc(0x010);
        step(&mut core, Instruction::Call { target: 0x100 });
        assert_eq!(core.stack.top(), 0x012);
        assert_eq!(core.pc(), 0x100);

        step(&mut core, Instruction::Return);
        assert_eq!(core.pc(), 0x012);
    }

    #[test]
    fn test_retlw_loads_w_and_returns() {
        let mut core = Core::default();
        core.set_pc(0x020);
        step(&mut core, Instruction::Call { target: 0x200 });
        step(&mut core, Instruction::Retlw { k: 0x7E });
        assert_eq!(core.w(), 0x7E);
        assert_eq!(core.pc(), 0x022);
    }

    #[test]
    fn test_goto_has_no_stack_effect() {
        let mut core = Core::default();
        step(&mut core, Instruction::Goto { target: 0x300 });
        assert_eq!(core.pc(), 0x300);
        assert_eq!(core.stack.index(), 0);
    }

    #[test]
    fn test_eight_nested_calls_return_in_order() {
        let mut core = Core::default();
        let mut expected = Vec::new();
        for level in 0..8u16 {
            core.set_pc(0x100 * (level + 1));
            step(&mut core, Instruction::Call { target: 0x800 });
            expected.push(0x100 * (level + 1) + 2);
        }
        for want in expected.into_iter().rev() {
            step(&mut core, Instruction::Return);
            assert_eq!(core.pc(), want);
        }
    }

    #[test]
    fn test_ninth_call_overwrites_oldest_return() {
        let mut core = Core::default();
        let mut returns = Vec::new();
        for level in 0..9u16 {
            core.set_pc(0x100 * (level + 1));
            step(&mut core, Instruction::Call { target: 0x800 });
            returns.push(0x100 * (level + 1) + 2);
        }

        let mut popped = Vec::new();
        for _ in 0..9 {
            step(&mut core, Instruction::Return);
            popped.push(core.pc());
        }

        // first eight returns unwind levels 9..=2
        let unwound: Vec<u16> = returns[1..].iter().rev().copied().collect();
        assert_eq!(&popped[..8], &unwound[..]);
        // the first call's return address is gone; its slot holds the ninth
        assert_eq!(popped[8], returns[8]);
        assert_ne!(popped[8], returns[0]);
    }

    #[test]
    fn test_no_op_behaviors() {
        let mut core = Core::default();
        core.set_w(0x12);
        core.regs.write(STATUS, 0x18);
        for instr in [Instruction::Nop, Instruction::Clrwdt, Instruction::Retfie, Instruction::Sleep] {
            let pc = core.pc();
            step(&mut core, instr);
            assert_eq!(core.pc(), pc + 2, "{:?}", instr);
        }
        assert_eq!(core.w(), 0x12);
        assert_eq!(core.regs.read(STATUS), 0x18);
        assert_eq!(core.stack.index(), 0);
    }

    #[test]
    fn test_core_over_custom_register_file() {
        let mut core = Core::new(SparseRegs::default());
        core.set_w(0x05);
        core.regs.write(0x20, 0xFF);
        step(&mut core, Instruction::Addwf { f: 0x20, d: Dest::W });
        assert_eq!(core.w(), 0x04);
        assert_eq!(flags(&core), (true, true, false));
    }

    proptest! {
        #[test]
        fn prop_movwf_movf_restores_w(value in any::<u8>(), addr in 0x0Cu8..0x50) {
            let mut core = Core::default();
            core.set_w(value);
            step(&mut core, Instruction::Movwf { f: addr });
            core.set_w(!value);
            step(&mut core, Instruction::Movf { f: addr, d: Dest::W });
            prop_assert_eq!(core.w(), value);
            prop_assert_eq!(flags(&core).2, value == 0);
        }

        #[test]
        fn prop_addwf_matches_alu(w in any::<u8>(), v in any::<u8>()) {
            let mut core = Core::default();
            core.set_w(w);
            core.regs.write(0x20, v);
            step(&mut core, Instruction::Addwf { f: 0x20, d: Dest::W });
            prop_assert_eq!(core.w(), w.wrapping_add(v));
            prop_assert_eq!(flags(&core), (carry_out(v, w), digit_carry_out(v, w), w.wrapping_add(v) == 0));
        }

        #[test]
        fn prop_subwf_matches_alu(w in any::<u8>(), v in any::<u8>()) {
            let mut core = Core::default();
            core.set_w(w);
            core.regs.write(0x20, v);
            step(&mut core, Instruction::Subwf { f: 0x20, d: Dest::F });
            prop_assert_eq!(core.regs.read(0x20), v.wrapping_sub(w));
            prop_assert_eq!(flags(&core), (v >= w, (v & 0xF) >= (w & 0xF), v == w));
        }
    }
}
