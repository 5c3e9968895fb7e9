//! PIC16F84 program memory.
//!
//! The 16F84 has 1K words of 14-bit flash. Instructions are fetched by
//! program counter, which counts two address units per word.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::cpu::decode::WORD_MASK;

/// The number of program memory words.
pub const PROGRAM_SIZE: usize = 1024;

/// Program memory: 1024 fourteen-bit words.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "ProgramSnapshot")]
pub struct ProgramMemory {
    words: Vec<u16>,
}

/// Serialized form of [`ProgramMemory`], checked before use.
#[derive(Deserialize)]
struct ProgramSnapshot {
    words: Vec<u16>,
}

impl TryFrom<ProgramSnapshot> for ProgramMemory {
    type Error = MemoryError;

    fn try_from(snapshot: ProgramSnapshot) -> Result<Self, Self::Error> {
        if snapshot.words.len() != PROGRAM_SIZE {
            return Err(MemoryError::WrongSize {
                size: snapshot.words.len(),
                expected: PROGRAM_SIZE,
            });
        }
        let words = snapshot.words.into_iter().map(|w| w & WORD_MASK).collect();
        Ok(Self { words })
    }
}

impl ProgramMemory {
    /// Create a new program memory filled with NOPs.
    pub fn new() -> Self {
        Self {
            words: vec![0; PROGRAM_SIZE],
        }
    }

    /// Read a word by index (0-1023).
    pub fn read(&self, index: usize) -> Result<u16, MemoryError> {
        self.words
            .get(index)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange(index))
    }

    /// Write a word by index (0-1023). Bits above 13 are dropped.
    pub fn write(&mut self, index: usize, word: u16) -> Result<(), MemoryError> {
        let cell = self.words
            .get_mut(index)
            .ok_or(MemoryError::AddressOutOfRange(index))?;
        *cell = word & WORD_MASK;
        Ok(())
    }

    /// Fetch the word a program counter points at.
    ///
    /// The program space wraps: a PC past the end of memory aliases back
    /// to the start, as the upper PC bits are not decoded on this part.
    #[inline]
    pub fn fetch(&self, pc: u16) -> u16 {
        self.words[Self::pc_to_index(pc)]
    }

    /// Convert a program counter to a word index.
    #[inline]
    pub fn pc_to_index(pc: u16) -> usize {
        (pc as usize >> 1) % PROGRAM_SIZE
    }

    /// Convert a word index to a program counter.
    #[inline]
    pub fn index_to_pc(index: usize) -> u16 {
        (index << 1) as u16
    }

    /// Clear all memory to NOPs.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Load a program into memory starting at the given word index.
    pub fn load_program(&mut self, start: usize, program: &[u16]) -> Result<(), MemoryError> {
        if start.saturating_add(program.len()) > PROGRAM_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: PROGRAM_SIZE.saturating_sub(start),
            });
        }

        for (i, &word) in program.iter().enumerate() {
            self.words[start + i] = word & WORD_MASK;
        }

        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u16)> {
        let end = start.saturating_add(count).min(PROGRAM_SIZE);
        (start.min(end)..end)
            .map(|i| (i, self.words[i]))
            .collect()
    }
}

impl Default for ProgramMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgramMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.words.iter().filter(|&&w| w != 0).count();
        f.debug_struct("ProgramMemory")
            .field("non_zero_words", &non_zero)
            .field("total_words", &PROGRAM_SIZE)
            .finish()
    }
}

/// Errors that can occur during program memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program memory index {0} out of range (0-1023)")]
    AddressOutOfRange(usize),

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("program memory holds {size} words, expected {expected}")]
    WrongSize { size: usize, expected: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = ProgramMemory::new();
        mem.write(10, 0x3005).unwrap();
        assert_eq!(mem.read(10).unwrap(), 0x3005);
    }

    #[test]
    fn test_write_masks_to_14_bits() {
        let mut mem = ProgramMemory::new();
        mem.write(0, 0xFFFF).unwrap();
        assert_eq!(mem.read(0).unwrap(), 0x3FFF);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = ProgramMemory::new();
        assert!(mem.read(1023).is_ok());
        assert_eq!(mem.read(1024), Err(MemoryError::AddressOutOfRange(1024)));
        assert!(mem.write(1024, 0).is_err());
    }

    #[test]
    fn test_fetch_by_pc() {
        let mut mem = ProgramMemory::new();
        mem.load_program(0, &[0x3001, 0x3002, 0x3003]).unwrap();
        assert_eq!(mem.fetch(0), 0x3001);
        assert_eq!(mem.fetch(2), 0x3002);
        assert_eq!(mem.fetch(4), 0x3003);
        // program space wraps after 1K words
        assert_eq!(mem.fetch(0x800), 0x3001);
    }

    #[test]
    fn test_dump_and_clear() {
        let mut mem = ProgramMemory::new();
        mem.load_program(1022, &[0x3001, 0x3002]).unwrap();
        assert_eq!(mem.dump(1022, 10), vec![(1022, 0x3001), (1023, 0x3002)]);
        assert!(mem.dump(2000, 4).is_empty());

        mem.clear();
        assert_eq!(mem.read(1023).unwrap(), 0);
    }

    #[test]
    fn test_dump_count_saturates() {
        let mem = ProgramMemory::new();
        assert_eq!(mem.dump(1020, usize::MAX).len(), 4);
    }

    #[test]
    fn test_snapshot_length_checked() {
        let mut words = vec![0u16; PROGRAM_SIZE];
        words[0] = 0xFFFF;
        let json = serde_json::to_string(&serde_json::json!({ "words": words })).unwrap();
        let mem: ProgramMemory = serde_json::from_str(&json).unwrap();
        assert_eq!(mem.read(0).unwrap(), 0x3FFF);

        let short = r#"{"words":[12293]}"#;
        let err = serde_json::from_str::<ProgramMemory>(short).unwrap_err();
        assert!(err.to_string().contains("expected 1024"));
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = ProgramMemory::new();
        let program = vec![0u16; 10];
        assert_eq!(
            mem.load_program(1020, &program),
            Err(MemoryError::ProgramTooLarge { size: 10, available: 4 })
        );
    }
}
