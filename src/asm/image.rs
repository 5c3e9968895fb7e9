//! Program image file format.
//!
//! A `.phex` image is plain text:
//! - One instruction word per line, as hexadecimal (e.g. `3005`)
//! - Anything after `;` is a comment
//! - Blank lines are ignored

use crate::cpu::decode::WORD_MASK;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::disasm::disassemble_word;

/// A loaded program image.
#[derive(Debug, Clone, Default)]
pub struct ImageFile {
    /// The program words, starting at word 0.
    pub words: Vec<u16>,
    /// Original source lines (for debugging).
    pub source_lines: Vec<String>,
}

impl ImageFile {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an image from words, annotating each with its disassembly.
    pub fn from_words(words: &[u16]) -> Self {
        Self {
            words: words.to_vec(),
            source_lines: words.iter().map(|&w| disassemble_word(w)).collect(),
        }
    }

    /// Add a word.
    pub fn push(&mut self, word: u16, source: &str) {
        self.words.push(word);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Parse image text.
pub fn parse_image<R: BufRead>(reader: R) -> Result<ImageFile, ImageError> {
    let mut image = ImageFile::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ImageError::IoError(e.to_string()))?;
        let trimmed = line.trim();

        let code = match trimmed.find(';') {
            Some(idx) => trimmed[..idx].trim(),
            None => trimmed,
        };
        if code.is_empty() {
            continue;
        }

        let word = u16::from_str_radix(code, 16).map_err(|e| ImageError::ParseError {
            line: line_num + 1,
            message: format!("{}", e),
        })?;
        if word > WORD_MASK {
            return Err(ImageError::ParseError {
                line: line_num + 1,
                message: format!("word {:#06x} wider than 14 bits", word),
            });
        }

        image.push(word, trimmed);
    }

    Ok(image)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ImageFile, ImageError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    parse_image(BufReader::new(file))
}

/// Write image text.
pub fn write_image<W: Write>(mut out: W, image: &ImageFile) -> Result<(), ImageError> {
    let io = |e: std::io::Error| ImageError::IoError(e.to_string());

    writeln!(out, "; PIC16F84 program image").map_err(io)?;
    writeln!(out, "; {} words", image.len()).map_err(io)?;
    writeln!(out).map_err(io)?;

    for (i, word) in image.words.iter().enumerate() {
        let comment = image.source_lines.get(i).map(String::as_str).unwrap_or("");
        writeln!(out, "{:04x} ; {:03x}  {}", word, i, comment).map_err(io)?;
    }

    Ok(())
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ImageFile) -> Result<(), ImageError> {
    let file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    write_image(file, image)
}

/// Default image path for an assembly source: same stem, `.phex` extension.
pub fn image_path_for<P: AsRef<Path>>(source: P) -> PathBuf {
    source.as_ref().with_extension("phex")
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },
}
