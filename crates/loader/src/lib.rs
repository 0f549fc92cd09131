//! Line-oriented text loader.
//!
//! A program is a sequence of whitespace-separated directives, one per line.
//! `a` moves the load address, `i`/`u`/`f` emit one data word in the given
//! interpretation, `k` encodes one instruction word, and `e` records the
//! entry address while emitting a halt word. A token starting with `#`
//! truncates the rest of the line. Lines with any other leading token are
//! ignored without advancing the load address.

use num_traits::FromPrimitive;
use thiserror::Error;
use wordvm_common::{Opcode, Program, Word};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoaderError {
    #[error("line {line}: unknown opcode {code}")]
    UnknownOpcode { line: usize, code: u32 },
    #[error("line {line}: invalid number: {token}")]
    InvalidNumber { line: usize, token: String },
    #[error("line {line}: invalid register: {token}")]
    InvalidRegister { line: usize, token: String },
    #[error("line {line}: missing operand")]
    MissingOperand { line: usize },
}

/// Accumulates word writes while walking a program text.
pub struct Loader {
    address: u16,
    entry: u16,
    words: Vec<(u16, Word)>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            address: 0,
            entry: 0,
            words: Vec::new(),
        }
    }

    /// Process one source line. `line_no` is 1-based and only used for
    /// error reporting.
    pub fn load_line(&mut self, line: &str, line_no: usize) -> Result<(), LoaderError> {
        let tokens: Vec<&str> = line
            .split_whitespace()
            .take_while(|t| !t.starts_with('#'))
            .collect();

        let Some(&head) = tokens.first() else {
            return Ok(());
        };

        match head {
            "a" => {
                self.address = parse_addr(operand(&tokens, 1, line_no)?, line_no)?;
            }
            "i" => {
                let value = parse_number::<i32>(operand(&tokens, 1, line_no)?, line_no)?;
                self.emit(Word::from_i32(value));
            }
            "u" => {
                let value = parse_number::<u32>(operand(&tokens, 1, line_no)?, line_no)?;
                self.emit(Word::from_u32(value));
            }
            "f" => {
                let value = parse_number::<f32>(operand(&tokens, 1, line_no)?, line_no)?;
                self.emit(Word::from_f32(value));
            }
            "e" => {
                // The run address is backed off by one word so the dispatch
                // loop's automatic advance lands on the entry instruction.
                self.entry = parse_addr(operand(&tokens, 1, line_no)?, line_no)?.wrapping_sub(2);
                self.emit(Word::HALT);
            }
            "k" => {
                let word = self.encode_instruction(&tokens, line_no)?;
                self.emit(word);
            }
            // Anything else is ignored and does not advance the address.
            _ => {}
        }

        Ok(())
    }

    /// Encode a `k` line. The operand-count rule is positional: one trailing
    /// token is a slot-c register (except for `call`, where it is the raw
    /// target address), two are a register plus a 16-bit address/offset, and
    /// three are the three register slots.
    fn encode_instruction(&self, tokens: &[&str], line_no: usize) -> Result<Word, LoaderError> {
        let code = parse_number::<u32>(operand(tokens, 1, line_no)?, line_no)?;
        let opcode = u8::try_from(code)
            .ok()
            .and_then(Opcode::from_u8)
            .ok_or(LoaderError::UnknownOpcode { line: line_no, code })?;

        Ok(match tokens.len() - 2 {
            0 => Word::three_op(opcode as u8, 0, 0, 0),
            1 => {
                if opcode == Opcode::Call {
                    Word::two_op(opcode as u8, 0, parse_addr(tokens[2], line_no)?)
                } else {
                    Word::three_op(opcode as u8, 0, 0, parse_register(tokens[2], line_no)?)
                }
            }
            2 => Word::two_op(
                opcode as u8,
                parse_register(tokens[2], line_no)?,
                parse_addr(tokens[3], line_no)?,
            ),
            _ => Word::three_op(
                opcode as u8,
                parse_register(tokens[2], line_no)?,
                parse_register(tokens[3], line_no)?,
                parse_register(tokens[4], line_no)?,
            ),
        })
    }

    fn emit(&mut self, word: Word) {
        self.words.push((self.address, word));
        self.address = self.address.wrapping_add(2);
    }

    #[must_use]
    pub fn finish(self) -> Program {
        Program {
            words: self.words,
            entry: self.entry,
        }
    }
}

/// Parse a whole program text into a load image.
pub fn parse_program(text: &str) -> Result<Program, LoaderError> {
    let mut loader = Loader::new();
    for (index, line) in text.lines().enumerate() {
        loader.load_line(line, index + 1)?;
    }
    Ok(loader.finish())
}

fn operand<'a>(tokens: &[&'a str], index: usize, line_no: usize) -> Result<&'a str, LoaderError> {
    tokens
        .get(index)
        .copied()
        .ok_or(LoaderError::MissingOperand { line: line_no })
}

fn parse_number<T: std::str::FromStr>(token: &str, line_no: usize) -> Result<T, LoaderError> {
    token.parse::<T>().map_err(|_| LoaderError::InvalidNumber {
        line: line_no,
        token: token.to_string(),
    })
}

/// Addresses and offsets accept negative values (relative jumps encode their
/// offset in two's complement).
fn parse_addr(token: &str, line_no: usize) -> Result<u16, LoaderError> {
    parse_number::<i32>(token, line_no).map(|v| v as u16)
}

fn parse_register(token: &str, line_no: usize) -> Result<u8, LoaderError> {
    token
        .parse::<u8>()
        .map_err(|_| LoaderError::InvalidRegister {
            line: line_no,
            token: token.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_words_advance_the_load_address() {
        let program = parse_program("a 10\ni -5\nu 7\nf 1.5\n").unwrap();
        assert_eq!(
            program.words,
            vec![
                (10, Word::from_i32(-5)),
                (12, Word::from_u32(7)),
                (14, Word::from_f32(1.5)),
            ]
        );
    }

    #[test]
    fn entry_line_backs_off_one_word_and_emits_halt() {
        let program = parse_program("a 100\ne 40\n").unwrap();
        assert_eq!(program.entry, 38);
        assert_eq!(program.words, vec![(100, Word::HALT)]);
    }

    #[test]
    fn entry_defaults_to_zero() {
        let program = parse_program("a 10\ni 1\n").unwrap();
        assert_eq!(program.entry, 0);
    }

    #[test]
    fn single_operand_goes_to_slot_c() {
        let program = parse_program("k 20 3\n").unwrap();
        assert_eq!(program.words, vec![(0, Word::three_op(20, 0, 0, 3))]);
    }

    #[test]
    fn single_operand_of_call_is_an_address() {
        let program = parse_program("k 51 400\n").unwrap();
        assert_eq!(program.words, vec![(0, Word::two_op(51, 0, 400))]);
    }

    #[test]
    fn two_operands_use_the_wide_layout() {
        let program = parse_program("k 23 5 1000\n").unwrap();
        assert_eq!(program.words, vec![(0, Word::two_op(23, 5, 1000))]);
    }

    #[test]
    fn negative_offsets_wrap_to_u16() {
        let program = parse_program("k 1 3 -4\n").unwrap();
        assert_eq!(program.words, vec![(0, Word::two_op(1, 3, 0xFFFC))]);
    }

    #[test]
    fn three_operands_fill_all_slots() {
        let program = parse_program("k 29 2 0 1\n").unwrap();
        assert_eq!(program.words, vec![(0, Word::three_op(29, 2, 0, 1))]);
    }

    #[test]
    fn comments_and_unknown_lines_are_ignored() {
        let program = parse_program("; nothing\nk 29 2 0 1 # add r2 = r0 + r1\n# full comment\n")
            .unwrap();
        assert_eq!(program.words, vec![(0, Word::three_op(29, 2, 0, 1))]);
    }

    #[test]
    fn unknown_leading_token_keeps_the_address() {
        let program = parse_program("x 999\ni 1\n").unwrap();
        assert_eq!(program.words, vec![(0, Word::from_i32(1))]);
    }

    #[test]
    fn unknown_opcode_is_reported_with_its_line() {
        let err = parse_program("a 0\nk 55 1\n").unwrap_err();
        assert_eq!(err, LoaderError::UnknownOpcode { line: 2, code: 55 });
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = parse_program("i banana\n").unwrap_err();
        assert_eq!(
            err,
            LoaderError::InvalidNumber {
                line: 1,
                token: "banana".to_string()
            }
        );
    }

    #[test]
    fn out_of_range_register_is_rejected() {
        let err = parse_program("k 29 300 0 1\n").unwrap_err();
        assert_eq!(
            err,
            LoaderError::InvalidRegister {
                line: 1,
                token: "300".to_string()
            }
        );
    }

    #[test]
    fn missing_operand_is_rejected() {
        let err = parse_program("a\n").unwrap_err();
        assert_eq!(err, LoaderError::MissingOperand { line: 1 });
    }
}
