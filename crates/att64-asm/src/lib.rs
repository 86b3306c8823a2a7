//! # att64-asm — Teaching x86-64 Assembler Front-End
//!
//! `att64-asm` is the front-end of a teaching x86-64 assembler: it ingests a
//! single source text in an AT&T-flavoured 64-bit dialect and produces an
//! in-memory [`Program`] — an ordered instruction stream, a data image, and
//! a symbol table — for a downstream simulator to execute.
//!
//! ## Quick Start
//!
//! ```rust
//! use att64_asm::assemble;
//!
//! let out = assemble(".text\nmovq $5, %rax\n.end\n");
//! assert!(out.is_ok());
//! assert_eq!(out.program().code.len(), 1);
//! ```
//!
//! ## Features
//!
//! - **Total lexing** — every character becomes a token; whitespace,
//!   comments, and even unmatched characters are kept for highlighters.
//! - **Single forward pass** — one-token lookahead, eager label resolution,
//!   no backtracking.
//! - **Error recovery** — a malformed statement is reported and skipped to
//!   the next newline; assembly always yields a program plus an error list.
//! - **`no_std` + `alloc`** — embeddable; `std` only adds `Error` impls.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An assembler front-end performs many narrowing / sign-changing casts
// between integer widths (u64→i64, i64→i32, u64→i32) by design: values are
// 64-bit two's-complement throughout and displacements truncate to 32 bits.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::unreadable_literal,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::redundant_closure_for_method_calls
)]

extern crate alloc;

/// Public result type tying the lexer and parser together.
pub mod assembler;
/// Error types and source-span diagnostics.
pub mod error;
/// Program model: registers, operands, instruction classes, data image.
pub mod ir;
/// Total lexer with hidden-token preservation and span tracking.
pub mod lexer;
/// Grammar-directed parser: expressions, operand formats, instruction
/// classification, sections, and error recovery.
pub mod parser;

// Re-exports
pub use assembler::Assembly;
pub use error::{ParseError, Span};
pub use ir::{
    DataImage, DriverKey, Instruction, MemOperand, Mnemonic, Operand, Program, Reg, RegSize,
};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::parse;

/// Assemble a source text into a [`Program`] plus the list of errors.
///
/// Newlines, carriage returns, and semicolons separate statements. The call
/// never fails: malformed statements are reported in [`Assembly::errors`]
/// and the remaining statements still land in the program.
///
/// # Examples
///
/// ```rust
/// use att64_asm::assemble;
///
/// let out = assemble(".data\nfoo: .quad 0x10\n.text\nmovq foo, %rax\n.end\n");
/// assert!(out.is_ok());
/// assert_eq!(out.program().lookup("foo"), Some(0));
/// assert_eq!(out.program().code[0].class(), 1);
/// ```
pub fn assemble(source: &str) -> Assembly {
    let tokens = lexer::tokenize(source);
    let (program, errors) = parser::parse(&tokens);
    Assembly::new(program, errors)
}
