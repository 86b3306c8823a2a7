//! Parse errors and the source positions they point at.
//!
//! Every token and every [`ParseError`] carries a [`Span`]. Lines and
//! columns are 1-based (what an editor shows); the byte offset and length
//! are 0-based so a highlighter can slice the original text directly.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
use core::fmt;

/// A region of the assembly source text.
///
/// A region outside the source — the synthetic end-of-input token, for
/// one — is represented by the all-zero `Span::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column within the line, counted in bytes, starting at 1.
    pub col: u32,
    /// Byte offset of the region's first character.
    pub offset: usize,
    /// Region length in bytes.
    pub len: usize,
}

impl Span {
    /// Span `len` bytes at the given position.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Span {
            line,
            col,
            offset,
            len,
        }
    }
}

// Rendered as `line:col`, the prefix of every diagnostic.
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A parse error with source location and descriptive message.
///
/// Errors fall into three families: lexical (an ERROR token reached the
/// parser), syntactic (expected-token mismatch in a grammar rule), and
/// semantic-at-parse-time (size/operand validation, symbol resolution,
/// expression evaluation).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParseError {
    /// A character the lexer could not match (reached as an ERROR token).
    UnexpectedCharacter {
        /// The offending character.
        ch: char,
        /// Source location of the character.
        span: Span,
    },

    /// Expected-token mismatch in a grammar rule.
    UnexpectedToken {
        /// What the grammar rule was looking for.
        expected: String,
        /// The text of the token actually found.
        found: String,
        /// Source location of the found token.
        span: Span,
    },

    /// A numeric literal that does not fit a 64-bit value.
    InvalidNumber {
        /// The literal text.
        literal: String,
        /// Source location of the literal.
        span: Span,
    },

    /// A register or memory operand whose size contradicts the mnemonic suffix.
    SuffixMismatch {
        /// Source location of the instruction.
        span: Span,
    },

    /// Operand sizes that contradict each other or the extension suffix pair.
    OperandSizeMismatch {
        /// Source location of the instruction.
        span: Span,
    },

    /// A zero/sign extension whose source width is not below its destination.
    ExtensionOrder {
        /// Source width in bytes.
        from: u8,
        /// Destination width in bytes.
        to: u8,
        /// Source location of the instruction.
        span: Span,
    },

    /// A zero/sign extension whose source-width suffix character is invalid.
    ExtensionSourcePrefix {
        /// Source location of the instruction.
        span: Span,
    },

    /// Port I/O with a register pattern other than the fixed %dx / accumulator.
    WrongOperands {
        /// The instruction mnemonic.
        mnemonic: String,
        /// Source location of the instruction.
        span: Span,
    },

    /// A string-I/O mnemonic with a missing or 8-byte size suffix.
    WrongSizeSuffix {
        /// The instruction mnemonic.
        mnemonic: String,
        /// Source location of the instruction.
        span: Span,
    },

    /// A direct memory reference to a label that has no recorded address.
    UndefinedLabel {
        /// The label name.
        label: String,
        /// Source location of the reference.
        span: Span,
    },

    /// An expression referencing a symbol with no recorded value.
    UndefinedSymbol {
        /// The symbol name.
        name: String,
        /// Source location of the reference.
        span: Span,
    },

    /// A label defined at two different addresses.
    DuplicateLabel {
        /// The label name.
        label: String,
        /// Source location of the second definition.
        span: Span,
    },

    /// A floating-point literal — lexed but not supported by assembly.
    Flonum {
        /// Source location of the literal.
        span: Span,
    },

    /// Division by zero while evaluating a constant expression.
    DivisionByZero {
        /// Source location of the `/` operator.
        span: Span,
    },

    /// A string literal with no closing quote.
    UnterminatedString {
        /// Source location of the literal.
        span: Span,
    },

    /// A data directive writing past the data image limit.
    DataImageLimit {
        /// The configured limit in bytes.
        limit: usize,
        /// Source location of the directive.
        span: Span,
    },
}

impl ParseError {
    /// The source location the error points at.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedCharacter { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::SuffixMismatch { span }
            | ParseError::OperandSizeMismatch { span }
            | ParseError::ExtensionOrder { span, .. }
            | ParseError::ExtensionSourcePrefix { span }
            | ParseError::WrongOperands { span, .. }
            | ParseError::WrongSizeSuffix { span, .. }
            | ParseError::UndefinedLabel { span, .. }
            | ParseError::UndefinedSymbol { span, .. }
            | ParseError::DuplicateLabel { span, .. }
            | ParseError::Flonum { span }
            | ParseError::DivisionByZero { span }
            | ParseError::UnterminatedString { span }
            | ParseError::DataImageLimit { span, .. } => *span,
        }
    }

    /// 1-based source line of the error.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.span().line
    }

    /// 1-based source column of the error.
    #[must_use]
    pub fn column(&self) -> u32 {
        self.span().col
    }

    /// The human-readable message, without the location prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            ParseError::UnexpectedCharacter { ch, .. } => {
                format!("unexpected character '{}'", ch)
            }
            ParseError::UnexpectedToken {
                expected, found, ..
            } => {
                format!("expected {}, found '{}'", expected, found)
            }
            ParseError::InvalidNumber { literal, .. } => {
                format!("invalid number '{}'", literal)
            }
            ParseError::SuffixMismatch { .. } => {
                String::from("Operand size and instruction suffix mismatch.")
            }
            ParseError::OperandSizeMismatch { .. } => String::from("Operand size mismatch."),
            ParseError::ExtensionOrder { from, to, .. } => {
                format!(
                    "Wrong suffices for extension: cannot extend from {} to {}",
                    from, to
                )
            }
            ParseError::ExtensionSourcePrefix { .. } => {
                String::from("Zero/Sign extension with wrong source prefix type")
            }
            ParseError::WrongOperands { mnemonic, .. } => {
                format!("Wrong operands for instruction {}.", mnemonic)
            }
            ParseError::WrongSizeSuffix { mnemonic, .. } => {
                format!("Wrong size suffix for instruction {}", mnemonic)
            }
            ParseError::UndefinedLabel { .. } => {
                String::from("Trying to address a label which has not been defined")
            }
            ParseError::UndefinedSymbol { name, .. } => {
                format!("undefined symbol '{}'", name)
            }
            ParseError::DuplicateLabel { label, .. } => {
                format!("label '{}' is already defined", label)
            }
            ParseError::Flonum { .. } => String::from("FLONUMS are still not supported"),
            ParseError::DivisionByZero { .. } => {
                String::from("division by zero in expression")
            }
            ParseError::UnterminatedString { .. } => String::from("unterminated string literal"),
            ParseError::DataImageLimit { limit, .. } => {
                format!("data image limit exceeded (limit: {} bytes)", limit)
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span(), self.message())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}
