//! Total lexer for the AT&T-flavoured assembly dialect.
//!
//! The lexer tokenizes source text into a stream of [`Token`]s, each carrying
//! its lexeme (borrowed from the input) and [`Span`](crate::error::Span).
//! It never fails: every character lands in exactly one token, so the
//! concatenated lexemes reconstruct the input byte-for-byte. Whitespace and
//! comments are emitted as hidden tokens for downstream highlighters and
//! skipped by the parser; anything unmatchable becomes a one-character
//! `Error` token.
//!
//! Matching is longest-match with ties broken by token-class priority, and
//! keyword recognition is case-insensitive throughout.

use alloc::vec::Vec;

use crate::error::Span;
use crate::ir::{Reg, RegSize};

/// A token produced by the lexer.
///
/// The lexeme is always a slice of the source string — the lexer never
/// rewrites text, so tokens are `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token<'src> {
    /// Token classification.
    pub kind: TokenKind,
    /// Source text of the token.
    pub lexeme: &'src str,
    /// Source location.
    pub span: Span,
}

impl Token<'_> {
    /// Whether the parser skips this token (whitespace and comments are
    /// preserved for highlighting only).
    #[inline]
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    /// A run of spaces, tabs, or form feeds (hidden).
    Whitespace,
    /// A `# …` or `/* … */` comment (hidden).
    Comment,
    /// A maximal run of `\n`, `\r`, `;` — one statement separator.
    Newline,
    /// A directive keyword (`.org`, `.data`, `.text`, …).
    Directive,
    /// The lone `.` — the location counter.
    Dot,
    /// An integer literal: decimal, `0x` hex, or `0b` binary.
    Int,
    /// A floating-point literal (`0e…`) — lexed but rejected at evaluation.
    Flonum,
    /// `$` — immediate prefix.
    Dollar,
    /// `=` — symbol assignment.
    Equals,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `,`
    Comma,
    /// An 8-bit register (`%al` … `%r15b`).
    Reg8,
    /// A 16-bit register (`%ax` … `%r15w`).
    Reg16,
    /// A 32-bit register (`%eax` … `%r15d`).
    Reg32,
    /// A 64-bit register (`%rax` … `%r15`).
    Reg64,
    /// String moves: `movs`/`cmps`/`scas`/`lods`/`stos` + optional size.
    Insn0,
    /// Flag pushes: `pushf`/`popf` + optional `w`/`l`/`q`.
    Insn0Wq,
    /// Suffix-less no-operand mnemonics: `ret`, `hlt`, `nop`, the
    /// `clX`/`stX` flag family.
    Insn0NoSuff,
    /// `int` — takes a literal interrupt number.
    Insn1S,
    /// `lea` + optional size suffix.
    InsnLea,
    /// Single register-or-memory operand: `push`/`pop`/`neg`/`not`.
    Insn1E,
    /// Shifts and rotates.
    InsnShift,
    /// Conditional jumps (`j<cc>`), no suffix.
    Insn1M,
    /// Unconditional transfers with a target: `jmp`/`call`.
    InsnJc,
    /// Two-operand data/arithmetic: `mov`, `add`, `sub`, `adc`, `sbb`,
    /// `cmp`, `test`, `and`, `or`, `xor`.
    InsnBE,
    /// Width extensions: `movs`/`movz` + two-character suffix pair.
    InsnExt,
    /// `in` + optional size suffix.
    InsnIn,
    /// `out` + optional size suffix.
    InsnOut,
    /// String I/O: `ins`/`outs` + optional size letter.
    InsnIoS,
    /// `iret` — driver epilogue.
    Iret,
    /// A label definition (`name:`; the lexeme includes the colon).
    Label,
    /// A bare identifier (`[._\-a-z0-9]+`) that matched nothing above.
    LabelName,
    /// A double-quoted string literal (lexeme kept raw, quotes included).
    Str,
    /// Exactly one character nothing else matched. Always emitted, never
    /// dropped; the parser reports it as a syntax error.
    Error,
    /// End of input (zero-length lexeme).
    Eof,
}

/// The directive keywords of the dialect. The lone `.` is the location
/// counter, a separate token.
const DIRECTIVES: &[&str] = &[
    ".org", ".data", ".text", ".bss", ".end", ".equ", ".byte", ".word", ".long", ".quad",
    ".ascii", ".fill", ".comm", ".driver", ".handler",
];

/// Suffix shape accepted by a mnemonic family.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Suffix {
    /// No suffix at all.
    None,
    /// Optional `b`/`w`/`l`/`q`.
    Size,
    /// Optional `w`/`l`/`q` (no byte form).
    Wide,
    /// Mandatory two-character pair, each from `b`/`w`/`l`/`q`.
    Pair,
}

/// Mnemonic families in priority order. A word is classified by the first
/// family whose base + suffix shape matches the whole word.
const FAMILIES: &[(TokenKind, &[&str], Suffix)] = &[
    (
        TokenKind::Insn0,
        &["movs", "cmps", "scas", "lods", "stos"],
        Suffix::Size,
    ),
    (TokenKind::Insn0Wq, &["pushf", "popf"], Suffix::Wide),
    (
        TokenKind::Insn0NoSuff,
        &[
            "ret", "hlt", "nop", "clc", "cld", "cli", "cmc", "stc", "std", "sti",
        ],
        Suffix::None,
    ),
    (TokenKind::Insn1S, &["int"], Suffix::None),
    (TokenKind::InsnLea, &["lea"], Suffix::Size),
    (
        TokenKind::Insn1E,
        &["push", "pop", "neg", "not"],
        Suffix::Size,
    ),
    (
        TokenKind::InsnShift,
        &["sal", "sar", "shl", "shr", "rol", "ror", "rcl", "rcr"],
        Suffix::Size,
    ),
    (
        TokenKind::Insn1M,
        &[
            "ja", "jae", "jb", "jbe", "jc", "je", "jg", "jge", "jl", "jle", "jna", "jnae", "jnb",
            "jnbe", "jnc", "jne", "jng", "jnge", "jnl", "jnle", "jno", "jnp", "jns", "jnz", "jo",
            "jp", "jpe", "jpo", "js", "jz",
        ],
        Suffix::None,
    ),
    (TokenKind::InsnJc, &["jmp", "call"], Suffix::Size),
    (
        TokenKind::InsnBE,
        &[
            "mov", "add", "sub", "adc", "sbb", "cmp", "test", "and", "or", "xor",
        ],
        Suffix::Size,
    ),
    (TokenKind::InsnExt, &["movs", "movz"], Suffix::Pair),
    (TokenKind::InsnIn, &["in"], Suffix::Size),
    (TokenKind::InsnOut, &["out"], Suffix::Size),
    (TokenKind::InsnIoS, &["ins", "outs"], Suffix::Size),
    (TokenKind::Iret, &["iret"], Suffix::None),
];

fn suffix_ok(rest: &[u8], shape: Suffix) -> bool {
    match shape {
        Suffix::None => rest.is_empty(),
        Suffix::Size => {
            rest.is_empty() || (rest.len() == 1 && matches!(rest[0], b'b' | b'w' | b'l' | b'q'))
        }
        Suffix::Wide => {
            rest.is_empty() || (rest.len() == 1 && matches!(rest[0], b'w' | b'l' | b'q'))
        }
        Suffix::Pair => {
            rest.len() == 2
                && matches!(rest[0], b'b' | b'w' | b'l' | b'q')
                && matches!(rest[1], b'b' | b'w' | b'l' | b'q')
        }
    }
}

/// Classify a lower-case word as a mnemonic family, if it is one.
pub(crate) fn classify_mnemonic(lower: &str) -> Option<TokenKind> {
    for &(kind, bases, shape) in FAMILIES {
        for &base in bases {
            if let Some(rest) = lower.strip_prefix(base) {
                if suffix_ok(rest.as_bytes(), shape) {
                    return Some(kind);
                }
            }
        }
    }
    None
}

/// Split a lower-case mnemonic of the given family into (base, suffix).
pub(crate) fn split_mnemonic(kind: TokenKind, lower: &str) -> (&str, &str) {
    for &(k, bases, shape) in FAMILIES {
        if k != kind {
            continue;
        }
        for &base in bases {
            if let Some(rest) = lower.strip_prefix(base) {
                if suffix_ok(rest.as_bytes(), shape) {
                    return lower.split_at(base.len());
                }
            }
        }
    }
    (lower, "")
}

/// Zero-allocation ASCII-lowercase into a caller-provided stack buffer.
/// Returns `&str` of the lowered text. Inputs longer than `buf` are truncated.
#[inline]
pub(crate) fn to_lower_buf<'b>(s: &str, buf: &'b mut [u8]) -> &'b str {
    let len = s.len().min(buf.len());
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
    buf[..len].make_ascii_lowercase();
    // Input was valid UTF-8 and ASCII lowercase preserves validity,
    // so from_utf8 is infallible here.
    core::str::from_utf8(&buf[..len]).unwrap_or("")
}

/// Decode a raw string-literal lexeme (quotes included) into its byte
/// content. Supports the `\n \t \b \r \f \\ \' \"` escapes, 1–3 digit octal
/// escapes, and backslash-newline continuations; unknown escapes pass the
/// escaped character through. Returns `None` when the literal has no closing
/// quote.
pub(crate) fn unescape_string(raw: &str) -> Option<Vec<u8>> {
    let b = raw.as_bytes();
    if b.len() < 2 || b[0] != b'"' {
        return None;
    }
    let mut out = Vec::with_capacity(b.len());
    let mut i = 1;
    let mut closed = false;
    while i < b.len() {
        match b[i] {
            b'"' => {
                closed = true;
                break;
            }
            b'\\' => {
                i += 1;
                if i >= b.len() {
                    break;
                }
                match b[i] {
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'r' => out.push(b'\r'),
                    b'f' => out.push(0x0C),
                    b'0'..=b'7' => {
                        let mut value = u32::from(b[i] - b'0');
                        let mut digits = 1;
                        while digits < 3 && i + 1 < b.len() && (b'0'..=b'7').contains(&b[i + 1]) {
                            i += 1;
                            value = value * 8 + u32::from(b[i] - b'0');
                            digits += 1;
                        }
                        out.push(value as u8);
                    }
                    b'\n' => {}
                    b'\r' => {
                        if i + 1 < b.len() && b[i + 1] == b'\n' {
                            i += 1;
                        }
                    }
                    other => out.push(other),
                }
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    if closed {
        Some(out)
    } else {
        None
    }
}

#[inline]
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-'
}

#[inline]
fn is_word_start(b: u8) -> bool {
    // A word cannot begin with '-': at that position the minus operator
    // wins, keeping unary minus and negative displacements lexable.
    b.is_ascii_alphanumeric() || b == b'.' || b == b'_'
}

#[inline]
fn utf8_width(b: u8) -> usize {
    if b < 0x80 {
        1
    } else if b >= 0xF0 {
        4
    } else if b >= 0xE0 {
        3
    } else if b >= 0xC0 {
        2
    } else {
        1
    }
}

/// Tokenize assembly source text into a vector of tokens.
///
/// The lexer is total: it cannot fail, every character is covered by
/// exactly one token, and the stream always ends with a zero-length
/// [`TokenKind::Eof`] token.
///
/// # Examples
///
/// ```
/// use att64_asm::lexer::{tokenize, TokenKind};
///
/// let tokens = tokenize("movq $5, %rax");
/// let kinds: Vec<_> = tokens.iter().filter(|t| !t.is_hidden()).map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::InsnBE,
///         TokenKind::Dollar,
///         TokenKind::Int,
///         TokenKind::Comma,
///         TokenKind::Reg64,
///         TokenKind::Eof,
///     ]
/// );
/// ```
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    // Heuristic: ~4 chars per token on average (mnemonics, registers, punctuation).
    let mut tokens = Vec::with_capacity(source.len() / 3 + 1);
    let mut lx = Lexer {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
    };
    while lx.pos < lx.bytes.len() {
        let tok = lx.next_token();
        tokens.push(tok);
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: "",
        span: Span::new(lx.line, lx.col, lx.pos, 0),
    });
    tokens
}

struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'src> Lexer<'src> {
    /// Produce a token covering `self.pos..end` and advance past it.
    fn make(&mut self, kind: TokenKind, end: usize) -> Token<'src> {
        let start = self.pos;
        let span = Span::new(self.line, self.col, start, end - start);
        let lexeme = &self.src[start..end];
        while self.pos < end {
            let b = self.bytes[self.pos];
            if b == b'\n' || (b == b'\r' && self.bytes.get(self.pos + 1) != Some(&b'\n')) {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
        Token { kind, lexeme, span }
    }

    fn next_token(&mut self) -> Token<'src> {
        let start = self.pos;
        let len = self.bytes.len();
        let b = self.bytes[start];

        match b {
            b' ' | b'\t' | 0x0C => {
                let mut end = start + 1;
                while end < len && matches!(self.bytes[end], b' ' | b'\t' | 0x0C) {
                    end += 1;
                }
                self.make(TokenKind::Whitespace, end)
            }
            b'\n' | b'\r' | b';' => {
                let mut end = start + 1;
                while end < len && matches!(self.bytes[end], b'\n' | b'\r' | b';') {
                    end += 1;
                }
                self.make(TokenKind::Newline, end)
            }
            b'#' => {
                let mut end = start + 1;
                while end < len && self.bytes[end] != b'\n' {
                    end += 1;
                }
                self.make(TokenKind::Comment, end)
            }
            b'/' if self.bytes.get(start + 1) == Some(&b'*') => {
                // Block comment; an unterminated one extends to end of input.
                let mut end = start + 2;
                while end + 1 < len && !(self.bytes[end] == b'*' && self.bytes[end + 1] == b'/') {
                    end += 1;
                }
                if end + 1 < len {
                    end += 2;
                } else {
                    end = len;
                }
                self.make(TokenKind::Comment, end)
            }
            b'/' => self.make(TokenKind::Slash, start + 1),
            b'$' => self.make(TokenKind::Dollar, start + 1),
            b'=' => self.make(TokenKind::Equals, start + 1),
            b'+' => self.make(TokenKind::Plus, start + 1),
            b'-' => self.make(TokenKind::Minus, start + 1),
            b'*' => self.make(TokenKind::Star, start + 1),
            b'(' => self.make(TokenKind::OpenParen, start + 1),
            b')' => self.make(TokenKind::CloseParen, start + 1),
            b',' => self.make(TokenKind::Comma, start + 1),
            b'"' => self.string_token(),
            b'%' => self.register_token(),
            c if is_word_start(c) => self.word_token(),
            c => self.make(TokenKind::Error, start + utf8_width(c)),
        }
    }

    fn string_token(&mut self) -> Token<'src> {
        let len = self.bytes.len();
        let mut p = self.pos + 1;
        loop {
            if p >= len {
                break;
            }
            match self.bytes[p] {
                b'\\' => {
                    p += 1;
                    if p < len {
                        p += utf8_width(self.bytes[p]);
                    }
                }
                b'"' => {
                    p += 1;
                    break;
                }
                // No embedded raw newlines: the (unterminated) literal
                // ends here and the parser reports it.
                b'\n' => break,
                c => p += utf8_width(c),
            }
        }
        self.make(TokenKind::Str, p)
    }

    fn register_token(&mut self) -> Token<'src> {
        let len = self.bytes.len();
        let start = self.pos;
        let mut end = start + 1;
        while end < len && self.bytes[end].is_ascii_alphanumeric() {
            end += 1;
        }
        // Longest register-name match; anything shorter than the scanned
        // word re-lexes from the cut point.
        let word_len = (end - start - 1).min(8);
        let mut buf = [0u8; 8];
        for l in (1..=word_len).rev() {
            let name = to_lower_buf(&self.src[start + 1..start + 1 + l], &mut buf);
            if let Some(reg) = Reg::parse(name) {
                let kind = match reg.size {
                    RegSize::Byte => TokenKind::Reg8,
                    RegSize::Word => TokenKind::Reg16,
                    RegSize::Long => TokenKind::Reg32,
                    RegSize::Quad => TokenKind::Reg64,
                };
                return self.make(kind, start + 1 + l);
            }
        }
        self.make(TokenKind::Error, start + 1)
    }

    fn word_token(&mut self) -> Token<'src> {
        let len = self.bytes.len();
        let start = self.pos;

        // FLONUM needs its own scan: its sign characters are not word
        // bytes, so the generic word scan would split it.
        if self.bytes[start] == b'0' && matches!(self.bytes.get(start + 1).copied(), Some(b'e' | b'E'))
        {
            if let Some(flen) = self.scan_flonum(start) {
                let mut wend = start;
                while wend < len && is_word_byte(self.bytes[wend]) {
                    wend += 1;
                }
                if flen >= wend - start {
                    return self.make(TokenKind::Flonum, start + flen);
                }
            }
        }

        let mut end = start + 1;
        while end < len && is_word_byte(self.bytes[end]) {
            end += 1;
        }

        // A word directly followed by ':' is a label definition — longest
        // match, so this beats any keyword the name collides with.
        if end < len && self.bytes[end] == b':' {
            return self.make(TokenKind::Label, end + 1);
        }

        let word = &self.src[start..end];
        let kind = classify_word(word);
        self.make(kind, end)
    }

    /// Match a FLONUM at `start`: `0e[+-]?digits[.digits]?(e[+-]?digits)?`.
    /// Returns the match length.
    fn scan_flonum(&self, start: usize) -> Option<usize> {
        let b = self.bytes;
        let len = b.len();
        let mut p = start + 2; // past "0e"
        if p < len && matches!(b[p], b'+' | b'-') {
            p += 1;
        }
        let digits_start = p;
        while p < len && b[p].is_ascii_digit() {
            p += 1;
        }
        if p == digits_start {
            return None;
        }
        if p < len && b[p] == b'.' {
            let mut q = p + 1;
            while q < len && b[q].is_ascii_digit() {
                q += 1;
            }
            if q > p + 1 {
                p = q;
            }
        }
        if p < len && matches!(b[p], b'e' | b'E') {
            let mut q = p + 1;
            if q < len && matches!(b[q], b'+' | b'-') {
                q += 1;
            }
            let exp_start = q;
            while q < len && b[q].is_ascii_digit() {
                q += 1;
            }
            if q > exp_start {
                p = q;
            }
        }
        Some(p - start)
    }
}

fn classify_word(word: &str) -> TokenKind {
    if word == "." {
        return TokenKind::Dot;
    }
    if word.len() <= 8 && DIRECTIVES.iter().any(|d| word.eq_ignore_ascii_case(d)) {
        return TokenKind::Directive;
    }
    if is_int(word.as_bytes()) {
        return TokenKind::Int;
    }
    if is_flonum_word(word.as_bytes()) {
        return TokenKind::Flonum;
    }
    if word.len() <= 8 {
        let mut buf = [0u8; 8];
        let lower = to_lower_buf(word, &mut buf);
        if let Some(kind) = classify_mnemonic(lower) {
            return kind;
        }
    }
    TokenKind::LabelName
}

/// Whether the whole word is an integer literal: decimal, `0x` hex, or
/// `0b` binary (case-insensitive prefixes).
fn is_int(b: &[u8]) -> bool {
    if b.len() > 2 && b[0] == b'0' && matches!(b[1], b'x' | b'X') {
        return b[2..].iter().all(u8::is_ascii_hexdigit);
    }
    if b.len() > 2 && b[0] == b'0' && matches!(b[1], b'b' | b'B') {
        return b[2..].iter().all(|&c| c == b'0' || c == b'1');
    }
    !b.is_empty() && b.iter().all(u8::is_ascii_digit)
}

/// The sign-free FLONUM shape that fits entirely inside a word:
/// `0e digits [. digits] [e digits]`.
fn is_flonum_word(b: &[u8]) -> bool {
    if b.len() < 3 || b[0] != b'0' || !matches!(b[1], b'e' | b'E') {
        return false;
    }
    let mut p = 2;
    let start = p;
    while p < b.len() && b[p].is_ascii_digit() {
        p += 1;
    }
    if p == start {
        return false;
    }
    if p < b.len() && b[p] == b'.' {
        p += 1;
        let frac = p;
        while p < b.len() && b[p].is_ascii_digit() {
            p += 1;
        }
        if p == frac {
            return false;
        }
    }
    if p < b.len() && matches!(b[p], b'e' | b'E') {
        p += 1;
        let exp = p;
        while p < b.len() && b[p].is_ascii_digit() {
            p += 1;
        }
        if p == exp {
            return false;
        }
    }
    p == b.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    fn visible_kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .into_iter()
            .filter(|t| !t.is_hidden())
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_input() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn whitespace_is_one_hidden_token() {
        let tokens = tokenize("  \t ");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Whitespace);
        assert_eq!(tokens[0].lexeme, "  \t ");
        assert!(tokens[0].is_hidden());
    }

    #[test]
    fn hash_comment_to_eol() {
        let tokens = tokenize("nop # trailing\nret");
        let k: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            k,
            vec![
                TokenKind::Insn0NoSuff,
                TokenKind::Whitespace,
                TokenKind::Comment,
                TokenKind::Newline,
                TokenKind::Insn0NoSuff,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[2].lexeme, "# trailing");
    }

    #[test]
    fn block_comment() {
        let k = visible_kinds("nop /* one\ntwo */ ret");
        assert_eq!(
            k,
            vec![TokenKind::Insn0NoSuff, TokenKind::Insn0NoSuff, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment_lexes_to_eof() {
        let tokens = tokenize("nop /* never closed");
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].lexeme, "/* never closed");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn newline_runs_collapse() {
        let tokens = tokenize("nop\n;\r\nret");
        let k: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            k,
            vec![
                TokenKind::Insn0NoSuff,
                TokenKind::Newline,
                TokenKind::Insn0NoSuff,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].lexeme, "\n;\r\n");
    }

    #[test]
    fn semicolon_is_a_statement_separator() {
        let k = visible_kinds("nop; ret");
        assert_eq!(
            k,
            vec![
                TokenKind::Insn0NoSuff,
                TokenKind::Newline,
                TokenKind::Insn0NoSuff,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn directives_and_location_counter() {
        let k = visible_kinds(".data .text .bss .end .");
        assert_eq!(
            k,
            vec![
                TokenKind::Directive,
                TokenKind::Directive,
                TokenKind::Directive,
                TokenKind::Directive,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_directive_is_a_label_name() {
        let tokens = tokenize(".foo");
        assert_eq!(tokens[0].kind, TokenKind::LabelName);
    }

    #[test]
    fn integers() {
        for src in ["42", "0x2A", "0XFF", "0b1010", "0B11", "0"] {
            let tokens = tokenize(src);
            assert_eq!(tokens[0].kind, TokenKind::Int, "{src}");
            assert_eq!(tokens[0].lexeme, src);
        }
    }

    #[test]
    fn malformed_number_is_a_label_name() {
        // Longest match: "0x" and "0b2" extend past the valid literal.
        assert_eq!(tokenize("0x")[0].kind, TokenKind::LabelName);
        assert_eq!(tokenize("0b2")[0].kind, TokenKind::LabelName);
        assert_eq!(tokenize("0x10g")[0].kind, TokenKind::LabelName);
    }

    #[test]
    fn flonum_shapes() {
        for src in ["0e12", "0e+12", "0e-3", "0e12.5", "0e1.5e3", "0e+1.5e-3"] {
            let tokens = tokenize(src);
            assert_eq!(tokens[0].kind, TokenKind::Flonum, "{src}");
            assert_eq!(tokens[0].lexeme, src, "{src}");
        }
    }

    #[test]
    fn flonum_loses_to_longer_word() {
        let tokens = tokenize("0e12x");
        assert_eq!(tokens[0].kind, TokenKind::LabelName);
        assert_eq!(tokens[0].lexeme, "0e12x");
    }

    #[test]
    fn registers_by_family() {
        let cases = [
            ("%al", TokenKind::Reg8),
            ("%r15b", TokenKind::Reg8),
            ("%dx", TokenKind::Reg16),
            ("%sp", TokenKind::Reg16),
            ("%eax", TokenKind::Reg32),
            ("%r8d", TokenKind::Reg32),
            ("%rax", TokenKind::Reg64),
            ("%r10", TokenKind::Reg64),
        ];
        for (src, kind) in cases {
            let tokens = tokenize(src);
            assert_eq!(tokens[0].kind, kind, "{src}");
            assert_eq!(tokens[0].lexeme, src);
        }
    }

    #[test]
    fn register_match_is_longest_prefix() {
        // %r8b is one 8-bit register, not %r8 + "b".
        let tokens = tokenize("%r8b");
        assert_eq!(tokens[0].kind, TokenKind::Reg8);
        assert_eq!(tokens[0].lexeme, "%r8b");

        // %raxx: %rax matches, the trailing "x" re-lexes as a name.
        let tokens = tokenize("%raxx");
        assert_eq!(tokens[0].kind, TokenKind::Reg64);
        assert_eq!(tokens[0].lexeme, "%rax");
        assert_eq!(tokens[1].kind, TokenKind::LabelName);
        assert_eq!(tokens[1].lexeme, "x");
    }

    #[test]
    fn stray_percent_is_an_error_token() {
        let tokens = tokenize("%zzz");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "%");
        assert_eq!(tokens[1].kind, TokenKind::LabelName);
    }

    #[test]
    fn mnemonic_families() {
        let cases = [
            ("movsb", TokenKind::Insn0),
            ("stosq", TokenKind::Insn0),
            ("cmps", TokenKind::Insn0),
            ("pushfq", TokenKind::Insn0Wq),
            ("popf", TokenKind::Insn0Wq),
            ("ret", TokenKind::Insn0NoSuff),
            ("hlt", TokenKind::Insn0NoSuff),
            ("nop", TokenKind::Insn0NoSuff),
            ("clc", TokenKind::Insn0NoSuff),
            ("sti", TokenKind::Insn0NoSuff),
            ("int", TokenKind::Insn1S),
            ("leaq", TokenKind::InsnLea),
            ("pushq", TokenKind::Insn1E),
            ("pop", TokenKind::Insn1E),
            ("negb", TokenKind::Insn1E),
            ("notl", TokenKind::Insn1E),
            ("shlq", TokenKind::InsnShift),
            ("sarw", TokenKind::InsnShift),
            ("rcr", TokenKind::InsnShift),
            ("je", TokenKind::Insn1M),
            ("jnae", TokenKind::Insn1M),
            ("jz", TokenKind::Insn1M),
            ("jmpq", TokenKind::InsnJc),
            ("call", TokenKind::InsnJc),
            ("movq", TokenKind::InsnBE),
            ("testb", TokenKind::InsnBE),
            ("or", TokenKind::InsnBE),
            ("xorl", TokenKind::InsnBE),
            ("movzbq", TokenKind::InsnExt),
            ("movswl", TokenKind::InsnExt),
            ("movzqb", TokenKind::InsnExt),
            ("inb", TokenKind::InsnIn),
            ("in", TokenKind::InsnIn),
            ("outw", TokenKind::InsnOut),
            ("insb", TokenKind::InsnIoS),
            ("outsl", TokenKind::InsnIoS),
            ("ins", TokenKind::InsnIoS),
            ("insq", TokenKind::InsnIoS),
            ("iret", TokenKind::Iret),
        ];
        for (src, kind) in cases {
            let tokens = tokenize(src);
            assert_eq!(tokens[0].kind, kind, "{src}");
        }
    }

    #[test]
    fn string_mnemonics_disambiguate_from_extensions() {
        // movs + one size letter is a string move; two letters extend.
        assert_eq!(tokenize("movsw")[0].kind, TokenKind::Insn0);
        assert_eq!(tokenize("movswq")[0].kind, TokenKind::InsnExt);
        assert_eq!(tokenize("movs")[0].kind, TokenKind::Insn0);
    }

    #[test]
    fn case_insensitive_keywords() {
        assert_eq!(tokenize("MOVQ")[0].kind, TokenKind::InsnBE);
        assert_eq!(tokenize("Ret")[0].kind, TokenKind::Insn0NoSuff);
        assert_eq!(tokenize(".DATA")[0].kind, TokenKind::Directive);
        assert_eq!(tokenize("%RAX")[0].kind, TokenKind::Reg64);
        assert_eq!(tokenize("0XfF")[0].kind, TokenKind::Int);
    }

    #[test]
    fn label_definition_beats_mnemonic() {
        let tokens = tokenize("mov:");
        assert_eq!(tokens[0].kind, TokenKind::Label);
        assert_eq!(tokens[0].lexeme, "mov:");
    }

    #[test]
    fn label_names() {
        for src in ["loop2", "_start", ".l1", "a-b", "x.y"] {
            let tokens = tokenize(src);
            assert_eq!(tokens[0].kind, TokenKind::LabelName, "{src}");
            assert_eq!(tokens[0].lexeme, src);
        }
    }

    #[test]
    fn mnemonic_with_junk_suffix_is_a_label_name() {
        assert_eq!(tokenize("movx")[0].kind, TokenKind::LabelName);
        assert_eq!(tokenize("pushfb")[0].kind, TokenKind::LabelName);
        assert_eq!(tokenize("retq")[0].kind, TokenKind::LabelName);
    }

    #[test]
    fn punctuation() {
        let k = kinds("$ = + - * / ( ) ,");
        let expect = [
            TokenKind::Dollar,
            TokenKind::Equals,
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::Comma,
        ];
        let visible: Vec<_> = k
            .into_iter()
            .filter(|k| !matches!(k, TokenKind::Whitespace | TokenKind::Eof))
            .collect();
        assert_eq!(visible, expect);
    }

    #[test]
    fn memory_operand_tokens() {
        let k = visible_kinds("-8(%rbp, %rcx, 4)");
        assert_eq!(
            k,
            vec![
                TokenKind::Minus,
                TokenKind::Int,
                TokenKind::OpenParen,
                TokenKind::Reg64,
                TokenKind::Comma,
                TokenKind::Reg64,
                TokenKind::Comma,
                TokenKind::Int,
                TokenKind::CloseParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_literal_raw_lexeme() {
        let tokens = tokenize(".ascii \"a\\nb\"");
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].lexeme, "\"a\\nb\"");
    }

    #[test]
    fn string_stops_at_raw_newline() {
        let tokens = tokenize("\"abc\ndef\"");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "\"abc");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
    }

    #[test]
    fn unescape_basic() {
        assert_eq!(unescape_string("\"ab\"").unwrap(), b"ab");
        assert_eq!(unescape_string("\"a\\tb\\n\"").unwrap(), b"a\tb\n");
        assert_eq!(unescape_string("\"\\\\\\\"\"").unwrap(), b"\\\"");
    }

    #[test]
    fn unescape_octal() {
        assert_eq!(unescape_string("\"\\0\"").unwrap(), b"\0");
        assert_eq!(unescape_string("\"\\101\"").unwrap(), b"A");
        assert_eq!(unescape_string("\"\\1018\"").unwrap(), b"A8");
    }

    #[test]
    fn unescape_line_continuation() {
        assert_eq!(unescape_string("\"ab\\\ncd\"").unwrap(), b"abcd");
    }

    #[test]
    fn unescape_unterminated() {
        assert!(unescape_string("\"abc").is_none());
    }

    #[test]
    fn error_tokens_are_single_characters() {
        let tokens = tokenize("@!");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "@");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].lexeme, "!");
    }

    #[test]
    fn non_ascii_is_an_error_token() {
        let tokens = tokenize("é");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "é");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn lexeme_bytes_reconstruct_input() {
        let src = ".data\nfoo: .quad 0x10 # c\n.text\n movq foo, %rax /* x */\n.end\n";
        let total: String = tokenize(src).iter().map(|t| t.lexeme).collect();
        assert_eq!(total, src);
    }

    #[test]
    fn span_positions() {
        let tokens = tokenize("nop\nmovq $1, %rax");
        assert_eq!(tokens[0].span, Span::new(1, 1, 0, 3)); // nop
        assert_eq!(tokens[2].span.line, 2); // movq
        assert_eq!(tokens[2].span.col, 1);
        let dollar = tokens.iter().find(|t| t.kind == TokenKind::Dollar).unwrap();
        assert_eq!(dollar.span.line, 2);
        assert_eq!(dollar.span.col, 6);
    }

    #[test]
    fn split_mnemonic_parts() {
        assert_eq!(split_mnemonic(TokenKind::InsnBE, "movq"), ("mov", "q"));
        assert_eq!(split_mnemonic(TokenKind::InsnBE, "test"), ("test", ""));
        assert_eq!(split_mnemonic(TokenKind::InsnExt, "movzbq"), ("movz", "bq"));
        assert_eq!(split_mnemonic(TokenKind::InsnIoS, "outsl"), ("outs", "l"));
        assert_eq!(split_mnemonic(TokenKind::InsnIoS, "ins"), ("ins", ""));
        assert_eq!(split_mnemonic(TokenKind::Insn0Wq, "pushfq"), ("pushf", "q"));
    }
}
