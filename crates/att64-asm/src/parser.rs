//! Grammar-directed parser for the assembly dialect.
//!
//! Pulls tokens from the lexer's output in a single forward pass (one-token
//! lookahead, plus one more to split a bare displacement from a displacement
//! followed by a register block) and writes data, instructions, and symbols
//! straight into the [`Program`]. Statement-level errors are collected and
//! the parser resynchronises at the next newline, so a parse always yields
//! a (possibly partial) `Program` together with every error found.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{ParseError, Span};
use crate::ir::{
    DataImage, DriverKey, Instruction, MemOperand, Mnemonic, Operand, Program, Reg, RegSize,
};
use crate::lexer::{self, Token, TokenKind};

/// Parse a token stream into a program plus the list of errors found.
///
/// Hidden tokens (whitespace, comments) are skipped; `Error` tokens are
/// reported as syntax errors. The parse never fails as a whole: malformed
/// statements are skipped up to the next newline and parsing resumes.
#[must_use]
pub fn parse<'src>(tokens: &[Token<'src>]) -> (Program, Vec<ParseError>) {
    let mut toks: Vec<Token<'src>> = tokens.iter().filter(|t| !t.is_hidden()).copied().collect();
    if toks.last().map(|t| t.kind) != Some(TokenKind::Eof) {
        let span = toks
            .last()
            .map(|t| Span::new(t.span.line, t.span.col, t.span.offset + t.span.len, 0))
            .unwrap_or_default();
        toks.push(Token {
            kind: TokenKind::Eof,
            lexeme: "",
            span,
        });
    }
    let mut parser = Parser {
        tokens: toks,
        pos: 0,
        program: Program::new(),
        errors: Vec::new(),
    };
    parser.run();
    (parser.program, parser.errors)
}

fn err_unexpected(tok: Token<'_>, what: &str) -> ParseError {
    if tok.kind == TokenKind::Error {
        ParseError::UnexpectedCharacter {
            ch: tok.lexeme.chars().next().unwrap_or('\u{fffd}'),
            span: tok.span,
        }
    } else {
        let found = if tok.kind == TokenKind::Eof {
            String::from("end of input")
        } else {
            String::from(tok.lexeme)
        };
        ParseError::UnexpectedToken {
            expected: String::from(what),
            found,
            span: tok.span,
        }
    }
}

/// Convert an integer literal (decimal, `0x`, `0b`) to its 64-bit
/// two's-complement value.
fn int_value(tok: &Token<'_>) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        literal: String::from(tok.lexeme),
        span: tok.span,
    };
    if tok.lexeme.len() > 32 {
        return Err(invalid());
    }
    let mut buf = [0u8; 32];
    let lower = lexer::to_lower_buf(tok.lexeme, &mut buf);
    let (radix, digits) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, lower)
    };
    u64::from_str_radix(digits, radix)
        .map(|v| v as i64)
        .map_err(|_| invalid())
}

fn is_reg_kind(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Reg8 | TokenKind::Reg16 | TokenKind::Reg32 | TokenKind::Reg64
    )
}

fn is_mnemonic_kind(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Insn0
            | TokenKind::Insn0Wq
            | TokenKind::Insn0NoSuff
            | TokenKind::Insn1S
            | TokenKind::InsnLea
            | TokenKind::Insn1E
            | TokenKind::InsnShift
            | TokenKind::Insn1M
            | TokenKind::InsnJc
            | TokenKind::InsnBE
            | TokenKind::InsnExt
            | TokenKind::InsnIn
            | TokenKind::InsnOut
            | TokenKind::InsnIoS
    )
}

fn starts_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Int
            | TokenKind::Flonum
            | TokenKind::Dot
            | TokenKind::LabelName
            | TokenKind::OpenParen
            | TokenKind::Minus
    )
}

/// Does the token after a bare label continue an addressing expression
/// (making the label part of a displacement) rather than end the operand?
fn expr_continues(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::OpenParen
    )
}

fn directive_is(tok: &Token<'_>, name: &str) -> bool {
    tok.kind == TokenKind::Directive && tok.lexeme.eq_ignore_ascii_case(name)
}

fn starts_section(tok: &Token<'_>) -> bool {
    tok.kind == TokenKind::Directive
        && [".data", ".bss", ".text", ".driver", ".handler", ".end"]
            .iter()
            .any(|d| tok.lexeme.eq_ignore_ascii_case(d))
}

fn data_directive_width(tok: &Token<'_>) -> Option<u8> {
    for (name, width) in [(".byte", 1), (".word", 2), (".long", 4), (".quad", 8)] {
        if tok.lexeme.eq_ignore_ascii_case(name) {
            return Some(width);
        }
    }
    None
}

/// A register operand must agree with the instruction suffix when one is
/// present. Memory operands carry the suffix width and need no check.
fn check_suffix(op: &Operand, size: Option<RegSize>, span: Span) -> Result<(), ParseError> {
    if let (Some(sz), Operand::Reg(r)) = (size, op) {
        if r.size != sz {
            return Err(ParseError::SuffixMismatch { span });
        }
    }
    Ok(())
}

/// Port I/O uses a fixed register pattern: the port in `%dx`, the value in
/// the id-0 accumulator of the suffix width.
fn check_io_pattern(
    port: Reg,
    acc: Reg,
    size: Option<RegSize>,
    base: &str,
    span: Span,
) -> Result<(), ParseError> {
    let port_ok = port.id == 2 && port.size == RegSize::Word;
    let acc_ok = acc.id == 0 && size.map_or(true, |s| acc.size == s);
    if port_ok && acc_ok {
        Ok(())
    } else {
        Err(ParseError::WrongOperands {
            mnemonic: String::from(base),
            span,
        })
    }
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
    program: Program,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    #[inline]
    fn peek(&self) -> Token<'src> {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    fn peek2(&self) -> Token<'src> {
        self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    #[inline]
    fn advance(&mut self) -> Token<'src> {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'src>, ParseError> {
        let tok = self.peek();
        if tok.kind == kind {
            self.advance();
            Ok(tok)
        } else {
            Err(err_unexpected(tok, what))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip-to-newline recovery: drop tokens up to the next statement
    /// separator, then consume it, so the next statement parses on its own.
    fn synchronize(&mut self) {
        while !self.at_end() && !self.check(TokenKind::Newline) {
            self.advance();
        }
        if self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Run a statement production; on error, record it and resynchronise.
    fn recover<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self) -> Result<(), ParseError>,
    {
        if let Err(e) = f(self) {
            self.errors.push(e);
            self.synchronize();
        }
    }

    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(err_unexpected(tok, "end of statement")),
        }
    }

    // ── Top level ───────────────────────────────────────────

    fn run(&mut self) {
        self.skip_newlines();
        let mut saw_end = false;
        while !self.at_end() {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Dot => self.recover(|p| {
                    p.loc_counter_statement()?;
                    p.expect_line_end()
                }),
                TokenKind::Directive => {
                    if directive_is(&tok, ".data") || directive_is(&tok, ".bss") {
                        self.data_section();
                    } else if directive_is(&tok, ".text") {
                        self.text_section();
                    } else if directive_is(&tok, ".driver") || directive_is(&tok, ".handler") {
                        self.driver_block();
                    } else if directive_is(&tok, ".org") {
                        self.recover(|p| {
                            p.advance();
                            p.org_body()?;
                            p.expect_line_end()
                        });
                    } else if directive_is(&tok, ".end") {
                        self.advance();
                        saw_end = true;
                        self.skip_newlines();
                        if !self.at_end() {
                            let trailing = self.peek();
                            self.errors
                                .push(err_unexpected(trailing, "end of input after '.end'"));
                        }
                        break;
                    } else {
                        self.errors.push(err_unexpected(tok, "a section directive"));
                        self.synchronize();
                    }
                }
                _ => {
                    self.errors.push(err_unexpected(tok, "a section directive"));
                    self.synchronize();
                }
            }
        }
        if !saw_end {
            self.errors.push(err_unexpected(self.peek(), "'.end'"));
        }
    }

    // ── Data sections ───────────────────────────────────────

    fn data_section(&mut self) {
        self.advance(); // .data / .bss
        self.recover(Self::expect_line_end);
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Eof => return,
                TokenKind::Directive if starts_section(&tok) => return,
                _ => self.recover(Self::data_statement),
            }
        }
    }

    fn data_statement(&mut self) -> Result<(), ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Dot => {
                self.loc_counter_statement()?;
                self.expect_line_end()
            }
            TokenKind::Directive => {
                self.advance();
                self.data_directive_body(tok)?;
                self.expect_line_end()
            }
            TokenKind::Label => {
                self.advance();
                self.define_label_token(tok)?;
                let next = self.peek();
                if next.kind == TokenKind::Directive {
                    self.advance();
                    self.data_directive_body(next)?;
                }
                self.expect_line_end()
            }
            TokenKind::LabelName => {
                // NAME = Expression
                self.advance();
                self.expect(TokenKind::Equals, "'='")?;
                let value = self.expression()?;
                let name = tok.lexeme.to_ascii_lowercase();
                self.program.set_symbol(&name, value as u64);
                self.expect_line_end()
            }
            _ => Err(err_unexpected(tok, "a data statement")),
        }
    }

    fn data_directive_body(&mut self, dir: Token<'src>) -> Result<(), ParseError> {
        if let Some(width) = data_directive_width(&dir) {
            return self.emit_data_values(width, dir.span);
        }
        if directive_is(&dir, ".ascii") {
            self.emit_ascii()
        } else if directive_is(&dir, ".fill") {
            self.fill_body(dir.span)
        } else if directive_is(&dir, ".comm") {
            self.comm_body()
        } else if directive_is(&dir, ".equ") {
            self.equ_body()
        } else if directive_is(&dir, ".org") {
            self.org_body()
        } else {
            Err(err_unexpected(dir, "a data directive"))
        }
    }

    fn emit_data_values(&mut self, width: u8, span: Span) -> Result<(), ParseError> {
        loop {
            let value = self.expression()?;
            self.write_image(value, width, span)?;
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                return Ok(());
            }
        }
    }

    fn emit_ascii(&mut self) -> Result<(), ParseError> {
        let tok = self.expect(TokenKind::Str, "a string literal")?;
        let bytes = lexer::unescape_string(tok.lexeme)
            .ok_or(ParseError::UnterminatedString { span: tok.span })?;
        for b in bytes {
            self.write_image(i64::from(b), 1, tok.span)?;
        }
        Ok(())
    }

    fn fill_body(&mut self, span: Span) -> Result<(), ParseError> {
        let count = self.expression()?;
        let mut size: i64 = 1;
        let mut value: i64 = 0;
        if self.check(TokenKind::Comma) {
            self.advance();
            size = self.expression()?;
            if self.check(TokenKind::Comma) {
                self.advance();
                value = self.expression()?;
            }
        }
        // GAS semantics: the unit size is capped at 8 and only the low four
        // bytes of the value are used; the rest of each unit is zero.
        let size = size.clamp(0, 8) as u8;
        let value = value & 0xFFFF_FFFF;
        if size > 0 && count > 0 {
            for _ in 0..count {
                self.write_image(value, size, span)?;
            }
        }
        Ok(())
    }

    fn comm_body(&mut self) -> Result<(), ParseError> {
        let name_tok = self.expect(TokenKind::LabelName, "a symbol name")?;
        self.expect(TokenKind::Comma, "','")?;
        let size = self.expression()?;
        let name = name_tok.lexeme.to_ascii_lowercase();
        let addr = self.program.location_counter;
        if !self.program.define_label(&name, addr) {
            return Err(ParseError::DuplicateLabel {
                label: name,
                span: name_tok.span,
            });
        }
        // Reserved space is uninitialised; the image reads back zeros.
        self.program.location_counter = addr.wrapping_add(size as u64);
        Ok(())
    }

    fn equ_body(&mut self) -> Result<(), ParseError> {
        let name_tok = self.expect(TokenKind::LabelName, "a symbol name")?;
        self.expect(TokenKind::Comma, "','")?;
        let value = self.expression()?;
        let name = name_tok.lexeme.to_ascii_lowercase();
        self.program.set_symbol(&name, value as u64);
        Ok(())
    }

    fn write_image(&mut self, value: i64, width: u8, span: Span) -> Result<(), ParseError> {
        let addr = self.program.location_counter;
        if !self.program.data.write_le(addr, value, width) {
            return Err(ParseError::DataImageLimit {
                limit: DataImage::LIMIT,
                span,
            });
        }
        self.program.location_counter = addr.wrapping_add(u64::from(width));
        Ok(())
    }

    // ── Location counter ────────────────────────────────────

    /// `. = Expression`
    fn loc_counter_statement(&mut self) -> Result<(), ParseError> {
        self.advance(); // '.'
        self.expect(TokenKind::Equals, "'='")?;
        let value = self.expression()?;
        self.program.location_counter = value as u64;
        Ok(())
    }

    /// `.org addr`, `.org addr, fill` or `.org , addr` — the extra
    /// comma-separated value is accepted and ignored.
    fn org_body(&mut self) -> Result<(), ParseError> {
        let addr = if self.check(TokenKind::Comma) {
            self.advance();
            self.expression()?
        } else {
            let addr = self.expression()?;
            if self.check(TokenKind::Comma) {
                self.advance();
                let _ = self.expression()?;
            }
            addr
        };
        self.program.location_counter = addr as u64;
        Ok(())
    }

    fn define_label_token(&mut self, tok: Token<'src>) -> Result<(), ParseError> {
        let name = tok.lexeme.strip_suffix(':').unwrap_or(tok.lexeme);
        let name = name.to_ascii_lowercase();
        let addr = self.program.location_counter;
        if !self.program.define_label(&name, addr) {
            return Err(ParseError::DuplicateLabel {
                label: name,
                span: tok.span,
            });
        }
        Ok(())
    }

    // ── Code sections ───────────────────────────────────────

    fn text_section(&mut self) {
        self.advance(); // .text
        self.recover(Self::expect_line_end);
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Eof => return,
                TokenKind::Directive if starts_section(&tok) => return,
                _ => self.recover(Self::code_statement),
            }
        }
    }

    fn code_statement(&mut self) -> Result<(), ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Label => {
                self.advance();
                self.define_label_token(tok)?;
                if is_mnemonic_kind(self.peek().kind) {
                    let insn = self.instruction()?;
                    self.push_code(insn);
                }
                self.expect_line_end()
            }
            TokenKind::Dot => {
                self.loc_counter_statement()?;
                self.expect_line_end()
            }
            TokenKind::Directive if directive_is(&tok, ".org") => {
                self.advance();
                self.org_body()?;
                self.expect_line_end()
            }
            k if is_mnemonic_kind(k) => {
                let insn = self.instruction()?;
                self.push_code(insn);
                self.expect_line_end()
            }
            _ => Err(err_unexpected(tok, "an instruction")),
        }
    }

    fn push_code(&mut self, insn: Instruction) {
        self.program.code.push(insn);
        // Each instruction occupies one location-counter slot, so labels in
        // code map onto instruction indices.
        self.program.location_counter = self.program.location_counter.wrapping_add(1);
    }

    // ── Driver blocks ───────────────────────────────────────

    fn driver_block(&mut self) {
        self.advance(); // .driver / .handler
        let key = match self.peek().kind {
            TokenKind::Int => {
                let tok = self.advance();
                match int_value(&tok) {
                    Ok(n) => DriverKey::Interrupt(n),
                    Err(e) => {
                        self.errors.push(e);
                        self.synchronize();
                        return;
                    }
                }
            }
            TokenKind::LabelName => {
                let tok = self.advance();
                DriverKey::Label(tok.lexeme.to_ascii_lowercase())
            }
            _ => {
                self.errors
                    .push(err_unexpected(self.peek(), "an interrupt number or label"));
                self.synchronize();
                return;
            }
        };
        self.recover(Self::expect_line_end);

        let mut body: Vec<Instruction> = Vec::new();
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Iret => {
                    self.advance();
                    body.push(Instruction::Transfer {
                        mnemonic: Mnemonic::from("iret"),
                        target: None,
                    });
                    self.program.location_counter =
                        self.program.location_counter.wrapping_add(1);
                    self.recover(Self::expect_line_end);
                    break;
                }
                TokenKind::Eof => {
                    self.errors.push(err_unexpected(tok, "'iret'"));
                    break;
                }
                TokenKind::Directive if starts_section(&tok) => {
                    self.errors.push(err_unexpected(tok, "'iret'"));
                    break;
                }
                _ => {
                    if let Err(e) = self.driver_statement(&mut body) {
                        self.errors.push(e);
                        self.synchronize();
                    }
                }
            }
        }
        self.program.drivers.insert(key, body);
    }

    fn driver_statement(&mut self, body: &mut Vec<Instruction>) -> Result<(), ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Label => {
                self.advance();
                self.define_label_token(tok)?;
                if is_mnemonic_kind(self.peek().kind) {
                    let insn = self.instruction()?;
                    body.push(insn);
                    self.program.location_counter =
                        self.program.location_counter.wrapping_add(1);
                }
                self.expect_line_end()
            }
            TokenKind::Dot => {
                self.loc_counter_statement()?;
                self.expect_line_end()
            }
            TokenKind::Directive if directive_is(&tok, ".org") => {
                self.advance();
                self.org_body()?;
                self.expect_line_end()
            }
            k if is_mnemonic_kind(k) => {
                let insn = self.instruction()?;
                body.push(insn);
                self.program.location_counter = self.program.location_counter.wrapping_add(1);
                self.expect_line_end()
            }
            _ => Err(err_unexpected(tok, "an instruction")),
        }
    }

    // ── Expressions ─────────────────────────────────────────

    /// `Expression = Term { ('+'|'-') Term }`, left-associative, 64-bit
    /// two's-complement.
    fn expression(&mut self) -> Result<i64, ParseError> {
        let mut value = self.term()?;
        loop {
            match self.peek().kind {
                TokenKind::Plus => {
                    self.advance();
                    value = value.wrapping_add(self.term()?);
                }
                TokenKind::Minus => {
                    self.advance();
                    value = value.wrapping_sub(self.term()?);
                }
                _ => return Ok(value),
            }
        }
    }

    /// `Term = Primary { ('*'|'/') Primary }`
    fn term(&mut self) -> Result<i64, ParseError> {
        let mut value = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Star => {
                    self.advance();
                    value = value.wrapping_mul(self.primary()?);
                }
                TokenKind::Slash => {
                    let span = self.peek().span;
                    self.advance();
                    let rhs = self.primary()?;
                    if rhs == 0 {
                        return Err(ParseError::DivisionByZero { span });
                    }
                    value = value.wrapping_div(rhs);
                }
                _ => return Ok(value),
            }
        }
    }

    /// `Primary = INTEGER | '.' | LABEL_NAME | '(' Expression ')' | '-' Primary`
    fn primary(&mut self) -> Result<i64, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Int => {
                self.advance();
                int_value(&tok)
            }
            TokenKind::Flonum => Err(ParseError::Flonum { span: tok.span }),
            TokenKind::Dot => {
                self.advance();
                Ok(self.program.location_counter as i64)
            }
            TokenKind::LabelName => {
                self.advance();
                let name = tok.lexeme.to_ascii_lowercase();
                match self.program.lookup(&name) {
                    Some(value) => Ok(value as i64),
                    None => Err(ParseError::UndefinedSymbol {
                        name,
                        span: tok.span,
                    }),
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::CloseParen, "')'")?;
                Ok(value)
            }
            TokenKind::Minus => {
                self.advance();
                Ok(self.primary()?.wrapping_neg())
            }
            _ => Err(err_unexpected(tok, "an expression")),
        }
    }

    // ── Operand parsers ─────────────────────────────────────

    fn register(&mut self) -> Result<Reg, ParseError> {
        let tok = self.peek();
        if !is_reg_kind(tok.kind) {
            return Err(err_unexpected(tok, "a register"));
        }
        self.advance();
        let mut buf = [0u8; 8];
        let name = lexer::to_lower_buf(&tok.lexeme[1..], &mut buf);
        Reg::parse(name).ok_or_else(|| err_unexpected(tok, "a register"))
    }

    /// `FormatE = Register | Addressing`
    fn format_e(&mut self, size: Option<RegSize>) -> Result<Operand, ParseError> {
        if is_reg_kind(self.peek().kind) {
            Ok(Operand::Reg(self.register()?))
        } else {
            Ok(Operand::Mem(self.addressing(size)?))
        }
    }

    /// `FormatM = label | Addressing` — a bare label resolves eagerly
    /// against the symbol table; forward references are not supported.
    fn format_m(&mut self, size: Option<RegSize>) -> Result<MemOperand, ParseError> {
        let tok = self.peek();
        if tok.kind == TokenKind::LabelName && !expr_continues(self.peek2().kind) {
            self.advance();
            let name = tok.lexeme.to_ascii_lowercase();
            match self.program.lookup(&name) {
                Some(addr) => Ok(MemOperand::direct(addr as i32, size)),
                None => Err(ParseError::UndefinedLabel {
                    label: name,
                    span: tok.span,
                }),
            }
        } else {
            self.addressing(size)
        }
    }

    /// `FormatB = '$' Expression | Register | FormatM`
    fn format_b(&mut self, size: Option<RegSize>) -> Result<Operand, ParseError> {
        match self.peek().kind {
            TokenKind::Dollar => {
                self.advance();
                Ok(Operand::Imm(self.expression()?))
            }
            k if is_reg_kind(k) => Ok(Operand::Reg(self.register()?)),
            _ => Ok(Operand::Mem(self.format_m(size)?)),
        }
    }

    /// `FormatK = '$' Expression`, narrowed to 32 bits (the shift count).
    fn format_k(&mut self) -> Result<i32, ParseError> {
        self.expect(TokenKind::Dollar, "'$'")?;
        Ok(self.expression()? as i32)
    }

    /// `Addressing = [ Expression ] [ '(' Reg [ ',' Reg ',' INTEGER ] ')' ]`
    /// with at least one of the two parts present.
    fn addressing(&mut self, size: Option<RegSize>) -> Result<MemOperand, ParseError> {
        let lead = self.peek();
        // One extra token of lookahead: '(' starting a register block vs
        // '(' opening a parenthesised displacement expression.
        let block_first = lead.kind == TokenKind::OpenParen && is_reg_kind(self.peek2().kind);
        let mut disp = None;
        if !block_first && starts_expression(lead.kind) {
            disp = Some(self.expression()? as i32);
        }

        let mut base = None;
        let mut index = None;
        let mut scale = None;
        let mut has_block = false;
        if self.check(TokenKind::OpenParen) {
            self.advance();
            has_block = true;
            base = Some(self.register()?);
            if self.check(TokenKind::Comma) {
                self.advance();
                index = Some(self.register()?);
                self.expect(TokenKind::Comma, "','")?;
                let scale_tok = self.expect(TokenKind::Int, "a scale factor")?;
                scale = Some(int_value(&scale_tok)? as u8);
            }
            self.expect(TokenKind::CloseParen, "')'")?;
        }

        if disp.is_none() && !has_block {
            return Err(err_unexpected(lead, "a memory operand"));
        }
        if let (Some(b), Some(i)) = (base, index) {
            if b.size != i.size {
                return Err(ParseError::OperandSizeMismatch { span: lead.span });
            }
        }
        Ok(MemOperand {
            base,
            index,
            scale,
            disp,
            operand_size: size,
        })
    }

    // ── Instruction classifier ──────────────────────────────

    /// Strip the size suffix from the matched mnemonic, parse operands per
    /// the family's format, validate sizes, and build the instruction.
    fn instruction(&mut self) -> Result<Instruction, ParseError> {
        let tok = self.advance();
        let span = tok.span;
        let mut buf = [0u8; 8];
        let lower = lexer::to_lower_buf(tok.lexeme, &mut buf);
        let (base, suffix) = lexer::split_mnemonic(tok.kind, lower);
        let size = suffix
            .as_bytes()
            .first()
            .and_then(|&c| RegSize::from_suffix(c));
        let mnemonic = Mnemonic::from(base);

        match tok.kind {
            TokenKind::Insn0 | TokenKind::Insn0Wq => Ok(Instruction::Move {
                mnemonic,
                src: None,
                dst: None,
                size_hint: size,
            }),

            TokenKind::Insn0NoSuff => match base {
                "ret" => Ok(Instruction::Transfer {
                    mnemonic,
                    target: None,
                }),
                "hlt" | "nop" => Ok(Instruction::Empty {
                    mnemonic,
                    interrupt: None,
                }),
                _ => Ok(Instruction::Flag { mnemonic }),
            },

            TokenKind::Insn1S => {
                let num = self.expect(TokenKind::Int, "an interrupt number")?;
                Ok(Instruction::Empty {
                    mnemonic,
                    interrupt: Some(int_value(&num)?),
                })
            }

            TokenKind::Insn1E => {
                let op = self.format_e(size)?;
                check_suffix(&op, size, span)?;
                let hint = if op.size().is_none() { size } else { None };
                match base {
                    "push" => Ok(Instruction::Move {
                        mnemonic,
                        src: Some(op),
                        dst: None,
                        size_hint: hint,
                    }),
                    "pop" => Ok(Instruction::Move {
                        mnemonic,
                        src: None,
                        dst: Some(op),
                        size_hint: hint,
                    }),
                    _ => Ok(Instruction::Binary {
                        mnemonic,
                        src: None,
                        dst: op,
                    }),
                }
            }

            TokenKind::InsnShift => {
                let count = if self.check(TokenKind::Dollar) {
                    let k = self.format_k()?;
                    self.expect(TokenKind::Comma, "','")?;
                    Some(k)
                } else {
                    None
                };
                let dst = self.register()?;
                if let Some(sz) = size {
                    if dst.size != sz {
                        return Err(ParseError::SuffixMismatch { span });
                    }
                }
                Ok(Instruction::Shift {
                    mnemonic,
                    count,
                    dst,
                })
            }

            TokenKind::Insn1M => {
                // Conditional jumps take no suffix; targets are code
                // addresses, always 8 bytes wide.
                let target = self.format_m(Some(RegSize::Quad))?;
                Ok(Instruction::CondJump { mnemonic, target })
            }

            TokenKind::InsnJc => {
                if self.check(TokenKind::Star) {
                    self.advance();
                    let reg = self.register()?;
                    if let Some(sz) = size {
                        if reg.size != sz {
                            return Err(ParseError::SuffixMismatch { span });
                        }
                    }
                    Ok(Instruction::Transfer {
                        mnemonic,
                        target: Some(Operand::Reg(reg)),
                    })
                } else {
                    let target = self.format_m(Some(size.unwrap_or(RegSize::Quad)))?;
                    Ok(Instruction::Transfer {
                        mnemonic,
                        target: Some(Operand::Mem(target)),
                    })
                }
            }

            TokenKind::InsnBE => {
                let src = self.format_b(size)?;
                self.expect(TokenKind::Comma, "','")?;
                let dst = self.format_e(size)?;
                check_suffix(&src, size, span)?;
                check_suffix(&dst, size, span)?;
                if size.is_none() {
                    if let (Some(a), Some(b)) = (src.size(), dst.size()) {
                        if a != b {
                            return Err(ParseError::OperandSizeMismatch { span });
                        }
                    }
                }
                let hint = if src.size().is_none() && dst.size().is_none() {
                    size
                } else {
                    None
                };
                if base == "mov" {
                    Ok(Instruction::Move {
                        mnemonic,
                        src: Some(src),
                        dst: Some(dst),
                        size_hint: hint,
                    })
                } else {
                    Ok(Instruction::Binary {
                        mnemonic,
                        src: Some(src),
                        dst,
                    })
                }
            }

            TokenKind::InsnExt => {
                let pair = suffix.as_bytes();
                let (src_size, dst_size) = match (
                    pair.first().copied().and_then(RegSize::from_suffix),
                    pair.get(1).copied().and_then(RegSize::from_suffix),
                ) {
                    (Some(s), Some(d)) => (s, d),
                    _ => return Err(err_unexpected(tok, "an extension size suffix")),
                };
                if src_size >= dst_size {
                    return Err(ParseError::ExtensionOrder {
                        from: src_size.bytes(),
                        to: dst_size.bytes(),
                        span,
                    });
                }
                let src = self.format_e(Some(src_size))?;
                self.expect(TokenKind::Comma, "','")?;
                let dst = self.register()?;
                if let Some(s) = src.size() {
                    if s != src_size {
                        return Err(ParseError::OperandSizeMismatch { span });
                    }
                }
                if dst.size != dst_size {
                    return Err(ParseError::OperandSizeMismatch { span });
                }
                Ok(Instruction::Move {
                    mnemonic,
                    src: Some(src),
                    dst: Some(Operand::Reg(dst)),
                    size_hint: None,
                })
            }

            TokenKind::InsnLea => {
                let src = self.format_e(size)?;
                self.expect(TokenKind::Comma, "','")?;
                let dst = self.format_e(size)?;
                check_suffix(&src, size, span)?;
                check_suffix(&dst, size, span)?;
                Ok(Instruction::Move {
                    mnemonic,
                    src: Some(src),
                    dst: Some(dst),
                    size_hint: None,
                })
            }

            TokenKind::InsnIn => {
                let port = self.register()?;
                self.expect(TokenKind::Comma, "','")?;
                let acc = self.register()?;
                check_io_pattern(port, acc, size, base, span)?;
                Ok(Instruction::PortIo {
                    mnemonic,
                    size: size.unwrap_or(acc.size),
                })
            }

            TokenKind::InsnOut => {
                let acc = self.register()?;
                self.expect(TokenKind::Comma, "','")?;
                let port = self.register()?;
                check_io_pattern(port, acc, size, base, span)?;
                Ok(Instruction::PortIo {
                    mnemonic,
                    size: size.unwrap_or(acc.size),
                })
            }

            TokenKind::InsnIoS => match size {
                Some(sz) if sz != RegSize::Quad => Ok(Instruction::PortIo { mnemonic, size: sz }),
                _ => Err(ParseError::WrongSizeSuffix {
                    mnemonic: String::from(base),
                    span,
                }),
            },

            _ => Err(err_unexpected(tok, "an instruction")),
        }
    }
}
