//! Serde round-trip tests for the public IR types.
//!
//! Validates that the program model serializes to JSON and deserializes
//! back to identical values, so simulators and editors can persist or ship
//! parse results across a process boundary.

#![cfg(feature = "serde")]

use att64_asm::{
    assemble, tokenize, DriverKey, Instruction, MemOperand, Mnemonic, Operand, ParseError,
    Program, Reg, RegSize, Span, Token,
};

/// Helper: serialize to JSON, deserialize back, assert equality.
fn round_trip<T>(val: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let json = serde_json::to_string(val).expect("serialize");
    let back: T = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(val, &back, "round-trip mismatch for JSON: {json}");
}

// ─── Span ───────────────────────────────────────────────────────────────────

#[test]
fn serde_span() {
    round_trip(&Span::new(1, 5, 10, 3));
    round_trip(&Span::default());
}

// ─── Registers and operands ─────────────────────────────────────────────────

#[test]
fn serde_reg() {
    for size in [RegSize::Byte, RegSize::Word, RegSize::Long, RegSize::Quad] {
        for id in 0..16u8 {
            round_trip(&Reg { id, size });
        }
    }
}

#[test]
fn serde_operands() {
    round_trip(&Operand::Imm(-42));
    round_trip(&Operand::Reg(Reg::parse("rax").unwrap()));
    round_trip(&Operand::Mem(MemOperand {
        base: Some(Reg::parse("rbx").unwrap()),
        index: Some(Reg::parse("rcx").unwrap()),
        scale: Some(4),
        disp: Some(-8),
        operand_size: Some(RegSize::Quad),
    }));
    round_trip(&Operand::Mem(MemOperand::direct(16, None)));
}

// ─── Instructions ───────────────────────────────────────────────────────────

#[test]
fn serde_instructions() {
    round_trip(&Instruction::Empty {
        mnemonic: Mnemonic::from("int"),
        interrupt: Some(0x21),
    });
    round_trip(&Instruction::Move {
        mnemonic: Mnemonic::from("mov"),
        src: Some(Operand::Imm(5)),
        dst: Some(Operand::Reg(Reg::parse("rax").unwrap())),
        size_hint: None,
    });
    round_trip(&Instruction::Shift {
        mnemonic: Mnemonic::from("shl"),
        count: Some(3),
        dst: Reg::parse("rax").unwrap(),
    });
    round_trip(&Instruction::PortIo {
        mnemonic: Mnemonic::from("ins"),
        size: RegSize::Word,
    });
}

// ─── Errors ─────────────────────────────────────────────────────────────────

#[test]
fn serde_parse_errors() {
    round_trip(&ParseError::SuffixMismatch {
        span: Span::new(3, 1, 10, 4),
    });
    round_trip(&ParseError::UndefinedLabel {
        label: "foo".into(),
        span: Span::new(2, 6, 12, 3),
    });
    round_trip(&ParseError::ExtensionOrder {
        from: 8,
        to: 1,
        span: Span::default(),
    });
}

// ─── Whole programs ─────────────────────────────────────────────────────────

#[test]
fn serde_program_with_drivers() {
    let out = assemble(
        ".data\nmsg: .ascii \"ok\"\n.text\nstart:\nmovq $1, %rax\njne start\n.driver 3\niret\n.handler tick\nnop\niret\n.end\n",
    );
    assert!(out.is_ok(), "errors: {:?}", out.errors());
    round_trip(out.program());

    // Driver keys serialize as strings so the map survives JSON.
    let json = serde_json::to_string(out.program()).unwrap();
    assert!(json.contains("\"#3\""));
    assert!(json.contains("\"tick\""));
    let back: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(
        back.drivers.keys().collect::<Vec<_>>(),
        vec![&DriverKey::Interrupt(3), &DriverKey::Label("tick".into())]
    );
}

#[test]
fn serde_assembly_with_errors() {
    let out = assemble(".text\nmovb $5, %rax\n.end\n");
    round_trip(&out);
}

// ─── Tokens (zero-copy) ─────────────────────────────────────────────────────

#[test]
fn serde_tokens_borrow_from_json() {
    let tokens = tokenize("movq $5, %rax");
    let json = serde_json::to_string(&tokens).unwrap();
    let back: Vec<Token<'_>> = serde_json::from_str(&json).unwrap();
    assert_eq!(tokens, back);
}
