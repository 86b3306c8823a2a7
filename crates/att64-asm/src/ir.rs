//! Program model: registers, operands, instruction classes, and the
//! assembled [`Program`].
//!
//! These types are the structured output of the parser and the input to a
//! downstream simulator. Operands referencing symbols store resolved
//! integer addresses, never references into the symbol table.

use alloc::collections::BTreeMap;
#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Operand width, as encoded by an instruction size suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegSize {
    /// 8-bit (`b` suffix).
    Byte,
    /// 16-bit (`w` suffix).
    Word,
    /// 32-bit (`l` suffix).
    Long,
    /// 64-bit (`q` suffix).
    Quad,
}

impl RegSize {
    /// Width in bits.
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            RegSize::Byte => 8,
            RegSize::Word => 16,
            RegSize::Long => 32,
            RegSize::Quad => 64,
        }
    }

    /// Width in bytes.
    #[must_use]
    pub fn bytes(self) -> u8 {
        match self {
            RegSize::Byte => 1,
            RegSize::Word => 2,
            RegSize::Long => 4,
            RegSize::Quad => 8,
        }
    }

    /// Map a size-suffix character (`b`/`w`/`l`/`q`) to a width.
    #[must_use]
    pub fn from_suffix(ch: u8) -> Option<Self> {
        match ch {
            b'b' => Some(RegSize::Byte),
            b'w' => Some(RegSize::Word),
            b'l' => Some(RegSize::Long),
            b'q' => Some(RegSize::Quad),
            _ => None,
        }
    }
}

impl fmt::Display for RegSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegSize::Byte => write!(f, "b"),
            RegSize::Word => write!(f, "w"),
            RegSize::Long => write!(f, "l"),
            RegSize::Quad => write!(f, "q"),
        }
    }
}

// Register names per width family, indexed by architectural register id.
// The id ordering follows the hardware encoding: ax=0, cx=1, dx=2, bx=3,
// sp=4, bp=5, si=6, di=7, r8..r15=8..15.
const GP64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];
const GP32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];
const GP16: [&str; 16] = [
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w", "r13w",
    "r14w", "r15w",
];
const GP8: [&str; 16] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b",
];

/// A general-purpose register: architectural id (0–15) plus access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reg {
    /// Architectural register id, 0–15.
    pub id: u8,
    /// Access width.
    pub size: RegSize,
}

impl Reg {
    /// Resolve a register name (without the `%` sigil, already lower-case)
    /// to its id and width family.
    #[must_use]
    pub fn parse(name: &str) -> Option<Reg> {
        for (size, table) in [
            (RegSize::Quad, &GP64),
            (RegSize::Long, &GP32),
            (RegSize::Word, &GP16),
            (RegSize::Byte, &GP8),
        ] {
            if let Some(id) = table.iter().position(|&n| n == name) {
                return Some(Reg { id: id as u8, size });
            }
        }
        None
    }

    /// The canonical lower-case name, without the `%` sigil.
    #[must_use]
    pub fn name(self) -> &'static str {
        let table = match self.size {
            RegSize::Quad => &GP64,
            RegSize::Long => &GP32,
            RegSize::Word => &GP16,
            RegSize::Byte => &GP8,
        };
        table[(self.id & 0xF) as usize]
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name())
    }
}

/// A memory (indirect) operand: `disp(%base, %index, scale)`.
///
/// Invariants maintained by the parser: a scale is only present together
/// with an index register, and base/index widths agree. The operand width
/// is carried from the instruction suffix, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemOperand {
    /// Base register, if any.
    pub base: Option<Reg>,
    /// Index register, if any.
    pub index: Option<Reg>,
    /// Scale factor (1, 2, 4, or 8); only present with an index.
    pub scale: Option<u8>,
    /// Constant displacement, if any (resolved label addresses land here).
    pub disp: Option<i32>,
    /// Operand width from the instruction suffix, if the suffix was present.
    pub operand_size: Option<RegSize>,
}

impl MemOperand {
    /// A displacement-only operand (direct address).
    #[must_use]
    pub fn direct(disp: i32, operand_size: Option<RegSize>) -> Self {
        Self {
            base: None,
            index: None,
            scale: None,
            disp: Some(disp),
            operand_size,
        }
    }
}

impl fmt::Display for MemOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(d) = self.disp {
            write!(f, "{}", d)?;
        }
        if self.base.is_some() || self.index.is_some() {
            write!(f, "(")?;
            if let Some(b) = self.base {
                write!(f, "{}", b)?;
            }
            if let Some(i) = self.index {
                write!(f, ", {}", i)?;
                if let Some(s) = self.scale {
                    write!(f, ", {}", s)?;
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A parsed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// An immediate value.
    Imm(i64),
    /// A register operand.
    Reg(Reg),
    /// A memory operand.
    Mem(MemOperand),
}

impl Operand {
    /// The width this operand pins down, if any: register width, or the
    /// carried width of a memory operand. Immediates have no width.
    #[must_use]
    pub fn size(&self) -> Option<RegSize> {
        match self {
            Operand::Imm(_) => None,
            Operand::Reg(r) => Some(r.size),
            Operand::Mem(m) => m.operand_size,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "${}", v),
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Mem(m) => write!(f, "{}", m),
        }
    }
}

/// A base mnemonic, stored inline as NUL-padded lower-case ASCII.
///
/// The dialect's longest base is `pushf` at five bytes, so eight inline
/// bytes hold every mnemonic without a heap string per instruction. The
/// padding is canonical (construction truncates at eight bytes and always
/// zero-fills), which lets equality and hashing derive as plain byte
/// comparisons. Construction also lower-cases, so a mnemonic compares the
/// same however the source spelled it.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Mnemonic([u8; 8]);

impl Mnemonic {
    /// The mnemonic text, without padding.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        // The constructor only ever writes ASCII into the buffer.
        core::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl From<&str> for Mnemonic {
    fn from(s: &str) -> Self {
        let mut padded = [0u8; 8];
        for (slot, byte) in padded.iter_mut().zip(s.bytes()) {
            *slot = byte.to_ascii_lowercase();
        }
        Mnemonic(padded)
    }
}

impl PartialEq<str> for Mnemonic {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Mnemonic {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Mnemonic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Mnemonic {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        if s.len() > 8 {
            return Err(<D::Error as serde::de::Error>::custom(
                "mnemonic longer than 8 bytes",
            ));
        }
        Ok(Mnemonic::from(s.as_str()))
    }
}

/// A classified instruction — one variant per structural encoding class.
///
/// The classifier maps every supported mnemonic onto exactly one of these
/// eight shapes, so a downstream encoder's pattern match stays exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    /// Class 0 — interrupt/halt/nop.
    Empty {
        /// `int`, `hlt`, or `nop`.
        mnemonic: Mnemonic,
        /// Interrupt number; `None` for `hlt`/`nop`.
        interrupt: Option<i64>,
    },
    /// Class 1 — data movement (`mov`, `push`/`pop`, `movs`/`movz`, `lea`,
    /// string moves, flag pushes).
    Move {
        /// The base mnemonic, suffix stripped.
        mnemonic: Mnemonic,
        /// Source operand; `None` for pops and operand-less forms.
        src: Option<Operand>,
        /// Destination operand; `None` for pushes and operand-less forms.
        dst: Option<Operand>,
        /// Suffix width, kept only when no operand pins the width down.
        size_hint: Option<RegSize>,
    },
    /// Class 2 — binary arithmetic/logical.
    Binary {
        /// `add`, `sub`, `adc`, `sbb`, `cmp`, `test`, `and`, `or`, `xor`,
        /// `neg`, `not`.
        mnemonic: Mnemonic,
        /// Source operand; `None` for the unary `neg`/`not`.
        src: Option<Operand>,
        /// Destination operand.
        dst: Operand,
    },
    /// Class 3 — shifts and rotates.
    Shift {
        /// `sal`, `sar`, `shl`, `shr`, `rol`, `ror`, `rcl`, `rcr`.
        mnemonic: Mnemonic,
        /// Shift count; `None` for the implicit-one form.
        count: Option<i32>,
        /// Destination register.
        dst: Reg,
    },
    /// Class 4 — flag manipulation (`clc`/`stc` family).
    Flag {
        /// The flag mnemonic.
        mnemonic: Mnemonic,
    },
    /// Class 5 — unconditional control transfer.
    Transfer {
        /// `ret`, `jmp`, `call`, or the driver epilogue `iret`.
        mnemonic: Mnemonic,
        /// Transfer target; `None` for `ret`/`iret`.
        target: Option<Operand>,
    },
    /// Class 6 — conditional jumps.
    CondJump {
        /// A `j<cc>` mnemonic.
        mnemonic: Mnemonic,
        /// Jump target as a memory reference.
        target: MemOperand,
    },
    /// Class 7 — port I/O.
    PortIo {
        /// `in`, `out`, `ins`, `outs`.
        mnemonic: Mnemonic,
        /// Transfer width.
        size: RegSize,
    },
}

impl Instruction {
    /// The base mnemonic of this instruction.
    #[must_use]
    pub fn mnemonic(&self) -> &Mnemonic {
        match self {
            Instruction::Empty { mnemonic, .. }
            | Instruction::Move { mnemonic, .. }
            | Instruction::Binary { mnemonic, .. }
            | Instruction::Shift { mnemonic, .. }
            | Instruction::Flag { mnemonic }
            | Instruction::Transfer { mnemonic, .. }
            | Instruction::CondJump { mnemonic, .. }
            | Instruction::PortIo { mnemonic, .. } => mnemonic,
        }
    }

    /// The structural class number (0–7).
    #[must_use]
    pub fn class(&self) -> u8 {
        match self {
            Instruction::Empty { .. } => 0,
            Instruction::Move { .. } => 1,
            Instruction::Binary { .. } => 2,
            Instruction::Shift { .. } => 3,
            Instruction::Flag { .. } => 4,
            Instruction::Transfer { .. } => 5,
            Instruction::CondJump { .. } => 6,
            Instruction::PortIo { .. } => 7,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Empty {
                mnemonic,
                interrupt,
            } => match interrupt {
                Some(n) => write!(f, "{} {}", mnemonic, n),
                None => write!(f, "{}", mnemonic),
            },
            Instruction::Move {
                mnemonic, src, dst, ..
            } => {
                write!(f, "{}", mnemonic)?;
                match (src, dst) {
                    (Some(s), Some(d)) => write!(f, " {}, {}", s, d),
                    (Some(s), None) => write!(f, " {}", s),
                    (None, Some(d)) => write!(f, " {}", d),
                    (None, None) => Ok(()),
                }
            }
            Instruction::Binary { mnemonic, src, dst } => match src {
                Some(s) => write!(f, "{} {}, {}", mnemonic, s, dst),
                None => write!(f, "{} {}", mnemonic, dst),
            },
            Instruction::Shift {
                mnemonic,
                count,
                dst,
            } => match count {
                Some(k) => write!(f, "{} ${}, {}", mnemonic, k, dst),
                None => write!(f, "{} {}", mnemonic, dst),
            },
            Instruction::Flag { mnemonic } => write!(f, "{}", mnemonic),
            Instruction::Transfer { mnemonic, target } => match target {
                Some(t) => write!(f, "{} {}", mnemonic, t),
                None => write!(f, "{}", mnemonic),
            },
            Instruction::CondJump { mnemonic, target } => {
                write!(f, "{} {}", mnemonic, target)
            }
            Instruction::PortIo { mnemonic, size } => write!(f, "{}{}", mnemonic, size),
        }
    }
}

/// Key of an installed interrupt service routine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriverKey {
    /// Keyed by interrupt number.
    Interrupt(i64),
    /// Keyed by label name.
    Label(String),
}

impl fmt::Display for DriverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKey::Interrupt(n) => write!(f, "#{}", n),
            DriverKey::Label(name) => write!(f, "{}", name),
        }
    }
}

// Serialized as a string so driver maps stay representable in JSON:
// interrupt keys render as "#<n>", label keys as the bare name (label names
// cannot contain '#').
#[cfg(feature = "serde")]
impl serde::Serialize for DriverKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DriverKey::Interrupt(n) => serializer.serialize_str(&format!("#{}", n)),
            DriverKey::Label(name) => serializer.serialize_str(name),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for DriverKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl serde::de::Visitor<'_> for V {
            type Value = DriverKey;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a driver key string")
            }
            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<DriverKey, E> {
                if let Some(num) = v.strip_prefix('#') {
                    let n = num
                        .parse::<i64>()
                        .map_err(|_| E::custom("invalid interrupt number"))?;
                    Ok(DriverKey::Interrupt(n))
                } else {
                    Ok(DriverKey::Label(String::from(v)))
                }
            }
        }
        deserializer.deserialize_str(V)
    }
}

/// The assembled data image: a byte vector with sparse writes.
///
/// Writing past the current end zero-extends the vector first, so
/// uninitialised bytes read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataImage {
    bytes: Vec<u8>,
}

impl DataImage {
    /// Hard cap on the image size, guarding pathological `. = <huge>`
    /// inputs from consuming unbounded memory.
    pub const LIMIT: usize = 16 * 1024 * 1024;

    /// Create an empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one byte at `addr`. Returns `false` when `addr` is past the
    /// image limit (the write is dropped).
    pub fn write_byte(&mut self, addr: u64, value: u8) -> bool {
        let Ok(addr) = usize::try_from(addr) else {
            return false;
        };
        if addr >= Self::LIMIT {
            return false;
        }
        if addr >= self.bytes.len() {
            self.bytes.resize(addr + 1, 0);
        }
        self.bytes[addr] = value;
        true
    }

    /// Write `width` bytes of `value` at `addr`, little-endian.
    pub fn write_le(&mut self, addr: u64, value: i64, width: u8) -> bool {
        for i in 0..u64::from(width) {
            if !self.write_byte(addr + i, (value >> (8 * i)) as u8) {
                return false;
            }
        }
        true
    }

    /// The byte at `addr` (zero when past the end).
    #[must_use]
    pub fn byte_at(&self, addr: u64) -> u8 {
        usize::try_from(addr)
            .ok()
            .and_then(|a| self.bytes.get(a).copied())
            .unwrap_or(0)
    }

    /// The raw bytes written so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the initialised prefix of the image.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The in-memory output of a parse: instruction stream, data image, symbol
/// table, and installed interrupt drivers.
///
/// Created empty by the parse entry point, mutated by every directive and
/// instruction, and returned by move — together with the error list — even
/// when parsing only partially succeeded.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    /// The address at which the next emitted byte or instruction is placed.
    pub location_counter: u64,
    /// Symbol table: label/constant name → address or value.
    pub labels: BTreeMap<String, u64>,
    /// The ordered instruction stream of the `.text` sections.
    pub code: Vec<Instruction>,
    /// The data image built by the `.data`/`.bss` sections.
    pub data: DataImage,
    /// Interrupt service routines installed by `.driver`/`.handler` blocks.
    pub drivers: BTreeMap<DriverKey, Vec<Instruction>>,
}

impl Program {
    /// Create an empty program with the location counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a symbol's recorded address.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u64> {
        self.labels.get(name).copied()
    }

    /// Record a label at `addr`. Returns `false` if the name already has an
    /// address (labels are single-assignment; use [`Program::set_symbol`]
    /// for `.equ`-style redefinable symbols).
    pub fn define_label(&mut self, name: &str, addr: u64) -> bool {
        if self.labels.contains_key(name) {
            return false;
        }
        self.labels.insert(String::from(name), addr);
        true
    }

    /// Record or overwrite a symbol value (`.equ` / `name = expr`).
    pub fn set_symbol(&mut self, name: &str, value: u64) {
        self.labels.insert(String::from(name), value);
    }
}
