#![forbid(unsafe_code)]

//! Minimal x86/x86-64 instruction decoding for UMIP emulation.
//!
//! This is not a general-purpose decoder. It understands exactly what is
//! needed to locate the destination operand of the five UMIP-protected
//! instructions (`sldt`, `str`, `sgdt`, `sidt`, `smsw`): legacy and REX
//! prefixes, the ModRM byte, an optional SIB byte, and the displacement
//! forms of 16-, 32-, and 64-bit addressing. Everything else is rejected by
//! the caller before it reaches this crate.

mod operand;
mod prefixes;

pub use operand::{resolve_operand, DecodeError, DecodedOperand, Operand, RegisterFile};
pub use prefixes::{scan_prefixes, Prefixes, RexPrefix, SegmentReg};

/// Number of instruction bytes fetched per emulation attempt.
///
/// The architectural instruction length limit is 15 bytes; the original
/// fault handlers snapshot 16 and so do we.
pub const INSN_BUF_LEN: usize = 16;

/// Bitness of the faulting code segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeMode {
    /// 32-bit protected mode (or compatibility mode).
    Bits32,
    /// 64-bit long mode.
    Bits64,
}

impl DecodeMode {
    /// Number of addressable general-purpose registers in this mode.
    pub fn gpr_count(self) -> usize {
        match self {
            DecodeMode::Bits32 => 8,
            DecodeMode::Bits64 => 16,
        }
    }

    pub fn ip_mask(self) -> u64 {
        match self {
            DecodeMode::Bits32 => 0xFFFF_FFFF,
            DecodeMode::Bits64 => u64::MAX,
        }
    }
}

/// Effective operand-size attribute after prefixes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSize {
    Bits16,
    Bits32,
    Bits64,
}

impl OperandSize {
    pub fn bytes(self) -> usize {
        match self {
            OperandSize::Bits16 => 2,
            OperandSize::Bits32 => 4,
            OperandSize::Bits64 => 8,
        }
    }
}

/// Effective address-size attribute after prefixes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSize {
    Bits16,
    Bits32,
    Bits64,
}

/// Operand size selected by the mode, REX.W, and the `0x66` toggle.
///
/// REX.W takes precedence over `0x66`, per the ISA.
pub fn effective_operand_size(mode: DecodeMode, prefixes: Prefixes) -> OperandSize {
    match mode {
        DecodeMode::Bits32 => {
            if prefixes.operand_size_override {
                OperandSize::Bits16
            } else {
                OperandSize::Bits32
            }
        }
        DecodeMode::Bits64 => {
            if prefixes.rex.is_some_and(|r| r.w) {
                OperandSize::Bits64
            } else if prefixes.operand_size_override {
                OperandSize::Bits16
            } else {
                OperandSize::Bits32
            }
        }
    }
}

/// Address size selected by the mode and the `0x67` toggle.
pub fn effective_address_size(mode: DecodeMode, prefixes: Prefixes) -> AddressSize {
    match mode {
        DecodeMode::Bits32 => {
            if prefixes.address_size_override {
                AddressSize::Bits16
            } else {
                AddressSize::Bits32
            }
        }
        DecodeMode::Bits64 => {
            if prefixes.address_size_override {
                AddressSize::Bits32
            } else {
                AddressSize::Bits64
            }
        }
    }
}
