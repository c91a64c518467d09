use crate::{effective_address_size, AddressSize, DecodeMode, Prefixes, RexPrefix};
use thiserror::Error;

/// Operand decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The byte stream ended before the operand could be fully decoded.
    #[error("unexpected end of instruction bytes")]
    UnexpectedEof,
}

/// Where an instruction's r/m operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// A general-purpose register, by index (REX.B-extended in 64-bit mode).
    Register(u8),
    /// A linear memory address. Segment bases are assumed to be zero.
    Memory(u64),
}

/// A resolved r/m operand plus the ModRM/SIB/displacement bytes consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOperand {
    pub operand: Operand,
    pub len: usize,
}

/// Register values needed for effective-address computation.
///
/// Keeps this crate independent of any particular CPU context layout; index
/// 4/5 are the stack/frame pointer slots but nothing here cares.
pub trait RegisterFile {
    /// Full-width value of the general-purpose register at `index`
    /// (0..=15 in 64-bit mode, 0..=7 otherwise).
    fn gpr(&self, index: u8) -> u64;
    /// Linear address of the faulting instruction's first byte, used for
    /// RIP-relative addressing.
    fn rip(&self) -> u64;
}

// 16-bit addressing base/index register slots.
const REG_BX: u8 = 3;
const REG_BP: u8 = 5;
const REG_SI: u8 = 6;
const REG_DI: u8 = 7;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self.bytes.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let lo = self.u8()? as u16;
        let hi = self.u8()? as u16;
        Ok(lo | hi << 8)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let lo = self.u16()? as u32;
        let hi = self.u16()? as u32;
        Ok(lo | hi << 16)
    }
}

/// Resolve the r/m operand of an instruction.
///
/// `bytes` must start at the ModRM byte. On success the returned length
/// covers ModRM plus any SIB and displacement bytes, so the caller can
/// account for the full instruction. Resolution is a pure function of the
/// byte stream, the prefix state, and the register file snapshot.
pub fn resolve_operand(
    bytes: &[u8],
    mode: DecodeMode,
    prefixes: Prefixes,
    regs: &dyn RegisterFile,
) -> Result<DecodedOperand, DecodeError> {
    let mut cur = Cursor::new(bytes);
    let rex = prefixes.rex.unwrap_or_default();

    let modrm = cur.u8()?;
    let modbits = modrm >> 6;
    let rm3 = modrm & 7;

    if modbits == 3 {
        let index = rm3 | (rex.b as u8) << 3;
        return Ok(DecodedOperand {
            operand: Operand::Register(index),
            len: cur.pos,
        });
    }

    let addr = match effective_address_size(mode, prefixes) {
        AddressSize::Bits16 => resolve_addr16(&mut cur, modbits, rm3, regs)?,
        AddressSize::Bits32 => resolve_addr(&mut cur, mode, modbits, rm3, rex, regs, 0xFFFF_FFFF)?,
        AddressSize::Bits64 => resolve_addr(&mut cur, mode, modbits, rm3, rex, regs, u64::MAX)?,
    };

    Ok(DecodedOperand {
        operand: Operand::Memory(addr),
        len: cur.pos,
    })
}

/// Legacy 16-bit addressing: fixed base/index register pairs selected by rm.
fn resolve_addr16(
    cur: &mut Cursor<'_>,
    modbits: u8,
    rm3: u8,
    regs: &dyn RegisterFile,
) -> Result<u64, DecodeError> {
    let mut ea: u16 = if modbits == 0 && rm3 == 6 {
        // ds:(disp16), no base register
        cur.u16()?
    } else {
        let (base, index) = match rm3 {
            0 => (REG_BX, Some(REG_SI)),
            1 => (REG_BX, Some(REG_DI)),
            2 => (REG_BP, Some(REG_SI)),
            3 => (REG_BP, Some(REG_DI)),
            4 => (REG_SI, None),
            5 => (REG_DI, None),
            6 => (REG_BP, None),
            _ => (REG_BX, None),
        };
        let mut ea = regs.gpr(base) as u16;
        if let Some(index) = index {
            ea = ea.wrapping_add(regs.gpr(index) as u16);
        }
        ea
    };

    match modbits {
        0 => {}
        1 => ea = ea.wrapping_add(cur.u8()? as i8 as u16),
        _ => ea = ea.wrapping_add(cur.u16()?),
    }

    Ok(ea as u64)
}

/// 32/64-bit addressing: optional SIB byte, mod-dependent displacement.
fn resolve_addr(
    cur: &mut Cursor<'_>,
    mode: DecodeMode,
    modbits: u8,
    rm3: u8,
    rex: RexPrefix,
    regs: &dyn RegisterFile,
    mask: u64,
) -> Result<u64, DecodeError> {
    let mut index = 0u64;
    let mut scale = 0u8;
    let mut have_sib = false;
    // The 3-bit field that controls the mod=0 no-base/disp32 special case:
    // ModRM.rm without SIB, SIB.base otherwise. REX.B does not participate.
    let mut base3 = rm3;
    let mut base_index = rm3 | (rex.b as u8) << 3;

    if rm3 == 4 {
        let sib = cur.u8()?;
        scale = sib >> 6;
        let index_field = (sib >> 3) & 7;
        // Index field 4 without REX.X is the reserved "no index" encoding;
        // with REX.X it selects r12.
        if index_field != 4 || rex.x {
            index = regs.gpr(index_field | (rex.x as u8) << 3) & mask;
        }
        base3 = sib & 7;
        base_index = base3 | (rex.b as u8) << 3;
        have_sib = true;
    }

    let no_base = modbits == 0 && base3 == 5;
    let mut base = if no_base {
        // disp32 with no base register: absolute, except RIP-relative in
        // 64-bit mode when there was no SIB byte.
        if !have_sib && mode == DecodeMode::Bits64 {
            regs.rip() & mask
        } else {
            0
        }
    } else {
        regs.gpr(base_index) & mask
    };

    match modbits {
        0 => {
            if no_base {
                base = base.wrapping_add(cur.u32()? as i32 as u64);
            }
        }
        1 => base = base.wrapping_add(cur.u8()? as i8 as u64),
        // 32-bit displacement even in 64-bit mode
        _ => base = base.wrapping_add(cur.u32()? as i32 as u64),
    }

    Ok(base.wrapping_add(index << scale) & mask)
}
