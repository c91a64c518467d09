use crate::DecodeMode;

/// Segment register named by an override prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentReg {
    Es = 0,
    Cs = 1,
    Ss = 2,
    Ds = 3,
    Fs = 4,
    Gs = 5,
}

/// Decoded REX prefix bits (64-bit mode only).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RexPrefix {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
}

impl RexPrefix {
    fn from_byte(byte: u8) -> Self {
        Self {
            w: byte & 0b1000 != 0,
            r: byte & 0b0100 != 0,
            x: byte & 0b0010 != 0,
            b: byte & 0b0001 != 0,
        }
    }
}

/// Prefix-derived decode state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Prefixes {
    /// Last segment override seen, if any. Recorded for diagnostics; the
    /// address resolver assumes all segment bases are zero.
    pub segment: Option<SegmentReg>,
    /// `0x66` seen an odd number of times.
    pub operand_size_override: bool,
    /// `0x67` seen an odd number of times.
    pub address_size_override: bool,
    /// Last REX byte seen (64-bit mode only).
    pub rex: Option<RexPrefix>,
}

/// Scan legacy (and, in 64-bit mode, REX) prefixes from the start of `bytes`.
///
/// Returns the accumulated prefix state and the number of bytes consumed;
/// the first unconsumed byte is the opcode's first byte. The scan never reads
/// past `bytes` and cannot fail: an all-prefix buffer simply leaves nothing
/// for the opcode.
///
/// `0x66`/`0x67` *toggle* their attribute, so a doubled prefix cancels out,
/// matching hardware. The last REX byte and the last segment override win.
/// LOCK/REPNE/REPE are consumed for length accounting only; none of the
/// instructions this decoder serves give them meaning.
pub fn scan_prefixes(bytes: &[u8], mode: DecodeMode) -> (Prefixes, usize) {
    let mut prefixes = Prefixes::default();
    let mut idx = 0usize;

    while idx < bytes.len() {
        let byte = bytes[idx];

        // In 32-bit mode 0x40..=0x4F are inc/dec opcodes, not prefixes.
        if mode == DecodeMode::Bits64 && (0x40..=0x4F).contains(&byte) {
            prefixes.rex = Some(RexPrefix::from_byte(byte));
            idx += 1;
            continue;
        }

        match byte {
            0x26 => prefixes.segment = Some(SegmentReg::Es),
            0x2E => prefixes.segment = Some(SegmentReg::Cs),
            0x36 => prefixes.segment = Some(SegmentReg::Ss),
            0x3E => prefixes.segment = Some(SegmentReg::Ds),
            0x64 => prefixes.segment = Some(SegmentReg::Fs),
            0x65 => prefixes.segment = Some(SegmentReg::Gs),
            0x66 => prefixes.operand_size_override = !prefixes.operand_size_override,
            0x67 => prefixes.address_size_override = !prefixes.address_size_override,
            // lock / repne / repe
            0xF0 | 0xF2 | 0xF3 => {}
            _ => break,
        }
        idx += 1;
    }

    (prefixes, idx)
}
