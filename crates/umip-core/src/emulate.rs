//! Opcode dispatch, dummy value synthesis, and destination commit.

use crate::features::{self, EmulatorConfig};
use crate::mem::VirtualMemory;
use crate::state::CpuContext;
use tracing::trace;
use umip_x86::{
    effective_operand_size, resolve_operand, scan_prefixes, Operand, INSN_BUF_LEN,
};

// Dummy descriptor-table bases match the values the Linux kernel's own UMIP
// emulation reports: high canonical sentinels that can never be dereferenced
// from user space.
const DUMMY_GDT_BASE: u64 = 0xFFFF_FFFF_FFFE_0000;
const DUMMY_IDT_BASE: u64 = 0xFFFF_FFFF_FFFF_0000;
const DUMMY_GDT_IDT_LIMIT: u16 = 0;

/// Dummy LDT selector, matching what Windows and Linux report.
const DUMMY_LDT: u16 = 0;

/// Dummy task register selector, matching what Windows and Linux report.
const DUMMY_TR: u16 = 0x40;

/// Dummy machine status word: PE | MP | ET | NE | WP | AM | PG low bits,
/// the same constant the kernel reports.
const DUMMY_MSW: u16 = 0x33;

/// Outcome of one emulation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulateResult {
    /// The instruction was not one this emulator handles (or the feature
    /// gate refused); the caller should fall back to default fault handling.
    NotEmulated,
    /// The dummy result was committed and the instruction pointer advanced;
    /// the caller should resume the thread.
    Emulated,
    /// Decoding succeeded but the destination memory write was rejected; the
    /// caller should deliver an access fault for `addr`.
    MemoryWriteFailed { addr: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insn {
    Sldt,
    Str,
    Sgdt,
    Sidt,
    Smsw,
}

impl Insn {
    fn name(self) -> &'static str {
        match self {
            Insn::Sldt => "sldt",
            Insn::Str => "str",
            Insn::Sgdt => "sgdt",
            Insn::Sidt => "sidt",
            Insn::Smsw => "smsw",
        }
    }
}

/// Emulator for the five UMIP-protected instructions.
///
/// Stateless apart from its configuration; one instance can serve concurrent
/// faults on different threads, each against its own context.
#[derive(Debug, Clone, Default)]
pub struct UmipEmulator {
    config: EmulatorConfig,
}

impl UmipEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EmulatorConfig) -> Self {
        Self { config }
    }

    fn gate_open(&self) -> bool {
        self.config.enabled
            && self
                .config
                .umip_override
                .unwrap_or_else(features::host_has_umip)
    }

    /// Attempt to emulate the instruction at `context`'s instruction pointer.
    ///
    /// On [`EmulateResult::Emulated`] the context holds the committed
    /// register result (if any) and the advanced instruction pointer. On any
    /// other outcome the context is unmodified, though a rejected
    /// `sgdt`/`sidt` base write may leave its already-committed limit write
    /// in memory.
    pub fn try_emulate(
        &self,
        context: &mut CpuContext,
        mem: &mut dyn VirtualMemory,
    ) -> EmulateResult {
        if !self.gate_open() {
            return EmulateResult::NotEmulated;
        }

        let mut buf = [0u8; INSN_BUF_LEN];
        let valid = mem.read_bytes(context.rip(), &mut buf);
        let bytes = &buf[..valid.min(INSN_BUF_LEN)];

        let mode = context.mode();
        let (prefixes, prefix_len) = scan_prefixes(bytes, mode);
        let rest = &bytes[prefix_len..];

        // Two-byte opcode escape + opcode + ModRM.
        if rest.len() < 3 || rest[0] != 0x0F {
            return EmulateResult::NotEmulated;
        }
        let modrm = rest[2];
        let reg = ((modrm >> 3) & 7) | prefixes.rex.map_or(0, |r| (r.r as u8) << 3);
        let insn = match (rest[1], reg) {
            (0x00, 0) => Insn::Sldt,
            (0x00, 1) => Insn::Str,
            (0x01, 0) => Insn::Sgdt,
            (0x01, 1) => Insn::Sidt,
            (0x01, 4) => Insn::Smsw,
            _ => return EmulateResult::NotEmulated,
        };

        // sgdt/sidt store a 10-byte descriptor image; a register destination
        // is not a valid encoding and must not resolve to a bogus address.
        if matches!(insn, Insn::Sgdt | Insn::Sidt) && modrm >> 6 == 3 {
            return EmulateResult::NotEmulated;
        }

        let Ok(decoded) = resolve_operand(&rest[2..], mode, prefixes, context) else {
            return EmulateResult::NotEmulated;
        };

        trace!(rip = context.rip(), insn = insn.name(), "emulating");
        if let Some(seg) = prefixes.segment {
            // Segment bases are assumed zero, so the override only matters
            // for diagnostics.
            trace!(
                selector = context.segment_selector(seg),
                "segment override present; assuming zero segment base"
            );
        }

        match insn {
            Insn::Sldt | Insn::Str | Insn::Smsw => {
                let value = match insn {
                    Insn::Sldt => DUMMY_LDT,
                    Insn::Str => DUMMY_TR,
                    _ => DUMMY_MSW,
                };
                match decoded.operand {
                    Operand::Register(index) => {
                        let size = effective_operand_size(mode, prefixes);
                        context.write_gpr(index, size, value as u64);
                    }
                    Operand::Memory(addr) => {
                        // Only the 16-bit selector/status word reaches
                        // memory, whatever the operand size says.
                        if mem.write_bytes(addr, &value.to_le_bytes()).is_err() {
                            trace!(rip = context.rip(), addr, "memory write failed");
                            return EmulateResult::MemoryWriteFailed { addr };
                        }
                    }
                }
            }
            Insn::Sgdt | Insn::Sidt => {
                let base = if insn == Insn::Sgdt {
                    DUMMY_GDT_BASE
                } else {
                    DUMMY_IDT_BASE
                };
                let Operand::Memory(addr) = decoded.operand else {
                    return EmulateResult::NotEmulated;
                };
                // Limit then base, in that order; a rejected base write does
                // not roll the limit back.
                if mem
                    .write_bytes(addr, &DUMMY_GDT_IDT_LIMIT.to_le_bytes())
                    .is_err()
                {
                    trace!(rip = context.rip(), addr, "memory write failed");
                    return EmulateResult::MemoryWriteFailed { addr };
                }
                let base_addr = addr.wrapping_add(2);
                if mem.write_bytes(base_addr, &base.to_le_bytes()).is_err() {
                    trace!(rip = context.rip(), addr = base_addr, "memory write failed");
                    return EmulateResult::MemoryWriteFailed { addr: base_addr };
                }
            }
        }

        // Prefixes + the fixed two-byte 0F xx opcode + ModRM/SIB/displacement.
        context.advance_rip((prefix_len + 2 + decoded.len) as u64);
        EmulateResult::Emulated
    }
}
