use umip_x86::{DecodeMode, OperandSize, RegisterFile, SegmentReg};

/// Caller-owned snapshot of the faulting thread's CPU state.
///
/// The emulator only ever reads register values for address computation and,
/// on success, writes back a destination register and/or the advanced
/// instruction pointer. On any non-success outcome the snapshot is left
/// untouched.
///
/// General-purpose registers are an indexed file (0..=15 in 64-bit mode,
/// 0..=7 in 32-bit mode); indices 4 and 5 happen to be the stack and frame
/// pointer slots but nothing here treats them specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuContext {
    gpr: [u64; 16],
    rip: u64,
    segs: [u16; 6],
    mode: DecodeMode,
}

impl CpuContext {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            gpr: [0; 16],
            rip: 0,
            segs: [0; 6],
            mode,
        }
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn rip(&self) -> u64 {
        self.rip & self.mode.ip_mask()
    }

    pub fn set_rip(&mut self, rip: u64) {
        self.rip = rip & self.mode.ip_mask();
    }

    pub fn advance_rip(&mut self, delta: u64) {
        self.set_rip(self.rip().wrapping_add(delta));
    }

    pub fn gpr_u64(&self, index: u8) -> u64 {
        debug_assert!((index as usize) < self.mode.gpr_count());
        self.gpr[index as usize]
    }

    pub fn set_gpr_u64(&mut self, index: u8, val: u64) {
        debug_assert!((index as usize) < self.mode.gpr_count());
        self.gpr[index as usize] = val;
    }

    /// Write `val` into a register at the given operand width.
    ///
    /// Architectural merge rules: 64-bit writes replace the slot, 32-bit
    /// writes clear the upper half, 16-bit writes preserve it.
    pub fn write_gpr(&mut self, index: u8, size: OperandSize, val: u64) {
        debug_assert!((index as usize) < self.mode.gpr_count());
        let slot = &mut self.gpr[index as usize];
        *slot = match size {
            OperandSize::Bits64 => val,
            OperandSize::Bits32 => val & 0xFFFF_FFFF,
            OperandSize::Bits16 => (*slot & !0xFFFF) | (val & 0xFFFF),
        };
    }

    pub fn segment_selector(&self, seg: SegmentReg) -> u16 {
        self.segs[seg as usize]
    }

    pub fn set_segment_selector(&mut self, seg: SegmentReg, selector: u16) {
        self.segs[seg as usize] = selector;
    }
}

impl RegisterFile for CpuContext {
    fn gpr(&self, index: u8) -> u64 {
        self.gpr_u64(index)
    }

    fn rip(&self) -> u64 {
        self.rip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_gpr_width_merge_rules() {
        let mut ctx = CpuContext::new(DecodeMode::Bits64);
        ctx.set_gpr_u64(3, 0x1122_3344_5566_7788);

        ctx.write_gpr(3, OperandSize::Bits16, 0x33);
        assert_eq!(ctx.gpr_u64(3), 0x1122_3344_5566_0033);

        ctx.write_gpr(3, OperandSize::Bits32, 0xFFFF_FFFF_0000_0040);
        assert_eq!(ctx.gpr_u64(3), 0x40);

        ctx.write_gpr(3, OperandSize::Bits64, u64::MAX);
        assert_eq!(ctx.gpr_u64(3), u64::MAX);
    }

    #[test]
    fn rip_is_masked_to_the_mode_width() {
        let mut ctx = CpuContext::new(DecodeMode::Bits32);
        ctx.set_rip(0xFFFF_FFFF_FFFC);
        assert_eq!(ctx.rip(), 0xFFFF_FFFC);
        ctx.advance_rip(8);
        assert_eq!(ctx.rip(), 4);
    }

    #[test]
    fn segment_selectors_round_trip() {
        let mut ctx = CpuContext::new(DecodeMode::Bits64);
        ctx.set_segment_selector(SegmentReg::Fs, 0x63);
        assert_eq!(ctx.segment_selector(SegmentReg::Fs), 0x63);
        assert_eq!(ctx.segment_selector(SegmentReg::Gs), 0);
    }
}
