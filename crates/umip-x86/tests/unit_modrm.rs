use umip_x86::{
    resolve_operand, DecodeError, DecodeMode, Operand, Prefixes, RegisterFile, RexPrefix,
};

struct TestRegs {
    gpr: [u64; 16],
    rip: u64,
}

impl TestRegs {
    fn new() -> Self {
        let mut gpr = [0u64; 16];
        for (i, slot) in gpr.iter_mut().enumerate() {
            *slot = 0x1000 * (i as u64 + 1);
        }
        Self { gpr, rip: 0x40_0000 }
    }
}

impl RegisterFile for TestRegs {
    fn gpr(&self, index: u8) -> u64 {
        self.gpr[index as usize]
    }

    fn rip(&self) -> u64 {
        self.rip
    }
}

fn rex(w: bool, r: bool, x: bool, b: bool) -> Prefixes {
    Prefixes {
        rex: Some(RexPrefix { w, r, x, b }),
        ..Prefixes::default()
    }
}

#[test]
fn mod3_selects_a_register() {
    let regs = TestRegs::new();
    // mod=3 rm=2
    let decoded = resolve_operand(&[0xC2], DecodeMode::Bits64, Prefixes::default(), &regs)
        .expect("resolve");
    assert_eq!(decoded.operand, Operand::Register(2));
    assert_eq!(decoded.len, 1);
}

#[test]
fn rex_b_extends_the_register_index() {
    let regs = TestRegs::new();
    let decoded =
        resolve_operand(&[0xC2], DecodeMode::Bits64, rex(false, false, false, true), &regs)
            .expect("resolve");
    assert_eq!(decoded.operand, Operand::Register(10));
}

#[test]
fn base_register_with_disp8() {
    let regs = TestRegs::new();
    // mod=1 rm=3, disp8 = 0x10 => rbx + 0x10
    let decoded = resolve_operand(&[0x43, 0x10], DecodeMode::Bits64, Prefixes::default(), &regs)
        .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[3] + 0x10));
    assert_eq!(decoded.len, 2);
}

#[test]
fn disp8_is_sign_extended() {
    let regs = TestRegs::new();
    // disp8 = -8
    let decoded = resolve_operand(&[0x43, 0xF8], DecodeMode::Bits64, Prefixes::default(), &regs)
        .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[3] - 8));
}

#[test]
fn base_register_with_disp32() {
    let regs = TestRegs::new();
    // mod=2 rm=3, disp32 = 0x12345678
    let decoded = resolve_operand(
        &[0x83, 0x78, 0x56, 0x34, 0x12],
        DecodeMode::Bits64,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[3] + 0x1234_5678));
    assert_eq!(decoded.len, 5);
}

#[test]
fn rex_b_extends_the_base_register() {
    let regs = TestRegs::new();
    // mod=0 rm=3 with REX.B => r11
    let decoded =
        resolve_operand(&[0x03], DecodeMode::Bits64, rex(false, false, false, true), &regs)
            .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[11]));
}

#[test]
fn sib_scaled_index() {
    let regs = TestRegs::new();
    // mod=1 rm=4, SIB scale=4 index=rcx base=rbx, disp8 = 0x10
    let decoded = resolve_operand(
        &[0x44, 0x8B, 0x10],
        DecodeMode::Bits64,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    let expected = regs.gpr[3] + (regs.gpr[1] << 2) + 0x10;
    assert_eq!(decoded.operand, Operand::Memory(expected));
    assert_eq!(decoded.len, 3);
}

#[test]
fn sib_index_4_means_no_index() {
    let regs = TestRegs::new();
    // mod=0 rm=4, SIB scale=1 index=4 base=rbx
    let decoded = resolve_operand(
        &[0x04, 0x23],
        DecodeMode::Bits64,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[3]));
}

#[test]
fn rex_x_turns_index_4_into_r12() {
    let regs = TestRegs::new();
    let decoded = resolve_operand(
        &[0x04, 0x23],
        DecodeMode::Bits64,
        rex(false, false, true, false),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[3] + regs.gpr[12]));
}

#[test]
fn mod0_rm5_is_rip_relative_in_64bit_mode() {
    let regs = TestRegs::new();
    // mod=0 rm=5, disp32 = 0x100
    let decoded = resolve_operand(
        &[0x05, 0x00, 0x01, 0x00, 0x00],
        DecodeMode::Bits64,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.rip + 0x100));
    assert_eq!(decoded.len, 5);
}

#[test]
fn mod0_rm5_is_absolute_in_32bit_mode() {
    let regs = TestRegs::new();
    let decoded = resolve_operand(
        &[0x05, 0x00, 0x01, 0x00, 0x00],
        DecodeMode::Bits32,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(0x100));
}

#[test]
fn sib_base_5_with_mod0_drops_the_base() {
    let regs = TestRegs::new();
    // mod=0 rm=4, SIB scale=1 index=rcx base=5, disp32 = 0x100.
    // No base register and no RIP contribution even in 64-bit mode.
    let decoded = resolve_operand(
        &[0x04, 0x0D, 0x00, 0x01, 0x00, 0x00],
        DecodeMode::Bits64,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[1] + 0x100));
    assert_eq!(decoded.len, 6);
}

#[test]
fn sib_base_5_with_mod1_keeps_rbp_as_base() {
    let regs = TestRegs::new();
    // mod=1 rm=4, SIB scale=1 index=none base=5, disp8 = 8
    let decoded = resolve_operand(
        &[0x44, 0x25, 0x08],
        DecodeMode::Bits64,
        Prefixes::default(),
        &regs,
    )
    .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(regs.gpr[5] + 8));
}

#[test]
fn address_size_override_masks_to_32_bits_in_64bit_mode() {
    let mut regs = TestRegs::new();
    regs.gpr[3] = 0xFFFF_FFFF_FFFF_FFF0;
    let prefixes = Prefixes {
        address_size_override: true,
        ..Prefixes::default()
    };
    // mod=1 rm=3, disp8 = 0x20: the 32-bit EA wraps
    let decoded =
        resolve_operand(&[0x43, 0x20], DecodeMode::Bits64, prefixes, &regs).expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(0x10));
}

#[test]
fn legacy_16bit_base_index_pairs() {
    let mut regs = TestRegs::new();
    regs.gpr[3] = 0x1234; // bx
    regs.gpr[6] = 0x0100; // si
    let prefixes = Prefixes {
        address_size_override: true,
        ..Prefixes::default()
    };
    // mod=0 rm=0 => ds:(bx,si)
    let decoded =
        resolve_operand(&[0x00], DecodeMode::Bits32, prefixes, &regs).expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(0x1334));
    assert_eq!(decoded.len, 1);
}

#[test]
fn legacy_16bit_disp16_only_form() {
    let regs = TestRegs::new();
    let prefixes = Prefixes {
        address_size_override: true,
        ..Prefixes::default()
    };
    // mod=0 rm=6 => ds:(disp16), no bp contribution
    let decoded = resolve_operand(&[0x06, 0x34, 0x12], DecodeMode::Bits32, prefixes, &regs)
        .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(0x1234));
    assert_eq!(decoded.len, 3);
}

#[test]
fn legacy_16bit_address_wraps_at_64k() {
    let mut regs = TestRegs::new();
    regs.gpr[3] = 0xFFFF; // bx
    let prefixes = Prefixes {
        address_size_override: true,
        ..Prefixes::default()
    };
    // mod=1 rm=7 => (bx) + disp8
    let decoded = resolve_operand(&[0x47, 0x10], DecodeMode::Bits32, prefixes, &regs)
        .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(0x000F));
}

#[test]
fn legacy_16bit_bp_with_disp16() {
    let mut regs = TestRegs::new();
    regs.gpr[5] = 0x2000; // bp
    let prefixes = Prefixes {
        address_size_override: true,
        ..Prefixes::default()
    };
    // mod=2 rm=6 => ss:(bp) + disp16
    let decoded = resolve_operand(&[0x86, 0x00, 0x01], DecodeMode::Bits32, prefixes, &regs)
        .expect("resolve");
    assert_eq!(decoded.operand, Operand::Memory(0x2100));
}

#[test]
fn truncated_streams_are_rejected() {
    let regs = TestRegs::new();
    let cases: &[&[u8]] = &[
        &[],                   // no ModRM
        &[0x44],               // SIB missing
        &[0x43],               // disp8 missing
        &[0x83, 0x78, 0x56],   // disp32 short
        &[0x04, 0x0D, 0x00],   // SIB no-base disp32 short
    ];
    for &bytes in cases {
        assert_eq!(
            resolve_operand(bytes, DecodeMode::Bits64, Prefixes::default(), &regs),
            Err(DecodeError::UnexpectedEof),
            "bytes: {bytes:02X?}"
        );
    }
}

#[test]
fn resolution_is_idempotent() {
    let regs = TestRegs::new();
    let bytes = [0x44, 0x8B, 0x10];
    let first = resolve_operand(&bytes, DecodeMode::Bits64, Prefixes::default(), &regs)
        .expect("resolve");
    let second = resolve_operand(&bytes, DecodeMode::Bits64, Prefixes::default(), &regs)
        .expect("resolve");
    assert_eq!(first, second);
}
