//! Broad-coverage checks of the ARMv7-M attribute decoder: one probe per
//! encoding group, validating kind, addressing mode and the exact read set.

use glimmer_arch::{BaseUpdate, InstrInfo, OffsetFormat, V7MInfo};
use glimmer_trace::{InstructionEffect, InstructionSet, ReferenceInstruction};

const MSP: u32 = 13;
const PC: u32 = 15;
const CPSR: u32 = 16;

fn decode(width: u32, opcode: u32, asm: &str) -> InstrInfo {
    V7MInfo::decode(&ReferenceInstruction::new(
        0,
        InstructionEffect::Executed,
        0x8000,
        InstructionSet::Thumb,
        width,
        opcode,
        asm,
        vec![],
        vec![],
    ))
}

fn t16(opcode: u32, asm: &str) -> InstrInfo {
    decode(16, opcode, asm)
}

fn t32(opcode: u32, asm: &str) -> InstrInfo {
    decode(32, opcode, asm)
}

#[track_caller]
fn check_load(ii: &InstrInfo, offset: OffsetFormat, update: BaseUpdate, inputs: &[u32]) {
    assert!(ii.is_load());
    assert_eq!(ii.addressing_mode().offset, offset);
    assert_eq!(ii.addressing_mode().update, update);
    assert_eq!(ii.input_registers(false), inputs);
}

#[track_caller]
fn check_store(ii: &InstrInfo, offset: OffsetFormat, update: BaseUpdate, inputs: &[u32]) {
    assert!(ii.is_store());
    assert_eq!(ii.addressing_mode().offset, offset);
    assert_eq!(ii.addressing_mode().update, update);
    assert_eq!(ii.input_registers(false), inputs);
}

#[track_caller]
fn check_plain(ii: &InstrInfo, inputs: &[u32]) {
    assert!(ii.has_no_kind());
    assert!(!ii.has_valid_addressing_mode());
    assert_eq!(ii.input_registers(false), inputs);
}

#[test]
fn t16_high_register_forms() {
    check_plain(&t16(0x4488, "ADD r8,r1"), &[8, 1]);
    check_plain(&t16(0x45c8, "CMP r8,r9"), &[8, 9]);
    check_plain(&t16(0x4608, "MOV r0,r1"), &[1]);
}

#[test]
fn t16_load_store_halfword_and_signed_byte() {
    check_load(&t16(0x8848, "LDRH r0,[r1,#2]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[1]);
    check_load(&t16(0x5688, "LDRSB r0,[r1,r2]"), OffsetFormat::Register, BaseUpdate::Offset, &[1, 2]);
}

#[test]
fn t16_misc_corners() {
    // CPS touches the interrupt masks only.
    check_plain(&t16(0xb672, "CPSID i"), &[]);
    check_plain(&t16(0xba08, "REV r0,r1"), &[1]);
}

#[test]
fn t32_load_byte_group() {
    check_load(&t32(0xf81f0004, "LDRB r0,[pc,#4]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[PC]);
    check_load(&t32(0xf8923001, "LDRB r3,[r2,#1]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[2]);
    check_load(&t32(0xf8110002, "LDRB r0,[r1,r2]"), OffsetFormat::ScaledRegister, BaseUpdate::Offset, &[1, 2]);
    check_load(&t32(0xf8110f04, "LDRB r0,[r1,#4]!"), OffsetFormat::Immediate, BaseUpdate::PreIndexed, &[1]);
    check_load(&t32(0xf8110b04, "LDRB r0,[r1],#4"), OffsetFormat::Immediate, BaseUpdate::PostIndexed, &[1]);
    check_load(&t32(0xf8110e04, "LDRBT r0,[r1,#4]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[1]);
    check_load(&t32(0xf9923001, "LDRSB r3,[r2,#1]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[2]);

    // Preload hints read their base but are not memory accesses.
    check_plain(&t32(0xf891f004, "PLD [r1,#4]"), &[1]);
    check_plain(&t32(0xf991f004, "PLI [r1,#4]"), &[1]);
}

#[test]
fn t32_load_halfword_and_word_groups() {
    check_load(&t32(0xf8b23002, "LDRH r3,[r2,#2]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[2]);
    check_load(&t32(0xf9310002, "LDRSH r0,[r1,r2]"), OffsetFormat::ScaledRegister, BaseUpdate::Offset, &[1, 2]);
    check_load(&t32(0xf8df0008, "LDR r0,[pc,#8]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[PC]);
    check_load(&t32(0xf8510b04, "LDR r0,[r1],#4"), OffsetFormat::Immediate, BaseUpdate::PostIndexed, &[1]);
}

#[test]
fn t32_store_group() {
    check_store(&t32(0xf8010f04, "STRB r0,[r1,#4]!"), OffsetFormat::Immediate, BaseUpdate::PreIndexed, &[0, 1]);
    check_store(&t32(0xf8410002, "STR r0,[r1,r2]"), OffsetFormat::Register, BaseUpdate::Offset, &[0, 1, 2]);
}

#[test]
fn t32_exclusive_and_table_branch() {
    check_store(&t32(0xe8421000, "STREX r0,r1,[r2]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[1, 2]);
    check_load(&t32(0xe8510f00, "LDREX r0,[r1]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[1]);

    let ii = t32(0xe8d0f001, "TBB [r0,r1]");
    assert!(ii.is_branch());
    assert_eq!(ii.input_registers(false), &[0, 1]);
    assert_eq!(ii.input_registers(true), &[PC]);
}

#[test]
fn t32_coprocessor_transfers() {
    check_store(&t32(0xed815e01, "STC p14,c5,[r1,#4]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[1]);
    check_load(&t32(0xed915e01, "LDC p14,c5,[r1,#4]"), OffsetFormat::Immediate, BaseUpdate::Offset, &[1]);
}

#[test]
fn t32_plain_binary_immediate_group() {
    check_plain(&t32(0xf2400001, "MOVW r0,#1"), &[]);
    check_plain(&t32(0xf2af0004, "ADR r0,{pc}-4"), &[PC]);
    check_plain(&t32(0xf3610000, "BFI r0,r1,#0,#1"), &[1]);
    check_plain(&t32(0xf36f0000, "BFC r0,#0,#1"), &[]);
    check_plain(&t32(0xf3010000, "SSAT r0,#1,r1"), &[1]);
}

#[test]
fn t32_misc_control_group() {
    check_plain(&t32(0xf3ef8000, "MRS r0,APSR"), &[]);
    check_plain(&t32(0xf3af8000, "NOP.W"), &[]);
}

#[test]
fn t32_parallel_and_saturating_arithmetic() {
    check_plain(&t32(0xfa81f002, "SADD8 r0,r1,r2"), &[1, 2]);

    // QADD names Rm first.
    let ii = t32(0xfa82f081, "QADD r0,r1,r2");
    check_plain(&ii, &[1, 2]);
}

#[test]
fn t32_bit_twiddling_group() {
    check_plain(&t32(0xfa91f081, "REV.W r0,r1"), &[1]);
    check_plain(&t32(0xfab1f081, "CLZ r0,r1"), &[1]);
}

#[test]
fn t32_long_multiply_group() {
    // Long accumulates read the accumulator halves too.
    check_plain(&t32(0xfbc20103, "SMLAL r0,r1,r2,r3"), &[0, 1, 2, 3]);
    check_plain(&t32(0xfba20103, "UMULL r0,r1,r2,r3"), &[2, 3]);
    check_plain(&t32(0xfbb1f0f2, "UDIV r0,r1,r2"), &[1, 2]);
}

#[test]
fn implicit_reads_by_group() {
    assert_eq!(t16(0xb530, "PUSH {r4,r5,lr}").input_registers(true), &[MSP]);
    assert_eq!(t16(0xd0fe, "BEQ {pc}-4").input_registers(true), &[PC, CPSR]);
    assert_eq!(t16(0x4151, "ADCS r1,r2").input_registers(true), &[CPSR]);
    assert_eq!(t32(0xe8bd0030, "POP {r4,r5}").input_registers(true), &[MSP]);
    assert_eq!(t32(0xfaa0f080, "SEL r0,r0,r0").input_registers(true), &[CPSR]);
}

#[test]
fn loads_and_stores_always_have_an_addressing_mode() {
    let probes: &[(u32, u32, &str)] = &[
        (16, 0x4804, "LDR r0,[pc,#16]"),
        (16, 0x5088, "STR r0,[r1,r2]"),
        (16, 0x7853, "LDRB r3,[r2,#1]"),
        (16, 0x8848, "LDRH r0,[r1,#2]"),
        (16, 0x9102, "STR r1,[sp,#8]"),
        (16, 0xb530, "PUSH {r4,r5,lr}"),
        (16, 0xbd10, "POP {r4,pc}"),
        (16, 0xc006, "STMIA r0!,{r1,r2}"),
        (16, 0xc904, "LDMIA r1!,{r2}"),
        (32, 0xe8421000, "STREX r0,r1,[r2]"),
        (32, 0xe891000c, "LDM r1,{r2,r3}"),
        (32, 0xe9425504, "STRD r5,r5,[r2,#-0x10]"),
        (32, 0xe9d63401, "LDRD r3,r4,[r6,#4]"),
        (32, 0xed815e01, "STC p14,c5,[r1,#4]"),
        (32, 0xf8110002, "LDRB r0,[r1,r2]"),
        (32, 0xf8410002, "STR r0,[r1,r2]"),
        (32, 0xf8db0800, "LDR r0,[r11,#2048]"),
    ];
    for (width, opcode, asm) in probes {
        let ii = decode(*width, *opcode, asm);
        assert!(ii.is_memory_access(), "{asm}");
        assert!(ii.has_valid_addressing_mode(), "{asm}");
    }

    let non_memory: &[(u32, u32, &str)] = &[
        (16, 0x2105, "MOVS r1,#5"),
        (16, 0x4770, "BX lr"),
        (16, 0xd0fe, "BEQ {pc}-4"),
        (32, 0xea010203, "AND r2,r1,r3"),
        (32, 0xf000d000, "BL {pc}+4"),
        (32, 0xf891f004, "PLD [r1,#4]"),
    ];
    for (width, opcode, asm) in non_memory {
        let ii = decode(*width, *opcode, asm);
        assert!(!ii.is_memory_access(), "{asm}");
        assert!(!ii.has_valid_addressing_mode(), "{asm}");
    }
}
