//! ARMv7-M architecture information: register file, branch and cycle
//! estimates, and the T16/T32 instruction-attribute decoder.
//!
//! The decoder is a flat, nested bit-field dispatch over the two Thumb
//! encoding spaces. The structure deliberately follows the architecture
//! manual's encoding tables group by group rather than anything cleverer;
//! flat and commented is what keeps it auditable against the manual.
//!
//! Encodings the architecture marks UNPREDICTABLE or UNDEFINED, and
//! encodings the decoder does not recognise, are programming or trace bugs
//! and panic with the offending instruction and the decoder location.
//! Unallocated but legal-to-skip encodings decode to an empty `InstrInfo`.

use glimmer_trace::{InstructionSet, ReferenceInstruction};
use strum::{EnumCount, FromRepr};

use crate::{ArchInfo, BaseUpdate, InstrInfo, OffsetFormat};

/// The ARMv7-M register file, as the traces name it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumCount, FromRepr)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Msp,
    Lr,
    Pc,
    Cpsr,
    Psr,
}

const REGISTER_NAMES: [&str; Register::COUNT] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "MSP",
    "r14", "pc", "cpsr", "psr",
];

const MSP: u32 = Register::Msp as u32;
const PC: u32 = Register::Pc as u32;
const CPSR: u32 = Register::Cpsr as u32;

#[inline]
const fn bit(instr: u32, pos: u32) -> u32 {
    (instr >> pos) & 0x01
}

#[inline]
const fn bits(instr: u32, msb: u32, lsb: u32) -> u32 {
    (instr >> lsb) & ((1 << (msb - lsb + 1)) - 1)
}

macro_rules! report_unpredictable {
    ($i:expr) => {
        panic!(
            "UNPREDICTABLE instruction '{}' with encoding 0x{:08x} at {}:{}",
            $i.disassembly,
            $i.instruction,
            file!(),
            line!()
        )
    };
}

macro_rules! report_decoding_error {
    ($i:expr) => {
        panic!(
            "Decoding error for instruction '{}' with encoding 0x{:08x} at {}:{}",
            $i.disassembly,
            $i.instruction,
            file!(),
            line!()
        )
    };
}

macro_rules! report_undefined {
    ($i:expr) => {
        panic!(
            "Undefined instruction '{}' with encoding 0x{:08x} at {}:{}",
            $i.disassembly,
            $i.instruction,
            file!(),
            line!()
        )
    };
}

fn is_thumb_branch(instr: u32, width: u32) -> bool {
    if width == 16 {
        // Encoding T1 (conditional branch).
        if bits(instr, 15, 12) == 0xd {
            return true;
        }
        // Encoding T2 (unconditional branch).
        if bits(instr, 15, 11) == 0x1c {
            return true;
        }
        return false;
    }

    if width == 32 {
        // Encodings T3.
        if bits(instr, 31, 27) == 0x1e
            && bits(instr, 15, 14) == 0x2
            && bit(instr, 12) == 1
            && bits(instr, 25, 23) != 0x7
        {
            return true;
        }
        // Encodings T4.
        if bits(instr, 31, 27) == 0x1e && bits(instr, 15, 14) == 0x2 && bit(instr, 12) == 0 {
            return true;
        }
        return false;
    }

    panic!("Unexpected instruction width: {width}");
}

/// Derive the T32 single-data-item addressing mode from the encoding's
/// immediate-form, index and write-back bits. `None` marks the one
/// combination the architecture leaves unallocated.
fn get_addressing_mode(imm12: bool, b11: bool, p: bool, w: bool) -> Option<(OffsetFormat, BaseUpdate)> {
    if imm12 {
        return Some((OffsetFormat::Immediate, BaseUpdate::Offset));
    }

    if !b11 {
        return Some((OffsetFormat::Register, BaseUpdate::Offset));
    }

    match (p, w) {
        (true, false) => Some((OffsetFormat::Immediate, BaseUpdate::Offset)),
        (true, true) => Some((OffsetFormat::Immediate, BaseUpdate::PreIndexed)),
        (false, true) => Some((OffsetFormat::Immediate, BaseUpdate::PostIndexed)),
        (false, false) => None,
    }
}

fn decode_t16_instr(i: &ReferenceInstruction) -> InstrInfo {
    let mut ii = InstrInfo::new();
    let opcode = i.instruction;

    let b15_14 = bits(opcode, 15, 14);
    // ===== Shift (immediate), add, substract, move and compare
    if b15_14 == 0x0 {
        let opc = bits(opcode, 13, 11);
        if /* LSL */ opc == 0x0 || /* LSR */ opc == 0x01 || /* ASR */ opc == 0x02 {
            ii.add_input_register(bits(opcode, 5, 3));
            return ii;
        }
        if /* ADD / SUB */ opc == 0x03 {
            ii.add_input_register(bits(opcode, 5, 3));
            let opc2 = bits(opcode, 10, 9);
            if /* ADD reg */ opc2 == 0x00 || /* SUB reg */ opc2 == 0x01 {
                ii.add_input_register(bits(opcode, 8, 6));
            }
            return ii;
        }
        if /* MOV imm */ opc == 0x04 {
            return ii;
        }
        if /* CMP */ opc == 0x05 || /* ADD imm8 */ opc == 0x06 || /* SUB imm8 */ opc == 0x07 {
            ii.add_input_register(bits(opcode, 10, 8));
            return ii;
        }
        report_decoding_error!(i);
    }

    let b15_10 = bits(opcode, 15, 10);
    // ===== Data processing instructions
    if b15_10 == 0x10 {
        let opc = bits(opcode, 9, 6);
        let rm = bits(opcode, 5, 3);
        let rdn = bits(opcode, 2, 0);
        if /* RSB */ opc == 0x09 || /* MVN */ opc == 0x0f {
            ii.add_input_register(rm);
            return ii;
        }
        ii.add_input_registers(&[rdn, rm]);
        if /* ADC */ opc == 0x05 || /* SBC */ opc == 0x06 {
            ii.add_implicit_input_register(CPSR);
        }
        return ii;
    }

    // ===== Special data instruction and branch and exchange
    if b15_10 == 0x11 {
        let op = bits(opcode, 9, 6);
        let rm = bits(opcode, 6, 3);
        let rdn = bits(opcode, 2, 0);
        if /* ADD reg */ bits(op, 3, 2) == 0x00 {
            ii.add_input_registers(&[(bit(opcode, 7) << 3) | rdn, rm]);
            return ii;
        }
        if op == 0x04 {
            report_unpredictable!(i);
        }
        if /* CMP reg */ op == 0x05 || bits(op, 3, 1) == 0x03 {
            ii.add_input_registers(&[(bit(opcode, 7) << 3) | rdn, rm]);
            return ii;
        }
        if /* MOV reg */ bits(op, 3, 2) == 0x02 {
            ii.add_input_register(rm);
            return ii;
        }
        if /* BX */ bits(op, 3, 1) == 0x06 {
            ii.set_branch().add_input_register(rm);
            return ii;
        }
        if /* BLX */ bits(op, 3, 1) == 0x07 {
            ii.set_call().add_input_register(rm);
            return ii;
        }
        report_decoding_error!(i);
    }

    // ===== Load from Literal Pool
    if b15_10 == 0x12 || b15_10 == 0x13 {
        ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset).add_input_register(PC);
        return ii;
    }

    // ===== Load / store single data item
    let b15_12 = bits(opcode, 15, 12);
    if (0x05..=0x09).contains(&b15_12) {
        let op_b = bits(opcode, 11, 9);
        // STR, STRH, STRB, LDR, LDRH, LDRB, LDRSB, LDRSH (register)
        if b15_12 == 0x05 {
            if op_b < 3 {
                // Stores
                ii.set_store(OffsetFormat::Register, BaseUpdate::Offset)
                    .add_input_register(bits(opcode, 2, 0));
            } else {
                ii.set_load(OffsetFormat::Register, BaseUpdate::Offset);
            }
            ii.add_input_registers(&[bits(opcode, 5, 3), bits(opcode, 8, 6)]);
            return ii;
        }
        // ===== Load / Store immediate
        if b15_12 == 0x06 || b15_12 == 0x07 || b15_12 == 0x08 {
            if bit(op_b, 2) == 0 {
                // Stores
                ii.set_store(OffsetFormat::Immediate, BaseUpdate::Offset)
                    .add_input_register(bits(opcode, 2, 0));
            } else {
                ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset);
            }
            ii.add_input_register(bits(opcode, 5, 3));
            return ii;
        }
        // ===== Load / Store SP-relative
        if b15_12 == 0x09 {
            if bit(op_b, 2) == 0 {
                // Stores
                ii.set_store(OffsetFormat::Immediate, BaseUpdate::Offset)
                    .add_input_register(bits(opcode, 10, 8));
            } else {
                ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset);
            }
            ii.add_input_register(MSP);
            return ii;
        }
        report_decoding_error!(i);
    }

    // ===== Generate PC-relative address
    let b15_11 = bits(opcode, 15, 11);
    if /* ADR */ b15_11 == 0x14 {
        ii.add_input_register(PC);
        return ii;
    }

    // ===== Generate SP-relative address
    if /* ADD SP */ b15_11 == 0x15 {
        ii.add_input_register(MSP);
        return ii;
    }

    // ===== Misc instructions
    if b15_12 == 0x0b {
        if /* CPS */ bits(opcode, 11, 5) == 0x33 {
            return ii;
        }

        let b11_8 = bits(opcode, 11, 8);
        if /* ADD / SUB SPimm */ b11_8 == 0x00 {
            ii.add_input_register(MSP);
            return ii;
        }

        if /* CBNZ, CBZ */ b11_8 == 0x01 || b11_8 == 0x03 || b11_8 == 0x09 || b11_8 == 0x0b {
            ii.set_branch().add_input_register(bits(opcode, 2, 0));
            return ii;
        }

        let b11_6 = bits(opcode, 11, 6);
        if /* SXTH */ b11_6 == 0x08 || /* SXTB */ b11_6 == 0x09
            || /* UXTH */ b11_6 == 0x0a || /* UXTB */ b11_6 == 0x0b
            || /* REV */ b11_6 == 0x28 || /* REV16 */ b11_6 == 0x29
            || /* REVSH */ b11_6 == 0x2b
        {
            ii.add_input_register(bits(opcode, 5, 3));
            return ii;
        }

        let b11_9 = bits(opcode, 11, 9);
        if /* PUSH */ b11_9 == 0x02 || /* POP */ b11_9 == 0x06 {
            if b11_9 == 0x02 {
                ii.set_store(OffsetFormat::Immediate, BaseUpdate::Offset);
                for r in 0..8 {
                    if bit(opcode, r) == 1 {
                        ii.add_input_register(r);
                    }
                }
            } else {
                ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset);
            }
            ii.add_implicit_input_register(MSP);
            return ii;
        }

        if /* BKPT */ b11_8 == 0x0e {
            ii.set_call();
            return ii;
        }

        if /* ===== If-Then, hints */ b11_8 == 0x0f {
            let op_b = bits(opcode, 3, 0);
            if op_b != 0 {
                ii.add_implicit_input_register(CPSR);
            }
            return ii;
        }

        report_decoding_error!(i);
    }

    // ===== Store multiple registers
    if b15_11 == 0x18 {
        ii.add_input_register(bits(opcode, 10, 8));
        for r in 0..8 {
            if bit(opcode, r) == 1 {
                ii.add_input_register(r);
            }
        }
        ii.set_store(OffsetFormat::Immediate, BaseUpdate::PostIndexed);
        return ii;
    }

    // ===== Load multiple registers
    if b15_11 == 0x19 {
        ii.set_load(OffsetFormat::Immediate, BaseUpdate::PostIndexed)
            .add_input_register(bits(opcode, 10, 8));
        return ii;
    }

    // ===== Conditional branch and supervisor call
    if b15_12 == 0x0d {
        let opc = bits(opcode, 11, 8);
        match opc {
            /* SVC */ 0x0f | /* UDF */ 0x0e => {
                ii.set_call();
            }
            /* Bcc */
            _ => {
                ii.set_branch()
                    .add_implicit_input_register(PC)
                    .add_implicit_input_register(CPSR);
            }
        }
        return ii;
    }

    // ===== Unconditional branch
    if b15_11 == 0x1c {
        ii.set_branch().add_implicit_input_register(PC);
        return ii;
    }

    report_decoding_error!(i);
}

fn decode_t32_instr(i: &ReferenceInstruction) -> InstrInfo {
    let mut ii = InstrInfo::new();
    let instr = i.instruction;

    debug_assert!(bits(instr, 31, 29) == 0x07, "Instruction does not look like a T32 instr");
    let op1 = bits(instr, 28, 27);
    let op2 = bits(instr, 26, 20);

    // ===== Coprocessor instructions
    if (op1 == 0x01 || op1 == 0x03) && bit(op2, 6) == 1 {
        let c_op1 = bits(instr, 25, 20);
        let rn = bits(instr, 19, 16);
        if /* STC, STC2, LDC, LDC2 */ bit(c_op1, 5) == 0
            && (bits(c_op1, 4, 3) != 0x0 || bit(c_op1, 1) != 0)
        {
            let w = bit(instr, 21);
            let u = bit(instr, 23);
            let p = bit(instr, 24);
            let bu = if p == 1 {
                if w == 1 {
                    BaseUpdate::PreIndexed
                } else {
                    BaseUpdate::Offset
                }
            } else if w == 1 {
                BaseUpdate::PostIndexed
            } else if u == 1 {
                BaseUpdate::Unindexed
            } else {
                report_decoding_error!(i);
            };
            if bit(c_op1, 0) == 0x0 {
                ii.set_store(OffsetFormat::Immediate, bu);
            } else {
                ii.set_load(OffsetFormat::Immediate, bu);
            }
            ii.add_input_register(rn);
            return ii;
        }
        if /* MCRR, MCRR2 */ c_op1 == 0x04 {
            ii.add_input_registers(&[bits(instr, 15, 12), rn]);
            return ii;
        }
        if /* MRRC, MRRC2 */ c_op1 == 0x05 {
            return ii;
        }
        if bits(c_op1, 5, 4) == 0x02 {
            let c_op = bit(instr, 4);
            if /* CDP, CDP2 */ c_op == 0 {
                return ii;
            }
            if /* MCR, MCR2 */ bit(c_op1, 0) == 0 && c_op == 1 {
                ii.add_input_register(bits(instr, 15, 12));
                return ii;
            }
            if /* MRC, MRC2 */ bit(c_op1, 0) == 1 && c_op == 1 {
                return ii;
            }
        }
        report_decoding_error!(i);
    }

    if op1 == 0x01 {
        if bits(op2, 6, 5) == 0x00 {
            let rn = bits(instr, 19, 16);
            // ===== Load / Store multiple
            if bit(op2, 2) == 0 {
                let b24_23 = bits(instr, 24, 23);
                let l = bit(instr, 20);
                let w = bit(instr, 21);
                // The base address is always read.
                if (b24_23 == 0x01 || b24_23 == 0x02) && w == 1 && rn == 0x0d {
                    // MSP is implicitly read by PUSH & POP.
                    ii.add_implicit_input_register(rn);
                } else {
                    ii.add_input_register(rn);
                }
                if l == 0x01 {
                    /* POP, LDM, LDMIA, LDMFD, LDMDB, LDMEA */
                    ii.set_load(
                        OffsetFormat::Immediate,
                        if w == 1 { BaseUpdate::PostIndexed } else { BaseUpdate::Offset },
                    );
                    return ii;
                }
                if /* STM, STMIA, STMEA */ b24_23 == 0x01
                    || /* PUSH, STMDB, STMFD */ b24_23 == 0x02
                {
                    let reglist = bits(instr, 15, 0);
                    for r in 0..16 {
                        // SP and PC are excluded.
                        if r == 13 || r == 15 {
                            continue;
                        }
                        if reglist & (1 << r) != 0 {
                            ii.add_input_register(r);
                        }
                    }
                    ii.set_store(
                        OffsetFormat::Immediate,
                        if w == 1 { BaseUpdate::PostIndexed } else { BaseUpdate::Offset },
                    );
                    return ii;
                }
                report_decoding_error!(i);
            } else {
                // ===== Load / Store dual or exclusive, table branch
                let b24_23 = bits(instr, 24, 23);
                let b21_20 = bits(instr, 21, 20);
                let b7_4 = bits(instr, 7, 4);
                let w = bit(instr, 21);
                let p = bit(instr, 24);
                if /* STREX */ b24_23 == 0x00 && b21_20 == 0x00 {
                    let rt = bits(instr, 15, 12);
                    ii.set_store(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_registers(&[rt, rn]);
                    return ii;
                }
                if /* LDREX */ b24_23 == 0x00 && b21_20 == 0x01 {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(rn);
                    return ii;
                }
                if /* STRD */ (bit(b24_23, 1) == 0 && b21_20 == 0x02)
                    || (bit(b24_23, 1) == 1 && bit(b21_20, 0) == 0)
                {
                    let rt2 = bits(instr, 11, 8);
                    let rt = bits(instr, 15, 12);
                    if w == 1 {
                        ii.set_store(
                            OffsetFormat::Immediate,
                            if p == 1 { BaseUpdate::PreIndexed } else { BaseUpdate::PostIndexed },
                        );
                    } else {
                        ii.set_store(OffsetFormat::Immediate, BaseUpdate::Offset);
                    }
                    ii.add_input_registers(&[rt, rt2, rn]);
                    return ii;
                }
                if /* LDRD */ (bit(b24_23, 1) == 0 && b21_20 == 0x03)
                    || (bit(b24_23, 1) == 1 && bit(b21_20, 0) == 1)
                {
                    if w == 1 {
                        ii.set_load(
                            OffsetFormat::Immediate,
                            if p == 1 { BaseUpdate::PreIndexed } else { BaseUpdate::PostIndexed },
                        );
                    } else {
                        ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset);
                    }
                    ii.add_input_register(rn);
                    return ii;
                }
                if b24_23 == 0x01 {
                    if b7_4 == 0x04 || b7_4 == 0x05 {
                        if /* LDREXB, LDREXH */ b21_20 == 0x01 {
                            ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                                .add_input_register(rn);
                            return ii;
                        }
                        if /* STREXB, STREXH */ b21_20 == 0x00 {
                            let rd = bits(instr, 3, 0);
                            let rt = bits(instr, 15, 12);
                            ii.set_store(OffsetFormat::Immediate, BaseUpdate::Offset)
                                .add_input_registers(&[rd, rt, rn]);
                            return ii;
                        }
                    }
                    if /* TBB, TBH */ b21_20 == 0x01 && bits(b7_4, 3, 1) == 0x00 {
                        let rm = bits(instr, 3, 0);
                        ii.set_branch()
                            .add_input_registers(&[rn, rm])
                            .add_implicit_input_register(PC);
                        return ii;
                    }
                }
                report_decoding_error!(i);
            }
        }

        // ===== Data processing (shifted register)
        if bits(op2, 6, 5) == 0x01 {
            let op = bits(instr, 24, 21);
            let rn = bits(instr, 19, 16);
            let rd = bits(instr, 11, 8);
            let rm = bits(instr, 3, 0);
            let s = bit(instr, 20);

            match op {
                0x00 => {
                    if rd == 0x0f && s == 0 {
                        report_unpredictable!(i);
                    }
                    /* TST, AND */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                0x01 => {
                    /* BIC */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                0x02 => {
                    if /* ORR */ rn != 0x0f {
                        ii.add_input_register(rn);
                    }
                    /* MOV, LSL, LSR, ASR, RRX, ROR (imm) */
                    ii.add_input_register(rm);
                    return ii;
                }
                0x03 => {
                    if /* ORN */ rn != 0x0f {
                        ii.add_input_register(rn);
                    }
                    /* MVN */
                    ii.add_input_register(rm);
                    return ii;
                }
                0x04 => {
                    if rd == 0x0f && s == 0 {
                        report_unpredictable!(i);
                    }
                    /* EOR, TEQ */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                0x06 => {
                    /* PKHBT, PKHTB */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                0x08 => {
                    if rd == 0x0f && s == 0 {
                        report_unpredictable!(i);
                    }
                    /* ADD, CMN */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                0x0a | 0x0b => {
                    /* ADC, SBC */
                    ii.add_input_registers(&[rn, rm]).add_implicit_input_register(CPSR);
                    return ii;
                }
                0x0d => {
                    if rd == 0x0f && s == 0 {
                        report_unpredictable!(i);
                    }
                    /* SUB, CMP */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                0x0e => {
                    /* RSB */
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                _ => report_decoding_error!(i),
            }
        }
        report_decoding_error!(i);
    }

    if op1 == 0x02 {
        let op = bit(instr, 15);

        if op == 0 {
            if bit(op2, 5) == 0 {
                // ===== Data processing (modified immediate)
                let dp_op = bits(instr, 24, 21);
                let rn = bits(instr, 19, 16);
                match dp_op {
                    /* AND, TST */ 0x00
                    | /* BIC */ 0x01
                    | /* EOR, TEQ */ 0x04
                    | /* ADD, CMN */ 0x08
                    | /* ADC */ 0x0a
                    | /* SBC */ 0x0b
                    | /* SUB, CMP */ 0x0d
                    | /* RSB */ 0x0e => {
                        ii.add_input_register(rn);
                        return ii;
                    }
                    /* ORR, MOV */ 0x02 | /* ORN, MVN */ 0x03 => {
                        if rn != 0x0f {
                            ii.add_input_register(rn);
                        }
                        return ii;
                    }
                    _ => report_decoding_error!(i),
                }
            } else {
                // ===== Data processing (plain binary immediate)
                let dp_op = bits(instr, 24, 20);
                let rn = bits(instr, 19, 16);
                match dp_op {
                    /* ADD, ADR */ 0x00 => {
                        if rn == 0x0f {
                            ii.add_input_register(PC);
                        } else {
                            ii.add_input_register(rn);
                        }
                        return ii;
                    }
                    /* MOVW */ 0x04 | /* MOVT */ 0x0c => {
                        return ii;
                    }
                    /* SUB */ 0x0a => {
                        if rn == 0x0f {
                            ii.add_input_register(PC);
                        } else {
                            ii.add_input_register(rn);
                        }
                        return ii;
                    }
                    /* SSAT, SSAT16 */ 0x10 | /* SSAT16 */ 0x12 | /* SBFX */ 0x14 => {
                        ii.add_input_register(rn);
                        return ii;
                    }
                    /* BFI, BFC */ 0x16 => {
                        if rn != 0x0f {
                            ii.add_input_register(rn);
                        }
                        return ii;
                    }
                    /* USAT, USAT16 */ 0x18 | /* USAT16 */ 0x1a | /* UBFX */ 0x1c => {
                        ii.add_input_register(rn);
                        return ii;
                    }
                    _ => report_decoding_error!(i),
                }
            }
        } else {
            // ===== Branches and misc control
            let b_op1 = bits(instr, 14, 12);
            let b_op = bits(instr, 26, 20);
            if bit(b_op1, 2) == 0 && bit(b_op1, 0) == 0 {
                if /* Bcc */ bits(b_op, 5, 3) != 0x07 {
                    ii.set_branch().add_implicit_input_register(PC);
                    return ii;
                }
                if /* MSR */ bits(b_op, 6, 1) == 0x1c {
                    ii.add_input_register(bits(instr, 19, 16));
                    return ii;
                }
                if /* Hints */ b_op == 0x3a {
                    return ii;
                }
                if /* Misc control */ b_op == 0x3b {
                    return ii;
                }
                if /* MRS */ bits(b_op, 6, 1) == 0x1f {
                    return ii;
                }
                if /* UDF */ b_op1 == 0x02 && b_op == 0x7f {
                    return ii;
                }
                report_decoding_error!(i);
            }
            if /* B */ bit(b_op1, 2) == 0 && bit(b_op1, 0) == 1 {
                ii.set_branch().add_implicit_input_register(PC);
                return ii;
            }
            if /* BL */ bit(b_op1, 2) == 1 && bit(b_op1, 0) == 1 {
                ii.set_call().add_implicit_input_register(PC);
                return ii;
            }
        }
        report_decoding_error!(i);
    }

    if op1 == 0x03 {
        // ===== Store single data item
        if bits(op2, 6, 4) == 0x00 && bit(op2, 0) == 0 {
            let s_op1 = bits(instr, 23, 21);
            let rn = bits(instr, 19, 16);
            let rt = bits(instr, 15, 12);
            let b11 = bit(instr, 11);
            let p = bit(instr, 10);
            let w = bit(instr, 8);
            let rm = bits(instr, 3, 0);
            let Some((of, bu)) =
                get_addressing_mode(bit(instr, 23) == 1, b11 == 1, p == 1, w == 1)
            else {
                report_decoding_error!(i);
            };
            ii.set_store(of, bu);
            if /* long imm */ bit(instr, 23) == 1 {
                if /* STRB Imm12 */ s_op1 == 0x04 {
                    ii.add_input_registers(&[rt, rn]);
                    return ii;
                }
                if /* STRH Imm12 */ s_op1 == 0x05 {
                    ii.add_input_registers(&[rt, rn]);
                    return ii;
                }
                if /* STR Imm12 */ s_op1 == 0x06 {
                    ii.add_input_registers(&[rt, rn]);
                    return ii;
                }
            } else {
                if /* STRB Imm */ s_op1 == 0x00 && b11 == 1 {
                    ii.add_input_registers(&[rt, rn]);
                    return ii;
                }
                if /* STRB Reg */ s_op1 == 0x00 && b11 == 0 {
                    ii.add_input_registers(&[rt, rn, rm]);
                    return ii;
                }
                if /* STRH Imm */ s_op1 == 0x01 && b11 == 1 {
                    ii.add_input_registers(&[rt, rn]);
                    return ii;
                }
                if /* STRH Reg */ s_op1 == 0x01 {
                    ii.add_input_registers(&[rt, rn, bits(instr, 3, 0)]);
                    return ii;
                }
                if /* STR Imm */ s_op1 == 0x02 && b11 == 1 {
                    ii.add_input_registers(&[rt, rn]);
                    return ii;
                }
                if /* STR Reg */ s_op1 == 0x02 {
                    ii.add_input_registers(&[rt, rn, rm]);
                    return ii;
                }
            }
            report_decoding_error!(i);
        }

        // ===== Load byte, memory hints
        if bits(op2, 6, 5) == 0x00 && bits(op2, 2, 0) == 0x01 {
            let l_op1 = bits(instr, 24, 23);
            let rn = bits(instr, 19, 16);
            let rt = bits(instr, 15, 12);
            let l_op2 = bits(instr, 11, 6);
            let rm = bits(instr, 3, 0);

            if rt != 0x0f {
                if /* LDRB lit */ bit(l_op1, 1) == 0 && rn == 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(PC);
                    return ii;
                }
                if /* LDRB imm */ (l_op1 == 0x01
                    || (l_op1 == 0x00 && bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                    || (l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0c))
                    && rn != 0x0f
                {
                    let Some((of, bu)) = get_addressing_mode(
                        bit(instr, 23) == 1,
                        bit(instr, 11) == 1,
                        bit(instr, 10) == 1,
                        bit(instr, 8) == 1,
                    ) else {
                        report_decoding_error!(i);
                    };
                    ii.set_load(of, bu).add_input_register(rn);
                    return ii;
                }
                if /* LDRBT */ l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0e && rn != 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(rn);
                    return ii;
                }
                if /* LDRB reg */ l_op1 == 0x00 && l_op2 == 0x00 && rn != 0x0f {
                    ii.set_load(OffsetFormat::ScaledRegister, BaseUpdate::Offset)
                        .add_input_registers(&[rn, rm]);
                    return ii;
                }
                if /* LDRSB lit */ bit(l_op1, 1) == 1 && rn == 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(PC);
                    return ii;
                }
                if /* LDRSB imm */ (l_op1 == 0x03
                    || (l_op1 == 0x02 && bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                    || (l_op1 == 0x02 && bits(l_op2, 5, 2) == 0x0c))
                    && rn != 0x0f
                {
                    let Some((of, bu)) = get_addressing_mode(
                        bit(instr, 23) == 1,
                        bit(instr, 11) == 1,
                        bit(instr, 10) == 1,
                        bit(instr, 8) == 1,
                    ) else {
                        report_decoding_error!(i);
                    };
                    ii.set_load(of, bu).add_input_register(rn);
                    return ii;
                }
                if /* LDRSBT */ l_op1 == 0x02 && bits(l_op2, 5, 2) == 0x0e && rn != 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(rn);
                    return ii;
                }
                if /* LDRSB reg */ l_op1 == 0x02 && l_op2 == 0x00 && rn != 0x0f {
                    ii.set_load(OffsetFormat::ScaledRegister, BaseUpdate::Offset)
                        .add_input_registers(&[rn, rm]);
                    return ii;
                }
            } else {
                if /* PLD lit */ bit(l_op1, 1) == 0 && rn == 0x0f {
                    ii.add_input_register(PC);
                    return ii;
                }
                if /* PLD imm */ rn != 0x0f
                    && ((l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0c) || l_op1 == 0x01)
                {
                    ii.add_input_register(rn);
                    return ii;
                }
                if /* PLD reg */ l_op1 == 0x00 && l_op2 == 0x00 && rn != 0x0f {
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                if /* Unpredictable */ l_op1 == 0x00
                    && ((bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                        || bits(l_op2, 5, 2) == 0x0c)
                    && rn != 0x0f
                {
                    report_unpredictable!(i);
                }
                if /* PLI imm & lit */ (bit(l_op1, 1) == 1 && rn == 0x0f)
                    || (l_op1 == 0x03 && rn != 0x0f)
                    || (l_op1 == 0x02 && bits(l_op2, 5, 2) == 0x0c && rn != 0x0f)
                {
                    ii.add_input_register(rn);
                    return ii;
                }
                if /* PLI reg */ l_op1 == 0x02 && l_op2 == 0x00 && rn != 0x0f {
                    ii.add_input_registers(&[rn, rm]);
                    return ii;
                }
                if /* Unpredictable */ l_op1 == 0x02
                    && ((bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                        || bits(l_op2, 5, 2) == 0x0c)
                    && rn != 0x0f
                {
                    report_unpredictable!(i);
                }
            }
            report_decoding_error!(i);
        }

        // ===== Load halfword, memory hints
        if bits(op2, 6, 5) == 0x00 && bits(op2, 2, 0) == 0x03 {
            let l_op1 = bits(instr, 24, 23);
            let rn = bits(instr, 19, 16);
            let rt = bits(instr, 15, 12);
            let l_op2 = bits(instr, 11, 6);
            let rm = bits(instr, 3, 0);

            if rt != 0x0f {
                if /* LDRH lit */ bit(l_op1, 1) == 0 && rn == 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(PC);
                    return ii;
                }
                if /* LDRH imm */ (l_op1 == 0x01
                    || (l_op1 == 0x00 && bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                    || (l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0c))
                    && rn != 0x0f
                {
                    let Some((of, bu)) = get_addressing_mode(
                        bit(instr, 23) == 1,
                        bit(instr, 11) == 1,
                        bit(instr, 10) == 1,
                        bit(instr, 8) == 1,
                    ) else {
                        report_decoding_error!(i);
                    };
                    ii.set_load(of, bu).add_input_register(rn);
                    return ii;
                }
                if /* LDRH reg */ l_op1 == 0x00 && l_op2 == 0x00 && rn != 0x0f {
                    ii.set_load(OffsetFormat::ScaledRegister, BaseUpdate::Offset)
                        .add_input_registers(&[rn, rm]);
                    return ii;
                }
                if /* LDRHT */ l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0e && rn != 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(rn);
                    return ii;
                }
                if /* LDRSH imm */ (l_op1 == 0x03
                    || (l_op1 == 0x02 && bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                    || (l_op1 == 0x02 && bits(l_op2, 5, 2) == 0x0c))
                    && rn != 0x0f
                {
                    let Some((of, bu)) = get_addressing_mode(
                        bit(instr, 23) == 1,
                        bit(instr, 11) == 1,
                        bit(instr, 10) == 1,
                        bit(instr, 8) == 1,
                    ) else {
                        report_decoding_error!(i);
                    };
                    ii.set_load(of, bu).add_input_register(rn);
                    return ii;
                }
                if /* LDRSH lit */ bit(l_op1, 1) == 1 && rn == 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(PC);
                    return ii;
                }
                if /* LDRSH reg */ l_op1 == 0x02 && l_op2 == 0x00 && rn != 0x0f {
                    ii.set_load(OffsetFormat::ScaledRegister, BaseUpdate::Offset)
                        .add_input_registers(&[rn, rm]);
                    return ii;
                }
                if /* LDRSHT */ l_op1 == 0x02 && bits(l_op2, 5, 2) == 0x0e && rn != 0x0f {
                    ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset)
                        .add_input_register(rn);
                    return ii;
                }
            } else {
                if /* Unallocated */ bit(l_op1, 1) == 0 && rn == 0x0f {
                    return ii;
                }
                if /* Unallocated */ rn != 0x0f
                    && ((l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0c) || l_op1 == 0x01)
                {
                    return ii;
                }
                if /* Unallocated */ l_op1 == 0x00 && l_op2 == 0x00 && rn != 0x0f {
                    return ii;
                }
                if /* Unpredictable */ l_op1 == 0x00
                    && ((bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                        || bits(l_op2, 5, 2) == 0x0c)
                    && rn != 0x0f
                {
                    report_unpredictable!(i);
                }
                if /* Unallocated */ (bit(l_op1, 1) == 1 && rn == 0x0f)
                    || (l_op1 == 0x03 && rn != 0x0f)
                    || (l_op1 == 0x02 && bits(l_op2, 5, 2) == 0x0c && rn != 0x0f)
                {
                    return ii;
                }
                if /* Unallocated */ l_op1 == 0x02 && l_op2 == 0x00 && rn != 0x0f {
                    return ii;
                }
                if /* Unpredictable */ l_op1 == 0x02
                    && ((bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                        || bits(l_op2, 5, 2) == 0x0c)
                    && rn != 0x0f
                {
                    report_unpredictable!(i);
                }
            }
            report_decoding_error!(i);
        }

        // ===== Load word
        if bits(op2, 6, 5) == 0x00 && bits(op2, 2, 0) == 0x05 {
            let l_op1 = bits(instr, 24, 23);
            let rn = bits(instr, 19, 16);
            let l_op2 = bits(instr, 11, 6);
            let rm = bits(instr, 3, 0);
            if /* LDR Imm */ (l_op1 == 0x01
                || (l_op1 == 0x00
                    && ((bit(l_op2, 5) == 1 && bit(l_op2, 2) == 1)
                        || bits(l_op2, 5, 2) == 0x0c)))
                && rn != 0x0f
            {
                let Some((of, bu)) = get_addressing_mode(
                    bit(instr, 23) == 1,
                    bit(instr, 11) == 1,
                    bit(instr, 10) == 1,
                    bit(instr, 8) == 1,
                ) else {
                    report_decoding_error!(i);
                };
                ii.set_load(of, bu).add_input_register(rn);
                return ii;
            }
            if /* LDRT */ l_op1 == 0x00 && bits(l_op2, 5, 2) == 0x0e && rn != 0x0f {
                ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset).add_input_register(rn);
                return ii;
            }
            if /* LDR Reg */ l_op1 == 0x00 && l_op2 == 0x00 && rn != 0x0f {
                ii.set_load(OffsetFormat::ScaledRegister, BaseUpdate::Offset)
                    .add_input_registers(&[rn, rm]);
                return ii;
            }
            if /* LDR lit */ bit(l_op1, 1) == 0 && rn == 0x0f {
                ii.set_load(OffsetFormat::Immediate, BaseUpdate::Offset).add_input_register(PC);
                return ii;
            }
            report_decoding_error!(i);
        }

        // ===== UNDEFINED
        if bits(op2, 6, 5) == 0x00 && bits(op2, 2, 0) == 0x07 {
            report_undefined!(i);
        }

        // ===== Data processing (register)
        if bits(op2, 6, 4) == 0x02 {
            if bits(instr, 15, 12) != 0x0f {
                report_undefined!(i);
            }

            let l_op1 = bits(instr, 23, 20);
            let l_op2 = bits(instr, 7, 4);
            let rn = bits(instr, 19, 16);
            let rm = bits(instr, 3, 0);

            if (/* LSL */ bits(l_op1, 3, 1) == 0x00
                || /* LSR */ bits(l_op1, 3, 1) == 0x01
                || /* ASR */ bits(l_op1, 3, 1) == 0x02
                || /* ROR */ bits(l_op1, 3, 1) == 0x03)
                && l_op2 == 0x00
            {
                ii.add_input_registers(&[rn, rm]);
                return ii;
            }
            if (/* SXTAH */ l_op1 == 0x00
                || /* UXTAH */ l_op1 == 0x01
                || /* SXTAB16 */ l_op1 == 0x02
                || /* UXTAB16 */ l_op1 == 0x03
                || /* SXTAB */ l_op1 == 0x04
                || /* UXTAB */ l_op1 == 0x05)
                && bit(l_op2, 3) == 1
                && rn != 0x0f
            {
                ii.add_input_registers(&[rn, rm]);
                return ii;
            }
            if (/* SXTH */ l_op1 == 0x00
                || /* UXTH */ l_op1 == 0x01
                || /* SXTB16 */ l_op1 == 0x02
                || /* UXTB16 */ l_op1 == 0x03
                || /* SXTB */ l_op1 == 0x04
                || /* UXTB */ l_op1 == 0x05)
                && bit(l_op2, 3) == 1
                && rn == 0x0f
            {
                ii.add_input_register(rm);
                return ii;
            }
            if bit(l_op1, 3) == 1 && (bits(l_op2, 3, 2) == 0x00 || bits(l_op2, 3, 2) == 0x01) {
                // Parallel addition and substraction, signed / unsigned
                if bits(instr, 15, 12) != 0x0f {
                    report_undefined!(i);
                }
                match bits(l_op2, 1, 0) {
                    0x00 => match bits(l_op1, 2, 0) {
                        /* SADD16, UADD16 */ 0x01
                        | /* SASX, UASX */ 0x02
                        | /* SSAX, USAX */ 0x06
                        | /* SSUB16, USUB16 */ 0x05
                        | /* SADD8, UADD8 */ 0x00
                        | /* SSUB8, USUB8 */ 0x04 => {
                            ii.add_input_registers(&[rn, rm]);
                            return ii;
                        }
                        _ => report_decoding_error!(i),
                    },
                    // Saturating instructions
                    0x01 => match bits(l_op1, 2, 0) {
                        /* QADD16, UQADD16 */ 0x01
                        | /* QASX, UQASX */ 0x02
                        | /* QSAX, UQSAX */ 0x06
                        | /* QSUB16, UQSUB16 */ 0x05
                        | /* QADD8, UQADD8 */ 0x00
                        | /* QSUB8, UQSUB8 */ 0x04 => {
                            ii.add_input_registers(&[rn, rm]);
                            return ii;
                        }
                        _ => report_decoding_error!(i),
                    },
                    // Halving instructions
                    0x02 => match bits(l_op1, 2, 0) {
                        /* SHADD16, UHADD16 */ 0x01
                        | /* SHASX, UHASX */ 0x02
                        | /* SHSAX, UHSAX */ 0x06
                        | /* SHSUB16, UHSUB16 */ 0x05
                        | /* SHADD8, UHADD8 */ 0x00
                        | /* SHSUB8, UHSUB8 */ 0x04 => {
                            ii.add_input_registers(&[rn, rm]);
                            return ii;
                        }
                        _ => report_decoding_error!(i),
                    },
                    _ => report_decoding_error!(i),
                }
            }
            if bits(l_op1, 3, 2) == 0x02 && bits(l_op2, 3, 2) == 0x02 {
                match bits(l_op1, 1, 0) {
                    0x00 => match bits(l_op2, 1, 0) {
                        /* QADD */ 0x00 | /* QDADD */ 0x01
                        | /* QSUB */ 0x02 | /* QDSUB */ 0x03 => {
                            ii.add_input_registers(&[rm, rn]);
                            return ii;
                        }
                        _ => report_decoding_error!(i),
                    },
                    0x01 => match bits(l_op2, 1, 0) {
                        /* REV */ 0x00 | /* REV16 */ 0x01
                        | /* RBIT */ 0x02 | /* REVSH */ 0x03 => {
                            if rm != rn {
                                report_decoding_error!(i);
                            }
                            ii.add_input_register(rm);
                            return ii;
                        }
                        _ => report_decoding_error!(i),
                    },
                    0x02 => {
                        if /* SEL */ bits(l_op2, 1, 0) == 0x00 {
                            ii.add_input_registers(&[rn, rm])
                                .add_implicit_input_register(CPSR);
                            return ii;
                        }
                    }
                    0x03 => {
                        if /* CLZ */ bits(l_op2, 1, 0) == 0x00 {
                            ii.add_input_register(rm);
                            return ii;
                        }
                    }
                    _ => report_decoding_error!(i),
                }
            }
            report_decoding_error!(i);
        }

        // ===== Multiply, multiply accumulate and absolute difference
        if bits(op2, 6, 3) == 0x06 {
            if bits(instr, 7, 6) != 0x00 {
                report_undefined!(i);
            }

            let l_op1 = bits(instr, 22, 20);
            let l_op2 = bits(instr, 7, 4);
            let rn = bits(instr, 19, 16);
            let ra = bits(instr, 15, 12);
            let rm = bits(instr, 3, 0);

            match l_op1 {
                0x00 => {
                    if /* MLA */ (l_op2 == 0x00 && ra != 0x0f) || /* MLS */ l_op2 == 0x01 {
                        ii.add_input_registers(&[rn, rm, ra]);
                        return ii;
                    }
                    if /* MUL */ l_op2 == 0x00 && ra == 0x0f {
                        ii.add_input_registers(&[rn, rm]);
                        return ii;
                    }
                }
                0x01 => {
                    /* SMULBB, SMULBT, SMULTB, SMULTT */
                    ii.add_input_registers(&[rn, rm]);
                    if /* SMLABB, SMLABT, SMLATB, SMLATT */ ra != 0x0f {
                        ii.add_input_register(ra);
                    }
                    return ii;
                }
                0x02 => {
                    if bit(l_op2, 1) == 0 {
                        /* SMUAD, SMUADX */
                        ii.add_input_registers(&[rn, rm]);
                        if /* SMLAD, SMLADX */ ra != 0x0f {
                            ii.add_input_register(ra);
                        }
                        return ii;
                    }
                }
                0x03 => {
                    if bit(l_op2, 1) == 0 {
                        /* SMULWB, SMULWT */
                        ii.add_input_registers(&[rn, rm]);
                        if /* SMLAWB, SMLAWT */ ra != 0x0f {
                            ii.add_input_register(ra);
                        }
                        return ii;
                    }
                }
                0x04 => {
                    if bit(l_op2, 1) == 0 {
                        /* SMUSD, SMUSDX */
                        ii.add_input_registers(&[rn, rm]);
                        if /* SMLSD, SMLSDX */ ra != 0x0f {
                            ii.add_input_register(ra);
                        }
                        return ii;
                    }
                }
                0x05 => {
                    if bit(l_op2, 1) == 0 {
                        /* SMMUL, SMMULR */
                        ii.add_input_registers(&[rn, rm]);
                        if /* SMMLA, SMMLAR */ ra != 0x0f {
                            ii.add_input_register(ra);
                        }
                        return ii;
                    }
                }
                0x06 => {
                    if /* SMMLS, SMMLSR */ bit(l_op2, 1) == 0 {
                        ii.add_input_registers(&[rn, rm, ra]);
                        return ii;
                    }
                }
                0x07 => {
                    if l_op2 == 0x00 {
                        /* USAD8 */
                        ii.add_input_registers(&[rn, rm]);
                        if /* USADA8 */ ra != 0x0f {
                            ii.add_input_register(ra);
                        }
                        return ii;
                    }
                }
                _ => report_decoding_error!(i),
            }
            report_decoding_error!(i);
        }

        // ===== Long multiply, long multiply accumulate and divide
        if bits(op2, 6, 3) == 0x07 {
            let l_op1 = bits(instr, 22, 20);
            let l_op2 = bits(instr, 7, 4);
            let rn = bits(instr, 19, 16);
            let rm = bits(instr, 3, 0);
            let rd_lo = bits(instr, 15, 12);
            let rd_hi = bits(instr, 11, 8);

            if (/* SMULL */ l_op1 == 0x00 && l_op2 == 0x00)
                || (/* SDIV */ l_op1 == 0x01 && l_op2 == 0x0f)
                || (/* UMULL */ l_op1 == 0x02 && l_op2 == 0x00)
                || (/* UDIV */ l_op1 == 0x03 && l_op2 == 0x0f)
            {
                ii.add_input_registers(&[rn, rm]);
                return ii;
            }
            if l_op1 == 0x04
                && (/* SMLAL */ l_op2 == 0x00
                    || /* SMLALBB, SMLALBT, SMLALTB, SMLALTT */ bits(l_op2, 3, 2) == 0x02
                    || /* SMLALD, SMLALDX */ bits(l_op2, 3, 1) == 0x06)
            {
                ii.add_input_registers(&[rd_lo, rd_hi, rn, rm]);
                return ii;
            }
            if /* SMLSLD, SMLSLDX */ l_op1 == 0x05 && bits(l_op2, 3, 1) == 0x06 {
                ii.add_input_registers(&[rn, rm]);
                return ii;
            }
            if l_op1 == 0x06 && (/* UMLAL */ l_op2 == 0x00 || /* UMAAL */ l_op2 == 0x06) {
                ii.add_input_registers(&[rd_lo, rd_hi, rn, rm]);
                return ii;
            }
        }
    }
    report_decoding_error!(i);
}

/// Architectural information for ARMv7-M.
#[derive(Clone, Copy, Debug, Default)]
pub struct V7MInfo;

impl V7MInfo {
    /// Decode the attributes of `instr` (associated-function edition).
    pub fn decode(instr: &ReferenceInstruction) -> InstrInfo {
        match instr.width {
            16 => decode_t16_instr(instr),
            32 => decode_t32_instr(instr),
            w => panic!("Unexpected instruction width: {w}"),
        }
    }

    /// The registers read by an instruction with attributes `ii`, optionally
    /// deduplicated.
    pub fn registers_read(ii: &InstrInfo, implicit: bool, uniquify: bool) -> Vec<Register> {
        let ids = if uniquify {
            ii.unique_input_registers(implicit)
        } else {
            ii.input_registers(implicit).to_vec()
        };
        ids.iter().map(|&r| Register::from_repr(r).expect("register id out of range")).collect()
    }

    /// The name of `reg`.
    pub fn name(reg: Register) -> &'static str {
        REGISTER_NAMES[reg as usize]
    }
}

impl ArchInfo for V7MInfo {
    fn nop(&self, instr_size: usize) -> u32 {
        match instr_size {
            2 => 0xbf00,
            4 => 0xf3af8000,
            _ => panic!("Unexpected NOP size: {instr_size}"),
        }
    }

    fn is_branch(&self, instr: &ReferenceInstruction) -> bool {
        match instr.iset {
            InstructionSet::Thumb | InstructionSet::Arm => {
                is_thumb_branch(instr.instruction, instr.width)
            }
            InstructionSet::A64 => false,
        }
    }

    fn cycles(&self, instr: &ReferenceInstruction, next: Option<&ReferenceInstruction>) -> usize {
        // A taken branch pays for the pipeline refill; everything else is
        // modelled as a single cycle.
        if let Some(next) = next {
            if self.is_branch(instr) && next.pc != instr.pc + u64::from(instr.width) / 8 {
                return 3;
            }
        }
        1
    }

    fn num_registers(&self) -> usize {
        Register::COUNT
    }

    fn register_name(&self, reg: usize) -> &'static str {
        REGISTER_NAMES[reg]
    }

    fn register_id(&self, name: &str) -> Option<usize> {
        REGISTER_NAMES.iter().position(|&n| n == name)
    }

    fn is_status_register(&self, name: &str) -> bool {
        name == "cpsr" || name == "psr"
    }

    fn instr_info(&self, instr: &ReferenceInstruction) -> InstrInfo {
        V7MInfo::decode(instr)
    }

    fn description(&self) -> &'static str {
        "Arm V7M ISA"
    }
}

#[cfg(test)]
mod tests {
    use glimmer_trace::{InstructionEffect, InstructionSet, ReferenceInstruction};
    use rstest::rstest;

    use super::*;
    use crate::{ArchInfo, BaseUpdate, InstructionKind, OffsetFormat};

    fn t16(opcode: u32, asm: &str) -> ReferenceInstruction {
        ReferenceInstruction::new(
            0,
            InstructionEffect::Executed,
            0x8000,
            InstructionSet::Thumb,
            16,
            opcode,
            asm,
            vec![],
            vec![],
        )
    }

    fn t32(opcode: u32, asm: &str) -> ReferenceInstruction {
        ReferenceInstruction::new(
            0,
            InstructionEffect::Executed,
            0x8000,
            InstructionSet::Thumb,
            32,
            opcode,
            asm,
            vec![],
            vec![],
        )
    }

    #[rstest]
    #[case(true, false, false, false, Some((OffsetFormat::Immediate, BaseUpdate::Offset)))]
    #[case(true, true, true, true, Some((OffsetFormat::Immediate, BaseUpdate::Offset)))]
    #[case(false, false, false, false, Some((OffsetFormat::Register, BaseUpdate::Offset)))]
    #[case(false, false, true, true, Some((OffsetFormat::Register, BaseUpdate::Offset)))]
    #[case(false, true, true, false, Some((OffsetFormat::Immediate, BaseUpdate::Offset)))]
    #[case(false, true, true, true, Some((OffsetFormat::Immediate, BaseUpdate::PreIndexed)))]
    #[case(false, true, false, true, Some((OffsetFormat::Immediate, BaseUpdate::PostIndexed)))]
    #[case(false, true, false, false, None)]
    fn addressing_mode_table(
        #[case] imm12: bool,
        #[case] b11: bool,
        #[case] p: bool,
        #[case] w: bool,
        #[case] expected: Option<(OffsetFormat, BaseUpdate)>,
    ) {
        assert_eq!(get_addressing_mode(imm12, b11, p, w), expected);
    }

    #[test]
    fn register_table() {
        let cpu = V7MInfo;
        assert_eq!(cpu.num_registers(), 18);
        assert_eq!(cpu.register_name(0), "r0");
        assert_eq!(cpu.register_name(13), "MSP");
        assert_eq!(cpu.register_name(14), "r14");
        assert_eq!(cpu.register_name(15), "pc");
        assert_eq!(cpu.register_name(16), "cpsr");
        assert_eq!(cpu.register_name(17), "psr");
        assert_eq!(cpu.register_id("r12"), Some(12));
        assert_eq!(cpu.register_id("MSP"), Some(13));
        assert_eq!(cpu.register_id("pc"), Some(15));
        assert_eq!(cpu.register_id("r20"), None);
        assert!(cpu.is_status_register("cpsr"));
        assert!(cpu.is_status_register("psr"));
        assert!(!cpu.is_status_register("r0"));
        assert_eq!(V7MInfo::name(Register::Msp), "MSP");
        assert_eq!(cpu.description(), "Arm V7M ISA");
    }

    #[test]
    fn nop_encodings() {
        let cpu = V7MInfo;
        assert_eq!(cpu.nop(2), 0xbf00);
        assert_eq!(cpu.nop(4), 0xf3af8000);
    }

    #[test]
    fn branch_recognition() {
        let cpu = V7MInfo;
        assert!(cpu.is_branch(&t16(0xd0fe, "BEQ {pc}-0x4")));
        assert!(cpu.is_branch(&t16(0xe7fe, "B {pc}")));
        assert!(!cpu.is_branch(&t16(0x2105, "MOVS r1,#5")));
        assert!(cpu.is_branch(&t32(0xf000d000, "BL {pc}+0x4")));
        assert!(!cpu.is_branch(&t32(0xf8db0800, "LDR r0,[r11,#2048]")));
    }

    #[test]
    fn branch_cycle_estimate() {
        let cpu = V7MInfo;
        let b = t16(0xd0fe, "BEQ {pc}+0x10");
        let mut taken = t16(0x2100, "MOVS r1,#0");
        taken.pc = 0x8010;
        let mut fallthrough = t16(0x2100, "MOVS r1,#0");
        fallthrough.pc = 0x8002;

        assert_eq!(cpu.cycles(&b, Some(&taken)), 3);
        assert_eq!(cpu.cycles(&b, Some(&fallthrough)), 1);
        assert_eq!(cpu.cycles(&b, None), 1);
        assert_eq!(cpu.cycles(&fallthrough, Some(&taken)), 1);
    }

    #[test]
    fn t16_shift_add_sub_mov_cmp() {
        let ii = V7MInfo::decode(&t16(0x2105, "MOVS r1,#5"));
        assert!(ii.has_no_kind());
        assert!(ii.input_registers(false).is_empty());
        assert!(ii.input_registers(true).is_empty());

        let ii = V7MInfo::decode(&t16(0x0783, "LSLS r3,r0,#30"));
        assert_eq!(ii.input_registers(false), &[0]);

        let ii = V7MInfo::decode(&t16(0x191a, "ADDS r2,r3,r4"));
        assert_eq!(ii.input_registers(false), &[3, 4]);

        let ii = V7MInfo::decode(&t16(0x2901, "CMP r1,#1"));
        assert_eq!(ii.input_registers(false), &[1]);
    }

    #[test]
    fn t16_data_processing_reads_flags() {
        let ii = V7MInfo::decode(&t16(0x4151, "ADCS r1,r2"));
        assert_eq!(ii.input_registers(false), &[1, 2]);
        assert_eq!(ii.input_registers(true), &[CPSR]);

        // MVN only reads its source operand.
        let ii = V7MInfo::decode(&t16(0x43d1, "MVNS r1,r2"));
        assert_eq!(ii.input_registers(false), &[2]);
        assert!(ii.input_registers(true).is_empty());
    }

    #[test]
    fn t16_branch_and_exchange() {
        let ii = V7MInfo::decode(&t16(0x4770, "BX lr"));
        assert!(ii.is_branch());
        assert_eq!(ii.input_registers(false), &[14]);

        let ii = V7MInfo::decode(&t16(0x47c8, "BLX r9"));
        assert!(ii.is_call());
        assert_eq!(ii.input_registers(false), &[9]);
    }

    #[test]
    fn t16_literal_pool_load() {
        let ii = V7MInfo::decode(&t16(0x4804, "LDR r0,[pc,#16]"));
        assert!(ii.is_load());
        assert_eq!(ii.addressing_mode().offset, OffsetFormat::Immediate);
        assert_eq!(ii.addressing_mode().update, BaseUpdate::Offset);
        assert_eq!(ii.input_registers(false), &[PC]);
    }

    #[test]
    fn t16_load_store_single() {
        // Register form store: Rt, then Rn, Rm.
        let ii = V7MInfo::decode(&t16(0x5088, "STR r0,[r1,r2]"));
        assert!(ii.is_store());
        assert_eq!(ii.addressing_mode().offset, OffsetFormat::Register);
        assert_eq!(ii.input_registers(false), &[0, 1, 2]);

        // Immediate form load only reads the base.
        let ii = V7MInfo::decode(&t16(0x7853, "LDRB r3,[r2,#1]"));
        assert!(ii.is_load());
        assert_eq!(ii.addressing_mode().offset, OffsetFormat::Immediate);
        assert_eq!(ii.input_registers(false), &[2]);

        // SP-relative store reads Rt and SP.
        let ii = V7MInfo::decode(&t16(0x9102, "STR r1,[sp,#8]"));
        assert!(ii.is_store());
        assert_eq!(ii.input_registers(false), &[1, MSP]);
    }

    #[test]
    fn t16_address_generation() {
        let ii = V7MInfo::decode(&t16(0xa000, "ADR r0,{pc}+4"));
        assert_eq!(ii.input_registers(false), &[PC]);
        assert!(ii.has_no_kind());

        let ii = V7MInfo::decode(&t16(0xa901, "ADD r1,sp,#4"));
        assert_eq!(ii.input_registers(false), &[MSP]);
    }

    #[test]
    fn t16_misc() {
        let ii = V7MInfo::decode(&t16(0xb100, "CBZ r0,{pc}+4"));
        assert!(ii.is_branch());
        assert_eq!(ii.input_registers(false), &[0]);

        let ii = V7MInfo::decode(&t16(0xb211, "SXTH r1,r2"));
        assert_eq!(ii.input_registers(false), &[2]);

        let ii = V7MInfo::decode(&t16(0xb530, "PUSH {r4,r5,lr}"));
        assert!(ii.is_store());
        assert_eq!(ii.input_registers(false), &[4, 5]);
        assert_eq!(ii.input_registers(true), &[MSP]);

        let ii = V7MInfo::decode(&t16(0xbd10, "POP {r4,pc}"));
        assert!(ii.is_load());
        assert!(ii.input_registers(false).is_empty());
        assert_eq!(ii.input_registers(true), &[MSP]);

        let ii = V7MInfo::decode(&t16(0xbeab, "BKPT #0xab"));
        assert!(ii.is_call());

        let ii = V7MInfo::decode(&t16(0xbf01, "ITTTT EQ"));
        assert_eq!(ii.input_registers(true), &[CPSR]);

        let ii = V7MInfo::decode(&t16(0xbf00, "NOP"));
        assert!(ii.input_registers(true).is_empty());
    }

    #[test]
    fn t16_load_store_multiple() {
        let ii = V7MInfo::decode(&t16(0xc006, "STMIA r0!,{r1,r2}"));
        assert!(ii.is_store());
        assert_eq!(ii.addressing_mode().update, BaseUpdate::PostIndexed);
        assert_eq!(ii.input_registers(false), &[0, 1, 2]);

        let ii = V7MInfo::decode(&t16(0xc904, "LDMIA r1!,{r2}"));
        assert!(ii.is_load());
        assert_eq!(ii.addressing_mode().update, BaseUpdate::PostIndexed);
        assert_eq!(ii.input_registers(false), &[1]);
    }

    #[test]
    fn t16_branches() {
        let ii = V7MInfo::decode(&t16(0xd0fe, "BEQ {pc}-0x4"));
        assert!(ii.is_branch());
        assert_eq!(ii.input_registers(true), &[PC, CPSR]);

        let ii = V7MInfo::decode(&t16(0xdf01, "SVC #1"));
        assert!(ii.is_call());

        let ii = V7MInfo::decode(&t16(0xe7fe, "B {pc}"));
        assert!(ii.is_branch());
        assert_eq!(ii.input_registers(true), &[PC]);
    }

    #[test]
    fn t32_load_store_single() {
        let ii = V7MInfo::decode(&t32(0xf8db0800, "LDR r0,[r11,#2048]"));
        assert!(ii.is_load());
        assert_eq!(ii.addressing_mode().offset, OffsetFormat::Immediate);
        assert_eq!(ii.addressing_mode().update, BaseUpdate::Offset);
        assert_eq!(ii.input_registers(false), &[11]);

        let ii = V7MInfo::decode(&t32(0xf8cb07fc, "STR r0,[r11,#2044]"));
        assert!(ii.is_store());
        assert_eq!(ii.input_registers(false), &[0, 11]);
    }

    #[test]
    fn t32_load_store_dual() {
        // Duplicate operands are preserved in operand order: Rt, Rt2, Rn.
        let ii = V7MInfo::decode(&t32(0xe9425504, "STRD r5,r5,[r2,#-0x10]"));
        assert!(ii.is_store());
        assert_eq!(ii.addressing_mode().offset, OffsetFormat::Immediate);
        assert_eq!(ii.addressing_mode().update, BaseUpdate::Offset);
        assert_eq!(ii.input_registers(false), &[5, 5, 2]);

        let ii = V7MInfo::decode(&t32(0xe9d63401, "LDRD r3,r4,[r6,#4]"));
        assert!(ii.is_load());
        assert_eq!(ii.input_registers(false), &[6]);
    }

    #[test]
    fn t32_load_store_multiple() {
        let ii = V7MInfo::decode(&t32(0xe891000c, "LDM r1,{r2,r3}"));
        assert!(ii.is_load());
        assert_eq!(ii.addressing_mode().update, BaseUpdate::Offset);
        assert_eq!(ii.input_registers(false), &[1]);

        // POP.W: the base is SP with write-back, an implicit read.
        let ii = V7MInfo::decode(&t32(0xe8bd0030, "POP {r4,r5}"));
        assert!(ii.is_load());
        assert_eq!(ii.addressing_mode().update, BaseUpdate::PostIndexed);
        assert!(ii.input_registers(false).is_empty());
        assert_eq!(ii.input_registers(true), &[13]);
    }

    #[test]
    fn t32_data_processing() {
        let ii = V7MInfo::decode(&t32(0xea010203, "AND r2,r1,r3"));
        assert_eq!(ii.input_registers(false), &[1, 3]);

        // ADC.W consumes the carry flag.
        let ii = V7MInfo::decode(&t32(0xeb410203, "ADC r2,r1,r3"));
        assert_eq!(ii.input_registers(false), &[1, 3]);
        assert_eq!(ii.input_registers(true), &[CPSR]);
    }

    #[test]
    fn t32_branches_and_misc_control() {
        let ii = V7MInfo::decode(&t32(0xf000d000, "BL {pc}+0x4"));
        assert!(ii.is_call());
        assert_eq!(ii.input_registers(true), &[PC]);

        let ii = V7MInfo::decode(&t32(0xf0008001, "BEQ.W {pc}+0x6"));
        assert!(ii.is_branch());
        assert_eq!(ii.input_registers(true), &[PC]);

        let ii = V7MInfo::decode(&t32(0xf3808800, "MSR APSR,r0"));
        assert!(ii.has_no_kind());
        assert_eq!(ii.input_registers(false), &[0]);
    }

    #[test]
    fn t32_multiply_and_divide() {
        let ii = V7MInfo::decode(&t32(0xfb00f001, "MUL r0,r0,r1"));
        assert_eq!(ii.input_registers(false), &[0, 1]);

        let ii = V7MInfo::decode(&t32(0xfb90f1f1, "SDIV r1,r0,r1"));
        assert_eq!(ii.input_registers(false), &[0, 1]);
    }

    #[test]
    fn t32_sel_reads_flags() {
        let ii = V7MInfo::decode(&t32(0xfaa0f080, "SEL r0,r0,r0"));
        assert_eq!(ii.input_registers(false), &[0, 0]);
        assert_eq!(ii.input_registers(true), &[CPSR]);
    }

    #[test]
    fn t32_coprocessor() {
        let ii = V7MInfo::decode(&t32(0xee010a10, "MCR p10,#0,r0,c1,c0,#0"));
        assert!(ii.has_no_kind());
        assert_eq!(ii.input_registers(false), &[0]);
    }

    #[test]
    fn memory_access_iff_valid_addressing_mode() {
        let encodings = [
            t16(0x2105, "MOVS r1,#5"),
            t16(0x4804, "LDR r0,[pc,#16]"),
            t16(0x5088, "STR r0,[r1,r2]"),
            t16(0xb530, "PUSH {r4,r5,lr}"),
            t16(0xd0fe, "BEQ {pc}-0x4"),
            t32(0xf8db0800, "LDR r0,[r11,#2048]"),
            t32(0xe9425504, "STRD r5,r5,[r2,#-0x10]"),
            t32(0xea010203, "AND r2,r1,r3"),
            t32(0xf000d000, "BL {pc}+0x4"),
        ];
        for instr in &encodings {
            let ii = V7MInfo::decode(instr);
            assert_eq!(
                ii.is_memory_access(),
                ii.has_valid_addressing_mode(),
                "{}",
                instr.disassembly
            );
        }
    }

    #[test]
    fn unique_input_registers() {
        let ii = V7MInfo::decode(&t32(0xe9425504, "STRD r5,r5,[r2,#-0x10]"));
        assert_eq!(ii.input_registers(false), &[5, 5, 2]);
        assert_eq!(ii.unique_input_registers(false), vec![2, 5]);
        assert_eq!(
            V7MInfo::registers_read(&ii, false, true),
            vec![Register::R2, Register::R5]
        );
        assert_eq!(
            V7MInfo::registers_read(&ii, false, false),
            vec![Register::R5, Register::R5, Register::R2]
        );
    }

    #[test]
    #[should_panic(expected = "UNPREDICTABLE")]
    fn unpredictable_encodings_abort() {
        // Special-data group, op == 0b0100.
        V7MInfo::decode(&t16(0x4500, "??"));
    }
}
