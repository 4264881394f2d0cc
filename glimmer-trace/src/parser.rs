//! Line parser for the textual trace format emitted by the Arm simulators.
//!
//! Only the event subset the builders need is understood: instruction lines
//! (`IT` / `IS`), register write lines (`R`) and memory access lines
//! (`MR<n>` / `MW<n>`). Everything else is reported as a text-only event,
//! which the instruction builders ignore. The full on-disk index format
//! stays behind [`IndexedTrace`](crate::builder::IndexedTrace).

use thiserror::Error;

use crate::{InstructionEffect, InstructionSet};

/// A malformed trace line.
#[derive(Debug, Error)]
#[error("malformed trace line ({reason}): '{line}'")]
pub struct TraceParseError {
    /// The offending line.
    pub line: String,
    /// What went wrong.
    pub reason: &'static str,
}

impl TraceParseError {
    fn new(line: &str, reason: &'static str) -> Self {
        Self { line: line.to_string(), reason }
    }
}

/// An instruction execution event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionEvent {
    /// Execution time.
    pub time: u64,
    /// Instruction address.
    pub pc: u64,
    /// Instruction set.
    pub iset: InstructionSet,
    /// Encoding width in bits.
    pub width: u32,
    /// Raw encoding.
    pub instruction: u32,
    /// Executed or predicated out.
    pub effect: InstructionEffect,
    /// Raw disassembly text.
    pub disassembly: String,
}

/// A memory access event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryEvent {
    /// Execution time.
    pub time: u64,
    /// Accessed address.
    pub addr: u64,
    /// Access size in bytes.
    pub size: usize,
    /// Transferred value.
    pub value: u64,
    /// `true` for a read, `false` for a write.
    pub read: bool,
}

/// A register write event. The simulators only log writes; the register
/// alias `cpsr` is canonicalised to `psr`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterEvent {
    /// Execution time.
    pub time: u64,
    /// Canonical register name.
    pub name: String,
    /// Written value.
    pub value: u64,
}

/// A line carrying no event the builders care about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextOnlyEvent {
    /// Execution time, when the line carried one.
    pub time: u64,
    /// The raw line.
    pub text: String,
}

/// One parsed trace line.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// An instruction execution.
    Instruction(InstructionEvent),
    /// A memory access.
    Memory(MemoryEvent),
    /// A register write.
    Register(RegisterEvent),
    /// Anything else.
    TextOnly(TextOnlyEvent),
}

fn parse_hex(line: &str, tok: &str, what: &'static str) -> Result<u64, TraceParseError> {
    u64::from_str_radix(tok, 16).map_err(|_| TraceParseError::new(line, what))
}

/// Parse one trace line into an event.
pub fn parse_trace_line(line: &str) -> Result<TraceEvent, TraceParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(TraceParseError::new(line, "too few fields"));
    }

    let time: u64 = tokens[0]
        .parse()
        .map_err(|_| TraceParseError::new(line, "unparseable time stamp"))?;

    let tag = tokens[2];
    if tag == "R" {
        if tokens.len() < 5 {
            return Err(TraceParseError::new(line, "truncated register event"));
        }
        let name = if tokens[3] == "cpsr" { "psr" } else { tokens[3] };
        let value = parse_hex(line, tokens[4], "unparseable register value")?;
        return Ok(TraceEvent::Register(RegisterEvent { time, name: name.to_string(), value }));
    }

    if let Some(size) = tag.strip_prefix("MR").or_else(|| tag.strip_prefix("MW")) {
        if tokens.len() < 5 {
            return Err(TraceParseError::new(line, "truncated memory event"));
        }
        let size: usize =
            size.parse().map_err(|_| TraceParseError::new(line, "unparseable access size"))?;
        let addr = parse_hex(line, tokens[3], "unparseable access address")?;
        let value = parse_hex(line, tokens[4], "unparseable access value")?;
        return Ok(TraceEvent::Memory(MemoryEvent {
            time,
            addr,
            size,
            value,
            read: tag.starts_with("MR"),
        }));
    }

    if tag.starts_with("IT") || tag.starts_with("IS") {
        let effect = if tag.starts_with("IT") {
            InstructionEffect::Executed
        } else {
            InstructionEffect::CcFail
        };

        // The instruction id may be glued to the tag, "IT(27)", or stand on
        // its own, "IT (58)".
        let mut idx = 3;
        if tokens.get(idx).is_some_and(|t| t.starts_with('(')) {
            idx += 1;
        }

        let pc = parse_hex(line, tokens.get(idx).copied().unwrap_or(""), "unparseable pc")?;
        let opcode_tok = tokens
            .get(idx + 1)
            .ok_or_else(|| TraceParseError::new(line, "missing instruction encoding"))?;
        let instruction =
            parse_hex(line, opcode_tok, "unparseable instruction encoding")? as u32;
        let width = if opcode_tok.len() <= 4 { 16 } else { 32 };
        let iset = match tokens.get(idx + 2).copied() {
            Some("T") => InstructionSet::Thumb,
            Some("A") => InstructionSet::Arm,
            Some("O") => InstructionSet::A64,
            _ => return Err(TraceParseError::new(line, "unknown instruction set tag")),
        };

        let disassembly = match line.find(" : ") {
            Some(pos) => line[pos + 3..].to_string(),
            None => return Err(TraceParseError::new(line, "missing disassembly")),
        };

        return Ok(TraceEvent::Instruction(InstructionEvent {
            time,
            pc,
            iset,
            width,
            instruction,
            effect,
            disassembly,
        }));
    }

    Ok(TraceEvent::TextOnly(TextOnlyEvent { time, text: line.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_events_are_writes_with_canonical_names() {
        let ev = parse_trace_line("669 clk R r1 0000ba95").unwrap();
        match ev {
            TraceEvent::Register(r) => {
                assert_eq!(r.name, "r1");
                assert_eq!(r.value, 0x0ba95);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let ev = parse_trace_line("661 clk R cpsr 21000000").unwrap();
        match ev {
            TraceEvent::Register(r) => {
                assert_eq!(r.name, "psr");
                assert_eq!(r.value, 0x21000000);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn memory_events() {
        let cases = [
            ("597 clk MW1 00021034 00", 1, false, 0x021034, 0),
            ("493 clk MR1 00021024 76", 1, true, 0x021024, 0x76),
            ("1081 clk MW2 00021498 2009", 2, false, 0x021498, 0x2009),
            ("1081 clk MR2 00021498 9902", 2, true, 0x021498, 0x9902),
            ("4210 clk MW4 106fffc4 00000001", 4, false, 0x106fffc4, 1),
            ("4211 clk MR4 0001071c 00021ae4", 4, true, 0x01071c, 0x021ae4),
        ];
        for (line, size, read, addr, value) in cases {
            match parse_trace_line(line).unwrap() {
                TraceEvent::Memory(m) => {
                    assert_eq!(m.size, size, "{line}");
                    assert_eq!(m.read, read, "{line}");
                    assert_eq!(m.addr, addr, "{line}");
                    assert_eq!(m.value, value, "{line}");
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn instruction_events() {
        let ev =
            parse_trace_line("27 clk IT(27) 0000818a 2100 T thread : MOVS    r1, #0").unwrap();
        match ev {
            TraceEvent::Instruction(i) => {
                assert_eq!(i.time, 27);
                assert_eq!(i.pc, 0x0818a);
                assert_eq!(i.iset, InstructionSet::Thumb);
                assert_eq!(i.width, 16);
                assert_eq!(i.instruction, 0x2100);
                assert_eq!(i.effect, InstructionEffect::Executed);
                assert_eq!(i.disassembly, "MOVS    r1, #0");
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Detached instruction id, 32-bit encoding.
        let ev = parse_trace_line(
            "58 clk IT (58) 00008326 e9425504 T thread : STRD  r5,r5,[r2,#-0x10]",
        )
        .unwrap();
        match ev {
            TraceEvent::Instruction(i) => {
                assert_eq!(i.time, 58);
                assert_eq!(i.pc, 0x08326);
                assert_eq!(i.width, 32);
                assert_eq!(i.instruction, 0xe9425504);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn junk_is_reported() {
        assert!(parse_trace_line("one two IT zz yy").is_err());
        assert!(parse_trace_line("27 clk IT 0000818a").is_err());
    }

    #[test]
    fn unknown_tags_are_text_only() {
        match parse_trace_line("27 clk E excevent stuff").unwrap() {
            TraceEvent::TextOnly(t) => assert_eq!(t.time, 27),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
