//! Event-folding builders: turn a stream of trace events into
//! [`ReferenceInstruction`]s.
//!
//! Two flavours exist, mirroring the two ways traces reach the toolkit: an
//! in-memory text stream (mostly used by tests and small utilities), and a
//! seekable on-disk index abstracted behind the [`IndexedTrace`] trait. Both
//! deliver completed instructions to a caller-supplied continuation, one at a
//! time, in trace order.

use std::io::BufRead;

use thiserror::Error;

use crate::parser::{
    parse_trace_line, InstructionEvent, MemoryEvent, RegisterEvent, TraceEvent, TraceParseError,
};
use crate::{
    AccessKind, ExecutionRange, MemoryAccess, ReferenceInstruction,
    RegisterAccess,
};

/// Errors raised while folding a trace into instructions.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A line of the trace could not be parsed.
    #[error(transparent)]
    Parse(#[from] TraceParseError),
    /// Reading the input stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The range's end point is not in the trace.
    #[error("can not find the end point")]
    NoEndPoint,
    /// The range's start point is not in the trace.
    #[error("can not find the start point")]
    NoStartPoint,
    /// An offset walked past the ends of the trace.
    #[error("can not move the {0} point by the requested offset")]
    OffsetOutOfTrace(&'static str),
}

impl From<InstructionEvent> for ReferenceInstruction {
    fn from(ev: InstructionEvent) -> Self {
        ReferenceInstruction::new(
            ev.time,
            ev.effect,
            ev.pc,
            ev.iset,
            ev.width,
            ev.instruction,
            &ev.disassembly,
            Vec::new(),
            Vec::new(),
        )
    }
}

impl From<MemoryEvent> for MemoryAccess {
    fn from(ev: MemoryEvent) -> Self {
        MemoryAccess::new(
            ev.size,
            ev.addr,
            ev.value,
            if ev.read { AccessKind::Read } else { AccessKind::Write },
        )
    }
}

impl From<RegisterEvent> for RegisterAccess {
    fn from(ev: RegisterEvent) -> Self {
        // The trace only ever records register writes.
        RegisterAccess::new(ev.name, ev.value, AccessKind::Write)
    }
}

/// Folds successive trace events into [`ReferenceInstruction`]s.
///
/// An instruction event finalises the in-progress instruction and starts a
/// fresh one; memory and register events are attached to the in-progress
/// instruction; text-only events are ignored.
#[derive(Debug, Default)]
pub struct InstructionBuilder {
    current: Option<ReferenceInstruction>,
}

impl InstructionBuilder {
    /// A builder with no instruction in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one event, handing any completed instruction to `emit`.
    pub fn handle(&mut self, ev: TraceEvent, emit: &mut dyn FnMut(ReferenceInstruction)) {
        match ev {
            TraceEvent::Instruction(ie) => {
                if let Some(done) = self.current.take() {
                    emit(done);
                }
                self.current = Some(ReferenceInstruction::from(ie));
            }
            TraceEvent::Memory(me) => {
                if let Some(instr) = &mut self.current {
                    instr.add_memory_access(MemoryAccess::from(me));
                }
            }
            TraceEvent::Register(re) => {
                if let Some(instr) = &mut self.current {
                    instr.add_register_access(RegisterAccess::from(re));
                }
            }
            TraceEvent::TextOnly(_) => (),
        }
    }

    /// Hand the in-progress instruction, if any, to `emit`.
    pub fn finish(&mut self, emit: &mut dyn FnMut(ReferenceInstruction)) {
        if let Some(done) = self.current.take() {
            emit(done);
        }
    }
}

/// Build instructions from an in-memory stream of trace lines.
///
/// Blank lines and `#` comments are allowed and skipped; every other line
/// must parse. Completed instructions are handed to `cont` in order.
pub fn build_from_stream<R: BufRead>(
    input: R,
    mut cont: impl FnMut(ReferenceInstruction),
) -> Result<(), BuildError> {
    let mut builder = InstructionBuilder::new();
    for line in input.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        builder.handle(parse_trace_line(&line)?, &mut cont);
    }
    builder.finish(&mut cont);
    Ok(())
}

/// A seekable, indexed trace: the opaque event source the production index
/// implements outside this crate.
///
/// Nodes are opaque handles, one per executed instruction, ordered by time.
pub trait IndexedTrace {
    /// The node executed at time `t`.
    fn node_at_time(&self, t: u64) -> Option<usize>;

    /// The node following `node`, if any.
    fn next_node(&self, node: usize) -> Option<usize>;

    /// The node preceding `node`, if any.
    fn previous_node(&self, node: usize) -> Option<usize>;

    /// The execution time of `node`.
    fn node_time(&self, node: usize) -> u64;

    /// The raw trace lines recorded for `node`.
    fn node_lines(&self, node: usize) -> Vec<String>;

    /// The value of register `reg` at time `t`.
    fn register_value_at(&self, reg: &str, t: u64) -> Option<u64>;

    /// `size` bytes of memory at `addr`, as they were at time `t`.
    fn memory_value_at(&self, addr: u64, size: usize, t: u64) -> Option<Vec<u8>>;
}

fn offset_node<T: IndexedTrace>(
    trace: &T,
    mut node: usize,
    offset: i64,
    which: &'static str,
) -> Result<usize, BuildError> {
    let step: fn(&T, usize) -> Option<usize> =
        if offset > 0 { T::next_node } else { T::previous_node };
    for _ in 0..offset.unsigned_abs() {
        node = step(trace, node).ok_or(BuildError::OffsetOutOfTrace(which))?;
    }
    Ok(node)
}

/// Build instructions from an [`IndexedTrace`] over the execution range
/// `er`, with the start and end points optionally shifted by a number of
/// instructions. Completed instructions are handed to `cont` in order.
pub fn build_from_trace<T: IndexedTrace>(
    trace: &T,
    er: &ExecutionRange,
    start_offset: i64,
    end_offset: i64,
    mut cont: impl FnMut(ReferenceInstruction),
) -> Result<(), BuildError> {
    let end = trace.node_at_time(er.end.time).ok_or(BuildError::NoEndPoint)?;
    let end_time = trace.node_time(offset_node(trace, end, end_offset, "end")?);

    let start = trace.node_at_time(er.begin.time).ok_or(BuildError::NoStartPoint)?;
    let mut node = offset_node(trace, start, start_offset, "start")?;

    tracing::debug!(start = trace.node_time(node), end = end_time, "walking trace range");

    while trace.node_time(node) <= end_time {
        let mut builder = InstructionBuilder::new();
        for line in trace.node_lines(node) {
            builder.handle(parse_trace_line(&line)?, &mut |_| ());
        }
        let mut emitted = None;
        builder.finish(&mut |i| emitted = Some(i));
        cont(emitted.unwrap_or_default());

        match trace.next_node(node) {
            Some(next) => node = next,
            None => break,
        }
    }
    Ok(())
}

/// Canonical event folding for one instruction: the first instruction event
/// seeds the instruction, memory and register events attach to it. Kept for
/// callers that drive the folding themselves.
pub fn fold_events(
    events: impl IntoIterator<Item = TraceEvent>,
) -> Option<ReferenceInstruction> {
    let mut builder = InstructionBuilder::new();
    let mut out = None;
    for ev in events {
        builder.handle(ev, &mut |i| {
            out.get_or_insert(i);
        });
    }
    builder.finish(&mut |i| {
        out.get_or_insert(i);
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceSite;
    use std::io::Cursor;

    const STREAM: &str = "\
# A comment, followed by a blank line.

27 clk IT(27) 0000818a 2100 T thread : MOVS    r1, #0
27 clk R r1 00000000
27 clk R cpsr 61000000
58 clk IT (58) 00008326 e9425504 T thread : STRD  r5,r5,[r2,#-0x10]
58 clk MW4 00021b00 00000000
58 clk MW4 00021afc 00000000
";

    #[test]
    fn stream_builder_folds_events() {
        let mut instrs = Vec::new();
        build_from_stream(Cursor::new(STREAM), |i| instrs.push(i)).unwrap();

        assert_eq!(instrs.len(), 2);

        let i1 = &instrs[0];
        assert_eq!(i1.time, 27);
        assert_eq!(i1.pc, 0x0818a);
        assert_eq!(i1.width, 16);
        assert_eq!(i1.instruction, 0x2100);
        assert_eq!(i1.disassembly, "MOVS r1, #0");
        assert_eq!(i1.reg_accesses.len(), 2);
        // Sorted by name: psr (canonicalised from cpsr) before r1.
        assert_eq!(i1.reg_accesses[0].name, "psr");
        assert_eq!(i1.reg_accesses[0].value, 0x61000000);
        assert_eq!(i1.reg_accesses[1].name, "r1");

        let i2 = &instrs[1];
        assert_eq!(i2.time, 58);
        assert_eq!(i2.width, 32);
        assert_eq!(i2.instruction, 0xe9425504);
        assert_eq!(i2.mem_accesses.len(), 2);
        assert_eq!(i2.mem_accesses[0].addr, 0x021afc);
        assert_eq!(i2.mem_accesses[1].addr, 0x021b00);
    }

    #[test]
    fn stream_builder_reports_parse_errors() {
        let err = build_from_stream(Cursor::new("not a trace line at all\n"), |_| ());
        assert!(matches!(err, Err(BuildError::Parse(_))));
    }

    // A small in-memory trace with one instruction per node.
    struct TestTrace {
        nodes: Vec<(u64, Vec<String>)>,
    }

    impl TestTrace {
        fn new() -> Self {
            let lines = [
                "27 clk IT(27) 0000818a 2100 T thread : MOVS r1, #0",
                "28 clk IT(28) 0000818c 2101 T thread : MOVS r1, #1",
                "29 clk IT(29) 0000818e 2102 T thread : MOVS r1, #2",
                "30 clk IT(30) 00008190 2103 T thread : MOVS r1, #3",
            ];
            let nodes = lines
                .iter()
                .map(|l| {
                    let time: u64 = l.split_whitespace().next().unwrap().parse().unwrap();
                    (time, vec![l.to_string()])
                })
                .collect();
            Self { nodes }
        }
    }

    impl IndexedTrace for TestTrace {
        fn node_at_time(&self, t: u64) -> Option<usize> {
            self.nodes.iter().position(|(time, _)| *time == t)
        }

        fn next_node(&self, node: usize) -> Option<usize> {
            (node + 1 < self.nodes.len()).then_some(node + 1)
        }

        fn previous_node(&self, node: usize) -> Option<usize> {
            node.checked_sub(1)
        }

        fn node_time(&self, node: usize) -> u64 {
            self.nodes[node].0
        }

        fn node_lines(&self, node: usize) -> Vec<String> {
            self.nodes[node].1.clone()
        }

        fn register_value_at(&self, _reg: &str, _t: u64) -> Option<u64> {
            None
        }

        fn memory_value_at(&self, _addr: u64, _size: usize, _t: u64) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn trace_builder_walks_a_range() {
        let trace = TestTrace::new();
        let er = ExecutionRange::new(TraceSite::new(27, 0x818a), TraceSite::new(30, 0x8190));

        let mut pcs = Vec::new();
        build_from_trace(&trace, &er, 0, 0, |i| pcs.push(i.pc)).unwrap();
        assert_eq!(pcs, vec![0x818a, 0x818c, 0x818e, 0x8190]);
    }

    #[test]
    fn trace_builder_applies_offsets() {
        let trace = TestTrace::new();
        let er = ExecutionRange::new(TraceSite::new(27, 0x818a), TraceSite::new(30, 0x8190));

        let mut pcs = Vec::new();
        build_from_trace(&trace, &er, 1, -1, |i| pcs.push(i.pc)).unwrap();
        assert_eq!(pcs, vec![0x818c, 0x818e]);
    }

    #[test]
    fn trace_builder_rejects_unreachable_points() {
        let trace = TestTrace::new();
        let er = ExecutionRange::new(TraceSite::new(27, 0x818a), TraceSite::new(99, 0));
        assert!(matches!(
            build_from_trace(&trace, &er, 0, 0, |_| ()),
            Err(BuildError::NoEndPoint)
        ));

        let er = ExecutionRange::new(TraceSite::new(27, 0x818a), TraceSite::new(30, 0x8190));
        assert!(matches!(
            build_from_trace(&trace, &er, -2, 0, |_| ()),
            Err(BuildError::OffsetOutOfTrace("start"))
        ));
    }

    #[test]
    fn fold_events_builds_one_instruction() {
        let events = [
            parse_trace_line("27 clk IT(27) 0000818a 2100 T thread : MOVS r1, #0").unwrap(),
            parse_trace_line("27 clk R r1 00000000").unwrap(),
        ];
        let i = fold_events(events).unwrap();
        assert_eq!(i.pc, 0x818a);
        assert_eq!(i.reg_accesses.len(), 1);
    }
}
