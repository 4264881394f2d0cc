//! Append-only sinks for the power engine: power samples, register-bank
//! snapshots, memory accesses and annotated instructions, in CSV, YAML or
//! `.npy` form.
//!
//! Disabled sinks are cheap no-ops; the engine checks [`Dumper::enabled`]
//! before paying for the data a sink would consume.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use glimmer_np::{NpAdapter, NpyError};
use glimmer_trace::{AccessKind, MemoryAccess, ReferenceInstruction};

/// Common life cycle of every sink: `pre_dump`, any number of `dump` calls,
/// `post_dump`, then `next_trace` between traces.
pub trait Dumper {
    /// Is this sink live? The engine skips disabled sinks entirely.
    fn enabled(&self) -> bool {
        true
    }

    /// Called once before the first sample of a trace.
    fn pre_dump(&mut self) {}

    /// Called once after the last sample of a trace.
    fn post_dump(&mut self) {}

    /// Called when moving on to the next trace.
    fn next_trace(&mut self) {}
}

/// One emitted power sample: the per-channel figures and their weighted sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PowerSample {
    /// The weighted sum of all channels.
    pub total: f64,
    /// PC channel.
    pub pc: f64,
    /// Instruction-encoding channel.
    pub opcode: f64,
    /// Output registers channel (status register included).
    pub oreg: f64,
    /// Input registers channel.
    pub ireg: f64,
    /// Memory address channel.
    pub addr: f64,
    /// Memory data channel.
    pub data: f64,
}

/// A sink for per-cycle power samples.
pub trait PowerDumper: Dumper {
    /// Record one cycle. `instr` is the instruction the cycle belongs to on
    /// its first cycle only, and `None` on the extra cycles of multi-cycle
    /// instructions and on branch padding cycles.
    fn dump(&mut self, sample: &PowerSample, instr: Option<&ReferenceInstruction>);
}

/// A sink for register-bank snapshots, one per instruction.
pub trait RegBankDumper: Dumper {
    /// Record one snapshot of the full register bank.
    fn dump(&mut self, regs: &[u64]);
}

/// A sink for the memory accesses an instruction performed.
pub trait MemoryAccessesDumper: Dumper {
    /// Record the accesses of the instruction at `pc`.
    fn dump(&mut self, pc: u64, accesses: &[MemoryAccess]);
}

/// A sink for decoded instructions and the register bank they ran on.
pub trait InstrDumper: Dumper {
    /// Record one executed instruction.
    fn dump(&mut self, instr: &ReferenceInstruction, regs: &[u64]);
}

macro_rules! null_dumper {
    ($(#[$doc:meta])* $name:ident, $trait:ident, $($dump:tt)*) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl Dumper for $name {
            fn enabled(&self) -> bool {
                false
            }
        }

        impl $trait for $name {
            $($dump)*
        }
    };
}

null_dumper!(
    /// A disabled power sink.
    NullPowerDumper,
    PowerDumper,
    fn dump(&mut self, _sample: &PowerSample, _instr: Option<&ReferenceInstruction>) {}
);
null_dumper!(
    /// A disabled register-bank sink.
    NullRegBankDumper,
    RegBankDumper,
    fn dump(&mut self, _regs: &[u64]) {}
);
null_dumper!(
    /// A disabled memory-access sink.
    NullMemoryAccessesDumper,
    MemoryAccessesDumper,
    fn dump(&mut self, _pc: u64, _accesses: &[MemoryAccess]) {}
);
null_dumper!(
    /// A disabled instruction sink.
    NullInstrDumper,
    InstrDumper,
    fn dump(&mut self, _instr: &ReferenceInstruction, _regs: &[u64]) {}
);

/// Writes the power trace in CSV form: a header row, then one line per
/// cycle. In detailed mode each line also carries the time, pc, encoding,
/// executed flag, disassembly and access lists of the instruction the cycle
/// belongs to. A blank line separates traces.
pub struct CsvPowerDumper<W: Write> {
    out: W,
    sep: &'static str,
    detailed: bool,
}

impl CsvPowerDumper<BufWriter<File>> {
    /// Dump in CSV form to the file at `path`.
    pub fn to_file<P: AsRef<Path>>(path: P, detailed: bool) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?), detailed))
    }
}

impl<W: Write> CsvPowerDumper<W> {
    /// Dump in CSV form to `out`.
    pub fn new(out: W, detailed: bool) -> Self {
        Self { out, sep: ",", detailed }
    }
}

impl<W: Write> Dumper for CsvPowerDumper<W> {
    fn pre_dump(&mut self) {
        let fields = ["Total", "PC", "Instr", "ORegs", "IRegs", "Addr", "Data"]
            .iter()
            .map(|f| format!("\"{f}\""))
            .join(self.sep);
        let _ = write!(self.out, "{fields}");

        if self.detailed {
            let fields =
                ["Time", "PC", "Instr", "Exe", "Asm", "Memory accesses", "Register accesses"]
                    .iter()
                    .map(|f| format!("\"{f}\""))
                    .join(self.sep);
            let _ = write!(self.out, "{}{fields}", self.sep);
        }

        let _ = writeln!(self.out);
    }

    // Insert an empty line when changing to a new trace.
    fn next_trace(&mut self) {
        let _ = writeln!(self.out);
    }

    fn post_dump(&mut self) {
        let _ = self.out.flush();
    }
}

impl<W: Write> PowerDumper for CsvPowerDumper<W> {
    fn dump(&mut self, s: &PowerSample, instr: Option<&ReferenceInstruction>) {
        let sep = self.sep;
        let _ = write!(
            self.out,
            "{:.2}{sep}{:.2}{sep}{:.2}{sep}{:.2}{sep}{:.2}{sep}{:.2}{sep}{:.2}",
            s.total, s.pc, s.opcode, s.oreg, s.ireg, s.addr, s.data
        );

        if let (Some(i), true) = (instr, self.detailed) {
            let _ = write!(
                self.out,
                "{sep}{}{sep}0x{:x}{sep}0x{:x}{sep}\"{}\"{sep}\"{}\"",
                i.time,
                i.pc,
                i.instruction,
                if i.executed() { 'X' } else { '-' },
                i.disassembly
            );
            let _ = write!(self.out, "{sep}\"{}\"", i.mem_accesses.iter().join(" "));
            let _ = write!(self.out, "{sep}\"{}\"", i.reg_accesses.iter().join(" "));
        }

        let _ = writeln!(self.out);
    }
}

/// Accumulates the total channel per cycle and writes the whole run as a
/// rectangular `.npy` matrix (rows = traces, zero-padded to the longest
/// trace) when saved or dropped.
pub struct NpyPowerDumper {
    path: PathBuf,
    adapter: NpAdapter<f64>,
    saved: bool,
}

impl NpyPowerDumper {
    /// Accumulate a power trace to be written to `path`, expecting
    /// `num_traces` traces.
    pub fn new<P: AsRef<Path>>(path: P, num_traces: usize) -> Self {
        Self { path: path.as_ref().to_path_buf(), adapter: NpAdapter::new(num_traces), saved: false }
    }

    /// Write the accumulated matrix now.
    pub fn save(&mut self) -> Result<(), NpyError> {
        self.saved = true;
        self.adapter.save(&self.path)
    }
}

impl Dumper for NpyPowerDumper {
    fn next_trace(&mut self) {
        self.adapter.next_row();
        self.saved = false;
    }
}

impl PowerDumper for NpyPowerDumper {
    fn dump(&mut self, sample: &PowerSample, _instr: Option<&ReferenceInstruction>) {
        self.adapter.append(sample.total);
    }
}

impl Drop for NpyPowerDumper {
    fn drop(&mut self) {
        if !self.saved {
            if let Err(e) = self.save() {
                tracing::error!("could not save power trace to '{}': {e}", self.path.display());
            }
        }
    }
}

/// Records register-bank snapshots as a `.npy` matrix with one row per trace
/// (columns = instructions × registers), written when saved or dropped.
pub struct NpyRegBankDumper {
    path: PathBuf,
    adapter: NpAdapter<u64>,
    enabled: bool,
    saved: bool,
}

impl NpyRegBankDumper {
    /// Accumulate register banks to be written to `path`. An empty path
    /// disables the dumper.
    pub fn new<P: AsRef<Path>>(path: P, num_traces: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let enabled = !path.as_os_str().is_empty();
        Self { path, adapter: NpAdapter::new(num_traces), enabled, saved: false }
    }

    /// Write the accumulated matrix now.
    pub fn save(&mut self) -> Result<(), NpyError> {
        self.saved = true;
        self.adapter.save(&self.path)
    }
}

impl Dumper for NpyRegBankDumper {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn next_trace(&mut self) {
        if self.enabled {
            self.adapter.next_row();
            self.saved = false;
        }
    }
}

impl RegBankDumper for NpyRegBankDumper {
    fn dump(&mut self, regs: &[u64]) {
        self.adapter.append_slice(regs);
    }
}

impl Drop for NpyRegBankDumper {
    fn drop(&mut self) {
        if self.enabled && !self.saved {
            if let Err(e) = self.save() {
                tracing::error!(
                    "could not save register bank trace to '{}': {e}",
                    self.path.display()
                );
            }
        }
    }
}

fn yaml_accesses(accesses: &[MemoryAccess], kind: AccessKind) -> String {
    accesses
        .iter()
        .filter(|a| a.kind == kind)
        .map(|a| format!("[0x{:x}, {}, 0x{:x}]", a.addr, a.size, a.value))
        .join(", ")
}

/// Streams the memory accesses of each instruction as a YAML document, one
/// sequence item per trace. Trace items are emitted lazily so a trailing
/// empty trace does not produce an empty item.
pub struct YamlMemoryAccessesDumper<W: Write> {
    out: W,
    sep: Option<&'static str>,
}

impl YamlMemoryAccessesDumper<BufWriter<File>> {
    /// Stream to the file at `path`.
    pub fn to_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> YamlMemoryAccessesDumper<W> {
    /// Stream to `out`. The document header is written immediately.
    pub fn new(mut out: W) -> Self {
        let _ = writeln!(out, "memaccess:");
        Self { out, sep: Some("  - ") }
    }
}

impl<W: Write> Dumper for YamlMemoryAccessesDumper<W> {
    fn next_trace(&mut self) {
        self.sep = Some("  - ");
    }

    fn post_dump(&mut self) {
        let _ = self.out.flush();
    }
}

impl<W: Write> MemoryAccessesDumper for YamlMemoryAccessesDumper<W> {
    fn dump(&mut self, pc: u64, accesses: &[MemoryAccess]) {
        if let Some(sep) = self.sep.take() {
            let _ = writeln!(self.out, "{sep}");
        }

        if accesses.is_empty() {
            return;
        }

        let has_loads = accesses.iter().any(|a| a.kind == AccessKind::Read);
        let has_stores = accesses.iter().any(|a| a.kind == AccessKind::Write);
        if !has_loads && !has_stores {
            return;
        }

        let _ = write!(self.out, "    - {{ pc: 0x{pc:x}");
        if has_loads {
            let _ = write!(self.out, ", loads: [{}]", yaml_accesses(accesses, AccessKind::Read));
        }
        if has_stores {
            let _ =
                write!(self.out, ", stores: [{}]", yaml_accesses(accesses, AccessKind::Write));
        }
        let _ = writeln!(self.out, "}}");
    }
}

/// Streams one YAML record per executed instruction, optionally with its
/// memory accesses and the register bank it ran on.
pub struct YamlInstrDumper<W: Write> {
    out: W,
    sep: Option<&'static str>,
    dump_mem_access: bool,
    dump_reg_bank: bool,
}

impl YamlInstrDumper<BufWriter<File>> {
    /// Stream to the file at `path`.
    pub fn to_file<P: AsRef<Path>>(
        path: P,
        dump_mem_access: bool,
        dump_reg_bank: bool,
    ) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?), dump_mem_access, dump_reg_bank))
    }
}

impl<W: Write> YamlInstrDumper<W> {
    /// Stream to `out`. The document header is written immediately.
    pub fn new(mut out: W, dump_mem_access: bool, dump_reg_bank: bool) -> Self {
        let _ = writeln!(out, "instr:");
        Self { out, sep: Some("  - "), dump_mem_access, dump_reg_bank }
    }
}

impl<W: Write> Dumper for YamlInstrDumper<W> {
    fn next_trace(&mut self) {
        self.sep = Some("  - ");
    }

    fn post_dump(&mut self) {
        let _ = self.out.flush();
    }
}

impl<W: Write> InstrDumper for YamlInstrDumper<W> {
    fn dump(&mut self, instr: &ReferenceInstruction, regs: &[u64]) {
        if let Some(sep) = self.sep.take() {
            let _ = writeln!(self.out, "{sep}");
        }

        let _ = write!(
            self.out,
            "    - {{ pc: 0x{:x}, opcode: 0x{:x}, size: {}, executed: {}, disassembly: \"{}\"",
            instr.pc,
            instr.instruction,
            instr.width,
            if instr.executed() { "True" } else { "False" },
            instr.disassembly
        );
        if self.dump_mem_access {
            let _ = write!(
                self.out,
                ", loads: [{}], stores: [{}]",
                yaml_accesses(&instr.mem_accesses, AccessKind::Read),
                yaml_accesses(&instr.mem_accesses, AccessKind::Write)
            );
        }
        if self.dump_reg_bank && !regs.is_empty() {
            let _ = write!(
                self.out,
                ", regbank: [ {}]",
                regs.iter().map(|r| format!("0x{r:x}")).join(", ")
            );
        }
        let _ = writeln!(self.out, "}}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimmer_trace::{InstructionEffect, InstructionSet, RegisterAccess};

    fn movs() -> ReferenceInstruction {
        ReferenceInstruction::new(
            27,
            InstructionEffect::Executed,
            0x089bc,
            InstructionSet::Thumb,
            16,
            0x02105,
            "MOVS r1,#5",
            vec![],
            vec![
                RegisterAccess::new("r1", 5, AccessKind::Write),
                RegisterAccess::new("cpsr", 0x21000000, AccessKind::Write),
            ],
        )
    }

    fn strd() -> ReferenceInstruction {
        ReferenceInstruction::new(
            29,
            InstructionEffect::Executed,
            0x08326,
            InstructionSet::Arm,
            32,
            0xe9425504,
            "STRD r5,r1,[r2,#-0x10]",
            vec![
                MemoryAccess::new(4, 0x00021afc, 5, AccessKind::Write),
                MemoryAccess::new(4, 0x00021b00, 5, AccessKind::Write),
            ],
            vec![],
        )
    }

    fn sample(vals: [f64; 7]) -> PowerSample {
        PowerSample {
            total: vals[0],
            pc: vals[1],
            opcode: vals[2],
            oreg: vals[3],
            ireg: vals[4],
            addr: vals[5],
            data: vals[6],
        }
    }

    #[test]
    fn csv_plain() {
        let mut out = Vec::new();
        {
            let mut csv = CsvPowerDumper::new(&mut out, false);
            csv.pre_dump();
            csv.dump(&sample([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]), Some(&movs()));
            csv.dump(&sample([2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0]), Some(&strd()));
            csv.post_dump();
            csv.next_trace();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\"Total\",\"PC\",\"Instr\",\"ORegs\",\"IRegs\",\"Addr\",\"Data\"\n\
             1.00,2.00,3.00,4.00,5.00,6.00,7.00\n\
             2.00,4.00,6.00,8.00,10.00,12.00,14.00\n\
             \n"
        );
    }

    #[test]
    fn csv_detailed() {
        let mut out = Vec::new();
        {
            let mut csv = CsvPowerDumper::new(&mut out, true);
            csv.pre_dump();
            csv.dump(&sample([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]), Some(&movs()));
            csv.dump(&sample([2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0]), Some(&strd()));
            csv.post_dump();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\"Total\",\"PC\",\"Instr\",\"ORegs\",\"IRegs\",\"Addr\",\"Data\",\
             \"Time\",\"PC\",\"Instr\",\"Exe\",\"Asm\",\"Memory accesses\",\"Register accesses\"\n\
             1.00,2.00,3.00,4.00,5.00,6.00,7.00,27,0x89bc,0x2105,\"X\",\"MOVS r1,#5\",\"\",\
             \"W(0x5)@r1 W(0x21000000)@cpsr\"\n\
             2.00,4.00,6.00,8.00,10.00,12.00,14.00,29,0x8326,0xe9425504,\"X\",\
             \"STRD r5,r1,[r2,#-0x10]\",\"W4(0x5)@0x21afc W4(0x5)@0x21b00\",\"\"\n"
        );
    }

    #[test]
    fn npy_power_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.npy");
        {
            let mut npy = NpyPowerDumper::new(&path, 2);
            npy.pre_dump();
            npy.dump(&sample([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]), Some(&movs()));
            npy.post_dump();
            npy.next_trace();

            npy.pre_dump();
            npy.dump(&sample([2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]), Some(&movs()));
            npy.post_dump();
            npy.next_trace();
        }

        let m = glimmer_np::NpArray::<f64>::read(&path);
        assert!(m.good(), "{:?}", m.error());
        assert_eq!((m.rows(), m.cols()), (2, 1));
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(1, 0), 2.0);
    }

    #[test]
    fn npy_regbank_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regbank.npy");
        {
            let mut npy = NpyRegBankDumper::new(&path, 2);
            assert!(npy.enabled());
            npy.dump(&[0, 1, 2, 3, 4]);
            npy.dump(&[5, 6, 7, 8, 9]);
            npy.next_trace();
            npy.dump(&[10, 11, 12, 13, 14]);
            npy.dump(&[15, 16, 17, 18, 19]);
            npy.next_trace();
        }

        let m = glimmer_np::NpArray::<u64>::read(&path);
        assert!(m.good(), "{:?}", m.error());
        assert_eq!((m.rows(), m.cols()), (2, 10));
        for r in 0..2 {
            for c in 0..10 {
                assert_eq!(m.get(r, c), (r * 10 + c) as u64);
            }
        }
    }

    #[test]
    fn disabled_regbank_dumper() {
        let npy = NpyRegBankDumper::new("", 2);
        assert!(!npy.enabled());
    }

    #[test]
    fn yaml_memory_accesses() {
        let mut out = Vec::new();
        {
            let mut yaml = YamlMemoryAccessesDumper::new(&mut out);
            yaml.pre_dump();
            yaml.dump(movs().pc, &movs().mem_accesses);
            yaml.dump(strd().pc, &strd().mem_accesses);
            yaml.post_dump();
            yaml.next_trace();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "memaccess:\n  - \n    - { pc: 0x8326, \
             stores: [[0x21afc, 4, 0x5], [0x21b00, 4, 0x5]]}\n"
        );
    }

    #[test]
    fn yaml_instructions() {
        let mut out = Vec::new();
        {
            let mut yaml = YamlInstrDumper::new(&mut out, true, true);
            yaml.pre_dump();
            yaml.dump(&strd(), &[5, 0x21000000]);
            yaml.post_dump();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "instr:\n  - \n    - { pc: 0x8326, opcode: 0xe9425504, size: 32, executed: True, \
             disassembly: \"STRD r5,r1,[r2,#-0x10]\", loads: [], \
             stores: [[0x21afc, 4, 0x5], [0x21b00, 4, 0x5]], \
             regbank: [ 0x5, 0x21000000]}\n"
        );
    }
}
