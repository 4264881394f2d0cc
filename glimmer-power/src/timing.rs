//! Timing information: correlates trace samples with executed instructions.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Accumulates the per-instruction cycle counts of an analysis.
///
/// The `(pc, cycle)` sequence of the first trace is the one kept for
/// reporting; the other traces only contribute to the min / max statistics.
#[derive(Debug)]
pub struct TimingInfo {
    pc_cycle: Vec<(u64, usize)>,
    cmin: usize,
    cmax: usize,
    current_cycle: usize,
    first: bool,
}

impl Default for TimingInfo {
    fn default() -> Self {
        Self { pc_cycle: Vec::new(), cmin: usize::MAX, cmax: 0, current_cycle: 0, first: true }
    }
}

impl TimingInfo {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `c` instruction-less cycles.
    pub fn incr(&mut self, c: usize) {
        self.current_cycle += c;
    }

    /// Move to the next instruction, which starts at the current cycle and
    /// lasts `c` cycles.
    pub fn add(&mut self, pc: u64, c: usize) {
        if self.first {
            self.pc_cycle.push((pc, self.current_cycle));
        }
        self.current_cycle += c;
    }

    /// Close the current trace: fold its length into the statistics and
    /// rewind the cycle counter.
    pub fn next_trace(&mut self) {
        self.cmin = self.cmin.min(self.current_cycle);
        self.cmax = self.cmax.max(self.current_cycle);
        self.first = false;
        self.current_cycle = 0;
    }

    /// Write the accumulated timing information as a YAML document.
    pub fn save_yaml<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "timing:")?;
        writeln!(w, "  min: {}", self.cmin)?;
        // Not a true average, but it gives the field a sensible value.
        writeln!(w, "  ave: {}", (self.cmin + self.cmax) / 2)?;
        writeln!(w, "  max: {}", self.cmax)?;
        write!(w, "  cycles: [")?;
        let mut sep = " ";
        for (pc, cycle) in &self.pc_cycle {
            write!(w, "{sep}[ 0x{pc:x}, {cycle} ]")?;
            sep = ", ";
        }
        writeln!(w, " ]")?;
        Ok(())
    }

    /// Save the YAML document to `filename`. Nothing is written when there
    /// is nothing to report.
    pub fn save_to_file<P: AsRef<Path>>(&self, filename: P) -> io::Result<()> {
        if self.pc_cycle.is_empty() {
            return Ok(());
        }
        let mut w = BufWriter::new(File::create(filename)?);
        self.save_yaml(&mut w)
    }
}
