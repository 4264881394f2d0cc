//! The power synthesis engine: walks a sequence of reference instructions
//! and emits per-cycle power samples under a Hamming-weight or
//! Hamming-distance model.
//!
//! The cycle model is a crude estimate, as the real micro-architecture is
//! not available: the first cycle of an instruction carries the instruction
//! and its operands, memory accesses and further register writes take one
//! extra cycle each. The PC, encoding, status register and input-operand
//! channels radiate on every cycle of their instruction.

use glimmer_arch::ArchInfo;
use glimmer_trace::{
    builder::{build_from_trace, BuildError, IndexedTrace},
    AccessKind, ExecutionRange, InstructionSet, MemoryAccess, ReferenceInstruction,
    RegisterAccess,
};

use crate::config::{PowerAnalysisConfig, PowerModel as PowerModelKind};
use crate::dumper::{
    InstrDumper, MemoryAccessesDumper, PowerDumper, PowerSample, RegBankDumper,
};
use crate::hamming_distance;
use crate::timing::TimingInfo;

/// Queries over the simulated architectural state at a given time.
pub trait Oracle {
    /// A snapshot of the full register bank as it was at time `t`.
    fn reg_bank_state(&self, _t: u64) -> Vec<u64> {
        Vec::new()
    }

    /// The value of `size` bytes of memory at `addr`, as they were at time
    /// `t`.
    fn memory_state(&self, _addr: u64, _size: usize, _t: u64) -> u64 {
        0
    }
}

/// An oracle with no state, for analyses that need none.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOracle;

impl Oracle for NullOracle {}

/// An oracle backed by a seekable trace index.
pub struct TraceOracle<'a, T: IndexedTrace> {
    trace: &'a T,
    cpu: &'a dyn ArchInfo,
}

impl<'a, T: IndexedTrace> TraceOracle<'a, T> {
    /// An oracle answering from `trace`, using `cpu` for the register-bank
    /// layout.
    pub fn new(trace: &'a T, cpu: &'a dyn ArchInfo) -> Self {
        Self { trace, cpu }
    }
}

impl<T: IndexedTrace> Oracle for TraceOracle<'_, T> {
    fn reg_bank_state(&self, t: u64) -> Vec<u64> {
        (0..self.cpu.num_registers())
            .map(|r| self.trace.register_value_at(self.cpu.register_name(r), t).unwrap_or(0))
            .collect()
    }

    fn memory_state(&self, addr: u64, size: usize, t: u64) -> u64 {
        let mut v = 0;
        if let Some(bytes) = self.trace.memory_value_at(addr, size, t) {
            for (i, b) in bytes.iter().enumerate().take(8) {
                v |= (*b as u64) << (8 * i);
            }
        }
        v
    }
}

// Scaling factors, very finger in the air values.
const F_PC: f64 = 1.0;
const F_PSR: f64 = 0.5;
const F_INSTR: f64 = 1.0;
const F_OREGISTERS: f64 = 2.0;
const F_IREGISTERS: f64 = 2.0;
const F_DATA: f64 = 2.0;
const F_ADDRESS: f64 = 1.2;

#[derive(Clone, Copy, Debug, Default)]
struct MemAccessPower {
    address: f64,
    data: f64,
}

// The per-channel figures of the instruction last added to a power model.
#[derive(Debug, Default)]
struct PowerState {
    memory: Vec<MemAccessPower>,
    output_regs: Vec<f64>,
    input_regs: f64,
    pc: f64,
    psr: f64,
    opcode: f64,
    cycles: usize,
}

impl PowerState {
    // One cycle per memory access slot or output register slot, whichever
    // is larger, and at least one.
    fn set_last_instr_cycles(&mut self) {
        self.cycles = 1;
        let mcycles = self.output_regs.len().max(self.memory.len());
        if mcycles > 1 {
            self.cycles += mcycles - 1;
        }
    }

    fn dump(
        &self,
        config: &mut PowerAnalysisConfig,
        dumper: &mut dyn PowerDumper,
        instr: Option<&ReferenceInstruction>,
    ) {
        for cycle in 0..self.cycles {
            let mut oreg = self.output_regs.get(cycle).copied().unwrap_or(0.0);
            let mut ireg = self.input_regs;
            let mut addr = self.memory.get(cycle).map(|m| m.address).unwrap_or(0.0);
            let mut data = self.memory.get(cycle).map(|m| m.data).unwrap_or(0.0);
            let mut pc = self.pc;
            let mut psr = self.psr;
            let mut opcode = self.opcode;

            if config.add_noise() {
                if config.with_instructions_outputs() {
                    oreg += config.noise();
                    psr += config.noise();
                }
                if config.with_instructions_inputs() {
                    ireg += config.noise();
                }
                if config.with_mem_address() {
                    addr += config.noise();
                }
                if config.with_mem_data() {
                    data += config.noise();
                }
                if config.with_pc() {
                    pc += config.noise();
                }
                if config.with_opcode() {
                    opcode += config.noise();
                }
            }

            let total = F_PC * pc + F_INSTR * opcode + F_PSR * psr + F_OREGISTERS * oreg
                + F_IREGISTERS * ireg
                + F_ADDRESS * addr
                + F_DATA * data;

            dumper.dump(
                &PowerSample {
                    total,
                    pc: self.pc,
                    opcode: self.opcode,
                    oreg: oreg + psr,
                    ireg,
                    addr,
                    data,
                },
                if cycle == 0 { instr } else { None },
            );
        }
    }
}

trait PowerModel {
    fn add(&mut self, instr: &ReferenceInstruction, oracle: &dyn Oracle);
    fn state(&self) -> &PowerState;
}

fn hw(enable: bool, v: u64) -> f64 {
    if enable {
        v.count_ones() as f64
    } else {
        0.0
    }
}

// Hamming weight: the current values radiate.
struct HammingWeightModel<'a> {
    cpu: &'a dyn ArchInfo,
    config: ModelSelection,
    state: PowerState,
}

// The selection bits a model consults while folding an instruction, copied
// out of the configuration once per analysis.
#[derive(Clone, Copy)]
struct ModelSelection {
    pc: bool,
    opcode: bool,
    mem_address: bool,
    mem_data: bool,
    inputs: bool,
    outputs: bool,
    load_to_load: bool,
    store_to_store: bool,
    last_access: bool,
    memory_update: bool,
}

impl ModelSelection {
    fn of(config: &PowerAnalysisConfig) -> Self {
        Self {
            pc: config.with_pc(),
            opcode: config.with_opcode(),
            mem_address: config.with_mem_address(),
            mem_data: config.with_mem_data(),
            inputs: config.with_instructions_inputs(),
            outputs: config.with_instructions_outputs(),
            load_to_load: config.with_load_to_load_transitions(),
            store_to_store: config.with_store_to_store_transitions(),
            last_access: config.with_last_memory_access_transitions(),
            memory_update: config.with_memory_update_transitions(),
        }
    }

    fn any_memory_transition(&self) -> bool {
        self.load_to_load || self.store_to_store || self.last_access
    }
}

impl<'a> HammingWeightModel<'a> {
    fn new(cpu: &'a dyn ArchInfo, config: &PowerAnalysisConfig) -> Self {
        Self { cpu, config: ModelSelection::of(config), state: PowerState::default() }
    }
}

impl PowerModel for HammingWeightModel<'_> {
    fn add(&mut self, instr: &ReferenceInstruction, _oracle: &dyn Oracle) {
        let sel = self.config;
        let state = &mut self.state;

        state.pc = hw(sel.pc, instr.pc);
        state.opcode = hw(sel.opcode, instr.instruction as u64);

        // Memory access related power consumption estimation.
        state.memory.clear();
        for ma in &instr.mem_accesses {
            state.memory.push(MemAccessPower {
                address: hw(sel.mem_address, ma.addr),
                data: hw(sel.mem_data, ma.value),
            });
        }

        state.psr = 0.0;
        state.input_regs = 0.0;
        state.output_regs.clear();
        // Register accesses estimated power consumption. Register values
        // radiate over a 32-bit register file.
        if sel.inputs || sel.outputs {
            for ra in &instr.reg_accesses {
                match ra.kind {
                    AccessKind::Write => {
                        if self.cpu.is_status_register(&ra.name) {
                            state.psr = hw(sel.outputs, ra.value & 0xffff_ffff);
                        } else {
                            state.output_regs.push(hw(sel.outputs, ra.value & 0xffff_ffff));
                        }
                    }
                    AccessKind::Read => {
                        state.input_regs += hw(sel.inputs, ra.value & 0xffff_ffff);
                    }
                }
            }
        }

        state.set_last_instr_cycles();
    }

    fn state(&self) -> &PowerState {
        &self.state
    }
}

fn hd(enable: bool, v: u64, previous: u64) -> f64 {
    if enable {
        hamming_distance(v, previous, u64::MAX) as f64
    } else {
        0.0
    }
}

// Hamming distance: bit transitions radiate. The model keeps shadows of the
// PC, the encoding, the register bank and the three memory buses; the bus
// shadows own copies of the accesses.
struct HammingDistanceModel<'a> {
    cpu: &'a dyn ArchInfo,
    config: ModelSelection,
    state: PowerState,
    prev_pc: u64,
    prev_opcode: u32,
    reg_bank: Vec<u64>,
    last_load: Option<MemoryAccess>,
    last_store: Option<MemoryAccess>,
    last_access: Option<MemoryAccess>,
}

impl<'a> HammingDistanceModel<'a> {
    fn new(cpu: &'a dyn ArchInfo, config: &PowerAnalysisConfig, reg_bank: Vec<u64>) -> Self {
        Self {
            cpu,
            config: ModelSelection::of(config),
            state: PowerState::default(),
            prev_pc: 0,
            prev_opcode: 0,
            reg_bank,
            last_load: None,
            last_store: None,
            last_access: None,
        }
    }

    fn reg_bank_transition(&mut self, id: usize, v: u64) -> f64 {
        assert!(id < self.reg_bank.len(), "out of bound register bank access");
        let p = hd(self.config.outputs, v, self.reg_bank[id]);
        self.reg_bank[id] = v;
        p
    }
}

impl PowerModel for HammingDistanceModel<'_> {
    fn add(&mut self, instr: &ReferenceInstruction, oracle: &dyn Oracle) {
        let sel = self.config;

        self.state.pc = hd(sel.pc, instr.pc, self.prev_pc);
        self.prev_pc = instr.pc;
        self.state.opcode =
            hd(sel.opcode, instr.instruction as u64, self.prev_opcode as u64);
        self.prev_opcode = instr.instruction;

        // Memory access related power consumption estimation.
        self.state.memory.clear();
        for ma in &instr.mem_accesses {
            let mut addr_pwr = 0.0;
            let mut data_pwr = 0.0;
            if (sel.mem_address || sel.mem_data)
                && (sel.any_memory_transition() || sel.memory_update)
            {
                let bus_addr = |prev: Option<MemoryAccess>| {
                    hamming_distance(ma.addr, prev.map_or(0, |p| p.addr), u64::MAX) as f64
                };
                let bus_value = |prev: Option<MemoryAccess>| {
                    hamming_distance(ma.value, prev.map_or(0, |p| p.value), u64::MAX) as f64
                };
                match ma.kind {
                    AccessKind::Read => {
                        // Address bus transitions modelling.
                        if sel.mem_address {
                            if sel.load_to_load {
                                addr_pwr += bus_addr(self.last_load);
                            }
                            if sel.last_access {
                                addr_pwr += bus_addr(self.last_access);
                            }
                        }
                        // Data bus transitions modelling.
                        if sel.mem_data {
                            if sel.load_to_load {
                                data_pwr += bus_value(self.last_load);
                            }
                            if sel.last_access {
                                data_pwr += bus_value(self.last_access);
                            }
                        }
                    }
                    AccessKind::Write => {
                        // Address bus transitions modelling.
                        if sel.mem_address {
                            if sel.store_to_store {
                                addr_pwr += bus_addr(self.last_store);
                            }
                            if sel.last_access {
                                addr_pwr += bus_addr(self.last_access);
                            }
                        }
                        // Data bus transitions modelling.
                        if sel.mem_data {
                            if sel.store_to_store {
                                data_pwr += bus_value(self.last_store);
                            }
                            if sel.last_access {
                                data_pwr += bus_value(self.last_access);
                            }
                        }
                        // Memory point update.
                        if sel.memory_update {
                            data_pwr += hamming_distance(
                                ma.value,
                                oracle.memory_state(ma.addr, ma.size, instr.time.saturating_sub(1)),
                                u64::MAX,
                            ) as f64;
                        }
                    }
                }
                // Remember our last memory accesses.
                self.last_access = Some(*ma);
                match ma.kind {
                    AccessKind::Read => self.last_load = Some(*ma),
                    AccessKind::Write => self.last_store = Some(*ma),
                }
            }
            self.state.memory.push(MemAccessPower { address: addr_pwr, data: data_pwr });
        }

        self.state.psr = 0.0;
        self.state.output_regs.clear();
        // Register accesses estimated power consumption. The inputs channel
        // is not used by the Hamming distance model.
        for ra in &instr.reg_accesses {
            match ra.kind {
                AccessKind::Write => {
                    let id = self
                        .cpu
                        .register_id(&ra.name)
                        .unwrap_or_else(|| panic!("unknown register name '{}'", ra.name));
                    let p = self.reg_bank_transition(id, ra.value);
                    if self.cpu.is_status_register(&ra.name) {
                        self.state.psr = p;
                    } else {
                        self.state.output_regs.push(p);
                    }
                }
                AccessKind::Read => (),
            }
        }

        self.state.set_last_instr_cycles();
    }

    fn state(&self) -> &PowerState {
        &self.state
    }
}

/// One unit of work: a sequence of reference instructions on which a power
/// analysis can be run.
pub struct PowerTrace<'a> {
    cpu: &'a dyn ArchInfo,
    instructions: Vec<ReferenceInstruction>,
}

impl<'a> PowerTrace<'a> {
    /// An empty power trace for `cpu`.
    pub fn new(cpu: &'a dyn ArchInfo) -> Self {
        Self { cpu, instructions: Vec::new() }
    }

    /// Append an instruction to the trace.
    pub fn add(&mut self, instr: ReferenceInstruction) {
        self.instructions.push(instr);
    }

    /// Number of instructions in the trace.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Is the trace empty?
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The `i`-th instruction of the trace.
    pub fn get(&self, i: usize) -> &ReferenceInstruction {
        &self.instructions[i]
    }

    /// The architecture this trace belongs to.
    pub fn arch_info(&self) -> &dyn ArchInfo {
        self.cpu
    }

    /// Run the analysis, dispatching per-cycle power samples to `power` and
    /// the per-instruction state to the other sinks. Disabled sinks cost
    /// nothing: the oracle is only consulted for state an enabled sink (or
    /// the Hamming-distance model) consumes.
    #[allow(clippy::too_many_arguments)]
    pub fn analyze(
        &self,
        config: &mut PowerAnalysisConfig,
        oracle: &dyn Oracle,
        timing: &mut TimingInfo,
        power: &mut dyn PowerDumper,
        reg_bank: &mut dyn RegBankDumper,
        mem_accesses: &mut dyn MemoryAccessesDumper,
        instrs: &mut dyn InstrDumper,
    ) {
        if self.instructions.is_empty() {
            return;
        }

        tracing::debug!(
            instructions = self.instructions.len(),
            model = ?config.power_model(),
            "running power analysis"
        );

        if reg_bank.enabled() {
            reg_bank.pre_dump();
        }
        if mem_accesses.enabled() {
            mem_accesses.pre_dump();
        }
        if instrs.enabled() {
            instrs.pre_dump();
        }
        power.pre_dump();

        let mut model: Box<dyn PowerModel + '_> = match config.power_model() {
            PowerModelKind::HammingWeight => Box::new(HammingWeightModel::new(self.cpu, config)),
            PowerModelKind::HammingDistance => Box::new(HammingDistanceModel::new(
                self.cpu,
                config,
                oracle.reg_bank_state(self.instructions[0].time.saturating_sub(1)),
            )),
        };

        for (idx, instr) in self.instructions.iter().enumerate() {
            model.add(instr, oracle);
            model.state().dump(config, power, Some(instr));

            let cycles = model.state().cycles;
            timing.add(instr.pc, cycles);

            if reg_bank.enabled() || instrs.enabled() {
                let bank = oracle.reg_bank_state(instr.time);
                if reg_bank.enabled() {
                    reg_bank.dump(&bank);
                }
                if instrs.enabled() {
                    instrs.dump(instr, &bank);
                }
            }
            if mem_accesses.enabled() {
                mem_accesses.dump(instr.pc, &instr.mem_accesses);
            }

            // Insert dummy cycles when needed if we are not at the end of
            // the sequence.
            if idx + 1 < self.instructions.len() && self.cpu.is_branch(instr) {
                let bcycles = self.cpu.cycles(instr, Some(&self.instructions[idx + 1]));
                if bcycles > cycles {
                    timing.incr(bcycles - cycles);
                    for _ in 0..bcycles - cycles {
                        model.state().dump(config, power, None);
                    }
                }
            }
        }

        power.post_dump();
        if reg_bank.enabled() {
            reg_bank.post_dump();
        }
        if mem_accesses.enabled() {
            mem_accesses.post_dump();
        }
        if instrs.enabled() {
            instrs.post_dump();
        }
    }
}

/// Assemble a [`PowerTrace`] from an indexed trace over the execution range
/// `er`.
///
/// When the configuration includes the instructions' inputs, the unique
/// explicit input registers of each instruction (from the attribute decoder)
/// are materialised as READ register accesses with their values read from
/// the trace at the preceding time. Fused 8-byte LDRD/STRD accesses, which
/// some simulators log as a single access, are split back into the two
/// 4-byte accesses the hardware performs.
pub fn build_power_trace<'a, T: IndexedTrace>(
    trace: &T,
    cpu: &'a dyn ArchInfo,
    config: &PowerAnalysisConfig,
    er: &ExecutionRange,
) -> Result<PowerTrace<'a>, BuildError> {
    let mut pt = PowerTrace::new(cpu);
    let with_inputs = config.with_instructions_inputs();

    build_from_trace(trace, er, 0, 0, |mut instr| {
        if with_inputs {
            let ii = cpu.instr_info(&instr);
            for r in ii.unique_input_registers(false) {
                let name = cpu.register_name(r as usize);
                let value = trace
                    .register_value_at(name, instr.time.saturating_sub(1))
                    .unwrap_or(0) as u32;
                instr.add_register_access(RegisterAccess::new(
                    name,
                    value as u64,
                    AccessKind::Read,
                ));
            }
        }

        // Some simulators log a dual load or store as a single 8-byte
        // access: break it into the 2 x 4-byte accesses the bus sees.
        if instr.iset == InstructionSet::Thumb && instr.width == 32 {
            let index = (instr.instruction >> 24) & 0x01 == 1;
            let wback = (instr.instruction >> 21) & 0x01 == 1;
            if (instr.instruction >> 25) == 0x74
                && (instr.instruction >> 22) & 0x01 == 1
                && ((index && !wback) || wback)
                && instr.mem_accesses.len() == 1
            {
                let ma = instr.mem_accesses[0];
                assert!(ma.size == 8, "expecting an 8-byte memory access for LDRD or STRD");
                instr.mem_accesses.clear();
                instr.add_memory_access(MemoryAccess::new(
                    4,
                    ma.addr,
                    ma.value & 0xffff_ffff,
                    ma.kind,
                ));
                instr.add_memory_access(MemoryAccess::new(
                    4,
                    ma.addr + 4,
                    (ma.value >> 32) & 0xffff_ffff,
                    ma.kind,
                ));
            }
        }

        pt.add(instr);
    })?;

    Ok(pt)
}
