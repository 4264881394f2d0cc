//! Architecture information for Glimmer: instruction-attribute decoding.
//!
//! Given an executed instruction (its raw encoding and width), the decoder
//! classifies it (load / store / branch / call), extracts the addressing mode
//! used by loads and stores, and enumerates the architectural registers it
//! reads, both the explicit operands and the implicit ones (PC for
//! PC-relative forms, the status register for flag-consuming or predicated
//! forms, SP for stack operations). The power models rely on this read set
//! being exactly the hardware's.

#![warn(missing_docs)]

use glimmer_trace::ReferenceInstruction;

pub mod v7m;

pub use v7m::V7MInfo;

/// How a load or store computes its effective address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OffsetFormat {
    /// Not a memory-access instruction.
    #[default]
    NoAccess,
    /// Immediate offset from the base register.
    Immediate,
    /// Register offset from the base register.
    Register,
    /// Shifted register offset from the base register.
    ScaledRegister,
}

/// The base-register write-back policy of a load or store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BaseUpdate {
    /// The base register is not written back.
    #[default]
    Offset,
    /// The base is updated before the access.
    PreIndexed,
    /// The base is updated after the access.
    PostIndexed,
    /// The base is not used for the access (coprocessor forms).
    Unindexed,
}

/// The addressing mode used by a load or store instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressingMode {
    /// Offset computation.
    pub offset: OffsetFormat,
    /// Base register update policy.
    pub update: BaseUpdate,
}

impl AddressingMode {
    /// Construct an addressing mode.
    pub fn new(offset: OffsetFormat, update: BaseUpdate) -> Self {
        Self { offset, update }
    }

    /// An addressing mode is valid iff it describes an actual memory access.
    pub fn is_valid(&self) -> bool {
        self.offset != OffsetFormat::NoAccess
    }
}

/// The coarse classification of an instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstructionKind {
    /// None of the below.
    #[default]
    None,
    /// A load instruction.
    Load,
    /// A store instruction.
    Store,
    /// A branch instruction.
    Branch,
    /// A call instruction.
    Call,
}

/// The decoded attributes of one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrInfo {
    input_registers: Vec<u32>,
    implicit_input_registers: Vec<u32>,
    kind: InstructionKind,
    addressing_mode: AddressingMode,
}

impl InstrInfo {
    /// An empty `InstrInfo`: no kind, no registers read.
    pub fn new() -> Self {
        Self { input_registers: Vec::with_capacity(4), ..Default::default() }
    }

    /// Has this instruction no kind?
    pub fn has_no_kind(&self) -> bool {
        self.kind == InstructionKind::None
    }

    /// Is this a load?
    pub fn is_load(&self) -> bool {
        self.kind == InstructionKind::Load
    }

    /// Is this a store?
    pub fn is_store(&self) -> bool {
        self.kind == InstructionKind::Store
    }

    /// Is this a memory access, i.e. a load or a store?
    pub fn is_memory_access(&self) -> bool {
        self.is_load() || self.is_store()
    }

    /// Is this a branch?
    pub fn is_branch(&self) -> bool {
        self.kind == InstructionKind::Branch
    }

    /// Is this a call?
    pub fn is_call(&self) -> bool {
        self.kind == InstructionKind::Call
    }

    /// The instruction kind.
    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// Mark this instruction as a load with the given addressing mode.
    pub fn set_load(&mut self, offset: OffsetFormat, update: BaseUpdate) -> &mut Self {
        self.kind = InstructionKind::Load;
        self.addressing_mode = AddressingMode::new(offset, update);
        self
    }

    /// Mark this instruction as a store with the given addressing mode.
    pub fn set_store(&mut self, offset: OffsetFormat, update: BaseUpdate) -> &mut Self {
        self.kind = InstructionKind::Store;
        self.addressing_mode = AddressingMode::new(offset, update);
        self
    }

    /// Mark this instruction as a branch.
    pub fn set_branch(&mut self) -> &mut Self {
        self.kind = InstructionKind::Branch;
        self
    }

    /// Mark this instruction as a call.
    pub fn set_call(&mut self) -> &mut Self {
        self.kind = InstructionKind::Call;
        self
    }

    /// Record an explicit input register. Duplicates are kept; the order is
    /// the assembly operand order.
    pub fn add_input_register(&mut self, reg: u32) -> &mut Self {
        self.input_registers.push(reg);
        self
    }

    /// Record several explicit input registers, in operand order.
    pub fn add_input_registers(&mut self, regs: &[u32]) -> &mut Self {
        self.input_registers.extend_from_slice(regs);
        self
    }

    /// Record an implicit input register (read but not named in assembly).
    pub fn add_implicit_input_register(&mut self, reg: u32) -> &mut Self {
        self.implicit_input_registers.push(reg);
        self
    }

    /// The raw list of registers read, in assembly order, duplicates kept.
    pub fn input_registers(&self, implicit: bool) -> &[u32] {
        if implicit {
            &self.implicit_input_registers
        } else {
            &self.input_registers
        }
    }

    /// The sorted, deduplicated set of registers read.
    pub fn unique_input_registers(&self, implicit: bool) -> Vec<u32> {
        let mut regs = self.input_registers(implicit).to_vec();
        regs.sort_unstable();
        regs.dedup();
        regs
    }

    /// The addressing mode. Only meaningful for loads and stores.
    pub fn addressing_mode(&self) -> &AddressingMode {
        assert!(
            self.is_memory_access(),
            "only instructions that access memory have a valid addressing mode"
        );
        &self.addressing_mode
    }

    /// Does this instruction have a valid addressing mode?
    pub fn has_valid_addressing_mode(&self) -> bool {
        self.addressing_mode.is_valid()
    }
}

/// Architecture-specific knowledge the analyses need.
pub trait ArchInfo {
    /// A NOP encoding of the requested size in bytes.
    fn nop(&self, instr_size: usize) -> u32;

    /// Is `instr` a branch instruction?
    fn is_branch(&self, instr: &ReferenceInstruction) -> bool;

    /// An estimated cycle count for `instr`; `next` is the following
    /// instruction when known, so taken branches can be costed.
    fn cycles(&self, instr: &ReferenceInstruction, next: Option<&ReferenceInstruction>) -> usize;

    /// How many registers this CPU has.
    fn num_registers(&self) -> usize;

    /// The name of register `reg`.
    fn register_name(&self, reg: usize) -> &'static str;

    /// The id of the register called `name`.
    fn register_id(&self, name: &str) -> Option<usize>;

    /// Is `name` a status register on this CPU?
    fn is_status_register(&self, name: &str) -> bool;

    /// Decode the attributes of `instr`.
    fn instr_info(&self, instr: &ReferenceInstruction) -> InstrInfo;

    /// A short description of this architecture.
    fn description(&self) -> &'static str;
}
