use std::cmp::Ordering;
use std::fmt;

/// The direction of a memory or register access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessKind {
    /// The value was read.
    Read,
    /// The value was written.
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "R"),
            AccessKind::Write => write!(f, "W"),
        }
    }
}

/// One memory access: a read or write of `size` bytes at `addr`.
///
/// Equality and ordering consider the identity of the access — address, size
/// and direction — and deliberately ignore the transferred value.
#[derive(Clone, Copy, Debug)]
pub struct MemoryAccess {
    /// Access size in bytes.
    pub size: usize,
    /// Accessed address.
    pub addr: u64,
    /// The transferred value.
    pub value: u64,
    /// Read or write.
    pub kind: AccessKind,
}

impl MemoryAccess {
    /// Construct a memory access.
    pub fn new(size: usize, addr: u64, value: u64, kind: AccessKind) -> Self {
        Self { size, addr, value, kind }
    }
}

impl PartialEq for MemoryAccess {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr && self.size == other.size && self.kind == other.kind
    }
}

impl Eq for MemoryAccess {}

impl PartialOrd for MemoryAccess {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemoryAccess {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.addr, self.size, self.kind).cmp(&(other.addr, other.size, other.kind))
    }
}

impl fmt::Display for MemoryAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}(0x{:x})@0x{:x}", self.kind, self.size, self.value, self.addr)
    }
}

/// One register access: a read or write of the named register.
///
/// As with [`MemoryAccess`], equality and ordering ignore the value.
#[derive(Clone, Debug)]
pub struct RegisterAccess {
    /// Name of the accessed register.
    pub name: String,
    /// The transferred value.
    pub value: u64,
    /// Read or write.
    pub kind: AccessKind,
}

impl RegisterAccess {
    /// Construct a register access.
    pub fn new(name: impl Into<String>, value: u64, kind: AccessKind) -> Self {
        Self { name: name.into(), value, kind }
    }
}

impl PartialEq for RegisterAccess {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl Eq for RegisterAccess {}

impl PartialOrd for RegisterAccess {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RegisterAccess {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.name, self.kind).cmp(&(&other.name, other.kind))
    }
}

impl fmt::Display for RegisterAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:x})@{}", self.kind, self.value, self.name)
    }
}

/// The instruction set an instruction was executed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InstructionSet {
    /// The Arm (A32) instruction set.
    #[default]
    Arm,
    /// The Thumb (T16/T32) instruction set.
    Thumb,
    /// The AArch64 instruction set.
    A64,
}

impl InstructionSet {
    /// The numeric tag used by the textual dump format.
    pub fn as_u8(self) -> u8 {
        match self {
            InstructionSet::Arm => 0,
            InstructionSet::Thumb => 1,
            InstructionSet::A64 => 2,
        }
    }
}

/// Whether an instruction actually executed or was predicated out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InstructionEffect {
    /// The instruction executed.
    #[default]
    Executed,
    /// The instruction's condition code failed.
    CcFail,
}

/// Strip a trailing `; comment` and collapse runs of whitespace to a single
/// space.
pub fn trim_spaces_and_comment(s: &str) -> String {
    let body = match s.find(';') {
        Some(pos) => &s[..pos],
        None => s,
    };
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One executed instruction of a trace, with the memory and register accesses
/// it performed.
///
/// The access lists are kept sorted; register accesses are deduplicated on
/// insertion because some simulators report aliased register names (MSP and
/// r13 for example) as separate events.
#[derive(Clone, Debug, Default)]
pub struct ReferenceInstruction {
    /// The time the instruction was executed at (strictly increasing along a
    /// trace).
    pub time: u64,
    /// The instruction's address.
    pub pc: u64,
    /// The instruction set it was executed in.
    pub iset: InstructionSet,
    /// Encoding width in bits (16 or 32).
    pub width: u32,
    /// The raw encoding.
    pub instruction: u32,
    /// Executed or predicated out.
    pub effect: InstructionEffect,
    /// The trimmed disassembly string.
    pub disassembly: String,
    /// Memory accesses, sorted by `(addr, size, direction)`.
    pub mem_accesses: Vec<MemoryAccess>,
    /// Register accesses, sorted by `(name, direction)` and deduplicated.
    pub reg_accesses: Vec<RegisterAccess>,
}

impl ReferenceInstruction {
    /// Construct an instruction; the disassembly is trimmed, the access
    /// lists are inserted one by one so they end up sorted and deduplicated.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time: u64,
        effect: InstructionEffect,
        pc: u64,
        iset: InstructionSet,
        width: u32,
        instruction: u32,
        disassembly: &str,
        mem_accesses: Vec<MemoryAccess>,
        reg_accesses: Vec<RegisterAccess>,
    ) -> Self {
        let mut instr = Self {
            time,
            pc,
            iset,
            width,
            instruction,
            effect,
            disassembly: trim_spaces_and_comment(disassembly),
            mem_accesses: Vec::new(),
            reg_accesses: Vec::new(),
        };
        for ma in mem_accesses {
            instr.add_memory_access(ma);
        }
        for ra in reg_accesses {
            instr.add_register_access(ra);
        }
        instr
    }

    /// Insert a memory access, keeping the list sorted.
    pub fn add_memory_access(&mut self, ma: MemoryAccess) -> &mut Self {
        let pos = self.mem_accesses.partition_point(|a| a <= &ma);
        self.mem_accesses.insert(pos, ma);
        self
    }

    /// Insert a register access, keeping the list sorted. An access equal to
    /// an already recorded one (same register, same direction) is dropped.
    pub fn add_register_access(&mut self, ra: RegisterAccess) -> &mut Self {
        if !self.reg_accesses.contains(&ra) {
            let pos = self.reg_accesses.partition_point(|a| a <= &ra);
            self.reg_accesses.insert(pos, ra);
        }
        self
    }

    /// Was this instruction actually executed?
    pub fn executed(&self) -> bool {
        self.effect == InstructionEffect::Executed
    }
}

impl PartialEq for ReferenceInstruction {
    // Compares the static identity of the instruction, not the runtime
    // values it touched.
    fn eq(&self, other: &Self) -> bool {
        self.pc == other.pc
            && self.iset == other.iset
            && self.width == other.width
            && self.instruction == other.instruction
    }
}

impl Eq for ReferenceInstruction {}

impl fmt::Display for ReferenceInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time:{} Executed:{} PC:0x{:x} ISet:{} Width:{} Instruction:0x{:x} {}",
            self.time,
            u8::from(self.executed()),
            self.pc,
            self.iset.as_u8(),
            self.width,
            self.instruction,
            self.disassembly
        )?;
        for ma in &self.mem_accesses {
            write!(f, " {ma}")?;
        }
        for ra in &self.reg_accesses {
            write!(f, " {ra}")?;
        }
        Ok(())
    }
}
