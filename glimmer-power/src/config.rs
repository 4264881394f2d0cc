//! Configuration of a power analysis run: which sources contribute, which
//! power model is used, and what noise is added.

use bitflags::bitflags;

use crate::noise::{self, NoiseKind, NoiseSource};

bitflags! {
    /// The contribution sources of a power analysis. The effect of each
    /// source depends on the power model in use (HW: Hamming weight, HD:
    /// Hamming distance).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Selection: u32 {
        /// Include the PC (HW, HD).
        const PC = 1 << 0;
        /// Include the instruction encoding (HW, HD).
        const OPCODE = 1 << 1;
        /// Include the memory access addresses (HW, HD).
        const MEM_ADDRESS = 1 << 2;
        /// Include the memory access data (HW, HD).
        const MEM_DATA = 1 << 3;
        /// Include the instructions' input operands (HW).
        const INSTRUCTIONS_INPUTS = 1 << 4;
        /// Include the instructions' output operands (HW, HD).
        const INSTRUCTIONS_OUTPUTS = 1 << 5;
        /// Include load-to-load transitions on the read bus (HD).
        const LOAD_TO_LOAD_TRANSITIONS = 1 << 6;
        /// Include store-to-store transitions on the write bus (HD).
        const STORE_TO_STORE_TRANSITIONS = 1 << 7;
        /// Include transitions between consecutive accesses of any
        /// direction (HD).
        const LAST_MEMORY_ACCESSES_TRANSITIONS = 1 << 8;
        /// Include the transition between a store and the previous content
        /// of the memory cell (HD).
        const MEMORY_UPDATE_TRANSITIONS = 1 << 9;

        /// The six direct contribution sources, the default.
        const ALL = Self::PC.bits()
            | Self::OPCODE.bits()
            | Self::MEM_ADDRESS.bits()
            | Self::MEM_DATA.bits()
            | Self::INSTRUCTIONS_INPUTS.bits()
            | Self::INSTRUCTIONS_OUTPUTS.bits();
    }
}

/// The power model used to turn values into per-cycle power figures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerModel {
    /// The number of set bits radiates.
    #[default]
    HammingWeight,
    /// The number of flipped bits radiates.
    HammingDistance,
}

/// The full configuration of a power analysis run.
///
/// The default takes all direct sources into account, uses the Hamming
/// weight model, and adds no noise (a zero noise source, with noise
/// injection enabled).
pub struct PowerAnalysisConfig {
    noise_source: Box<dyn NoiseSource>,
    selection: Selection,
    power_model: PowerModel,
    noise: bool,
}

impl Default for PowerAnalysisConfig {
    fn default() -> Self {
        Self {
            noise_source: noise::new_source(NoiseKind::Zero),
            selection: Selection::ALL,
            power_model: PowerModel::default(),
            noise: true,
        }
    }
}

impl PowerAnalysisConfig {
    /// All direct sources, under the given power model.
    pub fn with_model(power_model: PowerModel) -> Self {
        Self { power_model, ..Default::default() }
    }

    /// A specific source selection under the given power model.
    pub fn with_selection(selection: Selection, power_model: PowerModel) -> Self {
        Self { selection, power_model, ..Default::default() }
    }

    /// A fully custom configuration.
    pub fn with_noise_source(
        noise_source: Box<dyn NoiseSource>,
        selection: Selection,
        power_model: PowerModel,
    ) -> Self {
        Self { noise_source, selection, power_model, noise: true }
    }

    /// Remove all contribution sources.
    pub fn clear(&mut self) -> &mut Self {
        self.selection = Selection::empty();
        self
    }

    /// Add the sources in `s` to this configuration.
    pub fn set(&mut self, s: Selection) -> &mut Self {
        self.selection |= s;
        self
    }

    /// Are all the sources in `s` selected?
    pub fn has(&self, s: Selection) -> bool {
        self.selection.contains(s)
    }

    /// Is no source selected?
    pub fn with_none(&self) -> bool {
        self.selection.is_empty()
    }

    /// Are exactly the six direct sources selected?
    pub fn with_all(&self) -> bool {
        self.selection == Selection::ALL
    }

    /// Does the PC contribute?
    pub fn with_pc(&self) -> bool {
        self.has(Selection::PC)
    }

    /// Does the instruction encoding contribute?
    pub fn with_opcode(&self) -> bool {
        self.has(Selection::OPCODE)
    }

    /// Do the memory access addresses contribute?
    pub fn with_mem_address(&self) -> bool {
        self.has(Selection::MEM_ADDRESS)
    }

    /// Does the memory access data contribute?
    pub fn with_mem_data(&self) -> bool {
        self.has(Selection::MEM_DATA)
    }

    /// Do the instructions' input operands contribute?
    pub fn with_instructions_inputs(&self) -> bool {
        self.has(Selection::INSTRUCTIONS_INPUTS)
    }

    /// Do the instructions' output operands contribute?
    pub fn with_instructions_outputs(&self) -> bool {
        self.has(Selection::INSTRUCTIONS_OUTPUTS)
    }

    /// Do load-to-load transitions contribute?
    pub fn with_load_to_load_transitions(&self) -> bool {
        self.has(Selection::LOAD_TO_LOAD_TRANSITIONS)
    }

    /// Do store-to-store transitions contribute?
    pub fn with_store_to_store_transitions(&self) -> bool {
        self.has(Selection::STORE_TO_STORE_TRANSITIONS)
    }

    /// Do transitions between consecutive accesses contribute?
    pub fn with_last_memory_access_transitions(&self) -> bool {
        self.has(Selection::LAST_MEMORY_ACCESSES_TRANSITIONS)
    }

    /// Do memory update transitions contribute?
    pub fn with_memory_update_transitions(&self) -> bool {
        self.has(Selection::MEMORY_UPDATE_TRANSITIONS)
    }

    /// Does any bus transition source contribute?
    pub fn with_memory_access_transitions(&self) -> bool {
        self.selection.intersects(
            Selection::LOAD_TO_LOAD_TRANSITIONS
                | Selection::STORE_TO_STORE_TRANSITIONS
                | Selection::LAST_MEMORY_ACCESSES_TRANSITIONS,
        )
    }

    /// Switch the power model.
    pub fn set_model(&mut self, m: PowerModel) -> &mut Self {
        self.power_model = m;
        self
    }

    /// The power model in use.
    pub fn power_model(&self) -> PowerModel {
        self.power_model
    }

    /// Is the Hamming weight model in use?
    pub fn is_hamming_weight(&self) -> bool {
        self.power_model == PowerModel::HammingWeight
    }

    /// Is the Hamming distance model in use?
    pub fn is_hamming_distance(&self) -> bool {
        self.power_model == PowerModel::HammingDistance
    }

    /// Should noise be added to the synthetic power trace?
    pub fn add_noise(&self) -> bool {
        self.noise
    }

    /// Disable noise injection.
    pub fn set_without_noise(&mut self) -> &mut Self {
        self.noise = false;
        self
    }

    /// Enable noise injection.
    pub fn set_with_noise(&mut self) -> &mut Self {
        self.noise = true;
        self
    }

    /// Draw one noise sample from the configured source.
    pub fn noise(&mut self) -> f64 {
        self.noise_source.get()
    }

    /// The raw source selection.
    pub fn selection(&self) -> Selection {
        self.selection
    }
}
