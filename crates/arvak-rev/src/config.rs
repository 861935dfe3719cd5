//! Circuit configuration and the gate cost model.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// How negative slice bounds are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// A negative bound `k` means `len + k`, clamped to the register.
    #[default]
    Conventional,
    /// A negative bound `k` means `len - k`, unclamped.
    ///
    /// Keeps circuits that were written against this convention bit for
    /// bit identical. Bounds that land past the end fail on resolution.
    Compat,
}

/// Cost weights of a single gate, in decomposed-gate units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct GateCost {
    /// CNOT-equivalent count.
    pub cnot: u64,
    /// Toffoli count.
    pub toffoli: u64,
    /// Non-Clifford gate count.
    pub non_clifford: u64,
}

impl GateCost {
    /// Zero cost.
    pub const ZERO: GateCost = GateCost::new(0, 0, 0);

    /// Create a cost triple.
    pub const fn new(cnot: u64, toffoli: u64, non_clifford: u64) -> Self {
        Self {
            cnot,
            toffoli,
            non_clifford,
        }
    }
}

impl Add for GateCost {
    type Output = GateCost;

    fn add(self, rhs: GateCost) -> GateCost {
        GateCost {
            cnot: self.cnot + rhs.cnot,
            toffoli: self.toffoli + rhs.toffoli,
            non_clifford: self.non_clifford + rhs.non_clifford,
        }
    }
}

impl AddAssign for GateCost {
    fn add_assign(&mut self, rhs: GateCost) {
        *self = *self + rhs;
    }
}

/// Per-kind cost weights charged when a gate is emitted.
///
/// The default reflects a Toffoli decomposition into 6 CNOTs and 7 T-type
/// gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Bit flip (X).
    pub flip: GateCost,
    /// Controlled flip (CNOT).
    pub controlled_flip: GateCost,
    /// Doubly-controlled flip (Toffoli).
    pub doubly_controlled_flip: GateCost,
    /// Allocation marker.
    pub alloc: GateCost,
    /// Free marker.
    pub free: GateCost,
    /// Barrier.
    pub barrier: GateCost,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            flip: GateCost::ZERO,
            controlled_flip: GateCost::new(1, 0, 0),
            doubly_controlled_flip: GateCost::new(6, 1, 7),
            alloc: GateCost::ZERO,
            free: GateCost::ZERO,
            barrier: GateCost::ZERO,
        }
    }
}

/// Configuration of a [`Circuit`](crate::Circuit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Interpretation of negative slice bounds.
    pub index_mode: IndexMode,
    /// Cost weights charged on emission.
    pub cost_model: CostModel,
    /// Whether free markers assert their final value during evaluation.
    pub assert_cleanup: bool,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            index_mode: IndexMode::Conventional,
            cost_model: CostModel::default(),
            assert_cleanup: true,
        }
    }
}

impl CircuitConfig {
    /// Use a different index mode.
    #[must_use]
    pub fn with_index_mode(mut self, index_mode: IndexMode) -> Self {
        self.index_mode = index_mode;
        self
    }

    /// Use a different cost model.
    #[must_use]
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Enable or disable cleanup assertions on free markers.
    #[must_use]
    pub fn with_assert_cleanup(mut self, assert_cleanup: bool) -> Self {
        self.assert_cleanup = assert_cleanup;
        self
    }
}
