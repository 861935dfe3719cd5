//! Primitive reversible gates and resource markers.
//!
//! Operands are absolute wire addresses, resolved from views when the gate
//! is emitted. Each gate has a fixed classical transition, a cost from the
//! circuit's [`CostModel`], and one rendering descriptor per operand wire.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::{CostModel, GateCost};
use crate::error::{RevError, RevResult};
use crate::state::{BitState, check_fits};

/// The closed set of gate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    /// Bit flip (X).
    Flip,
    /// Controlled flip (CNOT).
    ControlledFlip,
    /// Doubly-controlled flip (Toffoli).
    DoublyControlledFlip,
    /// Allocation marker.
    Alloc,
    /// Free marker.
    Free,
    /// Spacer with no effect.
    Barrier,
}

impl GateKind {
    /// Get the name of this gate kind.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            GateKind::Flip => "x",
            GateKind::ControlledFlip => "cx",
            GateKind::DoublyControlledFlip => "ccx",
            GateKind::Alloc => "alloc",
            GateKind::Free => "free",
            GateKind::Barrier => "barrier",
        }
    }
}

/// A gate with resolved operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Gate {
    /// XOR every target with 1.
    Flip {
        /// Target wires.
        targets: Vec<usize>,
    },
    /// XOR targets with controls, elementwise or broadcast from one control.
    ControlledFlip {
        /// Control wires.
        controls: Vec<usize>,
        /// Target wires.
        targets: Vec<usize>,
    },
    /// XOR targets with the AND of two control sequences.
    DoublyControlledFlip {
        /// First control wires.
        controls_a: Vec<usize>,
        /// Second control wires.
        controls_b: Vec<usize>,
        /// Target wires.
        targets: Vec<usize>,
    },
    /// Bring wires into use holding `initial_value`.
    Alloc {
        /// Allocated wires, least significant first.
        wires: Vec<usize>,
        /// Register name.
        name: Option<String>,
        /// Value written on allocation.
        initial_value: u64,
    },
    /// Take wires out of use, optionally asserting their value.
    Free {
        /// Released wires, least significant first.
        wires: Vec<usize>,
        /// Register name.
        name: Option<String>,
        /// Value the wires must hold when released.
        final_value: u64,
        /// Whether evaluation checks `final_value`.
        assert_cleanup: bool,
    },
    /// No effect; groups wires for rendering.
    Barrier {
        /// Spanned wires.
        wires: Vec<usize>,
    },
}

impl Gate {
    /// Create a bit flip on every target.
    pub fn flip(targets: Vec<usize>) -> RevResult<Self> {
        let gate = GateKind::Flip.name();
        require_operand(gate, "targets", &targets)?;
        require_distinct(gate, &targets)?;
        Ok(Gate::Flip { targets })
    }

    /// Create a controlled flip.
    ///
    /// A single control broadcasts over all targets; otherwise the widths
    /// must match.
    pub fn controlled_flip(controls: Vec<usize>, targets: Vec<usize>) -> RevResult<Self> {
        let gate = GateKind::ControlledFlip.name();
        require_operand(gate, "controls", &controls)?;
        require_operand(gate, "targets", &targets)?;
        require_broadcast(gate, controls.len(), targets.len())?;
        require_distinct(gate, &targets)?;
        require_disjoint(gate, &controls, &targets)?;
        Ok(Gate::ControlledFlip { controls, targets })
    }

    /// Create a doubly-controlled flip.
    pub fn doubly_controlled_flip(
        controls_a: Vec<usize>,
        controls_b: Vec<usize>,
        targets: Vec<usize>,
    ) -> RevResult<Self> {
        let gate = GateKind::DoublyControlledFlip.name();
        require_operand(gate, "controls", &controls_a)?;
        require_operand(gate, "targets", &targets)?;
        if controls_a.len() != controls_b.len() {
            return Err(RevError::OperandWidthMismatch {
                gate,
                detail: format!(
                    "control sequences have lengths {} and {}",
                    controls_a.len(),
                    controls_b.len()
                ),
            });
        }
        require_broadcast(gate, controls_a.len(), targets.len())?;
        require_distinct(gate, &targets)?;
        require_disjoint(gate, &controls_a, &targets)?;
        require_disjoint(gate, &controls_b, &targets)?;
        Ok(Gate::DoublyControlledFlip {
            controls_a,
            controls_b,
            targets,
        })
    }

    /// Create an allocation marker.
    pub fn alloc(wires: Vec<usize>, name: Option<String>, initial_value: u64) -> RevResult<Self> {
        require_distinct(GateKind::Alloc.name(), &wires)?;
        check_fits(initial_value, wires.len())?;
        Ok(Gate::Alloc {
            wires,
            name,
            initial_value,
        })
    }

    /// Create a free marker.
    pub fn free(
        wires: Vec<usize>,
        name: Option<String>,
        final_value: u64,
        assert_cleanup: bool,
    ) -> RevResult<Self> {
        require_distinct(GateKind::Free.name(), &wires)?;
        check_fits(final_value, wires.len())?;
        Ok(Gate::Free {
            wires,
            name,
            final_value,
            assert_cleanup,
        })
    }

    /// Create a barrier.
    pub fn barrier(wires: Vec<usize>) -> Self {
        Gate::Barrier { wires }
    }

    /// The kind of this gate.
    pub fn kind(&self) -> GateKind {
        match self {
            Gate::Flip { .. } => GateKind::Flip,
            Gate::ControlledFlip { .. } => GateKind::ControlledFlip,
            Gate::DoublyControlledFlip { .. } => GateKind::DoublyControlledFlip,
            Gate::Alloc { .. } => GateKind::Alloc,
            Gate::Free { .. } => GateKind::Free,
            Gate::Barrier { .. } => GateKind::Barrier,
        }
    }

    /// Get the name of this gate.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether this gate changes the resource lifecycle of its wires.
    pub fn is_marker(&self) -> bool {
        matches!(self, Gate::Alloc { .. } | Gate::Free { .. })
    }

    /// Operand wires in rendering order: controls first, then targets.
    pub fn wires(&self) -> Vec<usize> {
        match self {
            Gate::Flip { targets } => targets.clone(),
            Gate::ControlledFlip { controls, targets } => {
                controls.iter().chain(targets).copied().collect()
            }
            Gate::DoublyControlledFlip {
                controls_a,
                controls_b,
                targets,
            } => controls_a
                .iter()
                .chain(controls_b)
                .chain(targets)
                .copied()
                .collect(),
            Gate::Alloc { wires, .. } | Gate::Free { wires, .. } | Gate::Barrier { wires } => {
                wires.clone()
            }
        }
    }

    /// Cost charged for this gate under `model`.
    pub fn cost(&self, model: &CostModel) -> GateCost {
        match self {
            Gate::Flip { .. } => model.flip,
            Gate::ControlledFlip { .. } => model.controlled_flip,
            Gate::DoublyControlledFlip { .. } => model.doubly_controlled_flip,
            Gate::Alloc { .. } => model.alloc,
            Gate::Free { .. } => model.free,
            Gate::Barrier { .. } => model.barrier,
        }
    }

    /// Apply the classical transition of this gate.
    pub fn apply(&self, state: &mut BitState) -> RevResult<()> {
        match self {
            Gate::Flip { targets } => {
                for &t in targets {
                    state.toggle(t, true)?;
                }
            }
            Gate::ControlledFlip { controls, targets } => {
                let controls = state.read(controls)?;
                for (i, &t) in targets.iter().enumerate() {
                    state.toggle(t, broadcast(&controls, i))?;
                }
            }
            Gate::DoublyControlledFlip {
                controls_a,
                controls_b,
                targets,
            } => {
                let a = state.read(controls_a)?;
                let b = state.read(controls_b)?;
                for (i, &t) in targets.iter().enumerate() {
                    state.toggle(t, broadcast(&a, i) && broadcast(&b, i))?;
                }
            }
            Gate::Alloc {
                wires,
                initial_value,
                ..
            } => state.write(wires, *initial_value)?,
            Gate::Free {
                wires,
                name,
                final_value,
                assert_cleanup,
            } => {
                if *assert_cleanup {
                    let found = state.pack(wires)?;
                    if found != *final_value {
                        return Err(RevError::CleanupAssertionFailure {
                            name: name.clone(),
                            expected: *final_value,
                            found,
                        });
                    }
                }
                state.write(wires, 0)?;
            }
            Gate::Barrier { .. } => {}
        }
        Ok(())
    }

    /// The adjoint of this gate.
    ///
    /// Flips are self-inverse. An allocation marker becomes a free marker
    /// expecting the initial value, and vice versa.
    pub fn adjoint(&self, assert_cleanup: bool) -> Gate {
        match self {
            Gate::Alloc {
                wires,
                name,
                initial_value,
            } => Gate::Free {
                wires: wires.clone(),
                name: name.clone(),
                final_value: *initial_value,
                assert_cleanup,
            },
            Gate::Free {
                wires,
                name,
                final_value,
                ..
            } => Gate::Alloc {
                wires: wires.clone(),
                name: name.clone(),
                initial_value: *final_value,
            },
            other => other.clone(),
        }
    }

    /// Rendering descriptors, one per operand wire in [`Gate::wires`] order.
    pub fn descriptors(&self) -> Vec<String> {
        match self {
            Gate::Flip { targets } => vec![TARGET.to_string(); targets.len()],
            Gate::ControlledFlip { controls, targets } => {
                let mut out = control_descriptors(controls, targets);
                out.extend(vec![TARGET.to_string(); targets.len()]);
                out
            }
            Gate::DoublyControlledFlip {
                controls_a,
                controls_b,
                targets,
            } => {
                let mut out = control_descriptors(controls_a, targets);
                out.extend(control_descriptors(controls_b, targets));
                out.extend(vec![TARGET.to_string(); targets.len()]);
                out
            }
            Gate::Alloc {
                wires,
                name,
                initial_value,
            } => {
                if wires.is_empty() {
                    return vec![];
                }
                let mut out = vec![format!(
                    "\\lstick[wires={}]{{$\\ket{{{initial_value}}}_{{\\text{{{}}}}}$}} \\setwiretype{{q}}",
                    wires.len(),
                    name.as_deref().unwrap_or("")
                )];
                out.extend(vec![" ".to_string(); wires.len() - 1]);
                out
            }
            Gate::Free {
                wires, final_value, ..
            } => vec![format!("\\trash{{\\ket{{{final_value}}}}}\\setwiretype{{n}}"); wires.len()],
            Gate::Barrier { wires } => vec!["\\qw".to_string(); wires.len()],
        }
    }
}

const TARGET: &str = "\\targ{}";

/// `\ctrl{d}` with `d` the signed offset from each control to the first target.
fn control_descriptors(controls: &[usize], targets: &[usize]) -> Vec<String> {
    let first_target = targets.first().copied().unwrap_or_default();
    controls
        .iter()
        .map(|&c| format!("\\ctrl{{{}}}", first_target as i64 - c as i64))
        .collect()
}

fn broadcast(values: &[bool], i: usize) -> bool {
    let i = if values.len() == 1 { 0 } else { i };
    values.get(i).copied().unwrap_or(false)
}

fn require_operand(gate: &'static str, role: &str, wires: &[usize]) -> RevResult<()> {
    if wires.is_empty() {
        return Err(RevError::OperandWidthMismatch {
            gate,
            detail: format!("{role} must not be empty"),
        });
    }
    Ok(())
}

fn require_broadcast(gate: &'static str, controls: usize, targets: usize) -> RevResult<()> {
    if controls != 1 && controls != targets {
        return Err(RevError::OperandWidthMismatch {
            gate,
            detail: format!("{controls} controls cannot drive {targets} targets"),
        });
    }
    Ok(())
}

fn require_distinct(gate: &'static str, wires: &[usize]) -> RevResult<()> {
    let mut seen = FxHashSet::default();
    for &wire in wires {
        if !seen.insert(wire) {
            return Err(RevError::DuplicateWire { gate, wire });
        }
    }
    Ok(())
}

fn require_disjoint(gate: &'static str, controls: &[usize], targets: &[usize]) -> RevResult<()> {
    let targets: FxHashSet<_> = targets.iter().copied().collect();
    match controls.iter().find(|c| targets.contains(c)) {
        Some(&wire) => Err(RevError::DuplicateWire { gate, wire }),
        None => Ok(()),
    }
}
