//! The reversible circuit builder.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::allocator::{Allocator, ChunkId, OwnerToken};
use crate::config::{CircuitConfig, GateCost};
use crate::error::{RevError, RevResult};
use crate::gate::Gate;
use crate::state::{BitState, check_fits};
use crate::view::{Key, View};

/// Whether a scope allocated an ancilla itself or borrowed it from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// Allocated by the scope holding this token; it must release it.
    Owned(OwnerToken),
    /// Supplied by a caller; the scope must leave it allocated.
    Borrowed,
}

/// A scratch register handed out by [`Circuit::ancilla_register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancilla {
    view: View,
    ownership: Ownership,
    initial_value: u64,
}

impl Ancilla {
    /// The wires of the ancilla.
    pub fn view(&self) -> &View {
        &self.view
    }

    /// How the requesting scope holds the ancilla.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Check if the requesting scope owns the ancilla.
    pub fn is_owned(&self) -> bool {
        matches!(self.ownership, Ownership::Owned(_))
    }

    /// Value the ancilla holds on allocation and must hold on release.
    pub fn initial_value(&self) -> u64 {
        self.initial_value
    }
}

/// Serializable snapshot of a gate log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitExport {
    /// Name of the circuit.
    pub name: String,
    /// Number of wires in the address space.
    pub width: usize,
    /// Gates in application order.
    pub gates: Vec<Gate>,
    /// Accumulated cost.
    pub counts: GateCost,
}

/// A reversible classical circuit.
///
/// Owns the allocator and an append-only gate log with running cost
/// totals. Registers are requested from the circuit and come back as
/// [`View`]s; gates take views as operands and record their absolute wire
/// addresses at emission time.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Build configuration.
    config: CircuitConfig,
    /// Address-space allocator.
    allocator: Allocator,
    /// Gate log in application order.
    gates: Vec<Gate>,
    /// Accumulated cost of the logged gates.
    counts: GateCost,
    /// Counter for ancilla ownership tokens.
    next_token: u64,
}

impl Circuit {
    /// Create an empty circuit with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitConfig::default())
    }

    /// Create an empty circuit with the given configuration.
    pub fn with_config(name: impl Into<String>, config: CircuitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            allocator: Allocator::new(),
            gates: vec![],
            counts: GateCost::ZERO,
            next_token: 0,
        }
    }

    // =========================================================================
    // Registers
    // =========================================================================

    /// Allocate a register of `size` wires holding `initial_value`.
    pub fn register(
        &mut self,
        size: usize,
        name: Option<&str>,
        initial_value: u64,
    ) -> RevResult<View> {
        check_fits(initial_value, size)?;
        let id = self.allocator.alloc(size, name, 0);
        self.mark_alloc(id, initial_value)
    }

    /// Mint a fresh ancilla ownership token.
    pub fn scope_token(&mut self) -> OwnerToken {
        let token = OwnerToken(self.next_token);
        self.next_token += 1;
        token
    }

    /// Obtain scratch wires for the scope identified by `token`.
    ///
    /// With `existing` the caller lends its own wires: they are returned as
    /// they are, no marker is emitted, and the scope must not release them.
    /// Otherwise a fresh ancilla chunk is allocated and owned by `token`.
    pub fn ancilla_register(
        &mut self,
        size: usize,
        token: OwnerToken,
        existing: Option<&View>,
        name: Option<&str>,
        initial_value: u64,
    ) -> RevResult<Ancilla> {
        if let Some(view) = existing {
            if view.len() < size {
                return Err(RevError::IndexOutOfRange {
                    index: size,
                    len: view.len(),
                });
            }
            self.allocator.live_chunk(view.chunk())?;
            return Ok(Ancilla {
                view: view.clone(),
                ownership: Ownership::Borrowed,
                initial_value,
            });
        }

        check_fits(initial_value, size)?;
        let id = self.allocator.anc_alloc(token, size, name);
        let view = self.mark_alloc(id, initial_value)?;
        Ok(Ancilla {
            view,
            ownership: Ownership::Owned(token),
            initial_value,
        })
    }

    /// Release an ancilla if `token` owns its chunk.
    ///
    /// The free marker asserts that the ancilla is back at its initial
    /// value. Returns whether the ancilla was released.
    pub fn release_ancilla(&mut self, ancilla: &Ancilla, token: OwnerToken) -> RevResult<bool> {
        let id = ancilla.view.chunk();
        self.require_unreleased(id)?;
        let wires = self.allocator.view(id)?.resolve(&self.allocator)?;
        let name = self.allocator.chunk(id)?.name().map(str::to_owned);
        let gate = Gate::free(
            wires,
            name,
            ancilla.initial_value,
            self.config.assert_cleanup,
        )?;

        if !self.allocator.anc_free(id, token)? {
            return Ok(false);
        }
        self.push(gate);
        Ok(true)
    }

    /// Release the whole register that `view` belongs to.
    pub fn free(&mut self, view: &View, final_value: u64) -> RevResult<()> {
        let id = view.chunk();
        self.require_unreleased(id)?;
        let gate = self.free_marker(id, None, final_value)?;
        self.allocator.free(id)?;
        self.push(gate);
        Ok(())
    }

    /// Release `start` wires from the low edge and `end` wires from the high
    /// edge of the register that `view` belongs to.
    ///
    /// Both released spans are asserted to hold `final_value`. A low-edge
    /// release renumbers the surviving wires, so views over the register
    /// must be re-derived from [`Circuit::view_of`] afterwards.
    pub fn free_partial(
        &mut self,
        view: &View,
        start: usize,
        end: usize,
        final_value: u64,
    ) -> RevResult<()> {
        let id = view.chunk();
        self.require_unreleased(id)?;
        let size = self.allocator.live_chunk(id)?.size();
        if start + end > size {
            return Err(RevError::PartialFreeOverflow {
                chunk: id,
                requested: start + end,
                size,
            });
        }

        let high = (end > 0)
            .then(|| self.free_marker(id, Some(size - end..size), final_value))
            .transpose()?;
        let low = (start > 0)
            .then(|| self.free_marker(id, Some(0..start), final_value))
            .transpose()?;

        if let Some(gate) = high {
            self.push(gate);
            self.allocator.partial_free_end(id, end)?;
        }
        if let Some(gate) = low {
            self.push(gate);
            self.allocator.partial_free_start(id, start)?;
        }
        Ok(())
    }

    /// A view over every current wire of a live register.
    pub fn view_of(&self, chunk: ChunkId) -> RevResult<View> {
        self.allocator.view(chunk)
    }

    /// Evaluate a selection expression under the configured index mode.
    pub fn select(&self, view: &View, keys: &[Key]) -> RevResult<View> {
        view.select(keys, self.config.index_mode)
    }

    /// Absolute wire addresses of a view.
    pub fn resolve(&self, view: &View) -> RevResult<Vec<usize>> {
        view.resolve(&self.allocator)
    }

    /// Fail with a double free if the register was already released.
    fn require_unreleased(&self, id: ChunkId) -> RevResult<()> {
        let chunk = self.allocator.chunk(id)?;
        if !chunk.is_live() {
            return Err(RevError::DoubleFree {
                chunk: id,
                name: chunk.name().map(str::to_owned),
            });
        }
        Ok(())
    }

    fn mark_alloc(&mut self, id: ChunkId, initial_value: u64) -> RevResult<View> {
        let view = self.allocator.view(id)?;
        let wires = view.resolve(&self.allocator)?;
        let name = self.allocator.chunk(id)?.name().map(str::to_owned);
        self.push(Gate::alloc(wires, name, initial_value)?);
        Ok(view)
    }

    fn free_marker(
        &self,
        id: ChunkId,
        span: Option<std::ops::Range<usize>>,
        final_value: u64,
    ) -> RevResult<Gate> {
        let chunk = self.allocator.live_chunk(id)?;
        let full = self.allocator.view(id)?;
        let view = match span {
            Some(span) => full.slice(span)?,
            None => full,
        };
        Gate::free(
            view.resolve(&self.allocator)?,
            chunk.name().map(str::to_owned),
            final_value,
            self.config.assert_cleanup,
        )
    }

    // =========================================================================
    // Gate emission
    // =========================================================================

    /// Append a gate to the log.
    ///
    /// Every operand wire must lie inside a live register.
    pub fn emit(&mut self, gate: Gate) -> RevResult<&mut Self> {
        let width = self.allocator.high_water_mark();
        for wire in gate.wires() {
            if !self.allocator.is_allocated(wire) {
                return Err(RevError::IndexOutOfRange { index: wire, len: width });
            }
        }
        self.push(gate);
        Ok(self)
    }

    fn push(&mut self, gate: Gate) {
        trace!(gate = gate.name(), wires = ?gate.wires(), "emitted gate");
        self.counts += gate.cost(&self.config.cost_model);
        self.gates.push(gate);
    }

    /// Flip every wire of `target`.
    pub fn x(&mut self, target: &View) -> RevResult<&mut Self> {
        let gate = Gate::flip(self.resolve(target)?)?;
        self.emit(gate)
    }

    /// Flip `target` where `control` is set.
    pub fn cx(&mut self, control: &View, target: &View) -> RevResult<&mut Self> {
        let gate = Gate::controlled_flip(self.resolve(control)?, self.resolve(target)?)?;
        self.emit(gate)
    }

    /// Flip `target` where both `control_a` and `control_b` are set.
    pub fn ccx(
        &mut self,
        control_a: &View,
        control_b: &View,
        target: &View,
    ) -> RevResult<&mut Self> {
        let gate = Gate::doubly_controlled_flip(
            self.resolve(control_a)?,
            self.resolve(control_b)?,
            self.resolve(target)?,
        )?;
        self.emit(gate)
    }

    /// Insert a barrier across the given views.
    pub fn barrier(&mut self, views: &[&View]) -> RevResult<&mut Self> {
        let mut wires = Vec::new();
        for view in views {
            wires.extend(self.resolve(view)?);
        }
        self.emit(Gate::barrier(wires))
    }

    // =========================================================================
    // Reversal
    // =========================================================================

    /// Run `build` and replace the gates it emits with their adjoint.
    ///
    /// The recorded gates are reversed in place and allocation and free
    /// markers swap roles. Markers inside the region are rejected unless
    /// `allow_alloc_free` is set, since the allocator itself is not rolled
    /// back. On error the log is left as `build` left it.
    pub fn reverse<T, E, F>(&mut self, allow_alloc_free: bool, build: F) -> Result<T, E>
    where
        E: From<RevError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let start = self.gates.len();
        let output = build(self)?;
        let region = &mut self.gates[start..];

        if !allow_alloc_free {
            if let Some((offset, gate)) = region.iter().enumerate().find(|(_, g)| g.is_marker()) {
                return Err(RevError::ReversalContractViolation {
                    marker: gate.name(),
                    position: start + offset,
                }
                .into());
            }
        }
        let markers = region.iter().filter(|g| g.is_marker()).count();

        let assert_cleanup = self.config.assert_cleanup;
        for gate in region.iter_mut() {
            if gate.is_marker() {
                *gate = gate.adjoint(assert_cleanup);
            }
        }
        region.reverse();

        if markers > 0 {
            let model = self.config.cost_model;
            self.counts = self
                .gates
                .iter()
                .fold(GateCost::ZERO, |acc, g| acc + g.cost(&model));
        }

        debug!(
            circuit = %self.name,
            start,
            gates = self.gates.len() - start,
            markers,
            "reversed region"
        );
        Ok(output)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Replay the log on an all-zero state.
    pub fn simulate(&self) -> RevResult<BitState> {
        let mut state = BitState::zeros(self.allocator.high_water_mark());
        for gate in &self.gates {
            gate.apply(&mut state)?;
        }
        Ok(state)
    }

    /// Replay the log and read the bits of each view.
    #[instrument(skip(self, views), fields(circuit = %self.name, gates = self.gates.len()))]
    pub fn evaluate(&self, views: &[&View]) -> RevResult<Vec<Vec<bool>>> {
        let state = self.simulate()?;
        views
            .iter()
            .map(|view| state.read(&self.resolve(view)?))
            .collect()
    }

    /// Replay the log and pack each view into an integer, least significant
    /// wire first.
    pub fn read_values(&self, views: &[&View]) -> RevResult<Vec<u64>> {
        let state = self.simulate()?;
        views
            .iter()
            .map(|view| state.pack(&self.resolve(view)?))
            .collect()
    }

    /// Replay the log and pack a single view.
    pub fn read_value(&self, view: &View) -> RevResult<u64> {
        let state = self.simulate()?;
        state.pack(&self.resolve(view)?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration.
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Get the allocator.
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Number of logged gates, markers included.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Check if no gate has been logged.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// The gate log in application order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Accumulated cost of the logged gates.
    pub fn counts(&self) -> GateCost {
        self.counts
    }

    /// Current size of the address space.
    pub fn width(&self) -> usize {
        self.allocator.high_water_mark()
    }

    /// Snapshot of the log for external consumers.
    pub fn export(&self) -> CircuitExport {
        CircuitExport {
            name: self.name.clone(),
            width: self.width(),
            gates: self.gates.clone(),
            counts: self.counts,
        }
    }

    /// Render [`Circuit::export`] as JSON.
    pub fn to_json(&self) -> RevResult<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateKind;

    #[test]
    fn test_register_writes_initial_value() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(4, Some("a"), 5).unwrap();
        let b = circuit.register(3, Some("b"), 0).unwrap();

        assert_eq!(circuit.len(), 2);
        assert_eq!(circuit.width(), 7);
        assert_eq!(circuit.read_values(&[&a, &b]).unwrap(), vec![5, 0]);
        assert!(matches!(
            circuit.register(2, None, 4),
            Err(RevError::ValueOverflow { .. })
        ));
        assert_eq!(circuit.width(), 7);
    }

    #[test]
    fn test_gate_emission_and_counts() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(2, Some("a"), 0b11).unwrap();
        let t = circuit.register(1, Some("t"), 0).unwrap();

        circuit
            .ccx(&a.at(0).unwrap(), &a.at(1).unwrap(), &t)
            .unwrap()
            .cx(&t, &a.at(0).unwrap())
            .unwrap()
            .x(&t)
            .unwrap();

        assert_eq!(circuit.counts(), GateCost::new(7, 1, 7));
        assert_eq!(circuit.read_values(&[&a, &t]).unwrap(), vec![0b10, 0]);
    }

    #[test]
    fn test_emit_rejects_unallocated_wires() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(2, Some("a"), 0).unwrap();
        let _b = circuit.register(2, Some("b"), 0).unwrap();
        circuit.free(&a, 0).unwrap();

        assert!(circuit.emit(Gate::flip(vec![0]).unwrap()).is_err());
        assert!(circuit.emit(Gate::flip(vec![9]).unwrap()).is_err());
        assert!(matches!(circuit.x(&a), Err(RevError::StaleView(_))));
        circuit.emit(Gate::flip(vec![2]).unwrap()).unwrap();
    }

    #[test]
    fn test_free_asserts_final_value() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(3, Some("a"), 6).unwrap();
        circuit.free(&a, 6).unwrap();
        circuit.simulate().unwrap();

        let mut circuit = Circuit::new("test");
        let a = circuit.register(3, Some("a"), 6).unwrap();
        circuit.free(&a, 0).unwrap();
        assert!(matches!(
            circuit.simulate(),
            Err(RevError::CleanupAssertionFailure {
                expected: 0,
                found: 6,
                ..
            })
        ));
    }

    #[test]
    fn test_free_partial() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(6, Some("a"), 0b011100).unwrap();
        circuit.free_partial(&a, 2, 1, 0).unwrap();

        let a = circuit.view_of(a.chunk()).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(circuit.resolve(&a).unwrap(), vec![2, 3, 4]);
        assert_eq!(circuit.read_value(&a).unwrap(), 0b111);

        assert!(matches!(
            circuit.free_partial(&a, 2, 2, 0),
            Err(RevError::PartialFreeOverflow { .. })
        ));
        assert_eq!(circuit.view_of(a.chunk()).unwrap().len(), 3);
    }

    #[test]
    fn test_ancilla_owned_and_borrowed() {
        let mut circuit = Circuit::new("test");
        let outer = circuit.scope_token();
        let inner = circuit.scope_token();

        let owned = circuit.ancilla_register(1, outer, None, Some("c"), 0).unwrap();
        assert!(owned.is_owned());

        let borrowed = circuit
            .ancilla_register(1, inner, Some(owned.view()), Some("c"), 0)
            .unwrap();
        assert_eq!(borrowed.ownership(), Ownership::Borrowed);
        let before = circuit.len();
        assert!(!circuit.release_ancilla(&borrowed, inner).unwrap());
        assert_eq!(circuit.len(), before);

        assert!(circuit.release_ancilla(&owned, outer).unwrap());
        assert_eq!(circuit.gates().last().unwrap().kind(), GateKind::Free);
        assert!(matches!(
            circuit.free(owned.view(), 0),
            Err(RevError::DoubleFree { .. })
        ));
        assert!(matches!(
            circuit.release_ancilla(&owned, outer),
            Err(RevError::DoubleFree { .. })
        ));
    }

    #[test]
    fn test_double_free_through_circuit() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(2, Some("a"), 0).unwrap();
        circuit.free(&a, 0).unwrap();
        let len = circuit.len();

        assert!(matches!(
            circuit.free(&a, 0),
            Err(RevError::DoubleFree { name: Some(ref n), .. }) if n == "a"
        ));
        assert!(matches!(
            circuit.free_partial(&a, 1, 0, 0),
            Err(RevError::DoubleFree { .. })
        ));
        assert_eq!(circuit.len(), len);
        assert!(circuit.allocator().check_invariants().is_ok());
    }

    #[test]
    fn test_reverse_swaps_order() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(1, Some("a"), 1).unwrap();
        let b = circuit.register(1, Some("b"), 0).unwrap();

        circuit
            .reverse(false, |c| -> RevResult<()> {
                c.x(&b)?;
                c.cx(&a, &b)?;
                Ok(())
            })
            .unwrap();

        let kinds: Vec<_> = circuit.gates()[2..].iter().map(Gate::kind).collect();
        assert_eq!(kinds, vec![GateKind::ControlledFlip, GateKind::Flip]);
        assert_eq!(circuit.read_value(&b).unwrap(), 0);
    }

    #[test]
    fn test_reverse_rejects_markers() {
        let mut circuit = Circuit::new("test");
        let result = circuit.reverse(false, |c| c.register(2, Some("tmp"), 0));
        assert!(matches!(
            result,
            Err(RevError::ReversalContractViolation {
                marker: "alloc",
                position: 0
            })
        ));

        let mut circuit = Circuit::new("test");
        let tmp = circuit.reverse(true, |c| c.register(2, Some("tmp"), 1)).unwrap();
        assert_eq!(circuit.gates()[0].kind(), GateKind::Free);
        assert_eq!(tmp.len(), 2);
    }

    #[test]
    fn test_barrier_is_free_and_rendered_per_wire() {
        let mut circuit = Circuit::new("test");
        let a = circuit.register(2, None, 0).unwrap();
        let b = circuit.register(1, None, 0).unwrap();
        circuit.barrier(&[&a, &b]).unwrap();

        let barrier = circuit.gates().last().unwrap();
        assert_eq!(barrier.wires(), vec![0, 1, 2]);
        assert_eq!(barrier.descriptors().len(), 3);
        assert_eq!(circuit.counts(), GateCost::ZERO);
    }

    #[test]
    fn test_export_json() {
        let mut circuit = Circuit::new("export");
        let a = circuit.register(2, Some("a"), 1).unwrap();
        circuit.x(&a).unwrap();

        let export: CircuitExport = serde_json::from_str(&circuit.to_json().unwrap()).unwrap();
        assert_eq!(export.width, 2);
        assert_eq!(export.gates.len(), 2);
        assert_eq!(export, circuit.export());
    }
}
