use super::atom_sync::AtomicPositionSynchronizer;
use super::config::SyncConfig;
use super::confirm::{Confirmation, UnitChange};
use super::guard::{Origin, StatsCell, SyncLock, SyncState, SyncStats};
use super::resolve::{ResolvedLattice, resolve_lattice};
use crate::core::lattice::bravais::{Bravais, Param};
use crate::core::lattice::geometry::{ExplicitLattice, build_matrix, extract_params, matrices_close};
use crate::core::lattice::params::LatticeParams;
use crate::core::lattice::units::LengthUnit;
use crate::core::models::explicit::{ExplicitEvent, ExplicitLatticeModel};
use crate::core::models::structure::{StructuralModel, StructureEvent};
use crate::core::models::symbolic::{ParameterForm, SymbolicEvent, SymbolicLatticeModel};
use nalgebra::Matrix3;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info, instrument, trace, warn};

/// Mediator between the symbolic and explicit lattice descriptions and the
/// structural lattice.
///
/// Every upstream notification recomputes the Angstrom lattice matrix. A valid
/// matrix that differs from the structural one is pushed into the structural model
/// and into whichever description did not originate the edit; an invalid
/// description is refused and every model keeps its last valid state. Writes made
/// during a propagation come back as notifications and are dropped by the
/// synchronizer's [`SyncLock`].
pub struct LatticeSynchronizer {
    symbolic: Rc<SymbolicLatticeModel>,
    explicit: Rc<ExplicitLatticeModel>,
    structure: Rc<StructuralModel>,
    atoms: Rc<AtomicPositionSynchronizer>,
    confirmation: Rc<dyn Confirmation>,
    config: SyncConfig,
    lock: SyncLock,
    stats: StatsCell,
    last_alat: Cell<Option<f64>>,
}

impl LatticeSynchronizer {
    pub fn new(
        symbolic: Rc<SymbolicLatticeModel>,
        explicit: Rc<ExplicitLatticeModel>,
        structure: Rc<StructuralModel>,
        atoms: Rc<AtomicPositionSynchronizer>,
        confirmation: Rc<dyn Confirmation>,
        config: SyncConfig,
    ) -> Self {
        Self {
            symbolic,
            explicit,
            structure,
            atoms,
            confirmation,
            config,
            lock: SyncLock::new(),
            stats: StatsCell::default(),
            last_alat: Cell::new(None),
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.get()
    }

    pub fn state(&self) -> SyncState {
        self.lock.state()
    }

    #[instrument(skip_all, name = "lattice_sync.symbolic")]
    pub fn on_symbolic_changed(&self, event: &SymbolicEvent) {
        if self.suppress() {
            return;
        }
        trace!(?event, "Symbolic lattice changed.");
        self.propagate_from_input(Origin::Symbolic, false);
    }

    #[instrument(skip_all, name = "lattice_sync.explicit")]
    pub fn on_explicit_changed(&self, event: &ExplicitEvent) {
        if self.suppress() {
            return;
        }
        let bravais = self.symbolic.bravais();
        match (event, bravais) {
            (ExplicitEvent::UnitChanged { previous, current }, Ok(Bravais::Free)) => {
                self.on_free_unit_changed(*previous, *current);
            }
            (ExplicitEvent::UnitChanged { .. }, _) => self.restore_display(Origin::Explicit),
            (_, Ok(Bravais::Free)) => {
                self.propagate_from_input(Origin::Explicit, false);
            }
            (_, Ok(bravais)) => {
                self.stats.rejected();
                debug!(%bravais, "Explicit vectors are derived; discarding edit.");
                self.restore_display(Origin::Explicit);
            }
            (_, Err(error)) => {
                self.stats.rejected();
                debug!(%error, "Explicit edit without a usable lattice code.");
            }
        }
    }

    #[instrument(skip_all, name = "lattice_sync.structure")]
    pub fn on_structure_changed(&self, event: &StructureEvent) {
        let StructureEvent::LatticeMoved { policy, .. } = event else {
            return;
        };
        if self.suppress() {
            return;
        }
        let Some(matrix) = self.structure.copy_lattice() else {
            return;
        };
        let Some(_guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        self.stats.propagated();
        let alat = self.write_back(&matrix);
        self.last_alat.set(Some(alat));
        self.atoms.on_lattice_changed(*policy);
        info!(alat, "Structural lattice written back to the input.");
    }

    /// Pushes the lattice described by the input into the structure even when it
    /// has not changed. Returns `false` when the input does not resolve.
    pub fn resync_from_input(&self) -> bool {
        self.propagate_from_input(Origin::Lattice, true)
    }

    fn suppress(&self) -> bool {
        if self.lock.is_held() {
            self.stats.suppressed();
            trace!(state = ?self.lock.state(), "Re-entrant notification suppressed.");
            return true;
        }
        false
    }

    fn propagate_from_input(&self, origin: Origin, force: bool) -> bool {
        let resolved = match resolve_lattice(&self.symbolic, &self.explicit) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.stats.rejected();
                debug!(%origin, %error, "Lattice does not resolve; keeping last valid state.");
                return false;
            }
        };
        if !force && !self.differs_from_structure(&resolved) {
            trace!(%origin, "Lattice unchanged.");
            return false;
        }
        let Some(_guard) = self.lock.try_acquire(origin) else {
            return false;
        };
        self.stats.propagated();
        let policy = self.config.lattice_edit_policy;
        self.structure.move_lattice(resolved.matrix, policy);
        if !resolved.bravais.is_free() {
            self.write_display(&resolved.matrix, resolved.alat);
        }
        self.last_alat.set(Some(resolved.alat));
        self.atoms.on_lattice_changed(policy);
        info!(%origin, bravais = %resolved.bravais, alat = resolved.alat, "Lattice propagated.");
        true
    }

    fn differs_from_structure(&self, resolved: &ResolvedLattice) -> bool {
        let tolerance = self.config.matrix_tolerance;
        let same_matrix = self
            .structure
            .copy_lattice()
            .is_some_and(|current| matrices_close(&current, &resolved.matrix, tolerance));
        let same_alat = self
            .last_alat
            .get()
            .is_some_and(|alat| (alat - resolved.alat).abs() <= tolerance);
        !(same_matrix && same_alat)
    }

    /// Rewrites the explicit vectors from the current lattice in the current unit.
    fn restore_display(&self, origin: Origin) {
        let Ok(resolved) = resolve_lattice(&self.symbolic, &self.explicit) else {
            return;
        };
        let Some(_guard) = self.lock.try_acquire(origin) else {
            return;
        };
        self.write_display(&resolved.matrix, resolved.alat);
    }

    fn write_display(&self, matrix: &Matrix3<f64>, alat: f64) {
        match ExplicitLattice::from_matrix(matrix, self.explicit.unit(), Some(alat)) {
            Ok(lattice) => self.explicit.assign(lattice),
            Err(error) => debug!(%error, "Cannot express lattice vectors in the current unit."),
        }
    }

    fn on_free_unit_changed(&self, previous: LengthUnit, current: LengthUnit) {
        let Some(vectors) = self.explicit.vectors() else {
            debug!(%current, "Unit changed on an empty explicit lattice.");
            return;
        };
        let alat = self.symbolic.lattice_params(Bravais::Free).a;
        let Ok(matrix) = ExplicitLattice::new(vectors, previous).to_matrix(alat) else {
            debug!(%previous, "Previous vectors had no physical length; accepting unit.");
            self.propagate_from_input(Origin::Explicit, false);
            return;
        };
        let change = UnitChange::Length {
            from: previous,
            to: current,
        };
        if !self.confirmation.confirm(&change) {
            info!(%previous, %current, "Unit change declined; reverting.");
            self.revert_unit(previous);
            return;
        }
        match ExplicitLattice::from_matrix(&matrix, current, alat) {
            Ok(rescaled) => {
                if let Some(_guard) = self.lock.try_acquire(Origin::Explicit) {
                    self.explicit.assign(rescaled);
                    debug!(%current, "Explicit vectors rescaled to the new unit.");
                }
            }
            Err(error) => {
                warn!(%error, %current, "Cannot rescale vectors; reverting unit.");
                self.stats.rejected();
                self.revert_unit(previous);
            }
        }
    }

    fn revert_unit(&self, previous: LengthUnit) {
        if let Some(_guard) = self.lock.try_acquire(Origin::Explicit) {
            self.explicit.set_unit(previous);
        }
    }

    /// Writes a structural lattice into both descriptions and returns the new `alat`.
    fn write_back(&self, matrix: &Matrix3<f64>) -> f64 {
        let first_length = matrix.row(0).norm();
        let form = self
            .symbolic
            .parameter_form()
            .unwrap_or(self.config.parameter_form);
        let alat = match self.symbolic.bravais() {
            Ok(Bravais::Free) => match self.symbolic.lattice_params(Bravais::Free).a {
                Some(alat) if alat > 0.0 => alat,
                _ => self.switch_to_free(None, first_length, form),
            },
            Ok(bravais) => match self.reproduce(bravais, matrix) {
                Some(params) => {
                    self.symbolic.write_params(bravais, &params, form);
                    params.a.unwrap_or(first_length)
                }
                None => self.switch_to_free(Some(bravais), first_length, form),
            },
            Err(_) => self.switch_to_free(None, first_length, form),
        };
        self.write_display(matrix, alat);
        alat
    }

    /// The parameters of `bravais` when its canonical form reproduces `matrix`.
    fn reproduce(&self, bravais: Bravais, matrix: &Matrix3<f64>) -> Option<LatticeParams> {
        let params = extract_params(bravais, matrix);
        let rebuilt = build_matrix(bravais, &params, None).ok()?;
        matrices_close(&rebuilt, matrix, self.config.matrix_tolerance).then_some(params)
    }

    fn switch_to_free(&self, previous: Option<Bravais>, alat: f64, form: ParameterForm) -> f64 {
        if let Some(previous) = previous {
            info!(
                %previous,
                "Structural lattice breaks the lattice symmetry; switching to ibrav=0."
            );
        }
        let params = LatticeParams::new().with(Param::A, alat);
        self.symbolic.write_params(Bravais::Free, &params, form);
        alat
    }
}
