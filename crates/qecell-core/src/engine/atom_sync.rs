use super::config::SyncConfig;
use super::confirm::{Confirmation, UnitChange};
use super::feedback::{Feedback, FeedbackReporter};
use super::guard::{Origin, StatsCell, SyncLock, SyncState, SyncStats};
use super::origin::{Link, OriginTable, Pending};
use super::resolve::resolve_basis;
use crate::core::lattice::basis::Basis;
use crate::core::lattice::units::AtomicUnit;
use crate::core::models::atom::Atom;
use crate::core::models::card::{AtomicPositionsCard, CardAtom, CardEvent, format_coords};
use crate::core::models::explicit::ExplicitLatticeModel;
use crate::core::models::ids::{AtomId, OriginIndex};
use crate::core::models::structure::{AtomPolicy, StructuralModel, StructureEvent};
use crate::core::models::symbolic::SymbolicLatticeModel;
use nalgebra::{Point3, Vector3};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, instrument, trace, warn};

const PLACEHOLDER: &str = "0";

/// Which side of the atom binding a full rebuild overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// The structural atoms are rebuilt from the card.
    CardToStructure,
    /// The card is rebuilt from the structural atoms.
    StructureToCard,
}

/// Mediator between the atomic-positions card and the structural atom list.
///
/// Card entry `i` and the structural atom tied to origin `i` describe the same
/// atom; the [`OriginTable`] keeps that pairing dense as entries come and go.
/// Coordinates move through the [`Basis`] of the lattice currently described by the
/// input models. When that basis cannot convert an entry, the conversion is
/// deferred and retried after the next lattice change.
///
/// Feedback is reported once the synchronizer has released its guard, so a
/// feedback callback may edit the card and have that edit synchronized.
pub struct AtomicPositionSynchronizer {
    symbolic: Rc<SymbolicLatticeModel>,
    explicit: Rc<ExplicitLatticeModel>,
    card: Rc<AtomicPositionsCard>,
    structure: Rc<StructuralModel>,
    confirmation: Rc<dyn Confirmation>,
    feedback: FeedbackReporter,
    outbox: RefCell<Vec<Feedback>>,
    config: SyncConfig,
    lock: SyncLock,
    stats: StatsCell,
    origins: RefCell<OriginTable>,
}

impl AtomicPositionSynchronizer {
    pub fn new(
        symbolic: Rc<SymbolicLatticeModel>,
        explicit: Rc<ExplicitLatticeModel>,
        card: Rc<AtomicPositionsCard>,
        structure: Rc<StructuralModel>,
        confirmation: Rc<dyn Confirmation>,
        feedback: FeedbackReporter,
        config: SyncConfig,
    ) -> Self {
        Self {
            symbolic,
            explicit,
            card,
            structure,
            confirmation,
            feedback,
            outbox: RefCell::new(Vec::new()),
            config,
            lock: SyncLock::new(),
            stats: StatsCell::default(),
            origins: RefCell::new(OriginTable::new()),
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.get()
    }

    pub fn state(&self) -> SyncState {
        self.lock.state()
    }

    /// The structural atom tied to card entry `origin`.
    pub fn atom_at(&self, origin: OriginIndex) -> Option<AtomId> {
        self.origins.borrow().atom(origin)
    }

    /// The card entry tied to structural atom `id`.
    pub fn origin_of(&self, id: AtomId) -> Option<OriginIndex> {
        self.origins.borrow().origin(id)
    }

    /// Whether card entry `origin` is waiting for a basis to convert its coordinates.
    pub fn is_deferred(&self, origin: OriginIndex) -> bool {
        self.origins
            .borrow()
            .get(origin)
            .is_some_and(|link| link.pending != Pending::None)
    }

    /// Whether card entry `origin` currently holds text that does not evaluate.
    pub fn is_invalid(&self, origin: OriginIndex) -> bool {
        self.origins
            .borrow()
            .get(origin)
            .is_some_and(|link| link.invalid)
    }

    #[instrument(skip_all, name = "atom_sync.card")]
    pub fn on_card_changed(&self, event: &CardEvent) {
        if self.suppress() {
            return;
        }
        match event {
            CardEvent::Changed { index, coords } => self.on_card_atom_changed(*index, *coords),
            CardEvent::Added(index) => self.on_card_atom_added(*index),
            CardEvent::Removed(index) => self.on_card_atom_removed(*index),
            CardEvent::Cleared => self.on_card_atoms_cleared(),
            CardEvent::UnitChanged { previous, current } => {
                self.on_card_unit_changed(*previous, *current)
            }
            CardEvent::Bulk => self.action_for_all_atoms(SyncDirection::CardToStructure),
        }
    }

    #[instrument(skip_all, name = "atom_sync.structure")]
    pub fn on_structure_changed(&self, event: &StructureEvent) {
        // Lattice moves arrive through `on_lattice_changed` once the input is updated.
        if matches!(event, StructureEvent::LatticeMoved { .. }) || self.suppress() {
            return;
        }
        match event {
            StructureEvent::AtomMoved(id) => self.on_atom_moved(*id),
            StructureEvent::AtomRenamed(id) => self.on_atom_renamed(*id),
            StructureEvent::AtomFixedChanged(id) => self.on_atom_fixed_changed(*id),
            StructureEvent::AtomAdded { id, index } => self.on_atom_added(*id, *index),
            StructureEvent::AtomRemoved { id, .. } => self.on_atom_removed(*id),
            StructureEvent::AtomsCleared => self.on_atoms_cleared(),
            StructureEvent::LatticeMoved { .. } => {}
        }
    }

    /// Applies an edited card entry to its structural atom. The coordinate text is
    /// only evaluated when `coords` says it changed, so relabeling an entry never
    /// moves its atom.
    pub fn on_card_atom_changed(&self, index: usize, coords: bool) {
        let Some(entry) = self.card.get(index) else {
            return;
        };
        let origin = OriginIndex(index);
        let Some(id) = self.atom_at(origin) else {
            warn!(%origin, "Card entry has no structural atom; rebuilding.");
            self.action_for_all_atoms(SyncDirection::CardToStructure);
            return;
        };
        let Some(guard) = self.lock.try_acquire(Origin::Card) else {
            return;
        };
        self.stats.propagated();
        self.structure.set_name(id, &entry.label);
        self.structure.set_mobility(id, entry.mobility);
        if coords {
            self.apply_entry(origin, id, &entry, &self.basis());
        }
        drop(guard);
        self.flush_feedback();
    }

    pub fn on_card_atom_added(&self, index: usize) {
        let Some(entry) = self.card.get(index) else {
            return;
        };
        let Some(guard) = self.lock.try_acquire(Origin::Card) else {
            return;
        };
        self.stats.propagated();
        let atom = Atom::new(&entry.label, Point3::origin()).with_mobility(entry.mobility);
        let id = self.structure.insert_atom(index, atom);
        let origin = self
            .origins
            .borrow_mut()
            .insert(OriginIndex(index), Link::new(id));
        self.apply_entry(origin, id, &entry, &self.basis());
        debug!(%origin, label = %entry.label, "Atom added from card.");
        drop(guard);
        self.flush_feedback();
    }

    pub fn on_card_atom_removed(&self, index: usize) {
        let Some(_guard) = self.lock.try_acquire(Origin::Card) else {
            return;
        };
        let link = self.origins.borrow_mut().remove(OriginIndex(index));
        if let Some(link) = link {
            self.stats.propagated();
            self.structure.remove_atom(link.atom);
            debug!(origin = index, "Atom removed from card.");
        }
    }

    pub fn on_card_atoms_cleared(&self) {
        let Some(_guard) = self.lock.try_acquire(Origin::Card) else {
            return;
        };
        self.stats.propagated();
        self.origins.borrow_mut().clear();
        self.structure.clear_atoms();
    }

    fn on_card_unit_changed(&self, previous: AtomicUnit, current: AtomicUnit) {
        if self.card.is_empty() {
            debug!(%current, "Unit changed on an empty card.");
            return;
        }
        let basis = self.basis();
        if !basis.supports(current) {
            warn!(%current, "No lattice to express positions in this unit; reverting.");
            self.stats.rejected();
            self.revert_card_unit(previous);
            return;
        }
        let change = UnitChange::Atomic {
            from: previous,
            to: current,
        };
        if !self.confirmation.confirm(&change) {
            info!(%previous, %current, "Unit change declined; reverting.");
            self.revert_card_unit(previous);
            return;
        }
        let Some(guard) = self.lock.try_acquire(Origin::Card) else {
            return;
        };
        self.stats.propagated();
        for (origin, link) in self.links() {
            if link.invalid {
                continue;
            }
            if link.pending == Pending::ToStructure {
                self.apply_deferred_text(origin, link.atom, &basis, previous);
                if self.is_deferred(origin) {
                    continue;
                }
            }
            self.write_entry(origin, link.atom, &basis, current);
        }
        info!(%previous, %current, "Card re-expressed in the new unit.");
        drop(guard);
        self.flush_feedback();
    }

    fn revert_card_unit(&self, previous: AtomicUnit) {
        if let Some(_guard) = self.lock.try_acquire(Origin::Card) {
            self.card.set_unit(previous);
        }
    }

    pub fn on_atom_moved(&self, id: AtomId) {
        let Some(origin) = self.origin_of(id) else {
            return;
        };
        let Some(guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        self.stats.propagated();
        self.write_entry(origin, id, &self.basis(), self.card.unit());
        drop(guard);
        self.flush_feedback();
    }

    pub fn on_atom_renamed(&self, id: AtomId) {
        let (Some(origin), Some(atom)) = (self.origin_of(id), self.structure.atom(id)) else {
            return;
        };
        let Some(_guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        self.stats.propagated();
        self.card.set_label(origin.index(), &atom.name);
    }

    pub fn on_atom_fixed_changed(&self, id: AtomId) {
        let (Some(origin), Some(atom)) = (self.origin_of(id), self.structure.atom(id)) else {
            return;
        };
        let Some(_guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        self.stats.propagated();
        self.card.set_mobility(origin.index(), atom.mobility);
    }

    /// Inserts a card entry for structural atom `id`, added at list position `index`.
    pub fn on_atom_added(&self, id: AtomId, index: usize) {
        let Some(atom) = self.structure.atom(id) else {
            return;
        };
        let index = index.min(self.card.len());
        let Some(_guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        self.stats.propagated();
        let (entry, pending) = self.entry_for(&atom, &self.basis(), self.card.unit());
        self.card.insert(index, entry);
        let mut link = Link::new(id);
        link.pending = pending;
        self.origins.borrow_mut().insert(OriginIndex(index), link);
        debug!(origin = index, label = %atom.name, "Card entry added from structure.");
    }

    pub fn on_atom_removed(&self, id: AtomId) {
        let Some(_guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        let origin = self.origins.borrow_mut().remove_atom(id);
        if let Some(origin) = origin {
            self.stats.propagated();
            self.card.remove(origin.index());
        }
    }

    pub fn on_atoms_cleared(&self) {
        let Some(_guard) = self.lock.try_acquire(Origin::Structure) else {
            return;
        };
        self.stats.propagated();
        self.origins.borrow_mut().clear();
        self.card.clear();
    }

    /// Rebuilds one side of the binding from the other and resets the origin table.
    #[instrument(skip_all, name = "atom_sync.rebuild", fields(direction = ?direction))]
    pub fn action_for_all_atoms(&self, direction: SyncDirection) {
        let origin = match direction {
            SyncDirection::CardToStructure => Origin::Card,
            SyncDirection::StructureToCard => Origin::Structure,
        };
        let Some(guard) = self.lock.try_acquire(origin) else {
            self.stats.suppressed();
            return;
        };
        self.stats.propagated();
        self.origins.borrow_mut().clear();
        let basis = self.basis();
        match direction {
            SyncDirection::CardToStructure => {
                self.structure.clear_atoms();
                for (index, entry) in self.card.atoms().into_iter().enumerate() {
                    let atom =
                        Atom::new(&entry.label, Point3::origin()).with_mobility(entry.mobility);
                    let id = self.structure.add_atom(atom);
                    let origin = self.origins.borrow_mut().push(Link::new(id));
                    debug_assert_eq!(origin.index(), index);
                    self.apply_entry(origin, id, &entry, &basis);
                }
            }
            SyncDirection::StructureToCard => {
                let unit = self.card.unit();
                let mut entries = Vec::with_capacity(self.structure.len());
                let mut links = Vec::with_capacity(self.structure.len());
                for (id, atom) in self.structure.list_atoms() {
                    let (entry, pending) = self.entry_for(&atom, &basis, unit);
                    let mut link = Link::new(id);
                    link.pending = pending;
                    entries.push(entry);
                    links.push(link);
                }
                self.card.replace_all(unit, entries);
                let mut origins = self.origins.borrow_mut();
                for link in links {
                    origins.push(link);
                }
            }
        }
        info!(atoms = self.structure.len(), "Atom binding rebuilt.");
        drop(guard);
        self.flush_feedback();
    }

    /// Re-expresses card entries after the lattice changed.
    ///
    /// Deferred entries are converted first, in the new basis. The remaining entries
    /// are rewritten from the structural positions unless `policy` already kept
    /// their written value meaningful.
    #[instrument(skip_all, name = "atom_sync.lattice", fields(policy = ?policy))]
    pub fn on_lattice_changed(&self, policy: AtomPolicy) {
        let Some(guard) = self.lock.try_acquire(Origin::Lattice) else {
            self.stats.suppressed();
            return;
        };
        let basis = self.basis();
        let unit = self.card.unit();
        let links = self.links();
        for (origin, link) in links.iter().filter(|(_, link)| !link.invalid) {
            match link.pending {
                Pending::ToStructure => self.apply_deferred_text(*origin, link.atom, &basis, unit),
                Pending::ToCard => self.write_entry(*origin, link.atom, &basis, unit),
                Pending::None => {}
            }
        }
        if keeps_written_value(policy, unit) {
            trace!(%unit, "Card entries keep their written values.");
        } else {
            for (origin, link) in links.iter() {
                if link.invalid || link.pending != Pending::None {
                    continue;
                }
                self.write_entry(*origin, link.atom, &basis, unit);
            }
            debug!(entries = links.len(), %unit, "Card re-expressed in the new lattice.");
        }
        drop(guard);
        self.flush_feedback();
    }

    fn suppress(&self) -> bool {
        if self.lock.is_held() {
            self.stats.suppressed();
            trace!(state = ?self.lock.state(), "Re-entrant notification suppressed.");
            return true;
        }
        false
    }

    /// Reports queued feedback unless a propagation is still in progress.
    fn flush_feedback(&self) {
        if self.lock.is_held() {
            return;
        }
        let queued = std::mem::take(&mut *self.outbox.borrow_mut());
        for feedback in queued {
            self.feedback.report(feedback);
        }
    }

    fn basis(&self) -> Basis {
        resolve_basis(&self.symbolic, &self.explicit)
    }

    fn links(&self) -> Vec<(OriginIndex, Link)> {
        self.origins
            .borrow()
            .iter()
            .map(|(origin, link)| (origin, *link))
            .collect()
    }

    /// Applies a card entry's coordinate text to its structural atom.
    fn apply_entry(&self, origin: OriginIndex, id: AtomId, entry: &CardAtom, basis: &Basis) {
        let values = match entry.values() {
            Ok(values) => values,
            Err((axis, error)) => {
                self.origins.borrow_mut().set_invalid(origin, true);
                self.stats.rejected();
                debug!(%origin, %axis, %error, "Coordinate text does not evaluate.");
                self.outbox.borrow_mut().push(Feedback::InvalidInput {
                    index: origin.index(),
                    axis,
                    text: entry.coords[axis.index()].clone(),
                    error,
                });
                return;
            }
        };
        let was_invalid = self.origins.borrow_mut().set_invalid(origin, false);
        if was_invalid {
            self.outbox.borrow_mut().push(Feedback::InputAccepted {
                index: origin.index(),
            });
        }
        self.place_atom(origin, id, &values, basis, self.card.unit());
    }

    /// Retries a deferred card-to-structure conversion from the entry's current text.
    fn apply_deferred_text(
        &self,
        origin: OriginIndex,
        id: AtomId,
        basis: &Basis,
        unit: AtomicUnit,
    ) {
        let Some(Ok(values)) = self.card.get(origin.index()).map(|entry| entry.values()) else {
            return;
        };
        self.place_atom(origin, id, &values, basis, unit);
    }

    fn place_atom(
        &self,
        origin: OriginIndex,
        id: AtomId,
        values: &Vector3<f64>,
        basis: &Basis,
        unit: AtomicUnit,
    ) {
        match basis.to_cartesian(values, unit) {
            Some(position) => {
                self.structure.set_position(id, position);
                self.origins.borrow_mut().set_pending(origin, Pending::None);
            }
            None => {
                self.origins
                    .borrow_mut()
                    .set_pending(origin, Pending::ToStructure);
                debug!(%origin, %unit, "No basis for this unit yet; conversion deferred.");
            }
        }
    }

    /// Rewrites card entry `origin` from the structural position of `id`.
    ///
    /// The entry text is kept when it already evaluates to the same value at the
    /// configured precision, so hand-written expressions survive no-op updates.
    fn write_entry(&self, origin: OriginIndex, id: AtomId, basis: &Basis, unit: AtomicUnit) {
        let Some(position) = self.structure.position(id) else {
            return;
        };
        let Some(values) = basis.from_cartesian(&position, unit) else {
            self.origins.borrow_mut().set_pending(origin, Pending::ToCard);
            return;
        };
        let resolution = 0.5 * 10f64.powi(-(self.config.coordinate_precision as i32));
        let unchanged = self
            .card
            .get(origin.index())
            .and_then(|entry| entry.values().ok())
            .is_some_and(|current| (current - values).amax() < resolution);
        if !unchanged {
            let coords = format_coords(&values, self.config.coordinate_precision);
            self.card.set_coords(origin.index(), coords);
        }
        let was_invalid = {
            let mut origins = self.origins.borrow_mut();
            origins.set_pending(origin, Pending::None);
            origins.set_invalid(origin, false)
        };
        if was_invalid {
            self.outbox.borrow_mut().push(Feedback::InputAccepted {
                index: origin.index(),
            });
        }
    }

    /// A card entry describing `atom`, or a placeholder when the basis cannot express it.
    fn entry_for(&self, atom: &Atom, basis: &Basis, unit: AtomicUnit) -> (CardAtom, Pending) {
        match basis.from_cartesian(&atom.position, unit) {
            Some(values) => (
                CardAtom::from_values(&atom.name, &values, self.config.coordinate_precision)
                    .with_mobility(atom.mobility),
                Pending::None,
            ),
            None => (
                CardAtom::new(&atom.name, [PLACEHOLDER; 3]).with_mobility(atom.mobility),
                Pending::ToCard,
            ),
        }
    }
}

/// Whether entries written in `unit` still mean the right position after the atoms
/// moved according to `policy`.
fn keeps_written_value(policy: AtomPolicy, unit: AtomicUnit) -> bool {
    match policy {
        AtomPolicy::KeepCartesian => !unit.is_lattice_dependent(),
        AtomPolicy::KeepFractional => unit == AtomicUnit::Crystal,
        AtomPolicy::Comoving => false,
    }
}
