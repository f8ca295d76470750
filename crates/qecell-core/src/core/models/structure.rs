use super::atom::{Atom, Mobility};
use super::ids::AtomId;
use super::listeners::{Listeners, Observable};
use crate::core::lattice::geometry::{CellMetrics, cell_metrics};
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

const DEGENERATE_VOLUME: f64 = 1e-12;

/// How atoms respond when the lattice of a structural model is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomPolicy {
    /// Atoms follow the isotropic part of the deformation: Cartesian positions are
    /// scaled by the cube root of the volume ratio.
    Comoving,
    /// Atoms keep their fractional coordinates and follow the full deformation.
    KeepFractional,
    /// Atoms stay where they are in Cartesian space.
    #[default]
    KeepCartesian,
}

/// Change notifications published by a [`StructuralModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum StructureEvent {
    LatticeMoved {
        previous: Option<Matrix3<f64>>,
        policy: AtomPolicy,
    },
    /// An atom was inserted at list position `index`.
    AtomAdded {
        id: AtomId,
        index: usize,
    },
    AtomRemoved {
        id: AtomId,
        atom: Atom,
    },
    AtomMoved(AtomId),
    AtomRenamed(AtomId),
    AtomFixedChanged(AtomId),
    AtomsCleared,
}

/// The in-memory cell: an Angstrom lattice matrix and an ordered set of atoms.
///
/// Atoms live in an arena addressed by [`AtomId`]; ids stay valid across insertions
/// and removals of other atoms. All mutators take `&self` and notify listeners after
/// the internal state has been updated and released, so listeners may read the
/// model (or mutate it again) from inside a notification.
#[derive(Debug, Default)]
pub struct StructuralModel {
    lattice: Cell<Option<Matrix3<f64>>>,
    atoms: RefCell<SlotMap<AtomId, Atom>>,
    order: RefCell<Vec<AtomId>>,
    listeners: Listeners<StructureEvent>,
}

impl StructuralModel {
    /// Creates an empty model without a lattice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty model with the given Angstrom lattice (rows are vectors).
    pub fn with_lattice(lattice: Matrix3<f64>) -> Self {
        let model = Self::new();
        model.lattice.set(Some(lattice));
        model
    }

    /// Returns a copy of the lattice matrix, if one has been set.
    pub fn copy_lattice(&self) -> Option<Matrix3<f64>> {
        self.lattice.get()
    }

    /// Replaces the lattice matrix and moves the atoms according to `policy`.
    ///
    /// When there was no previous lattice, or the previous lattice is degenerate,
    /// atoms keep their Cartesian positions regardless of the policy.
    pub fn move_lattice(&self, lattice: Matrix3<f64>, policy: AtomPolicy) {
        let previous = self.lattice.replace(Some(lattice));
        if let Some(transform) = previous.and_then(|old| atom_transform(&old, &lattice, policy)) {
            for atom in self.atoms.borrow_mut().values_mut() {
                atom.position = Point3::from(transform * atom.position.coords);
            }
        }
        self.listeners
            .notify(&StructureEvent::LatticeMoved { previous, policy });
    }

    pub fn len(&self) -> usize {
        self.order.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of all atoms in list order.
    pub fn list_atoms(&self) -> Vec<(AtomId, Atom)> {
        let atoms = self.atoms.borrow();
        self.order
            .borrow()
            .iter()
            .filter_map(|&id| atoms.get(id).map(|atom| (id, atom.clone())))
            .collect()
    }

    pub fn atom_ids(&self) -> Vec<AtomId> {
        self.order.borrow().clone()
    }

    pub fn atom(&self, id: AtomId) -> Option<Atom> {
        self.atoms.borrow().get(id).cloned()
    }

    pub fn position(&self, id: AtomId) -> Option<Point3<f64>> {
        self.atoms.borrow().get(id).map(|atom| atom.position)
    }

    /// Appends an atom and returns its id.
    pub fn add_atom(&self, atom: Atom) -> AtomId {
        let index = self.len();
        self.insert_atom(index, atom)
    }

    /// Inserts an atom at list position `index` (clamped to the list length).
    pub fn insert_atom(&self, index: usize, atom: Atom) -> AtomId {
        let id = self.atoms.borrow_mut().insert(atom);
        let index = {
            let mut order = self.order.borrow_mut();
            let index = index.min(order.len());
            order.insert(index, id);
            index
        };
        self.listeners.notify(&StructureEvent::AtomAdded { id, index });
        id
    }

    /// Removes an atom, returning it if it existed.
    pub fn remove_atom(&self, id: AtomId) -> Option<Atom> {
        let atom = self.atoms.borrow_mut().remove(id)?;
        self.order.borrow_mut().retain(|&other| other != id);
        self.listeners.notify(&StructureEvent::AtomRemoved {
            id,
            atom: atom.clone(),
        });
        Some(atom)
    }

    /// Moves an atom. Returns `false` when the atom does not exist; notifies only
    /// when the position actually changed.
    pub fn set_position(&self, id: AtomId, position: Point3<f64>) -> bool {
        self.update(id, StructureEvent::AtomMoved(id), |atom| {
            std::mem::replace(&mut atom.position, position) != position
        })
    }

    pub fn set_name(&self, id: AtomId, name: &str) -> bool {
        self.update(id, StructureEvent::AtomRenamed(id), |atom| {
            if atom.name == name {
                return false;
            }
            atom.name = name.to_string();
            true
        })
    }

    pub fn set_mobility(&self, id: AtomId, mobility: Mobility) -> bool {
        self.update(id, StructureEvent::AtomFixedChanged(id), |atom| {
            std::mem::replace(&mut atom.mobility, mobility) != mobility
        })
    }

    pub fn clear_atoms(&self) {
        self.atoms.borrow_mut().clear();
        self.order.borrow_mut().clear();
        self.listeners.notify(&StructureEvent::AtomsCleared);
    }

    /// Chemical formula in Hill order (carbon, hydrogen, then alphabetical; purely
    /// alphabetical without carbon). Atoms whose label names no element are skipped.
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for atom in self.atoms.borrow().values() {
            if let Some(element) = atom.element() {
                *counts.entry(element).or_default() += 1;
            }
        }
        let mut ordered: Vec<(&str, usize)> = Vec::with_capacity(counts.len());
        if counts.contains_key("C") {
            for leading in ["C", "H"] {
                if let Some(count) = counts.remove(leading) {
                    ordered.push((leading, count));
                }
            }
        }
        ordered.extend(counts);
        ordered
            .into_iter()
            .map(|(element, count)| match count {
                1 => element.to_string(),
                n => format!("{element}{n}"),
            })
            .collect()
    }

    pub fn cell_metrics(&self) -> Option<CellMetrics> {
        self.copy_lattice().map(|lattice| cell_metrics(&lattice))
    }

    fn update(
        &self,
        id: AtomId,
        event: StructureEvent,
        apply: impl FnOnce(&mut Atom) -> bool,
    ) -> bool {
        let changed = match self.atoms.borrow_mut().get_mut(id) {
            Some(atom) => apply(atom),
            None => return false,
        };
        if changed {
            self.listeners.notify(&event);
        }
        true
    }
}

impl Observable for StructuralModel {
    type Event = StructureEvent;

    fn listeners(&self) -> &Listeners<StructureEvent> {
        &self.listeners
    }
}

/// The linear map applied to Cartesian atom positions when the lattice changes.
fn atom_transform(
    previous: &Matrix3<f64>,
    lattice: &Matrix3<f64>,
    policy: AtomPolicy,
) -> Option<Matrix3<f64>> {
    match policy {
        AtomPolicy::KeepCartesian => None,
        AtomPolicy::KeepFractional => previous
            .transpose()
            .try_inverse()
            .map(|inverse| lattice.transpose() * inverse),
        AtomPolicy::Comoving => {
            let old = previous.determinant().abs();
            let new = lattice.determinant().abs();
            (old > DEGENERATE_VOLUME).then(|| Matrix3::identity() * (new / old).cbrt())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Axis;
    use std::rc::Rc;

    fn recorder(model: &StructuralModel) -> Rc<RefCell<Vec<StructureEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |event: &StructureEvent| sink.borrow_mut().push(event.clone()));
        events
    }

    mod atoms {
        use super::*;

        #[test]
        fn atoms_are_listed_in_insertion_order() {
            let model = StructuralModel::new();
            let a = model.add_atom(Atom::new("Si", Point3::origin()));
            let c = model.add_atom(Atom::new("O", Point3::new(1.0, 0.0, 0.0)));
            let b = model.insert_atom(1, Atom::new("Si", Point3::new(0.5, 0.0, 0.0)));
            let ids: Vec<AtomId> = model.list_atoms().into_iter().map(|(id, _)| id).collect();
            assert_eq!(ids, vec![a, b, c]);
        }

        #[test]
        fn added_atoms_report_their_list_position() {
            let model = StructuralModel::new();
            let events = recorder(&model);
            let a = model.add_atom(Atom::new("Si", Point3::origin()));
            let b = model.insert_atom(0, Atom::new("O", Point3::origin()));
            let c = model.insert_atom(9, Atom::new("H", Point3::origin()));
            assert_eq!(
                *events.borrow(),
                vec![
                    StructureEvent::AtomAdded { id: a, index: 0 },
                    StructureEvent::AtomAdded { id: b, index: 0 },
                    StructureEvent::AtomAdded { id: c, index: 2 },
                ]
            );
        }

        #[test]
        fn removal_keeps_other_ids_valid() {
            let model = StructuralModel::new();
            let a = model.add_atom(Atom::new("Si", Point3::origin()));
            let b = model.add_atom(Atom::new("O", Point3::new(1.0, 0.0, 0.0)));
            let removed = model.remove_atom(a).unwrap();
            assert_eq!(removed.name, "Si");
            assert_eq!(model.atom(b).unwrap().name, "O");
            assert!(model.atom(a).is_none());
            assert!(model.remove_atom(a).is_none());
            assert_eq!(model.len(), 1);
        }

        #[test]
        fn mutators_notify_only_on_change() {
            let model = StructuralModel::new();
            let id = model.add_atom(Atom::new("Si", Point3::origin()));
            let events = recorder(&model);

            assert!(model.set_position(id, Point3::origin()));
            assert!(model.set_name(id, "Si"));
            assert!(events.borrow().is_empty());

            model.set_position(id, Point3::new(0.1, 0.0, 0.0));
            model.set_name(id, "Ge");
            model.set_mobility(id, Mobility::FREE.with(Axis::X, false));
            assert_eq!(
                *events.borrow(),
                vec![
                    StructureEvent::AtomMoved(id),
                    StructureEvent::AtomRenamed(id),
                    StructureEvent::AtomFixedChanged(id),
                ]
            );
        }

        #[test]
        fn mutators_on_unknown_atoms_return_false() {
            let model = StructuralModel::new();
            let id = model.add_atom(Atom::new("Si", Point3::origin()));
            model.remove_atom(id);
            assert!(!model.set_position(id, Point3::new(1.0, 1.0, 1.0)));
            assert!(!model.set_name(id, "O"));
        }

        #[test]
        fn clear_removes_everything_and_notifies_once() {
            let model = StructuralModel::new();
            model.add_atom(Atom::new("Si", Point3::origin()));
            model.add_atom(Atom::new("Si", Point3::origin()));
            let events = recorder(&model);
            model.clear_atoms();
            assert!(model.is_empty());
            assert_eq!(*events.borrow(), vec![StructureEvent::AtomsCleared]);
        }

        #[test]
        fn listener_can_read_the_model_during_notification() {
            let model = Rc::new(StructuralModel::new());
            let seen = Rc::new(Cell::new(0));
            let (weak, s) = (Rc::downgrade(&model), seen.clone());
            model.subscribe(move |_| {
                if let Some(model) = weak.upgrade() {
                    s.set(model.len());
                }
            });
            model.add_atom(Atom::new("Si", Point3::origin()));
            assert_eq!(seen.get(), 1);
        }
    }

    mod lattice {
        use super::*;

        fn cubic(a: f64) -> Matrix3<f64> {
            Matrix3::identity() * a
        }

        fn model_with_atom() -> (StructuralModel, AtomId) {
            let model = StructuralModel::with_lattice(cubic(2.0));
            let id = model.add_atom(Atom::new("Si", Point3::new(0.5, 1.0, 1.5)));
            (model, id)
        }

        #[test]
        fn keep_cartesian_leaves_positions_untouched() {
            let (model, id) = model_with_atom();
            model.move_lattice(cubic(4.0), AtomPolicy::KeepCartesian);
            assert_eq!(model.position(id), Some(Point3::new(0.5, 1.0, 1.5)));
        }

        #[test]
        fn keep_fractional_follows_the_deformation() {
            let (model, id) = model_with_atom();
            let stretched = Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 6.0);
            model.move_lattice(stretched, AtomPolicy::KeepFractional);
            let p = model.position(id).unwrap();
            assert!((p - Point3::new(0.5, 1.0, 4.5)).norm() < 1e-12);
        }

        #[test]
        fn comoving_scales_isotropically_with_volume() {
            let (model, id) = model_with_atom();
            model.move_lattice(cubic(4.0), AtomPolicy::Comoving);
            let p = model.position(id).unwrap();
            assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        }

        #[test]
        fn first_lattice_keeps_cartesian_positions_for_every_policy() {
            let model = StructuralModel::new();
            let id = model.add_atom(Atom::new("Si", Point3::new(1.0, 1.0, 1.0)));
            model.move_lattice(cubic(3.0), AtomPolicy::KeepFractional);
            assert_eq!(model.position(id), Some(Point3::new(1.0, 1.0, 1.0)));
        }

        #[test]
        fn move_lattice_reports_previous_matrix() {
            let (model, _) = model_with_atom();
            let events = recorder(&model);
            model.move_lattice(cubic(3.0), AtomPolicy::KeepCartesian);
            assert_eq!(
                *events.borrow(),
                vec![StructureEvent::LatticeMoved {
                    previous: Some(cubic(2.0)),
                    policy: AtomPolicy::KeepCartesian,
                }]
            );
            assert_eq!(model.copy_lattice(), Some(cubic(3.0)));
        }

        #[test]
        fn cell_metrics_are_available_once_a_lattice_is_set() {
            assert!(StructuralModel::new().cell_metrics().is_none());
            let (model, _) = model_with_atom();
            assert!((model.cell_metrics().unwrap().volume - 8.0).abs() < 1e-12);
        }
    }

    mod formula {
        use super::*;

        #[test]
        fn formula_uses_hill_order_with_carbon() {
            let model = StructuralModel::new();
            for label in ["O1", "H", "C", "H", "C2", "N"] {
                model.add_atom(Atom::new(label, Point3::origin()));
            }
            assert_eq!(model.formula(), "C2H2NO");
        }

        #[test]
        fn formula_is_alphabetical_without_carbon() {
            let model = StructuralModel::new();
            for label in ["O", "Fe1", "Fe2", "O", "O", "Xx"] {
                model.add_atom(Atom::new(label, Point3::origin()));
            }
            assert_eq!(model.formula(), "Fe2O3");
        }
    }
}
