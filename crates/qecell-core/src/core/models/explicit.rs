use super::listeners::{Listeners, Observable};
use crate::core::lattice::geometry::ExplicitLattice;
use crate::core::lattice::units::LengthUnit;
use nalgebra::Vector3;
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, PartialEq)]
pub enum ExplicitEvent {
    /// One lattice vector (0, 1 or 2) was edited.
    VectorChanged(usize),
    UnitChanged {
        previous: LengthUnit,
        current: LengthUnit,
    },
    /// Vectors and unit were replaced together, or cleared.
    Reset,
}

/// Three raw lattice vectors plus the unit they are written in.
///
/// The vectors are absent until first written. Writing a single vector into an
/// empty model fills the other two with zeros.
#[derive(Debug, Default)]
pub struct ExplicitLatticeModel {
    vectors: RefCell<Option<[Vector3<f64>; 3]>>,
    unit: Cell<LengthUnit>,
    listeners: Listeners<ExplicitEvent>,
}

impl ExplicitLatticeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vectors(&self) -> Option<[Vector3<f64>; 3]> {
        *self.vectors.borrow()
    }

    pub fn unit(&self) -> LengthUnit {
        self.unit.get()
    }

    pub fn has_vectors(&self) -> bool {
        self.vectors.borrow().is_some()
    }

    /// The current vectors and unit, if vectors have been written.
    pub fn snapshot(&self) -> Option<ExplicitLattice> {
        self.vectors()
            .map(|vectors| ExplicitLattice::new(vectors, self.unit()))
    }

    /// Replaces lattice vector `index`; indices outside `0..3` are ignored.
    pub fn set_vector(&self, index: usize, vector: Vector3<f64>) {
        if index >= 3 {
            return;
        }
        let changed = {
            let mut vectors = self.vectors.borrow_mut();
            let rows = vectors.get_or_insert([Vector3::zeros(); 3]);
            std::mem::replace(&mut rows[index], vector) != vector
        };
        if changed {
            self.listeners.notify(&ExplicitEvent::VectorChanged(index));
        }
    }

    pub fn set_unit(&self, unit: LengthUnit) {
        let previous = self.unit.replace(unit);
        if previous != unit {
            self.listeners.notify(&ExplicitEvent::UnitChanged {
                previous,
                current: unit,
            });
        }
    }

    /// Replaces vectors and unit together with a single [`ExplicitEvent::Reset`].
    pub fn assign(&self, lattice: ExplicitLattice) {
        let previous = self.snapshot();
        self.vectors.replace(Some(lattice.vectors));
        self.unit.set(lattice.unit);
        if previous != Some(lattice) {
            self.listeners.notify(&ExplicitEvent::Reset);
        }
    }

    /// Forgets the vectors, keeping the unit.
    pub fn clear(&self) {
        if self.vectors.replace(None).is_some() {
            self.listeners.notify(&ExplicitEvent::Reset);
        }
    }
}

impl Observable for ExplicitLatticeModel {
    type Event = ExplicitEvent;

    fn listeners(&self) -> &Listeners<ExplicitEvent> {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn recorder(model: &ExplicitLatticeModel) -> Rc<RefCell<Vec<ExplicitEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |event: &ExplicitEvent| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn new_model_has_no_vectors_and_alat_unit() {
        let model = ExplicitLatticeModel::new();
        assert!(model.snapshot().is_none());
        assert_eq!(model.unit(), LengthUnit::Alat);
    }

    #[test]
    fn setting_one_vector_fills_the_rest_with_zeros() {
        let model = ExplicitLatticeModel::new();
        model.set_vector(1, Vector3::new(0.0, 2.0, 0.0));
        let vectors = model.vectors().unwrap();
        assert_eq!(vectors[0], Vector3::zeros());
        assert_eq!(vectors[1], Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn edits_notify_only_when_something_changes() {
        let model = ExplicitLatticeModel::new();
        let events = recorder(&model);
        model.set_vector(0, Vector3::x());
        model.set_vector(0, Vector3::x());
        model.set_vector(5, Vector3::y());
        model.set_unit(LengthUnit::Alat);
        model.set_unit(LengthUnit::Bohr);
        assert_eq!(
            *events.borrow(),
            vec![
                ExplicitEvent::VectorChanged(0),
                ExplicitEvent::UnitChanged {
                    previous: LengthUnit::Alat,
                    current: LengthUnit::Bohr
                },
            ]
        );
    }

    #[test]
    fn assign_replaces_vectors_and_unit_in_one_event() {
        let model = ExplicitLatticeModel::new();
        let events = recorder(&model);
        let lattice = ExplicitLattice::new(
            [Vector3::x(), Vector3::y(), Vector3::z()],
            LengthUnit::Angstrom,
        );
        model.assign(lattice);
        model.assign(lattice);
        assert_eq!(*events.borrow(), vec![ExplicitEvent::Reset]);
        assert_eq!(model.snapshot(), Some(lattice));
    }

    #[test]
    fn clear_keeps_unit_and_notifies_once() {
        let model = ExplicitLatticeModel::new();
        model.set_unit(LengthUnit::Bohr);
        model.set_vector(2, Vector3::z());
        let events = recorder(&model);
        model.clear();
        model.clear();
        assert!(!model.has_vectors());
        assert_eq!(model.unit(), LengthUnit::Bohr);
        assert_eq!(events.borrow().len(), 1);
    }
}
