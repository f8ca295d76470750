use super::atom::{Axis, Mobility};
use super::listeners::{Listeners, Observable};
use crate::core::lattice::units::AtomicUnit;
use crate::core::utils::expr::{ExprError, evaluate, format_value};
use nalgebra::Vector3;
use std::cell::{Cell, RefCell};

/// One line of an atomic-positions card: label, three coordinate fields, mobility.
///
/// Coordinates are kept as the text the user typed, so that an expression such as
/// `1/3` survives a round trip and an unfinished edit is never lost.
#[derive(Debug, Clone, PartialEq)]
pub struct CardAtom {
    pub label: String,
    pub coords: [String; 3],
    pub mobility: Mobility,
}

impl CardAtom {
    pub fn new(label: &str, coords: [&str; 3]) -> Self {
        Self {
            label: label.to_string(),
            coords: coords.map(str::to_string),
            mobility: Mobility::FREE,
        }
    }

    /// Creates an entry from numeric coordinates written with `precision` decimals.
    pub fn from_values(label: &str, values: &Vector3<f64>, precision: usize) -> Self {
        Self {
            label: label.to_string(),
            coords: format_coords(values, precision),
            mobility: Mobility::FREE,
        }
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.mobility = mobility;
        self
    }

    /// Evaluates the three coordinate fields.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails to evaluate together with its error.
    pub fn values(&self) -> Result<Vector3<f64>, (Axis, ExprError)> {
        let mut values = Vector3::zeros();
        for axis in Axis::ALL {
            values[axis.index()] =
                evaluate(&self.coords[axis.index()]).map_err(|error| (axis, error))?;
        }
        Ok(values)
    }
}

pub fn format_coords(values: &Vector3<f64>, precision: usize) -> [String; 3] {
    [
        format_value(values.x, precision),
        format_value(values.y, precision),
        format_value(values.z, precision),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardEvent {
    /// Entry `index` was edited; `coords` is set when its coordinate text changed.
    Changed { index: usize, coords: bool },
    Added(usize),
    Removed(usize),
    Cleared,
    UnitChanged {
        previous: AtomicUnit,
        current: AtomicUnit,
    },
    /// The whole card was replaced.
    Bulk,
}

/// Ordered atomic-positions card with change notification.
///
/// Index-based mutators that receive an out-of-range index do nothing and report
/// `false` (or `None`).
#[derive(Debug, Default)]
pub struct AtomicPositionsCard {
    atoms: RefCell<Vec<CardAtom>>,
    unit: Cell<AtomicUnit>,
    listeners: Listeners<CardEvent>,
}

impl AtomicPositionsCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(unit: AtomicUnit) -> Self {
        let card = Self::new();
        card.unit.set(unit);
        card
    }

    pub fn len(&self) -> usize {
        self.atoms.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unit(&self) -> AtomicUnit {
        self.unit.get()
    }

    pub fn get(&self, index: usize) -> Option<CardAtom> {
        self.atoms.borrow().get(index).cloned()
    }

    pub fn atoms(&self) -> Vec<CardAtom> {
        self.atoms.borrow().clone()
    }

    /// Replaces entry `index`, notifying only when it changed.
    pub fn set(&self, index: usize, atom: CardAtom) -> bool {
        let coords = match self.atoms.borrow().get(index) {
            Some(entry) => entry.coords != atom.coords,
            None => return false,
        };
        self.edit(index, coords, |entry| {
            if *entry == atom {
                return false;
            }
            *entry = atom;
            true
        })
    }

    pub fn set_coordinate(&self, index: usize, axis: Axis, text: &str) -> bool {
        self.edit(index, true, |entry| {
            let field = &mut entry.coords[axis.index()];
            if *field == text {
                return false;
            }
            *field = text.to_string();
            true
        })
    }

    pub fn set_coords(&self, index: usize, coords: [String; 3]) -> bool {
        self.edit(index, true, |entry| {
            if entry.coords == coords {
                return false;
            }
            entry.coords = coords;
            true
        })
    }

    pub fn set_label(&self, index: usize, label: &str) -> bool {
        self.edit(index, false, |entry| {
            if entry.label == label {
                return false;
            }
            entry.label = label.to_string();
            true
        })
    }

    pub fn set_mobility(&self, index: usize, mobility: Mobility) -> bool {
        self.edit(index, false, |entry| {
            std::mem::replace(&mut entry.mobility, mobility) != mobility
        })
    }

    /// Inserts an entry before `index`; `index == len()` appends.
    pub fn insert(&self, index: usize, atom: CardAtom) -> bool {
        {
            let mut atoms = self.atoms.borrow_mut();
            if index > atoms.len() {
                return false;
            }
            atoms.insert(index, atom);
        }
        self.listeners.notify(&CardEvent::Added(index));
        true
    }

    pub fn push(&self, atom: CardAtom) -> usize {
        let index = self.len();
        self.insert(index, atom);
        index
    }

    pub fn remove(&self, index: usize) -> Option<CardAtom> {
        let removed = {
            let mut atoms = self.atoms.borrow_mut();
            (index < atoms.len()).then(|| atoms.remove(index))
        }?;
        self.listeners.notify(&CardEvent::Removed(index));
        Some(removed)
    }

    pub fn clear(&self) {
        let had_atoms = !self.atoms.replace(Vec::new()).is_empty();
        if had_atoms {
            self.listeners.notify(&CardEvent::Cleared);
        }
    }

    /// Changes the unit tag without touching any entry.
    pub fn set_unit(&self, unit: AtomicUnit) {
        let previous = self.unit.replace(unit);
        if previous != unit {
            self.listeners.notify(&CardEvent::UnitChanged {
                previous,
                current: unit,
            });
        }
    }

    /// Replaces unit and entries together with a single [`CardEvent::Bulk`].
    pub fn replace_all(&self, unit: AtomicUnit, atoms: Vec<CardAtom>) {
        self.unit.set(unit);
        self.atoms.replace(atoms);
        self.listeners.notify(&CardEvent::Bulk);
    }

    fn edit(
        &self,
        index: usize,
        coords: bool,
        apply: impl FnOnce(&mut CardAtom) -> bool,
    ) -> bool {
        let changed = match self.atoms.borrow_mut().get_mut(index) {
            Some(entry) => apply(entry),
            None => return false,
        };
        if changed {
            self.listeners.notify(&CardEvent::Changed { index, coords });
        }
        true
    }
}

impl Observable for AtomicPositionsCard {
    type Event = CardEvent;

    fn listeners(&self) -> &Listeners<CardEvent> {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn recorder(card: &AtomicPositionsCard) -> Rc<RefCell<Vec<CardEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        card.subscribe(move |event: &CardEvent| sink.borrow_mut().push(event.clone()));
        events
    }

    fn sample() -> AtomicPositionsCard {
        let card = AtomicPositionsCard::with_unit(AtomicUnit::Crystal);
        card.push(CardAtom::new("Si", ["0", "0", "0"]));
        card.push(CardAtom::new("Si", ["1/4", "1/4", "1/4"]));
        card
    }

    mod entries {
        use super::*;

        #[test]
        fn values_evaluate_expressions() {
            let entry = CardAtom::new("O", ["1/2", "-0.25d0", "sqrt(4)"]);
            assert_eq!(entry.values().unwrap(), Vector3::new(0.5, -0.25, 2.0));
        }

        #[test]
        fn values_report_the_failing_axis() {
            let entry = CardAtom::new("O", ["0.1", "0.2", "0.3+"]);
            let (axis, error) = entry.values().unwrap_err();
            assert_eq!(axis, Axis::Z);
            assert_eq!(error, ExprError::UnexpectedEnd);
        }

        #[test]
        fn from_values_formats_with_precision() {
            let entry = CardAtom::from_values("O", &Vector3::new(0.5, -0.0, 1.0 / 3.0), 4);
            assert_eq!(entry.coords, ["0.5000", "0.0000", "0.3333"].map(String::from));
        }
    }

    mod mutation {
        use super::*;

        #[test]
        fn edits_report_the_changed_index() {
            let card = sample();
            let events = recorder(&card);
            assert!(card.set_coordinate(1, Axis::X, "0.3"));
            assert!(card.set_coordinate(1, Axis::X, "0.3"));
            assert!(card.set_label(0, "Ge"));
            assert!(!card.set_label(7, "Ge"));
            assert_eq!(
                *events.borrow(),
                vec![
                    CardEvent::Changed {
                        index: 1,
                        coords: true
                    },
                    CardEvent::Changed {
                        index: 0,
                        coords: false
                    },
                ]
            );
            assert_eq!(card.get(1).unwrap().coords[0], "0.3");
        }

        #[test]
        fn replacing_an_entry_reports_whether_coordinates_changed() {
            let card = sample();
            let events = recorder(&card);
            let relabeled = CardAtom::new("Ge", ["0", "0", "0"]);
            assert!(card.set(0, relabeled));
            assert!(card.set(1, CardAtom::new("Si", ["1/4", "1/4", "1/2"])));
            assert!(!card.set(4, CardAtom::new("Si", ["0", "0", "0"])));
            assert_eq!(
                *events.borrow(),
                vec![
                    CardEvent::Changed {
                        index: 0,
                        coords: false
                    },
                    CardEvent::Changed {
                        index: 1,
                        coords: true
                    },
                ]
            );
        }

        #[test]
        fn insert_and_remove_report_positions() {
            let card = sample();
            let events = recorder(&card);
            assert!(card.insert(1, CardAtom::new("O", ["0", "0", "0.5"])));
            assert!(!card.insert(9, CardAtom::new("O", ["0", "0", "0"])));
            let removed = card.remove(0).unwrap();
            assert_eq!(removed.label, "Si");
            assert!(card.remove(5).is_none());
            assert_eq!(
                *events.borrow(),
                vec![CardEvent::Added(1), CardEvent::Removed(0)]
            );
            assert_eq!(card.get(0).unwrap().label, "O");
        }

        #[test]
        fn unit_change_is_tagged_without_touching_entries() {
            let card = sample();
            let events = recorder(&card);
            card.set_unit(AtomicUnit::Angstrom);
            assert_eq!(card.get(1).unwrap().coords[0], "1/4");
            assert_eq!(
                *events.borrow(),
                vec![CardEvent::UnitChanged {
                    previous: AtomicUnit::Crystal,
                    current: AtomicUnit::Angstrom
                }]
            );
        }

        #[test]
        fn clear_and_replace_all_send_one_event_each() {
            let card = sample();
            let events = recorder(&card);
            card.clear();
            card.clear();
            card.replace_all(AtomicUnit::Bohr, vec![CardAtom::new("H", ["0", "0", "0"])]);
            assert_eq!(*events.borrow(), vec![CardEvent::Cleared, CardEvent::Bulk]);
            assert_eq!(card.unit(), AtomicUnit::Bohr);
            assert_eq!(card.len(), 1);
        }
    }
}
