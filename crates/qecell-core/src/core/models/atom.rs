use crate::core::utils::elements::element_of;
use nalgebra::Point3;
use std::fmt;

/// A Cartesian axis, also used to address one coordinate field of a card entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

/// Per-axis mobility flags of an atom during relaxation.
///
/// `true` means the atom may move along that Cartesian axis. A card writes the
/// flags as the trailing `1`/`0` integers of an atomic-positions line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mobility(pub [bool; 3]);

impl Mobility {
    pub const FREE: Mobility = Mobility([true; 3]);
    pub const FIXED: Mobility = Mobility([false; 3]);

    pub fn is_free(&self, axis: Axis) -> bool {
        self.0[axis.index()]
    }

    pub fn with(mut self, axis: Axis, free: bool) -> Self {
        self.0[axis.index()] = free;
        self
    }

    /// Whether every axis is free, i.e. no constraint needs to be written out.
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::FREE
    }
}

impl Default for Mobility {
    fn default() -> Self {
        Self::FREE
    }
}

/// An atom of the structural model.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The species label (e.g. "Fe1", "O").
    pub name: String,
    /// Cartesian position in Angstrom.
    pub position: Point3<f64>,
    pub mobility: Mobility,
}

impl Atom {
    /// Creates a freely movable atom.
    ///
    /// # Arguments
    ///
    /// * `name` - The species label.
    /// * `position` - Cartesian position in Angstrom.
    pub fn new(name: &str, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            position,
            mobility: Mobility::FREE,
        }
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.mobility = mobility;
        self
    }

    /// The chemical element symbol derived from the label, if it names one.
    pub fn element(&self) -> Option<&'static str> {
        element_of(&self.name)
    }
}
