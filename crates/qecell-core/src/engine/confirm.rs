use crate::core::lattice::units::{AtomicUnit, LengthUnit};

/// A unit switch that would rewrite existing user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitChange {
    /// The explicit lattice vectors of a free lattice.
    Length { from: LengthUnit, to: LengthUnit },
    /// The entries of the atomic-positions card.
    Atomic { from: AtomicUnit, to: AtomicUnit },
}

/// Asks the user whether a unit change may rescale existing values.
///
/// Declining reverts the unit and leaves every value untouched.
pub trait Confirmation {
    fn confirm(&self, change: &UnitChange) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&UnitChange) -> bool,
{
    fn confirm(&self, change: &UnitChange) -> bool {
        self(change)
    }
}

/// Accepts every change; used when no interactive boundary is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _change: &UnitChange) -> bool {
        true
    }
}
