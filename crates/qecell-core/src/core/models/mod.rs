//! # Core Models Module
//!
//! Passive, observable containers for the three representations of a crystal cell
//! and for the in-memory structure they describe.
//!
//! ## Overview
//!
//! Every model is shared as `Rc<_>` and mutated through `&self` methods backed by
//! interior mutability. A mutator updates its state, releases every internal borrow,
//! and only then notifies its listeners, so a listener may read from or write to any
//! model while it runs. Models never talk to each other directly; the synchronizers in
//! [`crate::engine`] do that.
//!
//! ## Key Components
//!
//! - [`symbolic`] - `ibrav` plus `celldm(1..6)` or `A, B, C, cosAB, cosAC, cosBC`
//! - [`explicit`] - three raw lattice vectors and their length unit
//! - [`card`] - the atomic-positions card (labels, coordinate text, mobility, unit)
//! - [`structure`] - the Angstrom lattice matrix and an arena of Cartesian atoms
//! - [`atom`] - structural atoms, axes and mobility flags
//! - [`listeners`] - listener registries, the [`listeners::Observable`] trait and
//!   RAII [`listeners::Subscription`]s
//! - [`ids`] - arena handles and the card origin index
//!
//! ## Usage
//!
//! ```ignore
//! use qecell::core::models::symbolic::{LatticeKey, SymbolicLatticeModel};
//!
//! let symbolic = SymbolicLatticeModel::new();
//! symbolic.set_value("ibrav".parse()?, 4.0);
//! symbolic.set_value(LatticeKey::A, 3.0);
//! symbolic.set_value(LatticeKey::C, 5.0);
//! ```

pub mod atom;
pub mod card;
pub mod explicit;
pub mod ids;
pub mod listeners;
pub mod structure;
pub mod symbolic;
