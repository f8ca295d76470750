//! # Lattice Geometry Module
//!
//! Stateless crystallographic lattice mathematics: construction of the Angstrom
//! lattice matrix from a Bravais-lattice code and its free parameters, the inverse
//! parameter extraction, best-effort classification of an arbitrary matrix, and
//! conversion of atomic coordinates between units.
//!
//! ## Conventions
//!
//! - Lattice matrices are `nalgebra::Matrix3<f64>` whose **rows** are the lattice
//!   vectors, in Angstrom.
//! - Lattice parameters are lengths in Angstrom and cosines of the angles between
//!   vector pairs (`cosAB` is gamma, `cosAC` beta, `cosBC` alpha).
//! - Fractional coordinates map to Cartesian ones as `r = L^T f`.
//!
//! ## Components
//!
//! - [`bravais`] - the closed set of supported lattice codes and their required parameters
//! - [`params`] - the six optional parameters and the `celldm` conversion
//! - [`geometry`] - matrix construction, parameter extraction and cell metrics
//! - [`classify`] - matrix to lattice-code classification
//! - [`basis`] - coordinate conversion between atomic units
//! - [`units`] - length and atomic-position units
//! - [`error`] - construction failures

pub mod basis;
pub mod bravais;
pub mod classify;
pub mod error;
pub mod geometry;
pub mod params;
pub mod units;
