//! # Core Module
//!
//! This module provides the stateless mathematics and the passive data models of the
//! qecell lattice core.
//!
//! ## Overview
//!
//! A crystal cell is authored through three redundant representations: a symbolic
//! description (a Bravais-lattice code with a few lengths and angle cosines), an
//! explicit one (three lattice vectors in some length unit) together with an
//! atomic-positions card, and an in-memory structural model of atoms in Cartesian
//! space. The core module defines all of them and the geometry that relates them; it
//! contains no synchronization logic.
//!
//! ## Architecture
//!
//! - **Lattice Geometry** ([`lattice`]) - Bravais constructions, classification, unit conversion
//! - **Data Models** ([`models`]) - observable symbolic, explicit, card and structural models
//! - **Utilities** ([`utils`]) - coordinate expression evaluation and the element table

pub mod lattice;
pub mod models;
pub mod utils;
