//! # qecell Lattice Core Library
//!
//! The crystallographic lattice model of a simulation-input authoring tool: builds
//! lattice matrices and Cartesian atomic coordinates from Bravais-lattice
//! descriptions, and keeps the symbolic parameters, the explicit vectors with the
//! atomic-positions card, and an in-memory structure continuously synchronized.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless lattice mathematics (Bravais
//!   constructions, parameter extraction, classification, unit conversion) and the
//!   passive, observable data models.
//!
//! - **[`engine`]: The Logic Core.** The synchronizers that mediate between the
//!   models, with their re-entrancy guards, configuration and boundary collaborators.
//!
//! - **[`workflows`]: The Public API.** [`workflows::binding::CellBinding`] ties the
//!   models and synchronizers together and owns their subscriptions.

pub mod core;
pub mod engine;
pub mod workflows;
