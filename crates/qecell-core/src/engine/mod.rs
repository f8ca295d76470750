//! # Engine Module
//!
//! This module implements the synchronization engine that keeps the symbolic lattice
//! description, the explicit lattice vectors, the atomic-positions card and the
//! structural model consistent while any one of them is being edited.
//!
//! ## Overview
//!
//! Two mediators subscribe to the passive models of [`crate::core::models`]. The
//! [`lattice_sync::LatticeSynchronizer`] recomputes the lattice matrix whenever a
//! lattice description changes and pushes it into the other representations; the
//! [`atom_sync::AtomicPositionSynchronizer`] mirrors card entries and structural
//! atoms one-to-one and re-expresses coordinates after every lattice change.
//!
//! ## Architecture
//!
//! - **Synchronizers** ([`lattice_sync`], [`atom_sync`]) - Event handlers and propagation logic
//! - **Re-entrancy Guard** ([`guard`]) - Per-synchronizer state machine and RAII guard
//! - **Origin Table** ([`origin`]) - Dense card-position to atom-handle mapping
//! - **Configuration** ([`config`]) - Tolerances, atom policy and formatting settings
//! - **Boundary Collaborators** ([`confirm`], [`feedback`]) - User confirmation and input feedback
//! - **Remote Requests** ([`mailbox`]) - Cross-thread requests applied on the owning thread
//!
//! ## Key Capabilities
//!
//! - **Loop-free propagation**: writes made while propagating are recognized and dropped
//! - **Local refusal** of invalid lattice descriptions and malformed coordinate text
//! - **Deferred conversion** of coordinates while no lattice is available
//! - **Observable counters** of propagations, suppressed re-entries and rejected edits

pub mod atom_sync;
pub mod config;
pub mod confirm;
pub mod feedback;
pub mod guard;
pub mod lattice_sync;
pub mod mailbox;
pub mod origin;
pub mod resolve;
