//! # Workflows Module
//!
//! This module provides the public entry point that wires the input models, the
//! structural model and both synchronizers into one live cell.
//!
//! ## Overview
//!
//! A [`binding::CellBinding`] is created either from an input document (the
//! structure is materialized from the symbolic description and the card) or from an
//! existing structure (the input is derived from it, classifying its lattice). From
//! then on every edit to any model propagates to the others until the binding is
//! dropped, which detaches all of its listeners.
//!
//! ## Key Capabilities
//!
//! - **Two construction directions** from an input document or from a structure
//! - **Automatic detachment** of every listener when the binding is dropped
//! - **Cross-thread requests** queued through a sendable handle and applied on demand
//! - **Diagnostics** through the propagation counters of both synchronizers

pub mod binding;
