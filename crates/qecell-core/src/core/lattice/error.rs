use super::bravais::Param;
use thiserror::Error;

/// Reasons a lattice matrix cannot be produced.
///
/// Every variant except [`LatticeError::InconsistentGeometry`] describes an invalid
/// or incomplete description; `InconsistentGeometry` means the parameters are
/// individually valid but jointly impossible. Callers treat both as "no matrix
/// available" and keep their last valid state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatticeError {
    #[error("Unsupported Bravais-lattice code {0}")]
    UnsupportedCode(i32),

    #[error("Bravais-lattice code must be an integer, got {0}")]
    NonIntegralCode(f64),

    #[error("Bravais-lattice code is not set")]
    MissingCode,

    #[error("ibrav={code} requires parameter {param}")]
    MissingParameter { code: i32, param: Param },

    #[error("ibrav={code}: length {param} must be positive, got {value}")]
    NonPositiveLength { code: i32, param: Param, value: f64 },

    #[error("ibrav={code}: {param} must lie in (-1, 1), got {value}")]
    CosineOutOfRange { code: i32, param: Param, value: f64 },

    #[error("ibrav={code}: parameters are jointly inconsistent ({reason})")]
    InconsistentGeometry { code: i32, reason: String },

    #[error("Free lattice requires explicit lattice vectors")]
    MissingExplicitLattice,

    #[error("Explicit lattice vectors in alat units require a positive lattice parameter a")]
    MissingAlat,

    #[error("Lattice matrix is singular")]
    SingularLattice,
}

impl LatticeError {
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, LatticeError::InconsistentGeometry { .. })
    }
}
