use crate::core::lattice::basis::Basis;
use crate::core::lattice::bravais::Bravais;
use crate::core::lattice::error::LatticeError;
use crate::core::lattice::geometry::build_matrix;
use crate::core::lattice::params::LatticeParams;
use crate::core::models::explicit::ExplicitLatticeModel;
use crate::core::models::symbolic::SymbolicLatticeModel;
use nalgebra::Matrix3;

/// The lattice described by the input models at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLattice {
    pub bravais: Bravais,
    pub params: LatticeParams,
    /// Angstrom, rows are lattice vectors.
    pub matrix: Matrix3<f64>,
    /// The `alat` length in Angstrom: parameter `a`, or the length of the first vector.
    pub alat: f64,
}

/// Builds the lattice from the symbolic description, consulting the explicit
/// vectors only for the free lattice.
pub fn resolve_lattice(
    symbolic: &SymbolicLatticeModel,
    explicit: &ExplicitLatticeModel,
) -> Result<ResolvedLattice, LatticeError> {
    let bravais = symbolic.bravais()?;
    let params = symbolic.lattice_params(bravais);
    let vectors = explicit.snapshot();
    let matrix = build_matrix(bravais, &params, vectors.as_ref())?;
    let alat = params
        .a
        .filter(|a| *a > 0.0)
        .unwrap_or_else(|| matrix.row(0).norm());
    Ok(ResolvedLattice {
        bravais,
        params,
        matrix,
        alat,
    })
}

/// The coordinate basis of the current input, empty when no lattice resolves.
pub fn resolve_basis(symbolic: &SymbolicLatticeModel, explicit: &ExplicitLatticeModel) -> Basis {
    match resolve_lattice(symbolic, explicit) {
        Ok(resolved) => Basis::new(Some(resolved.matrix), Some(resolved.alat)),
        Err(_) => Basis::new(None, None),
    }
}
