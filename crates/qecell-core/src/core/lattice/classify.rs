use super::bravais::Bravais;
use super::geometry::{build_matrix, extract_params, matrices_close};
use super::params::LatticeParams;
use nalgebra::Matrix3;
use tracing::debug;

/// Candidate lattice types, most specific first.
const PREFERENCE: [Bravais; 19] = [
    Bravais::CubicP,
    Bravais::CubicF,
    Bravais::CubicI,
    Bravais::Hexagonal,
    Bravais::TrigonalR,
    Bravais::TrigonalR111,
    Bravais::TetragonalP,
    Bravais::TetragonalI,
    Bravais::OrthorhombicP,
    Bravais::OrthorhombicC,
    Bravais::OrthorhombicCAlt,
    Bravais::OrthorhombicA,
    Bravais::OrthorhombicF,
    Bravais::OrthorhombicI,
    Bravais::MonoclinicP,
    Bravais::MonoclinicPUniqueB,
    Bravais::MonoclinicC,
    Bravais::MonoclinicCUniqueB,
    Bravais::Triclinic,
];

/// Finds the most specific lattice type whose canonical form reproduces `matrix`.
///
/// Each candidate's parameters are read back with [`extract_params`] and the
/// canonical matrix is rebuilt; the first candidate (in order of decreasing
/// symmetry) whose rebuilt matrix matches within `rel_tol` times the largest matrix
/// element wins. When nothing matches, not even the triclinic form, the lattice is
/// reported as [`Bravais::Free`] with `a` set to the first vector length.
///
/// This is a best-effort classifier meant for seeding a symbolic description from
/// an existing structure. It recognizes canonical orientations only.
///
/// # Arguments
///
/// * `matrix` - Angstrom lattice matrix, rows are lattice vectors.
/// * `rel_tol` - Relative element-wise tolerance.
///
/// # Return
///
/// The lattice type and the parameters that rebuild the matrix.
pub fn classify(matrix: &Matrix3<f64>, rel_tol: f64) -> (Bravais, LatticeParams) {
    let tolerance = rel_tol * matrix.amax().max(f64::MIN_POSITIVE);
    for bravais in PREFERENCE {
        let params = extract_params(bravais, matrix);
        let Ok(candidate) = build_matrix(bravais, &params, None) else {
            continue;
        };
        if matrices_close(&candidate, matrix, tolerance) {
            debug!(code = bravais.code(), "Lattice classified.");
            return (bravais, params);
        }
    }
    debug!("No canonical form matched; treating lattice as free.");
    (Bravais::Free, extract_params(Bravais::Free, matrix))
}

/// Shorthand for `classify(matrix, rel_tol).0`.
pub fn matrix_to_bravais(matrix: &Matrix3<f64>, rel_tol: f64) -> Bravais {
    classify(matrix, rel_tol).0
}
