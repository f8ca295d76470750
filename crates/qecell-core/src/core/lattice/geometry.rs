use super::bravais::{Bravais, Param};
use super::error::LatticeError;
use super::params::LatticeParams;
use super::units::LengthUnit;
use nalgebra::{Matrix3, Vector3};

const SINGULAR_DETERMINANT: f64 = 1e-12;

/// Three raw lattice vectors together with the unit they are written in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplicitLattice {
    pub vectors: [Vector3<f64>; 3],
    pub unit: LengthUnit,
}

impl ExplicitLattice {
    pub fn new(vectors: [Vector3<f64>; 3], unit: LengthUnit) -> Self {
        Self { vectors, unit }
    }

    /// Scales the vectors into an Angstrom lattice matrix (rows are vectors).
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::MissingAlat`] when the unit is `alat` and no positive
    /// `alat` is supplied.
    pub fn to_matrix(&self, alat: Option<f64>) -> Result<Matrix3<f64>, LatticeError> {
        let scale = self
            .unit
            .to_angstrom(alat)
            .ok_or(LatticeError::MissingAlat)?;
        Ok(rows_to_matrix(&self.vectors) * scale)
    }

    /// Expresses an Angstrom lattice matrix as raw vectors in `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::MissingAlat`] when the unit is `alat` and no positive
    /// `alat` is supplied.
    pub fn from_matrix(
        matrix: &Matrix3<f64>,
        unit: LengthUnit,
        alat: Option<f64>,
    ) -> Result<Self, LatticeError> {
        let scale = unit.to_angstrom(alat).ok_or(LatticeError::MissingAlat)?;
        let rows = matrix_rows(&(*matrix / scale));
        Ok(Self::new(rows, unit))
    }
}

/// Lengths (Angstrom), angles (degrees) and volume (cubic Angstrom) of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub lengths: [f64; 3],
    /// `[alpha, beta, gamma]`: the angles bc, ac and ab.
    pub angles: [f64; 3],
    pub volume: f64,
}

pub fn rows_to_matrix(rows: &[Vector3<f64>; 3]) -> Matrix3<f64> {
    Matrix3::from_rows(&[rows[0].transpose(), rows[1].transpose(), rows[2].transpose()])
}

pub fn matrix_rows(matrix: &Matrix3<f64>) -> [Vector3<f64>; 3] {
    [
        matrix.row(0).transpose(),
        matrix.row(1).transpose(),
        matrix.row(2).transpose(),
    ]
}

/// Largest absolute element-wise difference is within `tolerance`.
pub fn matrices_close(lhs: &Matrix3<f64>, rhs: &Matrix3<f64>, tolerance: f64) -> bool {
    (lhs - rhs).amax() <= tolerance
}

/// Builds the Angstrom lattice matrix (rows are lattice vectors) for a lattice type.
///
/// For [`Bravais::Free`] the explicit vectors are scaled into Angstrom, using
/// `params.a` as `alat` when they are written in `alat` units. Every other type uses
/// its closed-form construction from the parameters it requires; parameters outside
/// that subset are ignored.
///
/// # Arguments
///
/// * `bravais` - The lattice type.
/// * `params` - Free lattice parameters in Angstrom / cosines.
/// * `explicit` - Raw vectors, consulted only for the free lattice.
///
/// # Errors
///
/// Returns a [`LatticeError`] when a required parameter is missing or out of range,
/// when the parameters are jointly inconsistent, or when the resulting free lattice
/// is singular. No partial matrix is ever returned.
pub fn build_matrix(
    bravais: Bravais,
    params: &LatticeParams,
    explicit: Option<&ExplicitLattice>,
) -> Result<Matrix3<f64>, LatticeError> {
    let rows: [[f64; 3]; 3] = match bravais {
        Bravais::Free => {
            let explicit = explicit.ok_or(LatticeError::MissingExplicitLattice)?;
            let matrix = explicit.to_matrix(params.a)?;
            if matrix.determinant().abs() < SINGULAR_DETERMINANT {
                return Err(LatticeError::SingularLattice);
            }
            return Ok(matrix);
        }
        Bravais::CubicP => {
            let a = length(bravais, params, Param::A)?;
            [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]
        }
        Bravais::CubicF => {
            let h = length(bravais, params, Param::A)? / 2.0;
            [[-h, 0.0, h], [0.0, h, h], [-h, h, 0.0]]
        }
        Bravais::CubicI => {
            let h = length(bravais, params, Param::A)? / 2.0;
            [[h, h, h], [-h, h, h], [-h, -h, h]]
        }
        Bravais::Hexagonal => {
            let a = length(bravais, params, Param::A)?;
            let c = length(bravais, params, Param::C)?;
            [
                [a, 0.0, 0.0],
                [-a / 2.0, a * 3f64.sqrt() / 2.0, 0.0],
                [0.0, 0.0, c],
            ]
        }
        Bravais::TrigonalR | Bravais::TrigonalR111 => {
            let a = length(bravais, params, Param::A)?;
            let cos = cosine(bravais, params, Param::CosAB)?;
            if 1.0 + 2.0 * cos <= 0.0 {
                return Err(LatticeError::InconsistentGeometry {
                    code: bravais.code(),
                    reason: format!("1 + 2 cosAB must be positive, cosAB = {cos}"),
                });
            }
            let tx = ((1.0 - cos) / 2.0).sqrt();
            let ty = ((1.0 - cos) / 6.0).sqrt();
            let tz = ((1.0 + 2.0 * cos) / 3.0).sqrt();
            if bravais == Bravais::TrigonalR {
                [
                    [a * tx, -a * ty, a * tz],
                    [0.0, 2.0 * a * ty, a * tz],
                    [-a * tx, -a * ty, a * tz],
                ]
            } else {
                let ap = a / 3f64.sqrt();
                let u = tz - 2.0 * 2f64.sqrt() * ty;
                let v = tz + 2f64.sqrt() * ty;
                [
                    [ap * u, ap * v, ap * v],
                    [ap * v, ap * u, ap * v],
                    [ap * v, ap * v, ap * u],
                ]
            }
        }
        Bravais::TetragonalP => {
            let a = length(bravais, params, Param::A)?;
            let c = length(bravais, params, Param::C)?;
            [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, c]]
        }
        Bravais::TetragonalI => {
            let h = length(bravais, params, Param::A)? / 2.0;
            let hc = length(bravais, params, Param::C)? / 2.0;
            [[h, -h, hc], [h, h, hc], [-h, -h, hc]]
        }
        Bravais::OrthorhombicP => {
            let (a, b, c) = lengths(bravais, params)?;
            [[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]]
        }
        Bravais::OrthorhombicC => {
            let (a, b, c) = lengths(bravais, params)?;
            [[a / 2.0, b / 2.0, 0.0], [-a / 2.0, b / 2.0, 0.0], [0.0, 0.0, c]]
        }
        Bravais::OrthorhombicCAlt => {
            let (a, b, c) = lengths(bravais, params)?;
            [[a / 2.0, -b / 2.0, 0.0], [a / 2.0, b / 2.0, 0.0], [0.0, 0.0, c]]
        }
        Bravais::OrthorhombicA => {
            let (a, b, c) = lengths(bravais, params)?;
            [[a, 0.0, 0.0], [0.0, b / 2.0, -c / 2.0], [0.0, b / 2.0, c / 2.0]]
        }
        Bravais::OrthorhombicF => {
            let (a, b, c) = lengths(bravais, params)?;
            [
                [a / 2.0, 0.0, c / 2.0],
                [a / 2.0, b / 2.0, 0.0],
                [0.0, b / 2.0, c / 2.0],
            ]
        }
        Bravais::OrthorhombicI => {
            let (a, b, c) = lengths(bravais, params)?;
            [
                [a / 2.0, b / 2.0, c / 2.0],
                [-a / 2.0, b / 2.0, c / 2.0],
                [-a / 2.0, -b / 2.0, c / 2.0],
            ]
        }
        Bravais::MonoclinicP => {
            let (a, b, c) = lengths(bravais, params)?;
            let cos = cosine(bravais, params, Param::CosAB)?;
            let sin = (1.0 - cos * cos).sqrt();
            [[a, 0.0, 0.0], [b * cos, b * sin, 0.0], [0.0, 0.0, c]]
        }
        Bravais::MonoclinicPUniqueB => {
            let (a, b, c) = lengths(bravais, params)?;
            let cos = cosine(bravais, params, Param::CosAC)?;
            let sin = (1.0 - cos * cos).sqrt();
            [[a, 0.0, 0.0], [0.0, b, 0.0], [c * cos, 0.0, c * sin]]
        }
        Bravais::MonoclinicC => {
            let (a, b, c) = lengths(bravais, params)?;
            let cos = cosine(bravais, params, Param::CosAB)?;
            let sin = (1.0 - cos * cos).sqrt();
            [
                [a / 2.0, 0.0, -c / 2.0],
                [b * cos, b * sin, 0.0],
                [a / 2.0, 0.0, c / 2.0],
            ]
        }
        Bravais::MonoclinicCUniqueB => {
            let (a, b, c) = lengths(bravais, params)?;
            let cos = cosine(bravais, params, Param::CosAC)?;
            let sin = (1.0 - cos * cos).sqrt();
            [
                [a / 2.0, b / 2.0, 0.0],
                [-a / 2.0, b / 2.0, 0.0],
                [c * cos, 0.0, c * sin],
            ]
        }
        Bravais::Triclinic => {
            let (a, b, c) = lengths(bravais, params)?;
            let cos_gamma = cosine(bravais, params, Param::CosAB)?;
            let cos_beta = cosine(bravais, params, Param::CosAC)?;
            let cos_alpha = cosine(bravais, params, Param::CosBC)?;
            let sin_gamma = (1.0 - cos_gamma * cos_gamma).sqrt();
            let radicand = 1.0 + 2.0 * cos_alpha * cos_beta * cos_gamma
                - cos_alpha * cos_alpha
                - cos_beta * cos_beta
                - cos_gamma * cos_gamma;
            if radicand <= 0.0 {
                return Err(LatticeError::InconsistentGeometry {
                    code: bravais.code(),
                    reason: format!("Gram residual {radicand} is not positive"),
                });
            }
            [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [
                    c * cos_beta,
                    c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma,
                    c * radicand.sqrt() / sin_gamma,
                ],
            ]
        }
    };

    Ok(Matrix3::from_row_slice(&[
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    ]))
}

/// Reads back the free parameters of a matrix assumed to have the canonical
/// orientation of `bravais`.
///
/// This is the dedicated inverse of [`build_matrix`] for each lattice type: for a
/// matrix produced by `build_matrix(bravais, p, _)` it recovers `p.canonical(bravais)`.
/// For [`Bravais::Free`] only `a` (the length of the first vector) is reported.
pub fn extract_params(bravais: Bravais, matrix: &Matrix3<f64>) -> LatticeParams {
    let [v1, v2, v3] = matrix_rows(matrix);
    let (l1, l2, l3) = (v1.norm(), v2.norm(), v3.norm());
    let cos_between = |x: &Vector3<f64>, y: &Vector3<f64>, lx: f64, ly: f64| {
        if lx > 0.0 && ly > 0.0 {
            x.dot(y) / (lx * ly)
        } else {
            0.0
        }
    };

    let mut params = LatticeParams::new();
    match bravais {
        Bravais::Free | Bravais::CubicP => {
            params.a = Some(l1);
        }
        Bravais::CubicF => {
            params.a = Some(l1 * 2f64.sqrt());
        }
        Bravais::CubicI => {
            params.a = Some(2.0 * l1 / 3f64.sqrt());
        }
        Bravais::Hexagonal | Bravais::TetragonalP => {
            params.a = Some(l1);
            params.c = Some(l3);
        }
        Bravais::TrigonalR | Bravais::TrigonalR111 => {
            params.a = Some(l1);
            params.cos_ab = Some(cos_between(&v1, &v2, l1, l2));
        }
        Bravais::TetragonalI => {
            params.a = Some(2.0 * v1.x);
            params.c = Some(2.0 * v1.z);
        }
        Bravais::OrthorhombicP => {
            params.a = Some(l1);
            params.b = Some(l2);
            params.c = Some(l3);
        }
        Bravais::OrthorhombicC => {
            params.a = Some(2.0 * v1.x);
            params.b = Some(2.0 * v1.y);
            params.c = Some(l3);
        }
        Bravais::OrthorhombicCAlt => {
            params.a = Some(2.0 * v2.x);
            params.b = Some(2.0 * v2.y);
            params.c = Some(l3);
        }
        Bravais::OrthorhombicA => {
            params.a = Some(l1);
            params.b = Some(2.0 * v3.y);
            params.c = Some(2.0 * v3.z);
        }
        Bravais::OrthorhombicF => {
            params.a = Some(2.0 * v1.x);
            params.b = Some(2.0 * v2.y);
            params.c = Some(2.0 * v1.z);
        }
        Bravais::OrthorhombicI => {
            params.a = Some(2.0 * v1.x);
            params.b = Some(2.0 * v1.y);
            params.c = Some(2.0 * v1.z);
        }
        Bravais::MonoclinicP => {
            params.a = Some(l1);
            params.b = Some(l2);
            params.c = Some(l3);
            params.cos_ab = Some(cos_between(&v1, &v2, l1, l2));
        }
        Bravais::MonoclinicPUniqueB => {
            params.a = Some(l1);
            params.b = Some(l2);
            params.c = Some(l3);
            params.cos_ac = Some(cos_between(&v1, &v3, l1, l3));
        }
        Bravais::MonoclinicC => {
            params.a = Some(2.0 * v3.x);
            params.b = Some(l2);
            params.c = Some(2.0 * v3.z);
            params.cos_ab = Some(if l2 > 0.0 { v2.x / l2 } else { 0.0 });
        }
        Bravais::MonoclinicCUniqueB => {
            params.a = Some(2.0 * v1.x);
            params.b = Some(2.0 * v1.y);
            params.c = Some(l3);
            params.cos_ac = Some(if l3 > 0.0 { v3.x / l3 } else { 0.0 });
        }
        Bravais::Triclinic => {
            params.a = Some(l1);
            params.b = Some(l2);
            params.c = Some(l3);
            params.cos_ab = Some(cos_between(&v1, &v2, l1, l2));
            params.cos_ac = Some(cos_between(&v1, &v3, l1, l3));
            params.cos_bc = Some(cos_between(&v2, &v3, l2, l3));
        }
    }
    params
}

/// Computes lengths, angles and volume of the cell spanned by the matrix rows.
pub fn cell_metrics(matrix: &Matrix3<f64>) -> CellMetrics {
    let [v1, v2, v3] = matrix_rows(matrix);
    let lengths = [v1.norm(), v2.norm(), v3.norm()];
    let angle = |x: &Vector3<f64>, y: &Vector3<f64>, lx: f64, ly: f64| {
        if lx > 0.0 && ly > 0.0 {
            (x.dot(y) / (lx * ly)).clamp(-1.0, 1.0).acos().to_degrees()
        } else {
            0.0
        }
    };
    CellMetrics {
        lengths,
        angles: [
            angle(&v2, &v3, lengths[1], lengths[2]),
            angle(&v1, &v3, lengths[0], lengths[2]),
            angle(&v1, &v2, lengths[0], lengths[1]),
        ],
        volume: matrix.determinant().abs(),
    }
}

fn length(bravais: Bravais, params: &LatticeParams, param: Param) -> Result<f64, LatticeError> {
    let value = params.require(bravais, param)?;
    if value <= 0.0 {
        return Err(LatticeError::NonPositiveLength {
            code: bravais.code(),
            param,
            value,
        });
    }
    Ok(value)
}

fn lengths(bravais: Bravais, params: &LatticeParams) -> Result<(f64, f64, f64), LatticeError> {
    Ok((
        length(bravais, params, Param::A)?,
        length(bravais, params, Param::B)?,
        length(bravais, params, Param::C)?,
    ))
}

fn cosine(bravais: Bravais, params: &LatticeParams, param: Param) -> Result<f64, LatticeError> {
    let value = params.require(bravais, param)?;
    if value.abs() >= 1.0 {
        return Err(LatticeError::CosineOutOfRange {
            code: bravais.code(),
            param,
            value,
        });
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::lattice::units::BOHR_RADIUS_ANGS;

    /// One valid parameter set per lattice type.
    pub(crate) fn sample_params(bravais: Bravais) -> LatticeParams {
        let cos_ab = match bravais {
            Bravais::TrigonalR | Bravais::TrigonalR111 => 0.3,
            _ => 0.2,
        };
        LatticeParams::new()
            .with(Param::A, 3.0)
            .with(Param::B, 4.0)
            .with(Param::C, 5.0)
            .with(Param::CosAB, cos_ab)
            .with(Param::CosAC, -0.3)
            .with(Param::CosBC, 0.1)
            .canonical(bravais)
    }

    fn assert_row(matrix: &Matrix3<f64>, row: usize, expected: [f64; 3], tol: f64) {
        for (col, value) in expected.iter().enumerate() {
            assert!(
                (matrix[(row, col)] - value).abs() < tol,
                "row {row} col {col}: {} != {value}",
                matrix[(row, col)]
            );
        }
    }

    mod construction {
        use super::*;

        #[test]
        fn hexagonal_example_builds_expected_rows() {
            let params = LatticeParams::new().with(Param::A, 3.0).with(Param::C, 5.0);
            let m = build_matrix(Bravais::Hexagonal, &params, None).unwrap();
            assert_row(&m, 0, [3.0, 0.0, 0.0], 1e-9);
            assert_row(&m, 1, [-1.5, 3.0 * 3f64.sqrt() / 2.0, 0.0], 1e-9);
            assert_row(&m, 2, [0.0, 0.0, 5.0], 1e-9);
        }

        #[test]
        fn hexagonal_with_non_positive_c_fails() {
            for c in [0.0, -5.0] {
                let params = LatticeParams::new().with(Param::A, 3.0).with(Param::C, c);
                let err = build_matrix(Bravais::Hexagonal, &params, None).unwrap_err();
                assert!(matches!(
                    err,
                    LatticeError::NonPositiveLength { code: 4, param: Param::C, .. }
                ));
            }
        }

        #[test]
        fn every_symmetric_lattice_builds_with_sample_params() {
            for bravais in Bravais::ALL.into_iter().filter(|b| !b.is_free()) {
                let m = build_matrix(bravais, &sample_params(bravais), None)
                    .unwrap_or_else(|e| panic!("{bravais}: {e}"));
                assert!(m.determinant().abs() > 1e-6, "{bravais} is singular");
            }
        }

        #[test]
        fn missing_required_parameter_is_reported() {
            let params = LatticeParams::new().with(Param::A, 3.0).with(Param::B, 4.0);
            let err = build_matrix(Bravais::OrthorhombicP, &params, None).unwrap_err();
            assert_eq!(
                err,
                LatticeError::MissingParameter {
                    code: 8,
                    param: Param::C
                }
            );
        }

        #[test]
        fn unused_parameters_do_not_affect_construction() {
            let bare = LatticeParams::new().with(Param::A, 2.5);
            let noisy = bare.with(Param::B, -1.0).with(Param::CosAB, 7.0);
            let m1 = build_matrix(Bravais::CubicF, &bare, None).unwrap();
            let m2 = build_matrix(Bravais::CubicF, &noisy, None).unwrap();
            assert_eq!(m1, m2);
        }

        #[test]
        fn positivity_is_checked_for_b_and_c_in_every_branch() {
            for bravais in [
                Bravais::OrthorhombicA,
                Bravais::MonoclinicC,
                Bravais::MonoclinicCUniqueB,
            ] {
                let params = sample_params(bravais).with(Param::B, -4.0);
                assert!(build_matrix(bravais, &params, None).is_err(), "{bravais} b");
                let params = sample_params(bravais).with(Param::C, 0.0);
                assert!(build_matrix(bravais, &params, None).is_err(), "{bravais} c");
            }
        }

        #[test]
        fn cosine_at_or_beyond_unity_is_rejected() {
            let params = sample_params(Bravais::MonoclinicP).with(Param::CosAB, 1.0);
            assert!(matches!(
                build_matrix(Bravais::MonoclinicP, &params, None),
                Err(LatticeError::CosineOutOfRange { code: 12, .. })
            ));
            let params = sample_params(Bravais::Triclinic).with(Param::CosBC, -1.5);
            assert!(matches!(
                build_matrix(Bravais::Triclinic, &params, None),
                Err(LatticeError::CosineOutOfRange { code: 14, .. })
            ));
        }

        #[test]
        fn trigonal_with_flat_angle_is_inconsistent() {
            let params = sample_params(Bravais::TrigonalR).with(Param::CosAB, -0.6);
            let err = build_matrix(Bravais::TrigonalR, &params, None).unwrap_err();
            assert!(err.is_inconsistent());
        }

        #[test]
        fn triclinic_with_impossible_angles_is_inconsistent() {
            // Three 150 degree angles cannot close a cell.
            let cos = (150f64).to_radians().cos();
            let params = sample_params(Bravais::Triclinic)
                .with(Param::CosAB, cos)
                .with(Param::CosAC, cos)
                .with(Param::CosBC, cos);
            let err = build_matrix(Bravais::Triclinic, &params, None).unwrap_err();
            assert!(err.is_inconsistent());
        }

        #[test]
        fn trigonal_vectors_have_length_a_and_requested_angle() {
            for bravais in [Bravais::TrigonalR, Bravais::TrigonalR111] {
                let m = build_matrix(bravais, &sample_params(bravais), None).unwrap();
                let metrics = cell_metrics(&m);
                for l in metrics.lengths {
                    assert!((l - 3.0).abs() < 1e-12);
                }
                for angle in metrics.angles {
                    assert!((angle.to_radians().cos() - 0.3).abs() < 1e-12);
                }
            }
        }

        #[test]
        fn fcc_and_bcc_use_symmetric_half_vectors() {
            let params = LatticeParams::new().with(Param::A, 4.0);
            let fcc = build_matrix(Bravais::CubicF, &params, None).unwrap();
            assert_row(&fcc, 0, [-2.0, 0.0, 2.0], 1e-12);
            assert!((cell_metrics(&fcc).volume - 16.0).abs() < 1e-9);
            let bcc = build_matrix(Bravais::CubicI, &params, None).unwrap();
            assert_row(&bcc, 2, [-2.0, -2.0, 2.0], 1e-12);
            assert!((cell_metrics(&bcc).volume - 32.0).abs() < 1e-9);
        }
    }

    mod free_lattice {
        use super::*;

        fn vectors(scale: f64) -> [Vector3<f64>; 3] {
            [
                Vector3::new(scale, 0.0, 0.0),
                Vector3::new(0.0, scale, 0.0),
                Vector3::new(0.0, 0.0, 2.0 * scale),
            ]
        }

        #[test]
        fn free_lattice_requires_explicit_vectors() {
            let err = build_matrix(Bravais::Free, &LatticeParams::new(), None).unwrap_err();
            assert_eq!(err, LatticeError::MissingExplicitLattice);
        }

        #[test]
        fn free_lattice_scales_each_unit_to_angstrom() {
            let params = LatticeParams::new().with(Param::A, 2.0);
            let angs = ExplicitLattice::new(vectors(1.0), LengthUnit::Angstrom);
            let bohr = ExplicitLattice::new(vectors(1.0), LengthUnit::Bohr);
            let alat = ExplicitLattice::new(vectors(1.0), LengthUnit::Alat);

            let m = build_matrix(Bravais::Free, &params, Some(&angs)).unwrap();
            assert_row(&m, 2, [0.0, 0.0, 2.0], 1e-12);
            let m = build_matrix(Bravais::Free, &params, Some(&bohr)).unwrap();
            assert_row(&m, 0, [BOHR_RADIUS_ANGS, 0.0, 0.0], 1e-12);
            let m = build_matrix(Bravais::Free, &params, Some(&alat)).unwrap();
            assert_row(&m, 1, [0.0, 2.0, 0.0], 1e-12);
        }

        #[test]
        fn free_lattice_in_alat_without_a_fails() {
            let alat = ExplicitLattice::new(vectors(1.0), LengthUnit::Alat);
            let err = build_matrix(Bravais::Free, &LatticeParams::new(), Some(&alat)).unwrap_err();
            assert_eq!(err, LatticeError::MissingAlat);
        }

        #[test]
        fn singular_free_lattice_is_rejected() {
            let flat = ExplicitLattice::new(
                [Vector3::x(), Vector3::y(), Vector3::x() + Vector3::y()],
                LengthUnit::Angstrom,
            );
            let err = build_matrix(Bravais::Free, &LatticeParams::new(), Some(&flat)).unwrap_err();
            assert_eq!(err, LatticeError::SingularLattice);
        }

        #[test]
        fn explicit_lattice_round_trips_through_matrix() {
            let original = ExplicitLattice::new(vectors(1.5), LengthUnit::Bohr);
            let matrix = original.to_matrix(None).unwrap();
            let back = ExplicitLattice::from_matrix(&matrix, LengthUnit::Bohr, None).unwrap();
            for i in 0..3 {
                assert!((back.vectors[i] - original.vectors[i]).amax() < 1e-12);
            }
        }
    }

    mod extraction {
        use super::*;

        #[test]
        fn extraction_recovers_parameters_for_every_code() {
            for bravais in Bravais::ALL.into_iter().filter(|b| !b.is_free()) {
                let params = sample_params(bravais);
                let m = build_matrix(bravais, &params, None).unwrap();
                let recovered = extract_params(bravais, &m);
                assert!(
                    recovered.approx_eq(&params, bravais, 1e-6),
                    "{bravais}: {recovered:?} != {params:?}"
                );
            }
        }

        #[test]
        fn extraction_then_build_reproduces_the_matrix() {
            for bravais in Bravais::ALL.into_iter().filter(|b| !b.is_free()) {
                let m = build_matrix(bravais, &sample_params(bravais), None).unwrap();
                let rebuilt = build_matrix(bravais, &extract_params(bravais, &m), None).unwrap();
                assert!(matrices_close(&m, &rebuilt, 1e-9), "{bravais}");
            }
        }

        #[test]
        fn free_extraction_reports_first_vector_length() {
            let m = Matrix3::new(3.0, 4.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
            assert_eq!(extract_params(Bravais::Free, &m).a, Some(5.0));
        }
    }

    mod metrics {
        use super::*;

        #[test]
        fn hexagonal_metrics_have_gamma_120() {
            let params = LatticeParams::new().with(Param::A, 3.0).with(Param::C, 5.0);
            let m = build_matrix(Bravais::Hexagonal, &params, None).unwrap();
            let metrics = cell_metrics(&m);
            assert!((metrics.angles[0] - 90.0).abs() < 1e-9);
            assert!((metrics.angles[1] - 90.0).abs() < 1e-9);
            assert!((metrics.angles[2] - 120.0).abs() < 1e-9);
            let expected_volume = 3.0 * 3.0 * 3f64.sqrt() / 2.0 * 5.0;
            assert!((metrics.volume - expected_volume).abs() < 1e-9);
        }

        #[test]
        fn matrices_close_uses_absolute_elementwise_tolerance() {
            let m = Matrix3::identity();
            let mut n = m;
            n[(1, 2)] += 5e-7;
            assert!(matrices_close(&m, &n, 1e-6));
            assert!(!matrices_close(&m, &n, 1e-7));
        }
    }
}
