use super::units::{AtomicUnit, BOHR_RADIUS_ANGS};
use nalgebra::{Matrix3, Point3, Vector3};

/// Everything needed to move atomic coordinates between units.
///
/// Either piece may be missing while a lattice description is incomplete; a
/// conversion that needs a missing piece yields `None` instead of a partial result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    lattice: Option<Matrix3<f64>>,
    /// `(L^T)^-1`, mapping Cartesian positions to fractional coordinates.
    inverse: Option<Matrix3<f64>>,
    alat: Option<f64>,
}

impl Basis {
    /// Creates a basis from an Angstrom lattice matrix (rows are vectors) and `alat`.
    pub fn new(lattice: Option<Matrix3<f64>>, alat: Option<f64>) -> Self {
        let inverse = lattice.and_then(|m| m.transpose().try_inverse());
        Self {
            lattice,
            inverse,
            alat: alat.filter(|a| a.is_finite() && *a > 0.0),
        }
    }

    pub fn lattice(&self) -> Option<&Matrix3<f64>> {
        self.lattice.as_ref()
    }

    pub fn alat(&self) -> Option<f64> {
        self.alat
    }

    /// Whether coordinates in `unit` can be converted in both directions.
    pub fn supports(&self, unit: AtomicUnit) -> bool {
        match unit {
            AtomicUnit::Crystal => self.lattice.is_some() && self.inverse.is_some(),
            AtomicUnit::Alat => self.alat.is_some(),
            AtomicUnit::Bohr | AtomicUnit::Angstrom => true,
        }
    }

    /// Converts coordinates written in `unit` to a Cartesian position in Angstrom.
    ///
    /// # Formula
    /// ```text
    /// Cartesian = Lattice^T x Fractional
    /// ```
    pub fn to_cartesian(&self, coords: &Vector3<f64>, unit: AtomicUnit) -> Option<Point3<f64>> {
        let cartesian = match unit {
            AtomicUnit::Crystal => {
                let lattice = self.lattice.filter(|_| self.inverse.is_some())?;
                lattice.transpose() * coords
            }
            AtomicUnit::Alat => coords * self.alat?,
            AtomicUnit::Bohr => coords * BOHR_RADIUS_ANGS,
            AtomicUnit::Angstrom => *coords,
        };
        Some(Point3::from(cartesian))
    }

    /// Converts a Cartesian position in Angstrom to coordinates in `unit`.
    ///
    /// # Formula
    /// ```text
    /// Fractional = (Lattice^T)^-1 x Cartesian
    /// ```
    pub fn from_cartesian(&self, position: &Point3<f64>, unit: AtomicUnit) -> Option<Vector3<f64>> {
        let cartesian = position.coords;
        match unit {
            AtomicUnit::Crystal => Some(self.inverse? * cartesian),
            AtomicUnit::Alat => Some(cartesian / self.alat?),
            AtomicUnit::Bohr => Some(cartesian / BOHR_RADIUS_ANGS),
            AtomicUnit::Angstrom => Some(cartesian),
        }
    }

    /// Re-expresses coordinates from one unit in another through Cartesian space.
    pub fn convert(
        &self,
        coords: &Vector3<f64>,
        from: AtomicUnit,
        to: AtomicUnit,
    ) -> Option<Vector3<f64>> {
        if from == to {
            return Some(*coords);
        }
        let position = self.to_cartesian(coords, from)?;
        self.from_cartesian(&position, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed() -> Matrix3<f64> {
        Matrix3::new(4.0, 0.0, 0.0, 2.0, 3.46, 0.0, 0.0, 0.0, 5.0)
    }

    #[test]
    fn crystal_coordinates_map_through_lattice_rows() {
        let basis = Basis::new(Some(skewed()), None);
        let cart = basis
            .to_cartesian(&Vector3::new(0.5, 0.5, 0.5), AtomicUnit::Crystal)
            .unwrap();
        assert!((cart.x - 3.0).abs() < 1e-12);
        assert!((cart.y - 1.73).abs() < 1e-12);
        assert!((cart.z - 2.5).abs() < 1e-12);
    }

    #[test]
    fn fractional_round_trip_on_skewed_lattice() {
        let basis = Basis::new(Some(skewed()), Some(4.0));
        let frac = Vector3::new(0.333, 0.667, 0.25);
        let cart = basis.to_cartesian(&frac, AtomicUnit::Crystal).unwrap();
        let back = basis.from_cartesian(&cart, AtomicUnit::Crystal).unwrap();
        assert!((back - frac).amax() < 1e-12);
    }

    #[test]
    fn alat_and_bohr_scale_isotropically() {
        let basis = Basis::new(None, Some(2.0));
        let v = Vector3::new(1.0, -1.0, 0.5);
        let cart = basis.to_cartesian(&v, AtomicUnit::Alat).unwrap();
        assert_eq!(cart, Point3::new(2.0, -2.0, 1.0));
        let bohr = basis.from_cartesian(&cart, AtomicUnit::Bohr).unwrap();
        assert!((bohr.x - 2.0 / BOHR_RADIUS_ANGS).abs() < 1e-12);
    }

    #[test]
    fn missing_pieces_yield_none_instead_of_partial_results() {
        let basis = Basis::new(None, None);
        let v = Vector3::new(0.1, 0.2, 0.3);
        assert!(basis.to_cartesian(&v, AtomicUnit::Crystal).is_none());
        assert!(basis.to_cartesian(&v, AtomicUnit::Alat).is_none());
        assert!(basis.to_cartesian(&v, AtomicUnit::Angstrom).is_some());
        assert!(!basis.supports(AtomicUnit::Crystal));
        assert!(basis.supports(AtomicUnit::Bohr));
    }

    #[test]
    fn singular_lattice_does_not_support_crystal_units() {
        let flat = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0);
        let basis = Basis::new(Some(flat), Some(1.0));
        assert!(!basis.supports(AtomicUnit::Crystal));
        assert!(basis.to_cartesian(&Vector3::x(), AtomicUnit::Crystal).is_none());
    }

    #[test]
    fn non_positive_alat_is_discarded() {
        assert_eq!(Basis::new(None, Some(0.0)).alat(), None);
        assert_eq!(Basis::new(None, Some(-3.0)).alat(), None);
    }

    #[test]
    fn convert_between_crystal_and_alat() {
        let lattice = Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 4.0);
        let basis = Basis::new(Some(lattice), Some(2.0));
        let alat = basis
            .convert(&Vector3::new(0.5, 0.5, 0.5), AtomicUnit::Crystal, AtomicUnit::Alat)
            .unwrap();
        assert!((alat - Vector3::new(0.5, 0.5, 1.0)).amax() < 1e-12);
    }
}
