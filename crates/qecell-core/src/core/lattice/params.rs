use super::bravais::{Bravais, Param};
use super::error::LatticeError;
use super::units::BOHR_RADIUS_ANGS;

/// The six free scalar lattice parameters, each optional.
///
/// Lengths are in Angstrom. Which members are meaningful depends on the
/// [`Bravais`] type; see [`Bravais::required`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatticeParams {
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub cos_ab: Option<f64>,
    pub cos_ac: Option<f64>,
    pub cos_bc: Option<f64>,
}

impl LatticeParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, param: Param, value: f64) -> Self {
        self.set(param, Some(value));
        self
    }

    pub fn get(&self, param: Param) -> Option<f64> {
        match param {
            Param::A => self.a,
            Param::B => self.b,
            Param::C => self.c,
            Param::CosAB => self.cos_ab,
            Param::CosAC => self.cos_ac,
            Param::CosBC => self.cos_bc,
        }
    }

    pub fn set(&mut self, param: Param, value: Option<f64>) {
        let slot = match param {
            Param::A => &mut self.a,
            Param::B => &mut self.b,
            Param::C => &mut self.c,
            Param::CosAB => &mut self.cos_ab,
            Param::CosAC => &mut self.cos_ac,
            Param::CosBC => &mut self.cos_bc,
        };
        *slot = value;
    }

    /// Returns a copy holding only the parameters `bravais` requires.
    pub fn canonical(&self, bravais: Bravais) -> Self {
        let mut out = Self::default();
        for &param in bravais.required() {
            out.set(param, self.get(param));
        }
        out
    }

    /// Fetches a required parameter, failing with [`LatticeError::MissingParameter`].
    pub fn require(&self, bravais: Bravais, param: Param) -> Result<f64, LatticeError> {
        self.get(param)
            .filter(|v| v.is_finite())
            .ok_or(LatticeError::MissingParameter {
                code: bravais.code(),
                param,
            })
    }

    /// Converts from the `celldm(1..6)` form.
    ///
    /// `celldm[0]` is `a` in Bohr, `celldm[1]` and `celldm[2]` are the ratios `b/a`
    /// and `c/a`, and the cosine slots depend on the lattice type.
    pub fn from_celldm(bravais: Bravais, celldm: &[Option<f64>; 6]) -> Self {
        let a = celldm[0].map(|v| v * BOHR_RADIUS_ANGS);
        let mut params = Self {
            a,
            ..Self::default()
        };
        if let Some(a) = a {
            params.b = celldm[1].map(|ratio| ratio * a);
            params.c = celldm[2].map(|ratio| ratio * a);
        }
        for param in [Param::CosAB, Param::CosAC, Param::CosBC] {
            if let Some(slot) = bravais.celldm_slot(param) {
                params.set(param, celldm[slot - 1]);
            }
        }
        params
    }

    /// Converts to the `celldm(1..6)` form for the given lattice type.
    ///
    /// Only the parameters `bravais` requires are emitted (plus `a` for a free
    /// lattice, where it defines `alat`).
    pub fn to_celldm(&self, bravais: Bravais) -> [Option<f64>; 6] {
        let mut celldm = [None; 6];
        celldm[0] = self.a.map(|a| a / BOHR_RADIUS_ANGS);
        let a = self.a.filter(|a| *a != 0.0);
        for &param in bravais.required() {
            let Some(slot) = bravais.celldm_slot(param) else {
                continue;
            };
            let value = match param {
                Param::A => continue,
                Param::B | Param::C => a.and_then(|a| self.get(param).map(|v| v / a)),
                _ => self.get(param),
            };
            celldm[slot - 1] = value;
        }
        celldm
    }

    /// Compares the parameters `bravais` requires with a relative tolerance.
    pub fn approx_eq(&self, other: &Self, bravais: Bravais, rel_tol: f64) -> bool {
        bravais.required().iter().all(|&param| {
            match (self.get(param), other.get(param)) {
                (Some(x), Some(y)) => {
                    let scale = if param.is_length() {
                        x.abs().max(y.abs()).max(1.0)
                    } else {
                        1.0
                    };
                    (x - y).abs() <= rel_tol * scale
                }
                (None, None) => true,
                _ => false,
            }
        })
    }
}
