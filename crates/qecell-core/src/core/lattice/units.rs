use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of one Bohr radius in Angstrom.
pub const BOHR_RADIUS_ANGS: f64 = 0.52917720859;

/// Unit in which the three explicit lattice vectors are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Multiples of the first lattice parameter `a`.
    #[default]
    Alat,
    Bohr,
    Angstrom,
}

impl LengthUnit {
    /// Returns the factor that converts a length in this unit to Angstrom.
    ///
    /// `alat` must be given in Angstrom; it is only consulted for [`LengthUnit::Alat`].
    pub fn to_angstrom(self, alat: Option<f64>) -> Option<f64> {
        match self {
            LengthUnit::Alat => alat.filter(|a| *a > 0.0),
            LengthUnit::Bohr => Some(BOHR_RADIUS_ANGS),
            LengthUnit::Angstrom => Some(1.0),
        }
    }
}

/// Unit in which atomic positions are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomicUnit {
    #[default]
    Alat,
    Bohr,
    Angstrom,
    /// Fractional coordinates along the lattice vectors.
    Crystal,
}

impl AtomicUnit {
    /// Whether a stored coordinate in this unit moves together with the lattice.
    pub fn is_lattice_dependent(self) -> bool {
        matches!(self, AtomicUnit::Alat | AtomicUnit::Crystal)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown unit '{0}'")]
pub struct ParseUnitError(pub String);

fn normalize(s: &str) -> String {
    s.trim()
        .trim_matches(|c| c == '(' || c == ')' || c == '{' || c == '}')
        .to_ascii_lowercase()
}

impl FromStr for LengthUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "alat" => Ok(LengthUnit::Alat),
            "bohr" => Ok(LengthUnit::Bohr),
            "angstrom" => Ok(LengthUnit::Angstrom),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

impl FromStr for AtomicUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "alat" => Ok(AtomicUnit::Alat),
            "bohr" => Ok(AtomicUnit::Bohr),
            "angstrom" => Ok(AtomicUnit::Angstrom),
            "crystal" => Ok(AtomicUnit::Crystal),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LengthUnit::Alat => "alat",
            LengthUnit::Bohr => "bohr",
            LengthUnit::Angstrom => "angstrom",
        })
    }
}

impl fmt::Display for AtomicUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AtomicUnit::Alat => "alat",
            AtomicUnit::Bohr => "bohr",
            AtomicUnit::Angstrom => "angstrom",
            AtomicUnit::Crystal => "crystal",
        })
    }
}
