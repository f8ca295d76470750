use super::error::LatticeError;
use std::fmt;

/// One of the six free scalar lattice parameters.
///
/// Lengths are in Angstrom; the three angles are stored as cosines of the angle
/// between the named pair of lattice vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    A,
    B,
    C,
    CosAB,
    CosAC,
    CosBC,
}

impl Param {
    pub const ALL: [Param; 6] = [
        Param::A,
        Param::B,
        Param::C,
        Param::CosAB,
        Param::CosAC,
        Param::CosBC,
    ];

    pub fn is_length(self) -> bool {
        matches!(self, Param::A | Param::B | Param::C)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Param::A => "A",
            Param::B => "B",
            Param::C => "C",
            Param::CosAB => "cosAB",
            Param::CosAC => "cosAC",
            Param::CosBC => "cosBC",
        })
    }
}

/// Bravais-lattice type, identified by its `ibrav` code.
///
/// Signed variants select an alternate axis convention for the same lattice type.
/// [`Bravais::Free`] means the lattice vectors are given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bravais {
    /// `0`: free lattice, vectors given explicitly.
    Free,
    /// `1`: simple cubic.
    CubicP,
    /// `2`: face-centered cubic.
    CubicF,
    /// `3`: body-centered cubic.
    CubicI,
    /// `4`: hexagonal, or trigonal P.
    Hexagonal,
    /// `5`: trigonal R, threefold axis along z.
    TrigonalR,
    /// `-5`: trigonal R, threefold axis along <111>.
    TrigonalR111,
    /// `6`: simple tetragonal.
    TetragonalP,
    /// `7`: body-centered tetragonal.
    TetragonalI,
    /// `8`: simple orthorhombic.
    OrthorhombicP,
    /// `9`: base-centered orthorhombic (C face).
    OrthorhombicC,
    /// `-9`: base-centered orthorhombic, alternate vector choice.
    OrthorhombicCAlt,
    /// `91`: one-face base-centered orthorhombic (A face).
    OrthorhombicA,
    /// `10`: face-centered orthorhombic.
    OrthorhombicF,
    /// `11`: body-centered orthorhombic.
    OrthorhombicI,
    /// `12`: monoclinic P, unique axis c.
    MonoclinicP,
    /// `-12`: monoclinic P, unique axis b.
    MonoclinicPUniqueB,
    /// `13`: base-centered monoclinic, unique axis c.
    MonoclinicC,
    /// `-13`: base-centered monoclinic, unique axis b.
    MonoclinicCUniqueB,
    /// `14`: triclinic.
    Triclinic,
}

impl Bravais {
    /// Every supported code, in ascending order of `|ibrav|`.
    pub const ALL: [Bravais; 20] = [
        Bravais::Free,
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

    pub fn code(self) -> i32 {
        match self {
            Bravais::Free => 0,
            Bravais::CubicP => 1,
            Bravais::CubicF => 2,
            Bravais::CubicI => 3,
            Bravais::Hexagonal => 4,
            Bravais::TrigonalR => 5,
            Bravais::TrigonalR111 => -5,
            Bravais::TetragonalP => 6,
            Bravais::TetragonalI => 7,
            Bravais::OrthorhombicP => 8,
            Bravais::OrthorhombicC => 9,
            Bravais::OrthorhombicCAlt => -9,
            Bravais::OrthorhombicA => 91,
            Bravais::OrthorhombicF => 10,
            Bravais::OrthorhombicI => 11,
            Bravais::MonoclinicP => 12,
            Bravais::MonoclinicPUniqueB => -12,
            Bravais::MonoclinicC => 13,
            Bravais::MonoclinicCUniqueB => -13,
            Bravais::Triclinic => 14,
        }
    }

    /// The parameters the canonical construction reads for this lattice type.
    pub fn required(self) -> &'static [Param] {
        use Param::*;
        match self {
            Bravais::Free => &[],
            Bravais::CubicP | Bravais::CubicF | Bravais::CubicI => &[A],
            Bravais::TrigonalR | Bravais::TrigonalR111 => &[A, CosAB],
            Bravais::Hexagonal | Bravais::TetragonalP | Bravais::TetragonalI => &[A, C],
            Bravais::OrthorhombicP
            | Bravais::OrthorhombicC
            | Bravais::OrthorhombicCAlt
            | Bravais::OrthorhombicA
            | Bravais::OrthorhombicF
            | Bravais::OrthorhombicI => &[A, B, C],
            Bravais::MonoclinicP | Bravais::MonoclinicC => &[A, B, C, CosAB],
            Bravais::MonoclinicPUniqueB | Bravais::MonoclinicCUniqueB => &[A, B, C, CosAC],
            Bravais::Triclinic => &[A, B, C, CosAB, CosAC, CosBC],
        }
    }

    pub fn requires(self, param: Param) -> bool {
        self.required().contains(&param)
    }

    pub fn is_free(self) -> bool {
        self == Bravais::Free
    }

    /// The `celldm` slot (1-based) that carries the given cosine for this lattice type.
    ///
    /// Slot 1 holds `a` in Bohr, slots 2 and 3 the ratios `b/a` and `c/a`.
    pub fn celldm_slot(self, param: Param) -> Option<usize> {
        match param {
            Param::A => Some(1),
            Param::B => Some(2),
            Param::C => Some(3),
            Param::CosAB => match self {
                Bravais::Triclinic => Some(6),
                Bravais::MonoclinicPUniqueB | Bravais::MonoclinicCUniqueB => None,
                _ => Some(4),
            },
            Param::CosAC => match self {
                Bravais::Triclinic | Bravais::MonoclinicPUniqueB | Bravais::MonoclinicCUniqueB => {
                    Some(5)
                }
                _ => None,
            },
            Param::CosBC => match self {
                Bravais::Triclinic => Some(4),
                _ => None,
            },
        }
    }
}

impl TryFrom<i32> for Bravais {
    type Error = LatticeError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Bravais::ALL
            .iter()
            .copied()
            .find(|b| b.code() == code)
            .ok_or(LatticeError::UnsupportedCode(code))
    }
}

impl fmt::Display for Bravais {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ibrav={}", self.code())
    }
}
