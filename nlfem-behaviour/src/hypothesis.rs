use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Modelling hypothesis shared by a discretization and the behaviours attached to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hypothesis {
    PlaneStrain,
    Axisymmetrical,
    Tridimensional,
}

impl Hypothesis {
    /// Dimension of the mesh the hypothesis applies to.
    pub fn space_dimension(&self) -> usize {
        match self {
            Self::PlaneStrain | Self::Axisymmetrical => 2,
            Self::Tridimensional => 3,
        }
    }

    /// Number of components of a symmetric tensor under this hypothesis.
    ///
    /// Two-dimensional hypotheses keep the out-of-plane normal component, so that
    /// the components are ordered `(xx, yy, zz, xy)` in 2D and `(xx, yy, zz, xy, xz, yz)` in 3D.
    pub fn stensor_size(&self) -> usize {
        match self {
            Self::PlaneStrain | Self::Axisymmetrical => 4,
            Self::Tridimensional => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlaneStrain => "PlaneStrain",
            Self::Axisymmetrical => "Axisymmetrical",
            Self::Tridimensional => "Tridimensional",
        }
    }
}

impl Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownHypothesis(pub String);

impl Display for UnknownHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown modelling hypothesis '{}'", self.0)
    }
}

impl std::error::Error for UnknownHypothesis {}

impl FromStr for Hypothesis {
    type Err = UnknownHypothesis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PlaneStrain" => Ok(Self::PlaneStrain),
            "Axisymmetrical" => Ok(Self::Axisymmetrical),
            "Tridimensional" => Ok(Self::Tridimensional),
            other => Err(UnknownHypothesis(other.to_string())),
        }
    }
}
