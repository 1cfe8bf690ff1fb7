//! Feature include levels.
//!
//! The server decides how much of a feature to send back based on these
//! flags: attributes, geometry, style and label can be requested separately.

use core::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Bit set of feature parts to include in a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureInclude(u8);

impl FeatureInclude {
    pub const NONE: FeatureInclude = FeatureInclude(0);
    pub const ATTRIBUTES: FeatureInclude = FeatureInclude(1);
    pub const GEOMETRY: FeatureInclude = FeatureInclude(2);
    pub const STYLE: FeatureInclude = FeatureInclude(4);
    pub const LABEL: FeatureInclude = FeatureInclude(8);
    pub const ALL: FeatureInclude = FeatureInclude(15);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: FeatureInclude) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: FeatureInclude) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FeatureInclude {
    type Output = FeatureInclude;

    fn bitor(self, rhs: Self) -> Self::Output {
        FeatureInclude(self.0 | rhs.0)
    }
}

impl BitOrAssign for FeatureInclude {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
