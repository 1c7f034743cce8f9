//! # Hardfork Names and Ordering
//!
//! The canonical hardfork sequence. Ordering comparisons (`gte_hardfork`)
//! rely on the declaration order of this enum.

use crate::errors::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named protocol upgrades, in activation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hardfork {
    /// Frontier / genesis rules.
    Chainstart,
    /// EIP-2, EIP-7.
    Homestead,
    /// EIP-150 gas repricing.
    TangerineWhistle,
    /// EIP-155/160/161/170.
    SpuriousDragon,
    /// Byzantium precompiles and REVERT.
    Byzantium,
    /// Constantinople opcodes (shifted to Petersburg on mainnet).
    Constantinople,
    /// Constantinople minus EIP-1283.
    Petersburg,
    /// Istanbul repricing round.
    Istanbul,
    /// Difficulty-bomb delay only.
    MuirGlacier,
    /// Access lists and typed transactions.
    Berlin,
    /// EIP-1559 fee market.
    London,
    /// Difficulty-bomb delay only.
    ArrowGlacier,
    /// Difficulty-bomb delay only.
    GrayGlacier,
    /// The merge; selected by total difficulty.
    Paris,
    /// Withdrawals, PUSH0, initcode metering.
    Shanghai,
    /// Blobs, transient storage, MCOPY, SELFDESTRUCT restriction.
    Cancun,
}

/// Every hardfork, in order.
pub const ALL_HARDFORKS: [Hardfork; 16] = [
    Hardfork::Chainstart,
    Hardfork::Homestead,
    Hardfork::TangerineWhistle,
    Hardfork::SpuriousDragon,
    Hardfork::Byzantium,
    Hardfork::Constantinople,
    Hardfork::Petersburg,
    Hardfork::Istanbul,
    Hardfork::MuirGlacier,
    Hardfork::Berlin,
    Hardfork::London,
    Hardfork::ArrowGlacier,
    Hardfork::GrayGlacier,
    Hardfork::Paris,
    Hardfork::Shanghai,
    Hardfork::Cancun,
];

impl Hardfork {
    /// Canonical lower-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Chainstart => "chainstart",
            Self::Homestead => "homestead",
            Self::TangerineWhistle => "tangerineWhistle",
            Self::SpuriousDragon => "spuriousDragon",
            Self::Byzantium => "byzantium",
            Self::Constantinople => "constantinople",
            Self::Petersburg => "petersburg",
            Self::Istanbul => "istanbul",
            Self::MuirGlacier => "muirGlacier",
            Self::Berlin => "berlin",
            Self::London => "london",
            Self::ArrowGlacier => "arrowGlacier",
            Self::GrayGlacier => "grayGlacier",
            Self::Paris => "paris",
            Self::Shanghai => "shanghai",
            Self::Cancun => "cancun",
        }
    }

    /// Looks a hardfork up by its canonical name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHardfork` for unrecognized names.
    pub fn from_name(name: &str) -> Result<Self, CommonError> {
        ALL_HARDFORKS
            .iter()
            .copied()
            .find(|hf| hf.name() == name)
            .ok_or_else(|| CommonError::UnknownHardfork(name.to_string()))
    }

    /// EIPs introduced by this hardfork (non-cumulative).
    #[must_use]
    pub fn introduced_eips(self) -> &'static [u64] {
        match self {
            Self::Chainstart => &[],
            Self::Homestead => &[2, 7],
            Self::TangerineWhistle => &[150],
            Self::SpuriousDragon => &[155, 160, 161, 170],
            Self::Byzantium => &[100, 140, 196, 197, 198, 211, 214, 649, 658],
            Self::Constantinople => &[145, 1014, 1052, 1234, 1283],
            Self::Petersburg => &[],
            Self::Istanbul => &[152, 1108, 1344, 1884, 2028, 2200],
            Self::MuirGlacier => &[2384],
            Self::Berlin => &[2565, 2718, 2929, 2930],
            Self::London => &[1559, 3198, 3529, 3541],
            Self::ArrowGlacier => &[4345],
            Self::GrayGlacier => &[5133],
            Self::Paris => &[3675, 4399],
            Self::Shanghai => &[3651, 3855, 3860, 4895],
            Self::Cancun => &[1153, 4788, 4844, 5656, 6780],
        }
    }
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_history() {
        assert!(Hardfork::Chainstart < Hardfork::Homestead);
        assert!(Hardfork::Berlin < Hardfork::London);
        assert!(Hardfork::Paris < Hardfork::Shanghai);
        assert!(Hardfork::Shanghai < Hardfork::Cancun);
    }

    #[test]
    fn name_round_trip() {
        for hf in ALL_HARDFORKS {
            assert_eq!(Hardfork::from_name(hf.name()).unwrap(), hf);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            Hardfork::from_name("osaka"),
            Err(CommonError::UnknownHardfork(_))
        ));
    }

    #[test]
    fn cancun_introduces_blob_eips() {
        let eips = Hardfork::Cancun.introduced_eips();
        assert!(eips.contains(&4844));
        assert!(eips.contains(&1153));
        assert!(eips.contains(&6780));
    }
}
