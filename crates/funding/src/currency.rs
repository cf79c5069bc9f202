use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Currency a funding target is denominated in, by on-chain index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyOption {
    #[default]
    Eth = 0,
    Usd = 1,
}

impl CurrencyOption {
    pub fn name(self) -> &'static str {
        match self {
            Self::Eth => "WETH",
            Self::Usd => "USD",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eth => "Ξ",
            Self::Usd => "$",
        }
    }

    pub fn index(self) -> U256 {
        U256::from(self as u8)
    }

    pub fn from_index(index: U256) -> Option<Self> {
        if index == U256::ZERO {
            Some(Self::Eth)
        } else if index == U256::from(1u8) {
            Some(Self::Usd)
        } else {
            None
        }
    }
}

impl fmt::Display for CurrencyOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_symbols() {
        assert_eq!(CurrencyOption::Eth.name(), "WETH");
        assert_eq!(CurrencyOption::Eth.to_string(), "WETH");
        assert_eq!(CurrencyOption::Eth.symbol(), "Ξ");
        assert_eq!(CurrencyOption::Usd.name(), "USD");
        assert_eq!(CurrencyOption::Usd.symbol(), "$");
    }

    #[test]
    fn index_round_trips_known_currencies() {
        assert_eq!(CurrencyOption::Usd.index(), U256::from(1u8));
        assert_eq!(
            CurrencyOption::from_index(U256::ZERO),
            Some(CurrencyOption::Eth)
        );
        assert_eq!(CurrencyOption::from_index(U256::from(2u8)), None);
    }
}
