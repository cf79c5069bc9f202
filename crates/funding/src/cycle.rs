//! Funding-cycle configuration as it is passed to the terminal contracts.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use shared::{
    domain::ProjectId,
    protocol::{AbiType, CallArg},
};

use crate::currency::CurrencyOption;

/// Rates are expressed in perbicent: 200 is 100%.
pub const PERBICENT_ONE_HUNDRED: u64 = 200;
pub const RESERVED_RATE_WARNING_THRESHOLD_PERCENT: u64 = 90;

pub fn percent_to_perbicent(percent: u64) -> u64 {
    percent * PERBICENT_ONE_HUNDRED / 100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingCycleProperties {
    /// `U256::MAX` means the cycle has no funding target.
    pub target: U256,
    #[serde(default)]
    pub currency: CurrencyOption,
    /// Days; 0 lets the owner reconfigure at any time.
    pub duration: u64,
    #[serde(default)]
    pub cycle_limit: u64,
    #[serde(default)]
    pub discount_rate: u64,
    #[serde(default)]
    pub ballot: Address,
}

impl FundingCycleProperties {
    pub fn has_funding_target(&self) -> bool {
        self.target != U256::MAX
    }

    pub fn to_arg(&self) -> CallArg {
        let currency = if self.has_funding_target() {
            self.currency.index()
        } else {
            U256::ZERO
        };
        let discount_rate = if self.duration > 0 {
            self.discount_rate
        } else {
            0
        };

        CallArg::Tuple(vec![
            CallArg::uint256(self.target),
            CallArg::uint256(currency),
            CallArg::uint256(self.duration),
            CallArg::uint256(self.cycle_limit),
            CallArg::uint256(discount_rate),
            CallArg::Address(self.ballot),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FundingCycleMetadata {
    pub reserved_rate: u64,
    pub bonding_curve_rate: u64,
    pub reconfiguration_bonding_curve_rate: u64,
    pub pay_is_paused: bool,
    pub ticket_printing_is_allowed: bool,
    pub treasury_extension: Address,
}

impl FundingCycleMetadata {
    pub fn to_arg(&self) -> CallArg {
        CallArg::Tuple(vec![
            CallArg::uint256(self.reserved_rate),
            CallArg::uint256(self.bonding_curve_rate),
            CallArg::uint256(self.reconfiguration_bonding_curve_rate),
            CallArg::Bool(self.pay_is_paused),
            CallArg::Bool(self.ticket_printing_is_allowed),
            CallArg::Address(self.treasury_extension),
        ])
    }
}

/// Share of each payout sent to a wallet or another project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayoutMod {
    pub percent: u64,
    pub locked_until: Option<u64>,
    pub beneficiary: Option<Address>,
    pub project_id: Option<ProjectId>,
}

impl PayoutMod {
    pub fn abi_type() -> AbiType {
        AbiType::Tuple(vec![
            AbiType::Bool,
            AbiType::Uint(16),
            AbiType::Uint(48),
            AbiType::Address,
            AbiType::Address,
            AbiType::Uint(56),
        ])
    }

    pub fn to_arg(&self) -> CallArg {
        CallArg::Tuple(vec![
            CallArg::Bool(false),
            CallArg::uint(16, self.percent),
            CallArg::uint(48, self.locked_until.unwrap_or_default()),
            CallArg::Address(self.beneficiary.unwrap_or_default()),
            CallArg::Address(Address::ZERO),
            CallArg::uint(56, self.project_id.map_or(0, |id| id.0)),
        ])
    }
}

/// Share of reserved tickets sent to a wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketMod {
    pub percent: u64,
    pub locked_until: Option<u64>,
    pub beneficiary: Option<Address>,
}

impl TicketMod {
    pub fn abi_type() -> AbiType {
        AbiType::Tuple(vec![
            AbiType::Bool,
            AbiType::Uint(16),
            AbiType::Uint(48),
            AbiType::Address,
        ])
    }

    pub fn to_arg(&self) -> CallArg {
        CallArg::Tuple(vec![
            CallArg::Bool(false),
            CallArg::uint(16, self.percent),
            CallArg::uint(48, self.locked_until.unwrap_or_default()),
            CallArg::Address(self.beneficiary.unwrap_or_default()),
        ])
    }
}

pub fn payout_mods_arg(mods: &[PayoutMod]) -> CallArg {
    CallArg::array(
        PayoutMod::abi_type(),
        mods.iter().map(PayoutMod::to_arg).collect(),
    )
}

pub fn ticket_mods_arg(mods: &[TicketMod]) -> CallArg {
    CallArg::array(
        TicketMod::abi_type(),
        mods.iter().map(TicketMod::to_arg).collect(),
    )
}

/// Configuration choices contributors should be warned about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FundingCycleRiskFlags {
    pub duration: bool,
    pub ballot: bool,
    pub ticket_printing_allowed: bool,
    pub reserved_rate: bool,
}

impl FundingCycleRiskFlags {
    pub fn any(&self) -> bool {
        self.duration || self.ballot || self.ticket_printing_allowed || self.reserved_rate
    }

    pub fn count(&self) -> usize {
        [
            self.duration,
            self.ballot,
            self.ticket_printing_allowed,
            self.reserved_rate,
        ]
        .into_iter()
        .filter(|flag| *flag)
        .count()
    }
}

pub fn risk_flags(
    properties: &FundingCycleProperties,
    metadata: &FundingCycleMetadata,
) -> FundingCycleRiskFlags {
    FundingCycleRiskFlags {
        duration: properties.duration == 0,
        ballot: properties.ballot == Address::ZERO,
        ticket_printing_allowed: metadata.ticket_printing_is_allowed,
        reserved_rate: metadata.reserved_rate
            >= percent_to_perbicent(RESERVED_RATE_WARNING_THRESHOLD_PERCENT),
    }
}

/// Warning sentences for the raised flags, in flag order.
pub fn warning_text(
    flags: &FundingCycleRiskFlags,
    metadata: &FundingCycleMetadata,
) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if flags.duration {
        warnings.push(
            "The project owner may reconfigure this funding cycle at any time, without notice.",
        );
    }
    if flags.ballot {
        warnings.push(
            "Funding cycles can be reconfigured moments before a new cycle begins, without notifying contributors.",
        );
    }
    if flags.ticket_printing_allowed {
        warnings.push(
            "The project owner may mint any supply of tokens at any time, diluting the token share of all existing contributors.",
        );
    }
    if flags.reserved_rate {
        warnings.push(if metadata.reserved_rate >= PERBICENT_ONE_HUNDRED {
            "Contributors will not receive any tokens in exchange for paying this project."
        } else {
            "Contributors will receive a relatively small portion of tokens in exchange for paying this project."
        });
    }
    warnings
}

#[cfg(test)]
#[path = "tests/cycle_tests.rs"]
mod tests;
