use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use shared::domain::Endpoint;

use crate::error::ContractsError;

/// Event signatures the protocol contracts emit.
pub mod events {
    pub const PAY: &str = "Pay(uint256,uint256,address,uint256,string,address)";
    pub const REDEEM: &str = "Redeem(address,address,uint256,uint256,uint256,address)";
    pub const TAP: &str =
        "Tap(uint256,uint256,address,uint256,uint256,uint256,uint256,uint256,string,address)";
    pub const ISSUE: &str = "Issue(uint256,string,string,address)";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractName {
    TerminalV1,
    TerminalV1_1,
    TicketBooth,
    Projects,
}

impl ContractName {
    pub const ALL: [ContractName; 4] = [
        ContractName::TerminalV1,
        ContractName::TerminalV1_1,
        ContractName::TicketBooth,
        ContractName::Projects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TerminalV1 => "TerminalV1",
            Self::TerminalV1_1 => "TerminalV1_1",
            Self::TicketBooth => "TicketBooth",
            Self::Projects => "Projects",
        }
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractName {
    type Err = ContractsError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ContractsError::UnknownName(name.to_string()))
    }
}

/// Deployed protocol contracts for one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contracts {
    addresses: BTreeMap<ContractName, Address>,
}

impl Contracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: ContractName, address: Address) -> Self {
        self.insert(name, address);
        self
    }

    pub fn insert(&mut self, name: ContractName, address: Address) {
        self.addresses.insert(name, address);
    }

    pub fn address(&self, name: ContractName) -> Result<Address, ContractsError> {
        self.addresses
            .get(&name)
            .copied()
            .ok_or(ContractsError::Missing(name))
    }

    pub fn endpoint(&self, name: ContractName) -> Result<Endpoint, ContractsError> {
        Ok(Endpoint::new(name.as_str(), self.address(name)?))
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Builds a registry from a name-to-address table, e.g. a config section.
    pub fn from_table<'a>(
        table: impl IntoIterator<Item = (&'a String, &'a Address)>,
    ) -> Result<Self, ContractsError> {
        let mut contracts = Self::new();
        for (name, address) in table {
            contracts.insert(name.parse()?, *address);
        }
        Ok(contracts)
    }
}

#[cfg(test)]
#[path = "tests/contracts_tests.rs"]
mod tests;
