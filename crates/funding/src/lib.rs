pub mod contracts;
pub mod currency;
pub mod cycle;
pub mod deploy;
pub mod error;
pub mod rewards;
pub mod wad;

pub use contracts::{ContractName, Contracts};
pub use currency::CurrencyOption;
pub use error::{ContractsError, DeployError, WadError};
