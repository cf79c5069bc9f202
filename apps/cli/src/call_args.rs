//! Command-line spelling of typed call arguments and return values.

use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::{anyhow, bail, Context};
use clap::ValueEnum;
use funding::{wad::format_wad, ContractName, Contracts};
use ledger_client::abi::{bytes32_from_str, parse_uint, AbiDecode};
use shared::{domain::Endpoint, protocol::CallArg};

/// Parses `type:value`, e.g. `uint256:100`, `address:0xabc..`, `bytes32:handle`.
pub fn parse_call_arg(raw: &str) -> anyhow::Result<CallArg> {
    let (ty, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("argument '{raw}' must be written as type:value"))?;

    match ty {
        "address" => Ok(CallArg::Address(
            value
                .parse()
                .with_context(|| format!("'{value}' is not an address"))?,
        )),
        "bool" => Ok(CallArg::Bool(
            value
                .parse()
                .with_context(|| format!("'{value}' is not a bool"))?,
        )),
        "string" => Ok(CallArg::String(value.to_string())),
        "bytes" => Ok(CallArg::Bytes(
            value
                .parse::<Bytes>()
                .with_context(|| format!("'{value}' is not hex bytes"))?,
        )),
        "bytes32" => match value.parse::<B256>() {
            Ok(word) => Ok(CallArg::FixedBytes32(word)),
            Err(_) => Ok(CallArg::FixedBytes32(bytes32_from_str(value)?)),
        },
        uint if uint.starts_with("uint") => {
            let bits = match &uint[4..] {
                "" => 256,
                width => width
                    .parse::<u16>()
                    .with_context(|| format!("invalid integer type '{uint}'"))?,
            };
            Ok(CallArg::uint(bits, parse_uint(value)?))
        }
        other => bail!("unsupported argument type '{other}'"),
    }
}

/// A contract name from the registry, or a raw address.
pub fn resolve_endpoint(contracts: &Contracts, target: &str) -> anyhow::Result<Endpoint> {
    if let Ok(address) = target.parse::<Address>() {
        return Ok(Endpoint::new(target, address));
    }
    let name: ContractName = target.parse()?;
    Ok(contracts.endpoint(name)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReturnKind {
    Uint256,
    Wad,
    Address,
    Bool,
    String,
    Bytes32,
}

/// Decoded return value ready for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Uint(U256),
    Wad(U256),
    Address(Address),
    Bool(bool),
    Text(String),
    Word(B256),
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(value) => write!(f, "{value}"),
            Self::Wad(value) => f.write_str(&format_wad(*value)),
            Self::Address(address) => write!(f, "{address}"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Text(text) => f.write_str(text),
            Self::Word(word) => write!(f, "{word}"),
        }
    }
}

impl ReturnKind {
    pub fn decode(self, raw: &[u8]) -> anyhow::Result<Rendered> {
        Ok(match self {
            Self::Uint256 => Rendered::Uint(U256::abi_decode(raw)?),
            Self::Wad => Rendered::Wad(U256::abi_decode(raw)?),
            Self::Address => Rendered::Address(Address::abi_decode(raw)?),
            Self::Bool => Rendered::Bool(bool::abi_decode(raw)?),
            Self::String => Rendered::Text(String::abi_decode(raw)?),
            Self::Bytes32 => Rendered::Word(B256::abi_decode(raw)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_arguments() {
        assert_eq!(
            parse_call_arg("uint256:100").expect("uint"),
            CallArg::uint256(100u64)
        );
        assert_eq!(
            parse_call_arg("uint16:0x10").expect("uint16"),
            CallArg::uint(16, 16u64)
        );
        assert_eq!(
            parse_call_arg("uint:7").expect("uint"),
            CallArg::uint256(7u64)
        );
        assert_eq!(
            parse_call_arg("bool:true").expect("bool"),
            CallArg::Bool(true)
        );
        assert_eq!(
            parse_call_arg("string:a:b").expect("string"),
            CallArg::String("a:b".into())
        );
        assert_eq!(
            parse_call_arg("address:0x0000000000000000000000000000000000000abc")
                .expect("address"),
            CallArg::Address(
                "0x0000000000000000000000000000000000000abc"
                    .parse()
                    .expect("address")
            )
        );
    }

    #[test]
    fn bytes32_accepts_text_or_hex() {
        let CallArg::FixedBytes32(word) = parse_call_arg("bytes32:moon").expect("bytes32") else {
            panic!("expected bytes32");
        };
        assert_eq!(&word[..4], b"moon");
        assert_eq!(
            parse_call_arg(&format!("bytes32:{}", B256::repeat_byte(0x11))).expect("hex"),
            CallArg::FixedBytes32(B256::repeat_byte(0x11))
        );
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(parse_call_arg("100").is_err());
        assert!(parse_call_arg("int256:-1").is_err());
        assert!(parse_call_arg("uint256:-1").is_err());
        assert!(parse_call_arg("address:alice").is_err());
    }

    #[test]
    fn endpoints_resolve_by_name_or_address() {
        let contracts = Contracts::new().with(ContractName::TerminalV1, Address::repeat_byte(0x01));

        let named = resolve_endpoint(&contracts, "TerminalV1").expect("named");
        assert_eq!(named.address, Address::repeat_byte(0x01));

        let raw = format!("{}", Address::repeat_byte(0x02));
        let direct = resolve_endpoint(&contracts, &raw).expect("raw");
        assert_eq!(direct.address, Address::repeat_byte(0x02));

        assert!(resolve_endpoint(&contracts, "TicketBooth").is_err());
    }

    #[test]
    fn renders_wad_values() {
        let raw = U256::from(1_500_000_000_000_000_000u128).to_be_bytes::<32>();
        assert_eq!(
            ReturnKind::Wad.decode(&raw).expect("wad").to_string(),
            "1.5"
        );
        assert_eq!(
            ReturnKind::Uint256.decode(&raw).expect("uint").to_string(),
            "1500000000000000000"
        );
    }
}
