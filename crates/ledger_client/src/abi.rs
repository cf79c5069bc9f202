//! Contract-interface codec: maps typed call arguments onto `alloy` dynamic
//! ABI values, builds calldata and decodes return values.

use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy_json_abi::Function;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use shared::protocol::CallArg;

use crate::error::{DecodeError, EncodeError};

const WORD: usize = 32;

/// Canonical signature, e.g. `redeem(uint256,uint256,uint256,address)`.
pub fn signature(operation: &str, args: &[CallArg]) -> String {
    let types = args
        .iter()
        .map(|arg| arg.abi_type().to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{operation}({types})")
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

pub fn encode_call(operation: &str, args: &[CallArg]) -> Result<Bytes, EncodeError> {
    if operation.is_empty()
        || !operation
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(EncodeError::InvalidOperation(operation.to_string()));
    }

    let values = sol_values(args)?;
    let function = Function::parse(&signature(operation, args))
        .map_err(|err| EncodeError::Abi(err.to_string()))?;
    let calldata = function
        .abi_encode_input(&values)
        .map_err(|err| EncodeError::Abi(err.to_string()))?;
    Ok(calldata.into())
}

/// Parameter encoding of an argument sequence without a selector.
pub fn encode_args(args: &[CallArg]) -> Result<Vec<u8>, EncodeError> {
    Ok(DynSolValue::Tuple(sol_values(args)?).abi_encode_params())
}

fn sol_values(args: &[CallArg]) -> Result<Vec<DynSolValue>, EncodeError> {
    args.iter().map(sol_value).collect()
}

/// Converts an argument, refusing values wider than their declared width.
fn sol_value(arg: &CallArg) -> Result<DynSolValue, EncodeError> {
    Ok(match arg {
        CallArg::Uint { bits, value } => {
            check_width(*bits, *value)?;
            DynSolValue::Uint(*value, usize::from(*bits))
        }
        CallArg::Address(address) => DynSolValue::Address(*address),
        CallArg::Bool(flag) => DynSolValue::Bool(*flag),
        CallArg::FixedBytes32(word) => DynSolValue::FixedBytes(*word, WORD),
        CallArg::String(text) => DynSolValue::String(text.clone()),
        CallArg::Bytes(data) => DynSolValue::Bytes(data.to_vec()),
        CallArg::Tuple(components) => DynSolValue::Tuple(sol_values(components)?),
        CallArg::Array { element, items } => {
            if let Some(actual) = items
                .iter()
                .map(CallArg::abi_type)
                .find(|actual| actual != element)
            {
                return Err(EncodeError::ArrayElementMismatch {
                    expected: element.clone(),
                    actual,
                });
            }
            DynSolValue::Array(sol_values(items)?)
        }
    })
}

fn check_width(bits: u16, value: U256) -> Result<(), EncodeError> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(EncodeError::InvalidWidth(bits));
    }
    if value.bit_len() > usize::from(bits) {
        return Err(EncodeError::Overflow { bits, value });
    }
    Ok(())
}

/// Parses a decimal or `0x` hex literal into a 256-bit unsigned integer.
pub fn parse_uint(literal: &str) -> Result<U256, EncodeError> {
    let literal = literal.trim();
    if literal.starts_with('-') {
        return Err(EncodeError::Negative(literal.to_string()));
    }
    let (digits, radix) = match literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (literal, 10),
    };
    if digits.is_empty() {
        return Err(EncodeError::InvalidLiteral(literal.to_string()));
    }
    U256::from_str_radix(digits, radix)
        .map_err(|_| EncodeError::InvalidLiteral(literal.to_string()))
}

/// Packs a short UTF-8 string into a null-terminated `bytes32`.
pub fn bytes32_from_str(text: &str) -> Result<B256, EncodeError> {
    let raw = text.as_bytes();
    if raw.len() > WORD - 1 {
        return Err(EncodeError::Bytes32TooLong(text.to_string()));
    }
    let mut word = [0u8; WORD];
    word[..raw.len()].copy_from_slice(raw);
    Ok(B256::from(word))
}

/// Decodes a single return value from raw response data.
pub trait AbiDecode: Sized {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError>;
}

/// Decodes return data laid out as the parameters `types`.
fn decode_returns(types: Vec<DynSolType>, data: &[u8]) -> Result<Vec<DynSolValue>, DecodeError> {
    let needed = types.len() * WORD;
    if data.len() < needed {
        return Err(DecodeError::TooShort {
            needed,
            actual: data.len(),
        });
    }
    match DynSolType::Tuple(types).abi_decode_params(data)? {
        DynSolValue::Tuple(values) => Ok(values),
        other => Err(DecodeError::Abi(format!("expected a tuple, got {other:?}"))),
    }
}

fn decode_single(ty: DynSolType, data: &[u8]) -> Result<DynSolValue, DecodeError> {
    decode_returns(vec![ty], data)?
        .into_iter()
        .next()
        .ok_or_else(|| DecodeError::Abi("empty return data".into()))
}

/// Rejects words with dirty padding, which lenient decoding accepts.
fn strict_word(value: &DynSolValue, data: &[u8], name: &'static str) -> Result<(), DecodeError> {
    if value.abi_encode().as_slice() != &data[..WORD] {
        return Err(DecodeError::InvalidWord(name));
    }
    Ok(())
}

impl AbiDecode for U256 {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError> {
        decode_single(DynSolType::Uint(256), data)?
            .as_uint()
            .map(|(value, _)| value)
            .ok_or(DecodeError::InvalidWord("uint256"))
    }
}

impl AbiDecode for Address {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError> {
        let value = decode_single(DynSolType::Address, data)?;
        strict_word(&value, data, "address")?;
        value.as_address().ok_or(DecodeError::InvalidWord("address"))
    }
}

impl AbiDecode for bool {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError> {
        let value = decode_single(DynSolType::Bool, data)?;
        strict_word(&value, data, "bool")?;
        value.as_bool().ok_or(DecodeError::InvalidWord("bool"))
    }
}

impl AbiDecode for B256 {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError> {
        decode_single(DynSolType::FixedBytes(WORD), data)?
            .as_fixed_bytes()
            .map(|(bytes, _)| B256::from_slice(bytes))
            .ok_or(DecodeError::InvalidWord("bytes32"))
    }
}

impl AbiDecode for String {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError> {
        match decode_single(DynSolType::String, data)? {
            DynSolValue::String(text) => Ok(text),
            _ => Err(DecodeError::InvalidWord("string")),
        }
    }
}

impl AbiDecode for (U256, U256) {
    fn abi_decode(data: &[u8]) -> Result<Self, DecodeError> {
        let values = decode_returns(vec![DynSolType::Uint(256); 2], data)?;
        match values.as_slice() {
            [first, second] => match (first.as_uint(), second.as_uint()) {
                (Some((first, _)), Some((second, _))) => Ok((first, second)),
                _ => Err(DecodeError::InvalidWord("uint256")),
            },
            _ => Err(DecodeError::Abi("expected two return values".into())),
        }
    }
}

#[cfg(test)]
#[path = "tests/abi_tests.rs"]
mod tests;
