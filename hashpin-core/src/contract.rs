use crate::error::{HashpinError, Result};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// ABI of the anchor contract. This is the single copy in the process; the
/// address half of the descriptor comes from configuration.
pub const EMBEDDED_ABI: &str = r#"[
  {
    "inputs": [],
    "name": "getHash",
    "outputs": [{ "internalType": "string", "name": "", "type": "string" }],
    "stateMutability": "view",
    "type": "function"
  },
  {
    "inputs": [],
    "name": "ipfsHash",
    "outputs": [{ "internalType": "string", "name": "", "type": "string" }],
    "stateMutability": "view",
    "type": "function"
  },
  {
    "inputs": [{ "internalType": "string", "name": "_ipfsHash", "type": "string" }],
    "name": "storeHash",
    "outputs": [],
    "stateMutability": "nonpayable",
    "type": "function"
  }
]"#;

/// Name of the single state-mutating method the pipeline invokes.
pub const ANCHOR_FUNCTION: &str = "storeHash";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "internalType", skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

impl StateMutability {
    pub fn is_mutating(self) -> bool {
        matches!(self, StateMutability::Nonpayable | StateMutability::Payable)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiFunction {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability")]
    pub state_mutability: StateMutability,
    #[serde(rename = "type")]
    pub kind: String,
}

impl AbiFunction {
    /// Canonical signature used for selector derivation,
    /// e.g. `storeHash(string)`.
    pub fn signature(&self) -> String {
        let inputs: Vec<&str> = self.inputs.iter().map(|p| p.kind.as_str()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        let digest = Keccak256::digest(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&digest[..4]);
        selector
    }
}

/// Fixed address + method interface list for the deployed anchor contract.
/// Built once at startup and shared; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub address: String,
    functions: Vec<AbiFunction>,
}

impl ContractDescriptor {
    pub fn new(address: impl Into<String>, abi_json: &str) -> Result<Self> {
        let functions: Vec<AbiFunction> = serde_json::from_str(abi_json)?;
        if functions.is_empty() {
            return Err(HashpinError::Config(
                "contract ABI contains no functions".to_string(),
            ));
        }
        Ok(Self {
            address: address.into(),
            functions,
        })
    }

    /// Descriptor over the embedded anchor ABI.
    pub fn builtin(address: impl Into<String>) -> Result<Self> {
        Self::new(address, EMBEDDED_ABI)
    }

    pub fn function(&self, name: &str) -> Result<&AbiFunction> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                HashpinError::Internal(format!("contract has no function '{}'", name))
            })
    }

    /// Calldata for a state-mutating method taking a single string argument.
    pub fn encode_call_string(&self, name: &str, argument: &str) -> Result<Vec<u8>> {
        let function = self.function(name)?;
        if !function.state_mutability.is_mutating() {
            return Err(HashpinError::Internal(format!(
                "function '{}' is read-only, refusing to encode a write",
                name
            )));
        }
        if function.inputs.len() != 1 || function.inputs[0].kind != "string" {
            return Err(HashpinError::Internal(format!(
                "function '{}' does not take a single string argument",
                name
            )));
        }

        let mut data = function.selector().to_vec();
        // Head: offset of the dynamic string within the argument block.
        data.extend_from_slice(&abi_word(32));
        // Tail: length word followed by the bytes, zero-padded to a word.
        data.extend_from_slice(&abi_word(argument.len() as u64));
        data.extend_from_slice(argument.as_bytes());
        let padding = (32 - argument.len() % 32) % 32;
        data.extend(std::iter::repeat(0u8).take(padding));
        Ok(data)
    }

    /// Calldata for a zero-argument read-only method.
    pub fn encode_view_call(&self, name: &str) -> Result<Vec<u8>> {
        let function = self.function(name)?;
        if function.state_mutability.is_mutating() {
            return Err(HashpinError::Internal(format!(
                "function '{}' mutates state, refusing to encode a view call",
                name
            )));
        }
        if !function.inputs.is_empty() {
            return Err(HashpinError::Internal(format!(
                "function '{}' takes arguments, expected none",
                name
            )));
        }
        Ok(function.selector().to_vec())
    }
}

/// Decodes an ABI-encoded `string` return value.
pub fn decode_string_return(data: &[u8]) -> Result<String> {
    if data.len() < 64 {
        return Err(HashpinError::Internal(
            "return data too short for a string".to_string(),
        ));
    }
    // The offset and length words come straight from the RPC response, so
    // the additions must not be allowed to overflow.
    let offset = abi_word_to_u64(&data[0..32])? as usize;
    let start = offset
        .checked_add(32)
        .filter(|start| *start <= data.len())
        .ok_or_else(|| {
            HashpinError::Internal("string offset points past the return data".to_string())
        })?;
    let length = abi_word_to_u64(&data[offset..start])? as usize;
    let end = start
        .checked_add(length)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            HashpinError::Internal("string length points past the return data".to_string())
        })?;
    String::from_utf8(data[start..end].to_vec())
        .map_err(|_| HashpinError::Internal("returned string is not valid UTF-8".to_string()))
}

fn abi_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn abi_word_to_u64(word: &[u8]) -> Result<u64> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(HashpinError::Internal(
            "ABI word does not fit in u64".to_string(),
        ));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ContractDescriptor {
        ContractDescriptor::builtin("0x648b26Ce4136Ea096e20f433FA31Cd357AeD392D").unwrap()
    }

    #[test]
    fn embedded_abi_parses() {
        let descriptor = descriptor();
        let store = descriptor.function("storeHash").unwrap();
        assert!(store.state_mutability.is_mutating());
        assert_eq!(store.signature(), "storeHash(string)");

        for view in ["getHash", "ipfsHash"] {
            let function = descriptor.function(view).unwrap();
            assert_eq!(function.state_mutability, StateMutability::View);
            assert!(function.inputs.is_empty());
        }
    }

    #[test]
    fn store_hash_calldata_layout() {
        let data = descriptor()
            .encode_call_string("storeHash", "Qm123abc")
            .unwrap();
        // selector + offset word + length word + one padded data word
        assert_eq!(data.len(), 4 + 32 + 32 + 32);
        let selector = descriptor().function("storeHash").unwrap().selector();
        assert_eq!(data[..4], selector[..]);
        let mut offset_word = [0u8; 32];
        offset_word[31] = 32;
        assert_eq!(data[4..36], offset_word[..]);
        assert_eq!(data[36 + 31], 8); // length of "Qm123abc"
        assert_eq!(&data[68..76], b"Qm123abc");
        assert!(data[76..].iter().all(|b| *b == 0));
    }

    #[test]
    fn view_call_is_just_the_selector() {
        let data = descriptor().encode_view_call("getHash").unwrap();
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn refuses_to_encode_a_view_as_a_write() {
        let err = descriptor()
            .encode_call_string("getHash", "Qm123abc")
            .unwrap_err();
        assert!(matches!(err, HashpinError::Internal(_)));
    }

    #[test]
    fn string_return_roundtrip() {
        let value = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
        let mut data = Vec::new();
        data.extend_from_slice(&abi_word(32));
        data.extend_from_slice(&abi_word(value.len() as u64));
        data.extend_from_slice(value.as_bytes());
        let padding = (32 - value.len() % 32) % 32;
        data.extend(std::iter::repeat(0u8).take(padding));

        assert_eq!(decode_string_return(&data).unwrap(), value);
    }

    #[test]
    fn truncated_return_data_is_rejected() {
        assert!(decode_string_return(&[0u8; 16]).is_err());
    }

    #[test]
    fn hostile_offset_word_is_rejected_without_overflow() {
        let mut data = Vec::new();
        data.extend_from_slice(&abi_word(u64::MAX - 16));
        data.extend_from_slice(&abi_word(0));

        let err = decode_string_return(&data).unwrap_err();
        assert!(matches!(err, HashpinError::Internal(_)));
    }

    #[test]
    fn hostile_length_word_is_rejected_without_overflow() {
        let mut data = Vec::new();
        data.extend_from_slice(&abi_word(32));
        data.extend_from_slice(&abi_word(u64::MAX - 16));

        let err = decode_string_return(&data).unwrap_err();
        assert!(matches!(err, HashpinError::Internal(_)));
    }
}
