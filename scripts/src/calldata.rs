//! A typed builder for positional Starknet calldata

use ruint::aliases::U256;

use crate::{
    constants::{MAX_SHORT_STRING_LEN, UINT256_LIMB_BITS},
    errors::ScriptError,
    types::{Address, Felt},
};

/// Builds an ordered list of field elements from logical arguments,
/// encoding each into its positional form
#[derive(Clone, Debug, Default)]
pub struct CalldataBuilder {
    /// The field elements encoded so far
    felts: Vec<Felt>,
}

impl CalldataBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain field element
    pub fn felt(mut self, felt: Felt) -> Self {
        self.felts.push(felt);
        self
    }

    /// Append a `Uint256`, as its low then high 128-bit limbs
    pub fn uint256(mut self, value: U256) -> Self {
        let (low, high) = split_uint256(value);
        self.felts.push(low);
        self.felts.push(high);
        self
    }

    /// Append a contract address
    pub fn address(self, address: Address) -> Self {
        self.felt(address.felt())
    }

    /// Append a Cairo short string, i.e. at most 31 ASCII bytes packed big-endian
    pub fn short_string(self, s: &str) -> Result<Self, ScriptError> {
        let felt = short_string_to_felt(s)?;
        Ok(self.felt(felt))
    }

    /// Consume the builder, returning the encoded calldata
    pub fn build(self) -> Vec<Felt> {
        self.felts
    }
}

/// Split a `Uint256` into its `(low, high)` 128-bit limbs
pub fn split_uint256(value: U256) -> (Felt, Felt) {
    let mask = U256::from(u128::MAX);
    let low = value & mask;
    let high = value >> UINT256_LIMB_BITS;
    (Felt::from_reduced(low), Felt::from_reduced(high))
}

/// Encode a Cairo short string as a field element
pub fn short_string_to_felt(s: &str) -> Result<Felt, ScriptError> {
    if !s.is_ascii() {
        return Err(ScriptError::CalldataConstruction(format!(
            "short string `{s}` is not ASCII"
        )));
    }
    if s.len() > MAX_SHORT_STRING_LEN {
        return Err(ScriptError::CalldataConstruction(format!(
            "short string `{s}` exceeds {MAX_SHORT_STRING_LEN} bytes"
        )));
    }

    // At most 31 bytes, so always below the field prime
    Ok(Felt::from_reduced(U256::from_be_slice(s.as_bytes())))
}
