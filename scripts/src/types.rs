//! Core types threaded through the deployment workflow

use std::{
    fmt::{self, Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

use clap::ValueEnum;
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::{constants::FELT_PRIME, errors::ScriptError};

// ------------------
// | FIELD ELEMENTS |
// ------------------

/// A Starknet field element, i.e. an integer in `[0, P)`
///
/// Displayed in decimal, which is the form expected by the `nile` CLI for calldata.
/// Parsed from either decimal or `0x`-prefixed hex.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct Felt(U256);

impl Felt {
    /// The zero field element
    pub const ZERO: Felt = Felt(U256::ZERO);

    /// Construct a field element, failing if the value is not reduced
    pub fn new(value: U256) -> Result<Self, ScriptError> {
        if value >= FELT_PRIME {
            return Err(ScriptError::CalldataConstruction(format!(
                "{value} is out of range for a field element"
            )));
        }

        Ok(Felt(value))
    }

    /// Construct a field element from a value known to be in range
    pub(crate) const fn from_reduced(value: U256) -> Self {
        Felt(value)
    }

    /// The integer value of the field element
    pub fn value(&self) -> U256 {
        self.0
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt(U256::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt(U256::from(value))
    }
}

impl Display for Felt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::LowerHex for Felt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl FromStr for Felt {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = U256::from_str(s.trim())
            .map_err(|e| ScriptError::CalldataConstruction(format!("invalid felt `{s}`: {e}")))?;
        Felt::new(value)
    }
}

/// A 256-bit unsigned integer argument, encoded into two felts when resolved.
///
/// (De)serialized as a decimal or `0x`-prefixed hex string, like [`Felt`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct Uint256(U256);

impl Uint256 {
    /// The integer value
    pub fn value(&self) -> U256 {
        self.0
    }
}

impl From<U256> for Uint256 {
    fn from(value: U256) -> Self {
        Uint256(value)
    }
}

impl From<u128> for Uint256 {
    fn from(value: u128) -> Self {
        Uint256(U256::from(value))
    }
}

impl Display for Uint256 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uint256 {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s.trim()).map(Uint256).map_err(|e| {
            ScriptError::CalldataConstruction(format!("invalid uint256 `{s}`: {e}"))
        })
    }
}

/// Implements `Display`, `FromStr`, and conversions for a felt newtype that is
/// rendered in `0x`-prefixed hex
macro_rules! hex_felt_newtype {
    ($name:ident) => {
        impl $name {
            /// The underlying field element
            pub fn felt(&self) -> Felt {
                self.0
            }
        }

        impl From<Felt> for $name {
            fn from(felt: Felt) -> Self {
                $name(felt)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ScriptError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Felt::from_str(s).map($name)
            }
        }
    };
}

/// The address of a deployed contract.
///
/// Opaque to the workflow: it is only ever threaded through as an argument to later calls.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct Address(Felt);
hex_felt_newtype!(Address);

/// The hash of a submitted transaction
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct TxHash(Felt);
hex_felt_newtype!(TxHash);

// -----------
// | ALIASES |
// -----------

/// A stable logical name for a contract instance within a deployment,
/// distinct from the source file it was compiled from
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractAlias(String);

impl ContractAlias {
    /// Construct an alias
    pub fn new(alias: impl Into<String>) -> Self {
        ContractAlias(alias.into())
    }

    /// The alias as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContractAlias {
    fn from(alias: &str) -> Self {
        ContractAlias::new(alias)
    }
}

impl Display for ContractAlias {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The network a workflow targets.
///
/// Selects the registry partition, as well as the network passed through to `nile`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkIdentifier {
    /// A local devnet
    Localhost,
    /// The Goerli public test network
    Goerli,
    /// Mainnet
    Mainnet,
}

impl NetworkIdentifier {
    /// The name of the network as understood by `nile` and used in registry file names
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkIdentifier::Localhost => "localhost",
            NetworkIdentifier::Goerli => "goerli",
            NetworkIdentifier::Mainnet => "mainnet",
        }
    }
}

impl Display for NetworkIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------
// | RECORDS |
// -----------

/// A contract deployment, as persisted in the address registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// The alias the contract was deployed under
    pub alias: ContractAlias,
    /// The network the contract was deployed to
    pub network: NetworkIdentifier,
    /// The address of the deployed contract
    pub address: Address,
    /// The hash of the deployment transaction
    pub tx_hash: TxHash,
}

/// A compiled, deployable contract artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// The contract name, i.e. the stem of the source file
    pub name: String,
    /// The path to the compiled artifact
    pub path: PathBuf,
}

/// The result of submitting a deployment transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    /// The address the contract was deployed at
    pub address: Address,
    /// The hash of the deployment transaction
    pub tx_hash: TxHash,
}

/// A state-changing transaction to submit on behalf of a signer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    /// The network to submit the transaction to
    pub network: NetworkIdentifier,
    /// The alias of the signer submitting the transaction
    pub signer_alias: String,
    /// The alias of the contract being invoked
    pub contract_alias: ContractAlias,
    /// The name of the function being invoked
    pub function_name: String,
    /// The positional, already-encoded calldata
    pub arguments: Vec<Felt>,
}

/// A handle on a submitted transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxHandle {
    /// The hash of the submitted transaction
    pub tx_hash: TxHash,
}

/// The status of a transaction, as reported by the network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// The network has not seen the transaction
    NotReceived,
    /// The transaction is in the mempool
    Received,
    /// The transaction is in a pending block
    Pending,
    /// The transaction was accepted on L2
    AcceptedOnL2,
    /// The transaction was accepted on L1
    AcceptedOnL1,
    /// The transaction was rejected
    Rejected,
}

impl TxStatus {
    /// Whether the transaction is final, i.e. will not be reverted
    pub fn is_final(&self) -> bool {
        matches!(self, TxStatus::AcceptedOnL2 | TxStatus::AcceptedOnL1)
    }
}

impl FromStr for TxStatus {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_RECEIVED" => Ok(TxStatus::NotReceived),
            "RECEIVED" => Ok(TxStatus::Received),
            "PENDING" => Ok(TxStatus::Pending),
            "ACCEPTED_ON_L2" => Ok(TxStatus::AcceptedOnL2),
            "ACCEPTED_ON_L1" => Ok(TxStatus::AcceptedOnL1),
            "REJECTED" => Ok(TxStatus::Rejected),
            _ => Err(ScriptError::Network(format!(
                "unknown transaction status `{s}`"
            ))),
        }
    }
}
