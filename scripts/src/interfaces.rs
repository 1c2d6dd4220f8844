//! Interfaces of the external collaborators the workflow drives

use std::path::Path;

use crate::{
    errors::ScriptError,
    types::{
        Artifact, ContractAlias, DeployedContract, Felt, NetworkIdentifier, TransactionRequest,
        TxHandle, TxHash, TxStatus,
    },
};

/// Turns a contract source into a deployable artifact
#[allow(async_fn_in_trait)]
pub trait Compiler {
    /// Compile the contract at `source`.
    ///
    /// Fails with [`ScriptError::Compile`] on syntax or reference errors.
    async fn compile(&self, source: &Path) -> Result<Artifact, ScriptError>;
}

/// Submits transactions to, and reads state from, a network
#[allow(async_fn_in_trait)]
pub trait Transactor {
    /// Submit a deployment transaction for `artifact` under `alias`, with the given
    /// constructor calldata
    async fn deploy(
        &self,
        network: NetworkIdentifier,
        alias: &ContractAlias,
        artifact: &Artifact,
        constructor_args: &[Felt],
    ) -> Result<DeployedContract, ScriptError>;

    /// Make a read-only call against a contract
    async fn call(
        &self,
        network: NetworkIdentifier,
        contract_alias: &ContractAlias,
        function_name: &str,
        arguments: &[Felt],
    ) -> Result<Vec<Felt>, ScriptError>;

    /// Submit a state-changing transaction on behalf of the request's signer
    async fn send(&self, request: &TransactionRequest) -> Result<TxHandle, ScriptError>;

    /// Fetch the status of a previously submitted transaction
    async fn transaction_status(
        &self,
        network: NetworkIdentifier,
        tx_hash: TxHash,
    ) -> Result<TxStatus, ScriptError>;
}
