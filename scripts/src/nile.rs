//! Compiler and transactor adapters that drive the `nile` CLI.
//!
//! Assumes that the `nile` binary is available to the OS, and that signer keys
//! are exposed as environment variables named after the signer alias, as `nile` expects.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{
    constants::{
        ALIAS_FLAG, ARTIFACT_EXTENSION, CALL_COMMAND, COMPILE_COMMAND, DEPLOY_COMMAND, NETWORK_FLAG,
        SEND_COMMAND, STATUS_COMMAND,
    },
    errors::ScriptError,
    interfaces::{Compiler, Transactor},
    registry::AddressRegistry,
    types::{
        Address, Artifact, ContractAlias, DeployedContract, Felt, NetworkIdentifier,
        TransactionRequest, TxHandle, TxHash, TxStatus,
    },
};

lazy_static! {
    static ref CONTRACT_ADDRESS_REGEX: Regex =
        Regex::new(r"Contract address: (0x[[:xdigit:]]+)").unwrap();
    static ref TX_HASH_REGEX: Regex = Regex::new(r"Transaction hash: (0x[[:xdigit:]]+)").unwrap();
    static ref TX_STATUS_REGEX: Regex = Regex::new(
        r"\b(NOT_RECEIVED|RECEIVED|PENDING|ACCEPTED_ON_L2|ACCEPTED_ON_L1|REJECTED)\b"
    )
    .unwrap();
}

/// A handle on the `nile` binary
#[derive(Clone, Debug)]
pub struct NileCommand {
    /// The name or path of the binary
    program: String,
}

impl NileCommand {
    /// Wrap the given `nile` binary
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `nile` with the given arguments, returning its stdout.
    ///
    /// Failures, including a non-zero exit, are wrapped with `err`.
    async fn execute(
        &self,
        args: Vec<String>,
        err: fn(String) -> ScriptError,
    ) -> Result<String, ScriptError> {
        let cmd_str = format!("{} {}", self.program, args.iter().join(" "));
        debug!("Running `{cmd_str}`");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| err(format!("failed to execute `{cmd_str}`: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(err(format!(
                "`{cmd_str}` failed:\n{}\n{}",
                stdout,
                String::from_utf8_lossy(&output.stderr),
            )));
        }

        trace!("{stdout}");
        Ok(stdout)
    }
}

/// Append the network selector to a `nile` argument list
fn with_network(mut args: Vec<String>, network: NetworkIdentifier) -> Vec<String> {
    args.push(NETWORK_FLAG.to_string());
    args.push(network.as_str().to_string());
    args
}

// ------------
// | COMPILER |
// ------------

/// Compiles contracts with `nile compile`
#[derive(Clone, Debug)]
pub struct NileCompiler {
    /// The `nile` binary
    nile: NileCommand,
    /// The directory `nile` writes compiled artifacts to
    artifacts_dir: PathBuf,
}

impl NileCompiler {
    /// Create a compiler writing artifacts to `artifacts_dir`
    pub fn new(nile: NileCommand, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            nile,
            artifacts_dir: artifacts_dir.into(),
        }
    }
}

impl Compiler for NileCompiler {
    async fn compile(&self, source: &Path) -> Result<Artifact, ScriptError> {
        let name = source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                ScriptError::Compile(format!("invalid contract source path {}", source.display()))
            })?
            .to_string();

        self.nile
            .execute(
                vec![COMPILE_COMMAND.to_string(), source.display().to_string()],
                ScriptError::Compile,
            )
            .await?;

        let path = self
            .artifacts_dir
            .join(format!("{name}.{ARTIFACT_EXTENSION}"));
        if !path.exists() {
            return Err(ScriptError::Compile(format!(
                "expected artifact at {} after compiling {}",
                path.display(),
                source.display()
            )));
        }

        Ok(Artifact { name, path })
    }
}

// --------------
// | TRANSACTOR |
// --------------

/// Submits transactions with `nile deploy` / `nile send`, and reads state with
/// `nile call` / `nile status`
#[derive(Clone, Debug)]
pub struct NileTransactor {
    /// The `nile` binary
    nile: NileCommand,
    /// Used to resolve target aliases to addresses
    registry: AddressRegistry,
}

impl NileTransactor {
    /// Create a transactor resolving target aliases through `registry`
    pub fn new(nile: NileCommand, registry: AddressRegistry) -> Self {
        Self { nile, registry }
    }

    /// Resolve a contract alias to the target passed to `nile`.
    ///
    /// Aliases unknown to the registry are passed through verbatim, for `nile` to
    /// resolve against its own deployments.
    fn resolve_target(
        &self,
        network: NetworkIdentifier,
        alias: &ContractAlias,
    ) -> Result<String, ScriptError> {
        Ok(match self.registry.lookup(alias, network)? {
            Some(record) => record.address.to_string(),
            None => alias.to_string(),
        })
    }
}

impl Transactor for NileTransactor {
    async fn deploy(
        &self,
        network: NetworkIdentifier,
        alias: &ContractAlias,
        artifact: &Artifact,
        constructor_args: &[Felt],
    ) -> Result<DeployedContract, ScriptError> {
        let args = deploy_args(alias, artifact, constructor_args);

        let stdout = self
            .nile
            .execute(with_network(args, network), ScriptError::Deployment)
            .await?;
        parse_deploy_output(&stdout)
    }

    async fn call(
        &self,
        network: NetworkIdentifier,
        contract_alias: &ContractAlias,
        function_name: &str,
        arguments: &[Felt],
    ) -> Result<Vec<Felt>, ScriptError> {
        let mut args = vec![
            CALL_COMMAND.to_string(),
            self.resolve_target(network, contract_alias)?,
            function_name.to_string(),
        ];
        args.extend(arguments.iter().map(Felt::to_string));

        let stdout = self
            .nile
            .execute(with_network(args, network), ScriptError::Network)
            .await?;
        parse_call_output(&stdout)
    }

    async fn send(&self, request: &TransactionRequest) -> Result<TxHandle, ScriptError> {
        ensure_signer_configured(&request.signer_alias, request.network)?;

        let mut args = vec![
            SEND_COMMAND.to_string(),
            request.signer_alias.clone(),
            self.resolve_target(request.network, &request.contract_alias)?,
            request.function_name.clone(),
        ];
        args.extend(request.arguments.iter().map(Felt::to_string));

        let stdout = self
            .nile
            .execute(with_network(args, request.network), ScriptError::Network)
            .await?;
        let tx_hash = parse_tx_hash(&stdout).ok_or_else(|| {
            ScriptError::Network(format!("malformed send output:\n{stdout}"))
        })?;

        Ok(TxHandle { tx_hash })
    }

    async fn transaction_status(
        &self,
        network: NetworkIdentifier,
        tx_hash: TxHash,
    ) -> Result<TxStatus, ScriptError> {
        let args = vec![STATUS_COMMAND.to_string(), tx_hash.to_string()];
        let stdout = self
            .nile
            .execute(with_network(args, network), ScriptError::Network)
            .await?;
        parse_status_output(&stdout)
    }
}

/// The arguments of `nile deploy`, less the network selector
fn deploy_args(alias: &ContractAlias, artifact: &Artifact, constructor_args: &[Felt]) -> Vec<String> {
    let mut args = vec![DEPLOY_COMMAND.to_string(), artifact.name.clone()];
    args.extend(constructor_args.iter().map(Felt::to_string));
    args.extend([ALIAS_FLAG.to_string(), alias.to_string()]);
    args
}

/// Check that the signer's key is exposed to `nile`
fn ensure_signer_configured(
    signer_alias: &str,
    network: NetworkIdentifier,
) -> Result<(), ScriptError> {
    match env::var(signer_alias) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(ScriptError::Signer(format!(
            "signer `{signer_alias}` has no key configured for {network} \
            (expected environment variable `{signer_alias}`)"
        ))),
    }
}

// -----------
// | PARSING |
// -----------

/// Parse the transaction hash out of `nile` output
fn parse_tx_hash(stdout: &str) -> Option<TxHash> {
    let hash = TX_HASH_REGEX.captures(stdout)?.get(1)?.as_str();
    TxHash::from_str(hash).ok()
}

/// Parse the deployed address and transaction hash out of `nile deploy` output
fn parse_deploy_output(stdout: &str) -> Result<DeployedContract, ScriptError> {
    let malformed = || ScriptError::Deployment(format!("malformed deploy output:\n{stdout}"));

    let address = CONTRACT_ADDRESS_REGEX
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Address::from_str(m.as_str()).ok())
        .ok_or_else(malformed)?;
    let tx_hash = parse_tx_hash(stdout).ok_or_else(malformed)?;

    Ok(DeployedContract { address, tx_hash })
}

/// Parse the whitespace-separated return values of `nile call`
fn parse_call_output(stdout: &str) -> Result<Vec<Felt>, ScriptError> {
    stdout
        .split_whitespace()
        .map(|token| {
            Felt::from_str(token)
                .map_err(|_| ScriptError::Network(format!("malformed call output:\n{stdout}")))
        })
        .collect()
}

/// Parse the transaction status out of `nile status` output
fn parse_status_output(stdout: &str) -> Result<TxStatus, ScriptError> {
    let status = TX_STATUS_REGEX
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ScriptError::Network(format!("malformed status output:\n{stdout}")))?;
    TxStatus::from_str(status.as_str())
}
