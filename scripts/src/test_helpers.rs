//! Mock collaborators with failure injection, for exercising the workflow offline

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    config::Configuration,
    errors::ScriptError,
    interfaces::{Compiler, Transactor},
    registry::AddressRegistry,
    types::{
        Address, Artifact, ContractAlias, DeployedContract, Felt, NetworkIdentifier,
        TransactionRequest, TxHandle, TxHash, TxStatus,
    },
};

/// A compiler that "compiles" any source to `artifacts/<stem>.json`
#[derive(Default)]
pub(crate) struct MockCompiler {
    /// Sources that fail to compile
    failing: Vec<PathBuf>,
    /// Sources compiled so far
    compiled: Mutex<Vec<PathBuf>>,
}

impl MockCompiler {
    /// A compiler failing on the given source
    pub(crate) fn failing_on(source: impl Into<PathBuf>) -> Self {
        Self {
            failing: vec![source.into()],
            ..Default::default()
        }
    }

    /// Sources compiled so far, in order
    pub(crate) fn compiled(&self) -> Vec<PathBuf> {
        self.compiled.lock().unwrap().clone()
    }
}

impl Compiler for MockCompiler {
    async fn compile(&self, source: &Path) -> Result<Artifact, ScriptError> {
        if self.failing.iter().any(|s| s == source) {
            return Err(ScriptError::Compile(format!(
                "syntax error in {}",
                source.display()
            )));
        }

        self.compiled.lock().unwrap().push(source.to_path_buf());
        let name = source.file_stem().unwrap().to_str().unwrap().to_string();
        Ok(Artifact {
            path: PathBuf::from("artifacts").join(format!("{name}.json")),
            name,
        })
    }
}

/// The recorded interactions and scripted responses of a [`MockTransactor`]
#[derive(Default)]
struct MockState {
    /// Addresses handed out to deployments, in order
    addresses: VecDeque<Address>,
    /// Counter used to mint addresses and hashes once `addresses` runs dry
    counter: u64,
    /// Deployments submitted so far
    deploys: Vec<(Artifact, Vec<Felt>)>,
    /// Transactions sent so far
    sends: Vec<TransactionRequest>,
    /// Errors to return from upcoming sends
    send_failures: VecDeque<ScriptError>,
    /// One-shot errors to return from the next send of a given function
    function_failures: Vec<(String, ScriptError)>,
    /// Error to return from every deployment
    deploy_failure: Option<ScriptError>,
    /// Responses to upcoming status polls; final once exhausted
    statuses: VecDeque<Result<TxStatus, ScriptError>>,
    /// Number of status polls made
    status_polls: usize,
}

/// An in-memory transactor recording every interaction
#[derive(Default)]
pub(crate) struct MockTransactor {
    /// Interactions and scripted responses
    state: Mutex<MockState>,
}

impl MockTransactor {
    /// A transactor handing out the given addresses to deployments, in order
    pub(crate) fn with_addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().addresses = addresses.into_iter().collect();
        mock
    }

    /// Fail the next send with `err`
    pub(crate) fn fail_next_send(&self, err: ScriptError) {
        self.state.lock().unwrap().send_failures.push_back(err);
    }

    /// Fail the next send invoking `function` with `err`
    pub(crate) fn fail_next_call_to(&self, function: &str, err: ScriptError) {
        self.state
            .lock()
            .unwrap()
            .function_failures
            .push((function.to_string(), err));
    }

    /// Fail every deployment with `err`
    pub(crate) fn fail_deploys(&self, err: ScriptError) {
        self.state.lock().unwrap().deploy_failure = Some(err);
    }

    /// Queue a response to a status poll
    pub(crate) fn push_status(&self, status: Result<TxStatus, ScriptError>) {
        self.state.lock().unwrap().statuses.push_back(status);
    }

    /// Deployments submitted so far
    pub(crate) fn deploys(&self) -> Vec<(Artifact, Vec<Felt>)> {
        self.state.lock().unwrap().deploys.clone()
    }

    /// Transactions sent so far
    pub(crate) fn sends(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().sends.clone()
    }

    /// Number of status polls made
    pub(crate) fn status_polls(&self) -> usize {
        self.state.lock().unwrap().status_polls
    }
}

impl Transactor for MockTransactor {
    async fn deploy(
        &self,
        _network: NetworkIdentifier,
        _alias: &ContractAlias,
        artifact: &Artifact,
        constructor_args: &[Felt],
    ) -> Result<DeployedContract, ScriptError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.deploy_failure.clone() {
            return Err(err);
        }

        state.counter += 1;
        let counter = state.counter;
        let address = state
            .addresses
            .pop_front()
            .unwrap_or_else(|| Address::from(Felt::from(0x1000 + counter)));
        state
            .deploys
            .push((artifact.clone(), constructor_args.to_vec()));

        Ok(DeployedContract {
            address,
            tx_hash: TxHash::from(Felt::from(0x100 + counter)),
        })
    }

    async fn call(
        &self,
        _network: NetworkIdentifier,
        _contract_alias: &ContractAlias,
        _function_name: &str,
        arguments: &[Felt],
    ) -> Result<Vec<Felt>, ScriptError> {
        Ok(arguments.to_vec())
    }

    async fn send(&self, request: &TransactionRequest) -> Result<TxHandle, ScriptError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.send_failures.pop_front() {
            return Err(err);
        }
        if let Some(i) = state
            .function_failures
            .iter()
            .position(|(function, _)| *function == request.function_name)
        {
            return Err(state.function_failures.remove(i).1);
        }

        state.counter += 1;
        state.sends.push(request.clone());
        Ok(TxHandle {
            tx_hash: TxHash::from(Felt::from(0x100 + state.counter)),
        })
    }

    async fn transaction_status(
        &self,
        _network: NetworkIdentifier,
        _tx_hash: TxHash,
    ) -> Result<TxStatus, ScriptError> {
        let mut state = self.state.lock().unwrap();
        state.status_polls += 1;
        state
            .statuses
            .pop_front()
            .unwrap_or(Ok(TxStatus::AcceptedOnL2))
    }
}

/// A temp-dir backed registry; the dir is deleted when the guard drops
pub(crate) fn temp_registry() -> (tempfile::TempDir, AddressRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let registry = AddressRegistry::new(dir.path().join("deployments"));
    (dir, registry)
}

/// A configuration targeting goerli with an `ADMIN` signer and a few peers
pub(crate) fn goerli_config() -> Configuration {
    Configuration::new(
        NetworkIdentifier::Goerli,
        "ADMIN",
        [
            ("lords_proxy".to_string(), "0x111".parse().unwrap()),
            ("resources_proxy".to_string(), "0x222".parse().unwrap()),
            ("admin".to_string(), "0x333".parse().unwrap()),
        ],
    )
}
