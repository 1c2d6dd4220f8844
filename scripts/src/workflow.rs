//! The deployment workflow: compile → deploy-if-absent → await finality → invoke.
//!
//! Every step's output is the next step's input, so steps run strictly in sequence.
//! Any step failure aborts the run, surfacing the state it failed in and every
//! deployment resolved so far. Since deployments are idempotent through the
//! registry, rerunning the same plan after a failure resumes at the failed step.

use std::{
    fmt::{self, Display, Formatter},
    path::Path,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    calldata::CalldataBuilder,
    config::Configuration,
    deploy::{deploy, DeploymentOutcome},
    errors::{ScriptError, WorkflowFailure},
    finality::FinalityPolicy,
    interfaces::{Compiler, Transactor},
    plan::{resolve_arguments, ArgSpec, FollowUpCall, WorkflowPlan, WorkflowVariant},
    registry::AddressRegistry,
    types::{Artifact, ContractAlias, DeploymentRecord, Felt, TransactionRequest, TxHash},
};

/// The states of a workflow run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowState {
    /// Nothing has been done yet
    Start,
    /// All sources have been compiled
    Compiled,
    /// All contracts have been deployed, or found in the registry
    Deployed,
    /// Waiting for deployments to become final
    AwaitingFinality,
    /// All deployments are final. Terminal for [`WorkflowVariant::DeployOnly`]
    Confirmed,
    /// The proxy has been initialized. Terminal for [`WorkflowVariant::DeployAndInitialize`]
    Initialized,
    /// The proxy points at the new implementation. Terminal for [`WorkflowVariant::DeployAndUpgrade`]
    Upgraded,
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Start => "Start",
            WorkflowState::Compiled => "Compiled",
            WorkflowState::Deployed => "Deployed",
            WorkflowState::AwaitingFinality => "AwaitingFinality",
            WorkflowState::Confirmed => "Confirmed",
            WorkflowState::Initialized => "Initialized",
            WorkflowState::Upgraded => "Upgraded",
        };
        f.write_str(name)
    }
}

/// A transaction the workflow sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// The contract invoked
    pub contract: ContractAlias,
    /// The function invoked
    pub function: String,
    /// The hash of the transaction
    pub tx_hash: TxHash,
}

/// A summary of a successful workflow run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowReport {
    /// The variant that was run
    pub variant: &'static str,
    /// The terminal state reached
    pub final_state: WorkflowState,
    /// Every deployment the workflow resolved, in order
    pub records: Vec<DeploymentRecord>,
    /// Every transaction the workflow sent, in order
    pub invocations: Vec<Invocation>,
}

/// The mutable progress of a single run
struct Progress {
    /// The variant being run
    variant: &'static str,
    /// The current state
    state: WorkflowState,
    /// Deployments resolved so far, fresh or reused
    deployments: Vec<DeploymentOutcome>,
    /// Transactions sent so far
    invocations: Vec<Invocation>,
}

impl Progress {
    /// Begin a run of the given variant
    fn new(variant: &'static str) -> Self {
        Self {
            variant,
            state: WorkflowState::Start,
            deployments: Vec::new(),
            invocations: Vec::new(),
        }
    }

    /// Move to `next`, unless the run has been cancelled
    fn transition(
        &mut self,
        next: WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<(), ScriptError> {
        if cancel.is_cancelled() {
            return Err(ScriptError::Cancelled);
        }

        debug!("{}: {} -> {}", self.variant, self.state, next);
        self.state = next;
        Ok(())
    }

    /// The records of the deployments resolved so far
    fn records(&self) -> Vec<DeploymentRecord> {
        self.deployments.iter().map(|d| d.record.clone()).collect()
    }

    /// Finish the run successfully
    fn into_report(self) -> WorkflowReport {
        WorkflowReport {
            variant: self.variant,
            final_state: self.state,
            records: self.records(),
            invocations: self.invocations,
        }
    }

    /// Finish the run with a failure in the current state
    fn into_failure(self, error: ScriptError) -> WorkflowFailure {
        WorkflowFailure {
            state: self.state,
            resolved: self.records(),
            error,
        }
    }
}

/// Drives a [`WorkflowPlan`] through its collaborators
pub struct Workflow<'a, C, T, F> {
    /// Compiles contract sources
    compiler: &'a C,
    /// Submits transactions
    transactor: &'a T,
    /// Decides when deployments are final
    finality: &'a F,
    /// The source of truth for what has already been deployed
    registry: &'a AddressRegistry,
    /// The run's configuration
    config: &'a Configuration,
    /// Checked at every transition, and raced against finality waits
    cancel: CancellationToken,
}

impl<'a, C: Compiler, T: Transactor, F: FinalityPolicy> Workflow<'a, C, T, F> {
    /// Create a workflow over the given collaborators
    pub fn new(
        compiler: &'a C,
        transactor: &'a T,
        finality: &'a F,
        registry: &'a AddressRegistry,
        config: &'a Configuration,
    ) -> Self {
        Self {
            compiler,
            transactor,
            finality,
            registry,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the run at the next transition, or mid-wait, once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the plan to completion
    pub async fn run(&self, plan: &WorkflowPlan) -> Result<WorkflowReport, WorkflowFailure> {
        let mut progress = Progress::new(plan.variant.name());
        info!(
            "Running {} workflow for {} on {}",
            progress.variant, plan.alias, self.config.network
        );

        match self.execute(plan, &mut progress).await {
            Ok(()) => {
                info!(
                    "{} workflow for {} completed in state {}",
                    progress.variant, plan.alias, progress.state
                );
                Ok(progress.into_report())
            }
            Err(e) => {
                error!(
                    "{} workflow for {} failed in state {}: {e}",
                    progress.variant, plan.alias, progress.state
                );
                Err(progress.into_failure(e))
            }
        }
    }

    /// Execute the plan, recording progress as it goes
    async fn execute(&self, plan: &WorkflowPlan, progress: &mut Progress) -> Result<(), ScriptError> {
        match &plan.variant {
            WorkflowVariant::DeployOnly => {
                let artifact = self.compile(&plan.source).await?;
                progress.transition(WorkflowState::Compiled, &self.cancel)?;

                self.deploy(&plan.alias, &artifact, &plan.constructor_args, progress)
                    .await?;
                progress.transition(WorkflowState::Deployed, &self.cancel)?;

                self.await_finality(progress).await
            }
            WorkflowVariant::DeployAndInitialize {
                proxy_source,
                proxy_alias,
                proxy_constructor_args,
                initializer,
                initializer_args,
                follow_up_calls,
            } => {
                let artifact = self.compile(&plan.source).await?;
                let proxy_artifact = self.compile(proxy_source).await?;
                progress.transition(WorkflowState::Compiled, &self.cancel)?;

                self.deploy(&plan.alias, &artifact, &plan.constructor_args, progress)
                    .await?;
                let default_proxy_args = [ArgSpec::Deployed(plan.alias.clone())];
                let proxy_args = proxy_constructor_args
                    .as_deref()
                    .unwrap_or(&default_proxy_args);
                self.deploy(proxy_alias, &proxy_artifact, proxy_args, progress)
                    .await?;
                progress.transition(WorkflowState::Deployed, &self.cancel)?;

                self.await_finality(progress).await?;

                self.initialize(proxy_alias, initializer, initializer_args, progress)
                    .await?;
                progress.transition(WorkflowState::Initialized, &self.cancel)?;

                self.follow_up(follow_up_calls, progress).await
            }
            WorkflowVariant::DeployAndUpgrade {
                proxy_alias,
                upgrade_function,
            } => {
                let artifact = self.compile(&plan.source).await?;
                progress.transition(WorkflowState::Compiled, &self.cancel)?;

                self.deploy(&plan.alias, &artifact, &plan.constructor_args, progress)
                    .await?;
                progress.transition(WorkflowState::Deployed, &self.cancel)?;

                self.await_finality(progress).await?;

                self.upgrade(&plan.alias, proxy_alias, upgrade_function, progress)
                    .await?;
                // The upgrade has landed, so a late cancellation no longer applies
                progress.state = WorkflowState::Upgraded;
                Ok(())
            }
        }
    }

    /// Compile a contract source
    async fn compile(&self, source: &Path) -> Result<Artifact, ScriptError> {
        debug!("Compiling {}...", source.display());
        self.compiler.compile(source).await
    }

    /// Deploy a contract under `alias`, unless already recorded
    async fn deploy(
        &self,
        alias: &ContractAlias,
        artifact: &Artifact,
        constructor_args: &[ArgSpec],
        progress: &mut Progress,
    ) -> Result<(), ScriptError> {
        let calldata = resolve_arguments(constructor_args, self.config, self.registry)?;
        let outcome = deploy(
            self.registry,
            self.transactor,
            alias,
            self.config.network,
            artifact,
            &calldata,
        )
        .await?;

        progress.deployments.push(outcome);
        Ok(())
    }

    /// Await finality of every deployment resolved so far, in order
    async fn await_finality(&self, progress: &mut Progress) -> Result<(), ScriptError> {
        progress.transition(WorkflowState::AwaitingFinality, &self.cancel)?;

        for deployment in &progress.deployments {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ScriptError::Cancelled),
                res = self.finality.await_finality(self.transactor, deployment) => res?,
            }
        }

        progress.transition(WorkflowState::Confirmed, &self.cancel)
    }

    /// Point `proxy_alias` at the implementation recorded under `implementation_alias`
    async fn upgrade(
        &self,
        implementation_alias: &ContractAlias,
        proxy_alias: &ContractAlias,
        upgrade_function: &str,
        progress: &mut Progress,
    ) -> Result<(), ScriptError> {
        let network = self.config.network;
        let implementation = self
            .registry
            .lookup(implementation_alias, network)?
            .ok_or_else(|| {
                ScriptError::Storage(format!(
                    "{implementation_alias} has no recorded deployment on {network}"
                ))
            })?;

        debug!(
            "Upgrading {proxy_alias} to implementation {}...",
            implementation.address
        );
        let request = TransactionRequest {
            network,
            signer_alias: self.config.signer_alias.clone(),
            contract_alias: proxy_alias.clone(),
            function_name: upgrade_function.to_string(),
            arguments: CalldataBuilder::new()
                .address(implementation.address)
                .build(),
        };

        let handle = match self.transactor.send(&request).await {
            Ok(handle) => handle,
            Err(ScriptError::Signer(e)) => return Err(ScriptError::Signer(e)),
            Err(e) => {
                return Err(ScriptError::Upgrade {
                    implementation: implementation.address,
                    reason: e.to_string(),
                })
            }
        };

        info!(
            "Successfully upgraded {proxy_alias} to implementation {}.\n\
            Transaction hash: {}",
            implementation.address, handle.tx_hash
        );
        progress.invocations.push(Invocation {
            contract: proxy_alias.clone(),
            function: request.function_name,
            tx_hash: handle.tx_hash,
        });
        Ok(())
    }

    /// Call the proxy's initializer, unless an earlier run already has
    async fn initialize(
        &self,
        proxy_alias: &ContractAlias,
        initializer: &str,
        initializer_args: &[ArgSpec],
        progress: &mut Progress,
    ) -> Result<(), ScriptError> {
        let network = self.config.network;
        if let Some(tx_hash) = self.registry.initialization(proxy_alias, network)? {
            info!(
                "{proxy_alias} already initialized on {network} (tx {tx_hash}), \
                skipping {initializer}"
            );
            return Ok(());
        }

        let arguments = resolve_arguments(initializer_args, self.config, self.registry)?;
        let tx_hash = self
            .send(proxy_alias, initializer, arguments, progress)
            .await?;
        self.registry
            .record_initialization(proxy_alias, network, tx_hash)
    }

    /// Send each follow-up call, in order
    async fn follow_up(
        &self,
        calls: &[FollowUpCall],
        progress: &mut Progress,
    ) -> Result<(), ScriptError> {
        for call in calls {
            if self.cancel.is_cancelled() {
                return Err(ScriptError::Cancelled);
            }

            let arguments = resolve_arguments(&call.args, self.config, self.registry)?;
            self.send(&call.contract, &call.function, arguments, progress)
                .await?;
        }

        Ok(())
    }

    /// Send a transaction from the configured signer
    async fn send(
        &self,
        contract: &ContractAlias,
        function: &str,
        arguments: Vec<Felt>,
        progress: &mut Progress,
    ) -> Result<TxHash, ScriptError> {
        debug!("Invoking {contract}.{function}...");
        let request = TransactionRequest {
            network: self.config.network,
            signer_alias: self.config.signer_alias.clone(),
            contract_alias: contract.clone(),
            function_name: function.to_string(),
            arguments,
        };
        let handle = self.transactor.send(&request).await?;

        info!("Invoked {contract}.{function}, transaction hash: {}", handle.tx_hash);
        progress.invocations.push(Invocation {
            contract: contract.clone(),
            function: request.function_name,
            tx_hash: handle.tx_hash,
        });
        Ok(handle.tx_hash)
    }
}
