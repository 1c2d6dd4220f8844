//! Implementations of the orchestrator's subcommands

use eyre::{eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    cli::{Cli, LookupArgs, RunArgs},
    errors::ScriptError,
    nile::{NileCommand, NileCompiler, NileTransactor},
    plan::WorkflowPlan,
    registry::AddressRegistry,
    types::ContractAlias,
    workflow::Workflow,
};

/// Run the workflow described by the plan file
pub async fn run_workflow(args: &RunArgs, cli: &Cli, cancel: CancellationToken) -> Result<()> {
    let plan = WorkflowPlan::from_file(&args.plan)?;
    let config = cli.configuration();
    let registry = AddressRegistry::new(&cli.deployments_dir);
    let finality = cli.finality.policy();

    let nile = NileCommand::new(&cli.nile_bin);
    let compiler = NileCompiler::new(nile.clone(), &cli.artifacts_dir);
    let transactor = NileTransactor::new(nile, registry.clone());

    let workflow = Workflow::new(&compiler, &transactor, &finality, &registry, &config)
        .with_cancellation(cancel);

    match workflow.run(&plan).await {
        Ok(report) => {
            info!(
                "{} workflow reached {} with {} deployment(s) and {} transaction(s)",
                report.variant,
                report.final_state,
                report.records.len(),
                report.invocations.len()
            );
            for record in &report.records {
                info!("  {} at {} (tx {})", record.alias, record.address, record.tx_hash);
            }
            for invocation in &report.invocations {
                info!(
                    "  {}.{} (tx {})",
                    invocation.contract, invocation.function, invocation.tx_hash
                );
            }

            Ok(())
        }
        Err(failure) => {
            if let ScriptError::Upgrade { implementation, .. } = &failure.error {
                warn!(
                    "The implementation is deployed but the proxy still points at the old one.\n\
                    Retry the upgrade by hand with implementation address {implementation},\n\
                    or rerun this plan, which will skip the deployment."
                );
            }

            error!("{failure}");
            Err(failure.into())
        }
    }
}

/// Print the recorded deployment of a contract
pub fn lookup(args: &LookupArgs, cli: &Cli) -> Result<()> {
    let registry = AddressRegistry::new(&cli.deployments_dir);
    let alias = ContractAlias::new(args.alias.as_str());

    let record = registry
        .lookup(&alias, cli.network)?
        .ok_or_else(|| eyre!("{alias} has no recorded deployment on {}", cli.network))?;

    println!("Contract address: {}", record.address);
    println!("Transaction hash: {}", record.tx_hash);
    Ok(())
}

/// Print every recorded deployment on the network
pub fn list(cli: &Cli) -> Result<()> {
    let registry = AddressRegistry::new(&cli.deployments_dir);
    let records = registry.records(cli.network)?;
    if records.is_empty() {
        info!("No deployments recorded on {}", cli.network);
    }

    for record in records {
        println!("{}\t{}\t{}", record.alias, record.address, record.tx_hash);
    }

    Ok(())
}
