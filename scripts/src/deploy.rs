//! The deployment step: deploys a contract at most once per (alias, network)

use tracing::{debug, info};

use crate::{
    errors::ScriptError,
    interfaces::Transactor,
    registry::AddressRegistry,
    types::{Artifact, ContractAlias, DeploymentRecord, Felt, NetworkIdentifier},
};

/// The result of a deployment step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentOutcome {
    /// The deployment record for the alias
    pub record: DeploymentRecord,
    /// Whether the contract was deployed by this step, as opposed to found in the registry
    pub fresh: bool,
}

/// Deploy `artifact` under `alias` on `network`, unless the registry already holds a
/// deployment for that key, in which case the existing record is returned untouched.
///
/// A fresh deployment is recorded before returning; a rejected one is never recorded.
pub async fn deploy<T: Transactor>(
    registry: &AddressRegistry,
    transactor: &T,
    alias: &ContractAlias,
    network: NetworkIdentifier,
    artifact: &Artifact,
    constructor_args: &[Felt],
) -> Result<DeploymentOutcome, ScriptError> {
    if let Some(record) = registry.lookup(alias, network)? {
        info!(
            "{alias} already deployed on {network} at {} (tx {}), skipping deployment",
            record.address, record.tx_hash
        );
        return Ok(DeploymentOutcome {
            record,
            fresh: false,
        });
    }

    debug!("Deploying {} as {alias} on {network}...", artifact.name);
    let deployed = transactor
        .deploy(network, alias, artifact, constructor_args)
        .await
        .map_err(|e| match e {
            ScriptError::Deployment(_) => e,
            other => ScriptError::Deployment(other.to_string()),
        })?;

    let record = registry.record(alias, network, deployed.address, deployed.tx_hash)?;
    info!(
        "{alias} successfully deployed!\n\
        Contract address: {}\n\
        Transaction hash: {}",
        record.address, record.tx_hash
    );

    Ok(DeploymentOutcome {
        record,
        fresh: true,
    })
}
