//! Definitions of errors that can occur during the execution of the deployment workflow

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use crate::types::{Address, DeploymentRecord};

/// Errors that can occur during the execution of the deployment workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Error compiling a contract source into an artifact
    Compile(String),
    /// The network rejected, or we failed to submit, a deployment transaction
    Deployment(String),
    /// Connectivity error, or a rejected call / invoke transaction
    Network(String),
    /// Finality was not observed before the configured ceiling
    Timeout(String),
    /// The signer is not configured for the active network
    Signer(String),
    /// The proxy rejected the upgrade call.
    ///
    /// Carries the resolved implementation address so that the operator
    /// can retry the upgrade by hand.
    Upgrade {
        /// The implementation address the proxy was asked to point at
        implementation: Address,
        /// The underlying reason for the failure
        reason: String,
    },
    /// The deployments registry is unreadable, unwritable, or corrupt
    Storage(String),
    /// Invalid or incomplete configuration
    Config(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// The workflow was cancelled before completion
    Cancelled,
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Compile(s) => write!(f, "error compiling contract: {}", s),
            ScriptError::Deployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::Network(s) => write!(f, "network error: {}", s),
            ScriptError::Timeout(s) => write!(f, "timed out awaiting finality: {}", s),
            ScriptError::Signer(s) => write!(f, "signer error: {}", s),
            ScriptError::Upgrade {
                implementation,
                reason,
            } => write!(
                f,
                "error upgrading proxy to implementation {}: {}",
                implementation, reason
            ),
            ScriptError::Storage(s) => write!(f, "error accessing deployments registry: {}", s),
            ScriptError::Config(s) => write!(f, "configuration error: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::Cancelled => write!(f, "workflow cancelled"),
        }
    }
}

impl Error for ScriptError {}

/// A terminal workflow failure.
///
/// Surfaces the state the workflow was in when the failure occurred, along
/// with every deployment record resolved so far, so that the operator can
/// resume by rerunning the workflow unchanged.
#[derive(Debug)]
pub struct WorkflowFailure {
    /// The state in which the failing step was executing
    pub state: crate::workflow::WorkflowState,
    /// The deployment records resolved before the failure
    pub resolved: Vec<DeploymentRecord>,
    /// The underlying error
    pub error: ScriptError,
}

impl Display for WorkflowFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "workflow failed in state {}: {}", self.state, self.error)?;
        for record in &self.resolved {
            write!(
                f,
                "\n  resolved {} on {} at {} (tx {})",
                record.alias, record.network, record.address, record.tx_hash
            )?;
        }

        Ok(())
    }
}

impl Error for WorkflowFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}
