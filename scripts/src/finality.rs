//! Policies for awaiting the finality of a deployment before issuing
//! transactions that depend on it

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    constants::POLL_BACKOFF_FACTOR,
    deploy::DeploymentOutcome,
    errors::ScriptError,
    interfaces::Transactor,
    types::TxStatus,
};

/// A policy deciding when a deployment is final
#[allow(async_fn_in_trait)]
pub trait FinalityPolicy {
    /// Block until the deployment is final.
    ///
    /// No transaction depending on the deployment may be submitted before this returns `Ok`.
    /// Deployments reused from the registry were submitted by an earlier run, so policies
    /// need not wait out their confirmation latency again.
    async fn await_finality<T: Transactor>(
        &self,
        transactor: &T,
        deployment: &DeploymentOutcome,
    ) -> Result<(), ScriptError>;
}

/// Treats every deployment as final immediately.
///
/// Only suitable for tests and local devnets that confirm instantly.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl FinalityPolicy for Immediate {
    async fn await_finality<T: Transactor>(
        &self,
        _transactor: &T,
        _deployment: &DeploymentOutcome,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// Waits a fixed wall-clock delay, sized to the network's expected confirmation latency.
///
/// Never inspects the chain, so a deployment rejected after submission goes unnoticed
/// until the dependent transaction fails. Reused deployments are not waited on.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay {
    /// How long to wait
    pub delay: Duration,
}

impl FinalityPolicy for FixedDelay {
    async fn await_finality<T: Transactor>(
        &self,
        _transactor: &T,
        deployment: &DeploymentOutcome,
    ) -> Result<(), ScriptError> {
        let record = &deployment.record;
        if !deployment.fresh {
            debug!("{} was deployed by an earlier run, not waiting", record.alias);
            return Ok(());
        }

        info!(
            "🕒 Waiting {}s for {} to be accepted before invoking...",
            self.delay.as_secs(),
            record.alias
        );
        sleep(self.delay).await;
        Ok(())
    }
}

/// Polls the deployment transaction's status with exponential backoff.
///
/// Reused deployments are polled right away, skipping the initial delay.
#[derive(Clone, Copy, Debug)]
pub struct PollStatus {
    /// How long to wait before the first poll
    pub initial_delay: Duration,
    /// The interval between the first and second polls
    pub interval: Duration,
    /// The ceiling on the interval between polls
    pub max_interval: Duration,
    /// The number of polls after which to give up
    pub max_attempts: u32,
}

impl FinalityPolicy for PollStatus {
    async fn await_finality<T: Transactor>(
        &self,
        transactor: &T,
        deployment: &DeploymentOutcome,
    ) -> Result<(), ScriptError> {
        let record = &deployment.record;
        if deployment.fresh {
            sleep(self.initial_delay).await;
        }

        let mut interval = self.interval;
        for attempt in 1..=self.max_attempts {
            match transactor
                .transaction_status(record.network, record.tx_hash)
                .await
            {
                Ok(status) if status.is_final() => {
                    info!("{} deployment is final ({status:?})", record.alias);
                    return Ok(());
                }
                Ok(TxStatus::Rejected) => {
                    return Err(ScriptError::Deployment(format!(
                        "deployment of {} was rejected (tx {})",
                        record.alias, record.tx_hash
                    )));
                }
                Ok(status) => {
                    debug!(
                        "{} deployment not yet final ({status:?}), attempt {attempt}/{}",
                        record.alias, self.max_attempts
                    );
                }
                // Connectivity blips are transient, keep polling
                Err(ScriptError::Network(e)) => {
                    warn!("Error polling status of {}: {e}", record.tx_hash);
                }
                Err(e) => return Err(e),
            }

            if attempt < self.max_attempts {
                sleep(interval).await;
                interval = (interval * POLL_BACKOFF_FACTOR).min(self.max_interval);
            }
        }

        Err(ScriptError::Timeout(format!(
            "{} (tx {}) not final after {} polls",
            record.alias, record.tx_hash, self.max_attempts
        )))
    }
}

/// The finality policy selected at runtime
#[derive(Clone, Copy, Debug)]
pub enum Finality {
    /// See [`Immediate`]
    Immediate(Immediate),
    /// See [`FixedDelay`]
    FixedDelay(FixedDelay),
    /// See [`PollStatus`]
    PollStatus(PollStatus),
}

impl FinalityPolicy for Finality {
    async fn await_finality<T: Transactor>(
        &self,
        transactor: &T,
        deployment: &DeploymentOutcome,
    ) -> Result<(), ScriptError> {
        match self {
            Finality::Immediate(policy) => policy.await_finality(transactor, deployment).await,
            Finality::FixedDelay(policy) => policy.await_finality(transactor, deployment).await,
            Finality::PollStatus(policy) => policy.await_finality(transactor, deployment).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, time::Duration};

    use tokio::time::Instant;

    use crate::{
        deploy::DeploymentOutcome,
        errors::ScriptError,
        test_helpers::MockTransactor,
        types::{Address, ContractAlias, DeploymentRecord, NetworkIdentifier, TxHash, TxStatus},
    };

    use super::{FinalityPolicy, FixedDelay, PollStatus};

    fn record() -> DeploymentRecord {
        DeploymentRecord {
            alias: ContractAlias::from("Exchange"),
            network: NetworkIdentifier::Goerli,
            address: Address::from_str("0xabc").unwrap(),
            tx_hash: TxHash::from_str("0x123").unwrap(),
        }
    }

    fn fresh() -> DeploymentOutcome {
        DeploymentOutcome {
            record: record(),
            fresh: true,
        }
    }

    fn reused() -> DeploymentOutcome {
        DeploymentOutcome {
            record: record(),
            fresh: false,
        }
    }

    fn poll_policy() -> PollStatus {
        PollStatus {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(3),
            max_attempts: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_waits_at_least_delay() {
        let policy = FixedDelay {
            delay: Duration::from_secs(180),
        };
        let start = Instant::now();
        policy
            .await_finality(&MockTransactor::default(), &fresh())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_final() {
        let transactor = MockTransactor::default();
        transactor.push_status(Ok(TxStatus::Received));
        transactor.push_status(Ok(TxStatus::Pending));
        transactor.push_status(Ok(TxStatus::AcceptedOnL2));

        let start = Instant::now();
        poll_policy().await_finality(&transactor, &fresh()).await.unwrap();

        assert_eq!(transactor.status_polls(), 3);
        // initial delay, then 1s and 2s of backoff
        assert!(start.elapsed() >= Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_tolerates_network_errors() {
        let transactor = MockTransactor::default();
        transactor.push_status(Err(ScriptError::Network("timeout".to_string())));
        transactor.push_status(Ok(TxStatus::AcceptedOnL1));

        poll_policy().await_finality(&transactor, &fresh()).await.unwrap();
        assert_eq!(transactor.status_polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_rejected_is_deployment_error() {
        let transactor = MockTransactor::default();
        transactor.push_status(Ok(TxStatus::Rejected));

        let res = poll_policy().await_finality(&transactor, &fresh()).await;
        assert!(matches!(res, Err(ScriptError::Deployment(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let transactor = MockTransactor::default();
        for _ in 0..10 {
            transactor.push_status(Ok(TxStatus::Pending));
        }

        let res = poll_policy().await_finality(&transactor, &fresh()).await;
        assert!(matches!(res, Err(ScriptError::Timeout(_))));
        assert_eq!(transactor.status_polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_skips_reused_deployment() {
        let policy = FixedDelay {
            delay: Duration::from_secs(180),
        };
        let start = Instant::now();
        policy
            .await_finality(&MockTransactor::default(), &reused())
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reused_deployment_skips_initial_delay() {
        let transactor = MockTransactor::default();
        transactor.push_status(Ok(TxStatus::AcceptedOnL1));

        let start = Instant::now();
        poll_policy().await_finality(&transactor, &reused()).await.unwrap();

        // Still verified on chain, just without the initial delay
        assert_eq!(transactor.status_polls(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reused_rejected_deployment_still_fails() {
        let transactor = MockTransactor::default();
        transactor.push_status(Ok(TxStatus::Rejected));

        let res = poll_policy().await_finality(&transactor, &reused()).await;
        assert!(matches!(res, Err(ScriptError::Deployment(_))));
    }
}
