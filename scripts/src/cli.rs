//! Definitions of CLI arguments and commands for the deployment orchestrator

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::{
    commands::{list, lookup, run_workflow},
    config::{parse_peer, Configuration},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_DEPLOYMENTS_DIR, DEFAULT_FINALITY_DELAY_SECS,
        DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_MAX_POLL_INTERVAL_MS, DEFAULT_NILE_COMMAND,
        DEFAULT_POLL_INTERVAL_MS, DEFAULT_SIGNER_ALIAS,
    },
    finality::{Finality, FixedDelay, Immediate, PollStatus},
    types::{Address, NetworkIdentifier},
};

/// Compile, deploy, and upgrade contracts behind proxies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Which network you'd like to use
    #[arg(short, long, env = "NETWORK")]
    pub network: NetworkIdentifier,

    /// The alias of the signer used to send transactions.
    /// Its private key is expected in the environment variable of the same name.
    #[arg(short, long, env = "SIGNER_ALIAS", default_value = DEFAULT_SIGNER_ALIAS)]
    pub signer_alias: String,

    /// The directory holding the per-network deployment registries
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_DIR)]
    pub deployments_dir: PathBuf,

    /// The directory compiled artifacts are written to
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// The nile executable
    #[arg(long, env = "NILE_BIN", default_value = DEFAULT_NILE_COMMAND)]
    pub nile_bin: String,

    /// The address of a peer contract, as `name=0x...`. May be repeated.
    #[arg(long = "peer", value_parser = parse_peer)]
    pub peers: Vec<(String, Address)>,

    /// How to await finality of deployments
    #[command(flatten)]
    pub finality: FinalityArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The configuration of a workflow run
    pub fn configuration(&self) -> Configuration {
        Configuration::new(self.network, self.signer_alias.clone(), self.peers.clone())
    }
}

/// How to decide that a deployment is final
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FinalityMode {
    /// Don't wait at all. For devnets only.
    #[value(name = "none")]
    Immediate,
    /// Wait a fixed delay
    Fixed,
    /// Poll the deployment transaction's status
    Poll,
}

/// Arguments configuring the finality policy
#[derive(Args, Debug)]
pub struct FinalityArgs {
    /// How to await finality of deployments before invoking them
    #[arg(long, value_enum, default_value_t = FinalityMode::Poll)]
    pub finality: FinalityMode,

    /// The delay in seconds used by the `fixed` mode, and before the first `poll`
    #[arg(long, default_value_t = DEFAULT_FINALITY_DELAY_SECS)]
    pub finality_delay_secs: u64,

    /// The initial interval between status polls, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// The ceiling on the interval between status polls, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_INTERVAL_MS)]
    pub max_poll_interval_ms: u64,

    /// The number of status polls after which to give up
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_ATTEMPTS)]
    pub max_poll_attempts: u32,
}

impl FinalityArgs {
    /// The finality policy selected by these arguments
    pub fn policy(&self) -> Finality {
        let delay = Duration::from_secs(self.finality_delay_secs);
        match self.finality {
            FinalityMode::Immediate => Finality::Immediate(Immediate),
            FinalityMode::Fixed => Finality::FixedDelay(FixedDelay { delay }),
            FinalityMode::Poll => Finality::PollStatus(PollStatus {
                initial_delay: delay,
                interval: Duration::from_millis(self.poll_interval_ms),
                max_interval: Duration::from_millis(self.max_poll_interval_ms),
                max_attempts: self.max_poll_attempts,
            }),
        }
    }
}

/// The orchestrator's subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the workflow described by a plan file.
    /// Rerunning a plan after a failure resumes where it left off.
    Run(RunArgs),

    /// Prints the recorded deployment of a contract
    Lookup(LookupArgs),

    /// Prints every recorded deployment on the network
    List,
}

impl Command {
    /// Run the command, aborting workflows once `cancel` fires
    pub async fn run(&self, cli: &Cli, cancel: CancellationToken) -> eyre::Result<()> {
        match self {
            Command::Run(args) => run_workflow(args, cli, cancel).await,
            Command::Lookup(args) => lookup(args, cli),
            Command::List => list(cli),
        }
    }
}

/// Arguments to the `run` subcommand
#[derive(Args, Debug)]
pub struct RunArgs {
    /// The path of the JSON plan to run
    #[arg(short, long)]
    pub plan: PathBuf,
}

/// Arguments to the `lookup` subcommand
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// The alias the contract was deployed under
    #[arg(short, long)]
    pub alias: String,
}
