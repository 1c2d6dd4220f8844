//! Constants used in the deployment workflow

use ruint::aliases::U256;

/// The Starknet field prime, `2^251 + 17 * 2^192 + 1`
pub const FELT_PRIME: U256 = U256::from_limbs([1, 0, 0, 0x0800_0000_0000_0011]);

/// The number of bits in each limb of a `Uint256` argument
pub const UINT256_LIMB_BITS: usize = 128;

/// The maximum number of bytes in a Cairo short string
pub const MAX_SHORT_STRING_LEN: usize = 31;

/// The suffix of a per-network deployments registry file
pub const DEPLOYMENTS_FILE_SUFFIX: &str = "deployments.json";

/// The extension used for in-flight registry writes, renamed into place once complete
pub const TMP_FILE_EXTENSION: &str = "tmp";

/// The default directory holding deployments registry files
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// The default directory in which compiled artifacts are written
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The extension of a compiled artifact
pub const ARTIFACT_EXTENSION: &str = "json";

/// The default name of the `nile` binary
pub const DEFAULT_NILE_COMMAND: &str = "nile";

/// The `nile` compile subcommand
pub const COMPILE_COMMAND: &str = "compile";

/// The `nile` deploy subcommand
pub const DEPLOY_COMMAND: &str = "deploy";

/// The `nile` invoke subcommand
pub const SEND_COMMAND: &str = "send";

/// The `nile` read-only call subcommand
pub const CALL_COMMAND: &str = "call";

/// The `nile` transaction status subcommand
pub const STATUS_COMMAND: &str = "status";

/// The flag naming a deployment in `nile`'s own deployments file
pub const ALIAS_FLAG: &str = "--alias";

/// The flag selecting the network for a `nile` command
pub const NETWORK_FLAG: &str = "--network";

/// The default signer alias for privileged operations
pub const DEFAULT_SIGNER_ALIAS: &str = "ADMIN";

/// The default name of the proxy upgrade function
pub const DEFAULT_UPGRADE_FN_NAME: &str = "upgrade";

/// The default name of the proxy initializer function
pub const DEFAULT_INITIALIZER_FN_NAME: &str = "initializer";

/// The default finality delay, sized to the confirmation latency of a public test network
pub const DEFAULT_FINALITY_DELAY_SECS: u64 = 180;

/// The default interval between finality polls, before backoff
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// The default ceiling on a single backoff interval
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// The default number of status polls before giving up on finality
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// The factor by which the poll interval grows after each attempt
pub const POLL_BACKOFF_FACTOR: u32 = 2;
