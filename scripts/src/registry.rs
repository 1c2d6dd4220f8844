//! The address registry: a persisted mapping from (alias, network) to the
//! deployed contract's address and deployment transaction hash.
//!
//! Each network is stored in its own pretty-printed JSON file,
//! `<dir>/<network>.deployments.json`, keyed by alias:
//!
//! ```json
//! {
//!     "deployments": {
//!         "Exchange_ERC20_1155": {
//!             "address": "0x6f3e...",
//!             "tx_hash": "0x1b2a..."
//!         }
//!     },
//!     "initializations": {
//!         "proxy_Exchange_ERC20_1155": "0x3c4d..."
//!     }
//! }
//! ```
//!
//! `initializations` holds the initializer transaction of each proxy that has been
//! initialized, so that a rerun never initializes the same proxy twice.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    constants::{DEPLOYMENTS_FILE_SUFFIX, TMP_FILE_EXTENSION},
    errors::ScriptError,
    types::{Address, ContractAlias, DeploymentRecord, NetworkIdentifier, TxHash},
};

/// The on-disk contents of a single network's deployments file
#[derive(Debug, Default, Serialize, Deserialize)]
struct DeploymentsFile {
    /// Deployments on this network, keyed by alias
    #[serde(default)]
    deployments: BTreeMap<ContractAlias, RegistryEntry>,
    /// Initializer transactions, keyed by the alias of the initialized contract
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    initializations: BTreeMap<ContractAlias, TxHash>,
}

/// A single persisted deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryEntry {
    /// The address of the deployed contract
    address: Address,
    /// The hash of the deployment transaction
    tx_hash: TxHash,
}

/// A file-backed address registry, partitioned by network
#[derive(Clone, Debug)]
pub struct AddressRegistry {
    /// The directory holding the per-network deployments files
    dir: PathBuf,
}

impl AddressRegistry {
    /// Open a registry rooted at the given directory.
    ///
    /// The directory is created lazily, on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The path of the deployments file for the given network
    pub fn path_for(&self, network: NetworkIdentifier) -> PathBuf {
        self.dir
            .join(format!("{}.{}", network.as_str(), DEPLOYMENTS_FILE_SUFFIX))
    }

    /// Look up the deployment of `alias` on `network`.
    ///
    /// Returns `None` if the alias has never been recorded on the network.
    pub fn lookup(
        &self,
        alias: &ContractAlias,
        network: NetworkIdentifier,
    ) -> Result<Option<DeploymentRecord>, ScriptError> {
        let file = self.read(network)?;
        let record = file.deployments.get(alias).map(|entry| DeploymentRecord {
            alias: alias.clone(),
            network,
            address: entry.address,
            tx_hash: entry.tx_hash,
        });

        trace!("Registry lookup of {alias} on {network}: {record:?}");
        Ok(record)
    }

    /// Record the deployment of `alias` on `network`, superseding any prior record
    pub fn record(
        &self,
        alias: &ContractAlias,
        network: NetworkIdentifier,
        address: Address,
        tx_hash: TxHash,
    ) -> Result<DeploymentRecord, ScriptError> {
        let mut file = self.read(network)?;
        file.deployments
            .insert(alias.clone(), RegistryEntry { address, tx_hash });
        // A new deployment starts out uninitialized
        file.initializations.remove(alias);
        self.write(network, &file)?;

        debug!("Recorded {alias} on {network} at {address} (tx {tx_hash})");
        Ok(DeploymentRecord {
            alias: alias.clone(),
            network,
            address,
            tx_hash,
        })
    }

    /// The initializer transaction of `alias` on `network`, if it has been initialized
    pub fn initialization(
        &self,
        alias: &ContractAlias,
        network: NetworkIdentifier,
    ) -> Result<Option<TxHash>, ScriptError> {
        Ok(self.read(network)?.initializations.get(alias).copied())
    }

    /// Record that `alias` on `network` was initialized by `tx_hash`
    pub fn record_initialization(
        &self,
        alias: &ContractAlias,
        network: NetworkIdentifier,
        tx_hash: TxHash,
    ) -> Result<(), ScriptError> {
        let mut file = self.read(network)?;
        if !file.deployments.contains_key(alias) {
            return Err(ScriptError::Storage(format!(
                "cannot record initialization of {alias}, which has no recorded deployment on {network}"
            )));
        }

        file.initializations.insert(alias.clone(), tx_hash);
        self.write(network, &file)?;

        debug!("Recorded initialization of {alias} on {network} (tx {tx_hash})");
        Ok(())
    }

    /// All deployments recorded on `network`, ordered by alias
    pub fn records(&self, network: NetworkIdentifier) -> Result<Vec<DeploymentRecord>, ScriptError> {
        let file = self.read(network)?;
        Ok(file
            .deployments
            .into_iter()
            .map(|(alias, entry)| DeploymentRecord {
                alias,
                network,
                address: entry.address,
                tx_hash: entry.tx_hash,
            })
            .collect())
    }

    /// Read the deployments file for `network`, treating a missing file as empty
    fn read(&self, network: NetworkIdentifier) -> Result<DeploymentsFile, ScriptError> {
        let path = self.path_for(network);
        if !path.exists() {
            return Ok(DeploymentsFile::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::Storage(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| ScriptError::Storage(format!("parsing {}: {e}", path.display())))
    }

    /// Atomically replace the deployments file for `network`.
    ///
    /// The new contents are written to a sibling temp file which is then renamed
    /// over the original, so a crash never leaves a half-written file behind.
    fn write(&self, network: NetworkIdentifier, file: &DeploymentsFile) -> Result<(), ScriptError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ScriptError::Storage(format!("creating {}: {e}", self.dir.display()))
        })?;

        let path = self.path_for(network);
        let tmp_path = path.with_extension(TMP_FILE_EXTENSION);
        let contents = serde_json::to_string_pretty(file)
            .map_err(|e| ScriptError::Storage(e.to_string()))?;

        write_file(&tmp_path, &contents)?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| ScriptError::Storage(format!("replacing {}: {e}", path.display())))
    }
}

/// Write `contents` to `path`, flushing to disk before returning
fn write_file(path: &Path, contents: &str) -> Result<(), ScriptError> {
    use std::io::Write;

    let mut f = fs::File::create(path)
        .map_err(|e| ScriptError::Storage(format!("creating {}: {e}", path.display())))?;
    f.write_all(contents.as_bytes())
        .and_then(|_| f.sync_all())
        .map_err(|e| ScriptError::Storage(format!("writing {}: {e}", path.display())))
}
