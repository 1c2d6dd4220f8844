//! Process-wide configuration, read once at workflow start

use std::{collections::BTreeMap, str::FromStr};

use crate::{
    errors::ScriptError,
    types::{Address, NetworkIdentifier},
};

/// The immutable configuration of a single workflow run
#[derive(Clone, Debug)]
pub struct Configuration {
    /// The network the workflow targets
    pub network: NetworkIdentifier,
    /// The alias of the signer used for privileged operations
    pub signer_alias: String,
    /// Known peer contract addresses (e.g. token proxies), by name
    peers: BTreeMap<String, Address>,
}

impl Configuration {
    /// Build a configuration
    pub fn new(
        network: NetworkIdentifier,
        signer_alias: impl Into<String>,
        peers: impl IntoIterator<Item = (String, Address)>,
    ) -> Self {
        Self {
            network,
            signer_alias: signer_alias.into(),
            peers: peers.into_iter().collect(),
        }
    }

    /// The address of the named peer contract
    pub fn peer(&self, name: &str) -> Result<Address, ScriptError> {
        self.peers
            .get(name)
            .copied()
            .ok_or_else(|| ScriptError::Config(format!("no address configured for peer `{name}`")))
    }
}

/// Parse a `name=0x...` peer address assignment
pub fn parse_peer(s: &str) -> Result<(String, Address), ScriptError> {
    let (name, address) = s
        .split_once('=')
        .ok_or_else(|| ScriptError::Config(format!("expected `name=address`, got `{s}`")))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ScriptError::Config(format!("empty peer name in `{s}`")));
    }

    let address = Address::from_str(address)
        .map_err(|e| ScriptError::Config(format!("invalid address for peer `{name}`: {e}")))?;
    Ok((name.to_string(), address))
}
