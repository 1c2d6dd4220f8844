//! Workflow plans: which contract to deploy, under which alias, and which
//! workflow variant to run afterwards.
//!
//! Plans are read from a JSON file, e.g.
//!
//! ```json
//! {
//!     "source": "contracts/exchange/Exchange_ERC20_1155.cairo",
//!     "alias": "Exchange_ERC20_1155",
//!     "variant": { "kind": "deploy_and_upgrade", "proxy_alias": "proxy_Exchange_ERC20_1155" }
//! }
//! ```

use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    calldata::CalldataBuilder,
    config::Configuration,
    constants::{DEFAULT_INITIALIZER_FN_NAME, DEFAULT_UPGRADE_FN_NAME},
    errors::ScriptError,
    registry::AddressRegistry,
    types::{Address, ContractAlias, Felt, Uint256},
};

/// A single deployment workflow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowPlan {
    /// The path of the implementation contract's source
    pub source: PathBuf,
    /// The alias to deploy the implementation under
    pub alias: ContractAlias,
    /// Constructor arguments for the implementation
    #[serde(default)]
    pub constructor_args: Vec<ArgSpec>,
    /// What to do once the implementation is deployed
    pub variant: WorkflowVariant,
}

impl WorkflowPlan {
    /// Read a plan from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::Config(format!("reading plan {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| ScriptError::Config(format!("parsing plan {}: {e}", path.display())))
    }
}

/// The workflow variants, selected by configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowVariant {
    /// Compile, deploy, and await finality of the implementation
    DeployOnly,
    /// Additionally deploy a proxy pointing at the implementation and call its initializer
    DeployAndInitialize {
        /// The path of the proxy contract's source
        proxy_source: PathBuf,
        /// The alias to deploy the proxy under
        proxy_alias: ContractAlias,
        /// Constructor arguments for the proxy.
        ///
        /// Defaults to the implementation's address.
        #[serde(default)]
        proxy_constructor_args: Option<Vec<ArgSpec>>,
        /// The name of the proxy's initializer
        #[serde(default = "default_initializer")]
        initializer: String,
        /// Arguments to the initializer
        #[serde(default)]
        initializer_args: Vec<ArgSpec>,
        /// Transactions to send once the proxy is initialized, e.g. token approvals
        #[serde(default)]
        follow_up_calls: Vec<FollowUpCall>,
    },
    /// Point an existing proxy at the freshly deployed implementation
    DeployAndUpgrade {
        /// The alias of the proxy to upgrade
        proxy_alias: ContractAlias,
        /// The name of the proxy's upgrade function
        #[serde(default = "default_upgrade_function")]
        upgrade_function: String,
    },
}

impl WorkflowVariant {
    /// A short name for the variant, for logging
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowVariant::DeployOnly => "deploy-only",
            WorkflowVariant::DeployAndInitialize { .. } => "deploy-and-initialize",
            WorkflowVariant::DeployAndUpgrade { .. } => "deploy-and-upgrade",
        }
    }
}

/// The default name of the proxy initializer
fn default_initializer() -> String {
    DEFAULT_INITIALIZER_FN_NAME.to_string()
}

/// The default name of the proxy upgrade function
fn default_upgrade_function() -> String {
    DEFAULT_UPGRADE_FN_NAME.to_string()
}

/// A transaction to send once the main workflow step has completed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowUpCall {
    /// The alias of the contract to invoke
    pub contract: ContractAlias,
    /// The function to invoke
    pub function: String,
    /// Arguments to the function
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

/// A logical argument, encoded into one or more field elements when resolved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgSpec {
    /// A plain field element
    Felt(Felt),
    /// A 256-bit integer, encoded as its low and high 128-bit limbs
    Uint256(Uint256),
    /// A literal contract address
    Address(Address),
    /// A Cairo short string
    ShortString(String),
    /// The address of a named peer contract from the configuration
    Peer(String),
    /// The address of a contract previously recorded in the registry
    Deployed(ContractAlias),
}

/// Resolve logical arguments into positional calldata.
///
/// Peer and deployed-contract references are resolved at call time, against the
/// configuration and the registry respectively.
pub fn resolve_arguments(
    args: &[ArgSpec],
    config: &Configuration,
    registry: &AddressRegistry,
) -> Result<Vec<Felt>, ScriptError> {
    let mut builder = CalldataBuilder::new();
    for arg in args {
        builder = match arg {
            ArgSpec::Felt(felt) => builder.felt(*felt),
            ArgSpec::Uint256(value) => builder.uint256(value.value()),
            ArgSpec::Address(address) => builder.address(*address),
            ArgSpec::ShortString(s) => builder.short_string(s)?,
            ArgSpec::Peer(name) => builder.address(config.peer(name)?),
            ArgSpec::Deployed(alias) => {
                let record = registry.lookup(alias, config.network)?.ok_or_else(|| {
                    ScriptError::Storage(format!(
                        "{alias} has no recorded deployment on {}",
                        config.network
                    ))
                })?;
                builder.address(record.address)
            }
        };
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::{
        errors::ScriptError,
        test_helpers::{goerli_config, temp_registry},
        types::{Address, ContractAlias, Felt, NetworkIdentifier, TxHash, Uint256},
    };

    use super::{resolve_arguments, ArgSpec, WorkflowPlan, WorkflowVariant};

    #[test]
    fn test_parse_upgrade_plan() {
        let plan: WorkflowPlan = serde_json::from_str(
            r#"{
                "source": "contracts/exchange/Exchange_ERC20_1155.cairo",
                "alias": "Exchange_ERC20_1155",
                "variant": { "kind": "deploy_and_upgrade", "proxy_alias": "proxy_Exchange_ERC20_1155" }
            }"#,
        )
        .unwrap();

        assert_eq!(plan.alias, ContractAlias::from("Exchange_ERC20_1155"));
        assert!(plan.constructor_args.is_empty());
        assert_eq!(
            plan.variant,
            WorkflowVariant::DeployAndUpgrade {
                proxy_alias: ContractAlias::from("proxy_Exchange_ERC20_1155"),
                upgrade_function: "upgrade".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_initialize_plan() {
        let plan: WorkflowPlan = serde_json::from_str(
            r#"{
                "source": "contracts/exchange/Exchange_ERC20_1155.cairo",
                "alias": "Exchange_ERC20_1155",
                "variant": {
                    "kind": "deploy_and_initialize",
                    "proxy_source": "contracts/proxy/PROXY_Logic.cairo",
                    "proxy_alias": "proxy_Exchange_ERC20_1155",
                    "initializer_args": [
                        { "type": "peer", "value": "lords_proxy" },
                        { "type": "uint256", "value": "100" },
                        { "type": "felt", "value": "0x1" }
                    ]
                }
            }"#,
        )
        .unwrap();

        match plan.variant {
            WorkflowVariant::DeployAndInitialize {
                initializer,
                initializer_args,
                proxy_constructor_args,
                follow_up_calls,
                ..
            } => {
                assert_eq!(initializer, "initializer");
                assert_eq!(proxy_constructor_args, None);
                assert!(follow_up_calls.is_empty());
                assert_eq!(
                    initializer_args,
                    vec![
                        ArgSpec::Peer("lords_proxy".to_string()),
                        ArgSpec::Uint256(Uint256::from(100u128)),
                        ArgSpec::Felt(Felt::from(1u64)),
                    ]
                );
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_sample_initialize_plan() {
        let plan: WorkflowPlan =
            serde_json::from_str(include_str!("../plans/initialize_exchange.json")).unwrap();

        match plan.variant {
            WorkflowVariant::DeployAndInitialize {
                initializer_args,
                follow_up_calls,
                ..
            } => {
                // The exchange takes the admin as both owner and proxy admin
                assert_eq!(initializer_args.len(), 6);
                assert_eq!(initializer_args[4], ArgSpec::Peer("admin".to_string()));
                assert_eq!(initializer_args[5], ArgSpec::Peer("admin".to_string()));

                assert_eq!(follow_up_calls.len(), 2);
                let allowance = &follow_up_calls[1];
                assert_eq!(allowance.contract, ContractAlias::from("proxy_lords"));
                assert_eq!(allowance.function, "increaseAllowance");
                assert_eq!(
                    allowance.args,
                    vec![
                        ArgSpec::Deployed(ContractAlias::from("proxy_Exchange_ERC20_1155")),
                        ArgSpec::Uint256(
                            Uint256::from_str("50000000000000000000000000").unwrap()
                        ),
                    ]
                );
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let res: Result<WorkflowPlan, _> = serde_json::from_str(
            r#"{ "source": "a.cairo", "alias": "a", "variant": { "kind": "redeploy_everything" } }"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_resolve_arguments() {
        let (_dir, registry) = temp_registry();
        let config = goerli_config();
        registry
            .record(
                &ContractAlias::from("Exchange"),
                NetworkIdentifier::Goerli,
                Address::from_str("0xabc").unwrap(),
                TxHash::from_str("0x1").unwrap(),
            )
            .unwrap();

        let calldata = resolve_arguments(
            &[
                ArgSpec::Deployed(ContractAlias::from("Exchange")),
                ArgSpec::Peer("lords_proxy".to_string()),
                ArgSpec::Uint256(Uint256::from(100u128)),
            ],
            &config,
            &registry,
        )
        .unwrap();

        assert_eq!(
            calldata,
            vec![
                Felt::from(0xabcu64),
                Felt::from(0x111u64),
                Felt::from(100u64),
                Felt::ZERO,
            ]
        );
    }

    #[test]
    fn test_resolve_unrecorded_alias_is_storage_error() {
        let (_dir, registry) = temp_registry();
        let res = resolve_arguments(
            &[ArgSpec::Deployed(ContractAlias::from("Nowhere"))],
            &goerli_config(),
            &registry,
        );
        assert!(matches!(res, Err(ScriptError::Storage(_))));
    }
}
