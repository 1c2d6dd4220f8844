//! Orchestration of Cairo contract deployments and proxy upgrades.
//!
//! A workflow compiles a contract, deploys it unless the address registry
//! already records a deployment for its alias on the target network, awaits
//! finality of the deployment, then invokes a proxy with the implementation's
//! address.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod calldata;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod errors;
pub mod finality;
pub mod interfaces;
pub mod nile;
pub mod plan;
pub mod registry;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_helpers;
