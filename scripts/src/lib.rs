//! Scripts for compiling, deploying and upgrading the Bunny contracts.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cli;
pub mod client;
mod commands;
pub mod compile;
pub mod constants;
pub mod deployer;
pub mod dry_run;
pub mod errors;
pub mod manifest;
pub mod migrations;
pub mod proxy;
pub mod size;
mod solidity;
