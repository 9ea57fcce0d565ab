//! Static deployment configuration: network targets, compiler settings,
//! and the signing keys read from the environment.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod compiler;
pub mod errors;
pub mod keys;
pub mod networks;
