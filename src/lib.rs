//! Run commands on a host reachable only through a chain of SSH jump hosts.
//!
//! ```ignore
//! use hopchain::hop::{ChainOptions, CommandRunner, HopChain, HopSpec, SshConnector};
//!
//! let mut chain = HopChain::new(SshConnector::new(true), ChainOptions::from_env());
//! chain.connect(vec![
//!     HopSpec::new("bastion.example.com", 22, "ops", "secret"),
//!     HopSpec::new("10.0.0.7", 22, "deploy", "secret"),
//! ]).await?;
//! let results = CommandRunner::new(&chain, Duration::from_secs(60)).run(["uname -a"]).await?;
//! chain.close().await;
//! ```

pub mod hop;
