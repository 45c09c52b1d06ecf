//! Thin command-line front end over the routing pipeline in
//! `fluent-core`/`fluent-engines`/`fluent-agent`: loads a model registry,
//! wires up credentials and the cost ledger, and exposes `route`,
//! `consensus`, `providers`, and `cost` as subcommands.
//!
//! # Examples
//!
//! ```rust,no_run
//! use fluent_cli::cli::run;
//!
//! # async fn example() -> anyhow::Result<()> {
//! run().await?;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod cli;
pub mod error;
