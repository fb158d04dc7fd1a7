//! Command-line interface for wxbroker.
//!
//! This crate provides the `wxbroker` binary for working with WeChat open
//! platform accounts. It includes commands for:
//!
//! - **Merchant messages**: sign and verify records, check payment notifications
//! - **Encrypted messages**: decrypt callbacks and mini program user data
//! - **Component callbacks**: accept pushes and store verify tickets
//! - **Credentials**: print access tokens, build authorization URLs
//!
//! # Quick Start
//!
//! ```bash
//! # Sign merchant fields with the configured key
//! wxbroker sign appid=wxd930ea5d5a258f4f mch_id=10000100 nonce_str=ibuaiVcKdpRxkhJA
//!
//! # Check a payment notification read from stdin
//! wxbroker notify - < notify.xml
//!
//! # Store a pushed verify ticket, then fetch the component token
//! wxbroker callback body.xml --timestamp 1413192605 --nonce n1 --msg-signature 3d43...
//! wxbroker token component
//! ```
//!
//! # Output Formats
//!
//! All commands support `--format` for output control:
//!
//! - `human` (default): Human-readable with colors
//! - `json`: Machine-readable JSON
//!
//! # Configuration
//!
//! Configuration is loaded from the platform config directory
//! (`~/.config/wxbroker/config.toml` on Linux). Override with `--config` or
//! `WXBROKER_CONFIG`. Tokens and tickets are cached in `credentials.json`
//! under the data directory so separate runs share them.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;

// Re-export main types
pub use cli::{Cli, Commands, OutputFormatArg};
pub use config::CliConfig;
pub use context::BrokerContext;
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, Render};
