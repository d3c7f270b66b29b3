//! A Rust client for the V7 Darwin dataset-management API.
//!
//! The client authenticates per team with an API key, lists and creates
//! datasets, and fetches releases (exported, versioned snapshots of a
//! dataset) as zip archives.
//!
//! ## Quick start
//! - Bootstrap from an API key ([`Client::from_api_key`]) or from a config
//!   file ([`Client::from_config`], [`Client::local`] for
//!   `~/.darwin/config.toml`).
//! - Set `DARWIN_BASE_URL` to talk to a server other than
//!   [`DEFAULT_BASE_URL`].
//!
//! ```no_run
//! use darwin::Client;
//! use std::path::Path;
//!
//! fn main() -> darwin::Result<()> {
//!     let client = Client::from_api_key("my-api-key", None)?;
//!     let dataset = client.get_remote_dataset("cats")?;
//!     let release = dataset.get_release("latest")?;
//!     release.download_zip(Path::new("cats.zip"))?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod dataset;
mod error;
mod identifier;
mod release;
mod util;
mod validators;

pub use client::Client;
pub use config::{Config, TeamConfig, default_config_path, default_datasets_dir};
pub use dataset::RemoteDataset;
pub use error::{Error, Result};
pub use identifier::{DatasetIdentifier, IntoDatasetIdentifier};
pub use release::Release;
pub use validators::{ErrorHandler, name_taken, validation_error};

pub const DEFAULT_BASE_URL: &str = "https://darwin.v7labs.com";
