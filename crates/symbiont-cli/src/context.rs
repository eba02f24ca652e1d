//! Builds a marketplace over the local data directory.
//!
//! The CLI runs the market in-process: records live in a [`JsonFileStore`]
//! under `--data-dir`, payments go through an unmetered [`SimulatedRail`],
//! and identity stats come from `identities.json` in the data directory
//! when present.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use symbiont_market::{
    IdentityStats, JsonFileStore, MarketConfig, SimulatedRail, StaticIdentityStats, SymbiontMarket,
};
use tracing::debug;

use crate::cli::Cli;
use crate::error::CliError;

/// File in the data directory mapping usernames to identity stats.
pub const IDENTITIES_FILE: &str = "identities.json";

/// Opens the market described by the global flags.
///
/// # Errors
///
/// Returns an error if the config is invalid or the data directory cannot
/// be opened.
pub fn open_market(cli: &Cli) -> Result<SymbiontMarket, CliError> {
    let config = match &cli.config {
        Some(path) => MarketConfig::from_file(path)?,
        None => MarketConfig::default(),
    };

    let store = JsonFileStore::open(&cli.data_dir)?;
    let identity = load_identities(&cli.data_dir.join(IDENTITIES_FILE))?;
    debug!(data_dir = %cli.data_dir.display(), treasury = %config.treasury_wallet, "market opened");

    Ok(SymbiontMarket::new(
        config,
        Arc::new(store),
        Arc::new(SimulatedRail::new()),
        Arc::new(identity),
    )?)
}

fn load_identities(path: &Path) -> Result<StaticIdentityStats, CliError> {
    let provider = StaticIdentityStats::new();
    if !path.exists() {
        return Ok(provider);
    }

    let users: HashMap<String, IdentityStats> = read_json(path)?;
    for (username, stats) in users {
        provider.insert(&username, stats);
    }
    Ok(provider)
}

/// Reads and parses a JSON file.
///
/// # Errors
///
/// Returns [`CliError::InputFile`] naming the path on any failure.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = fs::read_to_string(path).map_err(|e| CliError::InputFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| CliError::InputFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Reads an optional JSON file.
pub fn read_optional_json<T: DeserializeOwned>(path: Option<&Path>) -> Result<Option<T>, CliError> {
    path.map(read_json::<T>).transpose()
}
