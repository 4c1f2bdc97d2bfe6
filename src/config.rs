//! TOML configuration: server selection, API credentials, and the
//! user-curated item policy lists

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::ItemId;

pub const DEFAULT_CONFIG_PATH: &str = "tradecraft.toml";

const REGIONS: [&str; 5] = ["us", "eu", "kr", "tw", "cn"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub region: String,
    pub realm: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub language: String,
    /// Profession tier labels recipes are selected from by default.
    pub professions: Vec<String>,
    /// Items purchasable from a vendor at their vendor price.
    pub vendor_items: Vec<ItemId>,
    /// Always-buy override set: never crafted, even when cheaper.
    pub buy_items: Vec<ItemId>,
}

impl Default for DataConfig {
    fn default() -> DataConfig {
        DataConfig {
            language: "en_US".to_string(),
            professions: Vec::new(),
            vendor_items: Vec::new(),
            buy_items: Vec::new(),
        }
    }
}

pub fn valid_region(region: &str) -> bool {
    REGIONS.contains(&region)
}

pub fn valid_language(language: &str) -> bool {
    Regex::new("^[a-z][a-z]_[A-Z][A-Z]$")
        .expect("static locale pattern")
        .is_match(language)
}

impl Config {
    /// Load the configuration; a missing file yields the defaults so
    /// `config init` can run before anything exists.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Everything the API client and realm selection need must be present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.server.region.is_empty() {
            missing.push("server.region");
        }
        if self.server.realm.is_empty() {
            missing.push("server.realm");
        }
        if self.client.id.is_empty() {
            missing.push("client.id");
        }
        if self.client.secret.is_empty() {
            missing.push("client.secret");
        }
        if self.data.language.is_empty() {
            missing.push("data.language");
        }
        if !missing.is_empty() {
            bail!(
                "configuration incomplete, missing: {} (run `tradecraft config init`)",
                missing.join(", ")
            );
        }
        if !valid_region(&self.server.region) {
            bail!("invalid region {:?}", self.server.region);
        }
        if !valid_language(&self.data.language) {
            bail!("invalid language locale {:?}", self.data.language);
        }
        Ok(())
    }

    /// Default database location, one file per (region, language) data
    /// set. "local" stands in for the region until one is configured, so
    /// the sample data set works offline.
    pub fn database_path(&self) -> PathBuf {
        let region: &str = if self.server.region.is_empty() {
            "local"
        } else {
            &self.server.region
        };
        PathBuf::from("data").join(format!("{}.{}.db", region, self.data.language))
    }

    pub fn vendor_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.data.vendor_items.iter().copied()
    }

    pub fn buy_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.data.buy_items.iter().copied()
    }

    /// Read a property by dotted path.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "server.region" => Some(self.server.region.clone()),
            "server.realm" => Some(self.server.realm.clone()),
            "client.id" => Some(self.client.id.clone()),
            "client.secret" => Some(self.client.secret.clone()),
            "data.language" => Some(self.data.language.clone()),
            "data.professions" => Some(self.data.professions.join(", ")),
            "data.vendor_items" => Some(join_ids(&self.data.vendor_items)),
            "data.buy_items" => Some(join_ids(&self.data.buy_items)),
            _ => None,
        }
    }

    /// Write a scalar property by dotted path, validating where the value
    /// is constrained. List properties have dedicated subcommands.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "server.region" => {
                if !valid_region(value) {
                    bail!("invalid region {:?}, expected one of {}", value, REGIONS.join(", "));
                }
                self.server.region = value.to_string();
            }
            "server.realm" => self.server.realm = value.to_string(),
            "client.id" => self.client.id = value.to_string(),
            "client.secret" => self.client.secret = value.to_string(),
            "data.language" => {
                if !valid_language(value) {
                    bail!("invalid language locale {:?}, expected e.g. en_US", value);
                }
                self.data.language = value.to_string();
            }
            _ => bail!("unknown configuration property {:?}", key),
        }
        Ok(())
    }
}

fn join_ids(ids: &[ItemId]) -> String {
    ids.iter()
        .map(ItemId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
