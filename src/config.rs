//! Deploy-time configuration, resolved once before the stack is built

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// Artifact path used when `--asset` is not given
pub const DEFAULT_ASSET: &str = "../function.zip";

/// Variables handed to the function's environment
pub const ENV_KEYS: [&str; 5] = [
    "NOTION_API_KEY",
    "NOTION_DATABASE_ID",
    "DISCORD_WEBHOOK_ID",
    "DISCORD_WEBHOOK_TOKEN",
    "STEAM_USER_ID",
];

/// Resolved inputs for stack construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    /// Function environment; every key in [`ENV_KEYS`] is present
    pub env: BTreeMap<String, String>,
    /// Packaged function artifact
    pub asset: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None, DEFAULT_ASSET)
    }
}

impl StackConfig {
    /// Read the process environment, overlaid on an optional `.env` file
    ///
    /// An explicit `env_file` must exist. Without one, `./.env` is used if
    /// present. Variables already set in the process win over the file, and
    /// unset variables become empty strings.
    pub fn resolve(env_file: Option<&Path>, asset: impl Into<String>) -> Result<Self> {
        let from_file = match env_file {
            Some(path) => read_env_file(path)?,
            None => {
                let default = Path::new(".env");
                if default.is_file() {
                    read_env_file(default)?
                } else {
                    debug!("No .env file in working directory");
                    BTreeMap::new()
                }
            }
        };

        Ok(Self::from_lookup(
            |key| std::env::var(key).ok().or_else(|| from_file.get(key).cloned()),
            asset,
        ))
    }

    /// Build from an arbitrary lookup; used by `resolve` and by tests
    pub fn from_lookup<F>(lookup: F, asset: impl Into<String>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = ENV_KEYS
            .iter()
            .map(|&key| {
                let value = lookup(key).unwrap_or_else(|| {
                    debug!("{key} is not set, using empty value");
                    String::new()
                });
                (key.to_string(), value)
            })
            .collect();
        Self {
            env,
            asset: asset.into(),
        }
    }

    /// Keys that resolved to an empty value
    pub fn missing(&self) -> Vec<&str> {
        self.env
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Parse a dotenv file without touching the process environment
fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Could not read {}", path.display()))?;

    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, value) = item.with_context(|| format!("Invalid entry in {}", path.display()))?;
        if !ENV_KEYS.contains(&key.as_str()) {
            warn!("Ignoring unknown variable {key} in {}", path.display());
            continue;
        }
        vars.insert(key, value);
    }
    debug!("Loaded {} variable(s) from {}", vars.len(), path.display());
    Ok(vars)
}

// ============================================================================
// Tests
// ============================================================================
