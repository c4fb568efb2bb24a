use std::path::Path;

use serde::{Deserialize, Serialize};

/// Channel name joined when the host supplies no configuration.
pub const DEFAULT_CHANNEL_NAME: &str = "prism.main";

/// Per-direction queue capacity in bytes when none is configured.
pub const DEFAULT_CAPACITY: u64 = 1 << 20;

/// Environment variable holding the path of a JSON channel-parameter file.
pub const CHANNEL_CONFIG_ENV: &str = "PRISM_CHANNEL_CONFIG";

/// Connection parameters for one named channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u64,
}

fn default_capacity() -> u64 {
    DEFAULT_CAPACITY
}

impl ChannelParams {
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_NAME, DEFAULT_CAPACITY)
    }
}

/// Reads channel parameters from a JSON document.
pub fn load_params(path: &Path) -> std::io::Result<ChannelParams> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(std::io::Error::other)
}

/// Resolves the parameters of the default shared channel.
///
/// Honors `PRISM_CHANNEL_CONFIG` when set; an unreadable document falls back
/// to the built-in defaults with a warning rather than failing startup.
pub fn discover_default_channel() -> ChannelParams {
    let Ok(path) = std::env::var(CHANNEL_CONFIG_ENV) else {
        return ChannelParams::default();
    };
    match load_params(Path::new(&path)) {
        Ok(params) => params,
        Err(err) => {
            log::warn!("channel config '{path}' unreadable ({err}), using defaults");
            ChannelParams::default()
        }
    }
}
