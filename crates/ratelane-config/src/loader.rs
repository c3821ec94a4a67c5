// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ratelane.toml` > `~/.config/ratelane/ratelane.toml` >
//! `/etc/ratelane/ratelane.toml` with environment variable overrides via `RATELANE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RatelaneConfig;

pub(crate) const SYSTEM_CONFIG_FILE: &str = "/etc/ratelane/ratelane.toml";
pub(crate) const LOCAL_CONFIG_FILE: &str = "ratelane.toml";

/// Config sections recognised by the env mapping, in match order.
const SECTIONS: &[&str] = &[
    "server",
    "storage",
    "gateway",
    "worker",
    "aggregator",
    "webhook",
    "cache",
    "dispatch",
    "logging",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ratelane/ratelane.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ratelane/ratelane.toml` (system-wide)
/// 3. `~/.config/ratelane/ratelane.toml` (user XDG config)
/// 4. `./ratelane.toml` (local directory)
/// 5. `RATELANE_*` environment variables
pub fn load_config() -> Result<RatelaneConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RatelaneConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RatelaneConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RatelaneConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RatelaneConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RatelaneConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_FILE))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `RATELANE_GATEWAY_BASE_URL` must map to `gateway.base_url`,
/// not `gateway.base.url`.
fn env_provider() -> Env {
    Env::prefixed("RATELANE_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("gateway_base_url"), "gateway.base_url");
        assert_eq!(
            map_env_key("worker_visibility_timeout_secs"),
            "worker.visibility_timeout_secs"
        );
        assert_eq!(map_env_key("server_bearer_token"), "server.bearer_token");
        assert_eq!(map_env_key("unknown_thing"), "unknown_thing");
    }

    #[test]
    fn section_name_alone_is_not_split() {
        assert_eq!(map_env_key("server"), "server");
    }
}
