// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ratelane configuration.
//!
//! Unknown keys are rejected, files are looked up in the XDG locations and
//! overridden by `RATELANE_*` variables. Failures come back as miette
//! diagnostics.
//!
//! # Usage
//!
//! ```no_run
//! use ratelane_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RatelaneConfig;

/// Loads `ratelane.toml` from the usual locations, applies `RATELANE_*`
/// overrides, then validates.
pub fn load_and_validate() -> Result<RatelaneConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Like [`load_and_validate`] but reads a single explicit file.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<RatelaneConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Parses and validates an inline TOML document. Mostly used by tests.
pub fn load_and_validate_str(toml_content: &str) -> Result<RatelaneConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Validates a parsed config, or turns the parse failure into diagnostics.
/// `sources` is only read on failure.
fn finish(
    loaded: Result<RatelaneConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<RatelaneConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => validation::validate_config(&config).map(|()| config),
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads every config file that exists so error spans can point into it.
fn collect_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|dir| dir.join(loader::LOCAL_CONFIG_FILE))
        .unwrap_or_else(|_| loader::LOCAL_CONFIG_FILE.into());

    [
        Some(local),
        loader::user_config_path(),
        Some(loader::SYSTEM_CONFIG_FILE.into()),
    ]
    .into_iter()
    .flatten()
    .filter_map(|path| {
        std::fs::read_to_string(&path)
            .ok()
            .map(|content| (path.display().to_string(), content))
    })
    .collect()
}
