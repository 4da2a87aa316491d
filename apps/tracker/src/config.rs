use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::Context;
use client_core::{SyncMode, SyncOptions, PUBLIC_MOCK_API};
use serde::Deserialize;
use shared::domain::UserId;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "tracker.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub mode: SyncMode,
    pub limit: Option<u32>,
    pub user_id: Option<i64>,
    pub timeout_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: PUBLIC_MOCK_API.into(),
            mode: SyncMode::Synchronized,
            limit: Some(10),
            user_id: Some(1),
            timeout_seconds: None,
        }
    }
}

/// Keys accepted in `tracker.toml`; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub base_url: Option<String>,
    pub mode: Option<SyncMode>,
    pub limit: Option<u32>,
    pub user_id: Option<i64>,
    pub timeout_seconds: Option<u64>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub mode: Option<SyncMode>,
    pub limit: Option<u32>,
    pub user_id: Option<i64>,
}

impl Settings {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            mode: self.mode,
            limit: self.limit,
            user_id: self.user_id.map(UserId),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(v) = overrides.base_url {
            self.base_url = v;
        }
        if let Some(v) = overrides.mode {
            self.mode = v;
        }
        if let Some(v) = overrides.limit {
            self.limit = limit_from(v);
        }
        if let Some(v) = overrides.user_id {
            self.user_id = Some(v);
        }
        self
    }
}

/// Reads `path` (or `tracker.toml` in the working directory when no path was
/// given) and layers the environment over it. A missing default file is fine;
/// a missing explicit file is an error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let file_cfg = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config '{}'", path.display()))?;
            parse_file_settings(&raw)
                .with_context(|| format!("invalid config '{}'", path.display()))?
        }
        None => read_default_file(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    Ok(resolve_settings(file_cfg, |key| std::env::var(key).ok()))
}

/// A missing default file means "no overrides"; any other read failure is an
/// error.
fn read_default_file(path: &Path) -> anyhow::Result<FileSettings> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_file_settings(&raw)
            .with_context(|| format!("invalid config '{}'", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(FileSettings::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read config '{}'", path.display())),
    }
}

pub fn parse_file_settings(raw: &str) -> anyhow::Result<FileSettings> {
    Ok(toml::from_str(raw)?)
}

pub fn resolve_settings(file_cfg: FileSettings, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.mode {
        settings.mode = v;
    }
    if let Some(v) = file_cfg.limit {
        settings.limit = limit_from(v);
    }
    if let Some(v) = file_cfg.user_id {
        settings.user_id = Some(v);
    }
    if let Some(v) = file_cfg.timeout_seconds {
        settings.timeout_seconds = Some(v);
    }

    if let Some(v) = env("TRACKER_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = parsed_env(&env, "APP__MODE") {
        settings.mode = v;
    }
    if let Some(v) = parsed_env::<u32>(&env, "APP__LIMIT") {
        settings.limit = limit_from(v);
    }
    if let Some(v) = parsed_env(&env, "APP__USER_ID") {
        settings.user_id = Some(v);
    }
    if let Some(v) = parsed_env(&env, "APP__TIMEOUT_SECONDS") {
        settings.timeout_seconds = Some(v);
    }

    settings
}

fn parsed_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// A limit of zero means "no limit".
fn limit_from(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
