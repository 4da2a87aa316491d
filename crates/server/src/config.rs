use std::{fs, io::ErrorKind};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            database_url: "sqlite://./data/todos.db".into(),
        }
    }
}

/// Keys accepted in `server.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub bind_addr: Option<String>,
    pub database_url: Option<String>,
}

/// Defaults, then `server.toml` when present, then the environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    let file_cfg = match fs::read_to_string(DEFAULT_CONFIG_FILE) {
        Ok(raw) => toml::from_str::<FileSettings>(&raw)
            .with_context(|| format!("invalid config '{DEFAULT_CONFIG_FILE}'"))?,
        Err(err) if err.kind() == ErrorKind::NotFound => FileSettings::default(),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{DEFAULT_CONFIG_FILE}'"))
        }
    };
    Ok(resolve_settings(file_cfg, |key| std::env::var(key).ok()))
}

fn resolve_settings(file_cfg: FileSettings, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    let bind = ["SERVER_BIND", "APP__BIND_ADDR"]
        .into_iter()
        .filter_map(&env)
        .last()
        .or(file_cfg.bind_addr);
    if let Some(v) = bind {
        settings.server_bind = v;
    }

    let database_url = ["DATABASE_URL", "APP__DATABASE_URL"]
        .into_iter()
        .filter_map(&env)
        .last()
        .or(file_cfg.database_url);
    if let Some(v) = database_url {
        settings.database_url = normalize_database_url(&v);
    }

    settings
}

/// Accepts full `sqlite:` urls as-is and turns bare file paths into urls.
fn normalize_database_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return Settings::default().database_url;
    }
    if raw.starts_with("sqlite:") || raw.contains("://") {
        return raw.to_string();
    }
    format!("sqlite://{}", raw.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
