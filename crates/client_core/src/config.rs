use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_CONFIG_FILE: &str = "desk.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub load_history_on_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000/api".into(),
            request_timeout_secs: 120,
            health_timeout_secs: 5,
            load_history_on_start: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base: Option<String>,
    request_timeout_secs: Option<u64>,
    health_timeout_secs: Option<u64>,
    load_history_on_start: Option<bool>,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs.max(1))
    }

    pub fn validate(&self) -> Result<Url, ClientError> {
        parse_api_base(&self.api_base)
    }
}

pub fn parse_api_base(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ClientError::Config(format!("api_base '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::Config(format!(
            "api_base '{raw}' must use http or https"
        )));
    }
    Ok(url)
}

/// Defaults, then `desk.toml` (or `path`), then environment variables.
pub fn load_settings(path: Option<&Path>) -> Settings {
    load_settings_from(path, |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), %err, "ignoring malformed config file"),
        }
    }

    if let Some(v) = env("DESK_API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = env("APP__API_BASE") {
        settings.api_base = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = env("APP__HEALTH_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.health_timeout_secs = parsed;
        }
    }
    if let Some(v) = env("APP__LOAD_HISTORY_ON_START") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.load_history_on_start = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base {
        settings.api_base = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.health_timeout_secs {
        settings.health_timeout_secs = v;
    }
    if let Some(v) = file_cfg.load_history_on_start {
        settings.load_history_on_start = v;
    }
}
