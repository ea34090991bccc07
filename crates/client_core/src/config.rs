use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    /// Overrides the identity the node reports about itself.
    pub node: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            node: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    node: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then the TOML file at `path` if it exists, then `APP__*`
/// environment variables.
pub fn load_settings(path: impl AsRef<Path>) -> Result<ClientSettings, SettingsError> {
    let mut settings = ClientSettings::default();
    let path = path.as_ref();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw, path)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, raw: &str, path: &Path) -> Result<(), SettingsError> {
    let file: FileSettings = toml::from_str(raw).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    if let Some(v) = file.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file.node {
        settings.node = Some(v);
    }
    if let Some(v) = file.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut ClientSettings,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__NODE") {
        settings.node = Some(v);
    }
    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs =
            v.trim().parse().map_err(|_| SettingsError::InvalidValue {
                key: "APP__REQUEST_TIMEOUT_SECS",
                value: v.clone(),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = ClientSettings::default();
        apply_file(
            &mut settings,
            "server_url = \"http://node.local:9000\"\nnode = \"alice.os\"\n",
            Path::new("client.toml"),
        )
        .expect("parse");
        assert_eq!(settings.server_url, "http://node.local:9000");
        assert_eq!(settings.node.as_deref(), Some("alice.os"));
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn env_overrides_file() {
        let mut settings = ClientSettings::default();
        apply_file(&mut settings, "request_timeout_secs = 5", Path::new("client.toml"))
            .expect("parse");
        apply_env(
            &mut settings,
            env_of(&[("APP__REQUEST_TIMEOUT_SECS", "12"), ("APP__NODE", "bob.os")]),
        )
        .expect("env");
        assert_eq!(settings.request_timeout_secs, 12);
        assert_eq!(settings.node.as_deref(), Some("bob.os"));
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let mut settings = ClientSettings::default();
        let err = apply_env(&mut settings, env_of(&[("APP__REQUEST_TIMEOUT_SECS", "soon")]))
            .expect_err("must fail");
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
    }

    #[test]
    fn missing_file_keeps_defaults() {
        load_settings("/nonexistent/counter-client.toml").expect("defaults");
    }
}
