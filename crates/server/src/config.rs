use std::{collections::BTreeMap, fs};

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub node: String,
    /// Peer node name to base url.
    pub peers: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            node: "local.os".into(),
            peers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    node: Option<String>,
    #[serde(default)]
    peers: BTreeMap<String, String>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(%error, "ignoring unreadable server.toml");
            return;
        }
    };
    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.node {
        settings.node = v;
    }
    settings.peers.extend(file_cfg.peers);
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("APP__NODE") {
        settings.node = v;
    }
    if let Some(v) = var("APP__PEERS") {
        settings.peers.extend(parse_peer_list(&v));
    }
}

/// Parses `name=url` pairs separated by commas. Malformed entries are skipped.
pub fn parse_peer_list(raw: &str) -> BTreeMap<String, String> {
    let mut peers = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        match entry.split_once('=') {
            Some((node, url)) if !node.trim().is_empty() && !url.trim().is_empty() => {
                peers.insert(node.trim().to_string(), url.trim().to_string());
            }
            _ => warn!(entry, "skipping malformed peer entry"),
        }
    }
    peers
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
