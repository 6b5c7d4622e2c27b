/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RequesterKey {
    pub key_id: String,
    pub private_key_pem: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DerefConfig {
    #[serde(default)]
    pub host: String,
    /// Domain used in `user@domain` handles when it differs from `host`.
    #[serde(default)]
    pub account_domain: Option<String>,
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub http_retry_attempts: Option<u32>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Static patterns: `example.com`, `*.example.com`, `.example.com`.
    #[serde(default)]
    pub blocked_domains: Option<Vec<String>>,
    #[serde(default)]
    pub requesters: HashMap<String, RequesterKey>,
}

impl Default for DerefConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            account_domain: None,
            stale_after_secs: Some(48 * 3600),
            http_timeout_secs: Some(30),
            http_retry_attempts: Some(3),
            user_agent: Some(format!("fedref/{}", env!("CARGO_PKG_VERSION"))),
            data_dir: None,
            blocked_domains: None,
            requesters: HashMap::new(),
        }
    }
}

impl DerefConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let cfg: DerefConfig = serde_json::from_str(&text)
            .with_context(|| format!("parse config: {}", path.display()))?;
        if cfg.host.trim().is_empty() {
            anyhow::bail!("config {}: host is required", path.display());
        }
        Ok(cfg)
    }

    pub fn for_host(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Default::default()
        }
    }

    pub fn account_domain(&self) -> &str {
        self.account_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(self.host.as_str())
    }

    pub fn is_local_host(&self, host: &str) -> bool {
        let host = host.trim();
        !host.is_empty()
            && (host.eq_ignore_ascii_case(self.host.trim())
                || host.eq_ignore_ascii_case(self.account_domain()))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs.unwrap_or(48 * 3600))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(30).max(1))
    }

    pub fn retry_attempts(&self) -> u32 {
        self.http_retry_attempts.unwrap_or(3).clamp(1, 5)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("fedref/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("fedref-data"))
    }

    pub fn blocked_patterns(&self) -> &[String] {
        self.blocked_domains.as_deref().unwrap_or(&[])
    }
}
