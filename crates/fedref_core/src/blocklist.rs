/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::Arc;

use crate::error::{DerefError, DerefResult};
use crate::ids::host_from_url;
use crate::store::Store;

pub fn domain_matches(host: &str, pattern: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    let p = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
    if p.is_empty() {
        return false;
    }
    if let Some(suffix) = p.strip_prefix("*.") {
        return host == suffix || host.ends_with(&format!(".{suffix}"));
    }
    if let Some(suffix) = p.strip_prefix('.') {
        return host == suffix || host.ends_with(&format!(".{suffix}"));
    }
    host == p
}

/// Static config patterns plus the persisted block list.
#[derive(Clone)]
pub struct Blocklist {
    patterns: Arc<Vec<String>>,
    store: Arc<dyn Store>,
}

impl Blocklist {
    pub fn new(patterns: &[String], store: Arc<dyn Store>) -> Self {
        Self {
            patterns: Arc::new(patterns.to_vec()),
            store,
        }
    }

    pub async fn is_blocked(&self, host: &str) -> anyhow::Result<bool> {
        if self.patterns.iter().any(|p| domain_matches(host, p)) {
            return Ok(true);
        }
        self.store.is_domain_blocked(host).await
    }

    /// Fails with `Blocked` when the host of `uri` is blocked.
    pub async fn check_uri(&self, uri: &str) -> DerefResult<String> {
        let host = host_from_url(uri)
            .ok_or_else(|| DerefError::NotRetrievable(format!("no host in {uri}")))?;
        self.check_host(&host).await?;
        Ok(host)
    }

    pub async fn check_host(&self, host: &str) -> DerefResult<()> {
        if self.is_blocked(host).await.map_err(DerefError::internal)? {
            return Err(DerefError::Blocked(host.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::temp_db;

    #[test]
    fn pattern_forms() {
        assert!(domain_matches("bad.example", "bad.example"));
        assert!(!domain_matches("sub.bad.example", "bad.example"));
        assert!(domain_matches("sub.bad.example", "*.bad.example"));
        assert!(domain_matches("bad.example", ".bad.example"));
        assert!(!domain_matches("notbad.example", ".bad.example"));
        assert!(!domain_matches("anything", ""));
    }

    #[tokio::test]
    async fn config_and_store_entries_both_block() {
        let (_dir, db) = temp_db();
        db.put_domain_block("stored.example").await.unwrap();
        let list = Blocklist::new(&["*.static.example".to_string()], db);

        assert!(matches!(
            list.check_uri("https://a.static.example/users/x").await,
            Err(DerefError::Blocked(h)) if h == "a.static.example"
        ));
        assert!(matches!(
            list.check_uri("https://stored.example/notes/1").await,
            Err(DerefError::Blocked(_))
        ));
        assert_eq!(
            list.check_uri("https://fine.example/notes/1").await.unwrap(),
            "fine.example"
        );
    }
}
