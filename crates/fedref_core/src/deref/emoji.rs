/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use futures_util::future::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{db, Dereferencer};
use crate::error::{DerefError, DerefResult};
use crate::ids::{new_id, now_ms};
use crate::media::{MediaInfo, MediaSource};
use crate::model::Emoji;
use crate::store::is_already_exists;
use crate::transport::Transport;

/// Whether `latest` replaces `previous`: unchanged only when both are empty, or when they
/// have the same size, every previous URI is in `latest`, and every (URI, id) of `latest`
/// is in `previous`.
pub fn emojis_changed(previous: &[Emoji], latest: &[Emoji]) -> bool {
    if previous.is_empty() && latest.is_empty() {
        return false;
    }
    if previous.len() != latest.len() {
        return true;
    }
    let latest_uris: HashSet<&str> = latest.iter().map(|e| e.uri.as_str()).collect();
    if previous.iter().any(|e| !latest_uris.contains(e.uri.as_str())) {
        return true;
    }
    let previous_keys: HashSet<(&str, &str)> = previous
        .iter()
        .map(|e| (e.uri.as_str(), e.id.as_str()))
        .collect();
    latest
        .iter()
        .any(|e| !previous_keys.contains(&(e.uri.as_str(), e.id.as_str())))
}

impl Dereferencer {
    /// Loads stored emojis by id; ids that no longer resolve are dropped.
    pub(super) async fn load_emojis(&self, ids: &[String], cancel: &CancellationToken) -> DerefResult<Vec<Emoji>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(e) = db(cancel, self.store.get_emoji_by_id(id)).await? {
                out.push(e);
            }
        }
        Ok(out)
    }

    /// Resolves placeholders one by one, skipping the ones that fail.
    pub(super) async fn resolve_emojis(
        &self,
        transport: &Arc<dyn Transport>,
        placeholders: Vec<Emoji>,
        cancel: &CancellationToken,
    ) -> DerefResult<Vec<Emoji>> {
        let mut out = Vec::with_capacity(placeholders.len());
        for placeholder in placeholders {
            let uri = placeholder.uri.clone();
            match self.resolve_emoji(transport, placeholder, cancel).await {
                Ok(e) => out.push(e),
                Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                Err(e) => warn!(%uri, "skipping emoji: {e:#}"),
            }
        }
        Ok(out)
    }

    async fn resolve_emoji(
        &self,
        transport: &Arc<dyn Transport>,
        placeholder: Emoji,
        cancel: &CancellationToken,
    ) -> DerefResult<Emoji> {
        if !placeholder.id.is_empty() {
            return Ok(placeholder);
        }
        if let Some(known) = db(cancel, self.store.get_emoji_by_uri(&placeholder.uri)).await? {
            return Ok(known);
        }
        if self.cfg.is_local_host(&placeholder.domain) {
            return Err(DerefError::NotRetrievable(format!(
                "local emoji {} not found",
                placeholder.uri
            )));
        }

        let key = placeholder.uri.clone();
        let store = self.store.clone();
        let media = self.media.clone();
        let transport = transport.clone();
        self.emojis
            .run(&key, cancel, move || {
                async move {
                    let url = placeholder.image_remote_url.clone();
                    let source: MediaSource = {
                        let url = url.clone();
                        Box::new(move || async move { transport.dereference_media(&url).await }.boxed())
                    };
                    let info = MediaInfo {
                        remote_url: url,
                        ..Default::default()
                    };
                    let processing = media
                        .preprocess(source, info)
                        .await
                        .map_err(DerefError::internal)?;
                    let image = processing
                        .load_attachment()
                        .await
                        .map_err(DerefError::transport)?;

                    let now = now_ms();
                    let emoji = Emoji {
                        id: new_id(),
                        image_attachment_id: Some(image.id),
                        created_at_ms: now,
                        updated_at_ms: now,
                        ..placeholder
                    };
                    match store.put_emoji(&emoji).await {
                        Ok(()) => Ok(emoji),
                        Err(e) if is_already_exists(&e) => store
                            .get_emoji_by_uri(&emoji.uri)
                            .await
                            .map_err(DerefError::internal)?
                            .ok_or_else(|| DerefError::internal(e)),
                        Err(e) => Err(DerefError::internal(e)),
                    }
                }
                .boxed()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emoji(uri: &str, id: &str) -> Emoji {
        Emoji {
            id: id.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    #[test]
    fn same_set_is_unchanged() {
        let prev = vec![emoji("https://r.example/e/a", "1"), emoji("https://r.example/e/b", "2")];
        let next = vec![emoji("https://r.example/e/b", "2"), emoji("https://r.example/e/a", "1")];
        assert!(!emojis_changed(&prev, &next));
        assert!(!emojis_changed(&[], &[]));
    }

    #[test]
    fn any_difference_is_a_change() {
        let prev = vec![emoji("https://r.example/e/a", "1"), emoji("https://r.example/e/b", "2")];
        let swapped = vec![emoji("https://r.example/e/a", "1"), emoji("https://r.example/e/c", "3")];
        assert!(emojis_changed(&prev, &swapped));

        let reissued = vec![emoji("https://r.example/e/a", "1"), emoji("https://r.example/e/b", "9")];
        assert!(emojis_changed(&prev, &reissued));

        assert!(emojis_changed(&prev, &prev[..1]));
        assert!(emojis_changed(&[], &prev));
    }
}
