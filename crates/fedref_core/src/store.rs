/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Emoji, MediaAttachment, Mention, RemoteActor, RemoteObject};

/// Returned (inside `anyhow::Error`) by the `put_*` methods when the URI is already taken.
#[derive(Debug, thiserror::Error)]
#[error("{kind} already exists: {uri}")]
pub struct AlreadyExists {
    pub kind: &'static str,
    pub uri: String,
}

pub fn is_already_exists(e: &anyhow::Error) -> bool {
    e.downcast_ref::<AlreadyExists>().is_some()
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_actor_by_id(&self, id: &str) -> Result<Option<RemoteActor>>;
    async fn get_actor_by_uri(&self, uri: &str) -> Result<Option<RemoteActor>>;
    async fn get_actor_by_url(&self, url: &str) -> Result<Option<RemoteActor>>;
    /// Case-insensitive on both parts; local accounts have an empty domain.
    async fn get_actor_by_username_domain(&self, username: &str, domain: &str) -> Result<Option<RemoteActor>>;
    async fn put_actor(&self, actor: &RemoteActor) -> Result<()>;
    async fn update_actor(&self, actor: &RemoteActor) -> Result<()>;

    async fn get_object_by_id(&self, id: &str) -> Result<Option<RemoteObject>>;
    async fn get_object_by_uri(&self, uri: &str) -> Result<Option<RemoteObject>>;
    async fn get_object_by_url(&self, url: &str) -> Result<Option<RemoteObject>>;
    /// Stores the object together with every entry of `object.mentions` that has an id.
    async fn put_object(&self, object: &RemoteObject) -> Result<()>;
    async fn update_object(&self, object: &RemoteObject) -> Result<()>;
    async fn set_object_pinned_at(&self, object_id: &str, pinned_at_ms: i64) -> Result<()>;
    async fn pinned_objects(&self, account_id: &str) -> Result<Vec<RemoteObject>>;

    async fn get_emoji_by_id(&self, id: &str) -> Result<Option<Emoji>>;
    async fn get_emoji_by_uri(&self, uri: &str) -> Result<Option<Emoji>>;
    async fn put_emoji(&self, emoji: &Emoji) -> Result<()>;

    async fn put_mention(&self, mention: &Mention) -> Result<()>;
    async fn get_mention(&self, id: &str) -> Result<Option<Mention>>;

    async fn put_media(&self, media: &MediaAttachment) -> Result<()>;
    async fn get_media(&self, id: &str) -> Result<Option<MediaAttachment>>;

    /// True when `host` or any of its parent domains is on the persisted block list.
    async fn is_domain_blocked(&self, host: &str) -> Result<bool>;
    async fn put_domain_block(&self, domain: &str) -> Result<()>;
}
