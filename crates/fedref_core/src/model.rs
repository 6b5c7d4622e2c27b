/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Local projections of remote entities.
//!
//! `*_ids` vectors are what gets persisted; the sibling vectors marked `#[serde(skip)]` hold
//! the loaded (or placeholder) values while a record moves through enrichment.

use fedref_protocol::{ActorKind, ObjectKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteActor {
    pub id: String,
    pub uri: String,
    pub url: Option<String>,
    pub username: String,
    /// Empty for local accounts.
    pub domain: String,
    pub display_name: Option<String>,
    pub note: Option<String>,
    pub actor_type: Option<ActorKind>,
    pub inbox_uri: Option<String>,
    pub outbox_uri: Option<String>,
    pub shared_inbox_uri: Option<String>,
    pub followers_uri: Option<String>,
    pub following_uri: Option<String>,
    pub featured_collection_uri: Option<String>,
    pub public_key_uri: Option<String>,
    pub public_key_pem: Option<String>,
    pub avatar_remote_url: Option<String>,
    pub avatar_media_attachment_id: Option<String>,
    pub header_remote_url: Option<String>,
    pub header_media_attachment_id: Option<String>,
    pub emoji_ids: Vec<String>,
    #[serde(skip)]
    pub emojis: Vec<Emoji>,
    pub locked: bool,
    pub bot: bool,
    pub discoverable: bool,
    pub also_known_as: Vec<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    /// Zero until the first successful enrichment.
    pub fetched_at_ms: i64,
}

impl RemoteActor {
    pub fn is_local(&self) -> bool {
        self.domain.is_empty()
    }

    /// Server-level service actor rather than a user account.
    pub fn is_instance(&self) -> bool {
        if !self.username.is_empty() && self.username.eq_ignore_ascii_case(&self.domain) {
            return true;
        }
        if self.uri.ends_with("/internal.fetch") {
            return true;
        }
        self.followers_uri.is_none() || self.following_uri.is_none()
    }

    pub fn handle(&self) -> String {
        if self.domain.is_empty() {
            format!("@{}", self.username)
        } else {
            format!("@{}@{}", self.username, self.domain)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub uri: String,
    pub url: Option<String>,
    pub account_id: String,
    pub account_uri: String,
    pub object_type: Option<ObjectKind>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub sensitive: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub fetched_at_ms: i64,
    /// Zero when not pinned.
    pub pinned_at_ms: i64,
    pub boost_of_id: Option<String>,
    pub in_reply_to_id: Option<String>,
    pub in_reply_to_uri: Option<String>,
    pub in_reply_to_account_id: Option<String>,
    pub attachment_ids: Vec<String>,
    #[serde(skip)]
    pub attachments: Vec<MediaAttachment>,
    pub mention_ids: Vec<String>,
    #[serde(skip)]
    pub mentions: Vec<Mention>,
    pub emoji_ids: Vec<String>,
    #[serde(skip)]
    pub emojis: Vec<Emoji>,
}

impl RemoteObject {
    pub fn is_boost(&self) -> bool {
        self.boost_of_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub object_id: String,
    pub origin_account_id: String,
    pub origin_account_uri: String,
    /// None while only the target URI is known.
    pub target_account_id: Option<String>,
    pub target_account_uri: String,
    pub target_account_url: Option<String>,
    pub name_string: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Emoji {
    /// Empty on placeholders not yet stored.
    pub id: String,
    pub uri: String,
    pub shortcode: String,
    pub domain: String,
    pub image_remote_url: String,
    pub image_attachment_id: Option<String>,
    pub image_updated_at: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Empty on placeholders not yet fetched.
    pub id: String,
    pub remote_url: String,
    pub account_id: String,
    pub object_id: Option<String>,
    pub file_path: Option<String>,
    pub content_type: Option<String>,
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub description: Option<String>,
    pub blurhash: Option<String>,
    pub avatar: bool,
    pub header: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorLocator {
    Uri(String),
    Handle { username: String, domain: String },
}

impl ActorLocator {
    /// Accepts `https://...`, `@user@domain` and `user@domain`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with("https://") || s.starts_with("http://") {
            return Some(Self::Uri(s.to_string()));
        }
        let acct = s.strip_prefix("acct:").unwrap_or(s).trim_start_matches('@');
        let (username, domain) = acct.split_once('@')?;
        if username.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        Some(Self::Handle {
            username: username.to_string(),
            domain: domain.to_ascii_lowercase(),
        })
    }
}

impl std::fmt::Display for ActorLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri(uri) => f.write_str(uri),
            Self::Handle { username, domain } => write!(f, "@{username}@{domain}"),
        }
    }
}

/// Whether a record fetched at `fetched_at_ms` has to be fetched again at `now_ms`.
pub fn needs_refresh(fetched_at_ms: i64, now_ms: i64, interval: Duration, force: bool) -> bool {
    if force || fetched_at_ms <= 0 {
        return true;
    }
    now_ms >= fetched_at_ms.saturating_add(interval.as_millis() as i64)
}
